// SPDX-License-Identifier: MPL-2.0

//! Inbound dispatch behavior:
//! - subscribe/SUBACK completes with the granted QoS
//! - a refused filter (0x80) fails the subscribe
//! - an unanswered subscribe or unsubscribe fails with SubscribeFailed
//! - inbound QoS 1 PUBLISH is acknowledged before delivery, exactly once
//! - an acknowledgement for an unknown packet id tears the link down
//! - inbound QoS 2 PUBLISH tears the link down
//! - the ring buffer evicts the oldest message and counts discards

mod common;

use common::*;
use labmq::codec::packet::Packet;
use labmq::codec::publish::Publish;
use labmq::codec::suback::SubAck;
use labmq::codec::unsuback::UnsubAck;
use labmq::{ClientError, LinkState, MqttClient, QoS};
use tokio::io::{AsyncWriteExt, DuplexStream};

async fn connected_pair(
    config: labmq::ClientConfig,
) -> (MqttClient, DuplexStream) {
    let (client_side, mut broker) = link_pair();
    let factory = ScriptedFactory::new(vec![client_side]);
    let broker_task = tokio::spawn(async move {
        accept_connect(&mut broker).await;
        broker
    });
    let client = MqttClient::connect(config, factory).await.unwrap();
    let broker = broker_task.await.unwrap();
    (client, broker)
}

#[tokio::test(start_paused = true)]
async fn subscribe_returns_granted_qos() {
    let (client, mut broker) = connected_pair(test_config("bench-07")).await;

    let broker_task = tokio::spawn(async move {
        let Packet::Subscribe(sub) = read_packet(&mut broker).await else {
            panic!("expected SUBSCRIBE");
        };
        assert_eq!(sub.subscriptions.len(), 1);
        assert_eq!(sub.subscriptions[0].filter, "lab/bench-07/cmd");
        write_packet(&mut broker, &SubAck::new(sub.packet_id, vec![0x01])).await;
        broker
    });

    let granted = client
        .subscribe("lab/bench-07/cmd", QoS::AtLeastOnce)
        .await
        .unwrap();
    assert_eq!(granted, QoS::AtLeastOnce);
    broker_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn refused_filter_fails_the_subscribe() {
    let (client, mut broker) = connected_pair(test_config("bench-07")).await;

    let broker_task = tokio::spawn(async move {
        let Packet::Subscribe(sub) = read_packet(&mut broker).await else {
            panic!("expected SUBSCRIBE");
        };
        write_packet(&mut broker, &SubAck::new(sub.packet_id, vec![0x80])).await;
        broker
    });

    let err = client
        .subscribe("lab/forbidden", QoS::AtMostOnce)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::SubscribeFailed { .. }));
    broker_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn subscribe_timeout_fails_without_retry() {
    let (client, mut broker) = connected_pair(test_config("bench-07")).await;

    let broker_task = tokio::spawn(async move {
        // Swallow the SUBSCRIBE, never answer, and make sure no second
        // attempt arrives while the client times out.
        read_packet(&mut broker).await;
        broker
    });

    let err = client
        .subscribe("lab/slow", QoS::AtMostOnce)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::SubscribeFailed { .. }));
    broker_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn inbound_qos1_message_is_acked_before_delivery() {
    let (client, mut broker) = connected_pair(test_config("bench-07")).await;

    let mut publish = Publish::with_qos1("lab/bench-07/cmd", b"run".to_vec(), 7);
    publish.retain = false;
    write_packet(&mut broker, &publish).await;

    // The PUBACK must arrive even though nobody has drained the buffer yet:
    // a slow consumer cannot stall the acknowledgement.
    let Packet::PubAck(ack) = read_packet(&mut broker).await else {
        panic!("expected PUBACK");
    };
    assert_eq!(ack.packet_id, 7);

    let message = client.recv().await.unwrap();
    assert_eq!(message.topic, "lab/bench-07/cmd");
    assert_eq!(message.payload, b"run");
    assert_eq!(message.qos, QoS::AtLeastOnce);
    assert_eq!(client.discarded(), 0);
}

#[tokio::test(start_paused = true)]
async fn unknown_puback_tears_the_link_down() {
    let (client, mut broker) = connected_pair(test_config("bench-07")).await;
    let mut states = client.state_changes();
    states.wait_for(|s| *s == LinkState::Up).await.unwrap();

    broker.write_all(&[0x40, 0x02, 0x00, 0x63]).await.unwrap(); // PUBACK id 99

    states
        .wait_for(|s| *s != LinkState::Up)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn inbound_qos2_publish_tears_the_link_down() {
    let (client, mut broker) = connected_pair(test_config("bench-07")).await;
    let mut states = client.state_changes();
    states.wait_for(|s| *s == LinkState::Up).await.unwrap();

    // PUBLISH, QoS 2 flags
    broker
        .write_all(&[0x34, 0x07, 0x00, 0x03, b'a', b'/', b'b', 0x00, 0x07])
        .await
        .unwrap();

    states
        .wait_for(|s| *s != LinkState::Up)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_completes_on_unsuback() {
    let (client, mut broker) = connected_pair(test_config("bench-07")).await;

    let broker_task = tokio::spawn(async move {
        let Packet::Unsubscribe(unsub) = read_packet(&mut broker).await else {
            panic!("expected UNSUBSCRIBE");
        };
        assert_eq!(unsub.filters, vec!["lab/bench-07/cmd".to_string()]);
        write_packet(&mut broker, &UnsubAck::new(unsub.packet_id)).await;
        broker
    });

    client.unsubscribe("lab/bench-07/cmd").await.unwrap();
    broker_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn unsubscribe_timeout_fails_like_subscribe() {
    let (client, mut broker) = connected_pair(test_config("bench-07")).await;

    let broker_task = tokio::spawn(async move {
        // Swallow the UNSUBSCRIBE and never answer.
        read_packet(&mut broker).await;
        broker
    });

    let err = client.unsubscribe("lab/slow").await.unwrap_err();
    assert!(matches!(err, ClientError::SubscribeFailed { .. }));
    broker_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn full_buffer_discards_oldest() {
    let mut config = test_config("bench-07");
    config.sink_capacity = 2;
    let (client, mut broker) = connected_pair(config).await;

    for n in 0u8..3 {
        write_packet(&mut broker, &Publish::new("lab/t", vec![n])).await;
    }

    // Wait until the dispatcher has overrun the buffer before draining it;
    // otherwise the reader could race the eviction.
    while client.discarded() < 1 {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let first = client.recv().await.unwrap();
    let second = client.recv().await.unwrap();
    assert_eq!(client.discarded(), 1);
    assert_eq!(first.payload, vec![1]);
    assert_eq!(second.payload, vec![2]);
    assert_eq!(client.state(), LinkState::Up);
}
