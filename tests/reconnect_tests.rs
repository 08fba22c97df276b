// SPDX-License-Identifier: MPL-2.0

//! Connection supervision behavior:
//! - a dropped link fails in-flight operations with LinkDown, then the
//!   supervisor reconnects (with a clean session) and fresh operations
//!   succeed
//! - reconnect attempts back off but never give up while links keep failing
//! - Stopped is only reachable through an explicit disconnect, which sends
//!   DISCONNECT first

mod common;

use common::*;
use labmq::codec::packet::Packet;
use labmq::codec::puback::PubAck;
use labmq::{ClientError, LinkState, MqttClient, QoS};

#[tokio::test(start_paused = true)]
async fn link_drop_fails_pending_publish_then_reconnect_succeeds() {
    let (first_client_side, mut first_broker) = link_pair();
    let (second_client_side, mut second_broker) = link_pair();
    let factory = ScriptedFactory::new(vec![first_client_side, second_client_side]);

    let mut config = test_config("bench-07");
    config.clean_session = false;

    let first_broker_task = tokio::spawn(async move {
        let connect = accept_connect(&mut first_broker).await;
        assert!(!connect.clean_session);
        // Take the publish but never ack it; then kill the link.
        let Packet::Publish(publish) = read_packet(&mut first_broker).await else {
            panic!("expected PUBLISH");
        };
        drop(first_broker);
        publish
    });

    let client = MqttClient::connect(config, factory).await.unwrap();
    let err = client
        .publish("lab/bench-07/state", b"ready", QoS::AtLeastOnce, false)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::LinkDown));
    first_broker_task.await.unwrap();

    // The supervisor reconnects on its own; reconnects always request a
    // clean session regardless of the configured flag.
    let second_broker_task = tokio::spawn(async move {
        let connect = accept_connect(&mut second_broker).await;
        assert!(connect.clean_session);
        let Packet::Publish(publish) = read_packet(&mut second_broker).await else {
            panic!("expected PUBLISH");
        };
        write_packet(&mut second_broker, &PubAck::new(publish.packet_id.unwrap())).await;
        (connect, second_broker)
    });

    let mut states = client.state_changes();
    states.wait_for(|s| *s == LinkState::Up).await.unwrap();
    client
        .publish("lab/bench-07/state", b"ready", QoS::AtLeastOnce, false)
        .await
        .unwrap();
    second_broker_task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn supervisor_keeps_retrying_while_links_fail() {
    let (client_side, mut broker) = link_pair();
    // One good link, then every reconnect attempt fails at the factory.
    let factory = ScriptedFactory::new(vec![client_side]);

    let broker_task = tokio::spawn(async move {
        accept_connect(&mut broker).await;
        broker
    });
    let client = MqttClient::connect(test_config("bench-07"), factory)
        .await
        .unwrap();
    let broker = broker_task.await.unwrap();

    let mut states = client.state_changes();
    states.wait_for(|s| *s == LinkState::Up).await.unwrap();
    drop(broker);
    states.wait_for(|s| *s == LinkState::Down).await.unwrap();

    // Attempts continue: we must observe another Connecting after Down.
    states
        .wait_for(|s| *s == LinkState::Connecting)
        .await
        .unwrap();
    assert_ne!(client.state(), LinkState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn explicit_disconnect_sends_packet_and_stops() {
    let (client_side, mut broker) = link_pair();
    let factory = ScriptedFactory::new(vec![client_side]);

    let broker_task = tokio::spawn(async move {
        accept_connect(&mut broker).await;
        read_packet(&mut broker).await
    });

    let client = MqttClient::connect(test_config("bench-07"), factory)
        .await
        .unwrap();
    let mut states = client.state_changes();
    states.wait_for(|s| *s == LinkState::Up).await.unwrap();

    client.disconnect().await.unwrap();
    assert!(matches!(
        broker_task.await.unwrap(),
        Packet::Disconnect(_)
    ));
    states
        .wait_for(|s| *s == LinkState::Stopped)
        .await
        .unwrap();
}
