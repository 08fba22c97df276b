// SPDX-License-Identifier: MPL-2.0

//! End-to-end demo against a real broker: subscribe to a command topic,
//! announce presence, then echo whatever arrives.
//!
//! ```sh
//! MQTT_ADDR=127.0.0.1:1883 cargo run --example telemetry_demo
//! ```

use labmq::{ClientConfig, MqttClient, QoS, TcpFactory};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let addr = std::env::var("MQTT_ADDR").unwrap_or_else(|_| "127.0.0.1:1883".to_string());
    let config = ClientConfig::builder("labmq-demo")
        .keep_alive(30)
        .build();

    let client = MqttClient::connect(config, TcpFactory::new(addr)).await?;
    let granted = client.subscribe("lab/demo/cmd", QoS::AtLeastOnce).await?;
    tracing::info!(?granted, "subscribed");

    client
        .publish("lab/demo/state", b"online", QoS::AtLeastOnce, true)
        .await?;

    loop {
        tokio::select! {
            message = client.recv() => {
                let message = message?;
                tracing::info!(
                    topic = %message.topic,
                    payload = %String::from_utf8_lossy(&message.payload),
                    "command received"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    client.disconnect().await?;
    Ok(())
}
