//! Pin Echo - mirror every virtual pin write back to the app.
//!
//! This example demonstrates:
//! - Loading a `ClientConfig` from a JSON file or the `PINWIRE_TOKEN` env var
//! - Wildcard write handlers that answer through the `Device`
//! - Answering pin reads with a computed value
//! - Lifecycle handlers for connect and disconnect
//!
//! # Running
//!
//! ```sh
//! PINWIRE_TOKEN=your-auth-token cargo run --example pin_echo
//! cargo run --example pin_echo -- device.json
//! RUST_LOG=pinwire_client=debug cargo run --example pin_echo -- device.json
//! ```

use std::time::Instant;

use pinwire_client::{Client, ClientConfig, Device, Event, PinwireError};
use tracing_subscriber::EnvFilter;

/// Pin that reports uptime in seconds when read.
const UPTIME_PIN: u16 = 0;

fn load_config() -> Result<ClientConfig, PinwireError> {
    if let Some(path) = std::env::args().nth(1) {
        return ClientConfig::from_json_file(path);
    }

    let token = std::env::var("PINWIRE_TOKEN")
        .map_err(|_| PinwireError::Config("pass a config file or set PINWIRE_TOKEN".into()))?;
    let mut config = ClientConfig::new(token);
    if let Ok(server) = std::env::var("PINWIRE_SERVER") {
        config.server = server;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let started = Instant::now();
    let mut client = Client::builder(load_config()?)
        .on_write_all(|device: &mut Device, event: &Event| {
            if let Some(pin) = event.pin {
                tracing::info!(pin, values = ?event.values, "Echoing write");
                device.virtual_write(pin, &event.values);
            }
            Ok(())
        })
        .on_read(UPTIME_PIN, move |device: &mut Device, _event: &Event| {
            device.virtual_write(UPTIME_PIN, [started.elapsed().as_secs()]);
            Ok(())
        })
        .on_connect(|device: &mut Device, _event: &Event| {
            device.notify("pin echo online");
            Ok(())
        })
        .on_disconnect(|_device: &mut Device, _event: &Event| {
            tracing::warn!("Disconnected, retrying");
            Ok(())
        })
        .log_sink(|line| eprintln!("[pinwire] {line}"))
        .build()?;

    // The client only stops when a handler returns PinwireError::Interrupted.
    loop {
        client.run()?;
    }
}
