//! Connect to a bulb by address and set a color from the command line.
//!
//! Usage:
//!
//! ```sh
//! cargo run --example set_color -- <address> <hue> <saturation> <brightness>
//! ```

use std::sync::Arc;
use std::time::Duration;

use superlight_core::{BtleTransport, BulbConfig, BulbSession, ScanCoordinator, SessionState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "superlight_core=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let address = args.next().ok_or("usage: set_color <address> <hue> <sat> <brightness>")?;
    let hue: u16 = args.next().unwrap_or_else(|| "0".into()).parse()?;
    let saturation: u8 = args.next().unwrap_or_else(|| "100".into()).parse()?;
    let brightness: u8 = args.next().unwrap_or_else(|| "100".into()).parse()?;

    let transport = BtleTransport::new().await?;
    let session = Arc::new(BulbSession::new(
        transport.clone(),
        BulbConfig::new(address),
    )?);

    let coordinator = ScanCoordinator::new(transport);
    coordinator.register(session.clone()).await;
    coordinator.spawn();

    println!("Scanning for {}...", session.address());
    loop {
        match session.state().await {
            SessionState::Ready => break,
            SessionState::Disconnected { error } => {
                if let Some(e) = error {
                    eprintln!("Connection attempt failed: {e}, retrying");
                }
            }
            _ => {}
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    println!("Connected. Setting hsv({hue}, {saturation}, {brightness})");
    session.set_hue(hue).await?;
    session.set_saturation(saturation).await?;
    session.set_brightness(brightness).await?;
    session.set_power(true).await?;

    println!("Flashing to confirm it is the right bulb");
    session.identify().await?;

    println!("Bulb reports brightness {}", session.brightness().await?);
    Ok(())
}
