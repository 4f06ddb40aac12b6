//! Signs in with the stored credential, holds the realtime link until
//! Ctrl-C, then logs out.
//!
//! ```text
//! TETHER_BACKEND_URL=http://localhost:5000 TETHER_TOKEN=<jwt> cargo run -p session-cli
//! ```
//!
//! Variables are read from the environment and from a `.env` file in the
//! working directory, if there is one. `TETHER_TOKEN`, when set, is stored
//! as the credential before startup. Every other variable is described in
//! `tether::ClientConfig`.

use tether::prelude::*;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<(), TetherError> {
    let _ = dotenvy::dotenv();
    tether::telemetry::init();

    let config = ClientConfig::from_env()?;
    tracing::info!(mode = %config.mode, backend = %config.backend_url, "starting");
    let client = TetherClient::from_config(config)?;

    if let Ok(token) = std::env::var("TETHER_TOKEN") {
        client.set_credential(Credential::new(token)).await?;
    }

    let profile = match client.start().await {
        Startup::SignedIn(profile) => profile,
        Startup::SignedOut => {
            tracing::info!("not signed in; set TETHER_TOKEN to log in");
            return Ok(());
        }
        Startup::Unverified => {
            tracing::warn!("backend unreachable; credential kept for next run");
            return Ok(());
        }
    };
    tracing::info!(user_id = %profile.id, name = %profile.name, "signed in, Ctrl-C to log out");

    let mut events = client.events();
    let mut status = client.manager().connection().watch_status();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(frame) => tracing::info!(event = %frame.event, data = %frame.data, "server event"),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "dropped server events"),
                Err(RecvError::Closed) => break,
            },
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let now = *status.borrow_and_update();
                tracing::info!(status = ?now, "realtime link");
                if now == LinkStatus::Failed {
                    tracing::warn!("realtime link gave up reconnecting");
                }
            }
        }
    }

    client.logout().await;
    Ok(())
}
