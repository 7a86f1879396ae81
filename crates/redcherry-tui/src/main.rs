use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use redcherry_core::{ChatSession, Config, HttpInferenceClient};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[tokio::main]
async fn main() -> Result<()> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?
        .join("redcherry");
    init_logging(&data_dir)?;

    let config = Config::load().unwrap_or_else(|e| {
        warn!(error = %e, "could not read config, using defaults");
        Config::new()
    });
    let provider_config = config.provider_config()?;
    if provider_config.api_key.is_none() {
        // The widget stays usable; every reply becomes the connection fallback.
        warn!(
            "no API key for {}; set {}",
            provider_config.provider,
            provider_config.provider.api_key_env()
        );
    }

    let mut client = HttpInferenceClient::from_config(&provider_config);
    if let Some(url) = &config.base_url {
        client = client.with_endpoint(url);
    }
    info!(endpoint = client.endpoint(), "inference client ready");

    let session = ChatSession::new(Arc::new(client), provider_config);
    let mut app = App::new(session, data_dir);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app).await;
    tui::restore()?;

    result
}

async fn run(terminal: &mut Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }

    Ok(())
}

/// The terminal belongs to the UI, so logs go to a file. `RUST_LOG` overrides.
fn init_logging(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("redcherry.log"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(())
}
