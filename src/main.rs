use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod app;
mod chat;
mod config;
mod handler;
mod history;
mod reveal;
mod tui;
mod ui;

use app::App;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config
    let config = Config::load().unwrap_or_else(|_| Config::new());
    init_logging();

    let mut app = App::new(&config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    info!("pagume chat started");

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(&mut app, event)?;
        }

        // Completion calls finish here, on the run loop, never concurrently
        // with key handling
        app.poll_completion().await;

        if app.conversation.take_changed() {
            app.scroll_to_bottom();
        }
    }

    tui::restore()?;
    Ok(())
}

/// Logs go to a file because the terminal belongs to the TUI. `PAGUME_LOG`
/// selects the filter; logging is skipped if the file cannot be opened.
fn init_logging() {
    let Some(config_dir) = dirs::config_dir() else {
        return;
    };
    let dir = config_dir.join("pagume");
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let Ok(file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("pagume.log"))
    else {
        return;
    };

    let filter = EnvFilter::try_from_env("PAGUME_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::sync::Arc::new(file))
        .with_ansi(false)
        .init();
}
