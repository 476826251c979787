//! eventdesk - a terminal client for the events service.
//!
//! Browse events five at a time, create and edit your own events, and
//! register for (or withdraw from) anything on the list.

mod app;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use eventdesk_core::api::{ApiClient, EventsApi};
use eventdesk_core::auth::Session;
use eventdesk_core::config::Config;
use eventdesk_core::table::{PageWindow, PER_PAGE};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Log file written inside the cache directory
const LOG_FILE: &str = "eventdesk.log";

/// Initialize the tracing subscriber.
///
/// The terminal belongs to the UI, so logs go to a file in the cache
/// directory. Use RUST_LOG to control the level (e.g. RUST_LOG=debug).
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let log_dir = Config::default()
        .cache_dir()
        .unwrap_or_else(|_| PathBuf::from("./cache"));
    if std::fs::create_dir_all(&log_dir).is_err() {
        // Without a log directory fall back to stderr
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(io::stderr))
            .with(filter)
            .init();
        return None;
    }

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();
    Some(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    // Initialize logging; the guard flushes the log file on exit
    let _log_guard = init_tracing();

    // Check for CLI commands
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 && args[1] == "--list" {
        let page = args.get(2).and_then(|p| p.parse().ok()).unwrap_or(1);
        return list_events(page).await;
    }
    if args.len() > 1 && args[1] == "--login" {
        let mut app = App::new().await?;
        return app.login_interactive().await;
    }

    info!("eventdesk starting");

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create app
    let mut app = App::new().await?;

    // Show the saved first page behind the login overlay or while loading
    app.load_from_cache().await;

    if !app.is_authenticated() {
        app.start_login();
    } else {
        app.refresh_all().await;
    }

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("eventdesk shutting down");
    Ok(())
}

/// Print one page of events as JSON using the saved session
async fn list_events(page: u32) -> Result<()> {
    let config = Config::load()?;
    let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
    let mut session = Session::new(cache_dir);
    session.load()?;

    let token = session
        .token()
        .filter(|_| session.is_valid())
        .ok_or_else(|| anyhow::anyhow!("No saved session. Run `eventdesk --login` first."))?
        .to_string();

    let client = ApiClient::new(config.api_base_url())?.with_token(token);
    let window = PageWindow::new(page, PER_PAGE);
    eprintln!("Fetching page {} from {}...", window.page, client.base_url());

    let response = client.list_events(window.skip(), window.limit()).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        // Draw UI
        terminal.draw(|f| render(f, app))?;

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks().await;

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
