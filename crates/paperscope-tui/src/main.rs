use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ratatui::crossterm::event;
use ratatui::crossterm::execute;
use ratatui::crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::prelude::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use paperscope_core::{API_URL_ENV, ApiClient, Config, Session};

mod action;
mod app;
mod backend;
mod tui_event;
mod input;
mod model;
mod theme;
mod view;

use app::App;

/// Paperscope TUI: browse extracted paper data and generate visualizations.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// PDF files to upload on startup
    pdf_paths: Vec<PathBuf>,

    /// Backend base URL (overrides the config file)
    #[arg(long)]
    api_url: Option<String>,

    /// Config file (default: <config dir>/paperscope/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file; the terminal is owned by the UI
    #[arg(long, env = "PAPERSCOPE_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Directory for exports and saved visualizations
    #[arg(long, default_value = ".")]
    export_dir: PathBuf,
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("paperscope").join("config.toml"))
}

fn init_logging(path: &Path) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("cannot open log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Some(path) = &args.log_file {
        init_logging(path)?;
    }

    // Resolve config from CLI flags > env vars > config file > defaults
    let config_path = args.config.clone().or_else(default_config_path);
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(config_path.as_deref())?,
    };
    config.override_api_url(std::env::var(API_URL_ENV).ok());
    config.override_api_url(args.api_url.clone());
    config.validate()?;
    tracing::info!(api_url = %config.api_url, "starting paperscope tui");

    if !args.export_dir.is_dir() {
        anyhow::bail!("export directory not found: {}", args.export_dir.display());
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let cancel = CancellationToken::new();

    let session = Session::new(ApiClient::new(config.api_url.clone()), &config)
        .with_settle_hook(app::settle_hook(tx.clone()));
    let mut app = App::new(session, tx, cancel.clone(), args.export_dir.clone());

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    // Install panic hook that restores terminal before printing panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Drain any stray input events (e.g. Enter keypress from launching the command)
    while event::poll(Duration::from_millis(50)).unwrap_or(false) {
        let _ = event::read();
    }

    app.check_health();
    app.start_sync();
    app.start_uploads(args.pdf_paths);

    // Also handle Ctrl+C at the OS level for clean shutdown
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_for_signal.cancel();
        }
    });

    // Main event loop
    let tick_rate = Duration::from_millis(100);

    loop {
        terminal.draw(|f| app.view(f))?;

        tokio::select! {
            // Backend events (non-blocking drain)
            Some(backend_event) = rx.recv() => {
                app.handle_backend_event(backend_event);
                while let Ok(evt) = rx.try_recv() {
                    app.handle_backend_event(evt);
                }
            }
            // Terminal input events
            _ = async {
                if event::poll(tick_rate).unwrap_or(false) {
                    if let Ok(evt) = event::read() {
                        let action = input::map_event(&evt, app.is_editing());
                        app.update(action);
                    }
                }
            } => {}
            _ = cancel.cancelled() => {
                app.should_quit = true;
            }
        }

        app.update(action::Action::Tick);

        if app.should_quit {
            cancel.cancel();
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;

    Ok(())
}
