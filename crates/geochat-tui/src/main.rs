use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use geochat_core::location::provider_from_config;
use geochat_core::{
    ChatSession, CommandDictation, Config, Conversation, GeminiClient, GeolocationMode,
    GroundedChat, SpeechCapture, SqliteStore,
};

mod app;
mod handler;
mod render;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui};

#[derive(Parser, Debug)]
#[command(name = "geochat")]
#[command(version, about = "Chat about places around you, with search and maps grounded answers")]
struct Cli {
    /// Gemini model to use
    #[arg(short, long)]
    model: Option<String>,

    /// Latitude to use instead of looking up your position
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,

    /// Longitude to use instead of looking up your position
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,

    /// Do not determine a position at all
    #[arg(long, conflicts_with_all = ["lat", "lon"])]
    no_geolocation: bool,

    /// Conversation database path
    #[arg(long)]
    history: Option<PathBuf>,

    /// Delete the saved conversation before starting
    #[arg(long)]
    clear_history: bool,

    /// Speech-to-text command printing one recognized segment per line
    #[arg(long)]
    dictation_cmd: Option<String>,

    /// Gemini API base URL, e.g. a proxy that adds the API key server-side
    #[arg(long, env = "GEMINI_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Log file (defaults to the data directory)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// List models that support maps grounding and exit
    #[arg(long)]
    list_models: bool,
}

/// Command line flags win over the config file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let (Some(latitude), Some(longitude)) = (cli.lat, cli.lon) {
        config.geolocation = GeolocationMode::Fixed { latitude, longitude };
    }
    if cli.no_geolocation {
        config.geolocation = GeolocationMode::Off;
    }
    if let Some(path) = &cli.history {
        config.history_path = Some(path.clone());
    }
    if let Some(cmd) = &cli.dictation_cmd {
        config.dictation_command = Some(cmd.split_whitespace().map(str::to_string).collect());
    }
    if let Some(url) = &cli.api_base_url {
        config.api_base_url = url.clone();
    }
}

fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("geochat=info,geochat_core=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_models {
        for model in GeminiClient::list_models() {
            println!("{}", model);
        }
        return Ok(());
    }

    let log_path = match &cli.log_file {
        Some(path) => path.clone(),
        None => Config::default_log_path()?,
    };
    init_logging(&log_path)?;

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("Using default config: {}", e);
        Config::new()
    });
    apply_overrides(&mut config, &cli);

    let backend: Arc<dyn GroundedChat> = Arc::new(GeminiClient::from_config(&config).map_err(|e| {
        anyhow!("{}. Set GEMINI_API_KEY, add api_key to the config file, or point --api-base-url at a proxy.", e)
    })?);

    let history_path = config.history_db_path()?;
    let store = SqliteStore::open(&history_path)
        .with_context(|| format!("Could not open conversation store {}", history_path.display()))?;
    let mut session = ChatSession::new(Conversation::load(store));
    if cli.clear_history {
        session.clear_history()?;
    }

    let dictation = CommandDictation::from_config(&config)
        .map(|capture| Arc::new(capture) as Arc<dyn SpeechCapture>);

    info!(
        model = %config.model,
        geolocation = ?config.geolocation,
        history = %history_path.display(),
        dictation = dictation.is_some(),
        "starting geochat"
    );

    let mut events = EventHandler::new();
    let mut app = App::new(
        session,
        backend,
        dictation,
        config.model.clone(),
        events.sender(),
        events.dictation_sender(),
    );
    app.request_location(provider_from_config(&config));

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, &mut events).await;
    app.composer.stop_dictation();
    tui::restore()?;

    result
}

async fn run(terminal: &mut Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event)?,
            None => break,
        }
    }
    Ok(())
}
