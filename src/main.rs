use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;
use voxgame_core::AppConfig;
use voxgame_intent::{IntentService, IntentWorker, RecognitionSession, ServiceRegistry, WorkerOptions};

/// Log lines kept for the in-game panel.
const LOG_PANEL_CAPACITY: usize = 500;

#[derive(Parser)]
#[command(name = "voxgame", about = "Steer a square around the terminal by voice")]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Print the available input devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Print the registered intent services and exit
    #[arg(long)]
    list_services: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let registry = ServiceRegistry::new();

    if cli.list_services {
        for name in registry.list_services() {
            println!("{name}");
        }
        return Ok(());
    }
    if cli.list_devices {
        let devices = voxgame_audio::DeviceManager::new()
            .list_input_devices()
            .context("failed to list input devices")?;
        for (name, _) in devices {
            println!("{name}");
        }
        return Ok(());
    }

    let config = AppConfig::load_from_file(&cli.config)
        .with_context(|| format!("failed to load config from {:?}", cli.config))?;

    let logs = voxgame_tui::log_buffer();
    let env_filter = EnvFilter::try_new(&config.general.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(voxgame_tui::GameLogLayer::new(Arc::clone(&logs), LOG_PANEL_CAPACITY));
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let identity = config.session_identity();
    tracing::info!(
        project = %identity.project_id,
        session_id = %identity.session_id,
        engine = %config.service.engine,
        "voxgame starting"
    );

    let mut source = voxgame_audio::AudioSource::open(
        &config.audio.device_name,
        config.general.sample_rate,
        config.general.chunk_size(),
    )
    .with_context(|| format!("failed to open input device: {}", config.audio.device_name))?;

    let mut service = registry
        .create(&config.service.engine)
        .with_context(|| format!("unknown intent service: {}", config.service.engine))?;
    service
        .initialize(config.engine_config())
        .await
        .with_context(|| format!("failed to initialize intent service: {}", config.service.engine))?;
    let service: Arc<dyn IntentService> = Arc::from(service);

    let session = RecognitionSession::open(Arc::clone(&service), identity.clone());
    let mut worker = IntentWorker::new(
        session,
        source.queue(),
        WorkerOptions::from_config(&config.service),
    );
    let status = worker.status_handle();

    let game_result = tokio::task::block_in_place(|| {
        voxgame_tui::run(
            &config.game,
            &identity.session_id,
            logs,
            || match worker.request() {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "intent worker unavailable");
                    None
                }
            },
            || status.get(),
        )
    });

    let worker_result = worker.stop();
    source.close();
    if let Err(e) = service.shutdown().await {
        tracing::warn!(error = %e, "intent service shutdown failed");
    }

    game_result.context("game loop failed")?;
    worker_result.context("intent worker failed")?;
    tracing::info!("voxgame stopped");
    Ok(())
}
