use anyhow::{Context, Result};
use clap::Parser;
use quartz_config::{QuartzConfig, SensorBackend, clamp_interval_ms};
use quartz_engine::{Service, ServiceConfig, Shutdown, StartupError};
use quartz_ws::WsServer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "quartz")]
#[command(about = "Streams environment sensor readings to WebSocket clients", long_about = None)]
struct Args {
    /// Sampling interval in milliseconds (floored at 250)
    interval_ms: Option<u64>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Log filter, e.g. "debug" or "quartz_engine=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Address for the WebSocket listener
    #[arg(long)]
    listen: Option<String>,

    /// Use synthetic sensors and a logging LED instead of the board
    #[arg(long)]
    simulated: bool,
}

fn load_config(args: &Args) -> Result<QuartzConfig> {
    let mut config = match &args.config {
        Some(path) => QuartzConfig::load(path.as_str())
            .with_context(|| format!("loading config from {path}"))?,
        None => QuartzConfig::default(),
    };
    if let Some(ms) = args.interval_ms {
        config.sampling_interval_ms = clamp_interval_ms(ms);
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    if let Some(addr) = &args.listen {
        config.listen_addr = addr.clone();
    }
    if args.simulated {
        config.sensors.backend = SensorBackend::Simulated;
    }
    config.validate()?;
    Ok(config)
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("bad log level {level:?}"))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config.log_level)?;

    if let Some(requested) = args.interval_ms {
        if requested != config.sampling_interval_ms {
            warn!(
                requested,
                interval_ms = config.sampling_interval_ms,
                "sampling interval below floor, using floor"
            );
        }
    }

    let shutdown = Shutdown::new();
    let on_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        on_signal.trigger();
    })
    .context("installing signal handler")?;

    let source = quartz_sensors::open_sensors(&config)
        .map_err(|e| StartupError::Hardware(format!("sensors: {e}")))?;
    let actuator = quartz_sensors::open_actuator(&config)
        .map_err(|e| StartupError::Hardware(format!("led: {e}")))?;

    let mut server = WsServer::bind(config.listen_addr.as_str(), config.poll_interval())
        .with_context(|| format!("binding {}", config.listen_addr))?
        .with_handshake_timeout(config.handshake_timeout());

    let (service, mut broadcaster) = Service::start(
        ServiceConfig::from(&config),
        source,
        actuator,
        server.wake_signal(),
        shutdown.clone(),
    )?;

    let served = server.run(&mut broadcaster, &shutdown);
    let report = service.shutdown();
    if let Some(stats) = report.sampler {
        info!(
            cycles = stats.cycles,
            published = stats.published,
            dropped = stats.dropped,
            "sampler summary"
        );
    }
    if let Some(stats) = report.worker {
        info!(
            applied = stats.applied,
            rejected = stats.rejected,
            failed = stats.failed,
            "actuator summary"
        );
    }
    served.context("event loop failed")
}
