use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use usb_moded::config::{DaemonConfig, DEFAULT_CONFIG_PATH};
use usb_moded::event_loop::MainLoop;
use usb_moded::modes::{ConfigDirectoryScanner, ModeCatalog, ModeCatalogStore};
use usb_moded::signal::{init_signal_relay, Signal};

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// usb-moded command line arguments
#[derive(Parser, Debug)]
#[command(name = "usb-moded")]
#[command(version, about = "USB gadget mode daemon", long_about = None)]
struct CliArgs {
    /// Configuration file (default: /etc/usb-moded/usb-moded.toml)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Normal mode directory (overrides config)
    #[arg(long, value_name = "DIR")]
    mode_dir: Option<PathBuf>,

    /// Diagnostic mode directory (overrides config)
    #[arg(long, value_name = "DIR")]
    diag_dir: Option<PathBuf>,

    /// Load diagnostic modes instead of normal ones
    #[arg(short = 'd', long)]
    diag: bool,

    /// Log level (error, warn, info, verbose, debug, trace; overrides config)
    #[arg(short = 'l', long, value_name = "LEVEL")]
    log_level: Option<LogLevel>,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut config = DaemonConfig::load(&config_path)?;

    let level = args
        .log_level
        .or_else(|| LogLevel::from_str(&config.logging.level, true).ok())
        .unwrap_or_default();
    init_logging(level, args.verbose);

    tracing::info!("Starting usb-moded v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Configuration file: {}", config_path.display());

    // Apply CLI argument overrides to config (only if explicitly specified)
    if let Some(dir) = args.mode_dir {
        config.modes.dir = dir;
    }
    if let Some(dir) = args.diag_dir {
        config.modes.diag_dir = dir;
    }
    if args.diag {
        config.modes.diagnostic = true;
    }

    let diagnostic = config.modes.diagnostic;
    let scanner = ConfigDirectoryScanner::new(config.modes.dirs(), config.features.parse_options());
    tracing::info!(
        "Loading {} modes from {}",
        if diagnostic { "diagnostic" } else { "normal" },
        scanner.dirs().select(diagnostic).display()
    );

    let store = Rc::new(ModeCatalogStore::load(scanner, diagnostic));
    log_catalog(&store.current());

    let mut main_loop = MainLoop::new();
    let quit = main_loop.quit_handle();
    let reload_store = store.clone();

    init_signal_relay(&mut main_loop, move |signal| match signal {
        Signal::SIGHUP => {
            tracing::info!("Reloading mode configuration");
            let catalog = reload_store.reload(diagnostic);
            log_catalog(&catalog);
        }
        _ => {
            tracing::info!("Shutdown signal received ({})", signal.as_str());
            quit.quit();
        }
    })
    .context("Failed to set up signal handling")?;

    main_loop.run()?;

    store.release();
    tracing::info!("usb-moded shutdown complete");
    Ok(())
}

fn log_catalog(catalog: &ModeCatalog) {
    if catalog.is_empty() {
        tracing::warn!("No usable modes found");
        return;
    }
    for mode in catalog {
        tracing::info!(
            mode = mode.name(),
            module = mode.module(),
            source = %mode.source().display(),
            "Available mode"
        );
    }
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "usb_moded=error",
        LogLevel::Warn => "usb_moded=warn",
        LogLevel::Info => "usb_moded=info",
        LogLevel::Verbose => "usb_moded=debug",
        LogLevel::Debug => "usb_moded=debug",
        LogLevel::Trace => "usb_moded=trace",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}
