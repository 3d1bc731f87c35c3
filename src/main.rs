//! Click Debounce - global mouse click debounce filter
//!
//! Swallows clicks that arrive too soon after the previous accepted click.

use click_debounce::app::cli::{AutostartAction, Cli, Commands, ConfigAction};
use click_debounce::app::config::Config;
use click_debounce::capture::manual::ManualHook;
use click_debounce::capture::platform_hook_with_timeout;
use click_debounce::capture::types::{ClickEvent, Decision};
use click_debounce::control::{platform_autostart, ControlSurface};
use click_debounce::filter::DebounceEngine;
use click_debounce::notify::Notification;
use click_debounce::time::timebase::Timebase;
use click_debounce::Error;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// How often the run loop wakes to check for Ctrl+C and the duration limit
const POLL_INTERVAL: Duration = Duration::from_millis(200);

fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    // Initialize tracing (--verbose enables debug-level output)
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    Timebase::init();

    let config_path = cli.config_path();
    let config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        Config::default()
    };

    match cli.command {
        Commands::Run { threshold, duration } => {
            let threshold = threshold.unwrap_or(config.filter.default_threshold_ms);
            run_filter(threshold, duration, &config)?;
        }
        Commands::Simulate { threshold, clicks } => {
            let threshold = threshold.unwrap_or(config.filter.default_threshold_ms);
            run_simulate(threshold, &clicks, &config)?;
        }
        Commands::Autostart { action } => {
            run_autostart(action, &config)?;
        }
        Commands::Config { action } => {
            run_config(action, &config, &config_path)?;
        }
    }

    Ok(())
}

fn control_surface(engine: DebounceEngine, config: &Config) -> anyhow::Result<ControlSurface> {
    let program = std::env::current_exe()?;
    Ok(ControlSurface::new(
        Arc::new(engine),
        platform_autostart(&config.autostart.label, program),
    ))
}

fn run_filter(threshold: u64, duration: u64, config: &Config) -> anyhow::Result<()> {
    let engine = DebounceEngine::with_queue_capacity(
        platform_hook_with_timeout(config.hook.install_timeout()),
        config.filter.default_threshold_ms,
        config.notify.queue_capacity,
    );
    let surface = control_surface(engine, config)?;
    let events = surface.subscribe();

    let threshold_arg = i64::try_from(threshold)?;
    if let Err(e) = surface.start_filter(threshold_arg) {
        warn!("Failed to start click filter: {}", e);
        #[cfg(target_os = "macos")]
        warn!(
            "Enable Accessibility permissions in System Settings > Privacy & Security > \
             Accessibility"
        );
        return Err(e.into());
    }

    info!("Filtering clicks closer than {}ms... Press Ctrl+C to stop", threshold);

    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_handler = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_handler.store(true, Ordering::SeqCst);
    })?;

    let start_time = Instant::now();
    let mut hook_lost = false;
    loop {
        if stop_flag.load(Ordering::SeqCst) {
            break;
        }
        if duration > 0 && start_time.elapsed().as_secs() >= duration {
            break;
        }

        match events.recv_timeout(POLL_INTERVAL) {
            Some(Notification::ClickBlocked(blocked)) => {
                info!("Blocked click ({}ms after previous)", blocked.delta_ms);
            }
            Some(Notification::StatusChanged(status)) if !status.running => {
                warn!("Click filter stopped unexpectedly");
                hook_lost = true;
                break;
            }
            Some(Notification::StatusChanged(_)) | None => {}
        }
    }

    let status = surface.stop_filter()?;
    let stats = surface.engine().publisher_stats();
    info!(
        "Notifications: {} published, {} dropped",
        stats.published(),
        stats.dropped()
    );

    println!("\nClick Filter Stopped");
    println!("  Threshold: {}ms", status.threshold_ms);
    println!("  Blocked clicks: {}", status.blocked_clicks);
    println!("  Ran for: {:.1}s", start_time.elapsed().as_secs_f64());

    if hook_lost {
        return Err(Error::HookLost("the system disabled the click hook".into()).into());
    }
    Ok(())
}

#[derive(Serialize)]
struct SimulatedClick {
    at_ms: u64,
    #[serde(flatten)]
    decision: Decision,
}

fn run_simulate(threshold: u64, clicks: &[u64], config: &Config) -> anyhow::Result<()> {
    let (hook, handle) = ManualHook::new();
    let engine = DebounceEngine::with_queue_capacity(
        Box::new(hook),
        config.filter.default_threshold_ms,
        config.notify.queue_capacity,
    );
    engine.start(threshold)?;

    for &at_ms in clicks {
        let decision = handle
            .click(ClickEvent::left_at_millis(at_ms))
            .ok_or_else(|| anyhow::anyhow!("simulated hook is not installed"))?;
        println!("{}", serde_json::to_string(&SimulatedClick { at_ms, decision })?);
    }

    let status = engine.stop();
    println!("{}", serde_json::to_string(&status)?);
    Ok(())
}

fn run_autostart(action: AutostartAction, config: &Config) -> anyhow::Result<()> {
    let program = std::env::current_exe()?;
    let provider = platform_autostart(&config.autostart.label, program);

    let enabled = match action {
        AutostartAction::Status => provider.is_enabled()?,
        AutostartAction::Enable => provider.set_enabled(true)?,
        AutostartAction::Disable => provider.set_enabled(false)?,
    };

    println!(
        "Launch at login: {} ({})",
        if enabled { "enabled" } else { "disabled" },
        provider.name()
    );
    Ok(())
}

fn run_config(action: ConfigAction, config: &Config, config_path: &Path) -> anyhow::Result<()> {
    let config_path = config_path.to_path_buf();
    match action {
        ConfigAction::Show => {
            println!("Configuration ({:?}):\n", config_path);
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                println!("Config already exists at {:?}", config_path);
                println!("Use --force to overwrite");
                return Ok(());
            }
            config.save(&config_path)?;
            println!("Created config at {:?}", config_path);
            println!("\nConfig content:\n{}", config.to_toml()?);
        }
        ConfigAction::Reset { force } => {
            if config_path.exists() && !force {
                println!("Config exists at {:?}", config_path);
                println!("Use --force to reset to defaults");
                return Ok(());
            }
            Config::default().save(&config_path)?;
            println!("Configuration reset to defaults at {:?}", config_path);
        }
    }
    Ok(())
}
