use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use colored::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use resmon::core::metrics::SystemMetrics;
use resmon::ui::print_report;
use resmon::{select_backends, Backend, MonitorConfig, Monitors};

fn cli() -> Command {
    Command::new("resmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Samples CPU, memory and network usage of this host")
        .arg(
            Arg::new("interval")
                .short('i')
                .long("interval")
                .value_name("MS")
                .help("Polling interval in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("interface")
                .short('n')
                .long("interface")
                .value_name("NAME")
                .help("Network interface to capture on (default: default-route interface)"),
        )
        .arg(
            Arg::new("backend")
                .short('b')
                .long("backend")
                .value_name("BACKEND")
                .help("Platform backend")
                .value_parser(["auto", "linux", "windows"]),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print one JSON object per poll instead of the text report")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("count")
                .short('c')
                .long("count")
                .value_name("N")
                .help("Stop after N polls")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("save-config")
                .long("save-config")
                .help("Write the effective settings to the config file before starting")
                .action(ArgAction::SetTrue),
        )
}

fn emit(metrics: &SystemMetrics, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(metrics)?);
    } else {
        print_report(metrics);
    }
    Ok(())
}

/// Sleep for `period`, waking early when `running` is cleared.
fn wait(period: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + period;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(Duration::from_millis(100)));
    }
}

fn run(monitors: &Monitors, period: Duration, json: bool, count: Option<u64>) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl-C handler")?;

    let mut polls = 0u64;
    loop {
        // samplers produce their first reading one period after start
        wait(period, &running);
        if !running.load(Ordering::SeqCst) {
            break;
        }

        emit(&monitors.snapshot(), json)?;
        polls += 1;

        if count.is_some_and(|limit| polls >= limit) {
            return Ok(());
        }
    }

    if !json {
        println!("{}", "Interrupted, final reading:".yellow());
    }
    emit(&monitors.snapshot(), json)
}

fn main() -> Result<()> {
    resmon::init_logging();

    let matches = cli().get_matches();

    let mut config = MonitorConfig::load().unwrap_or_else(|e| {
        log::warn!("Using default configuration: {:#}", e);
        MonitorConfig::default()
    });

    if let Some(&interval) = matches.get_one::<u64>("interval") {
        config.poll_interval_ms = interval;
    }
    if let Some(interface) = matches.get_one::<String>("interface") {
        config.network_interface = Some(interface.clone());
    }
    if let Some(backend) = matches.get_one::<String>("backend") {
        config.backend = backend.parse::<Backend>()?;
    }
    let json = matches.get_flag("json");
    let count = matches.get_one::<u64>("count").copied();

    if matches.get_flag("save-config") {
        config.save().context("Failed to save config")?;
        log::info!("Saved config to {:?}", MonitorConfig::config_path()?);
    }

    let monitors = select_backends(&config).context("Failed to start monitors")?;
    let result = run(&monitors, config.poll_interval(), json, count);

    // joins every sampler thread
    drop(monitors);
    result
}
