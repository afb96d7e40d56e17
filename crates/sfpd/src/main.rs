//! sfpd - transceiver state broker daemon
//!
//! Watches the configured SFP/QSFP cages, publishes presence changes and
//! serves PHY and EEPROM requests over Unix sockets.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sfpd::server::stopped as stopped_signal;
use sfpd::{
    systemd, Broker, BrokerHandle, BrokerService, SfpdConfig, SocketServer, SysfsPlatform,
    SystemdNotifier, DEFAULT_CONFIG_PATH,
};
use tokio::runtime::Handle;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Transceiver state broker
#[derive(Parser, Debug)]
#[command(name = "sfpd", version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log filter, overrides the config file (RUST_LOG overrides both)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("sfpd exiting: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .compact()
        .init();
}

async fn run(args: Args) -> Result<()> {
    let config = SfpdConfig::load_or_default(&args.config)
        .with_context(|| format!("loading {}", args.config.display()));

    let level = args
        .log_level
        .clone()
        .or_else(|| config.as_ref().ok().map(|c| c.log_level.clone()))
        .unwrap_or_else(|| "info".to_string());
    init_logging(&level);

    let config = config?;
    info!("--- Starting sfpd ---");
    if !args.config.exists() {
        warn!(path = %args.config.display(), "config file not found, using defaults");
    }
    info!(ports = config.ports.len(), "configuration loaded");

    let notifier = SystemdNotifier::new();
    debug!(systemd = notifier.is_enabled(), "supervisor notification");
    let platform = SysfsPlatform::new(config.ports.clone());

    let broker = Broker::new(platform.clone()).with_probe_policy(config.probe_policy());
    let service = BrokerService::spawn(broker, Handle::current(), config.monitor_interval())
        .context("starting command thread")?;
    let handle = service.handle();

    let activated = systemd::activated_listener().context("reading passed sockets")?;
    let server = SocketServer::bind(&config.endpoints, handle.clone(), activated)
        .context("binding sockets")?;

    let (stop, stopped) = watch::channel(false);
    let server_task = tokio::spawn(server.run(stopped.clone()));

    // Startup presence is queued before READY so a first REPLAY sees it.
    notifier.notify_status("scanning transceiver cages")?;
    let mut last = HashMap::new();
    let events = platform.poll_presence(&mut last);
    let present = events.len();
    for event in events {
        handle.presence(event)?;
    }
    notifier.notify_status(&systemd::presence_status(present, config.ports.len()))?;
    let poller = config.presence_poll_interval().map(|interval| {
        tokio::spawn(poll_presence(platform, handle.clone(), last, interval, stopped))
    });

    notifier.notify_ready()?;
    info!("sfpd ready");

    let mut sigterm = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
        _ = sigterm.recv() => info!("received SIGTERM"),
    }

    if let Err(e) = notifier.notify_stopping() {
        debug!(error = %e, "STOPPING notification failed");
    }
    stop.send_replace(true);

    if let Err(e) = server_task.await {
        warn!(error = %e, "socket server task failed");
    }
    if let Some(poller) = poller {
        if let Err(e) = poller.await {
            warn!(error = %e, "presence poller failed");
        }
    }
    tokio::task::spawn_blocking(move || service.shutdown())
        .await
        .context("stopping command thread")?;

    info!("sfpd stopped");
    Ok(())
}

async fn poll_presence(
    platform: SysfsPlatform,
    handle: BrokerHandle,
    mut last: HashMap<String, bool>,
    interval: Duration,
    mut stopped: watch::Receiver<bool>,
) {
    let mut ticks = time::interval_at(time::Instant::now() + interval, interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticks.tick() => {
                for event in platform.poll_presence(&mut last) {
                    if handle.presence(event).is_err() {
                        return;
                    }
                }
            }
            _ = stopped_signal(&mut stopped) => return,
        }
    }
}
