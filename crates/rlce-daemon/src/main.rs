//! rlce-daemon entry point.
//!
//! Thin: tracing, environment, boot, then the enforcement loop until
//! Ctrl-C. SIGHUP reloads the route profile. The boot steps live in the
//! library target.

use std::sync::Arc;

use anyhow::{bail, Context};
use rlce_daemon::boot;
use rlce_daemon::env::DaemonEnv;
use rlce_profile::ProfileStore;
use rlce_runtime::{Clock, RuntimeSettings, SystemClock, TracingAlarmSink};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Production injects env
    // vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let env = DaemonEnv::from_env()?;
    let cfg = boot::load_config(&env.config_paths)?;
    let settings = RuntimeSettings::from_config(&cfg.enforcement);

    let profiles = Arc::new(ProfileStore::new());
    boot::load_profile(&profiles, &env.profile_path)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let radio = match &env.trace_path {
        Some(path) => boot::trace_radio(
            path,
            Arc::clone(&clock),
            &settings,
            shutdown_rx.clone(),
        )?,
        None => bail!(
            "no radio binding configured: set RLCE_TRACE for bench replay, or link a \
             ModemPort implementation for the vehicle modem"
        ),
    };

    // Traffic off before the event log or state file is touched.
    boot::fence_radio(&radio, settings.io_timeout).await;

    let mut enforcer = boot::assemble(
        &cfg,
        Arc::clone(&profiles),
        &radio,
        Arc::new(TracingAlarmSink),
        clock.now_ms(),
    )?;

    // Again through the enforcer, which records the fence in its state.
    if let Err(e) = enforcer.fence().await {
        warn!(error = %e, "initial fence failed; retried on every tick");
    }

    #[cfg(unix)]
    let reloader = boot::spawn_profile_reloader(
        Arc::clone(&profiles),
        env.profile_path.clone(),
        shutdown_rx.clone(),
    )?;

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown requested"),
            Err(e) => error!(error = %e, "signal handler failed; shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    let (_, summary) = rlce_runtime::run(
        enforcer,
        Arc::clone(&clock),
        settings.tick_interval,
        shutdown_rx,
    )
    .await;

    if let Some(producer) = radio.producer {
        producer.await.context("position producer panicked")?;
    }
    #[cfg(unix)]
    reloader.await.context("profile reloader panicked")?;
    info!(ticks = summary.ticks, "rlce-daemon exited");
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
