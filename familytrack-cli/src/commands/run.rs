//! Run command - start reporting and feed host signals into it.
//!
//! The command owns a tokio runtime for the lifetime of the reporting core
//! and translates host events into calls on the reporting handle:
//!
//! | Host event           | Action                              |
//! |----------------------|-------------------------------------|
//! | `SIGUSR1`            | SOS                                 |
//! | `SIGUSR2`            | SIM change check                    |
//! | battery poll tick    | status report, low-battery burst    |
//! | `SIGINT` / `SIGTERM` | shutdown                            |

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use familytrack::config::ConfigFile;
use familytrack::location::UdpLocationProvider;
use familytrack::observers::{
    should_start_on_boot, BatteryObserver, FileSimReader, SimCheck, SimChangeObserver,
    SysfsBattery,
};
use familytrack::preferences::{IniPreferences, PreferenceStore};
use familytrack::reporting::{ReportingHandle, ReportingScheduler, RestSink};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the run command.
#[derive(Debug, Default)]
pub struct RunArgs {
    pub debug: bool,
    pub on_boot: bool,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let runner = CliRunner::with_debug(args.debug)?;
    runner.log_startup("run");

    let prefs: Arc<dyn PreferenceStore> = Arc::new(IniPreferences::open_default());
    if args.on_boot && !should_start_on_boot(prefs.as_ref()) {
        info!("No device id stored, not starting on boot");
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::Runtime(e.to_string()))?;

    runtime.block_on(serve(runner.config(), prefs))
}

async fn serve(config: &ConfigFile, prefs: Arc<dyn PreferenceStore>) -> Result<(), CliError> {
    let sink = RestSink::new(config.sink_config()?).map_err(CliError::Sink)?;
    let provider = UdpLocationProvider::bind(config.location_config())
        .await
        .map_err(CliError::Location)?;

    let device_id = prefs.device_id()?;
    let reporting = ReportingScheduler::new(
        config.reporting_config(),
        Arc::new(provider),
        Arc::new(sink),
    )
    .start(device_id.as_deref())?;
    let handle = reporting.handle();
    let stopped = reporting.shutdown_token();

    let sim = sim_observer(config, &handle, &prefs);
    if let Some(observer) = &sim {
        check_sim(observer);
    }

    let battery = battery_observer(config, &handle);
    let mut battery_ticker = tokio::time::interval(Duration::from_secs(
        config.battery.poll_interval_secs.max(1),
    ));
    battery_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sos = signal(SignalKind::user_defined1()).map_err(signal_error)?;
    let mut sim_ready = signal(SignalKind::user_defined2()).map_err(signal_error)?;
    let mut terminate = signal(SignalKind::terminate()).map_err(signal_error)?;

    println!("Reporting started. Send SIGUSR1 for SOS, Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = stopped.cancelled() => break,

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupt received");
                break;
            }

            _ = terminate.recv() => {
                info!("SIGTERM received");
                break;
            }

            _ = sos.recv() => {
                info!("SOS requested");
                handle.trigger_sos();
            }

            _ = sim_ready.recv() => match &sim {
                Some(observer) => check_sim(observer),
                None => warn!("SIM check requested but [sim] serial_file is not set"),
            },

            _ = battery_ticker.tick(), if battery.is_some() => {
                if let Some((observer, source)) = &battery {
                    observer.poll(source);
                }
            }
        }
    }

    reporting.shutdown().await.map_err(CliError::Stopped)?;
    println!("Reporting stopped.");
    Ok(())
}

fn sim_observer(
    config: &ConfigFile,
    handle: &ReportingHandle,
    prefs: &Arc<dyn PreferenceStore>,
) -> Option<SimChangeObserver<ReportingHandle>> {
    let path = config.sim.serial_file.as_ref()?;
    info!(path = %path.display(), "SIM change detection enabled");
    Some(SimChangeObserver::new(
        handle.clone(),
        Arc::new(FileSimReader::new(path)),
        Arc::clone(prefs),
    ))
}

fn battery_observer(
    config: &ConfigFile,
    handle: &ReportingHandle,
) -> Option<(BatteryObserver<ReportingHandle>, SysfsBattery)> {
    if config.battery.device.is_empty() {
        return None;
    }
    info!(
        device = %config.battery.device,
        threshold = config.battery.threshold,
        "Battery monitoring enabled"
    );
    Some((
        BatteryObserver::new(handle.clone()).with_threshold(config.battery.threshold),
        SysfsBattery::new(&config.battery.device),
    ))
}

fn check_sim(observer: &SimChangeObserver<ReportingHandle>) {
    match observer.on_sim_ready() {
        Ok(SimCheck::Changed { previous, current }) => {
            warn!(%previous, %current, "SIM card changed");
        }
        Ok(SimCheck::Removed { previous }) => warn!(%previous, "SIM card removed"),
        Ok(outcome) => info!(?outcome, "SIM check complete"),
        Err(e) => error!(error = %e, "SIM check failed"),
    }
}

fn signal_error(e: std::io::Error) -> CliError {
    CliError::Runtime(format!("Failed to set signal handler: {}", e))
}
