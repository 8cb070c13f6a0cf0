//! UDP GPS listener - a [`LocationProvider`] fed by broadcast GPS sentences.
//!
//! A background task listens on a UDP port for XGPS or NMEA RMC sentences
//! (see [`protocol`]) and keeps the most recent fix. Each subscription is a
//! separate task that hands out that fix once per requested interval.
//!
//! # Setup
//!
//! Point any GPS-to-UDP bridge (phone app, `gpsd` relay, flight simulator)
//! at the configured port (default 49002).
//!
//! # Example
//!
//! ```ignore
//! let provider = UdpLocationProvider::bind(UdpLocationConfig::default()).await?;
//! let runtime = ReportingScheduler::new(config, Arc::new(provider), sink).start(id)?;
//! ```

pub mod protocol;

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::reporting::{
    FixResult, LocationFix, LocationProvider, SamplerError, SamplingRequest, Subscription,
};
use protocol::parse_datagram;

/// Default UDP port for GPS broadcasts.
pub const DEFAULT_GPS_PORT: u16 = 49002;

/// Maximum datagram size we expect.
const MAX_PACKET_SIZE: usize = 1024;

/// Queue depth of a subscription; fixes beyond it are skipped.
const SUBSCRIPTION_CAPACITY: usize = 4;

/// Listener configuration.
#[derive(Debug, Clone)]
pub struct UdpLocationConfig {
    /// UDP port to listen on.
    pub port: u16,

    /// Address to bind.
    pub bind_address: String,
}

impl Default for UdpLocationConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_GPS_PORT,
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

/// Location provider backed by a UDP GPS listener.
pub struct UdpLocationProvider {
    port: u16,
    latest: watch::Receiver<Option<LocationFix>>,
    listener: CancellationToken,
}

impl UdpLocationProvider {
    /// Bind the socket and start listening.
    ///
    /// Fails with [`SamplerError::PermissionDenied`] if the OS refuses the
    /// port, [`SamplerError::Unavailable`] for any other bind error.
    pub async fn bind(config: UdpLocationConfig) -> Result<Self, SamplerError> {
        let socket = UdpSocket::bind((config.bind_address.as_str(), config.port))
            .await
            .map_err(|e| bind_error(config.port, e))?;

        let port = socket.local_addr().map(|a| a.port()).unwrap_or(config.port);
        info!(port, "GPS listener started");

        let (latest_tx, latest) = watch::channel(None);
        let listener = CancellationToken::new();
        tokio::spawn(listen(socket, latest_tx, listener.clone()));

        Ok(Self {
            port,
            latest,
            listener,
        })
    }

    /// Port actually bound (useful when configured with port 0).
    pub fn port(&self) -> u16 {
        self.port
    }

    fn listener_alive(&self) -> bool {
        !self.listener.is_cancelled() && self.latest.has_changed().is_ok()
    }
}

impl Drop for UdpLocationProvider {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}

impl LocationProvider for UdpLocationProvider {
    fn subscribe(&self, request: SamplingRequest) -> Result<Subscription, SamplerError> {
        if !self.listener_alive() {
            return Err(SamplerError::Unavailable("GPS listener stopped".to_string()));
        }

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_CAPACITY);
        let cancel = self.listener.child_token();
        tokio::spawn(emit_fixes(request, self.latest.clone(), tx, cancel.clone()));

        Ok(Subscription::new(rx, cancel))
    }

    fn last_location(
        &self,
    ) -> impl Future<Output = Result<Option<LocationFix>, SamplerError>> + Send {
        let latest = *self.latest.borrow();
        std::future::ready(Ok(latest))
    }
}

fn bind_error(port: u16, e: io::Error) -> SamplerError {
    warn!(port, error = %e, "Failed to bind GPS listener");
    match e.kind() {
        io::ErrorKind::PermissionDenied => SamplerError::PermissionDenied,
        _ => SamplerError::Unavailable(format!("failed to bind UDP port {}: {}", port, e)),
    }
}

/// Receive loop: keep the newest parsed fix in `latest`.
async fn listen(
    socket: UdpSocket,
    latest: watch::Sender<Option<LocationFix>>,
    cancel: CancellationToken,
) {
    let mut buffer = [0u8; MAX_PACKET_SIZE];
    let mut packets_received: u64 = 0;
    let mut fixes_parsed: u64 = 0;

    loop {
        let received = tokio::select! {
            _ = cancel.cancelled() => break,
            r = socket.recv(&mut buffer) => r,
        };

        match received {
            Ok(len) => {
                packets_received += 1;
                match parse_datagram(&buffer[..len]) {
                    Some(fix) => {
                        fixes_parsed += 1;
                        if fixes_parsed == 1 {
                            info!(lat = fix.latitude, lon = fix.longitude, "First GPS fix received");
                        } else {
                            trace!(lat = fix.latitude, lon = fix.longitude, "GPS fix");
                        }
                        latest.send_replace(Some(fix));
                    }
                    None if packets_received <= 5 => {
                        let preview = String::from_utf8_lossy(&buffer[..len.min(50)]);
                        debug!(packet_num = packets_received, preview = %preview, "Failed to parse GPS packet");
                    }
                    None => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "UDP receive error");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }

    info!(packets_received, fixes_parsed, "GPS listener stopped");
}

/// Subscription loop: forward the latest fix once per interval.
///
/// The first tick fires immediately. Intervals with no fix yet are skipped.
async fn emit_fixes(
    request: SamplingRequest,
    latest: watch::Receiver<Option<LocationFix>>,
    tx: mpsc::Sender<FixResult>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(request.interval.max(request.min_update_interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tx.closed() => break,
            _ = ticker.tick() => {}
        }

        if latest.has_changed().is_err() {
            debug!("GPS listener gone, closing subscription");
            break;
        }

        let Some(fix) = *latest.borrow() else {
            trace!("No GPS fix yet");
            continue;
        };
        if tx.try_send(Ok(fix)).is_err() {
            trace!("Subscriber lagging, fix skipped");
        }
    }
}
