//! Adaptive location reporting.
//!
//! The device samples its position on a slow cadence (normal mode) and
//! switches to a fast cadence (burst mode) for a bounded time after a
//! safety-relevant trigger such as the panic button, a critically low
//! battery, or a SIM swap. Samples are tagged with the reason for the
//! current mode and pushed to a remote [`Sink`].
//!
//! # Components
//!
//! - [`ModeController`] - the Normal/Burst state machine
//! - [`Sampler`] - single-subscription wrapper over a [`LocationProvider`]
//! - [`Sink`] - fire-and-forget delivery, [`RestSink`] for the hosted backend
//! - [`ReportingScheduler`] - wires the above into one owning task and hands
//!   out a [`ReportingHandle`] for external triggers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use familytrack::reporting::{ReportingConfig, ReportingScheduler, RestSink, RestSinkConfig};
//!
//! let sink = Arc::new(RestSink::new(RestSinkConfig::new(url, api_key))?);
//! let runtime = ReportingScheduler::new(ReportingConfig::default(), provider, sink)
//!     .start(Some("3f2b8c1e-9a4d-4e7b-8c2a-1d5e6f7a8b9c"))?;
//!
//! runtime.handle().trigger_sos();
//! ```

mod mode;
mod model;
mod sampler;
mod scheduler;
mod sink;

pub use mode::{
    ModeChange, ModeController, ReportingConfig, ReportingMode, DEFAULT_BURST_DURATION,
    DEFAULT_BURST_INTERVAL, DEFAULT_NORMAL_INTERVAL,
};
pub use model::{
    AlertRecord, DeviceStatus, LocationFix, LocationSample, EVENT_LOW_BATTERY, EVENT_NORMAL,
    EVENT_SIM_CHANGE, EVENT_SOS, SOS_MESSAGE,
};
pub use sampler::{
    FixResult, LocationProvider, Sampler, SamplerError, SamplingRequest, Subscription,
};
pub use scheduler::{
    ReportingHandle, ReportingRuntime, ReportingScheduler, SchedulerError, StartError,
};
pub use sink::{deliver, Delivery, RestSink, RestSinkConfig, Sink, SinkError, DEFAULT_SINK_TIMEOUT};
