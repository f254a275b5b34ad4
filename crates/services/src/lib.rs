#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod remote;
pub mod tracking;
mod tracking_services;

pub use readltr_core::Clock;

pub use config::TrackerConfig;
pub use error::{ConfigError, TrackingServicesError};
pub use remote::{HttpSessionStore, RemoteConfig};
pub use tracking::{
    PollerHandle, ProgressPoller, ReaderEvent, ReaderView, ReadingTracker, Sample, SampleTrigger,
    SyncCommand, SyncGate, SyncHandle, SyncReport, Viewport,
};
pub use tracking_services::TrackingServices;
