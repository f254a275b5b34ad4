mod gate;
mod lifecycle;
mod poller;
mod reader_view;
mod worker;

// Public API of the tracking subsystem.
pub use gate::SyncGate;
pub use lifecycle::ReadingTracker;
pub use poller::{PollerHandle, ProgressPoller, ReaderEvent, Sample, SampleTrigger, Viewport};
pub use reader_view::ReaderView;
pub use worker::{SyncCommand, SyncHandle, SyncReport};
