mod ids;
mod progress;
mod session;
mod state;

pub use ids::{ContentId, ParseIdError, SessionId};
pub use progress::{ProgressError, ProgressPercent, ScrollGeometry, Visibility};
pub use session::ReadingSession;
pub use state::SessionState;
