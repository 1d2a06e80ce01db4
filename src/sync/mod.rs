pub mod events;
pub mod sequence;
pub mod session;

pub use events::{SyncEvent, SyncEventKind, SyncOperation};
pub use sequence::{SequenceTracker, SyncKey, Ticket};
pub use session::SurveySession;
