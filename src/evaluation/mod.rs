pub mod correlator;
pub mod progress;

pub use correlator::{EvaluationCorrelator, Resolution, SettleTicket};
pub use progress::ProgressEvent;
