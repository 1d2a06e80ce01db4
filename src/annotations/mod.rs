pub mod overlay;

pub use overlay::{AnnotationOverlay, Upsert};
