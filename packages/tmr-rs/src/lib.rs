pub mod analyses;
pub mod config;
pub mod error;
pub mod events;
pub mod plot;
pub mod recording;
pub mod rem;
pub mod respiration;
pub mod segments;
pub mod signal;
pub mod staging;
pub mod stats;
pub mod table;
#[doc(hidden)]
pub mod testing;
pub mod types;

pub use config::AnalysisPaths;
pub use error::{Result, TmrError};
pub use events::{Event, EventTable};
pub use recording::{Annotation, Recording, RecordingInfo};
pub use types::*;
