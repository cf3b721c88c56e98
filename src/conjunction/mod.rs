mod analysis;
mod kdtree;
mod minimize;
mod pruner;
mod screening;
mod types;

pub use screening::{ScreeningEngine, ScreeningError, ScreeningStatus, ScreeningSummary};
pub use types::{EventType, ScreeningParams};
