//! Job execution.

pub mod cancel;
pub mod orchestrator;
pub mod progress;

pub use cancel::CancelFlag;
pub use orchestrator::JobOrchestrator;
pub use progress::{JobProgress, ProgressReporter, SubjectOutcome};
