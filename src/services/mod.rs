//! Service modules for progress reporting and output encoding

pub mod format;
pub mod progress;

pub use format::OutputEncoder;
pub use progress::{LogProgressSink, NoOpProgressSink, ProgressEvent, ProgressSink, ProgressStream};
