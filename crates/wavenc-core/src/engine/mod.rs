//! Scan, dispatch and status tracking for encode runs.

pub mod dispatcher;
pub mod scan;
pub mod status;

pub use dispatcher::{CancelHandle, Dispatcher, RunState, RunSummary};
pub use scan::scan_directory;
pub use status::{StatusEvent, StatusLog};
