//! Binary-side helpers: terminal setup, progress display and run summary.

pub(crate) mod progress_manager;
pub(crate) mod summary;
pub(crate) mod terminal;
