//! Live refresh of run lists while extractions are in flight.

mod controller;
mod poller;
mod source;

pub use controller::{seconds_ago_label, ApplyOutcome, LiveRefreshController, RefreshSnapshot};
pub use poller::{LiveRefresh, RefreshTimers};
pub use source::{DocumentSource, RunSource};
