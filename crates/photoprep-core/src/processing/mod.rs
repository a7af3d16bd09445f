//! Image processing: single-flight submission, credit reconciliation and
//! result download.

mod coordinator;
mod download;
mod inflight;

pub use coordinator::{ProcessOutcome, ProcessingCoordinator};
pub use download::{DirectoryTarget, SaveTarget, download_file_name};
pub use inflight::{InFlight, InFlightGuard};
