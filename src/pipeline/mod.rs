//! Pipeline components: batch scheduler, worker offload, previews, archive packaging.

pub mod archive;
pub mod preview;
pub mod scheduler;
pub mod state;
pub mod worker;

pub use archive::{build_archive, generate_filename, manifest_rows, write_archive};
pub use preview::{HandleRegistry, PreviewHandle, PreviewOutcome, PreviewSampler, preview_key};
pub use scheduler::{BatchScheduler, CancelHandle, RunOutcome, RunSummary};
pub use state::Progress;
pub use worker::{WorkerMessage, spawn_worker};
