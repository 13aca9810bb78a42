//! qrbulk: bulk QR-code generation with chunked, cancellable rendering and zip packaging

pub mod engine;
pub mod input;
pub mod payload;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use engine::render::{QrRenderer, RenderError, Renderer};
pub use input::{NormalizedInput, TabularPlan};
pub use payload::QrData;
pub use pipeline::{BatchScheduler, Progress, RunOutcome, RunSummary};

use log::debug;

/// Result alias used by public qrbulk API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Normalized items plus, for CSV input, the type and column mapping that produced them.
#[derive(Clone, Debug)]
pub struct PreparedInput {
    pub input: NormalizedInput,
    pub plan: Option<TabularPlan>,
}

/// Outcome of one bulk run and the archive built from whatever it rendered.
#[derive(Clone, Debug)]
pub struct BulkReport {
    pub outcome: RunOutcome,
    pub archive: Vec<u8>,
}

/// Turn raw input text into payload items according to `opts.mode` (text when unset).
pub fn prepare_input(text: &str, opts: &BulkOpts) -> Result<PreparedInput> {
    match opts.mode.unwrap_or(BulkMode::Text) {
        BulkMode::Text => Ok(PreparedInput {
            input: input::normalize_lines(text),
            plan: None,
        }),
        BulkMode::Csv => {
            let csv = input::parse_csv(text)?;
            let plan = input::plan_tabular(&csv, opts.qr_type, &opts.column_overrides);
            debug!("Tabular plan: {:?}", plan);
            Ok(PreparedInput {
                input: input::normalize_tabular(&csv, &plan),
                plan: Some(plan),
            })
        }
    }
}

/// Single entry point: render `input` on `scheduler` and package the results.
///
/// - **`on_chunk: None`** → plain run.
/// - **`on_chunk: Some(f)`** → `f` is called at every chunk boundary with current progress (keep it fast).
///
/// `opts.use_worker` selects the worker-thread strategy. Cancellation (via
/// [`BatchScheduler::cancel_handle`]) still yields an archive of the partial results.
/// Fails only if another run is active on `scheduler` or packaging fails.
pub fn generate_archive<F>(
    scheduler: &BatchScheduler,
    input: &NormalizedInput,
    opts: &BulkOpts,
    on_chunk: Option<F>,
) -> Result<BulkReport>
where
    F: FnMut(&Progress),
{
    let config_str = format!(
        "{} CONFIG:{:#?}",
        utils::PackagePaths::get().pkg_name().to_uppercase(),
        opts
    );
    debug!("{}", config_str);

    let mut hook = on_chunk;
    let mut call = |p: &Progress| {
        if let Some(ref mut f) = hook {
            f(p);
        }
    };
    let outcome = if opts.use_worker {
        scheduler.run_in_worker_with_hook(&input.items, &opts.render, &mut call)
    } else {
        scheduler.run_with_hook(&input.items, &opts.render, &mut call)
    };
    if outcome == RunOutcome::Busy {
        anyhow::bail!("a batch run is already active on this scheduler");
    }

    let results = if outcome == RunOutcome::Skipped {
        ResultMap::new()
    } else {
        scheduler.results()
    };
    let archive = pipeline::build_archive(&results, input.scheduled(), opts.filename_policy)?;
    Ok(BulkReport { outcome, archive })
}
