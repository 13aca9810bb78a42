//! Chunked, cancellable batch rendering.
//!
//! Items are rendered in chunks of [`CHUNK_SIZE`]. Each chunk is a rayon fork-join;
//! the boundary between chunks is the only place cancellation is observed and the
//! only place the loop yields. Results are keyed by input index, so completion
//! order inside a chunk does not matter.

use log::{debug, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::render::Renderer;
use crate::pipeline::state::Progress;
use crate::pipeline::worker::{WorkerMessage, spawn_worker};
use crate::utils::config::{CHUNK_SIZE, MAX_BATCH_SIZE};
use crate::{GenerationState, RenderOptions, ResultMap, RunPhase};

/// Per-item outcome inside one chunk: `(index, bytes or failure message)`.
pub(crate) type ItemOutcome = (usize, Result<Vec<u8>, String>);

/// Totals for one finished (completed or cancelled) run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

/// What a call to [`BatchScheduler::run`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Empty input: nothing started.
    Skipped,
    /// Another run is active on this scheduler; the request was ignored.
    Busy,
    Finished(RunSummary),
}

impl RunOutcome {
    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunOutcome::Finished(s) => Some(s),
            _ => None,
        }
    }
}

/// Cloneable handle that requests cancellation of the current run (e.g. from a Ctrl+C handler).
#[derive(Clone, Debug)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Render one item; errors and panics become a message instead of escaping.
pub(crate) fn render_isolated(renderer: &dyn Renderer, data: &str, options: &RenderOptions) -> Result<Vec<u8>, String> {
    match panic::catch_unwind(AssertUnwindSafe(|| renderer.render(data, options))) {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(format!("renderer panicked: {}", panic_message(payload.as_ref()))),
    }
}

/// The chunk loop shared by the in-thread and worker strategies.
///
/// `on_chunk(processed, outcomes)` runs after each chunk has fully settled.
/// Returns true if the loop stopped early because `cancel` was set.
pub(crate) fn run_chunks<F>(
    renderer: &dyn Renderer,
    items: &[String],
    options: &RenderOptions,
    cancel: &AtomicBool,
    mut on_chunk: F,
) -> bool
where
    F: FnMut(usize, Vec<ItemOutcome>),
{
    let total = items.len();
    for (chunk_idx, chunk) in items.chunks(CHUNK_SIZE).enumerate() {
        if cancel.load(Ordering::Relaxed) {
            debug!("Cancellation observed before chunk {}", chunk_idx + 1);
            return true;
        }
        let base = chunk_idx * CHUNK_SIZE;
        let outcomes: Vec<ItemOutcome> = chunk
            .par_iter()
            .enumerate()
            .map(|(i, data)| (base + i, render_isolated(renderer, data, options)))
            .collect();
        on_chunk((base + chunk.len()).min(total), outcomes);
        thread::yield_now();
    }
    false
}

/// Clears `active` on every exit path, including unwinding out of a hook.
struct ActiveGuard<'a> {
    state: &'a Mutex<GenerationState>,
    done: bool,
}

impl ActiveGuard<'_> {
    fn finish(mut self, cancelled: bool) -> RunSummary {
        self.done = true;
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.active = false;
        st.finish_time = Some(Instant::now());
        st.phase = if cancelled {
            RunPhase::Cancelled
        } else {
            RunPhase::Completed
        };
        RunSummary {
            total: st.total,
            succeeded: st.results.len(),
            failed: st.failed,
            cancelled,
            elapsed: st.elapsed(),
        }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let mut st = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        st.active = false;
        st.finish_time.get_or_insert_with(Instant::now);
        if st.phase == RunPhase::Running {
            st.phase = RunPhase::Cancelled;
        }
    }
}

/// Worker thread of one offloaded run. Dropped without [`join`](Self::join) (the
/// caller is unwinding), it cancels the worker and waits for it, so no render of
/// that run outlives the run's `active` flag.
struct WorkerJoin<'a> {
    cancel: &'a AtomicBool,
    handle: Option<JoinHandle<()>>,
}

impl WorkerJoin<'_> {
    /// Wait for the worker. False if it panicked.
    fn join(mut self) -> bool {
        self.handle.take().is_none_or(|h| h.join().is_ok())
    }
}

impl Drop for WorkerJoin<'_> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancel.store(true, Ordering::Relaxed);
            if handle.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
    }
}

/// Owns one [`GenerationState`] and one cancellation flag. At most one run is active at a time.
pub struct BatchScheduler {
    renderer: Arc<dyn Renderer>,
    state: Mutex<GenerationState>,
    cancel: Arc<AtomicBool>,
}

impl BatchScheduler {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            state: Mutex::new(GenerationState::default()),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, GenerationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Check-and-arm under one lock so two callers can't both start.
    fn begin(&self, total: usize) -> Option<ActiveGuard<'_>> {
        let mut st = self.lock_state();
        if st.active {
            return None;
        }
        self.cancel.store(false, Ordering::Relaxed);
        *st = GenerationState {
            active: true,
            phase: RunPhase::Running,
            current: 0,
            total,
            start_time: Some(Instant::now()),
            finish_time: None,
            failed: 0,
            results: ResultMap::new(),
        };
        Some(ActiveGuard {
            state: &self.state,
            done: false,
        })
    }

    fn scheduled<'a>(&self, items: &'a [String]) -> &'a [String] {
        if items.len() > MAX_BATCH_SIZE {
            warn!(
                "{} items supplied; only the first {} will be generated",
                items.len(),
                MAX_BATCH_SIZE
            );
        }
        &items[..items.len().min(MAX_BATCH_SIZE)]
    }

    /// Record one chunk's outcomes and return the progress after it.
    fn merge_chunk(&self, processed: usize, outcomes: Vec<ItemOutcome>) -> Progress {
        let mut st = self.lock_state();
        for (index, outcome) in outcomes {
            match outcome {
                Ok(bytes) => {
                    st.results.entry(index).or_insert(bytes);
                }
                Err(msg) => {
                    warn!("Item {} failed: {}", index + 1, msg);
                    st.failed += 1;
                }
            }
        }
        st.current = processed.min(st.total);
        Progress::from_state(&st)
    }

    /// Render `items` (first `MAX_BATCH_SIZE`) on the calling thread, one rayon chunk at a time.
    pub fn run(&self, items: &[String], options: &RenderOptions) -> RunOutcome {
        self.run_with_hook(items, options, |_| {})
    }

    /// Like [`run`](Self::run); `on_chunk` is called at every chunk boundary with fresh progress.
    pub fn run_with_hook<H>(&self, items: &[String], options: &RenderOptions, mut on_chunk: H) -> RunOutcome
    where
        H: FnMut(&Progress),
    {
        if items.is_empty() {
            debug!("Empty batch; nothing to generate");
            return RunOutcome::Skipped;
        }
        let scheduled = self.scheduled(items);
        let Some(guard) = self.begin(scheduled.len()) else {
            warn!("A batch run is already active; request ignored");
            return RunOutcome::Busy;
        };
        info!("Generating {} QR codes", scheduled.len());

        let cancelled = run_chunks(
            self.renderer.as_ref(),
            scheduled,
            options,
            &self.cancel,
            |processed, outcomes| {
                let progress = self.merge_chunk(processed, outcomes);
                on_chunk(&progress);
            },
        );
        RunOutcome::Finished(guard.finish(cancelled))
    }

    /// Same contract as [`run`](Self::run), but the chunk loop runs on a spawned worker
    /// thread and this thread applies its messages to the state.
    pub fn run_in_worker(&self, items: &[String], options: &RenderOptions) -> RunOutcome {
        self.run_in_worker_with_hook(items, options, |_| {})
    }

    pub fn run_in_worker_with_hook<H>(
        &self,
        items: &[String],
        options: &RenderOptions,
        mut on_chunk: H,
    ) -> RunOutcome
    where
        H: FnMut(&Progress),
    {
        if items.is_empty() {
            debug!("Empty batch; nothing to generate");
            return RunOutcome::Skipped;
        }
        let scheduled = self.scheduled(items);
        let Some(guard) = self.begin(scheduled.len()) else {
            warn!("A batch run is already active; request ignored");
            return RunOutcome::Busy;
        };
        info!("Generating {} QR codes on worker thread", scheduled.len());

        let (rx, handle) = spawn_worker(
            Arc::clone(&self.renderer),
            scheduled.to_vec(),
            options.clone(),
            Arc::clone(&self.cancel),
        );
        // Declared after `guard`: on unwind the worker is joined before `active` clears.
        let worker = WorkerJoin {
            cancel: &self.cancel,
            handle: Some(handle),
        };

        let mut cancelled = None;
        for msg in rx.iter() {
            match msg {
                WorkerMessage::Result { index, bytes } => {
                    self.lock_state().results.entry(index).or_insert(bytes);
                }
                WorkerMessage::Error { index, message } => {
                    warn!("Item {} failed: {}", index + 1, message);
                    self.lock_state().failed += 1;
                }
                WorkerMessage::Progress { current, .. } => {
                    let progress = {
                        let mut st = self.lock_state();
                        st.current = current.min(st.total);
                        Progress::from_state(&st)
                    };
                    on_chunk(&progress);
                }
                WorkerMessage::Complete { cancelled: c } => {
                    cancelled = Some(c);
                    break;
                }
            }
        }
        drop(rx);
        if !worker.join() {
            log::error!("Worker thread panicked");
        }
        let cancelled = cancelled.unwrap_or_else(|| {
            log::error!("Worker exited without completing; treating run as cancelled");
            true
        });
        RunOutcome::Finished(guard.finish(cancelled))
    }

    /// Request cancellation. Takes effect at the next chunk boundary; the in-flight chunk's results are kept.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancel))
    }

    pub fn progress(&self) -> Progress {
        Progress::from_state(&self.lock_state())
    }

    pub fn is_active(&self) -> bool {
        self.lock_state().active
    }

    pub fn phase(&self) -> RunPhase {
        self.lock_state().phase
    }

    pub fn snapshot(&self) -> GenerationState {
        self.lock_state().clone()
    }

    pub fn results(&self) -> ResultMap {
        self.lock_state().results.clone()
    }
}
