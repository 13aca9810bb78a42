//! Worker-offload strategy: the chunk loop on a dedicated thread, reporting over a channel.

use crossbeam_channel::{Receiver, unbounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crate::RenderOptions;
use crate::engine::render::Renderer;
use crate::pipeline::scheduler::run_chunks;

/// Messages from the worker. Per chunk: one `Result`/`Error` per item, then one `Progress`.
/// `Complete` is always last.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerMessage {
    Progress { current: usize, total: usize },
    Result { index: usize, bytes: Vec<u8> },
    Error { index: usize, message: String },
    Complete { cancelled: bool },
}

/// Spawn the chunk loop over `items` on a new thread.
///
/// `cancel` is polled at chunk boundaries. If the receiver is dropped the worker
/// sets `cancel` itself and stops after the current chunk.
pub fn spawn_worker(
    renderer: Arc<dyn Renderer>,
    items: Vec<String>,
    options: RenderOptions,
    cancel: Arc<AtomicBool>,
) -> (Receiver<WorkerMessage>, JoinHandle<()>) {
    let (tx, rx) = unbounded();
    let handle = thread::spawn(move || {
        let total = items.len();
        let send = |msg: WorkerMessage| {
            if tx.send(msg).is_err() {
                cancel.store(true, Ordering::Relaxed);
            }
        };
        let cancelled = run_chunks(
            renderer.as_ref(),
            &items,
            &options,
            &cancel,
            |processed, outcomes| {
                for (index, outcome) in outcomes {
                    send(match outcome {
                        Ok(bytes) => WorkerMessage::Result { index, bytes },
                        Err(message) => WorkerMessage::Error { index, message },
                    });
                }
                send(WorkerMessage::Progress {
                    current: processed,
                    total,
                });
            },
        );
        send(WorkerMessage::Complete { cancelled });
    });
    (rx, handle)
}
