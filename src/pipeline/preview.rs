//! Preview sampler: small thumbnails of the first few items.
//!
//! Every thumbnail is held by a [`PreviewHandle`] counted in a [`HandleRegistry`];
//! dropping the handle releases it. A new request supersedes the previous one:
//! the old handles are released, and a render still in flight for a superseded
//! request drops whatever it produced instead of publishing it.

use log::debug;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::RenderOptions;
use crate::engine::render::Renderer;
use crate::pipeline::scheduler::render_isolated;
use crate::utils::config::PreviewConsts;

/// Acquire/release counters for preview handles.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl HandleRegistry {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.acquired() - self.released()
    }
}

/// One thumbnail. Released exactly once, on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    index: usize,
    bytes: Vec<u8>,
    registry: Arc<HandleRegistry>,
}

impl PreviewHandle {
    fn acquire(registry: &Arc<HandleRegistry>, index: usize, bytes: Vec<u8>) -> Self {
        registry.acquired.fetch_add(1, Ordering::SeqCst);
        Self {
            index,
            bytes,
            registry: Arc::clone(registry),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.registry.released.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// Same key as the published set; nothing re-rendered.
    Unchanged,
    /// New set published with this many thumbnails.
    Rendered(usize),
    /// A newer request or `clear()` arrived mid-render; nothing published.
    Superseded,
}

#[derive(Default)]
struct PreviewSet {
    key: Option<String>,
    handles: Vec<PreviewHandle>,
}

/// Identity of a preview set: the leading items plus every style field that changes the pixels.
pub fn preview_key(items: &[String], options: &RenderOptions) -> String {
    let sep = PreviewConsts::KEY_SEPARATOR;
    let head = &items[..items.len().min(PreviewConsts::COUNT)];
    format!(
        "{}{sep}{}{sep}{}{sep}{:?}{sep}{:?}{sep}{:?}",
        head.join(sep),
        options.fg_color,
        options.bg_color,
        options.dot_style,
        options.corner_style,
        options.error_correction,
    )
}

pub struct PreviewSampler {
    renderer: Arc<dyn Renderer>,
    registry: Arc<HandleRegistry>,
    generation: AtomicU64,
    current: Mutex<PreviewSet>,
}

impl PreviewSampler {
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self {
            renderer,
            registry: Arc::new(HandleRegistry::default()),
            generation: AtomicU64::new(0),
            current: Mutex::new(PreviewSet::default()),
        }
    }

    fn lock_current(&self) -> MutexGuard<'_, PreviewSet> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// Render thumbnails for the first `PreviewConsts::COUNT` items unless the key is unchanged.
    pub fn request(&self, items: &[String], options: &RenderOptions) -> PreviewOutcome {
        let key = preview_key(items, options);
        let generation = {
            let mut current = self.lock_current();
            if current.key.as_deref() == Some(key.as_str()) {
                return PreviewOutcome::Unchanged;
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            current.key = Some(key);
            current.handles.clear();
            generation
        };
        let superseded = || self.generation.load(Ordering::SeqCst) != generation;

        let thumb_opts = options.resized(PreviewConsts::SIZE, PreviewConsts::MARGIN);
        let mut fresh = Vec::new();
        for (index, data) in items.iter().take(PreviewConsts::COUNT).enumerate() {
            if superseded() {
                debug!("Preview generation {} superseded mid-render", generation);
                return PreviewOutcome::Superseded;
            }
            match render_isolated(self.renderer.as_ref(), data, &thumb_opts) {
                Ok(bytes) => fresh.push(PreviewHandle::acquire(&self.registry, index, bytes)),
                Err(e) => debug!("Preview {} skipped: {}", index + 1, e),
            }
        }

        let mut current = self.lock_current();
        if superseded() {
            debug!("Preview generation {} superseded before publish", generation);
            return PreviewOutcome::Superseded;
        }
        let n = fresh.len();
        current.handles = fresh;
        PreviewOutcome::Rendered(n)
    }

    /// Published thumbnails as `(index, png bytes)`.
    pub fn thumbnails(&self) -> Vec<(usize, Vec<u8>)> {
        self.lock_current()
            .handles
            .iter()
            .map(|h| (h.index(), h.bytes().to_vec()))
            .collect()
    }

    /// Release every handle and forget the key. Supersedes any render in flight.
    pub fn clear(&self) {
        let mut current = self.lock_current();
        self.generation.fetch_add(1, Ordering::SeqCst);
        current.key = None;
        current.handles.clear();
    }
}

impl Drop for PreviewSampler {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::render::RenderError;
    use crossbeam_channel::{Receiver, Sender, bounded};
    use std::thread;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn echo() -> Arc<dyn Renderer> {
        Arc::new(|d: &str, _: &RenderOptions| -> Result<Vec<u8>, RenderError> {
            Ok(d.as_bytes().to_vec())
        })
    }

    #[test]
    fn test_only_first_five_and_key_reuse() {
        let sampler = PreviewSampler::new(echo());
        let items = strings(&["a", "b", "c", "d", "e", "f", "g"]);
        let opts = RenderOptions::default();
        assert_eq!(sampler.request(&items, &opts), PreviewOutcome::Rendered(5));
        assert_eq!(sampler.request(&items, &opts), PreviewOutcome::Unchanged);
        assert_eq!(sampler.registry().live(), 5);

        let thumbs = sampler.thumbnails();
        assert_eq!(thumbs.len(), 5);
        assert_eq!(thumbs[4], (4, b"e".to_vec()));
    }

    #[test]
    fn test_style_change_regenerates_and_releases() {
        let sampler = PreviewSampler::new(echo());
        let items = strings(&["a", "b"]);
        let mut opts = RenderOptions::default();
        sampler.request(&items, &opts);
        opts.fg_color = "#123456".parse().unwrap();
        assert_eq!(sampler.request(&items, &opts), PreviewOutcome::Rendered(2));
        let reg = Arc::clone(sampler.registry());
        assert_eq!((reg.acquired(), reg.released()), (4, 2));
        sampler.clear();
        assert_eq!(reg.live(), 0);
    }

    #[test]
    fn test_panicking_render_skips_only_that_thumbnail() {
        let renderer: Arc<dyn Renderer> =
            Arc::new(|d: &str, _: &RenderOptions| -> Result<Vec<u8>, RenderError> {
                if d == "b" {
                    panic!("bad thumbnail");
                }
                Ok(d.as_bytes().to_vec())
            });
        let sampler = PreviewSampler::new(renderer);
        let items = strings(&["a", "b", "c"]);
        let opts = RenderOptions::default();
        assert_eq!(sampler.request(&items, &opts), PreviewOutcome::Rendered(2));

        // Same key again: the published set is still there.
        assert_eq!(sampler.request(&items, &opts), PreviewOutcome::Unchanged);
        let indices: Vec<usize> = sampler.thumbnails().iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 2]);
        assert_eq!(sampler.registry().live(), 2);
    }

    #[test]
    fn test_key_ignores_items_past_preview_count() {
        let opts = RenderOptions::default();
        let a = strings(&["1", "2", "3", "4", "5", "6"]);
        let b = strings(&["1", "2", "3", "4", "5", "changed"]);
        assert_eq!(preview_key(&a, &opts), preview_key(&b, &opts));
    }

    #[test]
    fn test_in_flight_render_is_dropped_when_superseded() {
        let (entered_tx, entered_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let (go_tx, go_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let renderer: Arc<dyn Renderer> =
            Arc::new(move |d: &str, _: &RenderOptions| -> Result<Vec<u8>, RenderError> {
                if d == "slow" {
                    let _ = entered_tx.send(());
                    let _ = go_rx.recv();
                }
                Ok(d.as_bytes().to_vec())
            });
        let sampler = Arc::new(PreviewSampler::new(renderer));
        let opts = RenderOptions::default();

        let s = Arc::clone(&sampler);
        let o = opts.clone();
        let slow = thread::spawn(move || s.request(&strings(&["slow", "x"]), &o));

        entered_rx.recv().unwrap();
        assert_eq!(
            sampler.request(&strings(&["fast"]), &opts),
            PreviewOutcome::Rendered(1)
        );
        go_tx.send(()).unwrap();
        assert_eq!(slow.join().unwrap(), PreviewOutcome::Superseded);

        assert_eq!(sampler.thumbnails(), vec![(0, b"fast".to_vec())]);
        let reg = Arc::clone(sampler.registry());
        assert_eq!(reg.live(), 1);
        sampler.clear();
        assert_eq!(reg.acquired(), reg.released());
    }
}
