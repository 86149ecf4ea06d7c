//! Background rendering of thumbnails and peak images.
//!
//! Jobs work on a [`ClipSnapshot`] taken when they are scheduled, never on
//! the live sequence, so edits can go on while they run. Results come back
//! as [`RenderEvent`]s that the owning thread polls.

use crossbeam_channel::{Receiver, Sender};
use cutline_core::{CutlineError, Pts, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clip::{Clip, ClipId};
use crate::config::EditConfig;
use crate::sequence::Sequence;

/// Handle of a scheduled render job.
pub type JobId = u64;

/// Immutable copy of a clip and its place in the sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipSnapshot {
    pub sequence: Uuid,
    pub track: Uuid,
    pub left: Pts,
    pub clip: Clip,
}

impl ClipSnapshot {
    pub fn capture(sequence: &Sequence, clip: ClipId) -> Result<Self> {
        let location = sequence.require_clip(clip)?;
        let track = sequence.require_track(location.track)?;
        Ok(Self {
            sequence: sequence.id,
            track: location.track,
            left: track.left_pts(location.index),
            clip: track.clips()[location.index].clone(),
        })
    }

    /// Whether the clip's media is missing.
    pub fn is_offline(&self) -> bool {
        self.clip.as_source().is_some_and(|source| source.is_offline())
    }
}

/// Handle for aborting an in-flight render.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal abort.
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Check if aborted. Renderers poll this between units of work.
    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Produces the rendered bytes for a clip (a thumbnail, a peak image).
pub trait Renderer: Send + Sync {
    fn render(&self, snapshot: &ClipSnapshot, abort: &AbortHandle) -> Result<Vec<u8>>;
}

/// Completion of a render job.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    Finished {
        job: JobId,
        clip: ClipId,
        data: Vec<u8>,
    },
    Failed {
        job: JobId,
        clip: ClipId,
        error: String,
    },
    Aborted {
        job: JobId,
        clip: ClipId,
    },
}

impl RenderEvent {
    pub fn job(&self) -> JobId {
        match self {
            Self::Finished { job, .. } | Self::Failed { job, .. } | Self::Aborted { job, .. } => {
                *job
            }
        }
    }
}

struct Job {
    id: JobId,
    snapshot: ClipSnapshot,
    abort: AbortHandle,
}

type InFlight = Arc<Mutex<HashMap<JobId, AbortHandle>>>;

/// Pool of render threads.
pub struct RenderWorker {
    jobs: Option<Sender<Job>>,
    completions: Receiver<RenderEvent>,
    in_flight: InFlight,
    threads: Vec<JoinHandle<()>>,
    next_job: JobId,
}

impl RenderWorker {
    /// Start `threads` render threads (at least one).
    pub fn new(renderer: Arc<dyn Renderer>, threads: usize) -> Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();
        let (done_tx, done_rx) = crossbeam_channel::unbounded::<RenderEvent>();
        let in_flight: InFlight = Arc::default();

        let count = threads.max(1);
        let mut handles = Vec::with_capacity(count);
        for index in 0..count {
            let jobs = job_rx.clone();
            let done = done_tx.clone();
            let in_flight = Arc::clone(&in_flight);
            let renderer = Arc::clone(&renderer);
            let handle = thread::Builder::new()
                .name(format!("render-worker-{index}"))
                .spawn(move || worker_main(renderer.as_ref(), &jobs, &done, &in_flight))?;
            handles.push(handle);
        }
        info!(threads = count, "render worker started");

        Ok(Self {
            jobs: Some(job_tx),
            completions: done_rx,
            in_flight,
            threads: handles,
            next_job: 1,
        })
    }

    pub fn from_config(renderer: Arc<dyn Renderer>, config: &EditConfig) -> Result<Self> {
        Self::new(renderer, config.worker_threads)
    }

    /// Queue a render of `clip` as it is now.
    pub fn schedule(&mut self, sequence: &Sequence, clip: ClipId) -> Result<JobId> {
        let snapshot = ClipSnapshot::capture(sequence, clip)?;
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| CutlineError::Internal("render worker is shut down".into()))?;
        let id = self.next_job;
        self.next_job += 1;
        let abort = AbortHandle::new();
        self.in_flight.lock().insert(id, abort.clone());
        jobs.send(Job {
            id,
            snapshot,
            abort,
        })
        .map_err(|_| CutlineError::Internal("render threads are gone".into()))?;
        debug!(job = id, %clip, "render scheduled");
        Ok(id)
    }

    /// Ask a queued or running job to stop. Returns `false` if it already
    /// finished.
    pub fn abort(&self, job: JobId) -> bool {
        match self.in_flight.lock().get(&job) {
            Some(handle) => {
                handle.abort();
                debug!(job, "render abort requested");
                true
            }
            None => false,
        }
    }

    pub fn abort_all(&self) {
        for handle in self.in_flight.lock().values() {
            handle.abort();
        }
    }

    /// Jobs queued or running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Drain the completions that arrived so far, without blocking.
    pub fn poll_completed(&self) -> Vec<RenderEvent> {
        self.completions.try_iter().collect()
    }

    /// Block until the next completion or the timeout.
    pub fn wait_completed(&self, timeout: Duration) -> Option<RenderEvent> {
        self.completions.recv_timeout(timeout).ok()
    }

    /// Abort what is left and join the threads.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(jobs) = self.jobs.take() else {
            return;
        };
        self.abort_all();
        drop(jobs);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("render thread panicked");
            }
        }
        info!("render worker stopped");
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_main(
    renderer: &dyn Renderer,
    jobs: &Receiver<Job>,
    done: &Sender<RenderEvent>,
    in_flight: &Mutex<HashMap<JobId, AbortHandle>>,
) {
    for job in jobs.iter() {
        let clip = job.snapshot.clip.id;
        let event = if job.abort.is_aborted() {
            RenderEvent::Aborted { job: job.id, clip }
        } else {
            match renderer.render(&job.snapshot, &job.abort) {
                _ if job.abort.is_aborted() => RenderEvent::Aborted { job: job.id, clip },
                Ok(data) => RenderEvent::Finished {
                    job: job.id,
                    clip,
                    data,
                },
                Err(e) => {
                    warn!(job = job.id, %clip, error = %e, "render failed");
                    RenderEvent::Failed {
                        job: job.id,
                        clip,
                        error: e.to_string(),
                    }
                }
            }
        };
        in_flight.lock().remove(&job.id);
        if done.send(event).is_err() {
            debug!("completion channel closed, render thread exiting");
            return;
        }
    }
}
