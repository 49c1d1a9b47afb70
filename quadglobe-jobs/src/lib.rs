#![warn(
    clippy::unwrap_used,
    clippy::cast_lossless,
    clippy::unimplemented,
    clippy::indexing_slicing,
    clippy::expect_used
)]
//! Runs asynchronous work off the frame and hands the outcomes back to the
//! owner on its next update.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::{any, future, panic, pin};

use bevy::tasks::{AsyncComputeTaskPool, TaskPool};
use bevy::utils::HashMap;
use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
pub type AsyncReturn<Output> = pin::Pin<Box<dyn future::Future<Output = Output> + Send + 'static>>;
#[cfg(target_arch = "wasm32")]
pub type AsyncReturn<Output> = pin::Pin<Box<dyn future::Future<Output = Output> + 'static>>;

pub trait Job: any::Any + Sized + Send + 'static {
    type Outcome: any::Any + Send + Sync;

    fn name(&self) -> String;

    fn perform(self, context: Context) -> AsyncReturn<Self::Outcome>;
}

/// Where spawned jobs run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// On the async compute task pool.
    #[default]
    Background,
    /// To completion inside `spawn`. Outcomes are still only visible after
    /// the next [`JobRunner::collect`].
    Inline,
}

/// Handed to every job. Cancellation is advisory: a job that notices it
/// should finish early with whatever outcome means "cancelled" to it.
#[derive(Clone)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Context {
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

pub struct JobOutcomePayload {
    pub job_outcome_type_id: any::TypeId,
    pub job_outcome: Box<dyn any::Any + Send + Sync>,
}

enum Delivery {
    Finished(JobOutcomePayload),
    /// The job's future was dropped before it produced an outcome, most
    /// likely because it panicked.
    Abandoned(any::TypeId),
}

/// Lives inside a spawned task until the job's outcome is sent. If the task
/// unwinds first, dropping it still tells the runner the job is gone.
struct InFlightGuard {
    job_name: String,
    job_type_id: any::TypeId,
    delivery_tx: async_channel::Sender<Delivery>,
    delivered: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.delivered {
            return;
        }
        bevy::log::error!("Job '{}' stopped without an outcome", self.job_name);
        let _ = self
            .delivery_tx
            .try_send(Delivery::Abandoned(self.job_type_id));
    }
}

pub struct JobRunner {
    mode: JobMode,
    delivery_tx: async_channel::Sender<Delivery>,
    delivery_recv: async_channel::Receiver<Delivery>,
    outcomes: Vec<JobOutcomePayload>,
    in_flight: HashMap<any::TypeId, usize>,
    cancelled: Arc<AtomicBool>,
    #[cfg(not(target_arch = "wasm32"))]
    runtime: Option<tokio::runtime::Runtime>,
}

impl Default for JobRunner {
    fn default() -> Self {
        Self::new(JobMode::default())
    }
}

impl JobRunner {
    pub fn new(mode: JobMode) -> Self {
        let (delivery_tx, delivery_recv) = async_channel::unbounded::<Delivery>();
        Self {
            mode,
            delivery_tx,
            delivery_recv,
            outcomes: vec![],
            in_flight: HashMap::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
            #[cfg(not(target_arch = "wasm32"))]
            runtime: None,
        }
    }

    pub fn mode(&self) -> JobMode {
        self.mode
    }

    pub fn spawn<J: Job>(&mut self, job: J) {
        let job_name = job.name();
        let job_type_id = any::TypeId::of::<J>();
        *self.in_flight.entry(job_type_id).or_insert(0) += 1;

        let context = Context {
            cancelled: self.cancelled.clone(),
        };
        let mut guard = InFlightGuard {
            job_name,
            job_type_id,
            delivery_tx: self.delivery_tx.clone(),
            delivered: false,
        };
        let task = async move {
            let instant = instant::Instant::now();
            let outcome = job.perform(context).await;
            bevy::log::trace!(
                "Completed job '{}' in {:?}",
                guard.job_name,
                instant.elapsed()
            );
            let delivery = Delivery::Finished(JobOutcomePayload {
                job_outcome_type_id: job_type_id,
                job_outcome: Box::new(outcome),
            });
            if guard.delivery_tx.send(delivery).await.is_err() {
                bevy::log::error!(
                    "Failed to send result from job {} back to main thread",
                    guard.job_name
                );
            }
            guard.delivered = true;
        };

        match self.mode {
            #[cfg(not(target_arch = "wasm32"))]
            JobMode::Inline => match self.inline_runtime() {
                Some(runtime) => {
                    let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                        runtime.block_on(task);
                    }));
                    if result.is_err() {
                        self.runtime = None;
                    }
                }
                None => spawn_background(task),
            },
            _ => spawn_background(task),
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    fn inline_runtime(&mut self) -> Option<&tokio::runtime::Runtime> {
        if self.runtime.is_none() {
            match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => self.runtime = Some(runtime),
                Err(e) => {
                    bevy::log::error!("Failed to build inline job runtime: {}", e);
                    self.mode = JobMode::Background;
                }
            }
        }
        self.runtime.as_ref()
    }

    /// Moves every outcome delivered so far into the finished list. Jobs that
    /// stopped without an outcome only stop counting as in flight.
    pub fn collect(&mut self) {
        while let Ok(delivery) = self.delivery_recv.try_recv() {
            let job_type_id = match &delivery {
                Delivery::Finished(outcome) => outcome.job_outcome_type_id,
                Delivery::Abandoned(job_type_id) => *job_type_id,
            };
            if let Some(count) = self.in_flight.get_mut(&job_type_id) {
                *count = count.saturating_sub(1);
            }
            if let Delivery::Finished(outcome) = delivery {
                self.outcomes.push(outcome);
            }
        }
    }

    /// Jobs of type `J` spawned but not yet collected.
    pub fn in_flight<J: Job>(&self) -> usize {
        self.in_flight
            .get(&any::TypeId::of::<J>())
            .copied()
            .unwrap_or_default()
    }

    pub fn finished_len(&self) -> usize {
        self.outcomes.len()
    }

    /// Signals every running job to stop. Jobs spawned afterwards are not
    /// affected.
    pub fn cancel_all(&mut self) {
        self.cancelled.store(true, Ordering::Relaxed);
        self.cancelled = Arc::new(AtomicBool::new(false));
    }

    #[inline]
    pub fn take_next<J: Job>(&mut self) -> Option<J::Outcome> {
        let index = self.outcomes.iter().position(|outcome_payload| {
            any::TypeId::of::<J>() == outcome_payload.job_outcome_type_id
                && outcome_payload.job_outcome.is::<J::Outcome>()
        })?;
        let outcome_payload = self.outcomes.remove(index);
        let outcome = outcome_payload.job_outcome.downcast::<J::Outcome>();
        if outcome.is_err() {
            bevy::log::error!("encountered unexpected job result type");
        }
        outcome.map(|n| *n).ok()
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn spawn_background(task: impl future::Future<Output = ()> + Send + 'static) {
    AsyncComputeTaskPool::init(TaskPool::default).spawn(task).detach();
}

#[cfg(target_arch = "wasm32")]
fn spawn_background(task: impl future::Future<Output = ()> + 'static) {
    AsyncComputeTaskPool::init(TaskPool::default).spawn(task).detach();
}
