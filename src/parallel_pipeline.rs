// THEORY:
// Sessions share no mutable state, so the engine scales out by running many of them
// at once. This module provides the two async shapes that callers ask for:
//
// 1.  **`SessionPool`**: a fixed set of worker tasks, one per CPU by default, fed by a
//     single dispatcher that hands recorded streams out round robin. Each job runs a
//     fresh `AnalysisSession` from its first frame to `finalize`, and the report comes
//     back over a oneshot channel. Good for batch replays of many recordings.
// 2.  **`StreamingSession`**: an actor task that owns one `AnalysisSession`. Frames are
//     sent in over a bounded channel as they are produced, every message carries its
//     own reply channel, and `finalize` ends the actor. Good for live capture where
//     the producer should never hold the session directly.
//
// Key architectural principles:
// 1.  **Ownership, not locks**: Every session lives inside exactly one task. No
//     `Mutex` guards analysis state; channels are the only way in.
// 2.  **Same engine**: Both shapes call the ordinary synchronous `AnalysisSession`, so
//     a pooled or streamed replay produces exactly the report a direct replay does.

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::AnalysisConfig;
use crate::core_modules::exercise::ExerciseType;
use crate::core_modules::joint::JointFrame;
use crate::error::{AnalysisError, Result};
use crate::session::{AnalysisSession, FrameAnalysis, SessionReport};

/// Messages buffered per streaming session before `ingest` waits.
const STREAM_CHANNEL_CAPACITY: usize = 32;

/// One recorded stream to analyze from start to finish.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub exercise: ExerciseType,
    pub frames: Vec<JointFrame>,
}

impl AnalysisJob {
    pub fn new(exercise: ExerciseType, frames: Vec<JointFrame>) -> Self {
        Self { exercise, frames }
    }
}

struct JobTask {
    job: AnalysisJob,
    result_sender: oneshot::Sender<Result<SessionReport>>,
}

/// Runs whole recorded streams on a fixed set of worker tasks.
pub struct SessionPool {
    task_sender: mpsc::UnboundedSender<JobTask>,
    workers: Vec<JoinHandle<()>>,
}

impl SessionPool {
    /// A pool with one worker per logical CPU. Must be called inside a tokio runtime.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        Self::with_workers(config, num_cpus::get())
    }

    pub fn with_workers(config: AnalysisConfig, worker_count: usize) -> Result<Self> {
        config.validate()?;
        let worker_count = worker_count.max(1);
        let (task_sender, mut task_receiver) = mpsc::unbounded_channel::<JobTask>();

        let (worker_senders, worker_receivers): (Vec<_>, Vec<_>) = (0..worker_count)
            .map(|_| mpsc::unbounded_channel::<JobTask>())
            .unzip();

        tokio::spawn(async move {
            let mut worker_idx = 0;
            while let Some(task) = task_receiver.recv().await {
                if worker_senders[worker_idx].send(task).is_err() {
                    warn!(worker = worker_idx, "session worker has stopped");
                }
                worker_idx = (worker_idx + 1) % worker_count;
            }
        });

        let workers = worker_receivers
            .into_iter()
            .enumerate()
            .map(|(worker, mut receiver)| {
                let worker_config = config.clone();
                tokio::spawn(async move {
                    while let Some(task) = receiver.recv().await {
                        debug!(worker, exercise = %task.job.exercise, frames = task.job.frames.len(), "job started");
                        let report = run_job(&worker_config, &task.job);
                        let _ = task.result_sender.send(report);
                    }
                })
            })
            .collect();

        Ok(Self { task_sender, workers })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Analyzes one recorded stream on the next worker in turn.
    pub async fn analyze(&self, job: AnalysisJob) -> Result<SessionReport> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.task_sender
            .send(JobTask { job, result_sender })
            .map_err(|_| AnalysisError::WorkerUnavailable)?;
        result_receiver.await.map_err(|_| AnalysisError::WorkerUnavailable)?
    }

    /// Analyzes every job concurrently. Results keep the order of `jobs`.
    pub async fn analyze_all(&self, jobs: Vec<AnalysisJob>) -> Vec<Result<SessionReport>> {
        join_all(jobs.into_iter().map(|job| self.analyze(job))).await
    }
}

/// Out-of-order frames are skipped, as a direct caller would after the rejection.
fn run_job(config: &AnalysisConfig, job: &AnalysisJob) -> Result<SessionReport> {
    let mut session = AnalysisSession::new(job.exercise, config.clone())?;
    for frame in &job.frames {
        match session.ingest(frame) {
            Ok(_) | Err(AnalysisError::OutOfOrderFrame { .. }) => {}
            Err(err) => return Err(err),
        }
    }
    session.finalize()
}

enum SessionMessage {
    Ingest(JointFrame, oneshot::Sender<Result<Option<FrameAnalysis>>>),
    Finalize(oneshot::Sender<Result<SessionReport>>),
}

/// One `AnalysisSession` running in its own task, fed over a channel.
pub struct StreamingSession {
    exercise: ExerciseType,
    sender: mpsc::Sender<SessionMessage>,
}

impl StreamingSession {
    /// Validates the configuration and spawns the session task.
    pub fn spawn(exercise: ExerciseType, config: AnalysisConfig) -> Result<Self> {
        let mut session = AnalysisSession::new(exercise, config)?;
        let (sender, mut receiver) = mpsc::channel::<SessionMessage>(STREAM_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    SessionMessage::Ingest(frame, reply) => {
                        let _ = reply.send(session.ingest(&frame));
                    }
                    SessionMessage::Finalize(reply) => {
                        let _ = reply.send(session.finalize());
                        break;
                    }
                }
            }
        });

        Ok(Self { exercise, sender })
    }

    pub fn exercise(&self) -> ExerciseType {
        self.exercise
    }

    /// Sends one frame and waits for its per-frame analysis.
    pub async fn ingest(&self, frame: JointFrame) -> Result<Option<FrameAnalysis>> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(SessionMessage::Ingest(frame, reply))
            .await
            .map_err(|_| AnalysisError::WorkerUnavailable)?;
        response.await.map_err(|_| AnalysisError::WorkerUnavailable)?
    }

    /// Ends the stream and returns the report. The session task exits afterwards.
    pub async fn finalize(self) -> Result<SessionReport> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(SessionMessage::Finalize(reply))
            .await
            .map_err(|_| AnalysisError::WorkerUnavailable)?;
        response.await.map_err(|_| AnalysisError::WorkerUnavailable)?
    }
}
