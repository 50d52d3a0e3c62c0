//! Parallel GPS extraction over a pooled session set
//!
//! Fans a folder's image list out across a bounded worker set. Each task
//! borrows a pooled session for the duration of one bounded prefix read
//! plus decode; the guard returns the session whatever the outcome.
//! Per-task failures are counted, never fatal. The whole batch is bounded
//! by a timeout; tasks still pending at the deadline are abandoned and the
//! pool is discarded rather than reused.
//!
//! When the pool cannot reach the minimum viable size, extraction falls
//! back to the sequential path on the caller's own session.

use std::sync::Arc;

use futures::stream::StreamExt;
use thiserror::Error;
use tokio::time::Instant;

use skyqc_common::AnalysisConfig;

use crate::models::{GpsPoint, ImageDescriptor};
use crate::services::{file_service, gps_extractor, session_pool};
use crate::services::session_pool::{PoolError, PoolKey, SessionPool};
use crate::transport::{RemoteSession, SessionFactory, TransportError};

/// Result of one folder batch: the decoded points plus how many images
/// failed outright (timeouts, dead connections, I/O errors). Images that
/// simply carry no GPS tags count in neither.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub points: Vec<GpsPoint>,
    pub failures: usize,
}

#[derive(Debug, Error)]
enum TaskError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

enum TaskOutcome {
    Fix(GpsPoint),
    NoFix,
    Failed,
}

/// Drives bounded-parallel (or sequential) extraction for one folder.
pub struct ExtractionScheduler {
    config: Arc<AnalysisConfig>,
}

impl ExtractionScheduler {
    pub fn new(config: Arc<AnalysisConfig>) -> Self {
        Self { config }
    }

    /// Parallel extraction using a pooled session set, reusing cached
    /// sessions for `key` when they are still healthy. Falls back to
    /// [`Self::sequential`] on the caller's session when the pool cannot
    /// reach the minimum viable size.
    pub async fn run(
        &self,
        caller: &dyn RemoteSession,
        factory: &dyn SessionFactory,
        key: PoolKey,
        folder_name: &str,
        images: &[ImageDescriptor],
    ) -> BatchOutcome {
        let workers = self.config.worker_count(images.len());
        tracing::info!(
            "Extracting GPS from {} images in {} with {} workers",
            images.len(),
            folder_name,
            workers
        );

        let pool = match self.build_pool(factory, key.clone(), workers).await {
            Some(pool) => pool,
            None => {
                tracing::warn!(
                    "Session pool below minimum viable size, using sequential extraction for {}",
                    folder_name
                );
                return self.sequential(caller, folder_name, images).await;
            }
        };

        let outcome = self.drain_batch(&pool, folder_name, images, workers).await;

        if pool.is_degraded() {
            tracing::warn!("Discarding degraded session pool for {}", pool.key());
            pool.close_all();
            drop(pool);
        } else {
            let sessions = pool.reclaim();
            session_pool::cache_sessions(key, sessions);
        }
        outcome
    }

    /// Sequential extraction on a single caller-supplied session. Used for
    /// tiny folders and as the degraded-pool fallback.
    pub async fn sequential(
        &self,
        session: &dyn RemoteSession,
        folder_name: &str,
        images: &[ImageDescriptor],
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (i, image) in images.iter().enumerate() {
            let work = async {
                let bytes = file_service::read_prefix(
                    session,
                    &image.remote_path,
                    self.config.prefix_read_bytes,
                )
                .await?;
                Ok::<_, TransportError>(gps_extractor::extract(&bytes))
            };
            match tokio::time::timeout(self.config.task_timeout(), work).await {
                Ok(Ok(Some(fix))) => outcome.points.push(GpsPoint {
                    folder: folder_name.to_string(),
                    filename: image.name.clone(),
                    filepath: image.remote_path.clone(),
                    fix,
                }),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    tracing::debug!("Error processing {}: {}", image.name, e);
                    outcome.failures += 1;
                }
                Err(_) => {
                    tracing::warn!("Timeout processing {}", image.name);
                    outcome.failures += 1;
                }
            }
            let done = i + 1;
            if done % 20 == 0 || done == images.len() {
                tracing::info!(
                    "Progress: {}/{} images processed, {} GPS points found",
                    done,
                    images.len(),
                    outcome.points.len()
                );
            }
        }
        outcome
    }

    /// Assemble the session pool for a batch: revalidate cached sessions,
    /// top up through the factory, enforce the minimum viable size.
    async fn build_pool(
        &self,
        factory: &dyn SessionFactory,
        key: PoolKey,
        workers: usize,
    ) -> Option<Arc<SessionPool>> {
        let cached = session_pool::take_cached(&key);
        let cached_count = cached.len();

        let mut seed: Vec<Box<dyn RemoteSession>> = Vec::with_capacity(cached_count);
        for session in cached {
            match session.stat("/").await {
                Ok(_) => seed.push(session),
                Err(e) => tracing::debug!("Dropping dead cached session: {}", e),
            }
        }
        if !seed.is_empty() {
            tracing::info!(
                "Reusing {}/{} cached sessions for {}",
                seed.len(),
                cached_count,
                key
            );
        }

        match SessionPool::create(key, factory, seed, workers, self.config.min_pool_size).await {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!("Could not build session pool: {}", e);
                None
            }
        }
    }

    /// Run the bounded fan-out and collect results until the batch is done
    /// or the batch deadline passes. Dropping the stream at the deadline
    /// abandons pending tasks; their borrow guards return the sessions on
    /// the way down, but the pool is marked degraded since an abandoned
    /// task may have left a session mid-transfer.
    async fn drain_batch(
        &self,
        pool: &Arc<SessionPool>,
        folder_name: &str,
        images: &[ImageDescriptor],
        workers: usize,
    ) -> BatchOutcome {
        let deadline = Instant::now() + self.config.batch_timeout();
        let mut stream = futures::stream::iter(
            images
                .iter()
                .cloned()
                .map(|image| self.process_image(pool, folder_name, image)),
        )
        .buffer_unordered(workers);

        let mut outcome = BatchOutcome::default();
        let mut completed = 0usize;
        loop {
            match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(Some(task_outcome)) => {
                    completed += 1;
                    match task_outcome {
                        TaskOutcome::Fix(point) => outcome.points.push(point),
                        TaskOutcome::NoFix => {}
                        TaskOutcome::Failed => outcome.failures += 1,
                    }
                    if completed % 20 == 0 || completed == images.len() {
                        tracing::info!(
                            "Progress: {}/{} images processed, {} GPS points found",
                            completed,
                            images.len(),
                            outcome.points.len()
                        );
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    tracing::warn!(
                        "Batch timeout in {}: abandoning {} unfinished images",
                        folder_name,
                        images.len() - completed
                    );
                    pool.mark_degraded();
                    break;
                }
            }
        }
        outcome
    }

    /// One extraction task: borrow, bounded read, decode, return via guard.
    /// Takes its descriptor by value so the task futures borrow nothing
    /// from the batch iterator.
    async fn process_image(
        &self,
        pool: &Arc<SessionPool>,
        folder_name: &str,
        image: ImageDescriptor,
    ) -> TaskOutcome {
        let work = async {
            let handle = pool.borrow(self.config.borrow_timeout()).await?;
            let bytes = file_service::read_prefix(
                handle.session(),
                &image.remote_path,
                self.config.prefix_read_bytes,
            )
            .await?;
            Ok::<_, TaskError>(gps_extractor::extract(&bytes))
        };

        match tokio::time::timeout(self.config.task_timeout(), work).await {
            Ok(Ok(Some(fix))) => TaskOutcome::Fix(GpsPoint {
                folder: folder_name.to_string(),
                filename: image.name.clone(),
                filepath: image.remote_path.clone(),
                fix,
            }),
            Ok(Ok(None)) => TaskOutcome::NoFix,
            Ok(Err(TaskError::Transport(e))) if e.is_timeout() => {
                tracing::warn!("Transport timeout: {}", image.name);
                TaskOutcome::Failed
            }
            Ok(Err(TaskError::Transport(TransportError::ConnectionClosed(_)))) => {
                tracing::warn!("Connection closed: {}", image.name);
                TaskOutcome::Failed
            }
            Ok(Err(e)) => {
                tracing::debug!("Error processing {}: {}", image.name, e);
                TaskOutcome::Failed
            }
            Err(_) => {
                tracing::warn!("Timeout processing {}", image.name);
                TaskOutcome::Failed
            }
        }
    }
}
