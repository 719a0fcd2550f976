// src/core/mpfc/handle.rs

//! A cheaply cloneable handle to a running `MpfcActor`, dispatching requests over
//! an mpsc channel with a oneshot reply, as `FfcHandle` does for the coordinator.

use super::actor::{MpfcActor, Request};
use super::{MetricsSnapshot, MpfcConfig, QueueCallback, QueueId};
use crate::core::errors::MpfcError;
use crate::core::memory_oracle::MemoryOracle;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct MpfcHandle {
    tx: mpsc::Sender<Request>,
}

impl MpfcHandle {
    /// Builds the actor and a handle to it without spawning anything, so the
    /// caller can place the actor's `run()` future under its own supervision.
    pub fn new(cfg: MpfcConfig, memory_oracle: Arc<dyn MemoryOracle>) -> (Self, MpfcActor) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let actor = MpfcActor::new(cfg, memory_oracle, rx);
        (Self { tx }, actor)
    }

    /// Convenience for tests and demos: builds the actor and spawns it detached.
    pub fn spawn(cfg: MpfcConfig, memory_oracle: Arc<dyn MemoryOracle>) -> Self {
        let (handle, actor) = Self::new(cfg, memory_oracle);
        tokio::spawn(actor.run());
        handle
    }

    pub async fn register(&self, pid: QueueId, callback: Arc<dyn QueueCallback>) {
        let (reply, rx) = oneshot::channel();
        if self
            .tx
            .send(Request::Register { pid, callback, reply })
            .await
            .is_ok()
        {
            let _ = rx.await;
        }
    }

    pub async fn deregister(&self, pid: QueueId) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::Deregister { pid, reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn report_queue_duration(
        &self,
        pid: QueueId,
        duration: f64,
    ) -> Result<f64, MpfcError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::ReportQueueDuration { pid, duration, reply })
            .await
            .map_err(|_| MpfcError::UnknownQueue("actor unavailable".to_string()))?;
        rx.await
            .map_err(|_| MpfcError::UnknownQueue("actor unavailable".to_string()))?
    }

    /// Forces an immediate recomputation against whatever the injected
    /// `MemoryOracle` currently reports, rather than waiting for the next tick.
    pub async fn update(&self) -> f64 {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::Update { reply }).await.is_ok() {
            return rx.await.unwrap_or(f64::INFINITY);
        }
        f64::INFINITY
    }

    pub async fn registered_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::RegisteredCount { reply }).await.is_ok() {
            return rx.await.unwrap_or(0);
        }
        0
    }

    /// A point-in-time view of the controller's state, for metrics exposition.
    pub async fn metrics_snapshot(&self) -> MetricsSnapshot {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::Metrics { reply }).await.is_ok()
            && let Ok(snapshot) = rx.await
        {
            return snapshot;
        }
        MetricsSnapshot {
            desired_duration: f64::INFINITY,
            tracked_queue_count: 0,
            memory_ratio: 0.0,
        }
    }

    /// Requests a graceful shutdown of the actor task. Idempotent: a second call
    /// after the actor has already exited simply finds the channel closed.
    pub async fn stop(&self) {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(Request::Stop { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }
}
