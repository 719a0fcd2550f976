// src/core/mpfc/actor.rs

//! The single-threaded task that owns the controller's process table and runs
//! its periodic recomputation. Structured like `EvictionManager::run`: a
//! `tokio::select!` between a tick interval and an inbound request channel, with
//! no shared mutable state reachable from outside this task.

use super::state::{ControllerState, ProcessEntry, should_push};
use super::{MetricsSnapshot, MpfcConfig, QueueCallback, QueueId};
use crate::core::errors::MpfcError;
use crate::core::memory_oracle::MemoryOracle;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

struct Entry {
    state: ProcessEntry,
    callback: Arc<dyn QueueCallback>,
}

pub(super) enum Request {
    Register {
        pid: QueueId,
        callback: Arc<dyn QueueCallback>,
        reply: oneshot::Sender<()>,
    },
    Deregister {
        pid: QueueId,
        reply: oneshot::Sender<()>,
    },
    ReportQueueDuration {
        pid: QueueId,
        duration: f64,
        reply: oneshot::Sender<Result<f64, MpfcError>>,
    },
    Update {
        reply: oneshot::Sender<f64>,
    },
    RegisteredCount {
        reply: oneshot::Sender<usize>,
    },
    Metrics {
        reply: oneshot::Sender<MetricsSnapshot>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

pub struct MpfcActor {
    cfg: MpfcConfig,
    memory_oracle: Arc<dyn MemoryOracle>,
    state: ControllerState,
    entries: HashMap<QueueId, Entry>,
    rx: mpsc::Receiver<Request>,
}

impl MpfcActor {
    pub(super) fn new(
        cfg: MpfcConfig,
        memory_oracle: Arc<dyn MemoryOracle>,
        rx: mpsc::Receiver<Request>,
    ) -> Self {
        let limit = memory_oracle
            .raw_limit_bytes()
            .unwrap_or(cfg.vmm_default_bytes);
        let memory_limit_bytes = ((limit as f64) * cfg.mem_scale) as u64;
        Self {
            cfg,
            memory_oracle,
            state: ControllerState::new(memory_limit_bytes),
            entries: HashMap::new(),
            rx,
        }
    }

    pub async fn run(mut self) {
        let mut tick = tokio::time::interval(self.cfg.tick);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.update().await;
                }
                msg = self.rx.recv() => {
                    match msg {
                        Some(Request::Stop { reply }) => {
                            debug!("mpfc actor received stop request, shutting down");
                            let _ = reply.send(());
                            return;
                        }
                        Some(req) => self.handle(req).await,
                        None => {
                            debug!("mpfc actor channel closed, shutting down");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn handle(&mut self, req: Request) {
        match req {
            Request::Stop { .. } => unreachable!("Stop is intercepted in run() before dispatch"),
            Request::Register { pid, callback, reply } => {
                self.entries.insert(
                    pid,
                    Entry {
                        state: ProcessEntry::new(),
                        callback,
                    },
                );
                let _ = reply.send(());
            }
            Request::Deregister { pid, reply } => {
                if let Some(entry) = self.entries.remove(&pid) {
                    self.state.remove_entry(entry.state.reported, &self.cfg);
                }
                let _ = reply.send(());
            }
            Request::ReportQueueDuration { pid, duration, reply } => {
                let result = self.report_queue_duration(pid, duration);
                let _ = reply.send(result);
            }
            Request::Update { reply } => {
                let desired = self.update().await;
                let _ = reply.send(desired);
            }
            Request::RegisteredCount { reply } => {
                let _ = reply.send(self.entries.len());
            }
            Request::Metrics { reply } => {
                let used = self.memory_oracle.used_bytes();
                let ratio = used as f64 / self.state.memory_limit_bytes.max(1) as f64;
                let _ = reply.send(MetricsSnapshot {
                    desired_duration: self.state.desired_duration,
                    tracked_queue_count: self.entries.len(),
                    memory_ratio: ratio,
                });
            }
        }
    }

    fn report_queue_duration(&mut self, pid: QueueId, duration: f64) -> Result<f64, MpfcError> {
        if duration.is_nan() || (duration.is_finite() && duration < 0.0) {
            return Err(MpfcError::InvalidDuration(duration));
        }
        let Some(entry) = self.entries.get_mut(&pid) else {
            return Err(MpfcError::UnknownQueue(pid.0));
        };

        let prev_reported = entry.state.reported;
        let prev_sent = entry.state.sent;
        let reply = self.state.immediate_reply(prev_sent, duration, &self.cfg);

        self.state
            .apply_report_transition(prev_reported, duration, &self.cfg);
        entry.state.reported = duration;
        entry.state.sent = reply;

        Ok(reply)
    }

    async fn update(&mut self) -> f64 {
        let used = self.memory_oracle.used_bytes();
        let next = self.state.compute_target(used, &self.cfg);

        if self.state.should_recompute_push(next) {
            for (pid, entry) in self.entries.iter_mut() {
                if should_push(entry.state, next, &self.cfg) {
                    entry.callback.push_target(next).await;
                    entry.state.sent = next;
                    debug!(queue = %pid, target = next, "pushed new target duration");
                }
            }
        }

        if next.is_infinite() != self.state.desired_duration.is_infinite() {
            info!(desired = next, "memory pressure target changed");
        }

        self.state.desired_duration = next;
        next
    }
}
