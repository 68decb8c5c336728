use parking_lot::{Mutex, ReentrantMutex};
use std::cell::Cell;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::trace;

use super::{AsyncOperation, OperationState};

pub(crate) type Worker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type CancelHook = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OperationKind {
    SingleResponse,
    Stream,
}

/// Outcome of handing an event to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    /// Paused; keep the event and retry after the next state change.
    Deferred,
    /// Terminal; drop the event.
    Closed,
}

#[derive(Debug, Clone, Copy)]
struct Phase {
    state: OperationState,
    /// State restored by `resume`.
    resume_to: OperationState,
}

/// Per-operation lock serializing state transitions with listener calls.
///
/// Re-entrant so a listener may cancel its own operation.
pub(crate) struct Gate {
    kind: OperationKind,
    phase: ReentrantMutex<Cell<Phase>>,
    states: watch::Sender<OperationState>,
    task: Mutex<Option<AbortHandle>>,
    on_cancel: Mutex<Option<CancelHook>>,
}

impl Gate {
    pub(crate) fn new(kind: OperationKind) -> Self {
        let (states, _) = watch::channel(OperationState::Created);
        Self {
            kind,
            phase: ReentrantMutex::new(Cell::new(Phase {
                state: OperationState::Created,
                resume_to: OperationState::Created,
            })),
            states,
            task: Mutex::new(None),
            on_cancel: Mutex::new(None),
        }
    }

    /// Run `hook` once when the operation is cancelled.
    pub(crate) fn on_cancel(&self, hook: impl FnOnce() + Send + 'static) {
        *self.on_cancel.lock() = Some(Box::new(hook));
    }

    pub(crate) fn state(&self) -> OperationState {
        self.phase.lock().get().state
    }

    /// Watch state changes. The current state counts as seen.
    pub(crate) fn subscribe(&self) -> watch::Receiver<OperationState> {
        self.states.subscribe()
    }

    fn set(&self, cell: &Cell<Phase>, phase: Phase) {
        let from = cell.replace(phase).state;
        trace!(from = %from, to = %phase.state, "Operation state changed");
        self.states.send_replace(phase.state);
    }

    fn transition(&self, next: impl FnOnce(Phase) -> Option<Phase>) -> bool {
        let guard = self.phase.lock();
        match next(guard.get()) {
            Some(phase) => {
                self.set(&guard, phase);
                true
            }
            None => false,
        }
    }

    pub(crate) fn begin(&self) -> bool {
        self.transition(|p| {
            (p.state == OperationState::Created).then_some(Phase {
                state: OperationState::Started,
                ..p
            })
        })
    }

    pub(crate) fn pause(&self) -> bool {
        let kind = self.kind;
        self.transition(|p| match p.state {
            OperationState::Started => Some(Phase {
                state: OperationState::Paused,
                resume_to: OperationState::Started,
            }),
            OperationState::Running if kind == OperationKind::Stream => Some(Phase {
                state: OperationState::Paused,
                resume_to: OperationState::Running,
            }),
            _ => None,
        })
    }

    pub(crate) fn resume(&self) -> bool {
        self.transition(|p| {
            (p.state == OperationState::Paused).then_some(Phase {
                state: p.resume_to,
                ..p
            })
        })
    }

    pub(crate) fn cancel(&self) -> bool {
        let cancelled = self.transition(|p| {
            (!p.state.is_terminal()).then_some(Phase {
                state: OperationState::Cancelled,
                ..p
            })
        });
        if !cancelled {
            return false;
        }

        if self.kind == OperationKind::SingleResponse
            && let Some(task) = self.task.lock().take()
        {
            task.abort();
        }
        if let Some(hook) = self.on_cancel.lock().take() {
            hook();
        }
        true
    }

    pub(crate) fn set_task(&self, task: AbortHandle) {
        if self.kind != OperationKind::SingleResponse {
            return;
        }
        *self.task.lock() = Some(task);

        // `cancel` moves to Cancelled before taking the slot, so either it
        // saw the handle or this check sees its state.
        if self.state() == OperationState::Cancelled
            && let Some(task) = self.task.lock().take()
        {
            task.abort();
        }
    }

    /// Wait until the operation may touch the network.
    ///
    /// Returns `false` if it reached a terminal state first.
    pub(crate) async fn enter_running(&self) -> bool {
        let mut states = self.subscribe();
        loop {
            let proceed = {
                let guard = self.phase.lock();
                let phase = guard.get();
                match phase.state {
                    OperationState::Started => {
                        self.set(&guard, Phase {
                            state: OperationState::Running,
                            ..phase
                        });
                        Some(true)
                    }
                    OperationState::Running => Some(true),
                    OperationState::Created | OperationState::Paused => None,
                    _ => Some(false),
                }
            };
            if let Some(proceed) = proceed {
                return proceed;
            }
            if states.changed().await.is_err() {
                return false;
            }
        }
    }

    /// Invoke `notify` for a non-terminal event if the operation is running.
    pub(crate) fn deliver(&self, notify: impl FnOnce()) -> Delivery {
        let guard = self.phase.lock();
        match guard.get().state {
            OperationState::Running => {
                notify();
                Delivery::Delivered
            }
            state if state.is_terminal() => Delivery::Closed,
            _ => Delivery::Deferred,
        }
    }

    /// Move to `terminal` and invoke `notify` for the final event.
    pub(crate) fn finish(&self, terminal: OperationState, notify: impl FnOnce()) -> Delivery {
        let guard = self.phase.lock();
        let phase = guard.get();
        match phase.state {
            OperationState::Running => {
                self.set(&guard, Phase {
                    state: terminal,
                    ..phase
                });
                notify();
                Delivery::Delivered
            }
            state if state.is_terminal() => Delivery::Closed,
            _ => Delivery::Deferred,
        }
    }
}

/// Owns a not-yet-started worker and spawns it on `start`.
pub(crate) struct Controller {
    gate: Arc<Gate>,
    worker: Mutex<Option<Worker>>,
    runtime: Handle,
}

impl Controller {
    pub(crate) fn new(gate: Arc<Gate>, worker: Worker, runtime: Handle) -> Self {
        Self {
            gate,
            worker: Mutex::new(Some(worker)),
            runtime,
        }
    }
}

impl AsyncOperation for Controller {
    fn start(&self) -> bool {
        if !self.gate.begin() {
            return false;
        }
        if let Some(worker) = self.worker.lock().take() {
            let handle = self.runtime.spawn(worker);
            self.gate.set_task(handle.abort_handle());
        }
        true
    }

    fn pause(&self) -> bool {
        self.gate.pause()
    }

    fn resume(&self) -> bool {
        self.gate.resume()
    }

    fn cancel(&self) -> bool {
        if !self.gate.cancel() {
            return false;
        }
        // never started: release the listener now
        self.worker.lock().take();
        true
    }

    fn state(&self) -> OperationState {
        self.gate.state()
    }
}
