//! Serialized async access to a single [`RemoteSession`].
//!
//! The actor owns the session and a dedicated worker thread. Every call made
//! through it becomes an [`Operation`] on one FIFO queue; the worker takes them
//! off one at a time and runs them against the session, so at most one session
//! call is ever in flight and effects happen in submission order.
//!
//! # Lifecycle
//!
//! `New → Connecting → Connected → Draining → Closed`
//!
//! - [`SessionActor::connect`] starts the worker and queues the connect. A
//!   failed connect stops the worker and leaves the actor `Closed`.
//! - [`SessionActor::submit`] / [`SessionActor::execute`] are accepted only
//!   while `Connected`.
//! - [`SessionActor::disconnect`] queues a terminal disconnect behind any work
//!   already submitted, waits for the worker to release the session, then
//!   joins it. Concurrent or repeated calls all wait for the same shutdown, and
//!   a `disconnect` future dropped part way leaves the worker joinable.
//! - Dropping the actor does the same synchronously.
//!
//! # Cancellation
//!
//! Cancellation is advisory. Session calls are blocking and cannot be
//! preempted:
//!
//! - a command canceled before the worker reaches it is skipped and resolves
//!   as [`Outcome::Canceled`];
//! - a command canceled while running resolves as `Canceled` for the caller
//!   right away. The token is also handed to the session, which may abort the
//!   remote command early; either way the worker moves on only once the
//!   session call returns.
//!
//! Dropping a [`PendingCommand`] before the worker reaches it also skips it.

use super::remote_session::RemoteSession;
use crate::models::{CommandResult, Outcome, SshActorError, SshResult};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorState {
    New,
    Connecting,
    Connected,
    Draining,
    Closed,
}

/// Unit of queued work, each carrying its own reply slot
enum Operation {
    Connect {
        reply: oneshot::Sender<Outcome<()>>,
    },
    Execute {
        command: String,
        cancel: CancellationToken,
        reply: oneshot::Sender<Outcome<CommandResult>>,
    },
    Disconnect {
        reply: Option<oneshot::Sender<Outcome<()>>>,
    },
}

struct ActorInner<S> {
    state: ActorState,
    /// Held until `connect` moves it onto the worker
    session: Option<S>,
    queue: Option<mpsc::UnboundedSender<Operation>>,
    /// Kept here until joined, so any later caller can finish the shutdown
    worker: Option<JoinHandle<()>>,
    /// Handed to the worker, which flips it once the session is released
    closed_signal: Option<watch::Sender<bool>>,
}

/// Async, thread-safe facade over a blocking [`RemoteSession`].
///
/// Share it between tasks behind an `Arc`; every method takes `&self`.
pub struct SessionActor<S: RemoteSession> {
    label: String,
    inner: Mutex<ActorInner<S>>,
    closed: watch::Receiver<bool>,
}

impl<S: RemoteSession> SessionActor<S> {
    pub fn new(session: S) -> Self {
        let label = session.label();
        let (closed_signal, closed) = watch::channel(false);
        Self {
            label,
            inner: Mutex::new(ActorInner {
                state: ActorState::New,
                session: Some(session),
                queue: None,
                worker: None,
                closed_signal: Some(closed_signal),
            }),
            closed,
        }
    }

    // The guard is never held across an await, so a poisoned lock only means a
    // panic elsewhere; the state itself is still consistent.
    fn lock(&self) -> MutexGuard<'_, ActorInner<S>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn state(&self) -> ActorState {
        self.lock().state
    }

    /// Start the worker and connect the session.
    ///
    /// Fails with `AlreadyConnected` if a connect already happened or is in
    /// progress, and with `ActorClosed` once the actor has shut down.
    pub async fn connect(&self) -> SshResult<()> {
        let pending = self.start()?;

        let outcome = pending
            .await
            .unwrap_or(Outcome::Failed(SshActorError::ActorClosed));

        let err = match outcome {
            Outcome::Completed(()) => {
                let mut inner = self.lock();
                if inner.state == ActorState::Connecting {
                    inner.state = ActorState::Connected;
                }
                log::info!("[session_actor] {} connected", self.label);
                return Ok(());
            }
            Outcome::Failed(e) => e,
            Outcome::Canceled => SshActorError::ConnectionFailed {
                message: "connect canceled".to_string(),
            },
        };

        log::warn!("[session_actor] {} connect failed: {}", self.label, err);
        self.lock().queue = None;
        self.finish_shutdown().await;
        Err(err)
    }

    fn start(&self) -> SshResult<oneshot::Receiver<Outcome<()>>> {
        let mut inner = self.lock();
        match inner.state {
            ActorState::New => {}
            ActorState::Connecting | ActorState::Connected => {
                return Err(SshActorError::AlreadyConnected)
            }
            ActorState::Draining | ActorState::Closed => return Err(SshActorError::ActorClosed),
        }

        let session = inner.session.take().ok_or(SshActorError::ActorClosed)?;
        let closed_signal = inner
            .closed_signal
            .take()
            .ok_or(SshActorError::ActorClosed)?;
        let (queue, operations) = mpsc::unbounded_channel();
        let (reply, pending) = oneshot::channel();
        // The receiver is alive until the worker takes it, so this cannot fail
        let _ = queue.send(Operation::Connect { reply });

        let spawned = thread::Builder::new()
            .name(format!("ssh-actor-{}", self.label))
            .spawn(move || run_worker(session, operations, closed_signal));

        match spawned {
            Ok(worker) => {
                inner.queue = Some(queue);
                inner.worker = Some(worker);
                inner.state = ActorState::Connecting;
                log::info!("[session_actor] {} worker started", self.label);
                Ok(pending)
            }
            Err(e) => {
                // The closure, and the session with it, was dropped by the failed spawn
                inner.state = ActorState::Closed;
                Err(SshActorError::ConnectionFailed {
                    message: format!("failed to start session worker: {}", e),
                })
            }
        }
    }

    /// Queue a command without waiting for it.
    ///
    /// Submission happens before this returns, so the order of `submit` calls
    /// is the order of execution.
    pub fn submit(
        &self,
        command: impl Into<String>,
        cancel: Option<CancellationToken>,
    ) -> PendingCommand {
        let cancel = cancel.unwrap_or_default();
        let inner = self.lock();

        let queue = match (inner.state, inner.queue.as_ref()) {
            (ActorState::Connected, Some(queue)) => queue,
            (ActorState::New | ActorState::Connecting, _) => {
                return PendingCommand::ready(Outcome::Failed(SshActorError::NotConnected), cancel)
            }
            _ => return PendingCommand::ready(Outcome::Failed(SshActorError::ActorClosed), cancel),
        };

        let (reply, receiver) = oneshot::channel();
        let operation = Operation::Execute {
            command: command.into(),
            cancel: cancel.clone(),
            reply,
        };
        if queue.send(operation).is_err() {
            return PendingCommand::ready(Outcome::Failed(SshActorError::ActorClosed), cancel);
        }

        PendingCommand {
            reply: PendingReply::Queued(receiver),
            cancel,
        }
    }

    /// Queue a command and wait for its outcome
    pub async fn execute(
        &self,
        command: impl Into<String>,
        cancel: Option<CancellationToken>,
    ) -> Outcome<CommandResult> {
        self.submit(command, cancel).wait().await
    }

    /// Like [`execute`](Self::execute) without a token, as a `Result`
    pub async fn run(&self, command: impl Into<String>) -> SshResult<CommandResult> {
        self.execute(command, None).await.into_result()
    }

    /// Drain queued work, disconnect, and join the worker.
    ///
    /// Safe to call again or concurrently: every call returns only once the
    /// worker has released the session and been joined.
    pub async fn disconnect(&self) -> SshResult<()> {
        let pending = {
            let mut inner = self.lock();
            match inner.state {
                ActorState::New => {
                    inner.state = ActorState::Closed;
                    inner.session = None;
                    inner.closed_signal = None;
                    log::info!("[session_actor] {} closed before connecting", self.label);
                    return Ok(());
                }
                ActorState::Closed => return Ok(()),
                ActorState::Draining => None,
                ActorState::Connecting | ActorState::Connected => {
                    inner.state = ActorState::Draining;
                    let (reply, pending) = oneshot::channel();
                    // Taking the sender closes the queue to new submissions
                    let sent = inner
                        .queue
                        .take()
                        .map(|queue| {
                            queue
                                .send(Operation::Disconnect { reply: Some(reply) })
                                .is_ok()
                        })
                        .unwrap_or(false);
                    sent.then_some(pending)
                }
            }
        };

        log::info!("[session_actor] {} draining", self.label);
        let outcome = match pending {
            Some(pending) => pending.await.unwrap_or(Outcome::Completed(())),
            None => Outcome::Completed(()),
        };
        self.finish_shutdown().await;
        outcome.into_result()
    }

    /// Wait for the worker to release the session, join it, and mark the
    /// actor closed
    async fn finish_shutdown(&self) {
        let mut closed = self.closed.clone();
        // An error means the worker unwound without signalling, which is just as final
        let _ = closed.wait_for(|done| *done).await;

        let mut inner = self.lock();
        if let Some(worker) = inner.worker.take() {
            // Only the thread's return is left; the session is already gone
            if worker.join().is_err() {
                log::error!("[session_actor] {} worker thread panicked", self.label);
            }
        }
        if inner.state != ActorState::Closed {
            inner.state = ActorState::Closed;
            log::info!("[session_actor] {} closed", self.label);
        }
    }
}

impl<S: RemoteSession> Drop for SessionActor<S> {
    /// Blocks until queued work has drained and the worker has exited.
    ///
    /// The join runs on the dropping thread. Dropping a still-open actor from
    /// inside a tokio task therefore blocks that runtime thread until the
    /// in-flight session call and everything queued behind it return; call
    /// [`disconnect`](SessionActor::disconnect) first to avoid that.
    fn drop(&mut self) {
        let inner = self
            .inner
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(queue) = inner.queue.take() {
            log::debug!("[session_actor] {} dropped while open, disconnecting", self.label);
            let _ = queue.send(Operation::Disconnect { reply: None });
        }
        if let Some(worker) = inner.worker.take() {
            if worker.join().is_err() {
                log::error!("[session_actor] {} worker thread panicked", self.label);
            }
        }
        inner.state = ActorState::Closed;
    }
}

enum PendingReply {
    Ready(Outcome<CommandResult>),
    Queued(oneshot::Receiver<Outcome<CommandResult>>),
}

/// A submitted command that has not been awaited yet
pub struct PendingCommand {
    reply: PendingReply,
    cancel: CancellationToken,
}

impl PendingCommand {
    fn ready(outcome: Outcome<CommandResult>, cancel: CancellationToken) -> Self {
        Self {
            reply: PendingReply::Ready(outcome),
            cancel,
        }
    }

    /// Token observed by both this future and the worker
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the outcome. Resolves as `Canceled` as soon as the token fires.
    pub async fn wait(self) -> Outcome<CommandResult> {
        match self.reply {
            PendingReply::Ready(outcome) => outcome,
            PendingReply::Queued(receiver) => {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => Outcome::Canceled,
                    outcome = receiver => outcome.unwrap_or(Outcome::Failed(SshActorError::ActorClosed)),
                }
            }
        }
    }
}

fn run_worker<S: RemoteSession>(
    mut session: S,
    mut operations: mpsc::UnboundedReceiver<Operation>,
    closed: watch::Sender<bool>,
) {
    let label = session.label();
    let mut connected = false;

    while let Some(operation) = operations.blocking_recv() {
        match operation {
            Operation::Connect { reply } => {
                log::debug!("[session_actor] {} connecting", label);
                let outcome = guarded(|| session.connect());
                connected = outcome.is_completed();
                let _ = reply.send(outcome);
                if !connected {
                    break;
                }
            }
            Operation::Execute {
                command,
                cancel,
                reply,
            } => {
                if cancel.is_cancelled() || reply.is_closed() {
                    log::warn!("[session_actor] {} skipping canceled command", label);
                    let _ = reply.send(Outcome::Canceled);
                    continue;
                }

                log::debug!("[session_actor] {} executing: {}", label, command);
                let outcome = guarded(|| session.execute(&command, &cancel));
                let outcome = if cancel.is_cancelled() {
                    Outcome::Canceled
                } else {
                    outcome
                };
                let _ = reply.send(outcome);
            }
            Operation::Disconnect { reply } => {
                log::debug!("[session_actor] {} disconnecting", label);
                let outcome = guarded(|| session.disconnect());
                connected = false;
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
                break;
            }
        }
    }

    // Every sender went away without a disconnect
    if connected {
        if let Outcome::Failed(e) = guarded(|| session.disconnect()) {
            log::warn!("[session_actor] {} disconnect on shutdown failed: {}", label, e);
        }
    }

    drop(session);
    closed.send_replace(true);
    log::debug!("[session_actor] {} worker stopped", label);
}

/// Run one session call, turning a panic into a failed outcome so the worker
/// survives it
fn guarded<T>(call: impl FnOnce() -> SshResult<T>) -> Outcome<T> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(result) => result.into(),
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("[session_actor] session call panicked: {}", message);
            Outcome::Failed(SshActorError::WorkerPanicked { message })
        }
    }
}
