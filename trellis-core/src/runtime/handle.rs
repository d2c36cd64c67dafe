//! Session Actor
//!
//! A [`SessionHandle`] owns a tokio task that serializes all work on one
//! session. Commands arrive over an mpsc channel; the runner itself sits
//! behind a `parking_lot::Mutex` and is only touched from
//! `spawn_blocking`, so script execution never blocks the async runtime.
//!
//! Rerun requests wait out the debounce window instead of being dropped.
//! Requests from the same origin that queue up meanwhile are merged into
//! one batch, later values winning.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use parking_lot::{Mutex, MutexGuard};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::outbound::Transport;
use super::runner::{ObserverId, RerunOutcome, ScriptRunner};
use super::session::SessionId;
use crate::config::EngineConfig;
use crate::error::RunnerError;
use crate::graph::GraphPayload;
use crate::render::UnitId;
use crate::script::ScriptSource;
use crate::value::Value;

type Reply<T> = oneshot::Sender<Result<T, RunnerError>>;

enum Command {
    Start {
        source: ScriptSource,
        reply: Reply<()>,
    },
    Rerun {
        origin: Option<ObserverId>,
        changes: IndexMap<UnitId, Value>,
        reply: Option<Reply<RerunOutcome>>,
    },
    Restart {
        reply: Reply<()>,
    },
    Stop {
        reply: Reply<()>,
    },
    Introspect {
        reply: Reply<GraphPayload>,
    },
}

/// Async front for one session.
pub struct SessionHandle {
    id: SessionId,
    runner: Arc<Mutex<ScriptRunner>>,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Spawn the session task. Must be called inside a tokio runtime.
    pub fn spawn(id: SessionId, config: EngineConfig) -> Self {
        let runner = Arc::new(Mutex::new(ScriptRunner::new(id.clone(), config)));
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(id.clone(), Arc::clone(&runner), receiver));
        Self {
            id,
            runner,
            commands,
            task,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Attach an observer to the session.
    pub fn attach(&self, transport: impl Transport + 'static) -> ObserverId {
        self.runner.lock().attach(transport)
    }

    pub fn detach(&self, observer: ObserverId) -> bool {
        self.runner.lock().detach(observer)
    }

    /// Direct access to the runner, e.g. for inspecting the layout. Avoid
    /// holding the guard across an await point.
    pub fn lock(&self) -> MutexGuard<'_, ScriptRunner> {
        self.runner.lock()
    }

    pub async fn start(&self, source: ScriptSource) -> Result<(), RunnerError> {
        self.request(|reply| Command::Start { source, reply }).await
    }

    pub async fn rerun(&self, changes: IndexMap<UnitId, Value>) -> Result<RerunOutcome, RunnerError> {
        self.rerun_from(None, changes).await
    }

    pub async fn rerun_from(
        &self,
        origin: Option<ObserverId>,
        changes: IndexMap<UnitId, Value>,
    ) -> Result<RerunOutcome, RunnerError> {
        self.request(|reply| Command::Rerun {
            origin,
            changes,
            reply: Some(reply),
        })
        .await
    }

    /// Queue a rerun without waiting for it.
    pub fn submit(&self, origin: Option<ObserverId>, changes: IndexMap<UnitId, Value>) -> Result<(), RunnerError> {
        self.commands
            .send(Command::Rerun {
                origin,
                changes,
                reply: None,
            })
            .map_err(|_| RunnerError::Closed)
    }

    pub async fn restart(&self) -> Result<(), RunnerError> {
        self.request(|reply| Command::Restart { reply }).await
    }

    pub async fn stop(&self) -> Result<(), RunnerError> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn introspect(&self) -> Result<GraphPayload, RunnerError> {
        self.request(|reply| Command::Introspect { reply }).await
    }

    /// Close the command channel and wait for queued work to finish.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(err) = self.task.await {
            error!(session = %self.id, error = %err, "session task panicked");
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, RunnerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| RunnerError::Closed)?;
        response.await.map_err(|_| RunnerError::Closed)?
    }
}

/// Run `f` against the runner on the blocking pool.
async fn blocking<T, F>(runner: &Arc<Mutex<ScriptRunner>>, f: F) -> Result<T, RunnerError>
where
    T: Send + 'static,
    F: FnOnce(&mut ScriptRunner) -> Result<T, RunnerError> + Send + 'static,
{
    let runner = Arc::clone(runner);
    match tokio::task::spawn_blocking(move || f(&mut runner.lock())).await {
        Ok(result) => result,
        Err(err) => {
            error!(error = %err, "session work panicked");
            Err(RunnerError::Closed)
        }
    }
}

fn respond<T>(reply: Reply<T>, result: Result<T, RunnerError>) {
    // The requester may have stopped waiting.
    let _ = reply.send(result);
}

async fn run(id: SessionId, runner: Arc<Mutex<ScriptRunner>>, mut commands: mpsc::UnboundedReceiver<Command>) {
    let mut backlog: VecDeque<Command> = VecDeque::new();

    loop {
        let command = match backlog.pop_front() {
            Some(command) => command,
            None => match commands.recv().await {
                Some(command) => command,
                None => break,
            },
        };

        match command {
            Command::Start { source, reply } => {
                let result = blocking(&runner, move |r| r.start(source)).await;
                respond(reply, result);
            }
            Command::Restart { reply } => {
                respond(reply, blocking(&runner, |r| r.restart()).await);
            }
            Command::Stop { reply } => {
                respond(reply, blocking(&runner, |r| r.stop()).await);
            }
            Command::Introspect { reply } => {
                respond(reply, blocking(&runner, |r| Ok(r.introspect())).await);
            }
            Command::Rerun {
                origin,
                mut changes,
                reply,
            } => {
                let mut replies: Vec<Reply<RerunOutcome>> = reply.into_iter().collect();

                let wake = runner.lock().next_rerun_at();
                if let Some(at) = wake.filter(|at| *at > Instant::now()) {
                    tokio::time::sleep_until(at.into()).await;
                }

                // Merge queued reruns from the same origin
                while let Ok(next) = commands.try_recv() {
                    match next {
                        Command::Rerun {
                            origin: next_origin,
                            changes: more,
                            reply,
                        } if next_origin == origin => {
                            changes.extend(more);
                            replies.extend(reply);
                        }
                        other => {
                            backlog.push_back(other);
                            break;
                        }
                    }
                }
                debug!(session = %id, changes = changes.len(), waiting = replies.len(), "applying rerun");

                let result = blocking(&runner, move |r| r.rerun_from(origin, changes)).await;
                for reply in replies {
                    respond(reply, result.clone());
                }
            }
        }
    }

    debug!(session = %id, "session task finished");
}
