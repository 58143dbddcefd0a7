use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{SessionController, StoppedDetails};
use crate::breakpoints::Breakpoint;
use crate::call_stack::StackFrameData;
use crate::errors::SessionError;
use crate::run_state::RunState;
use crate::types::{Thread, Variable};

type Reply<T> = oneshot::Sender<T>;

enum SessionCommand {
    SetTarget(String),
    StartDebug(String, Reply<Result<(), SessionError>>),
    Restart(Reply<Result<(), SessionError>>),
    Terminate(Reply<Result<(), SessionError>>),
    Continue(Option<i64>, Reply<Result<(), SessionError>>),
    StepOver(Option<i64>, Reply<Result<(), SessionError>>),
    StepIn(Option<i64>, Reply<Result<(), SessionError>>),
    StepOut(Option<i64>, Reply<Result<(), SessionError>>),
    Pause(Option<i64>, Reply<Result<(), SessionError>>),
    AddBreakpoint(String, i64, Reply<Result<(), SessionError>>),
    RemoveBreakpoint(String, i64, Reply<Result<(), SessionError>>),
    SelectBreakpoint(usize, Reply<Option<Breakpoint>>),
    SelectFrame(usize, Reply<Option<StackFrameData>>),
    Locals(i64, Reply<Result<Vec<Variable>, SessionError>>),
    Snapshot(Reply<SessionSnapshot>),
}

/// A copy of the controller's read-only views at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub run_state: RunState,
    pub is_active: bool,
    pub target: Option<String>,
    pub breakpoints: Vec<Breakpoint>,
    pub call_stack: Vec<StackFrameData>,
    pub current_frame: StackFrameData,
    pub threads: Vec<Thread>,
    pub active_thread: Option<i64>,
    pub stopped_details: Vec<StoppedDetails>,
}

impl SessionController {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            run_state: self.run_state(),
            is_active: self.is_active(),
            target: self.target().map(str::to_string),
            breakpoints: self.breakpoints().to_vec(),
            call_stack: self.call_stack().to_vec(),
            current_frame: self.current_frame(),
            threads: self.threads().to_vec(),
            active_thread: self.active_thread(),
            stopped_details: self.stopped_details().to_vec(),
        }
    }

    /// Picks the given thread, else the one that stopped last. Without any, the
    /// command is ignored.
    fn thread_or_active(&self, thread_id: Option<i64>) -> Option<i64> {
        thread_id.or_else(|| self.active_thread())
    }
}

/// Runs a controller on its own task.
///
/// The task handles user commands and backend messages strictly one at a
/// time. It ends, terminating any running session, once every handle is gone.
pub struct SessionActor {
    controller: SessionController,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
}

enum Step {
    Command(SessionCommand),
    Inbound(crate::transport::Inbound),
    HandlesGone,
}

impl SessionActor {
    pub fn spawn(controller: SessionController) -> (SessionHandle, JoinHandle<()>) {
        let (sender, commands) = mpsc::unbounded_channel();
        let actor = Self {
            controller,
            commands,
        };
        let task = tokio::spawn(actor.run());
        (SessionHandle { commands: sender }, task)
    }

    async fn run(mut self) {
        loop {
            let step = tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::HandlesGone,
                },
                inbound = self.controller.next_inbound() => Step::Inbound(inbound),
            };
            match step {
                Step::Command(command) => self.execute(command).await,
                Step::Inbound(inbound) => self.controller.handle_inbound(inbound).await,
                Step::HandlesGone => break,
            }
        }
        debug!("All session handles are gone.");
        if let Err(error) = self.controller.terminate().await {
            warn!("Terminating on shutdown failed: {error}");
        }
    }

    async fn execute(&mut self, command: SessionCommand) {
        let controller = &mut self.controller;
        // A caller that stopped waiting doesn't care about the result.
        match command {
            SessionCommand::SetTarget(path) => controller.set_target(path),
            SessionCommand::StartDebug(target, reply) => {
                let _ = reply.send(controller.start_debug(&target).await);
            }
            SessionCommand::Restart(reply) => {
                let _ = reply.send(controller.restart().await);
            }
            SessionCommand::Terminate(reply) => {
                let _ = reply.send(controller.terminate().await);
            }
            SessionCommand::Continue(thread_id, reply) => {
                let result = match controller.thread_or_active(thread_id) {
                    Some(thread_id) => controller.continue_exec(thread_id).await,
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            SessionCommand::StepOver(thread_id, reply) => {
                let result = match controller.thread_or_active(thread_id) {
                    Some(thread_id) => controller.step_over(thread_id).await,
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            SessionCommand::StepIn(thread_id, reply) => {
                let result = match controller.thread_or_active(thread_id) {
                    Some(thread_id) => controller.step_in(thread_id).await,
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            SessionCommand::StepOut(thread_id, reply) => {
                let result = match controller.thread_or_active(thread_id) {
                    Some(thread_id) => controller.step_out(thread_id).await,
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            SessionCommand::Pause(thread_id, reply) => {
                let result = match controller.thread_or_active(thread_id) {
                    Some(thread_id) => controller.pause(thread_id).await,
                    None => Ok(()),
                };
                let _ = reply.send(result);
            }
            SessionCommand::AddBreakpoint(file_path, line, reply) => {
                let _ = reply.send(controller.add_breakpoint(&file_path, line).await);
            }
            SessionCommand::RemoveBreakpoint(file_path, line, reply) => {
                let _ = reply.send(controller.remove_breakpoint(&file_path, line).await);
            }
            SessionCommand::SelectBreakpoint(index, reply) => {
                let _ = reply.send(controller.select_breakpoint(index));
            }
            SessionCommand::SelectFrame(level, reply) => {
                let _ = reply.send(controller.select_frame(level).await);
            }
            SessionCommand::Locals(frame_id, reply) => {
                let _ = reply.send(controller.locals(frame_id).await);
            }
            SessionCommand::Snapshot(reply) => {
                let _ = reply.send(controller.snapshot());
            }
        }
    }
}

/// A cloneable way to talk to a [`SessionActor`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    async fn call<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .map_err(|_| SessionError::SessionTerminated)?;
        response.await.map_err(|_| SessionError::SessionTerminated)
    }

    pub fn set_target(&self, path: impl Into<String>) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::SetTarget(path.into()))
            .map_err(|_| SessionError::SessionTerminated)
    }

    pub async fn start_debug(&self, target: impl Into<String>) -> Result<(), SessionError> {
        let target = target.into();
        self.call(|reply| SessionCommand::StartDebug(target, reply))
            .await?
    }
    pub async fn restart(&self) -> Result<(), SessionError> {
        self.call(SessionCommand::Restart).await?
    }
    pub async fn terminate(&self) -> Result<(), SessionError> {
        self.call(SessionCommand::Terminate).await?
    }

    /// Resumes `thread_id`, or the active thread if `None`.
    pub async fn continue_exec(&self, thread_id: Option<i64>) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::Continue(thread_id, reply))
            .await?
    }
    pub async fn step_over(&self, thread_id: Option<i64>) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::StepOver(thread_id, reply))
            .await?
    }
    pub async fn step_in(&self, thread_id: Option<i64>) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::StepIn(thread_id, reply))
            .await?
    }
    pub async fn step_out(&self, thread_id: Option<i64>) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::StepOut(thread_id, reply))
            .await?
    }
    pub async fn pause(&self, thread_id: Option<i64>) -> Result<(), SessionError> {
        self.call(|reply| SessionCommand::Pause(thread_id, reply))
            .await?
    }

    pub async fn add_breakpoint(
        &self,
        file_path: impl Into<String>,
        line: i64,
    ) -> Result<(), SessionError> {
        let file_path = file_path.into();
        self.call(|reply| SessionCommand::AddBreakpoint(file_path, line, reply))
            .await?
    }
    pub async fn remove_breakpoint(
        &self,
        file_path: impl Into<String>,
        line: i64,
    ) -> Result<(), SessionError> {
        let file_path = file_path.into();
        self.call(|reply| SessionCommand::RemoveBreakpoint(file_path, line, reply))
            .await?
    }

    /// Navigates to the breakpoint at `index` in [`SessionSnapshot::breakpoints`].
    pub async fn select_breakpoint(&self, index: usize) -> Result<Option<Breakpoint>, SessionError> {
        self.call(|reply| SessionCommand::SelectBreakpoint(index, reply))
            .await
    }
    pub async fn select_frame(&self, level: usize) -> Result<Option<StackFrameData>, SessionError> {
        self.call(|reply| SessionCommand::SelectFrame(level, reply))
            .await
    }
    pub async fn locals(&self, frame_id: i64) -> Result<Vec<Variable>, SessionError> {
        self.call(|reply| SessionCommand::Locals(frame_id, reply))
            .await?
    }
    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        self.call(SessionCommand::Snapshot).await
    }
}
