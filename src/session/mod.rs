use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::breakpoints::{Breakpoint, BreakpointRegistry};
use crate::call_stack::{CallStackCache, StackFrameData};
use crate::config::SessionConfig;
use crate::dispatcher::{ConfigurationBarrier, PendingResponse, RequestDispatcher};
use crate::errors::SessionError;
use crate::events::{Event, StoppedEventBody};
use crate::notification::{
    LogLine, Notice, Notification, SessionObserver, Severity, SourceLocation,
};
use crate::requests::{
    Command, InitializeArguments, LaunchRequestArguments, SetBreakpointsArguments,
    StackTraceArguments, TerminateArguments, ThreadArguments,
};
use crate::responses::{Response, SetBreakpointsResponse, StackTraceResponse, ThreadsResponse};
use crate::run_state::{RunState, RunStateMachine, Trigger};
use crate::transport::{spawn_reader, BackendProcess, Connector, Inbound};
use crate::types::{Capabilities, StoppedEventReason, Thread, Variable};
use crate::variables::VariableResolver;

pub mod actor;
mod event_router;

/// What the backend told us about one stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoppedDetails {
    pub reason: StoppedEventReason,
    pub description: Option<String>,
    pub thread_id: Option<i64>,
    pub text: Option<String>,
    pub all_threads_stopped: bool,
    pub hit_breakpoint_ids: Vec<i64>,
}

impl From<&StoppedEventBody> for StoppedDetails {
    fn from(body: &StoppedEventBody) -> Self {
        Self {
            reason: body.reason.clone(),
            description: body.description.clone(),
            thread_id: body.thread_id,
            text: body.text.clone(),
            all_threads_stopped: body.all_threads_stopped.unwrap_or_default(),
            hit_breakpoint_ids: body.hit_breakpoint_ids.clone().unwrap_or_default(),
        }
    }
}

/// Everything that only lives as long as one backend run.
struct Session {
    dispatcher: Arc<RequestDispatcher>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    backend: Box<dyn BackendProcess>,
    reader_task: JoinHandle<()>,
    capabilities: Capabilities,
    active_thread: Option<i64>,
    threads: Vec<Thread>,
    stopped: Vec<StoppedDetails>,
    ready_for_breakpoints: bool,
    initialized: bool,
    launched: bool,
    terminating: bool,
    barrier: ConfigurationBarrier,
}

impl Drop for Session {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

enum Step<T> {
    Done(T),
    Inbound(Inbound),
}

/// Drives one debug backend at a time and owns all session state.
///
/// Every mutation happens through `&mut self`, so inbound messages and user
/// commands are applied one after another. Collaborators learn about changes
/// through the [`SessionObserver`].
pub struct SessionController {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    observer: Arc<dyn SessionObserver>,
    target: Option<String>,
    run_state: RunStateMachine,
    breakpoints: BreakpointRegistry,
    call_stack: CallStackCache,
    variables: VariableResolver,
    session: Option<Session>,
}

impl SessionController {
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        observer: Arc<dyn SessionObserver>,
    ) -> Self {
        Self {
            config,
            connector,
            observer,
            target: None,
            run_state: RunStateMachine::default(),
            breakpoints: BreakpointRegistry::default(),
            call_stack: CallStackCache::default(),
            variables: VariableResolver::default(),
            session: None,
        }
    }

    // Lifecycle

    /// Remembers the executable a build produced.
    pub fn set_target(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.target = (!path.is_empty()).then_some(path);
    }

    pub async fn start_debug(&mut self, target: &str) -> Result<(), SessionError> {
        if target.is_empty() {
            self.notify(Notification::Notice(Notice::BuildRequired));
            return Err(SessionError::configuration("Please build first."));
        }
        if self.session.is_some() {
            return Err(SessionError::configuration(
                "A debug session is already running.",
            ));
        }
        self.target = Some(target.to_string());
        self.log(Severity::Normal, "Debugging starts");

        match self.open_session(target).await {
            Ok(()) => Ok(()),
            Err(error) => {
                error!("Starting the debug session failed: {error}");
                self.log(Severity::Error, format!("Debugging failed to start. {error}"));
                self.close_session();
                Err(error)
            }
        }
    }

    async fn open_session(&mut self, target: &str) -> Result<(), SessionError> {
        let connection = self.connector.connect(&self.config).await?;
        let dispatcher = RequestDispatcher::new(connection.writer, self.config.request_timeout());
        let (sender, inbound) = mpsc::unbounded_channel();
        let reader_task = spawn_reader(connection.reader, dispatcher.clone(), sender);
        self.session = Some(Session {
            dispatcher: dispatcher.clone(),
            inbound,
            backend: connection.backend,
            reader_task,
            capabilities: Capabilities::default(),
            active_thread: None,
            threads: vec![],
            stopped: vec![],
            ready_for_breakpoints: false,
            initialized: false,
            launched: false,
            terminating: false,
            barrier: ConfigurationBarrier::default(),
        });

        let initialize = dispatcher
            .send(Command::Initialize(InitializeArguments::new(
                &self.config.client_id,
                &self.config.client_name,
                &self.config.adapter_id,
            )))
            .await?;
        let capabilities: Capabilities = self.wait_routing(initialize).await?.body_as()?;
        if let Some(session) = self.session.as_mut() {
            session.capabilities = capabilities;
        }
        info!("The debug adapter is initialized.");

        let launch = dispatcher
            .send(Command::Launch(LaunchRequestArguments {
                program: target.to_string(),
            }))
            .await?;
        self.wait_routing(launch).await?;
        info!("Launched {target}.");

        let Some(session) = self.session.as_mut() else {
            // The debuggee finished before we even saw the launch response.
            return Ok(());
        };
        session.launched = true;
        if session.initialized {
            self.transition(Trigger::Initialized { launched: true });
        }
        Ok(())
    }

    /// Waits for `pending` while handling everything else the backend sends.
    ///
    /// A resolved response is returned before any message queued after it is
    /// handled, so callers see their answer in wire order.
    async fn wait_routing(&mut self, pending: PendingResponse) -> Result<Response, SessionError> {
        let response = pending.wait();
        tokio::pin!(response);
        loop {
            let step = tokio::select! {
                biased;
                result = &mut response => Step::Done(result),
                inbound = self.next_inbound() => Step::Inbound(inbound),
            };
            match step {
                Step::Done(result) => return result,
                Step::Inbound(inbound) => self.handle_inbound(inbound).await,
            }
        }
    }

    /// Ends the session: asks the backend to terminate and kills it if it doesn't
    /// within the grace period.
    pub async fn terminate(&mut self) -> Result<(), SessionError> {
        let Some(session) = self.session.as_mut() else {
            debug!("No debug session to terminate.");
            return Ok(());
        };
        info!("Terminating the debug session.");
        session.terminating = true;
        let dispatcher = session.dispatcher.clone();
        let deadline = tokio::time::Instant::now() + self.config.terminate_grace();

        match dispatcher
            .send(Command::Terminate(TerminateArguments::default()))
            .await
        {
            Ok(pending) => {
                // The acknowledgment alone doesn't end anything; the
                // `terminated` or `exited` event does.
                tokio::spawn(async move {
                    match pending.wait().await {
                        Ok(_) => debug!("The debug adapter acknowledged `terminate`."),
                        Err(error) => debug!("`terminate` was not acknowledged: {error}"),
                    }
                });
            }
            Err(error) => warn!("Can't ask the debug adapter to terminate: {error}"),
        }

        let expired = tokio::time::sleep_until(deadline);
        tokio::pin!(expired);
        while self.session.is_some() {
            let step = tokio::select! {
                _ = &mut expired => Step::Done(()),
                inbound = self.next_inbound() => Step::Inbound(inbound),
            };
            match step {
                Step::Done(()) => {
                    self.force_stop().await;
                    break;
                }
                Step::Inbound(inbound) => self.handle_inbound(inbound).await,
            }
        }
        Ok(())
    }

    async fn force_stop(&mut self) {
        if let Some(session) = self.session.as_mut() {
            warn!("The debug adapter didn't terminate in time. Killing it.");
            if let Err(error) = session.backend.kill().await {
                error!("{error}");
            }
            session.dispatcher.fail_all(SessionError::SessionTerminated);
        }
        self.end_session(Trigger::ForcedStop);
    }

    pub async fn restart(&mut self) -> Result<(), SessionError> {
        let target = self.target.clone().unwrap_or_default();
        self.terminate().await?;
        self.start_debug(&target).await
    }

    // Execution control

    pub async fn continue_exec(&mut self, thread_id: i64) -> Result<(), SessionError> {
        self.resume(Command::Continue(ThreadArguments { thread_id }))
            .await
    }
    pub async fn step_over(&mut self, thread_id: i64) -> Result<(), SessionError> {
        self.resume(Command::Next(ThreadArguments { thread_id })).await
    }
    pub async fn step_in(&mut self, thread_id: i64) -> Result<(), SessionError> {
        self.resume(Command::StepIn(ThreadArguments { thread_id }))
            .await
    }
    pub async fn step_out(&mut self, thread_id: i64) -> Result<(), SessionError> {
        self.resume(Command::StepOut(ThreadArguments { thread_id }))
            .await
    }

    pub async fn pause(&mut self, thread_id: i64) -> Result<(), SessionError> {
        let Some(dispatcher) = self.dispatcher() else {
            debug!("No debug session, ignoring `pause`.");
            return Ok(());
        };
        let pending = dispatcher
            .send(Command::Pause(ThreadArguments { thread_id }))
            .await?;
        self.wait_routing(pending).await?;
        Ok(())
    }

    async fn resume(&mut self, command: Command) -> Result<(), SessionError> {
        debug_assert!(command.resumes());
        let Some(dispatcher) = self.dispatcher() else {
            debug!("No debug session, ignoring `{}`.", command.name());
            return Ok(());
        };
        self.await_configuration(command.name()).await?;
        let pending = dispatcher.send(command).await?;
        self.wait_routing(pending).await?;

        self.transition(Trigger::ResumeAccepted);
        self.notify(Notification::ClearNavigation);
        Ok(())
    }

    /// Handles inbound messages until `initialized` was processed, then waits
    /// for the `configurationDone` answer. Gives up after the request timeout.
    async fn await_configuration(&mut self, command: &'static str) -> Result<(), SessionError> {
        let expired = tokio::time::sleep(self.config.request_timeout());
        tokio::pin!(expired);
        loop {
            let Some(session) = self.session.as_mut() else {
                return Err(SessionError::SessionTerminated);
            };
            if session.initialized {
                return session.barrier.wait().await;
            }
            debug!("`{command}` waits for the debug adapter to be initialized.");
            let step = tokio::select! {
                biased;
                inbound = self.next_inbound() => Step::Inbound(inbound),
                _ = &mut expired => Step::Done(()),
            };
            match step {
                Step::Inbound(inbound) => self.handle_inbound(inbound).await,
                Step::Done(()) => {
                    warn!("The debug adapter never sent `initialized`; not sending `{command}`.");
                    return Err(SessionError::Timeout {
                        command: command.to_string(),
                    });
                }
            }
        }
    }

    // Breakpoints

    pub async fn add_breakpoint(&mut self, file_path: &str, line: i64) -> Result<(), SessionError> {
        check_location(file_path, line)?;
        self.breakpoints.insert(Breakpoint::new(file_path, line));
        self.notify_breakpoints();
        if self.is_ready_for_breakpoints() {
            self.sync_breakpoints(file_path).await?;
        } else {
            debug!("Breakpoint {file_path}:{line} is sent once the backend is ready.");
        }
        Ok(())
    }

    pub async fn remove_breakpoint(
        &mut self,
        file_path: &str,
        line: i64,
    ) -> Result<(), SessionError> {
        if self.breakpoints.remove(file_path, line).is_none() {
            trace!("There is no breakpoint at {file_path}:{line}.");
            return Ok(());
        }
        self.notify_breakpoints();
        if self.is_ready_for_breakpoints() {
            self.sync_breakpoints(file_path).await?;
        }
        Ok(())
    }

    /// Replaces the backend's breakpoints in `file_path` with ours.
    async fn sync_breakpoints(&mut self, file_path: &str) -> Result<(), SessionError> {
        let Some(dispatcher) = self.dispatcher() else {
            return Ok(());
        };
        let (source, breakpoints) = self.breakpoints.source_breakpoints(file_path);
        let response: SetBreakpointsResponse = dispatcher
            .request(Command::SetBreakpoints(SetBreakpointsArguments {
                source,
                breakpoints,
                source_modified: false,
            }))
            .await?;
        self.breakpoints
            .apply_acks(file_path, &response.breakpoints);
        self.notify_breakpoints();
        Ok(())
    }

    async fn sync_all_breakpoints(&mut self) {
        for file_path in self.breakpoints.files() {
            if let Err(error) = self.sync_breakpoints(&file_path).await {
                error!("Can't set the breakpoints of {file_path}: {error}");
                self.log(
                    Severity::Error,
                    format!("Can't set the breakpoints of {file_path}. {error}"),
                );
            }
        }
    }

    /// Shows the breakpoint at `index` in the registry's order.
    pub fn select_breakpoint(&self, index: usize) -> Option<Breakpoint> {
        let Some(breakpoint) = self.breakpoints.all().get(index).cloned() else {
            debug!("There is no breakpoint at index {index}.");
            return None;
        };
        self.notify(Notification::NavigateTo(SourceLocation {
            file: breakpoint.file_path.clone(),
            line: breakpoint.line,
        }));
        Some(breakpoint)
    }

    // Stack and variables

    /// Moves the frame cursor, shows the frame and refreshes its locals.
    pub async fn select_frame(&mut self, level: usize) -> Option<StackFrameData> {
        let Some(frame) = self.call_stack.select(level).cloned() else {
            debug!("There is no frame at level {level}.");
            return None;
        };
        self.show_frame(&frame).await;
        Some(frame)
    }

    pub async fn locals(&mut self, frame_id: i64) -> Result<Vec<Variable>, SessionError> {
        if !self.call_stack.contains(frame_id) {
            return Err(SessionError::UnknownFrameError { frame_id });
        }
        let dispatcher = self.dispatcher().ok_or(SessionError::SessionTerminated)?;
        self.variables
            .fetch(frame_id, &dispatcher, &self.call_stack)
            .await
    }

    async fn fetch_threads(&mut self) {
        let Some(dispatcher) = self.dispatcher() else {
            return;
        };
        match dispatcher.request::<ThreadsResponse>(Command::Threads).await {
            Ok(response) => {
                if let Some(session) = self.session.as_mut() {
                    if session.active_thread.is_none() {
                        session.active_thread = response.threads.first().map(|thread| thread.id);
                    }
                    session.threads = response.threads;
                }
            }
            Err(error) => warn!("Can't fetch the threads: {error}"),
        }
    }

    async fn fetch_call_stack(&mut self, thread_id: i64) {
        let Some(dispatcher) = self.dispatcher() else {
            return;
        };
        let request = Command::StackTrace(StackTraceArguments {
            thread_id,
            start_frame: None,
            levels: None,
        });
        match dispatcher.request::<StackTraceResponse>(request).await {
            Ok(response) => self.call_stack.set_frames(thread_id, &response.stack_frames),
            Err(error) => {
                error!("Can't fetch the call stack of thread {thread_id}: {error}");
                self.call_stack.clear();
            }
        }
        self.notify(Notification::CallStack(self.call_stack.frames().to_vec()));
    }

    async fn show_frame(&mut self, frame: &StackFrameData) {
        if frame.is_sentinel() {
            return;
        }
        match &frame.file {
            Some(file) if frame.has_location() => {
                self.notify(Notification::NavigateTo(SourceLocation {
                    file: file.clone(),
                    line: frame.line,
                }));
            }
            _ => self.notify(Notification::ClearNavigation),
        }
        match self.locals(frame.frame_id).await {
            Ok(variables) => self.notify(Notification::Locals {
                frame_id: frame.frame_id,
                variables,
            }),
            Err(error) => warn!("Can't fetch the locals of frame {}: {error}", frame.frame_id),
        }
    }

    // Inbound messages

    /// The next message from the backend. Never completes without a session.
    pub async fn next_inbound(&mut self) -> Inbound {
        match self.session.as_mut() {
            Some(session) => session.inbound.recv().await.unwrap_or_else(|| {
                Inbound::Closed(SessionError::transport("The reader task stopped."))
            }),
            None => std::future::pending().await,
        }
    }

    pub async fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Event(raw) => match Event::parse(&raw.event, raw.body) {
                Ok(Some(event)) => self.route_event(event).await,
                Ok(None) => trace!("Ignoring the unknown event `{}`.", raw.event),
                Err(error) => {
                    let error = SessionError::from(error);
                    warn!("Dropping the `{}` event {}: {error}", raw.event, raw.seq);
                }
            },
            Inbound::ReverseRequest(request) => {
                let Some(dispatcher) = self.dispatcher() else {
                    return;
                };
                debug!("The debug adapter asks for `{}`.", request.command);
                if let Err(error) = dispatcher.reply(&request).await {
                    warn!("Can't answer `{}`: {error}", request.command);
                }
            }
            Inbound::Closed(error) => {
                let terminating = self
                    .session
                    .as_ref()
                    .map_or(false, |session| session.terminating);
                if terminating {
                    debug!("The debug adapter closed the connection: {error}");
                } else {
                    error!("Lost the connection to the debug adapter: {error}");
                    self.log(Severity::Error, format!("Lost the debug adapter. {error}"));
                    self.notify(Notification::Notice(Notice::BackendLost {
                        reason: error.to_string(),
                    }));
                }
                self.end_session(Trigger::ForcedStop);
            }
        }
    }

    // State plumbing

    /// Applies `trigger`. Entering `NoRun` clears everything tied to the stop.
    fn transition(&mut self, trigger: Trigger) {
        let Some((from, to)) = self.run_state.apply(&trigger) else {
            return;
        };
        info!("Run-state: {from} -> {to}");
        if to == RunState::NoRun {
            self.variables.invalidate();
            self.call_stack.clear();
            self.notify(Notification::ClearNavigation);
            self.notify(Notification::CallStack(vec![]));
        }
        self.notify(Notification::RunStateChanged { from, to });
    }

    /// Moves to `NoRun` through `trigger` and drops the session.
    fn end_session(&mut self, trigger: Trigger) {
        self.transition(trigger);
        self.close_session();
    }

    fn close_session(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        session.dispatcher.fail_all(SessionError::SessionTerminated);
        drop(session);
        self.variables.invalidate();
        self.call_stack.clear();
        self.breakpoints.reset_backend_state();
        if !self.breakpoints.is_empty() {
            self.notify_breakpoints();
        }
        info!("The debug session is closed.");
    }

    fn is_ready_for_breakpoints(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |session| session.ready_for_breakpoints)
    }

    fn notify(&self, notification: Notification) {
        self.observer.notify(notification);
    }

    fn log(&self, severity: Severity, text: impl Into<String>) {
        self.notify(Notification::Log(LogLine::new(severity, text)));
    }

    fn notify_breakpoints(&self) {
        self.notify(Notification::Breakpoints(self.breakpoints.all().to_vec()));
    }

    // Views

    pub fn run_state(&self) -> RunState {
        self.run_state.state()
    }
    pub fn breakpoints(&self) -> &[Breakpoint] {
        self.breakpoints.all()
    }
    pub fn call_stack(&self) -> &[StackFrameData] {
        self.call_stack.frames()
    }
    pub fn current_frame(&self) -> StackFrameData {
        self.call_stack.current_frame()
    }
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }
    pub fn threads(&self) -> &[Thread] {
        self.session
            .as_ref()
            .map(|session| session.threads.as_slice())
            .unwrap_or_default()
    }
    pub fn active_thread(&self) -> Option<i64> {
        self.session.as_ref().and_then(|session| session.active_thread)
    }
    /// All stops of the current session, the most recent first.
    pub fn stopped_details(&self) -> &[StoppedDetails] {
        self.session
            .as_ref()
            .map(|session| session.stopped.as_slice())
            .unwrap_or_default()
    }
    /// The latest stop, if the debuggee stopped at all in this session.
    pub fn current_stop(&self) -> Option<&StoppedDetails> {
        self.stopped_details().first()
    }
    pub fn capabilities(&self) -> Option<&Capabilities> {
        self.session.as_ref().map(|session| &session.capabilities)
    }
    pub fn dispatcher(&self) -> Option<Arc<RequestDispatcher>> {
        self.session
            .as_ref()
            .map(|session| session.dispatcher.clone())
    }
}

fn check_location(file_path: &str, line: i64) -> Result<(), SessionError> {
    if file_path.is_empty() {
        return Err(SessionError::configuration("A breakpoint needs a file."));
    }
    if line < 1 {
        return Err(SessionError::configuration(format!(
            "Line {line} is not a valid breakpoint line."
        )));
    }
    Ok(())
}
