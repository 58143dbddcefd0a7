use tracing::{debug, error, info, trace};

use super::{SessionController, StoppedDetails};
use crate::events::{
    BreakpointEventBody, Event, ExitedEventBody, OutputEventBody, StoppedEventBody,
    TerminatedEventBody,
};
use crate::notification::{Notice, Notification, Severity, UNKNOWN};
use crate::requests::Command;
use crate::run_state::Trigger;
use crate::types::OutputEventCategory;

impl SessionController {
    pub(super) async fn route_event(&mut self, event: Event) {
        debug!("Received a `{}` event.", event.kind());
        match event {
            Event::Initialized => self.on_initialized().await,
            Event::Stopped(body) => self.on_stopped(body).await,
            Event::Output(body) => self.on_output(body),
            Event::Exited(body) => self.on_exited(body),
            Event::Terminated(body) => self.on_terminated(body),
            Event::Capabilities(body) => {
                if let Some(session) = self.session.as_mut() {
                    session.capabilities.merge(body.capabilities);
                }
            }
            Event::Breakpoint(body) => self.on_breakpoint(body),
            Event::Continued(body) => trace!("Thread {} continued.", body.thread_id),
            Event::Thread(body) => trace!("Thread {} {}.", body.thread_id, body.reason),
            Event::Module(body) => trace!("Module {} {}.", body.module.name, body.reason),
            Event::LoadedSource(body) => trace!(
                "Source {} {}.",
                body.source.path.as_deref().unwrap_or("?"),
                body.reason,
            ),
            Event::Process(body) => trace!(
                "Debugging process {} ({:?}).",
                body.name,
                body.system_process_id,
            ),
            Event::ProgressStart(body) => trace!("Progress {}: {}", body.progress_id, body.title),
            Event::ProgressUpdate(body) => trace!(
                "Progress {}: {}",
                body.progress_id,
                body.message.unwrap_or_default(),
            ),
            Event::ProgressEnd(body) => trace!("Progress {} ended.", body.progress_id),
            Event::Invalidated(body) => trace!("Invalidated {:?}.", body.areas),
        }
    }

    async fn on_initialized(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.initialized = true;
        session.ready_for_breakpoints = true;
        let dispatcher = session.dispatcher.clone();
        let supports_configuration_done = session
            .capabilities
            .supports_configuration_done_request
            .unwrap_or(true);

        self.sync_all_breakpoints().await;

        if supports_configuration_done {
            match dispatcher.send(Command::ConfigurationDone).await {
                Ok(pending) => {
                    if let Some(session) = self.session.as_mut() {
                        session.barrier.arm(pending);
                    }
                }
                Err(error) => error!("Can't send `configurationDone`: {error}"),
            }
        }

        self.fetch_threads().await;

        let launched = self
            .session
            .as_ref()
            .map_or(false, |session| session.launched);
        if launched {
            self.transition(Trigger::Initialized { launched });
        }
    }

    async fn on_stopped(&mut self, body: StoppedEventBody) {
        self.variables.invalidate();
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.stopped.insert(0, StoppedDetails::from(&body));
        self.fetch_threads().await;

        let reason = body.reason;
        if reason.moves_focus() {
            let thread_id = match self.session.as_mut() {
                Some(session) => {
                    if body.thread_id.is_some() {
                        session.active_thread = body.thread_id;
                    }
                    session.active_thread
                }
                None => return,
            };
            match thread_id {
                Some(thread_id) => self.fetch_call_stack(thread_id).await,
                None => debug!("Stopped for {reason}, but no thread is known."),
            }
            let frame = self.call_stack.current_frame();
            self.show_frame(&frame).await;
            self.transition(Trigger::Stopped(reason));
        } else if reason.is_fatal() {
            let name = body
                .description
                .filter(|description| !description.is_empty())
                .unwrap_or_else(|| reason.to_string());
            let meaning = body.text.unwrap_or_default();
            self.notify(Notification::Notice(Notice::SignalReceived {
                name: or_unknown(name),
                meaning: or_unknown(meaning),
            }));
            self.log(Severity::Normal, "The debugee has Terminated.");
            self.end_session(Trigger::Stopped(reason));
        } else {
            debug!("Stopped for {reason}, which doesn't change the run-state.");
        }
    }

    fn on_output(&mut self, body: OutputEventBody) {
        let severity = classify_output(body.category.as_ref(), &body.output);
        self.log(severity, body.output);
    }

    fn on_exited(&mut self, body: ExitedEventBody) {
        info!("The debuggee exited with code {}.", body.exit_code);
        self.log(Severity::Normal, "The debugee has Exited.");
        self.end_session(Trigger::Exited);
    }

    fn on_terminated(&mut self, body: TerminatedEventBody) {
        if body.restart.is_some() {
            debug!("The debug adapter asks for a restart, which we don't do on our own.");
        }
        self.log(Severity::Normal, "The debugee has Terminated.");
        self.end_session(Trigger::Terminated);
    }

    fn on_breakpoint(&mut self, body: BreakpointEventBody) {
        trace!(
            "Breakpoint {:?} {} (verified: {}).",
            body.breakpoint.id,
            body.reason,
            body.breakpoint.verified,
        );
    }
}

fn or_unknown(value: String) -> String {
    if value.is_empty() {
        UNKNOWN.to_string()
    } else {
        value
    }
}

/// Debuggee crashes often only show up as output lines, so those are errors no
/// matter where they come from.
fn classify_output(category: Option<&OutputEventCategory>, text: &str) -> Severity {
    if text.contains("received signal") || text.contains("Program") {
        return Severity::Error;
    }
    match category {
        Some(OutputEventCategory::Stdout) => Severity::Output,
        Some(OutputEventCategory::Stderr) => Severity::Error,
        Some(_) => Severity::Log,
        None => Severity::Normal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_classified_by_category() {
        use OutputEventCategory::*;
        assert_eq!(classify_output(Some(&Stdout), "hello\n"), Severity::Output);
        assert_eq!(classify_output(Some(&Stderr), "oops\n"), Severity::Error);
        assert_eq!(classify_output(Some(&Console), "gdb says hi"), Severity::Log);
        assert_eq!(
            classify_output(Some(&String("custom".to_string())), "x"),
            Severity::Log
        );
        assert_eq!(classify_output(None, "plain"), Severity::Normal);
    }

    #[test]
    fn crash_lines_are_errors() {
        assert_eq!(
            classify_output(
                Some(&OutputEventCategory::Console),
                "Thread 1 received signal SIGSEGV"
            ),
            Severity::Error
        );
        assert_eq!(
            classify_output(Some(&OutputEventCategory::Stdout), "Program terminated"),
            Severity::Error
        );
    }

    #[test]
    fn empty_signal_details_are_unknown() {
        assert_eq!(or_unknown(String::new()), UNKNOWN);
        assert_eq!(or_unknown("SIGSEGV".to_string()), "SIGSEGV");
    }
}
