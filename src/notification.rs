use std::fmt;

use chrono::{DateTime, Local};
use tokio::sync::mpsc;

use crate::breakpoints::Breakpoint;
use crate::call_stack::StackFrameData;
use crate::run_state::RunState;
use crate::types::Variable;

/// Shown for signal details the backend did not provide.
pub const UNKNOWN: &str = "<Unknown>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Messages of the session itself; rendered with a timestamp.
    Normal,
    /// Regular output of the debuggee.
    Output,
    Error,
    /// Diagnostics of the debugger.
    Log,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub severity: Severity,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl LogLine {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Normal => write!(f, "{}:{}", self.timestamp.format("%H:%M:%S"), self.text),
            _ => f.write_str(&self.text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: String,
    pub line: i64,
}

/// Things a user has to acknowledge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The debuggee was stopped by a signal or an exception and can't go on.
    SignalReceived { name: String, meaning: String },
    BackendLost { reason: String },
    /// There is no target yet.
    BuildRequired,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::SignalReceived { name, meaning } => write!(
                f,
                "The debugee stopped because it received a signal.\nSignal name: {name}\nSignal meaning: {meaning}",
            ),
            Notice::BackendLost { reason } => write!(f, "Lost the debug adapter: {reason}"),
            Notice::BuildRequired => f.write_str("Please build first."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Log(LogLine),
    RunStateChanged { from: RunState, to: RunState },
    CallStack(Vec<StackFrameData>),
    Locals { frame_id: i64, variables: Vec<Variable> },
    Breakpoints(Vec<Breakpoint>),
    /// The editor should show this location as the current execution point.
    NavigateTo(SourceLocation),
    /// The current execution point is gone.
    ClearNavigation,
    Notice(Notice),
}

/// Receives everything the session wants collaborators to know.
pub trait SessionObserver: Send + Sync {
    fn notify(&self, notification: Notification);
}

impl SessionObserver for mpsc::UnboundedSender<Notification> {
    fn notify(&self, notification: Notification) {
        if self.send(notification).is_err() {
            tracing::trace!("Nobody listens to session notifications anymore.");
        }
    }
}

/// Drops every notification.
pub struct IgnoreNotifications;

impl SessionObserver for IgnoreNotifications {
    fn notify(&self, _: Notification) {}
}
