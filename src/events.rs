use std::fmt;
use std::str::FromStr;

use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::{
    errors::DeserializationError,
    types::{
        Breakpoint, Capabilities, ChangeReason, Module, OutputEventCategory, Source,
        StoppedEventReason, ThreadEventReason,
    },
};

/// The closed set of event kinds the session understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Initialized,
    Stopped,
    Continued,
    Exited,
    Terminated,
    Thread,
    Output,
    Breakpoint,
    Module,
    LoadedSource,
    Process,
    Capabilities,
    ProgressStart,
    ProgressUpdate,
    ProgressEnd,
    Invalidated,
}

impl FromStr for EventKind {
    type Err = DeserializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initialized" => Ok(EventKind::Initialized),
            "stopped" => Ok(EventKind::Stopped),
            "continued" => Ok(EventKind::Continued),
            "exited" => Ok(EventKind::Exited),
            "terminated" => Ok(EventKind::Terminated),
            "thread" => Ok(EventKind::Thread),
            "output" => Ok(EventKind::Output),
            "breakpoint" => Ok(EventKind::Breakpoint),
            "module" => Ok(EventKind::Module),
            "loadedSource" => Ok(EventKind::LoadedSource),
            "process" => Ok(EventKind::Process),
            "capabilities" => Ok(EventKind::Capabilities),
            "progressStart" => Ok(EventKind::ProgressStart),
            "progressUpdate" => Ok(EventKind::ProgressUpdate),
            "progressEnd" => Ok(EventKind::ProgressEnd),
            "invalidated" => Ok(EventKind::Invalidated),
            other => Err(DeserializationError::StringToEnumParseError {
                enum_name: "EventKind".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Initialized => "initialized",
            EventKind::Stopped => "stopped",
            EventKind::Continued => "continued",
            EventKind::Exited => "exited",
            EventKind::Terminated => "terminated",
            EventKind::Thread => "thread",
            EventKind::Output => "output",
            EventKind::Breakpoint => "breakpoint",
            EventKind::Module => "module",
            EventKind::LoadedSource => "loadedSource",
            EventKind::Process => "process",
            EventKind::Capabilities => "capabilities",
            EventKind::ProgressStart => "progressStart",
            EventKind::ProgressUpdate => "progressUpdate",
            EventKind::ProgressEnd => "progressEnd",
            EventKind::Invalidated => "invalidated",
        })
    }
}

/// Why and where the debuggee stopped.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    /// Decides whether the stop moves the focus, ends the run or changes nothing.
    pub reason: StoppedEventReason,
    /// The full reason for the event, e.g. 'Paused on exception'.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub thread_id: Option<i64>,
    #[serde(default)]
    pub preserve_focus_hint: Option<bool>,
    /// For signals and exceptions, what they mean.
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub all_threads_stopped: Option<bool>,
    /// Ids of the breakpoints that triggered the event.
    #[serde(default)]
    pub hit_breakpoint_ids: Option<Vec<i64>>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContinuedEventBody {
    pub thread_id: i64,
    #[serde(default)]
    pub all_threads_continued: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExitedEventBody {
    pub exit_code: i64,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TerminatedEventBody {
    /// Set when the adapter wants a new session. It is only logged.
    #[serde(default)]
    pub restart: Option<Value>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEventBody {
    pub reason: ThreadEventReason,
    pub thread_id: i64,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OutputEventBody {
    /// The output category. Missing means the adapter did not classify the line.
    #[serde(default)]
    pub category: Option<OutputEventCategory>,
    /// The output to report.
    pub output: String,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub line: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BreakpointEventBody {
    pub reason: ChangeReason,
    /// Matched to ours through `id`.
    pub breakpoint: Breakpoint,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ModuleEventBody {
    pub reason: ChangeReason,
    pub module: Module,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoadedSourceEventBody {
    pub reason: ChangeReason,
    pub source: Source,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEventBody {
    /// The logical name of the process.
    pub name: String,
    /// The system process id of the debugged process.
    #[serde(default)]
    pub system_process_id: Option<i64>,
    #[serde(default)]
    pub is_local_process: Option<bool>,
    /// Values: 'launch', 'attach', 'attachForSuspendedLaunch'.
    #[serde(default)]
    pub start_method: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CapabilitiesEventBody {
    pub capabilities: Capabilities,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStartEventBody {
    pub progress_id: String,
    pub title: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdateEventBody {
    pub progress_id: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEndEventBody {
    pub progress_id: String,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvalidatedEventBody {
    /// Set of logical areas that got invalidated.
    #[serde(default)]
    pub areas: Option<Vec<String>>,
    #[serde(default)]
    pub thread_id: Option<i64>,
    #[serde(default)]
    pub stack_frame_id: Option<i64>,
}

/// An event with its parsed body.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The adapter accepts breakpoints and `configurationDone` from now on.
    ///
    /// Specification: [Initialized event](https://microsoft.github.io/debug-adapter-protocol/specification#Events_Initialized)
    Initialized,
    /// The debuggee, or one of its threads, stopped.
    ///
    /// Specification: [Stopped event](https://microsoft.github.io/debug-adapter-protocol/specification#Events_Stopped)
    Stopped(StoppedEventBody),
    Continued(ContinuedEventBody),
    Exited(ExitedEventBody),
    /// The debug session is over, whether or not the debuggee exited.
    Terminated(TerminatedEventBody),
    Thread(ThreadEventBody),
    Output(OutputEventBody),
    Breakpoint(BreakpointEventBody),
    Module(ModuleEventBody),
    LoadedSource(LoadedSourceEventBody),
    Process(ProcessEventBody),
    Capabilities(CapabilitiesEventBody),
    ProgressStart(ProgressStartEventBody),
    ProgressUpdate(ProgressUpdateEventBody),
    ProgressEnd(ProgressEndEventBody),
    Invalidated(InvalidatedEventBody),
}

impl Event {
    /// Parses an event from its name and raw body.
    ///
    /// Returns `Ok(None)` for event names outside of [`EventKind`]. A body that does
    /// not match its kind is an error.
    pub fn parse(name: &str, body: Option<Value>) -> Result<Option<Event>, DeserializationError> {
        let Ok(kind) = name.parse::<EventKind>() else {
            return Ok(None);
        };
        let event = match kind {
            EventKind::Initialized => Event::Initialized,
            EventKind::Stopped => Event::Stopped(parse_body(body)?),
            EventKind::Continued => Event::Continued(parse_body(body)?),
            EventKind::Exited => Event::Exited(parse_body(body)?),
            EventKind::Terminated => Event::Terminated(parse_body(body)?),
            EventKind::Thread => Event::Thread(parse_body(body)?),
            EventKind::Output => Event::Output(parse_body(body)?),
            EventKind::Breakpoint => Event::Breakpoint(parse_body(body)?),
            EventKind::Module => Event::Module(parse_body(body)?),
            EventKind::LoadedSource => Event::LoadedSource(parse_body(body)?),
            EventKind::Process => Event::Process(parse_body(body)?),
            EventKind::Capabilities => Event::Capabilities(parse_body(body)?),
            EventKind::ProgressStart => Event::ProgressStart(parse_body(body)?),
            EventKind::ProgressUpdate => Event::ProgressUpdate(parse_body(body)?),
            EventKind::ProgressEnd => Event::ProgressEnd(parse_body(body)?),
            EventKind::Invalidated => Event::Invalidated(parse_body(body)?),
        };
        Ok(Some(event))
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Event::Initialized => EventKind::Initialized,
            Event::Stopped(_) => EventKind::Stopped,
            Event::Continued(_) => EventKind::Continued,
            Event::Exited(_) => EventKind::Exited,
            Event::Terminated(_) => EventKind::Terminated,
            Event::Thread(_) => EventKind::Thread,
            Event::Output(_) => EventKind::Output,
            Event::Breakpoint(_) => EventKind::Breakpoint,
            Event::Module(_) => EventKind::Module,
            Event::LoadedSource(_) => EventKind::LoadedSource,
            Event::Process(_) => EventKind::Process,
            Event::Capabilities(_) => EventKind::Capabilities,
            Event::ProgressStart(_) => EventKind::ProgressStart,
            Event::ProgressUpdate(_) => EventKind::ProgressUpdate,
            Event::ProgressEnd(_) => EventKind::ProgressEnd,
            Event::Invalidated(_) => EventKind::Invalidated,
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: Option<Value>) -> Result<T, DeserializationError> {
    let body = body.unwrap_or_else(|| Value::Object(Default::default()));
    Ok(serde_json::from_value(body)?)
}
