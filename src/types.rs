use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::errors::DeserializationError;
use crate::{fromstr_deser, tostr_ser};

/// Capabilities reported by the debug adapter in the `initialize` response and in
/// `capabilities` events.
///
/// Only the flags the session layer looks at are modelled; everything else the
/// adapter sends is ignored.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Capabilities {
    /// `false` means no `configurationDone` is sent after `initialized`.
    pub supports_configuration_done_request: Option<bool>,
    pub supports_function_breakpoints: Option<bool>,
    pub supports_conditional_breakpoints: Option<bool>,
    pub supports_restart_request: Option<bool>,
    pub supports_terminate_request: Option<bool>,
    /// The adapter may answer `stackTrace` with fewer frames than it has.
    pub supports_delayed_stack_trace_loading: Option<bool>,
}

impl Capabilities {
    /// Overwrites every flag that `changed` reports, keeping the others.
    pub fn merge(&mut self, changed: Capabilities) {
        fn take(into: &mut Option<bool>, from: Option<bool>) {
            if from.is_some() {
                *into = from;
            }
        }
        take(
            &mut self.supports_configuration_done_request,
            changed.supports_configuration_done_request,
        );
        take(
            &mut self.supports_function_breakpoints,
            changed.supports_function_breakpoints,
        );
        take(
            &mut self.supports_conditional_breakpoints,
            changed.supports_conditional_breakpoints,
        );
        take(
            &mut self.supports_restart_request,
            changed.supports_restart_request,
        );
        take(
            &mut self.supports_terminate_request,
            changed.supports_terminate_request,
        );
        take(
            &mut self.supports_delayed_stack_trace_loading,
            changed.supports_delayed_stack_trace_loading,
        );
    }
}

/// Where code lives. Frames point at one, and breakpoints are set per source.
///
/// Specification: [Source](https://microsoft.github.io/debug-adapter-protocol/specification#Types_Source)
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    /// Usually the file name. Adapters always send one; we send one too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Absolute path of the file. Adapters sometimes send an empty string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Non-zero for sources that only exist inside the adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_reference: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Source {
    pub fn from_path(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// The path, unless the adapter sent none or an empty one.
    pub fn usable_path(&self) -> Option<&str> {
        self.path.as_deref().filter(|path| !path.is_empty())
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceBreakpoint {
    /// 1-based.
    pub line: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Information about a breakpoint created in a `setBreakpoints` request, as
/// acknowledged by the adapter.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Breakpoint {
    /// The adapter's id, referenced by later `breakpoint` and `stopped` events.
    #[serde(default)]
    pub id: Option<i64>,
    /// Whether the adapter could bind the breakpoint, possibly on another line.
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub source: Option<Source>,
    /// The line the breakpoint actually ended up on.
    #[serde(default)]
    pub line: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoppedEventReason {
    Step,
    Breakpoint,
    FunctionBreakpoint,
    BreakpointHit,
    DataBreakpoint,
    InstructionBreakpoint,
    Exception,
    SignalReceived,
    Pause,
    Entry,
    Goto,
    String(String),
}

impl StoppedEventReason {
    /// Stops that put the UI focus on the stopped thread's innermost frame.
    pub fn moves_focus(&self) -> bool {
        matches!(
            self,
            StoppedEventReason::Breakpoint
                | StoppedEventReason::FunctionBreakpoint
                | StoppedEventReason::Step
                | StoppedEventReason::BreakpointHit
        )
    }

    /// Stops after which the debuggee cannot be resumed.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StoppedEventReason::Exception | StoppedEventReason::SignalReceived
        )
    }
}

impl FromStr for StoppedEventReason {
    type Err = DeserializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "step" => Ok(StoppedEventReason::Step),
            "breakpoint" => Ok(StoppedEventReason::Breakpoint),
            "function breakpoint" => Ok(StoppedEventReason::FunctionBreakpoint),
            "breakpoint-hit" => Ok(StoppedEventReason::BreakpointHit),
            "data breakpoint" => Ok(StoppedEventReason::DataBreakpoint),
            "instruction breakpoint" => Ok(StoppedEventReason::InstructionBreakpoint),
            "exception" => Ok(StoppedEventReason::Exception),
            "signal-received" => Ok(StoppedEventReason::SignalReceived),
            "pause" => Ok(StoppedEventReason::Pause),
            "entry" => Ok(StoppedEventReason::Entry),
            "goto" => Ok(StoppedEventReason::Goto),
            other => Ok(StoppedEventReason::String(other.to_string())),
        }
    }
}

impl fmt::Display for StoppedEventReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match &self {
            StoppedEventReason::Step => "step",
            StoppedEventReason::Breakpoint => "breakpoint",
            StoppedEventReason::FunctionBreakpoint => "function breakpoint",
            StoppedEventReason::BreakpointHit => "breakpoint-hit",
            StoppedEventReason::DataBreakpoint => "data breakpoint",
            StoppedEventReason::InstructionBreakpoint => "instruction breakpoint",
            StoppedEventReason::Exception => "exception",
            StoppedEventReason::SignalReceived => "signal-received",
            StoppedEventReason::Pause => "pause",
            StoppedEventReason::Entry => "entry",
            StoppedEventReason::Goto => "goto",
            StoppedEventReason::String(other) => other,
        })
    }
}

fromstr_deser! { StoppedEventReason }
tostr_ser! { StoppedEventReason }

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEventCategory {
    Console,
    Important,
    Stdout,
    Stderr,
    Telemetry,
    String(String),
}

impl FromStr for OutputEventCategory {
    type Err = DeserializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "console" => Ok(OutputEventCategory::Console),
            "important" => Ok(OutputEventCategory::Important),
            "stdout" => Ok(OutputEventCategory::Stdout),
            "stderr" => Ok(OutputEventCategory::Stderr),
            "telemetry" => Ok(OutputEventCategory::Telemetry),
            other => Ok(OutputEventCategory::String(other.to_string())),
        }
    }
}

impl fmt::Display for OutputEventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match &self {
            OutputEventCategory::Console => "console",
            OutputEventCategory::Important => "important",
            OutputEventCategory::Stdout => "stdout",
            OutputEventCategory::Stderr => "stderr",
            OutputEventCategory::Telemetry => "telemetry",
            OutputEventCategory::String(other) => other,
        })
    }
}

fromstr_deser! { OutputEventCategory }
tostr_ser! { OutputEventCategory }

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThreadEventReason {
    Started,
    Exited,
    String(String),
}

impl FromStr for ThreadEventReason {
    type Err = DeserializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(ThreadEventReason::Started),
            "exited" => Ok(ThreadEventReason::Exited),
            other => Ok(ThreadEventReason::String(other.to_string())),
        }
    }
}

impl fmt::Display for ThreadEventReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match &self {
            ThreadEventReason::Started => "started",
            ThreadEventReason::Exited => "exited",
            ThreadEventReason::String(other) => other,
        })
    }
}

fromstr_deser! { ThreadEventReason }
tostr_ser! { ThreadEventReason }

/// Reason carried by `breakpoint`, `module` and `loadedSource` events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeReason {
    New,
    Changed,
    Removed,
    String(String),
}

impl FromStr for ChangeReason {
    type Err = DeserializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ChangeReason::New),
            "changed" => Ok(ChangeReason::Changed),
            "removed" => Ok(ChangeReason::Removed),
            other => Ok(ChangeReason::String(other.to_string())),
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match &self {
            ChangeReason::New => "new",
            ChangeReason::Changed => "changed",
            ChangeReason::Removed => "removed",
            ChangeReason::String(other) => other,
        })
    }
}

fromstr_deser! { ChangeReason }
tostr_ser! { ChangeReason }

/// Module ids are either numbers or strings.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum ModuleId {
    Number(i64),
    String(String),
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleId::Number(id) => write!(f, "{id}"),
            ModuleId::String(id) => f.write_str(id),
        }
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    /// Unique identifier for the module.
    pub id: ModuleId,
    /// A name of the module.
    pub name: String,
    /// Logical full path to the module.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackFramePresentationhint {
    Normal,
    Label,
    Subtle,
}

impl FromStr for StackFramePresentationhint {
    type Err = DeserializationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(StackFramePresentationhint::Normal),
            "label" => Ok(StackFramePresentationhint::Label),
            "subtle" => Ok(StackFramePresentationhint::Subtle),
            other => Err(DeserializationError::StringToEnumParseError {
                enum_name: "StackFramePresentationhint".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

fromstr_deser! { StackFramePresentationhint }

/// One frame of a thread's call stack.
///
/// Specification: [StackFrame](https://microsoft.github.io/debug-adapter-protocol/specification#Types_StackFrame)
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    /// Unique across threads; the handle for `scopes`.
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub source: Option<Source>,
    /// `0` when the frame has no source.
    #[serde(default)]
    pub line: i64,
    #[serde(default)]
    pub column: i64,
    /// The program counter, e.g. `0x401136`.
    #[serde(default)]
    pub instruction_pointer_reference: Option<String>,
    #[serde(default)]
    pub module_id: Option<ModuleId>,
    #[serde(default)]
    pub presentation_hint: Option<StackFramePresentationhint>,
}

/// A thread.
///
/// Specification: [Thread](https://microsoft.github.io/debug-adapter-protocol/specification#Types_Thread)
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    pub id: i64,
    pub name: String,
}

/// A named group of a frame's variables, like arguments or locals.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    /// Name of the scope such as 'Arguments', 'Locals', or 'Registers'.
    pub name: String,
    /// Values: 'arguments', 'locals', 'registers', etc.
    #[serde(default)]
    pub presentation_hint: Option<String>,
    /// The handle to pass to `variables`.
    pub variables_reference: i64,
    #[serde(default)]
    pub expensive: bool,
}

impl Scope {
    pub fn holds_locals(&self) -> bool {
        self.name == "Locals"
            || self.name == "Local"
            || self.presentation_hint.as_deref() == Some("locals")
    }
}

/// A variable as the adapter renders it. Values are always strings.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(rename = "type", default)]
    pub type_field: Option<String>,
    /// Non-zero for structured values, whose children need another `variables`.
    #[serde(default)]
    pub variables_reference: i64,
    #[serde(default)]
    pub evaluate_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stopped_reasons_are_classified() {
        for reason in ["breakpoint", "function breakpoint", "step", "breakpoint-hit"] {
            let parsed: StoppedEventReason = reason.parse().unwrap();
            assert!(parsed.moves_focus(), "{reason}");
            assert!(!parsed.is_fatal(), "{reason}");
            assert_eq!(parsed.to_string(), reason);
        }
        for reason in ["exception", "signal-received"] {
            let parsed: StoppedEventReason = reason.parse().unwrap();
            assert!(parsed.is_fatal(), "{reason}");
            assert!(!parsed.moves_focus(), "{reason}");
        }
        let pause: StoppedEventReason = "pause".parse().unwrap();
        assert!(!pause.moves_focus() && !pause.is_fatal());
        let custom: StoppedEventReason = "watchpoint-trigger".parse().unwrap();
        assert_eq!(
            custom,
            StoppedEventReason::String("watchpoint-trigger".to_string())
        );
    }

    #[test]
    fn stack_frames_tolerate_missing_source() {
        let frame: StackFrame = serde_json::from_value(json!({
            "id": 1000,
            "name": "??",
            "line": 0,
            "column": 0,
            "moduleId": 3,
        }))
        .unwrap();
        assert_eq!(frame.source, None);
        assert_eq!(frame.module_id, Some(ModuleId::Number(3)));

        assert!(serde_json::from_value::<StackFrame>(json!({
            "id": 1,
            "name": "main",
            "presentationHint": "sparkly",
        }))
        .is_err());
    }

    #[test]
    fn capabilities_merge_keeps_unreported_flags() {
        let mut capabilities: Capabilities = serde_json::from_value(json!({
            "supportsConfigurationDoneRequest": true,
            "supportsRestartRequest": false,
            "supportsExceptionInfoRequest": true,
        }))
        .unwrap();
        capabilities.merge(
            serde_json::from_value(json!({ "supportsRestartRequest": true })).unwrap(),
        );
        assert_eq!(capabilities.supports_configuration_done_request, Some(true));
        assert_eq!(capabilities.supports_restart_request, Some(true));
    }
}
