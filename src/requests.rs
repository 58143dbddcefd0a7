use serde::Serialize;

use crate::types::{Source, SourceBreakpoint};

/// Who we are and how we count, sent first.
///
/// Specification: [Initialize](https://microsoft.github.io/debug-adapter-protocol/specification#Requests_Initialize)
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitializeArguments {
    #[serde(rename = "clientID")]
    pub client_id: String,
    pub client_name: String,
    /// Which kind of adapter we expect, e.g. `cxxdbg`.
    #[serde(rename = "adapterID")]
    pub adapter_id: String,
    /// Lines and columns in both directions are 1-based.
    pub lines_start_at1: bool,
    pub columns_start_at1: bool,
    /// Always `path`; we never send URIs.
    pub path_format: String,
    pub supports_variable_type: bool,
    /// We answer `runInTerminal` without starting anything.
    pub supports_run_in_terminal_request: bool,
}

impl InitializeArguments {
    pub fn new(
        client_id: impl Into<String>,
        client_name: impl Into<String>,
        adapter_id: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_name: client_name.into(),
            adapter_id: adapter_id.into(),
            lines_start_at1: true,
            columns_start_at1: true,
            path_format: "path".to_string(),
            supports_variable_type: true,
            supports_run_in_terminal_request: true,
        }
    }
}

/// Arguments for a Launch request. Only the program is specified; everything else
/// is left to the adapter's defaults.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequestArguments {
    /// The program to execute.
    pub program: String,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointsArguments {
    pub source: Source,
    /// The code locations of the breakpoints. The list replaces every breakpoint
    /// previously set in this source.
    pub breakpoints: Vec<SourceBreakpoint>,
    pub source_modified: bool,
}

/// Arguments shared by `continue`, `next`, `stepIn`, `stepOut` and `pause`, which
/// all act on one thread.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ThreadArguments {
    pub thread_id: i64,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TerminateArguments {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<bool>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceArguments {
    pub thread_id: i64,
    /// Level of the first frame. `None` starts at the innermost one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<i64>,
    /// `None` asks for the whole stack.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<i64>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScopesArguments {
    pub frame_id: i64,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VariablesArguments {
    /// A scope's or a structured variable's handle.
    pub variables_reference: i64,
}

/// The requests this client issues, each with its arguments.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "command", content = "arguments", rename_all = "camelCase")]
pub enum Command {
    /// Specification: [Initialize](https://microsoft.github.io/debug-adapter-protocol/specification#Requests_Initialize)
    Initialize(InitializeArguments),
    /// Specification: [Launch](https://microsoft.github.io/debug-adapter-protocol/specification#Requests_Launch)
    Launch(LaunchRequestArguments),
    /// Ends the configuration phase that `initialized` opened. Resumes wait
    /// for its answer.
    ///
    /// Specification: [ConfigurationDone](https://microsoft.github.io/debug-adapter-protocol/specification#Requests_ConfigurationDone)
    ConfigurationDone,
    /// Replaces all breakpoints of one source.
    ///
    /// Specification: [SetBreakpoints](https://microsoft.github.io/debug-adapter-protocol/specification#Requests_SetBreakpoints)
    SetBreakpoints(SetBreakpointsArguments),
    Continue(ThreadArguments),
    Next(ThreadArguments),
    StepIn(ThreadArguments),
    StepOut(ThreadArguments),
    Pause(ThreadArguments),
    Terminate(TerminateArguments),
    Restart,
    Threads,
    StackTrace(StackTraceArguments),
    Scopes(ScopesArguments),
    Variables(VariablesArguments),
}

impl Command {
    /// The wire name of the command, as it is echoed in the response.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Initialize(_) => "initialize",
            Command::Launch(_) => "launch",
            Command::ConfigurationDone => "configurationDone",
            Command::SetBreakpoints(_) => "setBreakpoints",
            Command::Continue(_) => "continue",
            Command::Next(_) => "next",
            Command::StepIn(_) => "stepIn",
            Command::StepOut(_) => "stepOut",
            Command::Pause(_) => "pause",
            Command::Terminate(_) => "terminate",
            Command::Restart => "restart",
            Command::Threads => "threads",
            Command::StackTrace(_) => "stackTrace",
            Command::Scopes(_) => "scopes",
            Command::Variables(_) => "variables",
        }
    }

    /// Requests after which the debuggee runs again.
    pub fn resumes(&self) -> bool {
        matches!(
            self,
            Command::Continue(_) | Command::Next(_) | Command::StepIn(_) | Command::StepOut(_)
        )
    }
}

/// A request as it goes over the wire.
///
/// There is no `ProtocolMessage` base type; `seq` and `type` are plain fields.
#[derive(Serialize, Debug, Clone)]
pub struct Request {
    /// Sequence number for the Request. The first request of a session has
    /// `seq` 1 and every following one is 1 greater than the previous.
    pub seq: i64,
    #[serde(rename = "type")]
    pub message_type: &'static str,
    /// The command to execute, along with its arguments when present.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    pub fn new(seq: i64, command: Command) -> Self {
        Self {
            seq,
            message_type: "request",
            command,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_serialize_with_envelope() {
        let request = Request::new(
            3,
            Command::Launch(LaunchRequestArguments {
                program: "/bin/app".to_string(),
            }),
        );
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "seq": 3,
                "type": "request",
                "command": "launch",
                "arguments": { "program": "/bin/app" },
            })
        );
    }

    #[test]
    fn argumentless_commands_omit_arguments() {
        let value = serde_json::to_value(Request::new(1, Command::ConfigurationDone)).unwrap();
        assert_eq!(value["command"], "configurationDone");
        assert!(value.get("arguments").is_none());
    }

    #[test]
    fn command_names_match_the_wire() {
        let commands = [
            Command::StepIn(ThreadArguments { thread_id: 1 }),
            Command::StackTrace(StackTraceArguments {
                thread_id: 1,
                start_frame: None,
                levels: None,
            }),
            Command::SetBreakpoints(SetBreakpointsArguments {
                source: Source::from_path("/src/main.cpp", "main.cpp"),
                breakpoints: vec![],
                source_modified: false,
            }),
            Command::Threads,
        ];
        for command in commands {
            let value = serde_json::to_value(&command).unwrap();
            assert_eq!(value["command"], command.name());
        }
    }

    #[test]
    fn initialize_uses_protocol_casing() {
        let value = serde_json::to_value(Command::Initialize(InitializeArguments::new(
            "dap-session",
            "dap-session",
            "cxxdbg",
        )))
        .unwrap();
        assert_eq!(value["arguments"]["clientID"], "dap-session");
        assert_eq!(value["arguments"]["adapterID"], "cxxdbg");
        assert_eq!(value["arguments"]["linesStartAt1"], true);
    }
}
