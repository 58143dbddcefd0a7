use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;

use crate::{
    errors::DeserializationError,
    types::{Breakpoint, Scope, StackFrame, Thread, Variable},
};

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContinueResponse {
    /// Missing means every thread runs again.
    #[serde(default)]
    pub all_threads_continued: Option<bool>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScopesResponse {
    pub scopes: Vec<Scope>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SetBreakpointsResponse {
    /// One ack per requested breakpoint, in request order.
    pub breakpoints: Vec<Breakpoint>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StackTraceResponse {
    /// Innermost first. Empty when the thread has no location at all.
    pub stack_frames: Vec<StackFrame>,
    #[serde(default)]
    pub total_frames: Option<i64>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ThreadsResponse {
    pub threads: Vec<Thread>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VariablesResponse {
    pub variables: Vec<Variable>,
}

/// The adapter's answer to one of our requests.
///
/// The body is kept as raw JSON until the caller that issued the request decides
/// which type it expects, because only the caller knows which command it sent.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Response {
    /// The `seq` of the request this answers.
    pub request_seq: i64,
    /// On `false`, `message` says what went wrong.
    pub success: bool,
    pub command: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
}

impl Response {
    /// Parses the body into the type the issuing request expects. A missing body
    /// parses like an empty object, so bodies whose fields are all optional work
    /// without one.
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, DeserializationError> {
        let body = self
            .body
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()));
        Ok(serde_json::from_value(body)?)
    }
}
