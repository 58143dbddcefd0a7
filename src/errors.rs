use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("could not parse value '{value}' to enum variant of '{enum_name}'")]
    StringToEnumParseError { enum_name: String, value: String },
    #[error("Error while deserializing")]
    SerdeError(#[from] serde_json::Error),
}

/// Failures while framing or parsing messages on the wire.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error")]
    IoError(#[from] std::io::Error),

    #[error("Parse error")]
    ParseError(#[from] DeserializationError),

    #[error("Could not parse header line '{line}'")]
    HeaderParseError { line: String },

    #[error("Message without Content-Length header")]
    MissingContentLength,
}

impl CodecError {
    /// Whether the byte stream is still positioned at a message boundary.
    ///
    /// A body that fails to parse was still consumed completely, so reading can
    /// go on with the next message. Header and I/O failures leave the stream in
    /// an unknown position.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CodecError::ParseError(_))
    }
}

/// The error taxonomy of a debug session.
///
/// Values are cloned when one failure resolves several pending requests at
/// once, so every variant carries owned, displayable data only.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Missing or invalid input before a session can start.
    #[error("Configuration error. {reason}")]
    ConfigurationError { reason: String },

    /// The backend is unreachable or the channel closed unexpectedly.
    #[error("Transport error. {reason}")]
    TransportError { reason: String },

    /// A malformed or failed response, or an invalid event body.
    #[error("Protocol error. {reason}")]
    ProtocolError { reason: String },

    /// A variable fetch for a frame that is not part of the current stop.
    #[error("Unknown frame {frame_id}")]
    UnknownFrameError { frame_id: i64 },

    /// The request was still pending when the session was torn down.
    #[error("Session terminated")]
    SessionTerminated,

    /// The backend did not answer a request in time.
    #[error("Request `{command}` timed out")]
    Timeout { command: String },
}

impl SessionError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        SessionError::ConfigurationError {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        SessionError::TransportError {
            reason: reason.into(),
        }
    }

    pub fn protocol(reason: impl Into<String>) -> Self {
        SessionError::ProtocolError {
            reason: reason.into(),
        }
    }
}

impl From<CodecError> for SessionError {
    fn from(error: CodecError) -> Self {
        match error {
            CodecError::ParseError(inner) => SessionError::protocol(inner_reason(&inner)),
            CodecError::IoError(inner) => SessionError::transport(inner.to_string()),
            other => SessionError::transport(other.to_string()),
        }
    }
}

impl From<DeserializationError> for SessionError {
    fn from(error: DeserializationError) -> Self {
        SessionError::protocol(inner_reason(&error))
    }
}

fn inner_reason(error: &DeserializationError) -> String {
    match error {
        DeserializationError::SerdeError(inner) => inner.to_string(),
        other => other.to_string(),
    }
}
