#[doc(hidden)]
pub use crate::{
    breakpoints::{Breakpoint, BreakpointRegistry},
    call_stack::{CallStackCache, StackFrameData},
    config::{AdapterConfig, SessionConfig},
    dispatcher::{ConfigurationBarrier, PendingResponse, RequestDispatcher},
    errors::{CodecError, DeserializationError, SessionError},
    events::{self, Event, EventKind},
    line_reader::LineReader,
    notification::{LogLine, Notice, Notification, SessionObserver, Severity, SourceLocation},
    reader::{IncomingMessage, MessageReader},
    requests::{self, Command, Request},
    responses::{self, Response},
    run_state::{RunState, RunStateMachine, Trigger},
    session::{
        actor::{SessionActor, SessionHandle, SessionSnapshot},
        SessionController, StoppedDetails,
    },
    transport::{BackendProcess, Connection, Connector, Inbound, TcpConnector},
    types,
    writer::MessageWriter,
};
