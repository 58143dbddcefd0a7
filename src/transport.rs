use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::dispatcher::RequestDispatcher;
use crate::errors::SessionError;
use crate::reader::{IncomingMessage, MessageReader, RawEvent, ReverseRequest};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Something the controller has to look at, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(RawEvent),
    ReverseRequest(ReverseRequest),
    /// The byte channel is gone. No further messages follow.
    Closed(SessionError),
}

/// The process behind a connection, as far as we can stop it.
#[async_trait]
pub trait BackendProcess: Send {
    /// Stops the backend without asking.
    async fn kill(&mut self) -> Result<(), SessionError>;
}

/// A backend we did not start and therefore can't kill. Dropping the connection
/// is all that can be done.
pub struct DetachedBackend;

#[async_trait]
impl BackendProcess for DetachedBackend {
    async fn kill(&mut self) -> Result<(), SessionError> {
        warn!("The debug adapter was not started by us, so only the connection is dropped.");
        Ok(())
    }
}

pub struct ChildBackend {
    child: Child,
}

#[async_trait]
impl BackendProcess for ChildBackend {
    async fn kill(&mut self) -> Result<(), SessionError> {
        self.child
            .kill()
            .await
            .map_err(|error| SessionError::transport(format!("Can't kill the adapter: {error}")))
    }
}

pub struct Connection {
    pub reader: BoxedReader,
    pub writer: BoxedWriter,
    pub backend: Box<dyn BackendProcess>,
}

/// Produces the byte channel to a debug backend.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: &SessionConfig) -> Result<Connection, SessionError>;
}

/// Connects over TCP, first spawning the adapter if the config names one.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, config: &SessionConfig) -> Result<Connection, SessionError> {
        let adapter = &config.adapter;
        let backend: Box<dyn BackendProcess> = match &adapter.program {
            Some(program) => {
                info!("Starting the debug adapter {program}.");
                let child = Command::new(program)
                    .args(&adapter.args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::inherit())
                    .kill_on_drop(true)
                    .spawn()
                    .map_err(|error| {
                        SessionError::transport(format!("Can't start {program}: {error}"))
                    })?;
                Box::new(ChildBackend { child })
            }
            None => Box::new(DetachedBackend),
        };

        // A freshly spawned adapter needs a moment before it accepts connections.
        let deadline = tokio::time::Instant::now() + config.connect_timeout();
        let stream = loop {
            match TcpStream::connect((adapter.host.as_str(), adapter.port)).await {
                Ok(stream) => break stream,
                Err(error) if tokio::time::Instant::now() < deadline => {
                    debug!("Adapter not reachable yet: {error}");
                    tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
                }
                Err(error) => {
                    return Err(SessionError::transport(format!(
                        "Can't connect to {}:{}: {error}",
                        adapter.host, adapter.port,
                    )))
                }
            }
        };
        let _ = stream.set_nodelay(true);
        info!("Connected to the debug adapter at {}:{}.", adapter.host, adapter.port);

        let (reader, writer) = stream.into_split();
        Ok(Connection {
            reader: Box::new(reader),
            writer: Box::new(writer),
            backend,
        })
    }
}

/// Reads messages until the channel breaks. Responses complete their requests
/// right here; everything else goes to the controller through `inbound`.
pub fn spawn_reader(
    reader: BoxedReader,
    dispatcher: Arc<RequestDispatcher>,
    inbound: mpsc::UnboundedSender<Inbound>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut input = BufReader::new(reader);
        let mut reader = MessageReader::default();
        loop {
            let forwarded = match reader.read_message(&mut input).await {
                Ok(IncomingMessage::Response(response)) => {
                    dispatcher.resolve(response);
                    Ok(())
                }
                Ok(IncomingMessage::Event(event)) => inbound.send(Inbound::Event(event)),
                Ok(IncomingMessage::Request(request)) => {
                    inbound.send(Inbound::ReverseRequest(request))
                }
                Err(error) if error.is_recoverable() => {
                    warn!("Dropping an unreadable message: {error}");
                    Ok(())
                }
                Err(error) => {
                    let error = SessionError::from(error);
                    debug!("The connection to the debug adapter is gone: {error}");
                    dispatcher.fail_all(error.clone());
                    let _ = inbound.send(Inbound::Closed(error));
                    return;
                }
            };
            if forwarded.is_err() {
                debug!("Nobody listens to the debug adapter anymore.");
                return;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn reader_routes_messages_and_reports_loss() {
        let (ours, mut theirs) = tokio::io::duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(ours);
        let dispatcher = RequestDispatcher::new(Box::new(write_half), Duration::from_secs(5));
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let task = spawn_reader(Box::new(read_half), dispatcher.clone(), sender);

        let pending = dispatcher
            .send(crate::requests::Command::Threads)
            .await
            .unwrap();
        for json in [
            r#"{"seq":1,"type":"event","event":"initialized"}"#.to_string(),
            format!(
                r#"{{"seq":2,"type":"response","request_seq":{},"success":true,"command":"threads","body":{{"threads":[]}}}}"#,
                pending.seq()
            ),
        ] {
            let frame = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
            theirs.write_all(frame.as_bytes()).await.unwrap();
        }

        let Some(Inbound::Event(event)) = receiver.recv().await else {
            panic!("expected an event");
        };
        assert_eq!(event.event, "initialized");
        assert!(pending.wait().await.unwrap().success);

        drop(theirs);
        assert!(matches!(
            receiver.recv().await,
            Some(Inbound::Closed(SessionError::TransportError { .. }))
        ));
        task.await.unwrap();
    }
}
