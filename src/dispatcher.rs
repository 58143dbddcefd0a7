use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{trace, warn};

use crate::errors::SessionError;
use crate::reader::ReverseRequest;
use crate::requests::{Command, Request};
use crate::responses::Response;
use crate::transport::BoxedWriter;
use crate::writer::MessageWriter;

type Completion = oneshot::Sender<Result<Response, SessionError>>;

struct Slot {
    command: &'static str,
    completion: Completion,
}

#[derive(Default)]
struct PendingTable {
    slots: HashMap<i64, Slot>,
    /// Set once the session is gone; later sends fail right away.
    closed: Option<SessionError>,
}

/// Owns the write half of the transport and correlates responses with the
/// requests that caused them.
pub struct RequestDispatcher {
    seq: AtomicI64,
    pending: Mutex<PendingTable>,
    writer: AsyncMutex<MessageWriter<BoxedWriter>>,
    request_timeout: Duration,
}

impl RequestDispatcher {
    pub fn new(writer: BoxedWriter, request_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            seq: AtomicI64::new(0),
            pending: Mutex::new(PendingTable::default()),
            writer: AsyncMutex::new(MessageWriter::new(writer)),
            request_timeout,
        })
    }

    fn next_seq(&self) -> i64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn table(&self) -> MutexGuard<'_, PendingTable> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Writes the request and returns the slot its response will land in.
    pub async fn send(self: &Arc<Self>, command: Command) -> Result<PendingResponse, SessionError> {
        let name = command.name();
        let (completion, receiver) = oneshot::channel();
        let seq = {
            let mut table = self.table();
            if let Some(error) = &table.closed {
                return Err(error.clone());
            }
            // The slot exists before the bytes leave, so a fast response
            // always finds it.
            let seq = self.next_seq();
            table.slots.insert(
                seq,
                Slot {
                    command: name,
                    completion,
                },
            );
            seq
        };

        trace!("Sending request {seq} `{name}`.");
        let written = self
            .writer
            .lock()
            .await
            .send_request(&Request::new(seq, command))
            .await;
        if let Err(error) = written {
            self.table().slots.remove(&seq);
            return Err(error.into());
        }

        Ok(PendingResponse {
            seq,
            command: name,
            receiver,
            dispatcher: self.clone(),
        })
    }

    /// Sends the request and waits for its body.
    pub async fn request<T: DeserializeOwned>(
        self: &Arc<Self>,
        command: Command,
    ) -> Result<T, SessionError> {
        let response = self.send(command).await?.wait().await?;
        Ok(response.body_as()?)
    }

    /// Completes the slot matching `response.request_seq`.
    pub fn resolve(&self, response: Response) {
        let Some(slot) = self.table().slots.remove(&response.request_seq) else {
            warn!(
                "Dropping a `{}` response for unknown request {}.",
                response.command, response.request_seq,
            );
            return;
        };
        if slot.command != response.command {
            warn!(
                "Response to request {} is for `{}`, but `{}` was sent.",
                response.request_seq, response.command, slot.command,
            );
        }
        // The receiver is gone if the caller timed out in the meantime.
        let _ = slot.completion.send(Ok(response));
    }

    /// Resolves every outstanding request with `error` and refuses new ones.
    pub fn fail_all(&self, error: SessionError) {
        let slots = {
            let mut table = self.table();
            if table.closed.is_none() {
                table.closed = Some(error.clone());
            }
            std::mem::take(&mut table.slots)
        };
        if !slots.is_empty() {
            trace!("Failing {} pending requests with: {error}", slots.len());
        }
        for (_, slot) in slots {
            let _ = slot.completion.send(Err(error.clone()));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.table().slots.len()
    }

    /// Answers a request the adapter sent. `runInTerminal` is acknowledged with an
    /// empty body; everything else is refused.
    pub async fn reply(&self, request: &ReverseRequest) -> Result<(), SessionError> {
        let outcome = match request.command.as_str() {
            "runInTerminal" => Ok(Value::Object(Default::default())),
            other => Err(format!("Unsupported reverse request `{other}`.")),
        };
        let seq = self.next_seq();
        self.writer
            .lock()
            .await
            .send_reverse_response(seq, request.seq, &request.command, outcome)
            .await?;
        Ok(())
    }

    fn forget(&self, seq: i64) {
        self.table().slots.remove(&seq);
    }
}

/// The completion slot of one request.
pub struct PendingResponse {
    seq: i64,
    command: &'static str,
    receiver: oneshot::Receiver<Result<Response, SessionError>>,
    dispatcher: Arc<RequestDispatcher>,
}

impl PendingResponse {
    pub fn seq(&self) -> i64 {
        self.seq
    }
    pub fn command(&self) -> &'static str {
        self.command
    }

    /// Waits for the response, at most for the dispatcher's request timeout.
    pub async fn wait(self) -> Result<Response, SessionError> {
        let timeout = self.dispatcher.request_timeout;
        match tokio::time::timeout(timeout, self.receiver).await {
            Ok(Ok(Ok(response))) if response.success => Ok(response),
            Ok(Ok(Ok(response))) => Err(SessionError::protocol(format!(
                "`{}` failed: {}",
                self.command,
                response.message.as_deref().unwrap_or("no message"),
            ))),
            Ok(Ok(Err(error))) => Err(error),
            Ok(Err(_)) => Err(SessionError::SessionTerminated),
            Err(_) => {
                self.dispatcher.forget(self.seq);
                Err(SessionError::Timeout {
                    command: self.command.to_string(),
                })
            }
        }
    }
}

/// The `configurationDone` round trip that resume requests wait for.
#[derive(Default)]
pub enum ConfigurationBarrier {
    /// `configurationDone` was not sent yet.
    #[default]
    Unarmed,
    Pending(PendingResponse),
    Released,
}

impl ConfigurationBarrier {
    pub fn arm(&mut self, pending: PendingResponse) {
        *self = ConfigurationBarrier::Pending(pending);
    }

    pub fn is_released(&self) -> bool {
        matches!(self, ConfigurationBarrier::Released)
    }

    /// Returns once `configurationDone` was answered. A failed answer is
    /// reported once; afterwards the barrier stays open.
    pub async fn wait(&mut self) -> Result<(), SessionError> {
        match std::mem::replace(self, ConfigurationBarrier::Released) {
            ConfigurationBarrier::Pending(pending) => pending.wait().await.map(|_| ()),
            ConfigurationBarrier::Unarmed => {
                *self = ConfigurationBarrier::Unarmed;
                Ok(())
            }
            ConfigurationBarrier::Released => Ok(()),
        }
    }
}
