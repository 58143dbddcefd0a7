//! A scripted in-memory debug adapter for driving a `SessionController`.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dap_session::config::SessionConfig;
use dap_session::errors::SessionError;
use dap_session::notification::Notification;
use dap_session::session::SessionController;
use dap_session::transport::{BackendProcess, Connection, Connector};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Answers one request with the messages to send back. `None` falls back to
/// [`standard_reply`].
pub type Script = Arc<dyn Fn(&Value) -> Option<Vec<Value>> + Send + Sync>;

pub fn standard() -> Script {
    Arc::new(|_| None)
}

pub fn script(reply: impl Fn(&Value) -> Option<Vec<Value>> + Send + Sync + 'static) -> Script {
    Arc::new(reply)
}

pub fn response(request: &Value, success: bool, body: Value) -> Value {
    let mut response = json!({
        "type": "response",
        "request_seq": request["seq"],
        "success": success,
        "command": request["command"],
        "body": body,
    });
    if !success {
        response["message"] = json!("not today");
    }
    response
}

pub fn event(name: &str, body: Value) -> Value {
    json!({ "type": "event", "event": name, "body": body })
}

pub const THREAD_ID: i64 = 1;
pub const FRAME_ID: i64 = 1000;

/// Behaves like a well-mannered backend stopped in `main` at `/src/main.cpp:42`.
pub fn standard_reply(request: &Value) -> Vec<Value> {
    let command = request["command"].as_str().unwrap_or_default();
    match command {
        "initialize" => vec![
            response(
                request,
                true,
                json!({ "supportsConfigurationDoneRequest": true, "supportsTerminateRequest": true }),
            ),
            event("initialized", json!({})),
        ],
        "setBreakpoints" => {
            let acks: Vec<Value> = request["arguments"]["breakpoints"]
                .as_array()
                .cloned()
                .unwrap_or_default()
                .iter()
                .map(|breakpoint| {
                    json!({
                        "id": breakpoint["line"],
                        "verified": true,
                        "line": breakpoint["line"],
                    })
                })
                .collect();
            vec![response(request, true, json!({ "breakpoints": acks }))]
        }
        "threads" => vec![response(
            request,
            true,
            json!({ "threads": [{ "id": THREAD_ID, "name": "app" }] }),
        )],
        "stackTrace" => vec![response(
            request,
            true,
            json!({
                "stackFrames": [
                    {
                        "id": FRAME_ID,
                        "name": "main",
                        "source": { "name": "main.cpp", "path": "/src/main.cpp" },
                        "line": 42,
                        "column": 5,
                        "instructionPointerReference": "0x401136",
                    },
                    { "id": FRAME_ID + 1, "name": "__libc_start_main", "line": 0, "column": 0 },
                ],
                "totalFrames": 2,
            }),
        )],
        "scopes" => vec![response(
            request,
            true,
            json!({ "scopes": [
                { "name": "Arguments", "variablesReference": 6, "expensive": false },
                { "name": "Locals", "variablesReference": 7, "expensive": false },
            ] }),
        )],
        "variables" => {
            let variables = if request["arguments"]["variablesReference"] == 7 {
                json!([{ "name": "count", "value": "3", "type": "int", "variablesReference": 0 }])
            } else {
                json!([])
            };
            vec![response(request, true, json!({ "variables": variables }))]
        }
        "terminate" => vec![
            response(request, true, json!({})),
            event("terminated", json!({})),
        ],
        "launch" | "configurationDone" | "continue" | "next" | "stepIn" | "stepOut"
        | "pause" => vec![response(request, true, json!({}))],
        _ => vec![response(request, false, json!({}))],
    }
}

enum AdapterInput {
    Message(Value),
    Close,
}

/// The test's side of the fake adapter.
pub struct FakeAdapter {
    received: Arc<Mutex<Vec<Value>>>,
    /// Feeds the connection made last.
    inputs: Arc<Mutex<mpsc::UnboundedSender<AdapterInput>>>,
    pub killed: Arc<AtomicBool>,
    pub connects: Arc<AtomicUsize>,
}

impl FakeAdapter {
    pub fn send_event(&self, name: &str, body: Value) {
        self.push(AdapterInput::Message(event(name, body)));
    }

    pub fn send_reverse_request(&self, command: &str, arguments: Value) {
        self.push(AdapterInput::Message(json!({
            "type": "request",
            "command": command,
            "arguments": arguments,
        })));
    }

    /// Closes the adapter's end of the connection.
    pub fn close(&self) {
        self.push(AdapterInput::Close);
    }

    fn push(&self, input: AdapterInput) {
        let _ = self.inputs.lock().unwrap().send(input);
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }

    /// The commands of all requests received so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.received()
            .iter()
            .filter(|message| message["type"] == "request")
            .filter_map(|message| message["command"].as_str().map(str::to_string))
            .collect()
    }

    pub fn requests(&self, command: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|message| message["type"] == "request" && message["command"] == command)
            .collect()
    }
}

struct FakeBackend {
    killed: Arc<AtomicBool>,
}

#[async_trait]
impl BackendProcess for FakeBackend {
    async fn kill(&mut self) -> Result<(), SessionError> {
        self.killed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out one fresh in-memory connection per `connect`. Earlier connections
/// close once a new one is made.
pub struct FakeConnector {
    script: Script,
    received: Arc<Mutex<Vec<Value>>>,
    inputs: Arc<Mutex<mpsc::UnboundedSender<AdapterInput>>>,
    killed: Arc<AtomicBool>,
    connects: Arc<AtomicUsize>,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, _: &SessionConfig) -> Result<Connection, SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (sender, inputs) = mpsc::unbounded_channel();
        *self.inputs.lock().unwrap() = sender;
        let (client_reader, adapter_writer) = tokio::io::duplex(1 << 16);
        let (adapter_reader, client_writer) = tokio::io::duplex(1 << 16);
        run_adapter(
            BufReader::new(adapter_reader),
            adapter_writer,
            self.script.clone(),
            self.received.clone(),
            inputs,
        );
        Ok(Connection {
            reader: Box::new(client_reader),
            writer: Box::new(client_writer),
            backend: Box::new(FakeBackend {
                killed: self.killed.clone(),
            }),
        })
    }
}

pub fn fake_adapter(script: Script) -> (Arc<FakeConnector>, FakeAdapter) {
    let received = Arc::new(Mutex::new(vec![]));
    let (sender, _) = mpsc::unbounded_channel();
    let inputs = Arc::new(Mutex::new(sender));
    let killed = Arc::new(AtomicBool::new(false));
    let connects = Arc::new(AtomicUsize::new(0));
    let connector = FakeConnector {
        script,
        received: received.clone(),
        inputs: inputs.clone(),
        killed: killed.clone(),
        connects: connects.clone(),
    };
    let adapter = FakeAdapter {
        received,
        inputs,
        killed,
        connects,
    };
    (Arc::new(connector), adapter)
}

fn run_adapter<R, W>(
    mut reader: R,
    mut writer: W,
    script: Script,
    received: Arc<Mutex<Vec<Value>>>,
    mut inputs: mpsc::UnboundedReceiver<AdapterInput>,
) where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (messages, mut incoming) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        while let Some(message) = read_frame(&mut reader).await {
            if messages.send(message).is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        let mut seq = 0;
        loop {
            let outgoing = tokio::select! {
                message = incoming.recv() => {
                    let Some(message) = message else { break };
                    received.lock().unwrap().push(message.clone());
                    if message["type"] != "request" {
                        continue;
                    }
                    script(&message).unwrap_or_else(|| standard_reply(&message))
                }
                input = inputs.recv() => match input {
                    Some(AdapterInput::Message(message)) => vec![message],
                    Some(AdapterInput::Close) | None => break,
                },
            };
            for mut message in outgoing {
                seq += 1;
                message["seq"] = json!(seq);
                if !write_frame(&mut writer, &message).await {
                    return;
                }
            }
        }
    });
}

async fn read_frame<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<Value> {
    let mut length: Option<usize> = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await.ok()? == 0 {
            return None;
        }
        let line = line.trim_end();
        if line.is_empty() {
            if length.is_some() {
                break;
            }
            continue;
        }
        if let Some(value) = line.strip_prefix("Content-Length:") {
            length = value.trim().parse().ok();
        }
    }
    let mut body = vec![0; length?];
    reader.read_exact(&mut body).await.ok()?;
    serde_json::from_slice(&body).ok()
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, message: &Value) -> bool {
    let json = message.to_string();
    let frame = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
    writer.write_all(frame.as_bytes()).await.is_ok() && writer.flush().await.is_ok()
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        request_timeout_ms: 2_000,
        terminate_grace_ms: 200,
        ..SessionConfig::default()
    }
}

pub struct Harness {
    pub controller: SessionController,
    pub adapter: FakeAdapter,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

pub fn harness(script: Script) -> Harness {
    let (connector, adapter) = fake_adapter(script);
    let (sender, notifications) = mpsc::unbounded_channel();
    let controller = SessionController::new(test_config(), connector, Arc::new(sender));
    Harness {
        controller,
        adapter,
        notifications,
    }
}

impl Harness {
    /// Handles backend messages until `done` holds.
    pub async fn pump_until(&mut self, done: impl Fn(&SessionController) -> bool) {
        let controller = &mut self.controller;
        tokio::time::timeout(Duration::from_secs(5), async {
            while !done(controller) {
                let inbound = controller.next_inbound().await;
                controller.handle_inbound(inbound).await;
            }
        })
        .await
        .expect("the session did not reach the expected state in time");
    }

    pub fn drain(&mut self) -> Vec<Notification> {
        let mut notifications = vec![];
        while let Ok(notification) = self.notifications.try_recv() {
            notifications.push(notification);
        }
        notifications
    }
}
