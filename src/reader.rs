use std::io::{Error as StdIoError, ErrorKind as StdIoErrorKind};

use serde::Deserialize;
use serde_json::Value;

use crate::errors::{CodecError, DeserializationError};
use crate::line_reader::LineReader;
use crate::responses::Response;

#[derive(Debug, Clone)]
enum ReaderState {
    /// Expecting a header line or the blank line that ends the header block
    Header,
    /// Expecting content
    Content,
}

/// An event as it arrives on the wire, before its body is interpreted.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub seq: i64,
    /// Type of event.
    pub event: String,
    #[serde(default)]
    pub body: Option<Value>,
}

/// A request sent by the adapter to the client, such as `runInTerminal`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ReverseRequest {
    pub seq: i64,
    pub command: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Any message the adapter can send.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IncomingMessage {
    Response(Response),
    Event(RawEvent),
    Request(ReverseRequest),
}

/// The `MessageReader` is responsible for reading the incoming bytestream of the adapter and
/// constructing deserialized messages from it. The main method is `read_message`.
#[derive(Default)]
pub struct MessageReader {}

pub(crate) fn escape_crlf(instr: &str) -> String {
    instr.replace('\n', "\\n").replace('\r', "\\r")
}

impl MessageReader {
    /// Read a single message from the `input` stream and return it to the caller.
    ///
    /// A body that fails to parse is consumed completely before the error is
    /// returned, so the caller may keep reading after a `CodecError::ParseError`.
    pub async fn read_message(
        &mut self,
        input: &mut impl LineReader,
    ) -> Result<IncomingMessage, CodecError> {
        let mut state = ReaderState::Header;
        let mut content_length: Option<usize> = None;
        let mut seen_header = false;

        loop {
            match state {
                ReaderState::Header => {
                    let buffer = input.read_line().await?;

                    tracing::trace!("HEADER: read line: {}", escape_crlf(&buffer));
                    if buffer.is_empty() {
                        return Err(CodecError::IoError(StdIoError::new(
                            StdIoErrorKind::UnexpectedEof,
                            "read an empty buffer",
                        )));
                    }

                    if buffer == "\r\n" || buffer == "\n" {
                        if content_length.is_some() {
                            state = ReaderState::Content;
                        } else if seen_header {
                            return Err(CodecError::MissingContentLength);
                        } else {
                            tracing::trace!("HEADER: skipping empty line");
                        }
                        continue;
                    }

                    let Some((name, value)) = buffer.trim_end().split_once(':') else {
                        return Err(CodecError::HeaderParseError { line: buffer.clone() });
                    };
                    seen_header = true;
                    match name.trim() {
                        "Content-Length" => match value.trim().parse() {
                            Ok(val) => content_length = Some(val),
                            Err(_) => {
                                return Err(CodecError::HeaderParseError { line: buffer.clone() })
                            }
                        },
                        other => tracing::trace!("HEADER: ignoring header {other}"),
                    }
                }
                ReaderState::Content => {
                    let content_length = content_length.unwrap_or_default();
                    // read the payload
                    let mut payload = bytes::BytesMut::with_capacity(content_length);
                    let _ = input.read_n_bytes(&mut payload, content_length).await?;

                    let payload = String::from_utf8_lossy(&payload).to_string();
                    tracing::trace!("CONTENT: read content: {}", escape_crlf(&payload));
                    return serde_json::from_str(&payload)
                        .map_err(|e| CodecError::ParseError(DeserializationError::SerdeError(e)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn frame(json: &str) -> String {
        format!("Content-Length: {}\r\n\r\n{}", json.len(), json)
    }

    #[tokio::test]
    async fn reads_responses_and_events_back_to_back() {
        let input = format!(
            "{}{}",
            frame(r#"{"seq":1,"type":"response","request_seq":1,"success":true,"command":"initialize","body":{}}"#),
            frame(r#"{"seq":2,"type":"event","event":"initialized"}"#),
        );
        let mut input = BufReader::new(input.as_bytes());
        let mut reader = MessageReader::default();

        let IncomingMessage::Response(response) = reader.read_message(&mut input).await.unwrap()
        else {
            panic!("expected a response");
        };
        assert_eq!(response.request_seq, 1);
        assert_eq!(response.command, "initialize");

        let IncomingMessage::Event(event) = reader.read_message(&mut input).await.unwrap() else {
            panic!("expected an event");
        };
        assert_eq!(event.event, "initialized");
        assert_eq!(event.body, None);

        assert!(matches!(
            reader.read_message(&mut input).await,
            Err(CodecError::IoError(_))
        ));
    }

    #[tokio::test]
    async fn ignores_other_headers_and_leading_blank_lines() {
        let json = r#"{"seq":5,"type":"request","command":"runInTerminal","arguments":{"args":["ls"]}}"#;
        let input = format!(
            "\r\nContent-Type: application/vscode-jsonrpc; charset=utf-8\r\nContent-Length: {}\r\n\r\n{}",
            json.len(),
            json
        );
        let mut input = BufReader::new(input.as_bytes());
        let message = MessageReader::default()
            .read_message(&mut input)
            .await
            .unwrap();
        let IncomingMessage::Request(request) = message else {
            panic!("expected a reverse request");
        };
        assert_eq!(request.command, "runInTerminal");
    }

    #[tokio::test]
    async fn malformed_body_leaves_stream_at_next_message() {
        let input = format!(
            "{}{}",
            frame(r#"{"seq":1,"type":"gossip"}"#),
            frame(r#"{"seq":2,"type":"event","event":"exited","body":{"exitCode":0}}"#),
        );
        let mut input = BufReader::new(input.as_bytes());
        let mut reader = MessageReader::default();

        let error = reader.read_message(&mut input).await.unwrap_err();
        assert!(error.is_recoverable());
        assert!(matches!(
            reader.read_message(&mut input).await.unwrap(),
            IncomingMessage::Event(_)
        ));
    }

    #[tokio::test]
    async fn header_block_without_length_is_rejected() {
        let mut input = BufReader::new("Content-Type: text\r\n\r\n{}".as_bytes());
        assert!(matches!(
            MessageReader::default().read_message(&mut input).await,
            Err(CodecError::MissingContentLength)
        ));

        let mut input = BufReader::new("Content-Length: many\r\n\r\n".as_bytes());
        assert!(matches!(
            MessageReader::default().read_message(&mut input).await,
            Err(CodecError::HeaderParseError { .. })
        ));
    }
}
