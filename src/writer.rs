use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::errors::CodecError;
use crate::reader::escape_crlf;
use crate::requests::Request;

/// Writes framed messages to the adapter.
pub struct MessageWriter<W> {
    output: W,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(output: W) -> Self {
        Self { output }
    }

    pub async fn send_request(&mut self, request: &Request) -> Result<(), CodecError> {
        self.write(request).await
    }

    /// Answers a request the adapter sent to us.
    pub async fn send_reverse_response(
        &mut self,
        seq: i64,
        request_seq: i64,
        command: &str,
        outcome: Result<Value, String>,
    ) -> Result<(), CodecError> {
        let response = match outcome {
            Ok(body) => json!({
                "seq": seq,
                "type": "response",
                "request_seq": request_seq,
                "success": true,
                "command": command,
                "body": body,
            }),
            Err(message) => json!({
                "seq": seq,
                "type": "response",
                "request_seq": request_seq,
                "success": false,
                "command": command,
                "message": message,
            }),
        };
        self.write(&response).await
    }

    pub async fn write(&mut self, message: &impl Serialize) -> Result<(), CodecError> {
        let json = serde_json::to_string(message).map_err(|e| CodecError::ParseError(e.into()))?;
        tracing::trace!("WRITE: {}", escape_crlf(&json));
        let frame = format!("Content-Length: {}\r\n\r\n{}", json.len(), json);
        self.output.write_all(frame.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::{Command, ThreadArguments};

    #[tokio::test]
    async fn frames_carry_the_byte_length() {
        let mut writer = MessageWriter::new(Vec::new());
        writer
            .send_request(&Request::new(
                4,
                Command::Continue(ThreadArguments { thread_id: 1 }),
            ))
            .await
            .unwrap();

        let written = String::from_utf8(writer.output).unwrap();
        let (header, body) = written.split_once("\r\n\r\n").unwrap();
        assert_eq!(header, format!("Content-Length: {}", body.len()));
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["command"], "continue");
        assert_eq!(body["arguments"]["threadId"], 1);
    }

    #[tokio::test]
    async fn reverse_requests_can_be_refused() {
        let mut writer = MessageWriter::new(Vec::new());
        writer
            .send_reverse_response(2, 7, "startDebugging", Err("unsupported".to_string()))
            .await
            .unwrap();
        let written = String::from_utf8(writer.output).unwrap();
        let (_, body) = written.split_once("\r\n\r\n").unwrap();
        let body: Value = serde_json::from_str(body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["request_seq"], 7);
    }
}
