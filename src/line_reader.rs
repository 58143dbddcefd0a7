use async_trait::async_trait;
use bytes::BytesMut;
use std::io::Error as IoError;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

#[async_trait]
pub trait LineReader {
    /// Read a single line and return it (terminator included). An empty string
    /// means the stream ended.
    async fn read_line(&mut self) -> Result<String, IoError>;

    /// Read exactly `n` bytes and append them into `buffer`
    async fn read_n_bytes(&mut self, buffer: &mut BytesMut, n: usize) -> Result<usize, IoError>;
}

#[async_trait]
impl<R> LineReader for BufReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    async fn read_line(&mut self) -> Result<String, IoError> {
        let mut line = Vec::with_capacity(128);
        self.read_until(b'\n', &mut line).await?;
        Ok(String::from_utf8_lossy(&line).to_string())
    }

    async fn read_n_bytes(&mut self, buffer: &mut BytesMut, n: usize) -> Result<usize, IoError> {
        let mut buf = vec![0; n];
        self.read_exact(&mut buf).await?;
        buffer.extend_from_slice(&buf);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    const DAP_LAUNCH_RESPONSE: &str = "Content-Length: 77\r\n\r\n{\"seq\":2,\"type\":\"response\",\"request_seq\":2,\"success\":true,\"command\":\"launch\"}";

    use super::*;

    #[tokio::test]
    async fn test_buffered_reader() -> Result<(), IoError> {
        let mut reader = BufReader::new(DAP_LAUNCH_RESPONSE.as_bytes());
        {
            let line = LineReader::read_line(&mut reader).await?;
            assert_eq!(line, "Content-Length: 77\r\n");
        }
        {
            let line = LineReader::read_line(&mut reader).await?;
            assert_eq!(line, "\r\n");
        }
        {
            // read by length
            let mut buffer = BytesMut::with_capacity(77);
            reader.read_n_bytes(&mut buffer, 77).await?;
            assert_eq!(buffer.len(), 77);
            assert!(buffer.ends_with(b"\"launch\"}"));
        }
        assert_eq!(LineReader::read_line(&mut reader).await?, "");
        Ok(())
    }
}
