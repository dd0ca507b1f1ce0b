use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use crate::protocol::error::{Result, RpcError};

/// Maximum record size (100 MB)
pub const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

/// Decodes length-prefixed JSON records from the read side of a stream.
///
/// End of stream while reading a length prefix is a clean close and is
/// reported as `Ok(None)`; end of stream inside a record body is an error.
pub struct FrameReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Reads one raw record. Returns `Ok(None)` when the peer closed the
    /// connection at a record boundary.
    pub async fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        match self.inner.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Connection closed by peer
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_be_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_SIZE {
            return Err(RpcError::FrameTooLarge {
                size: len,
                max: MAX_MESSAGE_SIZE,
            });
        }

        let mut buf = vec![0u8; len];
        self.inner.read_exact(&mut buf).await?;
        Ok(Some(buf))
    }

    /// Reads one record and decodes it into `T`.
    pub async fn read_value<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        match self.read_frame().await? {
            Some(buf) => Ok(Some(serde_json::from_slice(&buf)?)),
            None => Ok(None),
        }
    }
}

/// Encodes values as length-prefixed JSON records on the write side of a
/// stream. Writes are buffered; callers flush once per response so the header
/// and body records reach the wire together.
pub struct FrameWriter<W: AsyncWrite + Unpin> {
    inner: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
        }
    }

    /// Encodes `value` and appends it to the write buffer as one record.
    pub async fn write_value<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let encoded = serde_json::to_vec(value)?;
        if encoded.len() > MAX_MESSAGE_SIZE {
            return Err(RpcError::FrameTooLarge {
                size: encoded.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let len = encoded.len() as u32;
        self.inner.write_all(&len.to_be_bytes()).await?;
        self.inner.write_all(&encoded).await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Flushes buffered records and shuts down the underlying stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Request, Response};

    #[tokio::test]
    async fn test_frame_round_trip() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        let request = Request::new("Arith.Add", 3);
        writer.write_value(&request).await.unwrap();
        writer.flush().await.unwrap();

        let decoded: Request = reader.read_value().await.unwrap().unwrap();
        assert_eq!(decoded, request);
    }

    #[tokio::test]
    async fn test_two_records_one_flush() {
        let (client, server) = tokio::io::duplex(1024);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        let header = Response::success("inner.Ping", 7);
        writer.write_value(&header).await.unwrap();
        writer.write_value(&serde_json::Value::Null).await.unwrap();
        writer.flush().await.unwrap();

        let decoded: Response = reader.read_value().await.unwrap().unwrap();
        assert_eq!(decoded, header);
        let body: serde_json::Value = reader.read_value().await.unwrap().unwrap();
        assert_eq!(body, serde_json::Value::Null);
    }

    #[tokio::test]
    async fn test_clean_eof_at_record_boundary() {
        let (client, server) = tokio::io::duplex(1024);
        drop(client);
        let mut reader = FrameReader::new(server);
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let (mut client, server) = tokio::io::duplex(1024);
        let len = (MAX_MESSAGE_SIZE as u32) + 1;
        client.write_all(&len.to_be_bytes()).await.unwrap();

        let mut reader = FrameReader::new(server);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, RpcError::FrameTooLarge { .. }));
    }
}
