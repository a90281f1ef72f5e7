// SSLv3/TLS record layer over an async byte stream

use super::{ALERT, MAX_RECORD_LEN};
use crate::error::{ProbeError, ProbeResult};
use crate::probe_bail;
use bytes::{Buf, BufMut, BytesMut};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Run an I/O future under an optional deadline; expiry maps to
/// `ProbeError::Timeout` and the stream must not be used afterwards
pub(crate) async fn with_timeout<T, F>(limit: Option<Duration>, fut: F) -> ProbeResult<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => Ok(tokio::time::timeout(limit, fut).await??),
        None => Ok(fut.await?),
    }
}

/// Record framing for one connection. Outgoing bytes are buffered and
/// framed on flush; incoming records are checked and unwrapped, with
/// alerts intercepted.
pub struct RecordLayer<S> {
    stream: S,
    read_timeout: Option<Duration>,

    out_type: u8,
    out_version: u16,
    out_buf: BytesMut,

    in_expected_type: u8,
    in_version: Option<u16>,
    in_buf: BytesMut,
}

impl<S: AsyncRead + AsyncWrite + Unpin> RecordLayer<S> {
    pub fn new(stream: S, read_timeout: Option<Duration>) -> Self {
        Self {
            stream,
            read_timeout,
            out_type: 0,
            out_version: 0,
            out_buf: BytesMut::with_capacity(MAX_RECORD_LEN + 5),
            in_expected_type: 0,
            in_version: None,
            in_buf: BytesMut::new(),
        }
    }

    /// Change the outgoing record type, flushing pending data of the
    /// previous type
    pub async fn set_out_type(&mut self, record_type: u8) -> ProbeResult<()> {
        if self.out_type != record_type {
            if self.out_type != 0 {
                self.flush().await?;
            }
            self.out_type = record_type;
        }
        Ok(())
    }

    pub fn set_out_version(&mut self, version: u16) {
        self.out_version = version;
    }

    /// Type of records the reader accepts (alerts are always accepted)
    pub fn set_expected_type(&mut self, record_type: u8) {
        self.in_expected_type = record_type;
    }

    /// Version of the incoming records, once one was seen
    pub fn in_version(&self) -> Option<u16> {
        self.in_version
    }

    /// Buffer record payload, emitting full records as needed
    pub async fn write(&mut self, mut data: &[u8]) -> ProbeResult<()> {
        while !data.is_empty() {
            let room = MAX_RECORD_LEN - self.out_buf.len();
            let n = room.min(data.len());
            self.out_buf.put_slice(&data[..n]);
            data = &data[n..];
            if self.out_buf.len() == MAX_RECORD_LEN {
                self.flush().await?;
            }
        }
        Ok(())
    }

    /// Write bytes on the stream as-is, bypassing record framing
    pub async fn raw_write(&mut self, data: &[u8]) -> ProbeResult<()> {
        self.stream.write_all(data).await?;
        Ok(())
    }

    /// Emit buffered data as one record (if any), then flush the stream
    pub async fn flush(&mut self) -> ProbeResult<()> {
        if !self.out_buf.is_empty() {
            let mut header = [0u8; 5];
            header[0] = self.out_type;
            header[1..3].copy_from_slice(&self.out_version.to_be_bytes());
            header[3..5].copy_from_slice(&(self.out_buf.len() as u16).to_be_bytes());
            self.stream.write_all(&header).await?;
            self.stream.write_all(&self.out_buf).await?;
            self.out_buf.clear();
        }
        self.stream.flush().await?;
        Ok(())
    }

    /// Read exactly `buf.len()` payload bytes of the expected type
    pub async fn read_exact(&mut self, buf: &mut [u8]) -> ProbeResult<()> {
        let mut off = 0;
        while off < buf.len() {
            if self.in_buf.is_empty() {
                self.refill().await?;
            }
            let n = self.in_buf.len().min(buf.len() - off);
            self.in_buf.copy_to_slice(&mut buf[off..off + n]);
            off += n;
        }
        Ok(())
    }

    pub async fn read_u8(&mut self) -> ProbeResult<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b).await?;
        Ok(b[0])
    }

    async fn read_raw(&mut self, buf: &mut [u8]) -> ProbeResult<()> {
        with_timeout(self.read_timeout, self.stream.read_exact(buf)).await?;
        Ok(())
    }

    async fn refill(&mut self) -> ProbeResult<()> {
        loop {
            let mut header = [0u8; 5];
            self.read_raw(&mut header).await?;
            let record_type = header[0];
            let version = u16::from_be_bytes([header[1], header[2]]);
            let len = u16::from_be_bytes([header[3], header[4]]) as usize;

            if version >> 8 != 3 {
                probe_bail!("not an SSL 3.x record (0x{:04X})", version);
            }
            match self.in_version {
                Some(v) if v != version => probe_bail!("record version change"),
                _ => self.in_version = Some(version),
            }
            if len > MAX_RECORD_LEN {
                probe_bail!("oversized input payload (len={})", len);
            }
            if record_type != self.in_expected_type && record_type != ALERT {
                probe_bail!("unexpected record type: {}", record_type);
            }

            let mut payload = vec![0u8; len];
            self.read_raw(&mut payload).await?;

            if record_type == ALERT {
                for pair in payload.chunks(2) {
                    let level = pair[0];
                    if level != 1 {
                        let code = pair.get(1).copied().unwrap_or(level);
                        return Err(ProbeError::Alert(code));
                    }
                    tracing::debug!("warning alert skipped: {:?}", pair.get(1));
                }
                continue;
            }
            if payload.is_empty() {
                continue;
            }
            self.in_buf.put_slice(&payload);
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{HANDSHAKE, SSLV3, TLS10};
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_flush_frames_buffered_data() {
        let (client, mut server) = duplex(65536);
        let mut rec = RecordLayer::new(client, None);
        rec.set_out_type(HANDSHAKE).await.unwrap();
        rec.set_out_version(SSLV3);
        rec.write(b"hello").await.unwrap();
        rec.flush().await.unwrap();
        // nothing buffered: no empty record
        rec.flush().await.unwrap();
        drop(rec);

        let mut got = Vec::new();
        server.read_to_end(&mut got).await.unwrap();
        assert_eq!(got, vec![22, 3, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);
    }

    #[tokio::test]
    async fn test_large_write_is_split() {
        let (client, mut server) = duplex(65536);
        let mut rec = RecordLayer::new(client, None);
        rec.set_out_type(HANDSHAKE).await.unwrap();
        rec.set_out_version(TLS10);
        rec.write(&vec![0xAA; MAX_RECORD_LEN + 10]).await.unwrap();
        rec.flush().await.unwrap();
        drop(rec);

        let mut got = Vec::new();
        server.read_to_end(&mut got).await.unwrap();
        assert_eq!(got.len(), MAX_RECORD_LEN + 10 + 10);
        assert_eq!(&got[3..5], &[0x40, 0x00]);
        assert_eq!(&got[MAX_RECORD_LEN + 5..MAX_RECORD_LEN + 10], &[22, 3, 1, 0, 10]);
    }

    #[tokio::test]
    async fn test_read_across_records() {
        let (client, mut server) = duplex(1024);
        server
            .write_all(&[22, 3, 1, 0, 2, 1, 2, 22, 3, 1, 0, 0, 22, 3, 1, 0, 1, 3])
            .await
            .unwrap();
        let mut rec = RecordLayer::new(client, None);
        rec.set_expected_type(HANDSHAKE);
        let mut buf = [0u8; 3];
        rec.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(rec.in_version(), Some(TLS10));
    }

    #[tokio::test]
    async fn test_truncated_record_fails() {
        let (client, mut server) = duplex(1024);
        let mut data = vec![22, 3, 1, 0x01, 0x2C];
        data.extend_from_slice(&[0u8; 200]);
        server.write_all(&data).await.unwrap();
        drop(server);
        let mut rec = RecordLayer::new(client, None);
        rec.set_expected_type(HANDSHAKE);
        let err = rec.read_u8().await.unwrap_err();
        assert!(matches!(err, ProbeError::Io(_)));
    }

    #[tokio::test]
    async fn test_alerts() {
        // warning then fatal handshake_failure
        let (client, mut server) = duplex(1024);
        server.write_all(&[21, 3, 1, 0, 2, 1, 0, 21, 3, 1, 0, 2, 2, 40]).await.unwrap();
        let mut rec = RecordLayer::new(client, None);
        rec.set_expected_type(HANDSHAKE);
        assert!(matches!(rec.read_u8().await, Err(ProbeError::Alert(40))));

        // fatal level without description reports the level
        let (client, mut server) = duplex(1024);
        server.write_all(&[21, 3, 1, 0, 1, 2]).await.unwrap();
        let mut rec = RecordLayer::new(client, None);
        rec.set_expected_type(HANDSHAKE);
        assert!(matches!(rec.read_u8().await, Err(ProbeError::Alert(2))));
    }

    #[tokio::test]
    async fn test_framing_checks() {
        for (data, needle) in [
            (vec![22, 2, 0, 0, 1, 0], "not an SSL 3.x record"),
            (vec![22, 3, 1, 0x40, 0x01], "oversized"),
            (vec![23, 3, 1, 0, 1, 0], "unexpected record type"),
            (vec![22, 3, 1, 0, 0, 22, 3, 3, 0, 1, 0], "record version change"),
        ] {
            let (client, mut server) = duplex(1024);
            server.write_all(&data).await.unwrap();
            let mut rec = RecordLayer::new(client, None);
            rec.set_expected_type(HANDSHAKE);
            match rec.read_u8().await {
                Err(ProbeError::Protocol(m)) => assert!(m.contains(needle), "{}", m),
                other => panic!("unexpected: {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let (client, _server) = duplex(1024);
        let mut rec = RecordLayer::new(client, Some(Duration::from_millis(50)));
        rec.set_expected_type(HANDSHAKE);
        assert!(matches!(rec.read_u8().await, Err(ProbeError::Timeout)));
    }
}
