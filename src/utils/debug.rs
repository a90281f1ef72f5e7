// Traffic tee - hex dump of every byte sent and received

use std::io::{self, Write};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Shared sink for the traffic dump
pub type DebugLog = Arc<Mutex<Box<dyn Write + Send>>>;

/// Open (truncate) a dump file
pub fn open_log(path: &std::path::Path) -> io::Result<DebugLog> {
    let file = std::fs::File::create(path)?;
    let sink: Box<dyn Write + Send> = Box::new(io::BufWriter::new(file));
    Ok(Arc::new(Mutex::new(sink)))
}

/// Separator written before each new connection
pub fn write_separator(log: &DebugLog) {
    if let Ok(mut w) = log.lock() {
        let _ = writeln!(w, "{}", "=".repeat(75));
    }
}

/// Hex dump: 16 bytes per line, extra gap after 8, continuation lines
/// indented to align with the direction marker
fn dump(w: &mut dyn Write, prefix: &str, data: &[u8]) -> io::Result<()> {
    write!(w, "{}", prefix)?;
    for (i, b) in data.iter().enumerate() {
        if i != 0 {
            if i & 15 == 0 {
                write!(w, "\n    ")?;
            } else if i & 7 == 0 {
                write!(w, "  ")?;
            } else {
                write!(w, " ")?;
            }
        }
        write!(w, "{:02x}", b)?;
    }
    writeln!(w)
}

/// Stream wrapper logging `>>>` for writes and `<<<` for reads
pub struct DebugStream<S> {
    inner: S,
    log: DebugLog,
}

impl<S> DebugStream<S> {
    pub fn new(inner: S, log: DebugLog) -> Self {
        Self { inner, log }
    }

    fn record(&self, prefix: &str, data: &[u8]) {
        if let Ok(mut w) = self.log.lock() {
            let _ = dump(&mut **w, prefix, data);
        }
    }

    fn record_eof(&self) {
        if let Ok(mut w) = self.log.lock() {
            let _ = writeln!(w, "<<< EOF");
        }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for DebugStream<S> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let before = buf.filled().len();
        let res = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &res {
            let got = &buf.filled()[before..];
            if got.is_empty() {
                self.record_eof();
            } else {
                self.record("<<< ", got);
            }
        }
        res
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for DebugStream<S> {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let res = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &res {
            self.record(">>> ", &buf[..*n]);
        }
        res
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if let Ok(mut w) = self.log.lock() {
            let _ = w.flush();
        }
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

impl<S> Drop for DebugStream<S> {
    fn drop(&mut self) {
        if let Ok(mut w) = self.log.lock() {
            let _ = w.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, duplex};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_dump_layout() {
        let mut out = Vec::new();
        let data: Vec<u8> = (0..18).collect();
        dump(&mut out, ">>> ", &data).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            ">>> 00 01 02 03 04 05 06 07  08 09 0a 0b 0c 0d 0e 0f\n    10 11\n"
        );
    }

    #[tokio::test]
    async fn test_both_directions_are_logged() {
        let sink = Shared::default();
        let boxed: Box<dyn Write + Send> = Box::new(sink.clone());
        let log: DebugLog = Arc::new(Mutex::new(boxed));
        let (client, mut server) = duplex(1024);
        let mut stream = DebugStream::new(client, log.clone());
        write_separator(&log);

        stream.write_all(&[0x16, 0x03]).await.unwrap();
        server.write_all(&[0x15]).await.unwrap();
        drop(server);
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();

        let text = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
        assert!(text.starts_with(&"=".repeat(75)));
        assert!(text.contains(">>> 16 03\n"));
        assert!(text.contains("<<< 15\n"));
        assert!(text.contains("<<< EOF"));
    }
}
