//! The byte-stream transport consumed by a connection.

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// A bidirectional byte stream.
///
/// The core performs all of its I/O through this trait; dialing, TLS, and
/// timeouts live on the caller's side of it. `read` returns at least one
/// byte on success and 0 at end of stream; `write_all` completes once every
/// byte has been handed to the transport; `close` is idempotent.
pub trait Transport: Unpin {
    /// Read up to `buf.len()` bytes.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>>;

    /// Write the whole buffer.
    fn write_all(&mut self, buf: &[u8]) -> impl Future<Output = io::Result<()>>;

    /// Close the stream. Subsequent calls are no-ops.
    fn close(&mut self) -> impl Future<Output = io::Result<()>>;
}

/// [`Transport`] over a tokio TCP stream, read-buffered.
pub struct TcpTransport {
    stream: BufReader<TcpStream>,
    closed: bool,
}

impl TcpTransport {
    /// Wrap an established TCP stream. Nagle's algorithm is disabled; the
    /// connection flushes whole protocol messages itself.
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nodelay(true)?;
        Ok(Self {
            stream: BufReader::new(stream),
            closed: false,
        })
    }
}

impl Transport for TcpTransport {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let stream = self.stream.get_mut();
        stream.write_all(buf).await?;
        stream.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.stream.get_mut().shutdown().await
    }
}
