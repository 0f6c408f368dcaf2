//! HTTP-style response channel consumed by [`RangeDelivery`](crate::RangeDelivery).

use std::io::{self, Write};

/// Destination of a delivery: status line, headers, then body bytes.
pub trait ResponseSink {
    /// Sets the status line. Must precede any body write.
    fn status(&mut self, code: u16, reason: &str) -> io::Result<()>;

    /// Adds a response header. Must precede any body write.
    fn header(&mut self, name: &str, value: &str) -> io::Result<()>;

    /// Writes body bytes.
    fn write_body(&mut self, data: &[u8]) -> io::Result<()>;

    /// Pushes buffered output to the client.
    fn flush(&mut self) -> io::Result<()>;

    /// Whether the client connection is known to be gone.
    fn is_closed(&self) -> bool;
}

// ---------------------------------------------------------------------------
// BufferedResponse
// ---------------------------------------------------------------------------

/// In-memory response, for embedding in other servers and for tests.
#[derive(Debug, Default)]
pub struct BufferedResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub flushes: usize,
    body_writes: usize,
    close_after_writes: Option<usize>,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports the connection as closed once `writes` body writes happened.
    pub fn close_after_writes(mut self, writes: usize) -> Self {
        self.close_after_writes = Some(writes);
        self
    }

    /// Looks up a header value (case-insensitive name).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl ResponseSink for BufferedResponse {
    fn status(&mut self, code: u16, reason: &str) -> io::Result<()> {
        self.status = code;
        self.reason = reason.to_string();
        Ok(())
    }

    fn header(&mut self, name: &str, value: &str) -> io::Result<()> {
        self.headers.push((name.to_string(), value.to_string()));
        Ok(())
    }

    fn write_body(&mut self, data: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(data);
        self.body_writes += 1;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.close_after_writes
            .is_some_and(|limit| self.body_writes >= limit)
    }
}

// ---------------------------------------------------------------------------
// HttpResponseWriter
// ---------------------------------------------------------------------------

/// Serializes an HTTP/1.1 response onto any writer (typically a `TcpStream`).
///
/// The head is buffered until the first body write or flush. A broken pipe
/// or reset while writing marks the connection closed instead of failing.
pub struct HttpResponseWriter<W: Write> {
    inner: W,
    head: String,
    head_sent: bool,
    closed: bool,
}

impl<W: Write> HttpResponseWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            head: String::new(),
            head_sent: false,
            closed: false,
        }
    }

    /// Sends any pending head and returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.send_head()?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn send_head(&mut self) -> io::Result<()> {
        if self.head_sent {
            return Ok(());
        }
        if self.head.is_empty() {
            self.head.push_str("HTTP/1.1 200 OK\r\n");
        }
        self.head.push_str("\r\n");
        self.head_sent = true;
        let head = std::mem::take(&mut self.head);
        self.guard(|w| w.write_all(head.as_bytes()))
    }

    fn guard(&mut self, op: impl FnOnce(&mut W) -> io::Result<()>) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        match op(&mut self.inner) {
            Ok(()) => Ok(()),
            Err(e) if is_disconnect(&e) => {
                tracing::debug!(error = %e, "client disconnected");
                self.closed = true;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl<W: Write> ResponseSink for HttpResponseWriter<W> {
    fn status(&mut self, code: u16, reason: &str) -> io::Result<()> {
        if self.head_sent || !self.head.is_empty() {
            return Err(io::Error::other("status already written"));
        }
        self.head = format!("HTTP/1.1 {code} {reason}\r\n");
        Ok(())
    }

    fn header(&mut self, name: &str, value: &str) -> io::Result<()> {
        if self.head_sent {
            return Err(io::Error::other("headers already sent"));
        }
        if self.head.is_empty() {
            self.head.push_str("HTTP/1.1 200 OK\r\n");
        }
        self.head.push_str(&format!("{name}: {value}\r\n"));
        Ok(())
    }

    fn write_body(&mut self, data: &[u8]) -> io::Result<()> {
        self.send_head()?;
        self.guard(|w| w.write_all(data))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_head()?;
        self.guard(|w| w.flush())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

fn is_disconnect(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn http_writer_serializes_head_then_body() {
        let mut writer = HttpResponseWriter::new(Vec::new());
        writer.status(206, "Partial Content").unwrap();
        writer.header("Content-Length", "3").unwrap();
        writer.write_body(b"abc").unwrap();

        let raw = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            raw,
            "HTTP/1.1 206 Partial Content\r\nContent-Length: 3\r\n\r\nabc"
        );
    }

    #[test]
    fn http_writer_defaults_to_ok_status() {
        let mut writer = HttpResponseWriter::new(Vec::new());
        writer.header("Accept-Ranges", "bytes").unwrap();
        let raw = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(raw.ends_with("\r\n\r\n"));
    }

    #[test]
    fn http_writer_rejects_headers_after_body() {
        let mut writer = HttpResponseWriter::new(Vec::new());
        writer.write_body(b"x").unwrap();
        assert!(writer.header("X-Late", "1").is_err());
    }

    #[test]
    fn broken_pipe_marks_closed() {
        let mut writer = HttpResponseWriter::new(BrokenPipe);
        writer.status(200, "OK").unwrap();
        writer.write_body(b"data").unwrap();
        assert!(writer.is_closed());
    }

    #[test]
    fn buffered_response_close_after_writes() {
        let mut response = BufferedResponse::new().close_after_writes(2);
        response.write_body(b"a").unwrap();
        assert!(!response.is_closed());
        response.write_body(b"b").unwrap();
        assert!(response.is_closed());
    }

    #[test]
    fn buffered_header_lookup_is_case_insensitive() {
        let mut response = BufferedResponse::new();
        response.header("Content-Type", "text/plain").unwrap();
        assert_eq!(response.header_value("content-type"), Some("text/plain"));
        assert_eq!(response.header_value("expires"), None);
    }
}
