//! RFC 959 FTP backend over blocking TCP.
//!
//! One control connection per session; each transfer opens its own data
//! connection, passive (`PASV`) or active (`PORT`). Only IPv4 data
//! connections are supported.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::DEFAULT_TIMEOUT;
use crate::error::SessionError;
use crate::mode::TransferMode;
use crate::path::join_remote_path;
use crate::session::RemoteSession;

/// Buffer size for text-mode line-ending conversion.
const TEXT_BUFFER_SIZE: usize = 64 * 1024;

/// Poll interval while waiting for an active-mode data connection.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A complete server reply. Multi-line replies keep every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    fn into_error(self) -> SessionError {
        SessionError::Reply {
            code: self.code,
            message: self.text(),
        }
    }

    /// Accepts replies in the given class (`1` preliminary, `2` completion,
    /// `3` intermediate).
    fn expect_class(self, class: u16) -> Result<Self, SessionError> {
        if self.code / 100 == class {
            Ok(self)
        } else {
            Err(self.into_error())
        }
    }
}

/// FTP session over a blocking control connection.
#[derive(Debug)]
pub struct FtpSession {
    control: Option<Control>,
    passive: bool,
    timeout: Duration,
}

impl Default for FtpSession {
    fn default() -> Self {
        Self::new()
    }
}

impl FtpSession {
    pub fn new() -> Self {
        Self {
            control: None,
            passive: true,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Connect, read and accept timeout for control and data connections.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_connected(&self) -> bool {
        self.control.is_some()
    }

    pub fn is_passive(&self) -> bool {
        self.passive
    }

    fn control(&mut self) -> Result<&mut Control, SessionError> {
        self.control
            .as_mut()
            .ok_or_else(|| SessionError::Protocol("not connected".into()))
    }

    /// Runs one data-connection command: `TYPE`, data channel setup, the
    /// command itself, `exchange` over the data stream, then the final reply.
    fn transfer<T>(
        &mut self,
        command: &str,
        mode: TransferMode,
        exchange: impl FnOnce(TcpStream) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        let timeout = self.timeout;
        let passive = self.passive;
        let control = self.control()?;

        control
            .command(&format!("TYPE {}", mode.type_code()))?
            .expect_class(2)?;
        let channel = open_data_channel(control, passive, timeout)?;
        control.command(command)?.expect_class(1)?;

        let outcome = channel
            .establish(timeout)
            .map_err(SessionError::from)
            .and_then(exchange);

        // The data stream is closed by now. Its final reply is read on every
        // path so the next command is answered by its own reply.
        let reply = control.reply();
        let value = outcome?;
        reply?.expect_class(2)?;
        Ok(value)
    }
}

impl RemoteSession for FtpSession {
    fn connect(&mut self, host: &str, port: u16) -> Result<(), SessionError> {
        if self.control.is_some() {
            return Err(SessionError::Protocol("already connected".into()));
        }

        let mut last_error = None;
        let mut stream = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => last_error = Some(e),
            }
        }
        let stream = match stream {
            Some(s) => s,
            None => {
                return Err(last_error
                    .unwrap_or_else(|| {
                        io::Error::new(io::ErrorKind::NotFound, format!("no address for {host}"))
                    })
                    .into());
            }
        };
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let mut control = Control::new(stream)?;
        let mut greeting = control.reply()?;
        if greeting.code == 120 {
            greeting = control.reply()?;
        }
        greeting.expect_class(2)?;

        info!(host, port, "ftp control connection established");
        self.control = Some(control);
        Ok(())
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), SessionError> {
        let control = self.control()?;
        let reply = control.command(&format!("USER {username}"))?;
        let reply = match reply.code {
            230 => return Ok(()),
            331 => control.command(&format!("PASS {password}"))?,
            _ => return Err(reply.into_error()),
        };
        match reply.code {
            230 | 202 => Ok(()),
            _ => Err(reply.into_error()),
        }
    }

    fn set_passive(&mut self, enabled: bool) -> Result<(), SessionError> {
        self.control()?;
        self.passive = enabled;
        Ok(())
    }

    fn current_dir(&mut self) -> Result<String, SessionError> {
        let reply = self.control()?.command("PWD")?.expect_class(2)?;
        let text = reply.text();
        parse_pwd(&text).ok_or_else(|| SessionError::Protocol(format!("malformed PWD reply: {text}")))
    }

    fn change_dir(&mut self, path: &str) -> Result<(), SessionError> {
        self.control()?
            .command(&format!("CWD {path}"))?
            .expect_class(2)?;
        Ok(())
    }

    fn make_dir(&mut self, path: &str) -> Result<(), SessionError> {
        self.control()?
            .command(&format!("MKD {path}"))?
            .expect_class(2)?;
        Ok(())
    }

    fn put(&mut self, remote: &str, local: &Path, mode: TransferMode) -> Result<(), SessionError> {
        let file = File::open(local)?;
        self.transfer(&format!("STOR {remote}"), mode, |mut stream| {
            let mut reader = BufReader::new(file);
            let sent = match mode {
                TransferMode::Binary => io::copy(&mut reader, &mut stream)?,
                TransferMode::Text => copy_text_to_network(&mut reader, &mut stream)?,
            };
            stream.flush()?;
            debug!(remote, bytes = sent, "STOR data sent");
            Ok(())
        })
    }

    fn get(&mut self, local: &Path, remote: &str, mode: TransferMode) -> Result<(), SessionError> {
        self.transfer(&format!("RETR {remote}"), mode, |mut stream| {
            let mut file = File::create(local)?;
            let received = match mode {
                TransferMode::Binary => io::copy(&mut stream, &mut file)?,
                TransferMode::Text => copy_text_from_network(&mut stream, &mut file)?,
            };
            file.flush()?;
            debug!(remote, bytes = received, "RETR data received");
            Ok(())
        })
    }

    fn delete(&mut self, path: &str) -> Result<(), SessionError> {
        self.control()?
            .command(&format!("DELE {path}"))?
            .expect_class(2)?;
        Ok(())
    }

    fn remove_dir(&mut self, path: &str) -> Result<(), SessionError> {
        self.control()?
            .command(&format!("RMD {path}"))?
            .expect_class(2)?;
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> Result<(), SessionError> {
        let control = self.control()?;
        control.command(&format!("RNFR {from}"))?.expect_class(3)?;
        control.command(&format!("RNTO {to}"))?.expect_class(2)?;
        Ok(())
    }

    fn chmod(&mut self, path: &str, mode: u32) -> Result<(), SessionError> {
        self.control()?
            .command(&format!("SITE CHMOD {mode:o} {path}"))?
            .expect_class(2)?;
        Ok(())
    }

    fn list(&mut self, path: &str) -> Result<Vec<String>, SessionError> {
        let names = self.transfer(&format!("NLST {path}"), TransferMode::Text, |stream| {
            let mut names = Vec::new();
            for line in BufReader::new(stream).lines() {
                let line = line?;
                let name = line.trim_end_matches('\r');
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
            Ok(names)
        })?;

        // Servers differ on whether NLST returns bare names or full paths.
        Ok(names
            .into_iter()
            .map(|name| {
                if name.contains('/') {
                    name
                } else {
                    join_remote_path(path, &name)
                }
            })
            .collect())
    }

    fn close(&mut self) -> Result<(), SessionError> {
        let Some(mut control) = self.control.take() else {
            return Ok(());
        };
        match control.command("QUIT") {
            Ok(reply) => debug!(code = reply.code, "ftp session closed"),
            Err(e) => debug!(error = %e, "QUIT failed, dropping connection"),
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Control connection
// ----------------------------------------------------------------------

#[derive(Debug)]
struct Control {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Control {
    fn new(stream: TcpStream) -> io::Result<Self> {
        let writer = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
        })
    }

    fn send(&mut self, command: &str) -> Result<(), SessionError> {
        let shown = if command.starts_with("PASS ") {
            "PASS ****"
        } else {
            command
        };
        debug!(command = shown, "ftp >");
        self.writer.write_all(command.as_bytes())?;
        self.writer.write_all(b"\r\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn reply(&mut self) -> Result<Reply, SessionError> {
        let reply = read_reply(&mut self.reader)?;
        debug!(code = reply.code, text = %reply.text(), "ftp <");
        Ok(reply)
    }

    fn command(&mut self, command: &str) -> Result<Reply, SessionError> {
        self.send(command)?;
        self.reply()
    }
}

/// Reads one reply, following `NNN-` continuation lines to the closing
/// `NNN ` line.
fn read_reply(reader: &mut impl BufRead) -> Result<Reply, SessionError> {
    let first = read_line(reader)?;
    let (code, continued, text) = split_status(&first)?;
    let mut lines = vec![text.to_string()];

    if continued {
        let code_str = code.to_string();
        loop {
            let line = read_line(reader)?;
            if let Some(rest) = line.strip_prefix(&code_str) {
                if rest.is_empty() || rest.starts_with(' ') {
                    lines.push(rest.trim_start().to_string());
                    break;
                }
            }
            lines.push(line);
        }
    }

    Ok(Reply { code, lines })
}

fn read_line(reader: &mut impl BufRead) -> Result<String, SessionError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(SessionError::Protocol(
            "control connection closed by server".into(),
        ));
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Splits `NNN text` / `NNN-text` into code, continuation flag and text.
fn split_status(line: &str) -> Result<(u16, bool, &str), SessionError> {
    let code = line
        .get(..3)
        .and_then(|c| c.parse::<u16>().ok())
        .filter(|c| (100..600).contains(c))
        .ok_or_else(|| SessionError::Protocol(format!("malformed reply: {line}")))?;
    let continued = line[3..].starts_with('-');
    let text = line.get(4..).unwrap_or("");
    Ok((code, continued, text))
}

/// Extracts the quoted directory from a `257` reply; `""` escapes a quote.
fn parse_pwd(text: &str) -> Option<String> {
    let start = text.find('"')? + 1;
    let mut out = String::new();
    let mut chars = text[start..].chars().peekable();
    while let Some(c) = chars.next() {
        if c == '"' {
            if chars.peek() == Some(&'"') {
                chars.next();
                out.push('"');
            } else {
                return Some(out);
            }
        } else {
            out.push(c);
        }
    }
    None
}

/// Extracts `h1,h2,h3,h4,p1,p2` from a `227` reply.
fn parse_pasv(text: &str) -> Option<SocketAddr> {
    let start = text
        .find('(')
        .map(|i| i + 1)
        .or_else(|| text.find(|c: char| c.is_ascii_digit()))?;
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == ',' || c == ' '))
        .unwrap_or(rest.len());

    let parts = rest[..end]
        .split(',')
        .map(|p| p.trim().parse::<u8>().ok())
        .collect::<Option<Vec<_>>>()?;
    let [a, b, c, d, p1, p2] = parts.as_slice() else {
        return None;
    };

    let ip = Ipv4Addr::new(*a, *b, *c, *d);
    let port = (u16::from(*p1) << 8) | u16::from(*p2);
    Some(SocketAddr::from((ip, port)))
}

// ----------------------------------------------------------------------
// Data connection
// ----------------------------------------------------------------------

enum DataChannel {
    Passive(TcpStream),
    Active(TcpListener),
}

fn open_data_channel(
    control: &mut Control,
    passive: bool,
    timeout: Duration,
) -> Result<DataChannel, SessionError> {
    if passive {
        let reply = control.command("PASV")?.expect_class(2)?;
        let text = reply.text();
        let mut addr = parse_pasv(&text)
            .ok_or_else(|| SessionError::Protocol(format!("malformed PASV reply: {text}")))?;
        if addr.ip().is_unspecified() {
            addr.set_ip(control.writer.peer_addr()?.ip());
        }

        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        debug!(%addr, "passive data connection opened");
        return Ok(DataChannel::Passive(stream));
    }

    let local = control.writer.local_addr()?;
    let SocketAddr::V4(local) = local else {
        return Err(SessionError::Protocol(
            "active mode requires an IPv4 control connection".into(),
        ));
    };
    let listener = TcpListener::bind((*local.ip(), 0))?;
    let port = listener.local_addr()?.port();
    let [a, b, c, d] = local.ip().octets();

    control
        .command(&format!("PORT {a},{b},{c},{d},{},{}", port >> 8, port & 0xff))?
        .expect_class(2)?;
    Ok(DataChannel::Active(listener))
}

impl DataChannel {
    fn establish(self, timeout: Duration) -> io::Result<TcpStream> {
        let listener = match self {
            DataChannel::Passive(stream) => return Ok(stream),
            DataChannel::Active(listener) => listener,
        };

        listener.set_nonblocking(true)?;
        let deadline = Instant::now() + timeout;
        loop {
            match listener.accept() {
                Ok((stream, peer)) => {
                    stream.set_nonblocking(false)?;
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    debug!(%peer, "active data connection accepted");
                    return Ok(stream);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(io::Error::new(
                            io::ErrorKind::TimedOut,
                            "server did not open the data connection",
                        ));
                    }
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Copies `src` to `dst`, turning bare `\n` into `\r\n`.
fn copy_text_to_network(src: &mut impl Read, dst: &mut impl Write) -> io::Result<u64> {
    let mut buf = vec![0u8; TEXT_BUFFER_SIZE];
    let mut out = Vec::with_capacity(TEXT_BUFFER_SIZE * 2);
    let mut prev_cr = false;
    let mut total = 0u64;

    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.clear();
        for &b in &buf[..n] {
            if b == b'\n' && !prev_cr {
                out.push(b'\r');
            }
            out.push(b);
            prev_cr = b == b'\r';
        }
        dst.write_all(&out)?;
        total += out.len() as u64;
    }

    Ok(total)
}

/// Copies `src` to `dst`, turning `\r\n` into `\n`.
fn copy_text_from_network(src: &mut impl Read, dst: &mut impl Write) -> io::Result<u64> {
    let mut buf = vec![0u8; TEXT_BUFFER_SIZE];
    let mut out = Vec::with_capacity(TEXT_BUFFER_SIZE);
    let mut pending_cr = false;
    let mut total = 0u64;

    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        out.clear();
        for &b in &buf[..n] {
            if pending_cr {
                if b != b'\n' {
                    out.push(b'\r');
                }
                pending_cr = false;
            }
            if b == b'\r' {
                pending_cr = true;
            } else {
                out.push(b);
            }
        }
        dst.write_all(&out)?;
        total += out.len() as u64;
    }

    if pending_cr {
        dst.write_all(b"\r")?;
        total += 1;
    }
    Ok(total)
}
