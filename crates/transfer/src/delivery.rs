//! Range-aware, optionally throttled delivery of a file or buffer.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::range::ByteRange;
use crate::response::ResponseSink;
use crate::throttle::Throttle;
use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// Browsers on Android 2.1 and older only save downloads whose extension is
/// upper-cased.
static LEGACY_ANDROID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Android\s(1|2\.[01])").expect("static user agent pattern")
});

const FALLBACK_FILENAME: &str = "download";

/// What to deliver.
#[derive(Debug, Clone)]
pub enum DeliverySource {
    File(PathBuf),
    Buffer(Vec<u8>),
}

/// One delivery to one client.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub source: DeliverySource,
    /// Outbound filename; defaults to the file's basename.
    pub filename: Option<String>,
    /// Declared MIME type; guessed from the filename when absent.
    pub mime: Option<String>,
    /// Overrides [`DeliverySettings::partial_enabled`].
    pub partial_enabled: Option<bool>,
    /// Overrides [`DeliverySettings::speed_limit`] (bytes/sec, 0 = unlimited).
    pub speed_limit: Option<u64>,
    /// `User-Agent` of the requesting client.
    pub user_agent: Option<String>,
}

impl DeliveryRequest {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::from_source(DeliverySource::File(path.into()))
    }

    pub fn buffer(data: Vec<u8>, filename: &str) -> Self {
        let mut request = Self::from_source(DeliverySource::Buffer(data));
        request.filename = Some(filename.to_string());
        request
    }

    fn from_source(source: DeliverySource) -> Self {
        Self {
            source,
            filename: None,
            mime: None,
            partial_enabled: None,
            speed_limit: None,
            user_agent: None,
        }
    }

    pub fn with_mime(mut self, mime: &str) -> Self {
        self.mime = Some(mime.to_string());
        self
    }

    pub fn with_partial(mut self, enabled: bool) -> Self {
        self.partial_enabled = Some(enabled);
        self
    }

    pub fn with_speed_limit(mut self, bytes_per_sec: u64) -> Self {
        self.speed_limit = Some(bytes_per_sec);
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = Some(user_agent.to_string());
        self
    }
}

/// Service-wide delivery defaults.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub partial_enabled: bool,
    pub speed_limit: u64,
    /// Pause between throttled chunks.
    pub pause: Duration,
    /// Chunk size for unthrottled file delivery.
    pub chunk_size: usize,
    /// Lifetime announced in the `Expires` header.
    pub expires_after: Duration,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            partial_enabled: false,
            speed_limit: 0,
            pause: Duration::from_secs(1),
            chunk_size: DEFAULT_CHUNK_SIZE,
            expires_after: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// Result of a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub status: u16,
    pub content_length: u64,
    pub bytes_sent: u64,
    pub range: Option<ByteRange>,
    /// `false` when the client went away before the body was complete.
    pub completed: bool,
}

/// Streams resources to clients. Blocking: one delivery per thread.
#[derive(Debug, Clone, Default)]
pub struct RangeDelivery {
    settings: DeliverySettings,
}

impl RangeDelivery {
    pub fn new(settings: DeliverySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DeliverySettings {
        &self.settings
    }

    /// Delivers `request` to `sink`, honoring `range_header` when partial
    /// delivery is enabled.
    ///
    /// Nothing is written to the sink if the resource cannot be resolved or
    /// the range is unsatisfiable.
    pub fn deliver<S: ResponseSink + ?Sized>(
        &self,
        request: &DeliveryRequest,
        range_header: Option<&str>,
        sink: &mut S,
    ) -> Result<DeliveryOutcome, TransferError> {
        let resource = Resource::open(&request.source)?;
        let size = resource.size();

        let base_name = request
            .filename
            .clone()
            .or_else(|| match &request.source {
                DeliverySource::File(path) => basename(path),
                DeliverySource::Buffer(_) => None,
            })
            .unwrap_or_else(|| FALLBACK_FILENAME.to_string());
        let filename = outbound_filename(&base_name, request.user_agent.as_deref());
        let mime = request.mime.clone().unwrap_or_else(|| {
            mime_guess::from_path(&base_name)
                .first_or_octet_stream()
                .to_string()
        });

        let partial_enabled = request
            .partial_enabled
            .unwrap_or(self.settings.partial_enabled);
        let range = match range_header {
            Some(header) if partial_enabled => ByteRange::parse(header, size)?,
            Some(_) => {
                debug!("range requested but partial delivery disabled");
                None
            }
            None => None,
        };

        let (status, content_length) = match range {
            Some(range) => {
                sink.status(206, "Partial Content")?;
                sink.header("Content-Length", &range.len().to_string())?;
                sink.header("Content-Range", &range.content_range(size))?;
                (206, range.len())
            }
            None => {
                sink.status(200, "OK")?;
                sink.header("Content-Length", &size.to_string())?;
                (200, size)
            }
        };

        sink.header("Content-Type", &mime)?;
        sink.header(
            "Content-Disposition",
            &format!("attachment; filename=\"{}\"", filename.replace('"', "\\\"")),
        )?;
        sink.header("Expires", &self.expires_header())?;
        sink.header("Accept-Ranges", "bytes")?;
        sink.header("Cache-Control", "private")?;
        sink.header("Pragma", "private")?;

        let start = range.map_or(0, |r| r.first);
        let throttle = Throttle::new(
            request.speed_limit.unwrap_or(self.settings.speed_limit),
            self.settings.pause,
        );
        let bytes_sent = match resource {
            Resource::Buffer(data) => {
                let body = &data[start as usize..(start + content_length) as usize];
                if throttle.is_limited() {
                    self.pump(body, &throttle, sink)?
                } else {
                    sink.write_body(body)?;
                    sink.flush()?;
                    content_length
                }
            }
            Resource::File { mut file, .. } => {
                file.seek(SeekFrom::Start(start))?;
                self.pump(file.take(content_length), &throttle, sink)?
            }
        };

        let completed = bytes_sent == content_length;
        if completed {
            info!(file = %filename, status, bytes = bytes_sent, "delivery complete");
        } else {
            warn!(
                file = %filename,
                sent = bytes_sent,
                expected = content_length,
                "client disconnected, delivery stopped early"
            );
        }

        Ok(DeliveryOutcome {
            status,
            content_length,
            bytes_sent,
            range,
            completed,
        })
    }

    /// Copies `reader` to the sink chunk by chunk, pausing between chunks when
    /// throttled and stopping cleanly once the sink reports a closed connection.
    fn pump<R: Read, S: ResponseSink + ?Sized>(
        &self,
        mut reader: R,
        throttle: &Throttle,
        sink: &mut S,
    ) -> Result<u64, TransferError> {
        let mut buf = vec![0u8; throttle.chunk_size(self.settings.chunk_size)];
        let mut sent = 0u64;
        let mut first = true;

        loop {
            if sink.is_closed() {
                break;
            }
            let n = read_full(&mut reader, &mut buf)?;
            if n == 0 {
                break;
            }
            if !first {
                throttle.pause();
            }
            first = false;

            sink.write_body(&buf[..n])?;
            sent += n as u64;
            sink.flush()?;
            debug!(chunk = n, sent, "delivered chunk");
        }

        Ok(sent)
    }

    fn expires_header(&self) -> String {
        let lifetime =
            TimeDelta::from_std(self.settings.expires_after).unwrap_or(TimeDelta::weeks(1));
        (Utc::now() + lifetime)
            .format("%a, %d %b %Y %H:%M:%S GMT")
            .to_string()
    }
}

/// Outbound filename for a client, upper-casing the extension for legacy
/// Android browsers.
pub fn outbound_filename(name: &str, user_agent: Option<&str>) -> String {
    let legacy = user_agent.is_some_and(|ua| LEGACY_ANDROID.is_match(ua));
    match name.rsplit_once('.') {
        Some((stem, ext)) if legacy => format!("{stem}.{}", ext.to_uppercase()),
        _ => name.to_string(),
    }
}

enum Resource<'a> {
    Buffer(&'a [u8]),
    File { file: File, size: u64 },
}

impl<'a> Resource<'a> {
    fn open(source: &'a DeliverySource) -> Result<Self, TransferError> {
        match source {
            DeliverySource::Buffer(data) => {
                if data.is_empty() {
                    return Err(TransferError::DeliveryFailed("empty buffer".into()));
                }
                Ok(Resource::Buffer(data))
            }
            DeliverySource::File(path) => {
                if path.as_os_str().is_empty() {
                    return Err(TransferError::DeliveryFailed("empty file path".into()));
                }
                let metadata = std::fs::metadata(path).map_err(|e| {
                    TransferError::DeliveryFailed(format!("cannot stat {}: {e}", path.display()))
                })?;
                if !metadata.is_file() {
                    return Err(TransferError::DeliveryFailed(format!(
                        "not a regular file: {}",
                        path.display()
                    )));
                }
                let file = File::open(path).map_err(|e| {
                    TransferError::DeliveryFailed(format!("cannot open {}: {e}", path.display()))
                })?;
                Ok(Resource::File {
                    file,
                    size: metadata.len(),
                })
            }
        }
    }

    fn size(&self) -> u64 {
        match self {
            Resource::Buffer(data) => data.len() as u64,
            Resource::File { size, .. } => *size,
        }
    }
}

fn basename(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Fills `buf` as far as the reader allows; returns 0 only at end of input.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
