//! Byte-level transfer primitives.
//!
//! - [`ByteCursor`]: positioned reads over a seekable handle with an
//!   explicitly tracked position.
//! - [`RangeDelivery`]: streams a file or buffer to a [`ResponseSink`],
//!   honoring single `bytes=` ranges and an optional rate cap.
//! - Checksum and relative-path helpers shared by the ingest and
//!   remote-sync crates.

mod checksum;
mod cursor;
mod delivery;
mod range;
mod response;
mod throttle;
mod validation;

pub use checksum::{calculate_file_checksum, checksum_bytes};
pub use cursor::ByteCursor;
pub use delivery::{
    DeliveryOutcome, DeliveryRequest, DeliverySettings, DeliverySource, RangeDelivery,
    outbound_filename,
};
pub use range::ByteRange;
pub use response::{BufferedResponse, HttpResponseWriter, ResponseSink};
pub use throttle::Throttle;
pub use validation::validate_relative_path;

/// Default chunk size for unthrottled file delivery: 512 KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 512 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("range not satisfiable: bytes {first}-{last} of {size}")]
    RangeNotSatisfiable { first: u64, last: u64, size: u64 },

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
