//! Upload ingestion.
//!
//! Accepts inbound files for one upload field, checks each against a
//! [`ValidationPolicy`], and commits it under a collision-free name chosen
//! by a [`NamingPolicy`]. Policy violations are collected and returned,
//! never raised.

mod inbound;
mod ingest;
mod naming;
mod policy;

pub use inbound::{InboundFile, StagedFile};
pub use ingest::{CommittedFile, IngestReport, IngestionValidator, SkippedFile, ingest};
pub use naming::{Delimiter, NamingPolicy};
pub use policy::{SizeUnit, ValidationPolicy, Violation, parse_size};

/// Default upper bound for the per-call filename counter.
pub const DEFAULT_MAX_INCREMENT: u32 = 100;

/// Programmer errors: the policies themselves are unusable.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid naming policy: {0}")]
    InvalidNaming(String),

    #[error("invalid validation policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid size '{0}'")]
    InvalidSize(String),
}
