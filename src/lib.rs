//! Visual near-duplicate detection for photo collections.
//!
//! Images are reduced to position-binned color sums after background colors
//! are discarded, then compared all-pairs under a per-cell tolerance rule.

pub mod core;
pub mod services;

pub use crate::core::config::{Config, ConfigError};
pub use crate::core::corpus::{Corpus, ExtractionFailure};
pub use crate::core::matcher::{ImageRecord, Orientation, Peer};
