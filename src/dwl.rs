//! The DWL container grammar: `prolog → comments → header → binary →
//! padding → signature`, repeated once each for the UPCK, BINA and SIGN
//! sections in that order.
//!
//! [`DwlParser`] is the inner sub-state-machine that advances through this
//! grammar one subsection at a time, maintaining the running CRC-32 and
//! SHA-1 state the surrounding [`crate::downloader::Downloader`] needs to
//! verify the package once the SIGN section is reached.

mod parser;
mod prolog;
mod tag;

pub use parser::{DwlParser, ParseRequest, ParseStep, Subsection};
pub use prolog::{Prolog, PrologError, UpckHeader};
pub use tag::{SectionTag, UpckType, DWL_MAGIC};

/// Faults raised while parsing the DWL grammar. These map onto
/// [`crate::downloader::UpdateResult`] in the surrounding downloader.
#[derive(thiserror::Error, Debug)]
pub enum DwlError {
    /// Unknown magic, unknown/out-of-order section tag, or an unsupported
    /// `upckType`.
    #[error("unsupported DWL package: {0}")]
    UnsupportedPackage(String),
    /// CRC-32 or SHA-1 verification failed.
    #[error("DWL verification failed: {0}")]
    VerifyError(String),
    /// The caller handed the parser a different number of bytes than it
    /// asked for via [`DwlParser::request`] — indicates a bug in the
    /// surrounding [`crate::stream_buffer::StreamBuffer`], not a malformed
    /// package.
    #[error("parser requested {expected} bytes but received {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl From<PrologError> for DwlError {
    fn from(err: PrologError) -> Self {
        DwlError::UnsupportedPackage(err.to_string())
    }
}
