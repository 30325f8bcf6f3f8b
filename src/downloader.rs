//! The outer Downloader State Machine (DSM): orchestrates initialization,
//! info retrieval, download start, incremental parsing/storage, the error
//! funnel, and teardown for a single package download.

mod descriptor;
mod events;
mod state;

pub use descriptor::{Callbacks, ConfigError, PackageDescriptor, PackageInfo, UpdateKind};
pub use events::{DownloadEvent, EventSink, FirmwareState, SoftwareState};
pub use state::{Downloader, DownloaderState};

/// The closed set of outcomes a run can end in, mapped onto
/// `set_fw_result`/`set_sw_result` and the `download-end` `errorCode`.
#[derive(thiserror::Error, Debug, Eq, PartialEq, Copy, Clone)]
pub enum UpdateResult {
    #[error("normal")]
    Normal,
    #[error("no storage space available")]
    NoStorageSpace,
    #[error("out of memory")]
    OutOfMemory,
    #[error("package verification failed")]
    VerifyError,
    #[error("unsupported package type")]
    UnsupportedPkgType,
    #[error("invalid package URI")]
    InvalidUri,
    #[error("a communication error occurred")]
    CommunicationError,
    #[error("unsupported download protocol")]
    UnsupportedProtocol,
}

/// The `download-end` `errorCode`, derived from the terminal [`UpdateResult`].
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum DownloadErrorCode {
    None,
    InsufficientMemory,
    FailedValidation,
    UnsupportedPackage,
    InvalidUri,
    AlternateDownloadError,
}

impl UpdateResult {
    pub fn error_code(self) -> DownloadErrorCode {
        match self {
            UpdateResult::Normal => DownloadErrorCode::None,
            UpdateResult::NoStorageSpace | UpdateResult::OutOfMemory => {
                DownloadErrorCode::InsufficientMemory
            }
            UpdateResult::VerifyError => DownloadErrorCode::FailedValidation,
            UpdateResult::UnsupportedPkgType => DownloadErrorCode::UnsupportedPackage,
            UpdateResult::InvalidUri => DownloadErrorCode::InvalidUri,
            UpdateResult::CommunicationError | UpdateResult::UnsupportedProtocol => {
                DownloadErrorCode::AlternateDownloadError
            }
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, UpdateResult::Normal)
    }
}

/// A runtime fault raised by the state machine while a run is in progress.
/// Every `RunFault` is funneled through the ERROR state and recorded as an
/// [`UpdateResult`].
#[derive(thiserror::Error, Debug, Clone)]
#[error("{result}: {detail}")]
pub struct RunFault {
    pub result: UpdateResult,
    pub detail: String,
}

impl RunFault {
    pub fn new(result: UpdateResult, detail: impl Into<String>) -> Self {
        Self {
            result,
            detail: detail.into(),
        }
    }
}

/// Everything [`Downloader::run`] or [`Downloader::receive_data`] can
/// return: either a pre-flight programmer error (the machine never even
/// starts), or the terminal [`UpdateResult`] of a completed run.
#[derive(thiserror::Error, Debug)]
pub enum DownloadError {
    #[error("invalid download descriptor: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Run(#[from] RunFault),
}

impl From<crate::dwl::DwlError> for RunFault {
    fn from(err: crate::dwl::DwlError) -> Self {
        use crate::dwl::DwlError::*;
        match err {
            UnsupportedPackage(detail) => RunFault::new(UpdateResult::UnsupportedPkgType, detail),
            VerifyError(detail) => RunFault::new(UpdateResult::VerifyError, detail),
            LengthMismatch { expected, actual } => RunFault::new(
                UpdateResult::CommunicationError,
                format!("parser requested {expected} bytes but received {actual}"),
            ),
        }
    }
}

impl From<crate::stream_buffer::StreamBufferOverflow> for RunFault {
    fn from(err: crate::stream_buffer::StreamBufferOverflow) -> Self {
        RunFault::new(UpdateResult::CommunicationError, err.to_string())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_code_mapping_matches_table() {
        assert_eq!(UpdateResult::Normal.error_code(), DownloadErrorCode::None);
        assert_eq!(
            UpdateResult::NoStorageSpace.error_code(),
            DownloadErrorCode::InsufficientMemory
        );
        assert_eq!(
            UpdateResult::OutOfMemory.error_code(),
            DownloadErrorCode::InsufficientMemory
        );
        assert_eq!(
            UpdateResult::VerifyError.error_code(),
            DownloadErrorCode::FailedValidation
        );
        assert_eq!(
            UpdateResult::UnsupportedPkgType.error_code(),
            DownloadErrorCode::UnsupportedPackage
        );
        assert_eq!(UpdateResult::InvalidUri.error_code(), DownloadErrorCode::InvalidUri);
        assert_eq!(
            UpdateResult::CommunicationError.error_code(),
            DownloadErrorCode::AlternateDownloadError
        );
        assert_eq!(
            UpdateResult::UnsupportedProtocol.error_code(),
            DownloadErrorCode::AlternateDownloadError
        );
    }
}
