use crate::downloader::{DownloadErrorCode, UpdateResult};

/// `set_fw_state`/`set_sw_state` values reported to the host through
/// [`crate::downloader::Callbacks`].
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum FirmwareState {
    Idle,
    Downloading,
    Downloaded,
    Updating,
}

#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum SoftwareState {
    Idle,
    Downloading,
    Downloaded,
    Updating,
}

/// The full event taxonomy a host can observe through an [`EventSink`].
/// Only the first six variants are ever produced by this crate;
/// `UpdateStart`/`UpdateSuccess`/
/// `UpdateFailure` are lifecycle hooks callers of the same
/// [`EventSink`] may also drive from outside a download run (e.g. once
/// the host actually applies a downloaded firmware image).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DownloadEvent {
    /// Emitted once `get_info` succeeds, carrying the package size.
    Details { size: u64 },
    DownloadStart,
    /// Emitted whenever the integer completion percentage changes.
    DownloadProgress { percent: u8 },
    DownloadEnd {
        result: UpdateResult,
        error_code: DownloadErrorCode,
    },
    SignatureOk,
    SignatureKo,
    UpdateStart,
    UpdateSuccess,
    UpdateFailure,
}

/// Host-registered sink for [`DownloadEvent`]s.
pub trait EventSink {
    fn emit(&mut self, event: DownloadEvent);
}

impl<F: FnMut(DownloadEvent)> EventSink for F {
    fn emit(&mut self, event: DownloadEvent) {
        self(event)
    }
}
