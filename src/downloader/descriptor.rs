use crate::downloader::{FirmwareState, SoftwareState, UpdateResult};

/// Which half of the LwM2M update object a run targets — the core behaves
/// identically either way, but calls the matching pair of
/// `set_fw_*`/`set_sw_*` callbacks.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum UpdateKind {
    Firmware,
    Software,
}

/// Package metadata supplied by the caller of [`crate::downloader::Downloader::run`].
#[derive(Clone, Debug)]
pub struct PackageDescriptor {
    pub uri: String,
    pub update_kind: UpdateKind,
    /// Resume within *this* run at a non-zero offset. Resuming a download
    /// across process restarts is out of scope for this crate; this only
    /// lets a host that already knows how far it got (e.g. a
    /// CoAP block-wise retry within the same process) skip back in.
    pub resume: bool,
    pub resume_offset: u64,
}

impl PackageDescriptor {
    pub fn new(uri: impl Into<String>, update_kind: UpdateKind) -> Self {
        Self {
            uri: uri.into(),
            update_kind,
            resume: false,
            resume_offset: 0,
        }
    }

    pub fn start_offset(&self) -> u64 {
        if self.resume {
            self.resume_offset
        } else {
            0
        }
    }
}

/// Package metadata the host returns from [`Callbacks::get_info`].
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub struct PackageInfo {
    pub size: u64,
}

/// Pre-flight validation failures: programmer errors, not runtime faults,
/// so they short-circuit before the state machine starts rather than
/// funneling through ERROR.
#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum ConfigError {
    #[error("package URI must not be empty")]
    EmptyUri,
    #[error("invalid callbacks: {0}")]
    Validation(String),
}

/// The capability bundle the host supplies to [`crate::downloader::Downloader::run`].
/// `Ctx` is the host-opaque context type threaded through every call,
/// replacing a C-style `void*`.
pub trait Callbacks<Ctx> {
    /// Pre-flight check for required callbacks. The default accepts any
    /// implementor; override to reject configurations missing optional
    /// wiring (e.g. a host built without storage support).
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Prepare the fetch. Invoked once, at INIT.
    fn init_download(&mut self, ctx: &mut Ctx, uri: &str) -> Result<(), UpdateResult>;
    /// Retrieve package metadata. May reach the server.
    fn get_info(&mut self, ctx: &mut Ctx) -> Result<PackageInfo, UpdateResult>;
    fn set_fw_state(&mut self, ctx: &mut Ctx, state: FirmwareState);
    fn set_fw_result(&mut self, ctx: &mut Ctx, result: UpdateResult);
    fn set_sw_state(&mut self, ctx: &mut Ctx, state: SoftwareState);
    fn set_sw_result(&mut self, ctx: &mut Ctx, result: UpdateResult);
    /// The host begins pumping bytes into `receive_data`. Must not block
    /// indefinitely; returns once no more bytes are immediately ready.
    fn start_download(&mut self, ctx: &mut Ctx, start_offset: u64) -> Result<(), UpdateResult>;
    /// Persist a range of verified BINA payload, in file order.
    fn store_range(&mut self, ctx: &mut Ctx, bytes: &[u8]) -> Result<(), UpdateResult>;
    /// Always invoked exactly once, regardless of outcome.
    fn end_download(&mut self, ctx: &mut Ctx) -> Result<(), UpdateResult>;
}
