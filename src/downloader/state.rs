use tracing::{debug, error, warn};

use crate::crypto::Sha1Backend;
use crate::downloader::descriptor::{Callbacks, ConfigError, PackageDescriptor, UpdateKind};
use crate::downloader::events::{DownloadEvent, EventSink, FirmwareState, SoftwareState};
use crate::downloader::{DownloadError, RunFault, UpdateResult};
use crate::dwl::{DwlParser, ParseStep};
use crate::stream_buffer::{FillOutcome, StreamBuffer};

/// Coarse phase of a run. `Store` is entered and left within a single
/// [`Downloader::receive_data`] call — this crate has no internal
/// concurrency to make it durably observable — but is still modeled
/// explicitly so transitions show up in logs and in [`Downloader::state`].
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum DownloaderState {
    Init,
    Info,
    Download,
    Parse,
    Store,
    Error,
    End,
}

enum PumpOutcome {
    NeedMore,
    Progressed,
    Done,
}

/// The Downloader State Machine. Owned by the host for the lifetime of one
/// package run; construct with [`Downloader::new`], call [`Downloader::run`]
/// once, then feed bytes to [`Downloader::receive_data`] as they arrive.
pub struct Downloader<Ctx, C: Callbacks<Ctx>, S: EventSink, B: Sha1Backend> {
    state: DownloaderState,
    descriptor: PackageDescriptor,
    callbacks: C,
    sink: S,
    parser: DwlParser<B>,
    stream_buffer: StreamBuffer,
    offset: u64,
    storage_offset: u64,
    package_size: u64,
    last_update_result: UpdateResult,
    last_progress_percent: Option<u8>,
    _ctx: std::marker::PhantomData<fn(&mut Ctx)>,
}

impl<Ctx, C: Callbacks<Ctx>, S: EventSink, B: Sha1Backend> Downloader<Ctx, C, S, B> {
    pub fn new(descriptor: PackageDescriptor, callbacks: C, sink: S, sha1_backend: B) -> Self {
        Self {
            state: DownloaderState::Init,
            descriptor,
            callbacks,
            sink,
            parser: DwlParser::new(sha1_backend),
            stream_buffer: StreamBuffer::new(),
            offset: 0,
            storage_offset: 0,
            package_size: 0,
            last_update_result: UpdateResult::Normal,
            last_progress_percent: None,
            _ctx: std::marker::PhantomData,
        }
    }

    pub fn state(&self) -> DownloaderState {
        self.state
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn storage_offset(&self) -> u64 {
        self.storage_offset
    }

    pub fn last_update_result(&self) -> UpdateResult {
        self.last_update_result
    }

    /// Resets all per-run workspace (parser state, staging buffer, offsets,
    /// progress) ahead of a new run, without discarding the callbacks or
    /// event sink.
    pub fn init(&mut self) {
        self.state = DownloaderState::Init;
        self.parser.reset();
        self.stream_buffer.clear();
        self.offset = 0;
        self.storage_offset = 0;
        self.package_size = 0;
        self.last_progress_percent = None;
        self.last_update_result = UpdateResult::Normal;
    }

    /// Drives INIT → INFO → DOWNLOAD and kicks off `start_download`. Bytes
    /// are then fed in through [`Self::receive_data`] as the host's fetch
    /// produces them; this call does not block waiting for any — the core
    /// never performs I/O, so waiting for the package to finish is
    /// externalized entirely into the host's own schedule of calling
    /// `receive_data` after `start_download` returns.
    pub fn run(&mut self, ctx: &mut Ctx) -> Result<(), DownloadError> {
        self.callbacks.validate()?;
        if self.descriptor.uri.is_empty() {
            return Err(DownloadError::Config(ConfigError::EmptyUri));
        }
        self.init();

        self.state = DownloaderState::Init;
        debug!(uri = %self.descriptor.uri, "starting download run");
        if let Err(result) = self.callbacks.init_download(ctx, &self.descriptor.uri) {
            return self.fail_preflight(ctx, RunFault::new(result, "init_download failed"));
        }
        self.set_update_result(ctx, UpdateResult::Normal);

        self.state = DownloaderState::Info;
        let info = match self.callbacks.get_info(ctx) {
            Ok(info) => info,
            Err(result) => return self.fail_preflight(ctx, RunFault::new(result, "get_info failed")),
        };
        self.package_size = info.size;
        self.offset = self.descriptor.start_offset();
        self.storage_offset = self.offset;
        self.sink.emit(DownloadEvent::Details { size: info.size });

        self.state = DownloaderState::Download;
        self.set_state(ctx, FirmwareState::Downloading, SoftwareState::Downloading);
        self.sink.emit(DownloadEvent::DownloadStart);
        let start_offset = self.descriptor.start_offset();
        if let Err(result) = self.callbacks.start_download(ctx, start_offset) {
            return self.fail_preflight(ctx, RunFault::new(result, "start_download failed"));
        }

        self.state = DownloaderState::Parse;
        Ok(())
    }

    /// Consumes all of `input` before returning, advancing PARSE/STORE
    /// transitions internally. Must not be called concurrently with itself
    /// or with [`Self::run`] — this crate has no internal locking.
    pub fn receive_data(&mut self, ctx: &mut Ctx, mut input: &[u8]) -> Result<(), DownloadError> {
        if self.state == DownloaderState::End {
            warn!(bytes = input.len(), "receive_data called after END; ignoring");
            return Ok(());
        }
        self.state = DownloaderState::Parse;
        loop {
            if input.is_empty() {
                break;
            }
            match self.pump_once(ctx, &mut input) {
                Ok(PumpOutcome::NeedMore) | Ok(PumpOutcome::Done) => break,
                Ok(PumpOutcome::Progressed) => continue,
                Err(fault) => {
                    self.enter_error(ctx, fault.clone());
                    return Err(DownloadError::Run(fault));
                }
            }
        }
        Ok(())
    }

    fn pump_once(&mut self, ctx: &mut Ctx, input: &mut &[u8]) -> Result<PumpOutcome, RunFault> {
        let request = self.parser.request();
        let fill = self.stream_buffer.fill(input, request.len, request.binary)?;
        let bytes = match fill {
            FillOutcome::NeedMore => return Ok(PumpOutcome::NeedMore),
            FillOutcome::Ready(bytes) => bytes,
        };
        let consumed_len = bytes.len() as u64;
        let step = self.parser.advance(bytes)?;

        match step {
            ParseStep::Continue => {
                if !request.binary {
                    self.stream_buffer.consumed();
                }
                self.offset += consumed_len;
                self.report_progress();
                Ok(PumpOutcome::Progressed)
            }
            ParseStep::Store => {
                self.state = DownloaderState::Store;
                self.callbacks
                    .store_range(ctx, bytes)
                    .map_err(|r| RunFault::new(r, "store_range failed"))?;
                self.storage_offset += consumed_len;
                self.offset += consumed_len;
                self.state = DownloaderState::Parse;
                self.report_progress();
                Ok(PumpOutcome::Progressed)
            }
            ParseStep::Done => {
                self.offset += consumed_len;
                self.report_progress();
                self.finish_success(ctx);
                Ok(PumpOutcome::Done)
            }
        }
    }

    fn report_progress(&mut self) {
        if self.package_size == 0 || self.offset > self.package_size {
            if self.offset > self.package_size {
                warn!(
                    offset = self.offset,
                    package_size = self.package_size,
                    "offset exceeds package size; suppressing progress event"
                );
            }
            return;
        }
        let percent = ((self.offset * 100) / self.package_size) as u8;
        if self.last_progress_percent != Some(percent) {
            self.last_progress_percent = Some(percent);
            self.sink.emit(DownloadEvent::DownloadProgress { percent });
        }
    }

    fn finish_success(&mut self, ctx: &mut Ctx) {
        self.sink.emit(DownloadEvent::SignatureOk);
        self.set_state(ctx, FirmwareState::Downloaded, SoftwareState::Downloaded);
        self.complete(ctx, UpdateResult::Normal);
    }

    fn fail_preflight(&mut self, ctx: &mut Ctx, fault: RunFault) -> Result<(), DownloadError> {
        self.enter_error(ctx, fault.clone());
        Err(DownloadError::Run(fault))
    }

    fn enter_error(&mut self, ctx: &mut Ctx, fault: RunFault) {
        self.state = DownloaderState::Error;
        error!(result = ?fault.result, detail = %fault.detail, "download failed");
        if fault.result == UpdateResult::VerifyError {
            self.sink.emit(DownloadEvent::SignatureKo);
        }
        self.complete(ctx, fault.result);
    }

    /// The ERROR/success shared funnel into END: record the result, emit
    /// `download-end`, always call `end_download` exactly once, then tear
    /// the run down.
    fn complete(&mut self, ctx: &mut Ctx, result: UpdateResult) {
        self.last_update_result = result;
        self.set_update_result(ctx, result);
        self.sink.emit(DownloadEvent::DownloadEnd {
            result,
            error_code: result.error_code(),
        });
        if let Err(end_result) = self.callbacks.end_download(ctx) {
            warn!(?end_result, "end_download callback reported a fault during teardown");
        }
        self.state = DownloaderState::End;
        self.parser.reset();
        self.stream_buffer.clear();
    }

    fn set_state(&mut self, ctx: &mut Ctx, fw: FirmwareState, sw: SoftwareState) {
        match self.descriptor.update_kind {
            UpdateKind::Firmware => self.callbacks.set_fw_state(ctx, fw),
            UpdateKind::Software => self.callbacks.set_sw_state(ctx, sw),
        }
    }

    fn set_update_result(&mut self, ctx: &mut Ctx, result: UpdateResult) {
        match self.descriptor.update_kind {
            UpdateKind::Firmware => self.callbacks.set_fw_result(ctx, result),
            UpdateKind::Software => self.callbacks.set_sw_result(ctx, result),
        }
    }
}
