use tracing::{debug, trace, warn};

use crate::crypto::{crc32, Sha1Backend};
use crate::dwl::prolog::{Prolog, UpckHeader, PROLOG_LEN, UPCK_HEADER_LEN};
use crate::dwl::tag::{SectionTag, UpckType};
use crate::dwl::DwlError;

/// A span within a DWL section.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum Subsection {
    Prolog,
    Comments,
    Header,
    Binary,
    Padding,
    Signature,
}

/// What the parser needs next: how many bytes, and whether the
/// [`crate::stream_buffer::StreamBuffer`] should stream them through
/// uncopied (`binary`) or buffer them into a contiguous unit first.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub struct ParseRequest {
    pub subsection: Subsection,
    pub len: usize,
    pub binary: bool,
}

/// What a completed [`DwlParser::advance`] call means for the bytes it was
/// just given.
#[derive(Eq, PartialEq, Copy, Clone, Debug)]
pub enum ParseStep {
    /// Subsection consumed; call [`DwlParser::request`] for what comes next.
    Continue,
    /// The bytes just consumed are verified BINA payload; the host's
    /// storage sink should receive them, in order, unmodified.
    Store,
    /// The SIGN section verified; the run is complete.
    Done,
}

/// The DP sub-state-machine: advances through the DWL grammar, maintaining
/// running CRC-32 and SHA-1 state, generic over the SHA-1 backend `B` the
/// host supplies.
pub struct DwlParser<B: Sha1Backend> {
    backend: B,
    subsection: Subsection,
    len_to_parse: usize,
    /// Section currently being read (set once its prolog is parsed).
    current_tag: Option<SectionTag>,
    /// Section the next prolog must declare.
    expected_tag: SectionTag,
    /// `upckType` read from the UPCK header, retained so it can be handed
    /// to [`Sha1Backend::finish`] once the SIGN section is reached.
    pkg_type: Option<UpckType>,
    comment_size: u32,
    binary_size: u32,
    padding_size: u32,
    remaining_binary_bytes: u32,
    signature_size: u32,
    package_crc: Option<u32>,
    running_crc: u32,
    sha1_ctx: Option<B::Context>,
}

impl<B: Sha1Backend> DwlParser<B> {
    pub fn new(backend: B) -> Self {
        let sha1_ctx = backend.start();
        Self {
            backend,
            subsection: Subsection::Prolog,
            len_to_parse: PROLOG_LEN,
            current_tag: None,
            expected_tag: SectionTag::Upck,
            pkg_type: None,
            comment_size: 0,
            binary_size: 0,
            padding_size: 0,
            remaining_binary_bytes: 0,
            signature_size: 0,
            package_crc: None,
            running_crc: 0,
            sha1_ctx: Some(sha1_ctx),
        }
    }

    /// Re-zeroes all parser state and starts a fresh SHA-1 context,
    /// canceling any context left over from a prior run.
    pub fn reset(&mut self) {
        if let Some(ctx) = self.sha1_ctx.take() {
            self.backend.cancel(ctx);
        }
        let sha1_ctx = self.backend.start();
        self.subsection = Subsection::Prolog;
        self.len_to_parse = PROLOG_LEN;
        self.current_tag = None;
        self.expected_tag = SectionTag::Upck;
        self.pkg_type = None;
        self.comment_size = 0;
        self.binary_size = 0;
        self.padding_size = 0;
        self.remaining_binary_bytes = 0;
        self.signature_size = 0;
        self.package_crc = None;
        self.running_crc = 0;
        self.sha1_ctx = Some(sha1_ctx);
    }

    /// What the parser needs next.
    pub fn request(&self) -> ParseRequest {
        ParseRequest {
            subsection: self.subsection,
            len: self.len_to_parse,
            binary: self.subsection == Subsection::Binary,
        }
    }

    pub fn running_crc(&self) -> u32 {
        self.running_crc
    }

    /// Feeds `bytes` to the subsection currently requested. For every
    /// subsection but [`Subsection::Binary`], `bytes.len()` must equal
    /// [`ParseRequest::len`](ParseRequest::len) exactly; for `Binary` it
    /// must be in `1..=remaining binary bytes`.
    pub fn advance(&mut self, bytes: &[u8]) -> Result<ParseStep, DwlError> {
        if self.subsection == Subsection::Binary {
            if bytes.is_empty() || bytes.len() > self.remaining_binary_bytes as usize {
                return Err(DwlError::LengthMismatch {
                    expected: self.remaining_binary_bytes as usize,
                    actual: bytes.len(),
                });
            }
        } else if bytes.len() != self.len_to_parse {
            return Err(DwlError::LengthMismatch {
                expected: self.len_to_parse,
                actual: bytes.len(),
            });
        }

        match self.subsection {
            Subsection::Prolog => self.advance_prolog(bytes),
            Subsection::Comments => self.advance_comments(bytes),
            Subsection::Header => self.advance_header(bytes),
            Subsection::Binary => self.advance_binary(bytes),
            Subsection::Padding => self.advance_padding(bytes),
            Subsection::Signature => self.advance_signature(bytes),
        }
    }

    fn hashable(&self) -> bool {
        self.current_tag != Some(SectionTag::Sign)
    }

    fn hash(&mut self, bytes: &[u8]) {
        if self.hashable() {
            self.running_crc = crc32(self.running_crc, bytes);
            if let Some(ctx) = self.sha1_ctx.as_mut() {
                self.backend.update(ctx, bytes);
            }
        }
    }

    fn advance_prolog(&mut self, bytes: &[u8]) -> Result<ParseStep, DwlError> {
        let prolog = Prolog::parse(bytes)?;
        if !prolog.data_type.is_accepted() {
            return Err(DwlError::UnsupportedPackage(format!(
                "unsupported section tag {:#x}",
                prolog.data_type
            )));
        }
        if prolog.data_type != self.expected_tag {
            return Err(DwlError::UnsupportedPackage(format!(
                "expected section {:?}, got {:?}",
                self.expected_tag, prolog.data_type
            )));
        }
        self.current_tag = Some(prolog.data_type);

        match prolog.data_type {
            SectionTag::Upck => {
                // CRC coverage begins at byte 12 (the fileSize field) of the
                // first UPCK prolog; SHA-1 covers the whole prolog.
                self.running_crc = crc32(self.running_crc, &bytes[12..]);
                if let Some(ctx) = self.sha1_ctx.as_mut() {
                    self.backend.update(ctx, bytes);
                }
                self.package_crc = Some(prolog.crc32);
            }
            SectionTag::Bina => {
                self.hash(bytes);
                let comment_size = prolog.comment_size_bytes();
                let file_size = prolog.file_size;
                if file_size < comment_size + UPCK_HEADER_LEN as u32 + PROLOG_LEN as u32 {
                    return Err(DwlError::UnsupportedPackage(format!(
                        "BINA fileSize {file_size} too small for comment/header overhead"
                    )));
                }
                self.binary_size = file_size - comment_size - UPCK_HEADER_LEN as u32 - PROLOG_LEN as u32;
                self.padding_size = ((file_size + 7) & !7) - file_size;
            }
            SectionTag::Sign => {
                let comment_size = prolog.comment_size_bytes();
                let file_size = prolog.file_size;
                if file_size < comment_size + PROLOG_LEN as u32 {
                    return Err(DwlError::UnsupportedPackage(format!(
                        "SIGN fileSize {file_size} too small for comment overhead"
                    )));
                }
                self.signature_size = file_size - comment_size - PROLOG_LEN as u32;
            }
            SectionTag::Other(_) => unreachable!("rejected above"),
        }

        self.comment_size = prolog.comment_size_bytes();
        self.subsection = Subsection::Comments;
        self.len_to_parse = self.comment_size as usize;
        trace!(data_type = ?prolog.data_type, comment_size = self.comment_size, "parsed DWL prolog");
        Ok(ParseStep::Continue)
    }

    fn advance_comments(&mut self, bytes: &[u8]) -> Result<ParseStep, DwlError> {
        self.hash(bytes);
        match self.current_tag {
            Some(SectionTag::Sign) => {
                self.subsection = Subsection::Signature;
                self.len_to_parse = self.signature_size as usize;
            }
            _ => {
                self.subsection = Subsection::Header;
                self.len_to_parse = UPCK_HEADER_LEN;
            }
        }
        Ok(ParseStep::Continue)
    }

    fn advance_header(&mut self, bytes: &[u8]) -> Result<ParseStep, DwlError> {
        self.hash(bytes);
        match self.current_tag {
            Some(SectionTag::Upck) => {
                let header = UpckHeader::parse(bytes)?;
                trace!(upck_type = ?header.upck_type, header = %hex::encode(bytes), "parsed UPCK header");
                if !header.upck_type.is_valid() {
                    return Err(DwlError::UnsupportedPackage(format!(
                        "unsupported upckType {:?}",
                        header.upck_type
                    )));
                }
                self.pkg_type = Some(header.upck_type);
                self.expected_tag = SectionTag::Bina;
                self.subsection = Subsection::Prolog;
                self.len_to_parse = PROLOG_LEN;
            }
            Some(SectionTag::Bina) => {
                self.remaining_binary_bytes = self.binary_size;
                self.subsection = Subsection::Binary;
                self.len_to_parse = self.binary_size as usize;
                if self.binary_size == 0 {
                    self.subsection = Subsection::Padding;
                    self.len_to_parse = self.padding_size as usize;
                }
            }
            other => {
                return Err(DwlError::UnsupportedPackage(format!(
                    "unexpected header subsection in section {other:?}"
                )))
            }
        }
        Ok(ParseStep::Continue)
    }

    fn advance_binary(&mut self, bytes: &[u8]) -> Result<ParseStep, DwlError> {
        self.hash(bytes);
        self.remaining_binary_bytes -= bytes.len() as u32;
        if self.remaining_binary_bytes == 0 {
            self.subsection = Subsection::Padding;
            self.len_to_parse = self.padding_size as usize;
        } else {
            self.subsection = Subsection::Binary;
            self.len_to_parse = self.remaining_binary_bytes as usize;
        }
        Ok(ParseStep::Store)
    }

    fn advance_padding(&mut self, bytes: &[u8]) -> Result<ParseStep, DwlError> {
        self.hash(bytes);
        self.expected_tag = SectionTag::Sign;
        self.subsection = Subsection::Prolog;
        self.len_to_parse = PROLOG_LEN;
        Ok(ParseStep::Continue)
    }

    fn advance_signature(&mut self, signature: &[u8]) -> Result<ParseStep, DwlError> {
        trace!(signature = %hex::encode(signature), "received DWL signature bytes");
        if self.running_crc != self.package_crc.unwrap_or(0) {
            warn!(
                running = self.running_crc,
                expected = ?self.package_crc,
                "DWL CRC mismatch"
            );
            if let Some(ctx) = self.sha1_ctx.take() {
                self.backend.cancel(ctx);
            }
            return Err(DwlError::VerifyError("CRC-32 mismatch".into()));
        }
        let ctx = self
            .sha1_ctx
            .take()
            .expect("signature subsection reached with no active SHA-1 context");
        let pkg_type = self
            .pkg_type
            .expect("signature subsection reached with no UPCK header parsed");
        self.backend
            .finish(ctx, pkg_type, signature)
            .map_err(|e| DwlError::VerifyError(e.to_string()))?;
        debug!("DWL signature verified");
        Ok(ParseStep::Done)
    }
}
