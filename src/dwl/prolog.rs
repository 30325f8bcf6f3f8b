use byteorder::{ByteOrder, LittleEndian as LE};

use crate::dwl::tag::{SectionTag, UpckType, DWL_MAGIC};

pub(crate) const PROLOG_LEN: usize = 32;
pub(crate) const UPCK_HEADER_LEN: usize = 128;

/// The fixed 32-byte little-endian header present at the start of every
/// DWL section.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Prolog {
    pub magic: u32,
    /// Accepted unchecked — the format defines no valid/invalid values.
    pub status_bitfield: u32,
    /// CRC-32 reference, meaningful only when this is the first UPCK prolog.
    pub crc32: u32,
    /// Size of the section excluding padding.
    pub file_size: u32,
    /// Opaque BCD-encoded timestamp.
    pub timestamp: [u8; 8],
    pub data_type: SectionTag,
    pub type_version: u16,
    raw_comment_size: u16,
}

impl Prolog {
    /// `commentSize` is stored on the wire in 8-byte units.
    pub fn comment_size_bytes(&self) -> u32 {
        u32::from(self.raw_comment_size) * 8
    }

    pub(crate) fn parse(buf: &[u8]) -> Result<Self, PrologError> {
        if buf.len() < PROLOG_LEN {
            return Err(PrologError::TooShort(buf.len()));
        }
        let magic = LE::read_u32(&buf[0..4]);
        if magic != DWL_MAGIC {
            return Err(PrologError::BadMagic(magic));
        }
        let mut timestamp = [0u8; 8];
        timestamp.copy_from_slice(&buf[16..24]);
        Ok(Self {
            magic,
            status_bitfield: LE::read_u32(&buf[4..8]),
            crc32: LE::read_u32(&buf[8..12]),
            file_size: LE::read_u32(&buf[12..16]),
            timestamp,
            data_type: SectionTag::from(LE::read_u32(&buf[24..28])),
            type_version: LE::read_u16(&buf[28..30]),
            raw_comment_size: LE::read_u16(&buf[30..32]),
        })
    }
}

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum PrologError {
    #[error("prolog buffer too short ({0} bytes, need {PROLOG_LEN})")]
    TooShort(usize),
    #[error("bad DWL magic {0:#010x}, expected {DWL_MAGIC:#010x}")]
    BadMagic(u32),
}

/// The 128-byte UPCK section header. Only the first 16 bytes carry known
/// fields; the remainder of the header is reserved and ignored.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct UpckHeader {
    pub upck_type: UpckType,
    pub src_cks: u32,
    pub dst_cks: u32,
    pub dst_base_address: u32,
}

impl UpckHeader {
    pub(crate) fn parse(buf: &[u8]) -> Result<Self, PrologError> {
        if buf.len() < UPCK_HEADER_LEN {
            return Err(PrologError::TooShort(buf.len()));
        }
        Ok(Self {
            upck_type: UpckType::from(LE::read_u32(&buf[0..4])),
            src_cks: LE::read_u32(&buf[4..8]),
            dst_cks: LE::read_u32(&buf[8..12]),
            dst_base_address: LE::read_u32(&buf[12..16]),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_prolog_bytes(data_type: u32, file_size: u32, comment_units: u16) -> Vec<u8> {
        let mut buf = vec![0u8; PROLOG_LEN];
        LE::write_u32(&mut buf[0..4], DWL_MAGIC);
        LE::write_u32(&mut buf[4..8], 0);
        LE::write_u32(&mut buf[8..12], 0xDEAD_BEEF);
        LE::write_u32(&mut buf[12..16], file_size);
        LE::write_u32(&mut buf[24..28], data_type);
        LE::write_u16(&mut buf[28..30], 1);
        LE::write_u16(&mut buf[30..32], comment_units);
        buf
    }

    #[test]
    fn parses_upck_prolog() {
        let bytes = sample_prolog_bytes(0x4B43_5055, 160, 0);
        let prolog = Prolog::parse(&bytes).unwrap();
        assert_eq!(prolog.data_type, SectionTag::Upck);
        assert_eq!(prolog.crc32, 0xDEAD_BEEF);
        assert_eq!(prolog.comment_size_bytes(), 0);
    }

    #[test]
    fn comment_size_is_in_8_byte_units() {
        let bytes = sample_prolog_bytes(0x414E_4942, 168, 3);
        let prolog = Prolog::parse(&bytes).unwrap();
        assert_eq!(prolog.comment_size_bytes(), 24);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = sample_prolog_bytes(0x4B43_5055, 160, 0);
        bytes[0] = 0;
        assert_eq!(Prolog::parse(&bytes), Err(PrologError::BadMagic(0x464C_5700)));
    }

    #[test]
    fn rejects_truncated_buffer() {
        let bytes = vec![0u8; 10];
        assert_eq!(Prolog::parse(&bytes), Err(PrologError::TooShort(10)));
    }

    #[test]
    fn parses_upck_header_type() {
        let mut buf = vec![0u8; UPCK_HEADER_LEN];
        LE::write_u32(&mut buf[0..4], 1);
        let header = UpckHeader::parse(&buf).unwrap();
        assert_eq!(header.upck_type, UpckType::Firmware);
        assert!(header.upck_type.is_valid());
    }

    #[test]
    fn parses_unsupported_upck_type() {
        let mut buf = vec![0u8; UPCK_HEADER_LEN];
        LE::write_u32(&mut buf[0..4], 2);
        let header = UpckHeader::parse(&buf).unwrap();
        assert!(!header.upck_type.is_valid());
    }
}
