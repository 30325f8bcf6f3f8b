use strum_macros::{Display, EnumCount};

/// Constant 32-bit magic at the start of every DWL prolog, ASCII "DWLF" read little-endian.
pub const DWL_MAGIC: u32 = 0x464C_5744;

/// The `dataType` field of a DWL prolog identifies which section follows.
///
/// Only [`SectionTag::Upck`], [`SectionTag::Bina`] and [`SectionTag::Sign`]
/// are accepted by the parser; every other value (including the additional
/// tags the format reserves — COMP/XDWL/E2PR/DIFF/DOTA/RAM_/BOOT) is
/// represented here so it can be named in error messages, but parsing
/// always rejects it with `unsupported-package`.
#[repr(u32)]
#[derive(Eq, PartialEq, Copy, Clone, Debug, Display, EnumCount)]
pub enum SectionTag {
    /// Update PaCKage metadata — must be the first section of a run.
    Upck,
    /// BINAry payload.
    Bina,
    /// SIGNature, the final section of a run.
    Sign,
    /// Any other `dataType` value observed on the wire.
    Other(u32),
}

impl SectionTag {
    pub const fn is_accepted(self) -> bool {
        matches!(self, Self::Upck | Self::Bina | Self::Sign)
    }
}

impl From<u32> for SectionTag {
    fn from(value: u32) -> Self {
        match value {
            x if x == Self::Upck.into() => Self::Upck,
            x if x == Self::Bina.into() => Self::Bina,
            x if x == Self::Sign.into() => Self::Sign,
            x => Self::Other(x),
        }
    }
}

impl From<SectionTag> for u32 {
    fn from(tag: SectionTag) -> Self {
        match tag {
            SectionTag::Upck => 0x4B43_5055,
            SectionTag::Bina => 0x414E_4942,
            SectionTag::Sign => 0x4E47_4953,
            SectionTag::Other(x) => x,
        }
    }
}

impl From<&SectionTag> for u32 {
    fn from(tag: &SectionTag) -> Self {
        u32::from(*tag)
    }
}

impl std::fmt::LowerHex for SectionTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let val: u32 = self.into();
        std::fmt::LowerHex::fmt(&val, f)
    }
}

/// The `upckType` field of a UPCK header. Only [`UpckType::Firmware`] and
/// [`UpckType::Amss`] are valid; any other value must be rejected.
#[repr(u32)]
#[derive(Eq, PartialEq, Copy, Clone, Debug, Display, EnumCount)]
pub enum UpckType {
    Firmware,
    Amss,
    Other(u32),
}

impl UpckType {
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Firmware | Self::Amss)
    }
}

impl From<u32> for UpckType {
    fn from(value: u32) -> Self {
        match value {
            1 => Self::Firmware,
            3 => Self::Amss,
            x => Self::Other(x),
        }
    }
}

impl From<UpckType> for u32 {
    fn from(kind: UpckType) -> Self {
        match kind {
            UpckType::Firmware => 1,
            UpckType::Amss => 3,
            UpckType::Other(x) => x,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;
    use strum::EnumCount;

    #[test]
    fn section_tag_roundtrip() {
        let mut seen = HashSet::new();
        for v in [
            0x4B43_5055u32,
            0x414E_4942,
            0x4E47_4953,
            0,
            1,
            0xFFFF_FFFF,
        ] {
            let tag = SectionTag::from(v);
            seen.insert(std::mem::discriminant(&tag));
            assert_eq!(u32::from(tag), v);
        }
        assert!(seen.len() <= SectionTag::COUNT);
    }

    #[test]
    fn section_tag_acceptance() {
        assert!(SectionTag::Upck.is_accepted());
        assert!(SectionTag::Bina.is_accepted());
        assert!(SectionTag::Sign.is_accepted());
        assert!(!SectionTag::Other(0x434F_4D50).is_accepted());
    }

    #[test]
    fn upck_type_validity() {
        assert!(UpckType::from(1).is_valid());
        assert!(UpckType::from(3).is_valid());
        assert!(!UpckType::from(2).is_valid());
        assert_eq!(UpckType::from(2), UpckType::Other(2));
    }
}
