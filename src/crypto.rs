//! Hash backends the DWL parser relies on.
//!
//! CRC-32 is modeled as a pure step function, `(acc, bytes) -> acc`,
//! because the accumulator is plain data with no backend-specific state.
//! SHA-1 needs a stateful context, and the verification step itself is
//! host-defined — raw digest compare, RSA-over-SHA1, ECDSA-over-SHA1, ...
//! — so it is a three-phase capability trait instead.

use crate::dwl::UpckType;

/// Feeds `bytes` into the running CRC-32 accumulator `acc` and returns the
/// updated accumulator. `crc32(0, &[])` is the identity accumulator.
pub fn crc32(acc: u32, bytes: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(acc);
    hasher.update(bytes);
    hasher.finalize()
}

/// Host-supplied SHA-1 capability. The core never assumes this shares an
/// implementation with [`crc32`]; a host may route this through hardware.
pub trait Sha1Backend {
    type Context;
    type Error: std::error::Error + Send + Sync + 'static;

    fn start(&self) -> Self::Context;
    fn update(&self, ctx: &mut Self::Context, bytes: &[u8]);
    /// Finalizes the context and verifies `signature` against it, given the
    /// `upckType` of the package being verified. The verification strategy
    /// (raw digest compare, RSA/ECDSA-over-SHA1, a different scheme per
    /// package type, ...) is entirely up to the backend; the core only
    /// supplies the bytes and the type they came from.
    fn finish(&self, ctx: Self::Context, pkg_type: UpckType, signature: &[u8]) -> Result<(), Self::Error>;
    /// Called when a run aborts before reaching the signature subsection,
    /// so the backend can release any resources tied to `ctx`.
    fn cancel(&self, ctx: Self::Context);
}

/// A pure-Rust default backend (feature `default-sha1`) that verifies the
/// signature as a raw 20-byte SHA-1 digest compare. See DESIGN.md for why
/// this is the baseline rather than an RSA/ECDSA scheme.
#[cfg(feature = "default-sha1")]
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSha1;

#[cfg(feature = "default-sha1")]
#[derive(thiserror::Error, Debug, Eq, PartialEq)]
pub enum DefaultSha1Error {
    #[error("signature length {actual} does not match SHA-1 digest length {expected}")]
    BadSignatureLength { expected: usize, actual: usize },
    #[error("SHA-1 digest mismatch")]
    Mismatch,
}

#[cfg(feature = "default-sha1")]
impl Sha1Backend for DefaultSha1 {
    type Context = sha1::Sha1;
    type Error = DefaultSha1Error;

    fn start(&self) -> Self::Context {
        use sha1::Digest;
        sha1::Sha1::new()
    }

    fn update(&self, ctx: &mut Self::Context, bytes: &[u8]) {
        use sha1::Digest;
        ctx.update(bytes);
    }

    fn finish(&self, ctx: Self::Context, _pkg_type: UpckType, signature: &[u8]) -> Result<(), Self::Error> {
        use sha1::Digest;
        let digest = ctx.finalize();
        if signature.len() != digest.len() {
            return Err(DefaultSha1Error::BadSignatureLength {
                expected: digest.len(),
                actual: signature.len(),
            });
        }
        if signature == digest.as_slice() {
            Ok(())
        } else {
            Err(DefaultSha1Error::Mismatch)
        }
    }

    fn cancel(&self, _ctx: Self::Context) {}
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn crc32_is_incremental() {
        let whole = crc32(0, b"hello world");
        let mut acc = crc32(0, b"hello ");
        acc = crc32(acc, b"world");
        assert_eq!(whole, acc);
    }

    #[test]
    fn crc32_of_empty_is_identity() {
        assert_eq!(crc32(0, &[]), 0);
    }

    #[cfg(feature = "default-sha1")]
    #[test]
    fn default_sha1_verifies_matching_digest() {
        use sha1::Digest;
        let backend = DefaultSha1;
        let mut ctx = backend.start();
        backend.update(&mut ctx, b"hello world");
        let mut expected = sha1::Sha1::new();
        expected.update(b"hello world");
        let digest = expected.finalize();
        assert!(backend.finish(ctx, UpckType::Firmware, &digest).is_ok());
    }

    #[cfg(feature = "default-sha1")]
    #[test]
    fn default_sha1_rejects_mismatched_digest() {
        let backend = DefaultSha1;
        let mut ctx = backend.start();
        backend.update(&mut ctx, b"hello world");
        let bad_sig = [0u8; 20];
        assert_eq!(
            backend.finish(ctx, UpckType::Firmware, &bad_sig),
            Err(DefaultSha1Error::Mismatch)
        );
    }

    #[cfg(feature = "default-sha1")]
    #[test]
    fn default_sha1_rejects_wrong_length_signature() {
        let backend = DefaultSha1;
        let ctx = backend.start();
        let bad_sig = [0u8; 4];
        assert_eq!(
            backend.finish(ctx, UpckType::Amss, &bad_sig),
            Err(DefaultSha1Error::BadSignatureLength {
                expected: 20,
                actual: 4
            })
        );
    }
}
