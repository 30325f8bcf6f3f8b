//! The bounded reassembly buffer that sits between the host's chunked
//! input and [`crate::dwl::DwlParser`].
//!
//! Most subsections need a contiguous run of exactly `len` bytes before
//! the parser can look at them, but chunks from the host rarely line up
//! with subsection boundaries. [`StreamBuffer`] copies just enough of each
//! chunk into a small staging area to present the parser a complete unit,
//! except for the BINA binary payload, which is handed through directly
//! so multi-megabyte payloads are never copied.

use tracing::trace;

/// Staging buffer never exceeds this many bytes; exceeding it is surfaced
/// to the caller as a communication-error fault.
pub const MAX_STAGED_BYTES: usize = 16 * 1024;

#[derive(thiserror::Error, Debug, Eq, PartialEq)]
#[error("stream buffer would need {needed} bytes staged, exceeding the {MAX_STAGED_BYTES} byte cap")]
pub struct StreamBufferOverflow {
    pub needed: usize,
}

/// What [`StreamBuffer::fill`] produced for this call.
#[derive(Debug)]
pub enum FillOutcome<'a> {
    /// `len` bytes were presented contiguously, and `input` was advanced
    /// past the bytes it contributed to them.
    Ready(&'a [u8]),
    /// Not enough bytes have arrived yet; all of `input` was staged (or,
    /// for a streaming request, `input` was empty).
    NeedMore,
}

/// The SB reassembly buffer. One instance lives per downloader run.
#[derive(Default)]
pub struct StreamBuffer {
    staged: Vec<u8>,
}

impl StreamBuffer {
    pub fn new() -> Self {
        Self { staged: Vec::new() }
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    pub fn clear(&mut self) {
        self.staged.clear();
    }

    /// Advances `input` by however many bytes this call consumed and
    /// returns either a contiguous view of `len` bytes, or `NeedMore` if
    /// there weren't enough bytes available yet.
    ///
    /// `binary` mirrors [`crate::dwl::ParseRequest::binary`]: when set,
    /// this never buffers and instead returns a direct slice of
    /// `min(input.len(), len)` bytes (`len` here being the *remaining*
    /// binary bytes wanted, not a hard requirement).
    pub fn fill<'a, 'i>(
        &'a mut self,
        input: &mut &'i [u8],
        len: usize,
        binary: bool,
    ) -> Result<FillOutcome<'a>, StreamBufferOverflow>
    where
        'i: 'a,
    {
        if binary {
            let take = input.len().min(len);
            if take == 0 {
                return Ok(FillOutcome::NeedMore);
            }
            let (chunk, rest) = input.split_at(take);
            *input = rest;
            return Ok(FillOutcome::Ready(chunk));
        }

        if self.staged.is_empty() && input.len() >= len {
            let (chunk, rest) = input.split_at(len);
            *input = rest;
            return Ok(FillOutcome::Ready(chunk));
        }

        // Past this point the subsection cannot be completed from `input`
        // alone, so it must be staged — and staging ever reaches `len`
        // bytes, so a subsection bigger than the cap can never be
        // completed safely no matter how future calls chunk it.
        if len > MAX_STAGED_BYTES {
            return Err(StreamBufferOverflow { needed: len });
        }

        let needed = len - self.staged.len();
        if input.len() < needed {
            trace!(staged = self.staged.len(), incoming = input.len(), "staging partial subsection");
            self.staged.extend_from_slice(input);
            *input = &input[input.len()..];
            return Ok(FillOutcome::NeedMore);
        }

        let (chunk, rest) = input.split_at(needed);
        self.staged.extend_from_slice(chunk);
        *input = rest;
        debug_assert_eq!(self.staged.len(), len);
        Ok(FillOutcome::Ready(self.staged.as_slice()))
    }

    /// Call once the parser has consumed the bytes from a `Ready` result
    /// produced by the non-binary path, to reset staging for the next
    /// subsection.
    pub fn consumed(&mut self) {
        self.staged.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whole_chunk_available_skips_staging() {
        let mut sb = StreamBuffer::new();
        let data = [1u8, 2, 3, 4];
        let mut input = &data[..];
        match sb.fill(&mut input, 4, false).unwrap() {
            FillOutcome::Ready(bytes) => assert_eq!(bytes, &data),
            FillOutcome::NeedMore => panic!("expected Ready"),
        }
        assert_eq!(input.len(), 0);
        assert_eq!(sb.staged_len(), 0);
    }

    #[test]
    fn partial_chunk_is_staged_across_calls() {
        let mut sb = StreamBuffer::new();
        let first = [1u8, 2];
        let mut input = &first[..];
        match sb.fill(&mut input, 4, false).unwrap() {
            FillOutcome::NeedMore => {}
            FillOutcome::Ready(_) => panic!("expected NeedMore"),
        }
        assert_eq!(sb.staged_len(), 2);

        let second = [3u8, 4, 5];
        let mut input = &second[..];
        match sb.fill(&mut input, 4, false).unwrap() {
            FillOutcome::Ready(bytes) => assert_eq!(bytes, &[1, 2, 3, 4]),
            FillOutcome::NeedMore => panic!("expected Ready"),
        }
        assert_eq!(input, &[5]);
        sb.consumed();
        assert_eq!(sb.staged_len(), 0);
    }

    #[test]
    fn binary_subsection_never_buffers() {
        let mut sb = StreamBuffer::new();
        let data = [1u8, 2, 3];
        let mut input = &data[..];
        match sb.fill(&mut input, 10, true).unwrap() {
            FillOutcome::Ready(bytes) => assert_eq!(bytes, &data),
            FillOutcome::NeedMore => panic!("expected Ready"),
        }
        assert_eq!(input.len(), 0);
        assert_eq!(sb.staged_len(), 0);
    }

    #[test]
    fn oversized_staging_is_rejected() {
        let mut sb = StreamBuffer::new();
        // Fewer bytes than `len` so the direct pass-through fast path can't
        // apply and the call is forced to consider staging.
        let data = vec![0u8; 10];
        let mut input = &data[..];
        let err = sb.fill(&mut input, MAX_STAGED_BYTES + 1, false).unwrap_err();
        assert_eq!(err.needed, MAX_STAGED_BYTES + 1);
    }

    #[test]
    fn whole_oversized_chunk_in_one_shot_bypasses_staging() {
        // A subsection bigger than the cap still succeeds if the host
        // happens to deliver all of it contiguously in one call, since
        // nothing is ever copied into `staged`.
        let mut sb = StreamBuffer::new();
        let data = vec![0u8; MAX_STAGED_BYTES + 1];
        let mut input = &data[..];
        match sb.fill(&mut input, MAX_STAGED_BYTES + 1, false).unwrap() {
            FillOutcome::Ready(bytes) => assert_eq!(bytes.len(), MAX_STAGED_BYTES + 1),
            FillOutcome::NeedMore => panic!("expected Ready"),
        }
        assert_eq!(sb.staged_len(), 0);
    }

    #[test]
    fn byte_at_a_time_delivery_reassembles() {
        let mut sb = StreamBuffer::new();
        let data = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut produced = None;
        for b in data {
            let one = [b];
            let mut input = &one[..];
            match sb.fill(&mut input, 8, false).unwrap() {
                FillOutcome::Ready(bytes) => produced = Some(bytes.to_vec()),
                FillOutcome::NeedMore => {}
            }
        }
        assert_eq!(produced.unwrap(), data.to_vec());
    }
}
