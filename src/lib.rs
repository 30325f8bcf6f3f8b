//! A streaming package downloader and parser for the DWL firmware/software
//! update container format.
//!
//! This crate implements the hard, interesting core of an LwM2M
//! device-management client's firmware-update path: a push-oriented state
//! machine that consumes an arbitrarily-chunked byte stream from a remote
//! package source, parses the DWL container format, incrementally verifies
//! its CRC-32 and SHA-1 integrity, reports progress, and hands verified
//! binary payload to a host-supplied storage sink.
//!
//! ## What this crate does *not* do
//!
//! The actual network fetch, persistent storage of the binary payload,
//! firmware-update state/result persistence, the outer LwM2M/CoAP
//! transport, and the CRC-32/SHA-1 primitives themselves are all external
//! collaborators. The host supplies them through [`downloader::Callbacks`]
//! and [`crypto::Sha1Backend`].
//!
//! ## Layout
//!
//! - [`dwl`] — the DWL container grammar: prolog, section tags, the UPCK
//!   header, and [`dwl::DwlParser`], the inner subsection state machine.
//! - [`crypto`] — the CRC-32 step function and the SHA-1 capability trait.
//! - [`stream_buffer`] — the bounded reassembly buffer that groups chunked
//!   input into parser-sized units.
//! - [`downloader`] — the outer [`downloader::Downloader`] state machine
//!   that drives a single package download from start to finish.
//!
//! A download is one value: construct a [`downloader::Downloader`], call
//! [`downloader::Downloader::run`] once, feeding it bytes from
//! [`downloader::Downloader::receive_data`] as they arrive.

pub mod crypto;
pub mod downloader;
pub mod dwl;
pub mod stream_buffer;

pub use downloader::Downloader;
