//! Raw header structs of the physical metadata, as specified in the
//! ECMA-335 spec, II.24.2.

use watto::Pod;

/// Signature for physical metadata as specified by ECMA-335.
pub(crate) const METADATA_SIGNATURE: u32 = 0x424A_5342;

/// First part of the metadata root, as specified in II.24.2.1.
///
/// This includes everything before the version string.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    /// The metadata signature.
    ///
    /// The value of this should be [`METADATA_SIGNATURE`].
    pub signature: u32,
    /// Major version, 1 (ignore on read).
    pub major_version: u16,
    /// Minor version, 1 (ignore on read).
    pub minor_version: u16,
    /// Reserved, always 0.
    pub _reserved: u32,
    /// Number of bytes allocated to hold the version string.
    ///
    /// This is the actual length of the version string, including the
    /// null terminator, rounded up to a multiple of 4.
    pub version_length: u32,
}

/// Second part of the metadata root, as specified in II.24.2.1.
///
/// This includes everything after the version string.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct HeaderPart2 {
    /// Reserved, always 0.
    pub flags: u16,
    /// Number of streams.
    pub streams: u16,
}

/// A stream header, as specified in II.24.2.2.
///
/// Does not contain the stream's name due to its variable length.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct StreamHeader {
    /// Memory offset to start of this stream from start of the metadata root.
    pub offset: u32,
    /// Size of this stream in bytes.
    pub size: u32,
}

unsafe impl Pod for Header {}
unsafe impl Pod for HeaderPart2 {}
unsafe impl Pod for StreamHeader {}
