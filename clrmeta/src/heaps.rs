//! Read access to the metadata heaps: `#Strings`, `#US`, `#Blob` and
//! `#GUID`, as specified in II.24.2.3 through II.24.2.5.

use uuid::Uuid;

use crate::bytes::decode_unsigned;
use crate::image::Metadata;
use crate::schema::HeapKind;
use crate::{Error, ErrorKind};

/// One item of the `#US` heap: a UTF-16 string plus the trailing byte
/// flagging characters that need handling beyond 8-bit encodings.
#[derive(Debug, Clone, Copy)]
pub struct UserString<'a> {
    bytes: &'a [u8],
    final_byte: u8,
}

impl<'a> UserString<'a> {
    /// The UTF-16-encoded payload, excluding the trailing flag byte.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// The trailing byte: 1 when any character requires handling beyond
    /// that provided for 8-bit encoding sets, else 0.
    pub fn final_byte(&self) -> u8 {
        self.final_byte
    }

    /// Returns true for the empty item.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decodes the payload, replacing unpaired surrogates.
    pub fn to_string_lossy(&self) -> String {
        let units: Vec<u16> = self
            .bytes
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    }
}

impl<'data> Metadata<'data> {
    /// Reads the string starting at the given `#Strings` heap offset.
    ///
    /// Fails when the offset is past the heap or the string is not
    /// UTF-8. An unterminated string yields everything up to the end of
    /// the heap; validating the terminator is on the caller.
    pub(crate) fn try_get_string(&self, offset: u32) -> Result<&str, Error> {
        let buf = self.heap(HeapKind::Strings);
        let tail = buf
            .get(offset as usize..)
            .filter(|t| !t.is_empty())
            .ok_or(ErrorKind::InvalidStringOffset)?;
        let string = tail
            .split(|c| *c == 0)
            .next()
            .ok_or(ErrorKind::InvalidStringData)?;
        std::str::from_utf8(string).map_err(|e| Error::new(ErrorKind::InvalidStringData, e))
    }

    /// Reads the `#US` heap item at `offset`, also returning the offset
    /// of the next item.
    pub(crate) fn try_get_user_string(
        &self,
        offset: u32,
    ) -> Result<(UserString<'_>, usize), Error> {
        let buf = self.heap(HeapKind::UserString);
        let tail = buf
            .get(offset as usize..)
            .filter(|t| !t.is_empty())
            .ok_or(ErrorKind::InvalidUserStringOffset)?;
        let (byte_count, rest) = decode_unsigned(tail)
            .map_err(|e| Error::new(ErrorKind::InvalidUserStringOffset, e))?;

        let item = if byte_count == 0 {
            UserString {
                bytes: &[],
                final_byte: 0,
            }
        } else {
            let payload = rest
                .get(..byte_count as usize)
                .ok_or(ErrorKind::InvalidUserStringOffset)?;
            UserString {
                bytes: &payload[..payload.len() - 1],
                final_byte: payload[payload.len() - 1],
            }
        };

        let consumed = buf.len() - rest.len() + byte_count as usize;
        Ok((item, consumed))
    }

    /// Reads the blob starting at the given `#Blob` heap offset.
    pub(crate) fn try_get_blob(&self, offset: u32) -> Result<&[u8], Error> {
        let buf = self.heap(HeapKind::Blob);
        let tail = buf
            .get(offset as usize..)
            .filter(|t| !t.is_empty())
            .ok_or(ErrorKind::InvalidBlobOffset)?;
        let (byte_count, rest) =
            decode_unsigned(tail).map_err(|e| Error::new(ErrorKind::InvalidBlobOffset, e))?;
        rest.get(..byte_count as usize)
            .ok_or_else(|| ErrorKind::InvalidBlobData.into())
    }

    /// Reads the GUID with the given 1-based `#GUID` heap index.
    ///
    /// Index 0 yields the all-zero GUID without touching the heap.
    pub(crate) fn try_get_guid(&self, index: u32) -> Result<Uuid, Error> {
        if index == 0 {
            return Ok(Uuid::nil());
        }
        let buf = self.heap(HeapKind::Guid);
        let start = (index as usize - 1) * 16;
        let bytes = buf
            .get(start..start + 16)
            .ok_or(ErrorKind::InvalidGuidIndex)?;
        Ok(Uuid::from_bytes_le(bytes.try_into().unwrap()))
    }

    /// Walks the `#US` heap from the start, yielding each item with its
    /// heap offset.
    pub fn user_strings(&self) -> UserStrings<'_, 'data> {
        UserStrings {
            metadata: self,
            offset: 0,
            failed: false,
        }
    }

    pub(crate) fn validate_strings_heap(&self) -> Result<(), Error> {
        let buf = self.heap(HeapKind::Strings);
        // The first character must be the '\0' - II.24.2.3.
        if !buf.is_empty() && buf[0] != 0 {
            return Err(ErrorKind::InvalidStringData.into());
        }
        Ok(())
    }

    pub(crate) fn validate_user_string_heap(&self) -> Result<(), Error> {
        let buf = self.heap(HeapKind::UserString);
        // The first element must be the 0 - II.24.2.4.
        if !buf.is_empty() && buf[0] != 0 {
            return Err(ErrorKind::InvalidUserStringOffset.into());
        }
        Ok(())
    }

    pub(crate) fn validate_blob_heap(&self) -> Result<(), Error> {
        let buf = self.heap(HeapKind::Blob);
        // The first element must be the 0 - II.24.2.4.
        if !buf.is_empty() && buf[0] != 0 {
            return Err(ErrorKind::InvalidBlobData.into());
        }
        Ok(())
    }

    pub(crate) fn validate_guid_heap(&self) -> Result<(), Error> {
        if self.heap(HeapKind::Guid).len() % 16 != 0 {
            return Err(ErrorKind::InvalidGuidIndex.into());
        }
        Ok(())
    }
}

/// An iterator over the items of the `#US` heap.
///
/// Yields `(heap_offset, item)` pairs; a malformed item ends the walk
/// after yielding the error.
pub struct UserStrings<'m, 'data> {
    metadata: &'m Metadata<'data>,
    offset: usize,
    failed: bool,
}

impl<'m, 'data> Iterator for UserStrings<'m, 'data> {
    type Item = Result<(u32, UserString<'m>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.metadata.heap(HeapKind::UserString).len() {
            return None;
        }

        let offset = self.offset as u32;
        match self.metadata.try_get_user_string(offset) {
            Ok((item, next_offset)) => {
                self.offset = next_offset;
                Some(Ok((offset, item)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
