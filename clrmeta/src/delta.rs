//! Applying EnC minimal deltas onto a base image.

use crate::cursor::Cursor;
use crate::image::Metadata;
use crate::schema::{cols, HeapKind, TableId};
use crate::{Error, ErrorKind};

impl<'data> Metadata<'data> {
    /// Merges a minimal EnC delta into this image.
    ///
    /// The delta must carry the `#JTD` marker and match the base image's
    /// metadata version. The delta's `#Strings`, `#Blob` and `#US` heaps
    /// are appended wholesale; the `#GUID` heap shares index space with
    /// the base, so only its tail past the base heap is appended.
    ///
    /// The operations recorded in the delta's `ENCLog` are not applied;
    /// any non-empty log fails with
    /// [`ErrorKind::UnsupportedDeltaOperation`]. Heaps merged before the
    /// log is examined stay merged.
    pub fn apply_delta(&mut self, delta: &Metadata<'_>) -> Result<(), Error> {
        if !delta.minimal_delta {
            return Err(ErrorKind::NotMinimalDelta.into());
        }
        if self.major_version != delta.major_version
            || self.minor_version != delta.minor_version
        {
            return Err(ErrorKind::DeltaVersionMismatch.into());
        }

        self.append_delta_heap(HeapKind::Strings, delta.heap(HeapKind::Strings))?;
        self.merge_guid_heap(delta)?;
        self.append_delta_heap(HeapKind::Blob, delta.heap(HeapKind::Blob))?;
        self.append_delta_heap(HeapKind::UserString, delta.heap(HeapKind::UserString))?;

        self.process_enc_log(delta)
    }

    fn merge_guid_heap(&mut self, delta: &Metadata<'_>) -> Result<(), Error> {
        let delta_heap = delta.heap(HeapKind::Guid);
        if delta_heap.is_empty() {
            return Ok(());
        }
        let base_len = self.heap(HeapKind::Guid).len();
        let tail = delta_heap
            .get(base_len..)
            .ok_or(ErrorKind::InvalidLength)?;
        self.append_delta_heap(HeapKind::Guid, tail)
    }

    fn process_enc_log(&mut self, delta: &Metadata<'_>) -> Result<(), Error> {
        if delta.row_count(TableId::EncLog) == 0 {
            return Ok(());
        }

        // The exact set of EnC operations and their semantics is not
        // something this library applies; reject the log rather than
        // guessing at its first entry.
        let cursor = Cursor::new(TableId::EncLog, 1);
        let _token = delta.get_constant(cursor, cols::enc_log::TOKEN)?;
        let op = delta.get_constant(cursor, cols::enc_log::OP)?;
        Err(ErrorKind::UnsupportedDeltaOperation(op).into())
    }
}
