//! Serialising an image back to the II.24.2 byte layout.

use std::io::Write;

use crate::bytes::align_up;
use crate::image::Metadata;
use crate::raw::METADATA_SIGNATURE;
use crate::schema::{TableId, MAX_TABLE_COUNT};
use crate::{Error, ErrorKind};

/// Size of the `#~` stream header up to the row-count array.
const TABLES_HEADER_SIZE: usize = 4 + 1 + 1 + 1 + 1 + 8 + 8;

struct StreamEntry {
    name: &'static str,
    size: usize,
    /// The offset recorded in the stream header. For the zero-length
    /// `#JTD` marker this is the position of its own header.
    offset: usize,
    has_payload: bool,
}

fn stream_header_size(name: &str) -> usize {
    4 + 4 + align_up(name.len() + 1, 4)
}

impl<'data> Metadata<'data> {
    /// Writes the metadata image to the given sink.
    ///
    /// If no mutating call has been made on a parsed image, the original
    /// bytes are written verbatim. Otherwise a fresh image is emitted
    /// with the 2.0 table schema; this fails while a row add is still
    /// open on any table.
    pub fn write<W: Write>(&self, sink: &mut W) -> Result<(), Error> {
        if !self.edited {
            if let Some(raw) = self.raw {
                sink.write_all(raw)?;
                return Ok(());
            }
        }

        let mut valid_tables = 0u64;
        let mut sorted_tables = 0u64;
        // Indirection tables and minimal deltas are not expressible in
        // the compressed stream; they switch the name to `#-`.
        let mut tables_stream_name = if self.minimal_delta { "#-" } else { "#~" };

        for id in TableId::ALL {
            let table = self.table(id);
            if !table.present || table.row_count == 0 {
                continue;
            }
            if table.is_adding_new_row {
                return Err(ErrorKind::RowAddInProgress(id).into());
            }
            valid_tables |= 1 << id.index();
            if table.is_sorted {
                sorted_tables |= 1 << id.index();
            }
            if id.is_indirection() {
                tables_stream_name = "#-";
            }
        }

        let tables_stream_size = TABLES_HEADER_SIZE
            + valid_tables.count_ones() as usize * 4
            + TableId::ALL
                .iter()
                .filter(|id| (valid_tables >> id.index()) & 1 == 1)
                .map(|id| self.table(*id).data.len())
                .sum::<usize>();

        // Gather the streams in header order; payloads follow in the
        // same order.
        let mut streams = Vec::new();
        if self.minimal_delta {
            streams.push(StreamEntry {
                name: "#JTD",
                size: 0,
                offset: 0,
                has_payload: false,
            });
        }
        if !self.strings.is_empty() {
            // The string heap is padded back to a 4-byte boundary; the
            // parser trimmed the padding to recover the precise size.
            streams.push(StreamEntry {
                name: "#Strings",
                size: align_up(self.strings.len(), 4),
                offset: 0,
                has_payload: true,
            });
        }
        if !self.blobs.is_empty() {
            streams.push(StreamEntry {
                name: "#Blob",
                size: self.blobs.len(),
                offset: 0,
                has_payload: true,
            });
        }
        if !self.guids.is_empty() {
            streams.push(StreamEntry {
                name: "#GUID",
                size: self.guids.len(),
                offset: 0,
                has_payload: true,
            });
        }
        if !self.user_strings.is_empty() {
            streams.push(StreamEntry {
                name: "#US",
                size: self.user_strings.len(),
                offset: 0,
                has_payload: true,
            });
        }
        if !self.pdb.is_empty() {
            streams.push(StreamEntry {
                name: "#Pdb",
                size: self.pdb.len(),
                offset: 0,
                has_payload: true,
            });
        }
        streams.push(StreamEntry {
            name: tables_stream_name,
            size: tables_stream_size,
            offset: 0,
            has_payload: true,
        });

        // With the stream set known, all offsets are fixed; assign them
        // before anything is written.
        let version_buf_len = align_up(self.version.len() + 1, 4);
        let root_size = 16 + version_buf_len + 4;
        let headers_size: usize = streams.iter().map(|s| stream_header_size(s.name)).sum();

        let mut header_pos = root_size;
        let mut payload_pos = root_size + headers_size;
        for stream in streams.iter_mut() {
            if stream.has_payload {
                stream.offset = payload_pos;
                payload_pos += stream.size;
            } else {
                // No content; the offset must still be valid, so point it
                // at the stream's own header.
                stream.offset = header_pos;
            }
            header_pos += stream_header_size(stream.name);
        }

        let mut writer = watto::Writer::new(sink);

        // Metadata root - II.24.2.1.
        writer.write_all(&METADATA_SIGNATURE.to_le_bytes())?;
        writer.write_all(&self.major_version.to_le_bytes())?;
        writer.write_all(&self.minor_version.to_le_bytes())?;
        writer.write_all(&0u32.to_le_bytes())?;
        writer.write_all(&(version_buf_len as u32).to_le_bytes())?;
        writer.write_all(self.version.as_bytes())?;
        writer.write_all(&[0])?;
        writer.align_to(4)?;
        writer.write_all(&self.root_flags.to_le_bytes())?;
        writer.write_all(&(streams.len() as u16).to_le_bytes())?;

        // Stream headers - II.24.2.2.
        for stream in &streams {
            writer.write_all(&(stream.offset as u32).to_le_bytes())?;
            writer.write_all(&(stream.size as u32).to_le_bytes())?;
            writer.write_all(stream.name.as_bytes())?;
            writer.write_all(&[0])?;
            writer.align_to(4)?;
        }

        // Stream payloads, in header order.
        if !self.strings.is_empty() {
            writer.write_all(&self.strings)?;
            writer.align_to(4)?;
        }
        if !self.blobs.is_empty() {
            writer.write_all(&self.blobs)?;
        }
        if !self.guids.is_empty() {
            writer.write_all(&self.guids)?;
        }
        if !self.user_strings.is_empty() {
            writer.write_all(&self.user_strings)?;
        }
        if !self.pdb.is_empty() {
            writer.write_all(&self.pdb)?;
        }

        // Tables stream header - II.24.2.6.
        let mut heap_sizes = 0u8;
        if self.large_strings {
            heap_sizes |= 0x01;
        }
        if self.large_guid {
            heap_sizes |= 0x02;
        }
        if self.large_blob {
            heap_sizes |= 0x04;
        }

        writer.write_all(&0u32.to_le_bytes())?;
        writer.write_all(&[2, 0, heap_sizes, 1])?;
        writer.write_all(&valid_tables.to_le_bytes())?;
        writer.write_all(&sorted_tables.to_le_bytes())?;

        for i in 0..MAX_TABLE_COUNT {
            if (valid_tables >> i) & 1 == 1 {
                writer.write_all(&self.tables[i].row_count.to_le_bytes())?;
            }
        }
        for i in 0..MAX_TABLE_COUNT {
            if (valid_tables >> i) & 1 == 1 {
                writer.write_all(&self.tables[i].data)?;
            }
        }

        Ok(())
    }

    /// Writes the metadata image into a fresh buffer.
    pub fn write_to_vec(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(buf)
    }
}
