//! The metadata image: root parsing per II.24.2 and image-level state.

use std::borrow::Cow;

use watto::Pod;

use crate::bytes::{align_up, read_u32, read_u64, read_u8};
use crate::layout::{table_schema, LayoutCtx};
use crate::pdb::PdbInfo;
use crate::raw;
use crate::schema::{HeapKind, TableId, MAX_TABLE_COUNT};
use crate::tables::Table;
use crate::{Error, ErrorKind};

/// The version string of images created by [`Metadata::new`].
const DEFAULT_VERSION: &str = "v4.0.30319";

/// The version string of images created by [`Metadata::new_portable_pdb`].
const PDB_VERSION: &str = "PDB v1.0";

/// An ECMA-335 metadata image.
///
/// A `Metadata` either borrows a caller-provided buffer
/// ([`parse`](Metadata::parse)) or starts out empty ([`new`](Metadata::new)).
/// Reads never touch more than the borrowed bytes; the first mutation of a
/// table or heap clones the affected region into an owned allocation, so
/// the input buffer is never written to. Serialising an unedited image
/// reproduces the input bytes verbatim.
///
/// All row addressing goes through [`Cursor`](crate::Cursor) values
/// produced by this image; handles are single-threaded and callers
/// serialise their use of one handle.
#[derive(Debug)]
pub struct Metadata<'data> {
    /// The original backing bytes, kept for the no-edit write fast path.
    pub(crate) raw: Option<&'data [u8]>,
    pub(crate) edited: bool,

    // Metadata root details - II.24.2.1.
    pub(crate) major_version: u16,
    pub(crate) minor_version: u16,
    pub(crate) root_flags: u16,
    pub(crate) version: Cow<'data, str>,

    // Mirrors of the heap-size bits of the tables stream header, plus the
    // minimal-delta marker stream.
    pub(crate) large_strings: bool,
    pub(crate) large_guid: bool,
    pub(crate) large_blob: bool,
    pub(crate) minimal_delta: bool,

    // Metadata heaps - II.24.2.2.
    pub(crate) strings: Cow<'data, [u8]>,
    pub(crate) user_strings: Cow<'data, [u8]>,
    pub(crate) blobs: Cow<'data, [u8]>,
    pub(crate) guids: Cow<'data, [u8]>,
    pub(crate) pdb: Cow<'data, [u8]>,

    // Metadata tables - II.22, indexed by table id.
    pub(crate) tables: Vec<Table<'data>>,
}

fn empty_tables<'data>() -> Vec<Table<'data>> {
    (0..MAX_TABLE_COUNT as u8)
        .map(|i| Table::empty(TableId::from_raw(i).unwrap_or(TableId::Module)))
        .collect()
}

impl<'data> Metadata<'data> {
    fn empty(version: &'static str) -> Metadata<'data> {
        Metadata {
            raw: None,
            edited: false,
            major_version: 1,
            minor_version: 1,
            root_flags: 0,
            version: Cow::Borrowed(version),
            large_strings: false,
            large_guid: false,
            large_blob: false,
            minimal_delta: false,
            strings: Cow::Borrowed(&[]),
            user_strings: Cow::Borrowed(&[]),
            blobs: Cow::Borrowed(&[]),
            guids: Cow::Borrowed(&[]),
            pdb: Cow::Borrowed(&[]),
            tables: empty_tables(),
        }
    }

    /// Parses the provided buffer into a metadata image.
    ///
    /// The buffer must start at the metadata root (the `BSJB` signature)
    /// and remain unmoved for the lifetime of the handle.
    pub fn parse(buf: &'data [u8]) -> Result<Metadata<'data>, Error> {
        let (header, rest) =
            raw::Header::ref_from_prefix(buf).ok_or(ErrorKind::InvalidHeader)?;

        if header.signature != raw::METADATA_SIGNATURE {
            return Err(ErrorKind::InvalidSignature.into());
        }

        // The version buffer length is aligned to 4 bytes.
        let version_length = align_up(header.version_length as usize, 4);
        let version_buf = rest
            .get(..version_length)
            .ok_or(ErrorKind::InvalidLength)?;
        if version_length == 0 || version_buf[version_length - 1] != 0 {
            return Err(ErrorKind::InvalidVersionString.into());
        }
        let version_buf = version_buf
            .split(|c| *c == 0)
            .next()
            .ok_or(ErrorKind::InvalidVersionString)?;
        let version = std::str::from_utf8(version_buf)
            .map_err(|e| Error::new(ErrorKind::InvalidVersionString, e))?;

        // We already know that rest is long enough.
        let streams_buf = &rest[version_length..];
        let (header2, mut streams_buf) =
            raw::HeaderPart2::ref_from_prefix(streams_buf).ok_or(ErrorKind::InvalidHeader)?;

        let mut result = Metadata {
            raw: Some(buf),
            edited: false,
            major_version: header.major_version,
            minor_version: header.minor_version,
            root_flags: header2.flags,
            version: Cow::Borrowed(version),
            large_strings: false,
            large_guid: false,
            large_blob: false,
            minimal_delta: false,
            strings: Cow::Borrowed(&[]),
            user_strings: Cow::Borrowed(&[]),
            blobs: Cow::Borrowed(&[]),
            guids: Cow::Borrowed(&[]),
            pdb: Cow::Borrowed(&[]),
            tables: empty_tables(),
        };

        let mut tables_buf: Option<&'data [u8]> = None;
        let mut tables_uncompressed = false;

        for _ in 0..header2.streams {
            let (stream, after_header_buf) = raw::StreamHeader::ref_from_prefix(streams_buf)
                .ok_or(ErrorKind::InvalidStreamHeader)?;

            let name_buf = after_header_buf.get(..32).unwrap_or(after_header_buf);
            let name_buf = name_buf
                .split(|c| *c == 0)
                .next()
                .ok_or(ErrorKind::InvalidStreamName)?;
            let name = std::str::from_utf8(name_buf)
                .map_err(|e| Error::new(ErrorKind::InvalidStreamName, e))?;

            let rounded_name_len = align_up(name.len() + 1, 4);
            streams_buf = after_header_buf
                .get(rounded_name_len..)
                .ok_or(ErrorKind::InvalidLength)?;

            let offset = stream.offset as usize;
            let size = stream.size as usize;
            let end = offset.checked_add(size).ok_or(ErrorKind::InvalidLength)?;
            let stream_buf = buf.get(offset..end).ok_or(ErrorKind::InvalidLength)?;

            match name {
                "#~" => {
                    tables_buf = Some(stream_buf);
                    tables_uncompressed = false;
                }
                // The #- stream is used for images that may have the *Ptr
                // indirection tables. The indirection tables, as well as
                // the #- stream, are not documented in the ECMA spec.
                "#-" => {
                    tables_buf = Some(stream_buf);
                    tables_uncompressed = true;
                }
                // The #JTD stream marks the image as a minimal EnC delta.
                // Its content is ignored.
                "#JTD" => result.minimal_delta = true,
                "#Strings" => {
                    // The string heap may carry up to three '\0' bytes of
                    // trailing padding. Minimal deltas need the precise
                    // size of the base string heap, so trim it here; the
                    // serialiser restores the 4-byte alignment.
                    let mut trimmed = stream_buf;
                    while trimmed.len() >= 2
                        && trimmed[trimmed.len() - 1] == 0
                        && trimmed[trimmed.len() - 2] == 0
                    {
                        trimmed = &trimmed[..trimmed.len() - 1];
                    }
                    result.strings = Cow::Borrowed(trimmed);
                }
                "#Blob" => result.blobs = Cow::Borrowed(stream_buf),
                "#US" => result.user_strings = Cow::Borrowed(stream_buf),
                "#GUID" => result.guids = Cow::Borrowed(stream_buf),
                "#Pdb" => result.pdb = Cow::Borrowed(stream_buf),
                _ => return Err(ErrorKind::UnknownStream.into()),
            }
        }

        // When the #JTD stream is present, the #- stream must be the one
        // carrying the metadata tables.
        if result.minimal_delta && !tables_uncompressed {
            return Err(ErrorKind::InvalidTablesStream.into());
        }

        let tables_buf = tables_buf.ok_or(ErrorKind::InvalidTablesStream)?;
        result.parse_tables_stream(tables_buf)?;

        Ok(result)
    }

    /// Parses the `#~`/`#-` stream per II.24.2.6 and attaches each valid
    /// table's rows.
    fn parse_tables_stream(&mut self, buf: &'data [u8]) -> Result<(), Error> {
        let mut cur = buf;

        let _reserved = read_u32(&mut cur)?;
        let _major = read_u8(&mut cur)?;
        let _minor = read_u8(&mut cur)?;
        let heap_sizes = read_u8(&mut cur)?;
        let _reserved2 = read_u8(&mut cur)?;

        self.large_strings = heap_sizes & 0x01 != 0;
        self.large_guid = heap_sizes & 0x02 != 0;
        self.large_blob = heap_sizes & 0x04 != 0;

        let valid_tables = read_u64(&mut cur)?;
        let sorted_tables = read_u64(&mut cur)?;

        // Row counts are needed up front: coded index widths depend on
        // the sizes of all candidate tables - II.24.2.6.
        let mut row_counts = [0u32; MAX_TABLE_COUNT];
        for (i, count) in row_counts.iter_mut().enumerate() {
            if (valid_tables >> i) & 1 == 1 {
                *count = read_u32(&mut cur)?;
            }
        }

        // Merge in the row counts of type-system tables referenced from
        // the #Pdb stream; those participate in index width selection.
        if !self.pdb.is_empty() {
            let pdb = PdbInfo::parse(&self.pdb)?;
            for (count, referenced) in row_counts.iter_mut().zip(pdb.rows.iter()) {
                *count = count.saturating_add(*referenced);
            }
        }

        let ctx = LayoutCtx {
            row_counts: &row_counts,
            large_strings: self.large_strings,
            large_guid: self.large_guid,
            large_blob: self.large_blob,
            minimal_delta: self.minimal_delta,
        };

        for i in 0..MAX_TABLE_COUNT {
            if (valid_tables >> i) & 1 == 0 {
                continue;
            }
            let id = TableId::from_raw(i as u8).ok_or(ErrorKind::UnknownTableId(i as u8))?;
            let schema = table_schema(id, &ctx);

            let row_count = row_counts[i];
            let rows_len = schema.row_size as usize * row_count as usize;
            if rows_len > cur.len() {
                return Err(ErrorKind::InsufficientTableData(rows_len, cur.len()).into());
            }
            let (rows, rest) = cur.split_at(rows_len);
            cur = rest;

            let table = &mut self.tables[i];
            table.apply_schema(schema);
            table.present = true;
            table.row_count = row_count;
            table.is_sorted = (sorted_tables >> i) & 1 == 1;
            table.data = Cow::Borrowed(rows);
        }

        Ok(())
    }

    /// The version string of the metadata root.
    pub fn version_string(&self) -> &str {
        &self.version
    }

    /// The PDB id of the `#Pdb` stream, if the image has one.
    pub fn pdb_id(&self) -> Option<[u8; 20]> {
        self.pdb_info().ok().flatten().map(|info| info.id)
    }

    /// Returns true when the image carries the minimal EnC delta marker.
    pub fn is_minimal_delta(&self) -> bool {
        self.minimal_delta
    }

    /// The number of rows in the given table; 0 when the table is absent.
    pub fn row_count(&self, id: TableId) -> u32 {
        self.table(id).row_count
    }

    /// Whether the given table is currently marked sorted.
    pub fn is_sorted(&self, id: TableId) -> bool {
        self.table(id).is_sorted
    }

    /// Validates the heaps of the image: the leading zero entries of the
    /// `#Strings`, `#US` and `#Blob` heaps and the record alignment of
    /// the `#GUID` heap.
    pub fn validate(&self) -> Result<(), Error> {
        self.validate_guid_heap()?;
        self.validate_strings_heap()?;
        self.validate_user_string_heap()?;
        self.validate_blob_heap()
    }

    pub(crate) fn table(&self, id: TableId) -> &Table<'data> {
        &self.tables[id.index()]
    }

    pub(crate) fn table_mut(&mut self, id: TableId) -> &mut Table<'data> {
        &mut self.tables[id.index()]
    }

    pub(crate) fn heap(&self, kind: HeapKind) -> &[u8] {
        match kind {
            HeapKind::Strings => &self.strings,
            HeapKind::Guid => &self.guids,
            HeapKind::Blob => &self.blobs,
            HeapKind::UserString => &self.user_strings,
        }
    }

    pub(crate) fn heap_mut(&mut self, kind: HeapKind) -> &mut Vec<u8> {
        match kind {
            HeapKind::Strings => self.strings.to_mut(),
            HeapKind::Guid => self.guids.to_mut(),
            HeapKind::Blob => self.blobs.to_mut(),
            HeapKind::UserString => self.user_strings.to_mut(),
        }
    }

    /// Decodes the `#Pdb` stream, if the image has one.
    pub(crate) fn pdb_info(&self) -> Result<Option<PdbInfo>, Error> {
        if self.pdb.is_empty() {
            return Ok(None);
        }
        PdbInfo::parse(&self.pdb).map(Some)
    }

    /// Row counts as they matter for index width selection: the actual
    /// counts plus the referenced type-system counts of the `#Pdb`
    /// stream.
    pub(crate) fn effective_row_counts(&self) -> [u32; MAX_TABLE_COUNT] {
        let mut counts = [0u32; MAX_TABLE_COUNT];
        for (i, count) in counts.iter_mut().enumerate() {
            *count = self.tables[i].row_count;
        }
        if let Ok(Some(pdb)) = self.pdb_info() {
            for (count, referenced) in counts.iter_mut().zip(pdb.rows.iter()) {
                *count = count.saturating_add(*referenced);
            }
        }
        counts
    }

    pub(crate) fn layout_ctx<'a>(&self, row_counts: &'a [u32; MAX_TABLE_COUNT]) -> LayoutCtx<'a> {
        LayoutCtx {
            row_counts,
            large_strings: self.large_strings,
            large_guid: self.large_guid,
            large_blob: self.large_blob,
            minimal_delta: self.minimal_delta,
        }
    }
}

impl Metadata<'static> {
    /// Creates a fresh, empty image.
    ///
    /// The image uses the 1.1 metadata format with the `"v4.0.30319"`
    /// version string and an MVID of all zeros. It is seeded with the
    /// `Module` row for module identity and the `TypeDef` row for the
    /// global `<Module>` type, which every valid image must have.
    pub fn new() -> Result<Metadata<'static>, Error> {
        use crate::schema::cols;

        let mut md = Metadata::empty(DEFAULT_VERSION);

        let module = md.append_row(TableId::Module)?;
        md.set_constant(module, cols::module::GENERATION, 0)?;
        // Use the 0 index to specify the null guid as the guids for the image.
        md.set_heap_offset(module, cols::module::MVID, 0)?;
        md.set_heap_offset(module, cols::module::ENC_ID, 0)?;
        md.set_heap_offset(module, cols::module::ENC_BASE_ID, 0)?;
        md.set_utf8(module, cols::module::NAME, "")?;
        md.commit_row_add(module);

        // The global <Module> type - II.10.8.
        let global_type = md.append_row(TableId::TypeDef)?;
        md.set_constant(global_type, cols::type_def::FLAGS, 0)?;
        md.set_utf8(global_type, cols::type_def::TYPE_NAME, "<Module>")?;
        md.set_utf8(global_type, cols::type_def::TYPE_NAMESPACE, "")?;
        md.set_token(
            global_type,
            cols::type_def::EXTENDS,
            crate::Token::nil(TableId::TypeDef),
        )?;
        md.commit_row_add(global_type);

        Ok(md)
    }

    /// Creates a fresh, empty Portable PDB image.
    ///
    /// The image uses the 1.1 metadata format with the `"PDB v1.0"`
    /// version string and carries no rows.
    pub fn new_portable_pdb() -> Result<Metadata<'static>, Error> {
        Ok(Metadata::empty(PDB_VERSION))
    }
}
