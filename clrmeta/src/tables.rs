//! The in-memory representation of one metadata table.

use std::borrow::Cow;

use crate::layout::{Column, TableSchema};
use crate::schema::{TableId, MAX_COLUMN_COUNT};
use crate::{Error, ErrorKind};

/// Reads a little-endian column value of the given width.
pub(crate) fn read_value(data: &[u8], offset: usize, width: u8) -> Result<u32, Error> {
    let bytes = data
        .get(offset..offset + width as usize)
        .ok_or(ErrorKind::InvalidLength)?;
    Ok(match width {
        2 => u16::from_le_bytes(bytes.try_into().unwrap()) as u32,
        4 => u32::from_le_bytes(bytes.try_into().unwrap()),
        _ => return Err(ErrorKind::InvalidLength.into()),
    })
}

/// Writes a little-endian column value of the given width.
pub(crate) fn write_value(
    data: &mut [u8],
    offset: usize,
    width: u8,
    value: u32,
) -> Result<(), Error> {
    let bytes = data
        .get_mut(offset..offset + width as usize)
        .ok_or(ErrorKind::InvalidLength)?;
    match width {
        2 => bytes.copy_from_slice(&(value as u16).to_le_bytes()),
        4 => bytes.copy_from_slice(&value.to_le_bytes()),
        _ => return Err(ErrorKind::InvalidLength.into()),
    }
    Ok(())
}

/// A table in a metadata image.
///
/// The row bytes are borrowed from the input buffer until the first edit
/// clones them into an owned allocation; `data` always covers exactly
/// `row_count * row_size` bytes.
#[derive(Debug)]
pub(crate) struct Table<'data> {
    pub id: TableId,
    /// Whether the table exists in the image. Absent tables keep a row
    /// count of 0 and an empty layout.
    pub present: bool,
    pub row_count: u32,
    pub row_size: u8,
    pub column_count: u8,
    pub columns: [Column; MAX_COLUMN_COUNT],
    pub is_sorted: bool,
    pub is_adding_new_row: bool,
    pub data: Cow<'data, [u8]>,
}

impl<'data> Table<'data> {
    pub(crate) fn empty(id: TableId) -> Table<'data> {
        Table {
            id,
            present: false,
            row_count: 0,
            row_size: 0,
            column_count: 0,
            columns: [Column {
                kind: crate::layout::ColumnKind::Constant,
                offset: 0,
                width: 0,
            }; MAX_COLUMN_COUNT],
            is_sorted: false,
            is_adding_new_row: false,
            data: Cow::Borrowed(&[]),
        }
    }

    /// Installs a computed layout on this table.
    pub(crate) fn apply_schema(&mut self, schema: TableSchema) {
        self.columns = schema.columns;
        self.column_count = schema.column_count;
        self.row_size = schema.row_size;
    }

    /// Looks up a column descriptor, validating the index.
    pub(crate) fn column(&self, col: u8) -> Result<Column, Error> {
        if col >= self.column_count {
            return Err(ErrorKind::ColumnIndexOutOfBounds(self.id, col).into());
        }
        Ok(self.columns[col as usize])
    }

    /// Reads the raw value of `col` on the 1-based `row`.
    pub(crate) fn read_col(&self, row: u32, col: &Column) -> Result<u32, Error> {
        let start = (row as usize - 1) * self.row_size as usize + col.offset as usize;
        read_value(&self.data, start, col.width)
    }

    /// Writes the raw value of `col` on the 1-based `row`, cloning the
    /// backing bytes on first write.
    pub(crate) fn write_col(&mut self, row: u32, col: &Column, value: u32) -> Result<(), Error> {
        let start = (row as usize - 1) * self.row_size as usize + col.offset as usize;
        let width = col.width;
        write_value(self.data.to_mut(), start, width, value)
    }

    /// The row index one past the last row.
    pub(crate) fn end_row(&self) -> u32 {
        self.row_count + 1
    }
}
