//! Cursor navigation, typed column reads and row lookup.

use uuid::Uuid;

use crate::cursor::{Cursor, Token};
use crate::heaps::UserString;
use crate::image::Metadata;
use crate::layout::{Column, ColumnKind};
use crate::schema::{self, HeapKind, TableId};
use crate::{Error, ErrorKind};

impl<'data> Metadata<'data> {
    /// Creates a cursor to the first row of `table`, also returning the
    /// table's row count.
    ///
    /// Fails when the table is absent or empty.
    pub fn table_cursor(&self, table: TableId) -> Result<(Cursor, u32), Error> {
        let cursor = self.token_to_cursor(Token::new(table, 1))?;
        Ok((cursor, self.table(table).row_count))
    }

    /// Moves the cursor by `delta` rows.
    ///
    /// Row indices begin at 1 - see II.22. They can also point to index
    /// `count + 1`, which indicates the end of the table.
    pub fn cursor_move(&self, cursor: Cursor, delta: i32) -> Result<Cursor, Error> {
        let row = cursor.row as i64 + delta as i64;
        let end = self.table(cursor.table).end_row() as i64;
        if row < 1 || row > end {
            return Err(ErrorKind::RowIndexOutOfBounds(cursor.table, row.max(0) as u32).into());
        }
        Ok(Cursor::new(cursor.table, row as u32))
    }

    /// Moves the cursor to the next row.
    pub fn cursor_next(&self, cursor: Cursor) -> Result<Cursor, Error> {
        self.cursor_move(cursor, 1)
    }

    /// Returns true when the cursor points one past the last row.
    pub fn is_end_cursor(&self, cursor: Cursor) -> bool {
        cursor.row == self.table(cursor.table).end_row()
    }

    /// Resolves a token to a cursor, validating the row exists.
    pub fn token_to_cursor(&self, token: Token) -> Result<Cursor, Error> {
        let table = token
            .table()
            .ok_or(ErrorKind::UnknownTableId((token.raw() >> 24) as u8))?;
        let row = token.rid();
        if row == 0 || row > self.table(table).row_count {
            return Err(ErrorKind::RowIndexOutOfBounds(table, row).into());
        }
        Ok(Cursor::new(table, row))
    }

    /// Validates the cursor points at a row and looks up the column.
    pub(crate) fn cursor_column(&self, cursor: Cursor, col: u8) -> Result<Column, Error> {
        let table = self.table(cursor.table);
        if cursor.row == 0 || cursor.row > table.row_count {
            return Err(ErrorKind::RowIndexOutOfBounds(cursor.table, cursor.row).into());
        }
        table.column(col)
    }

    /// Reads the raw column value with no interpretation.
    pub(crate) fn read_raw(&self, cursor: Cursor, col: u8) -> Result<(u32, Column), Error> {
        let column = self.cursor_column(cursor, col)?;
        let value = self.table(cursor.table).read_col(cursor.row, &column)?;
        Ok((value, column))
    }

    /// Reads a constant column, zero-extended to `u32`.
    pub fn get_constant(&self, cursor: Cursor, col: u8) -> Result<u32, Error> {
        let (value, column) = self.read_raw(cursor, col)?;
        match column.kind {
            ColumnKind::Constant => Ok(value),
            _ => Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into()),
        }
    }

    /// Reads a direct or coded table-index column as a token.
    pub fn get_token(&self, cursor: Cursor, col: u8) -> Result<Token, Error> {
        let (value, column) = self.read_raw(cursor, col)?;
        match column.kind {
            ColumnKind::Table(target) => Ok(Token::new(target, value)),
            ColumnKind::Coded(map) => {
                let (target, rid) = map
                    .decompose(value)
                    .ok_or(ErrorKind::InvalidCodedIndexTag)?;
                Ok(Token::new(target, rid))
            }
            _ => Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into()),
        }
    }

    /// Reads a direct or coded table-index column as a cursor, validating
    /// the referenced row.
    ///
    /// Unlike [`token_to_cursor`](Metadata::token_to_cursor), the null row
    /// and the one-past-the-end row are permitted; both occur in stored
    /// indices.
    pub fn get_target(&self, cursor: Cursor, col: u8) -> Result<Cursor, Error> {
        let token = self.get_token(cursor, col)?;
        // Its validity as a table was established during the read.
        let table = token.table().ok_or(ErrorKind::InvalidCodedIndexTag)?;
        let row = token.rid();
        if row > self.table(table).end_row() {
            return Err(ErrorKind::RowIndexOutOfBounds(table, row).into());
        }
        Ok(Cursor::new(table, row))
    }

    /// Resolves a list column to the range of child rows owned by the
    /// cursor's row, returning the first child and the count.
    ///
    /// The run continues to the smaller of the last row of the target
    /// table and the next run, found by scanning forward for the next
    /// parent row with a non-nil value in the same column. See
    /// [`find_token_of_range_element`](Metadata::find_token_of_range_element)
    /// for mapping elements in the other direction.
    pub fn get_range(&self, cursor: Cursor, col: u8) -> Result<(Cursor, u32), Error> {
        let first = self.get_target(cursor, col)?;
        if first.is_null() || self.is_end_cursor(first) {
            return Ok((first, 0));
        }

        let mut next = cursor;
        loop {
            // The cursor into the current table remains valid at least
            // one past the last row.
            next = Cursor::new(next.table, next.row + 1);

            // At the end of the current table the remaining rows of the
            // target table belong to this run.
            if self.is_end_cursor(next) {
                let count = self.table(first.table).row_count - first.row + 1;
                return Ok((first, count));
            }

            let end = self.get_target(next, col)?;
            // A nil value means the next parent row shares this run;
            // keep scanning.
            if end.is_null() {
                continue;
            }
            return Ok((first, end.row.saturating_sub(first.row)));
        }
    }

    /// Reads a `#Strings` column.
    pub fn get_utf8(&self, cursor: Cursor, col: u8) -> Result<&str, Error> {
        let (offset, column) = self.read_raw(cursor, col)?;
        match column.kind {
            ColumnKind::Heap(HeapKind::Strings) => self.try_get_string(offset),
            _ => Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into()),
        }
    }

    /// Reads a `#US` column.
    pub fn get_user_string(&self, cursor: Cursor, col: u8) -> Result<UserString<'_>, Error> {
        let (offset, column) = self.read_raw(cursor, col)?;
        match column.kind {
            ColumnKind::Heap(HeapKind::UserString) => {
                self.try_get_user_string(offset).map(|(item, _)| item)
            }
            _ => Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into()),
        }
    }

    /// Reads a `#Blob` column.
    pub fn get_blob(&self, cursor: Cursor, col: u8) -> Result<&[u8], Error> {
        let (offset, column) = self.read_raw(cursor, col)?;
        match column.kind {
            ColumnKind::Heap(HeapKind::Blob) => self.try_get_blob(offset),
            _ => Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into()),
        }
    }

    /// Reads a `#GUID` column.
    pub fn get_guid(&self, cursor: Cursor, col: u8) -> Result<Uuid, Error> {
        let (index, column) = self.read_raw(cursor, col)?;
        match column.kind {
            ColumnKind::Heap(HeapKind::Guid) => self.try_get_guid(index),
            _ => Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into()),
        }
    }

    /// Reads a heap-index column as its raw heap offset.
    pub(crate) fn get_heap_offset(&self, cursor: Cursor, col: u8) -> Result<u32, Error> {
        let (offset, column) = self.read_raw(cursor, col)?;
        match column.kind {
            ColumnKind::Heap(_) => Ok(offset),
            _ => Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into()),
        }
    }

    /// Converts a lookup value to the raw form stored in the column:
    /// coded-index columns store the composed form of the token.
    fn lookup_key(&self, column: &Column, value: u32) -> Result<u32, Error> {
        match column.kind {
            ColumnKind::Coded(map) => map
                .compose(Token::from_raw(value))
                .ok_or_else(|| ErrorKind::TokenTableMismatch(value).into()),
            _ => Ok(value),
        }
    }

    /// Finds a row at or after `begin` whose column `col` stores `value`.
    ///
    /// The value to look for is the value stored in the table, typically
    /// a record id. An exception is made for coded index columns, which
    /// are cumbersome to compute: there `value` is a plain token and is
    /// composed into its coded form before comparison.
    ///
    /// Sorted tables are searched by binary search, unsorted ones
    /// linearly.
    pub fn find_row_from(
        &self,
        begin: Cursor,
        col: u8,
        value: u32,
    ) -> Result<Option<Cursor>, Error> {
        let table = self.table(begin.table);
        if begin.row == 0 || begin.row > table.row_count {
            return Err(ErrorKind::RowIndexOutOfBounds(begin.table, begin.row).into());
        }
        let column = table.column(col)?;
        let key = self.lookup_key(&column, value)?;

        let found = if table.is_sorted {
            self.binary_search(begin.table, &column, key, begin.row)?
        } else {
            self.linear_search(begin.table, &column, key, begin.row)?
        };
        Ok(found.map(|row| Cursor::new(begin.table, row)))
    }

    /// Finds the contiguous run of rows whose column `col` stores
    /// `value`, returning the run's first row and length.
    ///
    /// Only supported on tables currently sorted on that column; unsorted
    /// tables fail with [`ErrorKind::NotSupported`].
    pub fn find_range_from(
        &self,
        begin: Cursor,
        col: u8,
        value: u32,
    ) -> Result<Option<(Cursor, u32)>, Error> {
        if !self.table(begin.table).is_sorted {
            return Err(ErrorKind::NotSupported.into());
        }

        let found = match self.find_row_from(begin, col, value)? {
            Some(c) => c,
            None => return Ok(None),
        };

        let column = self.table(begin.table).column(col)?;
        let key = self.lookup_key(&column, value)?;
        let table = self.table(begin.table);

        // Walk outward from the match to delimit the run of equal values.
        let mut start = found.row;
        while start > 1 && table.read_col(start - 1, &column)? == key {
            start -= 1;
        }
        let mut last = found.row;
        while last < table.row_count && table.read_col(last + 1, &column)? == key {
            last += 1;
        }

        Ok(Some((Cursor::new(begin.table, start), last - start + 1)))
    }

    /// Given a row of a list-target table (`Field`, `MethodDef`, `Param`,
    /// `Event`, `Property` or one of their indirection tables), finds the
    /// row owning the range that contains it and returns its token.
    ///
    /// For `Event` and `Property` the owner is resolved through the
    /// `EventMap`/`PropertyMap` `Parent` column.
    pub fn find_token_of_range_element(&self, element: Cursor) -> Result<Token, Error> {
        self.find_cursor_of_range_element(element)
            .map(Cursor::token)
    }

    /// Like [`find_token_of_range_element`](Metadata::find_token_of_range_element),
    /// returning the owning row as a cursor.
    pub fn find_cursor_of_range_element(&self, element: Cursor) -> Result<Cursor, Error> {
        let (parent_id, parent_col) =
            schema::range_parent(element.table).ok_or(ErrorKind::NotSupported)?;

        let parent = self.table(parent_id);
        let column = parent.column(parent_col)?;
        let row = element.row;

        if parent.row_count == 0 {
            return Ok(Cursor::new(parent_id, 0));
        }

        let (last_cmp, found_row) = self.binary_search_closest(parent_id, &column, row)?;

        // If the probe stopped above the value, the owner is one row back.
        // On an exact match the probe may sit anywhere in a run of equal
        // values (empty lists sharing a start); the owner is the last row
        // of the run. If the probe stopped below the value, it is the
        // owner itself.
        let pos = match last_cmp {
            c if c < 0 => found_row - 1,
            0 => {
                let mut pos = found_row;
                while pos < parent.row_count && parent.read_col(pos + 1, &column)? == row {
                    pos += 1;
                }
                pos
            }
            _ => found_row,
        };

        match element.table {
            TableId::Event | TableId::EventPtr => {
                self.get_target(Cursor::new(parent_id, pos), crate::cols::event_map::PARENT)
            }
            TableId::Property | TableId::PropertyPtr => self.get_target(
                Cursor::new(parent_id, pos),
                crate::cols::property_map::PARENT,
            ),
            _ => Ok(Cursor::new(parent_id, pos)),
        }
    }

    /// Resolves an indirection-table cursor to the row of the direct
    /// table it references; any other cursor is returned unchanged.
    ///
    /// The end cursor of an indirection table resolves to the end cursor
    /// of the direct table.
    pub fn resolve_indirect_cursor(&self, cursor: Cursor) -> Result<Cursor, Error> {
        if !cursor.table.is_indirection() {
            return Ok(cursor);
        }
        if self.is_end_cursor(cursor) {
            let direct = cursor
                .table
                .direct_table()
                .ok_or(ErrorKind::NotSupported)?;
            return Ok(Cursor::new(direct, self.table(direct).end_row()));
        }
        self.get_target(cursor, 0)
    }

    fn linear_search(
        &self,
        table: TableId,
        column: &Column,
        key: u32,
        first_row: u32,
    ) -> Result<Option<u32>, Error> {
        let t = self.table(table);
        for row in first_row..=t.row_count {
            if t.read_col(row, column)? == key {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn binary_search(
        &self,
        table: TableId,
        column: &Column,
        key: u32,
        first_row: u32,
    ) -> Result<Option<u32>, Error> {
        let t = self.table(table);
        let mut lo = first_row;
        let mut hi = t.row_count;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let probe = t.read_col(mid, column)?;
            if probe == key {
                return Ok(Some(mid));
            }
            if key < probe {
                if mid == lo {
                    break;
                }
                hi = mid - 1;
            } else {
                lo = mid + 1;
            }
        }
        Ok(None)
    }

    /// A binary search that, instead of failing when the value is absent,
    /// reports the last probed row and how the key compared to it.
    fn binary_search_closest(
        &self,
        table: TableId,
        column: &Column,
        key: u32,
    ) -> Result<(i32, u32), Error> {
        let t = self.table(table);
        let mut base = 1u32;
        let mut count = t.row_count;
        let mut row = 1u32;
        let mut res = 0i32;
        while count > 0 {
            row = base + count / 2;
            let probe = t.read_col(row, column)?;
            res = match key.cmp(&probe) {
                std::cmp::Ordering::Less => -1,
                std::cmp::Ordering::Equal => 0,
                std::cmp::Ordering::Greater => 1,
            };
            if res == 0 || count == 1 {
                break;
            }
            if res < 0 {
                count /= 2;
            } else {
                base = row;
                count -= count / 2;
            }
        }
        Ok((res, row))
    }
}
