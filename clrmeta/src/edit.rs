//! The editing side of the engine: row insertion, column writes, heap
//! appends, column-width promotion, indirection-table synthesis and sort
//! maintenance.
//!
//! Edits never touch the original backing bytes; the first write to a
//! table or heap clones it into an owned buffer. Every structural change
//! immediately re-establishes the width invariants of II.24.2.6, so the
//! image is serialisable at any point outside an open row add.

use std::borrow::Cow;

use uuid::Uuid;

use crate::bytes::encode_unsigned;
use crate::cursor::{Cursor, Token};
use crate::image::Metadata;
use crate::layout::{table_schema, ColumnKind};
use crate::schema::{self, HeapKind, TableId, MAX_TABLE_COUNT};
use crate::tables::{read_value, write_value};
use crate::{Error, ErrorKind};

impl<'data> Metadata<'data> {
    fn mark_edited(&mut self) {
        self.edited = true;
    }

    /// Initialises an absent table so rows can be added to it.
    fn ensure_table(&mut self, id: TableId) -> Result<(), Error> {
        if self.table(id).present {
            return Ok(());
        }

        // Computing the layout needs a nonzero row count for the table
        // itself; the count is reset below.
        let mut counts = self.effective_row_counts();
        counts[id.index()] = 1;
        let schema = table_schema(id, &self.layout_ctx(&counts));

        // New tables with sort keys start out sorted; tables without keys
        // never use the bit.
        let is_sorted = !schema::sort_keys(id).is_empty();

        let table = self.table_mut(id);
        table.apply_schema(schema);
        table.present = true;
        table.row_count = 0;
        table.is_sorted = is_sorted;
        table.data = Cow::Owned(Vec::new());
        Ok(())
    }

    /// Recomputes every index column's width from the current heap sizes
    /// and row counts, transcoding the rows of any table whose layout
    /// changed.
    ///
    /// `grown` overrides the effective row count of one table, so widths
    /// can be established for a growth before the row itself is added.
    fn refresh_column_widths(&mut self, grown: Option<(TableId, u32)>) -> Result<(), Error> {
        let mut counts = self.effective_row_counts();
        if let Some((id, new_count)) = grown {
            counts[id.index()] = counts[id.index()].max(new_count);
        }

        for i in 0..MAX_TABLE_COUNT {
            if !self.tables[i].present {
                continue;
            }

            // Compute the new layout; constant widths never move.
            let ctx = self.layout_ctx(&counts);
            let table = &self.tables[i];
            let mut new_columns = table.columns;
            let mut changed = false;
            let mut offset = 0u8;
            for col in new_columns.iter_mut().take(table.column_count as usize) {
                let width = ctx.index_width(col.kind).unwrap_or(col.width);
                if width != col.width {
                    changed = true;
                }
                col.width = width;
                col.offset = offset;
                offset += width;
            }
            if !changed {
                continue;
            }

            // Copy rows column by column, transcoding widths.
            let new_row_size = offset as usize;
            let mut new_data = vec![0u8; table.row_count as usize * new_row_size];
            for row in 0..table.row_count as usize {
                let old_start = row * table.row_size as usize;
                let new_start = row * new_row_size;
                for c in 0..table.column_count as usize {
                    let old_col = &table.columns[c];
                    let new_col = &new_columns[c];
                    let value =
                        read_value(&table.data, old_start + old_col.offset as usize, old_col.width)?;
                    write_value(
                        &mut new_data,
                        new_start + new_col.offset as usize,
                        new_col.width,
                        value,
                    )?;
                }
            }

            let table = &mut self.tables[i];
            table.columns = new_columns;
            table.row_size = new_row_size as u8;
            table.data = Cow::Owned(new_data);
        }
        Ok(())
    }

    /// Increments every stored reference to rows of `target` at or past
    /// `start` by one, across all direct and coded index columns of the
    /// image. This is what makes mid-table insertion safe for tokens
    /// already held elsewhere.
    fn shift_row_references(&mut self, target: TableId, start: u32) -> Result<(), Error> {
        for i in 0..MAX_TABLE_COUNT {
            if !self.tables[i].present {
                continue;
            }

            let column_count = self.tables[i].column_count as usize;
            for c in 0..column_count {
                let column = self.tables[i].columns[c];
                match column.kind {
                    ColumnKind::Table(t) if t == target => {
                        let table = &mut self.tables[i];
                        for row in 1..=table.row_count {
                            let rid = table.read_col(row, &column)?;
                            if rid >= start {
                                table.write_col(row, &column, rid + 1)?;
                            }
                        }
                    }
                    ColumnKind::Coded(map) if map.has_target(target) => {
                        let table = &mut self.tables[i];
                        for row in 1..=table.row_count {
                            let raw = table.read_col(row, &column)?;
                            let (t, rid) = map
                                .decompose(raw)
                                .ok_or(ErrorKind::InvalidCodedIndexTag)?;
                            if t == target && rid >= start {
                                let recoded = map
                                    .compose(Token::new(target, rid + 1))
                                    .ok_or(ErrorKind::InvalidCodedIndexTag)?;
                                table.write_col(row, &column, recoded)?;
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Creates a zeroed row slot at `row_index` (1-based; `count + 1`
    /// appends) and updates all references.
    ///
    /// Leaves the table in the row-add-in-progress state; callers must
    /// finish with [`commit_row_add`](Metadata::commit_row_add).
    fn insert_row_into_table(&mut self, id: TableId, row_index: u32) -> Result<Cursor, Error> {
        self.mark_edited();

        let table = self.table(id);
        if !table.present {
            return Err(ErrorKind::TableNotPresent(id).into());
        }
        // One row must be fully added before another is started.
        if table.is_adding_new_row {
            return Err(ErrorKind::RowAddInProgress(id).into());
        }
        if row_index == 0 || row_index > table.end_row() {
            return Err(ErrorKind::InvalidInsertionPoint(id, row_index).into());
        }

        // Establish the widths required by the grown table before the
        // physical shift, so the transcode copies the pre-insert rows.
        let new_count = table.row_count + 1;
        self.refresh_column_widths(Some((id, new_count)))?;

        let table = self.table_mut(id);
        let row_size = table.row_size as usize;
        let pos = (row_index as usize - 1) * row_size;
        let data = table.data.to_mut();
        let old_len = data.len();
        data.resize(old_len + row_size, 0);
        data.copy_within(pos..old_len, pos + row_size);
        data[pos..pos + row_size].fill(0);

        // Columns elsewhere may point at the shifted rows, including the
        // one-past-the-end row used by empty list ranges.
        self.shift_row_references(id, row_index)?;

        let table = self.table_mut(id);
        table.row_count = new_count;
        table.is_adding_new_row = true;

        Ok(Cursor::new(id, row_index))
    }

    /// Sets the list columns of a freshly appended row to the zero-length
    /// range at the end of their target tables.
    fn initialize_list_columns(&mut self, cursor: Cursor) -> Result<(), Error> {
        let column_count = self.table(cursor.table).column_count;
        for col in 0..column_count {
            if !schema::is_list_column(cursor.table, col) {
                continue;
            }
            let column = self.table(cursor.table).column(col)?;
            let target = match column.kind {
                ColumnKind::Table(t) => t,
                _ => return Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into()),
            };
            let end = self.table(target).end_row();
            self.set_token(cursor, col, Token::new(target, end))?;
        }
        Ok(())
    }

    fn insert_row_relative(&mut self, row: Cursor, offset: u32) -> Result<Cursor, Error> {
        // An insert cannot double as a "create table" operation.
        if !self.table(row.table).present {
            return Err(ErrorKind::TableNotPresent(row.table).into());
        }

        // Tables that are the target of a list column only grow through
        // the list-aware operations, which maintain the parent ranges.
        if row.table.indirection_table().is_some() {
            return Err(ErrorKind::NotSupported.into());
        }

        let new_row = self.insert_row_into_table(row.table, row.row + offset)?;

        // A row inserted at the end starts its list columns as empty
        // ranges at the end of the target tables; a row inserted
        // mid-table copies the following row's list values, which means
        // the same.
        let next_row = new_row.row + 1;
        if next_row > self.table(new_row.table).row_count {
            self.initialize_list_columns(new_row)?;
        } else {
            let column_count = self.table(new_row.table).column_count;
            for col in 0..column_count {
                if !schema::is_list_column(new_row.table, col) {
                    continue;
                }
                let (value, column) = self.read_raw(Cursor::new(new_row.table, next_row), col)?;
                self.table_mut(new_row.table)
                    .write_col(new_row.row, &column, value)?;
            }
        }

        Ok(new_row)
    }

    /// Creates a new row logically before the row at the cursor.
    ///
    /// The new row takes over the cursor's row index; references held
    /// elsewhere keep pointing at the original rows. Fails for tables
    /// that are the target of a list column
    /// ([`add_new_row_to_list`](Metadata::add_new_row_to_list) is the
    /// only way to grow those). The table is treated as unsorted until
    /// [`commit_row_add`](Metadata::commit_row_add) is called after all
    /// columns have been set.
    pub fn insert_row_before(&mut self, row: Cursor) -> Result<Cursor, Error> {
        self.insert_row_relative(row, 0)
    }

    /// Creates a new row after the row at the cursor.
    ///
    /// See [`insert_row_before`](Metadata::insert_row_before) for the
    /// constraints.
    pub fn insert_row_after(&mut self, row: Cursor) -> Result<Cursor, Error> {
        self.insert_row_relative(row, 1)
    }

    fn append_row_internal(&mut self, id: TableId) -> Result<Cursor, Error> {
        let end = self.table(id).end_row();
        let new_row = self.insert_row_into_table(id, end)?;
        self.initialize_list_columns(new_row)?;
        Ok(new_row)
    }

    /// Creates a new row at the end of the table, initialising the table
    /// if the image does not have it yet.
    ///
    /// Fails for tables that are the target of a list column; see
    /// [`add_new_row_to_list`](Metadata::add_new_row_to_list). The table
    /// is treated as unsorted until
    /// [`commit_row_add`](Metadata::commit_row_add) is called after all
    /// columns have been set.
    pub fn append_row(&mut self, id: TableId) -> Result<Cursor, Error> {
        if id.indirection_table().is_some() || id.is_indirection() {
            return Err(ErrorKind::NotSupported.into());
        }
        self.mark_edited();
        self.ensure_table(id)?;
        self.append_row_internal(id)
    }

    /// Synthesises the indirection table for `direct`, with one row per
    /// existing direct row, each pointing at its own index.
    fn create_and_fill_indirection_table(
        &mut self,
        direct: TableId,
        indirect: TableId,
    ) -> Result<(), Error> {
        debug_assert!(!self.table(indirect).present);

        let mut counts = self.effective_row_counts();
        counts[indirect.index()] = 1;
        let schema = table_schema(indirect, &self.layout_ctx(&counts));

        let row_count = self.table(direct).row_count;
        let width = schema.columns[0].width;
        let mut data = vec![0u8; row_count as usize * width as usize];
        for i in 0..row_count {
            write_value(&mut data, i as usize * width as usize, width, i + 1)?;
        }

        let table = self.table_mut(indirect);
        table.apply_schema(schema);
        table.present = true;
        table.is_sorted = false;
        table.row_count = row_count;
        table.data = Cow::Owned(data);
        Ok(())
    }

    /// Points a list column at the indirection table that now shadows its
    /// original target.
    fn retarget_list_column(&mut self, parent: TableId, col: u8, indirect: TableId) {
        let table = self.table_mut(parent);
        table.columns[col as usize].kind = ColumnKind::Table(indirect);
    }

    /// The inner list insertion: places a new child row so that it sits
    /// just before `before` in the parent's range.
    fn add_row_to_list_at(
        &mut self,
        list_owner: Cursor,
        list_col: u8,
        before: Cursor,
    ) -> Result<Cursor, Error> {
        let (range, count) = self.get_range(list_owner, list_col)?;
        let target = self.resolve_indirect_cursor(before)?;

        if before.table != target.table {
            // An indirection table is live: append the child to the end
            // of the direct table and insert the indirection entry at the
            // requested position.
            let new_row = self.append_row_internal(target.table)?;

            let new_indirection_row = self.insert_row_before(before)?;
            self.set_target(new_indirection_row, 0, new_row)?;

            if count == 0 || range.row == before.row {
                // First element of this parent's list, or an insertion at
                // the very start of it: the parent must point at the new
                // entry or the element would belong to the previous
                // parent.
                self.set_target(list_owner, list_col, new_indirection_row)?;
            }

            self.commit_row_add(new_indirection_row);
            return Ok(new_row);
        }

        if self.is_end_cursor(before) {
            // No indirection table, and none is needed for an insertion
            // at the end of the target table.
            let new_row = self.append_row_internal(before.table)?;

            if count == 0 {
                // The parent's list was empty, so its column still points
                // past its predecessor's range. Rewrite it, along with
                // every preceding parent sharing the same value, or those
                // lists become inconsistent.
                let current = self.get_target(list_owner, list_col)?;
                let mut first = list_owner.row;
                while first > 1 {
                    let prev = self.get_target(Cursor::new(list_owner.table, first - 1), list_col)?;
                    if prev.row != current.row {
                        break;
                    }
                    first -= 1;
                }
                for row in first..=list_owner.row {
                    self.set_target(Cursor::new(list_owner.table, row), list_col, new_row)?;
                }
            }
            return Ok(new_row);
        }

        // A mid-range insertion into a live direct table: synthesise the
        // indirection table, retarget the list column, and insert through
        // it instead.
        let direct = target.table;
        let indirect = direct.indirection_table().ok_or(ErrorKind::NotSupported)?;
        self.create_and_fill_indirection_table(direct, indirect)?;
        self.retarget_list_column(list_owner.table, list_col, indirect);

        // Each direct row corresponds to the same index in the fresh
        // indirection table, so the insertion point carries over.
        let before = Cursor::new(indirect, before.row);
        self.add_row_to_list_at(list_owner, list_col, before)
    }

    fn prepare_list_range(
        &mut self,
        list_owner: Cursor,
        list_col: u8,
    ) -> Result<(Cursor, u32), Error> {
        if !schema::is_list_column(list_owner.table, list_col) {
            return Err(ErrorKind::ColumnKindMismatch(list_owner.table, list_col).into());
        }

        let (mut range, count) = self.get_range(list_owner, list_col)?;
        if !self.table(range.table).present {
            self.ensure_table(range.table)?;
            range = Cursor::new(range.table, 1);
        }
        Ok((range, count))
    }

    /// Creates a new row at the end of the list owned by `list_owner`
    /// through `list_col`.
    ///
    /// This accounts for any indirection table that must be created or
    /// maintained so the list structure is preserved without moving
    /// tokens. The child table is treated as unsorted until
    /// [`commit_row_add`](Metadata::commit_row_add) is called after all
    /// columns have been set on the new row.
    pub fn add_new_row_to_list(&mut self, list_owner: Cursor, list_col: u8) -> Result<Cursor, Error> {
        self.mark_edited();
        let (range, count) = self.prepare_list_range(list_owner, list_col)?;
        let after_range = self.cursor_move(range, count as i32)?;
        self.add_row_to_list_at(list_owner, list_col, after_range)
    }

    /// Creates a new row in the list owned by `list_owner` such that the
    /// values of `sort_col` stay in ascending order, and initialises
    /// `sort_col` on the new row to `value`.
    ///
    /// Assumes the list is currently sorted by `sort_col`. The child
    /// table is treated as unsorted until
    /// [`commit_row_add`](Metadata::commit_row_add) is called after all
    /// columns have been set on the new row.
    pub fn add_new_row_to_sorted_list(
        &mut self,
        list_owner: Cursor,
        list_col: u8,
        sort_col: u8,
        value: u32,
    ) -> Result<Cursor, Error> {
        self.mark_edited();
        let (range, count) = self.prepare_list_range(list_owner, list_col)?;

        // Most insertions land at the end of the list, so walk backward:
        // the new row goes after the last child whose value does not
        // exceed it.
        let mut insert_at = range.row + count;
        while insert_at > range.row {
            let check = Cursor::new(range.table, insert_at - 1);
            let target = self.resolve_indirect_cursor(check)?;
            if self.get_constant(target, sort_col)? <= value {
                break;
            }
            insert_at -= 1;
        }

        let before = Cursor::new(range.table, insert_at);
        let new_row = self.add_row_to_list_at(list_owner, list_col, before)?;
        self.set_constant(new_row, sort_col, value)?;
        Ok(new_row)
    }

    /// Finishes the process of adding a row to the cursor's table.
    ///
    /// If the table was sorted, its sort state is re-evaluated against
    /// the new row's neighbours. Calling this with a null cursor is a
    /// no-op, so helper wrappers may call it unconditionally.
    pub fn commit_row_add(&mut self, row: Cursor) {
        if row.is_null() {
            return;
        }
        if !self.table(row.table).is_adding_new_row {
            return;
        }

        if self.table(row.table).is_sorted {
            let still_sorted = self.row_sorted_within_table(row).unwrap_or(false);
            self.table_mut(row.table).is_sorted = still_sorted;
        }

        self.table_mut(row.table).is_adding_new_row = false;
    }

    /// Compares two adjacent rows on every sort key of the table.
    fn rows_sorted(&self, id: TableId, row: u32, next_row: u32) -> Result<bool, Error> {
        let table = self.table(id);
        for key in schema::sort_keys(id) {
            let column = table.column(key.col)?;
            let a = table.read_col(row, &column)?;
            let b = table.read_col(next_row, &column)?;
            let in_order = if key.descending { a >= b } else { a <= b };
            if !in_order {
                return Ok(false);
            }
            if a != b {
                break;
            }
        }
        Ok(true)
    }

    fn row_sorted_within_table(&self, row: Cursor) -> Result<bool, Error> {
        let count = self.table(row.table).row_count;
        if row.row > 1 && !self.rows_sorted(row.table, row.row - 1, row.row)? {
            return Ok(false);
        }
        if row.row < count && !self.rows_sorted(row.table, row.row, row.row + 1)? {
            return Ok(false);
        }
        Ok(true)
    }

    /// After a key-column write on a sorted table outside a row add,
    /// clears the sorted bit when the row no longer fits between its
    /// neighbours. Tables never go from unsorted back to sorted here.
    fn check_sorted_after_write(&mut self, cursor: Cursor, col: u8) -> Result<(), Error> {
        let table = self.table(cursor.table);
        if !table.is_sorted || table.is_adding_new_row {
            return Ok(());
        }
        if !schema::sort_keys(cursor.table).iter().any(|k| k.col == col) {
            return Ok(());
        }
        if !self.row_sorted_within_table(cursor)? {
            self.table_mut(cursor.table).is_sorted = false;
        }
        Ok(())
    }

    fn write_column_checked(
        &mut self,
        cursor: Cursor,
        col: u8,
        value: u32,
    ) -> Result<(), Error> {
        let column = self.cursor_column(cursor, col)?;
        self.table_mut(cursor.table)
            .write_col(cursor.row, &column, value)?;
        self.check_sorted_after_write(cursor, col)
    }

    /// Writes a constant column.
    pub fn set_constant(&mut self, cursor: Cursor, col: u8, value: u32) -> Result<(), Error> {
        self.mark_edited();
        let column = self.cursor_column(cursor, col)?;
        if column.kind != ColumnKind::Constant {
            return Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into());
        }
        self.write_column_checked(cursor, col, value)
    }

    /// Writes a direct or coded table-index column from a token.
    ///
    /// For a direct index the token's table must match the column's
    /// target table; for a coded index it must be a member of the
    /// column's map.
    pub fn set_token(&mut self, cursor: Cursor, col: u8, token: Token) -> Result<(), Error> {
        self.mark_edited();
        let column = self.cursor_column(cursor, col)?;

        let raw = match column.kind {
            ColumnKind::Table(target) => {
                if token.table() != Some(target) {
                    return Err(ErrorKind::TokenTableMismatch(token.raw()).into());
                }
                token.rid()
            }
            ColumnKind::Coded(map) => map
                .compose(token)
                .ok_or(ErrorKind::TokenTableMismatch(token.raw()))?,
            _ => return Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into()),
        };

        // When editing a Portable PDB image, referencing a type-system
        // row keeps the #Pdb stream's referenced-row-count array current.
        // This may widen columns; the write below re-reads the layout.
        if !self.pdb.is_empty() {
            if let Some(table) = token.table() {
                if table.is_type_system() && token.rid() != 0 {
                    self.update_pdb_referenced_rows(table, token.rid())?;
                }
            }
        }

        self.write_column_checked(cursor, col, raw)
    }

    /// Writes a direct or coded table-index column from a cursor.
    pub fn set_target(&mut self, cursor: Cursor, col: u8, target: Cursor) -> Result<(), Error> {
        self.set_token(cursor, col, target.token())
    }

    /// Writes a `#Strings` column, appending the string to the heap.
    pub fn set_utf8(&mut self, cursor: Cursor, col: u8, value: &str) -> Result<(), Error> {
        self.mark_edited();
        let column = self.cursor_column(cursor, col)?;
        if column.kind != ColumnKind::Heap(HeapKind::Strings) {
            return Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into());
        }
        let offset = self.add_string(value)?;
        self.write_column_checked(cursor, col, offset)
    }

    /// Writes a `#Blob` column, appending the blob to the heap.
    pub fn set_blob(&mut self, cursor: Cursor, col: u8, value: &[u8]) -> Result<(), Error> {
        self.mark_edited();
        let column = self.cursor_column(cursor, col)?;
        if column.kind != ColumnKind::Heap(HeapKind::Blob) {
            return Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into());
        }
        let offset = self.add_blob(value)?;
        self.write_column_checked(cursor, col, offset)
    }

    /// Writes a `#GUID` column, appending the GUID to the heap.
    pub fn set_guid(&mut self, cursor: Cursor, col: u8, value: Uuid) -> Result<(), Error> {
        self.mark_edited();
        let column = self.cursor_column(cursor, col)?;
        if column.kind != ColumnKind::Heap(HeapKind::Guid) {
            return Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into());
        }
        let index = self.add_guid(value)?;
        self.write_column_checked(cursor, col, index)
    }

    /// Writes a `#US` column, appending the string to the heap.
    pub fn set_user_string(&mut self, cursor: Cursor, col: u8, value: &str) -> Result<(), Error> {
        self.mark_edited();
        let column = self.cursor_column(cursor, col)?;
        if column.kind != ColumnKind::Heap(HeapKind::UserString) {
            return Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into());
        }
        let offset = self.add_user_string(value)?;
        self.write_column_checked(cursor, col, offset)
    }

    /// Writes a heap-index column as a raw, already-valid heap offset.
    pub(crate) fn set_heap_offset(&mut self, cursor: Cursor, col: u8, offset: u32) -> Result<(), Error> {
        self.mark_edited();
        let column = self.cursor_column(cursor, col)?;
        match column.kind {
            ColumnKind::Heap(_) => self.write_column_checked(cursor, col, offset),
            _ => Err(ErrorKind::ColumnKindMismatch(cursor.table, col).into()),
        }
    }

    /// Makes room for `extra` bytes at the end of a heap, seeding a fresh
    /// heap with its leading zero entry unless `preserve_offsets` is set
    /// (delta merges must reproduce the source heap byte for byte).
    ///
    /// Returns the offset at which the caller may append. Any resulting
    /// column-width promotion is applied before the growth is visible.
    fn reserve_heap(
        &mut self,
        kind: HeapKind,
        extra: usize,
        preserve_offsets: bool,
    ) -> Result<u32, Error> {
        self.mark_edited();

        if self.heap(kind).is_empty() && !preserve_offsets && kind != HeapKind::Guid {
            // The first entry of the string heap is the empty string and
            // the first entry of the blob-shaped heaps is the empty blob
            // - II.24.2.3, II.24.2.4.
            self.heap_mut(kind).push(0);
        }

        let offset = self.heap(kind).len();
        let new_len = offset
            .checked_add(extra)
            .filter(|len| *len <= u32::MAX as usize)
            .ok_or(ErrorKind::HeapTooLarge)?;

        // Mirror the large-heap flag and let every referencing column
        // re-establish its width before the size changes.
        let units = if kind == HeapKind::Guid {
            new_len / 16
        } else {
            new_len
        };
        match kind {
            HeapKind::Strings => self.large_strings = units > u16::MAX as usize,
            HeapKind::Guid => self.large_guid = units > u16::MAX as usize,
            HeapKind::Blob => self.large_blob = units > u16::MAX as usize,
            HeapKind::UserString => {}
        }
        self.refresh_column_widths(None)?;

        Ok(offset as u32)
    }

    /// Appends a string to the `#Strings` heap, returning its offset.
    ///
    /// The empty string is the canonical entry at offset 0 and never
    /// allocates. Equal inputs are not deduplicated; callers must not
    /// rely on offset equality.
    pub fn add_string(&mut self, value: &str) -> Result<u32, Error> {
        if value.is_empty() {
            return Ok(0);
        }
        let bytes = value.as_bytes();
        let offset = self.reserve_heap(HeapKind::Strings, bytes.len() + 1, false)?;
        let heap = self.heap_mut(HeapKind::Strings);
        heap.extend_from_slice(bytes);
        heap.push(0);
        Ok(offset)
    }

    /// Appends a blob to the `#Blob` heap, returning its offset.
    ///
    /// The empty blob maps to offset 0 without allocating.
    pub fn add_blob(&mut self, value: &[u8]) -> Result<u32, Error> {
        if value.is_empty() {
            return Ok(0);
        }
        let mut scratch = [0u8; 4];
        let length = u32::try_from(value.len()).map_err(|_| ErrorKind::HeapTooLarge)?;
        let prefix = encode_unsigned(length, &mut scratch)?.to_vec();

        let offset = self.reserve_heap(HeapKind::Blob, prefix.len() + value.len(), false)?;
        let heap = self.heap_mut(HeapKind::Blob);
        heap.extend_from_slice(&prefix);
        heap.extend_from_slice(value);
        Ok(offset)
    }

    /// Appends a GUID to the `#GUID` heap, returning its 1-based record
    /// index.
    ///
    /// The nil GUID maps to index 0 without allocating.
    pub fn add_guid(&mut self, value: Uuid) -> Result<u32, Error> {
        if value.is_nil() {
            return Ok(0);
        }
        let offset = self.reserve_heap(HeapKind::Guid, 16, false)?;
        self.heap_mut(HeapKind::Guid)
            .extend_from_slice(&value.to_bytes_le());
        // The GUID heap is an array of 16-byte records numbered from 1 -
        // II.22.
        Ok(offset / 16 + 1)
    }

    /// Appends a string to the `#US` heap, returning its offset.
    ///
    /// The payload is UTF-16 with a trailing byte holding 1 if and only
    /// if any character has a bit set in its top byte or a low byte in
    /// 0x01-0x08, 0x0E-0x1F, 0x27, 0x2D or 0x7F - II.24.2.4. The empty
    /// string maps to offset 0 without allocating.
    pub fn add_user_string(&mut self, value: &str) -> Result<u32, Error> {
        let units: Vec<u16> = value.encode_utf16().collect();
        if units.is_empty() {
            return Ok(0);
        }

        let mut special = 0u8;
        for unit in &units {
            if unit & 0xff00 != 0
                || matches!(unit & 0xff, 0x01..=0x08 | 0x0e..=0x1f | 0x27 | 0x2d | 0x7f)
            {
                special = 1;
            }
        }

        // The count is in bytes, plus the terminal byte, so it is odd.
        let byte_count = units.len() * 2 + 1;
        let length = u32::try_from(byte_count).map_err(|_| ErrorKind::HeapTooLarge)?;
        let mut scratch = [0u8; 4];
        let prefix = encode_unsigned(length, &mut scratch)?.to_vec();

        let offset = self.reserve_heap(HeapKind::UserString, prefix.len() + byte_count, false)?;
        let heap = self.heap_mut(HeapKind::UserString);
        heap.extend_from_slice(&prefix);
        for unit in &units {
            heap.extend_from_slice(&unit.to_le_bytes());
        }
        heap.push(special);
        Ok(offset)
    }

    /// Appends the contents of a delta heap during a merge, preserving
    /// the source offsets.
    pub(crate) fn append_delta_heap(&mut self, kind: HeapKind, data: &[u8]) -> Result<(), Error> {
        if data.is_empty() {
            return Ok(());
        }
        let offset = self.reserve_heap(kind, data.len(), true)?;
        debug_assert_eq!(offset as usize, self.heap(kind).len());
        self.heap_mut(kind).extend_from_slice(data);
        Ok(())
    }

    /// Records that a type-system row is referenced from this Portable
    /// PDB image, growing the `#Pdb` stream's referenced-row-count array
    /// and re-establishing the width of every column that indexes the
    /// table.
    fn update_pdb_referenced_rows(&mut self, target: TableId, rid: u32) -> Result<(), Error> {
        let mut info = match self.pdb_info()? {
            Some(info) => info,
            None => return Ok(()),
        };

        if info.rows[target.index()] >= rid {
            return Ok(());
        }

        info.rows[target.index()] = rid.max(self.table(target).row_count);
        info.referenced_tables |= 1 << target.index();
        self.pdb = Cow::Owned(info.to_bytes());

        self.refresh_column_widths(None)
    }

    /// Rewrites the list owned by `list_owner` so the children appear in
    /// ascending order of their `sort_col` values.
    ///
    /// An already-ordered list is left untouched; otherwise the list is
    /// backed by an indirection table (synthesising it if needed) and the
    /// indirection rows are rewritten in key order.
    pub fn sort_list_by_column(
        &mut self,
        list_owner: Cursor,
        list_col: u8,
        sort_col: u8,
    ) -> Result<(), Error> {
        let (mut range, count) = self.get_range(list_owner, list_col)?;
        // A one element range is always sorted.
        if count <= 1 {
            return Ok(());
        }

        let mut entries: Vec<(Cursor, u32)> = Vec::with_capacity(count as usize);
        for i in 0..count {
            let item = Cursor::new(range.table, range.row + i);
            let target = self.resolve_indirect_cursor(item)?;
            let key = self.get_constant(target, sort_col)?;
            entries.push((target, key));
        }

        if entries.windows(2).all(|pair| pair[0].1 <= pair[1].1) {
            return Ok(());
        }

        self.mark_edited();
        entries.sort_by_key(|entry| entry.1);

        if !range.table.is_indirection() {
            let direct = range.table;
            let indirect = direct.indirection_table().ok_or(ErrorKind::NotSupported)?;
            self.create_and_fill_indirection_table(direct, indirect)?;
            self.retarget_list_column(list_owner.table, list_col, indirect);
            range = Cursor::new(indirect, range.row);
        }

        for (i, (target, _)) in entries.iter().enumerate() {
            self.set_target(Cursor::new(range.table, range.row + i as u32), 0, *target)?;
        }
        Ok(())
    }
}
