//! Structural edits: insertion, list maintenance, indirection synthesis,
//! width promotion and sort preservation.

use clrmeta::{cols, ErrorKind, Metadata, TableId, Token};

mod common;

/// Appends `count` TypeDef rows (on top of the global type row) and
/// returns their cursors.
fn append_type_defs(metadata: &mut Metadata<'_>, count: u32) -> Vec<clrmeta::Cursor> {
    let mut rows = Vec::new();
    for i in 0..count {
        let row = metadata.append_row(TableId::TypeDef).unwrap();
        metadata
            .set_utf8(row, cols::type_def::TYPE_NAME, &format!("Type{i}"))
            .unwrap();
        metadata.commit_row_add(row);
        rows.push(row);
    }
    rows
}

#[test]
fn test_append_to_list_target_table_is_rejected() {
    let mut metadata = Metadata::new().unwrap();
    for id in [
        TableId::Field,
        TableId::MethodDef,
        TableId::Param,
        TableId::Event,
        TableId::Property,
    ] {
        assert!(matches!(
            metadata.append_row(id).unwrap_err().kind(),
            ErrorKind::NotSupported
        ));
    }
}

#[test]
fn test_add_rows_to_list_and_inverse_lookup() {
    let mut metadata = Metadata::new().unwrap();
    let types = append_type_defs(&mut metadata, 2);
    let t2 = types[0];
    let t3 = types[1];

    // Grow the middle parent's list to three fields.
    for i in 0..3u32 {
        let field = metadata
            .add_new_row_to_list(t2, cols::type_def::FIELD_LIST)
            .unwrap();
        metadata
            .set_utf8(field, cols::field::NAME, &format!("field{i}"))
            .unwrap();
        metadata
            .set_constant(field, cols::field::FLAGS, i)
            .unwrap();
        metadata.commit_row_add(field);
    }

    assert_eq!(metadata.row_count(TableId::Field), 3);

    let (range, count) = metadata.get_range(t2, cols::type_def::FIELD_LIST).unwrap();
    assert_eq!(range.table(), TableId::Field);
    assert_eq!(count, 3);

    // Other parents still own empty ranges.
    let (_, count) = metadata.get_range(t3, cols::type_def::FIELD_LIST).unwrap();
    assert_eq!(count, 0);
    let (global, _) = metadata.table_cursor(TableId::TypeDef).unwrap();
    let (_, count) = metadata
        .get_range(global, cols::type_def::FIELD_LIST)
        .unwrap();
    assert_eq!(count, 0);

    // Every field maps back to its owning TypeDef.
    for row in 1..=3u32 {
        let field = metadata.token_to_cursor(Token::new(TableId::Field, row)).unwrap();
        let owner = metadata.find_cursor_of_range_element(field).unwrap();
        assert_eq!(owner, t2);
        assert_eq!(metadata.find_token_of_range_element(field).unwrap(), t2.token());
    }
}

#[test]
fn test_mid_list_insertion_synthesises_indirection_table() {
    let mut metadata = Metadata::new().unwrap();
    let types = append_type_defs(&mut metadata, 2);
    let t2 = types[0];

    for i in 0..3u32 {
        let field = metadata
            .add_new_row_to_list(t2, cols::type_def::FIELD_LIST)
            .unwrap();
        metadata.set_constant(field, cols::field::FLAGS, i).unwrap();
        metadata.commit_row_add(field);
    }
    assert_eq!(metadata.row_count(TableId::FieldPtr), 0);

    // The global type's empty list sits before t2's range; adding to it
    // is a mid-table insertion into Field, which must go through a fresh
    // FieldPtr table.
    let (global, _) = metadata.table_cursor(TableId::TypeDef).unwrap();
    let new_field = metadata
        .add_new_row_to_list(global, cols::type_def::FIELD_LIST)
        .unwrap();
    metadata
        .set_constant(new_field, cols::field::FLAGS, 99)
        .unwrap();
    metadata.commit_row_add(new_field);

    // The new field went to the end of the direct table; the indirection
    // table mirrors the logical order.
    assert_eq!(new_field.table(), TableId::Field);
    assert_eq!(new_field.row(), 4);
    assert_eq!(metadata.row_count(TableId::FieldPtr), metadata.row_count(TableId::Field));

    // Ranges now resolve through FieldPtr.
    let (range, count) = metadata
        .get_range(global, cols::type_def::FIELD_LIST)
        .unwrap();
    assert_eq!(range.table(), TableId::FieldPtr);
    assert_eq!(count, 1);
    let resolved = metadata.resolve_indirect_cursor(range).unwrap();
    assert_eq!(resolved, new_field);
    assert_eq!(metadata.get_constant(resolved, cols::field::FLAGS).unwrap(), 99);

    // t2 still owns its original three fields, in order.
    let (range, count) = metadata.get_range(t2, cols::type_def::FIELD_LIST).unwrap();
    assert_eq!(range.table(), TableId::FieldPtr);
    assert_eq!(count, 3);
    for i in 0..3 {
        let item = metadata.cursor_move(range, i as i32).unwrap();
        let field = metadata.resolve_indirect_cursor(item).unwrap();
        assert_eq!(metadata.get_constant(field, cols::field::FLAGS).unwrap(), i);
    }

    // The uncompressed stream survives a round trip.
    let buf = metadata.write_to_vec().unwrap();
    let reparsed = Metadata::parse(&buf).unwrap();
    assert_eq!(reparsed.row_count(TableId::FieldPtr), 4);
    let (global, _) = reparsed.table_cursor(TableId::TypeDef).unwrap();
    let (range, count) = reparsed
        .get_range(global, cols::type_def::FIELD_LIST)
        .unwrap();
    assert_eq!(count, 1);
    let resolved = reparsed.resolve_indirect_cursor(range).unwrap();
    assert_eq!(reparsed.get_constant(resolved, cols::field::FLAGS).unwrap(), 99);
}

#[test]
fn test_sorted_insertion_keeps_table_sorted() {
    let mut metadata = Metadata::new().unwrap();

    // Constant is keyed on Parent; freshly created tables with keys start
    // out sorted.
    let first = metadata.append_row(TableId::Constant).unwrap();
    metadata
        .set_token(first, cols::constant::PARENT, Token::new(TableId::Field, 1))
        .unwrap();
    metadata.commit_row_add(first);

    let third = metadata.append_row(TableId::Constant).unwrap();
    metadata
        .set_token(third, cols::constant::PARENT, Token::new(TableId::Field, 3))
        .unwrap();
    metadata.commit_row_add(third);

    assert!(metadata.is_sorted(TableId::Constant));

    // Insert Parent = 2 between 1 and 3.
    let middle = metadata.insert_row_before(third).unwrap();
    metadata
        .set_token(middle, cols::constant::PARENT, Token::new(TableId::Field, 2))
        .unwrap();
    metadata.commit_row_add(middle);

    assert!(metadata.is_sorted(TableId::Constant));

    // An out-of-order key clears the bit at commit.
    let last = metadata.append_row(TableId::Constant).unwrap();
    metadata
        .set_token(last, cols::constant::PARENT, Token::new(TableId::Field, 1))
        .unwrap();
    metadata.commit_row_add(last);
    assert!(!metadata.is_sorted(TableId::Constant));
}

#[test]
fn test_key_write_outside_row_add_clears_sorted_bit() {
    let mut metadata = Metadata::new().unwrap();

    for parent in [1u32, 2, 3] {
        let row = metadata.append_row(TableId::Constant).unwrap();
        metadata
            .set_token(row, cols::constant::PARENT, Token::new(TableId::Field, parent))
            .unwrap();
        metadata.commit_row_add(row);
    }
    assert!(metadata.is_sorted(TableId::Constant));

    // Rewriting the middle row's key out of order drops the bit.
    let middle = metadata
        .token_to_cursor(Token::new(TableId::Constant, 2))
        .unwrap();
    metadata
        .set_token(middle, cols::constant::PARENT, Token::new(TableId::Field, 9))
        .unwrap();
    assert!(!metadata.is_sorted(TableId::Constant));
}

#[test]
fn test_add_new_row_to_sorted_list_orders_params() {
    let mut metadata = Metadata::new().unwrap();

    let (global, _) = metadata.table_cursor(TableId::TypeDef).unwrap();
    let method = metadata
        .add_new_row_to_list(global, cols::type_def::METHOD_LIST)
        .unwrap();
    metadata
        .set_utf8(method, cols::method_def::NAME, "M")
        .unwrap();
    metadata.commit_row_add(method);

    // Insert sequence numbers out of order; the list keeps them sorted.
    for sequence in [2u32, 1, 3] {
        let param = metadata
            .add_new_row_to_sorted_list(
                method,
                cols::method_def::PARAM_LIST,
                cols::param::SEQUENCE,
                sequence,
            )
            .unwrap();
        metadata.commit_row_add(param);
    }

    let (range, count) = metadata
        .get_range(method, cols::method_def::PARAM_LIST)
        .unwrap();
    assert_eq!(count, 3);

    let mut sequences = Vec::new();
    for i in 0..count {
        let item = metadata.cursor_move(range, i as i32).unwrap();
        let param = metadata.resolve_indirect_cursor(item).unwrap();
        sequences.push(metadata.get_constant(param, cols::param::SEQUENCE).unwrap());
    }
    assert_eq!(sequences, [1, 2, 3]);
}

#[test]
fn test_sort_list_by_column() {
    let mut metadata = Metadata::new().unwrap();

    let (global, _) = metadata.table_cursor(TableId::TypeDef).unwrap();
    let method = metadata
        .add_new_row_to_list(global, cols::type_def::METHOD_LIST)
        .unwrap();
    metadata.commit_row_add(method);

    for sequence in [3u32, 1, 2] {
        let param = metadata
            .add_new_row_to_list(method, cols::method_def::PARAM_LIST)
            .unwrap();
        metadata
            .set_constant(param, cols::param::SEQUENCE, sequence)
            .unwrap();
        metadata.commit_row_add(param);
    }

    metadata
        .sort_list_by_column(method, cols::method_def::PARAM_LIST, cols::param::SEQUENCE)
        .unwrap();

    // Sorting synthesised ParamPtr; the tokens of the Param rows did not
    // move.
    assert_eq!(metadata.row_count(TableId::ParamPtr), 3);
    let (range, count) = metadata
        .get_range(method, cols::method_def::PARAM_LIST)
        .unwrap();
    let mut sequences = Vec::new();
    for i in 0..count {
        let item = metadata.cursor_move(range, i as i32).unwrap();
        let param = metadata.resolve_indirect_cursor(item).unwrap();
        sequences.push(metadata.get_constant(param, cols::param::SEQUENCE).unwrap());
    }
    assert_eq!(sequences, [1, 2, 3]);
}

#[test]
fn test_type_def_growth_widens_references() {
    // 65535 zeroed TypeDef rows: Flags(4) + Name(2) + Namespace(2) +
    // Extends(4, TypeDefOrRef is wide past 2^14 rows) + two lists(2+2).
    // One NestedClass row referencing TypeDef twice with narrow indices.
    let spec = common::ImageSpec {
        tables: vec![
            (TableId::TypeDef as u8, 0xffff, false, vec![0u8; 0xffff * 16]),
            (TableId::NestedClass as u8, 1, true, vec![0u8; 4]),
        ],
        ..Default::default()
    };
    let buf = common::build_image(&spec);

    let mut metadata = Metadata::parse(&buf).unwrap();
    assert_eq!(metadata.row_count(TableId::TypeDef), 0xffff);

    // Crossing 2^16 rows forces every direct TypeDef index to 4 bytes.
    let row = metadata.append_row(TableId::TypeDef).unwrap();
    metadata.commit_row_add(row);
    assert_eq!(metadata.row_count(TableId::TypeDef), 0x10000);

    let nested = metadata
        .token_to_cursor(Token::new(TableId::NestedClass, 1))
        .unwrap();
    metadata
        .set_token(
            nested,
            cols::nested_class::ENCLOSING_CLASS,
            Token::new(TableId::TypeDef, 0x10000),
        )
        .unwrap();

    let buf = metadata.write_to_vec().unwrap();
    let reparsed = Metadata::parse(&buf).unwrap();
    assert_eq!(reparsed.row_count(TableId::TypeDef), 0x10000);

    let nested = reparsed
        .token_to_cursor(Token::new(TableId::NestedClass, 1))
        .unwrap();
    assert_eq!(
        reparsed
            .get_token(nested, cols::nested_class::ENCLOSING_CLASS)
            .unwrap(),
        Token::new(TableId::TypeDef, 0x10000)
    );
}

#[test]
fn test_string_heap_growth_flips_large_flag() {
    let mut metadata = Metadata::new().unwrap();
    let (global, _) = metadata.table_cursor(TableId::TypeDef).unwrap();

    // Push the heap past 2^16 bytes, then reference an offset beyond it.
    let big = "x".repeat(0x11000);
    metadata
        .set_utf8(global, cols::type_def::TYPE_NAMESPACE, &big)
        .unwrap();
    metadata
        .set_utf8(global, cols::type_def::TYPE_NAME, "AfterTheBoundary")
        .unwrap();

    let buf = metadata.write_to_vec().unwrap();
    let reparsed = Metadata::parse(&buf).unwrap();
    let (global, _) = reparsed.table_cursor(TableId::TypeDef).unwrap();
    assert_eq!(
        reparsed.get_utf8(global, cols::type_def::TYPE_NAME).unwrap(),
        "AfterTheBoundary"
    );
    assert_eq!(
        reparsed
            .get_utf8(global, cols::type_def::TYPE_NAMESPACE)
            .unwrap(),
        big
    );
}

#[test]
fn test_insert_boundaries() {
    let mut metadata = Metadata::new().unwrap();

    // Insert at row 1 of a fresh table.
    let first = metadata.append_row(TableId::TypeRef).unwrap();
    metadata.set_utf8(first, cols::type_ref::TYPE_NAME, "B").unwrap();
    metadata.commit_row_add(first);

    let before = metadata.insert_row_before(first).unwrap();
    assert_eq!(before.row(), 1);
    metadata.set_utf8(before, cols::type_ref::TYPE_NAME, "A").unwrap();
    metadata.commit_row_add(before);

    // Insert after the last row.
    let last = metadata
        .token_to_cursor(Token::new(TableId::TypeRef, 2))
        .unwrap();
    let after = metadata.insert_row_after(last).unwrap();
    assert_eq!(after.row(), 3);
    metadata.set_utf8(after, cols::type_ref::TYPE_NAME, "C").unwrap();
    metadata.commit_row_add(after);

    // Mid-table insert.
    let mid = metadata
        .insert_row_after(metadata.token_to_cursor(Token::new(TableId::TypeRef, 1)).unwrap())
        .unwrap();
    metadata.set_utf8(mid, cols::type_ref::TYPE_NAME, "AB").unwrap();
    metadata.commit_row_add(mid);

    let names: Vec<String> = (1..=4)
        .map(|row| {
            let c = metadata
                .token_to_cursor(Token::new(TableId::TypeRef, row))
                .unwrap();
            metadata.get_utf8(c, cols::type_ref::TYPE_NAME).unwrap().to_owned()
        })
        .collect();
    assert_eq!(names, ["A", "AB", "B", "C"]);
}

#[test]
fn test_concurrent_row_add_on_same_table_fails() {
    let mut metadata = Metadata::new().unwrap();
    let open = metadata.append_row(TableId::TypeRef).unwrap();

    assert!(matches!(
        metadata.append_row(TableId::TypeRef).unwrap_err().kind(),
        ErrorKind::RowAddInProgress(TableId::TypeRef)
    ));

    // Serialising with an open row add fails as well.
    assert!(matches!(
        metadata.write_to_vec().unwrap_err().kind(),
        ErrorKind::RowAddInProgress(TableId::TypeRef)
    ));

    metadata.commit_row_add(open);
    let next = metadata.append_row(TableId::TypeRef).unwrap();
    metadata.commit_row_add(next);
    assert_eq!(metadata.row_count(TableId::TypeRef), 2);
}

#[test]
fn test_column_kind_mismatch_is_rejected() {
    let mut metadata = Metadata::new().unwrap();
    let (module, _) = metadata.table_cursor(TableId::Module).unwrap();

    assert!(matches!(
        metadata.get_constant(module, cols::module::NAME).unwrap_err().kind(),
        ErrorKind::ColumnKindMismatch(TableId::Module, 1)
    ));
    assert!(matches!(
        metadata.get_blob(module, cols::module::MVID).unwrap_err().kind(),
        ErrorKind::ColumnKindMismatch(..)
    ));
    assert!(metadata.get_token(module, cols::module::GENERATION).is_err());

    // A token aimed at the wrong table is rejected by direct columns.
    let (global, _) = metadata.table_cursor(TableId::TypeDef).unwrap();
    assert!(matches!(
        metadata
            .set_token(
                global,
                cols::type_def::FIELD_LIST,
                Token::new(TableId::MethodDef, 1)
            )
            .unwrap_err()
            .kind(),
        ErrorKind::TokenTableMismatch(..)
    ));
}
