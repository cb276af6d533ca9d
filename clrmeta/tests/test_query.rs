//! Range resolution and key lookup.

use clrmeta::{cols, ErrorKind, Metadata, TableId, Token};

fn image_with_parents_and_fields() -> Metadata<'static> {
    let mut metadata = Metadata::new().unwrap();

    // Three more parents on top of the global type.
    for _ in 0..3 {
        let row = metadata.append_row(TableId::TypeDef).unwrap();
        metadata.commit_row_add(row);
    }

    // Ten fields, all appended through the last parent's list.
    let last = metadata
        .token_to_cursor(Token::new(TableId::TypeDef, 4))
        .unwrap();
    for _ in 0..10 {
        let field = metadata
            .add_new_row_to_list(last, cols::type_def::FIELD_LIST)
            .unwrap();
        metadata.commit_row_add(field);
    }

    metadata
}

#[test]
fn test_range_walk_with_nil_runs() {
    let mut metadata = image_with_parents_and_fields();

    // Rewrite the list column to [3, nil, nil, 7].
    let parents: Vec<_> = (1..=4)
        .map(|row| {
            metadata
                .token_to_cursor(Token::new(TableId::TypeDef, row))
                .unwrap()
        })
        .collect();
    for (parent, first) in parents.iter().zip([3u32, 0, 0, 7]) {
        metadata
            .set_token(*parent, cols::type_def::FIELD_LIST, Token::new(TableId::Field, first))
            .unwrap();
    }

    // The first parent's run extends to the next parent with a non-nil
    // value, skipping the nil run.
    let (range, count) = metadata
        .get_range(parents[0], cols::type_def::FIELD_LIST)
        .unwrap();
    assert_eq!(range.row(), 3);
    assert_eq!(count, 4);

    // A nil parent owns nothing.
    for parent in &parents[1..3] {
        let (range, count) = metadata
            .get_range(*parent, cols::type_def::FIELD_LIST)
            .unwrap();
        assert!(range.is_null());
        assert_eq!(count, 0);
    }

    // The last parent takes the remaining rows.
    let (range, count) = metadata
        .get_range(parents[3], cols::type_def::FIELD_LIST)
        .unwrap();
    assert_eq!(range.row(), 7);
    assert_eq!(count, 4);

    // With only nils behind it, the first run extends to the end of the
    // child table.
    metadata
        .set_token(parents[3], cols::type_def::FIELD_LIST, Token::nil(TableId::Field))
        .unwrap();
    let (range, count) = metadata
        .get_range(parents[0], cols::type_def::FIELD_LIST)
        .unwrap();
    assert_eq!(range.row(), 3);
    assert_eq!(count, 8);
}

#[test]
fn test_range_and_inverse_agree() {
    let mut metadata = Metadata::new().unwrap();
    for _ in 0..2 {
        let row = metadata.append_row(TableId::TypeDef).unwrap();
        metadata.commit_row_add(row);
    }

    let owner = metadata
        .token_to_cursor(Token::new(TableId::TypeDef, 2))
        .unwrap();
    for _ in 0..3 {
        let field = metadata
            .add_new_row_to_list(owner, cols::type_def::FIELD_LIST)
            .unwrap();
        metadata.commit_row_add(field);
    }

    let (range, count) = metadata
        .get_range(owner, cols::type_def::FIELD_LIST)
        .unwrap();
    for i in 0..count {
        let element = metadata.cursor_move(range, i as i32).unwrap();
        assert_eq!(
            metadata.find_token_of_range_element(element).unwrap(),
            owner.token()
        );
        assert_eq!(metadata.find_cursor_of_range_element(element).unwrap(), owner);
    }
}

#[test]
fn test_find_row_linear_and_from_offset() {
    let mut metadata = Metadata::new().unwrap();

    // ENCLog is unsorted, so lookup walks linearly.
    for token in [5u32, 9, 5] {
        let row = metadata.append_row(TableId::EncLog).unwrap();
        metadata.set_constant(row, cols::enc_log::TOKEN, token).unwrap();
        metadata.commit_row_add(row);
    }

    let (begin, _) = metadata.table_cursor(TableId::EncLog).unwrap();
    let found = metadata
        .find_row_from(begin, cols::enc_log::TOKEN, 9)
        .unwrap()
        .unwrap();
    assert_eq!(found.row(), 2);

    // Starting past the first match finds the later one.
    let second = metadata.cursor_next(begin).unwrap();
    let found = metadata
        .find_row_from(second, cols::enc_log::TOKEN, 5)
        .unwrap()
        .unwrap();
    assert_eq!(found.row(), 3);

    assert!(metadata
        .find_row_from(begin, cols::enc_log::TOKEN, 42)
        .unwrap()
        .is_none());
}

#[test]
fn test_find_range_on_sorted_table() {
    let mut metadata = Metadata::new().unwrap();

    // Constant sorted by Parent, with a run of equal keys in the middle.
    for parent in [1u32, 2, 2, 3] {
        let row = metadata.append_row(TableId::Constant).unwrap();
        metadata
            .set_token(row, cols::constant::PARENT, Token::new(TableId::Field, parent))
            .unwrap();
        metadata.commit_row_add(row);
    }
    assert!(metadata.is_sorted(TableId::Constant));

    let (begin, _) = metadata.table_cursor(TableId::Constant).unwrap();

    // Coded-index lookups take the plain token; it is composed into its
    // coded form for the comparison.
    let key = Token::new(TableId::Field, 2).raw();
    let (start, count) = metadata
        .find_range_from(begin, cols::constant::PARENT, key)
        .unwrap()
        .unwrap();
    assert_eq!(start.row(), 2);
    assert_eq!(count, 2);

    let missing = Token::new(TableId::Field, 7).raw();
    assert!(metadata
        .find_range_from(begin, cols::constant::PARENT, missing)
        .unwrap()
        .is_none());

    // find_row on the sorted table goes through binary search and lands
    // inside the run.
    let found = metadata
        .find_row_from(begin, cols::constant::PARENT, key)
        .unwrap()
        .unwrap();
    assert!(found.row() == 2 || found.row() == 3);
}

#[test]
fn test_find_range_requires_sorted_table() {
    let mut metadata = Metadata::new().unwrap();

    for parent in [2u32, 1] {
        let row = metadata.append_row(TableId::Constant).unwrap();
        metadata
            .set_token(row, cols::constant::PARENT, Token::new(TableId::Field, parent))
            .unwrap();
        metadata.commit_row_add(row);
    }
    assert!(!metadata.is_sorted(TableId::Constant));

    let (begin, _) = metadata.table_cursor(TableId::Constant).unwrap();
    assert!(matches!(
        metadata
            .find_range_from(begin, cols::constant::PARENT, Token::new(TableId::Field, 1).raw())
            .unwrap_err()
            .kind(),
        ErrorKind::NotSupported
    ));
}

#[test]
fn test_event_property_inverse_goes_through_map_parent() {
    let mut metadata = Metadata::new().unwrap();

    // Two EventMap rows pointing at the two TypeDef parents.
    let t2 = metadata.append_row(TableId::TypeDef).unwrap();
    metadata.commit_row_add(t2);

    let (global, _) = metadata.table_cursor(TableId::TypeDef).unwrap();
    for owner in [global, t2] {
        let map_row = metadata.append_row(TableId::EventMap).unwrap();
        metadata
            .set_target(map_row, cols::event_map::PARENT, owner)
            .unwrap();
        metadata.commit_row_add(map_row);
    }

    // Give the second map entry one event.
    let map2 = metadata
        .token_to_cursor(Token::new(TableId::EventMap, 2))
        .unwrap();
    let event = metadata
        .add_new_row_to_list(map2, cols::event_map::EVENT_LIST)
        .unwrap();
    metadata.commit_row_add(event);

    // The inverse lookup reports the owning TypeDef, not the map row.
    let owner = metadata.find_cursor_of_range_element(event).unwrap();
    assert_eq!(owner, t2);
}
