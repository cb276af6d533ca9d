//! The Portable PDB blob decoders.

#![cfg(feature = "ppdb")]

use clrmeta::{cols, ConstantKind, Import, Metadata, TableId, Token};

#[test]
fn test_document_name_with_separator() {
    let mut metadata = Metadata::new().unwrap();
    let users = metadata.add_blob(b"Users").unwrap();
    let src = metadata.add_blob(b"src").unwrap();
    let main = metadata.add_blob(b"main.cs").unwrap();
    assert!(users < 128 && src < 128 && main < 128);

    let blob = vec![b'/', users as u8, src as u8, main as u8];
    assert_eq!(
        metadata.parse_document_name(&blob).unwrap(),
        "Users/src/main.cs"
    );

    // A part offset of 0 is the empty segment, which roots the path.
    let blob = vec![b'/', 0, users as u8];
    assert_eq!(metadata.parse_document_name(&blob).unwrap(), "/Users");

    // A zero separator byte joins the parts without a separator.
    let blob = vec![0, users as u8, src as u8];
    assert_eq!(metadata.parse_document_name(&blob).unwrap(), "Userssrc");

    // Non-ASCII separators are not supported.
    assert!(metadata.parse_document_name(&[0x80, users as u8]).is_err());
}

#[test]
fn test_sequence_points_decoding() {
    let mut metadata = Metadata::new_portable_pdb().unwrap();

    let mdi = metadata.append_row(TableId::MethodDebugInformation).unwrap();
    metadata
        .set_token(
            mdi,
            cols::method_debug_information::DOCUMENT,
            Token::new(TableId::Document, 1),
        )
        .unwrap();

    let blob = [
        0x00, // LocalSignature
        // Point: IL 0, lines 10..11, columns 2..7.
        0x00, 0x01, 0x0A, 0x0A, 0x02,
        // Hidden point at IL 5.
        0x05, 0x00, 0x00,
        // Switch to document 2.
        0x00, 0x02,
        // Point: IL 6, start moves +2 lines and +1 column.
        0x01, 0x01, 0x02, 0x04, 0x02,
    ];
    metadata
        .set_blob(mdi, cols::method_debug_information::SEQUENCE_POINTS, &blob)
        .unwrap();
    metadata.commit_row_add(mdi);

    let decoded = metadata.parse_sequence_points(mdi).unwrap();
    assert_eq!(decoded.local_signature, 0);
    assert_eq!(decoded.points.len(), 3);

    let first = decoded.points[0];
    assert_eq!(first.il_offset, 0);
    assert_eq!(
        (first.start_line, first.start_column, first.end_line, first.end_column),
        (10, 2, 11, 7)
    );
    assert_eq!(first.document, 1);
    assert!(!first.is_hidden());

    let hidden = decoded.points[1];
    assert!(hidden.is_hidden());
    assert_eq!(hidden.il_offset, 5);
    assert_eq!(hidden.document, 1);

    let last = decoded.points[2];
    assert_eq!(last.il_offset, 6);
    assert_eq!(
        (last.start_line, last.start_column, last.end_line, last.end_column),
        (12, 3, 13, 4)
    );
    assert_eq!(last.document, 2);
}

#[test]
fn test_sequence_points_empty_blob() {
    let mut metadata = Metadata::new_portable_pdb().unwrap();
    let mdi = metadata.append_row(TableId::MethodDebugInformation).unwrap();
    metadata.commit_row_add(mdi);

    let decoded = metadata.parse_sequence_points(mdi).unwrap();
    assert!(decoded.points.is_empty());
}

#[test]
fn test_local_constant_sig_decoding() {
    let metadata = Metadata::new_portable_pdb().unwrap();

    // A plain I4 constant.
    let sig = metadata.parse_local_constant_sig(&[0x08, 1, 0, 0, 0]).unwrap();
    assert!(sig.custom_modifiers.is_empty());
    assert!(matches!(sig.kind, ConstantKind::Primitive { type_code: 0x08 }));
    assert_eq!(sig.value, [1, 0, 0, 0]);

    // An I4-backed enum: the TypeDefOrRef-coded enum type follows the
    // value.
    let sig = metadata
        .parse_local_constant_sig(&[0x08, 2, 0, 0, 0, 0x04])
        .unwrap();
    match sig.kind {
        ConstantKind::Enum { type_code, enum_type } => {
            assert_eq!(type_code, 0x08);
            assert_eq!(enum_type, Token::new(TableId::TypeDef, 1));
        }
        other => panic!("expected enum constant, got {other:?}"),
    }
    assert_eq!(sig.value, [2, 0, 0, 0]);

    // A string constant keeps its raw UTF-16 payload.
    let sig = metadata
        .parse_local_constant_sig(&[0x0E, b'h', 0, b'i', 0])
        .unwrap();
    assert!(matches!(sig.kind, ConstantKind::Primitive { type_code: 0x0E }));
    assert_eq!(sig.value, [b'h', 0, b'i', 0]);

    // A class constant with a leading optional modifier.
    let sig = metadata
        .parse_local_constant_sig(&[0x20, 0x04, 0x12, 0x05])
        .unwrap();
    assert_eq!(sig.custom_modifiers.len(), 1);
    assert!(!sig.custom_modifiers[0].required);
    assert_eq!(
        sig.custom_modifiers[0].type_token,
        Token::new(TableId::TypeDef, 1)
    );
    match sig.kind {
        ConstantKind::General { type_code, type_token } => {
            assert_eq!(type_code, 0x12);
            assert_eq!(type_token, Some(Token::new(TableId::TypeRef, 1)));
        }
        other => panic!("expected general constant, got {other:?}"),
    }

    // An R4 constant must carry exactly four value bytes.
    assert!(metadata.parse_local_constant_sig(&[0x0C, 1, 2]).is_err());
}

#[test]
fn test_imports_decoding() {
    let mut metadata = Metadata::new().unwrap();
    let system = metadata.add_blob(b"System").unwrap();
    let alias = metadata.add_blob(b"S").unwrap();
    assert!(system < 128 && alias < 128);

    let blob = vec![
        1, system as u8, // ImportNamespace
        6, alias as u8, 0x02, // AliasAssemblyReference -> AssemblyRef 2
        3, 0x05, // ImportType -> TypeRef 1
    ];

    let imports = metadata.parse_imports(&blob).unwrap();
    assert_eq!(imports.len(), 3);

    match imports[0] {
        Import::Namespace { target_namespace } => assert_eq!(target_namespace, "System"),
        ref other => panic!("unexpected import {other:?}"),
    }
    match imports[1] {
        Import::AliasAssemblyReference { alias, assembly } => {
            assert_eq!(alias, "S");
            assert_eq!(assembly, Token::new(TableId::AssemblyRef, 2));
        }
        ref other => panic!("unexpected import {other:?}"),
    }
    match imports[2] {
        Import::Type { target_type } => {
            assert_eq!(target_type, Token::new(TableId::TypeRef, 1));
        }
        ref other => panic!("unexpected import {other:?}"),
    }

    // Unknown import kinds end the decode.
    assert!(metadata.parse_imports(&[42]).is_err());
}
