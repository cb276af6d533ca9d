//! Per-image table layout: choosing column widths from observed heap and
//! table sizes and assigning byte offsets within a row.
//!
//! The widths follow II.24.2.6: heap indices widen with the heap-size
//! bits, direct table indices widen when the target table reaches 2^16
//! rows, and coded indices widen when the largest candidate table no
//! longer fits in the bits left next to the tag. Minimal EnC deltas use
//! 4-byte indices throughout.

use crate::schema::{self, CodedIndex, HeapKind, TableId, MAX_COLUMN_COUNT, MAX_TABLE_COUNT};

/// What a column's raw value means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    /// A constant with a width intrinsic to the schema.
    Constant,
    /// An index into one of the heaps.
    Heap(HeapKind),
    /// A 1-based row index into a single table.
    Table(TableId),
    /// A coded index selecting among the tables of a map.
    Coded(CodedIndex),
}

/// One column of a table row: its interpretation, byte offset within the
/// row and storage width (2 or 4 bytes).
#[derive(Debug, Clone, Copy)]
pub(crate) struct Column {
    pub kind: ColumnKind,
    pub offset: u8,
    pub width: u8,
}

impl Column {
    const EMPTY: Column = Column {
        kind: ColumnKind::Constant,
        offset: 0,
        width: 0,
    };
}

/// The inputs that determine column widths.
///
/// `row_counts` must already include the referenced type-system row
/// counts from the `#Pdb` stream when the image has one.
pub(crate) struct LayoutCtx<'a> {
    pub row_counts: &'a [u32; MAX_TABLE_COUNT],
    pub large_strings: bool,
    pub large_guid: bool,
    pub large_blob: bool,
    pub minimal_delta: bool,
}

impl LayoutCtx<'_> {
    fn heap_width(&self, kind: HeapKind) -> u8 {
        let large = match kind {
            HeapKind::Strings => self.large_strings,
            HeapKind::Guid => self.large_guid,
            HeapKind::Blob => self.large_blob,
            // The #US heap has no heap-size bit; indices into it only
            // occur in constant columns of fixed width.
            HeapKind::UserString => false,
        };
        if large {
            4
        } else {
            2
        }
    }

    fn table_width(&self, id: TableId) -> u8 {
        if self.row_counts[id.index()] < (1 << 16) && !self.minimal_delta {
            2
        } else {
            4
        }
    }

    fn coded_width(&self, map: CodedIndex) -> u8 {
        let max_rows = map
            .tables()
            .iter()
            .flatten()
            .map(|id| self.row_counts[id.index()])
            .max()
            .unwrap_or(0);
        let max_rows_2b = 1u32 << (16 - map.tag_bits());
        if max_rows < max_rows_2b && !self.minimal_delta {
            2
        } else {
            4
        }
    }

    /// Required width for a non-constant column kind.
    pub(crate) fn index_width(&self, kind: ColumnKind) -> Option<u8> {
        match kind {
            ColumnKind::Constant => None,
            ColumnKind::Heap(h) => Some(self.heap_width(h)),
            ColumnKind::Table(t) => Some(self.table_width(t)),
            ColumnKind::Coded(c) => Some(self.coded_width(c)),
        }
    }

    /// A list column's target: the indirection table when it is live,
    /// otherwise the direct table.
    fn list_target(&self, direct: TableId, indirect: TableId) -> TableId {
        if self.row_counts[indirect.index()] != 0 {
            indirect
        } else {
            direct
        }
    }
}

/// The computed layout of one table.
pub(crate) struct TableSchema {
    pub columns: [Column; MAX_COLUMN_COUNT],
    pub column_count: u8,
    pub row_size: u8,
}

/// Computes the column layout of `id` for the given context.
///
/// Column order and constant widths follow the table definitions of
/// II.22 (and the Portable PDB spec for the debug tables).
pub(crate) fn table_schema(id: TableId, ctx: &LayoutCtx) -> TableSchema {
    use ColumnKind::*;
    use HeapKind::*;
    use TableId as T;

    let string = Heap(Strings);
    let guid = Heap(Guid);
    let blob = Heap(Blob);

    // (kind, constant width); the width entry is only meaningful for
    // constant columns, index widths come from the context.
    let cols: Vec<(ColumnKind, u8)> = match id {
        // II.22.30
        T::Module => vec![
            (Constant, 2),
            (string, 0),
            (guid, 0),
            (guid, 0),
            (guid, 0),
        ],
        // II.22.38
        T::TypeRef => vec![
            (Coded(CodedIndex::ResolutionScope), 0),
            (string, 0),
            (string, 0),
        ],
        // II.22.37
        T::TypeDef => vec![
            (Constant, 4),
            (string, 0),
            (string, 0),
            (Coded(CodedIndex::TypeDefOrRef), 0),
            (Table(ctx.list_target(T::Field, T::FieldPtr)), 0),
            (Table(ctx.list_target(T::MethodDef, T::MethodPtr)), 0),
        ],
        // Not in ECMA.
        T::FieldPtr => vec![(Table(T::Field), 0)],
        // II.22.15
        T::Field => vec![(Constant, 2), (string, 0), (blob, 0)],
        // Not in ECMA.
        T::MethodPtr => vec![(Table(T::MethodDef), 0)],
        // II.22.26
        T::MethodDef => vec![
            (Constant, 4),
            (Constant, 2),
            (Constant, 2),
            (string, 0),
            (blob, 0),
            (Table(ctx.list_target(T::Param, T::ParamPtr)), 0),
        ],
        // Not in ECMA.
        T::ParamPtr => vec![(Table(T::Param), 0)],
        // II.22.33
        T::Param => vec![(Constant, 2), (Constant, 2), (string, 0)],
        // II.22.23
        T::InterfaceImpl => vec![
            (Table(T::TypeDef), 0),
            (Coded(CodedIndex::TypeDefOrRef), 0),
        ],
        // II.22.25
        T::MemberRef => vec![
            (Coded(CodedIndex::MemberRefParent), 0),
            (string, 0),
            (blob, 0),
        ],
        // II.22.9
        T::Constant => vec![
            (Constant, 2),
            (Coded(CodedIndex::HasConstant), 0),
            (blob, 0),
        ],
        // II.22.10
        T::CustomAttribute => vec![
            (Coded(CodedIndex::HasCustomAttribute), 0),
            (Coded(CodedIndex::CustomAttributeType), 0),
            (blob, 0),
        ],
        // II.22.17
        T::FieldMarshal => vec![(Coded(CodedIndex::HasFieldMarshal), 0), (blob, 0)],
        // II.22.11
        T::DeclSecurity => vec![
            (Constant, 2),
            (Coded(CodedIndex::HasDeclSecurity), 0),
            (blob, 0),
        ],
        // II.22.8
        T::ClassLayout => vec![(Constant, 2), (Constant, 4), (Table(T::TypeDef), 0)],
        // II.22.16
        T::FieldLayout => vec![(Constant, 4), (Table(T::Field), 0)],
        // II.22.36
        T::StandAloneSig => vec![(blob, 0)],
        // II.22.12
        T::EventMap => vec![
            (Table(T::TypeDef), 0),
            (Table(ctx.list_target(T::Event, T::EventPtr)), 0),
        ],
        // Not in ECMA.
        T::EventPtr => vec![(Table(T::Event), 0)],
        // II.22.13
        T::Event => vec![
            (Constant, 2),
            (string, 0),
            (Coded(CodedIndex::TypeDefOrRef), 0),
        ],
        // II.22.35
        T::PropertyMap => vec![
            (Table(T::TypeDef), 0),
            (Table(ctx.list_target(T::Property, T::PropertyPtr)), 0),
        ],
        // Not in ECMA.
        T::PropertyPtr => vec![(Table(T::Property), 0)],
        // II.22.34
        T::Property => vec![(Constant, 2), (string, 0), (blob, 0)],
        // II.22.28
        T::MethodSemantics => vec![
            (Constant, 2),
            (Table(T::MethodDef), 0),
            (Coded(CodedIndex::HasSemantics), 0),
        ],
        // II.22.27
        T::MethodImpl => vec![
            (Table(T::TypeDef), 0),
            (Coded(CodedIndex::MethodDefOrRef), 0),
            (Coded(CodedIndex::MethodDefOrRef), 0),
        ],
        // II.22.31
        T::ModuleRef => vec![(string, 0)],
        // II.22.39
        T::TypeSpec => vec![(blob, 0)],
        // II.22.22
        T::ImplMap => vec![
            (Constant, 2),
            (Coded(CodedIndex::MemberForwarded), 0),
            (string, 0),
            (Table(T::ModuleRef), 0),
        ],
        // II.22.18
        T::FieldRva => vec![(Constant, 4), (Table(T::Field), 0)],
        T::EncLog => vec![(Constant, 4), (Constant, 4)],
        T::EncMap => vec![(Constant, 4)],
        // II.22.2
        T::Assembly => vec![
            (Constant, 4),
            (Constant, 2),
            (Constant, 2),
            (Constant, 2),
            (Constant, 2),
            (Constant, 4),
            (blob, 0),
            (string, 0),
            (string, 0),
        ],
        // II.22.3
        T::AssemblyProcessor => vec![(Constant, 4)],
        // II.22.4
        T::AssemblyOs => vec![(Constant, 4), (Constant, 4), (Constant, 4)],
        // II.22.5
        T::AssemblyRef => vec![
            (Constant, 2),
            (Constant, 2),
            (Constant, 2),
            (Constant, 2),
            (Constant, 4),
            (blob, 0),
            (string, 0),
            (string, 0),
            (blob, 0),
        ],
        // II.22.7
        T::AssemblyRefProcessor => vec![(Constant, 4), (Table(T::AssemblyRef), 0)],
        // II.22.6
        T::AssemblyRefOs => vec![
            (Constant, 4),
            (Constant, 4),
            (Constant, 4),
            (Table(T::AssemblyRef), 0),
        ],
        // II.22.19
        T::File => vec![(Constant, 4), (string, 0), (blob, 0)],
        // II.22.14
        T::ExportedType => vec![
            (Constant, 4),
            (Constant, 4),
            (string, 0),
            (string, 0),
            (Coded(CodedIndex::Implementation), 0),
        ],
        // II.22.24
        T::ManifestResource => vec![
            (Constant, 4),
            (Constant, 4),
            (string, 0),
            (Coded(CodedIndex::Implementation), 0),
        ],
        // II.22.32
        T::NestedClass => vec![(Table(T::TypeDef), 0), (Table(T::TypeDef), 0)],
        // II.22.20
        T::GenericParam => vec![
            (Constant, 2),
            (Constant, 2),
            (Coded(CodedIndex::TypeOrMethodDef), 0),
            (string, 0),
        ],
        // II.22.29
        T::MethodSpec => vec![(Coded(CodedIndex::MethodDefOrRef), 0), (blob, 0)],
        // II.22.21
        T::GenericParamConstraint => vec![
            (Table(T::GenericParam), 0),
            (Coded(CodedIndex::TypeDefOrRef), 0),
        ],
        T::Document => vec![(blob, 0), (guid, 0), (blob, 0), (guid, 0)],
        T::MethodDebugInformation => vec![(Table(T::Document), 0), (blob, 0)],
        T::LocalScope => vec![
            (Table(T::MethodDef), 0),
            (Table(T::ImportScope), 0),
            (Table(T::LocalVariable), 0),
            (Table(T::LocalConstant), 0),
            (Constant, 4),
            (Constant, 4),
        ],
        T::LocalVariable => vec![(Constant, 2), (Constant, 2), (string, 0)],
        T::LocalConstant => vec![(string, 0), (blob, 0)],
        T::ImportScope => vec![(Table(T::ImportScope), 0), (blob, 0)],
        T::StateMachineMethod => vec![(Table(T::MethodDef), 0), (Table(T::MethodDef), 0)],
        T::CustomDebugInformation => vec![
            (Coded(CodedIndex::HasCustomDebugInformation), 0),
            (guid, 0),
            (blob, 0),
        ],
    };

    debug_assert_eq!(cols.len(), schema::column_count(id) as usize);

    let mut columns = [Column::EMPTY; MAX_COLUMN_COUNT];
    let mut offset = 0u8;
    for (i, (kind, constant_width)) in cols.iter().enumerate() {
        let width = ctx.index_width(*kind).unwrap_or(*constant_width);
        columns[i] = Column {
            kind: *kind,
            offset,
            width,
        };
        offset += width;
    }

    TableSchema {
        columns,
        column_count: cols.len() as u8,
        row_size: offset,
    }
}
