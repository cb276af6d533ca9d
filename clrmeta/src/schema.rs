//! The static table schema of ECMA-335 II.22 and the Portable PDB format.
//!
//! Everything in this module is knowledge baked into the format itself:
//! which tables exist, how many columns each has, which coded index maps
//! tie them together, and which columns the sorted tables are keyed on.
//! The per-image part of the schema (column widths and byte offsets) is
//! computed in [`crate::layout`].

use crate::cursor::Token;

/// The maximum number of tables an image can carry, per II.24.2.6.
pub(crate) const MAX_TABLE_COUNT: usize = 64;

/// The maximum number of columns any table declares.
pub(crate) const MAX_COLUMN_COUNT: usize = 9;

/// An enumeration of all table types in ECMA-335 and Portable PDB.
///
/// The `FieldPtr`, `MethodPtr`, `ParamPtr`, `EventPtr` and `PropertyPtr`
/// indirection tables are not part of the ECMA spec; they appear in
/// images using the uncompressed (`#-`) tables stream.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0a,
    Constant = 0x0b,
    CustomAttribute = 0x0c,
    FieldMarshal = 0x0d,
    DeclSecurity = 0x0e,
    ClassLayout = 0x0f,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1a,
    TypeSpec = 0x1b,
    ImplMap = 0x1c,
    FieldRva = 0x1d,
    EncLog = 0x1e,
    EncMap = 0x1f,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOs = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOs = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2a,
    MethodSpec = 0x2b,
    GenericParamConstraint = 0x2c,
    // Portable PDB extension starts here.
    Document = 0x30,
    MethodDebugInformation = 0x31,
    LocalScope = 0x32,
    LocalVariable = 0x33,
    LocalConstant = 0x34,
    ImportScope = 0x35,
    StateMachineMethod = 0x36,
    CustomDebugInformation = 0x37,
}

impl TableId {
    /// All table ids, in tables-stream order.
    pub const ALL: [TableId; 53] = [
        TableId::Module,
        TableId::TypeRef,
        TableId::TypeDef,
        TableId::FieldPtr,
        TableId::Field,
        TableId::MethodPtr,
        TableId::MethodDef,
        TableId::ParamPtr,
        TableId::Param,
        TableId::InterfaceImpl,
        TableId::MemberRef,
        TableId::Constant,
        TableId::CustomAttribute,
        TableId::FieldMarshal,
        TableId::DeclSecurity,
        TableId::ClassLayout,
        TableId::FieldLayout,
        TableId::StandAloneSig,
        TableId::EventMap,
        TableId::EventPtr,
        TableId::Event,
        TableId::PropertyMap,
        TableId::PropertyPtr,
        TableId::Property,
        TableId::MethodSemantics,
        TableId::MethodImpl,
        TableId::ModuleRef,
        TableId::TypeSpec,
        TableId::ImplMap,
        TableId::FieldRva,
        TableId::EncLog,
        TableId::EncMap,
        TableId::Assembly,
        TableId::AssemblyProcessor,
        TableId::AssemblyOs,
        TableId::AssemblyRef,
        TableId::AssemblyRefProcessor,
        TableId::AssemblyRefOs,
        TableId::File,
        TableId::ExportedType,
        TableId::ManifestResource,
        TableId::NestedClass,
        TableId::GenericParam,
        TableId::MethodSpec,
        TableId::GenericParamConstraint,
        TableId::Document,
        TableId::MethodDebugInformation,
        TableId::LocalScope,
        TableId::LocalVariable,
        TableId::LocalConstant,
        TableId::ImportScope,
        TableId::StateMachineMethod,
        TableId::CustomDebugInformation,
    ];

    /// Resolves a raw table id to a [`TableId`], if it names a known table.
    pub fn from_raw(raw: u8) -> Option<TableId> {
        use TableId::*;
        Some(match raw {
            0x00 => Module,
            0x01 => TypeRef,
            0x02 => TypeDef,
            0x03 => FieldPtr,
            0x04 => Field,
            0x05 => MethodPtr,
            0x06 => MethodDef,
            0x07 => ParamPtr,
            0x08 => Param,
            0x09 => InterfaceImpl,
            0x0a => MemberRef,
            0x0b => Constant,
            0x0c => CustomAttribute,
            0x0d => FieldMarshal,
            0x0e => DeclSecurity,
            0x0f => ClassLayout,
            0x10 => FieldLayout,
            0x11 => StandAloneSig,
            0x12 => EventMap,
            0x13 => EventPtr,
            0x14 => Event,
            0x15 => PropertyMap,
            0x16 => PropertyPtr,
            0x17 => Property,
            0x18 => MethodSemantics,
            0x19 => MethodImpl,
            0x1a => ModuleRef,
            0x1b => TypeSpec,
            0x1c => ImplMap,
            0x1d => FieldRva,
            0x1e => EncLog,
            0x1f => EncMap,
            0x20 => Assembly,
            0x21 => AssemblyProcessor,
            0x22 => AssemblyOs,
            0x23 => AssemblyRef,
            0x24 => AssemblyRefProcessor,
            0x25 => AssemblyRefOs,
            0x26 => File,
            0x27 => ExportedType,
            0x28 => ManifestResource,
            0x29 => NestedClass,
            0x2a => GenericParam,
            0x2b => MethodSpec,
            0x2c => GenericParamConstraint,
            0x30 => Document,
            0x31 => MethodDebugInformation,
            0x32 => LocalScope,
            0x33 => LocalVariable,
            0x34 => LocalConstant,
            0x35 => ImportScope,
            0x36 => StateMachineMethod,
            0x37 => CustomDebugInformation,
            _ => return None,
        })
    }

    /// The position of this table in the 64-entry table array.
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Returns true for the `*Ptr` indirection tables.
    pub fn is_indirection(self) -> bool {
        matches!(
            self,
            TableId::FieldPtr
                | TableId::MethodPtr
                | TableId::ParamPtr
                | TableId::EventPtr
                | TableId::PropertyPtr
        )
    }

    /// Returns the indirection table shadowing this table, if it has one.
    pub fn indirection_table(self) -> Option<TableId> {
        match self {
            TableId::Field => Some(TableId::FieldPtr),
            TableId::MethodDef => Some(TableId::MethodPtr),
            TableId::Param => Some(TableId::ParamPtr),
            TableId::Event => Some(TableId::EventPtr),
            TableId::Property => Some(TableId::PropertyPtr),
            _ => None,
        }
    }

    /// Returns the table an indirection table points back into.
    pub fn direct_table(self) -> Option<TableId> {
        match self {
            TableId::FieldPtr => Some(TableId::Field),
            TableId::MethodPtr => Some(TableId::MethodDef),
            TableId::ParamPtr => Some(TableId::Param),
            TableId::EventPtr => Some(TableId::Event),
            TableId::PropertyPtr => Some(TableId::Property),
            _ => None,
        }
    }

    /// Returns true for the tables defined by ECMA-335 proper, as opposed
    /// to the Portable PDB extension tables.
    pub(crate) fn is_type_system(self) -> bool {
        (self as u8) < (TableId::Document as u8)
    }
}

/// The heaps a column can index into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapKind {
    /// The `#Strings` heap of null-terminated UTF-8 strings.
    Strings,
    /// The `#GUID` heap of 16-byte records.
    Guid,
    /// The `#Blob` heap of length-prefixed byte sequences.
    Blob,
    /// The `#US` heap of length-prefixed UTF-16 strings.
    UserString,
}

/// The coded index maps of II.24.2.6 plus the Portable PDB addition.
///
/// A coded index stores a tag selecting one of the map's member tables in
/// its low bits and a row id in the high bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum CodedIndex {
    TypeDefOrRef,
    HasConstant,
    HasCustomAttribute,
    HasFieldMarshal,
    HasDeclSecurity,
    MemberRefParent,
    HasSemantics,
    MethodDefOrRef,
    MemberForwarded,
    Implementation,
    CustomAttributeType,
    ResolutionScope,
    TypeOrMethodDef,
    HasCustomDebugInformation,
}

impl CodedIndex {
    /// The candidate tables of this map, in tag order.
    ///
    /// `None` entries are tags reserved by the specification with no
    /// corresponding table (`CustomAttributeType` reserves three).
    pub(crate) fn tables(self) -> &'static [Option<TableId>] {
        use TableId::*;
        match self {
            CodedIndex::TypeDefOrRef => &[Some(TypeDef), Some(TypeRef), Some(TypeSpec)],
            CodedIndex::HasConstant => &[Some(Field), Some(Param), Some(Property)],
            CodedIndex::HasCustomAttribute => &[
                Some(MethodDef),
                Some(Field),
                Some(TypeRef),
                Some(TypeDef),
                Some(Param),
                Some(InterfaceImpl),
                Some(MemberRef),
                Some(Module),
                Some(DeclSecurity),
                Some(Property),
                Some(Event),
                Some(StandAloneSig),
                Some(ModuleRef),
                Some(TypeSpec),
                Some(Assembly),
                Some(AssemblyRef),
                Some(File),
                Some(ExportedType),
                Some(ManifestResource),
                Some(GenericParam),
                Some(GenericParamConstraint),
                Some(MethodSpec),
            ],
            CodedIndex::HasFieldMarshal => &[Some(Field), Some(Param)],
            CodedIndex::HasDeclSecurity => &[Some(TypeDef), Some(MethodDef), Some(Assembly)],
            CodedIndex::MemberRefParent => &[
                Some(TypeDef),
                Some(TypeRef),
                Some(ModuleRef),
                Some(MethodDef),
                Some(TypeSpec),
            ],
            CodedIndex::HasSemantics => &[Some(Event), Some(Property)],
            CodedIndex::MethodDefOrRef => &[Some(MethodDef), Some(MemberRef)],
            CodedIndex::MemberForwarded => &[Some(Field), Some(MethodDef)],
            CodedIndex::Implementation => &[Some(File), Some(AssemblyRef), Some(ExportedType)],
            CodedIndex::CustomAttributeType => {
                &[None, None, Some(MethodDef), Some(MemberRef), None]
            }
            CodedIndex::ResolutionScope => {
                &[Some(Module), Some(ModuleRef), Some(AssemblyRef), Some(TypeRef)]
            }
            CodedIndex::TypeOrMethodDef => &[Some(TypeDef), Some(MethodDef)],
            CodedIndex::HasCustomDebugInformation => &[
                Some(MethodDef),
                Some(Field),
                Some(TypeRef),
                Some(TypeDef),
                Some(Param),
                Some(InterfaceImpl),
                Some(MemberRef),
                Some(Module),
                Some(DeclSecurity),
                Some(Property),
                Some(Event),
                Some(StandAloneSig),
                Some(ModuleRef),
                Some(TypeSpec),
                Some(Assembly),
                Some(AssemblyRef),
                Some(File),
                Some(ExportedType),
                Some(ManifestResource),
                Some(GenericParam),
                Some(GenericParamConstraint),
                Some(MethodSpec),
                Some(Document),
                Some(LocalScope),
                Some(LocalVariable),
                Some(LocalConstant),
                Some(ImportScope),
            ],
        }
    }

    /// The number of tag bits this map stores in the low end of an index.
    pub(crate) fn tag_bits(self) -> u32 {
        match self {
            CodedIndex::TypeDefOrRef => 2,
            CodedIndex::HasConstant => 2,
            CodedIndex::HasCustomAttribute => 5,
            CodedIndex::HasFieldMarshal => 1,
            CodedIndex::HasDeclSecurity => 2,
            CodedIndex::MemberRefParent => 3,
            CodedIndex::HasSemantics => 1,
            CodedIndex::MethodDefOrRef => 1,
            CodedIndex::MemberForwarded => 1,
            CodedIndex::Implementation => 2,
            CodedIndex::CustomAttributeType => 3,
            CodedIndex::ResolutionScope => 2,
            CodedIndex::TypeOrMethodDef => 1,
            CodedIndex::HasCustomDebugInformation => 5,
        }
    }

    /// Returns true when `table` is a member of this map.
    pub(crate) fn has_target(self, table: TableId) -> bool {
        self.tables().iter().any(|t| *t == Some(table))
    }

    /// Encodes a token into its coded form for this map.
    ///
    /// Returns `None` when the token's table is not a member of the map.
    pub(crate) fn compose(self, token: Token) -> Option<u32> {
        let table = token.table()?;
        let tag = self.tables().iter().position(|t| *t == Some(table))?;
        Some((token.rid() << self.tag_bits()) | tag as u32)
    }

    /// Splits a coded value into its target table and row id.
    ///
    /// Returns `None` when the stored tag has no corresponding table.
    pub(crate) fn decompose(self, coded: u32) -> Option<(TableId, u32)> {
        let mask = (1u32 << self.tag_bits()) - 1;
        let table = *self.tables().get((coded & mask) as usize)?;
        Some((table?, coded >> self.tag_bits()))
    }
}

/// One key of a sorted table, per the II.22 sorting augments.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SortKey {
    /// The key's column index.
    pub col: u8,
    /// Whether this key compares in reverse.
    pub descending: bool,
}

const fn key(col: u8) -> SortKey {
    SortKey {
        col,
        descending: false,
    }
}

const fn key_desc(col: u8) -> SortKey {
    SortKey {
        col,
        descending: true,
    }
}

// Sort key declarations per the II.22 sorting augments and the Portable
// PDB spec.
const KEYS_INTERFACE_IMPL: &[SortKey] = &[key(cols::interface_impl::CLASS)];
const KEYS_CONSTANT: &[SortKey] = &[key(cols::constant::PARENT)];
const KEYS_CUSTOM_ATTRIBUTE: &[SortKey] = &[key(cols::custom_attribute::PARENT)];
const KEYS_FIELD_MARSHAL: &[SortKey] = &[key(cols::field_marshal::PARENT)];
const KEYS_DECL_SECURITY: &[SortKey] = &[key(cols::decl_security::PARENT)];
const KEYS_CLASS_LAYOUT: &[SortKey] = &[key(cols::class_layout::PARENT)];
const KEYS_FIELD_LAYOUT: &[SortKey] = &[key(cols::field_layout::FIELD)];
const KEYS_METHOD_SEMANTICS: &[SortKey] = &[key(cols::method_semantics::ASSOCIATION)];
const KEYS_METHOD_IMPL: &[SortKey] = &[key(cols::method_impl::CLASS)];
const KEYS_IMPL_MAP: &[SortKey] = &[key(cols::impl_map::MEMBER_FORWARDED)];
const KEYS_FIELD_RVA: &[SortKey] = &[key(cols::field_rva::FIELD)];
const KEYS_NESTED_CLASS: &[SortKey] = &[key(cols::nested_class::NESTED_CLASS)];
const KEYS_GENERIC_PARAM: &[SortKey] = &[
    key(cols::generic_param::OWNER),
    key(cols::generic_param::NUMBER),
];
const KEYS_GENERIC_PARAM_CONSTRAINT: &[SortKey] = &[key(cols::generic_param_constraint::OWNER)];
const KEYS_LOCAL_SCOPE: &[SortKey] = &[
    key(cols::local_scope::METHOD),
    key(cols::local_scope::START_OFFSET),
    key_desc(cols::local_scope::LENGTH),
];
const KEYS_STATE_MACHINE_METHOD: &[SortKey] = &[key(cols::state_machine_method::MOVE_NEXT_METHOD)];
const KEYS_CUSTOM_DEBUG_INFORMATION: &[SortKey] =
    &[key(cols::custom_debug_information::PARENT)];

/// Primary and secondary sort keys of a table; empty for unsorted tables.
pub(crate) fn sort_keys(id: TableId) -> &'static [SortKey] {
    match id {
        TableId::InterfaceImpl => KEYS_INTERFACE_IMPL,
        TableId::Constant => KEYS_CONSTANT,
        TableId::CustomAttribute => KEYS_CUSTOM_ATTRIBUTE,
        TableId::FieldMarshal => KEYS_FIELD_MARSHAL,
        TableId::DeclSecurity => KEYS_DECL_SECURITY,
        TableId::ClassLayout => KEYS_CLASS_LAYOUT,
        TableId::FieldLayout => KEYS_FIELD_LAYOUT,
        TableId::MethodSemantics => KEYS_METHOD_SEMANTICS,
        TableId::MethodImpl => KEYS_METHOD_IMPL,
        TableId::ImplMap => KEYS_IMPL_MAP,
        TableId::FieldRva => KEYS_FIELD_RVA,
        TableId::NestedClass => KEYS_NESTED_CLASS,
        TableId::GenericParam => KEYS_GENERIC_PARAM,
        TableId::GenericParamConstraint => KEYS_GENERIC_PARAM_CONSTRAINT,
        TableId::LocalScope => KEYS_LOCAL_SCOPE,
        TableId::StateMachineMethod => KEYS_STATE_MACHINE_METHOD,
        TableId::CustomDebugInformation => KEYS_CUSTOM_DEBUG_INFORMATION,
        _ => &[],
    }
}

/// The number of columns each table declares.
pub(crate) fn column_count(id: TableId) -> u8 {
    match id {
        TableId::Module => 5,
        TableId::TypeRef => 3,
        TableId::TypeDef => 6,
        TableId::FieldPtr => 1,
        TableId::Field => 3,
        TableId::MethodPtr => 1,
        TableId::MethodDef => 6,
        TableId::ParamPtr => 1,
        TableId::Param => 3,
        TableId::InterfaceImpl => 2,
        TableId::MemberRef => 3,
        TableId::Constant => 3,
        TableId::CustomAttribute => 3,
        TableId::FieldMarshal => 2,
        TableId::DeclSecurity => 3,
        TableId::ClassLayout => 3,
        TableId::FieldLayout => 2,
        TableId::StandAloneSig => 1,
        TableId::EventMap => 2,
        TableId::EventPtr => 1,
        TableId::Event => 3,
        TableId::PropertyMap => 2,
        TableId::PropertyPtr => 1,
        TableId::Property => 3,
        TableId::MethodSemantics => 3,
        TableId::MethodImpl => 3,
        TableId::ModuleRef => 1,
        TableId::TypeSpec => 1,
        TableId::ImplMap => 4,
        TableId::FieldRva => 2,
        TableId::EncLog => 2,
        TableId::EncMap => 1,
        TableId::Assembly => 9,
        TableId::AssemblyProcessor => 1,
        TableId::AssemblyOs => 3,
        TableId::AssemblyRef => 9,
        TableId::AssemblyRefProcessor => 2,
        TableId::AssemblyRefOs => 4,
        TableId::File => 3,
        TableId::ExportedType => 5,
        TableId::ManifestResource => 4,
        TableId::NestedClass => 2,
        TableId::GenericParam => 4,
        TableId::MethodSpec => 2,
        TableId::GenericParamConstraint => 2,
        TableId::Document => 4,
        TableId::MethodDebugInformation => 2,
        TableId::LocalScope => 6,
        TableId::LocalVariable => 3,
        TableId::LocalConstant => 2,
        TableId::ImportScope => 2,
        TableId::StateMachineMethod => 2,
        TableId::CustomDebugInformation => 3,
    }
}

/// Returns true when `(table, col)` is a list column, i.e. one whose
/// consecutive parent rows delimit half-open ranges of child rows.
pub(crate) fn is_list_column(table: TableId, col: u8) -> bool {
    match table {
        TableId::TypeDef => {
            col == cols::type_def::FIELD_LIST || col == cols::type_def::METHOD_LIST
        }
        TableId::MethodDef => col == cols::method_def::PARAM_LIST,
        TableId::EventMap => col == cols::event_map::EVENT_LIST,
        TableId::PropertyMap => col == cols::property_map::PROPERTY_LIST,
        TableId::LocalScope => {
            col == cols::local_scope::VARIABLE_LIST || col == cols::local_scope::CONSTANT_LIST
        }
        _ => false,
    }
}

/// Maps a list-target table (direct or indirection) to the parent table
/// and list column owning its ranges.
pub(crate) fn range_parent(child: TableId) -> Option<(TableId, u8)> {
    match child {
        TableId::Field | TableId::FieldPtr => Some((TableId::TypeDef, cols::type_def::FIELD_LIST)),
        TableId::MethodDef | TableId::MethodPtr => {
            Some((TableId::TypeDef, cols::type_def::METHOD_LIST))
        }
        TableId::Param | TableId::ParamPtr => {
            Some((TableId::MethodDef, cols::method_def::PARAM_LIST))
        }
        TableId::Event | TableId::EventPtr => {
            Some((TableId::EventMap, cols::event_map::EVENT_LIST))
        }
        TableId::Property | TableId::PropertyPtr => {
            Some((TableId::PropertyMap, cols::property_map::PROPERTY_LIST))
        }
        _ => None,
    }
}

/// Column indices for every table, named per II.22.
///
/// These are the values accepted by the `col` parameter of the column
/// accessors on [`Metadata`](crate::Metadata).
#[allow(missing_docs)]
pub mod cols {
    pub mod module {
        pub const GENERATION: u8 = 0;
        pub const NAME: u8 = 1;
        pub const MVID: u8 = 2;
        pub const ENC_ID: u8 = 3;
        pub const ENC_BASE_ID: u8 = 4;
    }

    pub mod type_ref {
        pub const RESOLUTION_SCOPE: u8 = 0;
        pub const TYPE_NAME: u8 = 1;
        pub const TYPE_NAMESPACE: u8 = 2;
    }

    pub mod type_def {
        pub const FLAGS: u8 = 0;
        pub const TYPE_NAME: u8 = 1;
        pub const TYPE_NAMESPACE: u8 = 2;
        pub const EXTENDS: u8 = 3;
        pub const FIELD_LIST: u8 = 4;
        pub const METHOD_LIST: u8 = 5;
    }

    pub mod field_ptr {
        pub const FIELD: u8 = 0;
    }

    pub mod field {
        pub const FLAGS: u8 = 0;
        pub const NAME: u8 = 1;
        pub const SIGNATURE: u8 = 2;
    }

    pub mod method_ptr {
        pub const METHOD: u8 = 0;
    }

    pub mod method_def {
        pub const RVA: u8 = 0;
        pub const IMPL_FLAGS: u8 = 1;
        pub const FLAGS: u8 = 2;
        pub const NAME: u8 = 3;
        pub const SIGNATURE: u8 = 4;
        pub const PARAM_LIST: u8 = 5;
    }

    pub mod param_ptr {
        pub const PARAM: u8 = 0;
    }

    pub mod param {
        pub const FLAGS: u8 = 0;
        pub const SEQUENCE: u8 = 1;
        pub const NAME: u8 = 2;
    }

    pub mod interface_impl {
        pub const CLASS: u8 = 0;
        pub const INTERFACE: u8 = 1;
    }

    pub mod member_ref {
        pub const CLASS: u8 = 0;
        pub const NAME: u8 = 1;
        pub const SIGNATURE: u8 = 2;
    }

    pub mod constant {
        pub const TYPE: u8 = 0;
        pub const PARENT: u8 = 1;
        pub const VALUE: u8 = 2;
    }

    pub mod custom_attribute {
        pub const PARENT: u8 = 0;
        pub const TYPE: u8 = 1;
        pub const VALUE: u8 = 2;
    }

    pub mod field_marshal {
        pub const PARENT: u8 = 0;
        pub const NATIVE_TYPE: u8 = 1;
    }

    pub mod decl_security {
        pub const ACTION: u8 = 0;
        pub const PARENT: u8 = 1;
        pub const PERMISSION_SET: u8 = 2;
    }

    pub mod class_layout {
        pub const PACKING_SIZE: u8 = 0;
        pub const CLASS_SIZE: u8 = 1;
        pub const PARENT: u8 = 2;
    }

    pub mod field_layout {
        pub const OFFSET: u8 = 0;
        pub const FIELD: u8 = 1;
    }

    pub mod stand_alone_sig {
        pub const SIGNATURE: u8 = 0;
    }

    pub mod event_map {
        pub const PARENT: u8 = 0;
        pub const EVENT_LIST: u8 = 1;
    }

    pub mod event_ptr {
        pub const EVENT: u8 = 0;
    }

    pub mod event {
        pub const EVENT_FLAGS: u8 = 0;
        pub const NAME: u8 = 1;
        pub const EVENT_TYPE: u8 = 2;
    }

    pub mod property_map {
        pub const PARENT: u8 = 0;
        pub const PROPERTY_LIST: u8 = 1;
    }

    pub mod property_ptr {
        pub const PROPERTY: u8 = 0;
    }

    pub mod property {
        pub const FLAGS: u8 = 0;
        pub const NAME: u8 = 1;
        pub const TYPE: u8 = 2;
    }

    pub mod method_semantics {
        pub const SEMANTICS: u8 = 0;
        pub const METHOD: u8 = 1;
        pub const ASSOCIATION: u8 = 2;
    }

    pub mod method_impl {
        pub const CLASS: u8 = 0;
        pub const METHOD_BODY: u8 = 1;
        pub const METHOD_DECLARATION: u8 = 2;
    }

    pub mod module_ref {
        pub const NAME: u8 = 0;
    }

    pub mod type_spec {
        pub const SIGNATURE: u8 = 0;
    }

    pub mod impl_map {
        pub const MAPPING_FLAGS: u8 = 0;
        pub const MEMBER_FORWARDED: u8 = 1;
        pub const IMPORT_NAME: u8 = 2;
        pub const IMPORT_SCOPE: u8 = 3;
    }

    pub mod field_rva {
        pub const RVA: u8 = 0;
        pub const FIELD: u8 = 1;
    }

    pub mod enc_log {
        pub const TOKEN: u8 = 0;
        pub const OP: u8 = 1;
    }

    pub mod enc_map {
        pub const TOKEN: u8 = 0;
    }

    pub mod assembly {
        pub const HASH_ALG_ID: u8 = 0;
        pub const MAJOR_VERSION: u8 = 1;
        pub const MINOR_VERSION: u8 = 2;
        pub const BUILD_NUMBER: u8 = 3;
        pub const REVISION_NUMBER: u8 = 4;
        pub const FLAGS: u8 = 5;
        pub const PUBLIC_KEY: u8 = 6;
        pub const NAME: u8 = 7;
        pub const CULTURE: u8 = 8;
    }

    pub mod assembly_ref {
        pub const MAJOR_VERSION: u8 = 0;
        pub const MINOR_VERSION: u8 = 1;
        pub const BUILD_NUMBER: u8 = 2;
        pub const REVISION_NUMBER: u8 = 3;
        pub const FLAGS: u8 = 4;
        pub const PUBLIC_KEY_OR_TOKEN: u8 = 5;
        pub const NAME: u8 = 6;
        pub const CULTURE: u8 = 7;
        pub const HASH_VALUE: u8 = 8;
    }

    pub mod file {
        pub const FLAGS: u8 = 0;
        pub const NAME: u8 = 1;
        pub const HASH_VALUE: u8 = 2;
    }

    pub mod exported_type {
        pub const FLAGS: u8 = 0;
        pub const TYPE_DEF_ID: u8 = 1;
        pub const TYPE_NAME: u8 = 2;
        pub const TYPE_NAMESPACE: u8 = 3;
        pub const IMPLEMENTATION: u8 = 4;
    }

    pub mod manifest_resource {
        pub const OFFSET: u8 = 0;
        pub const FLAGS: u8 = 1;
        pub const NAME: u8 = 2;
        pub const IMPLEMENTATION: u8 = 3;
    }

    pub mod nested_class {
        pub const NESTED_CLASS: u8 = 0;
        pub const ENCLOSING_CLASS: u8 = 1;
    }

    pub mod generic_param {
        pub const NUMBER: u8 = 0;
        pub const FLAGS: u8 = 1;
        pub const OWNER: u8 = 2;
        pub const NAME: u8 = 3;
    }

    pub mod method_spec {
        pub const METHOD: u8 = 0;
        pub const INSTANTIATION: u8 = 1;
    }

    pub mod generic_param_constraint {
        pub const OWNER: u8 = 0;
        pub const CONSTRAINT: u8 = 1;
    }

    pub mod document {
        pub const NAME: u8 = 0;
        pub const HASH_ALGORITHM: u8 = 1;
        pub const HASH: u8 = 2;
        pub const LANGUAGE: u8 = 3;
    }

    pub mod method_debug_information {
        pub const DOCUMENT: u8 = 0;
        pub const SEQUENCE_POINTS: u8 = 1;
    }

    pub mod local_scope {
        pub const METHOD: u8 = 0;
        pub const IMPORT_SCOPE: u8 = 1;
        pub const VARIABLE_LIST: u8 = 2;
        pub const CONSTANT_LIST: u8 = 3;
        pub const START_OFFSET: u8 = 4;
        pub const LENGTH: u8 = 5;
    }

    pub mod local_variable {
        pub const ATTRIBUTES: u8 = 0;
        pub const INDEX: u8 = 1;
        pub const NAME: u8 = 2;
    }

    pub mod local_constant {
        pub const NAME: u8 = 0;
        pub const SIGNATURE: u8 = 1;
    }

    pub mod import_scope {
        pub const PARENT: u8 = 0;
        pub const IMPORTS: u8 = 1;
    }

    pub mod state_machine_method {
        pub const MOVE_NEXT_METHOD: u8 = 0;
        pub const KICKOFF_METHOD: u8 = 1;
    }

    pub mod custom_debug_information {
        pub const PARENT: u8 = 0;
        pub const KIND: u8 = 1;
        pub const VALUE: u8 = 2;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_id_round_trip() {
        for id in TableId::ALL {
            assert_eq!(TableId::from_raw(id as u8), Some(id));
        }
        assert_eq!(TableId::from_raw(0x2d), None);
        assert_eq!(TableId::from_raw(0x3f), None);
    }

    #[test]
    fn test_coded_index_compose_decompose() {
        let token = Token::new(TableId::TypeRef, 0x1234);
        let coded = CodedIndex::TypeDefOrRef.compose(token).unwrap();
        assert_eq!(coded, (0x1234 << 2) | 1);
        assert_eq!(
            CodedIndex::TypeDefOrRef.decompose(coded),
            Some((TableId::TypeRef, 0x1234))
        );

        // Field is not a member of TypeDefOrRef.
        assert_eq!(
            CodedIndex::TypeDefOrRef.compose(Token::new(TableId::Field, 1)),
            None
        );

        // Tag 0 and 4 of CustomAttributeType are reserved.
        assert_eq!(CodedIndex::CustomAttributeType.decompose(0x8), None);
        assert_eq!(
            CodedIndex::CustomAttributeType.decompose(0xa),
            Some((TableId::MethodDef, 1))
        );
    }

    #[test]
    fn test_indirection_mapping() {
        assert_eq!(TableId::Field.indirection_table(), Some(TableId::FieldPtr));
        assert_eq!(TableId::FieldPtr.direct_table(), Some(TableId::Field));
        assert!(TableId::FieldPtr.is_indirection());
        assert!(!TableId::Field.is_indirection());
        assert_eq!(TableId::LocalVariable.indirection_table(), None);
    }
}
