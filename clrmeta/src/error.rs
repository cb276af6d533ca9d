use thiserror::Error;

use crate::schema::TableId;

/// The kind of an [`Error`].
#[derive(Debug, Clone, Copy, Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The metadata root header could not be read.
    #[error("invalid metadata root header")]
    InvalidHeader,
    /// The metadata root does not start with the `BSJB` signature.
    #[error("invalid metadata signature")]
    InvalidSignature,
    /// A length or offset points outside the image.
    #[error("invalid length")]
    InvalidLength,
    /// The version string is missing its terminator or is not UTF-8.
    #[error("invalid version string")]
    InvalidVersionString,
    /// A stream header could not be read.
    #[error("invalid stream header")]
    InvalidStreamHeader,
    /// A stream name is missing its terminator or is not UTF-8.
    #[error("invalid stream name")]
    InvalidStreamName,
    /// The image contains a stream with an unrecognized name.
    #[error("unknown stream")]
    UnknownStream,
    /// The `#~`/`#-` stream header could not be read.
    #[error("invalid tables stream")]
    InvalidTablesStream,
    /// The tables stream is shorter than its row counts require.
    #[error(
        "insufficient table data: {0} bytes required, but the tables stream only contains {1} bytes"
    )]
    InsufficientTableData(usize, usize),
    /// The `#Pdb` stream could not be read.
    #[error("invalid #Pdb stream")]
    InvalidPdbStream,
    /// A `#Strings` heap offset is out of bounds.
    #[error("invalid string offset")]
    InvalidStringOffset,
    /// String heap contents are not valid UTF-8.
    #[error("invalid string data")]
    InvalidStringData,
    /// A `#Blob` heap offset is out of bounds or has a malformed length.
    #[error("invalid blob offset")]
    InvalidBlobOffset,
    /// Blob contents extend past the end of the heap.
    #[error("invalid blob data")]
    InvalidBlobData,
    /// A `#US` heap offset is out of bounds or has a malformed length.
    #[error("invalid user string offset")]
    InvalidUserStringOffset,
    /// A `#GUID` heap index is out of bounds.
    #[error("invalid GUID index")]
    InvalidGuidIndex,
    /// A compressed unsigned integer has a reserved tag or is truncated.
    #[error("invalid compressed unsigned number")]
    InvalidCompressedUnsigned,
    /// A compressed signed integer has a reserved tag or is truncated.
    #[error("invalid compressed signed number")]
    InvalidCompressedSigned,
    /// A value does not fit the compressed integer encoding.
    #[error("value out of range for compressed encoding: {0}")]
    UncompressibleValue(u32),
    /// A table id is outside the range defined by ECMA-335 and the
    /// Portable PDB format.
    #[error("unknown table id: {0:#x}")]
    UnknownTableId(u8),
    /// A coded index stores a tag with no corresponding table.
    #[error("invalid coded index tag")]
    InvalidCodedIndexTag,
    /// A token references a table that is not a member of the column's
    /// coded index map, or does not match a direct index column's table.
    #[error("token {0:#010x} is not valid for the column")]
    TokenTableMismatch(u32),
    /// The cursor is null or does not point at a row.
    #[error("row index {1} is out of bounds for table {0:?}")]
    RowIndexOutOfBounds(TableId, u32),
    /// The column index is out of bounds for the table.
    #[error("column index {1} is out of bounds for table {0:?}")]
    ColumnIndexOutOfBounds(TableId, u8),
    /// The column does not have the kind required by the accessor.
    #[error("column {1} in table {0:?} does not match the requested kind")]
    ColumnKindMismatch(TableId, u8),
    /// The table does not exist in this image.
    #[error("table {0:?} is not present in the image")]
    TableNotPresent(TableId),
    /// A row add is already in progress on the table.
    #[error("a row add is already in progress on table {0:?}")]
    RowAddInProgress(TableId),
    /// The requested row insertion point is not valid for the table.
    #[error("row {1} is not a valid insertion point for table {0:?}")]
    InvalidInsertionPoint(TableId, u32),
    /// A heap grew past the 2^32-1 byte limit.
    #[error("heap size limit exceeded")]
    HeapTooLarge,
    /// The operation is not supported for the current image state, e.g. a
    /// range lookup on an unsorted table.
    #[error("operation not supported")]
    NotSupported,
    /// The supplied delta image does not carry the minimal-delta marker.
    #[error("image is not a minimal delta")]
    NotMinimalDelta,
    /// The delta's metadata version does not match the base image.
    #[error("delta version does not match the base image")]
    DeltaVersionMismatch,
    /// The delta's `ENCLog` contains an operation this library does not
    /// apply.
    #[error("unsupported delta operation: {0}")]
    UnsupportedDeltaOperation(u32),
    /// A Document-name blob is malformed.
    #[error("invalid document name")]
    InvalidDocumentName,
    /// A SequencePoints blob is malformed.
    #[error("invalid sequence point")]
    InvalidSequencePoint,
    /// A LocalConstantSig blob is malformed.
    #[error("invalid local constant signature")]
    InvalidConstantSignature,
    /// An Imports blob is malformed.
    #[error("invalid imports blob")]
    InvalidImportsBlob,
    /// Writing to the output sink failed.
    #[error("failed to write output")]
    Io,
}

/// An error encountered while reading, editing or writing metadata.
#[derive(Debug, Error)]
#[error("{kind}")]
pub struct Error {
    pub(crate) kind: ErrorKind,
    #[source]
    pub(crate) source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Creates a new error from a known kind of error as well as an
    /// arbitrary error payload.
    pub(crate) fn new<E>(kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let source = Some(source.into());
        Self { kind, source }
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self { kind, source: None }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e)
    }
}
