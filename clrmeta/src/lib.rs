//! Provides support for reading, editing and writing ECMA-335 metadata.
//!
//! [ECMA-335](https://www.ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)
//! Partition II defines the binary metadata schema embedded in managed-code
//! assemblies; the
//! [Portable PDB](https://github.com/dotnet/runtime/blob/main/docs/design/specs/PortablePdb-Metadata.md)
//! format layers a set of debugging tables on top of it. This crate
//! implements the metadata engine over both: parsing the metadata root and
//! its streams, a typed accessor over the logical tables, coded index
//! handling, an editor that maintains the structural invariants across
//! mutations, and a serialiser back to the on-disk layout.
//!
//! # Functionality
//!
//! * Parse a metadata blob into a [`Metadata`] handle, or create an empty
//!   image from scratch.
//! * Navigate rows with [`Cursor`]s, follow typed cross-references, read
//!   and write individual columns, and look rows up by key.
//! * Add rows, including list-aware insertion that synthesises the
//!   undocumented `*Ptr` indirection tables when a mid-list insertion
//!   would otherwise move tokens.
//! * Append to the `#Strings`, `#US`, `#Blob` and `#GUID` heaps.
//! * Merge the heaps of an EnC minimal delta into a base image.
//! * Serialise the current state back to a byte buffer; unedited images
//!   round-trip verbatim.
//!
//! # Example
//!
//! ```
//! use clrmeta::{cols, Metadata, TableId};
//!
//! let metadata = Metadata::new().unwrap();
//!
//! // Every fresh image carries the module identity row and the global
//! // <Module> type.
//! let (module, count) = metadata.table_cursor(TableId::Module).unwrap();
//! assert_eq!(count, 1);
//! assert_eq!(metadata.get_utf8(module, cols::module::NAME).unwrap(), "");
//!
//! let (global_type, _) = metadata.table_cursor(TableId::TypeDef).unwrap();
//! assert_eq!(
//!     metadata.get_utf8(global_type, cols::type_def::TYPE_NAME).unwrap(),
//!     "<Module>"
//! );
//!
//! let buf = metadata.write_to_vec().unwrap();
//! let reparsed = Metadata::parse(&buf).unwrap();
//! assert_eq!(reparsed.version_string(), "v4.0.30319");
//! assert!(reparsed.validate().is_ok());
//! ```
//!
//! # Structure of a metadata image
//!
//! An ECMA-335 image is divided into sections called _streams_:
//!
//! * `#~` or `#-` ("metadata"), comprising the metadata tables. The `#-`
//!   form appears in images that carry the indirection tables or an EnC
//!   minimal delta.
//! * `#Strings`, comprising null-terminated UTF-8 strings.
//! * `#US` ("user strings"), comprising UTF-16 encoded strings.
//! * `#Blob`, comprising blobs of data that don't fit in any of the other
//!   streams.
//! * `#GUID`, a list of GUIDs.
//! * `#Pdb`, the Portable PDB extension stream.
//! * `#JTD`, a zero-length marker identifying EnC minimal deltas.
//!
//! Row indices are 1-based throughout; 0 denotes "nil" and `count + 1` is
//! the one-past-the-end position used by empty list ranges.

#![warn(missing_docs)]

mod bytes;
mod cursor;
mod delta;
mod edit;
mod error;
mod heaps;
mod image;
mod layout;
mod pdb;
mod query;
mod raw;
mod tables;
mod writer;

#[cfg(feature = "ppdb")]
mod blobs;

pub mod schema;

pub use cursor::{Cursor, Token};
pub use error::{Error, ErrorKind};
pub use heaps::{UserString, UserStrings};
pub use image::Metadata;
pub use schema::{cols, CodedIndex, HeapKind, TableId};

#[cfg(feature = "ppdb")]
pub use blobs::{
    ConstantKind, CustomModifier, Import, LocalConstantSig, SequencePoint, SequencePoints,
};
