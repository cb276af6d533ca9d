//! Decoders for the Portable PDB blob formats: document names, sequence
//! points, local constant signatures and import scopes.
//!
//! See <https://github.com/dotnet/runtime/blob/main/docs/design/specs/PortablePdb-Metadata.md>.

use crate::bytes::{decode_signed, decode_unsigned, read_u8};
use crate::cursor::{Cursor, Token};
use crate::image::Metadata;
use crate::schema::{cols, CodedIndex, TableId};
use crate::{Error, ErrorKind};

// II.23.1.16 element types used by LocalConstantSig.
const ELEMENT_TYPE_BOOLEAN: u32 = 0x02;
const ELEMENT_TYPE_CHAR: u32 = 0x03;
const ELEMENT_TYPE_I1: u32 = 0x04;
const ELEMENT_TYPE_U1: u32 = 0x05;
const ELEMENT_TYPE_I2: u32 = 0x06;
const ELEMENT_TYPE_U2: u32 = 0x07;
const ELEMENT_TYPE_I4: u32 = 0x08;
const ELEMENT_TYPE_U4: u32 = 0x09;
const ELEMENT_TYPE_I8: u32 = 0x0a;
const ELEMENT_TYPE_U8: u32 = 0x0b;
const ELEMENT_TYPE_R4: u32 = 0x0c;
const ELEMENT_TYPE_R8: u32 = 0x0d;
const ELEMENT_TYPE_STRING: u32 = 0x0e;
const ELEMENT_TYPE_VALUETYPE: u32 = 0x11;
const ELEMENT_TYPE_CLASS: u32 = 0x12;
const ELEMENT_TYPE_OBJECT: u32 = 0x1c;
const ELEMENT_TYPE_CMOD_REQD: u32 = 0x1f;
const ELEMENT_TYPE_CMOD_OPT: u32 = 0x20;

/// One sequence point of a method, with accumulated (absolute) values.
#[derive(Clone, Copy)]
pub struct SequencePoint {
    /// IL offset of the point within the method body.
    pub il_offset: u32,
    /// Starting line of the point; 0xfeefee for hidden points.
    pub start_line: u32,
    /// Starting column of the point.
    pub start_column: u32,
    /// Ending line of the point.
    pub end_line: u32,
    /// Ending column of the point.
    pub end_column: u32,
    /// The `Document` row the point belongs to.
    pub document: u32,
}

impl SequencePoint {
    /// Returns true if this is a "hidden" sequence point.
    pub fn is_hidden(&self) -> bool {
        self.start_line == 0xfeefee
            && self.end_line == 0xfeefee
            && self.start_column == 0
            && self.end_column == 0
    }

    fn new_hidden(il_offset: u32, document: u32) -> Self {
        SequencePoint {
            il_offset,
            start_line: 0xfeefee,
            start_column: 0,
            end_line: 0xfeefee,
            end_column: 0,
            document,
        }
    }
}

impl std::fmt::Debug for SequencePoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_hidden() {
            f.debug_struct("HiddenSequencePoint")
                .field("il_offset", &self.il_offset)
                .field("document", &self.document)
                .finish()
        } else {
            f.debug_struct("SequencePoint")
                .field("il_offset", &self.il_offset)
                .field("start_line", &self.start_line)
                .field("start_column", &self.start_column)
                .field("end_line", &self.end_line)
                .field("end_column", &self.end_column)
                .field("document", &self.document)
                .finish()
        }
    }
}

/// The decoded SequencePoints blob of a `MethodDebugInformation` row.
#[derive(Debug, Clone)]
pub struct SequencePoints {
    /// The `StandAloneSig` row of the method's local signature.
    pub local_signature: u32,
    /// The decoded points, in IL offset order.
    pub points: Vec<SequencePoint>,
}

/// One custom modifier of a LocalConstantSig blob.
#[derive(Debug, Clone, Copy)]
pub struct CustomModifier {
    /// True for `modreq`, false for `modopt`.
    pub required: bool,
    /// The modifier type as a `TypeDefOrRef` token.
    pub type_token: Token,
}

/// The shape of the constant encoded in a LocalConstantSig blob.
#[derive(Debug, Clone, Copy)]
pub enum ConstantKind {
    /// A primitive value typed by its element type code.
    Primitive {
        /// The element type code of the value.
        type_code: u8,
    },
    /// A primitive value belonging to an enum type.
    Enum {
        /// The element type code of the underlying value.
        type_code: u8,
        /// The enum type as a `TypeDefOrRef` token.
        enum_type: Token,
    },
    /// An `Object`, `ValueType` or `Class` constant.
    General {
        /// The element type code (`OBJECT`, `VALUETYPE` or `CLASS`).
        type_code: u8,
        /// The constant's type, when the encoding carries one.
        type_token: Option<Token>,
    },
}

/// The decoded Signature blob of a `LocalConstant` row.
#[derive(Debug, Clone)]
pub struct LocalConstantSig<'a> {
    /// Leading `modreq`/`modopt` custom modifiers.
    pub custom_modifiers: Vec<CustomModifier>,
    /// The constant's shape.
    pub kind: ConstantKind,
    /// The raw value bytes following the type encoding.
    pub value: &'a [u8],
}

/// One entry of an `ImportScope` Imports blob.
#[derive(Debug, Clone, Copy)]
#[allow(missing_docs)]
pub enum Import<'a> {
    Namespace { target_namespace: &'a str },
    AssemblyNamespace { assembly: Token, target_namespace: &'a str },
    Type { target_type: Token },
    XmlNamespace { alias: &'a str, target_namespace: &'a str },
    AssemblyReferenceAlias { alias: &'a str },
    AliasAssemblyReference { alias: &'a str, assembly: Token },
    AliasNamespace { alias: &'a str, target_namespace: &'a str },
    AliasAssemblyNamespace {
        alias: &'a str,
        assembly: Token,
        target_namespace: &'a str,
    },
    AliasType { alias: &'a str, target_type: Token },
}

impl<'data> Metadata<'data> {
    /// Assembles a `Document` name from its blob: a separator byte
    /// followed by blob-heap offsets of the path parts.
    pub fn parse_document_name(&self, blob: &[u8]) -> Result<String, Error> {
        let inner = || {
            let sep = blob.first().ok_or(ErrorKind::InvalidDocumentName)?;
            // Only one-character ASCII separators are supported;
            // System.Reflection.Metadata has the same limitation.
            if *sep > 0x7f {
                return Err(Error::from(ErrorKind::InvalidDocumentName));
            }
            let sep = if *sep == 0 {
                ""
            } else {
                std::str::from_utf8(&blob[..1])
                    .map_err(|e| Error::new(ErrorKind::InvalidStringData, e))?
            };

            let mut data = &blob[1..];
            let mut segments = Vec::new();
            while !data.is_empty() {
                let (part_offset, rest) = decode_unsigned(data)?;
                let seg = if part_offset == 0 {
                    ""
                } else {
                    // The part blob is a UTF-8 string that is not
                    // null-terminated.
                    let part = self.try_get_blob(part_offset)?;
                    std::str::from_utf8(part)
                        .map_err(|e| Error::new(ErrorKind::InvalidStringData, e))?
                };
                data = rest;
                segments.push(seg);
            }

            Ok(segments.join(sep))
        };

        inner().map_err(|e: Error| Error::new(ErrorKind::InvalidDocumentName, e))
    }

    /// Decodes the sequence points of a `MethodDebugInformation` row,
    /// accumulating the delta encoding into absolute lines and columns.
    ///
    /// A row without sequence points yields an empty list.
    pub fn parse_sequence_points(
        &self,
        method_debug_information: Cursor,
    ) -> Result<SequencePoints, Error> {
        let offset = self.get_heap_offset(
            method_debug_information,
            cols::method_debug_information::SEQUENCE_POINTS,
        )?;
        if offset == 0 {
            return Ok(SequencePoints {
                local_signature: 0,
                points: Vec::new(),
            });
        }
        let data = self.get_blob(method_debug_information, cols::method_debug_information::SEQUENCE_POINTS)?;

        let (local_signature, mut data) = decode_unsigned(data)?;

        let document = self
            .get_token(
                method_debug_information,
                cols::method_debug_information::DOCUMENT,
            )?
            .rid();

        // A method spanning multiple documents stores a nil Document
        // column and opens the blob with the initial document instead.
        let mut current_document = match document {
            0 => {
                let (initial_document, rest) = decode_unsigned(data)?;
                data = rest;
                initial_document
            }
            _ => document,
        };

        let mut points = Vec::new();
        let mut prev: Option<SequencePoint> = None;
        let mut prev_non_hidden: Option<SequencePoint> = None;

        while !data.is_empty() {
            // A zero IL delta on anything but the first record is a
            // document-change record.
            if prev.is_some() && data[0] == 0 {
                let (doc, rest) = decode_unsigned(&data[1..])?;
                current_document = doc;
                data = rest;
                continue;
            }

            let (point, rest) =
                self.parse_sequence_point(data, prev, prev_non_hidden, current_document)?;
            data = rest;

            points.push(point);
            prev = Some(point);
            if !point.is_hidden() {
                prev_non_hidden = Some(point);
            }
        }

        Ok(SequencePoints {
            local_signature,
            points,
        })
    }

    fn parse_sequence_point<'a>(
        &self,
        data: &'a [u8],
        prev: Option<SequencePoint>,
        prev_non_hidden: Option<SequencePoint>,
        document: u32,
    ) -> Result<(SequencePoint, &'a [u8]), Error> {
        let (il_offset, data) = match prev {
            Some(prev) => {
                let (delta_il_offset, data) = decode_unsigned(data)?;
                let il_offset = prev
                    .il_offset
                    .checked_add(delta_il_offset)
                    .ok_or(ErrorKind::InvalidSequencePoint)?;
                (il_offset, data)
            }
            None => decode_unsigned(data)?,
        };

        let (delta_lines, data) = decode_unsigned(data)?;
        let (delta_cols, data): (i64, &[u8]) = if delta_lines == 0 {
            let (n, data) = decode_unsigned(data)?;
            (n as i64, data)
        } else {
            let (n, data) = decode_signed(data)?;
            (n as i64, data)
        };

        if delta_lines == 0 && delta_cols == 0 {
            return Ok((SequencePoint::new_hidden(il_offset, document), data));
        }

        // The first non-hidden point stores absolute values; later ones
        // are signed deltas against the previous non-hidden point.
        let (start_line, start_column, data) = match prev_non_hidden {
            Some(prev) => {
                let (delta_start_line, data) = decode_signed(data)?;
                let (delta_start_col, data) = decode_signed(data)?;
                (
                    prev.start_line as i64 + delta_start_line as i64,
                    prev.start_column as i64 + delta_start_col as i64,
                    data,
                )
            }
            None => {
                let (start_line, data) = decode_unsigned(data)?;
                let (start_column, data) = decode_unsigned(data)?;
                (start_line as i64, start_column as i64, data)
            }
        };

        let end_line = start_line + delta_lines as i64;
        let end_column = start_column + delta_cols;

        let valid = (0..0x2000_0000).contains(&start_line)
            && (0..0x2000_0000).contains(&end_line)
            && (0..0x10000).contains(&start_column)
            && (0..0x10000).contains(&end_column)
            && start_line != 0xfeefee
            && end_line != 0xfeefee
            && il_offset < 0x2000_0000
            && (end_line > start_line || (end_line == start_line && end_column > start_column));
        if !valid {
            return Err(ErrorKind::InvalidSequencePoint.into());
        }

        Ok((
            SequencePoint {
                il_offset,
                start_line: start_line as u32,
                start_column: start_column as u32,
                end_line: end_line as u32,
                end_column: end_column as u32,
                document,
            },
            data,
        ))
    }

    /// Decodes a `LocalConstant` Signature blob.
    pub fn parse_local_constant_sig<'a>(
        &self,
        blob: &'a [u8],
    ) -> Result<LocalConstantSig<'a>, Error> {
        let mut data = blob;

        let mut custom_modifiers = Vec::new();
        let type_code = loop {
            let (element_type, rest) = decode_unsigned(data)
                .map_err(|e| Error::new(ErrorKind::InvalidConstantSignature, e))?;
            if element_type != ELEMENT_TYPE_CMOD_OPT && element_type != ELEMENT_TYPE_CMOD_REQD {
                data = rest;
                break element_type;
            }
            let (coded, rest) = decode_unsigned(rest)
                .map_err(|e| Error::new(ErrorKind::InvalidConstantSignature, e))?;
            // The spec calls this a TypeDefOrRefOrSpecEncoded token, but
            // that encoding matches the TypeDefOrRef coded index.
            let (table, rid) = CodedIndex::TypeDefOrRef
                .decompose(coded)
                .ok_or(ErrorKind::InvalidConstantSignature)?;
            custom_modifiers.push(CustomModifier {
                required: element_type == ELEMENT_TYPE_CMOD_REQD,
                type_token: Token::new(table, rid),
            });
            data = rest;
        };

        let decode_type_token = |data: &'a [u8]| -> Result<(Token, &'a [u8]), Error> {
            let (coded, rest) = decode_unsigned(data)
                .map_err(|e| Error::new(ErrorKind::InvalidConstantSignature, e))?;
            let (table, rid) = CodedIndex::TypeDefOrRef
                .decompose(coded)
                .ok_or(ErrorKind::InvalidConstantSignature)?;
            Ok((Token::new(table, rid), rest))
        };

        let (kind, value) = match type_code {
            ELEMENT_TYPE_OBJECT => (
                ConstantKind::General {
                    type_code: type_code as u8,
                    type_token: None,
                },
                data,
            ),
            ELEMENT_TYPE_VALUETYPE | ELEMENT_TYPE_CLASS => {
                let (type_token, rest) = decode_type_token(data)?;
                (
                    ConstantKind::General {
                        type_code: type_code as u8,
                        type_token: Some(type_token),
                    },
                    rest,
                )
            }
            ELEMENT_TYPE_R4 => {
                if data.len() != 4 {
                    return Err(ErrorKind::InvalidConstantSignature.into());
                }
                (
                    ConstantKind::Primitive {
                        type_code: type_code as u8,
                    },
                    data,
                )
            }
            ELEMENT_TYPE_R8 => {
                if data.len() != 8 {
                    return Err(ErrorKind::InvalidConstantSignature.into());
                }
                (
                    ConstantKind::Primitive {
                        type_code: type_code as u8,
                    },
                    data,
                )
            }
            ELEMENT_TYPE_STRING => (
                ConstantKind::Primitive {
                    type_code: type_code as u8,
                },
                data,
            ),
            // These value types might be enums: a TypeDefOrRefOrSpec
            // encoded type may follow the value.
            ELEMENT_TYPE_BOOLEAN | ELEMENT_TYPE_CHAR | ELEMENT_TYPE_I1 | ELEMENT_TYPE_U1
            | ELEMENT_TYPE_I2 | ELEMENT_TYPE_U2 | ELEMENT_TYPE_I4 | ELEMENT_TYPE_U4
            | ELEMENT_TYPE_I8 | ELEMENT_TYPE_U8 => {
                let value_size = match type_code {
                    ELEMENT_TYPE_BOOLEAN | ELEMENT_TYPE_I1 | ELEMENT_TYPE_U1 => 1,
                    ELEMENT_TYPE_CHAR | ELEMENT_TYPE_I2 | ELEMENT_TYPE_U2 => 2,
                    ELEMENT_TYPE_I4 | ELEMENT_TYPE_U4 => 4,
                    _ => 8,
                };
                let rest = data
                    .get(value_size..)
                    .ok_or(ErrorKind::InvalidConstantSignature)?;
                if rest.is_empty() {
                    (
                        ConstantKind::Primitive {
                            type_code: type_code as u8,
                        },
                        data,
                    )
                } else {
                    // Remaining data is the enum type; it is not part of
                    // the value.
                    let (enum_type, after) = decode_type_token(rest)?;
                    if !after.is_empty() {
                        return Err(ErrorKind::InvalidConstantSignature.into());
                    }
                    (
                        ConstantKind::Enum {
                            type_code: type_code as u8,
                            enum_type,
                        },
                        &data[..value_size],
                    )
                }
            }
            _ => return Err(ErrorKind::InvalidConstantSignature.into()),
        };

        Ok(LocalConstantSig {
            custom_modifiers,
            kind,
            value,
        })
    }

    /// Decodes an `ImportScope` Imports blob.
    pub fn parse_imports<'s>(&'s self, blob: &'s [u8]) -> Result<Vec<Import<'s>>, Error> {
        let mut data = blob;
        let mut imports = Vec::new();

        let get_utf8_blob = |offset: u32| -> Result<&'s str, Error> {
            let bytes = self.try_get_blob(offset)?;
            std::str::from_utf8(bytes).map_err(|e| Error::new(ErrorKind::InvalidImportsBlob, e))
        };

        while !data.is_empty() {
            let kind = read_u8(&mut data)?;
            let mut next_unsigned = || -> Result<u32, Error> {
                let (value, rest) = decode_unsigned(data)
                    .map_err(|e| Error::new(ErrorKind::InvalidImportsBlob, e))?;
                data = rest;
                Ok(value)
            };

            let import = match kind {
                1 => Import::Namespace {
                    target_namespace: get_utf8_blob(next_unsigned()?)?,
                },
                2 => {
                    let assembly = Token::new(TableId::AssemblyRef, next_unsigned()?);
                    Import::AssemblyNamespace {
                        assembly,
                        target_namespace: get_utf8_blob(next_unsigned()?)?,
                    }
                }
                3 => {
                    let (table, rid) = CodedIndex::TypeDefOrRef
                        .decompose(next_unsigned()?)
                        .ok_or(ErrorKind::InvalidImportsBlob)?;
                    Import::Type {
                        target_type: Token::new(table, rid),
                    }
                }
                4 => Import::XmlNamespace {
                    alias: get_utf8_blob(next_unsigned()?)?,
                    target_namespace: get_utf8_blob(next_unsigned()?)?,
                },
                5 => Import::AssemblyReferenceAlias {
                    alias: get_utf8_blob(next_unsigned()?)?,
                },
                6 => Import::AliasAssemblyReference {
                    alias: get_utf8_blob(next_unsigned()?)?,
                    assembly: Token::new(TableId::AssemblyRef, next_unsigned()?),
                },
                7 => Import::AliasNamespace {
                    alias: get_utf8_blob(next_unsigned()?)?,
                    target_namespace: get_utf8_blob(next_unsigned()?)?,
                },
                8 => Import::AliasAssemblyNamespace {
                    alias: get_utf8_blob(next_unsigned()?)?,
                    assembly: Token::new(TableId::AssemblyRef, next_unsigned()?),
                    target_namespace: get_utf8_blob(next_unsigned()?)?,
                },
                9 => {
                    let alias = get_utf8_blob(next_unsigned()?)?;
                    let (table, rid) = CodedIndex::TypeDefOrRef
                        .decompose(next_unsigned()?)
                        .ok_or(ErrorKind::InvalidImportsBlob)?;
                    Import::AliasType {
                        alias,
                        target_type: Token::new(table, rid),
                    }
                }
                _ => return Err(ErrorKind::InvalidImportsBlob.into()),
            };
            imports.push(import);
        }

        Ok(imports)
    }
}
