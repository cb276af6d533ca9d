//! The `#Pdb` stream of the Portable PDB format.
//!
//! See <https://github.com/dotnet/runtime/blob/main/docs/design/specs/PortablePdb-Metadata.md#pdb-stream>.

use crate::bytes::{advance, read_u32, read_u64};
use crate::schema::MAX_TABLE_COUNT;
use crate::{Error, ErrorKind};

/// The decoded contents of a `#Pdb` stream.
#[derive(Debug, Clone)]
pub(crate) struct PdbInfo {
    /// A byte sequence uniquely representing the debugging metadata blob.
    pub id: [u8; 20],
    /// The entry-point MethodDef token, or 0.
    pub entry_point: u32,
    /// A bit per type-system table whose rows are referenced from this
    /// debugging metadata.
    pub referenced_tables: u64,
    /// Referenced row counts, indexed by table id; 0 for unreferenced
    /// tables.
    pub rows: [u32; MAX_TABLE_COUNT],
}

impl PdbInfo {
    pub(crate) fn parse(buf: &[u8]) -> Result<PdbInfo, Error> {
        let mut cur = buf;
        let id_bytes =
            advance(&mut cur, 20).map_err(|e| Error::new(ErrorKind::InvalidPdbStream, e))?;
        let mut id = [0u8; 20];
        id.copy_from_slice(id_bytes);

        let entry_point =
            read_u32(&mut cur).map_err(|e| Error::new(ErrorKind::InvalidPdbStream, e))?;
        let referenced_tables =
            read_u64(&mut cur).map_err(|e| Error::new(ErrorKind::InvalidPdbStream, e))?;

        let mut rows = [0u32; MAX_TABLE_COUNT];
        for (i, row) in rows.iter_mut().enumerate() {
            if (referenced_tables >> i) & 1 == 0 {
                continue;
            }
            *row = read_u32(&mut cur).map_err(|e| Error::new(ErrorKind::InvalidPdbStream, e))?;
        }

        Ok(PdbInfo {
            id,
            entry_point,
            referenced_tables,
            rows,
        })
    }

    /// Serializes the stream back to its on-disk form.
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let count = self.referenced_tables.count_ones() as usize;
        let mut buf = Vec::with_capacity(32 + count * 4);
        buf.extend_from_slice(&self.id);
        buf.extend_from_slice(&self.entry_point.to_le_bytes());
        buf.extend_from_slice(&self.referenced_tables.to_le_bytes());
        for (i, row) in self.rows.iter().enumerate() {
            if (self.referenced_tables >> i) & 1 != 0 {
                buf.extend_from_slice(&row.to_le_bytes());
            }
        }
        buf
    }
}
