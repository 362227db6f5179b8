//! Portable PDB reader: method → (document, first line).
//!
//! The PDB metadata root carries a `#Pdb` stream that dotscope's root reader
//! does not accept, so the stream directory is walked here and the `#~` and
//! `#Blob` streams are handed to dotscope. Document and
//! MethodDebugInformation come first in a PDB table stream, so their rows
//! read correctly without the type-system row counts kept in `#Pdb`.

use std::ops::Range;
use std::path::{Path, PathBuf};

use dotscope::metadata::tables::{DocumentRaw, MethodDebugInformationRaw};
use dotscope::{Blob, Parser, TablesHeader};
use tracing::trace;

use super::MetadataError;

type Result<T> = std::result::Result<T, MetadataError>;

/// Sequence-point information of one module.
#[derive(Debug, Default)]
pub struct PortablePdb {
    documents: Vec<PathBuf>,
    /// Indexed by MethodDef row - 1: document row and first visible line.
    methods: Vec<Option<(u32, u32)>>,
}

impl PortablePdb {
    /// Open `path` if it is a portable PDB. Windows PDBs yield `Ok(None)`.
    pub fn open(path: &Path) -> Result<Option<Self>> {
        let data = std::fs::read(path).map_err(|_| MetadataError::Missing("readable pdb"))?;
        Self::parse(&data)
    }

    pub fn parse(data: &[u8]) -> Result<Option<Self>> {
        if data.get(..4) != Some(b"BSJB".as_slice()) {
            return Ok(None);
        }
        let streams = stream_directory(data)?;
        let stream = |name: &'static str| {
            streams
                .iter()
                .find(|(n, _)| n == name)
                .and_then(|(_, range)| data.get(range.clone()))
                .ok_or(MetadataError::Missing(name))
        };
        let tables = TablesHeader::from(stream("#~")?)?;
        let blobs = Blob::from(stream("#Blob")?)?;

        let mut pdb = Self::default();
        if let Some(documents) = tables.table::<DocumentRaw>() {
            for row in 1..=documents.row_count {
                let name = documents
                    .get(row)?
                    .ok_or(MetadataError::BadRow { table: "DocumentRaw", row })?
                    .name;
                pdb.documents.push(document_name(&blobs, name)?);
            }
        }
        if let Some(methods) = tables.table::<MethodDebugInformationRaw>() {
            for row in 1..=methods.row_count {
                let point = methods.get(row)?.and_then(|info| {
                    if info.sequence_points == 0 {
                        return None;
                    }
                    let blob = blobs.get(info.sequence_points as usize).ok()?;
                    first_sequence_point(blob, info.document)
                        .inspect_err(|e| trace!(method = row, error = %e, "unreadable sequence points"))
                        .ok()
                        .flatten()
                });
                pdb.methods.push(point);
            }
        }
        Ok(Some(pdb))
    }

    /// Document path and first non-hidden line of a MethodDef row.
    pub fn method_location(&self, method_row: u32) -> Option<(PathBuf, usize)> {
        let (document, line) = (*self.methods.get((method_row as usize).wrapping_sub(1))?)?;
        let path = self.documents.get((document as usize).wrapping_sub(1))?;
        Some((path.clone(), line as usize))
    }
}

/// Names and byte ranges of the streams under a metadata root.
fn stream_directory(data: &[u8]) -> Result<Vec<(String, Range<usize>)>> {
    let mut parser = Parser::new(data);
    parser.advance_by(12)?;
    let version_len = parser.read_le::<u32>()? as usize;
    parser.advance_by(version_len)?;
    parser.advance_by(2)?;
    let count = parser.read_le::<u16>()?;

    let mut streams = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let offset = parser.read_le::<u32>()? as usize;
        let size = parser.read_le::<u32>()? as usize;
        let start = parser.pos();
        let mut name = String::new();
        loop {
            match parser.read_le::<u8>()? {
                0 => break,
                byte => name.push(char::from(byte)),
            }
        }
        let padded = (parser.pos() - start).next_multiple_of(4);
        parser.seek(start + padded)?;
        let end = offset
            .checked_add(size)
            .filter(|end| *end <= data.len())
            .ok_or(MetadataError::OutOfBounds("pdb stream"))?;
        streams.push((name, offset..end));
    }
    Ok(streams)
}

/// Separator byte followed by blob indexes of the path parts.
fn document_name(blobs: &Blob<'_>, index: u32) -> Result<PathBuf> {
    let mut parser = Parser::new(blobs.get(index as usize)?);
    let separator = match parser.read_le::<u8>()? {
        0 => String::new(),
        byte => char::from(byte).to_string(),
    };
    let mut parts = Vec::new();
    while parser.has_more_data() {
        let part = parser.read_compressed_uint()?;
        parts.push(if part == 0 {
            String::new()
        } else {
            String::from_utf8_lossy(blobs.get(part as usize)?).into_owned()
        });
    }
    Ok(PathBuf::from(parts.join(&separator)))
}

/// Decode a sequence-point blob up to the first visible point.
fn first_sequence_point(blob: &[u8], document: u32) -> Result<Option<(u32, u32)>> {
    let mut parser = Parser::new(blob);
    parser.read_compressed_uint()?;
    let mut document = if document == 0 {
        parser.read_compressed_uint()?
    } else {
        document
    };
    let mut first = true;
    while parser.has_more_data() {
        let il_delta = parser.read_compressed_uint()?;
        if il_delta == 0 && !first {
            document = parser.read_compressed_uint()?;
            continue;
        }
        first = false;
        let line_delta = parser.read_compressed_uint()?;
        let column_delta = if line_delta == 0 {
            i64::from(parser.read_compressed_uint()?)
        } else {
            i64::from(parser.read_compressed_int()?)
        };
        if line_delta == 0 && column_delta == 0 {
            continue;
        }
        let start_line = parser.read_compressed_uint()?;
        return Ok(Some((document, start_line)));
    }
    Ok(None)
}
