//! On-disk layout of `.shelf` containers
//!
//! ```text
//! ASSETSHELF 1\n                  header: magic and format version
//! {"records":[...]}\n             record table, single-line JSON
//! <payload bytes>                 payload section
//! ```
//!
//! Embedded payload slots are offsets relative to the start of the payload
//! section. The table is kept on one line so the reader can locate the payload
//! section without parsing any payload bytes.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{PayloadSlot, Record};
use crate::error::{Error, Result};

/// Magic word opening every container.
pub const MAGIC: &str = "ASSETSHELF";

/// Format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Serialized form of the record table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordTable {
    pub records: Vec<Record>,
}

/// The header line, including its trailing newline.
pub fn header_line(version: u32) -> String {
    format!("{} {}\n", MAGIC, version)
}

/// Parse a header line and return its format version.
pub fn parse_header(path: &Path, line: &str) -> Result<u32> {
    let line = line
        .strip_suffix('\n')
        .ok_or_else(|| Error::corrupt(path, "truncated header"))?;
    let (magic, version) = line
        .split_once(' ')
        .ok_or_else(|| Error::corrupt(path, "malformed header"))?;
    if magic != MAGIC {
        return Err(Error::corrupt(path, format!("unknown magic '{}'", magic)));
    }
    let version: u32 = version
        .trim()
        .parse()
        .map_err(|_| Error::corrupt(path, format!("invalid format version '{}'", version)))?;
    if version == 0 || version > FORMAT_VERSION {
        return Err(Error::corrupt(
            path,
            format!("unsupported format version {}", version),
        ));
    }
    Ok(version)
}

/// Encode the record table line, including its trailing newline.
pub fn table_line(records: &[Record]) -> Result<String> {
    let table = RecordTable {
        records: records.to_vec(),
    };
    let mut line = serde_json::to_string(&table)?;
    line.push('\n');
    Ok(line)
}

/// Decode a record table line.
pub fn parse_table(path: &Path, line: &str) -> Result<Vec<Record>> {
    let line = line
        .strip_suffix('\n')
        .ok_or_else(|| Error::corrupt(path, "truncated record table"))?;
    let table: RecordTable = serde_json::from_str(line)
        .map_err(|e| Error::corrupt(path, format!("unreadable record table: {}", e)))?;
    Ok(table.records)
}

/// Check the structural invariants of a record table.
///
/// Identifiers must be unique, every reference edge must point at a record of
/// the same container, and every embedded slot must fit inside the payload
/// section.
pub fn validate(path: &Path, records: &[Record], payload_len: u64) -> Result<()> {
    let mut ids = HashSet::new();
    for record in records {
        if record.id.as_str().is_empty() {
            return Err(Error::corrupt(path, "record with an empty id"));
        }
        if !ids.insert(record.id.as_str()) {
            return Err(Error::corrupt(
                path,
                format!("duplicate record id '{}'", record.id),
            ));
        }
    }

    for record in records {
        if let Some(missing) = record.refs.iter().find(|r| !ids.contains(r.as_str())) {
            return Err(Error::corrupt(
                path,
                format!("record '{}' references missing record '{}'", record.id, missing),
            ));
        }
        if let PayloadSlot::Embedded { offset, len } = record.payload {
            let end = offset.checked_add(len);
            if end.is_none_or(|end| end > payload_len) {
                return Err(Error::corrupt(
                    path,
                    format!("payload of '{}' runs past the end of the file", record.id),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{DataKind, RecordId};

    fn embedded(id: &str, offset: u64, len: u64, refs: &[&str]) -> Record {
        Record {
            id: RecordId::new(id),
            name: id.to_string(),
            kind: DataKind::Image,
            refs: refs.iter().map(|r| RecordId::new(*r)).collect(),
            asset: None,
            payload: PayloadSlot::Embedded { offset, len },
        }
    }

    #[test]
    fn test_parse_header() {
        let path = Path::new("x.shelf");
        assert_eq!(parse_header(path, &header_line(1)).unwrap(), 1);
        assert!(parse_header(path, "ASSETSHELF 1").is_err());
        assert!(parse_header(path, "BLENDER 1\n").is_err());
        assert!(parse_header(path, "ASSETSHELF x\n").is_err());
        assert!(parse_header(path, "ASSETSHELF 99\n").is_err());
    }

    #[test]
    fn test_table_line_is_single_line() {
        let mut record = embedded("a", 0, 3, &[]);
        record.name = "multi\nline".to_string();
        let line = table_line(&[record.clone()]).unwrap();
        assert_eq!(line.matches('\n').count(), 1);
        assert_eq!(parse_table(Path::new("x"), &line).unwrap(), vec![record]);
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let records = vec![embedded("a", 0, 0, &[]), embedded("a", 0, 0, &[])];
        let err = validate(Path::new("x"), &records, 0).unwrap_err();
        assert!(err.to_string().contains("duplicate record id"));
    }

    #[test]
    fn test_validate_rejects_dangling_refs() {
        let records = vec![embedded("a", 0, 0, &["ghost"])];
        let err = validate(Path::new("x"), &records, 0).unwrap_err();
        assert!(err.to_string().contains("missing record 'ghost'"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_slots() {
        let records = vec![embedded("a", 4, 8, &[])];
        assert!(validate(Path::new("x"), &records, 10).is_err());
        assert!(validate(Path::new("x"), &records, 12).is_ok());

        let overflow = vec![embedded("a", u64::MAX, 2, &[])];
        assert!(validate(Path::new("x"), &overflow, 12).is_err());
    }

    #[test]
    fn test_validate_accepts_cycles() {
        let records = vec![embedded("a", 0, 0, &["b"]), embedded("b", 0, 0, &["a"])];
        assert!(validate(Path::new("x"), &records, 0).is_ok());
    }
}
