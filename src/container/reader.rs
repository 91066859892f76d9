//! Container Reader
//!
//! Opens a container, parses the header and record table, and builds an
//! in-memory index. Payload bytes are never read here; callers fetch them on
//! demand through [`read_slot`]. Reading takes no locks and has no side
//! effects, so any number of readers may run concurrently.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use super::{format, Container};
use crate::error::{Error, Result};

/// Open a container and index its record table.
///
/// Fails with `ContainerNotFound` if the path is missing or unreadable and
/// with `ContainerCorrupt` if the header or record table cannot be parsed.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Container> {
    let path = path.as_ref();
    let not_found = || Error::ContainerNotFound {
        path: path.to_path_buf(),
    };

    let metadata = std::fs::metadata(path).map_err(|_| not_found())?;
    if !metadata.is_file() {
        return Err(not_found());
    }
    let file = File::open(path).map_err(|_| not_found())?;
    let mut reader = BufReader::new(file);

    let mut header = String::new();
    read_line(path, &mut reader, &mut header, "header")?;
    let version = format::parse_header(path, &header)?;

    let mut table = String::new();
    read_line(path, &mut reader, &mut table, "record table")?;
    let records = format::parse_table(path, &table)?;

    let payload_base = (header.len() + table.len()) as u64;
    let payload_len = metadata.len().saturating_sub(payload_base);
    format::validate(path, &records, payload_len)?;

    debug!(
        "Indexed {} record(s) from {} (format v{})",
        records.len(),
        path.display(),
        version
    );

    Ok(Container::from_parts(
        path.to_path_buf(),
        version,
        records,
        payload_base,
    ))
}

fn read_line(
    path: &Path,
    reader: &mut BufReader<File>,
    buf: &mut String,
    what: &str,
) -> Result<()> {
    match reader.read_line(buf) {
        Ok(0) => Err(Error::corrupt(path, format!("missing {}", what))),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            Err(Error::corrupt(path, format!("{} is not valid UTF-8", what)))
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// Read `len` bytes starting at absolute `offset` of a container file.
pub fn read_slot(path: &Path, offset: u64, len: u64) -> Result<Vec<u8>> {
    let mut file = File::open(path).map_err(|_| Error::ContainerNotFound {
        path: path.to_path_buf(),
    })?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(len as usize);
    file.take(len).read_to_end(&mut buf)?;
    if buf.len() as u64 != len {
        return Err(Error::corrupt(path, "payload truncated"));
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::format::{header_line, table_line};
    use crate::container::{DataKind, Payload, PayloadSlot, Record, RecordId};
    use std::fs;
    use tempfile::TempDir;

    fn write_raw(dir: &TempDir, name: &str, bytes: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    fn image(id: &str, offset: u64, len: u64) -> Record {
        Record {
            id: RecordId::new(id),
            name: id.to_string(),
            kind: DataKind::Image,
            refs: Vec::new(),
            asset: None,
            payload: PayloadSlot::Embedded { offset, len },
        }
    }

    #[test]
    fn test_open_missing_container() {
        let result = open("/nonexistent/nowhere.shelf");
        assert!(matches!(result, Err(Error::ContainerNotFound { .. })));
    }

    #[test]
    fn test_open_directory_is_not_found() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(open(dir.path()), Err(Error::ContainerNotFound { .. })));
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(&dir, "bad.shelf", b"\x00\x01not a container");
        assert!(matches!(open(&path), Err(Error::ContainerCorrupt { .. })));
    }

    #[test]
    fn test_open_rejects_missing_table() {
        let dir = TempDir::new().unwrap();
        let path = write_raw(&dir, "short.shelf", header_line(1).as_bytes());
        let err = open(&path).unwrap_err();
        assert!(err.to_string().contains("missing record table"));
    }

    #[test]
    fn test_open_and_read_payloads_lazily() {
        let dir = TempDir::new().unwrap();
        let records = vec![image("a", 0, 3), image("b", 3, 2)];
        let mut bytes = header_line(1).into_bytes();
        bytes.extend(table_line(&records).unwrap().into_bytes());
        bytes.extend(b"abcde");
        let path = write_raw(&dir, "ok.shelf", &bytes);

        let container = open(&path).unwrap();
        assert_eq!(container.len(), 2);
        assert_eq!(container.version(), 1);
        assert_eq!(container.read_payload("a").unwrap(), Payload::Bytes(b"abc".to_vec()));
        assert_eq!(container.read_payload("b").unwrap(), Payload::Bytes(b"de".to_vec()));
    }

    #[test]
    fn test_open_rejects_truncated_payload() {
        let dir = TempDir::new().unwrap();
        let records = vec![image("a", 0, 10)];
        let mut bytes = header_line(1).into_bytes();
        bytes.extend(table_line(&records).unwrap().into_bytes());
        bytes.extend(b"abc");
        let path = write_raw(&dir, "trunc.shelf", &bytes);
        assert!(matches!(open(&path), Err(Error::ContainerCorrupt { .. })));
    }
}
