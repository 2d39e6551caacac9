//! SSTable - immutable on-disk sorted string tables
//!
//! An SSTable is a flat concatenation of key-sorted entries:
//!
//! ```text
//! repeated:
//!   key_len(u32 LE) | key | value_len(u32 LE) | value | timestamp(i64 LE)
//! ```
//!
//! No header, no footer, no checksums; end-of-file is the only terminator.
//! An in-memory index maps each key to its entry's byte offset so point
//! lookups cost one seek.

use crate::error::{Result, SiltError};
use crate::types::Entry;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// An on-disk sorted table with an in-memory key -> offset index
pub struct SSTable {
    path: PathBuf,
    file: File,
    index: BTreeMap<Vec<u8>, u64>,
}

impl SSTable {
    /// Create an SSTable file at `path`, open for read and write
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        Ok(Self {
            path,
            file,
            index: BTreeMap::new(),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a batch of entries assumed to be in ascending key order.
    ///
    /// Intended to be called once per table; a second call appends without
    /// clearing the index. If the batch carries duplicate keys the index
    /// keeps the offset of the first copy.
    pub fn write(&mut self, entries: &[Entry]) -> Result<()> {
        let mut offset = self.file.stream_position()?;
        let mut writer = BufWriter::new(&mut self.file);

        for entry in entries {
            self.index.entry(entry.key.clone()).or_insert(offset);

            writer.write_u32::<LittleEndian>(entry.key.len() as u32)?;
            writer.write_all(&entry.key)?;
            writer.write_u32::<LittleEndian>(entry.value.len() as u32)?;
            writer.write_all(&entry.value)?;
            writer.write_i64::<LittleEndian>(entry.timestamp)?;

            offset += 4 + entry.key.len() as u64 + 4 + entry.value.len() as u64 + 8;
        }

        writer.flush()?;
        Ok(())
    }

    /// Point lookup for a single key.
    ///
    /// Returns the value bytes, owned by the caller. The on-disk key is
    /// re-read as a sanity check; a mismatch reports absence rather than
    /// an error.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.get(key) {
            Some(offset) => *offset,
            None => return Ok(None),
        };

        self.file.seek(SeekFrom::Start(offset))?;

        let key_len = self.file.read_u32::<LittleEndian>()? as usize;
        let mut stored_key = vec![0u8; key_len];
        self.file.read_exact(&mut stored_key)?;
        if stored_key != key {
            return Ok(None);
        }

        let value_len = self.file.read_u32::<LittleEndian>()? as usize;
        let mut value = vec![0u8; value_len];
        self.file.read_exact(&mut value)?;
        // Trailing timestamp is not needed for point reads

        Ok(Some(value))
    }

    /// Read every entry in file order (ascending key order by the writer's
    /// precondition).
    ///
    /// Clean EOF is only recognized at a record boundary; a truncated
    /// record is an error.
    pub fn read_all_entries(&mut self) -> Result<Vec<Entry>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut entries = Vec::new();

        while let Some(key_len) = read_len_or_eof(&mut self.file)? {
            let mut key = vec![0u8; key_len as usize];
            self.file.read_exact(&mut key)?;

            let value_len = self.file.read_u32::<LittleEndian>()? as usize;
            let mut value = vec![0u8; value_len];
            self.file.read_exact(&mut value)?;

            let timestamp = self.file.read_i64::<LittleEndian>()?;

            entries.push(Entry::new(key, value, timestamp));
        }

        Ok(entries)
    }

    /// Number of distinct keys in the index
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Read the next record's length prefix, distinguishing clean EOF (zero
/// bytes available at the boundary) from a truncated prefix.
fn read_len_or_eof(file: &mut File) -> Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;

    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(SiltError::Corruption(
                "truncated length prefix in SSTable".into(),
            ));
        }
        filled += n;
    }

    Ok(Some(u32::from_le_bytes(buf)))
}
