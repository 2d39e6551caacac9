//! LSM tree controller
//!
//! Owns the active MemTable and the level hierarchy of SSTables, routes
//! put/get, flushes the MemTable to level 0, and drives compaction.
//!
//! The controller is single-threaded and synchronous: mutating operations
//! take `&mut self` and compaction runs inline on the `put` that tripped
//! the threshold.

mod compaction;

use crate::error::{Result, SiltError};
use crate::memtable::MemTable;
use crate::sstable::SSTable;
use crate::types::{Entry, Timestamp};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// LSM tree configuration
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Maximum MemTable size before flush, in entries
    pub max_memtable_size: usize,
    /// Level-0 entry count that forces compaction after a flush
    pub l0_compaction_trigger: usize,
    /// Size ratio between adjacent levels
    pub level_size_multiplier: usize,
    /// Number of levels
    pub max_levels: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_memtable_size: crate::config::MAX_MEMTABLE_SIZE,
            l0_compaction_trigger: crate::config::L0_COMPACTION_TRIGGER,
            level_size_multiplier: crate::config::LEVEL_SIZE_MULTIPLIER,
            max_levels: crate::config::MAX_LEVEL,
        }
    }
}

/// Embedded LSM tree over a data directory
pub struct LsmTree {
    data_dir: PathBuf,
    config: TreeConfig,

    // Write path
    memtable: MemTable,

    // Read path: levels[0] receives flushes; within a level, later tables
    // are newer and shadow earlier ones
    levels: Vec<Vec<SSTable>>,
    level_sizes: Vec<usize>,

    // Counters
    sstable_counter: u64,
    last_stamp: Timestamp,
}

impl LsmTree {
    /// Open a tree over `dir` with the default configuration
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open_with_config(dir, TreeConfig::default())
    }

    /// Open a tree over `dir`, creating the directory if needed
    pub fn open_with_config<P: AsRef<Path>>(dir: P, config: TreeConfig) -> Result<Self> {
        let data_dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let levels = (0..config.max_levels).map(|_| Vec::new()).collect();
        let level_sizes = vec![0; config.max_levels];

        Ok(Self {
            data_dir,
            config,
            memtable: MemTable::new(),
            levels,
            level_sizes,
            sstable_counter: 0,
            last_stamp: 0,
        })
    }

    /// Insert a key-value pair.
    ///
    /// The empty key is reserved and rejected. Flushes the MemTable to a
    /// level-0 SSTable once it reaches the configured size.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(SiltError::EmptyKey);
        }

        self.memtable.put(key, value);

        if self.memtable.len() >= self.config.max_memtable_size {
            self.flush()?;
        }

        Ok(())
    }

    /// Look up a key, returning caller-owned value bytes.
    ///
    /// Checks the MemTable first, then levels in ascending order; within a
    /// level, tables are scanned newest-first so later writes shadow
    /// earlier ones.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(value) = self.memtable.get(key) {
            return Ok(Some(value.to_vec()));
        }

        for tables in self.levels.iter_mut() {
            for table in tables.iter_mut().rev() {
                if let Some(value) = table.get(key)? {
                    return Ok(Some(value));
                }
            }
        }

        Ok(None)
    }

    /// Get tree statistics
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            memtable_entries: self.memtable.len(),
            level_sizes: self.level_sizes.clone(),
            sstable_count: self.levels.iter().map(|tables| tables.len()).sum(),
        }
    }

    /// Spill the MemTable into a new level-0 SSTable and start a fresh one.
    ///
    /// Every entry of a flush shares one stamp, strictly greater than any
    /// earlier flush's, so recency across tables is decidable at merge
    /// time.
    fn flush(&mut self) -> Result<()> {
        let stamp = self.next_stamp();
        let path = self
            .data_dir
            .join(format!("L0_sstable_{}.db", self.sstable_counter));

        let entries: Vec<Entry> = self
            .memtable
            .iter()
            .map(|(key, value)| Entry::new(key.to_vec(), value.to_vec(), stamp))
            .collect();

        let mut table = SSTable::create(&path)?;
        table.write(&entries)?;

        info!("Flushed {} entries to {:?}", entries.len(), path);

        self.levels[0].push(table);
        self.level_sizes[0] += entries.len();
        self.memtable = MemTable::new();
        self.sstable_counter += 1;

        if self.level_sizes[0] >= self.config.l0_compaction_trigger {
            self.compact()?;
        }

        Ok(())
    }

    /// Next flush stamp: wall-clock seconds, clamped strictly increasing
    fn next_stamp(&mut self) -> Timestamp {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let stamp = now.max(self.last_stamp + 1);
        self.last_stamp = stamp;
        stamp
    }
}

/// Tree statistics
#[derive(Debug, Clone)]
pub struct TreeStats {
    pub memtable_entries: usize,
    pub level_sizes: Vec<usize>,
    pub sstable_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_single_entry() {
        let dir = TempDir::new().unwrap();
        let mut tree = LsmTree::open(dir.path()).unwrap();

        tree.put(b"key1", b"value1").unwrap();

        assert_eq!(tree.get(b"key1").unwrap(), Some(b"value1".to_vec()));
        assert_eq!(tree.get(b"missing").unwrap(), None);
    }

    #[test]
    fn test_overwrite_in_memtable() {
        let dir = TempDir::new().unwrap();
        let mut tree = LsmTree::open(dir.path()).unwrap();

        tree.put(b"k", b"a").unwrap();
        tree.put(b"k", b"b").unwrap();

        assert_eq!(tree.get(b"k").unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_empty_key_rejected() {
        let dir = TempDir::new().unwrap();
        let mut tree = LsmTree::open(dir.path()).unwrap();

        assert!(matches!(tree.put(b"", b"v"), Err(SiltError::EmptyKey)));
    }

    #[test]
    fn test_flush_boundary() {
        let dir = TempDir::new().unwrap();
        let config = TreeConfig {
            max_memtable_size: 1000,
            ..Default::default()
        };
        let mut tree = LsmTree::open_with_config(dir.path(), config).unwrap();

        let n = 1001;
        for i in 0..n {
            let key = format!("key_{i}");
            let value = format!("value_{i}");
            tree.put(key.as_bytes(), value.as_bytes()).unwrap();
        }

        let stats = tree.stats();
        assert!(stats.level_sizes[0] > 0);
        assert!(stats.memtable_entries <= 1);

        for i in 0..n {
            let key = format!("key_{i}");
            let value = format!("value_{i}");
            assert_eq!(
                tree.get(key.as_bytes()).unwrap(),
                Some(value.into_bytes()),
                "lost {key}"
            );
        }
    }

    #[test]
    fn test_memtable_shadows_flushed_value() {
        let dir = TempDir::new().unwrap();
        let config = TreeConfig {
            max_memtable_size: 10,
            ..Default::default()
        };
        let mut tree = LsmTree::open_with_config(dir.path(), config).unwrap();

        tree.put(b"k", b"old").unwrap();
        for i in 0..10 {
            tree.put(format!("fill_{i}").as_bytes(), b"x").unwrap();
        }
        assert!(tree.stats().level_sizes[0] > 0, "expected a flush");

        tree.put(b"k", b"new").unwrap();
        assert_eq!(tree.get(b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn test_newer_table_shadows_older_in_level() {
        let dir = TempDir::new().unwrap();
        let config = TreeConfig {
            max_memtable_size: 2,
            ..Default::default()
        };
        let mut tree = LsmTree::open_with_config(dir.path(), config).unwrap();

        tree.put(b"k", b"v1").unwrap();
        tree.put(b"fill_a", b"x").unwrap(); // flush #1
        tree.put(b"k", b"v2").unwrap();
        tree.put(b"fill_b", b"x").unwrap(); // flush #2

        assert_eq!(tree.stats().sstable_count, 2);
        assert_eq!(tree.get(b"k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn test_absence_stable_across_flush() {
        let dir = TempDir::new().unwrap();
        let config = TreeConfig {
            max_memtable_size: 5,
            ..Default::default()
        };
        let mut tree = LsmTree::open_with_config(dir.path(), config).unwrap();

        assert_eq!(tree.get(b"ghost").unwrap(), None);
        for i in 0..20 {
            tree.put(format!("key_{i}").as_bytes(), b"v").unwrap();
        }
        assert_eq!(tree.get(b"ghost").unwrap(), None);
    }

    #[test]
    fn test_flush_file_naming() {
        let dir = TempDir::new().unwrap();
        let config = TreeConfig {
            max_memtable_size: 2,
            ..Default::default()
        };
        let mut tree = LsmTree::open_with_config(dir.path(), config).unwrap();

        tree.put(b"a", b"1").unwrap();
        tree.put(b"b", b"2").unwrap();

        assert!(dir.path().join("L0_sstable_0.db").exists());
    }

    #[test]
    fn test_stats() {
        let dir = TempDir::new().unwrap();
        let mut tree = LsmTree::open(dir.path()).unwrap();

        tree.put(b"a", b"1").unwrap();
        tree.put(b"b", b"2").unwrap();

        let stats = tree.stats();
        assert_eq!(stats.memtable_entries, 2);
        assert_eq!(stats.sstable_count, 0);
        assert_eq!(stats.level_sizes, vec![0; crate::config::MAX_LEVEL]);
    }

    #[test]
    fn test_flushed_table_is_key_sorted() {
        let dir = TempDir::new().unwrap();
        let config = TreeConfig {
            max_memtable_size: 5,
            ..Default::default()
        };
        let mut tree = LsmTree::open_with_config(dir.path(), config).unwrap();

        for key in [b"e", b"b", b"d", b"a", b"c"] {
            tree.put(key, b"v").unwrap();
        }

        let entries = tree.levels[0][0].read_all_entries().unwrap();
        let keys: Vec<&[u8]> = entries.iter().map(|e| e.key.as_slice()).collect();
        assert_eq!(
            keys,
            vec![
                b"a".as_slice(),
                b"b".as_slice(),
                b"c".as_slice(),
                b"d".as_slice(),
                b"e".as_slice()
            ]
        );
    }

    #[test]
    fn test_flush_stamps_increase() {
        let dir = TempDir::new().unwrap();
        let config = TreeConfig {
            max_memtable_size: 1,
            ..Default::default()
        };
        let mut tree = LsmTree::open_with_config(dir.path(), config).unwrap();

        tree.put(b"a", b"1").unwrap();
        tree.put(b"b", b"2").unwrap();

        let first = tree.levels[0][0].read_all_entries().unwrap();
        let second = tree.levels[0][1].read_all_entries().unwrap();
        assert!(second[0].timestamp > first[0].timestamp);
    }
}
