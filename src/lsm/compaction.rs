//! Level compaction for the LSM tree
//!
//! A level is *empty*, *accumulating* (below its size threshold), or in
//! *overflow*; compaction drains an overflowing level into the next one by
//! merging every table of both levels into a single new table, resolving
//! key collisions by flush stamp (newest wins).

use super::LsmTree;
use crate::error::{Result, SiltError};
use crate::sstable::SSTable;
use tracing::info;

impl LsmTree {
    /// Sweep the levels, merging each into the next while it is at or
    /// above its size threshold.
    ///
    /// Level `i` holds up to `multiplier^(i+1)` entries; a merge may push
    /// the next level past its own threshold, so the sweep cascades until
    /// it reaches a level with room.
    pub fn compact(&mut self) -> Result<()> {
        for level in 0..self.config.max_levels - 1 {
            let threshold = self.config.level_size_multiplier.pow((level + 1) as u32);
            if self.level_sizes[level] >= threshold {
                self.merge_level(level)?;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Administrative compaction of a single level, bypassing thresholds.
    ///
    /// Flushes a non-empty MemTable first so its entries participate.
    /// Merging out of the last level is refused; an empty level is a no-op.
    pub fn force_compaction(&mut self, level: usize) -> Result<()> {
        if level + 1 >= self.config.max_levels {
            return Err(SiltError::InvalidLevel(level));
        }

        if !self.memtable.is_empty() {
            self.flush()?;
        }

        if self.levels[level].is_empty() {
            return Ok(());
        }

        self.merge_level(level)
    }

    /// Merge every table of `level` and `level + 1` into one new table at
    /// `level + 1`.
    ///
    /// Both levels are fully drained into the merge, so on success the
    /// destination level holds exactly the merge output and the size
    /// counters stay exact. On failure nothing is wired in; a partial
    /// destination file may remain on disk.
    fn merge_level(&mut self, level: usize) -> Result<()> {
        let next = level + 1;
        if next >= self.config.max_levels {
            return Ok(());
        }

        let mut entries = Vec::new();
        for table in self.levels[level].iter_mut() {
            entries.extend(table.read_all_entries()?);
        }
        for table in self.levels[next].iter_mut() {
            entries.extend(table.read_all_entries()?);
        }

        // Key ascending, newest stamp first; one survivor per key
        entries.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| b.timestamp.cmp(&a.timestamp)));
        entries.dedup_by(|a, b| a.key == b.key);

        let path = self
            .data_dir
            .join(format!("L{}_merged_{}.db", next, self.sstable_counter));
        let mut dest = SSTable::create(&path)?;
        dest.write(&entries)?;

        info!(
            "Merged level {} into level {}: {} entries",
            level,
            next,
            entries.len()
        );

        self.levels[level].clear();
        self.levels[next].clear();
        self.levels[next].push(dest);
        self.level_sizes[next] = entries.len();
        self.level_sizes[level] = 0;
        self.sstable_counter += 1;

        Ok(())
    }
}
