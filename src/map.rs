use std::fmt;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub key: i32,
    pub value: i32,
}

/// Fixed-size hash map with one lock per bucket.
///
/// Collisions are chained: every bucket owns a `Vec<Entry>` in insertion
/// order, guarded by its own mutex. The `size` and `op_count` counters each
/// sit behind a separate mutex, and no operation ever holds two locks at once.
/// The counters are updated after the bucket lock is released, so they can
/// briefly lag the chains while operations are in flight. A `del` can undo a
/// `put` before that `put` has counted its entry, so `size` is signed and may
/// dip below zero for a moment.
pub struct ChainedMap {
    buckets: Box<[Mutex<Vec<Entry>>]>,
    size: Mutex<isize>,
    op_count: Mutex<usize>,
}

/// Result of a successful [`ChainedMap::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub capacity: usize,
    pub entries: usize,
    pub longest_chain: usize,
    pub empty_buckets: usize,
    pub op_count: usize,
}

impl ChainedMap {
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::InvalidCapacity(capacity));
        }
        Ok(Self {
            buckets: (0..capacity).map(|_| Mutex::new(Vec::new())).collect(),
            size: Mutex::new(0),
            op_count: Mutex::new(0),
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Bucket for `key`: its bit pattern read as unsigned, modulo capacity.
    #[inline]
    pub fn bucket_index(&self, key: i32) -> usize {
        key as u32 as usize % self.buckets.len()
    }

    pub fn get(&self, key: i32) -> Option<i32> {
        let chain = self.buckets[self.bucket_index(key)].lock();
        let value = chain
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value);
        drop(chain);
        self.count_op();
        value
    }

    /// Inserts or replaces, returning the previous value.
    pub fn put(&self, key: i32, value: i32) -> Option<i32> {
        let mut chain = self.buckets[self.bucket_index(key)].lock();
        let previous = chain
            .iter_mut()
            .find(|entry| entry.key == key)
            .map(|entry| std::mem::replace(&mut entry.value, value));
        if previous.is_none() {
            chain.push(Entry { key, value });
        }
        drop(chain);

        if previous.is_none() {
            *self.size.lock() += 1;
        }
        self.count_op();
        previous
    }

    /// Removes `key`, returning its value.
    ///
    /// Unlike `get` and `put`, the operation is counted before the bucket is
    /// locked. The counter has its own lock, so the order is not observable.
    pub fn del(&self, key: i32) -> Option<i32> {
        self.count_op();
        let mut chain = self.buckets[self.bucket_index(key)].lock();
        let position = chain.iter().position(|entry| entry.key == key);
        let removed = position.map(|position| chain.remove(position).value);
        drop(chain);

        if removed.is_some() {
            *self.size.lock() -= 1;
        }
        removed
    }

    /// Number of live entries as recorded by the size counter, floored at 0.
    pub fn len(&self) -> usize {
        (*self.size.lock()).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completed `get`, `put` and `del` calls.
    pub fn op_count(&self) -> usize {
        *self.op_count.lock()
    }

    /// Every entry, bucket by bucket, in chain order.
    ///
    /// Buckets are locked one at a time, so the result is only a consistent
    /// snapshot when no other thread is mutating the map.
    pub fn entries(&self) -> Vec<(i32, i32)> {
        let mut entries = Vec::with_capacity(self.len());
        for bucket in self.buckets.iter() {
            entries.extend(bucket.lock().iter().map(|entry| (entry.key, entry.value)));
        }
        entries
    }

    pub fn chain_lengths(&self) -> Vec<usize> {
        self.buckets.iter().map(|bucket| bucket.lock().len()).collect()
    }

    /// Audits every chain and the size counter.
    ///
    /// Meant for quiescent maps: concurrent writers can make the size check
    /// fail spuriously.
    pub fn verify(&self) -> Result<Stats> {
        let lengths = self
            .buckets
            .par_iter()
            .enumerate()
            .map(|(bucket, chain)| {
                let chain = chain.lock();
                for (position, entry) in chain.iter().enumerate() {
                    let expected = self.bucket_index(entry.key);
                    if expected != bucket {
                        return Err(Error::MisplacedKey {
                            key: entry.key,
                            bucket,
                            expected,
                        });
                    }
                    if chain[..position].iter().any(|other| other.key == entry.key) {
                        return Err(Error::DuplicateKey {
                            key: entry.key,
                            bucket,
                        });
                    }
                }
                Ok(chain.len())
            })
            .collect::<Result<Vec<usize>>>()?;

        let counted: usize = lengths.iter().sum();
        let recorded = *self.size.lock();
        if recorded != counted as isize {
            return Err(Error::SizeMismatch { recorded, counted });
        }

        Ok(Stats {
            capacity: self.capacity(),
            entries: counted,
            longest_chain: lengths.iter().copied().max().unwrap_or(0),
            empty_buckets: lengths.iter().filter(|&&length| length == 0).count(),
            op_count: self.op_count(),
        })
    }

    #[inline]
    fn count_op(&self) {
        *self.op_count.lock() += 1;
    }
}

impl fmt::Display for ChainedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, bucket) in self.buckets.iter().enumerate() {
            write!(f, "[{}] -> ", index)?;
            let chain = bucket.lock();
            for (position, entry) in chain.iter().enumerate() {
                if position > 0 {
                    f.write_str(" -> ")?;
                }
                write!(f, "({},{})", entry.key, entry.value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_example() {
        let map = ChainedMap::with_capacity(4).unwrap();
        assert_eq!(map.put(5, 100), None);
        assert_eq!(map.put(9, 200), None);
        assert_eq!(map.bucket_index(5), map.bucket_index(9));
        assert_eq!(map.get(5), Some(100));
        assert_eq!(map.get(9), Some(200));
        assert_eq!(map.del(5), Some(100));
        assert_eq!(map.get(5), None);
        assert_eq!(map.get(9), Some(200));
        assert_eq!(map.len(), 1);
        assert_eq!(map.op_count(), 7);
    }

    #[test]
    fn zero_capacity() {
        assert!(matches!(
            ChainedMap::with_capacity(0),
            Err(Error::InvalidCapacity(0))
        ));
    }

    #[test]
    fn replace_keeps_size_and_order() {
        let map = ChainedMap::with_capacity(1).unwrap();
        map.put(1, 10);
        map.put(2, 20);
        map.put(3, 30);
        assert_eq!(map.put(2, 21), Some(20));
        assert_eq!(map.len(), 3);
        assert_eq!(map.entries(), vec![(1, 10), (2, 21), (3, 30)]);
    }

    #[test]
    fn delete_head_middle_tail() {
        let map = ChainedMap::with_capacity(1).unwrap();
        for key in 0..5 {
            map.put(key, key * 10);
        }
        assert_eq!(map.del(0), Some(0));
        assert_eq!(map.del(2), Some(20));
        assert_eq!(map.del(4), Some(40));
        assert_eq!(map.entries(), vec![(1, 10), (3, 30)]);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn delete_missing() {
        let map = ChainedMap::with_capacity(8).unwrap();
        assert_eq!(map.del(3), None);
        map.put(3, 1);
        assert_eq!(map.del(11), None);
        assert_eq!(map.len(), 1);
        // del on an empty bucket is still counted
        assert_eq!(map.op_count(), 3);
    }

    #[test]
    fn negative_keys() {
        let map = ChainedMap::with_capacity(4).unwrap();
        assert_eq!(map.bucket_index(-1), 3);
        assert_eq!(map.bucket_index(-3), 1);
        assert_eq!(map.bucket_index(i32::MIN), 0);

        let map = ChainedMap::with_capacity(10).unwrap();
        assert_eq!(map.bucket_index(-1), 5);
        map.put(-1, 7);
        assert_eq!(map.get(-1), Some(7));
        assert_eq!(map.chain_lengths()[5], 1);
    }

    #[test]
    fn max_value_is_storable() {
        let map = ChainedMap::with_capacity(2).unwrap();
        assert_eq!(map.put(1, i32::MAX), None);
        assert_eq!(map.get(1), Some(i32::MAX));
        assert_eq!(map.put(1, 0), Some(i32::MAX));
    }

    #[test]
    fn dump_format() {
        let map = ChainedMap::with_capacity(3).unwrap();
        map.put(0, 1);
        map.put(3, 2);
        map.put(2, 5);
        assert_eq!(map.to_string(), "[0] -> (0,1) -> (3,2)\n[1] -> \n[2] -> (2,5)\n");
    }

    #[test]
    fn verify_stats() {
        let map = ChainedMap::with_capacity(4).unwrap();
        for key in [1, 5, 9, 2] {
            map.put(key, key);
        }
        let stats = map.verify().unwrap();
        assert_eq!(
            stats,
            Stats {
                capacity: 4,
                entries: 4,
                longest_chain: 3,
                empty_buckets: 2,
                op_count: 4,
            }
        );
    }

    #[test]
    fn verify_detects_corruption() {
        let map = ChainedMap::with_capacity(4).unwrap();
        map.put(1, 1);
        map.buckets[2].lock().push(Entry { key: 1, value: 2 });
        assert!(matches!(
            map.verify(),
            Err(Error::MisplacedKey {
                key: 1,
                bucket: 2,
                expected: 1
            })
        ));

        let map = ChainedMap::with_capacity(4).unwrap();
        map.put(1, 1);
        map.buckets[1].lock().push(Entry { key: 1, value: 2 });
        assert!(matches!(
            map.verify(),
            Err(Error::DuplicateKey { key: 1, bucket: 1 })
        ));

        let map = ChainedMap::with_capacity(4).unwrap();
        map.buckets[0].lock().push(Entry { key: 4, value: 4 });
        assert!(matches!(
            map.verify(),
            Err(Error::SizeMismatch {
                recorded: 0,
                counted: 1
            })
        ));
    }

    #[test]
    fn lagging_size_reads_as_empty() {
        // A del that beats the put's counter update leaves size at -1.
        let map = ChainedMap::with_capacity(2).unwrap();
        *map.size.lock() = -1;
        assert_eq!(map.len(), 0);
        assert!(map.is_empty());
        assert!(map.entries().is_empty());
        assert!(matches!(
            map.verify(),
            Err(Error::SizeMismatch {
                recorded: -1,
                counted: 0
            })
        ));

        map.put(3, 3);
        assert_eq!(map.len(), 0);
        map.put(4, 4);
        assert_eq!(map.len(), 1);
        assert_eq!(map.del(3), Some(3));
        assert_eq!(map.del(4), Some(4));
        assert_eq!(map.len(), 0);
    }
}
