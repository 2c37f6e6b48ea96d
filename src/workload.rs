use xxhash_rust::xxh3::xxh3_64_with_seed;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Put(i32, i32),
    Get(i32),
    Del(i32),
}

/// Deterministic stream of random operations for one worker.
///
/// Keys are drawn from `keys` consecutive integers centred on zero, so about
/// half of them are negative.
#[derive(Debug, Clone)]
pub struct Workload {
    seed: u64,
    worker: u64,
    keys: u32,
    step: u64,
    remaining: usize,
}

impl Workload {
    pub fn new(seed: u64, worker: usize, keys: u32, ops: usize) -> Self {
        Self {
            seed,
            worker: worker as u64,
            keys: keys.max(1),
            step: 0,
            remaining: ops,
        }
    }

    #[inline]
    fn mix(&self) -> u64 {
        let mut input = [0u8; 16];
        input[..8].copy_from_slice(&self.worker.to_le_bytes());
        input[8..].copy_from_slice(&self.step.to_le_bytes());
        xxh3_64_with_seed(&input, self.seed)
    }
}

impl Iterator for Workload {
    type Item = Op;

    fn next(&mut self) -> Option<Op> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let hash = self.mix();
        self.step += 1;

        let offset = (hash >> 8) % self.keys as u64;
        let key = (offset as i64 - (self.keys / 2) as i64) as i32;
        Some(match hash % 3 {
            0 => Op::Put(key, (hash >> 32) as i32),
            1 => Op::Get(key),
            _ => Op::Del(key),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Workload {}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(op: &Op) -> i32 {
        match *op {
            Op::Put(key, _) | Op::Get(key) | Op::Del(key) => key,
        }
    }

    #[test]
    fn deterministic() {
        let first: Vec<Op> = Workload::new(7, 2, 1000, 500).collect();
        let second: Vec<Op> = Workload::new(7, 2, 1000, 500).collect();
        assert_eq!(first.len(), 500);
        assert_eq!(first, second);
        assert_ne!(first, Workload::new(7, 3, 1000, 500).collect::<Vec<_>>());
    }

    #[test]
    fn keys_stay_in_range() {
        let ops: Vec<Op> = Workload::new(0, 0, 1000, 10_000).collect();
        assert!(ops.iter().all(|op| (-500..500).contains(&key(op))));
        assert!(ops.iter().any(|op| key(op) < 0));
        assert!(ops.iter().any(|op| matches!(op, Op::Put(..))));
        assert!(ops.iter().any(|op| matches!(op, Op::Get(_))));
        assert!(ops.iter().any(|op| matches!(op, Op::Del(_))));
    }
}
