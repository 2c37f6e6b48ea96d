use std::{
    ops::AddAssign,
    sync::{Arc, Barrier},
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use crate::{
    config::Config,
    error::{Error, Result},
    map::{ChainedMap, Stats},
    workload::{Op, Workload},
};

/// What one worker observed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub puts: usize,
    pub gets: usize,
    pub dels: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub hits: usize,
    pub removed: usize,
}

impl Tally {
    pub fn ops(&self) -> usize {
        self.puts + self.gets + self.dels
    }

    /// Net change this worker made to the number of entries.
    pub fn net(&self) -> isize {
        self.inserted as isize - self.removed as isize
    }

    fn apply(&mut self, map: &ChainedMap, op: Op) {
        match op {
            Op::Put(key, value) => {
                self.puts += 1;
                match map.put(key, value) {
                    Some(_) => self.replaced += 1,
                    None => self.inserted += 1,
                }
            }
            Op::Get(key) => {
                self.gets += 1;
                if map.get(key).is_some() {
                    self.hits += 1;
                }
            }
            Op::Del(key) => {
                self.dels += 1;
                if map.del(key).is_some() {
                    self.removed += 1;
                }
            }
        }
    }
}

impl AddAssign for Tally {
    fn add_assign(&mut self, other: Self) {
        self.puts += other.puts;
        self.gets += other.gets;
        self.dels += other.dels;
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.hits += other.hits;
        self.removed += other.removed;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Report {
    pub threads: usize,
    pub tally: Tally,
    pub stats: Stats,
    pub elapsed: Duration,
}

impl Report {
    /// Every call was counted and the inserts minus removals match the map.
    pub fn is_consistent(&self) -> bool {
        self.stats.op_count == self.tally.ops()
            && self.tally.net() == self.stats.entries as isize
    }
}

/// Runs `config.threads` workers against `map` and audits it afterwards.
///
/// The map is expected to start empty and to be touched by nobody else while
/// the run is in progress.
pub fn run(map: &Arc<ChainedMap>, config: &Config) -> Result<Report> {
    let barrier = Arc::new(Barrier::new(config.threads));
    let start = Instant::now();

    let workers: Vec<JoinHandle<Tally>> = (0..config.threads)
        .map(|worker| {
            let map = map.clone();
            let barrier = barrier.clone();
            let workload = Workload::new(config.seed, worker, config.keys, config.ops);
            thread::spawn(move || {
                barrier.wait();
                let mut tally = Tally::default();
                for op in workload {
                    tally.apply(&map, op);
                }
                tally
            })
        })
        .collect();

    let mut tally = Tally::default();
    for (worker, handle) in workers.into_iter().enumerate() {
        tally += handle.join().map_err(|_| Error::WorkerPanicked(worker))?;
    }
    let elapsed = start.elapsed();

    Ok(Report {
        threads: config.threads,
        tally,
        stats: map.verify()?,
        elapsed,
    })
}
