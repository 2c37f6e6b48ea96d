use std::{env, path::PathBuf, sync::Arc};

use chainmap::{config::Config, script, stress, ChainedMap, Result};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let config = Config::from_env()?;
    let map = Arc::new(ChainedMap::with_capacity(config.capacity)?);

    if let Some(path) = env::args().nth(1) {
        for outcome in script::replay(PathBuf::from(path), map.clone())? {
            println!("{}", outcome);
        }
        if config.dump {
            print!("{}", map);
        }
        return Ok(());
    }

    println!(
        "Using {} threads, {} buckets, {} ops per thread over {} keys",
        config.threads, config.capacity, config.ops, config.keys
    );
    let report = stress::run(&map, &config)?;
    let tally = report.tally;
    println!(
        "{} ops in {:.2?}: {} puts ({} new), {} gets ({} hits), {} dels ({} removed)",
        tally.ops(),
        report.elapsed,
        tally.puts,
        tally.inserted,
        tally.gets,
        tally.hits,
        tally.dels,
        tally.removed
    );
    println!(
        "{} entries, op count {}, longest chain {}, {} empty buckets",
        report.stats.entries,
        report.stats.op_count,
        report.stats.longest_chain,
        report.stats.empty_buckets
    );
    if config.dump {
        print!("{}", map);
    }

    #[cfg(feature = "assert_result")]
    assert!(report.is_consistent(), "inconsistent run: {:?}", report);

    Ok(())
}
