pub mod config;
pub mod error;
pub mod map;
pub mod script;
pub mod stress;
pub mod workload;

pub use error::{Error, Result};
pub use map::{ChainedMap, Entry, Stats};
