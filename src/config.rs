use std::str::FromStr;

use crate::error::{Error, Result};

pub const DEFAULT_CAPACITY: usize = 16;
pub const DEFAULT_OPS: usize = 10_000;
pub const DEFAULT_KEYS: u32 = 1_000;

/// Harness settings, read from `THREADS`, `CAPACITY`, `OPS`, `KEYS`, `SEED`
/// and `DUMP`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub threads: usize,
    pub capacity: usize,
    pub ops: usize,
    pub keys: u32,
    pub seed: u64,
    pub dump: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            threads: positive(&lookup, "THREADS", num_cpus::get())?,
            capacity: positive(&lookup, "CAPACITY", DEFAULT_CAPACITY)?,
            ops: parse(&lookup, "OPS", DEFAULT_OPS)?,
            keys: positive(&lookup, "KEYS", DEFAULT_KEYS)?,
            seed: parse(&lookup, "SEED", 0)?,
            dump: match lookup("DUMP").as_deref() {
                None | Some("") | Some("0") | Some("false") => false,
                Some("1") | Some("true") => true,
                Some(value) => {
                    return Err(Error::InvalidConfig {
                        name: "DUMP",
                        value: value.to_string(),
                    })
                }
            },
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T> {
    lookup(name).map_or(Ok(default), |value| {
        value
            .trim()
            .parse()
            .map_err(|_| Error::InvalidConfig { name, value })
    })
}

fn positive<T: FromStr + PartialEq + Default>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T> {
    let value = parse(lookup, name, default)?;
    if value == T::default() {
        return Err(Error::InvalidConfig {
            name,
            value: lookup(name).unwrap_or_default(),
        });
    }
    Ok(value)
}
