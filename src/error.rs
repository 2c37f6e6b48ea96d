use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A map needs at least one bucket
    #[error("capacity must be at least 1, got {0}")]
    InvalidCapacity(usize),

    #[error("key {key} found in bucket {bucket}, expected bucket {expected}")]
    MisplacedKey {
        key: i32,
        bucket: usize,
        expected: usize,
    },

    #[error("key {key} appears more than once in bucket {bucket}")]
    DuplicateKey { key: i32, bucket: usize },

    /// The size counter disagrees with the number of reachable entries
    #[error("size counter is {recorded} but {counted} entries are reachable")]
    SizeMismatch { recorded: isize, counted: usize },

    #[error("invalid value {value:?} for {name}")]
    InvalidConfig { name: &'static str, value: String },

    #[error("script line {line}: {message}")]
    Script { line: usize, message: String },

    #[error("worker thread {0} panicked")]
    WorkerPanicked(usize),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
