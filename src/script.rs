use std::{fmt, path::PathBuf, sync::Arc};

use bytes::{Bytes, BytesMut};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{i32, multispace0, space0, space1},
    combinator::{all_consuming, map, value},
    sequence::{delimited, pair, preceded, separated_pair},
    IResult,
};
use tokio::{fs::File, sync::mpsc};
use tokio_stream::StreamExt;
use tokio_util::codec::{Decoder, Framed};

use crate::{
    error::{Error, Result},
    map::ChainedMap,
};

static BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Put(i32, i32),
    Get(i32),
    Del(i32),
    Size,
    Ops,
    Dump,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Value(Option<i32>),
    Count(usize),
    Listing(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub command: Command,
    pub response: Response,
}

impl Command {
    pub fn apply(self, map: &ChainedMap) -> Outcome {
        let response = match self {
            Command::Put(key, value) => Response::Value(map.put(key, value)),
            Command::Get(key) => Response::Value(map.get(key)),
            Command::Del(key) => Response::Value(map.del(key)),
            Command::Size => Response::Count(map.len()),
            Command::Ops => Response::Count(map.op_count()),
            Command::Dump => Response::Listing(map.to_string()),
        };
        Outcome {
            command: self,
            response,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Put(key, value) => write!(f, "put({}, {})", key, value),
            Command::Get(key) => write!(f, "get({})", key),
            Command::Del(key) => write!(f, "del({})", key),
            Command::Size => f.write_str("size"),
            Command::Ops => f.write_str("ops"),
            Command::Dump => f.write_str("dump"),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.response {
            Response::Value(Some(value)) => write!(f, "{} -> {}", self.command, value),
            Response::Value(None) => write!(f, "{} -> not found", self.command),
            Response::Count(count) => write!(f, "{} -> {}", self.command, count),
            Response::Listing(listing) => write!(f, "{}\n{}", self.command, listing.trim_end()),
        }
    }
}

fn command(input: &[u8]) -> IResult<&[u8], Command> {
    alt((
        map(
            preceded(pair(tag("put"), space1), separated_pair(i32, space1, i32)),
            |(key, value)| Command::Put(key, value),
        ),
        map(preceded(pair(tag("get"), space1), i32), Command::Get),
        map(preceded(pair(tag("del"), space1), i32), Command::Del),
        value(Command::Size, tag("size")),
        value(Command::Ops, tag("ops")),
        value(Command::Dump, tag("dump")),
    ))(input)
}

/// Parses one script line. Blank lines and `#` comments yield `None`.
pub fn parse_line(number: usize, line: &[u8]) -> Result<Option<Command>> {
    let line = match memchr::memchr(b'#', line) {
        Some(index) => &line[..index],
        None => line,
    };
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match all_consuming(delimited(space0, command, multispace0))(line) {
        Ok((_, command)) => Ok(Some(command)),
        Err(_) => Err(Error::Script {
            line: number,
            message: format!("cannot parse {:?}", String::from_utf8_lossy(line).trim()),
        }),
    }
}

/// Splits the input into numbered lines without their newline.
#[derive(Default)]
struct LineDecoder {
    line: usize,
}

impl Decoder for LineDecoder {
    type Item = (usize, Bytes);
    type Error = Error;

    #[inline]
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match memchr::memchr(b'\n', src) {
            Some(index) => {
                let mut line = src.split_to(index + 1);
                line.truncate(index);
                self.line += 1;
                Ok(Some((self.line, line.freeze())))
            }
            None => Ok(None),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => {
                self.line += 1;
                Ok(Some((self.line, src.split().freeze())))
            }
        }
    }
}

/// Replays the script at `path` against `map`, in file order.
///
/// Stops at the first line that fails to parse. Builds and blocks on its own
/// tokio runtime, so it must not be called from inside another runtime.
#[tokio::main]
pub async fn replay(path: PathBuf, map: Arc<ChainedMap>) -> Result<Vec<Outcome>> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Result<Command>>();
    tokio::spawn(async move {
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(error) => {
                let _ = tx.send(Err(error.into()));
                return;
            }
        };
        let mut framed = Framed::with_capacity(file, LineDecoder::default(), BUFFER_SIZE);
        while let Some(frame) = framed.next().await {
            let parsed = frame.and_then(|(number, line)| parse_line(number, &line));
            let message = match parsed {
                Ok(None) => continue,
                Ok(Some(command)) => Ok(command),
                Err(error) => Err(error),
            };
            let failed = message.is_err();
            if tx.send(message).is_err() || failed {
                return;
            }
        }
    });
    let outcomes = tokio::task::spawn_blocking(move || -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::new();
        while let Some(command) = rx.blocking_recv() {
            outcomes.push(command?.apply(&map));
        }
        Ok(outcomes)
    });
    outcomes.await?
}
