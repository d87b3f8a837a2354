use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref RANGE_PATTERN: Regex = Regex::new(r"^(?i:bytes)=\s*(\d*)\s*-\s*(\d*)$").unwrap();
}

/// Inclusive byte interval within a file of `total_size` bytes.
///
/// Always satisfies `start <= end < total_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
    pub total_size: u64,
}

impl ByteRange {
    pub fn chunk_length(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total_size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    FullBody { length: u64 },
    Partial(ByteRange),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("malformed range header: {0:?}")]
    Malformed(String),
    #[error("range not satisfiable for a {total_size} byte file")]
    Unsatisfiable { total_size: u64 },
}

/// Resolves an optional `Range` header against a file of `total_size` bytes.
///
/// Accepts `bytes=<start>-<end>`, `bytes=<start>-` and the suffix form
/// `bytes=-<len>`. Anything else, reversed bounds and bounds past the end of
/// the file are rejected so the caller can answer 416 instead of streaming a
/// nonsensical interval.
pub fn resolve(range_header: Option<&str>, total_size: u64) -> Result<Decision, RangeError> {
    let Some(raw) = range_header else {
        return Ok(Decision::FullBody { length: total_size });
    };

    let caps = RANGE_PATTERN
        .captures(raw.trim())
        .ok_or_else(|| RangeError::Malformed(raw.to_string()))?;
    let start_str = &caps[1];
    let end_str = &caps[2];

    let parse = |s: &str| {
        s.parse::<u64>()
            .map_err(|_| RangeError::Malformed(raw.to_string()))
    };
    let unsatisfiable = RangeError::Unsatisfiable { total_size };

    let (start, end) = match (start_str.is_empty(), end_str.is_empty()) {
        (true, true) => return Err(RangeError::Malformed(raw.to_string())),
        (true, false) => {
            let suffix = parse(end_str)?;
            if suffix == 0 || total_size == 0 {
                return Err(unsatisfiable);
            }
            (total_size.saturating_sub(suffix), total_size - 1)
        }
        (false, true) => {
            let start = parse(start_str)?;
            if total_size == 0 {
                return Err(unsatisfiable);
            }
            (start, total_size - 1)
        }
        (false, false) => (parse(start_str)?, parse(end_str)?),
    };

    if start > end || end >= total_size {
        return Err(unsatisfiable);
    }

    Ok(Decision::Partial(ByteRange {
        start,
        end,
        total_size,
    }))
}
