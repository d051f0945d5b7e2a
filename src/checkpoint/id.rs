use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::CheckpointError;

pub const CHECKPOINT_EXTENSION: &str = "ckpt";

/// Identifier of a persisted checkpoint: `<date>-<time>.<epoch_idx>`.
///
/// `date` and `time` are the digit groups of the run timestamp (e.g.
/// `20240131-142500`). They are kept as written so the identifier
/// round-trips through file names, and compared numerically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CheckpointId {
    date: String,
    time: String,
    epoch_idx: usize,
}

impl CheckpointId {
    /// Build an id from a `<date>-<time>` run timestamp and an epoch.
    pub fn new(timestamp: &str, epoch_idx: usize) -> Result<Self, CheckpointError> {
        let (date, time) = split_timestamp(timestamp)
            .ok_or_else(|| CheckpointError::InvalidId(format!("{timestamp}.{epoch_idx}")))?;
        Ok(CheckpointId {
            date: date.to_string(),
            time: time.to_string(),
            epoch_idx,
        })
    }

    /// Parse a checkpoint file name (`<id>.ckpt`).
    pub fn from_file_name(name: &str) -> Result<Self, CheckpointError> {
        let stem = name
            .strip_suffix(CHECKPOINT_EXTENSION)
            .and_then(|s| s.strip_suffix('.'))
            .ok_or_else(|| CheckpointError::InvalidId(name.to_string()))?;
        stem.parse()
    }

    pub fn epoch_idx(&self) -> usize {
        self.epoch_idx
    }

    pub fn timestamp(&self) -> String {
        format!("{}-{}", self.date, self.time)
    }

    pub fn file_name(&self) -> String {
        format!("{self}.{CHECKPOINT_EXTENSION}")
    }

    /// Key used to pick the most recent checkpoint.
    fn recency_key(&self) -> (u128, u128, usize) {
        (
            self.date.parse().unwrap_or(u128::MAX),
            self.time.parse().unwrap_or(u128::MAX),
            self.epoch_idx,
        )
    }
}

/// `true` if `s` is a non-empty run of ASCII digits.
fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn split_timestamp(timestamp: &str) -> Option<(&str, &str)> {
    let (date, time) = timestamp.split_once('-')?;
    (is_digits(date) && is_digits(time) && date.len() <= 38 && time.len() <= 38)
        .then_some((date, time))
}

impl FromStr for CheckpointId {
    type Err = CheckpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CheckpointError::InvalidId(s.to_string());
        let (timestamp, epoch) = s.rsplit_once('.').ok_or_else(invalid)?;
        if !is_digits(epoch) {
            return Err(invalid());
        }
        let epoch_idx = epoch.parse().map_err(|_| invalid())?;
        let (date, time) = split_timestamp(timestamp).ok_or_else(invalid)?;
        Ok(CheckpointId {
            date: date.to_string(),
            time: time.to_string(),
            epoch_idx,
        })
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}.{}", self.date, self.time, self.epoch_idx)
    }
}

impl Ord for CheckpointId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.recency_key()
            .cmp(&other.recency_key())
            .then_with(|| self.date.cmp(&other.date))
            .then_with(|| self.time.cmp(&other.time))
    }
}

impl PartialOrd for CheckpointId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
