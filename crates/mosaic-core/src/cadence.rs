use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MosaicError, Result};
use crate::stamp::Stamp;

/// Which time steps to mosaic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TimeStepRequest {
    First,
    Last,
    All,
    Single(i64),
    /// Inclusive range; both endpoints must exist in some stamp.
    Range { start: i64, end: i64 },
}

impl Default for TimeStepRequest {
    fn default() -> Self {
        Self::All
    }
}

impl fmt::Display for TimeStepRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => write!(f, "first"),
            Self::Last => write!(f, "last"),
            Self::All => write!(f, "all"),
            Self::Single(t) => write!(f, "{t}"),
            Self::Range { start, end } => write!(f, "{start}..{end}"),
        }
    }
}

impl FromStr for TimeStepRequest {
    type Err = MosaicError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "first" => return Ok(Self::First),
            "last" => return Ok(Self::Last),
            "all" | "" => return Ok(Self::All),
            _ => {}
        }

        let parse = |part: &str| {
            part.trim()
                .parse::<i64>()
                .map_err(|_| MosaicError::InvalidRequest(format!("'{s}' is not a time step")))
        };

        if let Some((a, b)) = s.split_once("..") {
            let (start, end) = (parse(a)?, parse(b)?);
            if start > end {
                return Err(MosaicError::InvalidRequest(format!(
                    "range start {start} is after end {end}"
                )));
            }
            Ok(Self::Range { start, end })
        } else {
            Ok(Self::Single(parse(s)?))
        }
    }
}

impl TryFrom<String> for TimeStepRequest {
    type Error = MosaicError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<TimeStepRequest> for String {
    fn from(r: TimeStepRequest) -> Self {
        r.to_string()
    }
}

/// Maps global time-step identifiers to each stamp's local rows.
///
/// Stamps are sampled independently and may each miss different time steps,
/// so the i-th stored row of two stamps need not be the same instant. All
/// lookups go through the identifier.
pub struct CadenceResolver<'a> {
    stamps: &'a [Stamp],
    union: Vec<i64>,
    quality_mask: u32,
}

impl<'a> CadenceResolver<'a> {
    pub fn new(stamps: &'a [Stamp], quality_mask: u32) -> Result<Self> {
        if stamps.is_empty() {
            return Err(MosaicError::EmptySequence);
        }

        let mut union: Vec<i64> = stamps
            .iter()
            .flat_map(|s| s.time_steps().iter().copied())
            .collect();
        union.sort_unstable();
        union.dedup();

        debug!(
            stamps = stamps.len(),
            time_steps = union.len(),
            "Built time-step union"
        );

        Ok(Self {
            stamps,
            union,
            quality_mask,
        })
    }

    /// Sorted union of every stamp's time steps.
    pub fn union(&self) -> &[i64] {
        &self.union
    }

    /// Expand a request into the ascending list of time steps to mosaic.
    ///
    /// `step` keeps every Nth entry of `All` and `Range` results.
    pub fn resolve(&self, request: &TimeStepRequest, step: usize) -> Result<Vec<i64>> {
        if step == 0 {
            return Err(MosaicError::InvalidRequest("step must be at least 1".into()));
        }

        let resolved = match *request {
            TimeStepRequest::First => vec![*self.union.first().ok_or(MosaicError::EmptySequence)?],
            TimeStepRequest::Last => vec![*self.union.last().ok_or(MosaicError::EmptySequence)?],
            TimeStepRequest::Single(t) => {
                self.require(t)?;
                vec![t]
            }
            TimeStepRequest::All => self.union.iter().step_by(step).copied().collect(),
            TimeStepRequest::Range { start, end } => {
                if start > end {
                    return Err(MosaicError::InvalidRequest(format!(
                        "range start {start} is after end {end}"
                    )));
                }
                self.require(start)?;
                self.require(end)?;
                let lo = self.union.partition_point(|&t| t < start);
                let hi = self.union.partition_point(|&t| t <= end);
                self.union[lo..hi].iter().step_by(step).copied().collect()
            }
        };

        debug!(request = %request, step, resolved = resolved.len(), "Resolved time steps");
        Ok(resolved)
    }

    /// Local row for `time_step` in each stamp, in input order. `None` when
    /// the stamp did not sample that step or flagged it bad.
    pub fn rows_for(&self, time_step: i64) -> Vec<Option<usize>> {
        self.stamps
            .iter()
            .map(|stamp| {
                stamp
                    .row_of(time_step)
                    .filter(|&row| !stamp.is_flagged(row, self.quality_mask))
            })
            .collect()
    }

    /// Stamps that contribute to `time_step`, paired with their local row.
    pub fn contributions(&self, time_step: i64) -> Vec<(&'a Stamp, usize)> {
        self.stamps
            .iter()
            .zip(self.rows_for(time_step))
            .filter_map(|(stamp, row)| row.map(|r| (stamp, r)))
            .collect()
    }

    fn require(&self, time_step: i64) -> Result<()> {
        if self.union.binary_search(&time_step).is_ok() {
            Ok(())
        } else {
            Err(MosaicError::UnknownTimeStep(time_step))
        }
    }
}
