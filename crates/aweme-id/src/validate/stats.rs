use super::{MatchClass, SampleOutcome};

/// Aggregate error statistics over a set of validated samples.
///
/// Absolute figures describe accuracy. Signed figures describe bias: a
/// negative `mean_signed` means decoded timestamps run behind the ground
/// truth.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorStats {
    pub count: usize,
    pub exact: usize,
    /// Non-zero errors within the threshold.
    pub close: usize,
    pub large: usize,
    pub mean_abs: f64,
    pub min_abs: u64,
    pub max_abs: u64,
    /// Signed mean of the compared (possibly calibrated) errors.
    pub mean_signed: f64,
    pub min_signed: i64,
    pub max_signed: i64,
    /// Signed mean of the uncalibrated errors.
    pub raw_mean_signed: f64,
}

impl ErrorStats {
    /// Returns `None` for an empty set, where the means are undefined.
    pub fn from_outcomes<'a, I>(outcomes: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a SampleOutcome>,
    {
        let mut acc: Option<Accumulator> = None;
        for outcome in outcomes {
            match acc.as_mut() {
                Some(acc) => acc.push(outcome),
                None => acc = Some(Accumulator::new(outcome)),
            }
        }
        acc.map(Accumulator::finish)
    }

    pub fn exact_rate(&self) -> f64 {
        ratio(self.exact, self.count)
    }

    pub fn close_rate(&self) -> f64 {
        ratio(self.close, self.count)
    }

    /// Fraction of samples within the threshold, exact matches included.
    pub fn within_threshold_rate(&self) -> f64 {
        ratio(self.exact + self.close, self.count)
    }
}

fn ratio(n: usize, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        n as f64 / count as f64
    }
}

struct Accumulator {
    count: usize,
    exact: usize,
    close: usize,
    large: usize,
    // Widened so that no number of `i64` errors can overflow the sums.
    sum_abs: u128,
    min_abs: u64,
    max_abs: u64,
    sum_signed: i128,
    min_signed: i64,
    max_signed: i64,
    sum_raw: i128,
}

impl Accumulator {
    fn new(first: &SampleOutcome) -> Self {
        let mut acc = Self {
            count: 0,
            exact: 0,
            close: 0,
            large: 0,
            sum_abs: 0,
            min_abs: u64::MAX,
            max_abs: 0,
            sum_signed: 0,
            min_signed: i64::MAX,
            max_signed: i64::MIN,
            sum_raw: 0,
        };
        acc.push(first);
        acc
    }

    fn push(&mut self, outcome: &SampleOutcome) {
        let abs = outcome.error.unsigned_abs();
        self.count += 1;
        match outcome.class {
            MatchClass::Exact => self.exact += 1,
            MatchClass::Close => self.close += 1,
            MatchClass::Large => self.large += 1,
        }
        self.sum_abs += u128::from(abs);
        self.min_abs = self.min_abs.min(abs);
        self.max_abs = self.max_abs.max(abs);
        self.sum_signed += i128::from(outcome.error);
        self.min_signed = self.min_signed.min(outcome.error);
        self.max_signed = self.max_signed.max(outcome.error);
        self.sum_raw += i128::from(outcome.raw_error);
    }

    fn finish(self) -> ErrorStats {
        let n = self.count as f64;
        ErrorStats {
            count: self.count,
            exact: self.exact,
            close: self.close,
            large: self.large,
            mean_abs: self.sum_abs as f64 / n,
            min_abs: self.min_abs,
            max_abs: self.max_abs,
            mean_signed: self.sum_signed as f64 / n,
            min_signed: self.min_signed,
            max_signed: self.max_signed,
            raw_mean_signed: self.sum_raw as f64 / n,
        }
    }
}
