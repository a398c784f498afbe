//! Inferential helpers for aggregated battle outcomes: Wilson score intervals, fixed-width
//! histograms and order statistics.

use serde::{de, Deserialize, Deserializer, Serialize};

pub const DEFAULT_HISTOGRAM_BINS: usize = 20;

/// Serialized as "90", "95" or "99". Scenario files may also give the level as a number, either
/// a percentage (95) or a fraction (0.95).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ConfidenceLevel {
    #[serde(rename = "90")]
    Ninety,
    #[default]
    #[serde(rename = "95")]
    NinetyFive,
    #[serde(rename = "99")]
    NinetyNine,
}

impl ConfidenceLevel {
    pub const fn z_score(self) -> f64 {
        match self {
            Self::Ninety => 1.645,
            Self::NinetyFive => 1.96,
            Self::NinetyNine => 2.576,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().trim_end_matches('%') {
            "90" | "0.9" | "0.90" => Some(Self::Ninety),
            "95" | "0.95" => Some(Self::NinetyFive),
            "99" | "0.99" => Some(Self::NinetyNine),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawConfidence {
    Number(f64),
    Text(String),
}

impl<'de> Deserialize<'de> for ConfidenceLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level = match RawConfidence::deserialize(deserializer)? {
            RawConfidence::Number(value) => Self::parse(&value.to_string()),
            RawConfidence::Text(text) => Self::parse(&text),
        };
        level.ok_or_else(|| de::Error::custom("confidence must be one of 90, 95 or 99"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        (self.lower..=self.upper).contains(&value)
    }
}

/// Wilson score interval for `successes` out of `trials`. With no trials the interval is [0, 1].
pub fn wilson_interval(successes: usize, trials: usize, level: ConfidenceLevel) -> ConfidenceInterval {
    if trials == 0 {
        return ConfidenceInterval { lower: 0.0, upper: 1.0 };
    }
    let n = trials as f64;
    let p = successes as f64 / n;
    let z = level.z_score();
    let z2 = z * z;
    let denominator = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denominator;
    let margin = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denominator;
    ConfidenceInterval {
        lower: (center - margin).clamp(0.0, 1.0),
        upper: (center + margin).clamp(0.0, 1.0),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Fixed-width histogram over `[min, max]` of the finite samples; NaN and infinities are not
/// counted. Values at the max boundary land in the last bin. Empty input gives no bins;
/// zero-range input gives a single bin holding every sample.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() || bins == 0 {
        return Vec::new();
    }
    let (min, max) = finite
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if range <= 0.0 {
        return vec![HistogramBin {
            start: min,
            end: max,
            count: finite.len(),
        }];
    }

    let width = range / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|index| HistogramBin {
            start: min + width * index as f64,
            end: if index + 1 == bins { max } else { min + width * (index + 1) as f64 },
            count: 0,
        })
        .collect();
    for value in finite {
        let index = (((value - min) / width) as usize).min(bins - 1);
        out[index].count += 1;
    }
    out
}

/// Nearest-rank percentile of an ascending slice, `fraction` in [0, 1].
pub fn percentile(sorted: &[f64], fraction: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((sorted.len() - 1) as f64 * fraction.clamp(0.0, 1.0)).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

/// Upper midpoint of an ascending slice.
pub fn median(sorted: &[f64]) -> f64 {
    sorted.get(sorted.len() / 2).copied().unwrap_or(0.0)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub samples: usize,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
    pub p25: f64,
    pub p75: f64,
    pub p90: f64,
}

impl DistributionSummary {
    /// Zeroed summary when `values` is empty.
    pub fn from_samples(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Self {
            samples: sorted.len(),
            avg: sorted.iter().sum::<f64>() / sorted.len() as f64,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            median: median(&sorted),
            p25: percentile(&sorted, 0.25),
            p75: percentile(&sorted, 0.75),
            p90: percentile(&sorted, 0.90),
        }
    }
}

/// Running min / max / sum, mergeable across workers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &RunningStats) {
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn summary(&self) -> RangeSummary {
        if self.count == 0 {
            return RangeSummary::default();
        }
        RangeSummary {
            min: self.min,
            avg: self.mean(),
            max: self.max,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeSummary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
}
