use serde::{Deserialize, Serialize};
use std::fmt;

pub const EXCELLENT_THRESHOLD: f64 = 0.9;
pub const GOOD_THRESHOLD: f64 = 0.8;
pub const FAIR_THRESHOLD: f64 = 0.7;

/// Fraction of recorded doses that were taken, 0.0 when nothing is recorded.
pub fn adherence_rate(taken: u32, missed: u32) -> f64 {
    let total = u64::from(taken) + u64::from(missed);
    if total == 0 {
        return 0.0;
    }
    f64::from(taken) / total as f64
}

/// Unweighted mean of the given rates, 0.0 for an empty set.
pub fn overall_adherence<I>(rates: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let (sum, count) = rates
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), rate| (sum + rate, count + 1));
    if count == 0 {
        return 0.0;
    }
    sum / count as f64
}

pub fn format_percentage(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

pub fn is_poor(rate: f64) -> bool {
    rate < FAIR_THRESHOLD
}

pub fn is_excellent(rate: f64) -> bool {
    rate >= EXCELLENT_THRESHOLD
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdherenceStatus {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl AdherenceStatus {
    pub fn from_rate(rate: f64) -> Self {
        if rate >= EXCELLENT_THRESHOLD {
            AdherenceStatus::Excellent
        } else if rate >= GOOD_THRESHOLD {
            AdherenceStatus::Good
        } else if rate >= FAIR_THRESHOLD {
            AdherenceStatus::Fair
        } else {
            AdherenceStatus::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdherenceStatus::Excellent => "Excellent",
            AdherenceStatus::Good => "Good",
            AdherenceStatus::Fair => "Fair",
            AdherenceStatus::Poor => "Poor",
        }
    }
}

impl fmt::Display for AdherenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rate_without_doses_is_zero() {
        assert_eq!(adherence_rate(0, 0), 0.0);
    }

    #[test]
    fn test_rate_matches_ratio_and_stays_in_range() {
        for taken in 0..20u32 {
            for missed in 0..20u32 {
                let rate = adherence_rate(taken, missed);
                assert!((0.0..=1.0).contains(&rate));
                if taken + missed > 0 {
                    let expected = taken as f64 / (taken + missed) as f64;
                    assert!((rate - expected).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_nine_of_ten_is_excellent() {
        let rate = adherence_rate(9, 1);
        assert_eq!(rate, 0.9);
        assert_eq!(format_percentage(rate), "90.0%");
        assert_eq!(AdherenceStatus::from_rate(rate), AdherenceStatus::Excellent);
    }

    #[test]
    fn test_band_boundaries_are_inclusive() {
        assert_eq!(AdherenceStatus::from_rate(0.9), AdherenceStatus::Excellent);
        assert_eq!(AdherenceStatus::from_rate(0.8), AdherenceStatus::Good);
        assert_eq!(AdherenceStatus::from_rate(0.7), AdherenceStatus::Fair);
        assert_eq!(AdherenceStatus::from_rate(0.6999), AdherenceStatus::Poor);
        assert_eq!(AdherenceStatus::from_rate(0.0), AdherenceStatus::Poor);
        assert_eq!(AdherenceStatus::from_rate(1.0).to_string(), "Excellent");
    }

    #[test]
    fn test_overall_is_unweighted_mean() {
        assert!((overall_adherence([0.9, 0.5]) - 0.7).abs() < 1e-12);
        assert_eq!(overall_adherence(Vec::<f64>::new()), 0.0);
    }

    #[test]
    fn test_poor_and_excellent_predicates() {
        assert!(is_poor(0.69));
        assert!(!is_poor(0.7));
        assert!(is_excellent(0.9));
        assert!(!is_excellent(0.89));
    }
}
