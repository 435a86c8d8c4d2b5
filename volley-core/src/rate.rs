//! Request pacing

use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// `freq` requests every `per`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rate {
    pub freq: u64,
    #[serde(with = "humantime_serde")]
    pub per: Duration,
}

impl Rate {
    pub fn new(freq: u64, per: Duration) -> Self {
        Self { freq, per }
    }

    pub fn per_second(freq: u64) -> Self {
        Self::new(freq, Duration::from_secs(1))
    }

    /// Gap between consecutive requests, `None` for a zero rate
    pub fn interval(&self) -> Option<Duration> {
        if self.freq == 0 || self.per.is_zero() {
            return None;
        }
        let nanos = (self.per.as_nanos() / u128::from(self.freq)).max(1);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    /// Number of requests a full attack of `duration` issues
    pub fn hits_in(&self, duration: Duration) -> u64 {
        match self.interval() {
            Some(interval) => {
                let hits = duration.as_nanos().div_ceil(interval.as_nanos());
                u64::try_from(hits).unwrap_or(u64::MAX)
            }
            None => 0,
        }
    }

    pub fn per_second_f64(&self) -> f64 {
        if self.per.is_zero() {
            return 0.0;
        }
        self.freq as f64 / self.per.as_secs_f64()
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.freq, self.per)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval() {
        assert_eq!(Rate::per_second(50).interval(), Some(Duration::from_millis(20)));
        assert_eq!(Rate::per_second(1).interval(), Some(Duration::from_secs(1)));
        assert_eq!(Rate::per_second(0).interval(), None);
    }

    #[test]
    fn test_hits_in() {
        assert_eq!(Rate::per_second(10).hits_in(Duration::from_secs(1)), 10);
        assert_eq!(Rate::per_second(50).hits_in(Duration::from_secs(5)), 250);
        assert_eq!(Rate::per_second(3).hits_in(Duration::from_millis(500)), 2);
        assert_eq!(Rate::per_second(0).hits_in(Duration::from_secs(5)), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Rate::per_second(50).to_string(), "50/1s");
    }
}
