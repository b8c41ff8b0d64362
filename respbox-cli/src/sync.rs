//! Clock alignment between host and device.
//!
//! One round: note the host time T1, send `T`, read the device's reply T2
//! (µs from its clock reset to the reply), note the receipt time T3. The
//! round trip `T3 - T1` includes T2 of device-side work, so the one-way
//! transit is estimated as `(rtt - T2) / 2`.
//!
//! The device epoch was reset by the last round's `T`, which arrived about
//! one transit after that round's T1. That instant is the anchor: a snapshot
//! stamped `e` µs happened at `anchor + e` in host time.

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSample {
    /// Host time the `T` byte was written (T1).
    pub sent_at: DateTime<Utc>,
    /// T3 - T1, measured with a monotonic clock.
    pub round_trip_us: u64,
    /// Device reply (T2).
    pub device_us: u32,
}

impl SyncSample {
    pub fn one_way_us(&self) -> f64 {
        (self.round_trip_us as f64 - f64::from(self.device_us)).max(0.0) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyEstimate {
    pub rounds: usize,
    pub min_us: f64,
    pub mean_us: f64,
    pub max_us: f64,
    pub stddev_us: f64,
    /// Host time of the device's last epoch reset.
    pub anchor: DateTime<Utc>,
}

/// Summarize rounds in the order they ran. `None` without samples.
pub fn estimate(samples: &[SyncSample]) -> Option<LatencyEstimate> {
    let last = samples.last()?;
    let latencies: Vec<f64> = samples.iter().map(SyncSample::one_way_us).collect();

    let n = latencies.len() as f64;
    let mean = latencies.iter().sum::<f64>() / n;
    let variance = latencies.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / n;
    let min = latencies.iter().copied().fold(f64::INFINITY, f64::min);
    let max = latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(LatencyEstimate {
        rounds: samples.len(),
        min_us: min,
        mean_us: mean,
        max_us: max,
        stddev_us: variance.sqrt(),
        anchor: last.sent_at + Duration::microseconds(mean.round() as i64),
    })
}

impl LatencyEstimate {
    /// Host time for a device timestamp taken after the anchor.
    pub fn host_time(&self, elapsed_us: u32) -> DateTime<Utc> {
        self.anchor + Duration::microseconds(i64::from(elapsed_us))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn sample(sent_at: DateTime<Utc>, round_trip_us: u64, device_us: u32) -> SyncSample {
        SyncSample {
            sent_at,
            round_trip_us,
            device_us,
        }
    }

    #[test]
    fn test_one_way_subtracts_device_time() {
        assert_eq!(sample(at(0), 1_000, 200).one_way_us(), 400.0);
        // A reply slower than the round trip is clock noise, not negative latency
        assert_eq!(sample(at(0), 100, 300).one_way_us(), 0.0);
    }

    #[test]
    fn test_statistics() {
        let samples = [
            sample(at(0), 1_000, 0),
            sample(at(1), 2_000, 0),
            sample(at(2), 3_000, 0),
        ];
        let estimate = estimate(&samples).unwrap();
        assert_eq!(estimate.rounds, 3);
        assert_eq!(estimate.min_us, 500.0);
        assert_eq!(estimate.mean_us, 1_000.0);
        assert_eq!(estimate.max_us, 1_500.0);
        assert!((estimate.stddev_us - 408.248).abs() < 0.01);
    }

    #[test]
    fn test_anchor_follows_last_round() {
        let samples = [sample(at(10), 4_000, 0), sample(at(20), 2_000, 0)];
        let estimate = estimate(&samples).unwrap();
        // Mean one-way 1500 µs after the last T1
        assert_eq!(estimate.anchor, at(20) + Duration::microseconds(1_500));
        assert_eq!(
            estimate.host_time(1_000_000),
            at(21) + Duration::microseconds(1_500)
        );
    }

    #[test]
    fn test_no_samples() {
        assert_eq!(estimate(&[]), None);
    }
}
