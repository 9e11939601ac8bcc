use crate::database::models::PeriodStats;

/// Continuous percentile over sorted samples, interpolating between ranks
fn percentile(sorted: &[f64], fraction: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = fraction.clamp(0.0, 1.0) * last as f64;
    let (low, high) = (rank.floor() as usize, rank.ceil() as usize);
    let weight = rank - low as f64;
    Some(sorted[low] + (sorted[high] - sorted[low]) * weight)
}

/// Summarize `(total_time, failed)` samples
pub fn period_stats(samples: &[(f64, bool)]) -> PeriodStats {
    let mut totals: Vec<f64> = samples.iter().map(|(total, _)| *total).collect();
    totals.sort_by(f64::total_cmp);

    let avg = (!totals.is_empty()).then(|| totals.iter().sum::<f64>() / totals.len() as f64);

    PeriodStats {
        p50: percentile(&totals, 0.5),
        p95: percentile(&totals, 0.95),
        avg,
        num_items: samples.len() as u64,
        num_errors: samples.iter().filter(|(_, failed)| *failed).count() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window() {
        let stats = period_stats(&[]);
        assert_eq!(stats, PeriodStats::default());
    }

    #[test]
    fn test_percentiles_interpolate() {
        let samples: Vec<_> = [40.0, 10.0, 30.0, 20.0].into_iter().map(|t| (t, false)).collect();
        let stats = period_stats(&samples);

        assert_eq!(stats.p50, Some(25.0));
        assert!((stats.p95.unwrap() - 38.5).abs() < 1e-9);
        assert_eq!(stats.avg, Some(25.0));
        assert_eq!(stats.num_items, 4);
    }

    #[test]
    fn test_errors_counted() {
        let stats = period_stats(&[(5.0, true), (7.0, false), (9.0, true)]);
        assert_eq!(stats.num_errors, 2);
        assert_eq!(stats.p50, Some(7.0));
    }
}
