pub struct StatsHelper;

impl StatsHelper {
    /// RMS over the finite entries; NaN when there are none.
    pub fn finite_rms(samples: &[f64]) -> f64 {
        let (count, sum_sq) = samples
            .iter()
            .filter(|v| v.is_finite())
            .fold((0usize, 0.0), |(n, acc), &v| (n + 1, acc + v * v));
        if count == 0 {
            return f64::NAN;
        }
        (sum_sq / count as f64).sqrt()
    }

    pub fn finite_mean(samples: &[f64]) -> f64 {
        let (count, sum) = samples
            .iter()
            .filter(|v| v.is_finite())
            .fold((0usize, 0.0), |(n, acc), &v| (n + 1, acc + v));
        if count == 0 {
            return f64::NAN;
        }
        sum / count as f64
    }

    pub fn finite_count(samples: &[f64]) -> usize {
        samples.iter().filter(|v| v.is_finite()).count()
    }

    /// Differences between the first `count + 1` consecutive values.
    pub fn leading_intervals(times: &[f64], count: usize) -> Vec<f64> {
        times
            .windows(2)
            .take(count)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }
}
