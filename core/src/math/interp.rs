use ndarray::ArrayView1;

/// Bracketing linear interpolation over an ascending time axis.
pub struct InterpHelper;

impl InterpHelper {
    /// Index of the first time not below `t` (left insertion point).
    pub fn search_sorted(times: ArrayView1<'_, f64>, t: f64) -> usize {
        match times.as_slice() {
            Some(slice) => slice.partition_point(|&x| x < t),
            None => times.iter().take_while(|&&x| x < t).count(),
        }
    }

    /// Value at `t` between the two bracketing samples.
    ///
    /// NaN when `t` is not finite, falls before the first or after the last
    /// time, or the bracketing times coincide.
    pub fn bracketed(times: ArrayView1<'_, f64>, values: ArrayView1<'_, f64>, t: f64) -> f64 {
        if !t.is_finite() {
            return f64::NAN;
        }
        let i = Self::search_sorted(times, t);
        if i == 0 || i >= times.len() {
            return f64::NAN;
        }
        let j = i - 1;
        let dt = times[i] - times[j];
        if dt == 0.0 {
            return f64::NAN;
        }
        values[j] + (values[i] - values[j]) / dt * (t - times[j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn midpoint_interpolates_linearly() {
        let times = array![0.0, 1000.0, 2000.0];
        let pitch = array![0.0, 10.0, 20.0];
        assert_eq!(InterpHelper::bracketed(times.view(), pitch.view(), 500.0), 5.0);
        assert_eq!(InterpHelper::bracketed(times.view(), pitch.view(), 1500.0), 15.0);
    }

    #[test]
    fn out_of_range_is_nan() {
        let times = array![0.0, 1000.0, 2000.0];
        let pitch = array![0.0, 10.0, 20.0];
        assert!(InterpHelper::bracketed(times.view(), pitch.view(), 2500.0).is_nan());
        assert!(InterpHelper::bracketed(times.view(), pitch.view(), -1.0).is_nan());
        assert!(InterpHelper::bracketed(times.view(), pitch.view(), 0.0).is_nan());
    }

    #[test]
    fn coincident_bracket_is_nan() {
        let times = array![0.0, 1000.0, 1000.0];
        let values = array![0.0, 1.0, 2.0];
        assert!(InterpHelper::bracketed(times.view(), values.view(), 1000.0).is_nan());
    }

    #[test]
    fn exact_interior_sample_uses_left_bracket() {
        let times = array![0.0, 1000.0, 2000.0];
        let values = array![0.0, 10.0, 20.0];
        assert_eq!(InterpHelper::bracketed(times.view(), values.view(), 1000.0), 10.0);
        assert_eq!(InterpHelper::search_sorted(times.view(), 1000.0), 1);
    }
}
