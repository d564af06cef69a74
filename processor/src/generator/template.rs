use std::f64::consts::PI;

/// Slow sinusoidal attitude in degrees.
pub fn attitude_wave(time_ms: f64, period_ms: f64, amplitude_deg: f64, phase: f64) -> f64 {
    amplitude_deg * (2.0 * PI * time_ms / period_ms + phase).sin()
}

/// Slant range a tilted laser reports over flat ground at `height`; the
/// inverse of the attitude correction.
pub fn slant_range(height: f64, pitch_deg: f64, roll_deg: f64, boresight_offset: f64) -> f64 {
    let (pitch, roll) = (pitch_deg.to_radians(), roll_deg.to_radians());
    (height + boresight_offset * pitch.sin()) / (pitch.cos() * roll.cos())
}
