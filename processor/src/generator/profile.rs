use crate::generator::template::{attitude_wave, slant_range};
use anyhow::Context;
use navlasercore::prelude::LogFormat;
use navlasercore::protocol::nmea::with_checksum;
use navlasercore::protocol::ubx::build_frame;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const GPS_WEEK: u32 = 2200;

/// Configuration for generating synthetic flight logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub format: LogFormat,
    pub seed: u64,
    pub epochs: usize,
    pub start_tow_ms: f64,
    pub nav_rate_hz: f64,
    pub laser_per_epoch: usize,
    /// True height above flat ground.
    pub base_height: f64,
    pub noise: f64,
    pub boresight_offset: f64,
    pub pitch_amplitude_deg: f64,
    pub roll_amplitude_deg: f64,
    pub period_epochs: f64,
    /// Every n-th `$PSTRB` gets a broken checksum.
    pub corrupt_every: Option<usize>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::InterleavedText,
            seed: 0,
            epochs: 100,
            start_tow_ms: 345_600_000.0,
            nav_rate_hz: 5.0,
            laser_per_epoch: 2,
            base_height: 20.0,
            noise: 0.0,
            boresight_offset: 0.0,
            pitch_amplitude_deg: 5.0,
            roll_amplitude_deg: 3.0,
            period_epochs: 20.0,
            corrupt_every: None,
        }
    }
}

impl GeneratorConfig {
    pub fn epoch_ms(&self) -> f64 {
        1000.0 / self.nav_rate_hz.max(f64::MIN_POSITIVE)
    }

    pub fn laser_rate_hz(&self) -> f64 {
        self.nav_rate_hz * self.laser_per_epoch.max(1) as f64
    }

    fn epoch_time(&self, epoch: usize) -> f64 {
        self.start_tow_ms + epoch as f64 * self.epoch_ms()
    }

    fn attitude(&self, time_ms: f64) -> (f64, f64) {
        let period = self.period_epochs * self.epoch_ms();
        (
            attitude_wave(time_ms - self.start_tow_ms, period, self.pitch_amplitude_deg, 0.0),
            attitude_wave(time_ms - self.start_tow_ms, period, self.roll_amplitude_deg, 1.0),
        )
    }

    fn corrupts(&self, epoch: usize) -> bool {
        match self.corrupt_every {
            Some(every) if every > 0 => epoch % every == every - 1,
            _ => false,
        }
    }

    fn laser_line(&self, rng: &mut StdRng, time_ms: f64) -> String {
        let (pitch, roll) = self.attitude(time_ms);
        let jitter = if self.noise > 0.0 {
            rng.gen_range(-self.noise..self.noise)
        } else {
            0.0
        };
        let height = slant_range(self.base_height, pitch, roll, self.boresight_offset) + jitter;
        format!(
            "D {} {:.1} {:.1}",
            height,
            rng.gen_range(0.5..1.0),
            20.0 + rng.gen_range(-0.5..0.5)
        )
    }
}

fn break_checksum(sentence: String) -> String {
    let (body, checksum) = sentence.split_at(sentence.len() - 2);
    let flipped = u8::from_str_radix(checksum, 16).map_or(0, |ck| ck ^ 0xff);
    format!("{}{:02X}", body, flipped)
}

/// `$PINS1` (radians) and `$PSTRB` sentences, each epoch followed by its laser lines.
pub fn build_text_log(config: &GeneratorConfig) -> anyhow::Result<String> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut log = format!("# synthetic inertial log, seed {}\n", config.seed);

    for epoch in 0..config.epochs {
        let itow = config.epoch_time(epoch);
        let (pitch, roll) = config.attitude(itow);
        log.push_str(&with_checksum(&format!(
            "$PINS1,{},{},1,0,{},{},{},0,0,0,11.5,48.1,{},0,0,0",
            itow,
            GPS_WEEK,
            roll.to_radians(),
            pitch.to_radians(),
            0.25,
            config.base_height + 500.0
        )));
        log.push('\n');

        let strobe = with_checksum(&format!("$PSTRB,{},{},1,{}", GPS_WEEK, itow, epoch));
        let strobe = if config.corrupts(epoch) {
            break_checksum(strobe)
        } else {
            strobe
        };
        log.push_str(&strobe);
        log.push('\n');

        for _ in 0..config.laser_per_epoch {
            log.push_str(&config.laser_line(&mut rng, itow));
            log.push('\n');
        }
    }
    Ok(log)
}

fn pvat_payload(itow: f64, pitch_deg: f64, roll_deg: f64, height_mm: f64) -> anyhow::Result<Vec<u8>> {
    let itow = u32::try_from(itow as i64).context("time of week does not fit a u32")?;
    let mut payload = vec![0u8; 116];
    payload[0..4].copy_from_slice(&itow.to_le_bytes());
    payload[24] = 3;
    payload[27] = 12;
    payload[28..32].copy_from_slice(&115_000_000_i32.to_le_bytes());
    payload[32..36].copy_from_slice(&481_000_000_i32.to_le_bytes());
    payload[36..40].copy_from_slice(&(height_mm as i32).to_le_bytes());
    payload[72..76].copy_from_slice(&((roll_deg * 1e5).round() as i32).to_le_bytes());
    payload[76..80].copy_from_slice(&((pitch_deg * 1e5).round() as i32).to_le_bytes());
    Ok(payload)
}

/// NAV-PVAT frames with `# iTOW` ... `# end` laser blocks between them. Each
/// block is anchored so its last reading falls on the frame's epoch.
pub fn build_marker_log(config: &GeneratorConfig) -> anyhow::Result<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let per_epoch = config.laser_per_epoch.max(1);
    let interval = 1000.0 / config.laser_rate_hz();
    let mut log = Vec::new();

    for epoch in 0..config.epochs {
        let itow = config.epoch_time(epoch);
        let (pitch, roll) = config.attitude(itow);
        let payload = pvat_payload(itow, pitch, roll, (config.base_height + 500.0) * 1000.0)?;
        log.extend_from_slice(&build_frame(0x01, 0x17, &payload));
        if epoch % 5 == 4 {
            // NAV-CLOCK, not part of the schema
            log.extend_from_slice(&build_frame(0x01, 0x22, &[0u8; 20]));
        }

        let anchor = itow - interval;
        log.extend_from_slice(format!("# iTOW {}\r\n", anchor).as_bytes());
        for k in (1..=per_epoch).rev() {
            let time = anchor - (k as f64 - 2.0) * interval;
            log.extend_from_slice(config.laser_line(&mut rng, time).as_bytes());
            log.extend_from_slice(b"\r\n");
        }
        log.extend_from_slice(b"# end\r\n");
    }
    Ok(log)
}

pub fn write_log(path: &Path, config: &GeneratorConfig) -> anyhow::Result<()> {
    let bytes = match config.format {
        LogFormat::InterleavedText => build_text_log(config)?.into_bytes(),
        LogFormat::BinaryWithMarkers => build_marker_log(config)?,
    };
    fs::write(path, bytes).with_context(|| format!("writing synthetic log {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use navlasercore::protocol::nmea::ChecksumValidator;
    use navlasercore::processing::split_laser_blocks;

    #[test]
    fn text_log_has_expected_line_mix() {
        let config = GeneratorConfig {
            epochs: 10,
            corrupt_every: Some(4),
            ..Default::default()
        };
        let log = build_text_log(&config).unwrap();
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 1 + 10 * (2 + config.laser_per_epoch));
        let invalid = lines
            .iter()
            .filter(|line| line.starts_with('$') && !ChecksumValidator::is_valid(line))
            .count();
        assert_eq!(invalid, 2);
    }

    #[test]
    fn same_seed_gives_same_log() {
        let config = GeneratorConfig {
            epochs: 5,
            noise: 0.1,
            seed: 7,
            ..Default::default()
        };
        assert_eq!(build_text_log(&config).unwrap(), build_text_log(&config).unwrap());
    }

    #[test]
    fn marker_log_splits_into_one_block_per_epoch() {
        let config = GeneratorConfig {
            format: LogFormat::BinaryWithMarkers,
            epochs: 12,
            ..Default::default()
        };
        let log = build_marker_log(&config).unwrap();
        assert_eq!(split_laser_blocks(&log).report.blocks, 12);
    }
}
