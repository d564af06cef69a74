use crate::records::raw::LASER_SENTINEL;

/// Token layout of the laser lines in one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaserVariant {
    /// `D <h>`
    HeightOnly,
    /// `D <h> <signQ> <T> ...`
    Full,
}

impl LaserVariant {
    fn detect(token_count: usize) -> Self {
        if token_count == 2 {
            LaserVariant::HeightOnly
        } else {
            LaserVariant::Full
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaserReading {
    pub height: f64,
    pub signal_quality: f64,
    pub temperature: f64,
    /// At least one expected token was missing or not numeric.
    pub parse_failed: bool,
}

impl LaserReading {
    fn failed() -> Self {
        Self {
            height: f64::NAN,
            signal_quality: f64::NAN,
            temperature: f64::NAN,
            parse_failed: true,
        }
    }
}

/// Parses laser report lines. The first line after `begin_block` fixes the
/// variant until the next block.
#[derive(Debug, Default)]
pub struct LaserBlockParser {
    variant: Option<LaserVariant>,
}

impl LaserBlockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_block(&mut self) {
        self.variant = None;
    }

    pub fn variant(&self) -> Option<LaserVariant> {
        self.variant
    }

    pub fn parse(&mut self, line: &str) -> LaserReading {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some(first) if first.starts_with(LASER_SENTINEL) => {}
            _ => return LaserReading::failed(),
        }
        let values: Vec<&str> = tokens.collect();
        let variant = *self
            .variant
            .get_or_insert_with(|| LaserVariant::detect(values.len() + 1));

        let mut failed = false;
        let mut field = |index: usize| match values.get(index).and_then(|t| t.parse::<f64>().ok()) {
            Some(value) => value,
            None => {
                failed = true;
                f64::NAN
            }
        };

        let reading = match variant {
            LaserVariant::HeightOnly => LaserReading {
                height: field(0),
                signal_quality: f64::NAN,
                temperature: f64::NAN,
                parse_failed: false,
            },
            LaserVariant::Full => LaserReading {
                height: field(0),
                signal_quality: field(1),
                temperature: field(2),
                parse_failed: false,
            },
        };
        LaserReading {
            parse_failed: failed,
            ..reading
        }
    }
}
