use std::{fmt, str::FromStr, time::Duration};

/// Target length of a recording. Zero means record until the playlist ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordLength(pub Duration);

impl RecordLength {
    pub fn is_unbounded(&self) -> bool {
        self.0.is_zero()
    }

    pub fn as_duration(&self) -> Duration {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRecordLengthError(String);

impl fmt::Display for ParseRecordLengthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid duration: {}", self.0)
    }
}

impl std::error::Error for ParseRecordLengthError {}

impl FromStr for RecordLength {
    type Err = ParseRecordLengthError;

    /// Accepts plain seconds (`90`, `12.5`), unit strings (`1h30m`, `45s`,
    /// `500ms`) and clock notation (`1:30:00`, `45:00`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let error = || ParseRecordLengthError(s.to_string());
        if s.is_empty() {
            return Err(error());
        }

        if let Ok(secs) = s.parse::<f64>() {
            return Duration::try_from_secs_f64(secs)
                .map(Self)
                .map_err(|_| error());
        }

        if s.contains(':') {
            let mut total = 0u64;
            let parts: Vec<&str> = s.split(':').collect();
            if parts.len() > 3 {
                return Err(error());
            }
            for part in parts {
                let value: u64 = part.parse().map_err(|_| error())?;
                total = total
                    .checked_mul(60)
                    .and_then(|total| total.checked_add(value))
                    .ok_or_else(error)?;
            }
            return Ok(Self(Duration::from_secs(total)));
        }

        let mut total = Duration::ZERO;
        let mut rest = s;
        while !rest.is_empty() {
            let number_end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(error)?;
            let (number, tail) = rest.split_at(number_end);
            let unit_end = tail
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(tail.len());
            let (unit, tail) = tail.split_at(unit_end);

            let value: f64 = number.parse().map_err(|_| error())?;
            let scale = match unit {
                "h" => 3600.,
                "m" => 60.,
                "s" => 1.,
                "ms" => 0.001,
                _ => return Err(error()),
            };
            let part = Duration::try_from_secs_f64(value * scale).map_err(|_| error())?;
            total = total.checked_add(part).ok_or_else(error)?;
            rest = tail;
        }

        Ok(Self(total))
    }
}
