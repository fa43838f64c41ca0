use crate::Real;
use std::fmt::Display;

/// Direction of first motion.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
pub enum Polarity {
    #[strum(serialize = "+")]
    Positive,
    #[strum(serialize = "-")]
    Negative,
    #[default]
    #[strum(serialize = "?")]
    Unknown,
}

/// A confirmed phase onset.
///
/// Indices are fractional sample positions counted from the first sample of
/// the block passed to the `feed` call that emitted the pick. They are
/// negative when the onset lies in an earlier block.
#[derive(Debug, Clone, PartialEq)]
pub struct PickRecord {
    /// Start of the uncertainty window, corrected for filter delay.
    pub begin_index: Real,
    /// Corrected trigger position.
    pub end_index: Real,
    pub polarity: Polarity,
    /// Peak characteristic function of the trigger band within the trigger window.
    pub amplitude: Real,
    /// Period of the trigger band, in seconds.
    pub period: Real,
    pub trigger_band: usize,
    /// Samples between the trigger and its confirmation.
    pub n_samples_up_event_used: usize,
    pub per_band_trigger_values: Vec<Real>,
    pub per_band_max_in_window: Vec<Real>,
}

impl PickRecord {
    /// Seconds from the start of the block to the start of the uncertainty window.
    pub fn begin_time(&self, delta_time: Real) -> Real {
        self.begin_index * delta_time
    }

    pub fn end_time(&self, delta_time: Real) -> Real {
        self.end_index * delta_time
    }

    /// Midpoint of the pick and its half-width, in samples.
    pub fn onset(&self) -> (Real, Real) {
        (
            (self.begin_index + self.end_index) / 2.0,
            (self.end_index - self.begin_index) / 2.0,
        )
    }
}

impl Display for PickRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.3},{:.3},{},{:.4},{:.4},{},{}",
            self.begin_index,
            self.end_index,
            self.polarity,
            self.amplitude,
            self.period,
            self.trigger_band,
            self.n_samples_up_event_used
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::str::FromStr;

    fn record() -> PickRecord {
        PickRecord {
            begin_index: 96.5,
            end_index: 99.25,
            polarity: Polarity::Negative,
            amplitude: 31.0,
            period: 0.125,
            trigger_band: 3,
            n_samples_up_event_used: 40,
            per_band_trigger_values: vec![],
            per_band_max_in_window: vec![],
        }
    }

    #[test]
    fn times() {
        let pick = record();
        assert_approx_eq!(pick.begin_time(0.01), 0.965);
        assert_approx_eq!(pick.end_time(0.01), 0.9925);
        let (centre, half_width) = pick.onset();
        assert_approx_eq!(centre, 97.875);
        assert_approx_eq!(half_width, 1.375);
    }

    #[test]
    fn display() {
        assert_eq!(record().to_string(), "96.500,99.250,-,31.0000,0.1250,3,40");
    }

    #[test]
    fn polarity_symbols() {
        assert_eq!(Polarity::Positive.to_string(), "+");
        assert_eq!(Polarity::Unknown.to_string(), "?");
        assert_eq!(Polarity::from_str("-"), Ok(Polarity::Negative));
        assert!(Polarity::from_str("x").is_err());
    }
}
