use crate::{Real, statistics::BandStatistics};
use tracing::warn;

/// Offset applied to the normalised band energy so that a quiescent band sits
/// near zero.
pub(crate) const CHAR_FUNCT_OFFSET: Real = -1.0;
/// Value reported by a band whose statistics cannot yet normalise it.
pub(crate) const CHAR_FUNCT_QUIESCENT: Real = CHAR_FUNCT_OFFSET;
const STD_DEV_EPSILON: Real = Real::MIN_POSITIVE;

/// Characteristic function of one band at one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BandResponse {
    pub(crate) unclipped: Real,
    pub(crate) clipped: Real,
    /// False while the band's standard deviation is too small to normalise by.
    pub(crate) contributing: bool,
}

/// Reduction of all band responses at one sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct CrossBandMax {
    pub(crate) char_funct_max: Real,
    /// Clipped value of the band that produced `char_funct_max`.
    pub(crate) clipped_max: Real,
    pub(crate) band_max: usize,
    /// Longest-period band whose unclipped value reached `threshold1`.
    pub(crate) longest_triggered_band: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct CharacteristicFunctionEngine {
    threshold_scale_factors: Vec<Real>,
    threshold1: Real,
    max_char_funct: Real,
    warned: Vec<bool>,
}

impl CharacteristicFunctionEngine {
    pub(crate) fn new(threshold_scale_factors: Vec<Real>, threshold1: Real) -> Self {
        let warned = vec![false; threshold_scale_factors.len()];
        Self {
            threshold_scale_factors,
            threshold1,
            max_char_funct: 5.0 * threshold1,
            warned,
        }
    }

    #[cfg(test)]
    pub(crate) fn max_char_funct(&self) -> Real {
        self.max_char_funct
    }

    /// Normalises the energy of `filtered` against the band's statistics.
    ///
    /// Returns the response and the energy the statistics should absorb, which
    /// is pulled back to the clip level when the response was clipped.
    pub(crate) fn evaluate(
        &mut self,
        band: usize,
        filtered: Real,
        stats: &BandStatistics,
    ) -> (BandResponse, Real) {
        let x_rec = filtered * filtered;
        if stats.mean_std_dev_x_rec <= STD_DEV_EPSILON {
            match self.warned.get_mut(band) {
                Some(warned) if !*warned => {
                    *warned = true;
                    warn!(band, "Band standard deviation is zero, band skipped until it grows");
                }
                _ => {}
            }
            let response = BandResponse {
                unclipped: CHAR_FUNCT_QUIESCENT,
                clipped: CHAR_FUNCT_QUIESCENT,
                contributing: false,
            };
            return (response, x_rec);
        }

        let scale = self
            .threshold_scale_factors
            .get(band)
            .copied()
            .unwrap_or(1.0);
        let unclipped =
            scale * (x_rec - stats.mean_x_rec) / stats.mean_std_dev_x_rec + CHAR_FUNCT_OFFSET;
        if unclipped > self.max_char_funct {
            let x_rec = stats.mean_x_rec
                + (self.max_char_funct - CHAR_FUNCT_OFFSET) * stats.mean_std_dev_x_rec / scale;
            let response = BandResponse {
                unclipped,
                clipped: self.max_char_funct,
                contributing: true,
            };
            (response, x_rec)
        } else {
            let response = BandResponse {
                unclipped,
                clipped: unclipped,
                contributing: true,
            };
            (response, x_rec)
        }
    }

    /// Picks the band with the largest unclipped response. Ties go to the
    /// shorter period.
    pub(crate) fn reduce(&self, responses: &[BandResponse]) -> CrossBandMax {
        let best = responses
            .iter()
            .enumerate()
            .filter(|(_, response)| response.contributing)
            .fold(None, |best: Option<(usize, &BandResponse)>, (band, response)| {
                match best {
                    Some((_, current)) if current.unclipped >= response.unclipped => best,
                    _ => Some((band, response)),
                }
            });
        let longest_triggered_band = responses
            .iter()
            .rposition(|response| response.contributing && response.unclipped >= self.threshold1);
        match best {
            Some((band_max, response)) => CrossBandMax {
                char_funct_max: response.unclipped,
                clipped_max: response.clipped,
                band_max,
                longest_triggered_band,
            },
            None => CrossBandMax {
                char_funct_max: CHAR_FUNCT_QUIESCENT,
                clipped_max: CHAR_FUNCT_QUIESCENT,
                band_max: 0,
                longest_triggered_band,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn settled(mean: Real, std_dev: Real) -> BandStatistics {
        BandStatistics {
            mean_x_rec: mean,
            mean_var_x_rec: std_dev * std_dev,
            mean_std_dev_x_rec: std_dev,
            ..Default::default()
        }
    }

    fn response(unclipped: Real, clipped: Real) -> BandResponse {
        BandResponse {
            unclipped,
            clipped,
            contributing: true,
        }
    }

    #[test]
    fn normalised_energy() {
        let mut engine = CharacteristicFunctionEngine::new(vec![1.0, 0.5], 10.0);
        let stats = settled(1.0, 2.0);
        let (band0, x_rec) = engine.evaluate(0, 3.0, &stats);
        assert_approx_eq!(band0.unclipped, (9.0 - 1.0) / 2.0 - 1.0);
        assert_eq!(band0.clipped, band0.unclipped);
        assert_eq!(x_rec, 9.0);
        let (band1, _) = engine.evaluate(1, 3.0, &stats);
        assert_approx_eq!(band1.unclipped, 0.5 * (9.0 - 1.0) / 2.0 - 1.0);
    }

    #[test]
    fn noise_level_energy_is_near_zero() {
        let mut engine = CharacteristicFunctionEngine::new(vec![1.0], 10.0);
        let (response, _) = engine.evaluate(0, 1.0, &settled(1.0, 1.0));
        assert_approx_eq!(response.unclipped, -1.0);
    }

    #[test]
    fn clipping_back_corrects_energy() {
        let mut engine = CharacteristicFunctionEngine::new(vec![0.5], 10.0);
        let stats = settled(1.0, 1.0);
        let (response, x_rec) = engine.evaluate(0, 100.0, &stats);
        assert_approx_eq!(response.unclipped, 0.5 * (10_000.0 - 1.0) - 1.0);
        assert_eq!(response.clipped, engine.max_char_funct());
        assert_eq!(response.clipped, 50.0);
        // The corrected energy reproduces the clip level exactly
        assert_approx_eq!(x_rec, 1.0 + 51.0 / 0.5);
        assert_approx_eq!(0.5 * (x_rec - 1.0) / 1.0 - 1.0, 50.0);
    }

    #[test]
    fn zero_deviation_skips_band() {
        let mut engine = CharacteristicFunctionEngine::new(vec![1.0, 1.0], 10.0);
        let (response, x_rec) = engine.evaluate(1, 2.0, &BandStatistics::default());
        assert!(!response.contributing);
        assert_eq!(response.unclipped, CHAR_FUNCT_QUIESCENT);
        assert_eq!(x_rec, 4.0);
        assert!(engine.warned[1]);
        assert!(!engine.warned[0]);
    }

    #[test]
    fn reduce_takes_unclipped_maximum() {
        let engine = CharacteristicFunctionEngine::new(vec![1.0; 4], 10.0);
        let responses = [
            response(3.0, 3.0),
            response(80.0, 50.0),
            response(12.0, 12.0),
            response(-1.0, -1.0),
        ];
        assert_eq!(
            engine.reduce(&responses),
            CrossBandMax {
                char_funct_max: 80.0,
                clipped_max: 50.0,
                band_max: 1,
                longest_triggered_band: Some(2),
            }
        );
    }

    #[test]
    fn reduce_ignores_skipped_bands() {
        let engine = CharacteristicFunctionEngine::new(vec![1.0; 2], 10.0);
        let skipped = BandResponse {
            unclipped: CHAR_FUNCT_QUIESCENT,
            clipped: CHAR_FUNCT_QUIESCENT,
            contributing: false,
        };
        let reduced = engine.reduce(&[skipped, response(-3.0, -3.0)]);
        assert_eq!(reduced.band_max, 1);
        assert_eq!(reduced.char_funct_max, -3.0);

        let reduced = engine.reduce(&[skipped, skipped]);
        assert_eq!(reduced.char_funct_max, CHAR_FUNCT_QUIESCENT);
        assert_eq!(reduced.clipped_max, CHAR_FUNCT_QUIESCENT);
        assert_eq!(reduced.band_max, 0);
        assert_eq!(reduced.longest_triggered_band, None);
    }

    #[test]
    fn reduce_ties_go_to_shorter_period() {
        let engine = CharacteristicFunctionEngine::new(vec![1.0; 3], 10.0);
        let reduced = engine.reduce(&[response(1.0, 1.0), response(4.0, 4.0), response(4.0, 4.0)]);
        assert_eq!(reduced.band_max, 1);
    }
}
