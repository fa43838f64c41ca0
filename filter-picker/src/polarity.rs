use crate::{
    Polarity, Real, SampleIndex, state_machine::AcceptedTrigger,
    trigger_window::TriggerWindowBuffer,
};

/// Net derivative over total absolute derivative beyond which a band votes.
pub(crate) const POLARITY_RATIO_THRESHOLD: Real = 0.667;
const MIN_WEIGHT_SUM: Real = 1e-12;

#[derive(Debug, Clone)]
pub(crate) struct PolarityEstimator {
    periods: Vec<Real>,
    delta_time: Real,
    threshold1: Real,
}

impl PolarityEstimator {
    pub(crate) fn new(periods: Vec<Real>, delta_time: Real, threshold1: Real) -> Self {
        Self {
            periods,
            delta_time,
            threshold1,
        }
    }

    /// Half-width in samples of the window a band's first motion is read over.
    fn half_width(&self, period: Real, uncertainty_span: SampleIndex, capacity: usize) -> SampleIndex {
        let band_limit = (period / (4.0 * self.delta_time)) as SampleIndex;
        let span_limit = (uncertainty_span / 2 + 1).min(capacity as SampleIndex / 2);
        band_limit.min(span_limit).max(2)
    }

    /// Direction of first motion of one band around `trigger_index`, if decisive.
    fn band_vote(
        &self,
        history: &TriggerWindowBuffer,
        band: usize,
        trigger_index: SampleIndex,
        half_width: SampleIndex,
        now: SampleIndex,
    ) -> Option<Real> {
        let first = (trigger_index - half_width).max(history.oldest_index()?);
        let last = (trigger_index + half_width).min(now);
        let (sum, sum_abs) = (first..=last)
            .filter_map(|index| history.band(band, index))
            .fold((0.0, 0.0), |(sum, sum_abs), sample| {
                (sum + sample.derivative, sum_abs + sample.derivative.abs())
            });
        if sum_abs <= 0.0 {
            return None;
        }
        let ratio = sum / sum_abs;
        if ratio > POLARITY_RATIO_THRESHOLD {
            Some(1.0)
        } else if ratio < -POLARITY_RATIO_THRESHOLD {
            Some(-1.0)
        } else {
            None
        }
    }

    /// Weighted vote of every band that exceeded `threshold1` in the trigger
    /// window. Bands close in period to the trigger band weigh the most.
    pub(crate) fn estimate(
        &self,
        history: &TriggerWindowBuffer,
        trigger: &AcceptedTrigger,
    ) -> Polarity {
        let trigger_index = trigger.candidate.trigger_index;
        let uncertainty_span = trigger_index - trigger.candidate.uncertainty_index;
        let trigger_period = trigger.period;

        let (sum, weight_sum) = self
            .periods
            .iter()
            .zip(&trigger.per_band_max_in_window)
            .zip(&trigger.index_band_trigger)
            .enumerate()
            .filter(|(_, ((_, max), index))| index.is_some() && **max > self.threshold1)
            .filter_map(|(band, ((&period, _), _))| {
                let half_width = self.half_width(period, uncertainty_span, history.capacity());
                let vote = self.band_vote(
                    history,
                    band,
                    trigger_index,
                    half_width,
                    trigger.confirmed_index,
                )?;
                let weight = (period / trigger_period).min(trigger_period / period);
                Some((vote, weight))
            })
            .fold((0.0, 0.0), |(sum, weight_sum), (vote, weight)| {
                (sum + vote * weight, weight_sum + weight)
            });

        if weight_sum < MIN_WEIGHT_SUM || sum == 0.0 {
            Polarity::Unknown
        } else if sum > 0.0 {
            Polarity::Positive
        } else {
            Polarity::Negative
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        characteristic::CrossBandMax,
        state_machine::Candidate,
        trigger_window::{BandSample, TriggerWindowBuffer},
    };

    const DELTA_TIME: Real = 0.01;

    /// History of 40 samples whose band derivatives are given per sample.
    fn history(derivatives: impl Fn(SampleIndex) -> [Real; 2]) -> TriggerWindowBuffer {
        let mut history = TriggerWindowBuffer::new(64, 10, 2);
        let reduced = CrossBandMax {
            char_funct_max: 0.0,
            clipped_max: 0.0,
            band_max: 0,
            longest_triggered_band: None,
        };
        for index in 0..40 {
            let bands = derivatives(index).map(|derivative| BandSample {
                char_funct: 0.0,
                uncertainty_index: None,
                derivative,
            });
            history.push(index, &reduced, bands);
        }
        history
    }

    fn trigger(per_band_max_in_window: Vec<Real>) -> AcceptedTrigger {
        AcceptedTrigger {
            candidate: Candidate {
                trigger_index: 30,
                uncertainty_index: 20,
                band: 0,
            },
            confirmed_index: 39,
            trigger_band: 0,
            period: 0.2,
            amplitude: 20.0,
            begin_index: 20.0,
            end_index: 30.0,
            index_band_trigger: vec![Some(30); per_band_max_in_window.len()],
            per_band_trigger_values: vec![0.0; per_band_max_in_window.len()],
            per_band_max_in_window,
        }
    }

    fn estimator() -> PolarityEstimator {
        PolarityEstimator::new(vec![0.2, 0.8], DELTA_TIME, 10.0)
    }

    #[test]
    fn half_width_limits() {
        let estimator = estimator();
        // A quarter period of 0.2 s is 5 samples
        assert_eq!(estimator.half_width(0.2, 100, 64), 5);
        // Limited by half the uncertainty span
        assert_eq!(estimator.half_width(0.2, 4, 64), 3);
        // Limited by half the history
        assert_eq!(estimator.half_width(0.8, 100, 16), 8);
        // Never below two samples
        assert_eq!(estimator.half_width(0.02, 100, 64), 2);
    }

    #[test]
    fn rising_onset_is_positive() {
        let history = history(|index| if index >= 28 { [1.0, 1.0] } else { [-0.1, 0.0] });
        assert_eq!(
            estimator().estimate(&history, &trigger(vec![20.0, 20.0])),
            Polarity::Positive
        );
    }

    #[test]
    fn falling_onset_is_negative() {
        let history = history(|index| if index >= 28 { [-1.0, -2.0] } else { [0.1, 0.0] });
        assert_eq!(
            estimator().estimate(&history, &trigger(vec![20.0, 20.0])),
            Polarity::Negative
        );
    }

    #[test]
    fn indecisive_onset_is_unknown() {
        let history = history(|index| {
            if index % 2 == 0 {
                [1.0, 1.0]
            } else {
                [-1.0, -1.0]
            }
        });
        assert_eq!(
            estimator().estimate(&history, &trigger(vec![20.0, 20.0])),
            Polarity::Unknown
        );
    }

    #[test]
    fn bands_below_threshold1_do_not_vote() {
        let history = history(|_| [1.0, -1.0]);
        assert_eq!(
            estimator().estimate(&history, &trigger(vec![5.0, 20.0])),
            Polarity::Negative
        );
        assert_eq!(
            estimator().estimate(&history, &trigger(vec![5.0, 10.0])),
            Polarity::Unknown
        );
    }

    #[test]
    fn trigger_band_outweighs_distant_band() {
        // Band 1 is four times the trigger period and weighs a quarter
        let history = history(|_| [1.0, -1.0]);
        assert_eq!(
            estimator().estimate(&history, &trigger(vec![20.0, 20.0])),
            Polarity::Positive
        );
    }

    #[test]
    fn flat_signal_is_unknown() {
        let history = history(|_| [0.0, 0.0]);
        assert_eq!(
            estimator().estimate(&history, &trigger(vec![20.0, 20.0])),
            Polarity::Unknown
        );
    }
}
