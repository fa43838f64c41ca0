use crate::{Real, RingBuffer, SampleIndex, characteristic::CrossBandMax};

/// Per-band values kept for each sample of the history.
#[derive(Default, Debug, Clone, Copy, PartialEq)]
pub(crate) struct BandSample {
    pub(crate) char_funct: Real,
    /// The band's uncertainty latch as it stood at this sample.
    pub(crate) uncertainty_index: Option<SampleIndex>,
    /// Change of the band's filtered signal since the previous sample.
    pub(crate) derivative: Real,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SampleEntry {
    pub(crate) bands: Vec<BandSample>,
    pub(crate) char_funct_max: Real,
    pub(crate) clipped_max: Real,
    pub(crate) band_max: usize,
    /// Sum of `clipped_max` over the last `n_t_up_event` samples.
    pub(crate) integral: Real,
    /// Sum of `clipped_max` over the last `n_t_up_event_min` samples.
    pub(crate) integral_short: Real,
}

/// History of the characteristic function, addressed by absolute sample index,
/// with the two running integrals the trigger decision reads.
#[derive(Debug, Clone)]
pub(crate) struct TriggerWindowBuffer {
    history: RingBuffer<SampleEntry>,
    newest: Option<SampleIndex>,
    n_t_up_event: usize,
    n_t_up_event_min: usize,
    integral: Real,
    integral_short: Real,
    spare: Vec<BandSample>,
}

impl TriggerWindowBuffer {
    pub(crate) fn new(capacity: usize, n_t_up_event: usize, n_t_up_event_min: usize) -> Self {
        Self {
            history: RingBuffer::new(capacity.max(n_t_up_event + 1)),
            newest: None,
            n_t_up_event,
            n_t_up_event_min,
            integral: 0.0,
            integral_short: 0.0,
            spare: Vec::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.history.capacity()
    }

    pub(crate) fn n_t_up_event(&self) -> usize {
        self.n_t_up_event
    }

    pub(crate) fn n_t_up_event_min(&self) -> usize {
        self.n_t_up_event_min
    }

    #[cfg(test)]
    pub(crate) fn newest_index(&self) -> Option<SampleIndex> {
        self.newest
    }

    /// Index of the oldest sample still held.
    pub(crate) fn oldest_index(&self) -> Option<SampleIndex> {
        self.newest
            .map(|newest| newest + 1 - self.history.len() as SampleIndex)
    }

    /// Clipped maximum written `samples_back` samples before the one being pushed.
    fn clipped_back(&self, samples_back: usize, current: Real) -> Real {
        match samples_back.checked_sub(1) {
            None => current,
            Some(offset) => self
                .history
                .at(offset)
                .map(|entry| entry.clipped_max)
                .unwrap_or_default(),
        }
    }

    /// Appends the sample `index`, which must follow the previously pushed one.
    pub(crate) fn push(
        &mut self,
        index: SampleIndex,
        reduced: &CrossBandMax,
        bands: impl IntoIterator<Item = BandSample>,
    ) {
        let clipped = reduced.clipped_max;
        self.integral += clipped - self.clipped_back(self.n_t_up_event, clipped);
        self.integral_short += clipped - self.clipped_back(self.n_t_up_event_min, clipped);

        let mut band_samples = std::mem::take(&mut self.spare);
        band_samples.clear();
        band_samples.extend(bands);
        let entry = SampleEntry {
            bands: band_samples,
            char_funct_max: reduced.char_funct_max,
            clipped_max: clipped,
            band_max: reduced.band_max,
            integral: self.integral,
            integral_short: self.integral_short,
        };
        if let Some(displaced) = self.history.push(entry) {
            self.spare = displaced.bands;
        }
        self.newest = Some(index);
    }

    pub(crate) fn get(&self, index: SampleIndex) -> Option<&SampleEntry> {
        let offset = self.newest? - index;
        usize::try_from(offset)
            .ok()
            .and_then(|offset| self.history.at(offset))
    }

    pub(crate) fn band(&self, band: usize, index: SampleIndex) -> Option<&BandSample> {
        self.get(index)?.bands.get(band)
    }

    /// Running integral over the long confirmation window at the newest sample.
    pub(crate) fn integral(&self) -> Real {
        self.integral
    }

    pub(crate) fn integral_short(&self) -> Real {
        self.integral_short
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn reduced(clipped_max: Real) -> CrossBandMax {
        CrossBandMax {
            char_funct_max: clipped_max + 1.0,
            clipped_max,
            band_max: 0,
            longest_triggered_band: None,
        }
    }

    fn band_samples(index: SampleIndex) -> [BandSample; 2] {
        [
            BandSample {
                char_funct: index as Real,
                uncertainty_index: Some(index - 1),
                derivative: 0.5,
            },
            BandSample {
                char_funct: -(index as Real),
                uncertainty_index: None,
                derivative: -0.5,
            },
        ]
    }

    #[test]
    fn integrals_match_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let (n_long, n_short) = (50, 10);
        let mut buffer = TriggerWindowBuffer::new(80, n_long, n_short);
        let mut values = Vec::new();
        for index in 0..1000 {
            let value = rng.random_range(-1.0..50.0);
            values.push(value);
            buffer.push(index, &reduced(value), band_samples(index));

            let window_sum = |n: usize| values.iter().rev().take(n).sum::<Real>();
            assert_approx_eq!(buffer.integral(), window_sum(n_long), 1e-8);
            assert_approx_eq!(buffer.integral_short(), window_sum(n_short), 1e-8);
            let entry = buffer.get(index).expect("newest sample should be held");
            assert_eq!(entry.integral, buffer.integral());
            assert_eq!(entry.integral_short, buffer.integral_short());
        }
    }

    #[test]
    fn empty_window_integrates_nothing() {
        let mut buffer = TriggerWindowBuffer::new(4, 0, 0);
        buffer.push(0, &reduced(3.0), []);
        buffer.push(1, &reduced(5.0), []);
        assert_eq!(buffer.integral(), 0.0);
        assert_eq!(buffer.integral_short(), 0.0);
    }

    #[test]
    fn addressed_by_absolute_index() {
        let mut buffer = TriggerWindowBuffer::new(5, 2, 1);
        assert_eq!(buffer.oldest_index(), None);
        for index in 100..112 {
            buffer.push(index, &reduced(index as Real), band_samples(index));
        }
        assert_eq!(buffer.capacity(), 5);
        assert_eq!(buffer.newest_index(), Some(111));
        assert_eq!(buffer.oldest_index(), Some(107));
        assert!(buffer.get(106).is_none());
        assert!(buffer.get(112).is_none());

        let entry = buffer.get(108).expect("sample should be held");
        assert_eq!(entry.clipped_max, 108.0);
        assert_eq!(entry.char_funct_max, 109.0);
        assert_eq!(entry.integral, 107.0 + 108.0);
        assert_eq!(
            buffer.band(0, 108),
            Some(&BandSample {
                char_funct: 108.0,
                uncertainty_index: Some(107),
                derivative: 0.5
            })
        );
        assert_eq!(buffer.band(1, 110).map(|band| band.derivative), Some(-0.5));
        assert_eq!(buffer.band(2, 110), None);
    }

    #[test]
    fn capacity_covers_long_window() {
        let buffer = TriggerWindowBuffer::new(3, 10, 2);
        assert_eq!(buffer.capacity(), 11);
        assert_eq!(buffer.n_t_up_event(), 10);
        assert_eq!(buffer.n_t_up_event_min(), 2);
    }
}
