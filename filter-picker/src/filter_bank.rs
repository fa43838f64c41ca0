use crate::Real;
use std::f64::consts::PI;

/// Coefficients and delay line of one two-pole bandpass section.
#[derive(Default, Debug, Clone, PartialEq)]
pub(crate) struct Section {
    a: Real,
    d1: Real,
    d2: Real,
    d3: Real,
    d4: Real,
    w1: Real,
    w2: Real,
    w3: Real,
    w4: Real,
}

impl Section {
    fn advance(&mut self, x: Real) -> Real {
        let w0 = self.d1 * self.w1 + self.d2 * self.w2 + self.d3 * self.w3 + self.d4 * self.w4 + x;
        let y = self.a * (w0 - 2.0 * self.w2 + self.w4);
        self.w4 = self.w3;
        self.w3 = self.w2;
        self.w2 = self.w1;
        self.w1 = w0;
        y
    }
}

/// Cascaded Butterworth bandpass filter centred on one band period.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BandFilter {
    sections: Vec<Section>,
}

impl BandFilter {
    /// Designs `num_poles / 4` sections with band edges a factor
    /// `band_width_factor^1.5` either side of `1 / period`. The upper edge is
    /// limited to the Nyquist frequency.
    pub(crate) fn design(
        period: Real,
        band_width_factor: Real,
        delta_time: Real,
        num_poles: usize,
    ) -> Self {
        let sample_rate = 1.0 / delta_time;
        let nyquist = sample_rate / 2.0;
        let freq = 1.0 / period;
        let edge_factor = band_width_factor.powf(1.5);
        let f1 = (freq * edge_factor).min(nyquist);
        let f2 = freq / edge_factor;

        let a = (PI * (f1 + f2) / sample_rate).cos() / (PI * (f1 - f2) / sample_rate).cos();
        let b = (PI * (f1 - f2) / sample_rate).tan();
        let num_sections = num_poles / 4;
        let sections = (0..num_sections)
            .map(|i| {
                let r = (PI * (2 * i + 1) as Real / (4 * num_sections) as Real).sin();
                let s = b * b + 2.0 * b * r + 1.0;
                Section {
                    a: b * b / s,
                    d1: 4.0 * a * (1.0 + b * r) / s,
                    d2: 2.0 * (b * b - 2.0 * a * a - 1.0) / s,
                    d3: 4.0 * a * (1.0 - b * r) / s,
                    d4: -(b * b - 2.0 * b * r + 1.0) / s,
                    ..Default::default()
                }
            })
            .collect();
        Self { sections }
    }

    pub(crate) fn advance(&mut self, x: Real) -> Real {
        self.sections
            .iter_mut()
            .fold(x, |input, section| section.advance(input))
    }
}

/// One independent filter per band, indexed as the band list is.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BandFilterBank {
    filters: Vec<BandFilter>,
}

impl BandFilterBank {
    pub(crate) fn new(
        periods: impl IntoIterator<Item = Real>,
        band_width_factor: Real,
        delta_time: Real,
        num_poles: usize,
    ) -> Self {
        Self {
            filters: periods
                .into_iter()
                .map(|period| BandFilter::design(period, band_width_factor, delta_time, num_poles))
                .collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.filters.len()
    }

    /// Filters `x` through the filter of `band`. Unknown bands pass nothing.
    pub(crate) fn advance(&mut self, band: usize, x: Real) -> Real {
        self.filters
            .get_mut(band)
            .map(|filter| filter.advance(x))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    const DELTA_TIME: Real = 0.01;

    /// Ratio of output to input amplitude once the filter has settled on a sinusoid.
    fn gain(filter: &mut BandFilter, signal_period: Real) -> Real {
        let num_samples = (200.0 * signal_period / DELTA_TIME).max(20_000.0) as usize;
        let settled = num_samples / 2;
        let mut peak: Real = 0.0;
        for i in 0..num_samples {
            let x = (2.0 * PI * i as Real * DELTA_TIME / signal_period).sin();
            let y = filter.advance(x);
            if i >= settled {
                peak = peak.max(y.abs());
            }
        }
        peak
    }

    #[test]
    fn section_count() {
        for (num_poles, num_sections) in [(4, 1), (8, 2), (16, 4)] {
            let filter = BandFilter::design(1.0, 2.0, DELTA_TIME, num_poles);
            assert_eq!(filter.sections.len(), num_sections);
        }
    }

    #[test]
    fn coefficients() {
        let filter = BandFilter::design(1.0, 2.0, DELTA_TIME, 4);
        let section = &filter.sections[0];
        let freq: Real = 1.0;
        let f1 = freq * Real::powf(2.0, 1.5);
        let f2 = freq / Real::powf(2.0, 1.5);
        let a = (PI * (f1 + f2) * DELTA_TIME).cos() / (PI * (f1 - f2) * DELTA_TIME).cos();
        let b = (PI * (f1 - f2) * DELTA_TIME).tan();
        let r = (PI / 4.0).sin();
        let s = b * b + 2.0 * b * r + 1.0;
        assert_approx_eq!(section.a, b * b / s);
        assert_approx_eq!(section.d1, 4.0 * a * (1.0 + b * r) / s);
        assert_approx_eq!(section.d2, 2.0 * (b * b - 2.0 * a * a - 1.0) / s);
        assert_approx_eq!(section.d3, 4.0 * a * (1.0 - b * r) / s);
        assert_approx_eq!(section.d4, -(b * b - 2.0 * b * r + 1.0) / s);
    }

    #[test]
    fn passes_centre_period() {
        let mut filter = BandFilter::design(1.0, 2.0, DELTA_TIME, 4);
        assert_approx_eq!(gain(&mut filter, 1.0), 1.0, 0.02);
    }

    #[test]
    fn rejects_distant_periods() {
        let mut filter = BandFilter::design(1.0, 2.0, DELTA_TIME, 4);
        assert!(gain(&mut filter, 0.1) < 0.1);
        let mut filter = BandFilter::design(1.0, 2.0, DELTA_TIME, 4);
        assert!(gain(&mut filter, 10.0) < 0.1);
    }

    #[test]
    fn rejects_constant_offset() {
        let mut filter = BandFilter::design(1.0, 2.0, DELTA_TIME, 4);
        let last = (0..20_000).map(|_| filter.advance(1.0)).last();
        assert_approx_eq!(last.unwrap_or(Real::NAN), 0.0, 1e-6);
    }

    #[test]
    fn upper_edge_limited_to_nyquist() {
        // freq * 2^1.5 exceeds the Nyquist frequency of 50 Hz
        let mut filter = BandFilter::design(0.05, 2.0, DELTA_TIME, 4);
        let output: Vec<_> = (0..1000)
            .map(|i| filter.advance(if i % 2 == 0 { 1.0 } else { -1.0 }))
            .collect();
        assert!(output.iter().all(|y| y.is_finite()));
    }

    #[test]
    fn bands_are_independent() {
        let mut bank = BandFilterBank::new([0.5, 1.0], 2.0, DELTA_TIME, 4);
        let mut single = BandFilter::design(1.0, 2.0, DELTA_TIME, 4);
        assert_eq!(bank.len(), 2);
        for i in 0..100 {
            let x = (i as Real * 0.37).sin();
            bank.advance(0, x);
            assert_eq!(bank.advance(1, x), single.advance(x));
        }
        assert_eq!(bank.advance(2, 1.0), 0.0);
    }
}
