use crate::{Real, SampleIndex};

/// Floor of the adaptive uncertainty threshold.
pub(crate) const MIN_UNCERTAINTY_THRESHOLD: Real = -0.5;

/// Long-term noise statistics of one band.
#[derive(Debug, Clone, PartialEq)]
pub struct BandStatistics {
    /// Decaying mean of the squared filtered signal.
    pub mean_x_rec: Real,
    pub mean_var_x_rec: Real,
    pub mean_std_dev_x_rec: Real,
    /// Level the band's characteristic function must rise through to mark the
    /// start of an uncertainty window.
    pub uncertainty_threshold: Real,
    pub char_funct_uncertainty_last: Real,
    /// Latest sample at which the characteristic function rose through
    /// `uncertainty_threshold`.
    pub uncertainty_index: Option<SampleIndex>,
}

impl Default for BandStatistics {
    fn default() -> Self {
        Self {
            mean_x_rec: 0.0,
            mean_var_x_rec: 0.0,
            mean_std_dev_x_rec: 0.0,
            uncertainty_threshold: MIN_UNCERTAINTY_THRESHOLD,
            char_funct_uncertainty_last: crate::characteristic::CHAR_FUNCT_QUIESCENT,
            uncertainty_index: None,
        }
    }
}

/// Exponential decay shared by every band, spanning an absolute time window.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AdaptiveStatistics {
    factor: Real,
    complement: Real,
    max_uncertainty_threshold: Real,
}

impl AdaptiveStatistics {
    pub(crate) fn new(delta_time: Real, long_term_window_factor: Real, threshold1: Real) -> Self {
        let factor = (delta_time / long_term_window_factor).min(1.0);
        Self {
            factor,
            complement: 1.0 - factor,
            max_uncertainty_threshold: threshold1 / 2.0 - 1.0,
        }
    }

    #[cfg(test)]
    pub(crate) fn factor(&self) -> Real {
        self.factor
    }

    /// Latches `index` if `char_funct` rose through the band's uncertainty
    /// threshold, then decays the threshold towards `char_funct`.
    pub(crate) fn update_uncertainty(
        &self,
        stats: &mut BandStatistics,
        char_funct: Real,
        index: SampleIndex,
    ) {
        if char_funct >= stats.uncertainty_threshold
            && stats.char_funct_uncertainty_last < stats.uncertainty_threshold
        {
            stats.uncertainty_index = Some(index);
        }
        stats.char_funct_uncertainty_last = char_funct;
        stats.uncertainty_threshold = (stats.uncertainty_threshold * self.complement
            + char_funct * self.factor)
            .max(MIN_UNCERTAINTY_THRESHOLD)
            .min(self.max_uncertainty_threshold);
    }

    /// Folds the squared filtered value `x_rec` into the noise statistics.
    pub(crate) fn update(&self, stats: &mut BandStatistics, x_rec: Real) {
        stats.mean_x_rec = stats.mean_x_rec * self.complement + x_rec * self.factor;
        let deviation = x_rec - stats.mean_x_rec;
        stats.mean_var_x_rec =
            stats.mean_var_x_rec * self.complement + deviation * deviation * self.factor;
        stats.mean_std_dev_x_rec = stats.mean_var_x_rec.sqrt();
    }
}
