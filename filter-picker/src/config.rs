use crate::{BandListError, ConfigError, Real};
use itertools::Itertools;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, warn};

pub const DEFAULT_FILTER_WINDOW: Real = 5.0;

/// Spread of consecutive period ratios, in percent of their mean, above which
/// a configuration is rejected.
const MAX_BAND_WIDTH_SPREAD_PERCENT: Real = 10.0;
/// Spread above which a configuration is accepted with a warning.
const WARN_BAND_WIDTH_SPREAD_PERCENT: Real = 2.0;

const MIN_BAND_WIDTH_FACTOR: Real = 1.1;
const MAX_BAND_WIDTH_FACTOR: Real = 100.0;

/// Whether the characteristic function of a band is written to diagnostic dumps.
#[derive(
    Default, Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DisplayMode {
    #[default]
    Hidden,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BandParameters {
    /// Centre period of the band, in seconds.
    pub period: Real,
    /// Multiplier applied to the normalised energy of this band.
    pub threshold_scale_factor: Real,
    #[serde(default)]
    pub display_mode: DisplayMode,
}

impl BandParameters {
    pub fn new(period: Real, threshold_scale_factor: Real) -> Self {
        Self {
            period,
            threshold_scale_factor,
            display_mode: DisplayMode::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BandSelection {
    /// Bands listed explicitly, shortest period first.
    Explicit(Vec<BandParameters>),
    /// Bands derived from the sample interval, doubling the period by the band width
    /// factor until it reaches this window (in seconds).
    FilterWindow(Real),
}

impl Default for BandSelection {
    fn default() -> Self {
        Self::FilterWindow(DEFAULT_FILTER_WINDOW)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PickerConfig {
    pub bands: BandSelection,
    /// Horizon of the exponentially decaying noise statistics, in seconds.
    pub long_term_window_factor: Real,
    /// Characteristic function level which opens a trigger.
    pub threshold1: Real,
    /// Mean characteristic function level over `t_up_event` which confirms a pick.
    pub threshold2: Real,
    pub t_up_event: Real,
    pub t_up_event_min: Real,
    pub band_width_factor: Real,
    pub num_poles_band_pass: usize,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            bands: BandSelection::default(),
            long_term_window_factor: 10.0,
            threshold1: 10.0,
            threshold2: 10.0,
            t_up_event: 0.5,
            t_up_event_min: 0.1,
            band_width_factor: 2.0,
            num_poles_band_pass: 4,
        }
    }
}

fn require_positive(name: &'static str, value: Real) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

impl PickerConfig {
    /// Checks every parameter and returns the configuration with its band threshold
    /// scale factors normalised so that the largest is 1.0.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        require_positive("longTermWindowFactor", self.long_term_window_factor)?;
        require_positive("threshold1", self.threshold1)?;
        require_positive("threshold2", self.threshold2)?;
        require_positive("tUpEvent", self.t_up_event)?;
        require_positive("tUpEventMin", self.t_up_event_min)?;
        if self.threshold1 < self.threshold2 {
            return Err(ConfigError::ThresholdOrder {
                threshold1: self.threshold1,
                threshold2: self.threshold2,
            });
        }
        if self.t_up_event_min >= self.t_up_event {
            return Err(ConfigError::UpEventOrder {
                t_up_event: self.t_up_event,
                t_up_event_min: self.t_up_event_min,
            });
        }
        if !(MIN_BAND_WIDTH_FACTOR..=MAX_BAND_WIDTH_FACTOR).contains(&self.band_width_factor) {
            return Err(ConfigError::BandWidthFactorRange(self.band_width_factor));
        }
        if self.num_poles_band_pass % 4 != 0 || !(4..=16).contains(&self.num_poles_band_pass) {
            return Err(ConfigError::NumPoles(self.num_poles_band_pass));
        }

        match &mut self.bands {
            BandSelection::FilterWindow(window) => require_positive("filterWindow", *window)?,
            BandSelection::Explicit(bands) => {
                if bands.is_empty() {
                    return Err(ConfigError::NoBands);
                }
                for band in bands.iter() {
                    require_positive("period", band.period)?;
                    require_positive("thresholdScaleFactor", band.threshold_scale_factor)?;
                }
                for (index, (previous, band)) in bands.iter().tuple_windows().enumerate() {
                    if band.period <= previous.period {
                        return Err(ConfigError::PeriodsNotIncreasing {
                            index: index + 1,
                            period: band.period,
                            previous: previous.period,
                        });
                    }
                }
                check_band_width_spread(bands)?;

                let max_scale = bands
                    .iter()
                    .map(|band| band.threshold_scale_factor)
                    .fold(Real::MIN, Real::max);
                for band in bands.iter_mut() {
                    band.threshold_scale_factor /= max_scale;
                }
            }
        }
        Ok(self)
    }

    /// The ratio between consecutive band periods used to design the band filters.
    pub fn effective_band_width_factor(&self) -> Real {
        match &self.bands {
            BandSelection::Explicit(bands) if bands.len() > 1 => {
                mean_period_ratio(bands).unwrap_or(self.band_width_factor)
            }
            _ => self.band_width_factor,
        }
    }

    /// Resolves the band list for a stream sampled every `delta_time` seconds.
    pub fn resolve_bands(&self, delta_time: Real) -> Result<Vec<BandParameters>, ConfigError> {
        let bands = match &self.bands {
            BandSelection::Explicit(bands) => bands.clone(),
            BandSelection::FilterWindow(window) => {
                let first = self.band_width_factor * 2.0 * delta_time;
                let mut bands = Vec::new();
                for exponent in 0.. {
                    let period = first * self.band_width_factor.powi(exponent);
                    bands.push(BandParameters::new(period, 1.0));
                    if period >= *window {
                        break;
                    }
                }
                bands
            }
        };
        let nyquist_period = 2.0 * delta_time;
        if let Some((index, band)) = bands
            .iter()
            .enumerate()
            .find(|(_, band)| band.period <= nyquist_period)
        {
            return Err(ConfigError::PeriodBelowNyquist {
                index,
                period: band.period,
                nyquist_period,
            });
        }
        debug!(
            "Resolved {} bands, periods {:?} s",
            bands.len(),
            bands.iter().map(|band| band.period).collect::<Vec<_>>()
        );
        Ok(bands)
    }
}

fn mean_period_ratio(bands: &[BandParameters]) -> Option<Real> {
    let ratios = bands
        .iter()
        .tuple_windows()
        .map(|(previous, band)| band.period / previous.period)
        .collect::<Vec<_>>();
    (!ratios.is_empty()).then(|| ratios.iter().sum::<Real>() / ratios.len() as Real)
}

fn check_band_width_spread(bands: &[BandParameters]) -> Result<(), ConfigError> {
    let Some(mean) = mean_period_ratio(bands) else {
        return Ok(());
    };
    for (index, (previous, band)) in bands.iter().tuple_windows().enumerate() {
        let ratio = band.period / previous.period;
        let deviation_percent = 100.0 * (ratio - mean).abs() / mean;
        if deviation_percent > MAX_BAND_WIDTH_SPREAD_PERCENT {
            return Err(ConfigError::BandWidthSpread {
                index: index + 1,
                ratio,
                mean,
                deviation_percent,
            });
        }
        if deviation_percent > WARN_BAND_WIDTH_SPREAD_PERCENT {
            warn!(
                band = index + 1,
                ratio, mean, "Band period ratio deviates {deviation_percent:.1}% from the mean"
            );
        }
    }
    Ok(())
}

/// Band list in its textual form, `period#scale[#display]` entries separated by `/`,
/// for instance `0.05#0.1/0.9#1.0#visible`.
#[derive(Default, Debug, Clone, PartialEq)]
pub struct BandList(pub Vec<BandParameters>);

impl FromStr for BandList {
    type Err = BandListError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bands = s
            .split('/')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let fields: Vec<_> = entry.split('#').map(str::trim).collect();
                let number = |field: &str| {
                    Real::from_str(field).map_err(|source| BandListError::Number {
                        entry: entry.to_owned(),
                        source,
                    })
                };
                match fields.as_slice() {
                    [period, scale] => Ok(BandParameters::new(number(*period)?, number(*scale)?)),
                    [period, scale, display] => Ok(BandParameters {
                        period: number(*period)?,
                        threshold_scale_factor: number(*scale)?,
                        display_mode: DisplayMode::from_str(display)
                            .map_err(|_| BandListError::DisplayMode((*display).to_owned()))?,
                    }),
                    _ => Err(BandListError::Fields(entry.to_owned())),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        if bands.is_empty() {
            Err(BandListError::Empty)
        } else {
            Ok(BandList(bands))
        }
    }
}

impl From<BandList> for BandSelection {
    fn from(BandList(bands): BandList) -> Self {
        Self::Explicit(bands)
    }
}
