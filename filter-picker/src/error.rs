use crate::Real;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("No bands configured")]
    NoBands,
    #[error("{name} must be a positive finite number, got {value}")]
    NotPositive { name: &'static str, value: Real },
    #[error("threshold1 ({threshold1}) must not be less than threshold2 ({threshold2})")]
    ThresholdOrder { threshold1: Real, threshold2: Real },
    #[error("tUpEventMin ({t_up_event_min} s) must be shorter than tUpEvent ({t_up_event} s)")]
    UpEventOrder {
        t_up_event: Real,
        t_up_event_min: Real,
    },
    #[error("Band width factor {0} outside the range [1.1, 100]")]
    BandWidthFactorRange(Real),
    #[error("numPolesBandPass must be a multiple of 4 in [4, 16], got {0}")]
    NumPoles(usize),
    #[error("Band periods must strictly increase: band {index} has period {period} after {previous}")]
    PeriodsNotIncreasing {
        index: usize,
        period: Real,
        previous: Real,
    },
    #[error("Band {index} period ratio {ratio:.4} deviates {deviation_percent:.1}% from the mean ratio {mean:.4}")]
    BandWidthSpread {
        index: usize,
        ratio: Real,
        mean: Real,
        deviation_percent: Real,
    },
    #[error("{name} ({value} s) is shorter than one sample at an interval of {delta_time} s")]
    WindowBelowSampleInterval {
        name: &'static str,
        value: Real,
        delta_time: Real,
    },
    #[error("Trigger window of {samples} samples exceeds the limit of {limit} samples")]
    TriggerWindowTooLong { samples: Real, limit: usize },
    #[error("Band {index} period {period} s is not above the Nyquist period {nyquist_period} s")]
    PeriodBelowNyquist {
        index: usize,
        period: Real,
        nyquist_period: Real,
    },
}

#[derive(Debug, Error, PartialEq)]
pub enum StreamError {
    #[error("Sample interval must be a positive finite number, got {0}")]
    InvalidDeltaTime(Real),
    #[error("Sample interval changed from {established} s to {received} s mid-stream")]
    DeltaTimeChanged { established: Real, received: Real },
    #[error("Sample {index} of the block is not finite: {value}")]
    NonFiniteSample { index: usize, value: Real },
    #[error("Configuration rejected for this sample interval: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Error, PartialEq)]
pub enum BandListError {
    #[error("Band list is empty")]
    Empty,
    #[error("Incorrect number of fields in band '{0}', expected pattern 'period#scale' or 'period#scale#display'")]
    Fields(String),
    #[error("Invalid number in band '{entry}': {source}")]
    Number {
        entry: String,
        source: std::num::ParseFloatError,
    },
    #[error("Unknown display mode '{0}'")]
    DisplayMode(String),
}
