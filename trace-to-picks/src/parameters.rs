use anyhow::{Context, Result};
use clap::Args;
use filter_picker::{
    BandList, BandSelection, PickerConfig, Real, config::DEFAULT_FILTER_WINDOW,
};
use std::path::Path;

/// Picker settings given on the command line when no configuration file is used.
#[derive(Debug, Clone, Args)]
pub(crate) struct PickerParameters {
    /// Derive bands automatically up to this period, in seconds
    #[clap(long, conflicts_with = "bands")]
    pub(crate) filter_window: Option<Real>,

    /// Explicit bands, as `period#scale[#display]` entries separated by `/`
    #[clap(long)]
    pub(crate) bands: Option<BandList>,

    /// Horizon of the noise statistics, in seconds
    #[clap(long, default_value = "10")]
    pub(crate) long_term_window_factor: Real,

    #[clap(long, default_value = "10")]
    pub(crate) threshold1: Real,

    #[clap(long, default_value = "10")]
    pub(crate) threshold2: Real,

    /// Confirmation window, in seconds
    #[clap(long, default_value = "0.5")]
    pub(crate) t_up_event: Real,

    /// Minimum confirmation window, in seconds
    #[clap(long, default_value = "0.1")]
    pub(crate) t_up_event_min: Real,

    #[clap(long, default_value = "2")]
    pub(crate) band_width_factor: Real,

    #[clap(long, default_value = "4")]
    pub(crate) num_poles_band_pass: usize,
}

impl PickerParameters {
    pub(crate) fn to_config(&self) -> PickerConfig {
        let bands = match &self.bands {
            Some(bands) => BandSelection::from(bands.clone()),
            None => BandSelection::FilterWindow(self.filter_window.unwrap_or(DEFAULT_FILTER_WINDOW)),
        };
        PickerConfig {
            bands,
            long_term_window_factor: self.long_term_window_factor,
            threshold1: self.threshold1,
            threshold2: self.threshold2,
            t_up_event: self.t_up_event,
            t_up_event_min: self.t_up_event_min,
            band_width_factor: self.band_width_factor,
            num_poles_band_pass: self.num_poles_band_pass,
        }
    }
}

/// Reads a JSON picker configuration. Omitted fields take their defaults.
pub(crate) fn load_config(path: &Path) -> Result<PickerConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read configuration file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid picker configuration in {}", path.display()))
}
