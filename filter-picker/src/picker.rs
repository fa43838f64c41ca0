use crate::{
    BandParameters, ConfigError, PickRecord, PickerConfig, Real, SampleIndex, StreamError,
    characteristic::{BandResponse, CharacteristicFunctionEngine},
    filter_bank::BandFilterBank,
    polarity::PolarityEstimator,
    state_machine::{
        AcceptedTrigger, MAX_ALLOW_NEW_PICK_THRESHOLD, PickStateMachine, TriggerParameters,
    },
    statistics::{AdaptiveStatistics, BandStatistics},
    trigger_window::{BandSample, TriggerWindowBuffer},
};
use tracing::{debug, info};

/// Largest number of samples the trigger window may hold.
pub(crate) const MAX_TRIGGER_WINDOW_SAMPLES: usize = 1 << 20;

/// Number of samples spanned by `seconds`. Windows rounding to no sample are
/// refused.
fn samples_in(name: &'static str, seconds: Real, delta_time: Real) -> Result<Real, ConfigError> {
    let samples = (seconds / delta_time).round();
    if samples < 1.0 {
        return Err(ConfigError::WindowBelowSampleInterval {
            name,
            value: seconds,
            delta_time,
        });
    }
    Ok(samples)
}

pub use crate::state_machine::GateState;

/// Detection quantities of one sample, handed to the observer of
/// [Picker::feed_observed].
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTrace<'a> {
    /// Position of the sample within the block being fed.
    pub index: SampleIndex,
    pub char_funct_max: Real,
    pub clipped_max: Real,
    /// Longest-period band at or above `threshold1`.
    pub longest_triggered_band: Option<usize>,
    pub integral: Real,
    pub integral_short: Real,
    pub gate_state: GateState,
    /// Unclipped characteristic function of every band.
    pub band_char_funct: &'a [Real],
}

/// Everything derived from a validated configuration once the sample interval
/// is known.
#[derive(Debug, Clone)]
pub(crate) struct PickerState {
    delta_time: Real,
    bands: Vec<BandParameters>,
    filters: BandFilterBank,
    adaptive: AdaptiveStatistics,
    statistics: Vec<BandStatistics>,
    engine: CharacteristicFunctionEngine,
    history: TriggerWindowBuffer,
    machine: PickStateMachine,
    polarity: PolarityEstimator,
    previous_filtered: Vec<Real>,
    responses: Vec<BandResponse>,
    band_samples: Vec<BandSample>,
    band_char_funct: Vec<Real>,
    /// Stream index of the next sample.
    next_index: SampleIndex,
}

impl PickerState {
    pub(crate) fn initialize(config: &PickerConfig, delta_time: Real) -> Result<Self, ConfigError> {
        let bands = config.resolve_bands(delta_time)?;
        let periods: Vec<Real> = bands.iter().map(|band| band.period).collect();
        let longest_period = periods.last().copied().ok_or(ConfigError::NoBands)?;
        let num_bands = bands.len();

        let n_t_up_event = samples_in("tUpEvent", config.t_up_event, delta_time)?;
        let n_t_up_event_min = samples_in("tUpEventMin", config.t_up_event_min, delta_time)?;
        let window = n_t_up_event + 1.0 + (longest_period / delta_time).ceil();
        if window > MAX_TRIGGER_WINDOW_SAMPLES as Real {
            return Err(ConfigError::TriggerWindowTooLong {
                samples: window,
                limit: MAX_TRIGGER_WINDOW_SAMPLES,
            });
        }
        let n_t_up_event = n_t_up_event as usize;
        let n_t_up_event_min = n_t_up_event_min as usize;
        let capacity = window as usize;
        let enable_count = (config.long_term_window_factor / delta_time) as SampleIndex;
        let band_width_factor = config.effective_band_width_factor();

        debug!(
            num_bands,
            delta_time,
            band_width_factor,
            n_t_up_event,
            n_t_up_event_min,
            capacity,
            enable_count,
            "Picker state initialised"
        );

        Ok(Self {
            delta_time,
            filters: BandFilterBank::new(
                periods.iter().copied(),
                band_width_factor,
                delta_time,
                config.num_poles_band_pass,
            ),
            adaptive: AdaptiveStatistics::new(
                delta_time,
                config.long_term_window_factor,
                config.threshold1,
            ),
            statistics: vec![BandStatistics::default(); num_bands],
            engine: CharacteristicFunctionEngine::new(
                bands.iter().map(|band| band.threshold_scale_factor).collect(),
                config.threshold1,
            ),
            history: TriggerWindowBuffer::new(capacity, n_t_up_event, n_t_up_event_min),
            machine: PickStateMachine::new(TriggerParameters {
                threshold1: config.threshold1,
                threshold2: config.threshold2,
                n_t_up_event,
                n_t_up_event_min,
                enable_count,
                num_poles: config.num_poles_band_pass,
                delta_time,
                periods: periods.clone(),
            }),
            polarity: PolarityEstimator::new(periods, delta_time, config.threshold1),
            previous_filtered: vec![0.0; num_bands],
            responses: Vec::with_capacity(num_bands),
            band_samples: Vec::with_capacity(num_bands),
            band_char_funct: Vec::with_capacity(num_bands),
            bands,
            next_index: 0,
        })
    }

    /// Runs one sample through every stage. `block_start` is the stream index of
    /// the first sample of the current block.
    fn process(
        &mut self,
        sample: Real,
        block_start: SampleIndex,
        observer: &mut impl FnMut(&SampleTrace),
    ) -> Option<PickRecord> {
        let now = self.next_index;
        self.next_index += 1;

        self.responses.clear();
        self.band_samples.clear();
        self.band_char_funct.clear();
        for (band, (stats, previous)) in self
            .statistics
            .iter_mut()
            .zip(self.previous_filtered.iter_mut())
            .enumerate()
        {
            let filtered = self.filters.advance(band, sample);
            let derivative = filtered - *previous;
            *previous = filtered;

            let (response, x_rec) = self.engine.evaluate(band, filtered, stats);
            self.adaptive.update(stats, x_rec);

            self.responses.push(response);
            self.band_char_funct.push(response.unclipped);
            self.band_samples.push(BandSample {
                char_funct: response.unclipped,
                uncertainty_index: None,
                derivative,
            });
        }

        // Every band latches on the clipped cross-band maximum
        let reduced = self.engine.reduce(&self.responses);
        for (stats, band_sample) in self
            .statistics
            .iter_mut()
            .zip(self.band_samples.iter_mut())
        {
            self.adaptive.update_uncertainty(stats, reduced.clipped_max, now);
            band_sample.uncertainty_index = stats.uncertainty_index;
        }
        let quiet = reduced.clipped_max <= MAX_ALLOW_NEW_PICK_THRESHOLD;
        self.history
            .push(now, &reduced, self.band_samples.iter().copied());
        let accepted = self.machine.step(&self.history, now, quiet);

        observer(&SampleTrace {
            index: now - block_start,
            char_funct_max: reduced.char_funct_max,
            clipped_max: reduced.clipped_max,
            longest_triggered_band: reduced.longest_triggered_band,
            integral: self.history.integral(),
            integral_short: self.history.integral_short(),
            gate_state: self.machine.state(),
            band_char_funct: &self.band_char_funct,
        });

        accepted.map(|trigger| self.record(trigger, block_start))
    }

    fn record(&self, trigger: AcceptedTrigger, block_start: SampleIndex) -> PickRecord {
        let polarity = self.polarity.estimate(&self.history, &trigger);
        let offset = block_start as Real;
        let pick = PickRecord {
            begin_index: trigger.begin_index - offset,
            end_index: trigger.end_index - offset,
            polarity,
            amplitude: trigger.amplitude,
            period: trigger.period,
            trigger_band: trigger.trigger_band,
            n_samples_up_event_used: (trigger.confirmed_index - trigger.candidate.trigger_index)
                .max(0) as usize,
            per_band_trigger_values: trigger.per_band_trigger_values,
            per_band_max_in_window: trigger.per_band_max_in_window,
        };
        debug!(
            begin = pick.begin_index,
            end = pick.end_index,
            %polarity,
            amplitude = pick.amplitude,
            period = pick.period,
            band = pick.trigger_band,
            "Pick accepted"
        );
        pick
    }
}

/// Streaming phase-onset picker for one channel.
#[derive(Debug, Clone)]
pub struct Picker {
    config: PickerConfig,
    state: Option<PickerState>,
}

impl Picker {
    /// Validates `config`. Band periods derived from a filter window are only
    /// checked once the first block fixes the sample interval.
    pub fn configure(config: PickerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            config: config.validate()?,
            state: None,
        })
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    /// The sample interval established by the first block, if any.
    pub fn delta_time(&self) -> Option<Real> {
        self.state.as_ref().map(|state| state.delta_time)
    }

    /// Bands in use, once the sample interval is known.
    pub fn bands(&self) -> Option<&[BandParameters]> {
        self.state.as_ref().map(|state| state.bands.as_slice())
    }

    /// Noise statistics of every band, once the sample interval is known.
    pub fn band_statistics(&self) -> Option<&[BandStatistics]> {
        self.state.as_ref().map(|state| state.statistics.as_slice())
    }

    pub fn gate_state(&self) -> GateState {
        self.state
            .as_ref()
            .map(|state| state.machine.state())
            .unwrap_or_default()
    }

    /// Start of the uncertainty window of the latest pick, relative to the
    /// start of the next block. A later pick always begins after this.
    pub fn can_allow_new_pick_index(&self) -> Option<SampleIndex> {
        let state = self.state.as_ref()?;
        state
            .machine
            .can_allow_new_pick_index()
            .map(|index| index - state.next_index)
    }

    /// Processes a block of samples contiguous with the previous block and
    /// returns the picks it confirmed.
    pub fn feed(
        &mut self,
        delta_time: Real,
        samples: &[Real],
    ) -> Result<Vec<PickRecord>, StreamError> {
        self.feed_observed(delta_time, samples, &mut |_| {})
    }

    /// As [Picker::feed], calling `observer` after every sample.
    #[tracing::instrument(skip_all, fields(num_samples = samples.len(), num_picks))]
    pub fn feed_observed(
        &mut self,
        delta_time: Real,
        samples: &[Real],
        observer: &mut impl FnMut(&SampleTrace),
    ) -> Result<Vec<PickRecord>, StreamError> {
        if !(delta_time.is_finite() && delta_time > 0.0) {
            return Err(StreamError::InvalidDeltaTime(delta_time));
        }
        if let Some((index, &value)) = samples
            .iter()
            .enumerate()
            .find(|(_, sample)| !sample.is_finite())
        {
            return Err(StreamError::NonFiniteSample { index, value });
        }
        let state = match &mut self.state {
            Some(state) if state.delta_time != delta_time => {
                return Err(StreamError::DeltaTimeChanged {
                    established: state.delta_time,
                    received: delta_time,
                });
            }
            Some(state) => state,
            empty => empty.insert(PickerState::initialize(&self.config, delta_time)?),
        };

        let block_start = state.next_index;
        let picks: Vec<_> = samples
            .iter()
            .filter_map(|&sample| state.process(sample, block_start, &mut *observer))
            .collect();
        tracing::Span::current().record("num_picks", picks.len());
        Ok(picks)
    }

    /// Discards all stream state. Call this after a gap in the data; the next
    /// block is treated as the start of a new stream.
    pub fn reset_memory(&mut self) {
        if self.state.take().is_some() {
            info!("Picker memory reset");
        }
    }
}
