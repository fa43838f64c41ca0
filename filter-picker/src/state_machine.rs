use crate::{Real, SampleIndex, trigger_window::TriggerWindowBuffer};
use tracing::trace;

/// The clipped cross-band characteristic function must be at or below this
/// level for the gate to open. Settled noise stays below it on almost every
/// sample, so the gate arms as soon as triggering is enabled.
pub(crate) const MAX_ALLOW_NEW_PICK_THRESHOLD: Real = 6.0;

/// Position of the trigger gate.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum GateState {
    /// Waiting for the statistics to settle or the characteristic function to subside.
    #[default]
    Gated,
    /// A trigger window may open after the latest quiet sample.
    Armed,
    /// A pick was accepted and no quiet sample has been seen since.
    Locked,
}

/// Fixed quantities the trigger decision is made with.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TriggerParameters {
    pub(crate) threshold1: Real,
    pub(crate) threshold2: Real,
    pub(crate) n_t_up_event: usize,
    pub(crate) n_t_up_event_min: usize,
    /// First sample count at which triggering is allowed.
    pub(crate) enable_count: SampleIndex,
    pub(crate) num_poles: usize,
    pub(crate) delta_time: Real,
    pub(crate) periods: Vec<Real>,
}

impl TriggerParameters {
    fn period(&self, band: usize) -> Real {
        self.periods.get(band).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub(crate) trigger_index: SampleIndex,
    pub(crate) uncertainty_index: SampleIndex,
    pub(crate) band: usize,
}

/// An accepted trigger with its phase-corrected timing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AcceptedTrigger {
    pub(crate) candidate: Candidate,
    /// Sample at which the trigger was confirmed.
    pub(crate) confirmed_index: SampleIndex,
    pub(crate) trigger_band: usize,
    pub(crate) period: Real,
    pub(crate) amplitude: Real,
    pub(crate) begin_index: Real,
    pub(crate) end_index: Real,
    pub(crate) per_band_max_in_window: Vec<Real>,
    /// Sample within the trigger window at which each band peaked.
    pub(crate) index_band_trigger: Vec<Option<SampleIndex>>,
    pub(crate) per_band_trigger_values: Vec<Real>,
}

#[derive(Debug, Clone)]
pub(crate) struct PickStateMachine {
    parameters: TriggerParameters,
    state: GateState,
    allow_new_pick_index: Option<SampleIndex>,
    can_allow_new_pick_index: Option<SampleIndex>,
}

impl PickStateMachine {
    pub(crate) fn new(parameters: TriggerParameters) -> Self {
        Self {
            parameters,
            state: GateState::default(),
            allow_new_pick_index: None,
            can_allow_new_pick_index: None,
        }
    }

    pub(crate) fn state(&self) -> GateState {
        self.state
    }

    pub(crate) fn can_allow_new_pick_index(&self) -> Option<SampleIndex> {
        self.can_allow_new_pick_index
    }

    /// Advances the gate after sample `now` has been pushed to `history`.
    /// `quiet` tells whether the clipped cross-band characteristic function is
    /// at or below [MAX_ALLOW_NEW_PICK_THRESHOLD].
    pub(crate) fn step(
        &mut self,
        history: &TriggerWindowBuffer,
        now: SampleIndex,
        quiet: bool,
    ) -> Option<AcceptedTrigger> {
        if now + 1 < self.parameters.enable_count {
            return None;
        }
        let critical_integral = history.n_t_up_event() as Real * self.parameters.threshold2;
        let candidate = self
            .allow_new_pick_index
            .filter(|_| history.integral() >= critical_integral)
            .and_then(|allow| self.find_candidate(history, allow, now));
        if let Some(candidate) = candidate {
            self.can_allow_new_pick_index = Some(candidate.trigger_index);
            self.allow_new_pick_index = None;
            self.state = GateState::Locked;
            return Some(self.accept(history, candidate, now));
        }
        if quiet {
            if self.state != GateState::Armed {
                trace!(now, "Trigger gate armed");
            }
            self.allow_new_pick_index = Some(now);
            self.state = GateState::Armed;
        }
        None
    }

    /// Scans the samples after `allow` oldest first and returns the first one
    /// meeting every trigger condition.
    pub(crate) fn find_candidate(
        &self,
        history: &TriggerWindowBuffer,
        allow: SampleIndex,
        now: SampleIndex,
    ) -> Option<Candidate> {
        let parameters = &self.parameters;
        let n_min = history.n_t_up_event_min() as SampleIndex;
        let short_integral_level = parameters.threshold1 * history.n_t_up_event_min() as Real;
        let first = (allow + 1).max(history.oldest_index()?);

        // Earliest sample at or after the current candidate whose short
        // integral reaches its level. Only ever moves forward.
        let mut next_sustained: Option<SampleIndex> = None;
        let mut searched = first - 1;
        for trigger_index in first..=now {
            let Some(entry) = history.get(trigger_index) else {
                continue;
            };
            if entry.char_funct_max < parameters.threshold1 {
                continue;
            }
            let horizon = (trigger_index + n_min).min(now);
            if next_sustained.is_some_and(|index| index < trigger_index) {
                next_sustained = None;
            }
            searched = searched.max(trigger_index - 1);
            while next_sustained.is_none() && searched < horizon {
                searched += 1;
                if history
                    .get(searched)
                    .is_some_and(|entry| entry.integral_short >= short_integral_level)
                {
                    next_sustained = Some(searched);
                }
            }
            if !next_sustained.is_some_and(|index| index <= horizon) {
                continue;
            }

            let band = entry.band_max;
            let max_span =
                (2.0 * parameters.period(band) / parameters.delta_time) as SampleIndex;
            let uncertainty_index = match entry
                .bands
                .get(band)
                .and_then(|sample| sample.uncertainty_index)
            {
                Some(index) if trigger_index - index <= max_span => index,
                _ => trigger_index - max_span,
            };
            if self
                .can_allow_new_pick_index
                .is_some_and(|previous| uncertainty_index <= previous)
            {
                continue;
            }
            return Some(Candidate {
                trigger_index,
                uncertainty_index,
                band,
            });
        }
        None
    }

    fn accept(
        &self,
        history: &TriggerWindowBuffer,
        candidate: Candidate,
        now: SampleIndex,
    ) -> AcceptedTrigger {
        let parameters = &self.parameters;
        let num_bands = parameters.periods.len();
        let trigger_index = candidate.trigger_index;
        let window_end = (trigger_index + history.n_t_up_event_min() as SampleIndex).min(now);

        let mut per_band_max_in_window = vec![Real::MIN; num_bands];
        let mut index_band_trigger = vec![None; num_bands];
        for index in trigger_index..=window_end {
            let Some(entry) = history.get(index) else {
                continue;
            };
            for (band, sample) in entry.bands.iter().enumerate().take(num_bands) {
                if sample.char_funct > per_band_max_in_window[band] {
                    per_band_max_in_window[band] = sample.char_funct;
                    index_band_trigger[band] = Some(index);
                }
            }
        }
        let per_band_trigger_values = (0..num_bands)
            .map(|band| {
                history
                    .band(band, trigger_index)
                    .map(|sample| sample.char_funct)
                    .unwrap_or_default()
            })
            .collect();

        let trigger_band = per_band_max_in_window
            .iter()
            .position(|&max| max > parameters.threshold1)
            .unwrap_or(candidate.band);
        let period = parameters.period(trigger_band);
        let amplitude = per_band_max_in_window
            .get(trigger_band)
            .copied()
            .unwrap_or_default();

        let delta_time = parameters.delta_time;
        let shift = (parameters.num_poles / 2) as Real * period / (8.0 * delta_time);
        let mut end_index = trigger_index as Real - shift;
        let mut begin_index = candidate.uncertainty_index as Real - shift;
        let min_span = period / (4.0 * delta_time);
        if end_index - begin_index < min_span {
            let mid = (end_index + begin_index) / 2.0;
            begin_index = mid - min_span / 2.0;
            end_index = mid + min_span / 2.0;
        }

        AcceptedTrigger {
            candidate,
            confirmed_index: now,
            trigger_band,
            period,
            amplitude,
            begin_index,
            end_index,
            per_band_max_in_window,
            index_band_trigger,
            per_band_trigger_values,
        }
    }
}
