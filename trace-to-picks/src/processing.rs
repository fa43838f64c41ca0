use anyhow::{Context, Result, anyhow};
use filter_picker::{BandParameters, DisplayMode, PickRecord, Picker, Polarity, Real, SampleTrace};
use filterpicker_common::metrics::{
    failures::{self, FailureKind},
    names::{BLOCKS_PROCESSED, FAILURES, PICKS_EMITTED, SAMPLES_PROCESSED},
    picks_emitted::{self, PolarityKind},
};
use metrics::counter;
use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
    str::FromStr,
};
use tracing::{debug, info, warn};

pub(crate) const PICK_HEADER: &str =
    "begin_index,end_index,polarity,amplitude,period,trigger_band,n_samples_up_event_used";

/// Parses whitespace separated samples.
pub(crate) fn parse_samples(text: &str) -> Result<Vec<Real>> {
    text.split_whitespace()
        .enumerate()
        .map(|(index, token)| {
            Real::from_str(token).map_err(|e| {
                counter!(FAILURES, &[failures::get_label(FailureKind::InvalidSample)])
                    .increment(1);
                anyhow!("Invalid sample {index} '{token}': {e}")
            })
        })
        .collect()
}

/// Reads samples from `path`, or from standard input when `path` is `-`.
pub(crate) fn read_samples(path: &Path) -> Result<Vec<Real>> {
    let text = if path == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Cannot read samples from standard input")?;
        text
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read samples from {}", path.display()))?
    };
    let samples = parse_samples(&text)?;
    info!("Read {} samples", samples.len());
    Ok(samples)
}

fn polarity_kind(polarity: Polarity) -> PolarityKind {
    match polarity {
        Polarity::Positive => PolarityKind::Positive,
        Polarity::Negative => PolarityKind::Negative,
        Polarity::Unknown => PolarityKind::Unknown,
    }
}

/// Writes the per-sample trace of the picker as CSV, one column per visible band.
pub(crate) struct TraceSaver<W: Write> {
    writer: W,
    visible_bands: Vec<usize>,
    block_start: usize,
}

impl<W: Write> TraceSaver<W> {
    pub(crate) fn new(mut writer: W, bands: &[BandParameters]) -> std::io::Result<Self> {
        let visible_bands: Vec<_> = bands
            .iter()
            .enumerate()
            .filter(|(_, band)| band.display_mode == DisplayMode::Visible)
            .map(|(index, _)| index)
            .collect();
        write!(
            writer,
            "index,char_funct_max,clipped_max,integral,integral_short,gate_state"
        )?;
        for &band in &visible_bands {
            if let Some(band) = bands.get(band) {
                write!(writer, ",band_{}", band.period)?;
            }
        }
        writeln!(writer)?;
        Ok(Self {
            writer,
            visible_bands,
            block_start: 0,
        })
    }

    fn write(&mut self, trace: &SampleTrace) -> std::io::Result<()> {
        write!(
            self.writer,
            "{},{},{},{},{},{}",
            self.block_start as i64 + trace.index,
            trace.char_funct_max,
            trace.clipped_max,
            trace.integral,
            trace.integral_short,
            trace.gate_state
        )?;
        for &band in &self.visible_bands {
            if let Some(value) = trace.band_char_funct.get(band) {
                write!(self.writer, ",{value}")?;
            }
        }
        writeln!(self.writer)
    }

    pub(crate) fn into_inner(self) -> W {
        self.writer
    }
}

/// Opens the CSV trace file for the bands `picker` will use at `delta_time`.
pub(crate) fn create_trace_saver(
    path: &Path,
    picker: &Picker,
    delta_time: Real,
) -> Result<TraceSaver<BufWriter<File>>> {
    let bands = picker.config().resolve_bands(delta_time)?;
    if bands
        .iter()
        .all(|band| band.display_mode == DisplayMode::Hidden)
    {
        warn!("No band is visible, only cross-band values are saved");
    }
    let file = File::create(path)
        .with_context(|| format!("Cannot create save file {}", path.display()))?;
    Ok(TraceSaver::new(BufWriter::new(file), &bands)?)
}

/// Feeds `samples` to `picker` in blocks of `block_size` and writes every pick
/// to `output`, indexed from the first sample. Returns the number of picks.
pub(crate) fn process<W: Write, S: Write>(
    picker: &mut Picker,
    samples: &[Real],
    delta_time: Real,
    block_size: usize,
    output: &mut W,
    mut saver: Option<&mut TraceSaver<S>>,
) -> Result<usize> {
    writeln!(output, "{PICK_HEADER}")?;
    let mut num_picks = 0;
    for (block, chunk) in samples.chunks(block_size.max(1)).enumerate() {
        let block_start = block * block_size.max(1);
        let mut save_error = None;
        let result = match saver.as_deref_mut() {
            Some(saver) => {
                saver.block_start = block_start;
                picker.feed_observed(delta_time, chunk, &mut |trace| {
                    if save_error.is_none() {
                        save_error = saver.write(trace).err();
                    }
                })
            }
            None => picker.feed(delta_time, chunk),
        };
        let picks = result.inspect_err(|_| {
            counter!(FAILURES, &[failures::get_label(FailureKind::StreamRejected)]).increment(1);
        })?;
        if let Some(e) = save_error {
            counter!(FAILURES, &[failures::get_label(FailureKind::FileWriteFailed)]).increment(1);
            return Err(e).context("Cannot write to save file");
        }

        counter!(BLOCKS_PROCESSED).increment(1);
        counter!(SAMPLES_PROCESSED).increment(chunk.len() as u64);
        for pick in picks {
            write_pick(output, pick, block_start)?;
            num_picks += 1;
        }
    }
    debug!(num_picks, "All blocks processed");
    Ok(num_picks)
}

fn write_pick<W: Write>(output: &mut W, mut pick: PickRecord, block_start: usize) -> Result<()> {
    counter!(
        PICKS_EMITTED,
        &[picks_emitted::get_label(polarity_kind(pick.polarity))]
    )
    .increment(1);
    pick.begin_index += block_start as Real;
    pick.end_index += block_start as Real;
    info!(%pick, "Pick");
    writeln!(output, "{pick}")?;
    Ok(())
}
