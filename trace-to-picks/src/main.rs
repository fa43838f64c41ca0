mod parameters;
mod processing;

use anyhow::{Context, Result};
use clap::Parser;
use filter_picker::{Picker, Real};
use filterpicker_common::{
    init_tracer,
    metrics::{
        component_info_metric,
        names::{BLOCKS_PROCESSED, FAILURES, PICKS_EMITTED, SAMPLES_PROCESSED},
    },
};
use parameters::PickerParameters;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};
use tracing::info;

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Text file of whitespace separated samples, `-` reads standard input
    #[clap(long)]
    input: PathBuf,

    /// Sample interval, in seconds
    #[clap(long)]
    delta_time: Real,

    /// Number of samples fed to the picker at once
    #[clap(long, default_value = "1000")]
    block_size: usize,

    /// JSON picker configuration, replacing the picker options below
    #[clap(long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    picker: PickerParameters,

    /// Write picks to this file instead of standard output
    #[clap(long)]
    output: Option<PathBuf>,

    /// Save the per-sample characteristic function of visible bands as CSV
    #[clap(long)]
    save_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    let tracer = init_tracer!();

    let args = Cli::parse();

    component_info_metric("trace-to-picks");
    metrics::describe_counter!(
        SAMPLES_PROCESSED,
        metrics::Unit::Count,
        "Number of samples processed"
    );
    metrics::describe_counter!(
        BLOCKS_PROCESSED,
        metrics::Unit::Count,
        "Number of sample blocks processed"
    );
    metrics::describe_counter!(
        PICKS_EMITTED,
        metrics::Unit::Count,
        "Number of picks emitted"
    );
    metrics::describe_counter!(
        FAILURES,
        metrics::Unit::Count,
        "Number of failures encountered"
    );

    let config = match &args.config {
        Some(path) => parameters::load_config(path)?,
        None => args.picker.to_config(),
    };
    let mut picker = Picker::configure(config).context("Invalid picker configuration")?;

    let samples = processing::read_samples(&args.input)?;

    let mut saver = args
        .save_file
        .as_deref()
        .map(|path| processing::create_trace_saver(path, &picker, args.delta_time))
        .transpose()?;

    let mut output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("Cannot create output file {}", path.display())
        })?)),
        None => Box::new(std::io::stdout().lock()),
    };

    let num_picks = processing::process(
        &mut picker,
        &samples,
        args.delta_time,
        args.block_size,
        &mut output,
        saver.as_mut(),
    )?;
    output.flush()?;
    if let Some(saver) = saver {
        saver.into_inner().flush()?;
    }

    info!(
        service = tracer.service_name(),
        num_picks,
        num_samples = samples.len(),
        "Finished"
    );
    Ok(())
}
