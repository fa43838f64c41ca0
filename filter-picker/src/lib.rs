//! This crate provides a real-time phase-onset picker for continuous,
//! evenly sampled waveform streams.
//!
//! The raw signal is split into a bank of bandpass filtered views, each band
//! is normalised against its own long-term noise statistics, and the
//! resulting characteristic function is integrated over two windows to
//! decide when a pick is confirmed. Typical usage looks like:
//! ```rust
//! use filter_picker::{BandSelection, Picker, PickerConfig};
//!
//! let config = PickerConfig {
//!     bands: BandSelection::FilterWindow(1.0),
//!     ..Default::default()
//! };
//! let mut picker = Picker::configure(config).expect("configuration should be valid");
//! let block = vec![0.0; 500];
//! let picks = picker.feed(0.01, &block).expect("sample interval should be valid");
//! assert!(picks.is_empty());
//! ```
//! Successive calls to [`Picker::feed`] must carry contiguous samples.
//! After a data gap call [`Picker::reset_memory`] before feeding again.

pub(crate) mod characteristic;
pub mod config;
pub mod error;
pub(crate) mod filter_bank;
pub mod pick;
pub mod picker;
pub(crate) mod polarity;
pub mod ring_buffer;
pub(crate) mod state_machine;
pub mod statistics;
pub(crate) mod trigger_window;

pub use config::{BandList, BandParameters, BandSelection, DisplayMode, PickerConfig};
pub use error::{BandListError, ConfigError, StreamError};
pub use pick::{PickRecord, Polarity};
pub use picker::{GateState, Picker, SampleTrace};
pub use ring_buffer::RingBuffer;
pub use statistics::BandStatistics;

pub use filterpicker_common::{Real, SampleIndex};
