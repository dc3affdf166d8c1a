//! Sequential audio DSP filter chains.
//!
//! A [`DspFilter`] reads a stage list from configuration and runs
//! interleaved stereo `f32` audio through every stage in order. Stages are
//! stateful and may change the frame count, so each stage consumes exactly
//! what the previous one produced.
//!
//! # Example
//!
//! ```
//! use filterhost_audio::{builtin_source, DspFilter, DspOptions};
//! use filterhost_core::ConfigFile;
//!
//! let config = ConfigFile::parse(
//!     "filters = 1\nfilter0 = panning\npanning_left_mix = \"0.0 1.0\"\npanning_right_mix = \"1.0 0.0\"",
//! )
//! .unwrap();
//! let mut dsp = DspFilter::new(config, DspOptions::default(), &builtin_source()).unwrap();
//!
//! let output = dsp.process(&[0.25, 0.75]).unwrap();
//! assert_eq!(output.frames, 1);
//! assert_eq!(output.samples, &[0.75, 0.25]);
//! ```

mod api;
mod builtin;
mod dsp;
mod error;

#[cfg(feature = "dynamic")]
mod native;

pub use api::{DspInfo, DspInstance, DspPlugin, CHANNELS, DSPFILTER_API_VERSION};
pub use builtin::builtin_source;
pub use dsp::{default_source, DspFilter, DspOptions, DspOutput};
pub use error::{DspError, Result};

#[cfg(feature = "dynamic")]
pub use native::{DspAbi, NativeDsp, RawDspImpl, RawDspInfo, RawDspInput, RawDspOutput};
