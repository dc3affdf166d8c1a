//! Multi-threaded software video filter chains.
//!
//! A [`SoftFilter`] reads a stage list from configuration, negotiates a pixel
//! format at every stage boundary and runs each stage's work packets on a
//! fixed pool of worker threads.
//!
//! # Example
//!
//! ```
//! use filterhost_core::{ConfigFile, PixelFormat, Threads};
//! use filterhost_video::{builtin_source, SoftFilter, SoftFilterOptions};
//!
//! let config = ConfigFile::parse("filters = 1\nfilter0 = darken\ndarken_factor = 0.25").unwrap();
//! let options = SoftFilterOptions::default()
//!     .with_threads(Threads::Fixed(2))
//!     .with_max_size(64, 64);
//! let mut filter = SoftFilter::new(config, options, &builtin_source()).unwrap();
//!
//! let (width, height) = filter.max_output_size();
//! let stride = PixelFormat::Xrgb8888.row_bytes(width);
//! let input = vec![0xffu8; stride * height as usize];
//! let mut output = vec![0u8; stride * height as usize];
//! filter.process(&mut output, stride, &input, width, height, stride).unwrap();
//! ```

mod api;
mod builtin;
mod convert;
mod error;
mod packet;
mod softfilter;
mod workers;

#[cfg(feature = "dynamic")]
mod native;

pub use api::{SoftFilterInstance, SoftFilterPlugin, StageSetup, SOFTFILTER_API_VERSION};
pub use builtin::builtin_source;
pub use convert::convert_rows;
pub use error::{Result, SoftFilterError};
pub use packet::{row_ranges, split_rows, FrameBuffers, RowSlice, WorkPacket};
pub use softfilter::{default_source, SoftFilter, SoftFilterOptions};
pub use workers::WorkerPool;

#[cfg(feature = "dynamic")]
pub use native::{NativeSoftFilter, RawSoftFilterImpl, RawWorkPacket, SoftFilterAbi};
