//! # Filterhost Core
//!
//! Shared building blocks for the filterhost video and audio engines:
//! - Error handling types
//! - Pixel formats and format bitmasks
//! - Capability negotiation between adjacent stages
//! - CPU feature detection
//! - The plain-text configuration file and the per-stage parameter lookup
//!   plugins use to read their settings
//! - Lifecycle states shared by both engines

pub mod config;
pub mod error;
pub mod format;
pub mod lifecycle;
pub mod negotiate;
pub mod params;
pub mod simd;

pub use config::ConfigFile;
pub use error::{CoreError, Result};
pub use format::{FormatMask, PixelFormat};
pub use lifecycle::LifecycleState;
pub use negotiate::{negotiate, NEGOTIATION_PRIORITY};
pub use params::ParamScope;
pub use simd::{detect_simd, SimdMask, Threads};
