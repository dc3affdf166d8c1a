//! Unsharp mask against the four direct neighbours.

use std::sync::Arc;

use filterhost_core::{FormatMask, ParamScope, SimdMask};
use tracing::warn;

use super::{channel, Kernel, KernelPlugin, Source};
use crate::api::SoftFilterPlugin;

pub(crate) struct Sharpen {
    strength: f32,
}

fn configure(params: &ParamScope<'_>) -> Option<Sharpen> {
    let strength = params.get_float("strength", 0.5);
    if !(0.0..=4.0).contains(&strength) {
        warn!(strength, "sharpen strength must be within 0..=4");
        return None;
    }
    Some(Sharpen { strength })
}

pub(super) fn descriptor(_simd: SimdMask) -> Option<Arc<dyn SoftFilterPlugin>> {
    KernelPlugin::new(
        "sharpen",
        "Sharpen",
        FormatMask::XRGB8888 | FormatMask::RGB565,
        configure,
    )
    .into_descriptor()
}

impl Kernel for Sharpen {
    fn sample(&self, src: &Source<'_>, x: u32, y: u32) -> [u8; 3] {
        let (x, y) = (x as i64, y as i64);
        let center = src.pixel(x, y);
        let neighbours = [
            src.pixel(x - 1, y),
            src.pixel(x + 1, y),
            src.pixel(x, y - 1),
            src.pixel(x, y + 1),
        ];
        let mut out = [0u8; 3];
        for c in 0..3 {
            let avg = neighbours.iter().map(|p| p[c] as f32).sum::<f32>() / 4.0;
            let v = center[c] as f32;
            out[c] = channel(v + self.strength * (v - avg));
        }
        out
    }
}
