//! Scale every channel by a constant factor.

use std::sync::Arc;

use filterhost_core::{FormatMask, ParamScope, SimdMask};

use super::{channel, Kernel, KernelPlugin, Source};
use crate::api::SoftFilterPlugin;

pub(crate) struct Darken {
    factor: f32,
}

fn configure(params: &ParamScope<'_>) -> Option<Darken> {
    let factor = params.get_float("factor", 0.5);
    (0.0..=1.0).contains(&factor).then_some(Darken { factor })
}

pub(super) fn descriptor(_simd: SimdMask) -> Option<Arc<dyn SoftFilterPlugin>> {
    KernelPlugin::new("darken", "Darken", FormatMask::all(), configure).into_descriptor()
}

impl Kernel for Darken {
    fn sample(&self, src: &Source<'_>, x: u32, y: u32) -> [u8; 3] {
        src.pixel(x as i64, y as i64)
            .map(|c| channel(c as f32 * self.factor))
    }
}
