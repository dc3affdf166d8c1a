//! Nearest-neighbour 2x upscale.

use std::sync::Arc;

use filterhost_core::{FormatMask, ParamScope, SimdMask};

use super::{Kernel, KernelPlugin, Source};
use crate::api::SoftFilterPlugin;

pub(crate) struct Normal2x;

fn configure(_params: &ParamScope<'_>) -> Option<Normal2x> {
    Some(Normal2x)
}

pub(super) fn descriptor(_simd: SimdMask) -> Option<Arc<dyn SoftFilterPlugin>> {
    KernelPlugin::new(
        "normal2x",
        "Normal 2x",
        FormatMask::XRGB8888 | FormatMask::RGB565,
        configure,
    )
    .into_descriptor()
}

impl Kernel for Normal2x {
    fn scale(&self) -> u32 {
        2
    }

    fn sample(&self, src: &Source<'_>, x: u32, y: u32) -> [u8; 3] {
        src.pixel((x / 2) as i64, (y / 2) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_doubles_each_pixel() {
        let plugin = descriptor(SimdMask::empty()).unwrap();
        let input = testing::frame(2, 3, |x, y| [x as u8 * 10, y as u8 * 10, 0]);
        let output = testing::run(&*plugin, "", &input, 2, 3, 2).unwrap();

        assert_eq!(output.len(), 4 * 6 * 4);
        for y in 0..6 {
            for x in 0..4 {
                assert_eq!(testing::pixel(&output, 4, x, y), testing::pixel(&input, 2, x / 2, y / 2));
            }
        }
    }
}
