//! Box blur over a square window.

use std::sync::Arc;

use filterhost_core::{FormatMask, ParamScope, SimdMask};
use tracing::warn;

use super::{channel, Kernel, KernelPlugin, Source};
use crate::api::SoftFilterPlugin;

const MAX_RADIUS: i32 = 8;

pub(crate) struct BoxBlur {
    radius: i64,
}

fn configure(params: &ParamScope<'_>) -> Option<BoxBlur> {
    let radius = params.get_int("radius", 1);
    if !(0..=MAX_RADIUS).contains(&radius) {
        warn!(radius, max = MAX_RADIUS, "boxblur radius out of range");
        return None;
    }
    Some(BoxBlur {
        radius: radius as i64,
    })
}

pub(super) fn descriptor(_simd: SimdMask) -> Option<Arc<dyn SoftFilterPlugin>> {
    KernelPlugin::new(
        "boxblur",
        "Box Blur",
        FormatMask::XRGB8888 | FormatMask::RGB565,
        configure,
    )
    .into_descriptor()
}

impl Kernel for BoxBlur {
    fn sample(&self, src: &Source<'_>, x: u32, y: u32) -> [u8; 3] {
        let (x, y) = (x as i64, y as i64);
        let mut sum = [0u32; 3];
        for dy in -self.radius..=self.radius {
            for dx in -self.radius..=self.radius {
                let p = src.pixel(x + dx, y + dy);
                for c in 0..3 {
                    sum[c] += p[c] as u32;
                }
            }
        }
        let side = (2 * self.radius + 1) as f32;
        let count = side * side;
        sum.map(|s| channel(s as f32 / count))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use pretty_assertions::assert_eq;

    fn plugin() -> Arc<dyn SoftFilterPlugin> {
        descriptor(SimdMask::empty()).unwrap()
    }

    #[test]
    fn test_uniform_frame_is_unchanged() {
        let input = testing::frame(16, 16, |_, _| [128, 128, 128]);
        let output = testing::run(&*plugin(), "boxblur_radius = 2", &input, 16, 16, 2).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn test_spreads_single_bright_pixel() {
        let input = testing::frame(5, 5, |x, y| if (x, y) == (2, 2) { [225, 0, 0] } else { [0, 0, 0] });
        let output = testing::run(&*plugin(), "", &input, 5, 5, 1).unwrap();
        assert_eq!(testing::pixel(&output, 5, 2, 2), [25, 0, 0]);
        assert_eq!(testing::pixel(&output, 5, 1, 1), [25, 0, 0]);
        assert_eq!(testing::pixel(&output, 5, 0, 0), [0, 0, 0]);
    }

    #[test]
    fn test_radius_out_of_range_is_refused() {
        let input = testing::frame(4, 4, |_, _| [0, 0, 0]);
        assert!(testing::run(&*plugin(), "filter0_radius = 9", &input, 4, 4, 1).is_none());
    }
}
