//! Stereo remix through a 2x2 gain matrix.

use std::sync::Arc;

use filterhost_core::ParamScope;

use super::BuiltinDsp;
use crate::api::{DspInfo, DspInstance, DspPlugin};

/// Each output channel is a weighted sum of both input channels.
struct Panning {
    left: [f32; 2],
    right: [f32; 2],
}

fn mix(params: &ParamScope<'_>, param: &str, default: [f32; 2]) -> Option<[f32; 2]> {
    match params.get_float_array(param, &default)[..] {
        [l, r] => Some([l, r]),
        _ => None,
    }
}

fn create(_info: &DspInfo, params: &ParamScope<'_>) -> Option<Box<dyn DspInstance>> {
    let left = mix(params, "left_mix", [1.0, 0.0])?;
    let right = mix(params, "right_mix", [0.0, 1.0])?;
    Some(Box::new(Panning { left, right }))
}

pub(super) fn descriptor() -> Arc<dyn DspPlugin> {
    BuiltinDsp::descriptor("panning", "Panning", create)
}

impl DspInstance for Panning {
    fn process(&mut self, input: &[f32], output: &mut Vec<f32>) {
        output.reserve(input.len());
        for frame in input.chunks_exact(2) {
            let (l, r) = (frame[0], frame[1]);
            output.push(l * self.left[0] + r * self.left[1]);
            output.push(l * self.right[0] + r * self.right[1]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing;
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identity_by_default() {
        let plugin = descriptor();
        let mut dsp = testing::instance(&*plugin, "").unwrap();
        let input = [0.5, -0.25, 1.0, 0.0];
        assert_eq!(testing::run(&mut *dsp, &input), input.to_vec());
    }

    #[test]
    fn test_swaps_channels() {
        let plugin = descriptor();
        let config = "filter0_left_mix = \"0.0 1.0\"\nfilter0_right_mix = \"1.0 0.0\"";
        let mut dsp = testing::instance(&*plugin, config).unwrap();
        assert_eq!(testing::run(&mut *dsp, &[0.5, -0.25]), vec![-0.25, 0.5]);
    }

    #[test]
    fn test_mono_downmix_by_ident() {
        let plugin = descriptor();
        let config = "panning_left_mix = \"0.5 0.5\"\npanning_right_mix = \"0.5 0.5\"";
        let mut dsp = testing::instance(&*plugin, config).unwrap();
        assert_eq!(testing::run(&mut *dsp, &[1.0, 0.0]), vec![0.5, 0.5]);
    }

    #[test]
    fn test_rejects_wrong_arity() {
        let plugin = descriptor();
        assert!(testing::instance(&*plugin, "filter0_left_mix = \"1.0 0.0 0.0\"").is_none());
    }
}
