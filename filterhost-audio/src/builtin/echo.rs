//! Multi-tap feedback echo.

use std::sync::Arc;

use filterhost_core::ParamScope;
use tracing::debug;

use super::BuiltinDsp;
use crate::api::{DspInfo, DspInstance, DspPlugin};

/// Longest accepted tap delay.
const MAX_DELAY_MS: f32 = 10_000.0;

/// Longest delay line, bounding memory at absurd sample rates.
const MAX_DELAY_FRAMES: f32 = 1_920_000.0;

/// One delay line holding interleaved stereo frames.
struct Tap {
    line: Vec<f32>,
    feedback: f32,
    cursor: usize,
}

struct Echo {
    taps: Vec<Tap>,
    input_gain: f32,
    output_gain: f32,
}

fn create(info: &DspInfo, params: &ParamScope<'_>) -> Option<Box<dyn DspInstance>> {
    let delays = params.get_float_array("delay", &[200.0]);
    let feedback = params.get_float_array("feedback", &[0.5]);
    let input_gain = params.get_float("input_gain", 0.75);
    let output_gain = params.get_float("output_gain", 1.0);

    if delays.is_empty() || delays.len() != feedback.len() {
        debug!(delays = delays.len(), feedback = feedback.len(), "Echo taps do not line up");
        return None;
    }

    let taps = delays
        .iter()
        .zip(&feedback)
        .map(|(&delay_ms, &feedback)| {
            if !(0.0..=MAX_DELAY_MS).contains(&delay_ms) || !(-1.0..1.0).contains(&feedback) {
                return None;
            }
            let frames = (delay_ms * info.input_rate / 1000.0).round();
            if !frames.is_finite() || frames < 1.0 || frames > MAX_DELAY_FRAMES {
                return None;
            }
            Some(Tap {
                line: vec![0.0; frames as usize * 2],
                feedback,
                cursor: 0,
            })
        })
        .collect::<Option<Vec<_>>>()?;

    Some(Box::new(Echo {
        taps,
        input_gain,
        output_gain,
    }))
}

pub(super) fn descriptor() -> Arc<dyn DspPlugin> {
    BuiltinDsp::descriptor("echo", "Echo", create)
}

impl DspInstance for Echo {
    fn process(&mut self, input: &[f32], output: &mut Vec<f32>) {
        output.reserve(input.len());
        for frame in input.chunks_exact(2) {
            let mut echo = [0.0f32; 2];
            for tap in &mut self.taps {
                let delayed = &mut tap.line[tap.cursor..tap.cursor + 2];
                for c in 0..2 {
                    echo[c] += delayed[c];
                    delayed[c] = frame[c] + delayed[c] * tap.feedback;
                }
                tap.cursor = (tap.cursor + 2) % tap.line.len();
            }
            for c in 0..2 {
                output.push(frame[c] * self.input_gain + echo[c] * self.output_gain);
            }
        }
    }
}
