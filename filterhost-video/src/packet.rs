//! Work packets and row partitioning.

use std::fmt;
use std::ops::Range;

/// Buffers of one frame as seen by a single stage.
pub struct FrameBuffers<'a> {
    pub output: &'a mut [u8],
    pub output_stride: usize,
    pub input: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub input_stride: usize,
}

/// One independent unit of work for one processing cycle.
pub struct WorkPacket<'a> {
    work: Box<dyn FnOnce() + Send + 'a>,
}

impl<'a> WorkPacket<'a> {
    pub fn new(work: impl FnOnce() + Send + 'a) -> Self {
        Self { work: Box::new(work) }
    }

    /// Run the packet on the current thread.
    pub fn run(self) {
        (self.work)()
    }

    pub(crate) fn into_inner(self) -> Box<dyn FnOnce() + Send + 'a> {
        self.work
    }
}

impl fmt::Debug for WorkPacket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkPacket").finish_non_exhaustive()
    }
}

/// Split `height` rows into `parts` contiguous ranges.
///
/// Range `i` starts at `height * i / parts`, so ranges are disjoint, cover
/// every row exactly once and differ in length by at most one. `parts` is
/// treated as at least 1.
pub fn row_ranges(height: u32, parts: usize) -> Vec<Range<u32>> {
    let parts = parts.max(1) as u64;
    let bound = |i: u64| (height as u64 * i / parts) as u32;
    (0..parts).map(|i| bound(i)..bound(i + 1)).collect()
}

/// The part of a frame assigned to one packet.
///
/// `output` holds exactly the output rows produced from input rows `rows`;
/// `input` is the whole input frame so kernels can read neighbouring rows.
pub struct RowSlice<'a> {
    pub output: &'a mut [u8],
    pub output_stride: usize,
    /// First output row held by `output`.
    pub output_row: u32,
    pub input: &'a [u8],
    pub input_stride: usize,
    pub width: u32,
    pub height: u32,
    /// Input rows this packet is responsible for.
    pub rows: Range<u32>,
}

/// Partition a frame into `parts` disjoint row slices.
///
/// Each input row produces `scale` output rows. The output buffer is split
/// with `split_at_mut`, so slices never alias.
pub fn split_rows(frame: FrameBuffers<'_>, parts: usize, scale: u32) -> Vec<RowSlice<'_>> {
    let FrameBuffers {
        output,
        output_stride,
        input,
        width,
        height,
        input_stride,
    } = frame;

    let mut rest = output;
    let mut slices = Vec::with_capacity(parts.max(1));
    for rows in row_ranges(height, parts) {
        let out_rows = (rows.end - rows.start) as usize * scale as usize;
        let take = (out_rows * output_stride).min(rest.len());
        let (mine, tail) = std::mem::take(&mut rest).split_at_mut(take);
        rest = tail;
        slices.push(RowSlice {
            output: mine,
            output_stride,
            output_row: rows.start * scale,
            input,
            input_stride,
            width,
            height,
            rows,
        });
    }
    slices
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_row_ranges_even() {
        assert_eq!(row_ranges(8, 4), vec![0..2, 2..4, 4..6, 6..8]);
    }

    #[test]
    fn test_row_ranges_uneven_and_small() {
        assert_eq!(row_ranges(5, 2), vec![0..2, 2..5]);
        assert_eq!(row_ranges(2, 4), vec![0..0, 0..1, 1..1, 1..2]);
        assert_eq!(row_ranges(7, 0), vec![0..7]);
    }

    #[test]
    fn test_split_rows_scaled() {
        let input = vec![0u8; 4 * 4 * 3];
        let mut output = vec![0u8; 8 * 4 * 6];
        let frame = FrameBuffers {
            output: &mut output,
            output_stride: 32,
            input: &input,
            width: 4,
            height: 3,
            input_stride: 16,
        };

        let slices = split_rows(frame, 2, 2);
        assert_eq!(slices.len(), 2);
        assert_eq!(slices[0].rows, 0..1);
        assert_eq!(slices[0].output.len(), 2 * 32);
        assert_eq!(slices[1].rows, 1..3);
        assert_eq!(slices[1].output_row, 2);
        assert_eq!(slices[1].output.len(), 4 * 32);
    }

    #[test]
    fn test_split_rows_short_last_row() {
        let input = vec![0u8; 64];
        // Last row is only as long as its pixels, not the full stride
        let mut output = vec![0u8; 3 * 20 + 8];
        let frame = FrameBuffers {
            output: &mut output,
            output_stride: 20,
            input: &input,
            width: 2,
            height: 4,
            input_stride: 16,
        };
        let slices = split_rows(frame, 4, 1);
        let lens: Vec<usize> = slices.iter().map(|s| s.output.len()).collect();
        assert_eq!(lens, vec![20, 20, 20, 8]);
    }

    #[test]
    fn test_packet_runs_once() {
        let count = AtomicUsize::new(0);
        let packet = WorkPacket::new(|| {
            count.fetch_add(1, Ordering::SeqCst);
        });
        packet.run();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
