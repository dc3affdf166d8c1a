//! Integration tests for filterhost-video

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use filterhost_core::{ConfigFile, CoreError, FormatMask, LifecycleState, ParamScope, PixelFormat, SimdMask, Threads};
use filterhost_plugin::{BuiltinSource, Plugin, PluginError, PluginInfo, PluginKind};
use filterhost_video::{
    builtin_source, split_rows, FrameBuffers, SoftFilter, SoftFilterError, SoftFilterInstance, SoftFilterOptions,
    SoftFilterPlugin, StageSetup, WorkPacket, SOFTFILTER_API_VERSION,
};
use pretty_assertions::assert_eq;

#[derive(Default)]
struct Counters {
    created: AtomicUsize,
    destroyed: AtomicUsize,
}

/// Copies its input, counting instances. Refuses to build when `fail = 1`.
struct Recorder {
    info: PluginInfo,
    formats: FormatMask,
    counters: Arc<Counters>,
}

struct RecorderInstance {
    format: PixelFormat,
    threads: usize,
    counters: Arc<Counters>,
}

impl Plugin for Recorder {
    fn info(&self) -> &PluginInfo {
        &self.info
    }
}

impl SoftFilterPlugin for Recorder {
    fn input_formats(&self) -> FormatMask {
        self.formats
    }

    fn output_formats(&self, input: PixelFormat) -> FormatMask {
        input.mask()
    }

    fn create(&self, setup: &StageSetup, params: &ParamScope<'_>) -> Option<Box<dyn SoftFilterInstance>> {
        if params.get_int("fail", 0) == 1 {
            return None;
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Some(Box::new(RecorderInstance {
            format: setup.input_format,
            threads: setup.threads,
            counters: Arc::clone(&self.counters),
        }))
    }
}

impl SoftFilterInstance for RecorderInstance {
    fn num_threads(&self) -> usize {
        self.threads
    }

    fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        (width, height)
    }

    fn work_packets<'a>(&'a self, frame: FrameBuffers<'a>) -> Vec<WorkPacket<'a>> {
        let row = self.format.row_bytes(frame.width);
        split_rows(frame, self.threads, 1)
            .into_iter()
            .map(|slice| {
                WorkPacket::new(move || {
                    let output = slice.output;
                    for (local, y) in slice.rows.clone().enumerate() {
                        let src = &slice.input[y as usize * slice.input_stride..][..row];
                        output[local * slice.output_stride..][..row].copy_from_slice(src);
                    }
                })
            })
            .collect()
    }
}

impl Drop for RecorderInstance {
    fn drop(&mut self) {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

fn recorder_source(idents: &[&'static str], formats: FormatMask, counters: &Arc<Counters>) -> BuiltinSource<dyn SoftFilterPlugin> {
    idents.iter().fold(BuiltinSource::new(), |source, &ident| {
        let counters = Arc::clone(counters);
        source.with(move |_simd: SimdMask| {
            Some(Arc::new(Recorder {
                info: PluginInfo::builtin(ident, ident, PluginKind::SoftFilter, SOFTFILTER_API_VERSION),
                formats,
                counters: Arc::clone(&counters),
            }) as Arc<dyn SoftFilterPlugin>)
        })
    })
}

fn options(threads: usize) -> SoftFilterOptions {
    SoftFilterOptions::default()
        .with_threads(Threads::Fixed(threads))
        .with_max_size(64, 64)
        .with_simd(SimdMask::empty())
}

/// Deterministic XRGB8888 test pattern.
fn pattern(width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0u8; PixelFormat::Xrgb8888.row_bytes(width) * height as usize];
    for y in 0..height {
        for x in 0..width {
            let offset = ((y * width + x) * 4) as usize;
            let rgb = [(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 8) as u8];
            PixelFormat::Xrgb8888.pack(&mut data, offset, rgb);
        }
    }
    data
}

fn run(filter: &mut SoftFilter, input: &[u8], width: u32, height: u32) -> Vec<u8> {
    let (ow, oh) = filter.output_size(width, height);
    let stride = filter.output_format().row_bytes(ow);
    let mut output = vec![0u8; stride * oh as usize];
    let in_stride = PixelFormat::Xrgb8888.row_bytes(width);
    filter
        .process(&mut output, stride, input, width, height, in_stride)
        .unwrap();
    output
}

#[test]
fn test_stage_order_follows_config() {
    let counters = Arc::new(Counters::default());
    let source = recorder_source(&["a", "b", "c"], FormatMask::all(), &counters);
    let config = ConfigFile::parse("filters = 3\nfilter0 = c\nfilter1 = a\nfilter2 = b").unwrap();

    let filter = SoftFilter::new(config, options(1), &source).unwrap();
    assert_eq!(filter.stage_idents(), vec!["c", "a", "b"]);
    assert_eq!(filter.state(), LifecycleState::Ready);
    assert_eq!(counters.created.load(Ordering::SeqCst), 3);
}

#[test]
fn test_failed_stage_rolls_back_earlier_stages() {
    let counters = Arc::new(Counters::default());
    let source = recorder_source(&["a", "b"], FormatMask::all(), &counters);
    let config = ConfigFile::parse(
        "filters = 5\nfilter0 = a\nfilter1 = b\nfilter2 = a\nfilter3 = b\nfilter4 = a\nfilter3_fail = 1",
    )
    .unwrap();

    let result = SoftFilter::new(config, options(2), &source);
    assert!(matches!(
        result,
        Err(SoftFilterError::Plugin(PluginError::InstantiationFailed { index: 3, .. }))
    ));
    assert_eq!(counters.created.load(Ordering::SeqCst), 3);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 3);
}

#[test]
fn test_unknown_stage_is_not_found() {
    let counters = Arc::new(Counters::default());
    let source = recorder_source(&["a"], FormatMask::all(), &counters);
    let config = ConfigFile::parse("filters = 2\nfilter0 = a\nfilter1 = nope").unwrap();

    let result = SoftFilter::new(config, options(1), &source);
    assert!(matches!(
        result,
        Err(SoftFilterError::Plugin(PluginError::NotFound { ident })) if ident == "nope"
    ));
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_missing_stage_count() {
    let config = ConfigFile::parse("boxblur_radius = 1").unwrap();
    let result = SoftFilter::new(config, options(1), &builtin_source());
    assert!(matches!(
        result,
        Err(SoftFilterError::Plugin(PluginError::Core(CoreError::MissingKey(key)))) if key == "filters"
    ));
}

#[test]
fn test_empty_registry_fails() {
    let source: BuiltinSource<dyn SoftFilterPlugin> = BuiltinSource::new().with(|_| None);
    let config = ConfigFile::parse("filter = darken").unwrap();
    assert!(matches!(
        SoftFilter::new(config, options(1), &source),
        Err(SoftFilterError::Plugin(PluginError::EmptyRegistry))
    ));
}

#[test]
fn test_single_filter_key() {
    let config = ConfigFile::parse("filter = darken\nfilter_factor = 0.5").unwrap();
    let mut filter = SoftFilter::new(config, options(1), &builtin_source()).unwrap();
    assert_eq!(filter.stage_idents(), vec!["darken"]);

    let mut input = vec![0u8; 4];
    PixelFormat::Xrgb8888.pack(&mut input, 0, [200, 100, 50]);
    let output = run(&mut filter, &input, 1, 1);
    assert_eq!(PixelFormat::Xrgb8888.unpack(&output, 0), [100, 50, 25]);
}

#[test]
fn test_negotiation_converts_for_restricted_stage() {
    let counters = Arc::new(Counters::default());
    let source = recorder_source(&["only565"], FormatMask::RGB565, &counters);
    let config = ConfigFile::parse("filters = 1\nfilter0 = only565").unwrap();
    let mut filter = SoftFilter::new(config, options(2), &source).unwrap();
    assert_eq!(filter.output_format(), PixelFormat::Rgb565);

    let mut input = vec![0u8; 8];
    PixelFormat::Xrgb8888.pack(&mut input, 0, [255, 0, 0]);
    PixelFormat::Xrgb8888.pack(&mut input, 4, [0, 255, 0]);
    let output = run(&mut filter, &input, 2, 1);
    assert_eq!(output.len(), 4);
    assert_eq!(u16::from_ne_bytes([output[0], output[1]]), 0xf800);
    assert_eq!(u16::from_ne_bytes([output[2], output[3]]), 0x07e0);
}

#[test]
fn test_negotiation_failure() {
    let counters = Arc::new(Counters::default());
    let source = recorder_source(&["nothing"], FormatMask::empty(), &counters);
    let config = ConfigFile::parse("filters = 1\nfilter0 = nothing").unwrap();
    assert!(matches!(
        SoftFilter::new(config, options(1), &source),
        Err(SoftFilterError::Plugin(PluginError::Negotiation { index: 0, .. }))
    ));
    assert_eq!(counters.created.load(Ordering::SeqCst), 0);
}

#[test]
fn test_single_thread_matches_multi_thread() {
    let input = pattern(64, 64);
    let text = "filters = 1\nfilter0 = boxblur\nboxblur_radius = 2";

    let mut single = SoftFilter::new(ConfigFile::parse(text).unwrap(), options(1), &builtin_source()).unwrap();
    let mut multi = SoftFilter::new(ConfigFile::parse(text).unwrap(), options(4), &builtin_source()).unwrap();
    assert_eq!(single.worker_threads(), 0);
    assert_eq!(multi.worker_threads(), 4);

    let a = run(&mut single, &input, 64, 64);
    let b = run(&mut multi, &input, 64, 64);
    assert!(a == b, "single and multi-threaded output differ");

    // Repeated cycles reuse the same workers
    let c = run(&mut multi, &input, 64, 64);
    assert!(b == c);
}

#[test]
fn test_blur_sharpen_scenario() {
    let config = ConfigFile::parse("filters = 2\nfilter0 = boxblur\nfilter1 = sharpen").unwrap();
    let options = SoftFilterOptions::default()
        .with_threads(Threads::Fixed(4))
        .with_max_size(1920, 1080);
    let mut filter = SoftFilter::new(config, options, &builtin_source()).unwrap();

    assert_eq!(filter.stage_idents(), vec!["boxblur", "sharpen"]);
    assert_eq!(filter.max_output_size(), (1920, 1080));
    assert_eq!(filter.output_format(), PixelFormat::Xrgb8888);

    let mut input = vec![0u8; 64 * 64 * 4];
    for offset in (0..input.len()).step_by(4) {
        PixelFormat::Xrgb8888.pack(&mut input, offset, [128, 128, 128]);
    }
    assert_eq!(filter.output_size(64, 64), (64, 64));
    let output = run(&mut filter, &input, 64, 64);
    assert!(output == input, "uniform gray must pass through blur and sharpen unchanged");
}

#[test]
fn test_upscale_chain_sizes() {
    let config = ConfigFile::parse("filters = 2\nfilter0 = normal2x\nfilter1 = darken\ndarken_factor = 1.0").unwrap();
    let mut filter = SoftFilter::new(config, options(3), &builtin_source()).unwrap();
    assert_eq!(filter.max_output_size(), (128, 128));

    let input = pattern(5, 7);
    let output = run(&mut filter, &input, 5, 7);
    assert_eq!(output.len(), 10 * 14 * 4);
    for y in 0..14u32 {
        for x in 0..10u32 {
            let got = PixelFormat::Xrgb8888.unpack(&output, ((y * 10 + x) * 4) as usize);
            let want = PixelFormat::Xrgb8888.unpack(&input, (((y / 2) * 5 + x / 2) * 4) as usize);
            assert_eq!(got, want);
        }
    }
}

#[test]
fn test_process_validates_arguments() {
    let config = ConfigFile::parse("filter = darken").unwrap();
    let mut filter = SoftFilter::new(config, options(1), &builtin_source()).unwrap();
    let mut output = vec![0u8; 16];
    let input = vec![0u8; 16];

    assert!(matches!(
        filter.process(&mut output, 16, &input, 65, 1, 260),
        Err(SoftFilterError::FrameTooLarge { .. })
    ));
    assert!(matches!(
        filter.process(&mut output, 16, &input, 4, 2, 16),
        Err(SoftFilterError::BufferTooSmall { buffer: "input", .. })
    ));
    assert!(matches!(
        filter.process(&mut output, 8, &input, 4, 1, 16),
        Err(SoftFilterError::InvalidStride { buffer: "output", .. })
    ));
    assert!(matches!(
        filter.process(&mut output, 16, &input, 4, 2, usize::MAX / 2),
        Err(SoftFilterError::BufferTooSmall {
            buffer: "input",
            needed: usize::MAX,
            ..
        })
    ));
    assert!(filter.process(&mut output, 16, &input, 0, 0, 16).is_ok());
}

#[test]
fn test_destroy_is_idempotent() {
    let counters = Arc::new(Counters::default());
    let source = recorder_source(&["a"], FormatMask::all(), &counters);
    let config = ConfigFile::parse("filters = 2\nfilter0 = a\nfilter1 = a").unwrap();
    let mut filter = SoftFilter::new(config, options(2), &source).unwrap();

    filter.destroy();
    assert_eq!(filter.state(), LifecycleState::Destroyed);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 2);
    assert_eq!(filter.worker_threads(), 0);
    assert!(filter.plugins().is_empty());

    filter.destroy();
    drop(filter);
    assert_eq!(counters.destroyed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_process_after_destroy() {
    let config = ConfigFile::parse("filter = darken").unwrap();
    let mut filter = SoftFilter::new(config, options(1), &builtin_source()).unwrap();
    filter.destroy();
    let mut output = vec![0u8; 4];
    assert!(matches!(
        filter.process(&mut output, 4, &[0u8; 4], 1, 1, 4),
        Err(SoftFilterError::Destroyed)
    ));
}

#[test]
fn test_open_from_file_with_include() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("common.cfg"), "sharpen_strength = 0.25\n").unwrap();
    std::fs::write(
        dir.path().join("chain.cfg"),
        "#include \"common.cfg\"\nfilters = 1\nfilter0 = sharpen\n",
    )
    .unwrap();

    let filter = SoftFilter::open(dir.path().join("chain.cfg"), options(1), &builtin_source()).unwrap();
    assert_eq!(filter.stage_idents(), vec!["sharpen"]);
    assert_eq!(filter.plugins().len(), 4);
}
