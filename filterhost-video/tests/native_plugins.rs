//! Shared-library plugins loaded through the softfilter ABI.
//!
//! Builds `filterhost-testplugin` once per variant with the cargo running
//! these tests, then loads the results from scratch directories.

#![cfg(feature = "dynamic")]

use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use filterhost_core::{ConfigFile, PixelFormat, SimdMask, Threads};
use filterhost_plugin::{platform_extension, DynamicSource, Plugin, PluginError, PluginOrigin, PluginSource};
use filterhost_video::{SoftFilter, SoftFilterAbi, SoftFilterError, SoftFilterOptions};
use pretty_assertions::assert_eq;

const VALID: &str = "valid";
const WRONG_API: &str = "wrong-api-version";
const NULL_IMPLEMENTATION: &str = "null-implementation";
const NO_ENTRY: &str = "no-entry-point";

/// Path of the built library for `variant`.
fn plugin_library(variant: &str) -> PathBuf {
    static BUILT: OnceLock<PathBuf> = OnceLock::new();
    BUILT
        .get_or_init(build_variants)
        .join(format!("{variant}.{}", platform_extension()))
}

fn build_variants() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR")).join("../filterhost-testplugin/Cargo.toml");
    let target = Path::new(env!("CARGO_TARGET_TMPDIR")).join("testplugin");
    let built = target.join("variants");
    fs::create_dir_all(&built).unwrap();

    for variant in [VALID, WRONG_API, NULL_IMPLEMENTATION, NO_ENTRY] {
        let mut cargo = Command::new(env!("CARGO"));
        cargo
            .args(["build", "--quiet", "--manifest-path"])
            .arg(&manifest)
            .arg("--target-dir")
            .arg(&target)
            .env_remove("CARGO_BUILD_TARGET");
        if variant != VALID {
            cargo.args(["--features", variant]);
        }
        let status = cargo.status().unwrap();
        assert!(status.success(), "building the {variant} test plugin failed");

        let artifact = target
            .join("debug")
            .join(format!("{DLL_PREFIX}filterhost_testplugin{DLL_SUFFIX}"));
        fs::copy(&artifact, built.join(format!("{variant}.{}", platform_extension()))).unwrap();
    }
    built
}

/// Copy variants into a fresh plugin directory under the given file names.
fn plugin_dir(plugins: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, variant) in plugins {
        let file = dir.path().join(format!("{name}.{}", platform_extension()));
        fs::copy(plugin_library(variant), file).unwrap();
    }
    dir
}

fn options(threads: usize) -> SoftFilterOptions {
    SoftFilterOptions::default()
        .with_threads(Threads::Fixed(threads))
        .with_max_size(16, 16)
        .with_simd(SimdMask::empty())
}

fn frame(width: usize, height: usize) -> Vec<u8> {
    (0..width * height)
        .flat_map(|i| (0x0010_2030u32.wrapping_mul(i as u32 + 1) & 0x00ff_ffff).to_le_bytes())
        .collect()
}

#[test]
fn test_native_filter_processes_frame() {
    let dir = plugin_dir(&[("invert", VALID)]);
    let source: DynamicSource<SoftFilterAbi> = DynamicSource::new(dir.path());
    let config = ConfigFile::parse("filters = 1\nfilter0 = invert\ninvert_mask = 255\ninvert_label = edge").unwrap();

    let mut filter = SoftFilter::new(config, options(3), &source).unwrap();
    assert_eq!(filter.stage_idents(), vec!["invert"]);
    assert_eq!(filter.output_format(), PixelFormat::Xrgb8888);
    let info = filter.plugins()[0].clone();
    assert_eq!(info.name, "Invert");
    assert!(matches!(info.origin, PluginOrigin::Native(_)));

    let (width, height) = (8, 7);
    let input = frame(width, height);
    let mut output = vec![0u8; input.len()];
    filter
        .process(&mut output, width * 4, &input, width as u32, height as u32, width * 4)
        .unwrap();

    for (src, dst) in input.chunks_exact(4).zip(output.chunks_exact(4)) {
        let src = u32::from_le_bytes([src[0], src[1], src[2], src[3]]);
        let dst = u32::from_le_bytes([dst[0], dst[1], dst[2], dst[3]]);
        assert_eq!(dst, src ^ 0xff);
    }

    filter.destroy();
}

#[test]
fn test_native_filter_behind_format_conversion() {
    let dir = plugin_dir(&[("invert", VALID)]);
    let source: DynamicSource<SoftFilterAbi> = DynamicSource::new(dir.path());
    let config = ConfigFile::parse("filter = invert").unwrap();
    let options = options(1).with_input_format(PixelFormat::Rgb565);

    let mut filter = SoftFilter::new(config, options, &source).unwrap();
    assert_eq!(filter.output_format(), PixelFormat::Xrgb8888);

    let input = vec![0u8; 4 * 4 * 2];
    let mut output = vec![0u8; 4 * 4 * 4];
    filter.process(&mut output, 16, &input, 4, 4, 8).unwrap();
    for pixel in output.chunks_exact(4) {
        assert_eq!(pixel[..3], [0xff, 0xff, 0xff]);
    }
}

#[test]
fn test_native_create_failure_rolls_back() {
    let dir = plugin_dir(&[("invert", VALID)]);
    let source: DynamicSource<SoftFilterAbi> = DynamicSource::new(dir.path());
    let config = ConfigFile::parse("filters = 2\nfilter0 = invert\nfilter1 = invert\nfilter1_fail = 1").unwrap();

    let result = SoftFilter::new(config, options(2), &source);
    assert!(matches!(
        result,
        Err(SoftFilterError::Plugin(PluginError::InstantiationFailed { index: 1, .. }))
    ));
}

#[test]
fn test_each_broken_library_is_skipped() {
    for variant in [WRONG_API, NULL_IMPLEMENTATION, NO_ENTRY] {
        let dir = plugin_dir(&[("broken", variant)]);
        let source: DynamicSource<SoftFilterAbi> = DynamicSource::new(dir.path());
        assert!(source.enumerate(SimdMask::empty()).is_empty(), "{variant} was registered");
    }
}

#[test]
fn test_good_library_after_rejected_ones_is_registered() {
    let dir = plugin_dir(&[
        ("a_wrong_api", WRONG_API),
        ("b_null", NULL_IMPLEMENTATION),
        ("c_no_entry", NO_ENTRY),
        ("d_invert", VALID),
    ]);
    let source: DynamicSource<SoftFilterAbi> = DynamicSource::new(dir.path());

    let found = source.enumerate(SimdMask::empty());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].ident(), "invert");

    let config = ConfigFile::parse("filter = invert").unwrap();
    let filter = SoftFilter::new(config, options(1), &source).unwrap();
    match &filter.plugins()[0].origin {
        PluginOrigin::Native(path) => assert!(path.ends_with(format!("d_invert.{}", platform_extension()))),
        other => panic!("unexpected origin {other:?}"),
    }
}
