//! CPU feature detection and worker-count resolution.

use bitflags::bitflags;

bitflags! {
    /// Instruction-set extensions available on the running CPU.
    ///
    /// Computed once by [`detect_simd`] and handed to every plugin factory,
    /// which may decline to provide an implementation when a required
    /// extension is missing.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SimdMask: u64 {
        const SSE = 1 << 0;
        const SSE2 = 1 << 1;
        const SSE3 = 1 << 2;
        const SSSE3 = 1 << 3;
        const SSE4 = 1 << 4;
        const SSE42 = 1 << 5;
        const AVX = 1 << 6;
        const AVX2 = 1 << 7;
        const FMA = 1 << 8;
        const NEON = 1 << 9;
    }
}

/// Detect SIMD capabilities at runtime (x86_64).
#[cfg(target_arch = "x86_64")]
pub fn detect_simd() -> SimdMask {
    let mut mask = SimdMask::empty();
    let checks = [
        (is_x86_feature_detected!("sse"), SimdMask::SSE),
        (is_x86_feature_detected!("sse2"), SimdMask::SSE2),
        (is_x86_feature_detected!("sse3"), SimdMask::SSE3),
        (is_x86_feature_detected!("ssse3"), SimdMask::SSSE3),
        (is_x86_feature_detected!("sse4.1"), SimdMask::SSE4),
        (is_x86_feature_detected!("sse4.2"), SimdMask::SSE42),
        (is_x86_feature_detected!("avx"), SimdMask::AVX),
        (is_x86_feature_detected!("avx2"), SimdMask::AVX2),
        (is_x86_feature_detected!("fma"), SimdMask::FMA),
    ];
    for (present, flag) in checks {
        if present {
            mask |= flag;
        }
    }
    mask
}

/// Detect SIMD capabilities at runtime (ARM).
#[cfg(target_arch = "aarch64")]
pub fn detect_simd() -> SimdMask {
    // NEON is mandatory on AArch64
    SimdMask::NEON
}

/// Fallback for unsupported architectures.
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
pub fn detect_simd() -> SimdMask {
    SimdMask::empty()
}

/// Requested worker thread count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threads {
    /// One worker per CPU core.
    #[default]
    Auto,
    /// Exactly this many workers (0 is treated as 1).
    Fixed(usize),
}

impl Threads {
    /// Resolve to a concrete count, always at least 1.
    pub fn resolve(self) -> usize {
        match self {
            Self::Auto => std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1),
            Self::Fixed(n) => n.max(1),
        }
    }
}
