//! Where plugin descriptors come from.

use std::sync::Arc;

use filterhost_core::SimdMask;
use tracing::debug;

/// A provider of plugin descriptors.
///
/// Enumeration is best-effort: candidates that cannot be provided are left
/// out rather than failing the whole pass.
pub trait PluginSource<D: ?Sized> {
    /// Short description for log messages.
    fn describe(&self) -> String;

    /// Produce every descriptor available for this CPU.
    fn enumerate(&self, simd: SimdMask) -> Vec<Arc<D>>;
}

/// Factory for one compiled-in plugin. Returns `None` when the
/// implementation is unavailable, e.g. a required SIMD extension is missing.
pub type Factory<D> = Box<dyn Fn(SimdMask) -> Option<Arc<D>> + Send + Sync>;

/// Plugins compiled into the binary, enumerated in table order.
pub struct BuiltinSource<D: ?Sized> {
    factories: Vec<Factory<D>>,
}

impl<D: ?Sized> BuiltinSource<D> {
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Append a factory to the table.
    pub fn with<F>(mut self, factory: F) -> Self
    where
        F: Fn(SimdMask) -> Option<Arc<D>> + Send + Sync + 'static,
    {
        self.factories.push(Box::new(factory));
        self
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl<D: ?Sized> Default for BuiltinSource<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: ?Sized> PluginSource<D> for BuiltinSource<D> {
    fn describe(&self) -> String {
        "builtin".to_string()
    }

    fn enumerate(&self, simd: SimdMask) -> Vec<Arc<D>> {
        let found: Vec<Arc<D>> = self.factories.iter().filter_map(|f| f(simd)).collect();
        debug!(
            available = found.len(),
            declined = self.factories.len() - found.len(),
            "Enumerated built-in plugins"
        );
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factories_see_simd_mask() {
        let source: BuiltinSource<str> = BuiltinSource::new()
            .with(|_| Some(Arc::from("scalar")))
            .with(|simd| simd.contains(SimdMask::AVX2).then(|| Arc::from("avx2")));

        let plain = source.enumerate(SimdMask::SSE2);
        assert_eq!(plain.len(), 1);
        assert_eq!(&*plain[0], "scalar");

        let wide = source.enumerate(SimdMask::SSE2 | SimdMask::AVX2);
        assert_eq!(wide.len(), 2);
        assert_eq!(&*wide[1], "avx2");
    }
}
