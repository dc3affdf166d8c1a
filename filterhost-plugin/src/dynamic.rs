//! Runtime discovery of shared-library plugins.

use std::ffi::{c_char, CStr};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filterhost_core::SimdMask;
use tracing::{debug, info, warn};

use crate::api::Plugin;
use crate::error::{PluginError, Result};
use crate::loader::PluginLoader;
use crate::source::PluginSource;

/// An open shared library.
///
/// Descriptors resolved from a library keep it alive through an `Arc`, so
/// the library is closed only after every descriptor, and every stage
/// created from one, has been dropped.
pub struct NativeLibrary {
    path: PathBuf,
    library: libloading::Library,
}

impl NativeLibrary {
    /// Open the shared library at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        // SAFETY: loading runs the library's initialisers. Plugin directories
        // are trusted to contain filter plugins only.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| PluginError::LoadFailed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), "Opened plugin library");
        Ok(Self {
            path: path.to_path_buf(),
            library,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Resolve an exported symbol as a value of type `T`.
    ///
    /// # Safety
    ///
    /// `T` must match the exported item's real type, and the returned value
    /// must not be used after this library is dropped.
    pub unsafe fn symbol<T: Copy>(&self, name: &str) -> Result<T> {
        let symbol: libloading::Symbol<'_, T> =
            self.library
                .get(name.as_bytes())
                .map_err(|_| PluginError::SymbolMissing {
                    path: self.path.display().to_string(),
                    symbol: name.to_string(),
                })?;
        Ok(*symbol)
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        debug!(path = %self.path.display(), "Unloading plugin library");
    }
}

/// Read a NUL-terminated string field of a plugin's descriptor table.
///
/// # Safety
///
/// `text` must be null or point to a NUL-terminated string.
pub unsafe fn descriptor_string(path: &str, field: &str, text: *const c_char) -> Result<String> {
    if text.is_null() {
        return Err(PluginError::InvalidDescriptor {
            path: path.into(),
            message: format!("{field} is null"),
        });
    }
    CStr::from_ptr(text)
        .to_str()
        .map(str::to_string)
        .map_err(|_| PluginError::InvalidDescriptor {
            path: path.into(),
            message: format!("{field} is not valid UTF-8"),
        })
}

/// Binary interface between an engine and its native plugins.
pub trait NativeAbi {
    /// Descriptor type produced for the engine.
    type Descriptor: ?Sized + Plugin;

    /// Entry point every plugin library exports.
    const ENTRY_SYMBOL: &'static str;

    /// Interface version the engine was compiled against.
    const API_VERSION: u32;

    /// Call the library's entry point and wrap the descriptor it returns.
    ///
    /// # Safety
    ///
    /// The library must export [`Self::ENTRY_SYMBOL`] with this ABI's
    /// signature.
    unsafe fn resolve(library: &Arc<NativeLibrary>, simd: SimdMask) -> Result<Arc<Self::Descriptor>>;
}

/// Plugins discovered by scanning a directory for shared libraries.
pub struct DynamicSource<A> {
    loader: PluginLoader,
    _abi: PhantomData<fn() -> A>,
}

impl<A: NativeAbi> DynamicSource<A> {
    /// Scan `dir` for libraries with the platform extension.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_loader({
            let mut loader = PluginLoader::new();
            loader.add_search_path(dir);
            loader
        })
    }

    pub fn with_loader(loader: PluginLoader) -> Self {
        Self {
            loader,
            _abi: PhantomData,
        }
    }

    /// Load and validate one candidate. The library is closed on rejection.
    fn load_candidate(path: &Path, simd: SimdMask) -> Result<Arc<A::Descriptor>> {
        let library = Arc::new(NativeLibrary::open(path)?);
        // SAFETY: libraries in the plugin directory implement this ABI.
        let descriptor = unsafe { A::resolve(&library, simd)? };
        let api_version = descriptor.info().api_version;
        if api_version != A::API_VERSION {
            return Err(PluginError::ApiVersionMismatch {
                plugin: api_version,
                expected: A::API_VERSION,
            });
        }
        Ok(descriptor)
    }
}

impl<A: NativeAbi> PluginSource<A::Descriptor> for DynamicSource<A> {
    fn describe(&self) -> String {
        format!("dynamic (*.{})", self.loader.extension())
    }

    fn enumerate(&self, simd: SimdMask) -> Vec<Arc<A::Descriptor>> {
        let mut found = Vec::new();
        for path in self.loader.discover() {
            match Self::load_candidate(&path, simd) {
                Ok(descriptor) => {
                    info!(path = %path.display(), ident = %descriptor.ident(), "Loaded plugin library");
                    found.push(descriptor);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping plugin candidate");
                }
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PluginInfo;
    use std::fs;

    struct NullDescriptor(PluginInfo);

    impl Plugin for NullDescriptor {
        fn info(&self) -> &PluginInfo {
            &self.0
        }
    }

    struct NullAbi;

    impl NativeAbi for NullAbi {
        type Descriptor = NullDescriptor;
        const ENTRY_SYMBOL: &'static str = "filterhost_null_entry";
        const API_VERSION: u32 = 1;

        unsafe fn resolve(library: &Arc<NativeLibrary>, _simd: SimdMask) -> Result<Arc<NullDescriptor>> {
            library.symbol::<usize>(Self::ENTRY_SYMBOL)?;
            Err(PluginError::FactoryRejected {
                path: library.path().display().to_string(),
            })
        }
    }

    #[test]
    fn test_descriptor_string() {
        let text = std::ffi::CString::new("boxblur").unwrap();
        let value = unsafe { descriptor_string("lib.so", "short_ident", text.as_ptr()) };
        assert_eq!(value.unwrap(), "boxblur");

        let missing = unsafe { descriptor_string("lib.so", "ident", std::ptr::null()) };
        assert!(matches!(missing, Err(PluginError::InvalidDescriptor { .. })));
    }

    #[test]
    fn test_open_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.so");
        fs::write(&path, b"definitely not an ELF").unwrap();
        assert!(matches!(
            NativeLibrary::open(&path),
            Err(PluginError::LoadFailed { .. })
        ));
    }

    #[test]
    fn test_rejected_candidates_do_not_abort_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let ext = crate::loader::platform_extension();
        for name in ["a", "b", "c"] {
            fs::write(dir.path().join(format!("{name}.{ext}")), b"junk").unwrap();
        }

        let source: DynamicSource<NullAbi> = DynamicSource::new(dir.path());
        assert!(source.enumerate(SimdMask::empty()).is_empty());
        assert!(source.describe().starts_with("dynamic"));
    }
}
