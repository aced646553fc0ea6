//! Dynamic loading of the platform Vulkan loader library.

use ash::vk;
use std::ffi::{CStr, OsStr, OsString};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Environment variable overriding the default library search list.
pub const LIBRARY_ENV: &str = "VKG_VULKAN_LIBRARY";

/// Libraries tried, in order, when no path is given.
#[cfg(windows)]
pub const DEFAULT_LIBRARIES: &[&str] = &["vulkan-1.dll"];
#[cfg(all(
    unix,
    not(any(target_os = "macos", target_os = "ios", target_os = "android"))
))]
pub const DEFAULT_LIBRARIES: &[&str] = &["libvulkan.so.1", "libvulkan.so"];
#[cfg(target_os = "android")]
pub const DEFAULT_LIBRARIES: &[&str] = &["libvulkan.so"];
#[cfg(any(target_os = "macos", target_os = "ios"))]
pub const DEFAULT_LIBRARIES: &[&str] = &[
    "libvulkan.dylib",
    "libvulkan.1.dylib",
    "libMoltenVK.dylib",
];

const BOOTSTRAP_SYMBOL: &[u8] = b"vkGetInstanceProcAddr\0";

/// Failure to bind the Vulkan loader.
#[derive(Error, Debug)]
pub enum LoadingError {
    /// The shared object could not be opened.
    #[error("Cannot open Vulkan library {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: libloading::Error,
    },

    /// None of the default libraries could be opened.
    #[error("No Vulkan library found (tried {tried})")]
    NotFound {
        tried: String,
        #[source]
        source: Option<libloading::Error>,
    },

    /// The library does not export `vkGetInstanceProcAddr`.
    #[error("Vulkan library {path} does not export vkGetInstanceProcAddr: {source}")]
    MissingEntryPoint {
        path: String,
        #[source]
        source: libloading::Error,
    },
}

/// A bound Vulkan loader: the mapped library plus its bootstrap entry point.
pub struct VulkanLibrary {
    // Keeps the shared object mapped for as long as resolved pointers live.
    library: Option<libloading::Library>,
    get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    origin: String,
}

impl VulkanLibrary {
    /// Opens the Vulkan loader.
    ///
    /// With `None`, tries [`LIBRARY_ENV`] if set, otherwise each of
    /// [`DEFAULT_LIBRARIES`] in order.
    ///
    /// # Safety
    /// Opening a native library runs its initialisers. The safety
    /// requirements of [`libloading::Library::new`] apply.
    pub unsafe fn open(path: Option<&Path>) -> Result<Self, LoadingError> {
        if let Some(path) = path {
            return unsafe { Self::open_path(path.as_os_str()) };
        }

        if let Some(path) = std::env::var_os(LIBRARY_ENV) {
            tracing::debug!("{} set, loading {:?}", LIBRARY_ENV, path);
            return unsafe { Self::open_path(&path) };
        }

        let mut last_error = None;
        for name in DEFAULT_LIBRARIES {
            match unsafe { Self::open_path(OsStr::new(name)) } {
                Ok(library) => return Ok(library),
                Err(LoadingError::Open { source, .. }) => {
                    tracing::debug!("{} not available: {}", name, source);
                    last_error = Some(source);
                }
                Err(other) => return Err(other),
            }
        }

        Err(LoadingError::NotFound {
            tried: DEFAULT_LIBRARIES.join(", "),
            source: last_error,
        })
    }

    unsafe fn open_path(path: &OsStr) -> Result<Self, LoadingError> {
        let origin = path.to_string_lossy().into_owned();

        let library =
            unsafe { libloading::Library::new(path) }.map_err(|source| LoadingError::Open {
                path: origin.clone(),
                source,
            })?;

        let get_instance_proc_addr = *unsafe {
            library.get::<vk::PFN_vkGetInstanceProcAddr>(BOOTSTRAP_SYMBOL)
        }
        .map_err(|source| LoadingError::MissingEntryPoint {
            path: origin.clone(),
            source,
        })?;

        tracing::info!("Loaded Vulkan library {}", origin);

        Ok(Self {
            library: Some(library),
            get_instance_proc_addr,
            origin,
        })
    }

    /// Binds an already resolved `vkGetInstanceProcAddr`.
    ///
    /// Used when the loader is linked statically or supplied by a host
    /// (a windowing library, a test driver).
    pub fn from_entry(get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr) -> Self {
        Self {
            library: None,
            get_instance_proc_addr,
            origin: "<entry point>".to_string(),
        }
    }

    /// The bootstrap resolver.
    pub fn get_instance_proc_addr(&self) -> vk::PFN_vkGetInstanceProcAddr {
        self.get_instance_proc_addr
    }

    /// Where this library came from: a file name, or `<entry point>`.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Returns true when this binding owns a mapped shared object.
    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }

    /// Resolves `name` through `vkGetInstanceProcAddr`.
    ///
    /// # Safety
    /// `instance` must be null or a live instance created through this
    /// library.
    pub unsafe fn resolve(&self, instance: vk::Instance, name: &CStr) -> vk::PFN_vkVoidFunction {
        unsafe { (self.get_instance_proc_addr)(instance, name.as_ptr()) }
    }
}

impl fmt::Debug for VulkanLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VulkanLibrary")
            .field("origin", &self.origin)
            .field("dynamic", &self.is_dynamic())
            .finish()
    }
}

/// Platform file name for a library stem, e.g. `vulkan` -> `libvulkan.so`.
pub fn platform_library_name(stem: &str) -> OsString {
    libloading::library_filename(stem)
}
