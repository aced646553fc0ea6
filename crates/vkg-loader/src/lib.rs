//! Vulkan loader, dispatch table and handle-lifetime layer.
//!
//! This crate provides:
//! - Dynamic loading of the platform Vulkan library
//! - A dispatch table resolved in global, instance and device phases
//! - Instance and device lifecycle with ordered, idempotent teardown
//! - Move-only owners for device child handles
//! - Result code names and rich errors alongside the bare-code convention
//!
//! Every fallible operation comes in two forms: `foo_raw` returns the bare
//! [`vk::Result`] on failure, `foo` returns an [`Error`] carrying a
//! formatted message.
//!
//! ```no_run
//! use vkg_loader::{ApplicationConfig, DeviceConfig, InstanceConfig, Vkg};
//!
//! # fn main() -> vkg_loader::Result<()> {
//! let mut vkg = Vkg::new();
//! unsafe { vkg.load(None)? };
//! vkg.init_instance_from(&InstanceConfig::new(ApplicationConfig::new("demo")))?;
//! let physical_device = vkg.enumerate_physical_devices()?[0];
//! unsafe { vkg.init_device_from(physical_device, &DeviceConfig::new().with_queue(0, 1))? };
//! let fence = vkg.create_fence(false)?;
//! # Ok(())
//! # }
//! ```

pub mod capabilities;
pub mod config;
pub mod context;
pub mod enumerate;
pub mod error;
pub mod global;
pub mod handle;
pub mod library;
pub mod result;
pub mod sync;
pub mod table;

#[cfg(test)]
mod testing;

pub use ash::vk;
pub use capabilities::{DeviceInfo, GpuVendor};
pub use config::{ApplicationConfig, DeviceConfig, InstanceConfig, QueueConfig, VALIDATION_LAYER};
pub use context::{ApiVersionReport, LifecycleState, Vkg};
pub use error::{raise, Error, Result, ResultExt};
pub use handle::{DeviceChild, Unique};
pub use library::{LoadingError, VulkanLibrary};
pub use result::{
    check_non_negative, check_success, classify, result_to_str, version_to_string, ErrorKind,
    FailureClass, Status, VkResult,
};
pub use sync::{timeout_ns, WAIT_FOREVER};
pub use table::{EntryPoint, FunctionTable, Phase, Requirement};
