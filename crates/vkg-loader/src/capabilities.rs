//! Physical device identification and summaries.

use crate::context::{ApiVersionReport, Vkg};
use crate::error::Result;
use crate::result::version_to_string;
use ash::vk;
use std::collections::HashSet;

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Arm,
    Qualcomm,
    /// Software rasterizers (lavapipe, SwiftShader).
    Mesa,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            0x13B5 => Self::Arm,
            0x5143 => Self::Qualcomm,
            0x10005 => Self::Mesa,
            other => Self::Other(other),
        }
    }
}

/// What a physical device reports about itself.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub physical_device: vk::PhysicalDevice,
    pub vendor: GpuVendor,
    pub device_name: String,
    pub device_type: vk::PhysicalDeviceType,
    /// API version, as selected by the [`ApiVersionReport`] of the query.
    pub api_version: u32,
    pub driver_version: u32,
    /// Device-local memory in MB
    pub device_local_memory_mb: u64,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    pub extensions: HashSet<String>,
}

impl DeviceInfo {
    /// Query everything about `physical_device`.
    ///
    /// # Safety
    /// `physical_device` must have been enumerated from the active instance
    /// of `vkg`.
    pub unsafe fn query(
        vkg: &Vkg,
        physical_device: vk::PhysicalDevice,
        report: ApiVersionReport,
    ) -> Result<Self> {
        let (properties, memory_properties, queue_families, extensions) = unsafe {
            (
                vkg.get_physical_device_properties(physical_device, report)?,
                vkg.get_physical_device_memory_properties(physical_device)?,
                vkg.get_physical_device_queue_family_properties(physical_device)?,
                vkg.enumerate_device_extension_properties(physical_device)?,
            )
        };

        let extensions = extensions
            .iter()
            .filter_map(|ext| ext.extension_name_as_c_str().ok())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();

        let device_name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let device_local_memory_mb = memory_properties
            .memory_heaps
            .iter()
            .take(memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size / (1024 * 1024))
            .sum();

        Ok(Self {
            physical_device,
            vendor: GpuVendor::from_vendor_id(properties.vendor_id),
            device_name,
            device_type: properties.device_type,
            api_version: properties.api_version,
            driver_version: properties.driver_version,
            device_local_memory_mb,
            queue_families,
            extensions,
        })
    }

    /// Returns true if the device exposes `extension`.
    pub fn supports_extension(&self, extension: &str) -> bool {
        self.extensions.contains(extension)
    }

    /// Index of the first queue family with all of `flags`.
    pub fn find_queue_family(&self, flags: vk::QueueFlags) -> Option<u32> {
        self.queue_families
            .iter()
            .position(|family| family.queue_count > 0 && family.queue_flags.contains(flags))
            .map(|index| index as u32)
    }

    /// Index of a family with `flags` and none of `excluded`, falling back
    /// to any family with `flags`.
    pub fn find_dedicated_queue_family(
        &self,
        flags: vk::QueueFlags,
        excluded: vk::QueueFlags,
    ) -> Option<u32> {
        self.queue_families
            .iter()
            .position(|family| {
                family.queue_count > 0
                    && family.queue_flags.contains(flags)
                    && !family.queue_flags.intersects(excluded)
            })
            .map(|index| index as u32)
            .or_else(|| self.find_queue_family(flags))
    }

    /// Get a human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{} ({:?}, {:?}) - Vulkan {} - {} MB VRAM",
            self.device_name,
            self.vendor,
            self.device_type,
            version_to_string(self.api_version),
            self.device_local_memory_mb,
        )
    }
}
