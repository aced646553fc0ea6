//! Owned configuration records for instance and device creation.
//!
//! The records own their strings, so they can be built up, stored and
//! cloned freely. The native create-infos borrow from them and only exist
//! for the duration of a `with_create_info` call.

use crate::context::Vkg;
use crate::error::{Error, Result};
use crate::result::ErrorKind;
use ash::vk;
use std::ffi::{c_char, CStr, CString};

/// Standard validation layer.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Application description passed through `VkApplicationInfo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationConfig {
    pub name: String,
    pub version: u32,
    pub engine_name: String,
    pub engine_version: u32,
    /// Highest API version the application intends to use.
    pub api_version: u32,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "vkg".to_string(),
            version: vk::make_api_version(0, 0, 1, 0),
            engine_name: "vkg".to_string(),
            engine_version: vk::make_api_version(0, 0, 1, 0),
            api_version: vk::API_VERSION_1_3,
        }
    }
}

impl ApplicationConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_engine(mut self, name: impl Into<String>, version: u32) -> Self {
        self.engine_name = name.into();
        self.engine_version = version;
        self
    }

    /// Set the requested API version.
    pub fn with_api_version(mut self, api_version: u32) -> Self {
        self.api_version = api_version;
        self
    }
}

fn to_cstring(value: &str, what: &str) -> Result<CString> {
    CString::new(value).map_err(|_| {
        Error::custom(
            ErrorKind::InitializationFailed,
            format!("{what} {value:?} contains a NUL byte"),
        )
    })
}

fn pointers(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

fn push_unique(names: &mut Vec<CString>, name: &CStr) {
    if !names.iter().any(|existing| existing.as_c_str() == name) {
        names.push(name.to_owned());
    }
}

/// Everything `vkCreateInstance` needs.
#[derive(Debug, Clone, Default)]
pub struct InstanceConfig {
    pub application: ApplicationConfig,
    pub layers: Vec<CString>,
    pub extensions: Vec<CString>,
    pub flags: vk::InstanceCreateFlags,
}

impl InstanceConfig {
    pub fn new(application: ApplicationConfig) -> Self {
        Self {
            application,
            ..Default::default()
        }
    }

    /// Enable a layer. Duplicates are ignored.
    pub fn with_layer(mut self, layer: &CStr) -> Self {
        push_unique(&mut self.layers, layer);
        self
    }

    /// Enable an instance extension. Duplicates are ignored.
    pub fn with_extension(mut self, extension: &CStr) -> Self {
        push_unique(&mut self.extensions, extension);
        self
    }

    /// Enable or disable the standard validation layer.
    pub fn with_validation(mut self, enable: bool) -> Self {
        if enable {
            push_unique(&mut self.layers, VALIDATION_LAYER);
        } else {
            self.layers.retain(|layer| layer.as_c_str() != VALIDATION_LAYER);
        }
        self
    }

    pub fn with_flags(mut self, flags: vk::InstanceCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Builds the native create-info and hands it to `f`.
    ///
    /// Fails if the application or engine name contains a NUL byte.
    pub fn with_create_info<R>(&self, f: impl FnOnce(&vk::InstanceCreateInfo<'_>) -> R) -> Result<R> {
        let application_name = to_cstring(&self.application.name, "application name")?;
        let engine_name = to_cstring(&self.application.engine_name, "engine name")?;

        let application = vk::ApplicationInfo::default()
            .application_name(&application_name)
            .application_version(self.application.version)
            .engine_name(&engine_name)
            .engine_version(self.application.engine_version)
            .api_version(self.application.api_version);

        let layer_names = pointers(&self.layers);
        let extension_names = pointers(&self.extensions);

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&application)
            .enabled_layer_names(&layer_names)
            .enabled_extension_names(&extension_names)
            .flags(self.flags);

        Ok(f(&create_info))
    }
}

/// Queues requested from one queue family.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueConfig {
    pub family_index: u32,
    /// One priority per queue, in `0.0..=1.0`.
    pub priorities: Vec<f32>,
}

impl QueueConfig {
    /// `count` queues of equal priority.
    pub fn new(family_index: u32, count: u32) -> Self {
        Self {
            family_index,
            priorities: vec![1.0; count as usize],
        }
    }

    pub fn with_priorities(family_index: u32, priorities: Vec<f32>) -> Self {
        Self {
            family_index,
            priorities,
        }
    }

    pub fn count(&self) -> u32 {
        self.priorities.len() as u32
    }
}

/// Everything `vkCreateDevice` needs.
#[derive(Debug, Clone, Default)]
pub struct DeviceConfig {
    pub queues: Vec<QueueConfig>,
    pub extensions: Vec<CString>,
    pub features: vk::PhysicalDeviceFeatures,
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request `count` queues from `family_index`.
    pub fn with_queue(mut self, family_index: u32, count: u32) -> Self {
        self.queues.push(QueueConfig::new(family_index, count));
        self
    }

    pub fn with_queue_config(mut self, queue: QueueConfig) -> Self {
        self.queues.push(queue);
        self
    }

    /// Enable a device extension. Duplicates are ignored.
    pub fn with_extension(mut self, extension: &CStr) -> Self {
        push_unique(&mut self.extensions, extension);
        self
    }

    pub fn with_features(mut self, features: vk::PhysicalDeviceFeatures) -> Self {
        self.features = features;
        self
    }

    /// Builds the native create-info and hands it to `f`.
    pub fn with_create_info<R>(&self, f: impl FnOnce(&vk::DeviceCreateInfo<'_>) -> R) -> R {
        let queue_infos: Vec<vk::DeviceQueueCreateInfo<'_>> = self
            .queues
            .iter()
            .map(|queue| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(queue.family_index)
                    .queue_priorities(&queue.priorities)
            })
            .collect();
        let extension_names = pointers(&self.extensions);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&self.features);

        f(&create_info)
    }
}

impl Vkg {
    /// Creates the instance described by `config`.
    pub fn init_instance_from(&mut self, config: &InstanceConfig) -> Result<()> {
        config.with_create_info(|create_info| unsafe { self.init_instance(create_info) })?
    }

    /// Creates the instance described by `config`, retrying with API 1.0 if
    /// the driver rejects the requested version. Returns true if the retry
    /// was needed.
    pub fn init_instance_with_fallback_from(&mut self, config: &InstanceConfig) -> Result<bool> {
        config.with_create_info(|create_info| unsafe {
            self.init_instance_with_fallback(create_info)
        })?
    }

    /// Creates the device described by `config` on `physical_device`.
    ///
    /// # Safety
    /// `physical_device` must have been enumerated from the active instance
    /// and `config` must only name queue families it exposes.
    pub unsafe fn init_device_from(
        &mut self,
        physical_device: vk::PhysicalDevice,
        config: &DeviceConfig,
    ) -> Result<()> {
        config.with_create_info(|create_info| unsafe { self.init_device(physical_device, create_info) })
    }
}
