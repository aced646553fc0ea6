//! Loader context: library, instance and device lifecycle.

use crate::enumerate::{enumerate, enumerate_void};
use crate::error::{Error, Result, ResultExt};
use crate::handle::{DeviceChild, Unique};
use crate::library::VulkanLibrary;
use crate::result::{check_success, ErrorKind, VkResult};
use crate::table::FunctionTable;
use ash::vk;
use ash::vk::Handle;
use std::ffi::CStr;
use std::path::Path;
use std::ptr;

/// How far the context has been brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    Unloaded,
    LibraryLoaded,
    InstanceActive,
    DeviceActive,
}

/// Which `apiVersion` physical device property queries report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ApiVersionReport {
    /// The version the driver reports, untouched.
    #[default]
    Driver,
    /// Clamped to 1.0 when the instance had to be created with 1.0.
    Effective,
}

/// Returns `VK_ERROR_INITIALIZATION_FAILED` for a slot that is not loaded.
///
/// Slots are only populated once the object they depend on exists, so an
/// empty slot means the call was made in the wrong lifecycle state.
pub(crate) fn require<F>(slot: Option<F>, name: &str) -> VkResult<F> {
    slot.ok_or_else(|| {
        tracing::warn!("{} called before its entry point was loaded", name);
        vk::Result::ERROR_INITIALIZATION_FAILED
    })
}

fn above_1_0(version: u32) -> bool {
    (vk::api_version_major(version), vk::api_version_minor(version)) > (1, 0)
}

/// Owns the Vulkan loader library, one instance and one device, together
/// with the dispatch table resolved against them.
///
/// Teardown always runs in reverse: device, instance, library. Every
/// teardown method is idempotent and can be called in any state.
pub struct Vkg {
    library: Option<VulkanLibrary>,
    table: FunctionTable,
    instance: vk::Instance,
    physical_device: vk::PhysicalDevice,
    device: vk::Device,
    version_downgraded: bool,
}

impl Vkg {
    /// An unloaded context.
    pub const fn new() -> Self {
        Self {
            library: None,
            table: FunctionTable::new(),
            instance: vk::Instance::null(),
            physical_device: vk::PhysicalDevice::null(),
            device: vk::Device::null(),
            version_downgraded: false,
        }
    }

    pub fn state(&self) -> LifecycleState {
        if !self.device.is_null() {
            LifecycleState::DeviceActive
        } else if !self.instance.is_null() {
            LifecycleState::InstanceActive
        } else if self.library.is_some() {
            LifecycleState::LibraryLoaded
        } else {
            LifecycleState::Unloaded
        }
    }

    pub fn library(&self) -> Option<&VulkanLibrary> {
        self.library.as_ref()
    }

    /// The dispatch table. Slots are empty until their phase has run.
    pub fn table(&self) -> &FunctionTable {
        &self.table
    }

    /// The active instance, or null.
    pub fn instance(&self) -> vk::Instance {
        self.instance
    }

    /// The physical device the active device was created from, or null.
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// The active device, or null.
    pub fn device(&self) -> vk::Device {
        self.device
    }

    /// Returns true if the active instance was created with its requested
    /// API version lowered to 1.0.
    pub fn version_downgraded(&self) -> bool {
        self.version_downgraded
    }

    // Library

    /// Loads the Vulkan library and resolves the global entry points.
    ///
    /// With `None`, the `VKG_VULKAN_LIBRARY` environment variable and then
    /// the platform default names are tried. Fails with
    /// `VK_ERROR_UNKNOWN` if a library is already loaded, leaving it in
    /// place.
    ///
    /// # Safety
    /// Loading a native library runs its initialisers.
    pub unsafe fn load(&mut self, path: Option<&Path>) -> Result<()> {
        if self.library.is_some() {
            tracing::warn!("Vulkan library already loaded");
            return Err(Error::custom(
                ErrorKind::Unknown,
                "load() called while a Vulkan library is already loaded",
            ));
        }
        let library = unsafe { VulkanLibrary::open(path) }
            .map_err(|e| Error::custom(ErrorKind::InitializationFailed, e.to_string()))?;
        self.bind(library).or_raise("vkGetInstanceProcAddr")
    }

    /// [`load`](Self::load) with the bare result code.
    ///
    /// # Safety
    /// See [`load`](Self::load).
    pub unsafe fn load_raw(&mut self, path: Option<&Path>) -> VkResult<()> {
        if self.library.is_some() {
            tracing::warn!("Vulkan library already loaded");
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        let library = unsafe { VulkanLibrary::open(path) }.map_err(|e| {
            tracing::warn!("{}", e);
            vk::Result::ERROR_INITIALIZATION_FAILED
        })?;
        self.bind(library)
    }

    /// Binds an already resolved `vkGetInstanceProcAddr` instead of opening
    /// a library.
    ///
    /// # Safety
    /// `get_instance_proc_addr` must behave like the native entry point.
    pub unsafe fn load_from_entry(
        &mut self,
        get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    ) -> Result<()> {
        unsafe { self.load_from_entry_raw(get_instance_proc_addr) }
            .or_raise("vkGetInstanceProcAddr")
    }

    /// [`load_from_entry`](Self::load_from_entry) with the bare result code.
    ///
    /// # Safety
    /// See [`load_from_entry`](Self::load_from_entry).
    pub unsafe fn load_from_entry_raw(
        &mut self,
        get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    ) -> VkResult<()> {
        if self.library.is_some() {
            tracing::warn!("Vulkan library already loaded");
            return Err(vk::Result::ERROR_UNKNOWN);
        }
        self.bind(VulkanLibrary::from_entry(get_instance_proc_addr))
    }

    fn bind(&mut self, library: VulkanLibrary) -> VkResult<()> {
        let mut table = FunctionTable::new();
        table
            .load_global(library.get_instance_proc_addr())
            .map_err(|missing| {
                tracing::error!("{} is missing {}", library.origin(), missing);
                vk::Result::ERROR_INITIALIZATION_FAILED
            })?;

        tracing::debug!("Global entry points resolved from {}", library.origin());
        self.table = table;
        self.library = Some(library);
        Ok(())
    }

    /// Destroys the device and instance, then releases the library.
    pub fn unload_library(&mut self) {
        self.destroy_instance();
        if let Some(library) = self.library.take() {
            tracing::debug!("Unloading Vulkan library {}", library.origin());
        }
        self.table.clear();
    }

    // Instance

    /// Creates the instance and resolves the instance-level entry points.
    ///
    /// Any active instance (and its device) is destroyed first.
    ///
    /// # Safety
    /// Every pointer reachable from `create_info` must be valid.
    pub unsafe fn init_instance(&mut self, create_info: &vk::InstanceCreateInfo<'_>) -> Result<()> {
        unsafe { self.init_instance_raw(create_info) }.or_raise("vkCreateInstance")
    }

    /// [`init_instance`](Self::init_instance) with the bare result code.
    ///
    /// # Safety
    /// See [`init_instance`](Self::init_instance).
    pub unsafe fn init_instance_raw(
        &mut self,
        create_info: &vk::InstanceCreateInfo<'_>,
    ) -> VkResult<()> {
        if self.library.is_none() {
            tracing::warn!("init_instance() called before the Vulkan library was loaded");
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        self.destroy_instance();

        let create_instance = require(self.table.create_instance, "vkCreateInstance")?;
        let mut instance = vk::Instance::null();
        check_success(unsafe { create_instance(create_info, ptr::null(), &mut instance) })?;
        self.instance = instance;

        if let Err(missing) = unsafe { self.table.load_instance(instance) } {
            tracing::error!("Instance is missing required entry point {}", missing);
            self.destroy_instance();
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }

        tracing::info!("Vulkan instance created");
        Ok(())
    }

    /// Like [`init_instance`](Self::init_instance), but retries once with
    /// the API version lowered to 1.0 when the driver rejects the requested
    /// version with `VK_ERROR_INCOMPATIBLE_DRIVER`.
    ///
    /// Returns true if the retry was needed.
    ///
    /// # Safety
    /// See [`init_instance`](Self::init_instance).
    pub unsafe fn init_instance_with_fallback(
        &mut self,
        create_info: &vk::InstanceCreateInfo<'_>,
    ) -> Result<bool> {
        unsafe { self.init_instance_with_fallback_raw(create_info) }.or_raise("vkCreateInstance")
    }

    /// [`init_instance_with_fallback`](Self::init_instance_with_fallback)
    /// with the bare result code.
    ///
    /// # Safety
    /// See [`init_instance`](Self::init_instance).
    pub unsafe fn init_instance_with_fallback_raw(
        &mut self,
        create_info: &vk::InstanceCreateInfo<'_>,
    ) -> VkResult<bool> {
        let result = unsafe { self.init_instance_raw(create_info) };
        let application = match (result, unsafe { create_info.p_application_info.as_ref() }) {
            (Err(vk::Result::ERROR_INCOMPATIBLE_DRIVER), Some(application))
                if above_1_0(application.api_version) =>
            {
                application
            }
            (result, _) => return result.map(|()| false),
        };

        tracing::warn!(
            "Driver rejected Vulkan {}.{}, retrying with 1.0",
            vk::api_version_major(application.api_version),
            vk::api_version_minor(application.api_version)
        );

        let mut downgraded = *application;
        downgraded.api_version = vk::API_VERSION_1_0;
        let mut retry = *create_info;
        retry.p_application_info = &downgraded;

        unsafe { self.init_instance_raw(&retry) }?;
        self.version_downgraded = true;
        Ok(true)
    }

    /// Destroys the device, then the instance. Does nothing without an
    /// instance.
    pub fn destroy_instance(&mut self) {
        self.destroy_device();
        if self.instance.is_null() {
            return;
        }

        if let Some(destroy_instance) = self.table.destroy_instance {
            unsafe { destroy_instance(self.instance, ptr::null()) };
            tracing::debug!("Vulkan instance destroyed");
        }
        self.instance = vk::Instance::null();
        self.version_downgraded = false;
        self.table.clear_instance();
    }

    // Device

    /// Creates the device and resolves the device-level entry points.
    ///
    /// Any active device is destroyed first.
    ///
    /// # Safety
    /// `physical_device` must have been enumerated from the active instance
    /// and every pointer reachable from `create_info` must be valid.
    pub unsafe fn init_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        create_info: &vk::DeviceCreateInfo<'_>,
    ) -> Result<()> {
        unsafe { self.init_device_raw(physical_device, create_info) }.or_raise("vkCreateDevice")
    }

    /// [`init_device`](Self::init_device) with the bare result code.
    ///
    /// # Safety
    /// See [`init_device`](Self::init_device).
    pub unsafe fn init_device_raw(
        &mut self,
        physical_device: vk::PhysicalDevice,
        create_info: &vk::DeviceCreateInfo<'_>,
    ) -> VkResult<()> {
        if self.instance.is_null() {
            tracing::warn!("init_device() called without an instance");
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        if physical_device.is_null() {
            tracing::warn!("init_device() called with a null physical device");
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        self.destroy_device();

        let create_device = require(self.table.create_device, "vkCreateDevice")?;
        let mut device = vk::Device::null();
        check_success(unsafe {
            create_device(physical_device, create_info, ptr::null(), &mut device)
        })?;
        self.device = device;
        self.physical_device = physical_device;

        if let Err(missing) = unsafe { self.table.load_device(device) } {
            tracing::error!("Device is missing required entry point {}", missing);
            self.destroy_device();
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }

        tracing::info!("Vulkan device created");
        Ok(())
    }

    /// Waits for the device to go idle and destroys it. Does nothing without
    /// a device.
    pub fn destroy_device(&mut self) {
        if self.device.is_null() {
            return;
        }

        unsafe {
            if let Some(device_wait_idle) = self.table.device_wait_idle {
                let _ = device_wait_idle(self.device);
            }
            if let Some(destroy_device) = self.table.destroy_device {
                destroy_device(self.device, ptr::null());
                tracing::debug!("Vulkan device destroyed");
            }
        }
        self.device = vk::Device::null();
        self.physical_device = vk::PhysicalDevice::null();
        self.table.clear_device();
    }

    /// Tears everything down: device, instance, library.
    pub fn clean_up(&mut self) {
        self.unload_library();
    }

    // Global queries

    /// Highest instance-level API version supported by the loader.
    ///
    /// Reports 1.0 for runtimes without `vkEnumerateInstanceVersion`.
    pub fn enumerate_instance_version(&self) -> Result<u32> {
        self.enumerate_instance_version_raw()
            .or_raise("vkEnumerateInstanceVersion")
    }

    pub fn enumerate_instance_version_raw(&self) -> VkResult<u32> {
        let enumerate_instance_version = require(
            self.table.enumerate_instance_version,
            "vkEnumerateInstanceVersion",
        )?;
        let mut version = 0;
        check_success(unsafe { enumerate_instance_version(&mut version) })?;
        Ok(version)
    }

    /// Instance extensions, optionally restricted to those of `layer`.
    pub fn enumerate_instance_extension_properties(
        &self,
        layer: Option<&CStr>,
    ) -> Result<Vec<vk::ExtensionProperties>> {
        self.enumerate_instance_extension_properties_raw(layer)
            .or_raise("vkEnumerateInstanceExtensionProperties")
    }

    pub fn enumerate_instance_extension_properties_raw(
        &self,
        layer: Option<&CStr>,
    ) -> VkResult<Vec<vk::ExtensionProperties>> {
        let enumerate_extensions = require(
            self.table.enumerate_instance_extension_properties,
            "vkEnumerateInstanceExtensionProperties",
        )?;
        let layer = layer.map_or(ptr::null(), CStr::as_ptr);
        unsafe { enumerate(|count, data| enumerate_extensions(layer, count, data)) }
    }

    pub fn enumerate_instance_layer_properties(&self) -> Result<Vec<vk::LayerProperties>> {
        self.enumerate_instance_layer_properties_raw()
            .or_raise("vkEnumerateInstanceLayerProperties")
    }

    pub fn enumerate_instance_layer_properties_raw(&self) -> VkResult<Vec<vk::LayerProperties>> {
        let enumerate_layers = require(
            self.table.enumerate_instance_layer_properties,
            "vkEnumerateInstanceLayerProperties",
        )?;
        unsafe { enumerate(|count, data| enumerate_layers(count, data)) }
    }

    // Instance queries

    pub fn enumerate_physical_devices(&self) -> Result<Vec<vk::PhysicalDevice>> {
        self.enumerate_physical_devices_raw()
            .or_raise("vkEnumeratePhysicalDevices")
    }

    pub fn enumerate_physical_devices_raw(&self) -> VkResult<Vec<vk::PhysicalDevice>> {
        let enumerate_physical_devices = require(
            self.table.enumerate_physical_devices,
            "vkEnumeratePhysicalDevices",
        )?;
        let instance = self.instance;
        unsafe { enumerate(|count, data| enumerate_physical_devices(instance, count, data)) }
    }

    /// Properties of `physical_device`, with `apiVersion` reported as
    /// selected by `report`.
    ///
    /// # Safety
    /// `physical_device` must have been enumerated from the active instance.
    pub unsafe fn get_physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
        report: ApiVersionReport,
    ) -> Result<vk::PhysicalDeviceProperties> {
        unsafe { self.get_physical_device_properties_raw(physical_device, report) }
            .or_raise("vkGetPhysicalDeviceProperties")
    }

    /// # Safety
    /// `physical_device` must have been enumerated from the active instance.
    pub unsafe fn get_physical_device_properties_raw(
        &self,
        physical_device: vk::PhysicalDevice,
        report: ApiVersionReport,
    ) -> VkResult<vk::PhysicalDeviceProperties> {
        let get_properties = require(
            self.table.get_physical_device_properties,
            "vkGetPhysicalDeviceProperties",
        )?;
        let mut properties = vk::PhysicalDeviceProperties::default();
        unsafe { get_properties(physical_device, &mut properties) };

        if report == ApiVersionReport::Effective && self.version_downgraded {
            properties.api_version = properties.api_version.min(vk::API_VERSION_1_0);
        }
        Ok(properties)
    }

    /// # Safety
    /// `physical_device` must have been enumerated from the active instance.
    pub unsafe fn get_physical_device_features(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::PhysicalDeviceFeatures> {
        unsafe { self.get_physical_device_features_raw(physical_device) }
            .or_raise("vkGetPhysicalDeviceFeatures")
    }

    /// # Safety
    /// `physical_device` must have been enumerated from the active instance.
    pub unsafe fn get_physical_device_features_raw(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceFeatures> {
        let get_features = require(
            self.table.get_physical_device_features,
            "vkGetPhysicalDeviceFeatures",
        )?;
        let mut features = vk::PhysicalDeviceFeatures::default();
        unsafe { get_features(physical_device, &mut features) };
        Ok(features)
    }

    /// # Safety
    /// `physical_device` must have been enumerated from the active instance.
    pub unsafe fn get_physical_device_memory_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<vk::PhysicalDeviceMemoryProperties> {
        unsafe { self.get_physical_device_memory_properties_raw(physical_device) }
            .or_raise("vkGetPhysicalDeviceMemoryProperties")
    }

    /// # Safety
    /// `physical_device` must have been enumerated from the active instance.
    pub unsafe fn get_physical_device_memory_properties_raw(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<vk::PhysicalDeviceMemoryProperties> {
        let get_memory_properties = require(
            self.table.get_physical_device_memory_properties,
            "vkGetPhysicalDeviceMemoryProperties",
        )?;
        let mut properties = vk::PhysicalDeviceMemoryProperties::default();
        unsafe { get_memory_properties(physical_device, &mut properties) };
        Ok(properties)
    }

    /// # Safety
    /// `physical_device` must have been enumerated from the active instance.
    pub unsafe fn get_physical_device_queue_family_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::QueueFamilyProperties>> {
        unsafe { self.get_physical_device_queue_family_properties_raw(physical_device) }
            .or_raise("vkGetPhysicalDeviceQueueFamilyProperties")
    }

    /// # Safety
    /// `physical_device` must have been enumerated from the active instance.
    pub unsafe fn get_physical_device_queue_family_properties_raw(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::QueueFamilyProperties>> {
        let get_queue_families = require(
            self.table.get_physical_device_queue_family_properties,
            "vkGetPhysicalDeviceQueueFamilyProperties",
        )?;
        unsafe { enumerate_void(|count, data| get_queue_families(physical_device, count, data)) }
    }

    /// # Safety
    /// `physical_device` must have been enumerated from the active instance.
    pub unsafe fn enumerate_device_extension_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Vec<vk::ExtensionProperties>> {
        unsafe { self.enumerate_device_extension_properties_raw(physical_device) }
            .or_raise("vkEnumerateDeviceExtensionProperties")
    }

    /// # Safety
    /// `physical_device` must have been enumerated from the active instance.
    pub unsafe fn enumerate_device_extension_properties_raw(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> VkResult<Vec<vk::ExtensionProperties>> {
        let enumerate_extensions = require(
            self.table.enumerate_device_extension_properties,
            "vkEnumerateDeviceExtensionProperties",
        )?;
        unsafe {
            enumerate(|count, data| {
                enumerate_extensions(physical_device, ptr::null(), count, data)
            })
        }
    }

    // Device queries

    /// Queue `queue_index` of family `queue_family_index` on the active
    /// device.
    ///
    /// # Safety
    /// The queue must have been requested when the device was created.
    pub unsafe fn get_device_queue(&self, queue_family_index: u32, queue_index: u32) -> Result<vk::Queue> {
        unsafe { self.get_device_queue_raw(queue_family_index, queue_index) }
            .or_raise("vkGetDeviceQueue")
    }

    /// # Safety
    /// See [`get_device_queue`](Self::get_device_queue).
    pub unsafe fn get_device_queue_raw(
        &self,
        queue_family_index: u32,
        queue_index: u32,
    ) -> VkResult<vk::Queue> {
        let get_device_queue = require(self.table.get_device_queue, "vkGetDeviceQueue")?;
        let mut queue = vk::Queue::null();
        unsafe { get_device_queue(self.device, queue_family_index, queue_index, &mut queue) };
        Ok(queue)
    }

    /// Wraps `handle` in an owner that destroys it through the active
    /// device.
    ///
    /// # Safety
    /// `handle` must have been created from the active device and must not
    /// be owned elsewhere.
    pub unsafe fn make_unique<T: DeviceChild>(&self, handle: T) -> VkResult<Unique<'_, T>> {
        if self.device.is_null() {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
        }
        let destroy = require(T::destroy_fn(&self.table), T::DESTROY_NAME)?;
        Ok(unsafe { Unique::from_raw_parts(handle, self.device, destroy) })
    }
}

impl Default for Vkg {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Vkg {
    fn drop(&mut self) {
        self.clean_up();
    }
}

impl std::fmt::Debug for Vkg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vkg")
            .field("state", &self.state())
            .field("library", &self.library)
            .field("instance", &self.instance)
            .field("device", &self.device)
            .field("version_downgraded", &self.version_downgraded)
            .finish()
    }
}
