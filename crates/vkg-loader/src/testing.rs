//! Simulated driver used by the unit tests.
//!
//! Entry points are plain `extern "system"` functions over thread-local
//! state, so every test thread gets its own driver and tests run in
//! parallel. Call [`install`] at the top of a test to reset the state.

#![allow(unsafe_op_in_unsafe_fn, clippy::missing_safety_doc)]

use ash::vk;
use ash::vk::Handle;
use std::cell::RefCell;
use std::collections::HashSet;
use std::ffi::{c_char, CStr};
use std::mem;
use std::time::Duration;

pub const INSTANCE_BASE: u64 = 0x1000;
pub const PHYSICAL_DEVICE_BASE: u64 = 0x2000;
pub const DEVICE_BASE: u64 = 0x3000;
pub const FENCE_BASE: u64 = 0x4000;
pub const QUEUE_BASE: u64 = 0x5000;
pub const SEMAPHORE_BASE: u64 = 0x6000;
pub const COMMAND_POOL_BASE: u64 = 0x7000;

/// Longest a simulated wait actually sleeps.
const MAX_SIMULATED_WAIT: Duration = Duration::from_millis(200);

pub const INSTANCE_EXTENSIONS: &[&CStr] = &[c"VK_KHR_surface", c"VK_EXT_debug_utils"];
pub const INSTANCE_LAYERS: &[&CStr] = &[c"VK_LAYER_KHRONOS_validation"];
pub const DEVICE_EXTENSIONS: &[&CStr] = &[c"VK_KHR_swapchain", c"VK_KHR_timeline_semaphore"];

/// A destroy call observed by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destroyed {
    Instance { instance: u64 },
    Device { device: u64 },
    Fence { device: u64, fence: u64 },
    Semaphore { device: u64, semaphore: u64 },
    CommandPool { device: u64, pool: u64 },
}

struct State {
    hidden: HashSet<String>,
    resolved: Vec<String>,
    max_api_version: u32,
    instance_version: u32,
    device_api_version: u32,
    create_instance_requests: Vec<u32>,
    physical_device_sizes: Vec<u32>,
    physical_device_calls: usize,
    instances_created: u64,
    devices_created: u64,
    fences_created: u64,
    semaphores_created: u64,
    pools_created: u64,
    signaled: HashSet<u64>,
    hang: bool,
    submissions: usize,
    destroyed: Vec<Destroyed>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            hidden: HashSet::new(),
            resolved: Vec::new(),
            max_api_version: vk::API_VERSION_1_3,
            instance_version: vk::API_VERSION_1_3,
            device_api_version: vk::make_api_version(0, 1, 3, 250),
            create_instance_requests: Vec::new(),
            physical_device_sizes: vec![2],
            physical_device_calls: 0,
            instances_created: 0,
            devices_created: 0,
            fences_created: 0,
            semaphores_created: 0,
            pools_created: 0,
            signaled: HashSet::new(),
            hang: false,
            submissions: 0,
            destroyed: Vec::new(),
        }
    }
}

thread_local! {
    static STATE: RefCell<State> = RefCell::new(State::default());
}

fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Handle to the calling thread's simulated driver.
pub struct Driver(());

/// Resets the calling thread's driver and returns a handle to configure and
/// inspect it.
pub fn install() -> Driver {
    with_state(|state| *state = State::default());
    Driver(())
}

impl Driver {
    /// Makes both proc-addr functions return null for `name`.
    pub fn hide(&self, name: &str) {
        with_state(|state| state.hidden.insert(name.to_string()));
    }

    /// Highest `apiVersion` `vkCreateInstance` accepts.
    pub fn set_max_api_version(&self, version: u32) {
        with_state(|state| state.max_api_version = version);
    }

    /// Value reported by `vkEnumerateInstanceVersion`.
    pub fn set_instance_version(&self, version: u32) {
        with_state(|state| state.instance_version = version);
    }

    /// `apiVersion` reported in physical device properties.
    pub fn set_device_api_version(&self, version: u32) {
        with_state(|state| state.device_api_version = version);
    }

    /// Number of physical devices visible at each successive
    /// `vkEnumeratePhysicalDevices` call; the last value repeats.
    pub fn set_physical_device_sizes(&self, sizes: &[u32]) {
        with_state(|state| {
            state.physical_device_sizes = sizes.to_vec();
            state.physical_device_calls = 0;
        });
    }

    /// Submitted fences never signal.
    pub fn set_hang(&self, hang: bool) {
        with_state(|state| state.hang = hang);
    }

    /// `apiVersion` of every `vkCreateInstance` call, in order.
    pub fn create_instance_requests(&self) -> Vec<u32> {
        with_state(|state| state.create_instance_requests.clone())
    }

    pub fn destroyed(&self) -> Vec<Destroyed> {
        with_state(|state| state.destroyed.clone())
    }

    /// Names resolved against a live instance or device, in order.
    pub fn resolved_names(&self) -> Vec<String> {
        with_state(|state| state.resolved.clone())
    }

    pub fn submissions(&self) -> usize {
        with_state(|state| state.submissions)
    }
}

macro_rules! entry {
    ($function:ident as $pfn:ident) => {
        Some(unsafe { mem::transmute::<vk::$pfn, unsafe extern "system" fn()>($function) })
    };
}

unsafe extern "system" fn unimplemented_entry() {}

fn name_of(name: *const c_char) -> String {
    unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
}

/// Two-call list protocol over a fixed slice.
unsafe fn write_list<T: Copy>(items: &[T], count: *mut u32, data: *mut T) -> vk::Result {
    if data.is_null() {
        *count = items.len() as u32;
        return vk::Result::SUCCESS;
    }
    let written = (*count as usize).min(items.len());
    std::ptr::copy_nonoverlapping(items.as_ptr(), data, written);
    *count = written as u32;
    if written < items.len() {
        vk::Result::INCOMPLETE
    } else {
        vk::Result::SUCCESS
    }
}

fn copy_name(target: &mut [c_char], name: &CStr) {
    for (slot, byte) in target.iter_mut().zip(name.to_bytes_with_nul()) {
        *slot = *byte as c_char;
    }
}

pub unsafe extern "system" fn get_instance_proc_addr(
    instance: vk::Instance,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    let name = name_of(p_name);
    if with_state(|state| state.hidden.contains(&name)) {
        return None;
    }

    let global = match name.as_str() {
        "vkGetInstanceProcAddr" => entry!(get_instance_proc_addr as PFN_vkGetInstanceProcAddr),
        "vkCreateInstance" => entry!(create_instance as PFN_vkCreateInstance),
        "vkEnumerateInstanceVersion" => {
            entry!(enumerate_instance_version as PFN_vkEnumerateInstanceVersion)
        }
        "vkEnumerateInstanceExtensionProperties" => entry!(
            enumerate_instance_extension_properties as PFN_vkEnumerateInstanceExtensionProperties
        ),
        "vkEnumerateInstanceLayerProperties" => entry!(
            enumerate_instance_layer_properties as PFN_vkEnumerateInstanceLayerProperties
        ),
        _ => None,
    };
    if global.is_some() || instance.is_null() {
        return global;
    }

    with_state(|state| state.resolved.push(name.clone()));
    match name.as_str() {
        "vkDestroyInstance" => entry!(destroy_instance as PFN_vkDestroyInstance),
        "vkEnumeratePhysicalDevices" => {
            entry!(enumerate_physical_devices as PFN_vkEnumeratePhysicalDevices)
        }
        "vkGetPhysicalDeviceProperties" => {
            entry!(get_physical_device_properties as PFN_vkGetPhysicalDeviceProperties)
        }
        "vkGetPhysicalDeviceFeatures" => {
            entry!(get_physical_device_features as PFN_vkGetPhysicalDeviceFeatures)
        }
        "vkGetPhysicalDeviceMemoryProperties" => entry!(
            get_physical_device_memory_properties as PFN_vkGetPhysicalDeviceMemoryProperties
        ),
        "vkGetPhysicalDeviceQueueFamilyProperties" => entry!(
            get_physical_device_queue_family_properties
                as PFN_vkGetPhysicalDeviceQueueFamilyProperties
        ),
        "vkEnumerateDeviceExtensionProperties" => entry!(
            enumerate_device_extension_properties as PFN_vkEnumerateDeviceExtensionProperties
        ),
        "vkCreateDevice" => entry!(create_device as PFN_vkCreateDevice),
        "vkGetDeviceProcAddr" => entry!(get_device_proc_addr as PFN_vkGetDeviceProcAddr),
        other if other.starts_with("vk") => Some(unimplemented_entry),
        _ => None,
    }
}

pub unsafe extern "system" fn get_device_proc_addr(
    device: vk::Device,
    p_name: *const c_char,
) -> vk::PFN_vkVoidFunction {
    let name = name_of(p_name);
    if device.is_null() || with_state(|state| state.hidden.contains(&name)) {
        return None;
    }

    with_state(|state| state.resolved.push(name.clone()));
    match name.as_str() {
        "vkGetDeviceProcAddr" => entry!(get_device_proc_addr as PFN_vkGetDeviceProcAddr),
        "vkDestroyDevice" => entry!(destroy_device as PFN_vkDestroyDevice),
        "vkGetDeviceQueue" => entry!(get_device_queue as PFN_vkGetDeviceQueue),
        "vkDeviceWaitIdle" => entry!(device_wait_idle as PFN_vkDeviceWaitIdle),
        "vkQueueSubmit" => entry!(queue_submit as PFN_vkQueueSubmit),
        "vkQueueWaitIdle" => entry!(queue_wait_idle as PFN_vkQueueWaitIdle),
        "vkCreateFence" => entry!(create_fence as PFN_vkCreateFence),
        "vkDestroyFence" => entry!(destroy_fence as PFN_vkDestroyFence),
        "vkResetFences" => entry!(reset_fences as PFN_vkResetFences),
        "vkGetFenceStatus" => entry!(get_fence_status as PFN_vkGetFenceStatus),
        "vkWaitForFences" => entry!(wait_for_fences as PFN_vkWaitForFences),
        "vkCreateSemaphore" => entry!(create_semaphore as PFN_vkCreateSemaphore),
        "vkDestroySemaphore" => entry!(destroy_semaphore as PFN_vkDestroySemaphore),
        "vkCreateCommandPool" => entry!(create_command_pool as PFN_vkCreateCommandPool),
        "vkDestroyCommandPool" => entry!(destroy_command_pool as PFN_vkDestroyCommandPool),
        other if other.starts_with("vk") => Some(unimplemented_entry),
        _ => None,
    }
}

unsafe extern "system" fn create_instance(
    p_create_info: *const vk::InstanceCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_instance: *mut vk::Instance,
) -> vk::Result {
    let create_info = &*p_create_info;
    let requested = if create_info.p_application_info.is_null() {
        vk::API_VERSION_1_0
    } else {
        (*create_info.p_application_info).api_version
    };

    with_state(|state| {
        state.create_instance_requests.push(requested);
        let requested_minor = (vk::api_version_major(requested), vk::api_version_minor(requested));
        let max_minor = (
            vk::api_version_major(state.max_api_version),
            vk::api_version_minor(state.max_api_version),
        );
        if requested_minor > max_minor {
            return vk::Result::ERROR_INCOMPATIBLE_DRIVER;
        }
        state.instances_created += 1;
        *p_instance = vk::Instance::from_raw(INSTANCE_BASE + state.instances_created);
        vk::Result::SUCCESS
    })
}

unsafe extern "system" fn destroy_instance(
    instance: vk::Instance,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    with_state(|state| {
        state.destroyed.push(Destroyed::Instance {
            instance: instance.as_raw(),
        });
    });
}

unsafe extern "system" fn enumerate_instance_version(p_api_version: *mut u32) -> vk::Result {
    *p_api_version = with_state(|state| state.instance_version);
    vk::Result::SUCCESS
}

unsafe extern "system" fn enumerate_instance_extension_properties(
    _p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    let items: Vec<vk::ExtensionProperties> = INSTANCE_EXTENSIONS
        .iter()
        .map(|name| {
            let mut properties = vk::ExtensionProperties::default();
            copy_name(&mut properties.extension_name, name);
            properties.spec_version = 1;
            properties
        })
        .collect();
    write_list(&items, p_property_count, p_properties)
}

unsafe extern "system" fn enumerate_instance_layer_properties(
    p_property_count: *mut u32,
    p_properties: *mut vk::LayerProperties,
) -> vk::Result {
    let items: Vec<vk::LayerProperties> = INSTANCE_LAYERS
        .iter()
        .map(|name| {
            let mut properties = vk::LayerProperties::default();
            copy_name(&mut properties.layer_name, name);
            properties.spec_version = vk::API_VERSION_1_3;
            properties.implementation_version = 1;
            properties
        })
        .collect();
    write_list(&items, p_property_count, p_properties)
}

unsafe extern "system" fn enumerate_physical_devices(
    _instance: vk::Instance,
    p_physical_device_count: *mut u32,
    p_physical_devices: *mut vk::PhysicalDevice,
) -> vk::Result {
    let available = with_state(|state| {
        let index = state
            .physical_device_calls
            .min(state.physical_device_sizes.len() - 1);
        state.physical_device_calls += 1;
        state.physical_device_sizes[index]
    });
    let items: Vec<vk::PhysicalDevice> = (0..u64::from(available))
        .map(|i| vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE_BASE + i))
        .collect();
    write_list(&items, p_physical_device_count, p_physical_devices)
}

unsafe extern "system" fn get_physical_device_properties(
    physical_device: vk::PhysicalDevice,
    p_properties: *mut vk::PhysicalDeviceProperties,
) {
    let mut properties = vk::PhysicalDeviceProperties::default();
    properties.api_version = with_state(|state| state.device_api_version);
    properties.driver_version = vk::make_api_version(0, 535, 1, 0);
    properties.vendor_id = 0x10DE;
    properties.device_id = (physical_device.as_raw() - PHYSICAL_DEVICE_BASE) as u32;
    properties.device_type = vk::PhysicalDeviceType::DISCRETE_GPU;
    properties.limits.max_compute_work_group_invocations = 1024;
    copy_name(&mut properties.device_name, c"Simulated GPU");
    *p_properties = properties;
}

unsafe extern "system" fn get_physical_device_features(
    _physical_device: vk::PhysicalDevice,
    p_features: *mut vk::PhysicalDeviceFeatures,
) {
    *p_features = vk::PhysicalDeviceFeatures {
        shader_int64: vk::TRUE,
        ..Default::default()
    };
}

unsafe extern "system" fn get_physical_device_memory_properties(
    _physical_device: vk::PhysicalDevice,
    p_memory_properties: *mut vk::PhysicalDeviceMemoryProperties,
) {
    let mut properties = vk::PhysicalDeviceMemoryProperties::default();
    properties.memory_heap_count = 2;
    properties.memory_heaps[0] = vk::MemoryHeap {
        size: 8 * 1024 * 1024 * 1024,
        flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
    };
    properties.memory_heaps[1] = vk::MemoryHeap {
        size: 16 * 1024 * 1024 * 1024,
        flags: vk::MemoryHeapFlags::empty(),
    };
    *p_memory_properties = properties;
}

unsafe extern "system" fn get_physical_device_queue_family_properties(
    _physical_device: vk::PhysicalDevice,
    p_queue_family_property_count: *mut u32,
    p_queue_family_properties: *mut vk::QueueFamilyProperties,
) {
    let family = |flags, queue_count| vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count,
        timestamp_valid_bits: 64,
        ..Default::default()
    };
    let items = [
        family(
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
            16,
        ),
        family(vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 2),
        family(vk::QueueFlags::TRANSFER, 1),
    ];
    let _ = write_list(&items, p_queue_family_property_count, p_queue_family_properties);
}

unsafe extern "system" fn enumerate_device_extension_properties(
    _physical_device: vk::PhysicalDevice,
    _p_layer_name: *const c_char,
    p_property_count: *mut u32,
    p_properties: *mut vk::ExtensionProperties,
) -> vk::Result {
    let items: Vec<vk::ExtensionProperties> = DEVICE_EXTENSIONS
        .iter()
        .map(|name| {
            let mut properties = vk::ExtensionProperties::default();
            copy_name(&mut properties.extension_name, name);
            properties
        })
        .collect();
    write_list(&items, p_property_count, p_properties)
}

unsafe extern "system" fn create_device(
    _physical_device: vk::PhysicalDevice,
    _p_create_info: *const vk::DeviceCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_device: *mut vk::Device,
) -> vk::Result {
    with_state(|state| {
        state.devices_created += 1;
        *p_device = vk::Device::from_raw(DEVICE_BASE + state.devices_created - 1);
    });
    vk::Result::SUCCESS
}

unsafe extern "system" fn destroy_device(
    device: vk::Device,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    with_state(|state| {
        state.destroyed.push(Destroyed::Device {
            device: device.as_raw(),
        });
    });
}

unsafe extern "system" fn get_device_queue(
    _device: vk::Device,
    queue_family_index: u32,
    queue_index: u32,
    p_queue: *mut vk::Queue,
) {
    let raw = QUEUE_BASE + u64::from(queue_family_index) * 16 + u64::from(queue_index);
    *p_queue = vk::Queue::from_raw(raw);
}

unsafe extern "system" fn device_wait_idle(_device: vk::Device) -> vk::Result {
    vk::Result::SUCCESS
}

unsafe extern "system" fn queue_wait_idle(_queue: vk::Queue) -> vk::Result {
    vk::Result::SUCCESS
}

unsafe extern "system" fn queue_submit(
    _queue: vk::Queue,
    _submit_count: u32,
    _p_submits: *const vk::SubmitInfo<'_>,
    fence: vk::Fence,
) -> vk::Result {
    with_state(|state| {
        state.submissions += 1;
        if !fence.is_null() && !state.hang {
            state.signaled.insert(fence.as_raw());
        }
    });
    vk::Result::SUCCESS
}

unsafe extern "system" fn create_fence(
    _device: vk::Device,
    p_create_info: *const vk::FenceCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_fence: *mut vk::Fence,
) -> vk::Result {
    let signaled = (*p_create_info)
        .flags
        .contains(vk::FenceCreateFlags::SIGNALED);
    with_state(|state| {
        state.fences_created += 1;
        let raw = FENCE_BASE + state.fences_created;
        if signaled {
            state.signaled.insert(raw);
        }
        *p_fence = vk::Fence::from_raw(raw);
    });
    vk::Result::SUCCESS
}

pub unsafe extern "system" fn destroy_fence(
    device: vk::Device,
    fence: vk::Fence,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    with_state(|state| {
        state.destroyed.push(Destroyed::Fence {
            device: device.as_raw(),
            fence: fence.as_raw(),
        });
    });
}

unsafe extern "system" fn reset_fences(
    _device: vk::Device,
    fence_count: u32,
    p_fences: *const vk::Fence,
) -> vk::Result {
    let fences = std::slice::from_raw_parts(p_fences, fence_count as usize);
    with_state(|state| {
        for fence in fences {
            state.signaled.remove(&fence.as_raw());
        }
    });
    vk::Result::SUCCESS
}

unsafe extern "system" fn get_fence_status(_device: vk::Device, fence: vk::Fence) -> vk::Result {
    if with_state(|state| state.signaled.contains(&fence.as_raw())) {
        vk::Result::SUCCESS
    } else {
        vk::Result::NOT_READY
    }
}

unsafe extern "system" fn wait_for_fences(
    _device: vk::Device,
    fence_count: u32,
    p_fences: *const vk::Fence,
    wait_all: vk::Bool32,
    timeout: u64,
) -> vk::Result {
    let fences = std::slice::from_raw_parts(p_fences, fence_count as usize);
    let ready = with_state(|state| {
        let mut signaled = fences.iter().map(|f| state.signaled.contains(&f.as_raw()));
        if wait_all == vk::TRUE {
            signaled.all(|s| s)
        } else {
            signaled.any(|s| s)
        }
    });
    if ready {
        return vk::Result::SUCCESS;
    }
    std::thread::sleep(Duration::from_nanos(timeout).min(MAX_SIMULATED_WAIT));
    vk::Result::TIMEOUT
}

unsafe extern "system" fn create_semaphore(
    _device: vk::Device,
    _p_create_info: *const vk::SemaphoreCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_semaphore: *mut vk::Semaphore,
) -> vk::Result {
    with_state(|state| {
        state.semaphores_created += 1;
        *p_semaphore = vk::Semaphore::from_raw(SEMAPHORE_BASE + state.semaphores_created);
    });
    vk::Result::SUCCESS
}

unsafe extern "system" fn destroy_semaphore(
    device: vk::Device,
    semaphore: vk::Semaphore,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    with_state(|state| {
        state.destroyed.push(Destroyed::Semaphore {
            device: device.as_raw(),
            semaphore: semaphore.as_raw(),
        });
    });
}

unsafe extern "system" fn create_command_pool(
    _device: vk::Device,
    _p_create_info: *const vk::CommandPoolCreateInfo<'_>,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
    p_command_pool: *mut vk::CommandPool,
) -> vk::Result {
    with_state(|state| {
        state.pools_created += 1;
        *p_command_pool = vk::CommandPool::from_raw(COMMAND_POOL_BASE + state.pools_created);
    });
    vk::Result::SUCCESS
}

unsafe extern "system" fn destroy_command_pool(
    device: vk::Device,
    command_pool: vk::CommandPool,
    _p_allocator: *const vk::AllocationCallbacks<'_>,
) {
    with_state(|state| {
        state.destroyed.push(Destroyed::CommandPool {
            device: device.as_raw(),
            pool: command_pool.as_raw(),
        });
    });
}
