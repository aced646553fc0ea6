//! The dispatch table: one typed function-pointer slot per native entry point.
//!
//! Slots are filled in three phases as the objects they depend on come into
//! existence:
//!
//! - **global**: needs only the loader library (`vkGetInstanceProcAddr(NULL, ..)`),
//! - **instance**: needs a live instance (`vkGetInstanceProcAddr(instance, ..)`),
//! - **device**: needs a live device (`vkGetDeviceProcAddr(device, ..)`).
//!
//! The table is generated from the declarative list at the bottom of this
//! file. Adding an entry point means adding one row there.

use ash::vk;
use std::ffi::CStr;
use std::fmt;
use std::mem;

/// Stage at which an entry point becomes resolvable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Global,
    Instance,
    Device,
}

/// Whether a missing entry point aborts its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// Core functionality the loader depends on. A null pointer is an
    /// initialization failure.
    Required,
    /// Newer-version or extension functionality. A null pointer leaves the
    /// slot empty.
    Optional,
}

/// Static description of one table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: &'static CStr,
    pub phase: Phase,
    pub requirement: Requirement,
}

/// A required entry point resolved to null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingEntryPoint(pub &'static CStr);

impl fmt::Display for MissingEntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

/// Resolves one slot.
///
/// # Safety
/// `F` must be the `vk::PFN_*` type matching `name`.
unsafe fn resolve_slot<F: Copy>(
    resolve: &mut impl FnMut(&CStr) -> vk::PFN_vkVoidFunction,
    name: &'static CStr,
    requirement: Requirement,
) -> Result<Option<F>, MissingEntryPoint> {
    debug_assert_eq!(mem::size_of::<F>(), mem::size_of::<unsafe extern "system" fn()>());

    match resolve(name) {
        Some(function) => Ok(Some(unsafe {
            mem::transmute_copy::<unsafe extern "system" fn(), F>(&function)
        })),
        None if requirement == Requirement::Required => {
            tracing::error!("Required entry point {} not found", name.to_string_lossy());
            Err(MissingEntryPoint(name))
        }
        None => {
            tracing::trace!("Optional entry point {} not available", name.to_string_lossy());
            Ok(None)
        }
    }
}

/// Reports `VK_API_VERSION_1_0`; installed when the runtime predates
/// `vkEnumerateInstanceVersion`.
unsafe extern "system" fn enumerate_instance_version_1_0(p_api_version: *mut u32) -> vk::Result {
    if !p_api_version.is_null() {
        unsafe { *p_api_version = vk::API_VERSION_1_0 };
    }
    vk::Result::SUCCESS
}

macro_rules! function_table {
    (
        global {
            $( $g_slot:ident: $g_pfn:ident = $g_name:literal, $g_req:ident; )*
        }
        instance {
            $( $i_slot:ident: $i_pfn:ident = $i_name:literal, $i_req:ident; )*
        }
        device {
            $( $d_slot:ident: $d_pfn:ident = $d_name:literal, $d_req:ident; )*
        }
    ) => {
        /// Resolved native entry points.
        ///
        /// Slots are public for direct calls into the API; the wrappers on
        /// [`crate::Vkg`] check the slot before calling.
        #[derive(Clone, Copy)]
        pub struct FunctionTable {
            /// Bootstrap resolver taken from the loader library.
            pub get_instance_proc_addr: Option<vk::PFN_vkGetInstanceProcAddr>,
            $( pub $g_slot: Option<vk::$g_pfn>, )*
            $( pub $i_slot: Option<vk::$i_pfn>, )*
            $( pub $d_slot: Option<vk::$d_pfn>, )*
        }

        impl FunctionTable {
            /// Every slot of the table, in resolution order.
            pub const ENTRY_POINTS: &'static [EntryPoint] = &[
                $( EntryPoint { name: $g_name, phase: Phase::Global, requirement: Requirement::$g_req }, )*
                $( EntryPoint { name: $i_name, phase: Phase::Instance, requirement: Requirement::$i_req }, )*
                $( EntryPoint { name: $d_name, phase: Phase::Device, requirement: Requirement::$d_req }, )*
            ];

            /// An empty table.
            pub const fn new() -> Self {
                Self {
                    get_instance_proc_addr: None,
                    $( $g_slot: None, )*
                    $( $i_slot: None, )*
                    $( $d_slot: None, )*
                }
            }

            fn resolve_global(
                &mut self,
                mut resolve: impl FnMut(&CStr) -> vk::PFN_vkVoidFunction,
            ) -> Result<(), MissingEntryPoint> {
                unsafe {
                    $( self.$g_slot = resolve_slot::<vk::$g_pfn>(&mut resolve, $g_name, Requirement::$g_req)?; )*
                }
                Ok(())
            }

            fn resolve_instance(
                &mut self,
                mut resolve: impl FnMut(&CStr) -> vk::PFN_vkVoidFunction,
            ) -> Result<(), MissingEntryPoint> {
                unsafe {
                    $( self.$i_slot = resolve_slot::<vk::$i_pfn>(&mut resolve, $i_name, Requirement::$i_req)?; )*
                }
                Ok(())
            }

            fn resolve_device(
                &mut self,
                mut resolve: impl FnMut(&CStr) -> vk::PFN_vkVoidFunction,
            ) -> Result<(), MissingEntryPoint> {
                unsafe {
                    $( self.$d_slot = resolve_slot::<vk::$d_pfn>(&mut resolve, $d_name, Requirement::$d_req)?; )*
                }
                Ok(())
            }

            /// Empties every instance- and device-level slot.
            pub(crate) fn clear_instance(&mut self) {
                $( self.$i_slot = None; )*
                self.clear_device();
            }

            /// Empties every device-level slot.
            pub(crate) fn clear_device(&mut self) {
                $( self.$d_slot = None; )*
            }

            /// Empties the whole table.
            pub(crate) fn clear(&mut self) {
                *self = Self::new();
            }

            /// Returns true if the slot named `name` holds a pointer.
            pub fn is_resolved(&self, name: &CStr) -> bool {
                $( if name == $g_name { return self.$g_slot.is_some(); } )*
                $( if name == $i_name { return self.$i_slot.is_some(); } )*
                $( if name == $d_name { return self.$d_slot.is_some(); } )*
                false
            }
        }
    };
}

impl FunctionTable {
    /// Global phase.
    ///
    /// Installs the bootstrap resolver and resolves the entry points needed
    /// before an instance exists.
    pub(crate) fn load_global(
        &mut self,
        get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    ) -> Result<(), MissingEntryPoint> {
        self.get_instance_proc_addr = Some(get_instance_proc_addr);
        self.resolve_global(|name| unsafe {
            get_instance_proc_addr(vk::Instance::null(), name.as_ptr())
        })?;

        if self.enumerate_instance_version.is_none() {
            tracing::debug!("vkEnumerateInstanceVersion missing, assuming a Vulkan 1.0 runtime");
            self.enumerate_instance_version = Some(enumerate_instance_version_1_0);
        }
        Ok(())
    }

    /// Instance phase.
    ///
    /// `vkDestroyInstance` is the first slot resolved, so it is populated
    /// even when a later required entry point is missing.
    ///
    /// # Safety
    /// `instance` must be a live instance created through the global phase's
    /// `vkCreateInstance`.
    pub(crate) unsafe fn load_instance(
        &mut self,
        instance: vk::Instance,
    ) -> Result<(), MissingEntryPoint> {
        let Some(get_instance_proc_addr) = self.get_instance_proc_addr else {
            return Err(MissingEntryPoint(c"vkGetInstanceProcAddr"));
        };
        self.resolve_instance(|name| unsafe { get_instance_proc_addr(instance, name.as_ptr()) })
    }

    /// Device phase.
    ///
    /// # Safety
    /// `device` must be a live device created through the instance phase's
    /// `vkCreateDevice`.
    pub(crate) unsafe fn load_device(&mut self, device: vk::Device) -> Result<(), MissingEntryPoint> {
        let Some(get_device_proc_addr) = self.get_device_proc_addr else {
            return Err(MissingEntryPoint(c"vkGetDeviceProcAddr"));
        };
        self.resolve_device(|name| unsafe { get_device_proc_addr(device, name.as_ptr()) })
    }

    /// Number of populated slots in `phase`.
    pub fn resolved_count(&self, phase: Phase) -> usize {
        Self::ENTRY_POINTS
            .iter()
            .filter(|entry| entry.phase == phase && self.is_resolved(entry.name))
            .count()
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionTable")
            .field("global", &self.resolved_count(Phase::Global))
            .field("instance", &self.resolved_count(Phase::Instance))
            .field("device", &self.resolved_count(Phase::Device))
            .finish()
    }
}

function_table! {
    global {
        create_instance: PFN_vkCreateInstance = c"vkCreateInstance", Required;
        enumerate_instance_extension_properties: PFN_vkEnumerateInstanceExtensionProperties = c"vkEnumerateInstanceExtensionProperties", Required;
        enumerate_instance_layer_properties: PFN_vkEnumerateInstanceLayerProperties = c"vkEnumerateInstanceLayerProperties", Required;
        enumerate_instance_version: PFN_vkEnumerateInstanceVersion = c"vkEnumerateInstanceVersion", Optional;
    }
    instance {
        destroy_instance: PFN_vkDestroyInstance = c"vkDestroyInstance", Required;
        enumerate_physical_devices: PFN_vkEnumeratePhysicalDevices = c"vkEnumeratePhysicalDevices", Required;
        get_physical_device_properties: PFN_vkGetPhysicalDeviceProperties = c"vkGetPhysicalDeviceProperties", Required;
        get_physical_device_features: PFN_vkGetPhysicalDeviceFeatures = c"vkGetPhysicalDeviceFeatures", Required;
        get_physical_device_format_properties: PFN_vkGetPhysicalDeviceFormatProperties = c"vkGetPhysicalDeviceFormatProperties", Required;
        get_physical_device_memory_properties: PFN_vkGetPhysicalDeviceMemoryProperties = c"vkGetPhysicalDeviceMemoryProperties", Required;
        get_physical_device_queue_family_properties: PFN_vkGetPhysicalDeviceQueueFamilyProperties = c"vkGetPhysicalDeviceQueueFamilyProperties", Required;
        enumerate_device_extension_properties: PFN_vkEnumerateDeviceExtensionProperties = c"vkEnumerateDeviceExtensionProperties", Required;
        enumerate_device_layer_properties: PFN_vkEnumerateDeviceLayerProperties = c"vkEnumerateDeviceLayerProperties", Optional;
        create_device: PFN_vkCreateDevice = c"vkCreateDevice", Required;
        get_device_proc_addr: PFN_vkGetDeviceProcAddr = c"vkGetDeviceProcAddr", Required;
        get_physical_device_properties2: PFN_vkGetPhysicalDeviceProperties2 = c"vkGetPhysicalDeviceProperties2", Optional;
        get_physical_device_features2: PFN_vkGetPhysicalDeviceFeatures2 = c"vkGetPhysicalDeviceFeatures2", Optional;
        get_physical_device_memory_properties2: PFN_vkGetPhysicalDeviceMemoryProperties2 = c"vkGetPhysicalDeviceMemoryProperties2", Optional;
        get_physical_device_queue_family_properties2: PFN_vkGetPhysicalDeviceQueueFamilyProperties2 = c"vkGetPhysicalDeviceQueueFamilyProperties2", Optional;
    }
    device {
        destroy_device: PFN_vkDestroyDevice = c"vkDestroyDevice", Required;
        get_device_queue: PFN_vkGetDeviceQueue = c"vkGetDeviceQueue", Required;
        device_wait_idle: PFN_vkDeviceWaitIdle = c"vkDeviceWaitIdle", Required;
        queue_submit: PFN_vkQueueSubmit = c"vkQueueSubmit", Required;
        queue_wait_idle: PFN_vkQueueWaitIdle = c"vkQueueWaitIdle", Required;
        create_fence: PFN_vkCreateFence = c"vkCreateFence", Required;
        destroy_fence: PFN_vkDestroyFence = c"vkDestroyFence", Required;
        reset_fences: PFN_vkResetFences = c"vkResetFences", Required;
        get_fence_status: PFN_vkGetFenceStatus = c"vkGetFenceStatus", Required;
        wait_for_fences: PFN_vkWaitForFences = c"vkWaitForFences", Required;
        create_semaphore: PFN_vkCreateSemaphore = c"vkCreateSemaphore", Required;
        destroy_semaphore: PFN_vkDestroySemaphore = c"vkDestroySemaphore", Required;
        create_command_pool: PFN_vkCreateCommandPool = c"vkCreateCommandPool", Required;
        destroy_command_pool: PFN_vkDestroyCommandPool = c"vkDestroyCommandPool", Required;
        reset_command_pool: PFN_vkResetCommandPool = c"vkResetCommandPool", Required;
        allocate_command_buffers: PFN_vkAllocateCommandBuffers = c"vkAllocateCommandBuffers", Required;
        free_command_buffers: PFN_vkFreeCommandBuffers = c"vkFreeCommandBuffers", Required;
        begin_command_buffer: PFN_vkBeginCommandBuffer = c"vkBeginCommandBuffer", Required;
        end_command_buffer: PFN_vkEndCommandBuffer = c"vkEndCommandBuffer", Required;
        create_buffer: PFN_vkCreateBuffer = c"vkCreateBuffer", Required;
        destroy_buffer: PFN_vkDestroyBuffer = c"vkDestroyBuffer", Required;
        get_buffer_memory_requirements: PFN_vkGetBufferMemoryRequirements = c"vkGetBufferMemoryRequirements", Required;
        bind_buffer_memory: PFN_vkBindBufferMemory = c"vkBindBufferMemory", Required;
        allocate_memory: PFN_vkAllocateMemory = c"vkAllocateMemory", Required;
        free_memory: PFN_vkFreeMemory = c"vkFreeMemory", Required;
        map_memory: PFN_vkMapMemory = c"vkMapMemory", Required;
        unmap_memory: PFN_vkUnmapMemory = c"vkUnmapMemory", Required;
        flush_mapped_memory_ranges: PFN_vkFlushMappedMemoryRanges = c"vkFlushMappedMemoryRanges", Required;
        invalidate_mapped_memory_ranges: PFN_vkInvalidateMappedMemoryRanges = c"vkInvalidateMappedMemoryRanges", Required;
        create_shader_module: PFN_vkCreateShaderModule = c"vkCreateShaderModule", Required;
        destroy_shader_module: PFN_vkDestroyShaderModule = c"vkDestroyShaderModule", Required;
        create_descriptor_set_layout: PFN_vkCreateDescriptorSetLayout = c"vkCreateDescriptorSetLayout", Required;
        destroy_descriptor_set_layout: PFN_vkDestroyDescriptorSetLayout = c"vkDestroyDescriptorSetLayout", Required;
        create_descriptor_pool: PFN_vkCreateDescriptorPool = c"vkCreateDescriptorPool", Required;
        destroy_descriptor_pool: PFN_vkDestroyDescriptorPool = c"vkDestroyDescriptorPool", Required;
        allocate_descriptor_sets: PFN_vkAllocateDescriptorSets = c"vkAllocateDescriptorSets", Required;
        update_descriptor_sets: PFN_vkUpdateDescriptorSets = c"vkUpdateDescriptorSets", Required;
        create_pipeline_layout: PFN_vkCreatePipelineLayout = c"vkCreatePipelineLayout", Required;
        destroy_pipeline_layout: PFN_vkDestroyPipelineLayout = c"vkDestroyPipelineLayout", Required;
        create_compute_pipelines: PFN_vkCreateComputePipelines = c"vkCreateComputePipelines", Required;
        destroy_pipeline: PFN_vkDestroyPipeline = c"vkDestroyPipeline", Required;
        create_query_pool: PFN_vkCreateQueryPool = c"vkCreateQueryPool", Required;
        destroy_query_pool: PFN_vkDestroyQueryPool = c"vkDestroyQueryPool", Required;
        get_query_pool_results: PFN_vkGetQueryPoolResults = c"vkGetQueryPoolResults", Required;
        cmd_bind_pipeline: PFN_vkCmdBindPipeline = c"vkCmdBindPipeline", Required;
        cmd_bind_descriptor_sets: PFN_vkCmdBindDescriptorSets = c"vkCmdBindDescriptorSets", Required;
        cmd_push_constants: PFN_vkCmdPushConstants = c"vkCmdPushConstants", Required;
        cmd_dispatch: PFN_vkCmdDispatch = c"vkCmdDispatch", Required;
        cmd_pipeline_barrier: PFN_vkCmdPipelineBarrier = c"vkCmdPipelineBarrier", Required;
        cmd_reset_query_pool: PFN_vkCmdResetQueryPool = c"vkCmdResetQueryPool", Required;
        cmd_write_timestamp: PFN_vkCmdWriteTimestamp = c"vkCmdWriteTimestamp", Required;
        cmd_copy_buffer: PFN_vkCmdCopyBuffer = c"vkCmdCopyBuffer", Required;
        cmd_fill_buffer: PFN_vkCmdFillBuffer = c"vkCmdFillBuffer", Required;
        get_device_queue2: PFN_vkGetDeviceQueue2 = c"vkGetDeviceQueue2", Optional;
        reset_query_pool: PFN_vkResetQueryPool = c"vkResetQueryPool", Optional;
        wait_semaphores: PFN_vkWaitSemaphores = c"vkWaitSemaphores", Optional;
        signal_semaphore: PFN_vkSignalSemaphore = c"vkSignalSemaphore", Optional;
        get_semaphore_counter_value: PFN_vkGetSemaphoreCounterValue = c"vkGetSemaphoreCounterValue", Optional;
    }
}
