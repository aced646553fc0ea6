//! Synchronization primitives and queue submission on the active device.

use crate::context::{require, Vkg};
use crate::error::{Result, ResultExt};
use crate::handle::Unique;
use crate::result::{check_non_negative, check_success, VkResult};
use ash::vk;
use ash::vk::Handle;
use std::ptr;
use std::time::Duration;

/// Timeout that never expires.
pub const WAIT_FOREVER: u64 = u64::MAX;

/// Converts a duration to a fence timeout in nanoseconds, saturating.
pub fn timeout_ns(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(WAIT_FOREVER)
}

fn active_device(vkg: &Vkg) -> VkResult<vk::Device> {
    let device = vkg.device();
    if device.is_null() {
        tracing::warn!("Device-level call made without a device");
        return Err(vk::Result::ERROR_INITIALIZATION_FAILED);
    }
    Ok(device)
}

impl Vkg {
    /// Create a fence owned by the returned wrapper.
    pub fn create_fence(&self, signaled: bool) -> Result<Unique<'_, vk::Fence>> {
        self.create_fence_raw(signaled).or_raise("vkCreateFence")
    }

    pub fn create_fence_raw(&self, signaled: bool) -> VkResult<Unique<'_, vk::Fence>> {
        let device = active_device(self)?;
        let create_fence = require(self.table().create_fence, "vkCreateFence")?;

        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let mut fence = vk::Fence::null();
        check_success(unsafe { create_fence(device, &create_info, ptr::null(), &mut fence) })?;
        unsafe { self.make_unique(fence) }
    }

    /// Create a binary semaphore owned by the returned wrapper.
    pub fn create_semaphore(&self) -> Result<Unique<'_, vk::Semaphore>> {
        self.create_semaphore_raw().or_raise("vkCreateSemaphore")
    }

    pub fn create_semaphore_raw(&self) -> VkResult<Unique<'_, vk::Semaphore>> {
        let device = active_device(self)?;
        let create_semaphore = require(self.table().create_semaphore, "vkCreateSemaphore")?;

        let create_info = vk::SemaphoreCreateInfo::default();
        let mut semaphore = vk::Semaphore::null();
        check_success(unsafe {
            create_semaphore(device, &create_info, ptr::null(), &mut semaphore)
        })?;
        unsafe { self.make_unique(semaphore) }
    }

    /// Create a command pool for `queue_family_index`.
    pub fn create_command_pool(
        &self,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Unique<'_, vk::CommandPool>> {
        self.create_command_pool_raw(queue_family_index, flags)
            .or_raise("vkCreateCommandPool")
    }

    pub fn create_command_pool_raw(
        &self,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> VkResult<Unique<'_, vk::CommandPool>> {
        let device = active_device(self)?;
        let create_command_pool = require(self.table().create_command_pool, "vkCreateCommandPool")?;

        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family_index)
            .flags(flags);
        let mut pool = vk::CommandPool::null();
        check_success(unsafe {
            create_command_pool(device, &create_info, ptr::null(), &mut pool)
        })?;
        unsafe { self.make_unique(pool) }
    }

    /// Wait for `fences`, up to `timeout` nanoseconds.
    ///
    /// Returns `VK_SUCCESS`, or `VK_TIMEOUT` if the wait expired. Only
    /// negative codes are errors.
    ///
    /// # Safety
    /// Every fence must belong to the active device.
    pub unsafe fn wait_for_fences(
        &self,
        fences: &[vk::Fence],
        wait_all: bool,
        timeout: u64,
    ) -> Result<vk::Result> {
        unsafe { self.wait_for_fences_raw(fences, wait_all, timeout) }.or_raise("vkWaitForFences")
    }

    /// # Safety
    /// Every fence must belong to the active device.
    pub unsafe fn wait_for_fences_raw(
        &self,
        fences: &[vk::Fence],
        wait_all: bool,
        timeout: u64,
    ) -> VkResult<vk::Result> {
        let device = active_device(self)?;
        let wait_for_fences = require(self.table().wait_for_fences, "vkWaitForFences")?;

        let result = unsafe {
            wait_for_fences(
                device,
                fences.len() as u32,
                fences.as_ptr(),
                vk::Bool32::from(wait_all),
                timeout,
            )
        };
        if result == vk::Result::TIMEOUT {
            tracing::debug!("Fence wait timed out after {} ns", timeout);
        }
        check_non_negative(result)
    }

    /// Returns true if `fence` is signaled.
    ///
    /// # Safety
    /// `fence` must belong to the active device.
    pub unsafe fn get_fence_status(&self, fence: vk::Fence) -> Result<bool> {
        unsafe { self.get_fence_status_raw(fence) }.or_raise("vkGetFenceStatus")
    }

    /// # Safety
    /// `fence` must belong to the active device.
    pub unsafe fn get_fence_status_raw(&self, fence: vk::Fence) -> VkResult<bool> {
        let device = active_device(self)?;
        let get_fence_status = require(self.table().get_fence_status, "vkGetFenceStatus")?;

        match unsafe { get_fence_status(device, fence) } {
            vk::Result::SUCCESS => Ok(true),
            vk::Result::NOT_READY => Ok(false),
            error => Err(error),
        }
    }

    /// Reset `fences` to the unsignaled state.
    ///
    /// # Safety
    /// Every fence must belong to the active device and must not be in use
    /// by a pending submission.
    pub unsafe fn reset_fences(&self, fences: &[vk::Fence]) -> Result<()> {
        unsafe { self.reset_fences_raw(fences) }.or_raise("vkResetFences")
    }

    /// # Safety
    /// See [`reset_fences`](Self::reset_fences).
    pub unsafe fn reset_fences_raw(&self, fences: &[vk::Fence]) -> VkResult<()> {
        let device = active_device(self)?;
        let reset_fences = require(self.table().reset_fences, "vkResetFences")?;
        check_success(unsafe { reset_fences(device, fences.len() as u32, fences.as_ptr()) })
    }

    /// Submit work to `queue`, signaling `fence` (which may be null) when it
    /// completes.
    ///
    /// # Safety
    /// `queue` and `fence` must belong to the active device and every
    /// pointer reachable from `submits` must be valid.
    pub unsafe fn queue_submit(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> Result<()> {
        unsafe { self.queue_submit_raw(queue, submits, fence) }.or_raise("vkQueueSubmit")
    }

    /// # Safety
    /// See [`queue_submit`](Self::queue_submit).
    pub unsafe fn queue_submit_raw(
        &self,
        queue: vk::Queue,
        submits: &[vk::SubmitInfo<'_>],
        fence: vk::Fence,
    ) -> VkResult<()> {
        active_device(self)?;
        let queue_submit = require(self.table().queue_submit, "vkQueueSubmit")?;
        check_success(unsafe { queue_submit(queue, submits.len() as u32, submits.as_ptr(), fence) })
    }

    /// # Safety
    /// `queue` must belong to the active device.
    pub unsafe fn queue_wait_idle(&self, queue: vk::Queue) -> Result<()> {
        unsafe { self.queue_wait_idle_raw(queue) }.or_raise("vkQueueWaitIdle")
    }

    /// # Safety
    /// `queue` must belong to the active device.
    pub unsafe fn queue_wait_idle_raw(&self, queue: vk::Queue) -> VkResult<()> {
        active_device(self)?;
        let queue_wait_idle = require(self.table().queue_wait_idle, "vkQueueWaitIdle")?;
        check_success(unsafe { queue_wait_idle(queue) })
    }

    /// Wait for the active device to go idle.
    pub fn device_wait_idle(&self) -> Result<()> {
        self.device_wait_idle_raw().or_raise("vkDeviceWaitIdle")
    }

    pub fn device_wait_idle_raw(&self) -> VkResult<()> {
        let device = active_device(self)?;
        let device_wait_idle = require(self.table().device_wait_idle, "vkDeviceWaitIdle")?;
        check_success(unsafe { device_wait_idle(device) })
    }
}
