//! Typed handles and move-only owners.
//!
//! The plain handle wrappers are ash's `vk::*` types: `#[repr(transparent)]`
//! newtypes over the native scalar, one type per object kind, comparable and
//! null-checkable through [`vk::Handle`], with no arithmetic. [`Unique`] adds
//! ownership on top: it destroys the handle through the matching native
//! destroy entry point exactly once.

use crate::context::Vkg;
use crate::table::FunctionTable;
use ash::vk;
use ash::vk::Handle;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ops::Deref;
use std::ptr;

/// Signature shared by every `vkDestroy*`/`vkFree*` entry point of a device
/// child object.
pub type DestroyFn<T> = unsafe extern "system" fn(vk::Device, T, *const vk::AllocationCallbacks<'_>);

/// A handle owned by a logical device and released with a single call taking
/// the device and the handle.
pub trait DeviceChild: Handle + Copy + Default + PartialEq + fmt::Debug {
    /// Native entry point that releases this kind of handle.
    const DESTROY_NAME: &'static str;

    /// The populated destroy slot for this kind, if the device phase ran.
    fn destroy_fn(table: &FunctionTable) -> Option<DestroyFn<Self>>;
}

macro_rules! device_children {
    ($( $ty:ident => $slot:ident, $name:literal; )*) => {
        $(
            impl DeviceChild for vk::$ty {
                const DESTROY_NAME: &'static str = $name;

                #[inline]
                fn destroy_fn(table: &FunctionTable) -> Option<DestroyFn<Self>> {
                    table.$slot
                }
            }
        )*
    };
}

device_children! {
    Fence => destroy_fence, "vkDestroyFence";
    Semaphore => destroy_semaphore, "vkDestroySemaphore";
    CommandPool => destroy_command_pool, "vkDestroyCommandPool";
    Buffer => destroy_buffer, "vkDestroyBuffer";
    DeviceMemory => free_memory, "vkFreeMemory";
    ShaderModule => destroy_shader_module, "vkDestroyShaderModule";
    DescriptorSetLayout => destroy_descriptor_set_layout, "vkDestroyDescriptorSetLayout";
    DescriptorPool => destroy_descriptor_pool, "vkDestroyDescriptorPool";
    PipelineLayout => destroy_pipeline_layout, "vkDestroyPipelineLayout";
    Pipeline => destroy_pipeline, "vkDestroyPipeline";
    QueryPool => destroy_query_pool, "vkDestroyQueryPool";
}

/// Move-only owner of a device child handle.
///
/// Dropping (or [`reset`](Self::reset)) calls the native destroy function
/// with the owning device. A null owner destroys nothing. Not `Clone`:
/// ownership moves with the value, and [`take`](Self::take) moves it out of
/// a place while leaving a null owner behind.
///
/// Owners created by a [`Vkg`] borrow it for `'a`, so the device cannot be
/// torn down while one is alive:
///
/// ```compile_fail
/// # fn demo(vkg: &mut vkg_loader::Vkg) -> vkg_loader::Result<()> {
/// let fence = vkg.create_fence(false)?;
/// vkg.destroy_device();
/// drop(fence);
/// # Ok(())
/// # }
/// ```
///
/// ```compile_fail
/// # fn demo(vkg: vkg_loader::Vkg) -> vkg_loader::Result<()> {
/// let fence = vkg.create_fence(false)?;
/// drop(vkg);
/// drop(fence);
/// # Ok(())
/// # }
/// ```
pub struct Unique<'a, T: DeviceChild> {
    handle: T,
    device: vk::Device,
    destroy: Option<DestroyFn<T>>,
    _context: PhantomData<&'a Vkg>,
}

impl<'a, T: DeviceChild> Unique<'a, T> {
    /// Takes ownership of `handle`.
    ///
    /// # Safety
    /// `handle` must have been created from `device`, must not be owned
    /// elsewhere, and `destroy` must be the destroy entry point resolved for
    /// `device`. Both the device and `destroy` must stay valid for `'a`.
    pub unsafe fn from_raw_parts(handle: T, device: vk::Device, destroy: DestroyFn<T>) -> Self {
        Self {
            handle,
            device,
            destroy: Some(destroy),
            _context: PhantomData,
        }
    }

    /// An owner holding nothing.
    pub fn null() -> Self {
        Self {
            handle: T::default(),
            device: vk::Device::null(),
            destroy: None,
            _context: PhantomData,
        }
    }

    /// The owned handle, still owned by `self`.
    #[inline]
    pub fn get(&self) -> T {
        self.handle
    }

    /// The device the handle belongs to.
    #[inline]
    pub fn device(&self) -> vk::Device {
        self.device
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.handle == T::default()
    }

    /// Gives up ownership without destroying.
    #[must_use = "the released handle leaks unless destroyed"]
    pub fn release(mut self) -> T {
        let handle = self.handle;
        self.destroy = None;
        self.handle = T::default();
        handle
    }

    /// Destroys the owned handle now and leaves `self` null.
    pub fn reset(&mut self) {
        let handle = mem::take(&mut self.handle);
        let destroy = self.destroy.take();
        if let Some(destroy) = destroy {
            if handle != T::default() {
                tracing::trace!("{}({:?})", T::DESTROY_NAME, handle);
                unsafe { destroy(self.device, handle, ptr::null()) };
            }
        }
        self.device = vk::Device::null();
    }

    /// Moves ownership out, leaving a null owner in `self`.
    pub fn take(&mut self) -> Self {
        mem::take(self)
    }
}

impl<T: DeviceChild> Drop for Unique<'_, T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: DeviceChild> Default for Unique<'_, T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: DeviceChild> Deref for Unique<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.handle
    }
}

impl<T: DeviceChild> PartialEq<T> for Unique<'_, T> {
    fn eq(&self, other: &T) -> bool {
        self.handle == *other
    }
}

impl<T: DeviceChild> fmt::Debug for Unique<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unique")
            .field("handle", &self.handle)
            .field("device", &self.device)
            .finish()
    }
}
