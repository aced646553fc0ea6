//! The two-call enumeration pattern used by every `vkEnumerate*` /
//! `vkGet*Properties` entry point returning a list.
//!
//! Query the count, allocate, fetch. The list may grow between the two
//! calls, in which case the fetch reports `VK_INCOMPLETE` and the whole
//! sequence starts over. If it shrank, the result is truncated to the count
//! reported by the fetch so no stale entries are returned.

use crate::result::VkResult;
use ash::vk;
use std::ptr;

/// Allocates `count` default elements, reporting allocation failure as
/// `VK_ERROR_OUT_OF_HOST_MEMORY` instead of aborting.
fn allocate<T: Copy + Default>(items: &mut Vec<T>, count: u32) -> VkResult<()> {
    items.clear();
    items
        .try_reserve_exact(count as usize)
        .map_err(|_| vk::Result::ERROR_OUT_OF_HOST_MEMORY)?;
    items.resize(count as usize, T::default());
    Ok(())
}

/// Runs the count/allocate/fetch loop over a result-returning entry point.
///
/// `query` receives the count pointer and the element pointer (null when
/// probing) and forwards them to the native call.
///
/// # Safety
/// `query` must forward to a native enumeration entry point that writes at
/// most `*count` elements.
pub unsafe fn enumerate<T, F>(mut query: F) -> VkResult<Vec<T>>
where
    T: Copy + Default,
    F: FnMut(*mut u32, *mut T) -> vk::Result,
{
    let mut items = Vec::new();
    loop {
        let mut count = 0u32;
        let result = query(&mut count, ptr::null_mut());
        if result.as_raw() < 0 {
            return Err(result);
        }
        if count == 0 {
            return Ok(Vec::new());
        }

        allocate(&mut items, count)?;
        let result = query(&mut count, items.as_mut_ptr());
        match result {
            vk::Result::INCOMPLETE => {
                tracing::trace!("Enumeration grew past {} entries, retrying", items.len());
            }
            result if result.as_raw() < 0 => return Err(result),
            _ => {
                items.truncate(count as usize);
                return Ok(items);
            }
        }
    }
}

/// Runs the count/allocate/fetch sequence over an entry point that returns
/// nothing (`vkGetPhysicalDeviceQueueFamilyProperties` and friends).
///
/// # Safety
/// `query` must forward to a native entry point that writes at most
/// `*count` elements.
pub unsafe fn enumerate_void<T, F>(mut query: F) -> VkResult<Vec<T>>
where
    T: Copy + Default,
    F: FnMut(*mut u32, *mut T),
{
    let mut count = 0u32;
    query(&mut count, ptr::null_mut());

    let mut items = Vec::new();
    allocate(&mut items, count)?;
    if count > 0 {
        query(&mut count, items.as_mut_ptr());
        items.truncate(count as usize);
    }
    Ok(items)
}
