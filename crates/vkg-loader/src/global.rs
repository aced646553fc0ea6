//! Process-wide loader context.
//!
//! Code that cannot thread a [`Vkg`] through its call graph shares this
//! one. Access is serialized by a mutex; [`LibraryRef`] keeps the library
//! loaded for as long as any holder needs it.

use crate::context::{LifecycleState, Vkg};
use crate::error::Result;
use ash::vk;
use parking_lot::Mutex;
use std::path::Path;

struct Global {
    vkg: Vkg,
    users: usize,
}

static GLOBAL: Mutex<Global> = Mutex::new(Global {
    vkg: Vkg::new(),
    users: 0,
});

/// Run `f` with exclusive access to the process-wide context.
///
/// The lock is held for the whole call and is not reentrant: calling
/// [`with`], [`load`], [`clean_up`], [`state`], [`LibraryRef::acquire`],
/// [`LibraryRef::count`] or dropping a [`LibraryRef`] from inside `f`
/// deadlocks.
pub fn with<R>(f: impl FnOnce(&mut Vkg) -> R) -> R {
    f(&mut GLOBAL.lock().vkg)
}

/// Load the process-wide library.
///
/// # Safety
/// See [`Vkg::load`].
pub unsafe fn load(path: Option<&Path>) -> Result<()> {
    with(|vkg| unsafe { vkg.load(path) })
}

/// Tear down the process-wide context regardless of outstanding
/// [`LibraryRef`]s.
pub fn clean_up() {
    let mut global = GLOBAL.lock();
    global.vkg.clean_up();
    global.users = 0;
}

pub fn state() -> LifecycleState {
    GLOBAL.lock().vkg.state()
}

/// Keeps the process-wide library loaded.
///
/// The first reference loads the library, dropping the last one cleans up
/// the whole context.
#[derive(Debug)]
pub struct LibraryRef(());

impl LibraryRef {
    /// Takes a reference, loading the library from `path` (or the defaults)
    /// if it is not loaded yet.
    ///
    /// # Safety
    /// See [`Vkg::load`].
    pub unsafe fn acquire(path: Option<&Path>) -> Result<Self> {
        let mut global = GLOBAL.lock();
        if global.vkg.library().is_none() {
            unsafe { global.vkg.load(path) }?;
        }
        global.users += 1;
        Ok(Self(()))
    }

    /// Like [`acquire`](Self::acquire), binding `get_instance_proc_addr`
    /// instead of opening a library.
    ///
    /// # Safety
    /// See [`Vkg::load_from_entry`].
    pub unsafe fn acquire_with_entry(
        get_instance_proc_addr: vk::PFN_vkGetInstanceProcAddr,
    ) -> Result<Self> {
        let mut global = GLOBAL.lock();
        if global.vkg.library().is_none() {
            unsafe { global.vkg.load_from_entry(get_instance_proc_addr) }?;
        }
        global.users += 1;
        Ok(Self(()))
    }

    /// Number of live references.
    pub fn count() -> usize {
        GLOBAL.lock().users
    }
}

impl Drop for LibraryRef {
    fn drop(&mut self) {
        let mut global = GLOBAL.lock();
        global.users = global.users.saturating_sub(1);
        if global.users == 0 {
            tracing::debug!("Last library reference released");
            global.vkg.clean_up();
        }
    }
}
