//! Virtual-memory reservation backing the code heaps.
//!
//! One contiguous block is reserved at startup and sliced into per-heap
//! sub-ranges; pages are committed on demand as the heaps grow. The
//! reservation address never changes for the life of the process, which
//! is what makes the lock-free address index in [`crate::heap`] sound.
//!
//! # Safety
//! All memory management is inherently unsafe. This module encapsulates
//! the unsafety behind safe APIs where possible.

use std::ptr::NonNull;

// =============================================================================
// Platform-specific imports
// =============================================================================

#[cfg(windows)]
mod platform {
    use std::ptr;
    use windows_sys::Win32::System::Memory::{
        MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_EXECUTE_READWRITE, PAGE_NOACCESS, VirtualAlloc,
        VirtualFree,
    };

    pub const PAGE_SIZE: usize = 4096;
    /// VirtualAlloc reservations are granted on 64KB boundaries.
    pub const ALLOCATION_GRANULARITY: usize = 64 * 1024;

    /// Reserve address space without committing backing pages.
    pub unsafe fn reserve(size: usize) -> *mut u8 {
        unsafe { VirtualAlloc(ptr::null(), size, MEM_RESERVE, PAGE_NOACCESS) as *mut u8 }
    }

    /// Commit pages inside a prior reservation.
    pub unsafe fn commit(ptr: *mut u8, size: usize) -> bool {
        let committed =
            unsafe { VirtualAlloc(ptr as *mut _, size, MEM_COMMIT, PAGE_EXECUTE_READWRITE) };
        !committed.is_null()
    }

    /// Release a whole reservation.
    pub unsafe fn release(ptr: *mut u8, _size: usize) {
        unsafe {
            VirtualFree(ptr as *mut _, 0, MEM_RELEASE);
        }
    }
}

#[cfg(unix)]
mod platform {
    use std::ptr;

    pub const PAGE_SIZE: usize = 4096;
    pub const ALLOCATION_GRANULARITY: usize = PAGE_SIZE;

    /// Reserve address space without committing backing pages.
    pub unsafe fn reserve(size: usize) -> *mut u8 {
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            ptr::null_mut()
        } else {
            ptr as *mut u8
        }
    }

    /// Commit pages inside a prior reservation.
    pub unsafe fn commit(ptr: *mut u8, size: usize) -> bool {
        unsafe {
            libc::mprotect(
                ptr as *mut _,
                size,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
            ) == 0
        }
    }

    /// Release a whole reservation.
    pub unsafe fn release(ptr: *mut u8, size: usize) {
        unsafe {
            libc::munmap(ptr as *mut _, size);
        }
    }
}

pub use platform::{ALLOCATION_GRANULARITY, PAGE_SIZE};

/// Align a size up to the given alignment (power of two).
#[inline]
pub const fn align_up(size: usize, align: usize) -> usize {
    (size + align - 1) & !(align - 1)
}

// =============================================================================
// Virtual Space
// =============================================================================

/// A contiguous reserve-first, commit-on-demand virtual address range.
///
/// The full range is reserved at construction; callers commit
/// page-aligned sub-ranges as heaps grow. The base address is stable
/// until drop.
pub struct VirtualSpace {
    /// Base of the reservation.
    base: NonNull<u8>,
    /// Total reserved bytes (page-aligned).
    reserved: usize,
}

impl VirtualSpace {
    /// Reserve `size` bytes of address space.
    ///
    /// The actual reservation is rounded up to the allocation
    /// granularity. Returns `None` if the OS refuses the reservation.
    pub fn reserve(size: usize) -> Option<Self> {
        let reserved = align_up(size, ALLOCATION_GRANULARITY);
        let ptr = unsafe { platform::reserve(reserved) };
        let base = NonNull::new(ptr)?;
        Some(VirtualSpace { base, reserved })
    }

    /// Base address of the reservation.
    #[inline]
    pub fn base(&self) -> *mut u8 {
        self.base.as_ptr()
    }

    /// Total reserved bytes.
    #[inline]
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    /// Check if an address falls inside the reservation.
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        let base = self.base.as_ptr() as usize;
        addr >= base && addr < base + self.reserved
    }

    /// Commit `len` bytes starting `offset` bytes into the reservation.
    ///
    /// Both values are rounded out to page boundaries. Returns `false`
    /// if the OS refuses to commit (address space is reserved but the
    /// system is out of backing store).
    pub fn commit(&self, offset: usize, len: usize) -> bool {
        debug_assert!(offset + len <= self.reserved, "commit out of reservation");
        let start = offset & !(PAGE_SIZE - 1);
        let end = align_up(offset + len, PAGE_SIZE);
        unsafe { platform::commit(self.base.as_ptr().add(start), end - start) }
    }
}

impl Drop for VirtualSpace {
    fn drop(&mut self) {
        unsafe {
            platform::release(self.base.as_ptr(), self.reserved);
        }
    }
}

// SAFETY: the reservation is plain memory; synchronization of its
// contents is managed by the owning cache.
unsafe impl Send for VirtualSpace {}
unsafe impl Sync for VirtualSpace {}

// =============================================================================
// Instruction cache maintenance
// =============================================================================

/// Instruction-cache flush for freshly written code.
pub mod icache {
    /// Make code written to `[start, start + len)` visible to instruction
    /// fetch on all cores.
    ///
    /// x86 keeps instruction caches coherent with data writes; a
    /// serializing fence is enough to order the writes before the blob
    /// is published. Architectures with incoherent instruction caches
    /// need explicit line maintenance.
    #[inline]
    pub fn invalidate_range(start: *const u8, len: usize) {
        #[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
        {
            let _ = (start, len);
            std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
        }

        #[cfg(target_arch = "aarch64")]
        unsafe {
            // Clean dcache to the point of unification, invalidate icache,
            // then synchronize the instruction stream.
            const LINE: usize = 64;
            let mut addr = start as usize & !(LINE - 1);
            let end = start as usize + len;
            while addr < end {
                core::arch::asm!("dc cvau, {0}", in(reg) addr);
                addr += LINE;
            }
            core::arch::asm!("dsb ish");
            let mut addr = start as usize & !(LINE - 1);
            while addr < end {
                core::arch::asm!("ic ivau, {0}", in(reg) addr);
                addr += LINE;
            }
            core::arch::asm!("dsb ish", "isb");
        }

        #[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
        {
            let _ = (start, len);
            std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
        }
    }
}
