//! Implementation of Linux specific calls.

use core::{ptr, slice};

use segmalloc_core::Segment;

/// A segment over an `mmap`-reserved arena.
///
/// The whole capacity is reserved up front with a single anonymous mapping, so the arena never
/// relocates; growth merely advances the top offset within the reservation, mirroring a `sbrk`
/// style break pointer. Pages are committed lazily by the kernel on first touch.
pub struct MmapSegment {
    base: ptr::NonNull<u8>,
    capacity: usize,
    top: usize,
}

impl MmapSegment {
    /// Reserves `capacity` bytes, rounded up to the page size.
    ///
    /// Returns None if the reservation fails.
    #[cold]
    pub fn new(capacity: usize) -> Option<MmapSegment> {
        const PAGE_SIZE: usize = 4096;

        let capacity = capacity.checked_add(PAGE_SIZE - 1)? & !(PAGE_SIZE - 1);

        let base = mmap_reserve(capacity)?;

        Some(MmapSegment { base, capacity, top: 0 })
    }

    /// Returns the number of bytes reserved.
    pub fn capacity(&self) -> usize { self.capacity }
}

impl Segment for MmapSegment {
    fn grow(&mut self, extra: usize) -> Option<usize> {
        let top = self.top.checked_add(extra)?;

        if top > self.capacity {
            return None;
        }

        let previous = self.top;
        self.top = top;

        Some(previous)
    }

    fn bytes(&self) -> &[u8] {
        //  Safety:
        //  -   `base` points to a live mapping of `capacity >= top` readable bytes.
        //  -   `self` is borrowed for the lifetime of the slice.
        unsafe { slice::from_raw_parts(self.base.as_ptr(), self.top) }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        //  Safety:
        //  -   `base` points to a live mapping of `capacity >= top` writable bytes.
        //  -   `self` is borrowed mutably for the lifetime of the slice.
        unsafe { slice::from_raw_parts_mut(self.base.as_ptr(), self.top) }
    }
}

impl Drop for MmapSegment {
    fn drop(&mut self) {
        //  Safety:
        //  -   `base` was returned by `mmap_reserve` with `capacity` as argument.
        //  -   The mapping is no longer referenced past this point.
        unsafe { munmap_release(self.base.as_ptr(), self.capacity) };
    }
}

//  Wrapper around `mmap`.
//
//  Reserves `size` bytes of zeroed anonymous memory; NORESERVE keeps untouched pages free.
fn mmap_reserve(size: usize) -> Option<ptr::NonNull<u8>> {
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;

    //  No specific address hint.
    let addr = ptr::null_mut();
    //  When used in conjunction with MAP_ANONYMOUS, fd is mandated to be -1 on some implementations.
    let fd = -1;
    //  When used in conjunction with MAP_ANONYMOUS, offset is mandated to be 0 on some implementations.
    let offset = 0;

    //  Safety:
    //  -   `addr`, `fd`, and `offset` are suitable for MAP_ANONYMOUS.
    let result = unsafe { libc::mmap(addr, size, prot, flags, fd, offset) };

    let result = if result != libc::MAP_FAILED { result as *mut u8 } else { ptr::null_mut() };
    ptr::NonNull::new(result)
}

//  Wrapper around `munmap`.
//
//  #   Panics
//
//  If `munmap` returns a non-0 result.
//
//  #   Safety
//
//  -   Assumes that `addr` points to a `mmap`ed area of at least `size` bytes.
//  -   Assumes that the range `[addr, addr + size)` is no longer in use.
unsafe fn munmap_release(addr: *mut u8, size: usize) {
    let result = libc::munmap(addr as *mut libc::c_void, size);
    assert!(result == 0, "Could not munmap {:x}, {}: {}", addr as usize, size, result);
}
