//! A growable byte buffer whose data pointer keeps a caller-chosen alignment.

use std::{
    alloc::{self, Layout},
    cmp, mem,
    mem::ManuallyDrop,
    ops::{Deref, DerefMut},
    ptr,
};

/// A valid pointer address alignment, guaranteed to be non-zero
/// and a power of two.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Alignment(usize);

/// A growable byte buffer backed by memory allocated with a
/// caller-chosen alignment, so that the bytes can be reinterpreted
/// as a slice of values with that alignment.
///
/// # Warning
/// The data address is only guaranteed to be aligned when the
/// capacity is non-zero.
#[derive(Debug)]
pub struct AlignedByteVec {
    layout: Layout,
    // The inner `Vec` must never be dropped or allowed to (re)allocate:
    // its memory is managed manually here with `self.layout`, while the
    // `Vec` itself believes it was allocated with align_of::<u8>() = 1.
    // Letting it free or grow that memory would be undefined behavior.
    bytes: ManuallyDrop<Vec<u8>>,
}

impl Alignment {
    /// Wraps the given value in an [`Alignment`].
    ///
    /// # Panics
    /// If `alignment` is zero or not a power of two.
    pub fn new(alignment: usize) -> Self {
        if alignment == 0 || (alignment & (alignment - 1)) != 0 {
            panic!("`Alignment` created with invalid alignment: {}", alignment)
        } else {
            Self(alignment)
        }
    }

    /// The [`Alignment`] of the type `T`.
    pub fn of<T>() -> Self {
        Self(mem::align_of::<T>())
    }

    fn of_layout(layout: Layout) -> Self {
        Self(layout.align())
    }
}

impl From<Alignment> for usize {
    fn from(alignment: Alignment) -> Self {
        alignment.0
    }
}

impl AlignedByteVec {
    /// Constructs a new, empty [`AlignedByteVec`] with the given
    /// alignment.
    ///
    /// The buffer does not allocate until bytes are appended.
    pub fn new(alignment: Alignment) -> Self {
        Self {
            // SAFETY:
            // - `Alignment` is guaranteed to hold a valid alignment.
            // - The passed size of zero never overflows `isize`.
            layout: unsafe { Layout::from_size_align_unchecked(0, alignment.into()) },
            bytes: ManuallyDrop::new(Vec::new()),
        }
    }

    /// Returns the alignment of the memory block holding the data.
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }

    /// Returns the number of bytes the buffer can hold without
    /// reallocating.
    pub fn capacity(&self) -> usize {
        self.layout.size()
    }

    /// Returns the number of bytes in the buffer.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Extracts a slice containing the entire buffer.
    pub fn as_slice(&self) -> &[u8] {
        self
    }

    /// Extracts a mutable slice of the entire buffer.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self
    }

    /// Appends all the bytes in the given slice.
    ///
    /// # Panics
    /// If the new capacity exceeds `isize::MAX`.
    pub fn extend_from_slice(&mut self, other: &[u8]) {
        let old_len = self.bytes.len();
        let added_len = other.len();
        let new_len = old_len.checked_add(added_len).unwrap();

        self.reserve(added_len);

        unsafe {
            // SAFETY:
            // The memory blocks are guaranteed to be nonoverlapping since
            // `self.bytes` is borrowed mutably (so `other` cannot alias it)
            ptr::copy_nonoverlapping(
                other.as_ptr(),
                self.bytes.as_mut_ptr().offset(old_len.try_into().unwrap()),
                added_len,
            );

            // Force new length for the vector to encompass new data
            self.bytes.set_len(new_len);
        }
    }

    /// Shortens the buffer to the given number of bytes. Has no
    /// effect if `new_len` is not smaller than the current length.
    pub fn truncate(&mut self, new_len: usize) {
        if new_len < self.bytes.len() {
            // Shrinking the length never touches the allocation, so
            // this is one of the few `Vec` operations that is safe to
            // forward (the elements are plain bytes with no drop glue)
            unsafe {
                self.bytes.set_len(new_len);
            }
        }
    }

    fn reserve(&mut self, n_additional: usize) {
        let old_len = self.bytes.len();
        let old_layout = self.layout;
        let alignment = Alignment::of_layout(old_layout);
        let old_capacity = old_layout.size();

        let required_capacity = old_len
            .checked_add(n_additional)
            .expect("Capacity overflow");

        if required_capacity > old_capacity {
            // Grow to the required capacity or twice the current
            // capacity, whichever is largest
            let new_minimum_capacity = cmp::max(
                required_capacity,
                old_capacity.checked_mul(2).expect("Capacity overflow"),
            );

            let new_layout = Self::create_layout_for_allocation(alignment, new_minimum_capacity);
            let new_ptr = unsafe { Self::allocate_with_layout(new_layout) };

            // Migrate any existing data into the new block and release
            // the old one
            if old_capacity != 0 {
                let old_ptr = self.bytes.as_mut_ptr();
                unsafe {
                    // Only the first `old_len` bytes hold accessible data
                    ptr::copy_nonoverlapping(old_ptr, new_ptr, old_len);
                    alloc::dealloc(old_ptr, old_layout);
                }
            }

            let new_bytes = unsafe { Vec::from_raw_parts(new_ptr, old_len, new_layout.size()) };

            self.layout = new_layout;
            self.bytes = ManuallyDrop::new(new_bytes);
        }
    }

    fn create_layout_for_allocation(alignment: Alignment, minimum_size: usize) -> Layout {
        // Calling `alloc` with zero size is undefined behavior
        assert_ne!(minimum_size, 0);

        let alignment: usize = alignment.into();

        // Round the size up to the nearest multiple of the alignment
        // (valid because `Alignment` is always a power of two)
        let size = (minimum_size + alignment - 1) & !(alignment - 1);

        if usize::BITS < 64 && size > isize::MAX as usize {
            panic!("Allocation size exceeds `isize::MAX`")
        }

        // SAFETY:
        // - `Alignment` is guaranteed to hold a valid alignment.
        // - We just checked that `size` doesn't overflow `isize`.
        unsafe { Layout::from_size_align_unchecked(size, alignment) }
    }

    unsafe fn allocate_with_layout(layout: Layout) -> *mut u8 {
        let ptr = unsafe { alloc::alloc(layout) };

        if ptr.is_null() {
            // Abort if the allocation failed
            alloc::handle_alloc_error(layout);
        } else {
            ptr
        }
    }
}

impl Drop for AlignedByteVec {
    fn drop(&mut self) {
        // Any allocated memory must be deallocated manually with the
        // correct alignment
        if self.layout.size() != 0 {
            unsafe {
                alloc::dealloc(self.bytes.as_mut_ptr(), self.layout);
            }
        }
        // `self.bytes` holds no heap memory at this point, and will just
        // be popped off the stack
    }
}

impl Deref for AlignedByteVec {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.bytes
    }
}

impl DerefMut for AlignedByteVec {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.bytes
    }
}
