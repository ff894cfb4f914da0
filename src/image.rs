//! Read-only view of the trampoline image.

use core::ffi::c_void;

use crate::arch::SyscallConvention;
use crate::trampoline;

/// Upper bound on a plausible image length. Anything longer means a
/// compiler prologue or unrelated code ended up between the markers.
pub const MAX_IMAGE_LEN: usize = 64;

/// Error types for image validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The marker distance is outside the plausible range.
    MisplacedMarker {
        /// Length computed from the markers.
        len: usize,
    },
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MisplacedMarker { len } => write!(
                f,
                "Trampoline markers misplaced: image length {} outside ({}, {}]",
                len,
                SyscallConvention::HOST.invocation_len(),
                MAX_IMAGE_LEN
            ),
        }
    }
}

impl core::error::Error for Error {}

/// The image compiled into this binary: where it starts and how long it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrampolineImage {
    entry: usize,
    len: usize,
}

impl TrampolineImage {
    /// Read the markers.
    pub fn get() -> Self {
        Self {
            entry: trampoline::entry_addr(),
            len: trampoline::trampoline_size(),
        }
    }

    /// Read the markers and reject an implausible length.
    pub fn checked() -> Result<Self, Error> {
        let image = Self::get();
        image.validate()?;
        Ok(image)
    }

    /// Check that the image holds more than one syscall invocation and
    /// stays below [`MAX_IMAGE_LEN`].
    pub fn validate(&self) -> Result<(), Error> {
        let min = SyscallConvention::HOST.invocation_len();
        if self.len <= min || self.len > MAX_IMAGE_LEN {
            return Err(Error::MisplacedMarker { len: self.len });
        }
        Ok(())
    }

    /// Entry address in this process.
    pub fn entry(&self) -> *const c_void {
        self.entry as *const c_void
    }

    /// Byte length between the entry and size markers.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the markers coincide.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bytes to copy into the target.
    ///
    /// Fails instead of reading past the image when the markers are
    /// misplaced.
    pub fn bytes(&self) -> Result<&'static [u8], Error> {
        self.validate()?;
        // SAFETY: a validated length lies between the two markers of the
        // `.text.trampy` block, which is mapped readable and immutable for
        // the lifetime of the process.
        Ok(unsafe { core::slice::from_raw_parts(self.entry as *const u8, self.len) })
    }
}
