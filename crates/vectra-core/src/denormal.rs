//! Scoped flush-to-zero for the compute loop.
//!
//! Feedback and IIR processors decaying toward zero produce subnormal floats,
//! which are many times slower on most FPUs. [`DenormalGuard`] switches the
//! current thread's floating-point unit to flush subnormals to zero and
//! restores the caller's setting when dropped, so the change never leaks
//! outside the scheduler's vector loop.
//!
//! - x86_64: MXCSR flush-to-zero (bit 15) and denormals-are-zero (bit 6).
//! - aarch64: FPCR flush-to-zero (bit 24).
//! - Elsewhere the guard is a no-op.

/// Restores the previous floating-point mode when dropped.
#[must_use = "flush-to-zero is only active while the guard is alive"]
pub struct DenormalGuard {
    previous: u64,
}

impl DenormalGuard {
    /// Enables flush-to-zero on the current thread.
    pub fn new() -> Self {
        let previous = imp::read();
        imp::write(previous | imp::FLUSH_BITS);
        Self { previous }
    }
}

impl Default for DenormalGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DenormalGuard {
    fn drop(&mut self) {
        imp::write(self.previous);
    }
}

/// Returns true if subnormals are currently flushed on this thread.
/// Always false on targets without support.
pub fn flush_to_zero_active() -> bool {
    imp::FLUSH_BITS != 0 && imp::read() & imp::FLUSH_BITS == imp::FLUSH_BITS
}

#[cfg(target_arch = "x86_64")]
#[allow(unsafe_code)]
mod imp {
    use core::arch::asm;

    /// FTZ | DAZ.
    pub const FLUSH_BITS: u64 = 0x8040;

    pub fn read() -> u64 {
        let mut csr: u32 = 0;
        // SAFETY: stmxcsr stores the 32-bit MXCSR into the pointed-to local.
        unsafe {
            asm!(
                "stmxcsr dword ptr [{}]",
                in(reg) core::ptr::addr_of_mut!(csr),
                options(nostack, preserves_flags)
            );
        }
        u64::from(csr)
    }

    pub fn write(value: u64) {
        let csr = value as u32;
        // SAFETY: ldmxcsr loads a value previously read from MXCSR with only
        // the FTZ and DAZ bits changed, both valid on every x86_64 CPU.
        unsafe {
            asm!(
                "ldmxcsr dword ptr [{}]",
                in(reg) core::ptr::addr_of!(csr),
                options(nostack, readonly, preserves_flags)
            );
        }
    }
}

#[cfg(target_arch = "aarch64")]
#[allow(unsafe_code)]
mod imp {
    use core::arch::asm;

    /// FPCR.FZ.
    pub const FLUSH_BITS: u64 = 1 << 24;

    pub fn read() -> u64 {
        let fpcr: u64;
        // SAFETY: reading FPCR has no side effects.
        unsafe {
            asm!("mrs {}, fpcr", out(reg) fpcr, options(nomem, nostack, preserves_flags));
        }
        fpcr
    }

    pub fn write(value: u64) {
        // SAFETY: writes back a value read from FPCR with only FZ changed.
        unsafe {
            asm!("msr fpcr, {}", in(reg) value, options(nomem, nostack, preserves_flags));
        }
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod imp {
    pub const FLUSH_BITS: u64 = 0;

    pub fn read() -> u64 {
        0
    }

    pub fn write(_value: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_previous_mode() {
        let before = imp::read();
        {
            let _guard = DenormalGuard::new();
            if imp::FLUSH_BITS != 0 {
                assert!(flush_to_zero_active());
            }
        }
        assert_eq!(imp::read(), before);
    }

    #[test]
    fn nested_guards_unwind_in_order() {
        let before = imp::read();
        {
            let _outer = DenormalGuard::new();
            {
                let _inner = DenormalGuard::new();
            }
            if imp::FLUSH_BITS != 0 {
                assert!(flush_to_zero_active());
            }
        }
        assert_eq!(imp::read(), before);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn subnormal_products_flush() {
        let _guard = DenormalGuard::new();
        let tiny = std::hint::black_box(1e-30f32) * std::hint::black_box(1e-10f32);
        assert_eq!(tiny, 0.0);
    }
}
