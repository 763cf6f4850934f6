//! Register access layer.
//!
//! Byte-wide access to memory-mapped peripheral registers plus the interrupt
//! masking primitive that makes multi-register updates atomic with respect to
//! interrupt handlers.
//!
//! # Critical sections
//!
//! [`CriticalSectionGuard`] masks interrupts for as long as it is alive and
//! restores the *prior* mask when dropped, so nested guards and early returns
//! both leave the interrupt state exactly as they found it. Register sets that
//! interrupt handlers also touch ([`UartRegisters`]) only expose mutation
//! through a [`CriticalSection`] token, which can only be obtained from a live
//! guard or from [`critical_section::with`].
//!
//! Keep every critical section to a handful of register operations: while it
//! is held, every interrupt on the core is stalled, including the rate loops.

use core::marker::PhantomData;

pub use critical_section::CriticalSection;

/// Byte-wide access to memory-mapped registers by absolute address.
///
/// Methods take `&self`: registers are shared hardware state, exclusivity is
/// expressed with [`CriticalSection`] tokens, not with `&mut`.
pub trait RegisterAccess {
    /// Read the 8-bit register at `addr`.
    fn read8(&self, addr: usize) -> u8;

    /// Write `value` to the 8-bit register at `addr`.
    fn write8(&self, addr: usize, value: u8);
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &T {
    fn read8(&self, addr: usize) -> u8 {
        (**self).read8(addr)
    }

    fn write8(&self, addr: usize, value: u8) {
        (**self).write8(addr, value);
    }
}

/// Volatile access to the physical address space.
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Create a handle onto the physical address space.
    ///
    /// # Safety
    ///
    /// Every address later passed to [`RegisterAccess`] methods must be a
    /// valid, mapped, byte-accessible peripheral register on this chip.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterAccess for Mmio {
    fn read8(&self, addr: usize) -> u8 {
        // SAFETY: `Mmio::new` contract: addr is a mapped byte register.
        unsafe { core::ptr::read_volatile(addr as *const u8) }
    }

    fn write8(&self, addr: usize, value: u8) {
        // SAFETY: `Mmio::new` contract: addr is a mapped byte register.
        unsafe { core::ptr::write_volatile(addr as *mut u8, value) }
    }
}

/// Scoped interrupt mask.
///
/// Acquiring disables interrupt preemption; dropping restores the mask that
/// was in effect at acquisition. Guards must be dropped in reverse order of
/// acquisition, which lexical scoping gives for free. Do not `mem::forget` a
/// guard.
#[must_use = "interrupts are re-enabled as soon as the guard is dropped"]
pub struct CriticalSectionGuard {
    restore: critical_section::RestoreState,
    // Restoring the mask on another core/thread would be meaningless.
    _not_send: PhantomData<*mut ()>,
}

impl CriticalSectionGuard {
    /// Mask interrupts until the returned guard is dropped.
    pub fn acquire() -> Self {
        // SAFETY: the matching `release` runs exactly once, in `Drop`, with
        // the state returned here.
        let restore = unsafe { critical_section::acquire() };
        Self {
            restore,
            _not_send: PhantomData,
        }
    }

    /// Token proving interrupts are masked for the lifetime of the borrow.
    pub fn token(&self) -> CriticalSection<'_> {
        // SAFETY: the token cannot outlive `self`, and interrupts stay masked
        // until `self` is dropped.
        unsafe { CriticalSection::new() }
    }
}

impl Drop for CriticalSectionGuard {
    fn drop(&mut self) {
        // SAFETY: `restore` came from the `acquire` in `CriticalSectionGuard::acquire`
        // and is released exactly once.
        unsafe { critical_section::release(self.restore) }
    }
}

/// Run `f` with interrupts masked.
///
/// The prior interrupt mask is restored on every exit path, including
/// unwinding on host builds.
pub fn with_critical_section<R>(f: impl FnOnce(CriticalSection<'_>) -> R) -> R {
    let guard = CriticalSectionGuard::acquire();
    f(guard.token())
}

/// Read-modify-write of one register under a critical section.
pub fn modify8<R: RegisterAccess + ?Sized>(
    regs: &R,
    _cs: CriticalSection<'_>,
    addr: usize,
    f: impl FnOnce(u8) -> u8,
) {
    let value = regs.read8(addr);
    regs.write8(addr, f(value));
}

// ── Kinetis UART ────────────────────────────────────────────────────────────

/// UART Status Register 2 offset from the instance base.
pub const UART_S2_OFFSET: usize = 0x05;
/// UART Control Register 3 offset from the instance base.
pub const UART_C3_OFFSET: usize = 0x06;
/// S2.RXINV: receive data inversion.
pub const UART_S2_RXINV: u8 = 1 << 4;
/// C3.TXINV: transmit data inversion.
pub const UART_C3_TXINV: u8 = 1 << 4;

/// Kinetis UART instance base addresses (K66 reference manual, chapter 59).
pub mod uart_base {
    /// UART0
    pub const UART0: usize = 0x4006_A000;
    /// UART1
    pub const UART1: usize = 0x4006_B000;
    /// UART2
    pub const UART2: usize = 0x4006_C000;
    /// UART3
    pub const UART3: usize = 0x4006_D000;
    /// UART4
    pub const UART4: usize = 0x400E_A000;
}

/// The S2/C3 control register pair of one Kinetis UART instance.
///
/// Interrupt handlers for the same UART read and write these registers, so
/// every accessor requires a [`CriticalSection`] token.
pub struct UartRegisters<'r, R: RegisterAccess + ?Sized> {
    regs: &'r R,
    base: usize,
}

impl<'r, R: RegisterAccess + ?Sized> UartRegisters<'r, R> {
    /// Bind the register pair of the UART instance at `base`.
    pub fn new(regs: &'r R, base: usize) -> Self {
        Self { regs, base }
    }

    /// Instance base address.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Absolute address of S2.
    pub fn s2_addr(&self) -> usize {
        self.base.wrapping_add(UART_S2_OFFSET)
    }

    /// Absolute address of C3.
    pub fn c3_addr(&self) -> usize {
        self.base.wrapping_add(UART_C3_OFFSET)
    }

    /// Current `(S2, C3)` contents.
    pub fn read(&self, _cs: CriticalSection<'_>) -> (u8, u8) {
        (self.regs.read8(self.s2_addr()), self.regs.read8(self.c3_addr()))
    }

    /// Set or clear RXINV and TXINV together, leaving every other bit as read.
    ///
    /// The RXINV/TXINV fields may be written at any time, including while the
    /// receiver and transmitter are enabled.
    pub fn set_line_inversion(&self, cs: CriticalSection<'_>, invert: bool) {
        let (mut s2, mut c3) = self.read(cs);

        if invert {
            s2 |= UART_S2_RXINV;
            c3 |= UART_C3_TXINV;
        } else {
            s2 &= !UART_S2_RXINV;
            c3 &= !UART_C3_TXINV;
        }

        self.regs.write8(self.s2_addr(), s2);
        self.regs.write8(self.c3_addr(), c3);
    }

    /// `(rx_inverted, tx_inverted)` as currently programmed.
    pub fn line_inversion(&self, cs: CriticalSection<'_>) -> (bool, bool) {
        let (s2, c3) = self.read(cs);
        (s2 & UART_S2_RXINV != 0, c3 & UART_C3_TXINV != 0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::mocks::MockRegisterFile;

    const BASE: usize = uart_base::UART1;

    #[test]
    fn set_inversion_sets_both_bits() {
        let regs = MockRegisterFile::new(BASE);
        let uart = UartRegisters::new(&regs, BASE);

        with_critical_section(|cs| uart.set_line_inversion(cs, true));

        assert_eq!(regs.peek(BASE + UART_S2_OFFSET), UART_S2_RXINV);
        assert_eq!(regs.peek(BASE + UART_C3_OFFSET), UART_C3_TXINV);
    }

    #[test]
    fn clear_inversion_preserves_other_bits() {
        let regs = MockRegisterFile::new(BASE);
        regs.poke(BASE + UART_S2_OFFSET, 0xFF);
        regs.poke(BASE + UART_C3_OFFSET, 0xA5 | UART_C3_TXINV);
        let uart = UartRegisters::new(&regs, BASE);

        with_critical_section(|cs| uart.set_line_inversion(cs, false));

        assert_eq!(regs.peek(BASE + UART_S2_OFFSET), 0xFF & !UART_S2_RXINV);
        assert_eq!(regs.peek(BASE + UART_C3_OFFSET), 0xA5 & !UART_C3_TXINV);
    }

    #[test]
    fn inversion_is_written_as_two_stores() {
        let regs = MockRegisterFile::new(BASE);
        let uart = UartRegisters::new(&regs, BASE);

        with_critical_section(|cs| uart.set_line_inversion(cs, true));

        assert_eq!(regs.write_count(), 2);
    }

    #[test]
    fn line_inversion_reports_programmed_state() {
        let regs = MockRegisterFile::new(BASE);
        let uart = UartRegisters::new(&regs, BASE);

        let state = with_critical_section(|cs| {
            uart.set_line_inversion(cs, true);
            uart.line_inversion(cs)
        });
        assert_eq!(state, (true, true));
    }

    #[test]
    fn nested_guards_release_in_order() {
        let outer = CriticalSectionGuard::acquire();
        {
            let inner = CriticalSectionGuard::acquire();
            let _ = inner.token();
        }
        let _ = outer.token();
        drop(outer);
        // A fresh section is still obtainable once both are released.
        let value = with_critical_section(|_| 7);
        assert_eq!(value, 7);
    }

    #[test]
    fn modify8_applies_closure() {
        let regs = MockRegisterFile::new(BASE);
        regs.poke(BASE, 0b0000_0011);
        with_critical_section(|cs| modify8(&regs, cs, BASE, |v| v | 0b1000_0000));
        assert_eq!(regs.peek(BASE), 0b1000_0011);
    }
}
