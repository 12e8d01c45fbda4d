//! Interrupt Controller (INTC) model for F1C100S
//!
//! F1C100S INTC handles 64 interrupt sources. Only the GPIO port sources are
//! routed by this crate:
//! - 38: PIOD (GPIO Port D external interrupt)
//! - 39: PIOE (GPIO Port E external interrupt)
//! - 40: PIOF (GPIO Port F external interrupt)
//!
//! Handlers always run inside a critical section. Anything that takes the
//! same critical section (for example [`Exti`](crate::exti::Exti)
//! unregistration) therefore waits for an in-flight handler to return.

use core::cell::RefCell;
use core::fmt;

use critical_section::CriticalSection;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use portable_atomic::{AtomicU32, AtomicU64, Ordering};

/// Total number of IRQ sources
pub const IRQ_COUNT: usize = 64;

/// Interrupt sources routed through this controller
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Interrupt {
    PIOD = 38,
    PIOE = 39,
    PIOF = 40,
}

impl Interrupt {
    /// Get the IRQ number
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(irq: u8) -> Option<Self> {
        match irq {
            38 => Some(Interrupt::PIOD),
            39 => Some(Interrupt::PIOE),
            40 => Some(Interrupt::PIOF),
            _ => None,
        }
    }

    #[inline]
    fn bit(self) -> u64 {
        1u64 << self.number()
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} (irq {})", self, self.number())
    }
}

/// Outcome of a handler invocation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqReturn {
    /// The interrupt was not for this handler.
    None,
    /// The interrupt was fully serviced.
    Handled,
}

/// Port-level interrupt handler.
pub trait IrqHandler: Sync {
    /// Called with the controller's critical section held.
    ///
    /// Must not block.
    fn on_interrupt(&self, irq: Interrupt, cs: CriticalSection<'_>) -> IrqReturn;
}

/// Interrupt controller with a dispatch table.
pub struct Intc {
    enabled: AtomicU64,
    pending: AtomicU64,
    spurious: AtomicU32,
    table: Mutex<CriticalSectionRawMutex, RefCell<[Option<&'static dyn IrqHandler>; IRQ_COUNT]>>,
}

impl Intc {
    /// Controller with everything disabled, nothing pending and an empty table.
    pub const fn new() -> Self {
        Self {
            enabled: AtomicU64::new(0),
            pending: AtomicU64::new(0),
            spurious: AtomicU32::new(0),
            table: Mutex::new(RefCell::new([None; IRQ_COUNT])),
        }
    }

    /// Register an IRQ handler for the given IRQ.
    pub fn set_irq_handler(&self, irq: Interrupt, handler: &'static dyn IrqHandler) {
        critical_section::with(|cs| {
            self.table.borrow(cs).borrow_mut()[irq.number() as usize] = Some(handler);
        });
    }

    /// Remove the handler for the given IRQ.
    pub fn clear_irq_handler(&self, irq: Interrupt) {
        critical_section::with(|cs| {
            self.table.borrow(cs).borrow_mut()[irq.number() as usize] = None;
        });
    }

    /// Enable an IRQ source.
    pub fn enable_irq(&self, irq: Interrupt) {
        self.enabled.fetch_or(irq.bit(), Ordering::AcqRel);
    }

    /// Disable an IRQ source.
    pub fn disable_irq(&self, irq: Interrupt) {
        self.enabled.fetch_and(!irq.bit(), Ordering::AcqRel);
    }

    /// Check if an IRQ is enabled.
    pub fn is_irq_enabled(&self, irq: Interrupt) -> bool {
        self.enabled.load(Ordering::Acquire) & irq.bit() != 0
    }

    /// Mark an IRQ pending without servicing it.
    pub fn pend(&self, irq: Interrupt) {
        self.pending.fetch_or(irq.bit(), Ordering::AcqRel);
    }

    /// Clear pending for an IRQ.
    pub fn clear_pending(&self, irq: Interrupt) {
        self.pending.fetch_and(!irq.bit(), Ordering::AcqRel);
    }

    pub fn is_pending(&self, irq: Interrupt) -> bool {
        self.pending.load(Ordering::Acquire) & irq.bit() != 0
    }

    /// Assert an IRQ line: pend it and take it right away if it is enabled.
    pub fn raise(&self, irq: Interrupt) {
        self.pend(irq);
        self.service();
    }

    /// Dispatch every pending, enabled IRQ, lowest number first.
    ///
    /// Returns the number of dispatches performed.
    pub fn service(&self) -> usize {
        critical_section::with(|cs| {
            let mut serviced = 0;
            loop {
                let active = self.pending.load(Ordering::Acquire) & self.enabled.load(Ordering::Acquire);
                if active == 0 {
                    break;
                }
                let irq = active.trailing_zeros() as u8;
                self.pending.fetch_and(!(1u64 << irq), Ordering::AcqRel);
                self.dispatch(irq, cs);
                serviced += 1;
            }
            serviced
        })
    }

    /// Dispatches that no handler claimed.
    pub fn spurious_count(&self) -> u32 {
        self.spurious.load(Ordering::Relaxed)
    }

    /// Dispatch the IRQ to the registered handler.
    fn dispatch(&self, irq: u8, cs: CriticalSection<'_>) {
        let handler = self.table.borrow(cs).borrow()[irq as usize];
        let ret = match (handler, Interrupt::from_number(irq)) {
            (Some(h), Some(source)) => h.on_interrupt(source, cs),
            _ => IrqReturn::None,
        };
        if ret == IrqReturn::None {
            self.spurious.fetch_add(1, Ordering::Relaxed);
            debug!("irq {} not handled", irq);
        }
    }
}

impl Default for Intc {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(AtomicU32);

    impl IrqHandler for Counter {
        fn on_interrupt(&self, _irq: Interrupt, _cs: CriticalSection<'_>) -> IrqReturn {
            self.0.fetch_add(1, Ordering::SeqCst);
            IrqReturn::Handled
        }
    }

    fn leak<T>(value: T) -> &'static T {
        Box::leak(Box::new(value))
    }

    #[test]
    fn raise_dispatches_enabled_irq() {
        let intc = leak(Intc::new());
        let counter = leak(Counter(AtomicU32::new(0)));
        intc.set_irq_handler(Interrupt::PIOE, counter);
        intc.enable_irq(Interrupt::PIOE);

        intc.raise(Interrupt::PIOE);
        intc.raise(Interrupt::PIOE);

        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
        assert!(!intc.is_pending(Interrupt::PIOE));
        assert_eq!(intc.spurious_count(), 0);
    }

    #[test]
    fn disabled_irq_stays_pending_until_enabled() {
        let intc = leak(Intc::new());
        let counter = leak(Counter(AtomicU32::new(0)));
        intc.set_irq_handler(Interrupt::PIOD, counter);

        intc.raise(Interrupt::PIOD);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
        assert!(intc.is_pending(Interrupt::PIOD));

        intc.enable_irq(Interrupt::PIOD);
        assert_eq!(intc.service(), 1);
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_handler_counts_as_spurious() {
        let intc = leak(Intc::new());
        intc.enable_irq(Interrupt::PIOF);
        intc.raise(Interrupt::PIOF);
        assert_eq!(intc.spurious_count(), 1);

        let counter = leak(Counter(AtomicU32::new(0)));
        intc.set_irq_handler(Interrupt::PIOF, counter);
        intc.clear_irq_handler(Interrupt::PIOF);
        intc.raise(Interrupt::PIOF);
        assert_eq!(intc.spurious_count(), 2);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn irq_numbers_match_port_sources() {
        assert_eq!(Interrupt::PIOD.number(), 38);
        assert_eq!(Interrupt::from_number(39), Some(Interrupt::PIOE));
        assert_eq!(Interrupt::from_number(13), None);
    }
}
