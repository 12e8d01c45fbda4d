//! External Interrupt (EINT) routing for F1C100S GPIO
//!
//! F1C100S supports external interrupts on ports PD, PE, and PF.
//! Each port has its own EINT registers:
//! - EINT_CFGx: Configure interrupt trigger type (4 bits per pin)
//! - EINT_CTL: Enable/disable per-pin interrupt
//! - EINT_STA: Pending status (write 1 to clear)
//!
//! Interrupt trigger types:
//! - 0: Positive edge
//! - 1: Negative edge
//! - 2: High level
//! - 3: Low level
//! - 4: Double edge (both rising and falling)
//!
//! GPIO EINT IRQ numbers in INTC:
//! - IRQ 38: PIOD
//! - IRQ 39: PIOE
//! - IRQ 40: PIOF
//!
//! [`Exti`] owns the three port IRQs and fans each one out to per-line
//! [`EdgeHandler`]s. A handler stays installed for as long as its
//! [`InterruptBinding`] lives.

use core::cell::RefCell;
use core::fmt;

use critical_section::CriticalSection;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::error::Error;
use crate::gpio::{Input, PinMode};
use crate::intc::{Interrupt, IrqHandler, IrqReturn};
use crate::pio::{LineId, Pio, Port};

/// EINT trigger type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum EintTrigger {
    PositiveEdge = 0,
    NegativeEdge = 1,
    HighLevel = 2,
    LowLevel = 3,
    DoubleEdge = 4,
}

impl EintTrigger {
    pub(crate) fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(EintTrigger::PositiveEdge),
            1 => Some(EintTrigger::NegativeEdge),
            2 => Some(EintTrigger::HighLevel),
            3 => Some(EintTrigger::LowLevel),
            4 => Some(EintTrigger::DoubleEdge),
            _ => None,
        }
    }
}

/// Port index for EINT-capable ports
/// Only PD(3), PE(4), PF(5) support EINT
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EintPort {
    PD = 3,
    PE = 4,
    PF = 5,
}

impl EintPort {
    pub fn from_port_num(port: u8) -> Option<Self> {
        match port {
            3 => Some(EintPort::PD),
            4 => Some(EintPort::PE),
            5 => Some(EintPort::PF),
            _ => None,
        }
    }

    fn from_irq(irq: Interrupt) -> Self {
        match irq {
            Interrupt::PIOD => EintPort::PD,
            Interrupt::PIOE => EintPort::PE,
            Interrupt::PIOF => EintPort::PF,
        }
    }

    /// INTC source this port raises.
    pub fn irq(self) -> Interrupt {
        match self {
            EintPort::PD => Interrupt::PIOD,
            EintPort::PE => Interrupt::PIOE,
            EintPort::PF => Interrupt::PIOF,
        }
    }

    pub fn port(self) -> Port {
        match self {
            EintPort::PD => Port::D,
            EintPort::PE => Port::E,
            EintPort::PF => Port::F,
        }
    }

    #[inline]
    fn index(self) -> usize {
        self as usize - EintPort::PD as usize
    }
}

/// Interrupt source a line resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterruptHandle {
    line: LineId,
    port: EintPort,
}

impl InterruptHandle {
    pub fn line(&self) -> LineId {
        self.line
    }

    pub fn port(&self) -> EintPort {
        self.port
    }

    pub fn irq(&self) -> Interrupt {
        self.port.irq()
    }
}

impl fmt::Display for InterruptHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.line, self.irq())
    }
}

/// Per-line edge callback.
pub trait EdgeHandler: Sync {
    /// Runs in interrupt context with the dispatcher's critical section held.
    ///
    /// Must not block.
    fn on_edge(&self, line: LineId, cs: CriticalSection<'_>) -> IrqReturn;
}

#[derive(Clone, Copy)]
struct Slot {
    handler: &'static dyn EdgeHandler,
    label: &'static str,
}

type Slots = [[Option<Slot>; 32]; 3];

/// EINT router for ports PD, PE and PF.
pub struct Exti {
    pio: &'static Pio,
    slots: Mutex<CriticalSectionRawMutex, RefCell<Slots>>,
}

impl Exti {
    pub const fn new(pio: &'static Pio) -> Self {
        Self {
            pio,
            slots: Mutex::new(RefCell::new([[None; 32]; 3])),
        }
    }

    /// Register the port IRQ handlers and enable the GPIO IRQs in INTC.
    ///
    /// Call once, before any line is registered.
    pub fn init(&'static self) {
        let intc = self.pio.intc();
        for port in [EintPort::PD, EintPort::PE, EintPort::PF] {
            intc.set_irq_handler(port.irq(), self);
            intc.enable_irq(port.irq());
        }
    }

    /// Map an input line to its interrupt source.
    pub fn resolve(&self, input: &Input<'_>) -> Result<InterruptHandle, Error> {
        if !core::ptr::eq(input.pio(), self.pio) {
            return Err(Error::InvalidState);
        }
        let line = input.id();
        let port = EintPort::from_port_num(line.port_num()).ok_or(Error::NoInterruptCapability)?;
        Ok(InterruptHandle { line, port })
    }

    /// Install `handler` for `handle` and arm the pin with `trigger`.
    ///
    /// Fails with [`Error::RegistrationConflict`] if the line already has a
    /// handler, and with [`Error::InvalidState`] if the line is no longer an
    /// acquired input.
    pub fn register<'d>(
        &'d self,
        handle: InterruptHandle,
        trigger: EintTrigger,
        handler: &'static dyn EdgeHandler,
        label: &'static str,
    ) -> Result<InterruptBinding<'d>, Error> {
        let line = handle.line;
        critical_section::with(|cs| {
            let mut slots = self.slots.borrow(cs).borrow_mut();
            let slot = &mut slots[handle.port.index()][line.pin() as usize];
            if slot.is_some() {
                return Err(Error::RegistrationConflict);
            }
            if self.pio.owner(line).is_none() || self.pio.mode(line) != PinMode::Input {
                return Err(Error::InvalidState);
            }
            *slot = Some(Slot { handler, label });

            self.pio.set_eint_trigger(line, trigger);
            self.pio.clear_eint_status(handle.port.port(), 1 << line.pin());
            self.pio.set_mode(line, PinMode::Eint);
            self.pio.set_eint_enabled(line, true);
            Ok(())
        })?;
        debug!("{}: {} armed on {:?}", line, label, trigger);
        Ok(InterruptBinding { exti: self, handle })
    }

    /// Label of the handler bound to `line`, if any.
    pub fn binding_label(&self, line: LineId) -> Option<&'static str> {
        let port = EintPort::from_port_num(line.port_num())?;
        critical_section::with(|cs| {
            self.slots.borrow(cs).borrow()[port.index()][line.pin() as usize].map(|slot| slot.label)
        })
    }

    fn unbind(&self, handle: InterruptHandle) {
        let line = handle.line;
        critical_section::with(|cs| {
            self.slots.borrow(cs).borrow_mut()[handle.port.index()][line.pin() as usize] = None;
            self.pio.set_eint_enabled(line, false);
            self.pio.clear_eint_status(handle.port.port(), 1 << line.pin());
            // Give the pin back as a plain input if its owner still holds it.
            if self.pio.owner(line).is_some() && self.pio.mode(line) == PinMode::Eint {
                self.pio.set_mode(line, PinMode::Input);
            }
        });
        debug!("{}: interrupt unbound", line);
    }
}

impl IrqHandler for Exti {
    fn on_interrupt(&self, irq: Interrupt, cs: CriticalSection<'_>) -> IrqReturn {
        let port = EintPort::from_irq(irq);
        let status = self.pio.eint_status(port.port()) & self.pio.eint_ctl(port.port());
        self.pio.clear_eint_status(port.port(), status);

        let mut ret = IrqReturn::None;
        for pin in BitIter(status) {
            let line = LineId::new(port.port(), pin as u8);
            let slot = self.slots.borrow(cs).borrow()[port.index()][pin as usize];
            match slot {
                Some(slot) => {
                    if slot.handler.on_edge(line, cs) == IrqReturn::Handled {
                        ret = IrqReturn::Handled;
                    }
                }
                None => {
                    // Nobody listens; stop the pin from firing again.
                    self.pio.set_eint_enabled(line, false);
                    debug!("{}: edge without handler, disarmed", line);
                }
            }
        }
        ret
    }
}

struct BitIter(u32);

impl Iterator for BitIter {
    type Item = u32;

    fn next(&mut self) -> Option<Self::Item> {
        match self.0.trailing_zeros() {
            32 => None,
            b => {
                self.0 &= !(1 << b);
                Some(b)
            }
        }
    }
}

/// Installed edge handler.
///
/// Dropping the binding unregisters it. Unregistration takes the
/// dispatcher's critical section, so it returns only after an in-flight
/// callback has finished, and no callback runs afterwards.
#[must_use = "dropping the binding unregisters the handler"]
pub struct InterruptBinding<'d> {
    exti: &'d Exti,
    handle: InterruptHandle,
}

impl<'d> InterruptBinding<'d> {
    pub fn handle(&self) -> InterruptHandle {
        self.handle
    }

    pub fn unregister(self) {
        // Drop does the work.
    }
}

impl<'d> Drop for InterruptBinding<'d> {
    fn drop(&mut self) {
        self.exti.unbind(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use portable_atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::gpio::{Level, Pull};
    use crate::intc::Intc;

    struct Recorder {
        hits: AtomicU32,
        last: AtomicU32,
    }

    impl Recorder {
        const fn new() -> Self {
            Self {
                hits: AtomicU32::new(0),
                last: AtomicU32::new(u32::MAX),
            }
        }

        fn hits(&self) -> u32 {
            self.hits.load(Ordering::SeqCst)
        }
    }

    impl EdgeHandler for Recorder {
        fn on_edge(&self, line: LineId, _cs: CriticalSection<'_>) -> IrqReturn {
            self.hits.fetch_add(1, Ordering::SeqCst);
            self.last.store(line.index() as u32, Ordering::SeqCst);
            IrqReturn::Handled
        }
    }

    fn leak<T>(value: T) -> &'static T {
        Box::leak(Box::new(value))
    }

    fn board() -> (&'static Pio, &'static Exti) {
        let intc = leak(Intc::new());
        let pio = leak(Pio::new(intc));
        let exti = leak(Exti::new(pio));
        exti.init();
        (pio, exti)
    }

    const BUTTON: LineId = LineId::new(Port::E, 3);

    #[test]
    fn resolve_maps_port_to_irq() {
        let (pio, exti) = board();
        let button = Input::new(pio, BUTTON, "test", Pull::None).unwrap();
        let handle = exti.resolve(&button).unwrap();
        assert_eq!(handle.irq(), Interrupt::PIOE);
        assert_eq!(handle.irq().number(), 39);
        assert_eq!(format!("{}", handle), "PE3 -> PIOE (irq 39)");

        let pa = Input::new(pio, LineId::new(Port::A, 1), "test", Pull::None).unwrap();
        assert_eq!(exti.resolve(&pa), Err(Error::NoInterruptCapability));
    }

    #[test]
    fn rising_edge_reaches_handler() {
        let (pio, exti) = board();
        let rec = leak(Recorder::new());
        let button = Input::new(pio, BUTTON, "test", Pull::None).unwrap();
        let binding = exti
            .register(exti.resolve(&button).unwrap(), EintTrigger::PositiveEdge, rec, "rec")
            .unwrap();
        assert_eq!(pio.mode(BUTTON), PinMode::Eint);
        assert_eq!(exti.binding_label(BUTTON), Some("rec"));

        pio.drive_input(BUTTON, Level::High);
        assert_eq!(rec.hits(), 1);
        assert_eq!(rec.last.load(Ordering::SeqCst), BUTTON.index() as u32);

        // Release edge is not a trigger.
        pio.drive_input(BUTTON, Level::Low);
        assert_eq!(rec.hits(), 1);
        assert!(button.is_low());

        binding.unregister();
        assert_eq!(exti.binding_label(BUTTON), None);
        assert_eq!(pio.mode(BUTTON), PinMode::Input);
        assert!(!pio.is_eint_enabled(BUTTON));

        pio.drive_input(BUTTON, Level::High);
        assert_eq!(rec.hits(), 1);
    }

    #[test]
    fn second_registration_conflicts() {
        let (pio, exti) = board();
        let first = leak(Recorder::new());
        let second = leak(Recorder::new());
        let button = Input::new(pio, BUTTON, "test", Pull::None).unwrap();
        let handle = exti.resolve(&button).unwrap();

        let _binding = exti.register(handle, EintTrigger::PositiveEdge, first, "first").unwrap();
        assert_eq!(
            exti.register(handle, EintTrigger::PositiveEdge, second, "second").err(),
            Some(Error::RegistrationConflict)
        );
        assert_eq!(exti.binding_label(BUTTON), Some("first"));

        pio.drive_input(BUTTON, Level::High);
        assert_eq!(first.hits(), 1);
        assert_eq!(second.hits(), 0);
    }

    #[test]
    fn register_requires_owned_input() {
        let (pio, exti) = board();
        let rec = leak(Recorder::new());
        let button = Input::new(pio, BUTTON, "test", Pull::None).unwrap();
        let handle = exti.resolve(&button).unwrap();
        button.release().unwrap();

        assert_eq!(
            exti.register(handle, EintTrigger::PositiveEdge, rec, "rec").err(),
            Some(Error::InvalidState)
        );
        assert_eq!(exti.binding_label(BUTTON), None);
    }

    #[test]
    fn dropping_binding_unregisters() {
        let (pio, exti) = board();
        let rec = leak(Recorder::new());
        let button = Input::new(pio, LineId::new(Port::D, 17), "test", Pull::Up).unwrap();
        {
            let _binding = exti
                .register(exti.resolve(&button).unwrap(), EintTrigger::DoubleEdge, rec, "rec")
                .unwrap();
            pio.drive_input(button.id(), Level::High);
            pio.drive_input(button.id(), Level::Low);
            assert_eq!(rec.hits(), 2);
        }
        pio.drive_input(button.id(), Level::High);
        assert_eq!(rec.hits(), 2);
        assert_eq!(pio.intc().spurious_count(), 0);
    }

    #[test]
    fn released_line_stops_firing_while_bound() {
        let (pio, exti) = board();
        let rec = leak(Recorder::new());
        let button = Input::new(pio, BUTTON, "test", Pull::None).unwrap();
        let binding = exti
            .register(exti.resolve(&button).unwrap(), EintTrigger::PositiveEdge, rec, "rec")
            .unwrap();

        button.release().unwrap();
        assert!(!pio.is_eint_enabled(BUTTON));
        pio.drive_input(BUTTON, Level::High);
        assert_eq!(rec.hits(), 0);

        drop(binding);
        assert_eq!(pio.mode(BUTTON), PinMode::Disabled);
    }
}
