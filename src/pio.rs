//! PIO bank for F1C100S
//!
//! F1C100S has 6 GPIO ports:
//! - PA: 4 pins (PA0-PA3)
//! - PB: 4 pins (PB0-PB3)
//! - PC: 4 pins (PC0-PC3)
//! - PD: 22 pins (PD0-PD21)
//! - PE: 13 pins (PE0-PE12)
//! - PF: 6 pins (PF0-PF5)
//!
//! Register layout per port:
//! - CFG0..CFG3: pin config, 4 bits per pin (mode in the low 3 bits)
//! - DATA: one bit per pin
//! - PUL0..PUL1: pull config, 2 bits per pin
//! - EINT_CFG0..EINT_CFG3: trigger type, 4 bits per pin (PD/PE/PF only)
//! - EINT_CTL: per-pin enable
//! - EINT_STA: pending status (write 1 to clear)
//!
//! Besides the registers the bank keeps the line-ownership table and the
//! publication table. An EINT status bit latched by [`Pio::drive_input`]
//! raises the port IRQ on the wired [`Intc`].

use core::cell::RefCell;
use core::fmt;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

use crate::error::Error;
use crate::exti::{EintPort, EintTrigger};
use crate::gpio::{Level, PinMode, Pull};
use crate::intc::Intc;

/// Number of ports in the bank
pub const PORT_COUNT: usize = 6;

/// Maximum pins per port register
const PINS_PER_PORT: usize = 32;

/// GPIO port
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
}

impl Port {
    pub const fn from_num(port: u8) -> Option<Self> {
        match port {
            0 => Some(Port::A),
            1 => Some(Port::B),
            2 => Some(Port::C),
            3 => Some(Port::D),
            4 => Some(Port::E),
            5 => Some(Port::F),
            _ => None,
        }
    }

    /// Pins actually bonded out on this port.
    pub const fn pin_count(self) -> u8 {
        match self {
            Port::A | Port::B | Port::C => 4,
            Port::D => 22,
            Port::E => 13,
            Port::F => 6,
        }
    }

    const fn letter(self) -> char {
        match self {
            Port::A => 'A',
            Port::B => 'B',
            Port::C => 'C',
            Port::D => 'D',
            Port::E => 'E',
            Port::F => 'F',
        }
    }
}

/// Physical line index, encoded as `port << 5 | pin`.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct LineId(u8);

/// Index with no port behind it; every bank rejects it.
const NO_LINE: u8 = 0xFF;

impl LineId {
    /// Line `pin` of `port`. A pin number that does not fit the encoding
    /// yields a line no bank accepts, never a different real pin.
    pub const fn new(port: Port, pin: u8) -> Self {
        if pin > 0x1F {
            return Self(NO_LINE);
        }
        Self(((port as u8) << 5) | pin)
    }

    /// Line from its raw integer index. The index is not validated here.
    pub const fn from_index(index: u8) -> Self {
        Self(index)
    }

    pub const fn index(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn pin(self) -> u8 {
        self.0 & 0x1F
    }

    #[inline]
    pub const fn port_num(self) -> u8 {
        self.0 >> 5
    }

    pub const fn port(self) -> Option<Port> {
        Port::from_num(self.port_num())
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port() {
            Some(port) => write!(f, "P{}{}", port.letter(), self.pin()),
            None => write!(f, "P?{}", self.pin()),
        }
    }
}

impl fmt::Debug for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LineId {
    fn format(&self, f: defmt::Formatter) {
        match self.port() {
            Some(port) => defmt::write!(f, "P{}{}", port.letter(), self.pin()),
            None => defmt::write!(f, "P?{}", self.pin()),
        }
    }
}

/// Published record of a line, as seen by the introspection side.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Publication {
    /// Whether user space may change the line's direction.
    pub direction_may_change: bool,
}

/// Why a line could not be published.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PublishError {
    /// The introspection interface is not present.
    Unavailable,
    /// The line is already published.
    AlreadyPublished,
    /// The line does not exist on this bank.
    NoSuchLine,
    /// Nobody holds the line.
    NotAcquired,
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Unavailable => f.write_str("publication interface unavailable"),
            PublishError::AlreadyPublished => f.write_str("line already published"),
            PublishError::NoSuchLine => f.write_str("no such line"),
            PublishError::NotAcquired => f.write_str("line not acquired"),
        }
    }
}

/// Register block of one port.
struct PortRegs {
    cfg: [AtomicU32; 4],
    data: AtomicU32,
    pul: [AtomicU32; 2],
    eint_cfg: [AtomicU32; 4],
    eint_ctl: AtomicU32,
    eint_sta: AtomicU32,
}

/// All pins start out disabled (mode 7), like the silicon after reset.
const CFG_RESET: AtomicU32 = AtomicU32::new(0x7777_7777);
const ZERO: AtomicU32 = AtomicU32::new(0);

impl PortRegs {
    const fn new() -> Self {
        Self {
            cfg: [CFG_RESET; 4],
            data: ZERO,
            pul: [ZERO; 2],
            eint_cfg: [ZERO; 4],
            eint_ctl: ZERO,
            eint_sta: ZERO,
        }
    }
}

const PORT_RESET: PortRegs = PortRegs::new();

/// Identity of one acquisition of a line.
///
/// Every successful claim gets a fresh token, so a handle whose line was
/// freed and re-acquired elsewhere can tell it no longer holds it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct ClaimToken(u32);

#[derive(Copy, Clone)]
struct Claim {
    owner: &'static str,
    token: ClaimToken,
}

type Owners = [[Option<Claim>; PINS_PER_PORT]; PORT_COUNT];

/// GPIO bank: registers, line ownership and publication state.
pub struct Pio {
    ports: [PortRegs; PORT_COUNT],
    intc: &'static Intc,
    owners: Mutex<CriticalSectionRawMutex, RefCell<Owners>>,
    next_token: AtomicU32,
    published: [AtomicU32; PORT_COUNT],
    direction_locked: [AtomicU32; PORT_COUNT],
    publication_available: AtomicBool,
}

impl Pio {
    /// Bank in its reset state, with EINT outputs wired to `intc`.
    pub const fn new(intc: &'static Intc) -> Self {
        Self {
            ports: [PORT_RESET; PORT_COUNT],
            intc,
            owners: Mutex::new(RefCell::new([[None; PINS_PER_PORT]; PORT_COUNT])),
            next_token: AtomicU32::new(0),
            published: [ZERO; PORT_COUNT],
            direction_locked: [ZERO; PORT_COUNT],
            publication_available: AtomicBool::new(true),
        }
    }

    /// Whether `id` names a bonded-out pin of this bank.
    pub fn is_valid(&self, id: LineId) -> bool {
        match id.port() {
            Some(port) => id.pin() < port.pin_count(),
            None => false,
        }
    }

    /// Interrupt controller the EINT outputs are wired to.
    pub fn intc(&self) -> &'static Intc {
        self.intc
    }

    #[inline]
    fn regs(&self, id: LineId) -> &PortRegs {
        &self.ports[id.port_num() as usize]
    }

    // ============ Ownership ============

    /// Reserve `id` for `owner`.
    pub(crate) fn claim(&self, id: LineId, owner: &'static str) -> Result<ClaimToken, Error> {
        if !self.is_valid(id) {
            return Err(Error::LineUnavailable);
        }
        critical_section::with(|cs| {
            let mut owners = self.owners.borrow(cs).borrow_mut();
            let slot = &mut owners[id.port_num() as usize][id.pin() as usize];
            if slot.is_some() {
                return Err(Error::LineUnavailable);
            }
            let token = ClaimToken(self.next_token.fetch_add(1, Ordering::Relaxed));
            *slot = Some(Claim { owner, token });
            Ok(token)
        })
    }

    fn claim_of(&self, id: LineId) -> Option<Claim> {
        if !self.is_valid(id) {
            return None;
        }
        critical_section::with(|cs| self.owners.borrow(cs).borrow()[id.port_num() as usize][id.pin() as usize])
    }

    /// Current owner tag of `id`, if any.
    pub fn owner(&self, id: LineId) -> Option<&'static str> {
        self.claim_of(id).map(|claim| claim.owner)
    }

    /// Whether `token` is the live claim on `id`.
    pub(crate) fn holds(&self, id: LineId, token: ClaimToken) -> bool {
        matches!(self.claim_of(id), Some(claim) if claim.token == token)
    }

    /// Return `id` to the unacquired state, whoever holds it.
    ///
    /// Freeing a line that is not owned fails with [`Error::InvalidState`].
    /// The line is unpublished, and a still-armed EINT is disarmed first so
    /// no edge on a freed line can reach a handler.
    pub fn free(&self, id: LineId) -> Result<(), Error> {
        self.free_claim(id, None)
    }

    /// Free `id` only if `token` is still its live claim.
    pub(crate) fn release(&self, id: LineId, token: ClaimToken) -> Result<(), Error> {
        self.free_claim(id, Some(token))
    }

    fn free_claim(&self, id: LineId, token: Option<ClaimToken>) -> Result<(), Error> {
        if !self.is_valid(id) {
            return Err(Error::InvalidState);
        }
        critical_section::with(|cs| {
            let mut owners = self.owners.borrow(cs).borrow_mut();
            let slot = &mut owners[id.port_num() as usize][id.pin() as usize];
            match (*slot, token) {
                (None, _) => return Err(Error::InvalidState),
                (Some(claim), Some(token)) if claim.token != token => return Err(Error::InvalidState),
                _ => {}
            }
            self.unexport(id);
            if self.is_eint_enabled(id) {
                warn!("{}: released with its interrupt still armed", id);
                self.set_eint_enabled(id, false);
                self.regs(id).eint_sta.fetch_and(!(1 << id.pin()), Ordering::AcqRel);
            }
            self.set_mode(id, PinMode::Disabled);
            *slot = None;
            Ok(())
        })
    }

    // ============ Pin registers ============

    /// Set pin mode (CFG register, 4 bits per pin)
    pub(crate) fn set_mode(&self, id: LineId, mode: PinMode) {
        let pin = id.pin() as usize;
        let cfg_offset = (pin % 8) * 4;
        let mask = !(0x7 << cfg_offset);
        let _ = self.regs(id).cfg[pin / 8].fetch_update(Ordering::AcqRel, Ordering::Acquire, |val| {
            Some((val & mask) | ((mode as u32) << cfg_offset))
        });
    }

    /// Current pin mode. Lines not on this bank read as `Disabled`.
    pub fn mode(&self, id: LineId) -> PinMode {
        if !self.is_valid(id) {
            return PinMode::Disabled;
        }
        let pin = id.pin() as usize;
        let val = self.regs(id).cfg[pin / 8].load(Ordering::Acquire);
        PinMode::from_bits((val >> ((pin % 8) * 4)) & 0x7)
    }

    /// Set pull configuration (PUL register, 2 bits per pin)
    pub(crate) fn set_pull(&self, id: LineId, pull: Pull) {
        let pin = id.pin() as usize;
        let pull_offset = (pin % 16) * 2;
        let mask = !(0x3 << pull_offset);
        let _ = self.regs(id).pul[pin / 16].fetch_update(Ordering::AcqRel, Ordering::Acquire, |val| {
            Some((val & mask) | ((pull as u32) << pull_offset))
        });
    }

    /// Read pin data (DATA register). Lines not on this bank read low.
    pub fn read_data(&self, id: LineId) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        (self.regs(id).data.load(Ordering::Acquire) >> id.pin()) & 1 != 0
    }

    /// Level currently on the pin's data bit.
    pub fn level(&self, id: LineId) -> Level {
        self.read_data(id).into()
    }

    /// Write pin data on behalf of the claim `token`.
    ///
    /// Fails with [`Error::InvalidState`] once the claim is gone; the line
    /// may belong to someone else by then.
    pub(crate) fn write_claimed(&self, id: LineId, token: ClaimToken, high: bool) -> Result<(), Error> {
        critical_section::with(|_| {
            if !self.holds(id, token) {
                return Err(Error::InvalidState);
            }
            self.write_data(id, high);
            Ok(())
        })
    }

    /// Write pin data (DATA register)
    pub(crate) fn write_data(&self, id: LineId, high: bool) {
        let bit = 1u32 << id.pin();
        let data = &self.regs(id).data;
        if high {
            data.fetch_or(bit, Ordering::AcqRel);
        } else {
            data.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    // ============ EINT registers ============

    /// Configure EINT trigger type for a pin
    pub(crate) fn set_eint_trigger(&self, id: LineId, trigger: EintTrigger) {
        let pin = id.pin() as usize;
        let cfg_offset = (pin % 8) * 4;
        let mask = !(0xF << cfg_offset);
        let _ = self.regs(id).eint_cfg[pin / 8].fetch_update(Ordering::AcqRel, Ordering::Acquire, |val| {
            Some((val & mask) | ((trigger as u32) << cfg_offset))
        });
    }

    fn eint_trigger(&self, id: LineId) -> Option<EintTrigger> {
        let pin = id.pin() as usize;
        let val = self.regs(id).eint_cfg[pin / 8].load(Ordering::Acquire);
        EintTrigger::from_bits((val >> ((pin % 8) * 4)) & 0xF)
    }

    /// Enable or disable EINT for a pin (EINT_CTL register)
    pub(crate) fn set_eint_enabled(&self, id: LineId, enabled: bool) {
        let bit = 1u32 << id.pin();
        let ctl = &self.regs(id).eint_ctl;
        if enabled {
            ctl.fetch_or(bit, Ordering::AcqRel);
        } else {
            ctl.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    pub fn is_eint_enabled(&self, id: LineId) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        (self.regs(id).eint_ctl.load(Ordering::Acquire) >> id.pin()) & 1 != 0
    }

    /// Read EINT_CTL register
    pub(crate) fn eint_ctl(&self, port: Port) -> u32 {
        self.ports[port as usize].eint_ctl.load(Ordering::Acquire)
    }

    /// Read EINT status (EINT_STA register)
    pub(crate) fn eint_status(&self, port: Port) -> u32 {
        self.ports[port as usize].eint_sta.load(Ordering::Acquire)
    }

    /// Clear EINT status (write 1 to clear)
    pub(crate) fn clear_eint_status(&self, port: Port, bits: u32) {
        self.ports[port as usize].eint_sta.fetch_and(!bits, Ordering::AcqRel);
    }

    // ============ External signal ============

    /// Drive the external signal on an input pin.
    ///
    /// Output and unconfigured pins ignore the drive. When the pin is in
    /// EINT mode, armed, and the transition matches its trigger, the status
    /// bit is latched and the port IRQ is raised, which runs the handler
    /// before this call returns.
    pub fn drive_input(&self, id: LineId, level: Level) {
        if !self.is_valid(id) {
            return;
        }
        let mode = self.mode(id);
        if mode != PinMode::Input && mode != PinMode::Eint {
            trace!("{}: external drive ignored in {:?} mode", id, mode);
            return;
        }

        let bit = 1u32 << id.pin();
        let data = &self.regs(id).data;
        let was_high = match level {
            Level::High => data.fetch_or(bit, Ordering::AcqRel) & bit != 0,
            Level::Low => data.fetch_and(!bit, Ordering::AcqRel) & bit != 0,
        };
        let is_high = level == Level::High;

        if mode != PinMode::Eint || !self.is_eint_enabled(id) {
            return;
        }
        let fired = match self.eint_trigger(id) {
            Some(EintTrigger::PositiveEdge) => !was_high && is_high,
            Some(EintTrigger::NegativeEdge) => was_high && !is_high,
            Some(EintTrigger::DoubleEdge) => was_high != is_high,
            Some(EintTrigger::HighLevel) => is_high,
            Some(EintTrigger::LowLevel) => !is_high,
            None => false,
        };
        if !fired {
            return;
        }
        if let Some(port) = EintPort::from_port_num(id.port_num()) {
            self.regs(id).eint_sta.fetch_or(bit, Ordering::AcqRel);
            self.intc.raise(port.irq());
        }
    }

    // ============ Publication ============

    /// Make `id` visible to the introspection interface.
    pub fn export(&self, id: LineId, direction_may_change: bool) -> Result<(), PublishError> {
        if !self.publication_available.load(Ordering::Acquire) {
            return Err(PublishError::Unavailable);
        }
        if !self.is_valid(id) {
            return Err(PublishError::NoSuchLine);
        }
        if self.owner(id).is_none() {
            return Err(PublishError::NotAcquired);
        }
        let port = id.port_num() as usize;
        let bit = 1u32 << id.pin();
        if self.published[port].fetch_or(bit, Ordering::AcqRel) & bit != 0 {
            return Err(PublishError::AlreadyPublished);
        }
        if direction_may_change {
            self.direction_locked[port].fetch_and(!bit, Ordering::AcqRel);
        } else {
            self.direction_locked[port].fetch_or(bit, Ordering::AcqRel);
        }
        Ok(())
    }

    /// Withdraw `id` from the introspection interface. Returns whether it was published.
    pub fn unexport(&self, id: LineId) -> bool {
        if !self.is_valid(id) {
            return false;
        }
        let port = id.port_num() as usize;
        let bit = 1u32 << id.pin();
        self.direction_locked[port].fetch_and(!bit, Ordering::AcqRel);
        self.published[port].fetch_and(!bit, Ordering::AcqRel) & bit != 0
    }

    /// Published record of `id`, if it is published.
    pub fn publication(&self, id: LineId) -> Option<Publication> {
        if !self.is_valid(id) {
            return None;
        }
        let port = id.port_num() as usize;
        let bit = 1u32 << id.pin();
        if self.published[port].load(Ordering::Acquire) & bit == 0 {
            return None;
        }
        Some(Publication {
            direction_may_change: self.direction_locked[port].load(Ordering::Acquire) & bit == 0,
        })
    }

    /// Attach or detach the introspection interface.
    pub fn set_publication_available(&self, available: bool) {
        self.publication_available.store(available, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> &'static Pio {
        let intc: &'static Intc = Box::leak(Box::new(Intc::new()));
        Box::leak(Box::new(Pio::new(intc)))
    }

    #[test]
    fn line_validity_follows_port_geometry() {
        let pio = bank();
        assert!(pio.is_valid(LineId::new(Port::A, 3)));
        assert!(!pio.is_valid(LineId::new(Port::A, 4)));
        assert!(pio.is_valid(LineId::new(Port::D, 21)));
        assert!(!pio.is_valid(LineId::new(Port::E, 13)));
        assert!(!pio.is_valid(LineId::from_index(6 << 5)));
    }

    #[test]
    fn line_id_encoding() {
        let id = LineId::new(Port::E, 3);
        assert_eq!(id.index(), (4 << 5) | 3);
        assert_eq!(LineId::from_index(id.index()), id);
        assert_eq!(id.port(), Some(Port::E));
        assert_eq!(format!("{}", id), "PE3");
    }

    #[test]
    fn pin_beyond_encoding_is_not_aliased() {
        let pio = bank();
        let wide = LineId::new(Port::E, 35);
        assert_ne!(wide, LineId::new(Port::E, 3));
        assert!(!pio.is_valid(wide));
        assert_eq!(pio.claim(wide, "x"), Err(Error::LineUnavailable));
        assert_eq!(pio.owner(LineId::new(Port::E, 3)), None);
    }

    #[test]
    fn readers_of_missing_line_return_defaults() {
        let pio = bank();
        let nowhere = LineId::from_index(7 << 5);
        assert_eq!(pio.level(nowhere), Level::Low);
        assert!(!pio.read_data(nowhere));
        assert_eq!(pio.mode(nowhere), PinMode::Disabled);
        assert!(!pio.is_eint_enabled(nowhere));
        assert_eq!(pio.owner(nowhere), None);
        assert_eq!(pio.publication(nowhere), None);
        pio.drive_input(nowhere, Level::High);
    }

    #[test]
    fn claim_is_exclusive_and_free_is_strict() {
        let pio = bank();
        let id = LineId::new(Port::E, 5);

        pio.claim(id, "first").unwrap();
        assert_eq!(pio.claim(id, "second"), Err(Error::LineUnavailable));
        assert_eq!(pio.owner(id), Some("first"));

        pio.free(id).unwrap();
        assert_eq!(pio.owner(id), None);
        assert_eq!(pio.free(id), Err(Error::InvalidState));

        pio.claim(id, "second").unwrap();
        assert_eq!(pio.owner(id), Some("second"));
    }

    #[test]
    fn stale_claim_cannot_touch_new_owner() {
        let pio = bank();
        let id = LineId::new(Port::E, 5);

        let old = pio.claim(id, "a").unwrap();
        pio.free(id).unwrap();
        let new = pio.claim(id, "b").unwrap();
        assert_ne!(old, new);
        assert!(pio.holds(id, new));
        assert!(!pio.holds(id, old));

        pio.write_claimed(id, new, true).unwrap();
        assert_eq!(pio.write_claimed(id, old, false), Err(Error::InvalidState));
        assert_eq!(pio.level(id), Level::High);

        assert_eq!(pio.release(id, old), Err(Error::InvalidState));
        assert_eq!(pio.owner(id), Some("b"));
        pio.release(id, new).unwrap();
        assert_eq!(pio.owner(id), None);
    }

    #[test]
    fn claim_of_missing_pin_fails() {
        let pio = bank();
        assert_eq!(pio.claim(LineId::new(Port::F, 6), "x"), Err(Error::LineUnavailable));
    }

    #[test]
    fn mode_fields_are_independent() {
        let pio = bank();
        let a = LineId::new(Port::D, 9);
        let b = LineId::new(Port::D, 10);
        assert_eq!(pio.mode(a), PinMode::Disabled);

        pio.set_mode(a, PinMode::Output);
        pio.set_mode(b, PinMode::Eint);
        assert_eq!(pio.mode(a), PinMode::Output);
        assert_eq!(pio.mode(b), PinMode::Eint);
    }

    #[test]
    fn drive_ignored_on_output_pin() {
        let pio = bank();
        let id = LineId::new(Port::E, 5);
        pio.set_mode(id, PinMode::Output);
        pio.write_data(id, false);
        pio.drive_input(id, Level::High);
        assert_eq!(pio.level(id), Level::Low);
    }

    #[test]
    fn rising_edge_latches_only_when_armed() {
        let pio = bank();
        let id = LineId::new(Port::E, 3);
        pio.set_mode(id, PinMode::Eint);
        pio.set_eint_trigger(id, EintTrigger::PositiveEdge);

        pio.drive_input(id, Level::High);
        assert_eq!(pio.eint_status(Port::E), 0);

        pio.drive_input(id, Level::Low);
        pio.set_eint_enabled(id, true);
        pio.drive_input(id, Level::High);
        assert_eq!(pio.eint_status(Port::E), 1 << 3);

        // Staying high is not another edge.
        pio.clear_eint_status(Port::E, 1 << 3);
        pio.drive_input(id, Level::High);
        assert_eq!(pio.eint_status(Port::E), 0);

        pio.drive_input(id, Level::Low);
        assert_eq!(pio.eint_status(Port::E), 0);
    }

    #[test]
    fn free_disarms_eint() {
        let pio = bank();
        let id = LineId::new(Port::F, 1);
        pio.claim(id, "t").unwrap();
        pio.set_mode(id, PinMode::Eint);
        pio.set_eint_enabled(id, true);

        pio.free(id).unwrap();
        assert!(!pio.is_eint_enabled(id));
        assert_eq!(pio.mode(id), PinMode::Disabled);
    }

    #[test]
    fn export_records_direction_flag() {
        let pio = bank();
        let id = LineId::new(Port::E, 5);
        pio.claim(id, "t").unwrap();

        pio.export(id, false).unwrap();
        assert_eq!(pio.publication(id), Some(Publication { direction_may_change: false }));
        assert_eq!(pio.export(id, true), Err(PublishError::AlreadyPublished));

        assert!(pio.unexport(id));
        assert!(!pio.unexport(id));
        assert_eq!(pio.publication(id), None);

        pio.set_publication_available(false);
        assert_eq!(pio.export(id, true), Err(PublishError::Unavailable));
        assert_eq!(pio.publication(id), None);
    }

    #[test]
    fn export_requires_an_owner() {
        let pio = bank();
        let id = LineId::new(Port::D, 4);
        assert_eq!(pio.export(id, false), Err(PublishError::NotAcquired));
        assert_eq!(pio.publication(id), None);

        pio.claim(id, "t").unwrap();
        pio.export(id, true).unwrap();
        pio.free(id).unwrap();
        assert_eq!(pio.publication(id), None);
    }
}
