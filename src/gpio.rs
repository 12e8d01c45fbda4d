//! GPIO line handles
//!
//! A line is acquired from the [`Pio`] bank under an owner tag, configured as
//! input or output, optionally published, and released again. Releasing
//! happens on drop, so a handle can never release twice.
//!
//! [`GpioLine`] is the untyped handle whose direction is checked at run time.
//! [`Input`] and [`Output`] carry their direction in the type.

use core::convert::Infallible;
use core::fmt;

use crate::error::Error;
use crate::pio::{ClaimToken, LineId, Pio};

/// GPIO pin mode (3 bits in CFG register)
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PinMode {
    Input = 0,
    Output = 1,
    Func2 = 2,
    Func3 = 3,
    Func4 = 4,
    Func5 = 5,
    /// External interrupt function (PD/PE/PF)
    Eint = 6,
    Disabled = 7,
}

impl PinMode {
    pub(crate) fn from_bits(bits: u32) -> Self {
        match bits & 0x7 {
            0 => PinMode::Input,
            1 => PinMode::Output,
            2 => PinMode::Func2,
            3 => PinMode::Func3,
            4 => PinMode::Func4,
            5 => PinMode::Func5,
            6 => PinMode::Eint,
            _ => PinMode::Disabled,
        }
    }
}

/// Pull setting for a pin (2 bits in PUL register)
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Pull {
    #[default]
    None = 0,
    Up = 1,
    Down = 2,
}

/// Logic level
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    #[default]
    Low,
    High,
}

impl From<bool> for Level {
    fn from(val: bool) -> Self {
        if val {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> bool {
        matches!(level, Level::High)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => f.write_str("0"),
            Level::High => f.write_str("1"),
        }
    }
}

/// Configured direction of a line
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Input,
    Output,
}

/// Exclusively owned GPIO line.
///
/// The line starts unconfigured: reads and writes fail with
/// [`Error::InvalidState`] until a direction is set. The handle only acts
/// while its own claim is live; once the bank frees the line, writes and
/// the release fail instead of reaching a later owner.
pub struct GpioLine<'d> {
    pio: &'d Pio,
    id: LineId,
    token: ClaimToken,
    direction: Option<Direction>,
}

impl<'d> GpioLine<'d> {
    /// Reserve `id` for `owner`.
    ///
    /// Fails with [`Error::LineUnavailable`] if the line does not exist on
    /// this bank or is already held. The current holder is not disturbed.
    pub fn acquire(pio: &'d Pio, id: LineId, owner: &'static str) -> Result<Self, Error> {
        let token = pio.claim(id, owner)?;
        trace!("{}: acquired by {}", id, owner);
        Ok(Self {
            pio,
            id,
            token,
            direction: None,
        })
    }

    #[inline]
    pub fn id(&self) -> LineId {
        self.id
    }

    #[inline]
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub(crate) fn pio(&self) -> &'d Pio {
        self.pio
    }

    fn ensure_owned(&self) -> Result<(), Error> {
        if self.pio.holds(self.id, self.token) {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    /// Drive `initial` and switch to output.
    ///
    /// The data bit is written before the mode changes, so the pin never
    /// glitches to the previous level.
    pub fn configure_output(&mut self, initial: Level) -> Result<(), Error> {
        critical_section::with(|_| {
            self.ensure_owned()?;
            self.pio.write_data(self.id, initial.into());
            self.pio.set_mode(self.id, PinMode::Output);
            Ok::<(), Error>(())
        })?;
        self.direction = Some(Direction::Output);
        Ok(())
    }

    pub fn configure_input(&mut self, pull: Pull) -> Result<(), Error> {
        critical_section::with(|_| {
            self.ensure_owned()?;
            self.pio.set_pull(self.id, pull);
            self.pio.set_mode(self.id, PinMode::Input);
            Ok::<(), Error>(())
        })?;
        self.direction = Some(Direction::Input);
        Ok(())
    }

    /// Sample an input line. Never blocks.
    pub fn read_value(&self) -> Result<Level, Error> {
        match self.direction {
            Some(Direction::Input) => Ok(self.pio.level(self.id)),
            Some(Direction::Output) => Err(Error::WrongDirection),
            None => Err(Error::InvalidState),
        }
    }

    /// Drive an output line. Never blocks.
    pub fn write_value(&mut self, level: Level) -> Result<(), Error> {
        match self.direction {
            Some(Direction::Output) => self.pio.write_claimed(self.id, self.token, level.into()),
            Some(Direction::Input) => Err(Error::WrongDirection),
            None => Err(Error::InvalidState),
        }
    }

    /// Level last written to an output line.
    pub fn output_level(&self) -> Result<Level, Error> {
        match self.direction {
            Some(Direction::Output) => Ok(self.pio.level(self.id)),
            Some(Direction::Input) => Err(Error::WrongDirection),
            None => Err(Error::InvalidState),
        }
    }

    /// Expose the line through the introspection interface.
    ///
    /// Failure is logged and otherwise ignored.
    pub fn publish(&self, direction_may_change: bool) {
        if self.ensure_owned().is_err() {
            warn!("{}: publish failed: line no longer held", self.id);
            return;
        }
        if let Err(e) = self.pio.export(self.id, direction_may_change) {
            warn!("{}: publish failed: {}", self.id, e);
        }
    }

    pub fn unpublish(&self) {
        if self.ensure_owned().is_ok() {
            self.pio.unexport(self.id);
        }
    }

    /// Unpublish and return the line to the bank.
    ///
    /// Fails with [`Error::InvalidState`] if the bank already freed the line.
    pub fn release(self) -> Result<(), Error> {
        let res = self.free();
        core::mem::forget(self);
        res
    }

    fn free(&self) -> Result<(), Error> {
        self.pio.release(self.id, self.token)?;
        trace!("{}: released", self.id);
        Ok(())
    }
}

impl<'d> Drop for GpioLine<'d> {
    fn drop(&mut self) {
        if let Err(e) = self.free() {
            warn!("{}: release failed: {}", self.id, e);
        }
    }
}

/// Input line
pub struct Input<'d> {
    line: GpioLine<'d>,
}

impl<'d> Input<'d> {
    /// Acquire `id` and configure it as an input.
    pub fn new(pio: &'d Pio, id: LineId, owner: &'static str, pull: Pull) -> Result<Self, Error> {
        let mut line = GpioLine::acquire(pio, id, owner)?;
        line.configure_input(pull)?;
        Ok(Self { line })
    }

    #[inline]
    pub fn id(&self) -> LineId {
        self.line.id()
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        self.line.pio.read_data(self.line.id)
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        !self.is_high()
    }

    #[inline]
    pub fn get_level(&self) -> Level {
        self.is_high().into()
    }

    pub fn publish(&self, direction_may_change: bool) {
        self.line.publish(direction_may_change);
    }

    pub fn unpublish(&self) {
        self.line.unpublish();
    }

    pub fn release(self) -> Result<(), Error> {
        self.line.release()
    }

    pub(crate) fn pio(&self) -> &'d Pio {
        self.line.pio()
    }
}

/// Output line
pub struct Output<'d> {
    line: GpioLine<'d>,
}

impl<'d> Output<'d> {
    /// Acquire `id` and configure it as an output driving `initial_output`.
    pub fn new(pio: &'d Pio, id: LineId, owner: &'static str, initial_output: Level) -> Result<Self, Error> {
        let mut line = GpioLine::acquire(pio, id, owner)?;
        line.configure_output(initial_output)?;
        Ok(Self { line })
    }

    #[inline]
    pub fn id(&self) -> LineId {
        self.line.id()
    }

    #[inline]
    pub fn set_high(&mut self) {
        self.set_level(Level::High);
    }

    #[inline]
    pub fn set_low(&mut self) {
        self.set_level(Level::Low);
    }

    /// Drive the line. A write after the bank freed the line is dropped
    /// with a warning.
    #[inline]
    pub fn set_level(&mut self, level: Level) {
        if let Err(e) = self.line.write_value(level) {
            warn!("{}: write failed: {}", self.line.id, e);
        }
    }

    #[inline]
    pub fn is_set_high(&self) -> bool {
        self.line.pio.read_data(self.line.id)
    }

    #[inline]
    pub fn is_set_low(&self) -> bool {
        !self.is_set_high()
    }

    #[inline]
    pub fn get_output_level(&self) -> Level {
        self.is_set_high().into()
    }

    #[inline]
    pub fn toggle(&mut self) {
        if self.is_set_low() {
            self.set_high()
        } else {
            self.set_low()
        }
    }

    pub fn publish(&self, direction_may_change: bool) {
        self.line.publish(direction_may_change);
    }

    pub fn unpublish(&self) {
        self.line.unpublish();
    }

    pub fn release(self) -> Result<(), Error> {
        self.line.release()
    }
}

// ============ embedded-hal implementations ============

impl<'d> embedded_hal::digital::ErrorType for Input<'d> {
    type Error = Infallible;
}

impl<'d> embedded_hal::digital::InputPin for Input<'d> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_low())
    }
}

impl<'d> embedded_hal::digital::ErrorType for Output<'d> {
    type Error = Infallible;
}

impl<'d> embedded_hal::digital::OutputPin for Output<'d> {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_low();
        Ok(())
    }
}

impl<'d> embedded_hal::digital::StatefulOutputPin for Output<'d> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_set_high())
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_set_low())
    }
}

impl<'d> embedded_hal::digital::ErrorType for GpioLine<'d> {
    type Error = Error;
}

impl<'d> embedded_hal::digital::InputPin for GpioLine<'d> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_value()? == Level::High)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_value()? == Level::Low)
    }
}

impl<'d> embedded_hal::digital::OutputPin for GpioLine<'d> {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_value(Level::High)
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_value(Level::Low)
    }
}

impl<'d> embedded_hal::digital::StatefulOutputPin for GpioLine<'d> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.output_level()? == Level::High)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.output_level()? == Level::Low)
    }
}
