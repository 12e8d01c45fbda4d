use core::fmt;

/// Errors reported by the line and interrupt layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// Line index is not valid on this bank, or another owner holds it.
    LineUnavailable,
    /// Operation attempted on a line that is not in the required lifecycle state.
    InvalidState,
    /// Read on an output line or write on an input line.
    WrongDirection,
    /// The line cannot be routed to an interrupt source.
    NoInterruptCapability,
    /// The interrupt source already has a handler.
    RegistrationConflict,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::LineUnavailable => "line unavailable",
            Error::InvalidState => "invalid line state",
            Error::WrongDirection => "wrong line direction",
            Error::NoInterruptCapability => "line has no interrupt capability",
            Error::RegistrationConflict => "interrupt source already bound",
        };
        f.write_str(msg)
    }
}

impl embedded_hal::digital::Error for Error {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

/// Activation step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitStage {
    /// The controller was already active.
    AlreadyActive,
    /// Acquiring or configuring the LED line.
    LedLine,
    /// Acquiring or configuring the button line.
    ButtonLine,
    /// Mapping the button line to an interrupt source.
    InterruptSource,
    /// Installing the edge handler.
    InterruptRegistration,
}

/// Aggregate activation failure.
///
/// By the time this is returned every resource acquired during the failed
/// activation has been released again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InitError {
    pub stage: InitStage,
    pub cause: Error,
}

impl InitError {
    pub(crate) const fn new(stage: InitStage, cause: Error) -> Self {
        Self { stage, cause }
    }
}

impl fmt::Display for InitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self.stage {
            InitStage::AlreadyActive => "activation",
            InitStage::LedLine => "LED line setup",
            InitStage::ButtonLine => "button line setup",
            InitStage::InterruptSource => "interrupt mapping",
            InitStage::InterruptRegistration => "interrupt registration",
        };
        write!(f, "{} failed: {}", stage, self.cause)
    }
}
