//! Button/LED controller
//!
//! Binds one output line (the LED) and one input line (the button), arms a
//! rising-edge interrupt on the button and flips the LED on every press.
//!
//! Lifecycle:
//! - [`ButtonLed::activate`] acquires the LED, then the button, resolves the
//!   button's interrupt source and installs the edge handler. Any failure
//!   releases what was acquired (button first, then LED) and reports a
//!   single [`InitError`].
//! - [`ButtonLed::deactivate`] unregisters the handler first, forces the LED
//!   off and releases both lines.

use core::cell::RefCell;

use critical_section::CriticalSection;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::signal::Signal;

use crate::error::{Error, InitError, InitStage};
use crate::exti::{EdgeHandler, EintTrigger, Exti, InterruptBinding};
use crate::gpio::{Input, Level, Output, Pull};
use crate::intc::IrqReturn;
use crate::pio::{LineId, Pio, Port};

/// Controller configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Output line driving the LED
    pub led: LineId,
    /// Input line sampling the button
    pub button: LineId,
    /// LED level right after activation
    pub led_initial: Level,
    /// Pull applied to the button line
    pub button_pull: Pull,
    /// Whether user space may flip the LED line's direction
    pub led_direction_may_change: bool,
    /// Whether user space may flip the button line's direction
    pub button_direction_may_change: bool,
    /// Owner tag the lines are acquired under
    pub owner: &'static str,
    /// Diagnostic label of the interrupt binding
    pub irq_label: &'static str,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            led: LineId::new(Port::E, 5),
            button: LineId::new(Port::E, 3),
            led_initial: Level::High,
            button_pull: Pull::None,
            led_direction_may_change: false,
            button_direction_may_change: false,
            owner: "button-led",
            irq_label: "button_led_handler",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared between the edge handler and its readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ControllerState {
    /// Last value written to the LED
    pub led_on: bool,
    /// Serviced presses; wraps, never decreases otherwise
    pub press_count: u32,
}

/// Flip the LED and count the press.
///
/// `led_on` and the line are updated together; callers hold the critical
/// section that guards `state`.
pub fn toggle(state: &mut ControllerState, led: &mut Output<'_>) -> IrqReturn {
    let on = !state.led_on;
    led.set_level(on.into());
    state.led_on = on;
    state.press_count = state.press_count.wrapping_add(1);
    IrqReturn::Handled
}

/// What [`ButtonLed::deactivate`] observed before releasing the lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TeardownReport {
    pub button_level: Level,
    pub press_count: u32,
}

struct Active {
    // Field order is drop order: the button goes back before the LED.
    button: Input<'static>,
    led: Output<'static>,
    state: ControllerState,
}

/// Interrupt-driven button/LED controller.
pub struct ButtonLed {
    pio: &'static Pio,
    exti: &'static Exti,
    config: Config,
    active: Mutex<CriticalSectionRawMutex, RefCell<Option<Active>>>,
    binding: Mutex<CriticalSectionRawMutex, RefCell<Option<InterruptBinding<'static>>>>,
    presses: Signal<CriticalSectionRawMutex, u32>,
}

impl ButtonLed {
    pub const fn new(pio: &'static Pio, exti: &'static Exti, config: Config) -> Self {
        Self {
            pio,
            exti,
            config,
            active: Mutex::new(RefCell::new(None)),
            binding: Mutex::new(RefCell::new(None)),
            presses: Signal::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Acquire both lines and arm the button interrupt.
    pub fn activate(&'static self) -> Result<(), InitError> {
        if self.is_active() {
            warn!("already active");
            return Err(InitError::new(InitStage::AlreadyActive, Error::InvalidState));
        }
        let cfg = &self.config;
        info!("initializing: LED {}, button {}", cfg.led, cfg.button);

        let led = Output::new(self.pio, cfg.led, cfg.owner, cfg.led_initial).map_err(|e| {
            warn!("LED line {} unavailable: {}", cfg.led, e);
            InitError::new(InitStage::LedLine, e)
        })?;
        led.publish(cfg.led_direction_may_change);

        let button = Input::new(self.pio, cfg.button, cfg.owner, cfg.button_pull).map_err(|e| {
            warn!("button line {} unavailable: {}", cfg.button, e);
            InitError::new(InitStage::ButtonLine, e)
        })?;
        button.publish(cfg.button_direction_may_change);
        info!("button state is currently: {}", button.get_level());

        let handle = self.exti.resolve(&button).map_err(|e| {
            warn!("button line {} has no interrupt: {}", cfg.button, e);
            InitError::new(InitStage::InterruptSource, e)
        })?;
        info!("button is mapped to {}", handle);

        let state = ControllerState {
            led_on: cfg.led_initial == Level::High,
            press_count: 0,
        };
        critical_section::with(|cs| {
            *self.active.borrow(cs).borrow_mut() = Some(Active { button, led, state });
        });
        self.presses.reset();

        match self.exti.register(handle, EintTrigger::PositiveEdge, self, cfg.irq_label) {
            Ok(binding) => {
                info!("interrupt request result: 0");
                critical_section::with(|cs| {
                    *self.binding.borrow(cs).borrow_mut() = Some(binding);
                });
                Ok(())
            }
            Err(e) => {
                warn!("interrupt request result: {}", e);
                let active = critical_section::with(|cs| self.active.borrow(cs).take());
                drop(active);
                Err(InitError::new(InitStage::InterruptRegistration, e))
            }
        }
    }

    /// Disarm the interrupt, switch the LED off and release both lines.
    ///
    /// Returns `None` if the controller was not active.
    pub fn deactivate(&self) -> Option<TeardownReport> {
        let binding = critical_section::with(|cs| self.binding.borrow(cs).take());
        if let Some(binding) = binding {
            binding.unregister();
        }

        let Some(mut active) = critical_section::with(|cs| self.active.borrow(cs).take()) else {
            warn!("deactivate while inactive");
            return None;
        };

        let button_level = active.button.get_level();
        info!("button state is currently: {}", button_level);
        info!("button was pressed {} times", active.state.press_count);

        active.led.set_low();
        active.state.led_on = false;

        let Active { button, led, state } = active;
        let (led_id, button_id) = (led.id(), button.id());
        if let Err(e) = button.release() {
            warn!("button line {} release failed: {}", button_id, e);
        }
        if let Err(e) = led.release() {
            warn!("LED line {} release failed: {}", led_id, e);
        }
        info!("released LED {} and button {}", led_id, button_id);

        Some(TeardownReport {
            button_level,
            press_count: state.press_count,
        })
    }

    pub fn is_active(&self) -> bool {
        critical_section::with(|cs| self.active.borrow(cs).borrow().is_some())
    }

    /// Snapshot of the shared state while active.
    pub fn state(&self) -> Option<ControllerState> {
        critical_section::with(|cs| self.active.borrow(cs).borrow().as_ref().map(|a| a.state))
    }

    /// Wait for the next serviced press and return the press count.
    ///
    /// Presses that land while nobody waits collapse into the latest count.
    pub async fn wait_for_press(&self) -> u32 {
        self.presses.wait().await
    }
}

impl EdgeHandler for ButtonLed {
    fn on_edge(&self, line: LineId, cs: CriticalSection<'_>) -> IrqReturn {
        let mut active = self.active.borrow(cs).borrow_mut();
        let Some(active) = active.as_mut() else {
            return IrqReturn::None;
        };
        if line != active.button.id() {
            return IrqReturn::None;
        }

        let ret = toggle(&mut active.state, &mut active.led);
        info!(
            "interrupt: LED {}, button state {}",
            active.led.get_output_level(),
            active.button.get_level()
        );
        self.presses.signal(active.state.press_count);
        ret
    }
}
