#![cfg_attr(not(test), no_std)]
//! Interrupt-driven button/LED controller for the Allwinner F1C100S PIO bank.
//!
//! The platform pieces are plain `const`-constructible objects meant to live
//! in `static`s:
//! - [`intc::Intc`]: interrupt controller and dispatch table
//! - [`pio::Pio`]: GPIO registers, line ownership and publication
//! - [`exti::Exti`]: EINT routing from PD/PE/PF lines to their port IRQs
//!
//! [`ButtonLed`] sits on top and toggles the LED on every button press.

// This must go FIRST so that all the other modules see its macros.
mod fmt;

pub mod error;

pub mod intc;

pub mod pio;

pub mod gpio;

pub mod exti;

pub mod controller;

pub use controller::{ButtonLed, Config, ControllerState, TeardownReport};
pub use error::{Error, InitError, InitStage};

use exti::Exti;

/// Bring up EINT routing: install the port IRQ handlers and enable the
/// GPIO IRQs in INTC.
///
/// Call once at startup, before activating any controller.
pub fn init(exti: &'static Exti) {
    exti.init();
}
