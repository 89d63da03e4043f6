//! Servo outputs that share a small, fixed pool of hardware PWM channels.
//!
//! A PWM unit has only a few channels, but any of them can be routed to any GPIO pin.
//! This crate decides which channel a servo on a given pin uses, programs the hardware
//! exactly once per newly handed-out channel, and reclaims the channel when the servo
//! is released. The hardware itself is supplied by the application through the
//! [`PwmDriver`] trait.
//!
//! # Example
//!
//! ```rust
//! use servo_channels::{Channel, Error, Pin, ServoBus, pwm_driver::MockPwmDriver};
//!
//! let mut bus = ServoBus::new(MockPwmDriver::new());
//!
//! // Six channels, six servos.
//! let mut servos = Vec::new();
//! for number in 4..10 {
//!     servos.push(bus.servo(Pin::new(number), Some(1_500))?);
//! }
//! assert_eq!(bus.servo(Pin::new(10), None).unwrap_err(), Error::OutOfChannels);
//!
//! // Releasing one frees its channel for the next pin.
//! servos[0].release(&mut bus);
//! let late = bus.servo(Pin::new(10), Some(1_000))?;
//! assert_eq!(late.channel(), Some(Channel::new(0)));
//! # Ok::<(), Error>(())
//! ```
//!
//! # Glossary
//!
//! - **Channel:** a timer/operator pair producing one independently controllable PWM
//!   output, routable to one pin at a time.
//! - **Duty:** the part of the period during which the output is high, given in
//!   microseconds of pulse width.
//! - **Period:** the inverse of the PWM frequency, shared by every channel.
//! - **Slot:** one entry of the [`ChannelPool`], recording which pin (if any) owns that
//!   channel.
#![cfg_attr(target_os = "none", no_std)]

#[macro_use]
mod logging;

pub mod channel_pool;
pub mod duty;
mod error;
pub mod pwm_driver;
pub mod servo;

pub use crate::channel_pool::{Channel, ChannelPool, Pin, SERVO_CHANNEL_MAX};
pub use crate::duty::{DutyPercent, SERVO_FREQUENCY_HZ, SERVO_PERIOD_US};
pub use crate::error::{Error, Result};
pub use crate::pwm_driver::{CounterMode, DriverError, DutyMode, PwmDriver, TimerConfig};
pub use crate::servo::{ServoBus, ServoDescription, ServoDevice, ServoOutput, ServoState};
