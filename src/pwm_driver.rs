//! The hardware capability the servo layer is built on.
//!
//! [`PwmDriver`] is the only way this crate touches hardware. Implement it for the PWM
//! peripheral of your board; [`MockPwmDriver`] (host builds only) implements it in
//! memory for tests.

use derive_more::{Display, Error};

use crate::channel_pool::{Channel, Pin};
use crate::duty::{DutyPercent, SERVO_FREQUENCY_HZ, period_us};

#[cfg(not(target_os = "none"))]
mod mock_driver;

#[cfg(not(target_os = "none"))]
pub use mock_driver::{DriverCall, MockPwmDriver};

/// Which level the output holds while the counter is below the compare value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum DutyMode {
    /// High for the duty portion of the period (what servos expect).
    #[default]
    ActiveHigh,
    /// Low for the duty portion of the period.
    ActiveLow,
}

/// Counting direction of the shared timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum CounterMode {
    /// Count up, then wrap.
    #[default]
    Up,
    /// Count down, then wrap.
    Down,
    /// Count up then down (symmetric, halves the frequency).
    UpDown,
}

/// Configuration every channel's timer is programmed with.
///
/// All channels share one frequency; duty conversion relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct TimerConfig {
    /// PWM frequency in Hz.
    pub frequency_hz: u32,
    /// Output polarity.
    pub duty_mode: DutyMode,
    /// Timer counting direction.
    pub counter_mode: CounterMode,
}

impl TimerConfig {
    /// 50 Hz, active-high, up-counting: standard hobby servos.
    pub const SERVO: Self = Self::new(SERVO_FREQUENCY_HZ);

    /// Active-high, up-counting timers at `frequency_hz`.
    ///
    /// # Panics
    ///
    /// Panics if `frequency_hz` is zero or above 1 MHz.
    #[must_use]
    pub const fn new(frequency_hz: u32) -> Self {
        assert!(frequency_hz > 0, "PWM frequency must be non-zero");
        assert!(
            frequency_hz <= 1_000_000,
            "PWM frequency must be at most 1 MHz"
        );
        Self {
            frequency_hz,
            duty_mode: DutyMode::ActiveHigh,
            counter_mode: CounterMode::Up,
        }
    }

    /// Period of one PWM cycle in microseconds, at least 1.
    ///
    /// # Panics
    ///
    /// Panics if `frequency_hz` was set to zero or above 1 MHz directly.
    #[must_use]
    pub const fn period_us(&self) -> u32 {
        period_us(self.frequency_hz)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self::SERVO
    }
}

/// Failure reported by a [`PwmDriver`].
///
/// The servo layer translates these into [`Error`](crate::Error) with the channel
/// and pin involved.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum DriverError {
    /// The pin cannot carry a PWM output.
    #[display("pin cannot carry a PWM output")]
    UnsupportedPin,
    /// An argument was out of range for the hardware.
    #[display("argument out of range")]
    InvalidArgument,
}

/// Primitives of one PWM unit whose channels can be routed to any GPIO pin.
///
/// Calls are synchronous and expected to finish immediately. The servo layer calls
/// them from a single thread and never concurrently.
pub trait PwmDriver {
    /// Program the shared timers. Called once before any other method.
    fn init_timers(&mut self, config: &TimerConfig);

    /// Route `channel`'s output to `pin`.
    ///
    /// # Errors
    ///
    /// [`DriverError::UnsupportedPin`] if `pin` cannot carry a PWM output.
    fn bind_pin(&mut self, channel: Channel, pin: Pin) -> Result<(), DriverError>;

    /// Set the output polarity of `channel`.
    ///
    /// # Errors
    ///
    /// [`DriverError::InvalidArgument`] if the hardware rejects the mode.
    fn set_duty_mode(&mut self, channel: Channel, mode: DutyMode) -> Result<(), DriverError>;

    /// Set the pulse width of `channel` in microseconds.
    ///
    /// # Errors
    ///
    /// [`DriverError::InvalidArgument`] if the pulse does not fit the period.
    fn write_duty_time(&mut self, channel: Channel, microseconds: u32)
    -> Result<(), DriverError>;

    /// Current duty of `channel` as a share of the period.
    fn read_duty_percent(&self, channel: Channel) -> DutyPercent;

    /// Force `channel`'s output low.
    fn set_output_low(&mut self, channel: Channel);

    /// Detach `pin` from the PWM unit and give it back its default GPIO function.
    fn restore_default_pin_function(&mut self, pin: Pin);
}

impl<D: PwmDriver + ?Sized> PwmDriver for &mut D {
    fn init_timers(&mut self, config: &TimerConfig) {
        (**self).init_timers(config);
    }

    fn bind_pin(&mut self, channel: Channel, pin: Pin) -> Result<(), DriverError> {
        (**self).bind_pin(channel, pin)
    }

    fn set_duty_mode(&mut self, channel: Channel, mode: DutyMode) -> Result<(), DriverError> {
        (**self).set_duty_mode(channel, mode)
    }

    fn write_duty_time(
        &mut self,
        channel: Channel,
        microseconds: u32,
    ) -> Result<(), DriverError> {
        (**self).write_duty_time(channel, microseconds)
    }

    fn read_duty_percent(&self, channel: Channel) -> DutyPercent {
        (**self).read_duty_percent(channel)
    }

    fn set_output_low(&mut self, channel: Channel) {
        (**self).set_output_low(channel);
    }

    fn restore_default_pin_function(&mut self, pin: Pin) {
        (**self).restore_default_pin_function(pin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_megahertz_is_the_fastest_timer() {
        assert_eq!(TimerConfig::new(1_000_000).period_us(), 1);
        assert_eq!(TimerConfig::default().period_us(), 20_000);
    }

    #[test]
    #[should_panic(expected = "PWM frequency must be at most 1 MHz")]
    fn timer_above_one_megahertz_panics() {
        let _ = TimerConfig::new(1_000_001);
    }
}
