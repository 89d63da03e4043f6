use std::collections::{BTreeMap, BTreeSet};

use super::{DriverError, DutyMode, PwmDriver, TimerConfig};
use crate::channel_pool::{Channel, Pin};
use crate::duty::DutyPercent;

/// One call made on a [`MockPwmDriver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverCall {
    /// [`PwmDriver::init_timers`]
    InitTimers {
        /// Configuration passed in.
        config: TimerConfig,
    },
    /// [`PwmDriver::bind_pin`]
    BindPin {
        /// Channel being routed.
        channel: Channel,
        /// Destination pin.
        pin: Pin,
    },
    /// [`PwmDriver::set_duty_mode`]
    SetDutyMode {
        /// Channel configured.
        channel: Channel,
        /// Requested polarity.
        mode: DutyMode,
    },
    /// [`PwmDriver::write_duty_time`]
    WriteDutyTime {
        /// Channel written.
        channel: Channel,
        /// Requested pulse width.
        microseconds: u32,
    },
    /// [`PwmDriver::set_output_low`]
    SetOutputLow {
        /// Channel forced low.
        channel: Channel,
    },
    /// [`PwmDriver::restore_default_pin_function`]
    RestoreDefaultPinFunction {
        /// Pin given back to GPIO.
        pin: Pin,
    },
}

/// In-memory [`PwmDriver`] that behaves like the hardware and records every call.
///
/// Duty is stored the way the peripheral stores it, as a [`DutyPercent`] of the period
/// programmed by [`init_timers`](PwmDriver::init_timers), so reads round exactly like
/// real compare registers. Failures can be injected per pin or for the next write.
#[derive(Debug, Default)]
pub struct MockPwmDriver {
    config: Option<TimerConfig>,
    duty: BTreeMap<Channel, DutyPercent>,
    duty_modes: BTreeMap<Channel, DutyMode>,
    routes: BTreeMap<Pin, Channel>,
    forced_low: BTreeSet<Channel>,
    unsupported_pins: BTreeSet<Pin>,
    fail_next_duty_mode: bool,
    fail_next_duty_write: bool,
    calls: Vec<DriverCall>,
}

impl MockPwmDriver {
    /// Driver on which every pin supports PWM.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver that refuses to bind any of `pins`.
    #[must_use]
    pub fn with_unsupported_pins(pins: impl IntoIterator<Item = Pin>) -> Self {
        Self {
            unsupported_pins: pins.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Make the next [`set_duty_mode`](PwmDriver::set_duty_mode) call fail.
    pub const fn fail_next_duty_mode(&mut self) {
        self.fail_next_duty_mode = true;
    }

    /// Make the next [`write_duty_time`](PwmDriver::write_duty_time) call fail.
    pub const fn fail_next_duty_write(&mut self) {
        self.fail_next_duty_write = true;
    }

    /// Every call so far, oldest first.
    #[must_use]
    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    /// Forget recorded calls (state is kept).
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Number of times `pin` was bound to a channel.
    #[must_use]
    pub fn bind_count(&self, pin: Pin) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, DriverCall::BindPin { pin: bound, .. } if *bound == pin))
            .count()
    }

    /// Configuration the timers were programmed with, if any.
    #[must_use]
    pub const fn timer_config(&self) -> Option<&TimerConfig> {
        self.config.as_ref()
    }

    /// Channel currently routed to `pin`.
    #[must_use]
    pub fn route(&self, pin: Pin) -> Option<Channel> {
        self.routes.get(&pin).copied()
    }

    /// Polarity last set on `channel`.
    #[must_use]
    pub fn duty_mode(&self, channel: Channel) -> Option<DutyMode> {
        self.duty_modes.get(&channel).copied()
    }

    /// Whether `channel` is forced low.
    #[must_use]
    pub fn is_output_low(&self, channel: Channel) -> bool {
        self.forced_low.contains(&channel)
    }
}

impl PwmDriver for MockPwmDriver {
    fn init_timers(&mut self, config: &TimerConfig) {
        self.calls.push(DriverCall::InitTimers { config: *config });
        self.config = Some(*config);
    }

    fn bind_pin(&mut self, channel: Channel, pin: Pin) -> Result<(), DriverError> {
        self.calls.push(DriverCall::BindPin { channel, pin });
        if self.unsupported_pins.contains(&pin) {
            return Err(DriverError::UnsupportedPin);
        }
        self.routes.insert(pin, channel);
        Ok(())
    }

    fn set_duty_mode(&mut self, channel: Channel, mode: DutyMode) -> Result<(), DriverError> {
        self.calls.push(DriverCall::SetDutyMode { channel, mode });
        if core::mem::take(&mut self.fail_next_duty_mode) {
            return Err(DriverError::InvalidArgument);
        }
        self.duty_modes.insert(channel, mode);
        Ok(())
    }

    fn write_duty_time(
        &mut self,
        channel: Channel,
        microseconds: u32,
    ) -> Result<(), DriverError> {
        self.calls.push(DriverCall::WriteDutyTime {
            channel,
            microseconds,
        });
        if core::mem::take(&mut self.fail_next_duty_write) {
            return Err(DriverError::InvalidArgument);
        }
        let period_us = self
            .config
            .ok_or(DriverError::InvalidArgument)?
            .period_us();
        if microseconds > period_us {
            return Err(DriverError::InvalidArgument);
        }
        self.duty
            .insert(channel, DutyPercent::from_micros(microseconds, period_us));
        self.forced_low.remove(&channel);
        Ok(())
    }

    fn read_duty_percent(&self, channel: Channel) -> DutyPercent {
        self.duty.get(&channel).copied().unwrap_or_default()
    }

    fn set_output_low(&mut self, channel: Channel) {
        self.calls.push(DriverCall::SetOutputLow { channel });
        self.forced_low.insert(channel);
    }

    fn restore_default_pin_function(&mut self, pin: Pin) {
        self.calls.push(DriverCall::RestoreDefaultPinFunction { pin });
        self.routes.remove(&pin);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_is_stored_as_a_share_of_the_period() {
        let mut driver = MockPwmDriver::new();
        driver.init_timers(&TimerConfig::SERVO);

        driver.write_duty_time(Channel::new(2), 1_500).unwrap();
        assert_eq!(driver.read_duty_percent(Channel::new(2)).hundredths(), 750);
        assert_eq!(driver.read_duty_percent(Channel::new(3)), DutyPercent::ZERO);
    }

    #[test]
    fn duty_beyond_the_period_is_rejected() {
        let mut driver = MockPwmDriver::new();
        driver.init_timers(&TimerConfig::SERVO);
        assert_eq!(
            driver.write_duty_time(Channel::new(0), 20_001),
            Err(DriverError::InvalidArgument)
        );
    }

    #[test]
    fn duty_before_timer_init_is_rejected() {
        let mut driver = MockPwmDriver::new();
        assert_eq!(
            driver.write_duty_time(Channel::new(0), 1_000),
            Err(DriverError::InvalidArgument)
        );
    }

    #[test]
    fn injected_failures_fire_once() {
        let mut driver = MockPwmDriver::new();
        driver.init_timers(&TimerConfig::SERVO);

        driver.fail_next_duty_write();
        assert!(driver.write_duty_time(Channel::new(0), 1_000).is_err());
        assert!(driver.write_duty_time(Channel::new(0), 1_000).is_ok());

        driver.fail_next_duty_mode();
        assert!(driver.set_duty_mode(Channel::new(0), DutyMode::ActiveHigh).is_err());
        assert!(driver.set_duty_mode(Channel::new(0), DutyMode::ActiveHigh).is_ok());
        assert_eq!(driver.duty_mode(Channel::new(0)), Some(DutyMode::ActiveHigh));
    }

    #[test]
    fn routes_follow_bind_and_restore() {
        let mut driver = MockPwmDriver::with_unsupported_pins([Pin::new(34)]);
        assert_eq!(
            driver.bind_pin(Channel::new(0), Pin::new(34)),
            Err(DriverError::UnsupportedPin)
        );

        driver.bind_pin(Channel::new(1), Pin::new(4)).unwrap();
        assert_eq!(driver.route(Pin::new(4)), Some(Channel::new(1)));
        assert_eq!(driver.bind_count(Pin::new(4)), 1);

        driver.set_output_low(Channel::new(1));
        driver.restore_default_pin_function(Pin::new(4));
        assert_eq!(driver.route(Pin::new(4)), None);
        assert!(driver.is_output_low(Channel::new(1)));
    }
}
