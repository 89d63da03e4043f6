use embedded_hal::pwm::{ErrorKind, ErrorType, SetDutyCycle};

use super::{ServoBus, write_channel_duty};
use crate::channel_pool::{Channel, Pin};
use crate::pwm_driver::PwmDriver;
use crate::Error;

/// A configured servo's channel exposed as an [`embedded_hal`] PWM output.
///
/// Duty units are microseconds of pulse width as long as the period fits in a `u16`
/// (true for anything at or above 16 Hz); slower timers are scaled to `u16::MAX`.
///
/// Created by [`ServoDevice::output`](super::ServoDevice::output).
pub struct ServoOutput<'a, D: PwmDriver, const N: usize> {
    bus: &'a mut ServoBus<D, N>,
    channel: Channel,
    pin: Pin,
}

impl<'a, D: PwmDriver, const N: usize> ServoOutput<'a, D, N> {
    pub(super) const fn new(bus: &'a mut ServoBus<D, N>, channel: Channel, pin: Pin) -> Self {
        Self { bus, channel, pin }
    }
}

impl embedded_hal::pwm::Error for Error {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl<D: PwmDriver, const N: usize> ErrorType for ServoOutput<'_, D, N> {
    type Error = Error;
}

impl<D: PwmDriver, const N: usize> SetDutyCycle for ServoOutput<'_, D, N> {
    fn max_duty_cycle(&self) -> u16 {
        u16::try_from(self.bus.period_us()).unwrap_or(u16::MAX)
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let period_us = u64::from(self.bus.period_us());
        let max = u64::from(self.max_duty_cycle());
        let duty_us = u64::from(duty) * period_us / max;
        let duty_us = u32::try_from(duty_us).unwrap_or(u32::MAX);
        write_channel_duty(&mut self.bus.driver, self.channel, self.pin, duty_us)
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal::pwm::SetDutyCycle;

    use crate::channel_pool::Pin;
    use crate::pwm_driver::{MockPwmDriver, TimerConfig};
    use crate::servo::{ServoBus, ServoDevice};

    #[test]
    fn duty_units_are_microseconds_at_50_hz() {
        let mut bus = ServoBus::new(MockPwmDriver::new());
        let servo = bus.servo(Pin::new(4), None).unwrap();

        let mut output = servo.output(&mut bus).unwrap();
        assert_eq!(output.max_duty_cycle(), 20_000);
        output.set_duty_cycle(1_750).unwrap();
        output.set_duty_cycle_percent(50).unwrap();
        assert_eq!(servo.read_duty(&bus), Ok(10_000));

        let mut output = servo.output(&mut bus).unwrap();
        output.set_duty_cycle_fully_off().unwrap();
        assert_eq!(servo.read_duty(&bus), Ok(0));
    }

    #[test]
    fn slow_timers_scale_into_u16() {
        let mut bus: ServoBus<_> =
            ServoBus::with_config(MockPwmDriver::new(), TimerConfig::new(10));
        let servo = bus.servo(Pin::new(4), None).unwrap();

        let mut output = servo.output(&mut bus).unwrap();
        assert_eq!(output.max_duty_cycle(), u16::MAX);
        output.set_duty_cycle_fully_on().unwrap();
        assert_eq!(servo.read_duty(&bus), Ok(100_000));
    }

    #[test]
    fn rejected_write_surfaces_as_other() {
        use embedded_hal::pwm::{Error as _, ErrorKind};

        let mut bus = ServoBus::new(MockPwmDriver::new());
        let servo: ServoDevice = bus.servo(Pin::new(4), None).unwrap();
        bus.driver_mut().fail_next_duty_write();

        let mut output = servo.output(&mut bus).unwrap();
        let err = output.set_duty_cycle(1_000).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Other);
    }
}
