//! Conversion between servo pulse widths and the duty percentage stored by the hardware.
//!
//! Every channel runs at the one frequency the shared timers were programmed with, so a
//! single period converts both directions. Callers talk in microseconds of pulse width;
//! the [`PwmDriver`](crate::pwm_driver::PwmDriver) reports duty as hundredths of a
//! percent of that period ([`DutyPercent`]).
//!
//! All arithmetic is integer with round-half-up, so it behaves the same on targets
//! without an FPU.

use core::fmt;

/// Default shared PWM frequency for hobby servos (Hz).
pub const SERVO_FREQUENCY_HZ: u32 = 50;

/// Period of [`SERVO_FREQUENCY_HZ`] in microseconds.
pub const SERVO_PERIOD_US: u32 = period_us(SERVO_FREQUENCY_HZ);

const MICROS_PER_SECOND: u32 = 1_000_000;

// 100% expressed in hundredths of a percent.
const FULL_SCALE: u16 = 10_000;

/// Period in microseconds of a PWM frequency given in Hz.
///
/// # Panics
///
/// Panics if `frequency_hz` is zero or above 1 MHz (the period would round to zero).
#[must_use]
pub const fn period_us(frequency_hz: u32) -> u32 {
    assert!(frequency_hz > 0, "PWM frequency must be non-zero");
    assert!(
        frequency_hz <= MICROS_PER_SECOND,
        "PWM frequency must be at most 1 MHz"
    );
    MICROS_PER_SECOND / frequency_hz
}

/// Duty expressed in hundredths of a percent of the PWM period (`0..=10_000`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct DutyPercent(u16);

impl DutyPercent {
    /// Output held low for the whole period.
    pub const ZERO: Self = Self(0);

    /// Output held high for the whole period.
    pub const FULL: Self = Self(FULL_SCALE);

    /// Create from hundredths of a percent, saturating at 100%.
    #[must_use]
    pub const fn from_hundredths(hundredths: u16) -> Self {
        if hundredths > FULL_SCALE {
            Self::FULL
        } else {
            Self(hundredths)
        }
    }

    /// Hundredths of a percent (`750` is 7.50%).
    #[must_use]
    pub const fn hundredths(self) -> u16 {
        self.0
    }

    /// Duty for a pulse of `micros` within a period of `period_us`.
    ///
    /// Pulses longer than the period saturate at [`DutyPercent::FULL`].
    ///
    /// # Panics
    ///
    /// Panics if `period_us` is zero.
    #[must_use]
    pub const fn from_micros(micros: u32, period_us: u32) -> Self {
        assert!(period_us > 0, "PWM period must be non-zero");
        let period = period_us as u64;
        let scaled = (micros as u64 * FULL_SCALE as u64 + period / 2) / period;
        if scaled > FULL_SCALE as u64 {
            Self::FULL
        } else {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "bounded by FULL_SCALE above"
            )]
            let hundredths = scaled as u16;
            Self(hundredths)
        }
    }

    /// Pulse width in microseconds this duty produces within a period of `period_us`.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        reason = "duty is at most 100% so the result never exceeds period_us"
    )]
    pub const fn to_micros(self, period_us: u32) -> u32 {
        ((self.0 as u64 * period_us as u64 + FULL_SCALE as u64 / 2) / FULL_SCALE as u64) as u32
    }
}

impl fmt::Display for DutyPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
