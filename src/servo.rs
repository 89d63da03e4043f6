//! A device abstraction for hobby servos sharing a pool of PWM channels.
//!
//! A [`ServoBus`] owns the [`PwmDriver`] and the [`ChannelPool`]. Each [`ServoDevice`]
//! is a cheap per-pin handle that borrows the bus for every operation. It finds or
//! allocates a channel for its pin, programs the hardware the first time the channel is
//! handed out, and gives the channel back on release.
//!
//! See [`ServoDevice`] for usage examples.

use core::fmt;

use crate::channel_pool::{Channel, ChannelPool, Pin, SERVO_CHANNEL_MAX};
use crate::pwm_driver::{DutyMode, PwmDriver, TimerConfig};
use crate::{Error, Result};

mod servo_output;

pub use servo_output::ServoOutput;

/// Default minimum pulse width for hobby servos (microseconds).
pub const SERVO_MIN_US_DEFAULT: u16 = 500;

/// Default maximum pulse width for hobby servos (microseconds).
pub const SERVO_MAX_US_DEFAULT: u16 = 2_500;

const SERVO_MAX_DEGREES: u16 = 180;

/// The PWM driver and channel pool shared by every servo of an application.
///
/// Pass it by `&mut` to each [`ServoDevice`] operation. Construction programs the
/// shared timers once.
#[derive(Debug)]
pub struct ServoBus<D: PwmDriver, const N: usize = SERVO_CHANNEL_MAX> {
    pool: ChannelPool<N>,
    driver: D,
}

impl<D: PwmDriver> ServoBus<D> {
    /// Bus of [`SERVO_CHANNEL_MAX`] channels with [`TimerConfig::SERVO`] timers.
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, TimerConfig::SERVO)
    }
}

impl<D: PwmDriver, const N: usize> ServoBus<D, N> {
    /// Bus of `N` channels whose timers run with `config`.
    pub fn with_config(mut driver: D, config: TimerConfig) -> Self {
        let mut pool = ChannelPool::new(config);
        pool.initialize(&mut driver);
        Self { pool, driver }
    }

    /// Create a servo on `pin`, configure it, and optionally set its duty.
    ///
    /// On error, a channel this call allocated goes back to the pool. A channel the pin
    /// already owned stays with its other handles.
    ///
    /// # Errors
    ///
    /// See [`ServoDevice::configure`].
    pub fn servo(&mut self, pin: Pin, duty_us: Option<u32>) -> Result<ServoDevice> {
        let already_owned = self.pool.channel_of(pin).is_some();
        let mut servo = ServoDevice::new(pin);
        if let Err(err) = servo.configure(self, duty_us) {
            if !already_owned {
                servo.release(self);
            }
            return Err(err);
        }
        Ok(servo)
    }

    /// Channel ownership table.
    #[must_use]
    pub const fn pool(&self) -> &ChannelPool<N> {
        &self.pool
    }

    /// The hardware driver.
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// The hardware driver, mutably.
    pub const fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Take the hardware driver back.
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Pulse width in microseconds of one PWM period.
    #[must_use]
    pub const fn period_us(&self) -> u32 {
        self.pool.config().period_us()
    }
}

/// Where a [`ServoDevice`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum ServoState {
    /// No channel bound yet.
    Uninitialized,
    /// `channel` is bound to the servo's pin and duty can be read and written.
    Configured {
        /// Channel owned by the servo's pin.
        channel: Channel,
    },
    /// Channel returned and pin restored. Terminal.
    Released,
}

/// A servo output on one GPIO pin, driven by a channel borrowed from a [`ServoBus`].
///
/// Several handles on the same pin share that pin's channel. Releasing any one of them
/// returns the channel for all of them; the others then report
/// [`Error::NotConfigured`] until configured again.
///
/// # Examples
///
/// ```rust
/// use servo_channels::{Error, Pin, ServoBus, ServoDevice, pwm_driver::MockPwmDriver};
///
/// let mut bus = ServoBus::new(MockPwmDriver::new());
///
/// let mut servo = ServoDevice::new(Pin::new(4));
/// servo.configure(&mut bus, Some(1_500))?;   // Bind a channel, center the horn
/// assert_eq!(servo.read_duty(&bus)?, 1_500);
///
/// servo.set_degrees(&mut bus, 45)?;          // Move to 45 degrees
/// servo.center(&mut bus)?;                   // Back to center
/// assert_eq!(servo.describe(&bus).to_string(), "Servo(4, duty=1500)");
///
/// servo.release(&mut bus);                   // Give the channel back
/// assert_eq!(bus.pool().free_count(), 6);
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug)]
pub struct ServoDevice {
    pin: Pin,
    state: ServoState,
    min_us: u16,
    max_us: u16,
}

impl ServoDevice {
    /// Servo on `pin` with the default pulse range, not yet configured.
    #[must_use]
    pub const fn new(pin: Pin) -> Self {
        Self::with_pulse_range(pin, SERVO_MIN_US_DEFAULT, SERVO_MAX_US_DEFAULT)
    }

    /// Servo on `pin` whose 0° and 180° positions are `min_us` and `max_us`.
    ///
    /// # Panics
    ///
    /// Panics if `min_us` is not less than `max_us`.
    #[must_use]
    pub const fn with_pulse_range(pin: Pin, min_us: u16, max_us: u16) -> Self {
        assert!(min_us < max_us, "min_us must be less than max_us");
        Self {
            pin,
            state: ServoState::Uninitialized,
            min_us,
            max_us,
        }
    }

    /// Pin this servo drives.
    #[must_use]
    pub const fn pin(&self) -> Pin {
        self.pin
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ServoState {
        self.state
    }

    /// Channel bound to this servo, if configured.
    #[must_use]
    pub const fn channel(&self) -> Option<Channel> {
        match self.state {
            ServoState::Configured { channel } => Some(channel),
            ServoState::Uninitialized | ServoState::Released => None,
        }
    }

    /// Whether duty can be read and written.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        matches!(self.state, ServoState::Configured { .. })
    }

    /// Bind a channel to this servo's pin and optionally set its duty.
    ///
    /// The hardware is programmed only when the pool hands out a channel the pin did not
    /// already own; configuring an already-configured servo just updates the duty.
    ///
    /// If programming a fresh channel fails, the channel goes back to the pool, the pin
    /// gets its default function back, and the servo is left unconfigured. If only the
    /// final duty write fails, the servo is left configured.
    ///
    /// # Errors
    ///
    /// - [`Error::Released`] if the servo was released.
    /// - [`Error::OutOfChannels`] if no channel is free.
    /// - [`Error::PinUnsupported`] if the driver cannot route a channel to the pin.
    /// - [`Error::DutyWriteFailed`] if the driver rejects the initial duty, duty mode, or
    ///   `duty_us`.
    pub fn configure<D: PwmDriver, const N: usize>(
        &mut self,
        bus: &mut ServoBus<D, N>,
        duty_us: Option<u32>,
    ) -> Result<()> {
        if self.state == ServoState::Released {
            return Err(Error::Released { pin: self.pin });
        }

        let allocation = bus.pool.find_or_allocate(self.pin).inspect_err(|_| {
            servo_warn!("servo pin {}: out of channels", self.pin);
        })?;
        let channel = allocation.channel;

        if allocation.fresh {
            let duty_mode = bus.pool.config().duty_mode;
            if let Err(err) = program_channel(&mut bus.driver, channel, self.pin, duty_mode) {
                bus.pool.release(channel);
                self.state = ServoState::Uninitialized;
                servo_warn!(
                    "servo pin {}: channel {} setup failed, rolled back",
                    self.pin,
                    channel
                );
                return Err(err);
            }
            servo_info!(
                "servo pin {} -> channel {} (timer {}, operator {})",
                self.pin,
                channel,
                channel.timer(),
                channel.operator()
            );
        } else {
            servo_debug!("servo pin {} reuses channel {}", self.pin, channel);
        }
        self.state = ServoState::Configured { channel };

        match duty_us {
            Some(duty_us) => self.write_duty(bus, duty_us),
            None => Ok(()),
        }
    }

    /// Current pulse width in microseconds.
    ///
    /// # Errors
    ///
    /// [`Error::NotConfigured`] or [`Error::Released`] if the servo is not configured.
    pub fn read_duty<D: PwmDriver, const N: usize>(&self, bus: &ServoBus<D, N>) -> Result<u32> {
        let channel = self.configured_channel(&bus.pool)?;
        let percent = bus.driver.read_duty_percent(channel);
        Ok(percent.to_micros(bus.period_us()))
    }

    /// Set the pulse width in microseconds.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConfigured`] or [`Error::Released`] if the servo is not configured.
    /// - [`Error::DutyWriteFailed`] if the driver rejects the value.
    pub fn write_duty<D: PwmDriver, const N: usize>(
        &mut self,
        bus: &mut ServoBus<D, N>,
        duty_us: u32,
    ) -> Result<()> {
        let channel = self.configured_channel(&bus.pool)?;
        write_channel_duty(&mut bus.driver, channel, self.pin, duty_us)
    }

    /// Move to `degrees` (0..=180) mapped linearly into the servo's pulse range.
    ///
    /// # Errors
    ///
    /// - [`Error::DegreesOutOfRange`] if `degrees` is above 180.
    /// - Anything [`write_duty`](Self::write_duty) returns.
    pub fn set_degrees<D: PwmDriver, const N: usize>(
        &mut self,
        bus: &mut ServoBus<D, N>,
        degrees: u16,
    ) -> Result<()> {
        if degrees > SERVO_MAX_DEGREES {
            return Err(Error::DegreesOutOfRange { degrees });
        }
        let span = u32::from(self.max_us - self.min_us);
        let duty_us =
            u32::from(self.min_us) + u32::from(degrees) * span / u32::from(SERVO_MAX_DEGREES);
        servo_debug!("servo pin {} set_degrees({}) -> {}us", self.pin, degrees, duty_us);
        self.write_duty(bus, duty_us)
    }

    /// Move to the midpoint of the pulse range.
    ///
    /// # Errors
    ///
    /// Anything [`write_duty`](Self::write_duty) returns.
    pub fn center<D: PwmDriver, const N: usize>(&mut self, bus: &mut ServoBus<D, N>) -> Result<()> {
        let duty_us = u32::from(self.min_us + (self.max_us - self.min_us) / 2);
        self.write_duty(bus, duty_us)
    }

    /// Return the channel, drive its output low, and restore the pin's default function.
    ///
    /// An unconfigured servo, or one whose channel another handle already released, just
    /// becomes released without touching the pool or the hardware. Releasing twice does
    /// nothing.
    pub fn release<D: PwmDriver, const N: usize>(&mut self, bus: &mut ServoBus<D, N>) {
        match self.state {
            ServoState::Released => return,
            ServoState::Uninitialized => {}
            ServoState::Configured { channel } if bus.pool.owner(channel) != Some(self.pin) => {
                servo_debug!("servo pin {} lost channel {} before release", self.pin, channel);
            }
            ServoState::Configured { channel } => {
                bus.pool.release(channel);
                bus.driver.set_output_low(channel);
                bus.driver.restore_default_pin_function(self.pin);
                servo_info!("servo pin {} released channel {}", self.pin, channel);
            }
        }
        self.state = ServoState::Released;
    }

    /// Borrow the bound channel as an [`embedded_hal::pwm::SetDutyCycle`] output.
    ///
    /// # Errors
    ///
    /// [`Error::NotConfigured`] or [`Error::Released`] if the servo is not configured.
    pub fn output<'a, D: PwmDriver, const N: usize>(
        &self,
        bus: &'a mut ServoBus<D, N>,
    ) -> Result<ServoOutput<'a, D, N>> {
        let channel = self.configured_channel(&bus.pool)?;
        Ok(ServoOutput::new(bus, channel, self.pin))
    }

    /// Snapshot of the pin and, when configured, the current duty, for display.
    #[must_use]
    pub fn describe<D: PwmDriver, const N: usize>(&self, bus: &ServoBus<D, N>) -> ServoDescription {
        ServoDescription {
            pin: self.pin,
            duty_us: self.read_duty(bus).ok(),
        }
    }

    // A channel released through another handle on the same pin no longer counts.
    fn configured_channel<const N: usize>(&self, pool: &ChannelPool<N>) -> Result<Channel> {
        match self.state {
            ServoState::Configured { channel } if pool.owner(channel) == Some(self.pin) => {
                Ok(channel)
            }
            ServoState::Configured { .. } | ServoState::Uninitialized => {
                Err(Error::NotConfigured { pin: self.pin })
            }
            ServoState::Released => Err(Error::Released { pin: self.pin }),
        }
    }
}

/// Textual form of a [`ServoDevice`]: `Servo(4)` or `Servo(4, duty=1500)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServoDescription {
    /// Pin of the servo.
    pub pin: Pin,
    /// Pulse width in microseconds, present only while configured.
    pub duty_us: Option<u32>,
}

impl fmt::Display for ServoDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Servo({}", self.pin)?;
        if let Some(duty_us) = self.duty_us {
            write!(f, ", duty={duty_us}")?;
        }
        write!(f, ")")
    }
}

// Bind, zero duty, duty mode. Unroutes the pin if a later step fails.
fn program_channel<D: PwmDriver>(
    driver: &mut D,
    channel: Channel,
    pin: Pin,
    duty_mode: DutyMode,
) -> Result<()> {
    driver
        .bind_pin(channel, pin)
        .map_err(|_| Error::PinUnsupported { pin })?;

    let result = driver
        .write_duty_time(channel, 0)
        .and_then(|()| driver.set_duty_mode(channel, duty_mode))
        .map_err(|_| Error::DutyWriteFailed { channel, pin });
    if result.is_err() {
        driver.restore_default_pin_function(pin);
    }
    result
}

fn write_channel_duty<D: PwmDriver>(
    driver: &mut D,
    channel: Channel,
    pin: Pin,
    duty_us: u32,
) -> Result<()> {
    driver.write_duty_time(channel, duty_us).map_err(|_| {
        servo_warn!("servo pin {}: duty {}us rejected on channel {}", pin, duty_us, channel);
        Error::DutyWriteFailed { channel, pin }
    })
}
