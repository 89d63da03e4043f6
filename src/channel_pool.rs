//! Exclusive allocation of a fixed set of PWM channels to GPIO pins.
//!
//! One hardware PWM unit offers a handful of channels, each a timer/operator pair
//! that can be routed to any one pin at a time. [`ChannelPool`] records which pin owns
//! each channel. It hands a pin back the channel it already owns before it considers a
//! free one, and among free channels the lowest index always wins.
//!
//! The pool never talks to the hardware except to program the shared timers once in
//! [`ChannelPool::initialize`]. Binding and unbinding pins is the job of
//! [`ServoDevice`](crate::servo::ServoDevice).

use core::fmt;

use crate::pwm_driver::{PwmDriver, TimerConfig};
use crate::{Error, Result};

/// Number of servo channels on one PWM unit (3 timers × 2 operators).
pub const SERVO_CHANNEL_MAX: usize = 6;

// Channels per timer; consecutive channels share a timer.
const OPERATORS_PER_TIMER: u8 = 2;

/// Hardware GPIO pin number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Pin(u8);

impl Pin {
    /// GPIO pin `number`.
    #[must_use]
    pub const fn new(number: u8) -> Self {
        Self(number)
    }

    /// GPIO number of this pin.
    #[must_use]
    pub const fn number(self) -> u8 {
        self.0
    }
}

impl From<u8> for Pin {
    fn from(number: u8) -> Self {
        Self(number)
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Index of a PWM channel within a [`ChannelPool`].
///
/// Channel `n` is driven by timer `n / 2`, operator `n % 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Channel(u8);

impl Channel {
    /// Channel with index `index`.
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    /// Slot index of this channel.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Timer that clocks this channel.
    #[must_use]
    pub const fn timer(self) -> u8 {
        self.0 / OPERATORS_PER_TIMER
    }

    /// Operator of [`timer`](Self::timer) that generates this channel's output.
    #[must_use]
    pub const fn operator(self) -> u8 {
        self.0 % OPERATORS_PER_TIMER
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Outcome of [`ChannelPool::find_or_allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct Allocation {
    /// Channel now owned by the pin.
    pub channel: Channel,
    /// `true` when the channel was free before this call and still needs its hardware
    /// programmed; `false` when the pin already owned it.
    pub fresh: bool,
}

/// Table of which pin, if any, owns each of `N` PWM channels.
///
/// Owned by a [`ServoBus`](crate::servo::ServoBus), which initializes it on
/// construction. The pool only records ownership: it does not check that whoever
/// releases a channel is the pin that holds it.
///
/// # Example
///
/// ```rust
/// use servo_channels::{ChannelPool, Error, Pin, TimerConfig, pwm_driver::MockPwmDriver};
///
/// let mut driver = MockPwmDriver::new();
/// let mut pool: ChannelPool<2> = ChannelPool::new(TimerConfig::SERVO);
/// pool.initialize(&mut driver);
///
/// let first = pool.find_or_allocate(Pin::new(4))?;
/// assert!(first.fresh);
/// assert_eq!(first.channel.index(), 0);
///
/// // Same pin: same channel, nothing new to program.
/// assert!(!pool.find_or_allocate(Pin::new(4))?.fresh);
///
/// pool.find_or_allocate(Pin::new(5))?;
/// assert_eq!(pool.find_or_allocate(Pin::new(6)), Err(Error::OutOfChannels));
///
/// pool.release(first.channel);
/// assert_eq!(pool.find_or_allocate(Pin::new(6))?.channel, first.channel);
/// # Ok::<(), Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct ChannelPool<const N: usize = SERVO_CHANNEL_MAX> {
    slots: [Option<Pin>; N],
    config: TimerConfig,
    initialized: bool,
}

impl<const N: usize> ChannelPool<N> {
    // Channel indices are stored as u8.
    const CAPACITY_FITS: () = assert!(
        N > 0 && N <= u8::MAX as usize + 1,
        "channel count must be between 1 and 256"
    );

    /// Create a pool with every channel unassigned.
    ///
    /// Call [`initialize`](Self::initialize) before handing out channels.
    #[must_use]
    pub const fn new(config: TimerConfig) -> Self {
        let () = Self::CAPACITY_FITS;
        Self {
            slots: [None; N],
            config,
            initialized: false,
        }
    }

    /// Unassign every channel and program the shared timers.
    ///
    /// Runs at most once per pool; later calls do nothing.
    pub fn initialize<D: PwmDriver + ?Sized>(&mut self, driver: &mut D) {
        if self.initialized {
            return;
        }
        self.slots = [None; N];
        driver.init_timers(&self.config);
        self.initialized = true;
        servo_info!(
            "servo pool: {} channels at {} Hz",
            N,
            self.config.frequency_hz
        );
    }

    /// Whether [`initialize`](Self::initialize) has run.
    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Timer configuration shared by every channel.
    #[must_use]
    pub const fn config(&self) -> &TimerConfig {
        &self.config
    }

    /// Number of channels managed by this pool.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Channel already owned by `pin`, otherwise the lowest free channel, now owned by `pin`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OutOfChannels`] if `pin` owns no channel and none is free.
    pub fn find_or_allocate(&mut self, pin: Pin) -> Result<Allocation> {
        if let Some(channel) = self.channel_of(pin) {
            return Ok(Allocation {
                channel,
                fresh: false,
            });
        }

        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(Error::OutOfChannels)?;
        *slot = Some(pin);
        Ok(Allocation {
            channel: channel_at(index),
            fresh: true,
        })
    }

    /// Mark `channel` unassigned.
    ///
    /// Releasing a free or out-of-range channel does nothing.
    pub fn release(&mut self, channel: Channel) {
        if let Some(slot) = self.slots.get_mut(channel.index()) {
            *slot = None;
        }
    }

    /// Pin that owns `channel`, if any.
    #[must_use]
    pub fn owner(&self, channel: Channel) -> Option<Pin> {
        self.slots.get(channel.index()).copied().flatten()
    }

    /// Channel owned by `pin`, if any.
    #[must_use]
    pub fn channel_of(&self, pin: Pin) -> Option<Channel> {
        self.slots
            .iter()
            .position(|slot| *slot == Some(pin))
            .map(channel_at)
    }

    /// Number of unassigned channels.
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    /// Assigned channels and their pins, in channel order.
    pub fn iter(&self) -> impl Iterator<Item = (Channel, Pin)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.map(|pin| (channel_at(index), pin)))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "CAPACITY_FITS keeps every slot index within u8"
)]
const fn channel_at(index: usize) -> Channel {
    Channel(index as u8)
}
