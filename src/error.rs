use derive_more::{Display, Error};

use crate::channel_pool::{Channel, Pin};

/// Result type used by every fallible operation in this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors raised while allocating, configuring, or driving a servo channel.
///
/// Every failure is returned synchronously to the immediate caller. None of them leave
/// the [`ChannelPool`](crate::channel_pool::ChannelPool) holding a slot the caller
/// did not end up owning.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Error {
    /// Every channel is assigned and none belongs to the requested pin.
    ///
    /// Release another servo and try again.
    #[display("out of servo channels")]
    OutOfChannels,

    /// The hardware driver refused to route a channel to this pin.
    #[display("servo not supported on pin {pin}")]
    PinUnsupported {
        /// Pin that could not be bound.
        pin: Pin,
    },

    /// The hardware driver rejected a duty (or duty mode) write.
    #[display("servo duty write failed on channel {channel} (pin {pin})")]
    DutyWriteFailed {
        /// Channel the write targeted.
        channel: Channel,
        /// Pin bound to that channel.
        pin: Pin,
    },

    /// Duty was read or written before the servo was configured.
    #[display("servo on pin {pin} is not configured")]
    NotConfigured {
        /// Pin of the servo.
        pin: Pin,
    },

    /// The servo was released and can no longer be used.
    #[display("servo on pin {pin} has been released")]
    Released {
        /// Pin of the servo.
        pin: Pin,
    },

    /// A position outside `0..=180` degrees was requested.
    #[display("servo position {degrees} is outside 0..=180 degrees")]
    DegreesOutOfRange {
        /// Requested position.
        degrees: u16,
    },
}
