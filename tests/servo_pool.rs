#![cfg(not(target_os = "none"))]
#![allow(missing_docs)]
//! Host-level tests for channel sharing between servos.

use servo_channels::pwm_driver::{DriverCall, MockPwmDriver};
use servo_channels::{
    Channel, Error, Pin, SERVO_CHANNEL_MAX, SERVO_PERIOD_US, ServoBus, ServoDevice, ServoState,
};

fn bus() -> ServoBus<MockPwmDriver> {
    ServoBus::new(MockPwmDriver::new())
}

fn configured(bus: &mut ServoBus<MockPwmDriver>, number: u8) -> ServoDevice {
    let mut servo = ServoDevice::new(Pin::new(number));
    servo.configure(bus, None).unwrap();
    servo
}

#[test]
fn distinct_pins_get_distinct_channels_until_exhausted() {
    let mut bus = bus();
    let servos: Vec<_> = (0..6).map(|number| configured(&mut bus, number)).collect();

    let mut channels: Vec<_> = servos.iter().filter_map(ServoDevice::channel).collect();
    channels.sort();
    channels.dedup();
    assert_eq!(channels.len(), SERVO_CHANNEL_MAX);

    let mut extra = ServoDevice::new(Pin::new(6));
    assert_eq!(extra.configure(&mut bus, None), Err(Error::OutOfChannels));
    assert_eq!(extra.state(), ServoState::Uninitialized);
}

#[test]
fn same_pin_reuses_its_channel_without_rebinding() {
    let mut bus = bus();
    let mut first = configured(&mut bus, 4);
    first.configure(&mut bus, Some(1_000)).unwrap();

    // A second handle on the same pin shares the channel too.
    let second = configured(&mut bus, 4);

    assert_eq!(first.channel(), Some(Channel::new(0)));
    assert_eq!(second.channel(), first.channel());
    assert_eq!(bus.driver().bind_count(Pin::new(4)), 1);
    assert_eq!(bus.pool().free_count(), SERVO_CHANNEL_MAX - 1);
    assert_eq!(second.read_duty(&bus), Ok(1_000));
}

#[test]
fn written_duty_reads_back_within_one_microsecond() {
    let mut bus = bus();
    let mut servo = configured(&mut bus, 4);

    for duty in (0..=SERVO_PERIOD_US).step_by(7).chain([SERVO_PERIOD_US]) {
        servo.write_duty(&mut bus, duty).unwrap();
        let read = servo.read_duty(&bus).unwrap();
        assert!(read.abs_diff(duty) <= 1, "wrote {duty} µs, read {read} µs");
    }
}

#[test]
fn releasing_one_of_many_frees_exactly_one_slot() {
    let mut bus = bus();
    let mut servos: Vec<_> = (0..6).map(|number| configured(&mut bus, number)).collect();
    assert_eq!(bus.pool().free_count(), 0);

    let victim = servos.get_mut(2).unwrap();
    let freed = victim.channel().unwrap();
    victim.release(&mut bus);
    assert_eq!(bus.pool().free_count(), 1);

    let newcomer = configured(&mut bus, 40);
    assert_eq!(newcomer.channel(), Some(freed));
    assert_eq!(bus.pool().owner(freed), Some(Pin::new(40)));
}

#[test]
fn releasing_an_unconfigured_servo_touches_nothing() {
    let mut bus = bus();
    let _other = configured(&mut bus, 5);
    bus.driver_mut().clear_calls();
    let before: Vec<_> = bus.pool().iter().collect();

    let mut servo = ServoDevice::new(Pin::new(4));
    servo.release(&mut bus);

    assert_eq!(servo.state(), ServoState::Released);
    assert!(bus.driver().calls().is_empty());
    assert_eq!(bus.pool().iter().collect::<Vec<_>>(), before);
}

#[test]
fn six_servos_then_exhaustion_then_reuse_after_release() {
    let mut bus = bus();

    let mut a = ServoDevice::new(Pin::new(4));
    a.configure(&mut bus, Some(1_500)).unwrap();
    assert_eq!(a.read_duty(&bus), Ok(1_500));

    let _others: Vec<_> = [5, 12, 13, 14, 15]
        .into_iter()
        .map(|number| configured(&mut bus, number))
        .collect();
    assert_eq!(bus.pool().free_count(), 0);

    let mut seventh = ServoDevice::new(Pin::new(16));
    assert_eq!(seventh.configure(&mut bus, None), Err(Error::OutOfChannels));

    let slot = a.channel().unwrap();
    a.release(&mut bus);
    seventh.configure(&mut bus, Some(2_000)).unwrap();
    assert_eq!(seventh.channel(), Some(slot));
    assert_eq!(seventh.read_duty(&bus), Ok(2_000));
}

#[test]
fn release_sequence_reaches_the_driver_in_order() {
    let mut bus = bus();
    let mut servo = bus.servo(Pin::new(4), Some(1_500)).unwrap();
    let channel = servo.channel().unwrap();
    servo.release(&mut bus);

    let tail: Vec<_> = bus.driver().calls().iter().rev().take(2).rev().copied().collect();
    assert_eq!(
        tail,
        [
            DriverCall::SetOutputLow { channel },
            DriverCall::RestoreDefaultPinFunction { pin: Pin::new(4) },
        ]
    );
    assert_eq!(bus.driver().route(Pin::new(4)), None);
}

#[test]
fn failed_constructor_on_a_shared_pin_keeps_the_existing_channel() {
    let mut bus = bus();
    let existing = bus.servo(Pin::new(4), Some(1_500)).unwrap();

    assert_eq!(
        bus.servo(Pin::new(4), Some(25_000)).unwrap_err(),
        Error::DutyWriteFailed {
            channel: Channel::new(0),
            pin: Pin::new(4)
        }
    );
    assert_eq!(bus.pool().owner(Channel::new(0)), Some(Pin::new(4)));
    assert_eq!(bus.pool().free_count(), SERVO_CHANNEL_MAX - 1);
    assert_eq!(bus.driver().route(Pin::new(4)), Some(Channel::new(0)));
    assert_eq!(existing.read_duty(&bus), Ok(1_500));

    // The next pin gets its own channel, not pin 4's.
    let next = bus.servo(Pin::new(9), None).unwrap();
    assert_eq!(next.channel(), Some(Channel::new(1)));
}

#[test]
fn failed_binding_does_not_consume_a_channel() {
    let mut bus: ServoBus<_> =
        ServoBus::new(MockPwmDriver::with_unsupported_pins([Pin::new(46)]));
    let _servos: Vec<_> = (0..5).map(|number| configured(&mut bus, number)).collect();

    let mut unsupported = ServoDevice::new(Pin::new(46));
    assert_eq!(
        unsupported.configure(&mut bus, None),
        Err(Error::PinUnsupported { pin: Pin::new(46) })
    );

    // The last channel is still available for a supported pin.
    let last = configured(&mut bus, 21);
    assert_eq!(last.channel(), Some(Channel::new(5)));
}

#[test]
fn smaller_pool_exhausts_sooner() {
    let mut bus: ServoBus<MockPwmDriver, 2> =
        ServoBus::with_config(MockPwmDriver::new(), servo_channels::TimerConfig::SERVO);
    for number in [1, 2] {
        ServoDevice::new(Pin::new(number))
            .configure(&mut bus, None)
            .unwrap();
    }
    assert_eq!(
        ServoDevice::new(Pin::new(3)).configure(&mut bus, None),
        Err(Error::OutOfChannels)
    );
}
