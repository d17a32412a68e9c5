//! Channel fan-out: one physical sensor, four logical measurement streams.
//!
//! A single completed cycle yields ethanol, TVOC, eCO2 and IAQ figures at
//! once. [`Channels`] owns the prepared sensor and the algorithm state and
//! hands out one [`Channel`] per kind; each channel's [`fetch`](Channel::fetch)
//! runs exactly one full cycle and extracts its own scalar in the channel's
//! fixed-point unit. Channels never trigger hardware independently of a
//! fetch, and at most one cycle is in flight per physical sensor.

use core::cell::RefCell;

use embedded_hal::{delay::DelayNs, i2c};

use crate::algorithm::{AirQualityAlgorithm, Estimates, Stability};
use crate::{error, Ready, Zmod4410};

/// The four logical measurement streams derived from one physical cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChannelKind {
    /// Ethanol concentration.
    Ethanol,
    /// Total volatile organic compounds.
    Tvoc,
    /// CO2 equivalent.
    Eco2,
    /// Aggregate indoor air quality index.
    Iaq,
}

/// Measurement unit of a channel's fixed-point value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Unit {
    /// Parts per million, scaled by the channel's fixed-point factor.
    PartsPerMillion,
    /// Milligrams per cubic meter, scaled by the channel's factor.
    MilligramsPerCubicMeter,
    /// Dimensionless index, scaled by the channel's factor.
    Index,
}

/// Registration descriptor for one channel: what a host device framework
/// needs to publish the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelInfo {
    pub kind: ChannelKind,
    pub unit: Unit,
    /// Declared range in the channel's physical unit, before scaling.
    pub range_min: i32,
    pub range_max: i32,
    /// Minimum sampling period; 0 leaves pacing to the cycle's own rest
    /// period.
    pub period_min_ms: u32,
}

impl ChannelKind {
    /// All four kinds, in registration order.
    pub const ALL: [ChannelKind; 4] = [
        ChannelKind::Ethanol,
        ChannelKind::Tvoc,
        ChannelKind::Eco2,
        ChannelKind::Iaq,
    ];

    /// Registration descriptor for this kind.
    pub fn info(self) -> ChannelInfo {
        match self {
            ChannelKind::Ethanol => ChannelInfo {
                kind: self,
                unit: Unit::PartsPerMillion,
                range_min: 0,
                range_max: 100,
                period_min_ms: 0,
            },
            ChannelKind::Tvoc => ChannelInfo {
                kind: self,
                unit: Unit::MilligramsPerCubicMeter,
                range_min: 0,
                range_max: 100,
                period_min_ms: 0,
            },
            ChannelKind::Eco2 => ChannelInfo {
                kind: self,
                unit: Unit::PartsPerMillion,
                range_min: 0,
                range_max: 1000,
                period_min_ms: 0,
            },
            ChannelKind::Iaq => ChannelInfo {
                kind: self,
                unit: Unit::Index,
                range_min: 0,
                range_max: 100,
                period_min_ms: 0,
            },
        }
    }

    /// Fixed-point scaling factor applied to the raw estimate.
    pub fn scale_factor(self) -> i32 {
        match self {
            ChannelKind::Ethanol | ChannelKind::Tvoc => 1000,
            ChannelKind::Eco2 => 1,
            ChannelKind::Iaq => 10,
        }
    }

    /// Extracts this channel's scalar from a cycle's estimates, scaled into
    /// the channel's fixed-point unit (half-up rounding; concentrations are
    /// never negative).
    pub fn extract(self, estimates: &Estimates) -> i32 {
        let raw = match self {
            ChannelKind::Ethanol => estimates.etoh,
            ChannelKind::Tvoc => estimates.tvoc,
            ChannelKind::Eco2 => estimates.eco2,
            ChannelKind::Iaq => estimates.iaq,
        };
        (raw * self.scale_factor() as f32 + 0.5) as i32
    }
}

/// One scaled reading from a channel fetch.
///
/// Timestamping is left to the embedding: a `no_std` core carries no clock,
/// so callers attach time at the fetch call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    /// The channel's scalar in its fixed-point unit.
    pub value: i32,
    /// Whether the producing cycle was representative or still warming up.
    pub stability: Stability,
}

struct Shared<I2C, A> {
    sensor: Zmod4410<I2C, Ready>,
    algorithm: A,
}

/// Owns one prepared sensor plus its algorithm state and serves the four
/// logical channels from it.
///
/// The `RefCell` is the single mutual-exclusion point around "run one
/// cycle": a fetch holds the borrow for its whole cycle, so interleaved
/// fetches on other channels of the same sensor can never re-trigger the
/// hardware mid-cycle. Callers dispatching channels from independent tasks
/// wrap the `Channels` value in their executor's mutex; distinct physical
/// sensors are fully independent.
pub struct Channels<I2C, A> {
    shared: RefCell<Shared<I2C, A>>,
}

impl<I2C, A, E> Channels<I2C, A>
where
    I2C: i2c::I2c<Error = E>,
    A: AirQualityAlgorithm,
{
    /// Pairs a prepared sensor with its (already initialized) algorithm.
    pub fn new(sensor: Zmod4410<I2C, Ready>, algorithm: A) -> Self {
        Channels {
            shared: RefCell::new(Shared { sensor, algorithm }),
        }
    }

    /// Hands out all four channels, in [`ChannelKind::ALL`] order.
    pub fn split(&self) -> [Channel<'_, I2C, A>; 4] {
        ChannelKind::ALL.map(|kind| self.channel(kind))
    }

    /// Hands out the channel for one kind.
    pub fn channel(&self, kind: ChannelKind) -> Channel<'_, I2C, A> {
        Channel {
            kind,
            channels: self,
        }
    }

    /// Tears the fan-out down, returning the sensor and algorithm.
    pub fn release(self) -> (Zmod4410<I2C, Ready>, A) {
        let shared = self.shared.into_inner();
        (shared.sensor, shared.algorithm)
    }
}

/// Fetch handle for one logical measurement stream.
pub struct Channel<'a, I2C, A> {
    kind: ChannelKind,
    channels: &'a Channels<I2C, A>,
}

impl<'a, I2C, A, E> Channel<'a, I2C, A>
where
    I2C: i2c::I2c<Error = E>,
    A: AirQualityAlgorithm,
{
    /// This channel's kind.
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// This channel's registration descriptor.
    pub fn info(&self) -> ChannelInfo {
        self.kind.info()
    }

    /// Runs one full measurement cycle and returns this channel's scalar.
    ///
    /// A cycle failure is returned as-is; no placeholder value is ever
    /// synthesized. [`Error::Busy`](crate::Error::Busy) reports a cycle
    /// already in flight on the same sensor.
    pub fn fetch(&self, delay: &mut impl DelayNs) -> error::Result<Reading, E> {
        let mut shared = self
            .channels
            .shared
            .try_borrow_mut()
            .map_err(|_| error::Error::Busy)?;
        let shared = &mut *shared;

        let result = shared.sensor.measure(&mut shared.algorithm, delay)?;
        Ok(Reading {
            value: self.kind.extract(&result.estimates),
            stability: result.stability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Evaluation;
    use crate::test_support::{estimates, good_cycle, trigger, StubAlgorithm};
    use crate::{ready_for_tests, Error};
    use embedded_hal::i2c::ErrorKind;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::i2c::Mock as I2cMock;

    #[test]
    fn descriptor_table_covers_all_kinds() {
        for kind in ChannelKind::ALL {
            let info = kind.info();
            assert_eq!(info.kind, kind);
            assert!(info.range_min < info.range_max);
        }
        assert_eq!(ChannelKind::Eco2.info().range_max, 1000);
        assert_eq!(ChannelKind::Tvoc.info().unit, Unit::MilligramsPerCubicMeter);
    }

    #[test]
    fn scaling_law() {
        // etoh=1.234 -> 1234 (x1000), tvoc=5.678 -> 5678 (x1000),
        // eco2=400.0 -> 400 (unscaled), iaq=42.5 -> 425 (x10).
        let estimates = estimates();
        assert_eq!(ChannelKind::Ethanol.extract(&estimates), 1234);
        assert_eq!(ChannelKind::Tvoc.extract(&estimates), 5678);
        assert_eq!(ChannelKind::Eco2.extract(&estimates), 400);
        assert_eq!(ChannelKind::Iaq.extract(&estimates), 425);
    }

    #[test]
    fn interleaved_fetches_trigger_once_per_cycle() {
        // Two channel fetches, two cycles, exactly two triggers: the mock
        // rejects any additional trigger write.
        let mut expectations = good_cycle(0);
        expectations.extend(good_cycle(0));

        let mut i2c = I2cMock::new(&expectations);
        let channels = Channels::new(ready_for_tests(i2c.clone()), StubAlgorithm::valid());
        let [etoh, tvoc, _eco2, _iaq] = channels.split();
        let mut delay = NoopDelay::new();

        let first = etoh.fetch(&mut delay).unwrap();
        let second = tvoc.fetch(&mut delay).unwrap();
        assert_eq!(first.value, 1234);
        assert_eq!(second.value, 5678);

        let (_, algorithm) = channels.release();
        assert_eq!(algorithm.calls, 2);
        i2c.done();
    }

    #[test]
    fn fetch_propagates_cycle_failure_without_placeholder() {
        let expectations = [trigger().with_error(ErrorKind::Other)];
        let mut i2c = I2cMock::new(&expectations);
        let channels = Channels::new(ready_for_tests(i2c.clone()), StubAlgorithm::valid());
        let iaq = channels.channel(ChannelKind::Iaq);
        let mut delay = NoopDelay::new();

        assert!(matches!(iaq.fetch(&mut delay), Err(Error::Bus(_))));
        i2c.done();
    }

    #[test]
    fn warming_up_flag_reaches_the_reading() {
        let mut i2c = I2cMock::new(&good_cycle(0));
        let algorithm = StubAlgorithm {
            outcome: Evaluation::Stabilizing(estimates()),
            calls: 0,
        };
        let channels = Channels::new(ready_for_tests(i2c.clone()), algorithm);
        let mut delay = NoopDelay::new();

        let reading = channels
            .channel(ChannelKind::Ethanol)
            .fetch(&mut delay)
            .unwrap();
        assert_eq!(reading.stability, Stability::WarmingUp);
        assert_eq!(reading.value, 1234);
        i2c.done();
    }

    #[test]
    fn fetch_while_cycle_in_flight_reports_busy() {
        let mut i2c = I2cMock::new(&[]);
        let channels = Channels::new(ready_for_tests(i2c.clone()), StubAlgorithm::valid());
        let eco2 = channels.channel(ChannelKind::Eco2);
        let mut delay = NoopDelay::new();

        // Hold the cycle exclusion point the way an in-flight fetch does.
        let guard = channels.shared.borrow_mut();
        assert_eq!(eco2.fetch(&mut delay), Err(Error::Busy));
        drop(guard);
        i2c.done();
    }
}
