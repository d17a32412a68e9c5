#![cfg_attr(not(test), no_std)]

//! # ZMOD4410 Gas Sensor Driver
//!
//! A type-safe, `no_std` driver for the Renesas ZMOD4410 indoor air quality
//! sensor. The driver uses the typestate pattern to ensure the sensor is
//! identified and prepared before measurements are taken, and drives the
//! full acquisition cycle per measurement: trigger, bounded status polling,
//! raw ADC readout, algorithm evaluation and the mandatory rest period.
//!
//! ## Features
//! - **Typestate Pattern**: Prevents measuring before preparation.
//! - **Bounded Polling**: Timeouts are distinguished from device-reported
//!   faults by inspecting the error event register.
//! - **Channel Fan-out**: One physical cycle serves four logical channels
//!   (EtOH, TVOC, eCO2, IAQ) in caller-chosen fixed-point units, see
//!   [`channel`].
//! - **External Algorithm**: The calibrated-figure computation is a vendor
//!   library; this crate only defines its boundary, see [`algorithm`].
//!
//! ## Units
//! - **EtOH**: milli-ppm through the channel surface -> 1234 = 1.234 ppm
//! - **TVOC**: milli-mg/m^3 -> 5678 = 5.678 mg/m^3
//! - **eCO2**: ppm, unscaled
//! - **IAQ**: index * 10 -> 425 = 42.5
//!
//! ## Usage
//!
//! ```no_run
//! use embedded_hal_mock::eh1::{delay::NoopDelay, i2c::Mock};
//! use zmod4410_driver::algorithm::{AdcResult, Evaluation, SensorParams};
//! use zmod4410_driver::{config, Zmod4410};
//!
//! // Any implementation wrapping the vendor IAQ library.
//! struct Iaq2ndGen;
//! impl zmod4410_driver::algorithm::AirQualityAlgorithm for Iaq2ndGen {
//!     fn evaluate(&mut self, params: &SensorParams<'_>, sample: &AdcResult) -> Evaluation {
//!         unimplemented!("calls into the vendor library")
//!     }
//! }
//!
//! let i2c = Mock::new(&[]);
//! let mut delay = NoopDelay::new();
//! let mut algorithm = Iaq2ndGen;
//!
//! let mut sensor = Zmod4410::new(i2c, config::DEFAULT_ADDRESS)
//!     .read_info(&mut delay)
//!     .unwrap()
//!     .prepare(&mut delay)
//!     .unwrap();
//!
//! let result = sensor.measure(&mut algorithm, &mut delay).unwrap();
//! ```

pub mod algorithm;
pub mod channel;
pub mod config;
pub mod signal;

use core::marker::PhantomData;
use embedded_hal::{delay::DelayNs, i2c};

use algorithm::{AdcResult, AirQuality, AirQualityAlgorithm, Evaluation, SensorParams, Stability};
use config::{ConfigSegment, CONF_LEN, PROD_DATA_LEN};

pub use error::{Error, FaultEvent};

// --- Typestates ---

/// Sensor has been bound to an address but not yet identified.
pub struct Uninitialized;
/// Product id and calibration blocks have been read and verified.
pub struct Identified;
/// Init sequence ran and the measurement configuration is loaded; the
/// sensor accepts measurement triggers.
pub struct Ready;

/// Error types for the ZMOD4410 driver.
pub mod error {
    /// Errors that can occur during communication or a measurement cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Error<E> {
        /// I2C transfer failed; the operation was aborted without retry.
        Bus(E),
        /// The device reported an unexpected product id at info-read time.
        InvalidProductId(u16),
        /// The sequencer never reported completion within the poll budget
        /// and the error event register showed no fault.
        Timeout,
        /// The device flagged a fault in its error event register. Repeated
        /// faults usually indicate a persistent hardware condition worth
        /// escalating, unlike a lone [`Error::Timeout`].
        DeviceFault(FaultEvent),
        /// The estimation algorithm returned a code other than valid or
        /// stabilizing; no result was produced for this cycle.
        Algorithm(i8),
        /// Another channel's measurement cycle currently holds the sensor.
        Busy,
    }

    /// Device-reported fault, decoded from the error event register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum FaultEvent {
        /// The device lost power and restarted; its configuration is gone
        /// and the session must be re-initialized.
        PowerOnReset,
        /// A register access collided with the running sequencer.
        AccessConflict,
        /// Unrecognized event bits, reported raw.
        Other(u8),
    }

    /// Result type alias for ZMOD4410 operations.
    pub type Result<T, E> = core::result::Result<T, Error<E>>;
}

/// Snapshot of the status register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(u8);

impl Status {
    /// Wraps a raw status byte.
    pub fn new(bits: u8) -> Self {
        Status(bits)
    }

    /// Raw register contents.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// `true` while an internal conversion sequence is in progress. Results
    /// must not be read before this clears.
    pub fn sequencer_running(&self) -> bool {
        self.0 & config::status::SEQUENCER_RUNNING != 0
    }

    /// `true` while the inter-step sleep timer is enabled.
    pub fn sleep_timer_enabled(&self) -> bool {
        self.0 & config::status::SLEEP_TIMER_ENABLED != 0
    }

    /// `true` if the device raised its alarm flag.
    pub fn alarm(&self) -> bool {
        self.0 & config::status::ALARM != 0
    }

    /// Index of the last executed sequencer step.
    pub fn last_sequence_step(&self) -> u8 {
        self.0 & config::status::LAST_SEQ_STEP_MASK
    }
}

/// The main ZMOD4410 driver structure.
///
/// Use `Zmod4410::new(...)` to start. The `STATE` generic uses the typestate
/// pattern to track bring-up status at compile time: [`Uninitialized`] →
/// [`Identified`] (via [`read_info`](Zmod4410::read_info)) → [`Ready`]
/// (via [`prepare`](Zmod4410::prepare)).
#[derive(Debug)]
pub struct Zmod4410<I2C, STATE> {
    i2c: I2C,
    address: u8,
    /// Device configuration block, read once at info time.
    device_config: [u8; CONF_LEN],
    /// Factory production data, read once at info time.
    prod_data: [u8; PROD_DATA_LEN],
    /// Calibration words produced by the init sequence.
    mox_lr: u16,
    mox_er: u16,
    _state: PhantomData<STATE>,
}

impl<I2C, E> Zmod4410<I2C, Uninitialized>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Creates a new driver instance bound to `address`.
    ///
    /// This does not communicate with the sensor yet.
    pub fn new(i2c: I2C, address: u8) -> Zmod4410<I2C, Uninitialized> {
        Zmod4410 {
            i2c,
            address,
            device_config: [0; CONF_LEN],
            prod_data: [0; PROD_DATA_LEN],
            mox_lr: 0,
            mox_er: 0,
            _state: PhantomData,
        }
    }

    /// Reads and verifies the product id, then loads the device
    /// configuration and production data blocks.
    ///
    /// # Errors
    /// [`Error::InvalidProductId`] if the part is not a ZMOD4410;
    /// [`Error::Bus`] on a failed transfer. Either is fatal to bring-up.
    pub fn read_info(
        mut self,
        delay: &mut impl DelayNs,
    ) -> error::Result<Zmod4410<I2C, Identified>, E> {
        // The device needs a moment after power-up before it answers.
        delay.delay_ms(2);

        let mut pid = [0u8; 2];
        self.read_into(config::reg::PID, &mut pid)?;
        let pid = u16::from_be_bytes(pid);
        if pid != config::PRODUCT_ID {
            return Err(error::Error::InvalidProductId(pid));
        }

        let mut device_config = [0u8; CONF_LEN];
        self.read_into(config::reg::CONF, &mut device_config)?;

        let mut prod_data = [0u8; PROD_DATA_LEN];
        self.read_into(config::reg::PROD_DATA, &mut prod_data)?;

        Ok(Zmod4410 {
            i2c: self.i2c,
            address: self.address,
            device_config,
            prod_data,
            mox_lr: 0,
            mox_er: 0,
            _state: PhantomData,
        })
    }
}

impl<I2C, STATE, E> Zmod4410<I2C, STATE>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Reads `buffer.len()` bytes starting at `reg_address`.
    ///
    /// The register address is written without releasing the bus, followed
    /// by the read transfer.
    fn read_into(&mut self, reg_address: u8, buffer: &mut [u8]) -> error::Result<(), E> {
        self.i2c
            .write_read(self.address, &[reg_address], buffer)
            .map_err(error::Error::Bus)
    }

    /// Reads a single byte from a specific register address.
    fn read_reg_byte(&mut self, reg_address: u8) -> error::Result<u8, E> {
        let mut buffer = [0];
        self.read_into(reg_address, &mut buffer)?;
        Ok(buffer[0])
    }

    /// Writes a byte slice (`[Register, Value...]`) to the sensor.
    ///
    /// The embedding's bus implementation is expected to tolerate a missing
    /// acknowledgment on the data phase, as the device NAKs configuration
    /// writes issued while it reorganizes its sequencer.
    fn write_reg(&mut self, data: &[u8]) -> error::Result<(), E> {
        self.i2c.write(self.address, data).map_err(error::Error::Bus)
    }

    /// Writes one sequencer configuration segment to its register base.
    fn write_segment(&mut self, segment: &ConfigSegment) -> error::Result<(), E> {
        let mut buffer = [0u8; config::MAX_SEGMENT_LEN + 1];
        let len = segment.data.len();
        buffer[0] = segment.addr;
        buffer[1..=len].copy_from_slice(segment.data);
        self.write_reg(&buffer[..=len])
    }

    /// Reads the status register.
    pub fn read_status(&mut self) -> error::Result<Status, E> {
        Ok(Status::new(self.read_reg_byte(config::reg::STATUS)?))
    }

    /// Inspects the device's error event register.
    ///
    /// Called when a timeout has already occurred, to distinguish a
    /// device-signaled fault from lost synchronization or a still-busy
    /// sequencer. Returns `Ok(())` when no event is flagged.
    pub fn check_error_event(&mut self) -> error::Result<(), E> {
        let event = self.read_reg_byte(config::reg::ERROR)?;
        if event == 0 {
            return Ok(());
        }
        let fault = if event & config::event::POR_EVENT != 0 {
            FaultEvent::PowerOnReset
        } else if event & config::event::ACCESS_CONFLICT != 0 {
            FaultEvent::AccessConflict
        } else {
            FaultEvent::Other(event)
        };
        Err(error::Error::DeviceFault(fault))
    }

    /// Gives the I2C bus back.
    pub fn release(self) -> I2C {
        self.i2c
    }
}

impl<I2C, E> Zmod4410<I2C, Identified>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Prepares the sensor for measurements.
    ///
    /// Runs the one-shot init sequence (yielding the `mox_lr`/`mox_er`
    /// calibration words) and loads the measurement configuration, so each
    /// later trigger is a single command write. Must run exactly once per
    /// session; the typestate enforces this.
    pub fn prepare(mut self, delay: &mut impl DelayNs) -> error::Result<Zmod4410<I2C, Ready>, E> {
        // 1. Load and launch the init sequence.
        for segment in config::INIT.segments().iter() {
            self.write_segment(segment)?;
        }
        self.write_reg(&[config::reg::CMD, config::INIT.start])?;

        // 2. Wait for the init sequence to finish. It is short; the poll
        //    budget here only guards against a wedged part.
        let mut polls: u32 = 0;
        loop {
            let status = self.read_status()?;
            polls += 1;
            if !status.sequencer_running() {
                break;
            }
            if polls > config::POLL_RETRY_LIMIT {
                return Err(error::Error::Timeout);
            }
            delay.delay_ms(config::PREPARE_POLL_INTERVAL_MS);
        }

        // 3. The init result carries the calibration words.
        let mut result = [0u8; 4];
        self.read_into(config::reg::RESULT, &mut result)?;
        let mox_lr = u16::from_be_bytes([result[0], result[1]]);
        let mox_er = u16::from_be_bytes([result[2], result[3]]);

        // 4. Load the measurement configuration for all subsequent cycles.
        for segment in config::MEASUREMENT.segments().iter() {
            self.write_segment(segment)?;
        }

        Ok(Zmod4410 {
            i2c: self.i2c,
            address: self.address,
            device_config: self.device_config,
            prod_data: self.prod_data,
            mox_lr,
            mox_er,
            _state: PhantomData,
        })
    }
}

impl<I2C, E> Zmod4410<I2C, Ready>
where
    I2C: i2c::I2c<Error = E>,
{
    /// Triggers one measurement sequence.
    ///
    /// The sensor begins an internal conversion whose completion is
    /// observed only through [`read_status`](Zmod4410::read_status).
    pub fn start_measurement(&mut self) -> error::Result<(), E> {
        self.write_reg(&[config::reg::CMD, config::MEASUREMENT.start])
    }

    /// Reads one raw ADC frame.
    ///
    /// Valid only after the status register reports the sequencer stopped.
    pub fn read_adc(&mut self) -> error::Result<AdcResult, E> {
        let mut sample = [0u8; config::ADC_RESULT_LEN];
        self.read_into(config::reg::RESULT, &mut sample)?;
        Ok(sample)
    }

    /// Per-device data handed to the algorithm alongside each raw sample.
    pub fn params(&self) -> SensorParams<'_> {
        SensorParams {
            config: &self.device_config,
            prod_data: &self.prod_data,
            mox_lr: self.mox_lr,
            mox_er: self.mox_er,
        }
    }

    /// Runs one full measurement cycle.
    ///
    /// Trigger → poll with a bounded retry budget → raw ADC readout →
    /// algorithm evaluation → rest period. A failed cycle leaves the session
    /// untouched; the next call starts from the trigger again.
    ///
    /// The inter-poll sleep follows busy status reads only; once the
    /// sequencer reports done the readout proceeds immediately, so a cycle
    /// with `n` busy polls sleeps for `n` poll intervals plus the rest
    /// period rather than `n + 1`.
    ///
    /// # Errors
    /// - [`Error::Bus`] on any failed transfer.
    /// - [`Error::DeviceFault`] when a timeout investigation finds the error
    ///   event register set.
    /// - [`Error::Timeout`] when the sequencer never reported completion and
    ///   no fault was flagged.
    /// - [`Error::Algorithm`] when the transform returns a fault code.
    pub fn measure<A: AirQualityAlgorithm>(
        &mut self,
        algorithm: &mut A,
        delay: &mut impl DelayNs,
    ) -> error::Result<AirQuality, E> {
        // 1. Trigger the conversion sequence.
        self.start_measurement()?;

        // 2. Poll until the sequencer stops. The limit is the last allowed
        //    attempt; one extra read past it classifies the timeout.
        let mut polls: u32 = 0;
        loop {
            let status = self.read_status()?;
            polls += 1;
            if !status.sequencer_running() {
                break;
            }
            if polls > config::POLL_RETRY_LIMIT {
                // Distinguish a device-signaled fault from a lost or
                // still-busy sequencer before reporting the timeout.
                self.check_error_event()?;
                return Err(error::Error::Timeout);
            }
            delay.delay_ms(config::POLL_INTERVAL_MS);
        }

        // 3. Fetch the raw sample and hand it to the algorithm exactly once.
        let sample = self.read_adc()?;
        let evaluation = algorithm.evaluate(&self.params(), &sample);

        // 4. The sensing element's duty cycle requires this rest before the
        //    next trigger, whether or not a result was produced.
        delay.delay_ms(config::INTER_CYCLE_DELAY_MS);

        match evaluation {
            Evaluation::Valid(estimates) => Ok(AirQuality {
                estimates,
                stability: Stability::Valid,
            }),
            Evaluation::Stabilizing(estimates) => Ok(AirQuality {
                estimates,
                stability: Stability::WarmingUp,
            }),
            Evaluation::Fault(code) => Err(error::Error::Algorithm(code)),
        }
    }
}

/// Builds a `Ready` session without bus traffic, for exercising the cycle
/// logic against a mock bus.
#[cfg(test)]
pub(crate) fn ready_for_tests<I2C, E>(i2c: I2C) -> Zmod4410<I2C, Ready>
where
    I2C: i2c::I2c<Error = E>,
{
    Zmod4410 {
        i2c,
        address: config::DEFAULT_ADDRESS,
        device_config: [0x10, 0x21, 0x32, 0x43, 0x54, 0x65],
        prod_data: [0xA0, 0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xA6],
        mox_lr: 0x0123,
        mox_er: 0x4567,
        _state: PhantomData,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::algorithm::Estimates;
    use embedded_hal_mock::eh1::i2c::Transaction;

    pub const ADDR: u8 = config::DEFAULT_ADDRESS;

    pub fn estimates() -> Estimates {
        Estimates {
            rmox: [100_000.0; 13],
            log_rcda: 4.2,
            etoh: 1.234,
            tvoc: 5.678,
            eco2: 400.0,
            iaq: 42.5,
        }
    }

    /// Algorithm stub returning a fixed evaluation, counting invocations.
    pub struct StubAlgorithm {
        pub outcome: Evaluation,
        pub calls: usize,
    }

    impl StubAlgorithm {
        pub fn valid() -> Self {
            StubAlgorithm {
                outcome: Evaluation::Valid(estimates()),
                calls: 0,
            }
        }
    }

    impl AirQualityAlgorithm for StubAlgorithm {
        fn evaluate(&mut self, _params: &SensorParams<'_>, _sample: &AdcResult) -> Evaluation {
            self.calls += 1;
            self.outcome
        }
    }

    pub fn trigger() -> Transaction {
        Transaction::write(ADDR, vec![config::reg::CMD, config::MEASUREMENT.start])
    }

    pub fn status_read(byte: u8) -> Transaction {
        Transaction::write_read(ADDR, vec![config::reg::STATUS], vec![byte])
    }

    pub fn adc_read() -> Transaction {
        Transaction::write_read(
            ADDR,
            vec![config::reg::RESULT],
            vec![0u8; config::ADC_RESULT_LEN],
        )
    }

    pub fn segment_write(segment: &ConfigSegment) -> Transaction {
        let mut bytes = vec![segment.addr];
        bytes.extend_from_slice(segment.data);
        Transaction::write(ADDR, bytes)
    }

    /// Delay that tallies the total time requested instead of sleeping.
    pub struct RecordingDelay {
        total_ns: u64,
    }

    impl RecordingDelay {
        pub fn new() -> Self {
            RecordingDelay { total_ns: 0 }
        }

        pub fn total_ms(&self) -> u64 {
            self.total_ns / 1_000_000
        }
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    /// A successful cycle with the sequencer still running for `busy_polls`
    /// status reads before the ready one.
    pub fn good_cycle(busy_polls: usize) -> Vec<Transaction> {
        let mut expectations = vec![trigger()];
        for _ in 0..busy_polls {
            expectations.push(status_read(config::status::SEQUENCER_RUNNING));
        }
        expectations.push(status_read(0x00));
        expectations.push(adc_read());
        expectations
    }
}
