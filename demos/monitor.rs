//! Example: Continuous air-quality monitoring with the ZMOD4410.
//!
//! This example demonstrates:
//! 1. **Bring-up**: identifying and preparing the sensor.
//! 2. **Channel Fan-out**: serving EtOH, TVOC, eCO2 and IAQ from one
//!    physical sensor without re-triggering hardware per channel.
//! 3. **Loop Control**: stopping the demo through a `StopSignal`, the way
//!    an edge-triggered key interrupt would.
//!
//! It runs on the host against a scripted `embedded-hal-mock` bus and a stub
//! algorithm, so the wiring can be followed (and executed) without hardware;
//! on a target, swap in the board's `I2c`/`DelayNs` implementations and an
//! algorithm wrapping the vendor IAQ library, and call `stop.notify()` from
//! the key interrupt handler.

use std::time::SystemTime;

use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction};

use zmod4410_driver::algorithm::{
    AdcResult, AirQualityAlgorithm, Estimates, Evaluation, SensorParams,
};
use zmod4410_driver::channel::Channels;
use zmod4410_driver::signal::StopSignal;
use zmod4410_driver::{config, Zmod4410};

/// Stand-in for the vendor IAQ 2nd Gen library: reports warm-up for the
/// first cycles, then valid figures.
#[derive(Default)]
struct DemoAlgorithm {
    samples: u32,
}

impl AirQualityAlgorithm for DemoAlgorithm {
    fn evaluate(&mut self, _params: &SensorParams<'_>, _sample: &AdcResult) -> Evaluation {
        self.samples += 1;
        let estimates = Estimates {
            rmox: [120_000.0; 13],
            log_rcda: 4.9,
            etoh: 0.012 * self.samples as f32,
            tvoc: 0.15,
            eco2: 400.0 + self.samples as f32,
            iaq: 25.0,
        };
        if self.samples <= 2 {
            Evaluation::Stabilizing(estimates)
        } else {
            Evaluation::Valid(estimates)
        }
    }
}

const CYCLES: usize = 4;

/// Scripts the bus traffic of bring-up plus `CYCLES` measurement cycles,
/// each serving all four channels from the fan-out (one trigger per fetch).
fn scripted_bus() -> Vec<Transaction> {
    let addr = config::DEFAULT_ADDRESS;
    let mut t = vec![
        Transaction::write_read(addr, vec![config::reg::PID], vec![0x23, 0x10]),
        Transaction::write_read(addr, vec![config::reg::CONF], vec![0; config::CONF_LEN]),
        Transaction::write_read(
            addr,
            vec![config::reg::PROD_DATA],
            vec![0; config::PROD_DATA_LEN],
        ),
    ];
    for segment in config::INIT.segments().iter() {
        let mut bytes = vec![segment.addr];
        bytes.extend_from_slice(segment.data);
        t.push(Transaction::write(addr, bytes));
    }
    t.push(Transaction::write(
        addr,
        vec![config::reg::CMD, config::INIT.start],
    ));
    t.push(Transaction::write_read(
        addr,
        vec![config::reg::STATUS],
        vec![0x00],
    ));
    t.push(Transaction::write_read(
        addr,
        vec![config::reg::RESULT],
        vec![0x0A, 0xBC, 0x0D, 0xEF],
    ));
    for segment in config::MEASUREMENT.segments().iter() {
        let mut bytes = vec![segment.addr];
        bytes.extend_from_slice(segment.data);
        t.push(Transaction::write(addr, bytes));
    }

    // One fetch per channel per loop iteration, four cycles each.
    for _ in 0..CYCLES * 4 {
        t.push(Transaction::write(
            addr,
            vec![config::reg::CMD, config::MEASUREMENT.start],
        ));
        t.push(Transaction::write_read(
            addr,
            vec![config::reg::STATUS],
            vec![config::status::SEQUENCER_RUNNING],
        ));
        t.push(Transaction::write_read(
            addr,
            vec![config::reg::STATUS],
            vec![0x00],
        ));
        t.push(Transaction::write_read(
            addr,
            vec![config::reg::RESULT],
            vec![0; config::ADC_RESULT_LEN],
        ));
    }
    t
}

fn main() {
    let mut i2c = I2cMock::new(&scripted_bus());
    let mut delay = NoopDelay::new();

    let sensor = Zmod4410::new(i2c.clone(), config::DEFAULT_ADDRESS)
        .read_info(&mut delay)
        .expect("failed to identify sensor")
        .prepare(&mut delay)
        .expect("failed to prepare sensor");

    let channels = Channels::new(sensor, DemoAlgorithm::default());
    let four = channels.split();

    let stop = StopSignal::new();
    let mut iterations = 0;

    println!("Evaluate measurements in a loop.");
    while !stop.take() {
        for channel in &four {
            match channel.fetch(&mut delay) {
                Ok(reading) => {
                    // The core carries no clock; attach time at the call site.
                    let timestamp = SystemTime::now();
                    println!(
                        "{:?} {:?} = {} {:?} [{:?}]",
                        timestamp,
                        channel.kind(),
                        reading.value,
                        channel.info().unit,
                        reading.stability,
                    );
                }
                Err(err) => println!("{:?} fetch failed: {:?}", channel.kind(), err),
            }
        }

        iterations += 1;
        if iterations == CYCLES {
            // Stand-in for the key-press edge interrupt.
            stop.notify();
        }
    }

    let (sensor, _) = channels.release();
    drop(sensor.release());
    i2c.done();
}
