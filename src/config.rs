//! Register map, sequencer configuration and timing constants for the
//! ZMOD4410 running the IAQ 2nd Gen measurement sequence.

/// Default 7-bit I2C address of the ZMOD4410.
pub const DEFAULT_ADDRESS: u8 = 0x32;

/// Product id the device must report at info-read time.
pub const PRODUCT_ID: u16 = 0x2310;

/// Length of the device configuration block at [`reg::CONF`].
pub const CONF_LEN: usize = 6;

/// Length of the production data block at [`reg::PROD_DATA`].
pub const PROD_DATA_LEN: usize = 7;

/// Length of one raw ADC result for the IAQ 2nd Gen sequence.
pub const ADC_RESULT_LEN: usize = 32;

/// Register addresses.
pub mod reg {
    /// Product id, 2 bytes big-endian.
    pub const PID: u8 = 0x00;
    /// Device configuration block.
    pub const CONF: u8 = 0x20;
    /// Production (calibration) data block.
    pub const PROD_DATA: u8 = 0x26;
    /// Heater sequencer segment.
    pub const HEATER: u8 = 0x40;
    /// Delay sequencer segment.
    pub const DELAY: u8 = 0x50;
    /// Measurement sequencer segment.
    pub const MEASUREMENT: u8 = 0x60;
    /// Sequencer step table.
    pub const SEQUENCER: u8 = 0x68;
    /// Command register; writing a start byte launches the sequencer.
    pub const CMD: u8 = 0x93;
    /// Status register.
    pub const STATUS: u8 = 0x94;
    /// Result data, read back once the sequencer stops.
    pub const RESULT: u8 = 0x97;
    /// Error event register, inspected after a timeout.
    pub const ERROR: u8 = 0xB7;
}

/// Status register bits.
pub mod status {
    /// An internal conversion sequence is still in progress.
    pub const SEQUENCER_RUNNING: u8 = 0x80;
    /// The sleep timer between sequencer steps is enabled.
    pub const SLEEP_TIMER_ENABLED: u8 = 0x40;
    /// Alarm condition.
    pub const ALARM: u8 = 0x20;
    /// Index of the last executed sequencer step.
    pub const LAST_SEQ_STEP_MASK: u8 = 0x1F;
}

/// Error event register bits.
pub mod event {
    /// The device lost power and restarted; configuration is gone.
    pub const POR_EVENT: u8 = 0x80;
    /// Register access collided with the running sequencer.
    pub const ACCESS_CONFLICT: u8 = 0x40;
}

/// Interval between status polls while a measurement is running.
pub const POLL_INTERVAL_MS: u32 = 200;

/// Interval between status polls while the init sequence is running.
pub const PREPARE_POLL_INTERVAL_MS: u32 = 50;

/// Last allowed status poll before a running measurement counts as timed out.
///
/// The IAQ 2nd Gen sequence completes in about 3 s; 50 polls at 200 ms gives
/// a 10 s guard against a wedged sequencer.
pub const POLL_RETRY_LIMIT: u32 = 50;

/// Rest period after each evaluated cycle.
///
/// The sensing element's thermal/chemical duty cycle requires this pause
/// before the next trigger; shortening it yields invalid readings.
pub const INTER_CYCLE_DELAY_MS: u32 = 1990;

/// One sequencer configuration segment: a register base and the bytes
/// written there back-to-back.
#[derive(Debug, Clone, Copy)]
pub struct ConfigSegment {
    pub addr: u8,
    pub data: &'static [u8],
}

/// Largest segment payload across both sequencer configurations.
pub(crate) const MAX_SEGMENT_LEN: usize = 48;

/// A complete sequencer configuration: the four segments loaded into the
/// device plus the command byte that launches the sequence and the number
/// of result bytes it produces.
#[derive(Debug, Clone, Copy)]
pub struct SequencerConfig {
    pub heater: ConfigSegment,
    pub delay: ConfigSegment,
    pub measurement: ConfigSegment,
    pub sequencer: ConfigSegment,
    pub start: u8,
    pub result_len: usize,
}

impl SequencerConfig {
    /// The four segments in load order.
    pub fn segments(&self) -> [ConfigSegment; 4] {
        [self.heater, self.delay, self.measurement, self.sequencer]
    }
}

/// One-shot init sequence run during sensor preparation. Its 4-byte result
/// carries the `mox_lr`/`mox_er` calibration words.
pub const INIT: SequencerConfig = SequencerConfig {
    heater: ConfigSegment {
        addr: reg::HEATER,
        data: &[0x00, 0x50],
    },
    delay: ConfigSegment {
        addr: reg::DELAY,
        data: &[0x00, 0x28, 0xC3, 0xE3],
    },
    measurement: ConfigSegment {
        addr: reg::MEASUREMENT,
        data: &[0xC3],
    },
    sequencer: ConfigSegment {
        addr: reg::SEQUENCER,
        data: &[0x00, 0x00, 0x80, 0x40],
    },
    start: 0x80,
    result_len: 4,
};

/// IAQ 2nd Gen measurement sequence, loaded once at preparation time and
/// re-triggered through the command register every cycle.
pub const MEASUREMENT: SequencerConfig = SequencerConfig {
    heater: ConfigSegment {
        addr: reg::HEATER,
        data: &[
            0x00, 0x50, 0xFF, 0x38, 0xFE, 0xD4, 0xFE, 0x70, 0xFE, 0x0C, 0xFD, 0xA8, 0xFD, 0x44,
            0xFC, 0xE0,
        ],
    },
    delay: ConfigSegment {
        addr: reg::DELAY,
        data: &[0x00, 0x52, 0x02, 0x67, 0x00, 0xCD, 0x03, 0x34],
    },
    measurement: ConfigSegment {
        addr: reg::MEASUREMENT,
        data: &[0x23, 0x03, 0xA3, 0x43],
    },
    sequencer: ConfigSegment {
        addr: reg::SEQUENCER,
        data: &[
            0x00, 0x00, 0x06, 0x49, 0x06, 0x4A, 0x06, 0x4B, 0x06, 0x4C, 0x06, 0x4D, 0x06, 0x4E,
            0x06, 0x97, 0x06, 0xD7, 0x06, 0x57, 0x06, 0x4E, 0x06, 0x4D, 0x06, 0x4C, 0x06, 0x4B,
            0x06, 0x4A, 0x86, 0x59,
        ],
    },
    start: 0x80,
    result_len: ADC_RESULT_LEN,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_payloads_fit_write_buffer() {
        for seg in INIT.segments().iter().chain(MEASUREMENT.segments().iter()) {
            assert!(seg.data.len() <= MAX_SEGMENT_LEN);
        }
    }

    #[test]
    fn measurement_result_is_full_adc_frame() {
        assert_eq!(MEASUREMENT.result_len, ADC_RESULT_LEN);
        assert_eq!(INIT.result_len, 4);
    }
}
