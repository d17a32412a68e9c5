//! Boundary to the gas estimation algorithm.
//!
//! The IAQ 2nd Gen library turns one raw ADC frame into calibrated air
//! quality figures. Its numerics are licensed, precompiled vendor code and
//! deliberately not reimplemented here; this module only fixes the contract
//! the acquisition cycle relies on. Implementations typically wrap the
//! vendor library's opaque handle and keep whatever history it needs across
//! cycles.

use crate::config::{ADC_RESULT_LEN, CONF_LEN, PROD_DATA_LEN};

/// One raw ADC frame as read from the result registers.
pub type AdcResult = [u8; ADC_RESULT_LEN];

/// Read-only view of the per-device data the algorithm consumes alongside
/// each raw sample.
#[derive(Debug, Clone, Copy)]
pub struct SensorParams<'a> {
    /// Device configuration block read at info time.
    pub config: &'a [u8; CONF_LEN],
    /// Factory production data read at info time.
    pub prod_data: &'a [u8; PROD_DATA_LEN],
    /// Low-resistance calibration word from the init sequence.
    pub mox_lr: u16,
    /// High-resistance calibration word from the init sequence.
    pub mox_er: u16,
}

/// Calibrated figures for one completed cycle. Every field is populated
/// whenever the algorithm returns a non-fault outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Estimates {
    /// Per-element sensing resistances in Ohm.
    pub rmox: [f32; 13],
    /// log10 of the clean-dry-air resistance.
    pub log_rcda: f32,
    /// Ethanol concentration in ppm.
    pub etoh: f32,
    /// Total volatile organic compounds in mg/m^3.
    pub tvoc: f32,
    /// CO2 equivalent in ppm.
    pub eco2: f32,
    /// Aggregate indoor air quality index.
    pub iaq: f32,
}

/// Outcome of one algorithm invocation.
///
/// `Stabilizing` is not an error: the estimates are numerically sound but
/// the element is still warming up (the IAQ 2nd Gen library spends roughly
/// its first 60 samples there after a cold start). Any other non-`Valid`
/// outcome carries the library's fault code and aborts the cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Evaluation {
    Valid(Estimates),
    Stabilizing(Estimates),
    Fault(i8),
}

/// Whether a cycle result is representative yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stability {
    /// The element has settled; the estimates are representative.
    Valid,
    /// Early samples after cold start; usable for telemetry, flagged for
    /// consumers that need settled data.
    WarmingUp,
}

/// Structured result of one completed measurement cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AirQuality {
    pub estimates: Estimates,
    pub stability: Stability,
}

/// The estimation transform consumed by [`Zmod4410::measure`].
///
/// [`Zmod4410::measure`]: crate::Zmod4410::measure
pub trait AirQualityAlgorithm {
    /// Evaluates one raw ADC frame against the device's calibration data.
    fn evaluate(&mut self, params: &SensorParams<'_>, sample: &AdcResult) -> Evaluation;
}
