//! Physical constants and detection thresholds

/// Speed of light in vacuum (m.s⁻¹)
pub const SPEED_OF_LIGHT_M_S: f64 = 299_792_458.0;

/// L1 / E1 carrier frequency (Hz)
pub const L1_FREQUENCY_HZ: f64 = 1_575.42E6;

/// L2 carrier frequency (Hz)
pub const L2_FREQUENCY_HZ: f64 = 1_227.60E6;

/// L5 / E5a carrier frequency (Hz)
pub const L5_FREQUENCY_HZ: f64 = 1_176.45E6;

/// Minimal MW-like jump (cycles) for it to be considered a slip candidate.
pub(crate) const MW_JUMP_THRESHOLD_CYCLES: f64 = 0.5;

/// Maximal distance of a MW-like jump to the nearest integer (cycles).
pub(crate) const MW_INTEGER_TOLERANCE_CYCLES: f64 = 0.35;

/// Minimal TEC-like jump (cycles) for it to be considered a slip candidate,
/// without moving window test. Below the (1, 1) signature of all band pairs.
pub(crate) const TEC_JUMP_THRESHOLD_CYCLES: f64 = 0.2;

/// Maximal TEC-like misclosure of an integer slip solution (cycles).
pub(crate) const TEC_CLOSURE_TOLERANCE_CYCLES: f64 = 0.1;

/// Lower bound of the TEC-like noise level (cycles).
pub(crate) const TEC_SIGMA_FLOOR_CYCLES: f64 = 0.01;

/// Lower bound of the a-posteriori sigma in combination screening (cycles).
pub(crate) const COMBINATION_SIGMA_FLOOR_CYCLES: f64 = 0.01;

/// Lower bound of the a-posteriori sigma in code clock estimation (m).
pub(crate) const CODE_SIGMA_FLOOR_M: f64 = 0.1;

/// Weights variation under which the robust estimation is considered converged.
pub(crate) const WEIGHTS_CONVERGENCE: f64 = 1.0E-3;

/// Approximate signal propagation time, first light time guess (s).
pub(crate) const APPROX_PROPAGATION_TIME_S: f64 = 0.075;
