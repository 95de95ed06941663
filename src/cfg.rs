//! Preprocessing configuration
use crate::{errors::ConfigError, signal::Observable};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// [PreprocessingConfig] gathers all thresholds of the preprocessing.
/// [PreprocessingConfig::default] is the reference configuration.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PreprocessingConfig {
    /// Residuals above huber * sigma0 are downweighted
    pub huber: f64,
    /// Downweighting exponent of residuals above the huber threshold
    pub huber_power: f64,
    /// Maximal deviation (m) of a code position solution from the
    /// a-priori position
    pub code_max_position_diff: f64,
    /// Gross code outliers threshold, as a fraction of
    /// [Self::code_max_position_diff]
    pub gross_outlier_factor: f64,
    /// Total variation regularization parameter
    pub denoising_lambda: f64,
    /// Moving window size (epochs) of the TEC-like slip test, 0 disables it
    pub tec_window_size: usize,
    /// TEC-like slip test threshold, as a multiple of the moving sigma
    pub tec_sigma_factor: f64,
    /// Minimal number of epochs per track
    pub min_obs_count_per_track: usize,
    /// Observations below this elevation (degrees) are discarded
    pub elevation_cutoff_deg: f64,
    /// Tracks never rising above this elevation (degrees) are discarded
    pub elevation_track_minimum_deg: f64,
    /// Minimal ratio of estimable epochs for a station to be retained
    pub min_estimable_epochs_ratio: f64,
    /// Robust estimation iteration cap
    pub max_iterations: usize,
    /// Estimate one position per epoch in the code clock initialization
    pub estimate_kinematic_position: bool,
    /// Maximal number of stations to retain, if any
    pub max_station_count: Option<usize>,
    /// Track dump file name template, before cycle slip processing
    pub track_dump_before: Option<String>,
    /// Track dump file name template, after cycle slip processing
    pub track_dump_after: Option<String>,
    /// Only observations matching any of these [Observable] patterns are used
    /// (all of them when empty)
    pub use_types: Vec<String>,
    /// Observations matching any of these [Observable] patterns are ignored
    pub ignore_types: Vec<String>,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            huber: 2.5,
            huber_power: 1.5,
            code_max_position_diff: 100.0,
            gross_outlier_factor: 0.5,
            denoising_lambda: 5.0,
            tec_window_size: 15,
            tec_sigma_factor: 3.5,
            min_obs_count_per_track: 60,
            elevation_cutoff_deg: 5.0,
            elevation_track_minimum_deg: 15.0,
            min_estimable_epochs_ratio: 0.75,
            max_iterations: 20,
            estimate_kinematic_position: false,
            max_station_count: None,
            track_dump_before: None,
            track_dump_after: None,
            use_types: Vec::new(),
            ignore_types: Vec::new(),
        }
    }
}

impl PreprocessingConfig {
    /// Verifies all thresholds. Any error here is fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.huber > 0.0) {
            return Err(ConfigError::NonPositiveHuber);
        }
        if !(self.huber_power > 0.0) {
            return Err(ConfigError::NonPositiveHuberPower);
        }
        if !(self.code_max_position_diff > 0.0) {
            return Err(ConfigError::NonPositivePositionDiff);
        }
        if !(self.gross_outlier_factor > 0.0) {
            return Err(ConfigError::NonPositiveGrossOutlierFactor);
        }
        if !(self.denoising_lambda >= 0.0) {
            return Err(ConfigError::NegativeDenoisingLambda);
        }
        if !(self.tec_sigma_factor > 0.0) {
            return Err(ConfigError::NonPositiveTecSigmaFactor);
        }
        if self.min_obs_count_per_track < 2 {
            return Err(ConfigError::MinObsCountPerTrack);
        }
        for elevation in [self.elevation_cutoff_deg, self.elevation_track_minimum_deg] {
            if !(-90.0..=90.0).contains(&elevation) {
                return Err(ConfigError::InvalidElevation(elevation));
            }
        }
        if !(0.0..=1.0).contains(&self.min_estimable_epochs_ratio) {
            return Err(ConfigError::InvalidRatio(self.min_estimable_epochs_ratio));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::NoIterations);
        }
        for pattern in self.use_types.iter().chain(self.ignore_types.iter()) {
            if !Observable::is_pattern(pattern) {
                return Err(ConfigError::InvalidTypePattern(pattern.clone()));
            }
        }
        Ok(())
    }

    /// Gross code outlier threshold (m)
    pub fn gross_outlier_threshold_m(&self) -> f64 {
        self.code_max_position_diff * self.gross_outlier_factor
    }

    /// True if this [Observable] is selected by [Self::use_types]
    /// and not rejected by [Self::ignore_types].
    pub fn accepts(&self, observable: Observable) -> bool {
        let used = self.use_types.is_empty()
            || self.use_types.iter().any(|pattern| observable.matches(pattern));
        used && !self
            .ignore_types
            .iter()
            .any(|pattern| observable.matches(pattern))
    }

    /// Copies and returns [PreprocessingConfig] with updated Huber parameters
    pub fn with_huber(&self, huber: f64, huber_power: f64) -> Self {
        let mut s = self.clone();
        s.huber = huber;
        s.huber_power = huber_power;
        s
    }

    /// Copies and returns [PreprocessingConfig] with updated
    /// maximal code position deviation (m)
    pub fn with_code_max_position_diff(&self, diff_m: f64) -> Self {
        let mut s = self.clone();
        s.code_max_position_diff = diff_m;
        s
    }

    /// Copies and returns [PreprocessingConfig] with updated gross outlier factor
    pub fn with_gross_outlier_factor(&self, factor: f64) -> Self {
        let mut s = self.clone();
        s.gross_outlier_factor = factor;
        s
    }

    /// Copies and returns [PreprocessingConfig] with updated slip detection parameters
    pub fn with_slip_detection(&self, lambda: f64, window: usize, sigma_factor: f64) -> Self {
        let mut s = self.clone();
        s.denoising_lambda = lambda;
        s.tec_window_size = window;
        s.tec_sigma_factor = sigma_factor;
        s
    }

    /// Copies and returns [PreprocessingConfig] with updated minimal track length
    pub fn with_min_obs_count_per_track(&self, count: usize) -> Self {
        let mut s = self.clone();
        s.min_obs_count_per_track = count;
        s
    }

    /// Copies and returns [PreprocessingConfig] with updated elevation masks (degrees)
    pub fn with_elevations(&self, cutoff_deg: f64, track_minimum_deg: f64) -> Self {
        let mut s = self.clone();
        s.elevation_cutoff_deg = cutoff_deg;
        s.elevation_track_minimum_deg = track_minimum_deg;
        s
    }

    /// Copies and returns [PreprocessingConfig] with updated estimable epochs ratio
    pub fn with_min_estimable_epochs_ratio(&self, ratio: f64) -> Self {
        let mut s = self.clone();
        s.min_estimable_epochs_ratio = ratio;
        s
    }

    /// Copies and returns [PreprocessingConfig] with updated iteration cap
    pub fn with_max_iterations(&self, max_iterations: usize) -> Self {
        let mut s = self.clone();
        s.max_iterations = max_iterations;
        s
    }

    /// Copies and returns [PreprocessingConfig] with kinematic position estimation
    pub fn with_kinematic_position(&self, kinematic: bool) -> Self {
        let mut s = self.clone();
        s.estimate_kinematic_position = kinematic;
        s
    }

    /// Copies and returns [PreprocessingConfig] retaining at most `count` stations
    pub fn with_max_station_count(&self, count: usize) -> Self {
        let mut s = self.clone();
        s.max_station_count = Some(count);
        s
    }

    /// Copies and returns [PreprocessingConfig] with track dumps.
    /// See [FileNameTemplate](crate::dump::FileNameTemplate) for supported variables.
    pub fn with_track_dumps(&self, before: Option<&str>, after: Option<&str>) -> Self {
        let mut s = self.clone();
        s.track_dump_before = before.map(|t| t.to_string());
        s.track_dump_after = after.map(|t| t.to_string());
        s
    }

    /// Copies and returns [PreprocessingConfig] with updated observation selection.
    /// See [Observable::is_pattern] for the pattern syntax.
    pub fn with_observation_types(&self, use_types: &[&str], ignore_types: &[&str]) -> Self {
        let mut s = self.clone();
        s.use_types = use_types.iter().map(|t| t.to_string()).collect();
        s.ignore_types = ignore_types.iter().map(|t| t.to_string()).collect();
        s
    }
}

#[cfg(test)]
mod test {
    use super::PreprocessingConfig;
    use crate::{
        errors::ConfigError,
        signal::{Band, Observable},
    };

    #[test]
    fn reference_configuration() {
        let cfg = PreprocessingConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.gross_outlier_threshold_m(), 50.0);
        assert_eq!(cfg.tec_window_size, 15);
        assert_eq!(cfg.min_obs_count_per_track, 60);
    }

    #[test]
    fn invalid_configurations() {
        let cfg = PreprocessingConfig::default();

        assert_eq!(
            cfg.with_huber(0.0, 1.5).validate(),
            Err(ConfigError::NonPositiveHuber)
        );
        assert_eq!(
            cfg.with_huber(2.5, f64::NAN).validate(),
            Err(ConfigError::NonPositiveHuberPower)
        );
        assert_eq!(
            cfg.with_code_max_position_diff(-1.0).validate(),
            Err(ConfigError::NonPositivePositionDiff)
        );
        assert_eq!(
            cfg.with_slip_detection(-1.0, 15, 3.5).validate(),
            Err(ConfigError::NegativeDenoisingLambda)
        );
        assert_eq!(
            cfg.with_min_obs_count_per_track(1).validate(),
            Err(ConfigError::MinObsCountPerTrack)
        );
        assert_eq!(
            cfg.with_elevations(95.0, 15.0).validate(),
            Err(ConfigError::InvalidElevation(95.0))
        );
        assert_eq!(
            cfg.with_min_estimable_epochs_ratio(1.5).validate(),
            Err(ConfigError::InvalidRatio(1.5))
        );
        assert_eq!(
            cfg.with_max_iterations(0).validate(),
            Err(ConfigError::NoIterations)
        );

        assert_eq!(
            cfg.with_observation_types(&["C1", "L"], &[]).validate(),
            Err(ConfigError::InvalidTypePattern("L".to_string()))
        );

        // window test disabled is a valid setup
        assert!(cfg.with_slip_detection(5.0, 0, 3.5).validate().is_ok());
    }

    #[test]
    fn observation_types() {
        let (c1, l1, l2) = (
            Observable::Code(Band::L1),
            Observable::Phase(Band::L1),
            Observable::Phase(Band::L2),
        );

        let cfg = PreprocessingConfig::default();
        assert!(cfg.accepts(c1) && cfg.accepts(l2));

        let cfg = cfg.with_observation_types(&["C*", "L1"], &[]);
        assert!(cfg.validate().is_ok());
        assert!(cfg.accepts(c1) && cfg.accepts(l1));
        assert!(!cfg.accepts(l2));

        let cfg = cfg.with_observation_types(&[], &["*1"]);
        assert!(!cfg.accepts(c1) && !cfg.accepts(l1));
        assert!(cfg.accepts(l2));

        // ignored patterns prevail
        let cfg = cfg.with_observation_types(&["L*"], &["L2"]);
        assert!(cfg.accepts(l1));
        assert!(!cfg.accepts(l2) && !cfg.accepts(c1));
    }
}
