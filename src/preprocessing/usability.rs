//! Finalization and usability evaluation
use crate::{
    cfg::PreprocessingConfig, errors::DisableReason, prelude::Duration, receiver::Receiver,
    time_axis::TimeAxis,
};

use log::debug;

/// Station level usability gate.
/// Returns true if `usable * observation_sampling >= ratio * total * median_sampling`.
/// The boundary is inclusive: a station exactly at the threshold is retained.
/// ```
/// use gnss_preprocessing::prelude::Duration;
/// use gnss_preprocessing::preprocessing::is_estimable;
///
/// let dt = Duration::from_seconds(30.0);
/// assert!(is_estimable(75, dt, 100, dt, 0.75));
/// assert!(!is_estimable(74, dt, 100, dt, 0.75));
/// ```
pub fn is_estimable(
    usable: usize,
    observation_sampling: Duration,
    total: usize,
    median_sampling: Duration,
    ratio: f64,
) -> bool {
    usable as f64 * observation_sampling.to_seconds()
        >= ratio * total as f64 * median_sampling.to_seconds()
}

/// Invalidates all observations that are not covered by a track:
/// only tracked data flows downstream.
pub(crate) fn finalize(rx: &mut Receiver) -> Result<(), DisableReason> {
    let mut invalidated = 0;

    for (sv, epochs) in rx.observations.iter_mut() {
        let tracks = rx.tracks.get(sv);
        for (i, epoch) in epochs.iter_mut() {
            let tracked = tracks
                .map(|tracks| tracks.iter().any(|track| track.contains(*i)))
                .unwrap_or(false);

            if !tracked && epoch.has_valid() {
                epoch.invalidate();
                invalidated += 1;
            }
        }
    }

    debug!("{} - {} untracked observations invalidated", rx.name, invalidated);

    if rx.tracks.is_empty() {
        Err(DisableReason::NoTracks)
    } else {
        Ok(())
    }
}

/// Final usability evaluation of one [Receiver].
pub(crate) fn evaluate(
    cfg: &PreprocessingConfig,
    axis: &TimeAxis,
    rx: &mut Receiver,
) -> Result<(), DisableReason> {
    let usable = rx.usable_epoch_count();
    let total = axis.len();

    if is_estimable(
        usable,
        rx.observation_sampling,
        total,
        axis.median_sampling(),
        cfg.min_estimable_epochs_ratio,
    ) {
        Ok(())
    } else {
        Err(DisableReason::InsufficientEpochs { usable, total })
    }
}
