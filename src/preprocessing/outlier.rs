//! Track outlier detection
use crate::{
    constants::COMBINATION_SIGMA_FLOOR_CYCLES,
    errors::DisableReason,
    prelude::Observable,
    preprocessing::Preprocessor,
    receiver::{EpochObservations, Receiver},
    robust::{RobustEstimator, RobustSolution},
    track::Track,
};

use log::debug;
use nalgebra::{DMatrix, DVector};
use std::{collections::BTreeMap, ops::Range};

/// Minimal number of consecutive outliers splitting a track
const MIN_SPLIT_RUN: usize = 2;

/// Maximal number of samples described by one quadratic polynomial
/// of the TEC-like combination
const POLYNOMIAL_SPAN: usize = 30;

/// MW-like combination: one constant per segment (between pending slips)
fn mw_screening(
    estimator: &RobustEstimator,
    track: &Track,
    segments: &[Range<usize>],
) -> Option<RobustSolution> {
    let n = track.len();
    let mut a = DMatrix::zeros(n, segments.len());
    for (j, segment) in segments.iter().enumerate() {
        for i in segment.clone() {
            a[(i, j)] = 1.0;
        }
    }
    let l = DVector::from_vec(track.mw());
    estimator.solve(&a, &l).ok()
}

/// TEC-like combination: piecewise quadratic polynomials within each segment
fn tec_screening(
    estimator: &RobustEstimator,
    track: &Track,
    segments: &[Range<usize>],
) -> Option<RobustSolution> {
    let samples = track.samples();

    let mut chunks = Vec::new();
    for segment in segments.iter() {
        let mut start = segment.start;
        while start < segment.end {
            let end = (start + POLYNOMIAL_SPAN).min(segment.end);
            chunks.push(start..end);
            start = end;
        }
    }

    let columns = chunks.iter().map(|c| c.len().min(3)).sum::<usize>();
    let mut a = DMatrix::zeros(samples.len(), columns);

    let mut col = 0;
    for chunk in chunks.iter() {
        let terms = chunk.len().min(3);
        let t0 = samples[chunk.start].epoch as f64;
        let span = (samples[chunk.end - 1].epoch as f64 - t0).max(1.0);
        for i in chunk.clone() {
            // normalized time, within [-1, 1]
            let t = 2.0 * (samples[i].epoch as f64 - t0) / span - 1.0;
            for k in 0..terms {
                a[(i, col + k)] = t.powi(k as i32);
            }
        }
        col += terms;
    }

    let l = DVector::from_vec(track.tec());
    estimator.solve(&a, &l).ok()
}

/// Sample indexes following each run of at least [MIN_SPLIT_RUN]
/// consecutive outliers, within a track of `len` samples.
fn run_ends(outliers: &[usize], len: usize) -> Vec<usize> {
    let mut ends = Vec::new();
    let mut run = 0;

    for (j, index) in outliers.iter().enumerate() {
        run += 1;
        let last = outliers.get(j + 1).map_or(true, |next| *next != index + 1);
        if last {
            if run >= MIN_SPLIT_RUN && index + 1 < len {
                ends.push(index + 1);
            }
            run = 0;
        }
    }

    ends
}

/// Robust screening of the combinations of one track.
/// Epochs remaining above the Huber threshold are removed from the track
/// and their observations invalidated, residuals of the other epochs are stored.
/// The track is split after each run of consecutive outliers.
fn screen_track(
    estimator: &RobustEstimator,
    huber: f64,
    mut track: Track,
    epochs: &mut BTreeMap<usize, EpochObservations>,
) -> Vec<Track> {
    let segments = track.segments();

    let (mw, tec) = match (
        mw_screening(estimator, &track, &segments),
        tec_screening(estimator, &track, &segments),
    ) {
        (Some(mw), Some(tec)) => (mw, tec),
        _ => {
            debug!("{} - track screening failure", track.sv);
            return vec![track];
        },
    };

    let mut outliers = mw.outliers(huber);
    outliers.extend(tec.outliers(huber));
    outliers.sort_unstable();
    outliers.dedup();

    let samples = track.samples();
    let outlier_epochs = outliers
        .iter()
        .map(|i| samples[*i].epoch)
        .collect::<Vec<_>>();

    let split_epochs = run_ends(&outliers, samples.len())
        .into_iter()
        .map(|i| samples[i].epoch)
        .collect::<Vec<_>>();

    for (i, sample) in samples.iter().enumerate() {
        if let Some(epoch) = epochs.get_mut(&sample.epoch) {
            if outliers.binary_search(&i).is_ok() {
                epoch.invalidate();
            } else {
                for band in [track.bands.0, track.bands.1] {
                    if let Some(obs) = epoch.get_mut(Observable::Phase(band)) {
                        obs.residual = tec.residuals[i];
                    }
                }
            }
        }
    }

    if outlier_epochs.is_empty() {
        return vec![track];
    }

    debug!(
        "{} - {} track outliers: {:?}",
        track.sv,
        outlier_epochs.len(),
        outlier_epochs
    );

    track.remove_epochs(&outlier_epochs);

    let mut pieces = Vec::with_capacity(split_epochs.len() + 1);
    for epoch in split_epochs.into_iter().rev() {
        debug!("{} - epoch #{}: split after outliers", track.sv, epoch);
        pieces.push(track.split_at(epoch));
    }
    pieces.push(track);
    pieces.reverse();
    pieces.retain(|track| !track.is_empty());
    pieces
}

/// Robust screening of all tracks of this [Receiver].
/// Tracks falling below the minimal length are discarded.
pub(crate) fn detect(p: &Preprocessor, rx: &mut Receiver) -> Result<(), DisableReason> {
    let estimator = p.estimator(COMBINATION_SIGMA_FLOOR_CYCLES);
    let tracks = std::mem::take(&mut rx.tracks);

    for (sv, sv_tracks) in tracks {
        let epochs = match rx.observations.get_mut(&sv) {
            Some(epochs) => epochs,
            None => continue,
        };

        let mut output = Vec::with_capacity(sv_tracks.len());
        for track in sv_tracks {
            output.extend(screen_track(&estimator, p.cfg.huber, track, epochs));
        }

        output.retain(|track| track.len() >= p.cfg.min_obs_count_per_track);

        if !output.is_empty() {
            rx.tracks.insert(sv, output);
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::run_ends;

    #[test]
    fn outlier_runs() {
        assert!(run_ends(&[], 10).is_empty());
        assert!(run_ends(&[3], 10).is_empty());
        assert!(run_ends(&[3, 5, 7], 10).is_empty());
        assert_eq!(run_ends(&[3, 4], 10), vec![5]);
        assert_eq!(run_ends(&[1, 2, 3, 6, 8, 9], 20), vec![4, 10]);
        // a run ending the track leaves nothing to split
        assert!(run_ends(&[8, 9], 10).is_empty());
    }
}
