//! Cycle slip detection
use crate::{
    cfg::PreprocessingConfig,
    combination::resolve_integer_jump,
    constants::{
        MW_INTEGER_TOLERANCE_CYCLES, MW_JUMP_THRESHOLD_CYCLES, TEC_JUMP_THRESHOLD_CYCLES,
        TEC_SIGMA_FLOOR_CYCLES,
    },
    denoising::total_variation_denoising,
    errors::DisableReason,
    receiver::Receiver,
    stats::{mean, median, moving_mad_std, moving_median},
    track::{SlipEvent, Track},
};

use log::debug;
use polyfit_rs::polyfit_rs::polyfit;
use std::ops::Range;

/// Minimal number of samples used in the linear extrapolation
/// of the TEC-like combination across a boundary
const MIN_FIT_SAMPLES: usize = 5;

/// Sample indexes range [start, end] of adjacent candidate epochs
#[derive(Debug, Copy, Clone, PartialEq)]
struct Boundary {
    start: usize,
    end: usize,
}

/// Value of a linear fit of (x, y) at `x0`.
/// Falls back to the mean value when the fit is not possible.
fn extrapolate(x: &[f64], y: &[f64], x0: f64) -> f64 {
    if y.len() >= 2 {
        if let Ok(fit) = polyfit(x, y, 1) {
            let (a, b) = (fit[1], fit[0]);
            if a.is_finite() && b.is_finite() {
                return a * x0 + b;
            }
        }
    }
    mean(y).unwrap_or(0.0)
}

/// Estimates the (TEC-like, MW-like) jumps between two sample ranges of a [Track].
/// MW-like jump is the difference of the range means, TEC-like jump is
/// the difference of linear extrapolations at the boundary midpoint.
pub(crate) fn estimate_jump(
    track: &Track,
    left: Range<usize>,
    right: Range<usize>,
    fit_samples: usize,
) -> Option<(f64, f64)> {
    if left.is_empty() || right.is_empty() {
        return None;
    }

    let samples = track.samples();
    let left = &samples[left];
    let right = &samples[right];

    let mw_left = left.iter().map(|s| s.mw).collect::<Vec<_>>();
    let mw_right = right.iter().map(|s| s.mw).collect::<Vec<_>>();
    let w = mean(&mw_right)? - mean(&mw_left)?;

    let fit_samples = fit_samples.max(MIN_FIT_SAMPLES);
    let left = &left[left.len().saturating_sub(fit_samples)..];
    let right = &right[..right.len().min(fit_samples)];

    let (t_left, t_right) = (left.last()?.epoch, right.first()?.epoch);
    let t_mid = (t_left + t_right) as f64 / 2.0;

    let (x, y): (Vec<_>, Vec<_>) = left.iter().map(|s| (s.epoch as f64, s.tec)).unzip();
    let g_left = extrapolate(&x, &y, t_mid);

    let (x, y): (Vec<_>, Vec<_>) = right.iter().map(|s| (s.epoch as f64, s.tec)).unzip();
    let g_right = extrapolate(&x, &y, t_mid);

    Some((g_right - g_left, w))
}

/// Jump statistics of one combination series
#[derive(Debug, Clone)]
struct JumpTest {
    /// Epoch to epoch differences minus their median trend:
    /// `residuals[k - 1]` is the jump into sample `k`
    residuals: Vec<f64>,
    /// Total variation denoised levels of the integrated residuals
    levels: Vec<f64>,
}

impl JumpTest {
    /// Builds the [JumpTest] of `values`. The trend of the differences is a
    /// moving median over `window` samples, or the global median without window.
    fn new(values: &[f64], window: Option<usize>, lambda: f64) -> Self {
        let diffs = values.windows(2).map(|w| w[1] - w[0]).collect::<Vec<_>>();

        let trend = match window {
            Some(window) => moving_median(&diffs, window),
            None => vec![median(&diffs).unwrap_or(0.0); diffs.len()],
        };

        let residuals = diffs
            .iter()
            .zip(trend.iter())
            .map(|(d, t)| d - t)
            .collect::<Vec<_>>();

        let integrated = std::iter::once(0.0)
            .chain(residuals.iter().scan(0.0, |level, r| {
                *level += r;
                Some(*level)
            }))
            .collect::<Vec<_>>();

        Self {
            levels: total_variation_denoising(&integrated, lambda),
            residuals,
        }
    }

    /// Raw (detrended) jump into sample `k`
    fn jump(&self, k: usize) -> f64 {
        self.residuals[k - 1]
    }

    /// Denoised jump into sample `k`
    fn denoised_jump(&self, k: usize) -> f64 {
        self.levels[k] - self.levels[k - 1]
    }
}

/// Detects cycle slips within this [Track] and returns confirmed [SlipEvent]s.
/// Events resolving to a null integer jump are not returned.
///
/// Both combinations are differenced epoch to epoch and detrended by a
/// moving median. When the track is longer than the moving window, a TEC-like
/// jump is flagged above `tec_sigma_factor` times the local noise level
/// (robust deviation of the detrended differences). Shorter tracks, or a null
/// window, only compare the jump magnitude to a fixed threshold.
/// MW-like jumps are flagged above half a cycle (or above the local noise level,
/// when larger). Steps of the total variation denoised series are flagged too.
///
/// Candidates are confirmed when flagged by the TEC-like test, or when
/// the MW-like jump is an unambiguous (non null) integer.
pub fn detect_slips(cfg: &PreprocessingConfig, track: &Track) -> Vec<SlipEvent> {
    let n = track.len();
    if n < 2 {
        return Vec::new();
    }

    let epochs = track.epochs();
    let window = cfg.tec_window_size;
    let moving = window > 0 && n >= window;
    let trend_window = if moving { Some(window) } else { None };

    let tec = JumpTest::new(&track.tec(), trend_window, cfg.denoising_lambda);
    let mw = JumpTest::new(&track.mw(), trend_window, cfg.denoising_lambda);

    let (tec_sigma, mw_sigma) = if moving {
        (
            moving_mad_std(&tec.residuals, window),
            moving_mad_std(&mw.residuals, window),
        )
    } else {
        (Vec::new(), Vec::new())
    };

    let sigma_floor = std::f64::consts::SQRT_2 * TEC_SIGMA_FLOOR_CYCLES;

    let mut tec_flags = vec![false; n];
    let mut boundaries = Vec::<Boundary>::new();

    for k in 1..n {
        let (tec_threshold, mw_threshold) = if moving {
            (
                cfg.tec_sigma_factor * tec_sigma[k - 1].max(sigma_floor),
                MW_JUMP_THRESHOLD_CYCLES.max(cfg.tec_sigma_factor * mw_sigma[k - 1]),
            )
        } else {
            (TEC_JUMP_THRESHOLD_CYCLES, MW_JUMP_THRESHOLD_CYCLES)
        };

        tec_flags[k] = tec.jump(k).abs() > tec_threshold
            || tec.denoised_jump(k).abs() > TEC_JUMP_THRESHOLD_CYCLES;

        let mw_flag = mw.jump(k).abs() > mw_threshold
            || mw.denoised_jump(k).abs() > MW_JUMP_THRESHOLD_CYCLES;

        if !tec_flags[k] && !mw_flag {
            continue;
        }

        // merge adjacent candidates
        match boundaries.last_mut() {
            Some(last) if last.end + 1 == k => last.end = k,
            _ => boundaries.push(Boundary { start: k, end: k }),
        }
    }

    let mut events = Vec::with_capacity(boundaries.len());

    for (j, boundary) in boundaries.iter().enumerate() {
        let left_start = if j > 0 { boundaries[j - 1].end } else { 0 };
        let right_end = boundaries.get(j + 1).map(|b| b.start).unwrap_or(n);

        let (g, w) = match estimate_jump(
            track,
            left_start..boundary.start,
            boundary.end..right_end,
            window,
        ) {
            Some(jumps) => jumps,
            None => continue,
        };

        let nw = w.round();
        let mw_confirmed = nw != 0.0 && (w - nw).abs() < MW_INTEGER_TOLERANCE_CYCLES;
        let tec_confirmed = tec_flags[boundary.start..=boundary.end].iter().any(|f| *f);

        if !mw_confirmed && !tec_confirmed {
            continue;
        }

        let cycles = resolve_integer_jump(g, w, track.bands.0, track.bands.1);
        if cycles == Some((0, 0)) {
            continue;
        }

        events.push(SlipEvent {
            epoch: epochs[boundary.start],
            tec_jump: g,
            mw_jump: w,
            cycles,
        });
    }

    events
}

/// Applies detected [SlipEvent]s: resolved events are kept for repair,
/// unresolved events split the [Track].
fn apply(mut track: Track, events: Vec<SlipEvent>) -> Vec<Track> {
    let mut splits = Vec::new();
    for event in events {
        if event.cycles.is_some() {
            track.push_slip(event);
        } else {
            splits.push(event.epoch);
        }
    }

    let mut pieces = Vec::with_capacity(splits.len() + 1);
    for epoch in splits.into_iter().rev() {
        pieces.push(track.split_at(epoch));
    }
    pieces.push(track);
    pieces.reverse();
    pieces
}

/// Runs the cycle slip detection on all tracks of this [Receiver].
pub(crate) fn detect(cfg: &PreprocessingConfig, rx: &mut Receiver) -> Result<(), DisableReason> {
    let tracks = std::mem::take(&mut rx.tracks);

    for (sv, sv_tracks) in tracks {
        let mut output = Vec::with_capacity(sv_tracks.len());

        for track in sv_tracks {
            let events = detect_slips(cfg, &track);
            for event in events.iter() {
                debug!(
                    "{}({}) - epoch #{}: cycle slip (tec={:.3}, mw={:.3}, cycles={:?})",
                    rx.name, sv, event.epoch, event.tec_jump, event.mw_jump, event.cycles
                );
            }
            output.extend(apply(track, events));
        }

        output.retain(|track| track.len() >= cfg.min_obs_count_per_track);

        if !output.is_empty() {
            rx.tracks.insert(sv, output);
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::{extrapolate, JumpTest};

    #[test]
    fn linear_extrapolation() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.0, 3.0, 5.0, 7.0];
        assert!((extrapolate(&x, &y, 3.5) - 8.0).abs() < 1.0E-6);
        assert_eq!(extrapolate(&[2.0], &[4.0], 10.0), 4.0);
    }

    #[test]
    fn detrended_jumps() {
        // linear trend with a 2 cycles step into sample 12
        let values = (0..30)
            .map(|i| 0.05 * i as f64 + if i >= 12 { 2.0 } else { 0.0 })
            .collect::<Vec<_>>();

        for window in [Some(7), None] {
            let test = JumpTest::new(&values, window, 5.0);
            assert_eq!(test.residuals.len(), 29);
            assert_eq!(test.levels.len(), 30);

            for k in 1..30 {
                if k == 12 {
                    assert!((test.jump(k) - 2.0).abs() < 1.0E-9);
                    assert!(test.denoised_jump(k) > 1.0);
                } else {
                    assert!(test.jump(k).abs() < 1.0E-9, "sample {}: {}", k, test.jump(k));
                    assert!(test.denoised_jump(k).abs() < 1.0E-9);
                }
            }
        }
    }
}
