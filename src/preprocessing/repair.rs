//! Cycle slip repair
use crate::{
    cfg::PreprocessingConfig,
    combination::resolve_integer_jump,
    constants::{MW_INTEGER_TOLERANCE_CYCLES, TEC_CLOSURE_TOLERANCE_CYCLES},
    errors::DisableReason,
    preprocessing::slip::estimate_jump,
    receiver::{EpochObservations, Receiver},
    track::Track,
};

use log::debug;
use std::collections::BTreeMap;

/// Outcome of one repair attempt
#[derive(Debug, Copy, Clone, PartialEq)]
enum Repair {
    /// Nothing to repair
    Continuous,
    /// Integer correction applied and verified
    Repaired(i64, i64),
    /// Repair is not possible: track must be split
    Split,
}

/// Attempts to repair the slip starting at `epoch`.
/// `next_epoch` is the epoch of the next pending slip, if any.
fn repair_slip(
    track: &mut Track,
    observations: &BTreeMap<usize, EpochObservations>,
    epoch: usize,
    next_epoch: Option<usize>,
    fit_samples: usize,
) -> Repair {
    let (b1, b2) = track.bands;

    let bounds = |track: &Track| {
        let k = track.samples().partition_point(|s| s.epoch < epoch);
        let end = match next_epoch {
            Some(next) => track.samples().partition_point(|s| s.epoch < next),
            None => track.len(),
        };
        (k, end)
    };

    let (k, end) = bounds(track);
    let (g, w) = match estimate_jump(track, 0..k, k..end, fit_samples) {
        Some(jumps) => jumps,
        None => return Repair::Continuous,
    };

    let (n1, n2) = match resolve_integer_jump(g, w, b1, b2) {
        Some((0, 0)) => return Repair::Continuous,
        Some(cycles) => cycles,
        None => return Repair::Split,
    };

    track.add_correction(epoch, n1, n2);
    track.refresh(observations);

    // verify the discontinuity is gone
    let (k, end) = bounds(track);
    let verified = match estimate_jump(track, 0..k, k..end, fit_samples) {
        Some((g, w)) => {
            w.abs() < MW_INTEGER_TOLERANCE_CYCLES && g.abs() < TEC_CLOSURE_TOLERANCE_CYCLES
        },
        None => false,
    };

    if verified {
        Repair::Repaired(n1, n2)
    } else {
        track.pop_correction();
        track.refresh(observations);
        Repair::Split
    }
}

/// Repairs all pending slips of one [Track]: slips are processed in
/// chronological order, either corrected by an integer number of cycles
/// or realized as a track split. Returned tracks have no pending slip.
pub(crate) fn repair_track(
    mut track: Track,
    observations: &BTreeMap<usize, EpochObservations>,
    fit_samples: usize,
) -> Vec<Track> {
    let events = track.take_pending();
    let mut pieces = Vec::with_capacity(events.len() + 1);

    for (j, event) in events.iter().enumerate() {
        let next = events.get(j + 1).map(|e| e.epoch);
        match repair_slip(&mut track, observations, event.epoch, next, fit_samples) {
            Repair::Continuous => {
                debug!("{} - epoch #{}: continuous", track.sv, event.epoch);
            },
            Repair::Repaired(n1, n2) => {
                debug!(
                    "{} - epoch #{}: repaired ({}, {}) cycles",
                    track.sv, event.epoch, n1, n2
                );
            },
            Repair::Split => {
                debug!("{} - epoch #{}: unrepairable slip", track.sv, event.epoch);
                let tail = track.split_at(event.epoch);
                pieces.push(track);
                track = tail;
            },
        }
    }

    pieces.push(track);
    pieces.retain(|track| !track.is_empty());
    pieces
}

/// Repairs all tracks of this [Receiver]
pub(crate) fn repair(cfg: &PreprocessingConfig, rx: &mut Receiver) -> Result<(), DisableReason> {
    let tracks = std::mem::take(&mut rx.tracks);

    for (sv, sv_tracks) in tracks {
        let observations = match rx.observations.get(&sv) {
            Some(observations) => observations,
            None => continue,
        };

        let mut output = Vec::with_capacity(sv_tracks.len());
        for track in sv_tracks {
            output.extend(repair_track(track, observations, cfg.tec_window_size));
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
    use super::repair_track;
    use crate::{
        prelude::{Band, SlipEvent, Track},
        tests::toolkit::{constellation, sv, time_axis, SyntheticStation},
    };

    #[test]
    fn repair_or_split() {
        let axis = time_axis(80);
        let transmitters = constellation();
        let g01 = sv("G01");
        let epochs = (0..80).collect::<Vec<_>>();

        // integer slip: repaired
        let rx = SyntheticStation::new("WTZR", 80)
            .with_slip(g01, 40, 2, 0)
            .receiver(&axis, &transmitters);

        let observations = &rx.observations[&g01];
        let mut track = Track::new(g01, (Band::L1, Band::L2), &epochs, observations);
        track.push_slip(SlipEvent {
            epoch: 40,
            tec_jump: 2.0,
            mw_jump: 2.0,
            cycles: Some((2, 0)),
        });

        let pieces = repair_track(track, observations, 15);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0].len(), 80);
        assert_eq!(pieces[0].cycle_correction(40), (2, 0));
        assert!(pieces[0].pending().is_empty());

        // half cycle jump: no integer correction closes it
        let rx = SyntheticStation::new("WTZR", 80)
            .with_phase_jump(g01, 40, 0.5, 0.0)
            .receiver(&axis, &transmitters);

        let observations = &rx.observations[&g01];
        let mut track = Track::new(g01, (Band::L1, Band::L2), &epochs, observations);
        track.push_slip(SlipEvent {
            epoch: 40,
            tec_jump: 0.5,
            mw_jump: 0.5,
            cycles: Some((1, 0)),
        });

        let pieces = repair_track(track, observations, 15);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[0].epochs(), (0..40).collect::<Vec<_>>());
        assert_eq!(pieces[1].epochs(), (40..80).collect::<Vec<_>>());
        for piece in pieces.iter() {
            assert!(piece.corrections().is_empty());
            assert!(piece.pending().is_empty());
        }
    }
}
