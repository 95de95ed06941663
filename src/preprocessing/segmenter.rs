//! Track segmentation
use crate::{
    cfg::PreprocessingConfig,
    combination::dual_frequency_pair,
    errors::DisableReason,
    prelude::SV,
    receiver::Receiver,
    track::Track,
};

use log::debug;
use std::collections::BTreeMap;

/// [SVTracker] accumulates contiguous epochs of one [SV]
/// and releases a run whenever a data gap is encountered.
#[derive(Debug, Clone)]
struct SVTracker {
    sv: SV,
    /// Minimal run length
    min_size: usize,
    /// Previous epoch index
    prev: Option<usize>,
    /// Current run
    buffer: Vec<usize>,
    /// Released runs
    runs: Vec<Vec<usize>>,
}

impl SVTracker {
    fn new(sv: SV, min_size: usize) -> Self {
        Self {
            sv,
            min_size,
            prev: None,
            buffer: Vec::with_capacity(min_size),
            runs: Vec::new(),
        }
    }

    /// Feeds a new epoch index. Indexes must be provided in increasing order.
    fn new_epoch(&mut self, i: usize) {
        if let Some(prev) = self.prev {
            if i != prev + 1 {
                debug!("{} - epoch #{}: data gap", self.sv, i);
                self.release();
            }
        }
        self.prev = Some(i);
        self.buffer.push(i);
    }

    /// Releases current run, if long enough
    fn release(&mut self) {
        let run = std::mem::take(&mut self.buffer);
        if run.len() >= self.min_size {
            self.runs.push(run);
        } else if !run.is_empty() {
            debug!("{} - dropping {} epochs long run", self.sv, run.len());
        }
    }

    fn finish(mut self) -> Vec<Vec<usize>> {
        self.release();
        self.runs
    }
}

/// Forms the tracks of each transmitter: maximal runs of contiguous usable epochs
/// with dual frequency code and phase observations. Runs shorter
/// than the minimal track length are dropped.
pub(crate) fn segment(cfg: &PreprocessingConfig, rx: &mut Receiver) -> Result<(), DisableReason> {
    let mut tracks = BTreeMap::<SV, Vec<Track>>::new();

    for (sv, epochs) in rx.observations.iter() {
        let (b1, b2) = match dual_frequency_pair(epochs) {
            Some(bands) => bands,
            None => continue,
        };

        let mut tracker = SVTracker::new(*sv, cfg.min_obs_count_per_track);

        for (i, epoch) in epochs.iter() {
            if rx.mask.is_usable(*i) && epoch.has_dual_frequency(b1, b2) {
                tracker.new_epoch(*i);
            }
        }

        let sv_tracks = tracker
            .finish()
            .into_iter()
            .map(|run| Track::new(*sv, (b1, b2), &run, epochs))
            .collect::<Vec<_>>();

        if !sv_tracks.is_empty() {
            tracks.insert(*sv, sv_tracks);
        }
    }

    rx.tracks = tracks;

    if rx.tracks.is_empty() {
        Err(DisableReason::NoTracks)
    } else {
        debug!("{} - {} tracks", rx.name, rx.tracks_count());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::SVTracker;
    use crate::prelude::SV;
    use std::str::FromStr;

    #[test]
    fn runs() {
        let sv = SV::from_str("G08").unwrap();
        let mut tracker = SVTracker::new(sv, 3);
        for i in [0, 1, 2, 3, 5, 6, 8, 9, 10] {
            tracker.new_epoch(i);
        }
        assert_eq!(tracker.finish(), vec![vec![0, 1, 2, 3], vec![8, 9, 10]]);
    }
}
