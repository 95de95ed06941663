//! Tracks and cycle slips
use crate::{
    combination::combinations,
    prelude::{Band, Observable, SV},
    receiver::EpochObservations,
};

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Dual frequency combinations of one [Track] epoch
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackSample {
    /// Epoch index in the [TimeAxis](crate::time_axis::TimeAxis)
    pub epoch: usize,
    /// TEC-like combination (cycles)
    pub tec: f64,
    /// MW-like combination (cycles)
    pub mw: f64,
}

/// Integer phase correction, applying to all epochs starting at `from_epoch`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CycleCorrection {
    pub from_epoch: usize,
    /// Cycles removed from the first phase
    pub n1: i64,
    /// Cycles removed from the second phase
    pub n2: i64,
}

/// [SlipEvent] is a discontinuity detected at `epoch`
/// (first epoch after the jump) within a [Track].
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SlipEvent {
    /// Epoch index of the first sample after the jump
    pub epoch: usize,
    /// Estimated TEC-like jump (cycles)
    pub tec_jump: f64,
    /// Estimated MW-like jump (cycles)
    pub mw_jump: f64,
    /// Integer jump per phase, when resolved
    pub cycles: Option<(i64, i64)>,
}

/// [Track] is a run of usable epochs of one (receiver, transmitter) pair.
/// Its combinations are recomputed whenever cycle corrections change.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Track {
    /// Transmitter
    pub sv: SV,
    /// Dual frequency pair
    pub bands: (Band, Band),
    samples: Vec<TrackSample>,
    corrections: Vec<CycleCorrection>,
    pending: Vec<SlipEvent>,
}

impl Track {
    /// Builds a new [Track] over these epoch indexes.
    /// Epochs lacking dual frequency code and phase are skipped.
    pub fn new(
        sv: SV,
        bands: (Band, Band),
        epochs: &[usize],
        observations: &BTreeMap<usize, EpochObservations>,
    ) -> Self {
        let mut track = Self {
            sv,
            bands,
            samples: epochs
                .iter()
                .map(|epoch| TrackSample {
                    epoch: *epoch,
                    tec: 0.0,
                    mw: 0.0,
                })
                .collect(),
            corrections: Vec::new(),
            pending: Vec::new(),
        };
        track.refresh(observations);
        track
    }

    /// Recomputes all combinations, accounting for the cycle corrections.
    /// Samples that no longer have valid observations are dropped.
    pub fn refresh(&mut self, observations: &BTreeMap<usize, EpochObservations>) {
        let (b1, b2) = self.bands;
        let corrections = self.corrections.clone();

        self.samples.retain_mut(|sample| {
            let correction = cumulated_correction(&corrections, sample.epoch);
            match observations
                .get(&sample.epoch)
                .and_then(|obs| combinations(obs, b1, b2, correction))
            {
                Some((tec, mw)) => {
                    sample.tec = tec;
                    sample.mw = mw;
                    true
                },
                None => false,
            }
        });
    }

    /// Number of epochs
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True if this [Track] has no epoch
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// All samples
    pub fn samples(&self) -> &[TrackSample] {
        &self.samples
    }

    /// First epoch index
    pub fn first_epoch(&self) -> Option<usize> {
        self.samples.first().map(|s| s.epoch)
    }

    /// Last epoch index
    pub fn last_epoch(&self) -> Option<usize> {
        self.samples.last().map(|s| s.epoch)
    }

    /// True if this epoch index belongs to this [Track]
    pub fn contains(&self, epoch: usize) -> bool {
        self.samples.binary_search_by_key(&epoch, |s| s.epoch).is_ok()
    }

    /// Epoch indexes
    pub fn epochs(&self) -> Vec<usize> {
        self.samples.iter().map(|s| s.epoch).collect()
    }

    /// TEC-like series (cycles)
    pub fn tec(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.tec).collect()
    }

    /// MW-like series (cycles)
    pub fn mw(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.mw).collect()
    }

    /// Applied [CycleCorrection]s
    pub fn corrections(&self) -> &[CycleCorrection] {
        &self.corrections
    }

    /// Cumulated integer correction (n1, n2) at this epoch
    pub fn cycle_correction(&self, epoch: usize) -> (i64, i64) {
        cumulated_correction(&self.corrections, epoch)
    }

    /// Returns the repaired phase (cycles) of this [Observable] at this epoch
    pub fn corrected_phase(
        &self,
        observations: &BTreeMap<usize, EpochObservations>,
        epoch: usize,
        observable: Observable,
    ) -> Option<f64> {
        if !self.contains(epoch) {
            return None;
        }

        let (n1, n2) = self.cycle_correction(epoch);
        let value = observations.get(&epoch)?.get(observable)?.value;

        match observable {
            Observable::Phase(band) if band == self.bands.0 => Some(value - n1 as f64),
            Observable::Phase(band) if band == self.bands.1 => Some(value - n2 as f64),
            _ => None,
        }
    }

    /// Registers a new integer correction starting at this epoch.
    pub(crate) fn add_correction(&mut self, from_epoch: usize, n1: i64, n2: i64) {
        self.corrections.push(CycleCorrection { from_epoch, n1, n2 });
    }

    /// Cancels the latest correction
    pub(crate) fn pop_correction(&mut self) -> Option<CycleCorrection> {
        self.corrections.pop()
    }

    /// Confirmed [SlipEvent]s awaiting repair
    pub fn pending(&self) -> &[SlipEvent] {
        &self.pending
    }

    pub(crate) fn push_slip(&mut self, event: SlipEvent) {
        self.pending.push(event);
        self.pending.sort_by_key(|e| e.epoch);
    }

    pub(crate) fn take_pending(&mut self) -> Vec<SlipEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Splits this [Track] at `epoch`: self keeps the samples prior to `epoch`,
    /// the returned [Track] holds the remaining ones.
    /// Pending slips are distributed accordingly, the slip at `epoch` is consumed.
    pub fn split_at(&mut self, epoch: usize) -> Track {
        let pos = self.samples.partition_point(|s| s.epoch < epoch);
        let samples = self.samples.split_off(pos);

        let pending = self
            .pending
            .iter()
            .filter(|e| e.epoch > epoch)
            .copied()
            .collect::<Vec<_>>();

        self.pending.retain(|e| e.epoch < epoch);

        Track {
            sv: self.sv,
            bands: self.bands,
            samples,
            corrections: self.corrections.clone(),
            pending,
        }
    }

    /// Removes these epochs from the [Track]
    pub fn remove_epochs(&mut self, epochs: &[usize]) {
        self.samples.retain(|s| !epochs.contains(&s.epoch));
    }

    /// Splits the sample indexes into segments delimited by pending slips
    pub(crate) fn segments(&self) -> Vec<std::ops::Range<usize>> {
        let mut segments = Vec::with_capacity(self.pending.len() + 1);
        let mut start = 0;
        for event in self.pending.iter() {
            let end = self.samples.partition_point(|s| s.epoch < event.epoch);
            if end > start {
                segments.push(start..end);
                start = end;
            }
        }
        if start < self.samples.len() {
            segments.push(start..self.samples.len());
        }
        segments
    }
}

fn cumulated_correction(corrections: &[CycleCorrection], epoch: usize) -> (i64, i64) {
    corrections
        .iter()
        .filter(|c| c.from_epoch <= epoch)
        .fold((0, 0), |(n1, n2), c| (n1 + c.n1, n2 + c.n2))
}
