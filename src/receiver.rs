//! Ground station (receiver) data
use crate::{
    errors::DisableReason,
    mask::EpochMask,
    prelude::{Band, Duration, Observable, Observation, TimeAxis, Vector3, SV},
    preprocessing::UsabilityDecision,
    track::Track,
};

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// [ReceiverState] follows
/// `Candidate -> UnderPreprocessing -> {Usable, Disabled}`.
/// [ReceiverState::Disabled] is terminal.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ReceiverState {
    /// Selected, not processed yet
    #[default]
    Candidate,
    /// Currently going through the preprocessing stages
    UnderPreprocessing,
    /// Validated, may contribute to the estimation
    Usable,
    /// Excluded from the estimation and from any output
    Disabled(DisableReason),
}

impl ReceiverState {
    /// True if this state is [ReceiverState::Disabled]
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled(_))
    }
}

/// All [Observation]s of one transmitter at one epoch
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EpochObservations {
    /// Observations, one per [Observable]
    pub observations: Vec<Observation>,
    /// Elevation angle (in degrees), once known
    pub elevation_deg: Option<f64>,
}

impl EpochObservations {
    /// Returns the valid [Observation] of this [Observable], if any
    pub fn get(&self, observable: Observable) -> Option<&Observation> {
        self.observations
            .iter()
            .find(|obs| obs.valid && obs.observable == observable)
    }

    /// Mutable access to the valid [Observation] of this [Observable]
    pub fn get_mut(&mut self, observable: Observable) -> Option<&mut Observation> {
        self.observations
            .iter_mut()
            .find(|obs| obs.valid && obs.observable == observable)
    }

    /// Invalidates all observations
    pub fn invalidate(&mut self) {
        for obs in self.observations.iter_mut() {
            obs.valid = false;
        }
    }

    /// True if at least one observation is still valid
    pub fn has_valid(&self) -> bool {
        self.observations.iter().any(|obs| obs.valid)
    }

    /// True if valid code and phase observations exist on both [Band]s
    pub fn has_dual_frequency(&self, b1: Band, b2: Band) -> bool {
        [b1, b2].iter().all(|band| {
            self.get(Observable::Code(*band)).is_some()
                && self.get(Observable::Phase(*band)).is_some()
        })
    }
}

/// [Receiver] is one ground station.
/// It is exclusively owned by one worker during the preprocessing.
#[derive(Debug, Clone)]
pub struct Receiver {
    /// Station name
    pub name: String,
    /// A-priori position (ECEF, m)
    pub approx_position: Vector3<f64>,
    /// Observation sampling interval
    pub observation_sampling: Duration,
    /// Per epoch usability
    pub mask: EpochMask,
    /// Receiver clock offset (m), aligned to the [TimeAxis]
    pub clock_m: Vec<f64>,
    /// Receiver position (ECEF, m), aligned to the [TimeAxis]
    pub position: Vec<Vector3<f64>>,
    /// Observations per transmitter and epoch index
    pub observations: BTreeMap<SV, BTreeMap<usize, EpochObservations>>,
    /// Tracks per transmitter
    pub tracks: BTreeMap<SV, Vec<Track>>,
    /// Current [ReceiverState]
    pub state: ReceiverState,
    /// Final [UsabilityDecision], once evaluated
    pub decision: Option<UsabilityDecision>,
}

impl Receiver {
    /// Creates a new [Receiver] aligned to this [TimeAxis].
    /// Observation sampling defaults to the axis median sampling.
    pub fn new(name: &str, approx_position: Vector3<f64>, axis: &TimeAxis) -> Self {
        Self {
            name: name.to_string(),
            approx_position,
            observation_sampling: axis.median_sampling(),
            mask: EpochMask::new(axis.len()),
            clock_m: vec![0.0; axis.len()],
            position: vec![approx_position; axis.len()],
            observations: Default::default(),
            tracks: Default::default(),
            state: ReceiverState::default(),
            decision: None,
        }
    }

    /// Copies and returns [Receiver] with updated observation sampling
    pub fn with_observation_sampling(&self, sampling: Duration) -> Self {
        let mut s = self.clone();
        s.observation_sampling = sampling;
        s
    }

    /// Stores a new [Observation] for this [SV] at epoch index `i`.
    /// Observations outside the time axis are ignored.
    pub fn add_observation(&mut self, i: usize, sv: SV, observation: Observation) {
        if i >= self.mask.len() {
            return;
        }
        self.observations
            .entry(sv)
            .or_default()
            .entry(i)
            .or_default()
            .observations
            .push(observation);
    }

    /// Returns [EpochObservations] of this [SV] at epoch index `i`
    pub fn epoch_observations(&self, sv: SV, i: usize) -> Option<&EpochObservations> {
        self.observations.get(&sv)?.get(&i)
    }

    /// Invalidates all valid observations whose [Observable] is rejected by `accept`.
    /// Returns the number of invalidated observations.
    pub fn retain_observables<F>(&mut self, accept: F) -> usize
    where
        F: Fn(Observable) -> bool,
    {
        let mut rejected = 0;
        for epochs in self.observations.values_mut() {
            for epoch in epochs.values_mut() {
                for obs in epoch.observations.iter_mut() {
                    if obs.valid && !accept(obs.observable) {
                        obs.valid = false;
                        rejected += 1;
                    }
                }
            }
        }
        rejected
    }

    /// Disables epoch `i`: all its observations are invalidated.
    pub fn disable_epoch(&mut self, i: usize) {
        self.mask.disable(i);
        for epochs in self.observations.values_mut() {
            if let Some(epoch) = epochs.get_mut(&i) {
                epoch.invalidate();
            }
        }
    }

    /// Disables this [Receiver] entirely. This is terminal.
    pub fn disable(&mut self, reason: DisableReason) {
        self.mask.disable_all();
        for epochs in self.observations.values_mut() {
            for epoch in epochs.values_mut() {
                epoch.invalidate();
            }
        }
        self.tracks.clear();
        self.state = ReceiverState::Disabled(reason);
    }

    /// True if this [Receiver] has been disabled
    pub fn is_disabled(&self) -> bool {
        self.state.is_disabled()
    }

    /// Number of enabled epochs bearing at least one valid observation.
    pub fn usable_epoch_count(&self) -> usize {
        self.mask
            .usable_epochs()
            .filter(|i| {
                self.observations
                    .values()
                    .any(|epochs| epochs.get(i).map(|e| e.has_valid()).unwrap_or(false))
            })
            .count()
    }

    /// Total number of tracks
    pub fn tracks_count(&self) -> usize {
        self.tracks.values().map(|tracks| tracks.len()).sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::{Epoch, TimeAxis};
    use std::str::FromStr;

    #[test]
    fn receiver_epochs() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let axis = TimeAxis::from_sampling(t0, Duration::from_seconds(30.0), 10).unwrap();

        let g01 = SV::from_str("G01").unwrap();
        let mut rx = Receiver::new("WTZR", Vector3::new(1.0, 2.0, 3.0), &axis);
        assert_eq!(rx.observation_sampling, Duration::from_seconds(30.0));
        assert_eq!(rx.usable_epoch_count(), 0);

        for i in [0, 1, 2, 12] {
            rx.add_observation(i, g01, Observation::new(Observable::Code(Band::L1), 2.0E7));
        }
        assert_eq!(rx.usable_epoch_count(), 3);

        rx.disable_epoch(1);
        assert_eq!(rx.usable_epoch_count(), 2);
        assert!(!rx.epoch_observations(g01, 1).unwrap().has_valid());

        rx.disable(DisableReason::NoTracks);
        assert!(rx.is_disabled());
        assert_eq!(rx.usable_epoch_count(), 0);
        assert_eq!(rx.mask.count_usable(), 0);
    }

    #[test]
    fn observables_selection() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let axis = TimeAxis::from_sampling(t0, Duration::from_seconds(30.0), 10).unwrap();

        let g01 = SV::from_str("G01").unwrap();
        let mut rx = Receiver::new("WTZR", Vector3::new(1.0, 2.0, 3.0), &axis);

        for i in 0..5 {
            rx.add_observation(i, g01, Observation::new(Observable::Code(Band::L1), 2.0E7));
            rx.add_observation(i, g01, Observation::new(Observable::Phase(Band::L1), 1.0E8));
        }

        assert_eq!(rx.retain_observables(|observable| observable.is_code()), 5);
        assert_eq!(rx.usable_epoch_count(), 5);

        let epoch = rx.epoch_observations(g01, 3).unwrap();
        assert!(epoch.get(Observable::Code(Band::L1)).is_some());
        assert!(epoch.get(Observable::Phase(Band::L1)).is_none());

        // already invalid observations are not counted twice
        assert_eq!(rx.retain_observables(|_| false), 5);
        assert_eq!(rx.usable_epoch_count(), 0);
    }
}
