//! External collaborators: transmitters and opaque models
use crate::prelude::{Epoch, Observable, Rotation3, Vector3, SV};
use std::collections::BTreeMap;

/// [Transmitter] exposes the ephemeris of one satellite.
/// Implementations are provided by the caller and shared (read only)
/// between all workers.
pub trait Transmitter: Sync {
    /// [SV] identity of this transmitter
    fn sv(&self) -> SV;

    /// Position (m) in the celestial reference frame at transmission [Epoch].
    fn position_crf(&self, t: Epoch) -> Option<Vector3<f64>>;

    /// Onboard clock offset (s) at transmission [Epoch].
    fn clock_offset_s(&self, t: Epoch) -> Option<f64>;

    /// True if this transmitter may be used at this [Epoch].
    fn is_usable(&self, _t: Epoch) -> bool {
        true
    }
}

/// Celestial to terrestrial frame rotation
pub type FrameRotation<'a> = Box<dyn Fn(Epoch) -> Rotation3<f64> + Send + Sync + 'a>;

/// Model reduction (m) for a (station, transmitter, epoch, observable) quadruplet.
/// This gathers everything that is not estimated here
/// (troposphere, tides, phase center variations...).
pub type ModelReduction<'a> = Box<dyn Fn(&str, SV, Epoch, Observable) -> f64 + Send + Sync + 'a>;

/// [Models] gathers all external models required by the preprocessing.
pub struct Models<'a> {
    transmitters: BTreeMap<SV, &'a dyn Transmitter>,
    crf2trf: FrameRotation<'a>,
    reduction: ModelReduction<'a>,
}

impl<'a> Models<'a> {
    /// Builds [Models] from a list of [Transmitter]s, with identity frame rotation
    /// and null model reduction.
    pub fn new(transmitters: &'a [Box<dyn Transmitter>]) -> Self {
        Self {
            transmitters: transmitters
                .iter()
                .map(|tx| (tx.sv(), tx.as_ref()))
                .collect(),
            crf2trf: Box::new(|_| Rotation3::identity()),
            reduction: Box::new(|_, _, _, _| 0.0),
        }
    }

    /// Defines the celestial to terrestrial frame rotation
    pub fn with_rotation<F>(mut self, rotation: F) -> Self
    where
        F: Fn(Epoch) -> Rotation3<f64> + Send + Sync + 'a,
    {
        self.crf2trf = Box::new(rotation);
        self
    }

    /// Defines the model reduction function
    pub fn with_reduction<F>(mut self, reduction: F) -> Self
    where
        F: Fn(&str, SV, Epoch, Observable) -> f64 + Send + Sync + 'a,
    {
        self.reduction = Box::new(reduction);
        self
    }

    /// Returns [Transmitter] for this [SV], if it exists
    pub fn transmitter(&self, sv: SV) -> Option<&'a dyn Transmitter> {
        self.transmitters.get(&sv).copied()
    }

    /// Number of known transmitters
    pub fn transmitters_count(&self) -> usize {
        self.transmitters.len()
    }

    /// [SV] of all known transmitters
    pub fn svs(&self) -> Vec<SV> {
        self.transmitters.keys().copied().collect()
    }

    /// Removes this transmitter: its observations will no longer be used.
    /// Returns false if it was not known.
    pub fn disable_transmitter(&mut self, sv: SV) -> bool {
        self.transmitters.remove(&sv).is_some()
    }

    /// Celestial to terrestrial rotation at this [Epoch]
    pub fn rotation(&self, t: Epoch) -> Rotation3<f64> {
        (self.crf2trf)(t)
    }

    /// Model reduction (m)
    pub fn reduction(&self, station: &str, sv: SV, t: Epoch, observable: Observable) -> f64 {
        (self.reduction)(station, sv, t, observable)
    }

    /// Position (m) of this [SV] at transmission [Epoch] `t_tx`,
    /// expressed in the terrestrial frame at reception [Epoch] `t_rx`.
    pub fn position_trf(&self, sv: SV, t_tx: Epoch, t_rx: Epoch) -> Option<Vector3<f64>> {
        let tx = self.transmitter(sv)?;
        if !tx.is_usable(t_tx) {
            return None;
        }
        let pos = tx.position_crf(t_tx)?;
        Some(self.rotation(t_rx) * pos)
    }
}

impl std::fmt::Debug for Models<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Models")
            .field("transmitters", &self.transmitters.keys().collect::<Vec<_>>())
            .finish()
    }
}
