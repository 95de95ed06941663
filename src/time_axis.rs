//! Shared sampling time axis
use crate::{
    errors::Error,
    prelude::{Duration, Epoch},
    stats::median,
};

use std::sync::Arc;

/// [TimeAxis] is the ordered, station independent sequence of sampling
/// [Epoch]s, shared by all receivers of a run. It is immutable once built
/// and cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    epochs: Arc<Vec<Epoch>>,
}

impl TimeAxis {
    /// Builds a [TimeAxis] from a strictly increasing sequence of [Epoch]s.
    pub fn new(epochs: Vec<Epoch>) -> Result<Self, Error> {
        if epochs.is_empty() {
            return Err(Error::InvalidTimeAxis);
        }

        if epochs.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::InvalidTimeAxis);
        }

        Ok(Self {
            epochs: Arc::new(epochs),
        })
    }

    /// Builds an evenly spaced [TimeAxis] of `size` epochs.
    /// ```
    /// use gnss_preprocessing::prelude::{Epoch, Duration, TimeAxis};
    ///
    /// let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
    /// let axis = TimeAxis::from_sampling(t0, Duration::from_seconds(30.0), 2880)
    ///     .unwrap();
    ///
    /// assert_eq!(axis.len(), 2880);
    /// assert_eq!(axis.median_sampling(), Duration::from_seconds(30.0));
    /// ```
    pub fn from_sampling(t0: Epoch, sampling: Duration, size: usize) -> Result<Self, Error> {
        if sampling <= Duration::ZERO {
            return Err(Error::InvalidTimeAxis);
        }
        Self::new((0..size).map(|i| t0 + sampling * i as f64).collect())
    }

    /// Total number of epochs
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    /// Always false: an empty [TimeAxis] cannot be built.
    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Returns [Epoch] at index `i`
    pub fn epoch(&self, i: usize) -> Option<Epoch> {
        self.epochs.get(i).copied()
    }

    /// Iterates all [Epoch]s in chronological order
    pub fn iter(&self) -> impl Iterator<Item = &Epoch> + '_ {
        self.epochs.iter()
    }

    /// Median sampling interval. A single epoch axis has a null sampling.
    pub fn median_sampling(&self) -> Duration {
        let dt = self
            .epochs
            .windows(2)
            .map(|w| (w[1] - w[0]).to_seconds())
            .collect::<Vec<_>>();

        match median(&dt) {
            Some(dt) => Duration::from_seconds(dt),
            None => Duration::ZERO,
        }
    }
}
