//! Dual frequency linear combinations
//!
//! Phase observations are expressed in cycles, code observations in meters.
//! Both combinations are expressed in cycles:
//!
//! - TEC-like: L1 - f1/f2 L2. Geometry free, proportional to the
//! slant total electron content. A (n1, n2) slip shifts it by n1 - f1/f2 n2.
//! - MW-like (Melbourne-Wübbena): wide lane phase minus narrow lane code.
//! Geometry and ionosphere free. A (n1, n2) slip shifts it by n1 - n2.
use crate::{
    constants::{
        MW_INTEGER_TOLERANCE_CYCLES, SPEED_OF_LIGHT_M_S, TEC_CLOSURE_TOLERANCE_CYCLES,
    },
    prelude::{Band, Observable},
    receiver::EpochObservations,
};

use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// [Combination] types used in cycle slip processing
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display, EnumString)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Combination {
    /// Ionosphere sensitive combination
    #[strum(to_string = "TEC")]
    Tec,
    /// Wide lane (Melbourne-Wübbena) combination
    #[strum(to_string = "MW")]
    MelbourneWubbena,
}

/// Frequency ratio f1/f2
pub fn gamma(b1: Band, b2: Band) -> f64 {
    b1.frequency_hz() / b2.frequency_hz()
}

/// Wide lane wavelength (m)
pub fn wide_lane_wavelength_m(b1: Band, b2: Band) -> f64 {
    SPEED_OF_LIGHT_M_S / (b1.frequency_hz() - b2.frequency_hz())
}

/// TEC-like combination (cycles)
pub fn tec_cycles(l1: f64, l2: f64, b1: Band, b2: Band) -> f64 {
    l1 - gamma(b1, b2) * l2
}

/// MW-like combination (cycles)
pub fn mw_cycles(l1: f64, l2: f64, p1: f64, p2: f64, b1: Band, b2: Band) -> f64 {
    let (f1, f2) = (b1.frequency_hz(), b2.frequency_hz());
    let narrow_lane_m = (f1 * p1 + f2 * p2) / (f1 + f2);
    (l1 - l2) - narrow_lane_m / wide_lane_wavelength_m(b1, b2)
}

/// Effect of a (n1, n2) cycle slip on both combinations:
/// returns (TEC-like jump, MW-like jump) in cycles.
pub fn slip_signature(n1: i64, n2: i64, b1: Band, b2: Band) -> (f64, f64) {
    let (n1, n2) = (n1 as f64, n2 as f64);
    (n1 - gamma(b1, b2) * n2, n1 - n2)
}

/// Computes (TEC-like, MW-like) combinations of this epoch, if valid
/// code and phase observations exist on both [Band]s.
/// Phase cycle corrections (n1, n2) are removed first.
pub fn combinations(
    epoch: &EpochObservations,
    b1: Band,
    b2: Band,
    corrections: (i64, i64),
) -> Option<(f64, f64)> {
    let l1 = epoch.get(Observable::Phase(b1))?.value - corrections.0 as f64;
    let l2 = epoch.get(Observable::Phase(b2))?.value - corrections.1 as f64;
    let p1 = epoch.get(Observable::Code(b1))?.value;
    let p2 = epoch.get(Observable::Code(b2))?.value;
    Some((tec_cycles(l1, l2, b1, b2), mw_cycles(l1, l2, p1, p2, b1, b2)))
}

/// Selects the dual frequency pair for one transmitter:
/// (L1, L2) is preferred, (L1, L5) is the fallback.
pub fn dual_frequency_pair(epochs: &BTreeMap<usize, EpochObservations>) -> Option<(Band, Band)> {
    [(Band::L1, Band::L2), (Band::L1, Band::L5)]
        .into_iter()
        .find(|(b1, b2)| epochs.values().any(|e| e.has_dual_frequency(*b1, *b2)))
}

/// Resolves the integer (n1, n2) cycle slip, from the TEC-like jump `g`
/// and MW-like jump `w` (cycles). Both combinations must close
/// consistently, otherwise no solution exists.
/// (0, 0) means no slip.
pub fn resolve_integer_jump(g: f64, w: f64, b1: Band, b2: Band) -> Option<(i64, i64)> {
    let nw = w.round();
    if (w - nw).abs() >= MW_INTEGER_TOLERANCE_CYCLES {
        return None;
    }

    let gamma = gamma(b1, b2);
    let n2_float = (nw - g) / (gamma - 1.0);
    let n2_round = n2_float.round() as i64;
    let nw = nw as i64;

    let (n1, n2, misclosure) = [n2_round - 1, n2_round, n2_round + 1]
        .into_iter()
        .map(|n2| {
            let n1 = nw + n2;
            let (g_hat, _) = slip_signature(n1, n2, b1, b2);
            (n1, n2, (g - g_hat).abs())
        })
        .min_by(|(_, _, a), (_, _, b)| a.total_cmp(b))?;

    if misclosure < TEC_CLOSURE_TOLERANCE_CYCLES {
        Some((n1, n2))
    } else {
        None
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::prelude::Observation;

    #[test]
    fn combinations_are_geometry_free() {
        let (b1, b2) = (Band::L1, Band::L2);
        let rho = 2.2E7;
        let iono = 3.0;
        let gamma2 = gamma(b1, b2).powi(2);

        let p1 = rho + iono;
        let p2 = rho + gamma2 * iono;
        let l1 = (rho - iono) / b1.wavelength_m();
        let l2 = (rho - gamma2 * iono) / b2.wavelength_m();

        let tec = tec_cycles(l1, l2, b1, b2);
        let expected = (gamma2 - 1.0) * iono / b1.wavelength_m();
        assert!((tec - expected).abs() < 1.0E-4, "tec={} expected={}", tec, expected);

        let mw = mw_cycles(l1, l2, p1, p2, b1, b2);
        assert!(mw.abs() < 1.0E-4, "mw={}", mw);

        let mut epoch = EpochObservations::default();
        for (observable, value) in [
            (Observable::Code(b1), p1),
            (Observable::Code(b2), p2),
            (Observable::Phase(b1), l1 + 2.0),
            (Observable::Phase(b2), l2),
        ] {
            epoch.observations.push(Observation::new(observable, value));
        }

        let (tec_slip, mw_slip) = combinations(&epoch, b1, b2, (0, 0)).unwrap();
        assert!((tec_slip - tec - 2.0).abs() < 1.0E-4);
        assert!((mw_slip - mw - 2.0).abs() < 1.0E-4);

        let (tec_fixed, mw_fixed) = combinations(&epoch, b1, b2, (2, 0)).unwrap();
        assert!((tec_fixed - tec).abs() < 1.0E-4);
        assert!((mw_fixed - mw).abs() < 1.0E-4);

        assert!(combinations(&epoch, b1, Band::L5, (0, 0)).is_none());
    }

    #[test]
    fn integer_jump_resolution() {
        let (b1, b2) = (Band::L1, Band::L2);

        for (n1, n2) in [(2, 0), (0, 0), (-1, -1), (5, 3), (-7, 2), (1, 1), (9, 7)] {
            let (g, w) = slip_signature(n1, n2, b1, b2);
            assert_eq!(resolve_integer_jump(g, w, b1, b2), Some((n1, n2)));
            assert_eq!(
                resolve_integer_jump(g + 0.03, w - 0.2, b1, b2),
                Some((n1, n2)),
                "({}, {}) with noise",
                n1,
                n2
            );
        }

        // MW jump is not integer
        assert!(resolve_integer_jump(0.0, 0.5, b1, b2).is_none());
        // TEC jump does not close: halfway between two candidates
        assert!(resolve_integer_jump(0.575, 1.0, b1, b2).is_none());
    }

    #[test]
    fn pair_selection() {
        let mut epochs = BTreeMap::new();
        let mut epoch = EpochObservations::default();
        for observable in [
            Observable::Code(Band::L1),
            Observable::Phase(Band::L1),
            Observable::Code(Band::L5),
            Observable::Phase(Band::L5),
        ] {
            epoch.observations.push(Observation::new(observable, 1.0));
        }
        epochs.insert(0, epoch.clone());
        assert_eq!(dual_frequency_pair(&epochs), Some((Band::L1, Band::L5)));

        for observable in [Observable::Code(Band::L2), Observable::Phase(Band::L2)] {
            epoch.observations.push(Observation::new(observable, 1.0));
        }
        epochs.insert(1, epoch);
        assert_eq!(dual_frequency_pair(&epochs), Some((Band::L1, Band::L2)));

        assert!(dual_frequency_pair(&BTreeMap::new()).is_none());
    }
}
