//! Initial receiver clock estimation from code observations
use crate::{
    constants::{APPROX_PROPAGATION_TIME_S, CODE_SIGMA_FLOOR_M, SPEED_OF_LIGHT_M_S},
    errors::DisableReason,
    prelude::{Band, Duration, Epoch, Observable, Vector3, SV},
    preprocessing::Preprocessor,
    receiver::{EpochObservations, Receiver},
};

use log::debug;
use nalgebra::{DMatrix, DVector};

/// Gauss-Newton iterations cap of the kinematic position solution
const MAX_POSITION_ITERATIONS: usize = 10;

/// Gauss-Newton convergence criterion (m)
const POSITION_CONVERGENCE_M: f64 = 1.0E-3;

/// One code equation: transmitter geometry and reduced pseudo range
struct CodeEquation {
    sv: SV,
    /// Code observables contributing to this equation
    observables: Vec<Observable>,
    /// (Ionosphere free) pseudo range (m)
    pseudo_range: f64,
    /// Transmitter position, terrestrial frame (m)
    sv_position: Vector3<f64>,
    /// Transmitter clock offset (m)
    sv_clock_m: f64,
    /// Model reduction (m)
    reduction: f64,
}

impl CodeEquation {
    /// Reduced observation and line of sight unit vector, at this position
    fn linearize(&self, position: &Vector3<f64>) -> (f64, Vector3<f64>) {
        let los = self.sv_position - position;
        let range = los.norm();
        let l = self.pseudo_range - range + self.sv_clock_m - self.reduction;
        (l, los / range)
    }
}

/// Selects the code measurement: ionosphere free combination
/// of two bands when possible, single frequency code otherwise.
fn code_measurement(epoch: &EpochObservations) -> Option<(f64, Vec<Observable>)> {
    for (b1, b2) in [(Band::L1, Band::L2), (Band::L1, Band::L5)] {
        let (c1, c2) = (Observable::Code(b1), Observable::Code(b2));
        if let (Some(p1), Some(p2)) = (epoch.get(c1), epoch.get(c2)) {
            let f1_2 = b1.frequency_hz().powi(2);
            let f2_2 = b2.frequency_hz().powi(2);
            let p_if = (f1_2 * p1.value - f2_2 * p2.value) / (f1_2 - f2_2);
            return Some((p_if, vec![c1, c2]));
        }
    }

    [Band::L1, Band::L2, Band::L5]
        .into_iter()
        .map(Observable::Code)
        .find_map(|code| epoch.get(code).map(|obs| (obs.value, vec![code])))
}

/// Elevation angle (degrees) of a line of sight seen from this (ECEF) position,
/// using the geocentric vertical.
pub(crate) fn elevation_deg(position: &Vector3<f64>, los: &Vector3<f64>) -> f64 {
    let up = position.normalize();
    up.dot(&los.normalize()).clamp(-1.0, 1.0).asin().to_degrees()
}

/// Estimates the receiver clock offset (and position, if desired)
/// at each usable epoch. Epochs that cannot be solved, or whose position
/// deviates too much from the a-priori position, are disabled.
pub(crate) fn initialize(p: &Preprocessor, rx: &mut Receiver) -> Result<(), DisableReason> {
    let estimator = p.estimator(CODE_SIGMA_FLOOR_M);
    let kinematic = p.cfg.estimate_kinematic_position;
    let epochs = rx.mask.usable_epochs().collect::<Vec<_>>();

    for i in epochs {
        let t_rx = match p.axis.epoch(i) {
            Some(t) => t,
            None => continue,
        };

        let equations = equations(p, rx, i, t_rx);

        let unknowns = if kinematic { 4 } else { 1 };
        if equations.len() <= unknowns {
            debug!(
                "{}({}) - {} code observations: not enough to solve",
                rx.name,
                t_rx,
                equations.len()
            );
            rx.disable_epoch(i);
            continue;
        }

        let mut position = rx.approx_position;
        let mut solution = None;

        for _ in 0..MAX_POSITION_ITERATIONS {
            let (a, l) = design(&equations, &position, kinematic);

            let sol = match estimator.solve(&a, &l) {
                Ok(sol) => sol,
                Err(e) => {
                    debug!("{}({}) - clock estimation failure: {}", rx.name, t_rx, e);
                    solution = None;
                    break;
                },
            };

            let mut converged = true;
            if kinematic {
                let dx = Vector3::new(sol.x[0], sol.x[1], sol.x[2]);
                position += dx;
                converged = dx.norm() < POSITION_CONVERGENCE_M;
            }

            solution = Some(sol);
            if converged {
                break;
            }
        }

        let solution = match solution {
            Some(solution) => solution,
            None => {
                rx.disable_epoch(i);
                continue;
            },
        };

        let deviation = (position - rx.approx_position).norm();
        if deviation > p.cfg.code_max_position_diff {
            debug!(
                "{}({}) - position deviation {:.3} m: epoch disabled",
                rx.name, t_rx, deviation
            );
            rx.disable_epoch(i);
            continue;
        }

        rx.clock_m[i] = solution.x[unknowns - 1];
        rx.position[i] = position;

        // residuals of the final linearization point
        for (eq, e) in equations.iter().zip(solution.residuals.iter()) {
            if let Some(epoch) = rx.observations.get_mut(&eq.sv).and_then(|e| e.get_mut(&i)) {
                for observable in eq.observables.iter() {
                    if let Some(obs) = epoch.get_mut(*observable) {
                        obs.residual = *e;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Builds the design matrix and reduced observations
fn design(
    equations: &[CodeEquation],
    position: &Vector3<f64>,
    kinematic: bool,
) -> (DMatrix<f64>, DVector<f64>) {
    let unknowns = if kinematic { 4 } else { 1 };
    let mut a = DMatrix::zeros(equations.len(), unknowns);
    let mut l = DVector::zeros(equations.len());

    for (row, eq) in equations.iter().enumerate() {
        let (li, los) = eq.linearize(position);
        l[row] = li;
        if kinematic {
            a[(row, 0)] = -los[0];
            a[(row, 1)] = -los[1];
            a[(row, 2)] = -los[2];
        }
        a[(row, unknowns - 1)] = 1.0;
    }

    (a, l)
}

/// Gathers the code equations of epoch `i`. Elevations are stored
/// and observations below the elevation cutoff, or of unknown transmitters,
/// are invalidated.
fn equations(p: &Preprocessor, rx: &mut Receiver, i: usize, t_rx: Epoch) -> Vec<CodeEquation> {
    let mut equations = Vec::with_capacity(rx.observations.len());
    let approx = rx.approx_position;

    for (sv, epochs) in rx.observations.iter_mut() {
        let epoch = match epochs.get_mut(&i) {
            Some(epoch) => epoch,
            None => continue,
        };

        let tx = match p.models.transmitter(*sv) {
            Some(tx) => tx,
            None => {
                epoch.invalidate();
                continue;
            },
        };

        // light time
        let mut tau = APPROX_PROPAGATION_TIME_S;
        let mut geometry = None;
        for _ in 0..2 {
            let t_tx = t_rx - Duration::from_seconds(tau);
            geometry = p.models.position_trf(*sv, t_tx, t_rx).map(|pos| (t_tx, pos));
            match geometry {
                Some((_, pos)) => tau = (pos - approx).norm() / SPEED_OF_LIGHT_M_S,
                None => break,
            }
        }

        let (t_tx, sv_position) = match geometry {
            Some(geometry) => geometry,
            None => continue,
        };

        let elevation = elevation_deg(&approx, &(sv_position - approx));
        epoch.elevation_deg = Some(elevation);

        if elevation < p.cfg.elevation_cutoff_deg {
            epoch.invalidate();
            continue;
        }

        let sv_clock_m = match tx.clock_offset_s(t_tx) {
            Some(dt) => dt * SPEED_OF_LIGHT_M_S,
            None => continue,
        };

        let (pseudo_range, observables) = match code_measurement(epoch) {
            Some(code) => code,
            None => continue,
        };

        let reduction = p.models.reduction(&rx.name, *sv, t_rx, observables[0]);

        equations.push(CodeEquation {
            sv: *sv,
            observables,
            pseudo_range,
            sv_position,
            sv_clock_m,
            reduction,
        });
    }

    equations
}

#[cfg(test)]
mod test {
    use super::elevation_deg;
    use crate::prelude::Vector3;

    #[test]
    fn elevation() {
        let position = Vector3::new(6.378E6, 0.0, 0.0);
        assert!((elevation_deg(&position, &Vector3::new(1.0, 0.0, 0.0)) - 90.0).abs() < 1.0E-9);
        assert!(elevation_deg(&position, &Vector3::new(0.0, 1.0, 0.0)).abs() < 1.0E-9);
        assert!((elevation_deg(&position, &Vector3::new(1.0, 1.0, 0.0)) - 45.0).abs() < 1.0E-9);
        assert!(elevation_deg(&position, &Vector3::new(-1.0, 1.0, 0.0)) < 0.0);
    }
}
