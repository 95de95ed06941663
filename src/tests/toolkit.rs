//! Synthetic data toolkit
use crate::{
    combination::gamma,
    models::Transmitter,
    prelude::{
        Band, Duration, Epoch, Observable, Observation, Receiver, TimeAxis, Vector3, SV,
    },
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{ops::Range, str::FromStr};

/// A-priori (and true) station position (m)
pub const STATION_POSITION: (f64, f64, f64) = (4_027_881.79, 306_998.67, 4_919_499.36);

/// Satellite range (m)
const SV_RANGE_M: f64 = 2.2E7;

/// (PRN, elevation, azimuth) in degrees
const CONSTELLATION: [(&str, f64, f64); 6] = [
    ("G01", 80.0, 0.0),
    ("G02", 55.0, 60.0),
    ("G03", 45.0, 140.0),
    ("G04", 35.0, 200.0),
    ("G05", 30.0, 270.0),
    ("G06", 20.0, 320.0),
];

/// Fixed (celestial frame) transmitter, with a perfect clock
#[derive(Debug, Clone)]
pub struct StaticTransmitter {
    sv: SV,
    position: Vector3<f64>,
}

impl Transmitter for StaticTransmitter {
    fn sv(&self) -> SV {
        self.sv
    }

    fn position_crf(&self, _: Epoch) -> Option<Vector3<f64>> {
        Some(self.position)
    }

    fn clock_offset_s(&self, _: Epoch) -> Option<f64> {
        Some(0.0)
    }
}

pub fn station_position() -> Vector3<f64> {
    let (x, y, z) = STATION_POSITION;
    Vector3::new(x, y, z)
}

pub fn sv(prn: &str) -> SV {
    SV::from_str(prn).unwrap()
}

/// 30s sampling [TimeAxis]
pub fn time_axis(size: usize) -> TimeAxis {
    let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
    TimeAxis::from_sampling(t0, Duration::from_seconds(30.0), size).unwrap()
}

/// Transmitters seen at fixed elevations and azimuths from the station
pub fn constellation() -> Vec<Box<dyn Transmitter>> {
    let position = station_position();

    let up = position.normalize();
    let lon = position[1].atan2(position[0]);
    let east = Vector3::new(-lon.sin(), lon.cos(), 0.0);
    let north = up.cross(&east);

    CONSTELLATION
        .iter()
        .map(|(prn, el, az)| {
            let (el, az) = (el.to_radians(), az.to_radians());
            let direction =
                east * el.cos() * az.sin() + north * el.cos() * az.cos() + up * el.sin();
            Box::new(StaticTransmitter {
                sv: sv(prn),
                position: position + direction * SV_RANGE_M,
            }) as Box<dyn Transmitter>
        })
        .collect()
}

/// Synthetic dual frequency station
#[derive(Debug, Clone)]
pub struct SyntheticStation {
    name: String,
    size: usize,
    code_epochs: Range<usize>,
    seed: u64,
    code_noise_m: f64,
    phase_noise_cycles: f64,
    slips: Vec<(SV, usize, f64, f64)>,
    code_outliers: Vec<(SV, usize, f64)>,
    approx_offset: Vector3<f64>,
}

impl SyntheticStation {
    pub fn new(name: &str, size: usize) -> Self {
        Self {
            name: name.to_string(),
            size,
            code_epochs: 0..size,
            seed: 42,
            code_noise_m: 0.01,
            phase_noise_cycles: 0.002,
            slips: Vec::new(),
            code_outliers: Vec::new(),
            approx_offset: Vector3::zeros(),
        }
    }

    /// Code observations only exist within this range
    pub fn with_code_epochs(&self, epochs: Range<usize>) -> Self {
        let mut s = self.clone();
        s.code_epochs = epochs;
        s
    }

    pub fn with_seed(&self, seed: u64) -> Self {
        let mut s = self.clone();
        s.seed = seed;
        s
    }

    /// Cycle slip of (n1, n2) cycles, starting at `epoch`
    pub fn with_slip(&self, sv: SV, epoch: usize, n1: i64, n2: i64) -> Self {
        self.with_phase_jump(sv, epoch, n1 as f64, n2 as f64)
    }

    /// Phase jump of (l1, l2) cycles, not necessarily integer, starting at `epoch`
    pub fn with_phase_jump(&self, sv: SV, epoch: usize, l1: f64, l2: f64) -> Self {
        let mut s = self.clone();
        s.slips.push((sv, epoch, l1, l2));
        s
    }

    /// A-priori position offset (m) from the true station position
    pub fn with_approx_offset(&self, offset: Vector3<f64>) -> Self {
        let mut s = self.clone();
        s.approx_offset = offset;
        s
    }

    /// Code error (m) on both frequencies at `epoch`
    pub fn with_code_outlier(&self, sv: SV, epoch: usize, error_m: f64) -> Self {
        let mut s = self.clone();
        s.code_outliers.push((sv, epoch, error_m));
        s
    }

    pub fn receiver(&self, axis: &TimeAxis, transmitters: &[Box<dyn Transmitter>]) -> Receiver {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let position = station_position();
        let mut rx = Receiver::new(&self.name, position + self.approx_offset, axis);

        let (b1, b2) = (Band::L1, Band::L2);
        let gamma2 = gamma(b1, b2).powi(2);
        let t0 = axis.epoch(0).unwrap();

        for (j, tx) in transmitters.iter().enumerate() {
            let sv = tx.sv();
            let rho = (tx.position_crf(t0).unwrap() - position).norm();
            let (n1, n2) = (1000.0 + 10.0 * j as f64, -500.0 + 7.0 * j as f64);

            for i in 0..self.size.min(axis.len()) {
                let clock = 150.0 + 0.25 * i as f64;
                let iono = 1.0 + 0.1 * j as f64 + 0.002 * i as f64;

                let (slip1, slip2) = self
                    .slips
                    .iter()
                    .filter(|(slip_sv, epoch, _, _)| *slip_sv == sv && i >= *epoch)
                    .fold((0.0, 0.0), |(a, b), (_, _, l1, l2)| (a + l1, b + l2));

                let outlier = self
                    .code_outliers
                    .iter()
                    .filter(|(out_sv, epoch, _)| *out_sv == sv && *epoch == i)
                    .map(|(_, _, error)| error)
                    .sum::<f64>();

                let mut code_noise = || rng.gen_range(-self.code_noise_m..=self.code_noise_m);
                let p1 = rho + clock + iono + outlier + code_noise();
                let p2 = rho + clock + gamma2 * iono + outlier + code_noise();

                let mut phase_noise =
                    || rng.gen_range(-self.phase_noise_cycles..=self.phase_noise_cycles);
                let l1 = (rho + clock - iono) / b1.wavelength_m() + n1 + slip1 + phase_noise();
                let l2 = (rho + clock - gamma2 * iono) / b2.wavelength_m()
                    + n2
                    + slip2
                    + phase_noise();

                if self.code_epochs.contains(&i) {
                    rx.add_observation(i, sv, Observation::new(Observable::Code(b1), p1));
                    rx.add_observation(i, sv, Observation::new(Observable::Code(b2), p2));
                }
                rx.add_observation(i, sv, Observation::new(Observable::Phase(b1), l1));
                rx.add_observation(i, sv, Observation::new(Observable::Phase(b2), l2));
            }
        }

        rx
    }
}

/// Creates a new, randomly named, temporary directory
pub fn temp_dir(prefix: &str) -> std::path::PathBuf {
    let suffix = rand::thread_rng().gen::<u32>();
    let dir = std::env::temp_dir().join(format!("{}-{:08x}", prefix, suffix));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}
