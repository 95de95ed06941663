#![doc(html_logo_url = "https://raw.githubusercontent.com/rtk-rs/.github/master/logos/logo2.jpg")]
#![cfg_attr(docrs, feature(doc_cfg))]

//! GNSS ground station observation preprocessing.
//!
//! This crate turns raw dual-frequency code and phase observations of a network
//! of ground stations into cleaned, quality controlled tracks, ready for
//! parameter estimation (clocks, positions, signal biases).
//!
//! Each [Receiver](crate::receiver::Receiver) goes through the
//! [Preprocessor](crate::preprocessing::Preprocessor):
//! initial clock estimation, gross outlier rejection, track segmentation,
//! cycle slip detection, track filtering, track outlier detection,
//! cycle slip repair and final usability evaluation.
//! Defective stations are disabled, never aborting the run.
//!
//! Networks are processed in parallel by the [StationNetwork](crate::network::StationNetwork).

extern crate gnss_rs as gnss;

pub mod bias;
pub mod cfg;
pub mod combination;
pub mod constants;
pub mod denoising;
pub mod dump;
pub mod errors;
pub mod mask;
pub mod models;
pub mod network;
pub mod preprocessing;
pub mod receiver;
pub mod robust;
pub mod signal;
pub mod stats;
pub mod time_axis;
pub mod track;

#[cfg(test)]
mod tests;

pub mod prelude {
    pub use crate::{
        bias::SignalBiasFiles,
        cfg::PreprocessingConfig,
        combination::Combination,
        dump::{FileNameTemplate, TrackDumper},
        errors::{ConfigError, DisableReason, Error},
        mask::EpochMask,
        models::{Models, Transmitter},
        network::{NetworkSummary, StationNetwork, WorkerPool},
        preprocessing::{
            Diagnostic, Preprocessor, Stage, StationReport, UsabilityDecision,
        },
        receiver::{EpochObservations, Receiver, ReceiverState},
        signal::{Band, Observable, Observation},
        time_axis::TimeAxis,
        track::{SlipEvent, Track},
    };

    // pub re-export
    pub use gnss::prelude::{Constellation, SV};
    pub use hifitime::prelude::{Duration, Epoch, TimeScale, Unit};
    pub use nalgebra::{Rotation3, Vector3};
}
