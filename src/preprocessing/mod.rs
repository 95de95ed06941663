//! Per receiver preprocessing pipeline
mod clock;
mod filter;
mod gross;
mod outlier;
mod repair;
mod segmenter;
mod slip;
mod usability;

pub use slip::detect_slips;
pub use usability::is_estimable;

use crate::{
    cfg::PreprocessingConfig,
    dump::TrackDumper,
    errors::DisableReason,
    models::Models,
    receiver::{Receiver, ReceiverState},
    robust::RobustEstimator,
    time_axis::TimeAxis,
};

use log::{debug, error, info, warn};
use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
};
use strum_macros::Display;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Preprocessing [Stage]s, in order of execution
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Stage {
    #[strum(to_string = "input")]
    Input,
    #[strum(to_string = "clock initialization")]
    ClockInitialization,
    #[strum(to_string = "gross outlier rejection")]
    GrossOutlierRejection,
    #[strum(to_string = "track segmentation")]
    TrackSegmentation,
    #[strum(to_string = "cycle slip detection")]
    CycleSlipDetection,
    #[strum(to_string = "track filtering")]
    TrackFiltering,
    #[strum(to_string = "track outlier detection")]
    TrackOutlierDetection,
    #[strum(to_string = "cycle slip repair")]
    CycleSlipRepair,
    #[strum(to_string = "finalization")]
    Finalization,
    #[strum(to_string = "usability evaluation")]
    UsabilityEvaluation,
}

impl Stage {
    /// All [Stage]s, in order of execution
    pub const ALL: [Stage; 10] = [
        Self::Input,
        Self::ClockInitialization,
        Self::GrossOutlierRejection,
        Self::TrackSegmentation,
        Self::CycleSlipDetection,
        Self::TrackFiltering,
        Self::TrackOutlierDetection,
        Self::CycleSlipRepair,
        Self::Finalization,
        Self::UsabilityEvaluation,
    ];

    /// [Stage] executed after this one, if any
    pub fn next(&self) -> Option<Stage> {
        let pos = Self::ALL.iter().position(|stage| stage == self)?;
        Self::ALL.get(pos + 1).copied()
    }
}

/// Message carried by a panic payload
fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown failure".to_string()
    }
}

/// [Diagnostic] event, emitted once when a station is disabled
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Diagnostic {
    /// Station name
    pub station: String,
    /// [Stage] that disabled the station
    pub stage: Stage,
    /// [DisableReason]
    pub reason: DisableReason,
}

/// Final [UsabilityDecision] of one station
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UsabilityDecision {
    /// True if this station may contribute to the estimation
    pub usable: bool,
    /// Number of usable epochs
    pub usable_epochs: usize,
    /// Number of disabled epochs
    pub disabled_epochs: usize,
}

/// [StationReport] is the outcome of [Preprocessor::process]
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StationReport {
    /// Station name
    pub station: String,
    /// [UsabilityDecision]
    pub decision: UsabilityDecision,
    /// Usable epochs count after each [Stage]
    pub usable_epochs: Vec<(Stage, usize)>,
    /// [Diagnostic] events
    pub diagnostics: Vec<Diagnostic>,
}

impl StationReport {
    fn new(station: &str) -> Self {
        Self {
            station: station.to_string(),
            decision: UsabilityDecision::default(),
            usable_epochs: Vec::with_capacity(10),
            diagnostics: Vec::new(),
        }
    }
}

/// [Preprocessor] runs all preprocessing stages on one [Receiver]:
/// clock initialization, gross outlier rejection, track segmentation,
/// cycle slip detection, track filtering, track outlier detection,
/// cycle slip repair, finalization and usability evaluation.
///
/// Stage failures never propagate: the [Receiver] is disabled
/// and a [Diagnostic] is emitted instead. This includes panics raised
/// while processing the station (by external models for example),
/// reported as [DisableReason::Unreadable].
#[derive(Debug)]
pub struct Preprocessor<'a> {
    cfg: &'a PreprocessingConfig,
    axis: &'a TimeAxis,
    models: &'a Models<'a>,
    dump_before: Option<TrackDumper>,
    dump_after: Option<TrackDumper>,
}

impl<'a> Preprocessor<'a> {
    /// Creates a new [Preprocessor]
    pub fn new(cfg: &'a PreprocessingConfig, axis: &'a TimeAxis, models: &'a Models<'a>) -> Self {
        Self {
            cfg,
            axis,
            models,
            dump_before: cfg.track_dump_before.as_deref().map(TrackDumper::new),
            dump_after: cfg.track_dump_after.as_deref().map(TrackDumper::new),
        }
    }

    /// [RobustEstimator] configured for this run
    pub(crate) fn estimator(&self, sigma_floor: f64) -> RobustEstimator {
        RobustEstimator::new(
            self.cfg.huber,
            self.cfg.huber_power,
            self.cfg.max_iterations,
            sigma_floor,
        )
    }

    /// Preprocesses this [Receiver] and returns its [StationReport].
    pub fn process(&self, rx: &mut Receiver) -> StationReport {
        let mut report = StationReport::new(&rx.name);
        report
            .usable_epochs
            .push((Stage::Input, rx.usable_epoch_count()));

        if !rx.is_disabled() {
            rx.state = ReceiverState::UnderPreprocessing;

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run(rx, &mut report)))
                .unwrap_or_else(|payload| {
                    let stage = report
                        .usable_epochs
                        .last()
                        .and_then(|(stage, _)| stage.next())
                        .unwrap_or(Stage::Input);
                    Err((stage, DisableReason::Unreadable(panic_message(payload))))
                });

            match outcome {
                Ok(_) => {
                    info!("{} - {} usable epochs", rx.name, rx.usable_epoch_count());
                    rx.state = ReceiverState::Usable;
                },
                Err((stage, reason)) => {
                    warn!("{} - disabled during {}: {}", rx.name, stage, reason);
                    rx.disable(reason.clone());
                    report.diagnostics.push(Diagnostic {
                        station: rx.name.clone(),
                        stage,
                        reason,
                    });
                },
            }
        }

        let usable_epochs = rx.usable_epoch_count();

        let decision = UsabilityDecision {
            usable: !rx.is_disabled(),
            usable_epochs,
            disabled_epochs: self.axis.len().saturating_sub(usable_epochs),
        };

        rx.decision = Some(decision);
        report.decision = decision;
        report
    }

    fn run(&self, rx: &mut Receiver, report: &mut StationReport) -> Result<(), (Stage, DisableReason)> {
        if !self.cfg.use_types.is_empty() || !self.cfg.ignore_types.is_empty() {
            let rejected = rx.retain_observables(|observable| self.cfg.accepts(observable));
            debug!("{} - {} observations not selected", rx.name, rejected);
        }

        if rx.usable_epoch_count() == 0 {
            return Err((Stage::Input, DisableReason::NoObservations));
        }

        self.stage(Stage::ClockInitialization, rx, report, |rx| {
            clock::initialize(self, rx)
        })?;

        self.stage(Stage::GrossOutlierRejection, rx, report, |rx| {
            gross::reject(self.cfg, rx)
        })?;

        self.stage(Stage::TrackSegmentation, rx, report, |rx| {
            segmenter::segment(self.cfg, rx)
        })?;

        if let Some(dumper) = &self.dump_before {
            self.dump(dumper, rx);
        }

        self.stage(Stage::CycleSlipDetection, rx, report, |rx| {
            slip::detect(self.cfg, rx)
        })?;

        self.stage(Stage::TrackFiltering, rx, report, |rx| {
            filter::filter_tracks(self.cfg, rx)
        })?;

        self.stage(Stage::TrackOutlierDetection, rx, report, |rx| {
            outlier::detect(self, rx)
        })?;

        self.stage(Stage::CycleSlipRepair, rx, report, |rx| {
            repair::repair(self.cfg, rx)
        })?;

        if let Some(dumper) = &self.dump_after {
            self.dump(dumper, rx);
        }

        self.stage(Stage::Finalization, rx, report, usability::finalize)?;

        self.stage(Stage::UsabilityEvaluation, rx, report, |rx| {
            usability::evaluate(self.cfg, self.axis, rx)
        })?;

        Ok(())
    }

    fn stage<F>(
        &self,
        stage: Stage,
        rx: &mut Receiver,
        report: &mut StationReport,
        op: F,
    ) -> Result<(), (Stage, DisableReason)>
    where
        F: FnOnce(&mut Receiver) -> Result<(), DisableReason>,
    {
        op(rx).map_err(|reason| (stage, reason))?;

        let usable = rx.usable_epoch_count();
        debug!("{} - {}: {} usable epochs", rx.name, stage, usable);
        report.usable_epochs.push((stage, usable));
        Ok(())
    }

    fn dump(&self, dumper: &TrackDumper, rx: &Receiver) {
        match dumper.dump_receiver(rx, self.axis) {
            Ok(paths) => {
                debug!("{} - {} track files generated", rx.name, paths.len());
            },
            Err(e) => {
                error!("{} - failed to dump tracks: {}", rx.name, e);
            },
        }
    }
}
