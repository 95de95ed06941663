//! Signal bias files resolution
use crate::{
    dump::FileNameTemplate,
    errors::DisableReason,
    models::Models,
    prelude::{Receiver, SV},
};

use log::warn;
use std::path::PathBuf;

/// [SignalBiasFiles] resolves signal bias file paths:
/// transmitters with the `{prn}` template, receivers with the `{station}` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalBiasFiles {
    transmitter: FileNameTemplate,
    receiver: FileNameTemplate,
}

impl SignalBiasFiles {
    /// Creates new [SignalBiasFiles] from both templates
    pub fn new(transmitter_template: &str, receiver_template: &str) -> Self {
        Self {
            transmitter: FileNameTemplate::new(transmitter_template),
            receiver: FileNameTemplate::new(receiver_template),
        }
    }

    /// Signal bias file of this transmitter
    pub fn transmitter_path(&self, sv: SV) -> PathBuf {
        let prn = sv.to_string();
        PathBuf::from(self.transmitter.render(&[("prn", &prn)]))
    }

    /// Signal bias file of this station
    pub fn receiver_path(&self, station: &str) -> PathBuf {
        PathBuf::from(self.receiver.render(&[("station", station)]))
    }

    /// Removes from [Models] the transmitters whose signal bias file does not exist.
    /// Their observations are then invalidated by the preprocessing.
    /// Returns the removed transmitters.
    pub fn disable_transmitters_without_bias(&self, models: &mut Models) -> Vec<SV> {
        let mut disabled = Vec::new();
        for sv in models.svs() {
            let path = self.transmitter_path(sv);
            if !path.is_file() {
                warn!("{} - missing signal bias file \"{}\"", sv, path.display());
                models.disable_transmitter(sv);
                disabled.push(sv);
            }
        }
        disabled
    }

    /// Disables receivers whose signal bias file does not exist.
    /// Returns the number of receivers disabled.
    pub fn disable_receivers_without_bias(&self, receivers: &mut [Receiver]) -> usize {
        let mut disabled = 0;
        for rx in receivers.iter_mut().filter(|rx| !rx.is_disabled()) {
            let path = self.receiver_path(&rx.name);
            if !path.is_file() {
                let path = path.display().to_string();
                warn!("{} - missing signal bias file \"{}\"", rx.name, path);
                rx.disable(DisableReason::MissingSignalBias(path));
                disabled += 1;
            }
        }
        disabled
    }
}
