//! Gross code outliers rejection
use crate::{cfg::PreprocessingConfig, errors::DisableReason, receiver::Receiver};
use log::debug;

/// Disables every epoch with a code residual exceeding the gross outlier threshold.
/// Never disables the whole station.
pub(crate) fn reject(cfg: &PreprocessingConfig, rx: &mut Receiver) -> Result<(), DisableReason> {
    let threshold = cfg.gross_outlier_threshold_m();

    let outliers = rx
        .mask
        .usable_epochs()
        .filter_map(|i| {
            let max_residual = rx
                .observations
                .values()
                .filter_map(|epochs| epochs.get(&i))
                .flat_map(|epoch| epoch.observations.iter())
                .filter(|obs| obs.valid && obs.observable.is_code())
                .map(|obs| obs.residual.abs())
                .fold(0.0_f64, f64::max);

            if max_residual > threshold {
                debug!(
                    "{} - epoch #{}: gross code outlier ({:.3} m)",
                    rx.name, i, max_residual
                );
                Some(i)
            } else {
                None
            }
        })
        .collect::<Vec<_>>();

    for i in outliers {
        rx.disable_epoch(i);
    }

    Ok(())
}
