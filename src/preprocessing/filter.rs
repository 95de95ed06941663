//! Track filtering (elevation, length)
use crate::{cfg::PreprocessingConfig, errors::DisableReason, receiver::Receiver};
use log::debug;

/// Removes tracks that never rise above the minimal track elevation
/// (or whose elevation is unknown) and tracks that are too short.
/// Observations of removed tracks are invalidated.
pub(crate) fn filter_tracks(
    cfg: &PreprocessingConfig,
    rx: &mut Receiver,
) -> Result<(), DisableReason> {
    for (sv, tracks) in rx.tracks.iter_mut() {
        let epochs = match rx.observations.get_mut(sv) {
            Some(epochs) => epochs,
            None => {
                tracks.clear();
                continue;
            },
        };

        let mut removed = Vec::new();

        tracks.retain(|track| {
            let max_elevation = track
                .samples()
                .iter()
                .filter_map(|s| epochs.get(&s.epoch).and_then(|e| e.elevation_deg))
                .fold(None, |max: Option<f64>, el| Some(max.map_or(el, |max| max.max(el))));

            let retained = track.len() >= cfg.min_obs_count_per_track
                && matches!(max_elevation, Some(el) if el >= cfg.elevation_track_minimum_deg);

            if !retained {
                debug!(
                    "{}({}) - track {:?}-{:?} removed (length {}, max. elevation {:?})",
                    rx.name,
                    sv,
                    track.first_epoch(),
                    track.last_epoch(),
                    track.len(),
                    max_elevation
                );
                removed.extend(track.epochs());
            }

            retained
        });

        for i in removed {
            if let Some(epoch) = epochs.get_mut(&i) {
                epoch.invalidate();
            }
        }
    }

    rx.tracks.retain(|_, tracks| !tracks.is_empty());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::filter_tracks;
    use crate::{
        prelude::{Band, PreprocessingConfig, Track},
        tests::toolkit::{constellation, sv, time_axis, SyntheticStation},
    };

    #[test]
    fn removed_tracks_are_invalidated() {
        let cfg = PreprocessingConfig::default()
            .with_min_obs_count_per_track(10)
            .with_elevations(5.0, 15.0);

        let axis = time_axis(30);
        let transmitters = constellation();
        let mut rx = SyntheticStation::new("WTZR", 30).receiver(&axis, &transmitters);

        let (g01, g02, g03) = (sv("G01"), sv("G02"), sv("G03"));

        // G01 rises high, G02 stays low, G03 is too short
        for (prn, elevation) in [(g01, 60.0), (g02, 10.0), (g03, 60.0)] {
            for epoch in rx.observations.get_mut(&prn).unwrap().values_mut() {
                epoch.elevation_deg = Some(elevation);
            }
        }

        for (prn, epochs) in [(g01, 0..30), (g02, 0..30), (g03, 0..5)] {
            let epochs = epochs.collect::<Vec<_>>();
            let track = Track::new(prn, (Band::L1, Band::L2), &epochs, &rx.observations[&prn]);
            rx.tracks.insert(prn, vec![track]);
        }

        filter_tracks(&cfg, &mut rx).unwrap();

        assert_eq!(rx.tracks.keys().copied().collect::<Vec<_>>(), vec![g01]);
        assert_eq!(rx.tracks[&g01][0].len(), 30);

        for i in 0..30 {
            assert!(rx.epoch_observations(g01, i).unwrap().has_valid());
            assert!(!rx.epoch_observations(g02, i).unwrap().has_valid());
        }

        for i in 0..5 {
            assert!(!rx.epoch_observations(g03, i).unwrap().has_valid());
        }
        // never tracked: left to the finalization
        assert!(rx.epoch_observations(g03, 5).unwrap().has_valid());
    }
}
