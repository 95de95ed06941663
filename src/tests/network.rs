mod test {
    use crate::{
        prelude::{
            ConfigError, DisableReason, Error, Models, NetworkSummary, PreprocessingConfig,
            Receiver, ReceiverState, StationNetwork, TimeAxis, Transmitter,
        },
        tests::toolkit::{constellation, time_axis, SyntheticStation},
    };

    /// Four stations, half of them lacking data
    fn stations(axis: &TimeAxis, transmitters: &[Box<dyn Transmitter>]) -> Vec<Receiver> {
        vec![
            SyntheticStation::new("STA0", 60).receiver(axis, transmitters),
            SyntheticStation::new("STA1", 60)
                .with_seed(1)
                .with_code_epochs(0..30)
                .receiver(axis, transmitters),
            SyntheticStation::new("STA2", 60)
                .with_seed(2)
                .receiver(axis, transmitters),
            SyntheticStation::new("STA3", 0).receiver(axis, transmitters),
        ]
    }

    fn config() -> PreprocessingConfig {
        PreprocessingConfig::default().with_min_obs_count_per_track(20)
    }

    #[test]
    fn worker_count_independence() {
        let cfg = config();
        let axis = time_axis(60);
        let transmitters = constellation();
        let models = Models::new(&transmitters);

        let mut summaries = Vec::<NetworkSummary>::new();

        for workers in [1, 2, 4] {
            let network = StationNetwork::new(&cfg, &axis, &models, workers).unwrap();
            assert_eq!(network.workers(), workers);

            let (receivers, summary) = network.preprocess(stations(&axis, &transmitters)).unwrap();

            // station order is preserved
            let names = receivers.iter().map(|rx| rx.name.as_str()).collect::<Vec<_>>();
            assert_eq!(names, ["STA0", "STA1", "STA2", "STA3"]);

            let reports = summary
                .reports
                .iter()
                .map(|report| report.station.as_str())
                .collect::<Vec<_>>();
            assert_eq!(reports, names);

            assert_eq!(summary.stations, 4);
            assert_eq!(summary.disabled_stations, 2);
            assert_eq!(summary.disabled_epochs, 2 * 60);

            for (rx, report) in receivers.iter().zip(summary.reports.iter()) {
                assert_eq!(rx.is_disabled(), !report.decision.usable);
            }

            assert!(!receivers[0].is_disabled());
            assert!(receivers[1].is_disabled());
            assert!(!receivers[2].is_disabled());
            assert!(receivers[3].is_disabled());

            summaries.push(summary);
        }

        // outcome does not depend on the number of workers
        assert_eq!(summaries[0], summaries[1]);
        assert_eq!(summaries[0], summaries[2]);
    }

    #[test]
    fn more_workers_than_stations() {
        let cfg = config();
        let axis = time_axis(60);
        let transmitters = constellation();
        let models = Models::new(&transmitters);

        let network = StationNetwork::new(&cfg, &axis, &models, 3).unwrap();

        let receivers = vec![SyntheticStation::new("STA0", 60).receiver(&axis, &transmitters)];
        let (receivers, summary) = network.preprocess(receivers).unwrap();
        assert_eq!(receivers.len(), 1);
        assert_eq!(summary.disabled_stations, 0);
        assert_eq!(summary.disabled_epochs, 0);

        let (receivers, summary) = network.preprocess(Vec::new()).unwrap();
        assert!(receivers.is_empty());
        assert_eq!(summary.stations, 0);
        assert!(summary.reports.is_empty());
    }

    #[test]
    fn alternatives_selection() {
        let cfg = config();
        let axis = time_axis(60);
        let transmitters = constellation();
        let models = Models::new(&transmitters);

        let candidates = || {
            vec![
                vec![
                    SyntheticStation::new("STA0-A", 20).receiver(&axis, &transmitters),
                    SyntheticStation::new("STA0-B", 60).receiver(&axis, &transmitters),
                ],
                vec![SyntheticStation::new("STA1", 60).receiver(&axis, &transmitters)],
                vec![SyntheticStation::new("STA2", 10).receiver(&axis, &transmitters)],
                vec![SyntheticStation::new("STA3", 60).receiver(&axis, &transmitters)],
            ]
        };

        for workers in [1, 2] {
            let network = StationNetwork::new(&cfg, &axis, &models, workers).unwrap();
            let selected = network.select_alternatives(candidates()).unwrap();
            let names = selected.iter().map(|rx| rx.name.as_str()).collect::<Vec<_>>();
            assert_eq!(names, ["STA0-B", "STA1", "STA3"]);
        }

        let cfg = config().with_max_station_count(2);
        let network = StationNetwork::new(&cfg, &axis, &models, 2).unwrap();
        let selected = network.select_alternatives(candidates()).unwrap();
        let names = selected.iter().map(|rx| rx.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["STA0-B", "STA1"]);
    }

    #[test]
    fn invalid_configuration() {
        let axis = time_axis(60);
        let transmitters = constellation();
        let models = Models::new(&transmitters);

        let cfg = config().with_huber(-1.0, 1.5);
        match StationNetwork::new(&cfg, &axis, &models, 2) {
            Err(Error::Config(ConfigError::NonPositiveHuber)) => {},
            other => panic!("unexpected result: {:?}", other),
        }

        let cfg = config();
        assert!(matches!(
            StationNetwork::new(&cfg, &axis, &models, 0),
            Err(Error::NoWorkers)
        ));
    }

    #[test]
    fn failing_station_does_not_stall_workers() {
        let cfg = config();
        let axis = time_axis(60);
        let transmitters = constellation();
        let models = Models::new(&transmitters).with_reduction(|station, _, _, _| {
            if station == "STA2" {
                panic!("corrupted station data");
            }
            0.0
        });

        for workers in [1, 2] {
            let network = StationNetwork::new(&cfg, &axis, &models, workers).unwrap();
            let (receivers, summary) = network.preprocess(stations(&axis, &transmitters)).unwrap();

            assert_eq!(summary.stations, 4);
            assert_eq!(summary.disabled_stations, 3);
            assert_eq!(summary.disabled_epochs, 3 * 60);

            assert!(!receivers[0].is_disabled());
            assert_eq!(
                receivers[2].state,
                ReceiverState::Disabled(DisableReason::Unreadable(
                    "corrupted station data".to_string()
                ))
            );
            assert_eq!(summary.reports[2].diagnostics.len(), 1);
        }
    }
}
