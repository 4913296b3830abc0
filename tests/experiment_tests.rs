#[cfg(test)]
mod experiment_tests {
    use std::io::Write;
    use std::sync::Arc;

    use tempfile::NamedTempFile;

    use mixsim::config::CommunicationMode;
    use mixsim::config_loader::load_config;
    use mixsim::orchestrator::{derive_seed, run_experiment};
    use mixsim::statistics::{
        Aggregator, CounterStat, RecordedValues, SampleStat, StatisticsCatalog, StatisticsType,
        TrialStat,
    };
    use mixsim::{Config, EndReason, Simulator};

    const BASE: &str = r#"
general:
  seed: 42
topology:
  clients: 3
  mixes: 2
mix:
  request_processing_time: 2s
  reply_processing_time: 1s
  header_size: 16
network:
  client: { latency: 10ms, upload_bandwidth: 1000000 }
  mix: { latency: 2ms }
  proxy: { latency: 20ms }
traffic:
  interval: 25ms
  requests_per_client: 8
  request_size: 400
  replies:
    - size: 1000
    - size: 200
      delay: 5ms
"#;

    fn config(yaml: &str) -> Config {
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        config
    }

    fn total(values: Option<&RecordedValues>) -> f64 {
        match values {
            Some(RecordedValues::Sums(sums)) => sums.iter().map(|s| s.to_f64()).sum(),
            Some(RecordedValues::Scalars(values)) => values.iter().sum(),
            other => panic!("unexpected values {:?}", other),
        }
    }

    #[test]
    fn test_same_seed_same_record() {
        let config = config(BASE);
        let catalog = Arc::new(StatisticsCatalog::default());
        let first = Simulator::new(&config, 9, catalog.clone()).unwrap().run().unwrap();
        let second = Simulator::new(&config, 9, catalog).unwrap().run().unwrap();
        assert_eq!(first.record, second.record);
    }

    #[test]
    fn test_every_mode_delivers_every_reply() {
        for mode in [
            CommunicationMode::Duplex,
            CommunicationMode::SimplexReply,
            CommunicationMode::SimplexWithFeedback,
        ] {
            let mut config = config(BASE);
            config.topology.mode = mode;
            let outcome = Simulator::new(&config, 1, Arc::new(StatisticsCatalog::default()))
                .unwrap()
                .run()
                .unwrap();
            assert_eq!(outcome.end_reason, EndReason::AllVoted, "{:?}", mode);

            let values = &outcome.record.values;
            let requests = total(values.get(&StatisticsType::from(CounterStat::ClientRequestsSent)));
            let replies = total(values.get(&StatisticsType::from(CounterStat::ClientRepliesReceived)));
            let at_proxy = total(values.get(&StatisticsType::from(CounterStat::ProxyRequestsReceived)));
            assert_eq!(requests, 24.0, "{:?}", mode);
            assert_eq!(at_proxy, 24.0, "{:?}", mode);
            assert_eq!(replies, 48.0, "{:?}", mode);

            let mix_latency = values.get(&StatisticsType::from(SampleStat::MixRequestLatencyMs));
            let expected = if mode.requests_via_mixes() { 24 } else { 0 };
            assert_eq!(mix_latency.map(RecordedValues::len), Some(expected), "{:?}", mode);
        }
    }

    #[test]
    fn test_bundled_delivery_to_dummy_aware_proxy() {
        let mut config = config(BASE);
        config.topology.receiver_supports_dummy_traffic = true;
        let outcome = Simulator::new(&config, 3, Arc::new(StatisticsCatalog::default()))
            .unwrap()
            .run()
            .unwrap();

        let bundled = outcome
            .record
            .values
            .get(&StatisticsType::from(TrialStat::ProxyRequestBundled))
            .unwrap();
        assert_eq!(Aggregator::Percentage.apply(bundled).unwrap(), 1.0);
        assert_eq!(
            total(outcome.record.values.get(&StatisticsType::from(CounterStat::ClientRepliesReceived))),
            48.0
        );
    }

    #[test]
    fn test_recording_window_excludes_early_traffic() {
        // All traffic is done long before recording would start.
        let yaml = BASE.replace("seed: 42", "seed: 42\n  start_recording: 1h");
        let outcome = Simulator::new(&config(&yaml), 5, Arc::new(StatisticsCatalog::default()))
            .unwrap()
            .run()
            .unwrap();

        for (ty, values) in &outcome.record.values {
            assert!(values.is_empty(), "{} recorded outside the window", ty);
        }
    }

    #[test]
    fn test_stop_time_cuts_unbounded_traffic() {
        let yaml = BASE
            .replace("requests_per_client: 8", "")
            .replace("seed: 42", "seed: 42\n  start_recording: 100ms\n  stop_time: 2s");
        let outcome = Simulator::new(&config(&yaml), 5, Arc::new(StatisticsCatalog::default()))
            .unwrap()
            .run()
            .unwrap();
        assert_eq!(outcome.end_reason, EndReason::StopTime);
        assert!(total(outcome.record.values.get(&StatisticsType::from(CounterStat::ClientRequestsSent))) > 0.0);
    }

    #[test]
    fn test_experiments_produce_independent_partitions() {
        let yaml = BASE.replace("seed: 42", "seed: 42\n  runs: 2");
        let config = config(&yaml);

        let first = run_experiment(&config).unwrap();
        let second = run_experiment(&config).unwrap();

        for results in [&first, &second] {
            assert!(results.is_complete());
            let sent = results
                .merged_values(0, StatisticsType::Counter(CounterStat::ClientRequestsSent))
                .unwrap();
            assert_eq!(total(sent.as_ref()), 48.0);
        }
        assert_eq!(first.run(0, 1), second.run(0, 1));

        let seeded = Simulator::new(
            &config,
            derive_seed(42, 0, 1),
            Arc::new(StatisticsCatalog::default()),
        )
        .unwrap()
        .run()
        .unwrap();
        assert_eq!(first.run(0, 1), Some(&seeded.record));
    }

    #[test]
    fn test_experiment_from_file() {
        let yaml = BASE.to_string()
            + r#"
experiment:
  varying:
    key: topology.mixes
    values: [0, 1, 3]
statistics:
  client_round_trip_ms:
    runs: [avg, max]
  node_bytes_sent:
    enabled: false
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        let results = run_experiment(&config).unwrap();
        assert_eq!(results.varying_key(), Some("topology.mixes"));
        assert_eq!(results.varying_values().len(), 3);

        let node_bytes = StatisticsType::Counter(CounterStat::NodeBytesSent);
        assert!(results.run(0, 0).unwrap().values.get(&node_bytes).is_none());

        let rtt = StatisticsType::Sample(SampleStat::ClientRoundTripMs);
        let mut averages = Vec::new();
        for value in 0..3 {
            let aggregates = results.results_for_all_runs(value, rtt).unwrap();
            assert_eq!(aggregates.len(), 2);
            assert_eq!(aggregates[0].aggregator, Aggregator::Avg);
            averages.push(aggregates[0].value);
        }
        // More mixes, longer round trips.
        assert!(averages[0] < averages[1] && averages[1] < averages[2], "{:?}", averages);
    }
}
