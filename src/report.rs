//! Report generation for experiment results.
//!
//! Writes a JSON dump of every aggregate, a human-readable text report and
//! one whitespace-separated table per destination plot.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::Serialize;

use crate::statistics::{AggregateResult, Aggregator, PlotType, ResultSet, StatisticsType};

#[derive(Debug, Serialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    pub varying_key: Option<String>,
    pub runs_per_value: usize,
}

/// Aggregates of one varying value.
#[derive(Debug, Serialize)]
pub struct ValueReport {
    pub value: String,
    pub mean_simulated_seconds: Option<f64>,
    pub executed_events: u64,
    pub statistics: BTreeMap<StatisticsType, Vec<AggregateResult>>,
}

#[derive(Debug, Serialize)]
pub struct ExperimentReport {
    pub metadata: ReportMetadata,
    pub values: Vec<ValueReport>,
}

impl ExperimentReport {
    /// Apply every cross-run aggregator of every active type.
    pub fn from_results(results: &ResultSet) -> Result<Self> {
        let mut values = Vec::with_capacity(results.varying_values().len());
        for (index, label) in results.varying_values().iter().enumerate() {
            let mut statistics = BTreeMap::new();
            for ty in results.catalog().active_types() {
                let aggregates = results
                    .results_for_all_runs(index, ty)
                    .with_context(|| format!("Failed to aggregate '{}' for {}", ty, label))?;
                statistics.insert(ty, aggregates);
            }
            let executed_events = (0..results.runs())
                .filter_map(|run| results.run(index, run))
                .map(|record| record.executed_events)
                .sum();
            values.push(ValueReport {
                value: label.clone(),
                mean_simulated_seconds: results
                    .mean_simulated_duration(index)
                    .map(|d| d.as_secs_f64()),
                executed_events,
                statistics,
            });
        }

        Ok(Self {
            metadata: ReportMetadata {
                generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                varying_key: results.varying_key().map(str::to_string),
                runs_per_value: results.runs(),
            },
            values,
        })
    }
}

fn aggregator_name(aggregator: Aggregator) -> &'static str {
    match aggregator {
        Aggregator::None => "none",
        Aggregator::Avg => "avg",
        Aggregator::Sum => "sum",
        Aggregator::Min => "min",
        Aggregator::Max => "max",
        Aggregator::Median => "median",
        Aggregator::Count => "count",
        Aggregator::StdDev => "stddev",
        Aggregator::Percentage => "percentage",
    }
}

/// Generate JSON report
pub fn generate_json_report(report: &ExperimentReport, output_path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

/// Generate human-readable text report
pub fn generate_text_report(report: &ExperimentReport, output_path: &Path) -> Result<()> {
    let mut lines: Vec<String> = Vec::new();

    lines.push("=".repeat(80));
    lines.push("                        MIXSIM EXPERIMENT REPORT".to_string());
    lines.push("=".repeat(80));
    lines.push(String::new());

    lines.push(format!("Generated: {}", report.metadata.generated_at));
    lines.push(format!(
        "Varying parameter: {}",
        report.metadata.varying_key.as_deref().unwrap_or("(none)")
    ));
    lines.push(format!("Runs per value: {}", report.metadata.runs_per_value));
    lines.push(String::new());

    for value in &report.values {
        lines.push("-".repeat(80));
        lines.push(format!("Value: {}", value.value));
        if let Some(seconds) = value.mean_simulated_seconds {
            lines.push(format!("  Mean simulated time: {:.3}s", seconds));
        }
        lines.push(format!("  Executed events: {}", value.executed_events));
        lines.push(String::new());

        for (ty, aggregates) in &value.statistics {
            if aggregates.is_empty() {
                continue;
            }
            let rendered: Vec<String> = aggregates
                .iter()
                .map(|a| format!("{}={:.3}", aggregator_name(a.aggregator), a.value))
                .collect();
            lines.push(format!("  {:<36} {}", ty.name(), rendered.join("  ")));
        }
        lines.push(String::new());
    }

    lines.push("=".repeat(80));

    let content = lines.join("\n");
    fs::write(output_path, content)
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Write one `<plot>.dat` table per destination plot: a comment line with
/// the plot type, then one row per varying value and one column per (type,
/// aggregator). Returns the plot names written.
pub fn write_plot_tables(
    report: &ExperimentReport,
    results: &ResultSet,
    output_dir: &Path,
) -> Result<Vec<String>> {
    let mut plots: BTreeMap<&str, (PlotType, Vec<StatisticsType>)> = BTreeMap::new();
    for ty in results.catalog().active_types() {
        if let Some(descriptor) = results.catalog().descriptor(ty) {
            if !descriptor.run_aggregators.is_empty() {
                plots
                    .entry(descriptor.destination_plot.as_str())
                    .or_insert_with(|| (descriptor.plot_type, Vec::new()))
                    .1
                    .push(ty);
            }
        }
    }

    let mut written = Vec::new();
    for (plot, (plot_type, types)) in plots {
        let kind = match plot_type {
            PlotType::LineChart => "line_chart",
            PlotType::BarChart => "bar_chart",
        };
        let mut header = vec!["#value".to_string()];
        for ty in &types {
            if let Some(descriptor) = results.catalog().descriptor(*ty) {
                for aggregator in &descriptor.run_aggregators {
                    header.push(format!("{}:{}", ty.name(), aggregator_name(*aggregator)));
                }
            }
        }

        let mut lines = vec![format!("# {} {}", plot, kind), header.join(" ")];
        for value in &report.values {
            let mut row = vec![value.value.replace(char::is_whitespace, "_")];
            for ty in &types {
                for aggregate in value.statistics.get(ty).into_iter().flatten() {
                    row.push(format!("{}", aggregate.value));
                }
            }
            lines.push(row.join(" "));
        }

        let path = output_dir.join(format!("{}.dat", plot));
        fs::write(&path, lines.join("\n") + "\n")
            .with_context(|| format!("Failed to write plot table {}", path.display()))?;
        log::debug!("Plot table written to {}", path.display());
        written.push(plot.to_string());
    }
    Ok(written)
}

/// Print a summary to stdout
pub fn print_summary(report: &ExperimentReport) {
    let round_trip: StatisticsType = StatisticsType::Sample(
        crate::statistics::SampleStat::ClientRoundTripMs,
    );
    println!("\n=== MIXSIM EXPERIMENT SUMMARY ===\n");
    for value in &report.values {
        print!("{}: ", value.value);
        match value
            .statistics
            .get(&round_trip)
            .and_then(|aggregates| aggregates.first())
        {
            Some(aggregate) => println!(
                "round trip {} {:.2}ms",
                aggregator_name(aggregate.aggregator),
                aggregate.value
            ),
            None => println!("no round trips recorded"),
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::statistics::{
        PreciseSum, RecordedValues, RunRecord, SampleStat, StatisticsCatalog,
    };

    fn results() -> ResultSet {
        let mut results = ResultSet::new(
            Some("topology.mixes".to_string()),
            vec!["1".to_string(), "3".to_string()],
            1,
            Arc::new(StatisticsCatalog::default()),
        );
        for (index, rtt) in [10.0, 30.0].into_iter().enumerate() {
            let mut values = BTreeMap::new();
            values.insert(
                StatisticsType::Sample(SampleStat::ClientRoundTripMs),
                RecordedValues::Samples(vec![rtt]),
            );
            let mut sum = PreciseSum::new();
            sum.add_count(4);
            values.insert(
                StatisticsType::Counter(crate::statistics::CounterStat::ClientRequestsSent),
                RecordedValues::Sums(vec![sum]),
            );
            results
                .record_run(
                    index,
                    0,
                    RunRecord {
                        values,
                        simulated_duration: Duration::from_secs(2),
                        clients: 1,
                        mixes: 1,
                        executed_events: 100,
                    },
                )
                .unwrap();
        }
        results
    }

    #[test]
    fn test_report_files() {
        let results = results();
        let report = ExperimentReport::from_results(&results).unwrap();
        let dir = TempDir::new().unwrap();

        generate_json_report(&report, &dir.path().join("results.json")).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("results.json")).unwrap())
                .unwrap();
        assert_eq!(json["metadata"]["varying_key"], "topology.mixes");
        assert_eq!(json["values"][1]["statistics"]["client_round_trip_ms"][0]["value"], 30.0);

        generate_text_report(&report, &dir.path().join("report.txt")).unwrap();
        let text = fs::read_to_string(dir.path().join("report.txt")).unwrap();
        assert!(text.contains("Value: 3"));

        let plots = write_plot_tables(&report, &results, dir.path()).unwrap();
        assert!(plots.contains(&"latency".to_string()));
        let latency = fs::read_to_string(dir.path().join("latency.dat")).unwrap();
        let rows: Vec<&str> = latency.lines().collect();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], "# latency line_chart");
        assert!(rows[1].starts_with("#value client_round_trip_ms:median"));
        assert!(rows[3].starts_with("3 30"));
    }
}
