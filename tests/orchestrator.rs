//! Batch execution over runs and device addresses, and the artifacts it leaves on disk.

use std::path::Path;
use std::sync::Arc;

use ldc_bench::acquisition::{ChannelSettings, LeakageSampler, SampleClock};
use ldc_bench::hardware::{simulated_bench, Fault, MockLdcSensor, MockSourceMeter};
use ldc_bench::storage::artifacts::{INFO_FILE, PLOTS_DIR, SAMPLES_DIR, SUMMARY_JSON};
use ldc_bench::storage::{read_table, ArtifactWriter, TestInfo};
use ldc_bench::sweep::{RunOrchestrator, SweepConfig, SweepController};
use ldc_bench::BenchError;

fn orchestrator(
    root: &Path,
    source: MockSourceMeter,
) -> (Arc<MockSourceMeter>, Arc<MockLdcSensor>, RunOrchestrator) {
    let (source, sensor) = simulated_bench(source, |s| s.with_error(1.01, 1e-5));
    let sampler = LeakageSampler::new(
        SampleClock::default(),
        source.clone(),
        sensor.clone(),
        ChannelSettings::default(),
    );
    let controller = SweepController::new(source.clone(), sampler);
    let writer = ArtifactWriter::new(root, TestInfo::new("Batch Test"));
    let orchestrator = RunOrchestrator::new(source.clone(), sensor.clone(), controller, writer);
    (source, sensor, orchestrator)
}

/// Three points per run, one second each.
fn batch(addresses: Vec<u16>, run_count: u32) -> SweepConfig {
    SweepConfig {
        step: 0.001,
        minimum: 0.0,
        maximum: 0.002,
        duration: 1.0,
        run_count,
        device_addresses: addresses,
        ..SweepConfig::default()
    }
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test(start_paused = true)]
async fn one_aborted_run_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    // Runs use set_current calls 1-3, 4-6, ...; call 11 is step 2 of the fourth run.
    let source = MockSourceMeter::new().with_fault(Fault::OnCall {
        operation: "set_current",
        call: 11,
    });
    let (source, _sensor, orchestrator) = orchestrator(dir.path(), source);

    let report = orchestrator.execute(&batch(vec![53, 54], 3)).await.unwrap();

    assert_eq!(report.attempts, 6);
    assert_eq!(report.completed.len(), 5);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.series().count(), 5);
    assert!(!report.is_success());

    let failure = &report.failures[0];
    assert_eq!(failure.device_address, 54);
    assert_eq!(failure.run_index, 1);
    assert_eq!(failure.step(), Some(2));
    assert!(matches!(failure.error, BenchError::SweepAborted { .. }));
    // The point measured before the failure is still on disk.
    assert_eq!(failure.artifacts.len(), 2);
    assert!(failure.artifacts.iter().all(|p| p.exists()));

    let order: Vec<(u16, u32)> = report
        .completed
        .iter()
        .map(|run| (run.context.device_address, run.context.run_index))
        .collect();
    assert_eq!(order, vec![(53, 1), (53, 2), (53, 3), (54, 2), (54, 3)]);

    // Output is disabled once per run, failed run included.
    assert_eq!(source.calls("disable_output"), 6);
    assert!(!source.is_output_enabled().await);
}

#[tokio::test(start_paused = true)]
async fn completed_run_writes_points_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let (_source, _sensor, orchestrator) = orchestrator(dir.path(), MockSourceMeter::new());

    let report = orchestrator.execute(&batch(vec![53], 1)).await.unwrap();
    assert!(report.is_success());

    let run = &report.completed[0];
    assert_eq!(run.context.output_path, dir.path().join("53").join("1"));
    // 3 points x (plot + table), 3 summaries x (plot + table), JSON summary.
    assert_eq!(run.artifacts.len(), 13);
    assert!(run.artifacts.iter().all(|p| p.exists()));

    let info = std::fs::read_to_string(dir.path().join(INFO_FILE)).unwrap();
    let lines: Vec<&str> = info.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Batch Test");
    assert_eq!(lines[2], "SEI - Electronics Systems and Instrumentation");

    let run_dir = &run.context.output_path;
    // Points and summaries; the JSON summary sits next to the tables.
    assert_eq!(files_in(&run_dir.join(PLOTS_DIR)), 6);
    assert_eq!(files_in(&run_dir.join(SAMPLES_DIR)), 7);
    assert!(run_dir.join(SAMPLES_DIR).join(SUMMARY_JSON).exists());

    // Per-point tables hold the window samples.
    let point = &run.series.points()[1];
    let table_path = run
        .artifacts
        .iter()
        .find(|p| {
            p.starts_with(run_dir.join(SAMPLES_DIR))
                && p.to_string_lossy().contains(&ArtifactWriter::point_stem(point))
        })
        .unwrap();
    let table = read_table(table_path).unwrap();
    assert_eq!(table.rows(), point.window.len());
    let elapsed = point.window.elapsed();
    let sensor = point.window.sensor_values();
    let time_column = table.column_at(0).unwrap();
    let leakage_column = table.column_at(1).unwrap();
    for i in 0..table.rows() {
        assert!((time_column.values[i] - elapsed[i]).abs() < 1e-6);
        assert!((leakage_column.values[i] - sensor[i]).abs() < 1e-6);
    }
}

#[tokio::test(start_paused = true)]
async fn existing_run_directory_is_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let (source, _sensor, orchestrator) = orchestrator(dir.path(), MockSourceMeter::new());
    let config = batch(vec![53], 2);

    let first = orchestrator.execute(&config).await.unwrap();
    assert!(first.is_success());
    let set_current_calls = source.calls("set_current");

    let second = orchestrator.execute(&config).await.unwrap();
    assert_eq!(second.attempts, 2);
    assert_eq!(second.failures.len(), 2);
    for failure in &second.failures {
        assert!(matches!(failure.error, BenchError::DirectoryExists(_)));
        assert!(failure.artifacts.is_empty());
    }
    // The hardware is not touched for a run that cannot be stored.
    assert_eq!(source.calls("set_current"), set_current_calls);
}

#[tokio::test(start_paused = true)]
async fn summary_rewrite_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (_source, _sensor, orchestrator) = orchestrator(dir.path(), MockSourceMeter::new());

    let report = orchestrator.execute(&batch(vec![53], 1)).await.unwrap();
    let run = &report.completed[0];
    let json_path = run.context.samples_dir().join(SUMMARY_JSON);
    let before = std::fs::read_to_string(&json_path).unwrap();

    let rewritten = orchestrator
        .writer()
        .write_summary(&run.context, &run.series)
        .unwrap();
    assert_eq!(rewritten.len(), 7);
    assert_eq!(std::fs::read_to_string(&json_path).unwrap(), before);

    let summary: serde_json::Value = serde_json::from_str(&before).unwrap();
    assert_eq!(summary["device_address"], 53);
    assert_eq!(summary["run_index"], 1);
    assert_eq!(summary["series"]["points"].as_array().map(Vec::len), Some(3));
}

#[tokio::test(start_paused = true)]
async fn degauss_before_every_run() {
    let dir = tempfile::tempdir().unwrap();
    let (source, sensor, orchestrator) = orchestrator(dir.path(), MockSourceMeter::new());
    let config = SweepConfig {
        apply_reset: true,
        ..batch(vec![53], 2)
    };

    let report = orchestrator.execute(&config).await.unwrap();

    assert!(report.is_success());
    assert_eq!(sensor.calls("reset_interlocks"), 4);
    // One disable per degauss plus one per sweep.
    assert_eq!(source.calls("disable_output"), 4);
}

#[tokio::test(start_paused = true)]
async fn failed_degauss_skips_the_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let (source, sensor) = simulated_bench(MockSourceMeter::new(), |s| {
        s.with_fault(Fault::OnCall {
            operation: "reset_interlocks",
            call: 1,
        })
    });
    let sampler = LeakageSampler::new(
        SampleClock::default(),
        source.clone(),
        sensor.clone(),
        ChannelSettings::default(),
    );
    let controller = SweepController::new(source.clone(), sampler);
    let writer = ArtifactWriter::new(dir.path(), TestInfo::new("Degauss"));
    let orchestrator = RunOrchestrator::new(source.clone(), sensor, controller, writer);
    let config = SweepConfig {
        apply_reset: true,
        ..batch(vec![53], 2)
    };

    let report = orchestrator.execute(&config).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.completed.len(), 1);
    assert!(matches!(
        report.failures[0].error,
        BenchError::Communication {
            operation: "reset_interlocks",
            ..
        }
    ));
    assert_eq!(report.failures[0].step(), None);
    // Only the second run swept.
    assert_eq!(source.calls("set_current"), 3);
}

#[tokio::test(start_paused = true)]
async fn invalid_batch_is_rejected_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("out");
    let (source, _sensor, orchestrator) = orchestrator(&root, MockSourceMeter::new());

    let err = orchestrator
        .execute(&batch(vec![53, 53], 1))
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::InvalidConfig(_)));
    assert!(!root.exists());
    assert_eq!(source.calls("enable_output"), 0);
}

#[tokio::test(start_paused = true)]
async fn single_measurement_writes_one_point() {
    let dir = tempfile::tempdir().unwrap();
    let (source, _sensor, orchestrator) = orchestrator(dir.path(), MockSourceMeter::new());

    let measurement = orchestrator
        .single_measurement(53, 0.002, 2.0, false)
        .await
        .unwrap();

    assert!((measurement.point.commanded_milliamps() - 2.0).abs() < 1e-9);
    assert_eq!(measurement.point.statistics.count, 20);
    assert_eq!(measurement.artifacts.len(), 2);
    assert!(measurement
        .context
        .output_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("Batch Test-"));
    assert_eq!(source.calls("disable_output"), 1);
}
