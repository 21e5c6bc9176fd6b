/// 批量评估测试
///
/// 从原始采集文件开始：划分数据集、加载、批量评估、输出报表

use mcpdnav::algorithms::*;
use mcpdnav::config::EvaluationConfig;
use mcpdnav::dataset::{raw_measurements, read_raw_capture, split_datasets};
use mcpdnav::evaluation::{EvaluationReport, Evaluator};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const BEACONS: [(&str, u32, f64, f64); 3] = [
    ("AA:BB:CC:DD:EE:01", 1, 0.0, 0.0),
    ("AA:BB:CC:DD:EE:02", 2, 4.0, 0.0),
    ("AA:BB:CC:DD:EE:03", 3, 0.0, 4.0),
];

fn test_room() -> Room {
    Room::new(
        BEACONS
            .iter()
            .map(|&(id, index, x, y)| Beacon::new(id, index, Point::new(x, y)))
            .collect(),
        Point::new(4.0, 4.0),
        BTreeMap::from([
            (1, Point::new(1.0, 1.0)),
            (2, Point::new(3.0, 1.0)),
            (3, Point::new(1.0, 3.0)),
            (4, Point::new(3.0, 3.0)),
        ]),
        BTreeMap::from([(11, Point::new(2.0, 2.0)), (12, Point::new(1.5, 1.2))]),
    )
    .unwrap()
}

/// 为某个位置生成 `samples` 轮采集，每轮每个信标一行
fn write_capture(dir: &Path, position: u32, at: Point, samples: usize) {
    let mut text = String::new();
    for i in 0..samples {
        let jitter = (i % 5) as f64 * 0.2 - 0.4;
        for &(id, _, x, y) in &BEACONS {
            let d = at.euclidean_distance(&Point::new(x, y));
            let rssi = -45.0 - 20.0 * (d + 0.1).log10() + jitter;
            let mcpd = d + jitter * 0.05;
            let _ = writeln!(text, "{},ok,{:.3},{:.4},0.0,0.0,1", id, rssi, mcpd);
        }
    }
    fs::write(dir.join(format!("{}.csv", position)), text).unwrap();
}

fn prepare(dir: &Path) -> EvaluationConfig {
    let room = test_room();
    let raw = dir.join("raw");
    fs::create_dir_all(&raw).unwrap();
    for (&id, &p) in room.reference_positions() {
        write_capture(&raw, id, p, 15);
    }
    for (&id, &p) in room.query_positions() {
        write_capture(&raw, id, p, 6);
    }

    let config = EvaluationConfig {
        room,
        raw_data_path: raw,
        train_set_path: dir.join("train_set"),
        test_set_path: dir.join("test_set"),
        validation_set_path: dir.join("validation_set"),
        train_size: 10,
        ks: vec![1, 3],
        ..EvaluationConfig::default()
    };
    split_datasets(&config).unwrap();
    config
}

async fn run_report(config: &EvaluationConfig) -> EvaluationReport {
    let datasets = Datasets::load(config).unwrap();
    let evaluator = Evaluator::new(WknnEstimator::new(config.room.clone(), datasets));
    evaluator
        .run(&config.ks, &config.metrics, &config.room.all_position_ids())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_batch_evaluation_from_raw_captures() {
    let dir = tempfile::tempdir().unwrap();
    let config = prepare(dir.path());
    let report = run_report(&config).await;

    // 2 个 k × 2 种度量 × 6 个位置
    assert_eq!(report.results.len(), 24);
    assert!(report.failures.is_empty());
    assert_eq!(
        report.combinations(),
        vec![(1, Metric::Euclidean), (1, Metric::Chebyshev), (3, Metric::Euclidean), (3, Metric::Chebyshev)]
    );

    let keys: Vec<ResultKey> = report.results.iter().map(|r| r.key()).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);

    let r = report.get(3, Metric::Chebyshev, 11).unwrap();
    assert_eq!(r.ground_truth, Point::new(2.0, 2.0));
    assert_eq!(r.signal_neighbors.as_ref().unwrap().len(), 3);
    assert!(report.get(3, Metric::Chebyshev, 99).is_none());
}

#[tokio::test]
async fn test_batch_matches_direct_estimation() {
    let dir = tempfile::tempdir().unwrap();
    let config = prepare(dir.path());
    let report = run_report(&config).await;

    let estimator = WknnEstimator::new(config.room.clone(), Datasets::load(&config).unwrap());
    for result in &report.results {
        let direct = estimator
            .estimate_from_average(result.k, result.query_id, result.metric)
            .unwrap();
        assert_eq!(&direct, result);
    }
}

#[tokio::test]
async fn test_error_table_and_summary() {
    let dir = tempfile::tempdir().unwrap();
    let config = prepare(dir.path());
    let report = run_report(&config).await;

    let table = report.error_table(3, Metric::Euclidean);
    println!("{}", table);
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], "# k3_EUCLIDEAN-norm_error");
    assert_eq!(lines[1], "| Type | 1 | 2 | 3 | 4 | 11 | 12 |");
    assert!(lines[3].starts_with("| **RSSI** |"));
    assert!(lines[4].starts_with("| **MCPD** |"));
    assert_eq!(lines[3].matches('|').count(), 8);

    let summary = report.summary(3, Metric::Euclidean).unwrap();
    assert!(summary.signal.mean >= 0.0);
    assert!((summary.phase.std_dev - summary.phase.variance.sqrt()).abs() < 1e-12);
    assert!(report.summary(7, Metric::Euclidean).is_none());

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("generated_at"));
}

#[tokio::test]
async fn test_missing_validation_rows_recorded_as_failures() {
    let dir = tempfile::tempdir().unwrap();
    let config = prepare(dir.path());

    let mut datasets = Datasets::load(&config).unwrap();
    let rows: Vec<Fingerprint> = datasets
        .validation
        .rows()
        .iter()
        .copied()
        .filter(|r| !(r.position_id == 12 && r.beacon_index == 2))
        .collect();
    datasets.validation = FingerprintTable::from_rows(rows).unwrap();

    let evaluator = Evaluator::new(WknnEstimator::new(config.room.clone(), datasets));
    let report = evaluator
        .run(&[3], &[Metric::Euclidean], &[11, 12])
        .await
        .unwrap();

    assert_eq!(report.results.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].key, ResultKey::new(3, Metric::Euclidean, 12));
}

#[test]
fn test_repeated_raw_estimation() {
    let dir = tempfile::tempdir().unwrap();
    let config = prepare(dir.path());
    let evaluator = Evaluator::new(WknnEstimator::new(
        config.room.clone(),
        Datasets::load(&config).unwrap(),
    ));

    let (samples, stats) = read_raw_capture(config.raw_capture_path(12)).unwrap();
    assert_eq!(stats.skipped, 0);
    let measurements = raw_measurements(&samples, &config.room);
    assert_eq!(measurements.len(), 6);

    let averaged = evaluator
        .estimate_repeated(3, 12, Metric::Euclidean, &measurements)
        .unwrap();
    println!("{}", averaged);
    assert!(averaged.is_averaged());
    assert_eq!(averaged.samples, 6);
    assert_eq!(averaged.ground_truth, Point::new(1.5, 1.2));

    assert!(evaluator
        .estimate_repeated(3, 12, Metric::Euclidean, &[])
        .is_err());
}
