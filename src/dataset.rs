/// 数据集读写
///
/// 支持：
/// - 读取平均值指纹表 `results_avg.csv`
/// - 解析原始 UART 采集文件
/// - 按位置、按信标划分训练/测试/验证集并求平均
/// - 统计采集文件中每个信标的行数

use crate::algorithms::{Beacon, Datasets, FeaturePair, Fingerprint, FingerprintTable, Measurement, Room};
use crate::config::{EvaluationConfig, AVERAGE_TABLE_FILE};
use crate::error::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// 平均值指纹表
// ============================================================================

/// 读取平均值指纹表，只使用 position、id、rssi、mcpd_ifft 四列
pub fn load_table(path: impl AsRef<Path>) -> Result<FingerprintTable> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)?;
    let mut table = FingerprintTable::new();
    for row in reader.deserialize::<Fingerprint>() {
        table.push(row?)?;
    }
    info!(
        path = %path.display(),
        rows = table.len(),
        positions = table.positions().len(),
        "指纹表已加载"
    );
    Ok(table)
}

impl Datasets {
    /// 按配置加载训练、测试、验证三张平均值表
    pub fn load(config: &EvaluationConfig) -> Result<Self> {
        Ok(Datasets::new(
            load_table(config.reference_table_path())?,
            load_table(config.test_table_path())?,
            load_table(config.validation_table_path())?,
        ))
    }
}

// ============================================================================
// 原始采集数据
// ============================================================================

/// 原始采集文件中的一行（无表头）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub uuid: String,
    pub state: String,
    pub rssi: f64,
    pub mcpd_ifft: f64,
    pub mcpd_phase_slope: f64,
    pub mcpd_rssi_openspace: f64,
    pub best: f64,
}

/// 解析统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub total_rows: usize,
    pub parsed: usize,
    pub skipped: usize,
    /// 第一个被跳过的行在文件中的行号
    pub first_skipped_line: Option<u64>,
}

/// 读取原始采集文件，跳过无法解析的行
pub fn read_raw_capture(path: impl AsRef<Path>) -> Result<(Vec<RawSample>, ParseStats)> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut samples = Vec::new();
    let mut stats = ParseStats::default();
    for row in reader.deserialize::<RawSample>() {
        stats.total_rows += 1;
        match row {
            Ok(sample) => {
                stats.parsed += 1;
                samples.push(sample);
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                stats.skipped += 1;
                let line = e.position().map(|p| p.line());
                stats.first_skipped_line = stats.first_skipped_line.or(line);
                warn!(path = %path.display(), line = ?line, error = %e, "跳过无法解析的采集行");
            }
        }
    }

    Ok((samples, stats))
}

/// 某个信标的全部样本
pub fn samples_for<'a>(samples: &'a [RawSample], beacon: &Beacon) -> Vec<&'a RawSample> {
    samples.iter().filter(|s| s.uuid == beacon.id).collect()
}

/// 把原始样本逐条组合成实时测量
///
/// 第 i 次测量由每个信标的第 i 个样本组成，测量次数为各信标样本数的最小值。
pub fn raw_measurements(samples: &[RawSample], room: &Room) -> Vec<Measurement> {
    let per_beacon: Vec<(u32, Vec<&RawSample>)> = room
        .beacons()
        .iter()
        .map(|b| (b.index, samples_for(samples, b)))
        .collect();
    let count = per_beacon.iter().map(|(_, s)| s.len()).min().unwrap_or(0);

    (0..count)
        .map(|i| {
            per_beacon
                .iter()
                .map(|(index, s)| (*index, FeaturePair::new(s[i].rssi, s[i].mcpd_ifft)))
                .collect()
        })
        .collect()
}

/// 平均值表中的一行
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AveragedRow {
    pub position: u32,
    pub id: u32,
    pub rssi: f64,
    pub mcpd_ifft: f64,
    pub mcpd_phase_slope: f64,
    pub mcpd_rssi_openspace: f64,
    pub best: f64,
}

/// 对一组样本的数值列逐列求平均，空集返回 None
pub fn average_samples(position: u32, beacon_index: u32, samples: &[&RawSample]) -> Option<AveragedRow> {
    if samples.is_empty() {
        return None;
    }
    let n = samples.len() as f64;
    let mean = |f: fn(&RawSample) -> f64| samples.iter().map(|s| f(s)).sum::<f64>() / n;

    Some(AveragedRow {
        position,
        id: beacon_index,
        rssi: mean(|s| s.rssi),
        mcpd_ifft: mean(|s| s.mcpd_ifft),
        mcpd_phase_slope: mean(|s| s.mcpd_phase_slope),
        mcpd_rssi_openspace: mean(|s| s.mcpd_rssi_openspace),
        best: mean(|s| s.best),
    })
}

// ============================================================================
// 训练/测试/验证集划分
// ============================================================================

/// 划分结果统计
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SplitSummary {
    pub train_samples: usize,
    pub test_samples: usize,
    pub validation_samples: usize,
    pub skipped_rows: usize,
}

/// 从原始采集数据生成训练、测试、验证集
///
/// 训练点：每个信标的样本按固定种子打乱，前 `train_size` 个进入训练集，其余进入测试集。
/// 验证点：全部样本进入验证集。每个集合目录中写出逐 (位置, 信标) 的样本文件以及平均值表。
pub fn split_datasets(config: &EvaluationConfig) -> Result<SplitSummary> {
    for dir in [
        &config.train_set_path,
        &config.test_set_path,
        &config.validation_set_path,
    ] {
        fs::create_dir_all(dir)?;
    }

    let room = &config.room;
    let mut summary = SplitSummary::default();
    let mut train_avg = Vec::new();
    let mut test_avg = Vec::new();
    let mut validation_avg = Vec::new();

    for &position in room.reference_positions().keys() {
        let (samples, stats) = read_raw_capture(config.raw_capture_path(position))?;
        summary.skipped_rows += stats.skipped;

        for beacon in room.beacons() {
            let mut rows = samples_for(&samples, beacon);
            let mut rng = StdRng::seed_from_u64(config.split_seed);
            rows.shuffle(&mut rng);

            if rows.len() <= config.train_size {
                warn!(
                    position,
                    beacon = beacon.index,
                    available = rows.len(),
                    train_size = config.train_size,
                    "样本不足，测试集为空"
                );
            }
            let test = rows.split_off(rows.len().min(config.train_size));
            let train = rows;

            write_samples(&config.train_set_path, position, beacon.index, &train)?;
            write_samples(&config.test_set_path, position, beacon.index, &test)?;
            summary.train_samples += train.len();
            summary.test_samples += test.len();

            train_avg.extend(average_samples(position, beacon.index, &train));
            test_avg.extend(average_samples(position, beacon.index, &test));
        }
    }

    for &position in room.query_positions().keys() {
        let (samples, stats) = read_raw_capture(config.raw_capture_path(position))?;
        summary.skipped_rows += stats.skipped;

        for beacon in room.beacons() {
            let rows = samples_for(&samples, beacon);
            write_samples(&config.validation_set_path, position, beacon.index, &rows)?;
            summary.validation_samples += rows.len();
            validation_avg.extend(average_samples(position, beacon.index, &rows));
        }
    }

    write_averages(&config.train_set_path, &train_avg)?;
    write_averages(&config.test_set_path, &test_avg)?;
    write_averages(&config.validation_set_path, &validation_avg)?;

    info!(
        train = summary.train_samples,
        test = summary.test_samples,
        validation = summary.validation_samples,
        skipped = summary.skipped_rows,
        "数据集划分完成"
    );
    Ok(summary)
}

fn write_samples(dir: &Path, position: u32, beacon_index: u32, rows: &[&RawSample]) -> Result<()> {
    let path = dir.join(format!("position_{}_beacon_{}.csv", position, beacon_index));
    let mut writer = csv::Writer::from_path(&path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_averages(dir: &Path, rows: &[AveragedRow]) -> Result<()> {
    let path = dir.join(AVERAGE_TABLE_FILE);
    let mut writer = csv::Writer::from_path(&path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = rows.len(), "平均值表已写出");
    Ok(())
}

// ============================================================================
// 采集监控
// ============================================================================

/// 统计采集文件中提到每个信标地址的行数（按房间中的信标顺序）
///
/// 按字节匹配，串口采集中夹杂的非 UTF-8 字节不影响其余行的统计。
pub fn count_beacon_lines(path: impl AsRef<Path>, room: &Room) -> Result<Vec<(Beacon, usize)>> {
    let data = fs::read(path.as_ref())?;
    room.beacons()
        .iter()
        .map(|beacon| {
            let pattern = Regex::new(&regex::escape(&beacon.id))?;
            let count = data
                .split(|&b| b == b'\n')
                .filter(|line| pattern.is_match(line))
                .count();
            Ok((beacon.clone(), count))
        })
        .collect()
}
