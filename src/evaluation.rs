/// 批量评估
///
/// 对 (k, 度量, 查询位置) 的所有组合计算 wkNN 估计。每个 (k, 度量) 组合在一个阻塞任务中
/// 计算，任务之间没有共享的可变状态，结果按键排序收集。

use crate::algorithms::{average, AveragedResult, EstimationResult, Measurement, Metric, ResultKey, WknnEstimator};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// 单次估计失败的记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvaluationFailure {
    pub key: ResultKey,
    pub message: String,
}

/// 误差统计（米）
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorStatistics {
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
}

impl ErrorStatistics {
    /// 计算总体均值、方差与标准差，空序列返回 None
    pub fn from_errors(errors: &[f64]) -> Option<Self> {
        if errors.is_empty() {
            return None;
        }
        let n = errors.len() as f64;
        let mean = errors.iter().sum::<f64>() / n;
        let variance = errors.iter().map(|e| (e - mean).powi(2)).sum::<f64>() / n;
        Some(ErrorStatistics {
            mean,
            variance,
            std_dev: variance.sqrt(),
        })
    }
}

/// 某个 (k, 度量) 组合下两个通道的误差统计
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub k: usize,
    pub metric: Metric,
    pub signal: ErrorStatistics,
    pub phase: ErrorStatistics,
}

/// 评估报告
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// 生成时间
    pub generated_at: DateTime<Utc>,
    /// 按 (k, 度量, 位置) 排序的结果
    pub results: Vec<EstimationResult>,
    /// 失败的估计
    pub failures: Vec<EvaluationFailure>,
}

impl EvaluationReport {
    /// 获取单个结果
    pub fn get(&self, k: usize, metric: Metric, query_id: u32) -> Option<&EstimationResult> {
        let key = ResultKey::new(k, metric, query_id);
        self.results
            .binary_search_by(|r| r.key().cmp(&key))
            .ok()
            .map(|i| &self.results[i])
    }

    /// 某个 (k, 度量) 组合下的全部结果（按位置排序）
    pub fn results_for(&self, k: usize, metric: Metric) -> Vec<&EstimationResult> {
        self.results
            .iter()
            .filter(|r| r.k == k && r.metric == metric)
            .collect()
    }

    /// 报告中出现的 (k, 度量) 组合
    pub fn combinations(&self) -> Vec<(usize, Metric)> {
        let mut combos: Vec<(usize, Metric)> = self.results.iter().map(|r| (r.k, r.metric)).collect();
        combos.dedup();
        combos
    }

    /// 误差统计
    pub fn summary(&self, k: usize, metric: Metric) -> Option<ErrorSummary> {
        let results = self.results_for(k, metric);
        let signal: Vec<f64> = results.iter().map(|r| r.signal_error).collect();
        let phase: Vec<f64> = results.iter().map(|r| r.phase_error).collect();
        Some(ErrorSummary {
            k,
            metric,
            signal: ErrorStatistics::from_errors(&signal)?,
            phase: ErrorStatistics::from_errors(&phase)?,
        })
    }

    /// Markdown 误差表：列为位置编号，行为 RSSI 和 MCPD，保留三位小数
    pub fn error_table(&self, k: usize, metric: Metric) -> String {
        let results = self.results_for(k, metric);
        let mut table = String::new();

        let _ = writeln!(table, "# k{}_{}_error", k, metric);
        table.push_str("| Type |");
        for r in &results {
            let _ = write!(table, " {} |", r.query_id);
        }
        table.push_str("\n| ---- |");
        for _ in &results {
            table.push_str(" ----: |");
        }
        table.push('\n');

        let rows: [(&str, fn(&EstimationResult) -> f64); 2] = [
            ("RSSI", |r| r.signal_error),
            ("MCPD", |r| r.phase_error),
        ];
        for (label, select) in rows {
            let _ = write!(table, "| **{}** |", label);
            for r in &results {
                let _ = write!(table, " {:.3} |", select(r));
            }
            table.push('\n');
        }

        table
    }
}

/// 批量评估器
#[derive(Clone, Debug)]
pub struct Evaluator {
    estimator: Arc<WknnEstimator>,
}

impl Evaluator {
    pub fn new(estimator: WknnEstimator) -> Self {
        Evaluator {
            estimator: Arc::new(estimator),
        }
    }

    pub fn estimator(&self) -> &WknnEstimator {
        &self.estimator
    }

    /// 评估所有 (k, 度量, 位置) 组合，使用各位置的平均测量
    ///
    /// 单次估计失败不会中止整批，失败会记录在报告中。
    pub async fn run(
        &self,
        ks: &[usize],
        metrics: &[Metric],
        query_ids: &[u32],
    ) -> Result<EvaluationReport> {
        let mut tasks = JoinSet::new();

        for &k in ks {
            for &metric in metrics {
                let estimator = Arc::clone(&self.estimator);
                let ids = query_ids.to_vec();
                tasks.spawn_blocking(move || {
                    ids.into_iter()
                        .map(|id| {
                            let key = ResultKey::new(k, metric, id);
                            (key, estimator.estimate_from_average(k, id, metric))
                        })
                        .collect::<Vec<_>>()
                });
            }
        }

        let mut results = Vec::new();
        let mut failures = Vec::new();
        while let Some(batch) = tasks.join_next().await {
            for (key, outcome) in batch? {
                match outcome {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        warn!(%key, error = %e, "估计失败");
                        failures.push(EvaluationFailure {
                            key,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }

        results.sort_by_key(|r| r.key());
        failures.sort_by_key(|f| f.key);

        info!(
            results = results.len(),
            failures = failures.len(),
            "批量评估完成"
        );

        Ok(EvaluationReport {
            generated_at: Utc::now(),
            results,
            failures,
        })
    }

    /// 对同一位置的多次实时测量逐一估计后求平均
    pub fn estimate_repeated(
        &self,
        k: usize,
        query_id: u32,
        metric: Metric,
        measurements: &[Measurement],
    ) -> Result<AveragedResult> {
        let results = measurements
            .iter()
            .map(|m| self.estimator.estimate(k, query_id, metric, Some(m)))
            .collect::<Result<Vec<_>>>()?;
        average(&results)
    }
}
