/// 定位结果数据结构
///
/// 包含单次 wkNN 估计的输出，以及对同一位置多次估计的平均

use crate::algorithms::{Metric, NeighborSet, Point};
use crate::error::{NavError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 结果键：(k, 度量, 查询位置)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    pub k: usize,
    pub metric: Metric,
    pub query_id: u32,
}

impl ResultKey {
    pub fn new(k: usize, metric: Metric, query_id: u32) -> Self {
        ResultKey { k, metric, query_id }
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "点 {} (k={}, {})", self.query_id, self.k, self.metric)
    }
}

/// 单个查询位置的估计结果
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    /// 查询位置编号
    pub query_id: u32,
    /// 使用的距离度量
    pub metric: Metric,
    /// 近邻数
    pub k: usize,
    /// 真实位置
    pub ground_truth: Point,
    /// RSSI 估计位置
    pub signal_estimate: Point,
    /// RSSI 估计误差（米）
    pub signal_error: f64,
    /// MCPD 估计位置
    pub phase_estimate: Point,
    /// MCPD 估计误差（米）
    pub phase_error: f64,
    /// RSSI 近邻，平均后为 None
    pub signal_neighbors: Option<NeighborSet>,
    /// MCPD 近邻，平均后为 None
    pub phase_neighbors: Option<NeighborSet>,
    /// 参与平均的估计次数（直接估计为 1）
    pub samples: usize,
}

/// 平均结果与单次结果形状相同，只是近邻集为空
pub type AveragedResult = EstimationResult;

impl EstimationResult {
    /// 直接由一次估计构建，误差为估计位置到真实位置的欧几里得距离
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        query_id: u32,
        metric: Metric,
        k: usize,
        ground_truth: Point,
        signal_estimate: Point,
        phase_estimate: Point,
        signal_neighbors: NeighborSet,
        phase_neighbors: NeighborSet,
    ) -> Self {
        EstimationResult {
            query_id,
            metric,
            k,
            ground_truth,
            signal_estimate,
            signal_error: ground_truth.euclidean_distance(&signal_estimate),
            phase_estimate,
            phase_error: ground_truth.euclidean_distance(&phase_estimate),
            signal_neighbors: Some(signal_neighbors),
            phase_neighbors: Some(phase_neighbors),
            samples: 1,
        }
    }

    /// 由多次估计求平均构建
    pub fn averaged(results: &[EstimationResult]) -> Result<AveragedResult> {
        average(results)
    }

    pub fn key(&self) -> ResultKey {
        ResultKey::new(self.k, self.metric, self.query_id)
    }

    /// 是否是平均结果
    pub fn is_averaged(&self) -> bool {
        self.signal_neighbors.is_none() && self.phase_neighbors.is_none()
    }
}

impl fmt::Display for EstimationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "点 {} 的结果，使用 {}", self.query_id, self.metric)?;
        writeln!(f, "  k: {}", self.k)?;
        writeln!(f, "  真实位置: {}", self.ground_truth)?;
        if let Some(neighbors) = &self.signal_neighbors {
            writeln!(f, "  RSSI 近邻: {:?}", neighbors.position_ids())?;
        }
        writeln!(f, "  RSSI 估计: {}", self.signal_estimate)?;
        writeln!(f, "  RSSI 误差: {:.3}", self.signal_error)?;
        if let Some(neighbors) = &self.phase_neighbors {
            writeln!(f, "  MCPD 近邻: {:?}", neighbors.position_ids())?;
        }
        writeln!(f, "  MCPD 估计: {}", self.phase_estimate)?;
        write!(f, "  MCPD 误差: {:.3}", self.phase_error)?;
        if self.samples > 1 {
            write!(f, " (平均 {} 次)", self.samples)?;
        }
        Ok(())
    }
}

/// 对同一 (位置, k, 度量) 的多次估计求算术平均
///
/// 估计位置和误差逐分量求平均；位置编号、度量、k 和真实位置取自第一个元素。
/// 结果必须同质，否则报错。
pub fn average(results: &[EstimationResult]) -> Result<AveragedResult> {
    let first = results.first().ok_or(NavError::EmptyResults)?;

    if let Some(other) = results.iter().find(|r| r.key() != first.key()) {
        return Err(NavError::MixedResults {
            expected_query: first.query_id,
            expected_k: first.k,
            expected_metric: first.metric,
            found_query: other.query_id,
            found_k: other.k,
            found_metric: other.metric,
        });
    }

    let count = results.len() as f64;
    let mean_point = |select: fn(&EstimationResult) -> Point| {
        let sum = results
            .iter()
            .fold(Point::ORIGIN, |acc, r| acc + select(r));
        Point::new(sum.x / count, sum.y / count)
    };

    Ok(EstimationResult {
        query_id: first.query_id,
        metric: first.metric,
        k: first.k,
        ground_truth: first.ground_truth,
        signal_estimate: mean_point(|r| r.signal_estimate),
        signal_error: results.iter().map(|r| r.signal_error).sum::<f64>() / count,
        phase_estimate: mean_point(|r| r.phase_estimate),
        phase_error: results.iter().map(|r| r.phase_error).sum::<f64>() / count,
        signal_neighbors: None,
        phase_neighbors: None,
        samples: results.iter().map(|r| r.samples).sum(),
    })
}
