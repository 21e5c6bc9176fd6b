/// 加权 k 近邻（wkNN）定位
///
/// 支持：
/// - 按距离选择 k 个最近的参考位置（稳定排序，并列时保持参考表中的顺序）
/// - 反距离加权平均估计位置
/// - RSSI 与 MCPD 两个通道的端到端估计

use crate::algorithms::{
    compute_distances, Datasets, EstimationResult, Measurement, Metric, Point, PositionRole,
    Room,
};
use crate::error::{NavError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ============================================================================
// 近邻选择
// ============================================================================

/// 被选中的单个近邻
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// 参考位置编号
    pub position_id: u32,
    /// 指纹距离
    pub distance: f64,
    /// 在输入距离表中的原始顺序，用于并列时的次序
    pub order: usize,
}

/// k 个最近邻，按距离升序排列
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NeighborSet {
    /// 请求的 k
    pub k: usize,
    /// 长度为 min(k, 参考位置数)
    pub entries: Vec<Neighbor>,
}

impl NeighborSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 近邻位置编号（按距离升序）
    pub fn position_ids(&self) -> Vec<u32> {
        self.entries.iter().map(|n| n.position_id).collect()
    }

    /// 近邻距离（升序）
    pub fn distances(&self) -> Vec<f64> {
        self.entries.iter().map(|n| n.distance).collect()
    }
}

/// 选择距离最小的 k 个位置
///
/// 按距离稳定排序，距离相同时保持输入顺序。可用位置少于 k 时全部返回。
pub fn select_neighbors(distances: &[(u32, f64)], k: usize) -> Result<NeighborSet> {
    if k == 0 {
        return Err(NavError::InvalidK { k });
    }

    let mut entries: Vec<Neighbor> = distances
        .iter()
        .enumerate()
        .map(|(order, &(position_id, distance))| Neighbor {
            position_id,
            distance,
            order,
        })
        .collect();

    entries.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.order.cmp(&b.order))
    });
    entries.truncate(k);

    Ok(NeighborSet { k, entries })
}

// ============================================================================
// 加权估计
// ============================================================================

/// 反距离加权平均
///
/// estimate = (Σ p_i / d_i) / (Σ 1 / d_i)
///
/// 若有近邻距离恰好为 0（指纹完全相同），估计值取这些零距离参考位置的平均值，
/// 其余近邻不参与加权。
pub fn weighted_estimate(
    neighbors: &NeighborSet,
    reference_positions: &BTreeMap<u32, Point>,
) -> Result<Point> {
    if neighbors.is_empty() {
        return Err(NavError::EmptyReference);
    }

    let points = neighbors
        .entries
        .iter()
        .map(|n| {
            reference_positions
                .get(&n.position_id)
                .map(|p| (*p, n.distance))
                .ok_or(NavError::PositionNotFound {
                    position: n.position_id,
                })
        })
        .collect::<Result<Vec<(Point, f64)>>>()?;

    let exact: Vec<Point> = points
        .iter()
        .filter(|(_, d)| *d == 0.0)
        .map(|(p, _)| *p)
        .collect();
    if !exact.is_empty() {
        debug!(matches = exact.len(), "近邻距离为 0，直接取参考位置");
        let sum = exact.iter().fold(Point::ORIGIN, |acc, p| acc + *p);
        return Ok(sum * (1.0 / exact.len() as f64));
    }

    let normalizer = 1.0 / points.iter().map(|(_, d)| 1.0 / d).sum::<f64>();
    let weighted = points
        .iter()
        .fold(Point::ORIGIN, |acc, (p, d)| acc + (1.0 / d) * *p);

    Ok(normalizer * weighted)
}

// ============================================================================
// 端到端估计
// ============================================================================

/// wkNN 估计器
///
/// 持有只读的房间模型和指纹表，每次调用都是无状态的纯计算，可在多个线程间共享。
#[derive(Clone, Debug)]
pub struct WknnEstimator {
    room: Room,
    datasets: Datasets,
}

impl WknnEstimator {
    pub fn new(room: Room, datasets: Datasets) -> Self {
        WknnEstimator { room, datasets }
    }

    pub fn room(&self) -> &Room {
        &self.room
    }

    pub fn datasets(&self) -> &Datasets {
        &self.datasets
    }

    /// 估计查询位置
    ///
    /// 给出 `measurement` 时使用该实时测量，否则使用该位置的平均测量。
    pub fn estimate(
        &self,
        k: usize,
        query_id: u32,
        metric: Metric,
        measurement: Option<&Measurement>,
    ) -> Result<EstimationResult> {
        match measurement {
            Some(m) => self.estimate_measurement(k, query_id, metric, m),
            None => self.estimate_from_average(k, query_id, metric),
        }
    }

    /// 使用平均测量估计查询位置
    pub fn estimate_from_average(
        &self,
        k: usize,
        query_id: u32,
        metric: Metric,
    ) -> Result<EstimationResult> {
        if k == 0 {
            return Err(NavError::InvalidK { k });
        }
        let measurement = self.averaged_measurement(query_id)?;
        self.estimate_measurement(k, query_id, metric, &measurement)
    }

    /// 查询位置的平均测量
    ///
    /// 验证点取自验证集，训练点取自测试集（同一位置上留出的样本）。
    pub fn averaged_measurement(&self, query_id: u32) -> Result<Measurement> {
        let (role, _) = self.room.resolve(query_id)?;
        let table = match role {
            PositionRole::Query => &self.datasets.validation,
            PositionRole::Reference => &self.datasets.test,
        };

        table
            .measurement(query_id)
            .ok_or(NavError::MissingFingerprint { position: query_id })
    }

    fn estimate_measurement(
        &self,
        k: usize,
        query_id: u32,
        metric: Metric,
        measurement: &Measurement,
    ) -> Result<EstimationResult> {
        if k == 0 {
            return Err(NavError::InvalidK { k });
        }
        let (_, ground_truth) = self.room.resolve(query_id)?;

        let distances = compute_distances(&self.room, measurement, &self.datasets.reference, metric)?;
        let catalog = self.room.reference_positions();

        let signal_neighbors = select_neighbors(&distances.signal, k)?;
        let phase_neighbors = select_neighbors(&distances.phase, k)?;
        let signal_estimate = weighted_estimate(&signal_neighbors, catalog)?;
        let phase_estimate = weighted_estimate(&phase_neighbors, catalog)?;

        let result = EstimationResult::new(
            query_id,
            metric,
            k,
            ground_truth,
            signal_estimate,
            phase_estimate,
            signal_neighbors,
            phase_neighbors,
        );

        debug!(
            query_id,
            k,
            %metric,
            signal_error = result.signal_error,
            phase_error = result.phase_error,
            "wkNN 估计完成"
        );

        Ok(result)
    }
}
