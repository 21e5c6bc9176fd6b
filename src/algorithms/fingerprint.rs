/// 指纹数据结构
///
/// 支持：
/// - 单行指纹（位置、信标、RSSI、MCPD）
/// - 单次测量（每个信标一组特征）
/// - 参考/查询指纹表（每个位置、每个信标一行）

use crate::error::{NavError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 指纹表中的一行
///
/// 列名与平均值表 `results_avg.csv` 保持一致。
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(rename = "position")]
    pub position_id: u32,
    #[serde(rename = "id")]
    pub beacon_index: u32,
    #[serde(rename = "rssi")]
    pub signal_strength: f64,
    #[serde(rename = "mcpd_ifft")]
    pub phase_feature: f64,
}

impl Fingerprint {
    pub fn new(position_id: u32, beacon_index: u32, signal_strength: f64, phase_feature: f64) -> Self {
        Fingerprint {
            position_id,
            beacon_index,
            signal_strength,
            phase_feature,
        }
    }

    pub fn features(&self) -> FeaturePair {
        FeaturePair::new(self.signal_strength, self.phase_feature)
    }
}

/// 单个信标上观测到的一组特征
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeaturePair {
    /// 信号强度（RSSI，dBm）
    pub signal_strength: f64,
    /// 相位/飞行时间特征（MCPD）
    pub phase_feature: f64,
}

impl FeaturePair {
    pub fn new(signal_strength: f64, phase_feature: f64) -> Self {
        FeaturePair {
            signal_strength,
            phase_feature,
        }
    }
}

/// 一次完整测量：信标序号 -> 特征
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    features: BTreeMap<u32, FeaturePair>,
}

impl Measurement {
    /// 创建空测量
    pub fn new() -> Self {
        Measurement {
            features: BTreeMap::new(),
        }
    }

    /// 从 (信标序号, RSSI, MCPD) 三元组创建
    pub fn from_triples(triples: &[(u32, f64, f64)]) -> Self {
        let mut measurement = Measurement::new();
        for &(index, rssi, mcpd) in triples {
            measurement.insert(index, FeaturePair::new(rssi, mcpd));
        }
        measurement
    }

    /// 添加或覆盖一个信标的特征
    pub fn insert(&mut self, beacon_index: u32, features: FeaturePair) {
        self.features.insert(beacon_index, features);
    }

    pub fn get(&self, beacon_index: u32) -> Option<FeaturePair> {
        self.features.get(&beacon_index).copied()
    }

    /// 测量中的信标数量
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, FeaturePair)> + '_ {
        self.features.iter().map(|(index, pair)| (*index, *pair))
    }
}

impl FromIterator<(u32, FeaturePair)> for Measurement {
    fn from_iter<I: IntoIterator<Item = (u32, FeaturePair)>>(iter: I) -> Self {
        Measurement {
            features: iter.into_iter().collect(),
        }
    }
}

/// 指纹表
///
/// 每个 (位置, 信标) 至多一行。位置按首次出现的顺序记录，该顺序就是近邻选择时的并列次序。
#[derive(Clone, Debug, Default)]
pub struct FingerprintTable {
    rows: Vec<Fingerprint>,
    positions: Vec<u32>,
    lookup: HashMap<(u32, u32), usize>,
}

impl FingerprintTable {
    /// 创建空表
    pub fn new() -> Self {
        FingerprintTable::default()
    }

    /// 从行集合创建，拒绝重复的 (位置, 信标)
    pub fn from_rows(rows: impl IntoIterator<Item = Fingerprint>) -> Result<Self> {
        let mut table = FingerprintTable::new();
        for row in rows {
            table.push(row)?;
        }
        Ok(table)
    }

    /// 追加一行
    pub fn push(&mut self, row: Fingerprint) -> Result<()> {
        let key = (row.position_id, row.beacon_index);
        if self.lookup.contains_key(&key) {
            return Err(NavError::DuplicateFingerprint {
                position: row.position_id,
                beacon_index: row.beacon_index,
            });
        }
        if !self.positions.contains(&row.position_id) {
            self.positions.push(row.position_id);
        }
        self.lookup.insert(key, self.rows.len());
        self.rows.push(row);
        Ok(())
    }

    /// 按首次出现顺序排列的不同位置
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    pub fn rows(&self) -> &[Fingerprint] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_position(&self, position_id: u32) -> bool {
        self.positions.contains(&position_id)
    }

    /// 获取某个 (位置, 信标) 的特征
    pub fn get(&self, position_id: u32, beacon_index: u32) -> Option<FeaturePair> {
        self.lookup
            .get(&(position_id, beacon_index))
            .map(|&i| self.rows[i].features())
    }

    /// 取出某个位置的全部特征作为一次测量
    pub fn measurement(&self, position_id: u32) -> Option<Measurement> {
        if !self.contains_position(position_id) {
            return None;
        }
        Some(
            self.rows
                .iter()
                .filter(|row| row.position_id == position_id)
                .map(|row| (row.beacon_index, row.features()))
                .collect(),
        )
    }
}

/// 一次评估所用的三张平均值表
#[derive(Clone, Debug, Default)]
pub struct Datasets {
    /// 训练集（参考指纹）
    pub reference: FingerprintTable,
    /// 训练点上留出的测试样本
    pub test: FingerprintTable,
    /// 验证点样本
    pub validation: FingerprintTable,
}

impl Datasets {
    pub fn new(
        reference: FingerprintTable,
        test: FingerprintTable,
        validation: FingerprintTable,
    ) -> Self {
        Datasets {
            reference,
            test,
            validation,
        }
    }
}
