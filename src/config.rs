/// 评估配置
///
/// 启动时构建一次，显式传给数据加载与评估流程。

use crate::algorithms::{Metric, Room};
use crate::error::{NavError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 平均值表文件名
pub const AVERAGE_TABLE_FILE: &str = "results_avg.csv";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// 房间模型
    pub room: Room,
    /// 原始采集数据目录（每个位置一个 `<位置>.csv`）
    pub raw_data_path: PathBuf,
    /// 训练集目录
    pub train_set_path: PathBuf,
    /// 测试集目录
    pub test_set_path: PathBuf,
    /// 验证集目录
    pub validation_set_path: PathBuf,
    /// 每个 (训练点, 信标) 放入训练集的样本数
    pub train_size: usize,
    /// 划分训练/测试集的随机种子
    pub split_seed: u64,
    /// 要评估的 k 值
    pub ks: Vec<usize>,
    /// 要评估的距离度量
    pub metrics: Vec<Metric>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            room: Room::laboratory(),
            raw_data_path: PathBuf::from("../raw_data/"),
            train_set_path: PathBuf::from("../data/train_set/"),
            test_set_path: PathBuf::from("../data/test_set/"),
            validation_set_path: PathBuf::from("../data/validation_set/"),
            train_size: 100,
            split_seed: 0,
            ks: vec![3, 5],
            metrics: Metric::ALL.to_vec(),
        }
    }
}

impl EvaluationConfig {
    /// 从 JSON 文件加载并校验
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: EvaluationConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// 保存为格式化 JSON
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), text)?;
        Ok(())
    }

    /// 校验配置的合理性
    pub fn validate(&self) -> Result<()> {
        self.room.validate()?;
        if let Some(&k) = self.ks.iter().find(|&&k| k == 0) {
            return Err(NavError::InvalidK { k });
        }
        if self.train_size == 0 {
            return Err(NavError::InvalidRoom("train_size 必须大于 0".to_string()));
        }
        Ok(())
    }

    pub fn reference_table_path(&self) -> PathBuf {
        self.train_set_path.join(AVERAGE_TABLE_FILE)
    }

    pub fn test_table_path(&self) -> PathBuf {
        self.test_set_path.join(AVERAGE_TABLE_FILE)
    }

    pub fn validation_table_path(&self) -> PathBuf {
        self.validation_set_path.join(AVERAGE_TABLE_FILE)
    }

    /// 某个位置的原始采集文件
    pub fn raw_capture_path(&self, position: u32) -> PathBuf {
        self.raw_data_path.join(format!("{}.csv", position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EvaluationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ks, vec![3, 5]);
        assert_eq!(
            config.reference_table_path(),
            PathBuf::from("../data/train_set/results_avg.csv")
        );
        assert_eq!(config.raw_capture_path(4), PathBuf::from("../raw_data/4.csv"));
    }

    #[test]
    fn test_json_round_trip_with_partial_fields() {
        let config: EvaluationConfig =
            serde_json::from_str(r#"{ "ks": [1, 2], "metrics": ["chebyshev"] }"#).unwrap();
        assert_eq!(config.ks, vec![1, 2]);
        assert_eq!(config.metrics, vec![Metric::Chebyshev]);
        assert_eq!(config.room, Room::laboratory());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        config.to_json_file(&path).unwrap();
        assert_eq!(EvaluationConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn test_zero_k_rejected() {
        let config = EvaluationConfig {
            ks: vec![3, 0],
            ..EvaluationConfig::default()
        };
        assert!(matches!(config.validate(), Err(NavError::InvalidK { k: 0 })));
    }
}
