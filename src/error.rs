/// 错误类型定义
///
/// 定位核心中的错误都是本地、同步且不可重试的，由调用方决定跳过、记录还是中止。

use thiserror::Error;

use crate::algorithms::Metric;

#[derive(Error, Debug)]
pub enum NavError {
    #[error("位置 {position} 既不在参考点目录中，也不在验证点目录中")]
    PositionNotFound { position: u32 },

    #[error("指纹不完整: {} 缺少信标 {beacon_index}", describe_position(.position))]
    IncompleteFingerprint {
        /// None 表示实时测量
        position: Option<u32>,
        beacon_index: u32,
    },

    #[error("指纹包含非有限值: {} 信标 {beacon_index}", describe_position(.position))]
    NonFiniteFeature {
        /// None 表示实时测量
        position: Option<u32>,
        beacon_index: u32,
    },

    #[error("指纹表中没有位置 {position} 的任何行")]
    MissingFingerprint { position: u32 },

    #[error("重复的指纹行: 位置 {position}, 信标 {beacon_index}")]
    DuplicateFingerprint { position: u32, beacon_index: u32 },

    #[error("参考指纹表中没有任何位置")]
    EmptyReference,

    #[error("无法对空的结果序列求平均")]
    EmptyResults,

    #[error("k 必须 >= 1，实际为 {k}")]
    InvalidK { k: usize },

    #[error(
        "结果不一致: 期望 (点 {expected_query}, k={expected_k}, {expected_metric})，\
         实际 (点 {found_query}, k={found_k}, {found_metric})"
    )]
    MixedResults {
        expected_query: u32,
        expected_k: usize,
        expected_metric: Metric,
        found_query: u32,
        found_k: usize,
        found_metric: Metric,
    },

    #[error("房间配置无效: {0}")]
    InvalidRoom(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV 错误: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("正则表达式错误: {0}")]
    Regex(#[from] regex::Error),

    #[error("后台任务失败: {0}")]
    Task(#[from] tokio::task::JoinError),
}

fn describe_position(position: &Option<u32>) -> String {
    match position {
        Some(p) => format!("参考位置 {}", p),
        None => "实时测量".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
