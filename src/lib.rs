/// 基于 RSSI / MCPD 指纹的 wkNN 室内定位评估
///
/// - `algorithms`：几何、房间模型、指纹、距离度量、wkNN 估计与结果平均
/// - `dataset`：平均值表读取、原始采集解析、训练/测试/验证集划分
/// - `evaluation`：批量评估与误差报表
/// - `config`：评估配置

pub mod algorithms;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;

pub use error::{NavError, Result};
