/// 指纹定位算法模块
///
/// 该模块提供基于无线指纹的 wkNN 室内定位实现，支持：
/// - 二维几何与房间模型（信标、参考点、验证点）
/// - RSSI / MCPD 两种特征的指纹表
/// - 欧几里得与切比雪夫两种距离度量
/// - 加权 k 近邻估计与多次估计平均

pub mod geometry;
pub mod beacon;
pub mod fingerprint;
pub mod metric;
pub mod wknn;
pub mod results;

pub use geometry::*;
pub use beacon::*;
pub use fingerprint::*;
pub use metric::*;
pub use wknn::*;
pub use results::*;
