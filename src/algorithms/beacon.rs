/// 蓝牙信标与房间模型定义

use crate::algorithms::Point;
use crate::error::{NavError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// 信标硬件地址格式（MAC）
const HARDWARE_ID_PATTERN: &str = r"^([0-9A-Fa-f]{2}:){5}[0-9A-Fa-f]{2}$";

/// 单个蓝牙信标定义
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Beacon {
    /// 信标硬件地址
    pub id: String,
    /// 信标序号，同时作为指纹维度的键
    pub index: u32,
    /// 信标在房间中的位置
    pub position: Point,
}

impl Beacon {
    /// 创建新的信标
    pub fn new(id: impl Into<String>, index: u32, position: Point) -> Self {
        Beacon {
            id: id.into(),
            index,
            position,
        }
    }
}

/// 位置编号在房间目录中的角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionRole {
    /// 训练（参考）点
    Reference,
    /// 验证（查询）点
    Query,
}

/// 房间模型
///
/// 描述信标、房间尺寸以及命名的参考点/验证点。进程启动时创建一次，之后只读。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Room {
    beacons: Vec<Beacon>,
    extent: Point,
    reference_positions: BTreeMap<u32, Point>,
    query_positions: BTreeMap<u32, Point>,
}

impl Room {
    /// 创建并校验房间
    pub fn new(
        beacons: Vec<Beacon>,
        extent: Point,
        reference_positions: BTreeMap<u32, Point>,
        query_positions: BTreeMap<u32, Point>,
    ) -> Result<Self> {
        let room = Room {
            beacons,
            extent,
            reference_positions,
            query_positions,
        };
        room.validate()?;
        Ok(room)
    }

    /// 实验室布置：7.3 m x 8.85 m，六个信标，九个训练点，五个验证点
    pub fn laboratory() -> Self {
        let width = 7.3;
        let depth = 8.85;

        // 5 号和 6 号信标在墙上的位置是互换的
        let beacons = vec![
            Beacon::new("EE:6F:EE:A7:34:31", 1, Point::new(0.0, 0.0)),
            Beacon::new("DE:64:59:3D:8E:63", 2, Point::new(0.0, depth / 2.0)),
            Beacon::new("F1:63:F2:BE:56:44", 3, Point::new(0.0, depth)),
            Beacon::new("DB:6D:40:6D:A1:0F", 4, Point::new(width, depth)),
            Beacon::new("FC:40:5D:54:A7:DD", 6, Point::new(width, depth / 2.0)),
            Beacon::new("FF:B4:7D:AB:1B:A2", 5, Point::new(width, 0.0)),
        ];

        let columns = [1.0, 3.65, width - 1.0];
        let rows = [1.5, depth / 2.0, depth - 1.5];
        let mut reference_positions = BTreeMap::new();
        for (r, y) in rows.iter().enumerate() {
            for (c, x) in columns.iter().enumerate() {
                reference_positions.insert((r * 3 + c + 1) as u32, Point::new(*x, *y));
            }
        }

        let query_positions = BTreeMap::from([
            (11, Point::new(width - 2.3, depth - 1.9)),
            (12, Point::new(2.05, 2.7)),
            (13, Point::new(width - 2.07, 2.9)),
            (14, Point::new(1.8, depth - 2.5)),
            (15, Point::new(width - 3.7, depth - 2.6)),
        ]);

        Room {
            beacons,
            extent: Point::new(width, depth),
            reference_positions,
            query_positions,
        }
    }

    /// 校验不变量：信标序号唯一、硬件地址合法、两个目录互不相交
    pub fn validate(&self) -> Result<()> {
        if self.beacons.is_empty() {
            return Err(NavError::InvalidRoom("房间中没有信标".to_string()));
        }

        let pattern = Regex::new(HARDWARE_ID_PATTERN)?;
        let mut seen = HashSet::new();
        for beacon in &self.beacons {
            if !seen.insert(beacon.index) {
                return Err(NavError::InvalidRoom(format!(
                    "信标序号 {} 重复",
                    beacon.index
                )));
            }
            if !pattern.is_match(&beacon.id) {
                return Err(NavError::InvalidRoom(format!(
                    "信标 {} 的硬件地址 '{}' 格式无效",
                    beacon.index, beacon.id
                )));
            }
        }

        if let Some(id) = self
            .reference_positions
            .keys()
            .find(|id| self.query_positions.contains_key(*id))
        {
            return Err(NavError::InvalidRoom(format!(
                "位置 {} 同时出现在参考点和验证点目录中",
                id
            )));
        }

        Ok(())
    }

    /// 按规范顺序排列的信标
    pub fn beacons(&self) -> &[Beacon] {
        &self.beacons
    }

    /// 信标序号（规范顺序）
    pub fn beacon_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.beacons.iter().map(|b| b.index)
    }

    pub fn extent(&self) -> Point {
        self.extent
    }

    pub fn reference_positions(&self) -> &BTreeMap<u32, Point> {
        &self.reference_positions
    }

    pub fn query_positions(&self) -> &BTreeMap<u32, Point> {
        &self.query_positions
    }

    /// 参考点坐标
    pub fn reference_position(&self, id: u32) -> Option<Point> {
        self.reference_positions.get(&id).copied()
    }

    /// 解析位置编号，返回其角色与真实坐标
    ///
    /// 先查验证点目录，再查参考点目录。
    pub fn resolve(&self, id: u32) -> Result<(PositionRole, Point)> {
        if let Some(point) = self.query_positions.get(&id) {
            return Ok((PositionRole::Query, *point));
        }
        if let Some(point) = self.reference_positions.get(&id) {
            return Ok((PositionRole::Reference, *point));
        }
        Err(NavError::PositionNotFound { position: id })
    }

    /// 所有可评估的位置编号（参考点在前，验证点在后）
    pub fn all_position_ids(&self) -> Vec<u32> {
        self.reference_positions
            .keys()
            .chain(self.query_positions.keys())
            .copied()
            .collect()
    }
}

impl Default for Room {
    fn default() -> Self {
        Self::laboratory()
    }
}
