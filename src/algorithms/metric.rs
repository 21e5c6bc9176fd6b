/// 指纹距离度量
///
/// 计算一次测量与参考表中每个位置之间的向量范数距离，RSSI 与 MCPD 两个通道分别计算。

use crate::algorithms::{FeaturePair, FingerprintTable, Measurement, Room};
use crate::error::{NavError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 向量范数
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// 2-范数：sqrt(Σ diff²)
    Euclidean,
    /// ∞-范数：max(|diff|)
    Chebyshev,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Euclidean, Metric::Chebyshev];

    /// 范数阶数（∞ 表示切比雪夫）
    pub fn order(&self) -> f64 {
        match self {
            Metric::Euclidean => 2.0,
            Metric::Chebyshev => f64::INFINITY,
        }
    }

    /// 计算差值向量的范数，任一分量为 NaN 时结果为 NaN
    pub fn norm(&self, diff: &[f64]) -> f64 {
        match self {
            Metric::Euclidean => diff.iter().map(|d| d * d).sum::<f64>().sqrt(),
            Metric::Chebyshev => diff.iter().fold(0.0, |max: f64, d| {
                if d.is_nan() || max.is_nan() {
                    f64::NAN
                } else {
                    d.abs().max(max)
                }
            }),
        }
    }

    /// 报表中使用的名称
    ///
    /// 旧版报表拼作 `EUCLIDIAN-norm` 且先列切比雪夫；这里使用正确拼写，顺序随 `ALL`。
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Euclidean => "EUCLIDEAN-norm",
            Metric::Chebyshev => "CHEBYSHEV-norm",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euclidean" | "euclid" | "l2" | "2" => Ok(Metric::Euclidean),
            "chebyshev" | "max" | "linf" | "inf" => Ok(Metric::Chebyshev),
            other => Err(format!("未知的距离度量: {}", other)),
        }
    }
}

/// 位置编号 -> 距离，保持参考表中位置的首次出现顺序
pub type DistanceMap = Vec<(u32, f64)>;

/// 两个通道的距离
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelDistances {
    /// RSSI 距离
    pub signal: DistanceMap,
    /// MCPD 距离
    pub phase: DistanceMap,
}

fn finite(features: FeaturePair, position: Option<u32>, beacon_index: u32) -> Result<FeaturePair> {
    if features.signal_strength.is_finite() && features.phase_feature.is_finite() {
        Ok(features)
    } else {
        Err(NavError::NonFiniteFeature {
            position,
            beacon_index,
        })
    }
}

/// 计算测量到每个参考位置的距离
///
/// 差值向量按房间中信标的规范顺序组装。测量或任何参考位置缺少某个信标、
/// 或特征不是有限值时报错，不做部分向量回退。
pub fn compute_distances(
    room: &Room,
    measurement: &Measurement,
    reference: &FingerprintTable,
    metric: Metric,
) -> Result<ChannelDistances> {
    if reference.positions().is_empty() {
        return Err(NavError::EmptyReference);
    }

    let live = room
        .beacon_indices()
        .map(|index| {
            let features = measurement.get(index).ok_or(NavError::IncompleteFingerprint {
                position: None,
                beacon_index: index,
            })?;
            finite(features, None, index)
        })
        .collect::<Result<Vec<FeaturePair>>>()?;

    let mut signal = Vec::with_capacity(reference.positions().len());
    let mut phase = Vec::with_capacity(reference.positions().len());
    let mut signal_diff = Vec::with_capacity(live.len());
    let mut phase_diff = Vec::with_capacity(live.len());

    for &position in reference.positions() {
        signal_diff.clear();
        phase_diff.clear();

        for (index, m) in room.beacon_indices().zip(&live) {
            let r = reference
                .get(position, index)
                .ok_or(NavError::IncompleteFingerprint {
                    position: Some(position),
                    beacon_index: index,
                })?;
            let r = finite(r, Some(position), index)?;
            signal_diff.push(m.signal_strength - r.signal_strength);
            phase_diff.push(m.phase_feature - r.phase_feature);
        }

        signal.push((position, metric.norm(&signal_diff)));
        phase.push((position, metric.norm(&phase_diff)));
    }

    Ok(ChannelDistances { signal, phase })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::{Beacon, Fingerprint, Point};
    use std::collections::BTreeMap;

    fn room() -> Room {
        Room::new(
            vec![
                Beacon::new("AA:BB:CC:DD:EE:01", 1, Point::new(0.0, 0.0)),
                Beacon::new("AA:BB:CC:DD:EE:02", 2, Point::new(1.0, 0.0)),
            ],
            Point::new(2.0, 2.0),
            BTreeMap::from([(1, Point::new(0.0, 0.0)), (2, Point::new(2.0, 0.0))]),
            BTreeMap::new(),
        )
        .unwrap()
    }

    fn reference() -> FingerprintTable {
        FingerprintTable::from_rows(vec![
            Fingerprint::new(1, 1, 0.0, 0.0),
            Fingerprint::new(1, 2, 0.0, 0.0),
            Fingerprint::new(2, 1, 3.0, 1.0),
            Fingerprint::new(2, 2, 4.0, -2.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_norms() {
        assert_eq!(Metric::Euclidean.norm(&[3.0, 4.0]), 5.0);
        assert_eq!(Metric::Chebyshev.norm(&[3.0, -4.0]), 4.0);
        assert_eq!(Metric::Chebyshev.norm(&[]), 0.0);
        assert_eq!(Metric::Chebyshev.order(), f64::INFINITY);
    }

    #[test]
    fn test_chebyshev_not_greater_than_euclidean() {
        let vectors: [&[f64]; 4] = [&[1.0, 1.0], &[-3.0, 0.5, 2.0], &[0.0, 7.0], &[1e-3, -1e3]];
        for v in vectors {
            assert!(Metric::Chebyshev.norm(v) <= Metric::Euclidean.norm(v));
        }
        assert_eq!(Metric::Chebyshev.norm(&[0.0, 7.0]), Metric::Euclidean.norm(&[0.0, 7.0]));
        assert!(Metric::Chebyshev.norm(&[1.0, 1.0]) < Metric::Euclidean.norm(&[1.0, 1.0]));
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("Euclidean".parse::<Metric>(), Ok(Metric::Euclidean));
        assert_eq!("chebyshev".parse::<Metric>(), Ok(Metric::Chebyshev));
        assert!("manhattan".parse::<Metric>().is_err());
    }

    #[test]
    fn test_compute_distances() {
        let measurement = Measurement::from_triples(&[(1, 0.0, 0.0), (2, 0.0, 0.0)]);
        let distances =
            compute_distances(&room(), &measurement, &reference(), Metric::Euclidean).unwrap();
        assert_eq!(distances.signal, vec![(1, 0.0), (2, 5.0)]);
        assert_eq!(distances.phase, vec![(1, 0.0), (2, 5.0_f64.sqrt())]);

        let distances =
            compute_distances(&room(), &measurement, &reference(), Metric::Chebyshev).unwrap();
        assert_eq!(distances.signal, vec![(1, 0.0), (2, 4.0)]);
        assert_eq!(distances.phase, vec![(1, 0.0), (2, 2.0)]);
    }

    #[test]
    fn test_self_distance_is_zero() {
        let table = reference();
        let measurement = table.measurement(2).unwrap();
        for metric in Metric::ALL {
            let distances = compute_distances(&room(), &measurement, &table, metric).unwrap();
            assert_eq!(distances.signal[1], (2, 0.0));
            assert_eq!(distances.phase[1], (2, 0.0));
        }
    }

    #[test]
    fn test_missing_beacon_in_measurement() {
        let measurement = Measurement::from_triples(&[(1, 0.0, 0.0)]);
        let result = compute_distances(&room(), &measurement, &reference(), Metric::Euclidean);
        assert!(matches!(
            result,
            Err(NavError::IncompleteFingerprint { position: None, beacon_index: 2 })
        ));
    }

    #[test]
    fn test_missing_beacon_in_reference() {
        let table = FingerprintTable::from_rows(vec![
            Fingerprint::new(1, 1, 0.0, 0.0),
            Fingerprint::new(1, 2, 0.0, 0.0),
            Fingerprint::new(2, 1, 3.0, 1.0),
        ])
        .unwrap();
        let measurement = Measurement::from_triples(&[(1, 0.0, 0.0), (2, 0.0, 0.0)]);
        let result = compute_distances(&room(), &measurement, &table, Metric::Chebyshev);
        assert!(matches!(
            result,
            Err(NavError::IncompleteFingerprint { position: Some(2), beacon_index: 2 })
        ));
    }

    #[test]
    fn test_nan_component_propagates() {
        for metric in Metric::ALL {
            assert!(metric.norm(&[f64::NAN, 1.0]).is_nan());
            assert!(metric.norm(&[1.0, f64::NAN]).is_nan());
        }
    }

    #[test]
    fn test_non_finite_features_rejected() {
        let measurement = Measurement::from_triples(&[(1, 0.0, f64::NAN), (2, 0.0, 0.0)]);
        for metric in Metric::ALL {
            let result = compute_distances(&room(), &measurement, &reference(), metric);
            assert!(matches!(
                result,
                Err(NavError::NonFiniteFeature { position: None, beacon_index: 1 })
            ));
        }

        let table = FingerprintTable::from_rows(vec![
            Fingerprint::new(1, 1, 0.0, 0.0),
            Fingerprint::new(1, 2, 0.0, 0.0),
            Fingerprint::new(2, 1, 3.0, 1.0),
            Fingerprint::new(2, 2, f64::INFINITY, -2.0),
        ])
        .unwrap();
        let measurement = Measurement::from_triples(&[(1, 0.0, 0.0), (2, 0.0, 0.0)]);
        for metric in Metric::ALL {
            let result = compute_distances(&room(), &measurement, &table, metric);
            assert!(matches!(
                result,
                Err(NavError::NonFiniteFeature { position: Some(2), beacon_index: 2 })
            ));
        }
    }

    #[test]
    fn test_report_labels() {
        assert_eq!(Metric::Euclidean.label(), "EUCLIDEAN-norm");
        assert_eq!(Metric::Chebyshev.to_string(), "CHEBYSHEV-norm");
    }

    #[test]
    fn test_empty_reference() {
        let measurement = Measurement::from_triples(&[(1, 0.0, 0.0), (2, 0.0, 0.0)]);
        let result =
            compute_distances(&room(), &measurement, &FingerprintTable::new(), Metric::Euclidean);
        assert!(matches!(result, Err(NavError::EmptyReference)));
    }
}
