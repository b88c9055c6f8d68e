//! 地理标注：判定 GPS 点落在哪些服务区/辖区内。
//!
//! 地理集合在构造时固定，并带一个版本号；每条标注结果都要连同
//! 版本号一起持久化，地理集合或算法变化时据此重新处理历史数据。

mod geojson;
mod polygon;

pub use geojson::{Geography, parse_feature_collection};
pub use polygon::{BoundingBox, Polygon};

use domain::{Annotation, Gps};
use std::path::Path;
use tracing::info;

/// 地理数据加载错误。
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("geography io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("geography decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid geography: {0}")]
    Invalid(String),
}

/// 固定版本的地理标注器。
#[derive(Debug, Clone)]
pub struct GeoAnnotator {
    version: u32,
    geographies: Vec<Geography>,
}

impl GeoAnnotator {
    pub fn new(version: u32, geographies: Vec<Geography>) -> Self {
        Self {
            version,
            geographies,
        }
    }

    /// 空地理集合：所有点都在界外。
    pub fn empty(version: u32) -> Self {
        Self::new(version, Vec::new())
    }

    pub fn from_geojson(version: u32, input: &str) -> Result<Self, GeoError> {
        Ok(Self::new(version, parse_feature_collection(input)?))
    }

    /// 启动时从文件加载（同步读取，只在接线阶段调用）。
    pub fn load(version: u32, path: impl AsRef<Path>) -> Result<Self, GeoError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        let annotator = Self::from_geojson(version, &input)?;
        info!(
            target: "mds.geo",
            path = %path.display(),
            version,
            geographies = annotator.geographies.len(),
            "geographies_loaded"
        );
        Ok(annotator)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn geographies(&self) -> &[Geography] {
        &self.geographies
    }

    pub fn annotate(&self, gps: &Gps) -> Annotation {
        if !gps.lat.is_finite() || !gps.lng.is_finite() {
            return Annotation::out_of_bound();
        }
        let areas: Vec<_> = self
            .geographies
            .iter()
            .filter(|geography| geography.contains(gps.lng, gps.lat))
            .map(Geography::to_ref)
            .collect();
        Annotation {
            in_bound: !areas.is_empty(),
            areas,
        }
    }
}
