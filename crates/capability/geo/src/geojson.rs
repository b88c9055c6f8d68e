//! GeoJSON `FeatureCollection` 加载。
//!
//! 只识别 `Polygon` / `MultiPolygon` 几何；要素属性使用
//! `id`、`name`、`kind`（`service_area` | `district` | `other`，缺省 `service_area`）。

use crate::GeoError;
use crate::polygon::Polygon;
use domain::{GeographyKind, GeographyRef};
use serde::Deserialize;
use tracing::warn;

/// 一个命名地理区域（可由多个多边形组成）。
#[derive(Debug, Clone, PartialEq)]
pub struct Geography {
    pub id: String,
    pub name: String,
    pub kind: GeographyKind,
    pub polygons: Vec<Polygon>,
}

impl Geography {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: GeographyKind,
        polygons: Vec<Polygon>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            polygons,
        }
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        self.polygons.iter().any(|polygon| polygon.contains(lng, lat))
    }

    pub fn to_ref(&self) -> GeographyRef {
        GeographyRef {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    properties: FeatureProperties,
    geometry: Option<Geometry>,
}

#[derive(Debug, Default, Deserialize)]
struct FeatureProperties {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: serde_json::Value,
}

type Ring = Vec<[f64; 2]>;

/// 解析 FeatureCollection 文本。
pub fn parse_feature_collection(input: &str) -> Result<Vec<Geography>, GeoError> {
    let collection: FeatureCollection = serde_json::from_str(input)?;
    if collection.kind != "FeatureCollection" {
        return Err(GeoError::Invalid(format!(
            "expected FeatureCollection, got {}",
            collection.kind
        )));
    }

    let mut geographies = Vec::with_capacity(collection.features.len());
    for (index, feature) in collection.features.into_iter().enumerate() {
        let id = feature
            .properties
            .id
            .or_else(|| feature.id.as_ref().map(value_to_id))
            .ok_or_else(|| GeoError::Invalid(format!("feature {} has no id", index)))?;
        let name = feature.properties.name.unwrap_or_else(|| id.clone());
        let kind = parse_kind(feature.properties.kind.as_deref());
        let polygons: Vec<Polygon> = match feature.geometry {
            Some(geometry) if geometry.kind == "Polygon" => {
                let rings: Vec<Ring> = serde_json::from_value(geometry.coordinates)?;
                polygon_from_rings(rings).into_iter().collect()
            }
            Some(geometry) if geometry.kind == "MultiPolygon" => {
                let parts: Vec<Vec<Ring>> = serde_json::from_value(geometry.coordinates)?;
                parts.into_iter().filter_map(polygon_from_rings).collect()
            }
            _ => {
                warn!(target: "mds.geo", geography_id = %id, "geometry_unsupported");
                continue;
            }
        };
        if polygons.is_empty() {
            warn!(target: "mds.geo", geography_id = %id, "geometry_empty");
            continue;
        }
        geographies.push(Geography::new(id, name, kind, polygons));
    }
    Ok(geographies)
}

fn parse_kind(value: Option<&str>) -> GeographyKind {
    match value {
        None | Some("service_area") => GeographyKind::ServiceArea,
        Some("district") => GeographyKind::District,
        Some(_) => GeographyKind::Other,
    }
}

fn polygon_from_rings(mut rings: Vec<Ring>) -> Option<Polygon> {
    if rings.is_empty() {
        return None;
    }
    let exterior = rings.remove(0);
    Polygon::new(exterior, rings)
}

fn value_to_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
