//! 平面多边形与点包含判定（射线法，奇偶规则）。
//!
//! 坐标统一为 `[lng, lat]`，与 GeoJSON 顺序一致。

/// 外接矩形，用于在逐边判定前快速排除。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    fn of(ring: &[[f64; 2]]) -> Self {
        let mut bbox = BoundingBox {
            min_lng: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lng: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for [lng, lat] in ring {
            bbox.min_lng = bbox.min_lng.min(*lng);
            bbox.min_lat = bbox.min_lat.min(*lat);
            bbox.max_lng = bbox.max_lng.max(*lng);
            bbox.max_lat = bbox.max_lat.max(*lat);
        }
        bbox
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lng >= self.min_lng && lng <= self.max_lng && lat >= self.min_lat && lat <= self.max_lat
    }
}

/// 带洞多边形：一个外环 + 若干内环。
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Vec<[f64; 2]>,
    holes: Vec<Vec<[f64; 2]>>,
    bbox: BoundingBox,
}

impl Polygon {
    /// 外环少于 3 个顶点时返回 `None`。首尾闭合点可有可无。
    pub fn new(exterior: Vec<[f64; 2]>, holes: Vec<Vec<[f64; 2]>>) -> Option<Self> {
        let exterior = open_ring(exterior);
        if exterior.len() < 3 {
            return None;
        }
        let holes = holes
            .into_iter()
            .map(open_ring)
            .filter(|ring| ring.len() >= 3)
            .collect();
        let bbox = BoundingBox::of(&exterior);
        Some(Self {
            exterior,
            holes,
            bbox,
        })
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        if !self.bbox.contains(lng, lat) {
            return false;
        }
        if !ring_contains(&self.exterior, lng, lat) {
            return false;
        }
        !self.holes.iter().any(|hole| ring_contains(hole, lng, lat))
    }
}

fn open_ring(mut ring: Vec<[f64; 2]>) -> Vec<[f64; 2]> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

fn ring_contains(ring: &[[f64; 2]], lng: f64, lat: f64) -> bool {
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > lat) != (yj > lat) && lng < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}
