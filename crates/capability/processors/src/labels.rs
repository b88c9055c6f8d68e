use domain::Annotation;
use std::fmt;

/// 上报延迟（`recorded - timestamp`）分档。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyBucket {
    UnderOneSecond,
    OneToFiveSeconds,
    FiveToThirtySeconds,
    ThirtySecondsToFiveMinutes,
    OverFiveMinutes,
}

impl LatencyBucket {
    pub fn from_millis(latency_ms: i64) -> Self {
        match latency_ms {
            ms if ms < 1_000 => LatencyBucket::UnderOneSecond,
            ms if ms < 5_000 => LatencyBucket::OneToFiveSeconds,
            ms if ms < 30_000 => LatencyBucket::FiveToThirtySeconds,
            ms if ms < 300_000 => LatencyBucket::ThirtySecondsToFiveMinutes,
            _ => LatencyBucket::OverFiveMinutes,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LatencyBucket::UnderOneSecond => "lt_1s",
            LatencyBucket::OneToFiveSeconds => "1s_5s",
            LatencyBucket::FiveToThirtySeconds => "5s_30s",
            LatencyBucket::ThirtySecondsToFiveMinutes => "30s_5m",
            LatencyBucket::OverFiveMinutes => "gt_5m",
        }
    }
}

impl fmt::Display for LatencyBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 地理标签：第一个命中区域的名称；界外或未标注为 `out_of_bound`。
pub fn geography_label(annotation: Option<&Annotation>) -> String {
    annotation
        .and_then(|annotation| annotation.areas.first())
        .map(|area| area.name.clone())
        .unwrap_or_else(|| "out_of_bound".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_bucket_boundaries() {
        assert_eq!(LatencyBucket::from_millis(-5).as_str(), "lt_1s");
        assert_eq!(LatencyBucket::from_millis(999).as_str(), "lt_1s");
        assert_eq!(LatencyBucket::from_millis(1_000).as_str(), "1s_5s");
        assert_eq!(LatencyBucket::from_millis(29_999).as_str(), "5s_30s");
        assert_eq!(LatencyBucket::from_millis(30_000).as_str(), "30s_5m");
        assert_eq!(LatencyBucket::from_millis(300_000).as_str(), "gt_5m");
    }

    #[test]
    fn geography_label_falls_back_to_out_of_bound() {
        assert_eq!(geography_label(None), "out_of_bound");
        assert_eq!(geography_label(Some(&Annotation::out_of_bound())), "out_of_bound");
    }
}
