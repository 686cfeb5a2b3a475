use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::accumulator::RouteAccumulator;
use crate::error::Result;
use crate::quality::Issue;
use crate::types::{PathPoint, TrackedPoint, UNKNOWN};

/// Everything the persistence/upload side reads at trip end.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripSnapshot {
    pub accepted_path: Vec<PathPoint>,
    pub total_distance: f64,
    pub raw_history: Vec<TrackedPoint>,
    pub stats: TripStats,
}

impl TripSnapshot {
    pub fn capture(accumulator: &RouteAccumulator) -> Self {
        TripSnapshot {
            accepted_path: accumulator.accepted_path().to_vec(),
            total_distance: accumulator.total_distance(),
            raw_history: accumulator.raw_history().to_vec(),
            stats: TripStats::compute(
                accumulator.accepted_path(),
                accumulator.raw_history(),
                accumulator.total_distance(),
            ),
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Trip statistics for display and logging
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripStats {
    pub raw_count: usize,
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub total_distance_m: f64,
    pub duration_seconds: f64,
    pub peak_speed_kmh: f64,
    /// How often each rule fired across the raw history
    pub issue_counts: BTreeMap<Issue, u32>,
}

impl TripStats {
    pub fn compute(path: &[PathPoint], raw: &[TrackedPoint], total_distance_m: f64) -> Self {
        let mut issue_counts = BTreeMap::new();
        for issue in raw.iter().flat_map(|p| p.issues.iter()) {
            *issue_counts.entry(*issue).or_insert(0) += 1;
        }

        let duration_seconds = match (path.first(), path.last()) {
            (Some(first), Some(last)) => {
                (last.timestamp_ms() - first.timestamp_ms()).max(0) as f64 / 1000.0
            }
            _ => 0.0,
        };

        TripStats {
            raw_count: raw.len(),
            accepted_count: path.len(),
            rejected_count: raw.len().saturating_sub(path.len()),
            total_distance_m,
            duration_seconds,
            peak_speed_kmh: path.iter().map(|p| p.speed_kmh()).fold(0.0, f64::max),
            issue_counts,
        }
    }
}

/// GPX track format for mapping applications
#[derive(Debug, Serialize)]
pub struct GpxTrack {
    pub name: String,
    pub track_points: Vec<GpxPoint>,
}

#[derive(Debug, Serialize)]
pub struct GpxPoint {
    pub lat: f64,
    pub lon: f64,
    /// Elevation, when the fix reported one
    pub ele: Option<f64>,
    pub time: String,
}

impl GpxTrack {
    /// Build a track from the accepted path.
    pub fn from_path(name: &str, path: &[PathPoint]) -> Self {
        let track_points = path
            .iter()
            .map(|p| GpxPoint {
                lat: p.lat(),
                lon: p.lng(),
                ele: (p.altitude() != UNKNOWN).then_some(p.altitude()),
                time: format_timestamp(p.timestamp_ms()),
            })
            .collect();

        GpxTrack {
            name: name.to_string(),
            track_points,
        }
    }

    /// Generate GPX document XML string
    pub fn to_gpx_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str("<gpx version=\"1.1\" creator=\"route_tracker_rs\">\n");
        xml.push_str("  <trk>\n");
        xml.push_str(&format!("    <name>{}</name>\n", escape_xml(&self.name)));
        xml.push_str("    <trkseg>\n");

        for point in &self.track_points {
            xml.push_str(&format!(
                "      <trkpt lat=\"{}\" lon=\"{}\">\n",
                point.lat, point.lon
            ));
            if let Some(ele) = point.ele {
                xml.push_str(&format!("        <ele>{}</ele>\n", ele));
            }
            xml.push_str(&format!("        <time>{}</time>\n", point.time));
            xml.push_str("      </trkpt>\n");
        }

        xml.push_str("    </trkseg>\n");
        xml.push_str("  </trk>\n");
        xml.push_str("</gpx>\n");

        xml
    }
}

fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Sample;

    const NOW: i64 = 1_700_000_000_000;

    fn walk() -> RouteAccumulator {
        let mut acc = RouteAccumulator::default();
        acc.add_coordinate_at(&Sample::new(45.0, 7.0, NOW - 10_000, 5.0).with_speed(1.5), NOW);
        acc.add_coordinate_at(
            &Sample::new(45.00007, 7.0, NOW - 5_000, 5.0)
                .with_speed(1.5)
                .with_altitude(300.0),
            NOW,
        );
        // Way off: rejected
        acc.add_coordinate_at(&Sample::new(45.01, 7.0, NOW, 5.0).with_speed(1.5), NOW);
        acc
    }

    #[test]
    fn test_stats() {
        let snapshot = walk().snapshot();
        let stats = &snapshot.stats;
        assert_eq!(stats.raw_count, 3);
        assert_eq!(stats.accepted_count, 2);
        assert_eq!(stats.rejected_count, 1);
        assert_eq!(stats.duration_seconds, 5.0);
        assert_eq!(stats.peak_speed_kmh, 1.5 * 3.6);
        assert_eq!(stats.issue_counts.get(&Issue::HighInferredSpeed), Some(&1));
        assert_eq!(stats.total_distance_m, snapshot.total_distance);
    }

    #[test]
    fn test_empty_stats() {
        let stats = TripStats::compute(&[], &[], 0.0);
        assert_eq!(stats, TripStats::default());
    }

    #[test]
    fn test_snapshot_json_shape() {
        let json = walk().snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let path = value["acceptedPath"].as_array().unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].as_array().unwrap().len(), 5);
        assert_eq!(path[0][4], serde_json::json!(NOW - 10_000));

        let raw = value["rawHistory"].as_array().unwrap();
        assert_eq!(raw.len(), 3);
        assert!(raw[2]["trustScore"].as_u64().unwrap() < 100);
        assert!(raw[2]["issues"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("high_inferred_speed")));
        assert_eq!(value["stats"]["issueCounts"]["high_inferred_speed"], 1);
    }

    #[test]
    fn test_gpx_generation() {
        let acc = walk();
        let track = GpxTrack::from_path("Morning <walk>", acc.accepted_path());
        let gpx_xml = track.to_gpx_xml();

        assert_eq!(track.track_points.len(), 2);
        assert!(gpx_xml.contains("<name>Morning &lt;walk&gt;</name>"));
        assert!(gpx_xml.contains("lat=\"45\" lon=\"7\""));
        assert!(gpx_xml.contains("<ele>300</ele>"));
        assert_eq!(gpx_xml.matches("<ele>").count(), 1);
        assert!(gpx_xml.contains("<time>2023-11-14T22:13:10.000Z</time>"));
    }
}
