//! Keyframe tracks in the style of the rocket sync tracker.
//!
//! A [`Track`] is a named scalar curve made of keyframes at integer rows; a
//! [`Timeline`] is a set of tracks addressed by name and sampled at a
//! fractional row. The renderer only sees the [`TrackSource`] trait, so an
//! editor connection or any other value source can be slotted in behind the
//! same seam.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("failed to read track file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse track file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid track data: {0}")]
    Invalid(String),
}

/// Continuous interpolation over named keyframe tracks.
///
/// `value` must be cheap and side-effect-free; the render pipeline calls it
/// once per timeline-driven uniform component per pass per frame.
pub trait TrackSource {
    fn value(&self, track: &str, row: f64) -> f32;
}

/// How a key's span interpolates toward the next key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    #[default]
    Step,
    Linear,
    Smooth,
    Ramp,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Key {
    pub row: u32,
    pub value: f32,
    #[serde(default)]
    pub interpolation: Interpolation,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Track {
    pub name: String,
    #[serde(default)]
    pub keys: Vec<Key>,
}

impl Track {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
        }
    }

    /// Sample the track at a fractional row.
    ///
    /// Rows before the first key clamp to the first key's value, rows at or
    /// past the last key clamp to the last. An empty track samples as 0.0,
    /// matching an untouched rocket track.
    pub fn value_at(&self, row: f64) -> f32 {
        let (first, last) = match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if row < f64::from(first.row) {
            return first.value;
        }
        if row >= f64::from(last.row) {
            return last.value;
        }

        // partition_point returns the first key strictly after `row`; the
        // clamps above guarantee 1..len, so `idx - 1` is the floor key.
        let idx = self
            .keys
            .partition_point(|key| f64::from(key.row) <= row);
        let k0 = &self.keys[idx - 1];
        let k1 = &self.keys[idx];

        let span = f64::from(k1.row) - f64::from(k0.row);
        let t = ((row - f64::from(k0.row)) / span) as f32;
        let t = match k0.interpolation {
            Interpolation::Step => return k0.value,
            Interpolation::Linear => t,
            Interpolation::Smooth => t * t * (3.0 - 2.0 * t),
            Interpolation::Ramp => t * t,
        };

        k0.value + (k1.value - k0.value) * t
    }

    fn validate(&self) -> Result<(), TimelineError> {
        if self.name.is_empty() {
            return Err(TimelineError::Invalid("track with empty name".into()));
        }
        for pair in self.keys.windows(2) {
            if pair[1].row <= pair[0].row {
                return Err(TimelineError::Invalid(format!(
                    "track '{}' keys not strictly ascending at row {}",
                    self.name, pair[1].row
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct TrackFile {
    #[serde(default)]
    tracks: Vec<Track>,
}

/// A set of named tracks loaded from a TOML track file.
#[derive(Debug, Default, Clone)]
pub struct Timeline {
    tracks: BTreeMap<String, Track>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_str(raw: &str) -> Result<Self, TimelineError> {
        let file: TrackFile = toml::from_str(raw)?;
        let mut tracks = BTreeMap::new();
        for track in file.tracks {
            track.validate()?;
            if tracks.insert(track.name.clone(), track).is_some() {
                return Err(TimelineError::Invalid(
                    "duplicate track name".into(),
                ));
            }
        }
        Ok(Self { tracks })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TimelineError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_str(&raw)
    }

    pub fn insert(&mut self, track: Track) {
        self.tracks.insert(track.name.clone(), track);
    }

    pub fn get(&self, name: &str) -> Option<&Track> {
        self.tracks.get(name)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl TrackSource for Timeline {
    fn value(&self, track: &str, row: f64) -> f32 {
        match self.tracks.get(track) {
            Some(track) => track.value_at(row),
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(keys: &[(u32, f32, Interpolation)]) -> Track {
        Track {
            name: "test".into(),
            keys: keys
                .iter()
                .map(|&(row, value, interpolation)| Key {
                    row,
                    value,
                    interpolation,
                })
                .collect(),
        }
    }

    #[test]
    fn empty_track_samples_zero() {
        assert_eq!(track(&[]).value_at(10.0), 0.0);
    }

    #[test]
    fn clamps_outside_key_range() {
        let t = track(&[
            (8, 1.0, Interpolation::Linear),
            (16, 3.0, Interpolation::Linear),
        ]);
        assert_eq!(t.value_at(0.0), 1.0);
        assert_eq!(t.value_at(16.0), 3.0);
        assert_eq!(t.value_at(100.0), 3.0);
    }

    #[test]
    fn step_holds_floor_value() {
        let t = track(&[
            (0, 2.0, Interpolation::Step),
            (10, 4.0, Interpolation::Step),
        ]);
        assert_eq!(t.value_at(9.99), 2.0);
        assert_eq!(t.value_at(10.0), 4.0);
    }

    #[test]
    fn linear_interpolates_between_keys() {
        let t = track(&[
            (0, 0.0, Interpolation::Linear),
            (10, 10.0, Interpolation::Linear),
        ]);
        assert_eq!(t.value_at(2.5), 2.5);
        assert_eq!(t.value_at(7.5), 7.5);
    }

    #[test]
    fn smooth_is_smoothstep() {
        let t = track(&[
            (0, 0.0, Interpolation::Smooth),
            (10, 1.0, Interpolation::Smooth),
        ]);
        assert_eq!(t.value_at(5.0), 0.5);
        assert!(t.value_at(2.5) < 0.25);
        assert!(t.value_at(7.5) > 0.75);
    }

    #[test]
    fn ramp_is_quadratic() {
        let t = track(&[
            (0, 0.0, Interpolation::Ramp),
            (10, 1.0, Interpolation::Ramp),
        ]);
        assert_eq!(t.value_at(5.0), 0.25);
    }

    #[test]
    fn interpolation_follows_floor_key() {
        let t = track(&[
            (0, 0.0, Interpolation::Step),
            (10, 1.0, Interpolation::Linear),
            (20, 0.0, Interpolation::Linear),
        ]);
        assert_eq!(t.value_at(5.0), 0.0);
        assert_eq!(t.value_at(15.0), 0.5);
    }

    #[test]
    fn parses_track_file() {
        let timeline = Timeline::from_str(
            r#"
            [[tracks]]
            name = "Cam:Pos.x"
            keys = [
                { row = 0, value = 0.0 },
                { row = 32, value = 4.0, interpolation = "linear" },
            ]

            [[tracks]]
            name = "Speed"
            keys = [{ row = 0, value = 1.5 }]
            "#,
        )
        .expect("parse");

        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline.value("Speed", 100.0), 1.5);
        assert_eq!(timeline.value("Cam:Pos.x", 0.0), 0.0);
    }

    #[test]
    fn missing_track_samples_zero() {
        let timeline = Timeline::new();
        assert_eq!(timeline.value("NoSuch", 3.0), 0.0);
    }

    #[test]
    fn rejects_unsorted_keys() {
        let result = Timeline::from_str(
            r#"
            [[tracks]]
            name = "Bad"
            keys = [
                { row = 10, value = 0.0 },
                { row = 5, value = 1.0 },
            ]
            "#,
        );
        assert!(matches!(result, Err(TimelineError::Invalid(_))));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.toml");
        std::fs::write(
            &path,
            "[[tracks]]\nname = \"Flash\"\nkeys = [{ row = 0, value = 1.0 }]\n",
        )
        .unwrap();

        let timeline = Timeline::from_path(&path).expect("load");
        assert_eq!(timeline.value("Flash", 0.0), 1.0);
    }
}
