use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Demo settings loaded from `demo.toml`. Every field has a default so an
/// empty file is a valid 1920x720 demo at 120 BPM.
#[derive(Debug, Clone, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "default_title")]
    pub title: String,
    /// Internal render width in pixels; with `height` this also fixes the
    /// output aspect ratio.
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_bpm")]
    pub beats_per_minute: f64,
    #[serde(default = "default_rows_per_beat")]
    pub rows_per_beat: f64,
    /// Directory under the demo root holding the pass shaders.
    #[serde(default = "default_shader_dir")]
    pub shader_dir: String,
    /// Track file under the demo root.
    #[serde(default = "default_tracks")]
    pub tracks: PathBuf,
}

fn default_title() -> String {
    "demoreel".into()
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    720
}

fn default_bpm() -> f64 {
    120.0
}

fn default_rows_per_beat() -> f64 {
    8.0
}

fn default_shader_dir() -> String {
    "shaders".into()
}

fn default_tracks() -> PathBuf {
    PathBuf::from("data/tracks.toml")
}

impl Default for DemoConfig {
    fn default() -> Self {
        toml::from_str("").expect("defaults are valid")
    }
}

impl DemoConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.width > 0 && self.height > 0,
            "render resolution must be non-zero"
        );
        anyhow::ensure!(self.beats_per_minute > 0.0, "beats_per_minute must be positive");
        anyhow::ensure!(self.rows_per_beat > 0.0, "rows_per_beat must be positive");
        Ok(())
    }

    /// Timeline rows per second of playback.
    pub fn row_rate(&self) -> f64 {
        self.beats_per_minute / 60.0 * self.rows_per_beat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = DemoConfig::default();
        assert_eq!(config.width, 1920);
        assert_eq!(config.height, 720);
        assert_eq!(config.shader_dir, "shaders");
    }

    #[test]
    fn row_rate_combines_bpm_and_rows() {
        let config = DemoConfig::default();
        // 120 BPM at 8 rows per beat: 16 rows per second.
        assert_eq!(config.row_rate(), 16.0);
    }

    #[test]
    fn loads_and_validates_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.toml");
        std::fs::write(&path, "width = 640\nheight = 480\ntitle = \"test\"\n").unwrap();

        let config = DemoConfig::load(&path).expect("load");
        assert_eq!(config.width, 640);
        assert_eq!(config.title, "test");

        std::fs::write(&path, "beats_per_minute = 0.0\n").unwrap();
        assert!(DemoConfig::load(&path).is_err());
    }
}
