//! Application Configuration
//!
//! Pipeline tuning, model/OCR endpoints, and calendar identities stored in
//! TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Pipeline tuning
    pub pipeline: PipelineConfig,
    /// Detection model settings
    pub model: ModelConfig,
    /// Remote OCR gateway settings
    pub ocr: OcrConfig,
    /// Calendar store and identity mapping
    pub calendar: CalendarConfig,
    /// Annotated-image rendering settings
    pub render: RenderConfig,
}

/// Pipeline tuning parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Minimum detection confidence for a box to be processed
    pub score_threshold: f32,
    /// Event length when a slot has no fixed preset (minutes)
    pub default_duration_min: i64,
    /// Event length when the crowding heuristic fires (minutes)
    pub crowded_duration_min: i64,
    /// More than this many boxes near one box means a simultaneous broadcast
    pub crowd_limit: usize,
    /// Center-to-center radius for the crowding heuristic (working pixels)
    pub crowd_radius_px: f32,
    /// Lead-in subtracted from the extracted start time (minutes)
    pub lead_in_min: i64,
    /// Margin trimmed off both ends of the conflict window (minutes)
    pub conflict_margin_min: i64,
    /// Left edge of the day-column area of the grid (working pixels)
    pub grid_left_px: f32,
    /// Width of one day column (working pixels)
    pub column_width_px: f32,
    /// Column the TimeBase date sits in
    pub anchor_column: i32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.94,
            default_duration_min: 180,
            crowded_duration_min: 60,
            crowd_limit: 3,
            crowd_radius_px: 450.0,
            lead_in_min: 10,
            conflict_margin_min: 25,
            grid_left_px: 120.0,
            column_width_px: 720.0,
            anchor_column: 1,
        }
    }
}

/// Detection model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to the exported ONNX model
    pub path: PathBuf,
    /// Class names in model output order
    pub class_names: Vec<String>,
    /// Model input width (training resolution)
    pub input_width: u32,
    /// Model input height (training resolution)
    pub input_height: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/schedule.onnx"),
            class_names: ["ava", "bella", "diana", "eileen", "group", "other"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            input_width: 900,
            input_height: 600,
        }
    }
}

/// Remote OCR gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Gateway endpoint accepting a base64 JPEG and returning text regions
    pub endpoint: String,
    /// Bearer token for the gateway
    pub token: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8089/ocr/general".to_string(),
            token: String::new(),
            timeout_secs: 30,
        }
    }
}

/// Calendar store credentials and the identity mapping table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    /// Open-platform base URL
    pub base_url: String,
    /// Application credentials for tenant token exchange
    pub app_id: String,
    pub app_secret: String,
    /// Target calendar
    pub calendar_id: String,
    /// The bot's own open id (added then removed around event creation)
    pub bot_open_id: String,
    /// Chat id invited to every member event
    pub team_chat_id: String,
    /// Chat id invited to group-broadcast events
    pub group_chat_id: String,
    /// Member key (`ava`, `bella`, `diana`, `eileen`) to open id
    pub member_open_ids: BTreeMap<String, String>,
    /// Offset applied when converting schedule-local times to epoch seconds
    pub utc_offset_hours: i32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            base_url: "https://open.feishu.cn/open-apis".to_string(),
            app_id: String::new(),
            app_secret: String::new(),
            calendar_id: String::new(),
            bot_open_id: String::new(),
            team_chat_id: String::new(),
            group_chat_id: String::new(),
            member_open_ids: BTreeMap::new(),
            utc_offset_hours: 8,
            timeout_secs: 30,
        }
    }
}

/// Annotated-image rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// TTF font used for box labels; labels are skipped when missing
    pub font_path: Option<PathBuf>,
    /// Label font size in pixels
    pub font_scale: f32,
    /// Outline thickness in pixels
    pub outline_px: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_path: Some(PathBuf::from("fonts/msyh.ttf")),
            font_scale: 50.0,
            outline_px: 8,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        assert!((config.pipeline.score_threshold - 0.94).abs() < 1e-6);
        assert_eq!(config.pipeline.default_duration_min, 180);
        assert_eq!(config.pipeline.crowded_duration_min, 60);
        assert_eq!(config.pipeline.crowd_limit, 3);
        assert_eq!(config.pipeline.conflict_margin_min, 25);

        assert_eq!(config.model.input_width, 900);
        assert_eq!(config.model.input_height, 600);
        assert_eq!(config.model.class_names.len(), 6);

        assert_eq!(config.calendar.utc_offset_hours, 8);
        assert!(config.calendar.member_open_ids.is_empty());
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut config = AppConfig::default();
        config
            .calendar
            .member_open_ids
            .insert("ava".to_string(), "ou_ava".to_string());
        config.pipeline.score_threshold = 0.9;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert!((parsed.pipeline.score_threshold - 0.9).abs() < 1e-6);
        assert_eq!(
            parsed.calendar.member_open_ids.get("ava").map(String::as_str),
            Some("ou_ava")
        );
        assert_eq!(parsed.model.path, config.model.path);
    }

    #[test]
    fn test_load_save_roundtrip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = AppConfig::default();
        config.calendar.calendar_id = "feishu.cn_cal".to_string();

        save_config(&config, file.path()).unwrap();
        let loaded = load_config(file.path()).unwrap();

        assert_eq!(loaded.calendar.calendar_id, "feishu.cn_cal");
    }
}
