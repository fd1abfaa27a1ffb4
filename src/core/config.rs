use crate::core::capture::CaptureConfig;
use crate::core::cooldown::CooldownConfig;
use crate::core::imaging::{SequenceParams, ThresholdParams};
use crate::core::notify::NotifyConfig;
use crate::core::trigger::TriggerConfig;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// 全部运行参数，JSON5 文件，camelCase 键，字段均可省略
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    pub capture: CaptureConfig,
    pub threshold: ThresholdParams,
    pub sequence: SequenceParams,
    pub cooldown: CooldownConfig,
    pub trigger: TriggerConfig,
    pub notify: NotifyConfig,
    /// 逐帧 JSON-lines 记录，不设置则关闭
    pub journal: Option<PathBuf>,
    pub read_delay_ms: Option<u64>,
}

impl MonitorConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_json5(&text)?;
        info!("⚙️ Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_json5(text: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 读取新帧前的等待，留给写入方写完
    pub fn read_delay(&self) -> Duration {
        Duration::from_millis(self.read_delay_ms.unwrap_or(100))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.capture.retention_limit < 1 {
            return invalid("capture.retentionLimit must be at least 1".into());
        }
        if !(self.capture.interval.is_finite() && self.capture.interval > 0.0) {
            return invalid(format!(
                "capture.interval must be a positive number of seconds, got {}",
                self.capture.interval
            ));
        }
        if self.sequence.min_intensity > self.sequence.max_intensity {
            return invalid(format!(
                "sequence.minIntensity ({}) exceeds maxIntensity ({})",
                self.sequence.min_intensity, self.sequence.max_intensity
            ));
        }
        if self.sequence.nothing_threshold > self.sequence.injection_threshold {
            return invalid(format!(
                "sequence.nothingThreshold ({}) exceeds injectionThreshold ({})",
                self.sequence.nothing_threshold, self.sequence.injection_threshold
            ));
        }
        if !(self.trigger.analysis_duration.is_finite() && self.trigger.analysis_duration >= 0.0) {
            return invalid(format!(
                "trigger.analysisDuration must be non-negative, got {}",
                self.trigger.analysis_duration
            ));
        }
        for (key, value) in [
            ("injectionDuration", self.trigger.injection_duration),
            ("injectionAmplitude", self.trigger.injection_amplitude),
            ("burnDuration", self.trigger.burn_duration),
        ] {
            if let Some(v) = value.filter(|v| !(v.is_finite() && *v >= 0.0)) {
                return invalid(format!("trigger.{} must be non-negative, got {}", key, v));
            }
        }
        Ok(())
    }
}
