use super::actuator::{ActuationParams, ActuatorKind};
use super::command::ParamOverrides;
use super::error::TriggerError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 硬件参数与分析时长；`*Program` 为外部驱动程序的 argv 模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TriggerConfig {
    pub injection_duration: Option<f64>,
    pub injection_amplitude: Option<f64>,
    pub injection_port: Option<String>,
    pub burn_duration: Option<f64>,
    pub burn_port: Option<String>,
    pub cutter_port: Option<String>,
    /// 触发到自动停止之间的秒数
    pub analysis_duration: f64,
    pub stop_poll_ms: u64,
    pub injection_program: Option<Vec<String>>,
    pub burn_program: Option<Vec<String>>,
    pub cutter_program: Option<Vec<String>>,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            injection_duration: None,
            injection_amplitude: None,
            injection_port: None,
            burn_duration: None,
            burn_port: None,
            cutter_port: None,
            analysis_duration: 120.0,
            stop_poll_ms: 250,
            injection_program: None,
            burn_program: None,
            cutter_program: None,
        }
    }
}

impl TriggerConfig {
    pub fn analysis_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.analysis_duration).unwrap_or(Duration::ZERO)
    }

    pub fn stop_poll(&self) -> Duration {
        Duration::from_millis(self.stop_poll_ms)
    }

    pub fn program(&self, kind: ActuatorKind) -> Option<&[String]> {
        match kind {
            ActuatorKind::Injection => self.injection_program.as_deref(),
            ActuatorKind::Burn => self.burn_program.as_deref(),
            ActuatorKind::Cutter => self.cutter_program.as_deref(),
        }
    }

    /// 行内参数覆盖配置值后解析
    /// injection 需要 duration、amplitude、port；burn 需要 duration、port；cutter 用已配置的 port
    pub fn resolve(&self, kind: ActuatorKind, overrides: &ParamOverrides) -> Result<ActuationParams, TriggerError> {
        let port = overrides.port.clone().or_else(|| match kind {
            ActuatorKind::Injection => self.injection_port.clone(),
            ActuatorKind::Burn => self.burn_port.clone(),
            ActuatorKind::Cutter => self.cutter_port.clone(),
        });

        if kind == ActuatorKind::Cutter {
            return Ok(ActuationParams {
                port: port.unwrap_or_default(),
                duration: Duration::ZERO,
                amplitude: None,
            });
        }

        let (duration, amplitude, prefix) = match kind {
            ActuatorKind::Injection => (
                overrides.duration.or(self.injection_duration),
                overrides.amplitude.or(self.injection_amplitude),
                "injection",
            ),
            _ => (overrides.duration.or(self.burn_duration), None, "burn"),
        };
        let duration = duration.and_then(|secs| Duration::try_from_secs_f64(secs).ok());

        let mut missing = Vec::new();
        if duration.is_none() {
            missing.push(format!("{}Duration", prefix));
        }
        if kind == ActuatorKind::Injection && amplitude.is_none() {
            missing.push(format!("{}Amplitude", prefix));
        }
        if port.as_deref().map_or(true, str::is_empty) {
            missing.push(format!("{}Port", prefix));
        }

        match (duration, port) {
            (Some(duration), Some(port)) if missing.is_empty() => Ok(ActuationParams {
                port,
                duration,
                amplitude,
            }),
            _ => Err(TriggerError::ParametersNotSet {
                action: kind,
                missing: missing.join(", "),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burn_without_duration() {
        let config = TriggerConfig {
            burn_port: Some("COM3".into()),
            ..Default::default()
        };

        match config.resolve(ActuatorKind::Burn, &ParamOverrides::default()) {
            Err(TriggerError::ParametersNotSet { action, missing }) => {
                assert_eq!(action, ActuatorKind::Burn);
                assert_eq!(missing, "burnDuration");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_injection_lists_every_missing_field() {
        let err = TriggerConfig::default()
            .resolve(ActuatorKind::Injection, &ParamOverrides::default())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameters not set for current injection: injectionDuration, injectionAmplitude, injectionPort"
        );
    }

    #[test]
    fn test_overrides_win() {
        let config = TriggerConfig {
            injection_duration: Some(10.0),
            injection_amplitude: Some(1e-5),
            injection_port: Some("COM1".into()),
            ..Default::default()
        };
        let overrides = ParamOverrides {
            duration: Some(2.5),
            amplitude: None,
            port: Some("COM9".into()),
        };

        let params = config.resolve(ActuatorKind::Injection, &overrides).unwrap();
        assert_eq!(params.port, "COM9");
        assert_eq!(params.duration, Duration::from_millis(2500));
        assert_eq!(params.amplitude, Some(1e-5));
    }

    #[test]
    fn test_cutter_needs_nothing() {
        let params = TriggerConfig::default()
            .resolve(ActuatorKind::Cutter, &ParamOverrides::default())
            .unwrap();
        assert_eq!(params.port, "");
        assert_eq!(params.duration, Duration::ZERO);
    }

    #[test]
    fn test_defaults() {
        let config: TriggerConfig = serde_json::from_str(r#"{"burnDuration": 30}"#).unwrap();
        assert_eq!(config.burn_duration, Some(30.0));
        assert_eq!(config.analysis_duration(), Duration::from_secs(120));
        assert_eq!(config.stop_poll(), Duration::from_millis(250));
    }
}
