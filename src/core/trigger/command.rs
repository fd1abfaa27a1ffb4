//! 自由文本触发词 → 固定命令集

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

static OVERRIDE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(duration|amplitude|port)\s*=\s*(\S+)").expect("override pattern is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    CurrentInjection,
    Burn,
    Cutter,
    Stop,
    Quit,
    Unknown(String),
}

/// 行内参数，如 `burn duration=30 port=COM4`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamOverrides {
    pub duration: Option<f64>,
    pub amplitude: Option<f64>,
    pub port: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TriggerCommand {
    pub kind: CommandKind,
    pub overrides: ParamOverrides,
}

impl TriggerCommand {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let mut overrides = ParamOverrides::default();

        // 参数值保持原样（串口路径区分大小写）
        for caps in OVERRIDE.captures_iter(raw) {
            let value = &caps[2];
            match caps[1].to_lowercase().as_str() {
                "duration" => overrides.duration = parse_number("duration", value),
                "amplitude" => overrides.amplitude = parse_number("amplitude", value),
                _ => overrides.port = Some(value.to_string()),
            }
        }

        let word = OVERRIDE
            .replace_all(raw, "")
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let kind = match word.as_str() {
            "current injection" | "1" => CommandKind::CurrentInjection,
            "burn" | "2" => CommandKind::Burn,
            "cutter" => CommandKind::Cutter,
            "stop" | "s" => CommandKind::Stop,
            "quit" | "q" => CommandKind::Quit,
            _ => CommandKind::Unknown(raw.to_string()),
        };

        Self { kind, overrides }
    }
}

fn parse_number(key: &str, value: &str) -> Option<f64> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            warn!("⚠️ Ignoring invalid {} override: {}", key, value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_and_case() {
        assert_eq!(TriggerCommand::parse("  Current Injection ").kind, CommandKind::CurrentInjection);
        assert_eq!(TriggerCommand::parse("1").kind, CommandKind::CurrentInjection);
        assert_eq!(TriggerCommand::parse("BURN").kind, CommandKind::Burn);
        assert_eq!(TriggerCommand::parse("2").kind, CommandKind::Burn);
        assert_eq!(TriggerCommand::parse("cutter").kind, CommandKind::Cutter);
        assert_eq!(TriggerCommand::parse("Stop").kind, CommandKind::Stop);
        assert_eq!(TriggerCommand::parse("s").kind, CommandKind::Stop);
        assert_eq!(TriggerCommand::parse("q").kind, CommandKind::Quit);
    }

    #[test]
    fn test_whitespace_collapsed() {
        assert_eq!(TriggerCommand::parse("current   injection").kind, CommandKind::CurrentInjection);
    }

    #[test]
    fn test_unknown_keeps_text() {
        assert_eq!(
            TriggerCommand::parse(" water the plant ").kind,
            CommandKind::Unknown("water the plant".into())
        );
        assert_eq!(TriggerCommand::parse("").kind, CommandKind::Unknown(String::new()));
    }

    #[test]
    fn test_inline_overrides() {
        let cmd = TriggerCommand::parse("Burn Duration=30 PORT=COM4");
        assert_eq!(cmd.kind, CommandKind::Burn);
        assert_eq!(cmd.overrides.duration, Some(30.0));
        assert_eq!(cmd.overrides.port.as_deref(), Some("COM4"));
        assert_eq!(cmd.overrides.amplitude, None);

        let cmd = TriggerCommand::parse("1 amplitude = 40e-6");
        assert_eq!(cmd.kind, CommandKind::CurrentInjection);
        assert_eq!(cmd.overrides.amplitude, Some(40e-6));
    }

    #[test]
    fn test_port_keeps_case() {
        let cmd = TriggerCommand::parse("burn duration=5 port=/dev/ttyUSB0");
        assert_eq!(cmd.kind, CommandKind::Burn);
        assert_eq!(cmd.overrides.port.as_deref(), Some("/dev/ttyUSB0"));
    }

    #[test]
    fn test_invalid_override_ignored() {
        let cmd = TriggerCommand::parse("burn duration=soon");
        assert_eq!(cmd.kind, CommandKind::Burn);
        assert_eq!(cmd.overrides.duration, None);
    }
}
