use crate::core::imaging::EventClass;
use serde::{Deserialize, Serialize};

/// 消息模板，`$NAME` 会被替换为联系人名字
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MessageTemplates {
    pub detected_agitated: String,
    pub detected_injection: String,
    pub detected_burn: String,
    pub detected_else: String,
    pub received_injection: String,
    pub received_burn: String,
    pub received_cutter: String,
    pub stop_ok: String,
    pub stop_nothing: String,
    pub quit: String,
    pub unknown: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            detected_agitated: "Hi $NAME, your plant looks agitated right now.".into(),
            detected_injection: "Hi $NAME, the analysis detected a current injection response.".into(),
            detected_burn: "Hi $NAME, the analysis detected a burn response.".into(),
            detected_else: "Hi $NAME, the analysis found no clear response.".into(),
            received_injection: "Current injection received, starting capture and analysis.".into(),
            received_burn: "Burn received, starting capture and analysis.".into(),
            received_cutter: "Cutter received.".into(),
            stop_ok: "Analysis stopped.".into(),
            stop_nothing: "Nothing to stop, no analysis is running.".into(),
            quit: "Shutting down. Goodbye $NAME.".into(),
            unknown: "Unrecognized command. Reply 1 (current injection), 2 (burn), cutter, stop or quit."
                .into(),
        }
    }
}

impl MessageTemplates {
    /// 序列分析结果对应的模板
    pub fn for_result(&self, class: EventClass) -> &str {
        match class {
            EventClass::Agitated => &self.detected_agitated,
            EventClass::Injection => &self.detected_injection,
            EventClass::Burn => &self.detected_burn,
            EventClass::Nothing | EventClass::Unknown => &self.detected_else,
        }
    }

    pub fn render(template: &str, name: &str) -> String {
        template.replace("$NAME", name)
    }
}
