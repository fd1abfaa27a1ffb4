use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    Nothing,
    /// 单帧阈值判定为阳性，不区分事件类型
    Agitated,
    Injection,
    Burn,
    /// 输入不足，无法分类
    Unknown,
}

impl EventClass {
    pub fn is_positive(self) -> bool {
        matches!(self, EventClass::Agitated | EventClass::Injection | EventClass::Burn)
    }

    pub fn label(self) -> &'static str {
        match self {
            EventClass::Nothing => "Nothing happened",
            EventClass::Agitated => "Agitated",
            EventClass::Injection => "Current injection",
            EventClass::Burn => "Burn",
            EventClass::Unknown => "Unknown",
        }
    }
}

/// 判定所依据的原始计数，留给操作员复核
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiagnosticCounts {
    Threshold { bright: u64, normalized: u64 },
    Sequence { vs_prev: Vec<u64>, vs_bg: Vec<u64> },
    Empty { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationVerdict {
    pub class: EventClass,
    pub counts: DiagnosticCounts,
}

impl ClassificationVerdict {
    pub fn unknown(reason: impl Into<String>) -> Self {
        Self {
            class: EventClass::Unknown,
            counts: DiagnosticCounts::Empty {
                reason: reason.into(),
            },
        }
    }

    pub fn is_positive(&self) -> bool {
        self.class.is_positive()
    }
}
