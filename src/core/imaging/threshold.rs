use super::frame::Frame;
use super::verdict::{ClassificationVerdict, DiagnosticCounts, EventClass};
use serde::{Deserialize, Serialize};

/// 去均值后亮度区间的上界
const NORMALIZED_CEILING: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdParams {
    pub bright_threshold: u8,
    pub bright_count_threshold: u64,
    /// 高出帧均值的百分比
    pub normalized_threshold: u32,
    pub normalized_count_threshold: u64,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            bright_threshold: 30,
            bright_count_threshold: 4000,
            normalized_threshold: 5,
            normalized_count_threshold: 6000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ThresholdOutcome {
    pub bright_count: u64,
    pub normalized_count: u64,
    pub bright_exceeded: bool,
    pub normalized_exceeded: bool,
    pub agitated: bool,
}

impl ThresholdOutcome {
    pub fn verdict(&self) -> ClassificationVerdict {
        ClassificationVerdict {
            class: if self.agitated {
                EventClass::Agitated
            } else {
                EventClass::Nothing
            },
            counts: DiagnosticCounts::Threshold {
                bright: self.bright_count,
                normalized: self.normalized_count,
            },
        }
    }
}

/// 单帧亮度分类器：亮像素计数 + 去均值强度计数，两者同时超限才判定为 agitated
#[derive(Debug, Clone, Default)]
pub struct ThresholdClassifier {
    params: ThresholdParams,
}

impl ThresholdClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: ThresholdParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ThresholdParams {
        &self.params
    }

    pub fn classify(&self, frame: &Frame) -> ThresholdOutcome {
        classify(frame, &self.params)
    }
}

pub fn classify(frame: &Frame, params: &ThresholdParams) -> ThresholdOutcome {
    let luma = frame.luma();

    let bright_count = bright_count(&luma, params.bright_threshold);
    let normalized_count = normalized_count(&luma, params.normalized_threshold);

    let bright_exceeded = bright_count > params.bright_count_threshold;
    let normalized_exceeded = normalized_count > params.normalized_count_threshold;

    ThresholdOutcome {
        bright_count,
        normalized_count,
        bright_exceeded,
        normalized_exceeded,
        agitated: bright_exceeded && normalized_exceeded,
    }
}

fn bright_count(luma: &[u8], threshold: u8) -> u64 {
    luma.iter().filter(|&&v| v > threshold).count() as u64
}

/// 每个像素减去取整后的均值，再统计落在 `[mean * (1 + percent / 100), 100]` 的个数
fn normalized_count(luma: &[u8], percent: u32) -> u64 {
    if luma.is_empty() {
        return 0;
    }

    let sum: u64 = luma.iter().map(|&v| v as u64).sum();
    let mean = (sum / luma.len() as u64) as u32;
    let lower = (mean as f64 * (1.0 + percent as f64 / 100.0)).floor() as u32;

    if lower > NORMALIZED_CEILING {
        return 0;
    }

    luma.iter()
        .map(|&v| (v as u32).saturating_sub(mean))
        .filter(|&v| v >= lower && v <= NORMALIZED_CEILING)
        .count() as u64
}
