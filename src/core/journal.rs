use crate::core::imaging::ThresholdOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub timestamp: DateTime<Utc>,
    pub image: String,
    pub bright: u64,
    pub normalized: u64,
    pub agitated: bool,
}

impl JournalEntry {
    pub fn new(image: &Path, outcome: &ThresholdOutcome) -> Self {
        Self {
            timestamp: Utc::now(),
            image: image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            bright: outcome.bright_count,
            normalized: outcome.normalized_count,
            agitated: outcome.agitated,
        }
    }
}

/// 逐帧分析记录，每行一个 JSON 对象
pub struct AnalysisJournal {
    path: PathBuf,
    file: Mutex<File>,
}

impl AnalysisJournal {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &JournalEntry) -> io::Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(line.as_bytes())
    }

    /// 读回全部记录，格式错误的行跳过
    pub fn entries(&self) -> io::Result<Vec<JournalEntry>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            if let Ok(entry) = serde_json::from_str(&line?) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}
