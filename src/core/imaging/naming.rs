//! 帧文件命名：`image_{counter:04}_{YYYYmmdd_HHMMSS}.png`
//! 外部采集的图像栈也可以是纯数字文件名，如 `0012.tiff`

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

static FRAME_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:image_)?(\d+)(?:_\d{8}_\d{6})?\.(?:png|jpe?g|tiff?)$")
        .expect("frame name pattern is valid")
});

pub fn frame_file_name(counter: u64, captured_at: DateTime<Utc>) -> String {
    format!("image_{:04}_{}.png", counter, captured_at.format("%Y%m%d_%H%M%S"))
}

/// 帧文件名中的计数器，不是帧文件时返回 `None`
pub fn frame_counter(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    FRAME_NAME
        .captures(name)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `dir` 中的全部帧文件，按计数器排序
pub fn list_frames(dir: &Path) -> io::Result<Vec<(u64, PathBuf)>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        if let Some(counter) = frame_counter(&path) {
            frames.push((counter, path));
        }
    }
    frames.sort_by_key(|(counter, _)| *counter);
    Ok(frames)
}
