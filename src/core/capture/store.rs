use super::error::CaptureError;
use crate::core::imaging::naming::{frame_file_name, list_frames};
use crate::core::imaging::Frame;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RetentionPolicy {
    /// 达到上限时删除全部帧
    #[default]
    WipeAll,
    /// 从计数器最小的帧开始删，直到能再放一帧
    OldestFirst,
}

/// 帧目录：写入前先执行保留策略，目录中的帧数永远不超过上限
#[derive(Debug)]
pub struct FrameStore {
    dir: PathBuf,
    retention_limit: usize,
    policy: RetentionPolicy,
    next_counter: u64,
}

impl FrameStore {
    pub fn open(dir: &Path, retention_limit: usize, policy: RetentionPolicy) -> Result<Self, CaptureError> {
        if retention_limit == 0 {
            return Err(CaptureError::InvalidConfig(
                "retention limit must be at least 1".into(),
            ));
        }

        fs::create_dir_all(dir)?;
        let next_counter = list_frames(dir)?
            .last()
            .map(|(counter, _)| counter + 1)
            .unwrap_or(0);

        Ok(Self {
            dir: dir.to_path_buf(),
            retention_limit,
            policy,
            next_counter,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.dir
    }

    /// 目录中当前的帧文件数
    pub fn frame_count(&self) -> Result<usize, CaptureError> {
        Ok(list_frames(&self.dir)?.len())
    }

    /// 先按保留策略清理，再写入 `frame`；写入成功后计数器才前进
    pub fn write(&mut self, frame: &Frame) -> Result<PathBuf, CaptureError> {
        self.enforce_retention()?;

        let path = self
            .dir
            .join(frame_file_name(self.next_counter, frame.captured_at));
        frame.save(&path)?;
        self.next_counter += 1;

        debug!("Saved frame to {:?}", path);
        Ok(path)
    }

    /// 返回被清理的帧数
    fn enforce_retention(&self) -> Result<usize, CaptureError> {
        let frames = list_frames(&self.dir)?;
        if frames.len() < self.retention_limit {
            return Ok(0);
        }

        let victims = match self.policy {
            RetentionPolicy::WipeAll => &frames[..],
            RetentionPolicy::OldestFirst => &frames[..frames.len() + 1 - self.retention_limit],
        };
        for (_, path) in victims {
            fs::remove_file(path)?;
        }

        info!(
            "🧹 Retention limit {} reached in {:?}, evicted {} frames",
            self.retention_limit,
            self.dir,
            victims.len()
        );
        Ok(victims.len())
    }
}
