use super::error::CaptureError;
use crate::core::imaging::naming::list_frames;
use crate::core::imaging::Frame;
use chrono::Utc;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// 采集会话的帧来源
pub trait Camera: Send + Sync {
    /// 最新一帧，临时采集失败时返回 `None`
    fn grab(&self) -> Option<Frame>;

    /// 会话开始前调用一次，出错则会话不启动
    fn check(&self) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// 回放相机：按计数顺序循环读取目录中的帧文件，用于无硬件环境
pub struct ReplayCamera {
    source: PathBuf,
    files: Vec<PathBuf>,
    cursor: AtomicU64,
}

impl ReplayCamera {
    pub fn open(source: &Path) -> Result<Self, CaptureError> {
        let files: Vec<PathBuf> = list_frames(source)?.into_iter().map(|(_, p)| p).collect();
        info!("🎞️ ReplayCamera: {} frames in {:?}", files.len(), source);
        Ok(Self {
            source: source.to_path_buf(),
            files,
            cursor: AtomicU64::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Camera for ReplayCamera {
    fn grab(&self) -> Option<Frame> {
        if self.files.is_empty() {
            return None;
        }
        let sequence = self.cursor.fetch_add(1, Ordering::SeqCst);
        let path = &self.files[(sequence % self.files.len() as u64) as usize];

        match Frame::load(path, sequence) {
            Ok(frame) => Some(frame.with_timestamp(Utc::now())),
            Err(e) => {
                warn!("⚠️ ReplayCamera: cannot read {:?}: {}", path, e);
                None
            }
        }
    }

    fn check(&self) -> Result<(), CaptureError> {
        if self.files.is_empty() {
            return Err(CaptureError::CameraUnavailable(format!(
                "no frames to replay in {:?}",
                self.source
            )));
        }
        Ok(())
    }
}
