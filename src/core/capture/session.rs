use super::camera::Camera;
use super::error::CaptureError;
use super::store::{FrameStore, RetentionPolicy};
use crate::core::cancel::CancelToken;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CaptureConfig {
    pub directory: PathBuf,
    /// 采集间隔秒数
    pub interval: f64,
    pub retention_limit: usize,
    pub retention_policy: RetentionPolicy,
    /// 间隔等待期间检查停止请求的周期，毫秒
    pub stop_poll_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("captured_data"),
            interval: 2.0,
            retention_limit: 20,
            retention_policy: RetentionPolicy::WipeAll,
            stop_poll_ms: 100,
        }
    }
}

impl CaptureConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval.max(0.0))
    }

    pub fn stop_poll(&self) -> Duration {
        Duration::from_millis(self.stop_poll_ms)
    }
}

/// 当前有采集会话在运行的目录
#[derive(Debug, Clone, Default)]
pub struct DirectoryClaims {
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

impl DirectoryClaims {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&self, dir: &Path) -> Result<DirectoryClaim, CaptureError> {
        let key = fs::canonicalize(dir)?;
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(key.clone()) {
            return Err(CaptureError::DirectoryBusy(key));
        }
        Ok(DirectoryClaim {
            key,
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_claimed(&self, dir: &Path) -> bool {
        let Ok(key) = fs::canonicalize(dir) else {
            return false;
        };
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&key)
    }
}

/// drop 时释放
#[derive(Debug)]
pub struct DirectoryClaim {
    key: PathBuf,
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

impl Drop for DirectoryClaim {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.key);
    }
}

/// 采集会话：后台线程按固定间隔从相机取帧写入 FrameStore
pub struct CaptureSession {
    directory: PathBuf,
    cancel: CancelToken,
    frames_written: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureSession {
    pub fn start(
        config: &CaptureConfig,
        camera: Arc<dyn Camera>,
        claims: &DirectoryClaims,
    ) -> Result<Self, CaptureError> {
        if config.interval <= 0.0 {
            return Err(CaptureError::InvalidConfig(format!(
                "capture interval must be positive, got {}",
                config.interval
            )));
        }

        camera.check()?;
        let mut store = FrameStore::open(&config.directory, config.retention_limit, config.retention_policy)?;
        let claim = claims.claim(store.directory())?;

        let cancel = CancelToken::new();
        let frames_written = Arc::new(AtomicU64::new(0));
        let (interval, poll) = (config.interval(), config.stop_poll());

        let handle = {
            let cancel = cancel.clone();
            let frames_written = Arc::clone(&frames_written);
            thread::Builder::new()
                .name("capture".into())
                .spawn(move || {
                    match store.frame_count() {
                        Ok(existing) => info!(
                            "📷 Capture thread started in {:?} ({} existing frame(s))",
                            store.directory(),
                            existing
                        ),
                        Err(e) => warn!("⚠️ Capture thread started, cannot list {:?}: {}", store.directory(), e),
                    }
                    while !cancel.is_cancelled() {
                        match camera.grab() {
                            Some(frame) => match store.write(&frame) {
                                Ok(_) => {
                                    frames_written.fetch_add(1, Ordering::SeqCst);
                                }
                                Err(e) => warn!("⚠️ Failed to save frame: {}", e),
                            },
                            None => warn!("⚠️ Camera returned no frame, skipping"),
                        }

                        if cancel.sleep(interval, poll) {
                            break;
                        }
                    }
                    drop(claim);
                    info!("📷 Capture thread exiting");
                })?
        };

        Ok(Self {
            directory: config.directory.clone(),
            cancel,
            frames_written,
            handle: Some(handle),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// 请求循环在本轮结束后退出，可重复调用
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!("Stopping capture in {:?}", self.directory);
        }
        self.cancel.cancel();
    }

    /// 阻塞到采集线程退出并释放目录
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("❌ Capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}
