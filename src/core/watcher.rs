use crate::core::cancel::CancelToken;
use crate::core::capture::CaptureError;
use crate::core::imaging::naming::list_frames;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 记录已交出的帧路径；目录被清空后外部程序从 0001 重新计数也能识别
#[derive(Debug)]
pub struct FrameScanner {
    directory: PathBuf,
    seen: HashSet<PathBuf>,
}

impl FrameScanner {
    /// 目录中已有的帧视为已处理
    pub fn new(directory: &Path) -> io::Result<Self> {
        let seen = list_frames(directory)?.into_iter().map(|(_, path)| path).collect();
        Ok(Self {
            directory: directory.to_path_buf(),
            seen,
        })
    }

    /// 上次扫描之后出现的帧，按序号从旧到新
    pub fn scan(&mut self) -> io::Result<Vec<PathBuf>> {
        let present = list_frames(&self.directory)?;

        // 已删除的路径不再记录，集合大小跟着目录走
        let before = self.seen.len();
        {
            let current: HashSet<&PathBuf> = present.iter().map(|(_, path)| path).collect();
            self.seen.retain(|seen| current.contains(seen));
        }
        if self.seen.len() < before {
            debug!("{} frame(s) removed from {:?}", before - self.seen.len(), self.directory);
        }

        let mut fresh = Vec::new();
        for (_, path) in present {
            if self.seen.insert(path.clone()) {
                fresh.push(path);
            }
        }
        Ok(fresh)
    }
}

/// 轮询目录，新帧按序号顺序回调
pub struct FrameWatcher {
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl FrameWatcher {
    pub fn start<F>(directory: &Path, poll: Duration, mut on_frame: F) -> Result<Self, CaptureError>
    where
        F: FnMut(&Path) + Send + 'static,
    {
        fs::create_dir_all(directory)?;
        let mut scanner = FrameScanner::new(directory)?;
        let cancel = CancelToken::new();

        let handle = {
            let cancel = cancel.clone();
            let directory = directory.to_path_buf();
            thread::Builder::new()
                .name("frame-watcher".into())
                .spawn(move || {
                    info!("👀 Watching {:?} for new frames", directory);
                    loop {
                        match scanner.scan() {
                            Ok(paths) => {
                                for path in paths {
                                    debug!("New frame {:?}", path);
                                    on_frame(&path);
                                }
                            }
                            Err(e) => warn!("⚠️ Failed to scan {:?}: {}", directory, e),
                        }
                        if cancel.sleep(poll, poll) {
                            break;
                        }
                    }
                    info!("👀 Watcher for {:?} stopped", directory);
                })?
        };

        Ok(Self {
            cancel,
            handle: Some(handle),
        })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("❌ Watcher thread panicked");
            }
        }
    }
}

impl Drop for FrameWatcher {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}
