//! 分析编排：实时单帧阈值分析 + 会话结束后的序列分析

use crate::core::capture::{Camera, CaptureError, CaptureSession, DirectoryClaim, DirectoryClaims};
use crate::core::config::MonitorConfig;
use crate::core::cooldown::CooldownGate;
use crate::core::imaging::naming::{frame_counter, list_frames};
use crate::core::imaging::{
    ClassificationVerdict, Frame, ImagingError, SequenceClassifier, ThresholdClassifier, ThresholdOutcome,
};
use crate::core::journal::{AnalysisJournal, JournalEntry};
use crate::core::notify::Messenger;
use crate::core::trigger::SessionControl;
use crate::core::watcher::FrameWatcher;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 实时单帧路径：分类、写日志、冷却判断、通知
struct FrameAnalyzer {
    classifier: ThresholdClassifier,
    gate: Mutex<CooldownGate>,
    journal: Option<AnalysisJournal>,
    messenger: Messenger,
    read_delay: Duration,
}

impl FrameAnalyzer {
    fn on_frame_created(&self, path: &Path) -> Option<ThresholdOutcome> {
        // 等写入方把文件写完
        thread::sleep(self.read_delay);

        let frame = match Frame::load(path, frame_counter(path).unwrap_or(0)) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("⚠️ Skipping unreadable frame {:?}: {}", path, e);
                lock(&self.gate).on_cycle();
                return None;
            }
        };

        let outcome = self.classifier.classify(&frame);
        debug!(
            "Frame {:?}: bright={} normalized={} agitated={}",
            path.file_name().unwrap_or_default(),
            outcome.bright_count,
            outcome.normalized_count,
            outcome.agitated
        );

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.append(&JournalEntry::new(path, &outcome)) {
                warn!("⚠️ Failed to append to {:?}: {}", journal.path(), e);
            }
        }

        let notify = lock(&self.gate).should_notify(&outcome.verdict());
        if notify {
            info!("🌿 Agitation detected in {:?}", path.file_name().unwrap_or_default());
            if !self.messenger.send_template(&self.messenger.templates().detected_agitated) {
                lock(&self.gate).rearm();
            }
        }

        Some(outcome)
    }
}

struct ActiveSession {
    capture: Option<CaptureSession>,
    watcher: FrameWatcher,
    /// 会话开始前目录里已有的帧，不参与本次序列分析
    preexisting: HashSet<PathBuf>,
    // 采集和 watcher 停下之前一直持有
    _claim: Option<DirectoryClaim>,
}

impl ActiveSession {
    fn shutdown(&mut self) {
        if let Some(capture) = &mut self.capture {
            capture.stop();
            capture.join();
            info!("📷 Capture wrote {} frame(s)", capture.frames_written());
        }
        self.watcher.stop();
        self.watcher.join();
    }
}

pub struct AnalysisOrchestrator {
    directory: PathBuf,
    config: MonitorConfig,
    analyzer: Arc<FrameAnalyzer>,
    sequence: SequenceClassifier,
    messenger: Messenger,
    camera: Option<Arc<dyn Camera>>,
    claims: DirectoryClaims,
    active: Mutex<Option<ActiveSession>>,
}

impl AnalysisOrchestrator {
    pub fn new(
        config: MonitorConfig,
        messenger: Messenger,
        camera: Option<Arc<dyn Camera>>,
        claims: DirectoryClaims,
    ) -> Result<Self, CaptureError> {
        let journal = match &config.journal {
            Some(path) => Some(AnalysisJournal::open(path)?),
            None => None,
        };

        let analyzer = FrameAnalyzer {
            classifier: ThresholdClassifier::with_params(config.threshold.clone()),
            gate: Mutex::new(CooldownGate::with_config(config.cooldown.clone())),
            journal,
            messenger: messenger.clone(),
            read_delay: config.read_delay(),
        };

        info!(
            "🧭 AnalysisOrchestrator on {:?} ({})",
            config.capture.directory,
            if camera.is_some() { "camera attached" } else { "external capture" }
        );

        Ok(Self {
            directory: config.capture.directory.clone(),
            sequence: SequenceClassifier::with_params(config.sequence.clone()),
            analyzer: Arc::new(analyzer),
            config,
            messenger,
            camera,
            claims,
            active: Mutex::new(None),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// 分析一张新写入的帧，读取失败时返回 `None`
    pub fn on_frame_created(&self, path: &Path) -> Option<ThresholdOutcome> {
        self.analyzer.on_frame_created(path)
    }

    /// 对 `dir` 中全部帧做序列分类并发送结果
    pub fn on_capture_complete(&self, dir: &Path) -> ClassificationVerdict {
        self.report(dir, self.sequence.analyze_directory(dir))
    }

    /// 只分类会话期间新写入的帧
    fn on_session_complete(&self, session: &ActiveSession) -> ClassificationVerdict {
        let result = list_frames(&self.directory)
            .map_err(ImagingError::from)
            .and_then(|all| {
                let fresh: Vec<_> = all
                    .into_iter()
                    .filter(|(_, path)| !session.preexisting.contains(path))
                    .collect();
                self.sequence.analyze_files(&self.directory, &fresh)
            });
        self.report(&self.directory, result)
    }

    fn report(&self, dir: &Path, result: Result<ClassificationVerdict, ImagingError>) -> ClassificationVerdict {
        let verdict = result.unwrap_or_else(|e| {
            error!("❌ Sequence analysis of {:?} failed: {}", dir, e);
            ClassificationVerdict::unknown(e.to_string())
        });

        info!("📊 Capture in {:?} classified as {}", dir, verdict.class.label());
        self.messenger
            .send_template(self.messenger.templates().for_result(verdict.class));
        verdict
    }

    fn open_session(&self) -> Result<ActiveSession, CaptureError> {
        // 目录可能还不存在，此时没有旧帧
        let preexisting: HashSet<PathBuf> = list_frames(&self.directory)
            .map(|frames| frames.into_iter().map(|(_, path)| path).collect())
            .unwrap_or_default();
        if !preexisting.is_empty() {
            debug!("{} frame(s) predate the session in {:?}", preexisting.len(), self.directory);
        }

        let (capture, claim) = match &self.camera {
            Some(camera) => (
                Some(CaptureSession::start(&self.config.capture, Arc::clone(camera), &self.claims)?),
                None,
            ),
            None => {
                fs::create_dir_all(&self.directory)?;
                (None, Some(self.claims.claim(&self.directory)?))
            }
        };

        let analyzer = Arc::clone(&self.analyzer);
        let watcher = FrameWatcher::start(&self.directory, self.config.capture.stop_poll(), move |path| {
            analyzer.on_frame_created(path);
        })?;

        Ok(ActiveSession {
            capture,
            watcher,
            preexisting,
            _claim: claim,
        })
    }
}

impl SessionControl for AnalysisOrchestrator {
    fn start_session(&self) -> Result<(), CaptureError> {
        let mut active = lock(&self.active);
        if active.is_some() {
            debug!("Session already running in {:?}", self.directory);
            return Ok(());
        }

        *active = Some(self.open_session()?);
        info!("▶️ Session started in {:?}", self.directory);
        Ok(())
    }

    fn stop_session(&self) -> Option<ClassificationVerdict> {
        let mut session = lock(&self.active).take()?;
        session.shutdown();
        info!("⏹️ Session stopped in {:?}", self.directory);
        Some(self.on_session_complete(&session))
    }

    fn is_active(&self) -> bool {
        lock(&self.active).is_some()
    }
}

impl Drop for AnalysisOrchestrator {
    fn drop(&mut self) {
        if let Some(mut session) = lock(&self.active).take() {
            session.shutdown();
        }
    }
}
