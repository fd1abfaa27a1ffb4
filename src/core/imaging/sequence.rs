//! 序列分类：以首帧为背景，逐帧与前一帧/背景做差，按像素计数区分 Nothing / Injection / Burn

use super::error::ImagingError;
use super::frame::Frame;
use super::naming::list_frames;
use super::verdict::{ClassificationVerdict, DiagnosticCounts, EventClass};
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

pub const COUNTS_VS_PREV_FILE: &str = "pixel_counts_vs_prev.txt";
pub const COUNTS_VS_BG_FILE: &str = "pixel_counts_vs_bg.txt";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SequenceParams {
    pub min_intensity: u8,
    pub max_intensity: u8,
    pub nothing_threshold: u64,
    pub injection_threshold: u64,
    pub max_frames_to_check: usize,
}

impl Default for SequenceParams {
    fn default() -> Self {
        Self {
            min_intensity: 20,
            max_intensity: 170,
            nothing_threshold: 35,
            injection_threshold: 10000,
            max_frames_to_check: 100,
        }
    }
}

/// 严格递增、尺寸一致的灰度帧序列，首帧为背景
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn new(frames: Vec<Frame>) -> Result<Self, ImagingError> {
        if frames.len() < 2 {
            return Err(ImagingError::InsufficientFrames(frames.len()));
        }

        let expected = frames[0].dimensions();
        for pair in frames.windows(2) {
            if pair[1].sequence <= pair[0].sequence {
                return Err(ImagingError::OutOfOrder {
                    previous: pair[0].sequence,
                    next: pair[1].sequence,
                });
            }
            if pair[1].dimensions() != expected {
                return Err(ImagingError::SizeMismatch {
                    sequence: pair[1].sequence,
                    expected,
                    actual: pair[1].dimensions(),
                });
            }
        }

        Ok(Self {
            frames: frames.iter().map(Frame::to_gray).collect(),
        })
    }

    /// 按计数器顺序加载 `dir` 中的全部帧，读不了的跳过
    pub fn from_directory(dir: &Path) -> Result<Self, ImagingError> {
        Self::from_files(&list_frames(dir)?)
    }

    /// 加载 `(计数器, 路径)` 列表中的帧，读不了的跳过
    pub fn from_files(files: &[(u64, PathBuf)]) -> Result<Self, ImagingError> {
        let mut frames = Vec::with_capacity(files.len());
        for (counter, path) in files {
            match Frame::load(path, *counter) {
                Ok(frame) => frames.push(frame),
                Err(e) => warn!("⚠️ Skipping unreadable frame {:?}: {}", path, e),
            }
        }
        Self::new(frames)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn background(&self) -> &Frame {
        &self.frames[0]
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
}

pub struct SequenceClassifier {
    params: SequenceParams,
    pool: Option<rayon::ThreadPool>,
    /// 计数日志写入线程，flush_logs 或 drop 时 join
    writers: Mutex<Vec<JoinHandle<()>>>,
}

impl SequenceClassifier {
    pub fn new() -> Self {
        Self::with_params(SequenceParams::default())
    }

    pub fn with_params(params: SequenceParams) -> Self {
        let num_threads = num_cpus::get().min(4);
        debug!("Using {} threads for sequence diffing", num_threads);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("seq-diff-{}", i))
            .build()
            .map_err(|e| warn!("⚠️ Falling back to the global rayon pool: {}", e))
            .ok();

        Self {
            params,
            pool,
            writers: Mutex::new(Vec::new()),
        }
    }

    pub fn params(&self) -> &SequenceParams {
        &self.params
    }

    pub fn classify(&self, sequence: &FrameSequence) -> ClassificationVerdict {
        let (vs_prev, vs_bg) = match &self.pool {
            Some(pool) => pool.install(|| self.band_counts(sequence)),
            None => self.band_counts(sequence),
        };

        let class = detect_conditions(&vs_prev, &self.params);
        info!(
            "📊 Sequence of {} frames classified as {}",
            sequence.len(),
            class.label()
        );

        ClassificationVerdict {
            class,
            counts: DiagnosticCounts::Sequence { vs_prev, vs_bg },
        }
    }

    /// 分类 `dir` 中的全部帧，并把逐帧计数写到同一目录
    /// 空目录或只有一帧时返回 `Unknown`
    pub fn analyze_directory(&self, dir: &Path) -> Result<ClassificationVerdict, ImagingError> {
        self.analyze_files(dir, &list_frames(dir)?)
    }

    /// 只分类 `files` 中的帧（按计数器排序），计数日志写到 `dir`
    pub fn analyze_files(&self, dir: &Path, files: &[(u64, PathBuf)]) -> Result<ClassificationVerdict, ImagingError> {
        info!("🔍 Running sequence analysis on {} frame(s) in {:?}", files.len(), dir);

        let sequence = match FrameSequence::from_files(files) {
            Ok(sequence) => sequence,
            Err(ImagingError::InsufficientFrames(0)) => {
                return Ok(ClassificationVerdict::unknown("No images found"))
            }
            Err(ImagingError::InsufficientFrames(_)) => {
                return Ok(ClassificationVerdict::unknown("Insufficient images"))
            }
            Err(e) => return Err(e),
        };

        let verdict = self.classify(&sequence);
        if let DiagnosticCounts::Sequence { vs_prev, vs_bg } = &verdict.counts {
            self.persist_in_background(dir.to_path_buf(), vs_prev.clone(), vs_bg.clone());
        }
        Ok(verdict)
    }

    fn band_counts(&self, sequence: &FrameSequence) -> (Vec<u64>, Vec<u64>) {
        let frames = sequence.frames();
        let background = &sequence.background().data;
        let (min, max) = (self.params.min_intensity, self.params.max_intensity);

        (1..frames.len())
            .into_par_iter()
            .map(|i| {
                let current = &frames[i].data;
                (
                    band_count(current, &frames[i - 1].data, min, max),
                    band_count(current, background, min, max),
                )
            })
            .unzip()
    }

    fn writers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.writers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 日志写入失败只记录，不影响分类结果
    fn persist_in_background(&self, dir: PathBuf, vs_prev: Vec<u64>, vs_bg: Vec<u64>) {
        let params = self.params.clone();
        let spawned = thread::Builder::new()
            .name("count-log".into())
            .spawn(move || {
                if let Err(e) = write_count_logs(&dir, &vs_prev, &vs_bg, &params) {
                    warn!("⚠️ Failed to write pixel count logs in {:?}: {}", dir, e);
                }
            });

        match spawned {
            Ok(handle) => {
                let mut writers = self.writers();
                writers.retain(|w| !w.is_finished());
                writers.push(handle);
            }
            Err(e) => warn!("⚠️ Could not spawn pixel count writer: {}", e),
        }
    }

    /// 等待所有计数日志写完
    pub fn flush_logs(&self) {
        let pending: Vec<_> = self.writers().drain(..).collect();
        for handle in pending {
            if handle.join().is_err() {
                warn!("⚠️ Pixel count writer panicked");
            }
        }
    }
}

impl Default for SequenceClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SequenceClassifier {
    fn drop(&mut self) {
        self.flush_logs();
    }
}

/// 单次遍历前 `max_frames_to_check` 个相邻帧计数
/// 超过 injection 阈值立即判 Burn，落在 `[nothing, injection]` 区间则记为 Injection
pub fn detect_conditions(counts_vs_prev: &[u64], params: &SequenceParams) -> EventClass {
    if counts_vs_prev.is_empty() {
        return EventClass::Unknown;
    }

    let mut result = EventClass::Nothing;
    for &count in counts_vs_prev.iter().take(params.max_frames_to_check) {
        if count > params.injection_threshold {
            return EventClass::Burn;
        } else if count >= params.nothing_threshold {
            result = EventClass::Injection;
        }
    }
    result
}

pub fn write_count_logs(
    dir: &Path,
    vs_prev: &[u64],
    vs_bg: &[u64],
    params: &SequenceParams,
) -> std::io::Result<()> {
    let band = format!("{}-{}", params.min_intensity, params.max_intensity);
    fs::write(
        dir.join(COUNTS_VS_PREV_FILE),
        render_counts(&format!("Pixel Count ({} vs Previous Frame)", band), vs_prev),
    )?;
    fs::write(
        dir.join(COUNTS_VS_BG_FILE),
        render_counts(&format!("Pixel Count ({} vs Background)", band), vs_bg),
    )
}

fn render_counts(column: &str, counts: &[u64]) -> String {
    let mut out = format!("Frame Number,{}\n", column);
    for (i, count) in counts.iter().enumerate() {
        // 差分从第 2 帧开始
        let _ = writeln!(out, "{},{}", i + 2, count);
    }
    out
}

fn band_count(a: &[u8], b: &[u8], min: u8, max: u8) -> u64 {
    a.iter()
        .zip(b)
        .filter(|&(&x, &y)| {
            let d = x.abs_diff(y);
            d >= min && d <= max
        })
        .count() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(value: u8, sequence: u64) -> Frame {
        Frame::gray(120, 120, vec![value; 120 * 120], sequence).unwrap()
    }

    /// 底色 100，前 `changed` 个像素为 150
    fn patched(changed: usize, sequence: u64) -> Frame {
        let mut data = vec![100u8; 120 * 120];
        data[..changed].iter_mut().for_each(|v| *v = 150);
        Frame::gray(120, 120, data, sequence).unwrap()
    }

    fn classify(frames: Vec<Frame>) -> ClassificationVerdict {
        let sequence = FrameSequence::new(frames).unwrap();
        SequenceClassifier::new().classify(&sequence)
    }

    #[test]
    fn test_small_offset_is_nothing() {
        let verdict = classify(vec![uniform(100, 0), uniform(110, 1), uniform(95, 2)]);

        assert_eq!(verdict.class, EventClass::Nothing);
        assert_eq!(
            verdict.counts,
            DiagnosticCounts::Sequence {
                vs_prev: vec![0, 0],
                vs_bg: vec![0, 0]
            }
        );
    }

    #[test]
    fn test_moderate_change_is_injection() {
        let verdict = classify(vec![uniform(100, 0), patched(50, 1), patched(50, 2), uniform(100, 3)]);

        assert_eq!(verdict.class, EventClass::Injection);
        assert_eq!(
            verdict.counts,
            DiagnosticCounts::Sequence {
                vs_prev: vec![50, 0, 50],
                vs_bg: vec![50, 50, 0]
            }
        );
    }

    #[test]
    fn test_large_change_is_burn_wherever_it_appears() {
        let early = classify(vec![uniform(100, 0), patched(12000, 1), patched(50, 2)]);
        assert_eq!(early.class, EventClass::Burn);

        let late = classify(vec![uniform(100, 0), patched(50, 1), patched(12000, 2)]);
        assert_eq!(late.class, EventClass::Burn);
    }

    #[test]
    fn test_saturated_difference_outside_band() {
        // 250 - 0 超过 max_intensity，不计入
        let verdict = classify(vec![uniform(0, 0), uniform(250, 1)]);
        assert_eq!(verdict.class, EventClass::Nothing);
    }

    #[test]
    fn test_only_first_frames_checked() {
        let params = SequenceParams {
            max_frames_to_check: 2,
            ..Default::default()
        };
        assert_eq!(detect_conditions(&[0, 0, 20000], &params), EventClass::Nothing);
        assert_eq!(detect_conditions(&[0, 40, 20000], &params), EventClass::Injection);
        assert_eq!(detect_conditions(&[], &params), EventClass::Unknown);
    }

    #[test]
    fn test_threshold_edges() {
        let params = SequenceParams::default();
        assert_eq!(detect_conditions(&[34], &params), EventClass::Nothing);
        assert_eq!(detect_conditions(&[35], &params), EventClass::Injection);
        assert_eq!(detect_conditions(&[10000], &params), EventClass::Injection);
        assert_eq!(detect_conditions(&[10001], &params), EventClass::Burn);
    }

    #[test]
    fn test_sequence_rejects_out_of_order() {
        let err = FrameSequence::new(vec![uniform(0, 3), uniform(0, 2)]).unwrap_err();
        assert!(matches!(err, ImagingError::OutOfOrder { previous: 3, next: 2 }));

        let err = FrameSequence::new(vec![uniform(0, 1), uniform(0, 1)]).unwrap_err();
        assert!(matches!(err, ImagingError::OutOfOrder { .. }));
    }

    #[test]
    fn test_sequence_rejects_size_mismatch_and_short_input() {
        let small = Frame::gray(10, 10, vec![0; 100], 1).unwrap();
        let err = FrameSequence::new(vec![uniform(0, 0), small]).unwrap_err();
        assert!(matches!(err, ImagingError::SizeMismatch { sequence: 1, .. }));

        let err = FrameSequence::new(vec![uniform(0, 0)]).unwrap_err();
        assert!(matches!(err, ImagingError::InsufficientFrames(1)));
    }

    #[test]
    fn test_analyze_directory() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = SequenceClassifier::new();

        let empty = classifier.analyze_directory(dir.path()).unwrap();
        assert_eq!(empty.class, EventClass::Unknown);

        uniform(100, 0).save(&dir.path().join("image_0000_20250101_000000.png")).unwrap();
        let single = classifier.analyze_directory(dir.path()).unwrap();
        assert_eq!(single.class, EventClass::Unknown);

        patched(50, 1).save(&dir.path().join("image_0001_20250101_000002.png")).unwrap();
        let verdict = classifier.analyze_directory(dir.path()).unwrap();
        assert_eq!(verdict.class, EventClass::Injection);
    }

    #[test]
    fn test_count_log_format() {
        let dir = tempfile::tempdir().unwrap();
        write_count_logs(dir.path(), &[5, 60], &[5, 70], &SequenceParams::default()).unwrap();

        let prev = fs::read_to_string(dir.path().join(COUNTS_VS_PREV_FILE)).unwrap();
        assert_eq!(prev, "Frame Number,Pixel Count (20-170 vs Previous Frame)\n2,5\n3,60\n");

        let bg = fs::read_to_string(dir.path().join(COUNTS_VS_BG_FILE)).unwrap();
        assert_eq!(bg, "Frame Number,Pixel Count (20-170 vs Background)\n2,5\n3,70\n");
    }

    #[test]
    fn test_analyze_directory_writes_count_logs() {
        let dir = tempfile::tempdir().unwrap();
        let classifier = SequenceClassifier::new();
        uniform(100, 0).save(&dir.path().join("image_0000_20250101_000000.png")).unwrap();
        patched(50, 1).save(&dir.path().join("image_0001_20250101_000002.png")).unwrap();

        let verdict = classifier.analyze_directory(dir.path()).unwrap();
        classifier.flush_logs();

        assert_eq!(verdict.class, EventClass::Injection);
        let prev = fs::read_to_string(dir.path().join(COUNTS_VS_PREV_FILE)).unwrap();
        assert_eq!(prev, "Frame Number,Pixel Count (20-170 vs Previous Frame)\n2,50\n");
        let bg = fs::read_to_string(dir.path().join(COUNTS_VS_BG_FILE)).unwrap();
        assert_eq!(bg, "Frame Number,Pixel Count (20-170 vs Background)\n2,50\n");
    }

    #[test]
    fn test_count_log_failure_keeps_verdict() {
        let dir = tempfile::tempdir().unwrap();
        // 日志文件名被目录占用，写入必然失败
        fs::create_dir(dir.path().join(COUNTS_VS_PREV_FILE)).unwrap();
        uniform(100, 0).save(&dir.path().join("image_0000_20250101_000000.png")).unwrap();
        patched(12000, 1).save(&dir.path().join("image_0001_20250101_000002.png")).unwrap();

        let classifier = SequenceClassifier::new();
        let verdict = classifier.analyze_directory(dir.path()).unwrap();
        classifier.flush_logs();

        assert_eq!(verdict.class, EventClass::Burn);
        assert!(dir.path().join(COUNTS_VS_PREV_FILE).is_dir());
        assert!(!dir.path().join(COUNTS_VS_BG_FILE).exists());
    }

    #[test]
    fn test_analyze_files_ignores_other_frames() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("image_0000_20250101_000000.png");
        uniform(90, 0).save(&old).unwrap();
        let first = dir.path().join("image_0001_20250101_000002.png");
        uniform(150, 1).save(&first).unwrap();
        let second = dir.path().join("image_0002_20250101_000004.png");
        uniform(150, 2).save(&second).unwrap();

        let classifier = SequenceClassifier::new();
        // 90 -> 150 整幅变化，按整个目录算会误判为 Burn
        let whole = classifier.analyze_directory(dir.path()).unwrap();
        assert_eq!(whole.class, EventClass::Burn);

        let fresh = classifier.analyze_files(dir.path(), &[(1, first), (2, second)]).unwrap();
        assert_eq!(fresh.class, EventClass::Nothing);
    }
}
