//! 植物应激监测器 - 采集 + 实时分析 + 触发命令

use crate::core::capture::{Camera, CaptureError, DirectoryClaims};
use crate::core::config::{ConfigError, MonitorConfig};
use crate::core::imaging::{ClassificationVerdict, ThresholdOutcome};
use crate::core::notify::{LogNotifier, Messenger, Notifier, NotifyError, WebhookNotifier};
use crate::core::orchestrator::AnalysisOrchestrator;
use crate::core::trigger::{
    Actuator, ActuatorKind, DispatchOutcome, ProcessActuator, SessionControl, TriggerCommand, TriggerDispatcher,
    TriggerError,
};
use log::info;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

/// 监测器 - 封装分析编排与命令分发
///
/// ```ignore
/// let monitor = AgitationMonitor::from_file(Path::new("watch.json5"))?;
/// monitor.handle_command("burn duration=30").join().ok();
/// ```
pub struct AgitationMonitor {
    orchestrator: Arc<AnalysisOrchestrator>,
    dispatcher: TriggerDispatcher,
}

impl AgitationMonitor {
    pub fn from_file(path: &Path) -> Result<Self, MonitorError> {
        Self::create(MonitorConfig::from_file(path)?, None)
    }

    /// 创建监测器；`camera` 为空时分析外部程序写入目录的帧
    pub fn create(config: MonitorConfig, camera: Option<Arc<dyn Camera>>) -> Result<Self, MonitorError> {
        config.validate()?;

        let notifier: Arc<dyn Notifier> = match &config.notify.webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url)?),
            None => Arc::new(LogNotifier),
        };
        Self::with_notifier(config, camera, notifier)
    }

    pub fn with_notifier(
        config: MonitorConfig,
        camera: Option<Arc<dyn Camera>>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, MonitorError> {
        let messenger = Messenger::new(notifier, &config.notify);

        let mut actuators: HashMap<ActuatorKind, Arc<dyn Actuator>> = HashMap::new();
        for kind in [ActuatorKind::Injection, ActuatorKind::Burn, ActuatorKind::Cutter] {
            if let Some(program) = config.trigger.program(kind) {
                actuators.insert(kind, Arc::new(ProcessActuator::new(program.to_vec())));
            }
        }

        let trigger = config.trigger.clone();
        let orchestrator = Arc::new(AnalysisOrchestrator::new(
            config,
            messenger.clone(),
            camera,
            DirectoryClaims::new(),
        )?);
        let session: Arc<dyn SessionControl> = orchestrator.clone();
        let dispatcher = TriggerDispatcher::new(trigger, messenger, actuators, Some(session));

        info!("🌱 AgitationMonitor: created");
        Ok(Self {
            orchestrator,
            dispatcher,
        })
    }

    /// 异步处理一条文本命令
    pub fn handle_command(&self, text: &str) -> JoinHandle<()> {
        self.dispatcher.handle(text)
    }

    pub fn dispatch(&self, text: &str) -> Result<DispatchOutcome, TriggerError> {
        self.dispatcher.dispatch(TriggerCommand::parse(text))
    }

    pub fn classify_frame(&self, path: &Path) -> Option<ThresholdOutcome> {
        self.orchestrator.on_frame_created(path)
    }

    pub fn analyze_capture(&self) -> ClassificationVerdict {
        self.orchestrator.on_capture_complete(self.orchestrator.directory())
    }

    pub fn start_session(&self) -> Result<(), CaptureError> {
        self.orchestrator.start_session()
    }

    pub fn stop_session(&self) -> Option<ClassificationVerdict> {
        self.orchestrator.stop_session()
    }

    pub fn is_active(&self) -> bool {
        self.orchestrator.is_active()
    }

    pub fn quit_requested(&self) -> bool {
        self.dispatcher.quit_requested()
    }

    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.dispatcher.wait_idle(timeout)
    }
}

impl Drop for AgitationMonitor {
    fn drop(&mut self) {
        info!("🗑️ AgitationMonitor: released");
    }
}
