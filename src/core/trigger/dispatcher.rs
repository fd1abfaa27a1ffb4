use super::actuator::{ActuationParams, Actuator, ActuatorKind};
use super::command::{CommandKind, ParamOverrides, TriggerCommand};
use super::error::TriggerError;
use super::params::TriggerConfig;
use crate::core::cancel::CancelToken;
use crate::core::capture::CaptureError;
use crate::core::imaging::ClassificationVerdict;
use crate::core::notify::Messenger;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// 由硬件触发驱动的采集 + 分析会话
pub trait SessionControl: Send + Sync {
    /// 开始采集和实时分析；会话已在运行时再次调用不算错误
    fn start_session(&self) -> Result<(), CaptureError>;
    /// 停止采集，对本次会话的帧做序列分类并发送结果
    /// 没有活动会话时返回 `None`
    fn stop_session(&self) -> Option<ClassificationVerdict>;
    fn is_active(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Started(ActuatorKind),
    /// 确认消息发出期间被 stop/quit 取消，执行器未启动
    Cancelled(ActuatorKind),
    Stopped,
    NothingToStop,
    Quit,
    Unknown,
}

struct PendingAction {
    id: u64,
    /// 自动停止时间，cutter 没有
    deadline: Option<Instant>,
    cancel: CancelToken,
    supervisor: Option<JoinHandle<()>>,
    finishing: bool,
}

struct Inner {
    config: TriggerConfig,
    actuators: HashMap<ActuatorKind, Arc<dyn Actuator>>,
    slots: Mutex<HashMap<ActuatorKind, PendingAction>>,
    session: Option<Arc<dyn SessionControl>>,
    messenger: Messenger,
    quit: CancelToken,
    next_id: AtomicU64,
}

/// 命令分发：每条命令在独立线程执行，每个执行器同一时刻最多一个动作
#[derive(Clone)]
pub struct TriggerDispatcher {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TriggerDispatcher {
    pub fn new(
        config: TriggerConfig,
        messenger: Messenger,
        actuators: HashMap<ActuatorKind, Arc<dyn Actuator>>,
        session: Option<Arc<dyn SessionControl>>,
    ) -> Self {
        info!(
            "🎛️ TriggerDispatcher ready: {} actuator(s), session {}",
            actuators.len(),
            if session.is_some() { "attached" } else { "none" }
        );
        Self {
            inner: Arc::new(Inner {
                config,
                actuators,
                slots: Mutex::new(HashMap::new()),
                session,
                messenger,
                quit: CancelToken::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// 在独立线程解析并执行 `raw`，错误通过 messenger 回报
    pub fn handle(&self, raw: &str) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let command = TriggerCommand::parse(raw);
        thread::spawn(move || {
            if let Err(e) = inner.dispatch(command) {
                error!("❌ Command failed: {}", e);
                inner.messenger.send_text(&e.to_string());
            }
        })
    }

    pub fn dispatch(&self, command: TriggerCommand) -> Result<DispatchOutcome, TriggerError> {
        self.inner.dispatch(command)
    }

    pub fn quit_requested(&self) -> bool {
        self.inner.quit.is_cancelled()
    }

    /// 有动作在进行中的执行器
    pub fn pending(&self) -> Vec<ActuatorKind> {
        lock(&self.inner.slots).keys().copied().collect()
    }

    /// `kind` 的动作距自动停止的剩余时间
    pub fn time_left(&self, kind: ActuatorKind) -> Option<Duration> {
        lock(&self.inner.slots)
            .get(&kind)
            .and_then(|p| p.deadline)
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// 等待所有动作结束，超时返回 `false`
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if lock(&self.inner.slots).is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl Inner {
    fn dispatch(self: &Arc<Self>, command: TriggerCommand) -> Result<DispatchOutcome, TriggerError> {
        debug!("Dispatching {:?}", command);
        match command.kind {
            CommandKind::CurrentInjection => self.start_action(ActuatorKind::Injection, &command.overrides),
            CommandKind::Burn => self.start_action(ActuatorKind::Burn, &command.overrides),
            CommandKind::Cutter => self.start_action(ActuatorKind::Cutter, &command.overrides),
            CommandKind::Stop => Ok(self.stop()),
            CommandKind::Quit => {
                info!("👋 Quit requested");
                self.messenger.send_template(&self.messenger.templates().quit);
                self.cancel_all();
                self.finish_session();
                self.quit.cancel();
                Ok(DispatchOutcome::Quit)
            }
            CommandKind::Unknown(text) => {
                warn!("⚠️ Unknown command: {:?}", text);
                self.messenger.send_template(&self.messenger.templates().unknown);
                Ok(DispatchOutcome::Unknown)
            }
        }
    }

    fn received_template(&self, kind: ActuatorKind) -> &str {
        let templates = self.messenger.templates();
        match kind {
            ActuatorKind::Injection => &templates.received_injection,
            ActuatorKind::Burn => &templates.received_burn,
            ActuatorKind::Cutter => &templates.received_cutter,
        }
    }

    fn start_action(
        self: &Arc<Self>,
        kind: ActuatorKind,
        overrides: &ParamOverrides,
    ) -> Result<DispatchOutcome, TriggerError> {
        let params = self.config.resolve(kind, overrides)?;
        let actuator = self
            .actuators
            .get(&kind)
            .cloned()
            .ok_or(TriggerError::ActuatorMissing(kind))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancelToken::new();

        // 先占位再放锁：确认消息和会话启动期间 stop 可以取消这个动作
        {
            let mut slots = lock(&self.slots);
            if slots.contains_key(&kind) {
                return Err(TriggerError::ActuatorBusy(kind));
            }
            slots.insert(
                kind,
                PendingAction {
                    id,
                    deadline: None,
                    cancel: cancel.clone(),
                    supervisor: None,
                    finishing: false,
                },
            );
        }

        self.messenger.send_template(self.received_template(kind));
        if cancel.is_cancelled() {
            info!("🛑 {} cancelled before launch (action #{})", kind, id);
            self.release(kind, id);
            return Ok(DispatchOutcome::Cancelled(kind));
        }

        let with_session = kind != ActuatorKind::Cutter;
        if with_session {
            if let Some(session) = &self.session {
                if let Err(e) = session.start_session() {
                    warn!("⚠️ Capture session did not start: {}", e);
                }
            }
        }

        let limit = with_session.then(|| self.config.analysis_duration());
        let supervisor = match self.launch(kind, id, params, actuator, cancel.clone(), limit) {
            Ok(handle) => handle,
            Err(e) => {
                cancel.cancel();
                self.release(kind, id);
                if with_session {
                    self.finish_session();
                }
                return Err(e.into());
            }
        };

        let orphan = {
            let mut slots = lock(&self.slots);
            match slots.get_mut(&kind).filter(|p| p.id == id) {
                Some(pending) => {
                    pending.deadline = limit.map(|limit| Instant::now() + limit);
                    pending.supervisor = Some(supervisor);
                    None
                }
                // 占位期间被 stop 取消，supervisor 已自行收尾
                None => Some(supervisor),
            }
        };
        if let Some(handle) = orphan {
            if handle.join().is_err() {
                error!("❌ {} supervisor panicked", kind);
            }
        }

        info!("🚀 {} started (action #{})", kind, id);
        Ok(DispatchOutcome::Started(kind))
    }

    /// 启动执行器线程和计时/收尾线程，返回后者的句柄
    fn launch(
        self: &Arc<Self>,
        kind: ActuatorKind,
        id: u64,
        params: ActuationParams,
        actuator: Arc<dyn Actuator>,
        cancel: CancelToken,
        limit: Option<Duration>,
    ) -> std::io::Result<JoinHandle<()>> {
        let worker = {
            let inner = Arc::clone(self);
            let actuator = Arc::clone(&actuator);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(format!("{}-actuator", kind))
                .spawn(move || {
                    match actuator.start(&params, &cancel) {
                        Ok(()) => debug!("{} actuator finished", kind),
                        Err(e) => {
                            error!("❌ {} actuator failed: {}", kind, e);
                            inner.messenger.send_text(&format!("{} failed: {}", kind, e));
                            cancel.cancel();
                        }
                    }
                    // cutter 没有计时器，硬件结束即动作结束
                    if kind == ActuatorKind::Cutter {
                        cancel.cancel();
                    }
                })?
        };

        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("{}-timer", kind))
            .spawn({
                let cancel = cancel.clone();
                let actuator = Arc::clone(&actuator);
                move || inner.supervise(kind, id, limit, cancel, actuator, worker)
            });
        if spawned.is_err() {
            // worker 已经在跑，只能通过取消让它退出
            cancel.cancel();
            if let Err(e) = actuator.stop() {
                warn!("⚠️ Failed to stop {}: {}", kind, e);
            }
        }
        spawned
    }

    fn release(&self, kind: ActuatorKind, id: u64) {
        let mut slots = lock(&self.slots);
        if slots.get(&kind).map_or(false, |p| p.id == id) {
            slots.remove(&kind);
        }
    }

    /// 等到时限或 stop 请求，然后拆除动作
    fn supervise(
        &self,
        kind: ActuatorKind,
        id: u64,
        limit: Option<Duration>,
        cancel: CancelToken,
        actuator: Arc<dyn Actuator>,
        worker: JoinHandle<()>,
    ) {
        let poll = self.config.stop_poll();
        match limit {
            Some(limit) => {
                if !cancel.sleep(limit, poll) {
                    info!("⏰ {} analysis window elapsed", kind);
                }
            }
            None => while !cancel.sleep(poll, poll) {},
        }

        cancel.cancel();
        if let Err(e) = actuator.stop() {
            warn!("⚠️ Failed to stop {}: {}", kind, e);
        }
        if worker.join().is_err() {
            error!("❌ {} actuator thread panicked", kind);
        }

        // 会话收尾前槽位保持占用
        let others_need_session = {
            let mut slots = lock(&self.slots);
            if let Some(pending) = slots.get_mut(&kind).filter(|p| p.id == id) {
                pending.finishing = true;
            }
            slots
                .iter()
                .any(|(k, p)| *k != ActuatorKind::Cutter && !p.finishing)
        };

        if limit.is_some() && !others_need_session {
            self.finish_session();
        }

        self.release(kind, id);
        debug!("{} action #{} finished", kind, id);
    }

    fn stop(&self) -> DispatchOutcome {
        let pending = !lock(&self.slots).is_empty();
        let active = self.session.as_ref().map_or(false, |s| s.is_active());

        if !pending && !active {
            info!("🤷 Stop requested with nothing running");
            self.messenger.send_template(&self.messenger.templates().stop_nothing);
            return DispatchOutcome::NothingToStop;
        }

        info!("🛑 Stop requested");
        self.messenger.send_template(&self.messenger.templates().stop_ok);
        self.cancel_all();
        self.finish_session();
        DispatchOutcome::Stopped
    }

    /// 取消所有动作并等待其 supervisor 退出
    /// supervisor 自己也要拿槽位锁，所以先收集句柄再 join
    fn cancel_all(&self) {
        let handles: Vec<_> = {
            let mut slots = lock(&self.slots);
            slots
                .values_mut()
                .map(|pending| {
                    pending.cancel.cancel();
                    pending.supervisor.take()
                })
                .collect()
        };

        for handle in handles.into_iter().flatten() {
            if handle.join().is_err() {
                error!("❌ Action supervisor panicked");
            }
        }
    }

    fn finish_session(&self) {
        if let Some(verdict) = self.session.as_ref().and_then(|s| s.stop_session()) {
            info!("📊 Session result: {}", verdict.class.label());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::imaging::{DiagnosticCounts, EventClass};
    use crate::core::notify::notifier::testing::RecordingNotifier;
    use crate::core::notify::NotifyConfig;
    use crate::core::notify::{Notifier, NotifyError};
    use crate::core::trigger::ActuatorError;
    use std::sync::atomic::{AtomicBool, AtomicUsize};

    #[derive(Default)]
    struct MockActuator {
        started: Mutex<Vec<ActuationParams>>,
        stops: AtomicUsize,
        released: CancelToken,
        failing: bool,
        /// 忽略 stop()，只能靠取消令牌结束
        ignores_stop: bool,
    }

    impl Actuator for MockActuator {
        fn start(&self, params: &ActuationParams, cancel: &CancelToken) -> Result<(), ActuatorError> {
            self.started.lock().unwrap().push(params.clone());
            if self.failing {
                return Err(ActuatorError::PortUnavailable(params.port.clone()));
            }
            let deadline = Instant::now() + Duration::from_secs(30);
            while !self.released.is_cancelled() && !cancel.is_cancelled() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(2));
            }
            Ok(())
        }

        fn stop(&self) -> Result<(), ActuatorError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if !self.ignores_stop {
                self.released.cancel();
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockSession {
        active: AtomicBool,
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl SessionControl for MockSession {
        fn start_session(&self) -> Result<(), CaptureError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.active.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop_session(&self) -> Option<ClassificationVerdict> {
            if !self.active.swap(false, Ordering::SeqCst) {
                return None;
            }
            self.stops.fetch_add(1, Ordering::SeqCst);
            Some(ClassificationVerdict {
                class: EventClass::Burn,
                counts: DiagnosticCounts::Sequence {
                    vs_prev: vec![],
                    vs_bg: vec![],
                },
            })
        }

        fn is_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }
    }

    /// 发送 burn 确认时阻塞，模拟慢速通道
    #[derive(Default)]
    struct SlowNotifier {
        entered: AtomicBool,
        sent: Mutex<Vec<String>>,
    }

    impl Notifier for SlowNotifier {
        fn send(&self, message: &str, _recipient: &str) -> Result<(), NotifyError> {
            if message == NotifyConfig::default().templates.received_burn {
                self.entered.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(500));
            }
            self.sent.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    struct Fixture {
        dispatcher: TriggerDispatcher,
        notifier: Arc<RecordingNotifier>,
        session: Arc<MockSession>,
        actuator: Arc<MockActuator>,
    }

    fn fixture(config: TriggerConfig, actuator: MockActuator) -> Fixture {
        let notifier = Arc::new(RecordingNotifier::default());
        let session = Arc::new(MockSession::default());
        let actuator = Arc::new(actuator);
        let messenger = Messenger::new(notifier.clone(), &NotifyConfig::default());

        let mut actuators: HashMap<ActuatorKind, Arc<dyn Actuator>> = HashMap::new();
        for kind in [ActuatorKind::Injection, ActuatorKind::Burn, ActuatorKind::Cutter] {
            actuators.insert(kind, actuator.clone());
        }
        let dispatcher = TriggerDispatcher::new(config, messenger, actuators, Some(session.clone()));

        Fixture {
            dispatcher,
            notifier,
            session,
            actuator,
        }
    }

    fn configured(analysis_duration: f64) -> TriggerConfig {
        TriggerConfig {
            injection_duration: Some(30.0),
            injection_amplitude: Some(4e-5),
            injection_port: Some("COM4".into()),
            burn_duration: Some(10.0),
            burn_port: Some("COM3".into()),
            analysis_duration,
            stop_poll_ms: 5,
            ..Default::default()
        }
    }

    fn wait_for(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_burn_without_duration_spawns_nothing() {
        let fx = fixture(TriggerConfig::default(), MockActuator::default());

        let result = fx.dispatcher.dispatch(TriggerCommand::parse("burn"));
        assert!(matches!(
            result,
            Err(TriggerError::ParametersNotSet {
                action: ActuatorKind::Burn,
                ..
            })
        ));
        assert!(fx.dispatcher.pending().is_empty());
        assert_eq!(fx.session.starts.load(Ordering::SeqCst), 0);
        assert!(fx.notifier.messages().is_empty());
    }

    #[test]
    fn test_handle_reports_errors() {
        let fx = fixture(TriggerConfig::default(), MockActuator::default());

        fx.dispatcher.handle("burn").join().unwrap();
        let messages = fx.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("burnDuration"));
    }

    #[test]
    fn test_stop_with_nothing_active() {
        let fx = fixture(TriggerConfig::default(), MockActuator::default());

        let outcome = fx.dispatcher.dispatch(TriggerCommand::parse("stop")).unwrap();
        assert_eq!(outcome, DispatchOutcome::NothingToStop);
        assert_eq!(
            fx.notifier.messages(),
            vec![NotifyConfig::default().templates.stop_nothing]
        );
    }

    #[test]
    fn test_injection_then_stop() {
        let fx = fixture(configured(60.0), MockActuator::default());
        let templates = NotifyConfig::default().templates;

        let outcome = fx.dispatcher.dispatch(TriggerCommand::parse("1")).unwrap();
        assert_eq!(outcome, DispatchOutcome::Started(ActuatorKind::Injection));
        assert_eq!(fx.dispatcher.pending(), vec![ActuatorKind::Injection]);
        let left = fx.dispatcher.time_left(ActuatorKind::Injection).unwrap();
        assert!(left > Duration::from_secs(50) && left <= Duration::from_secs(60));
        assert!(fx.session.is_active());
        assert!(wait_for(|| fx.actuator.started.lock().unwrap().len() == 1));

        let outcome = fx.dispatcher.dispatch(TriggerCommand::parse("stop")).unwrap();
        assert_eq!(outcome, DispatchOutcome::Stopped);
        assert!(fx.dispatcher.wait_idle(Duration::from_secs(2)));

        assert!(!fx.session.is_active());
        assert_eq!(fx.session.stops.load(Ordering::SeqCst), 1);
        assert!(fx.actuator.stops.load(Ordering::SeqCst) >= 1);
        assert_eq!(
            fx.notifier.messages(),
            vec![templates.received_injection, templates.stop_ok]
        );
    }

    #[test]
    fn test_analysis_window_auto_stops() {
        let fx = fixture(configured(0.05), MockActuator::default());

        fx.dispatcher.dispatch(TriggerCommand::parse("burn")).unwrap();
        assert!(fx.dispatcher.wait_idle(Duration::from_secs(2)));

        assert_eq!(fx.session.starts.load(Ordering::SeqCst), 1);
        assert_eq!(fx.session.stops.load(Ordering::SeqCst), 1);
        assert_eq!(fx.actuator.stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_start_is_busy() {
        let fx = fixture(configured(60.0), MockActuator::default());

        fx.dispatcher.dispatch(TriggerCommand::parse("burn")).unwrap();
        let second = fx.dispatcher.dispatch(TriggerCommand::parse("burn"));
        assert!(matches!(second, Err(TriggerError::ActuatorBusy(ActuatorKind::Burn))));

        fx.dispatcher.dispatch(TriggerCommand::parse("stop")).unwrap();
        assert!(fx.dispatcher.wait_idle(Duration::from_secs(2)));
    }

    #[test]
    fn test_unknown_sends_fallback() {
        let fx = fixture(TriggerConfig::default(), MockActuator::default());

        let outcome = fx.dispatcher.dispatch(TriggerCommand::parse("dance")).unwrap();
        assert_eq!(outcome, DispatchOutcome::Unknown);
        assert_eq!(fx.notifier.messages(), vec![NotifyConfig::default().templates.unknown]);
        assert!(fx.actuator.started.lock().unwrap().is_empty());
    }

    #[test]
    fn test_quit_cancels_and_raises_flag() {
        let fx = fixture(configured(60.0), MockActuator::default());

        fx.dispatcher.dispatch(TriggerCommand::parse("current injection")).unwrap();
        let outcome = fx.dispatcher.dispatch(TriggerCommand::parse("q")).unwrap();

        assert_eq!(outcome, DispatchOutcome::Quit);
        assert!(fx.dispatcher.quit_requested());
        assert!(fx.dispatcher.wait_idle(Duration::from_secs(2)));
        assert!(!fx.session.is_active());
        assert!(fx
            .notifier
            .messages()
            .contains(&NotifyConfig::default().templates.quit));
    }

    #[test]
    fn test_inline_overrides_reach_actuator() {
        let fx = fixture(TriggerConfig::default(), MockActuator::default());

        fx.dispatcher
            .dispatch(TriggerCommand::parse("burn duration=3 port=COM7"))
            .unwrap();
        assert!(wait_for(|| fx.actuator.started.lock().unwrap().len() == 1));

        let params = fx.actuator.started.lock().unwrap()[0].clone();
        assert_eq!(params.port, "COM7");
        assert_eq!(params.duration, Duration::from_secs(3));

        fx.dispatcher.dispatch(TriggerCommand::parse("stop")).unwrap();
        assert!(fx.dispatcher.wait_idle(Duration::from_secs(2)));
    }

    #[test]
    fn test_actuator_failure_is_reported_once() {
        let failing = MockActuator {
            failing: true,
            ..Default::default()
        };
        let fx = fixture(configured(60.0), failing);

        fx.dispatcher.dispatch(TriggerCommand::parse("burn")).unwrap();
        assert!(fx.dispatcher.wait_idle(Duration::from_secs(2)));

        let failures: Vec<_> = fx
            .notifier
            .messages()
            .into_iter()
            .filter(|m| m.contains("failed"))
            .collect();
        assert_eq!(failures, vec!["burn failed: Port unavailable: COM3".to_string()]);
        assert_eq!(fx.actuator.started.lock().unwrap().len(), 1);
        assert!(!fx.session.is_active());
    }

    #[test]
    fn test_cutter_runs_without_session() {
        let fx = fixture(TriggerConfig::default(), MockActuator::default());

        let outcome = fx.dispatcher.dispatch(TriggerCommand::parse("cutter")).unwrap();
        assert_eq!(outcome, DispatchOutcome::Started(ActuatorKind::Cutter));
        assert_eq!(fx.session.starts.load(Ordering::SeqCst), 0);
        assert_eq!(fx.dispatcher.time_left(ActuatorKind::Cutter), None);

        fx.actuator.released.cancel();
        assert!(fx.dispatcher.wait_idle(Duration::from_secs(2)));
    }

    #[test]
    fn test_stop_is_not_blocked_by_acknowledgement() {
        let notifier = Arc::new(SlowNotifier::default());
        let session = Arc::new(MockSession::default());
        let actuator = Arc::new(MockActuator::default());
        let messenger = Messenger::new(notifier.clone(), &NotifyConfig::default());
        let mut actuators: HashMap<ActuatorKind, Arc<dyn Actuator>> = HashMap::new();
        actuators.insert(ActuatorKind::Burn, actuator.clone());
        let dispatcher = TriggerDispatcher::new(configured(60.0), messenger, actuators, Some(session.clone()));

        let burn = dispatcher.handle("burn");
        assert!(wait_for(|| notifier.entered.load(Ordering::SeqCst)));

        let start = Instant::now();
        let outcome = dispatcher.dispatch(TriggerCommand::parse("stop")).unwrap();
        assert_eq!(outcome, DispatchOutcome::Stopped);
        assert!(start.elapsed() < Duration::from_millis(400));

        burn.join().unwrap();
        assert!(dispatcher.wait_idle(Duration::from_secs(2)));
        assert!(actuator.started.lock().unwrap().is_empty());
        assert_eq!(session.starts.load(Ordering::SeqCst), 0);
        assert!(!session.is_active());
    }

    #[test]
    fn test_window_end_cancels_actuator_that_ignores_stop() {
        let deaf = MockActuator {
            ignores_stop: true,
            ..Default::default()
        };
        let fx = fixture(configured(0.05), deaf);

        let start = Instant::now();
        fx.dispatcher.dispatch(TriggerCommand::parse("burn")).unwrap();
        assert!(fx.dispatcher.wait_idle(Duration::from_secs(2)));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(fx.actuator.stops.load(Ordering::SeqCst), 1);
        assert!(!fx.session.is_active());
    }

    #[test]
    fn test_missing_actuator() {
        let notifier = Arc::new(RecordingNotifier::default());
        let messenger = Messenger::new(notifier, &NotifyConfig::default());
        let dispatcher = TriggerDispatcher::new(configured(1.0), messenger, HashMap::new(), None);

        let result = dispatcher.dispatch(TriggerCommand::parse("burn"));
        assert!(matches!(result, Err(TriggerError::ActuatorMissing(ActuatorKind::Burn))));
    }
}
