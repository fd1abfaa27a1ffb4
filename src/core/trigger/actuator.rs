use super::error::ActuatorError;
use crate::core::cancel::CancelToken;
use log::{debug, info, warn};
use std::fmt;
use std::io::ErrorKind;
use std::process::{Child, Command};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActuatorKind {
    Injection,
    Burn,
    Cutter,
}

impl fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActuatorKind::Injection => "current injection",
            ActuatorKind::Burn => "burn",
            ActuatorKind::Cutter => "cutter",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActuationParams {
    pub port: String,
    pub duration: Duration,
    pub amplitude: Option<f64>,
}

/// 串口仪器。`start` 阻塞直到动作结束、`cancel` 触发或另一线程调用 `stop`
pub trait Actuator: Send + Sync {
    fn start(&self, params: &ActuationParams, cancel: &CancelToken) -> Result<(), ActuatorError>;
    fn stop(&self) -> Result<(), ActuatorError>;
}

#[derive(Debug, Default)]
struct RunState {
    running: bool,
    stop_requested: bool,
}

/// 通过外部程序驱动硬件（串口协议由脚本负责），stop 时结束子进程
pub struct ProcessActuator {
    program: Vec<String>,
    state: Mutex<RunState>,
    poll: Duration,
}

impl ProcessActuator {
    /// `program` 为 argv，`{port}`、`{duration}`、`{amplitude}` 在每次启动时替换
    pub fn new(program: Vec<String>) -> Self {
        Self {
            program,
            state: Mutex::new(RunState::default()),
            poll: Duration::from_millis(50),
        }
    }

    fn argv(&self, params: &ActuationParams) -> Vec<String> {
        let duration = format!("{}", params.duration.as_secs_f64());
        let amplitude = params.amplitude.map(|a| a.to_string()).unwrap_or_default();
        self.program
            .iter()
            .map(|arg| {
                arg.replace("{port}", &params.port)
                    .replace("{duration}", &duration)
                    .replace("{amplitude}", &amplitude)
            })
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn supervise(&self, exe: &str, child: &mut Child, cancel: &CancelToken) -> Result<(), ActuatorError> {
        loop {
            if cancel.is_cancelled() || self.state().stop_requested {
                if let Err(e) = child.kill() {
                    // 进程已退出
                    warn!("⚠️ Actuator process kill: {}", e);
                }
                child.wait()?;
                info!("🛑 Actuator process stopped");
                return Ok(());
            }

            if let Some(status) = child.try_wait()? {
                return if status.success() {
                    debug!("Actuator process finished");
                    Ok(())
                } else {
                    Err(ActuatorError::Failed(format!("{} exited with {}", exe, status)))
                };
            }
            thread::sleep(self.poll);
        }
    }
}

impl Actuator for ProcessActuator {
    fn start(&self, params: &ActuationParams, cancel: &CancelToken) -> Result<(), ActuatorError> {
        let argv = self.argv(params);
        let Some((exe, args)) = argv.split_first() else {
            return Err(ActuatorError::Failed("empty actuator command".into()));
        };
        if cancel.is_cancelled() {
            debug!("Actuator cancelled before launch");
            return Ok(());
        }

        *self.state() = RunState {
            running: true,
            stop_requested: false,
        };

        info!("⚡ Launching actuator: {}", argv.join(" "));
        let result = match Command::new(exe).args(args).spawn() {
            // stop() 可能在 spawn 期间到达，由 supervise 的首轮检查处理
            Ok(mut child) => self.supervise(exe, &mut child, cancel),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ActuatorError::PortUnavailable(format!("{} not found", exe)))
            }
            Err(e) => Err(ActuatorError::Io(e)),
        };

        *self.state() = RunState::default();
        result
    }

    fn stop(&self) -> Result<(), ActuatorError> {
        let mut state = self.state();
        if state.running {
            state.stop_requested = true;
        }
        Ok(())
    }
}
