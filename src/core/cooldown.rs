use crate::core::imaging::ClassificationVerdict;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq)]
pub enum GateState {
    Armed,
    Cooling { remaining_cycles: u32 },
}

impl GateState {
    pub fn transition(&self, positive: bool, config: &CooldownConfig) -> (GateState, GateAction) {
        match self {
            GateState::Armed => {
                if positive {
                    (Self::cooling(config.cooldown_length), GateAction::Notify)
                } else {
                    (GateState::Armed, GateAction::Idle)
                }
            }

            GateState::Cooling { remaining_cycles } => (
                Self::cooling(remaining_cycles.saturating_sub(1)),
                GateAction::Suppress,
            ),
        }
    }

    fn cooling(remaining_cycles: u32) -> GateState {
        if remaining_cycles == 0 {
            GateState::Armed
        } else {
            GateState::Cooling { remaining_cycles }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateAction {
    Notify,
    /// 冷却中，本次判定被忽略
    Suppress,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CooldownConfig {
    /// 通知之后保持静默的分类周期数
    pub cooldown_length: u32,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self { cooldown_length: 5 }
    }
}

/// 通知冷却：一次阳性通知后，接下来的 cooldown_length 个周期内不再通知
pub struct CooldownGate {
    state: GateState,
    config: CooldownConfig,
    cycle_counter: u64,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self::with_config(CooldownConfig::default())
    }

    pub fn with_config(config: CooldownConfig) -> Self {
        Self {
            state: GateState::Armed,
            config,
            cycle_counter: 0,
        }
    }

    pub fn should_notify(&mut self, verdict: &ClassificationVerdict) -> bool {
        self.process_cycle(verdict.is_positive()) == GateAction::Notify
    }

    /// 推进一个没有判定结果的周期
    pub fn on_cycle(&mut self) {
        self.process_cycle(false);
    }

    pub fn process_cycle(&mut self, positive: bool) -> GateAction {
        self.cycle_counter += 1;

        let (new_state, action) = self.state.transition(positive, &self.config);
        self.state = new_state;

        action
    }

    /// 取消当前冷却，用于触发冷却的通知没有送达的情况
    pub fn rearm(&mut self) {
        self.state = GateState::Armed;
    }

    pub fn remaining(&self) -> u32 {
        match self.state {
            GateState::Armed => 0,
            GateState::Cooling { remaining_cycles } => remaining_cycles,
        }
    }

    pub fn current_state(&self) -> &GateState {
        &self.state
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_counter
    }

    pub fn reset(&mut self) {
        self.state = GateState::Armed;
        self.cycle_counter = 0;
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}
