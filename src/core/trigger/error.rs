use super::actuator::ActuatorKind;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Port unavailable: {0}")]
    PortUnavailable(String),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Actuator failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("Parameters not set for {action}: {missing}")]
    ParametersNotSet { action: ActuatorKind, missing: String },
    #[error("{0} is already running")]
    ActuatorBusy(ActuatorKind),
    #[error("No {0} actuator configured")]
    ActuatorMissing(ActuatorKind),
    #[error("Failed to spawn action thread: {0}")]
    Spawn(#[from] std::io::Error),
}
