pub mod actuator;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod params;

pub use actuator::{ActuationParams, Actuator, ActuatorKind, ProcessActuator};
pub use command::{CommandKind, ParamOverrides, TriggerCommand};
pub use dispatcher::{DispatchOutcome, SessionControl, TriggerDispatcher};
pub use error::{ActuatorError, TriggerError};
pub use params::TriggerConfig;
