use crate::projection::ProjectionError;
use crate::store::{MessageCode, ResultStage};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimulationError {
    #[error("failed to fetch '{name}': {reason}")]
    Fetch { code: MessageCode, name: String, reason: String },
    #[error("could not determine execution order of '{model}'")]
    Dependency { model: String },
    #[error("{0}")]
    Input(String),
    #[error("graph model init failed")]
    InitFailed(String),
    #[error("no valid date range given: {start} - {last}")]
    Range { start: String, last: String },
    #[error("aggregation failed: {0}")]
    Aggregation(String),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

impl SimulationError {
    pub fn stage(&self) -> ResultStage {
        match self {
            SimulationError::Fetch { .. }
            | SimulationError::Dependency { .. }
            | SimulationError::InitFailed(_)
            | SimulationError::Range { .. } => ResultStage::Setup,
            SimulationError::Input(_) | SimulationError::Projection(_) => ResultStage::Simulation,
            SimulationError::Aggregation(_) => ResultStage::Aggregation,
        }
    }

    pub fn code(&self) -> MessageCode {
        match self {
            SimulationError::Fetch { code, .. } => *code,
            SimulationError::Dependency { .. } | SimulationError::InitFailed(_) => MessageCode::ModelInitializationFailed,
            SimulationError::Input(_) => MessageCode::ForecastVariableMissing,
            SimulationError::Range { .. } => MessageCode::InvalidDateRange,
            SimulationError::Aggregation(_) => MessageCode::AggregationFailed,
            SimulationError::Projection(_) => MessageCode::Exception,
        }
    }
}
