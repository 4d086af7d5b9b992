use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::affinity::projection::ProjectionExportError;
use crate::workflows::affinity::{
    PersistenceError, ProfileServiceError, SamplingError, SessionError, StrategyLoadError,
};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Json(serde_json::Error),
    Server(axum::Error),
    Strategy(StrategyLoadError),
    Session(SessionError),
    Sampling(SamplingError),
    Persistence(PersistenceError),
    Export(ProjectionExportError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Json(err) => write!(f, "invalid json input: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Strategy(err) => write!(f, "strategy error: {}", err),
            AppError::Session(err) => write!(f, "session error: {}", err),
            AppError::Sampling(err) => write!(f, "sampling error: {}", err),
            AppError::Persistence(err) => write!(f, "persistence error: {}", err),
            AppError::Export(err) => write!(f, "export error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Json(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Strategy(err) => Some(err),
            AppError::Session(err) => Some(err),
            AppError::Sampling(err) => Some(err),
            AppError::Persistence(err) => Some(err),
            AppError::Export(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Strategy(StrategyLoadError::UnknownKey(_)) => StatusCode::NOT_FOUND,
            AppError::Strategy(StrategyLoadError::Io { .. })
            | AppError::Persistence(PersistenceError::Io { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Strategy(_)
            | AppError::Json(_)
            | AppError::Session(_)
            | AppError::Sampling(_)
            | AppError::Persistence(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_)
            | AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<StrategyLoadError> for AppError {
    fn from(value: StrategyLoadError) -> Self {
        Self::Strategy(value)
    }
}

impl From<SessionError> for AppError {
    fn from(value: SessionError) -> Self {
        Self::Session(value)
    }
}

impl From<SamplingError> for AppError {
    fn from(value: SamplingError) -> Self {
        Self::Sampling(value)
    }
}

impl From<PersistenceError> for AppError {
    fn from(value: PersistenceError) -> Self {
        Self::Persistence(value)
    }
}

impl From<ProfileServiceError> for AppError {
    fn from(value: ProfileServiceError) -> Self {
        match value {
            ProfileServiceError::Strategy(err)
            | ProfileServiceError::Report(PersistenceError::Strategy(err)) => Self::Strategy(err),
            ProfileServiceError::Report(err) => Self::Persistence(err),
        }
    }
}

impl From<ProjectionExportError> for AppError {
    fn from(value: ProjectionExportError) -> Self {
        Self::Export(value)
    }
}
