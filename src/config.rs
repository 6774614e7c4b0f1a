use crate::error::{EngineError, Result};

/// Service configuration with environment-variable overrides
#[derive(Debug, Clone)]
pub struct DocflowConfig {
    pub database_url: String,
    pub bind_address: String,
    pub max_connections: u32,
    /// How often the external scheduler is expected to trigger the
    /// escalation sweep
    pub sweep_interval_seconds: u64,
}

impl Default for DocflowConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/docflow_development".to_string(),
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10,
            sweep_interval_seconds: 300,
        }
    }
}

impl DocflowConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            config.database_url = db_url;
        }

        if let Ok(bind) = std::env::var("DOCFLOW_BIND_ADDRESS") {
            config.bind_address = bind;
        }

        if let Ok(max_connections) = std::env::var("DOCFLOW_MAX_CONNECTIONS") {
            config.max_connections = max_connections.parse().map_err(|e| {
                EngineError::validation(format!("Invalid DOCFLOW_MAX_CONNECTIONS: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("DOCFLOW_SWEEP_INTERVAL_SECONDS") {
            config.sweep_interval_seconds = interval.parse().map_err(|e| {
                EngineError::validation(format!("Invalid DOCFLOW_SWEEP_INTERVAL_SECONDS: {e}"))
            })?;
        }

        Ok(config)
    }
}
