use serde::{Deserialize, Serialize};

use crate::variable::VariableRegistry;

/// Health/introspection payload for the forecasting service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    pub version: String,
    pub supported_variables: Vec<String>,
    pub message: String,
}

pub fn service_status(registry: &VariableRegistry) -> ServiceStatus {
    ServiceStatus {
        status: "active".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        supported_variables: registry.all_names().map(str::to_string).collect(),
        message: "SkyCast API funcionando correctamente".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_registered_variables() {
        let status = service_status(&VariableRegistry::builtin());
        assert_eq!(status.status, "active");
        assert_eq!(
            status.supported_variables,
            ["temperature", "humidity", "wind_speed", "precipitation"]
        );
    }
}
