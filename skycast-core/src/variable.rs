use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metadata for one meteorological variable tracked by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    /// Canonical name, e.g. "temperature".
    pub name: String,
    /// Parameter string understood by the upstream provider, e.g. "t_2m:C".
    pub upstream_param: String,
    pub unit: String,
    pub description: String,
}

impl VariableDefinition {
    pub fn new(name: &str, upstream_param: &str, unit: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            upstream_param: upstream_param.to_string(),
            unit: unit.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Variable '{0}' is not registered")]
    NotFound(String),
}

/// Read-only catalog of supported variables.
///
/// Iteration order is the insertion order, so every consumer sees the
/// variables in the same sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableRegistry {
    variables: Vec<VariableDefinition>,
}

impl VariableRegistry {
    /// Build a registry from explicit entries. Later duplicates of a name are ignored.
    pub fn new(entries: impl IntoIterator<Item = VariableDefinition>) -> Self {
        let mut variables: Vec<VariableDefinition> = Vec::new();
        for entry in entries {
            if !variables.iter().any(|v| v.name == entry.name) {
                variables.push(entry);
            }
        }
        Self { variables }
    }

    /// The four variables the forecasting service ships with.
    pub fn builtin() -> Self {
        Self::new([
            VariableDefinition::new("temperature", "t_2m:C", "°C", "Temperatura a 2m"),
            VariableDefinition::new(
                "humidity",
                "relative_humidity_2m:p",
                "%",
                "Humedad relativa a 2m",
            ),
            VariableDefinition::new(
                "wind_speed",
                "wind_speed_10m:ms",
                "m/s",
                "Velocidad del viento a 10m",
            ),
            VariableDefinition::new(
                "precipitation",
                "precip_1h:mm",
                "mm/h",
                "Precipitación por hora",
            ),
        ])
    }

    pub fn lookup(&self, name: &str) -> Result<&VariableDefinition, RegistryError> {
        self.variables
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    pub fn all_names(&self) -> impl Iterator<Item = &str> {
        self.variables.iter().map(|v| v.name.as_str())
    }

    pub fn definitions(&self) -> &[VariableDefinition] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

impl Default for VariableRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_names_are_in_stable_order() {
        let registry = VariableRegistry::builtin();
        let names: Vec<&str> = registry.all_names().collect();
        assert_eq!(names, ["temperature", "humidity", "wind_speed", "precipitation"]);
    }

    #[test]
    fn lookup_resolves_upstream_param() {
        let registry = VariableRegistry::builtin();
        let def = registry.lookup("wind_speed").expect("wind_speed is builtin");
        assert_eq!(def.upstream_param, "wind_speed_10m:ms");
        assert_eq!(def.unit, "m/s");
    }

    #[test]
    fn lookup_unknown_is_not_found() {
        let registry = VariableRegistry::builtin();
        let err = registry.lookup("snow_depth").unwrap_err();
        assert_eq!(err, RegistryError::NotFound("snow_depth".into()));
    }

    #[test]
    fn duplicate_names_keep_first_entry() {
        let registry = VariableRegistry::new([
            VariableDefinition::new("temperature", "t_2m:C", "°C", "first"),
            VariableDefinition::new("temperature", "t_2m:F", "°F", "second"),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("temperature").unwrap().description, "first");
    }
}
