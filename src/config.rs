//! Pipeline configuration

use crate::countries::Crs;
use crate::extract::OffsetLayout;
use crate::FlightTrackError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one pipeline run, loadable from a JSON file.
///
/// ```json
/// {
///   "layout": { "time_len": 8, "to_lat": 116, "lat_len": 7, "to_long": 114, "long_len": 8 },
///   "country_column": "NAME",
///   "declared_crs": null
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub layout: OffsetLayout,
    /// Feature property holding the country name
    pub country_column: String,
    /// CRS of the polygon dataset, used only if the dataset declares none
    pub declared_crs: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            layout: OffsetLayout::default(),
            country_column: "NAME".to_string(),
            declared_crs: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, FlightTrackError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, FlightTrackError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), FlightTrackError> {
        if self.country_column.trim().is_empty() {
            return Err(FlightTrackError::ConfigError(
                "country_column must not be empty".to_string(),
            ));
        }
        if self.layout.time_len == 0 || self.layout.lat_len == 0 || self.layout.long_len == 0 {
            return Err(FlightTrackError::ConfigError(
                "field lengths must be at least one character".to_string(),
            ));
        }
        if let Some(name) = &self.declared_crs {
            Crs::from_name(name)?;
        }
        Ok(())
    }
}
