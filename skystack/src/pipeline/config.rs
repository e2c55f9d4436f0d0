//! Run parameters for the whole pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::registration::Config as RegistrationConfig;
use crate::stacking::{CombineMethod, Config as StackingConfig};
use crate::star_detection::Config as StarDetectionConfig;

/// A parameter outside its valid range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid parameter '{name}': {reason}")]
pub struct InvalidParameter {
    pub name: &'static str,
    pub reason: String,
}

impl InvalidParameter {
    pub fn new(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            reason: reason.into(),
        }
    }
}

/// Parameters of one stacking run, grouped by stage.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub detection: StarDetectionConfig,
    pub registration: RegistrationConfig,
    pub stacking: StackingConfig,
}

impl Parameters {
    pub fn with_method(mut self, method: CombineMethod) -> Self {
        self.stacking.method = method;
        self
    }

    pub fn validate(&self) -> Result<(), InvalidParameter> {
        self.detection.validate()?;
        self.registration.validate()?;
        self.stacking.validate()
    }
}
