//! FHIR `Parameters`: the response container returned to the notification sender.

use crate::bundle::Bundle;
use crate::outcome::OperationOutcome;
use crate::{FhirError, FhirResult};
use serde::{Deserialize, Serialize};

/// A resource carried in a named parameter slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterResource {
    Bundle(Box<Bundle>),
    OperationOutcome(OperationOutcome),
}

/// A single named parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub resource: ParameterResource,
}

/// An ordered list of named parameters.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "ParametersWire", try_from = "ParametersWire")]
pub struct Parameters {
    pub parameter: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, resource: ParameterResource) -> Self {
        self.parameter.push(Parameter {
            name: name.into(),
            resource,
        });
        self
    }

    /// Resource stored under `name`, if any.
    pub fn get(&self, name: &str) -> Option<&ParameterResource> {
        self.parameter
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.resource)
    }

    pub fn bundle(&self, name: &str) -> Option<&Bundle> {
        match self.get(name)? {
            ParameterResource::Bundle(bundle) => Some(bundle),
            ParameterResource::OperationOutcome(_) => None,
        }
    }

    pub fn outcome(&self, name: &str) -> Option<&OperationOutcome> {
        match self.get(name)? {
            ParameterResource::OperationOutcome(outcome) => Some(outcome),
            ParameterResource::Bundle(_) => None,
        }
    }

    pub fn render(&self) -> FhirResult<String> {
        serde_json::to_string(self)
            .map_err(|e| FhirError::Translation(format!("Failed to serialise parameters: {e}")))
    }
}

#[derive(Serialize, Deserialize)]
struct ParametersWire {
    #[serde(rename = "resourceType")]
    resource_type: String,

    #[serde(default)]
    parameter: Vec<Parameter>,
}

impl From<Parameters> for ParametersWire {
    fn from(parameters: Parameters) -> Self {
        Self {
            resource_type: "Parameters".into(),
            parameter: parameters.parameter,
        }
    }
}

impl TryFrom<ParametersWire> for Parameters {
    type Error = FhirError;

    fn try_from(wire: ParametersWire) -> Result<Self, Self::Error> {
        if wire.resource_type != "Parameters" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Parameters', got '{}'",
                wire.resource_type
            )));
        }
        Ok(Self {
            parameter: wire.parameter,
        })
    }
}
