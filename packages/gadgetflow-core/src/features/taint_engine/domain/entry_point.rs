use crate::shared::models::MethodSignature;
use serde::{Deserialize, Serialize};

/// Method to run a forward analysis from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPoint {
    pub method: MethodSignature,

    /// Formal types whose arguments are attacker-controlled input. Empty
    /// means every non-simple formal is input.
    #[serde(default)]
    pub required_argument_types: Vec<String>,
}

impl EntryPoint {
    pub fn new(method: impl Into<MethodSignature>) -> Self {
        Self {
            method: method.into(),
            required_argument_types: Vec::new(),
        }
    }

    /// Builder: Add a required argument type
    pub fn with_argument_type(mut self, type_name: impl Into<String>) -> Self {
        self.required_argument_types.push(type_name.into());
        self
    }
}
