//! Attribute schemas for the provider configuration and the session resource.
//!
//! The schema is what the reconciliation driver consults at plan time: which
//! attributes the caller must supply, which are computed by the provider, and
//! which force a destroy-then-create when their value changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Attribute value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    String,
    Int32,
}

impl std::fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Int32 => write!(f, "int32"),
        }
    }
}

/// Plan-time behavior attached to an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanModifier {
    /// A changed value replaces the resource instead of updating it.
    RequiresReplace,
    /// A computed value is carried over from prior state instead of
    /// being shown as unknown in the plan.
    UseStateForUnknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
    pub description: String,
    pub required: bool,
    pub computed: bool,
    pub plan_modifiers: Vec<PlanModifier>,
}

impl Attribute {
    pub fn required(name: &str, kind: AttributeKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: true,
            computed: false,
            plan_modifiers: Vec::new(),
        }
    }

    pub fn computed(name: &str, kind: AttributeKind, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required: false,
            computed: true,
            plan_modifiers: Vec::new(),
        }
    }

    pub fn with_modifier(mut self, modifier: PlanModifier) -> Self {
        if !self.plan_modifiers.contains(&modifier) {
            self.plan_modifiers.push(modifier);
        }
        self
    }

    pub fn has_modifier(&self, modifier: PlanModifier) -> bool {
        self.plan_modifiers.contains(&modifier)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub description: String,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(description: &str, attributes: Vec<Attribute>) -> Self {
        Self {
            description: description.to_string(),
            attributes,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Names of required attributes missing (or null) in `object`.
    pub fn missing_required(&self, object: &Value) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| a.required)
            .filter(|a| object.get(&a.name).map_or(true, Value::is_null))
            .map(|a| a.name.as_str())
            .collect()
    }

    /// Names of `RequiresReplace` attributes whose value differs between
    /// prior state and the planned object.
    pub fn requires_replace(&self, prior: &Value, planned: &Value) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| a.has_modifier(PlanModifier::RequiresReplace))
            .filter(|a| prior.get(&a.name) != planned.get(&a.name))
            .map(|a| a.name.as_str())
            .collect()
    }
}

/// Schema of the provider configuration block.
pub fn provider_schema() -> Schema {
    Schema::new(
        "Doom",
        vec![Attribute::required(
            "path",
            AttributeKind::String,
            "Path to Doom executable",
        )],
    )
}

/// Schema of the `doom_session` resource.
pub fn session_schema() -> Schema {
    Schema::new(
        "Doom Play Session",
        vec![
            Attribute::required(
                "wad",
                AttributeKind::String,
                "WAD file to load, e.g. freedoom1.wad",
            )
            .with_modifier(PlanModifier::RequiresReplace),
            Attribute::computed("pid", AttributeKind::Int32, "Process ID of the Doom session")
                .with_modifier(PlanModifier::UseStateForUnknown),
        ],
    )
}
