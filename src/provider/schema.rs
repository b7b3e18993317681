//! Attribute declarations for the provider block and its resources.

use anyhow::{bail, Result};
use std::collections::BTreeMap;

pub type DiffSuppressFn = fn(old: &str, new: &str) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    String,
    Int,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultValue {
    String(&'static str),
    Int(i64),
}

impl DefaultValue {
    fn kind(&self) -> AttributeType {
        match self {
            DefaultValue::String(_) => AttributeType::String,
            DefaultValue::Int(_) => AttributeType::Int,
        }
    }
}

/// Value read from the environment when the attribute is left unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvDefault {
    pub var: &'static str,
    pub fallback: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub kind: AttributeType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    pub default: Option<DefaultValue>,
    pub env_default: Option<EnvDefault>,
    pub diff_suppress: Option<DiffSuppressFn>,
}

impl Attribute {
    fn new(kind: AttributeType) -> Self {
        Self {
            kind,
            required: false,
            optional: false,
            computed: false,
            default: None,
            env_default: None,
            diff_suppress: None,
        }
    }

    pub fn required_string() -> Self {
        Self {
            required: true,
            ..Self::new(AttributeType::String)
        }
    }

    pub fn optional_string() -> Self {
        Self {
            optional: true,
            ..Self::new(AttributeType::String)
        }
    }

    pub fn computed_string() -> Self {
        Self {
            computed: true,
            ..Self::new(AttributeType::String)
        }
    }

    pub fn optional_int() -> Self {
        Self {
            optional: true,
            ..Self::new(AttributeType::Int)
        }
    }

    pub fn computed_int() -> Self {
        Self {
            computed: true,
            ..Self::new(AttributeType::Int)
        }
    }

    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_env_default(mut self, var: &'static str, fallback: Option<&'static str>) -> Self {
        self.env_default = Some(EnvDefault { var, fallback });
        self
    }

    pub fn with_diff_suppress(mut self, suppress: DiffSuppressFn) -> Self {
        self.diff_suppress = Some(suppress);
        self
    }

    /// Whether `old` and `new` should be treated as different values.
    pub fn differs(&self, old: &str, new: &str) -> bool {
        match self.diff_suppress {
            Some(suppress) if suppress(old, new) => false,
            _ => old != new,
        }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.required || self.optional || self.computed) {
            bail!("{}: one of required, optional or computed must be set", name);
        }
        if self.required && (self.optional || self.computed) {
            bail!("{}: required cannot be combined with optional or computed", name);
        }
        if let Some(default) = &self.default {
            if !self.optional {
                bail!("{}: default is only allowed on optional attributes", name);
            }
            if default.kind() != self.kind {
                bail!("{}: default value does not match attribute type", name);
            }
        }
        if self.env_default.is_some() && self.default.is_some() {
            bail!("{}: default and env_default are mutually exclusive", name);
        }
        if self.computed && !self.optional && self.diff_suppress.is_some() {
            bail!("{}: diff suppression is meaningless on computed attributes", name);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub attributes: BTreeMap<&'static str, Attribute>,
    pub importable: bool,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: &'static str, attribute: Attribute) -> Self {
        self.attributes.insert(name, attribute);
        self
    }

    pub fn importable(mut self) -> Self {
        self.importable = true;
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Compares two renderings of an attribute, honoring its diff
    /// suppression. Unknown attributes compare verbatim.
    pub fn differs(&self, name: &str, old: &str, new: &str) -> bool {
        match self.attribute(name) {
            Some(attribute) => attribute.differs(old, new),
            None => old != new,
        }
    }

    pub fn env_default(
        &self,
        name: &str,
        lookup: &dyn Fn(&str) -> Option<String>,
    ) -> Option<String> {
        let env_default = self.attribute(name)?.env_default.as_ref()?;
        lookup(env_default.var)
            .filter(|value| !value.is_empty())
            .or_else(|| env_default.fallback.map(str::to_string))
    }

    pub fn validate(&self) -> Result<()> {
        for (name, attribute) in &self.attributes {
            attribute.validate(name)?;
        }
        Ok(())
    }
}
