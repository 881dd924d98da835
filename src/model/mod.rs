// Model module - descriptors handed to us by the host engine
// Identities are opaque; equality is the only thing we rely on.

pub mod error_info;

pub use error_info::{ErrorInfo, ExceptionInfo, Phase};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(value: impl AsRef<str>) -> Self {
                Self(Arc::from(value.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

opaque_id!(
    /// Identity of one specification class
    SpecId
);
opaque_id!(
    /// Identity of one feature (test method / scenario)
    FeatureId
);
opaque_id!(
    /// Identity of one data-driven iteration of a feature
    IterationId
);

/// Specification descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecInfo {
    pub id: SpecId,

    /// Direct ancestor, if the specification extends another one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superclass: Option<Box<SpecInfo>>,

    /// Every feature the engine will run for this specification, inherited
    /// ones included, in declaration order
    #[serde(default)]
    pub features: Vec<FeatureInfo>,
}

impl SpecInfo {
    pub fn new(id: impl Into<SpecId>) -> Self {
        Self {
            id: id.into(),
            superclass: None,
            features: Vec::new(),
        }
    }

    pub fn extending(mut self, superclass: SpecInfo) -> Self {
        self.superclass = Some(Box::new(superclass));
        self
    }

    pub fn with_feature(mut self, feature: FeatureInfo) -> Self {
        self.features.push(feature);
        self
    }

    /// Identities from the top-most ancestor down to this specification
    pub fn hierarchy(&self) -> Vec<&SpecId> {
        let mut chain = Vec::new();
        let mut current = Some(self);
        while let Some(spec) = current {
            chain.push(&spec.id);
            current = spec.superclass.as_deref();
        }
        chain.reverse();
        chain
    }

    /// Whether `id` is this specification or one of its ancestors
    pub fn is_or_extends(&self, id: &SpecId) -> bool {
        self.hierarchy().into_iter().any(|s| s == id)
    }
}

/// Feature descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureInfo {
    pub id: FeatureId,

    /// Specification that declares the feature. For inherited features this
    /// is the ancestor, not the specification being run.
    pub spec: SpecId,

    #[serde(default)]
    pub skipped: bool,
}

impl FeatureInfo {
    pub fn new(id: impl Into<FeatureId>, spec: impl Into<SpecId>) -> Self {
        Self {
            id: id.into(),
            spec: spec.into(),
            skipped: false,
        }
    }

    pub fn skipped(mut self) -> Self {
        self.skipped = true;
        self
    }
}

/// Iteration descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationInfo {
    pub id: IterationId,
    pub feature: FeatureInfo,
}

impl IterationInfo {
    pub fn new(id: impl Into<IterationId>, feature: FeatureInfo) -> Self {
        Self {
            id: id.into(),
            feature,
        }
    }
}
