//! Subscription plans and the priority class derived from them.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Subscription plan tier, as reported by the upstream auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Free,
    Pro,
    Studio,
}

impl PlanTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "free",
            PlanTier::Pro => "pro",
            PlanTier::Studio => "studio",
        }
    }

    /// Scheduler class for jobs submitted under this plan.
    pub fn priority_class(&self) -> PriorityClass {
        match self {
            PlanTier::Free => PriorityClass::Batch,
            PlanTier::Pro | PlanTier::Studio => PriorityClass::Interactive,
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(PlanTier::Free),
            "pro" => Ok(PlanTier::Pro),
            "studio" => Ok(PlanTier::Studio),
            _ => Err(()),
        }
    }
}

/// Scheduler priority class. Interactive jobs are dispatched before batch
/// jobs; within a class, submission order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PriorityClass {
    Interactive,
    #[default]
    Batch,
}

impl PriorityClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityClass::Interactive => "interactive",
            PriorityClass::Batch => "batch",
        }
    }
}
