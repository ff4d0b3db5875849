use std::str::FromStr;
use serde::Deserialize;

/// Whether a dataset, command or feature combination may be used when the
/// pipeline runs in public-only mode.
///
/// - `Public`: always included.
/// - `Restricted`: dropped from expansion when `RunConfig::public_only` is set
///   (e.g. datasets built from licensed traffic feeds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Restricted,
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Public
    }
}

impl FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "restricted" => Ok(Visibility::Restricted),
            other => Err(format!(
                "invalid visibility: {other} (expected \"public\" or \"restricted\")"
            )),
        }
    }
}

/// Temporal class of a dataset.
///
/// Decides which rule derives its `lower_bound` artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalClass {
    /// `lower_bound` is a symlink to `travel_time`.
    Static,
    /// `lower_bound` is computed by an external program.
    TimeDependent,
}

impl Default for TemporalClass {
    fn default() -> Self {
        TemporalClass::Static
    }
}

impl FromStr for TemporalClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "static" => Ok(TemporalClass::Static),
            "time_dependent" | "td" => Ok(TemporalClass::TimeDependent),
            other => Err(format!(
                "invalid temporal class: {other} (expected \"static\" or \"time_dependent\")"
            )),
        }
    }
}

/// Restricts a command to one configuration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeFilter {
    /// Only run when `public_only` is set.
    Public,
    /// Only run when restricted data is available.
    Full,
}

impl ModeFilter {
    pub fn admits(self, public_only: bool) -> bool {
        match self {
            ModeFilter::Public => public_only,
            ModeFilter::Full => !public_only,
        }
    }
}
