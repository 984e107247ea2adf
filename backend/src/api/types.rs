//! REST API types for dashboard clients.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::parser::SourceSpec;
use crate::profiles::{ReportProfile, SelectMode};
use crate::transform::pipeline::Selections;

/// Body of `POST /api/report` and `POST /api/export`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    /// Profile id; the default profile when absent
    #[serde(default)]
    pub profile: Option<String>,

    /// Inline profile, takes precedence over `profile`
    #[serde(default)]
    pub profile_definition: Option<ReportProfile>,

    /// Source paths (`path` or `path#Sheet`); configured sources when empty.
    /// Only configured files or paths inside the data directory are read.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Current control state
    #[serde(flatten)]
    pub selections: Selections,
}

impl ReportRequest {
    pub fn source_specs(&self) -> Vec<SourceSpec> {
        self.sources.iter().map(|s| SourceSpec::parse(s)).collect()
    }
}

/// Entry of `GET /api/profiles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub id: String,
    pub title: String,
    pub description: String,
    pub predicate: String,
    pub builtin: bool,
    pub supplier_drilldown: bool,
    pub category_mode: SelectMode,
}

impl ProfileSummary {
    pub fn new(profile: &ReportProfile, builtin: bool) -> Self {
        Self {
            id: profile.id.clone(),
            title: profile.title.clone(),
            description: profile.description.clone(),
            predicate: profile.predicate.to_string(),
            builtin,
            supplier_drilldown: profile.supplier_drilldown,
            category_mode: profile.category_mode,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "requestId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
    })
}
