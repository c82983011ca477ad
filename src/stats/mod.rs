use serde::{Deserialize, Serialize};

pub const DASHBOARD_PATH: &str = "api/analytics/dashboard/";

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Overview {
    pub total_persons: u64,
    pub total_employees: u64,
    pub total_facilities: u64,
    pub total_capacity: u64,
}

/// One row of a grouped count. The backend names the grouping column after
/// the field it counted (`role`, `type`, `citizenship`, `province`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Share {
    #[serde(
        default,
        alias = "role",
        alias = "type",
        alias = "citizenship",
        alias = "province"
    )]
    pub label: Option<String>,
    #[serde(default)]
    pub count: u64,
}

impl Share {
    pub fn label_text(&self) -> &str {
        match self.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label,
            _ => "(none)",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BirthDates {
    pub has_dob: u64,
    pub no_dob: u64,
}

/// Body of the analytics dashboard endpoint. Missing sections decode as
/// empty so an older backend still renders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardStats {
    pub overview: Overview,
    pub employee_roles: Vec<Share>,
    pub facility_types: Vec<Share>,
    #[serde(rename = "age_distribution")]
    pub birth_dates: BirthDates,
    pub citizenship_distribution: Vec<Share>,
    pub province_distribution: Vec<Share>,
}

impl DashboardStats {
    /// Named distributions in display order.
    pub fn distributions(&self) -> [(&'static str, &[Share]); 4] {
        [
            ("Employee roles", self.employee_roles.as_slice()),
            ("Facility types", self.facility_types.as_slice()),
            ("Citizenship", self.citizenship_distribution.as_slice()),
            ("Facility provinces", self.province_distribution.as_slice()),
        ]
    }
}
