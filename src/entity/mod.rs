use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Sentinel a filter dropdown uses for "no constraint".
pub const ALL_SENTINEL: &str = "all";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FilterDef {
    pub key: String,
    pub label: String,
    /// Known values for the dropdown. Empty means the values are discovered
    /// from the loaded records instead.
    pub values: Vec<String>,
}

impl FilterDef {
    pub fn new(key: &str, label: &str) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            values: Vec::new(),
        }
    }

    pub fn with_values(mut self, values: &[&str]) -> Self {
        self.values = values.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn accepts(&self, value: &str) -> bool {
        self.canonical(value).is_some()
    }

    /// The value as the backend spells it. Declared values are matched
    /// case-insensitively; open filters pass the trimmed input through.
    pub fn canonical<'a>(&'a self, value: &'a str) -> Option<&'a str> {
        let value = value.trim();
        if self.values.is_empty() {
            return Some(value);
        }
        self.values
            .iter()
            .find(|v| v.eq_ignore_ascii_case(value))
            .map(String::as_str)
    }
}

/// Declarative description of one listed entity: where it lives and how it
/// can be searched, filtered and displayed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntityDescriptor {
    pub name: String,
    pub endpoint: String,
    pub id_field: String,
    pub search_fields: Vec<String>,
    pub filters: Vec<FilterDef>,
    pub columns: Vec<String>,
    pub date_field: Option<String>,
}

impl EntityDescriptor {
    pub fn new(name: &str, endpoint: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            id_field: "id".to_string(),
            search_fields: Vec::new(),
            filters: Vec::new(),
            columns: Vec::new(),
            date_field: None,
        }
    }

    pub fn id_field(mut self, field: &str) -> Self {
        self.id_field = field.to_string();
        self
    }

    pub fn search_fields(mut self, fields: &[&str]) -> Self {
        self.search_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn filter(mut self, filter: FilterDef) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn date_field(mut self, field: &str) -> Self {
        self.date_field = Some(field.to_string());
        self
    }

    pub fn find_filter(&self, key: &str) -> Option<&FilterDef> {
        self.filters.iter().find(|f| f.key == key)
    }

    pub fn filter_keys(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.key.as_str()).collect()
    }

    /// Path of a single record below the list endpoint, e.g. `api/persons/123/`.
    pub fn detail_path(&self, id: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        format!("{}/{}/", base, id.trim().trim_matches('/'))
    }

    pub fn fetch_error_message(&self) -> String {
        format!("Failed to fetch {}", self.name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum EntityKind {
    Persons,
    Employees,
    Facilities,
    Infections,
    Vaccinations,
    Schedules,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Persons,
        EntityKind::Employees,
        EntityKind::Facilities,
        EntityKind::Infections,
        EntityKind::Vaccinations,
        EntityKind::Schedules,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Persons => "persons",
            EntityKind::Employees => "employees",
            EntityKind::Facilities => "facilities",
            EntityKind::Infections => "infections",
            EntityKind::Vaccinations => "vaccinations",
            EntityKind::Schedules => "schedules",
        }
    }

    pub fn descriptor(&self) -> EntityDescriptor {
        match self {
            EntityKind::Persons => EntityDescriptor::new("persons", "api/persons/")
                .id_field("medicare")
                .search_fields(&["first_name", "last_name", "medicare", "email", "ssn"])
                .filter(FilterDef::new("citizenship", "Citizenship"))
                .filter(FilterDef::new("occupation", "Occupation"))
                .columns(&[
                    "medicare",
                    "first_name",
                    "last_name",
                    "dob",
                    "citizenship",
                    "occupation",
                ]),
            EntityKind::Employees => EntityDescriptor::new("employees", "api/employees/")
                .id_field("ssn")
                .search_fields(&["person_name", "person_email", "role"])
                .filter(FilterDef::new("role", "Role").with_values(&[
                    "doctor",
                    "nurse",
                    "pharmacist",
                    "cashier",
                    "receptionist",
                    "administrative personnel",
                    "security personnel",
                    "regular employee",
                ]))
                .columns(&["ssn", "person_name", "role", "person_email", "person_phone"]),
            EntityKind::Facilities => EntityDescriptor::new("facilities", "api/facilities/")
                .id_field("fid")
                .search_fields(&["name", "address", "city", "province"])
                .filter(FilterDef::new("type", "Type").with_values(&[
                    "Hospital",
                    "CLSC",
                    "Clinic",
                    "Pharmacy",
                    "Special installment",
                ]))
                .columns(&["fid", "name", "type", "city", "capacity"]),
            EntityKind::Infections => EntityDescriptor::new("infections", "api/infections/")
                .search_fields(&["person_name", "infection_type_name"])
                .columns(&["id", "person_name", "infection_type_name", "date"])
                .date_field("date"),
            EntityKind::Vaccinations => {
                EntityDescriptor::new("vaccinations", "api/vaccinations/")
                    .search_fields(&["person_name", "vaccine_type_name", "facility_name"])
                    .columns(&[
                        "id",
                        "person_name",
                        "vaccine_type_name",
                        "dose_number",
                        "date",
                        "facility_name",
                    ])
                    .date_field("date")
            }
            EntityKind::Schedules => EntityDescriptor::new("schedules", "api/schedules/")
                .search_fields(&["employee_name", "facility_name", "employee_role"])
                .filter(FilterDef::new("role", "Role"))
                .filter(FilterDef::new("facility", "Facility"))
                .columns(&[
                    "id",
                    "date",
                    "start_time",
                    "end_time",
                    "employee_name",
                    "employee_role",
                    "facility_name",
                ])
                .date_field("date"),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        EntityKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == wanted || singular(k.as_str()) == wanted)
            .ok_or_else(|| format!("unknown entity '{s}'"))
    }
}

fn singular(name: &str) -> String {
    match name.strip_suffix("ies") {
        Some(stem) => format!("{stem}y"),
        None => name.trim_end_matches('s').to_string(),
    }
}
