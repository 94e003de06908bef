//! Read-only workforce inputs.
//!
//! Employees, teams, shift templates, demand, availability and rule sets
//! belong to the host HR application. The orchestrator reads them through
//! [`WorkforceDirectory`]; [`StaticDirectory`] serves a fixed snapshot,
//! typically loaded from JSON at startup.
//!
//! # Snapshot format
//!
//! ```json
//! {
//!   "tenants": [{
//!     "tenant_id": "acme",
//!     "employees": [{ "id": "e1", "name": "Ana", "roles": ["nurse"] }],
//!     "templates": [{ "id": "night", "name": "Night", "start": "22:00:00",
//!                     "end": "06:00:00", "category": "night" }],
//!     "demand": [{ "template_id": "night", "weekday": "Mon", "headcount": 1 }],
//!     "rule_sets": [{ "id": "std", "tenant_id": "acme", "rules": [
//!       { "id": "nights", "kind": "max_night_shifts_per_week", "params": { "max": 2 } }
//!     ]}]
//!   }]
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::store::StoreError;
use crate::error::SchedulerResult;
use crate::models::{DemandRequirement, Employee, EmployeeAvailability, ShiftTemplate, Team};
use crate::rules::{RuleDefaults, RuleSet, RuleSetDefinition};

/// Source of scheduling inputs for a tenant.
pub trait WorkforceDirectory: Send + Sync {
    fn employees(&self, tenant_id: &str) -> Result<Vec<Employee>, StoreError>;
    fn teams(&self, tenant_id: &str) -> Result<Vec<Team>, StoreError>;
    fn templates(&self, tenant_id: &str) -> Result<Vec<ShiftTemplate>, StoreError>;
    fn demand(&self, tenant_id: &str) -> Result<Vec<DemandRequirement>, StoreError>;
    /// Availability entries dated within `[from, to]`.
    fn availability(
        &self,
        tenant_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EmployeeAvailability>, StoreError>;
    /// A rule set by ID, or the tenant default when `id` is `None`.
    fn rule_set(&self, tenant_id: &str, id: Option<&str>) -> Result<Option<RuleSet>, StoreError>;
}

/// Inputs of one tenant.
#[derive(Debug, Clone, Default)]
pub struct TenantData {
    pub employees: Vec<Employee>,
    pub teams: Vec<Team>,
    pub templates: Vec<ShiftTemplate>,
    pub demand: Vec<DemandRequirement>,
    pub availability: Vec<EmployeeAvailability>,
    /// Parsed rule sets; the first is the tenant default.
    pub rule_sets: Vec<RuleSet>,
}

impl TenantData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_employees(mut self, employees: impl IntoIterator<Item = Employee>) -> Self {
        self.employees.extend(employees);
        self
    }

    pub fn with_team(mut self, team: Team) -> Self {
        self.teams.push(team);
        self
    }

    pub fn with_template(mut self, template: ShiftTemplate) -> Self {
        self.templates.push(template);
        self
    }

    pub fn with_demand(mut self, demand: impl IntoIterator<Item = DemandRequirement>) -> Self {
        self.demand.extend(demand);
        self
    }

    pub fn with_availability(
        mut self,
        entries: impl IntoIterator<Item = EmployeeAvailability>,
    ) -> Self {
        self.availability.extend(entries);
        self
    }

    pub fn with_rule_set(mut self, rule_set: RuleSet) -> Self {
        self.rule_sets.push(rule_set);
        self
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct Snapshot {
    #[serde(default)]
    tenants: Vec<TenantSnapshot>,
}

#[derive(Debug, Deserialize, Serialize)]
struct TenantSnapshot {
    tenant_id: String,
    #[serde(default)]
    employees: Vec<Employee>,
    #[serde(default)]
    teams: Vec<Team>,
    #[serde(default)]
    templates: Vec<ShiftTemplate>,
    #[serde(default)]
    demand: Vec<DemandRequirement>,
    #[serde(default)]
    availability: Vec<EmployeeAvailability>,
    #[serde(default)]
    rule_sets: Vec<RuleSetDefinition>,
}

/// Directory over an in-memory snapshot.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    tenants: RwLock<HashMap<String, TenantData>>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a tenant.
    pub fn with_tenant(self, tenant_id: impl Into<String>, data: TenantData) -> Self {
        self.put_tenant(tenant_id, data);
        self
    }

    pub fn put_tenant(&self, tenant_id: impl Into<String>, data: TenantData) {
        self.tenants.write().insert(tenant_id.into(), data);
    }

    /// Parses a JSON snapshot. Rule sets are parsed into typed rules here,
    /// so malformed rules surface at load time.
    pub fn from_json(json: &str, defaults: &RuleDefaults) -> SchedulerResult<Self> {
        let snapshot: Snapshot =
            serde_json::from_str(json).map_err(|e| StoreError::Snapshot(e.to_string()))?;
        let directory = Self::new();
        for tenant in snapshot.tenants {
            let rule_sets = tenant
                .rule_sets
                .iter()
                .map(|def| def.parse(defaults))
                .collect::<Result<Vec<_>, _>>()?;
            directory.put_tenant(
                tenant.tenant_id,
                TenantData {
                    employees: tenant.employees,
                    teams: tenant.teams,
                    templates: tenant.templates,
                    demand: tenant.demand,
                    availability: tenant.availability,
                    rule_sets,
                },
            );
        }
        Ok(directory)
    }

    /// Reads a JSON snapshot file.
    pub fn from_path(path: impl AsRef<Path>, defaults: &RuleDefaults) -> SchedulerResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| StoreError::Snapshot(format!("{}: {e}", path.display())))?;
        let directory = Self::from_json(&raw, defaults)?;
        info!(
            path = %path.display(),
            tenants = directory.tenant_count(),
            "workforce snapshot loaded"
        );
        Ok(directory)
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.read().len()
    }

    fn read<T>(&self, tenant_id: &str, pick: impl FnOnce(&TenantData) -> T) -> Result<T, StoreError> {
        self.tenants
            .read()
            .get(tenant_id)
            .map(pick)
            .ok_or_else(|| StoreError::Missing {
                entity: "tenant",
                id: tenant_id.to_string(),
            })
    }
}

impl WorkforceDirectory for StaticDirectory {
    fn employees(&self, tenant_id: &str) -> Result<Vec<Employee>, StoreError> {
        self.read(tenant_id, |t| t.employees.clone())
    }

    fn teams(&self, tenant_id: &str) -> Result<Vec<Team>, StoreError> {
        self.read(tenant_id, |t| t.teams.clone())
    }

    fn templates(&self, tenant_id: &str) -> Result<Vec<ShiftTemplate>, StoreError> {
        self.read(tenant_id, |t| t.templates.clone())
    }

    fn demand(&self, tenant_id: &str) -> Result<Vec<DemandRequirement>, StoreError> {
        self.read(tenant_id, |t| t.demand.clone())
    }

    fn availability(
        &self,
        tenant_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<EmployeeAvailability>, StoreError> {
        self.read(tenant_id, |t| {
            t.availability
                .iter()
                .filter(|a| a.date >= from && a.date <= to)
                .cloned()
                .collect()
        })
    }

    fn rule_set(&self, tenant_id: &str, id: Option<&str>) -> Result<Option<RuleSet>, StoreError> {
        self.read(tenant_id, |t| match id {
            Some(id) => t.rule_sets.iter().find(|r| r.id == id).cloned(),
            None => t.rule_sets.first().cloned(),
        })
    }
}
