//! # Violation Rules
//!
//! A rule is a named predicate over a [`DataContext`] that returns the
//! records violating a control. Catalog entries declare the rule they use
//! (`logic.rule`) and the catalog refuses to load if a name is not
//! registered, so a typo surfaces at load time rather than as a control
//! that silently never fails.
//!
//! Rules iterate collections in input order and never consult the clock or
//! any other ambient state, so the violation set is a pure function of the
//! data context.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::context::DataContext;
use crate::error::RuleError;

// ---------------------------------------------------------------------------
// Violation
// ---------------------------------------------------------------------------

/// One violating (or review-worthy) record, as reported in evaluation
/// details and finding descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Violation(Map<String, Value>);

impl Violation {
    /// Wrap a JSON object.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Build from a `json!` object literal. Non-objects become empty.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self(Map::new()),
        }
    }

    /// The affected resource, when the rule reports one. Numbers and
    /// booleans are rendered as text; null and nested values are not ids.
    pub fn resource_id(&self) -> Option<String> {
        match self.0.get("resource_id")? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// All reported fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(&self.0) {
            Ok(s) => f.write_str(&s),
            Err(_) => Err(fmt::Error),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule trait and registry
// ---------------------------------------------------------------------------

/// A named violation predicate.
pub trait ViolationRule: Send + Sync + fmt::Debug {
    /// Registry key referenced by `logic.rule`.
    fn name(&self) -> &str;

    /// Collections this rule reads.
    fn collections(&self) -> &[&'static str];

    /// Records violating the rule, in collection order.
    fn violations(&self, ctx: &DataContext) -> Result<Vec<Violation>, RuleError>;
}

/// Lookup table from rule name to implementation.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<String, Arc<dyn ViolationRule>>,
}

impl RuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in rule.
    pub fn with_builtin_rules() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(AdminWithoutMfa));
        registry.register(Arc::new(OrphanedAccounts));
        registry.register(Arc::new(UnencryptedResources));
        registry.register(Arc::new(PublicS3Buckets));
        registry.register(Arc::new(CloudTrailGaps));
        registry.register(Arc::new(InsufficientBackupRetention));
        registry
    }

    /// Register a rule, replacing any rule with the same name.
    pub fn register(&mut self, rule: Arc<dyn ViolationRule>) {
        let name = rule.name().to_string();
        if self.rules.insert(name.clone(), rule).is_some() {
            tracing::debug!(rule = %name, "replaced registered rule");
        }
    }

    /// Look up a rule.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ViolationRule>> {
        self.rules.get(name)
    }

    /// Whether a rule is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn flag(record: &Map<String, Value>, key: &str, default: bool) -> bool {
    record.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn field(record: &Map<String, Value>, key: &str) -> Value {
    record.get(key).cloned().unwrap_or(Value::Null)
}

/// `id`, falling back to `email`, as used for account resource ids.
fn account_id(record: &Map<String, Value>) -> Value {
    match record.get("id") {
        Some(v) if !v.is_null() => v.clone(),
        _ => field(record, "email"),
    }
}

// ---------------------------------------------------------------------------
// Built-in rules
// ---------------------------------------------------------------------------

/// Administrators without multi-factor authentication.
#[derive(Debug, Clone, Copy)]
pub struct AdminWithoutMfa;

impl ViolationRule for AdminWithoutMfa {
    fn name(&self) -> &str {
        "admin_without_mfa"
    }

    fn collections(&self) -> &[&'static str] {
        &["users"]
    }

    fn violations(&self, ctx: &DataContext) -> Result<Vec<Violation>, RuleError> {
        Ok(ctx
            .records("users")?
            .into_iter()
            .filter(|u| flag(u, "is_admin", false) && !flag(u, "mfa_enabled", false))
            .map(|u| {
                Violation::from_value(json!({
                    "user_id": account_id(u),
                    "email": field(u, "email"),
                    "role": field(u, "role"),
                    "resource_id": account_id(u),
                }))
            })
            .collect())
    }
}

/// Active accounts whose email is not on the HR roster.
#[derive(Debug, Clone, Copy)]
pub struct OrphanedAccounts;

impl ViolationRule for OrphanedAccounts {
    fn name(&self) -> &str {
        "orphaned_accounts"
    }

    fn collections(&self) -> &[&'static str] {
        &["users", "hr_employees"]
    }

    fn violations(&self, ctx: &DataContext) -> Result<Vec<Violation>, RuleError> {
        let roster: Vec<Value> = ctx
            .records("hr_employees")?
            .into_iter()
            .map(|e| field(e, "email"))
            .collect();
        Ok(ctx
            .records("users")?
            .into_iter()
            .filter(|u| flag(u, "active", true) && !roster.contains(&field(u, "email")))
            .map(|u| {
                Violation::from_value(json!({
                    "user_id": account_id(u),
                    "email": field(u, "email"),
                    "name": field(u, "name"),
                    "resource_id": account_id(u),
                }))
            })
            .collect())
    }
}

/// Resources with encryption at rest disabled.
#[derive(Debug, Clone, Copy)]
pub struct UnencryptedResources;

impl ViolationRule for UnencryptedResources {
    fn name(&self) -> &str {
        "unencrypted_resources"
    }

    fn collections(&self) -> &[&'static str] {
        &["resources"]
    }

    fn violations(&self, ctx: &DataContext) -> Result<Vec<Violation>, RuleError> {
        Ok(ctx
            .records("resources")?
            .into_iter()
            .filter(|r| !flag(r, "encryption_enabled", false))
            .map(resource_violation)
            .collect())
    }
}

/// S3 buckets open to public access.
#[derive(Debug, Clone, Copy)]
pub struct PublicS3Buckets;

impl ViolationRule for PublicS3Buckets {
    fn name(&self) -> &str {
        "public_s3_buckets"
    }

    fn collections(&self) -> &[&'static str] {
        &["resources"]
    }

    fn violations(&self, ctx: &DataContext) -> Result<Vec<Violation>, RuleError> {
        Ok(ctx
            .records("resources")?
            .into_iter()
            .filter(|r| {
                flag(r, "public_access", false)
                    && r.get("resource_type").and_then(Value::as_str) == Some("s3_bucket")
            })
            .map(resource_violation)
            .collect())
    }
}

fn resource_violation(r: &Map<String, Value>) -> Violation {
    Violation::from_value(json!({
        "resource_id": field(r, "id"),
        "name": field(r, "name"),
        "type": field(r, "resource_type"),
    }))
}

/// Regions where audit logging is off or not multi-region.
#[derive(Debug, Clone, Copy)]
pub struct CloudTrailGaps;

impl ViolationRule for CloudTrailGaps {
    fn name(&self) -> &str {
        "cloudtrail_gaps"
    }

    fn collections(&self) -> &[&'static str] {
        &["cloudtrail_status"]
    }

    fn violations(&self, ctx: &DataContext) -> Result<Vec<Violation>, RuleError> {
        Ok(ctx
            .records("cloudtrail_status")?
            .into_iter()
            .filter(|t| !flag(t, "is_logging", false) || !flag(t, "is_multi_region", false))
            .map(|t| {
                let account = display_value(&field(t, "account_id"));
                let region = display_value(&field(t, "region"));
                Violation::from_value(json!({
                    "account_id": field(t, "account_id"),
                    "region": field(t, "region"),
                    "resource_id": format!("{account}-{region}"),
                }))
            })
            .collect())
    }
}

fn display_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Databases keeping backups for fewer than [`MIN_BACKUP_RETENTION_DAYS`].
#[derive(Debug, Clone, Copy)]
pub struct InsufficientBackupRetention;

/// Minimum backup retention, in days.
pub const MIN_BACKUP_RETENTION_DAYS: i64 = 7;

impl ViolationRule for InsufficientBackupRetention {
    fn name(&self) -> &str {
        "insufficient_backup_retention"
    }

    fn collections(&self) -> &[&'static str] {
        &["databases"]
    }

    fn violations(&self, ctx: &DataContext) -> Result<Vec<Violation>, RuleError> {
        let mut out = Vec::new();
        for db in ctx.records("databases")? {
            let retention = match db.get("backup_retention_period") {
                None | Some(Value::Null) => 0,
                Some(v) => v.as_i64().ok_or_else(|| RuleError::Failed {
                    rule: self.name().to_string(),
                    detail: format!(
                        "backup_retention_period of {} is not an integer: {v}",
                        display_value(&field(db, "id"))
                    ),
                })?,
            };
            if retention < MIN_BACKUP_RETENTION_DAYS {
                out.push(Violation::from_value(json!({
                    "resource_id": field(db, "id"),
                    "name": field(db, "name"),
                    "backup_retention": retention,
                })));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(value: Value) -> DataContext {
        DataContext::from_value(value).unwrap()
    }

    #[test]
    fn builtin_registry_has_all_rules() {
        let r = RuleRegistry::with_builtin_rules();
        let names: Vec<_> = r.names().collect();
        assert_eq!(
            names,
            vec![
                "admin_without_mfa",
                "cloudtrail_gaps",
                "insufficient_backup_retention",
                "orphaned_accounts",
                "public_s3_buckets",
                "unencrypted_resources",
            ]
        );
    }

    #[test]
    fn admin_without_mfa_flags_only_admins() {
        let c = ctx(json!({"users": [
            {"id": "u1", "email": "a@x", "is_admin": true, "mfa_enabled": false, "role": "admin"},
            {"id": "u2", "email": "b@x", "is_admin": true, "mfa_enabled": true},
            {"id": "u3", "email": "c@x", "is_admin": false, "mfa_enabled": false},
            {"email": "d@x", "is_admin": true}
        ]}));
        let v = AdminWithoutMfa.violations(&c).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].resource_id().as_deref(), Some("u1"));
        assert_eq!(v[1].resource_id().as_deref(), Some("d@x"));
    }

    #[test]
    fn orphaned_accounts_compares_against_roster() {
        let c = ctx(json!({
            "users": [
                {"id": "u1", "email": "kept@x"},
                {"id": "u2", "email": "gone@x"},
                {"id": "u3", "email": "gone2@x", "active": false}
            ],
            "hr_employees": [{"email": "kept@x"}]
        }));
        let v = OrphanedAccounts.violations(&c).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].resource_id().as_deref(), Some("u2"));
    }

    #[test]
    fn resource_rules() {
        let c = ctx(json!({"resources": [
            {"id": "r1", "resource_type": "s3_bucket", "encryption_enabled": true, "public_access": true},
            {"id": "r2", "resource_type": "rds_instance", "encryption_enabled": false, "public_access": true},
            {"id": "r3", "resource_type": "s3_bucket"}
        ]}));
        let unencrypted = UnencryptedResources.violations(&c).unwrap();
        assert_eq!(
            unencrypted.iter().map(|v| v.resource_id()).collect::<Vec<_>>(),
            vec![Some("r2".to_string()), Some("r3".to_string())]
        );
        let public = PublicS3Buckets.violations(&c).unwrap();
        assert_eq!(public.len(), 1);
        assert_eq!(public[0].fields()["type"], "s3_bucket");
    }

    #[test]
    fn cloudtrail_resource_id_joins_account_and_region() {
        let c = ctx(json!({"cloudtrail_status": [
            {"account_id": "123", "region": "us-east-1", "is_logging": true, "is_multi_region": true},
            {"account_id": "123", "region": "us-west-2", "is_logging": false, "is_multi_region": false}
        ]}));
        let v = CloudTrailGaps.violations(&c).unwrap();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].resource_id().as_deref(), Some("123-us-west-2"));
    }

    #[test]
    fn numeric_ids_become_resource_ids() {
        let c = ctx(json!({"users": [
            {"id": 1042, "email": "a@x", "is_admin": true, "mfa_enabled": false},
            {"id": null, "email": "b@x", "is_admin": true}
        ]}));
        let v = AdminWithoutMfa.violations(&c).unwrap();
        assert_eq!(v[0].resource_id().as_deref(), Some("1042"));
        assert_eq!(v[1].resource_id().as_deref(), Some("b@x"));
        assert_eq!(Violation::from_value(json!({"resource_id": [1]})).resource_id(), None);
    }

    #[test]
    fn backup_retention_defaults_to_zero() {
        let c = ctx(json!({"databases": [
            {"id": "db1", "backup_retention_period": 7},
            {"id": "db2", "backup_retention_period": 3},
            {"id": "db3"}
        ]}));
        let v = InsufficientBackupRetention.violations(&c).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[1].fields()["backup_retention"], 0);
    }

    #[test]
    fn backup_retention_rejects_non_integer() {
        let c = ctx(json!({"databases": [{"id": "db1", "backup_retention_period": "week"}]}));
        assert!(InsufficientBackupRetention.violations(&c).is_err());
    }

    #[test]
    fn malformed_collection_is_an_error() {
        let c = ctx(json!({"users": "not a list"}));
        assert!(matches!(
            AdminWithoutMfa.violations(&c),
            Err(RuleError::MalformedCollection { .. })
        ));
    }

    #[test]
    fn missing_collections_yield_nothing() {
        let c = DataContext::new();
        let registry = RuleRegistry::with_builtin_rules();
        for name in registry.names() {
            let rule = registry.get(name).unwrap();
            assert!(rule.violations(&c).unwrap().is_empty(), "{name}");
        }
    }
}
