//! # Control Catalog
//!
//! Loads control definitions from YAML. A catalog source is a single file,
//! a directory of `*.yaml` / `*.yml` files (read in file-name order), or an
//! in-memory string. Each document is either a list of control records or
//! a mapping with a `controls:` list.
//!
//! Loading is all-or-nothing: the first invalid entry aborts the load with a
//! [`CatalogError::Parse`] naming the source, entry and field. Duplicate ids
//! and `logic.rule` names missing from the [`RuleRegistry`] are load errors
//! too. Order of entries is preserved and is the order of
//! [`ControlCatalog::list`] and batch evaluation.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use assure_core::{ControlId, Severity, TscCategory};
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::condition::SuccessCondition;
use crate::control::{
    BooleanCheck, Control, ControlLogic, ManualReview, DEFAULT_FAILURE_MESSAGE,
};
use crate::error::{CatalogError, CatalogResult};
use crate::rules::RuleRegistry;

const INLINE_SOURCE: &str = "<inline>";

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// An immutable, ordered set of controls.
#[derive(Debug, Clone, Default)]
pub struct ControlCatalog {
    controls: Vec<Control>,
    index: HashMap<String, usize>,
}

/// Filter for [`ControlCatalog::list`]. All set fields must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFilter {
    /// Restrict to one Trust Services category.
    pub category: Option<TscCategory>,
    /// Restrict to one severity.
    pub severity: Option<Severity>,
    /// Skip disabled controls.
    pub enabled_only: bool,
}

impl Default for ControlFilter {
    fn default() -> Self {
        Self {
            category: None,
            severity: None,
            enabled_only: true,
        }
    }
}

impl ControlFilter {
    /// Enabled controls in one category.
    pub fn category(category: TscCategory) -> Self {
        Self {
            category: Some(category),
            ..Self::default()
        }
    }

    fn matches(&self, control: &Control) -> bool {
        (!self.enabled_only || control.enabled)
            && self.category.map_or(true, |c| control.category == c)
            && self.severity.map_or(true, |s| control.severity == s)
    }
}

impl ControlCatalog {
    /// Load from a YAML file or a directory of YAML files.
    pub fn load(path: &Path, rules: &RuleRegistry) -> CatalogResult<Self> {
        let meta = std::fs::metadata(path).map_err(|e| io_error(path, e))?;
        let mut catalog = Self::default();
        if meta.is_dir() {
            let mut files = Vec::new();
            for entry in std::fs::read_dir(path).map_err(|e| io_error(path, e))? {
                let entry = entry.map_err(|e| io_error(path, e))?;
                let p = entry.path();
                let is_yaml = matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                );
                if is_yaml && p.is_file() {
                    files.push(p);
                }
            }
            files.sort();
            for file in &files {
                catalog.extend_from_file(file, rules)?;
            }
            tracing::info!(
                dir = %path.display(),
                files = files.len(),
                controls = catalog.len(),
                "loaded control catalog"
            );
        } else {
            catalog.extend_from_file(path, rules)?;
            tracing::info!(file = %path.display(), controls = catalog.len(), "loaded control catalog");
        }
        Ok(catalog)
    }

    /// Parse an in-memory YAML document.
    pub fn from_yaml_str(text: &str, rules: &RuleRegistry) -> CatalogResult<Self> {
        let mut catalog = Self::default();
        catalog.extend_from_str(text, INLINE_SOURCE, rules)?;
        Ok(catalog)
    }

    /// Build from already constructed controls, applying the same id and
    /// rule checks as file loading.
    pub fn from_controls(controls: Vec<Control>, rules: &RuleRegistry) -> CatalogResult<Self> {
        let mut catalog = Self::default();
        for (i, control) in controls.into_iter().enumerate() {
            if let Some(rule) = control.logic.rule() {
                if !rules.contains(rule) {
                    return Err(CatalogError::Parse {
                        source_name: INLINE_SOURCE.to_string(),
                        entry: format!("#{i} ({})", control.id),
                        field: "logic.rule".to_string(),
                        detail: format!("rule \"{rule}\" is not registered"),
                    });
                }
            }
            catalog.push(control, INLINE_SOURCE)?;
        }
        Ok(catalog)
    }

    /// Look up a control by id.
    pub fn get(&self, id: &str) -> Option<&Control> {
        self.index.get(id).map(|&i| &self.controls[i])
    }

    /// Controls matching `filter`, in catalog order.
    pub fn list(&self, filter: &ControlFilter) -> Vec<&Control> {
        self.controls.iter().filter(|c| filter.matches(c)).collect()
    }

    /// Every control, in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    /// Number of controls.
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    /// True when no controls are loaded.
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    fn extend_from_file(&mut self, path: &Path, rules: &RuleRegistry) -> CatalogResult<()> {
        let text = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
        self.extend_from_str(&text, &path.display().to_string(), rules)
    }

    fn extend_from_str(
        &mut self,
        text: &str,
        source_name: &str,
        rules: &RuleRegistry,
    ) -> CatalogResult<()> {
        let doc: Value = serde_yaml::from_str(text).map_err(|e| CatalogError::Document {
            source_name: source_name.to_string(),
            detail: e.to_string(),
        })?;
        let entries = match doc {
            Value::Null => Vec::new(),
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("controls") {
                Some(Value::Array(items)) => items,
                Some(Value::Null) | None => Vec::new(),
                Some(_) => {
                    return Err(CatalogError::Document {
                        source_name: source_name.to_string(),
                        detail: "`controls` must be a list".to_string(),
                    })
                }
            },
            _ => {
                return Err(CatalogError::Document {
                    source_name: source_name.to_string(),
                    detail: "expected a list of controls or a mapping with `controls`".to_string(),
                })
            }
        };
        let mut parsed = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            parsed.push(EntryParser::new(source_name, i, entry)?.parse(rules)?);
        }
        for control in parsed {
            self.push(control, source_name)?;
        }
        Ok(())
    }

    fn push(&mut self, control: Control, source_name: &str) -> CatalogResult<()> {
        let key = control.id.as_str().to_string();
        if self.index.contains_key(&key) {
            return Err(CatalogError::DuplicateId {
                id: key,
                source_name: source_name.to_string(),
            });
        }
        self.index.insert(key, self.controls.len());
        self.controls.push(control);
        Ok(())
    }
}

fn io_error(path: &Path, e: std::io::Error) -> CatalogError {
    if e.kind() == std::io::ErrorKind::NotFound {
        CatalogError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        CatalogError::Io {
            path: path.to_path_buf(),
            source: e,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry parsing
// ---------------------------------------------------------------------------

struct EntryParser<'a> {
    source_name: &'a str,
    label: String,
    map: &'a Map<String, Value>,
}

impl<'a> EntryParser<'a> {
    fn new(source_name: &'a str, index: usize, entry: &'a Value) -> CatalogResult<Self> {
        let label = format!("#{index}");
        match entry.as_object() {
            Some(map) => Ok(Self {
                source_name,
                label,
                map,
            }),
            None => Err(CatalogError::Parse {
                source_name: source_name.to_string(),
                entry: label,
                field: "<entry>".to_string(),
                detail: "entry must be a mapping".to_string(),
            }),
        }
    }

    fn error(&self, field: &str, detail: impl Into<String>) -> CatalogError {
        CatalogError::Parse {
            source_name: self.source_name.to_string(),
            entry: self.label.clone(),
            field: field.to_string(),
            detail: detail.into(),
        }
    }

    fn parse(mut self, rules: &RuleRegistry) -> CatalogResult<Control> {
        let raw_id = self.required_str(self.map, "id", "id")?;
        let id = ControlId::new(raw_id).map_err(|e| self.error("id", e.to_string()))?;
        self.label = format!("{} ({id})", self.label);

        let logic = match self.map.get("logic") {
            Some(Value::Object(logic)) => self.parse_logic(logic, rules)?,
            Some(_) => return Err(self.error("logic", "must be a mapping")),
            None => return Err(self.error("logic", "missing required field")),
        };

        Ok(Control {
            name: self.required_str(self.map, "name", "name")?.to_string(),
            description: self
                .required_str(self.map, "description", "description")?
                .to_string(),
            tsc_reference: self
                .required_str(self.map, "tsc_reference", "tsc_reference")?
                .to_string(),
            category: self.required_enum::<TscCategory>("category")?,
            control_type: self.required_enum("control_type")?,
            sources: self.sources()?,
            severity: self.required_enum("severity")?,
            evaluation_frequency: self
                .required_str(self.map, "evaluation_frequency", "evaluation_frequency")?
                .to_string(),
            logic,
            enabled: match self.map.get("enabled") {
                None | Some(Value::Null) => true,
                Some(Value::Bool(b)) => *b,
                Some(_) => return Err(self.error("enabled", "must be true or false")),
            },
            id,
        })
    }

    fn required_str<'m>(
        &self,
        map: &'m Map<String, Value>,
        key: &str,
        field: &str,
    ) -> CatalogResult<&'m str> {
        match map.get(key) {
            Some(Value::String(s)) => Ok(s),
            Some(Value::Null) | None => Err(self.error(field, "missing required field")),
            Some(other) => Err(self.error(field, format!("expected a string, found {other}"))),
        }
    }

    fn optional_str<'m>(
        &self,
        map: &'m Map<String, Value>,
        key: &str,
        field: &str,
    ) -> CatalogResult<Option<&'m str>> {
        match map.get(key) {
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(self.error(field, format!("expected a string, found {other}"))),
        }
    }

    fn required_enum<T>(&self, key: &str) -> CatalogResult<T>
    where
        T: FromStr<Err = assure_core::ValidationError>,
    {
        let raw = self.required_str(self.map, key, key)?;
        raw.parse().map_err(|e: assure_core::ValidationError| self.error(key, e.to_string()))
    }

    fn sources(&self) -> CatalogResult<Vec<String>> {
        match self.map.get("sources") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.error("sources", format!("expected a string, found {v}")))
                })
                .collect(),
            Some(_) => Err(self.error("sources", "must be a list of source names")),
        }
    }

    fn parse_logic(
        &self,
        logic: &Map<String, Value>,
        rules: &RuleRegistry,
    ) -> CatalogResult<ControlLogic> {
        let kind = self
            .optional_str(logic, "type", "logic.type")?
            .unwrap_or("boolean_check");
        if kind != "boolean_check" && kind != "manual_review" {
            return Ok(ControlLogic::Unrecognized {
                type_name: kind.to_string(),
            });
        }

        let rule = self.required_str(logic, "rule", "logic.rule")?;
        if !rules.contains(rule) {
            return Err(self.error(
                "logic.rule",
                format!(
                    "rule \"{rule}\" is not registered (known: {})",
                    rules.names().collect::<Vec<_>>().join(", ")
                ),
            ));
        }
        let query = self
            .optional_str(logic, "query", "logic.query")?
            .unwrap_or_default()
            .to_string();
        let remediation = self
            .optional_str(logic, "remediation", "logic.remediation")?
            .map(str::to_string);

        if kind == "manual_review" {
            return Ok(ControlLogic::ManualReview(ManualReview {
                rule: rule.to_string(),
                query,
                remediation,
            }));
        }

        let success_condition = match self.optional_str(
            logic,
            "success_condition",
            "logic.success_condition",
        )? {
            Some(raw) => {
                let parsed = SuccessCondition::parse(raw);
                if parsed.is_fallback() {
                    tracing::warn!(
                        source = self.source_name,
                        entry = %self.label,
                        condition = raw,
                        "unrecognized success condition; using row_count = 0"
                    );
                }
                parsed
            }
            None => SuccessCondition::zero_violations(),
        };
        let threshold = match logic.get("threshold") {
            None | Some(Value::Null) => 0,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| self.error("logic.threshold", format!("expected a non-negative integer, found {v}")))?,
        };
        let failure_message = self
            .optional_str(logic, "failure_message", "logic.failure_message")?
            .unwrap_or(DEFAULT_FAILURE_MESSAGE)
            .to_string();

        Ok(ControlLogic::BooleanCheck(BooleanCheck {
            rule: rule.to_string(),
            query,
            success_condition,
            threshold,
            failure_message,
            remediation,
        }))
    }
}

// ---------------------------------------------------------------------------
// Reloadable handle
// ---------------------------------------------------------------------------

/// Shared, atomically replaceable catalog.
///
/// Readers take an `Arc` snapshot; [`replace`](Self::replace) swaps the
/// whole catalog in one write, so a reader never sees a mix of old and new
/// controls.
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    current: Arc<RwLock<Arc<ControlCatalog>>>,
}

impl CatalogHandle {
    /// Wrap a loaded catalog.
    pub fn new(catalog: ControlCatalog) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(catalog))),
        }
    }

    /// The current catalog.
    pub fn snapshot(&self) -> Arc<ControlCatalog> {
        Arc::clone(&self.current.read())
    }

    /// Swap in a new catalog.
    pub fn replace(&self, catalog: ControlCatalog) {
        *self.current.write() = Arc::new(catalog);
    }

    /// Load `path` and swap it in. On error the current catalog is kept.
    pub fn reload(&self, path: &Path, rules: &RuleRegistry) -> CatalogResult<()> {
        let catalog = ControlCatalog::load(path, rules)?;
        let count = catalog.len();
        self.replace(catalog);
        tracing::info!(path = %path.display(), controls = count, "control catalog reloaded");
        Ok(())
    }
}
