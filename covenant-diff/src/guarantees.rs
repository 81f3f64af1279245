//! Guarantee (data-quality metadata) diffing.
//!
//! Guarantees are declarative: the engine reports how they moved between
//! two contract versions but never executes them. Severity is two-level:
//! `info` for changes that strengthen promises to consumers, `warning`
//! for changes that weaken them. Under [`GuaranteeMode::Strict`] warnings
//! count as breaking.

use covenant_core::{GuaranteeMode, Guarantees};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuaranteeChangeKind {
    NotNullAdded,
    NotNullRemoved,
    UniqueAdded,
    UniqueRemoved,
    AcceptedValuesExpanded,
    AcceptedValuesContracted,
    FreshnessAdded,
    FreshnessRemoved,
    FreshnessTightened,
    FreshnessRelaxed,
    VolumeTightened,
    VolumeRelaxed,
    RelationshipAdded,
    RelationshipRemoved,
    RelationshipChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GuaranteeSeverity {
    /// The promise got stronger or was introduced.
    Info,
    /// The promise got weaker or disappeared; consumers may care.
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuaranteeChange {
    pub kind: GuaranteeChangeKind,
    /// Dotted section path, e.g. `nullability.email` or `volume.min_rows`.
    pub path: String,
    pub severity: GuaranteeSeverity,
    pub message: String,
}

impl GuaranteeChange {
    fn new(
        kind: GuaranteeChangeKind,
        severity: GuaranteeSeverity,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            severity,
            message: message.into(),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Result of diffing two guarantee blocks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GuaranteeDiff {
    pub changes: Vec<GuaranteeChange>,
}

impl GuaranteeDiff {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn info_changes(&self) -> Vec<&GuaranteeChange> {
        self.changes
            .iter()
            .filter(|c| c.severity == GuaranteeSeverity::Info)
            .collect()
    }

    pub fn warning_changes(&self) -> Vec<&GuaranteeChange> {
        self.changes
            .iter()
            .filter(|c| c.severity == GuaranteeSeverity::Warning)
            .collect()
    }

    pub fn is_breaking(&self, mode: GuaranteeMode) -> bool {
        match mode {
            GuaranteeMode::Ignore | GuaranteeMode::Notify => false,
            GuaranteeMode::Strict => !self.warning_changes().is_empty(),
        }
    }

    pub fn breaking_changes(&self, mode: GuaranteeMode) -> Vec<&GuaranteeChange> {
        match mode {
            GuaranteeMode::Ignore | GuaranteeMode::Notify => Vec::new(),
            GuaranteeMode::Strict => self.warning_changes(),
        }
    }
}

/// Convenience wrapper mirroring schema-side `check_compatibility`.
pub fn check_guarantee_compatibility(
    old: Option<&Guarantees>,
    new: Option<&Guarantees>,
    mode: GuaranteeMode,
) -> (bool, Vec<GuaranteeChange>) {
    let result = diff_guarantees(old, new);
    let breaking: Vec<GuaranteeChange> =
        result.breaking_changes(mode).into_iter().cloned().collect();
    (breaking.is_empty(), breaking)
}

/// Diff two guarantee blocks section by section.
pub fn diff_guarantees(old: Option<&Guarantees>, new: Option<&Guarantees>) -> GuaranteeDiff {
    let empty = Guarantees::default();
    let old = old.unwrap_or(&empty);
    let new = new.unwrap_or(&empty);
    let mut changes = Vec::new();

    diff_bool_section(
        "nullability",
        old.nullability.as_ref(),
        new.nullability.as_ref(),
        GuaranteeChangeKind::NotNullAdded,
        GuaranteeChangeKind::NotNullRemoved,
        &mut changes,
    );
    diff_bool_section(
        "uniqueness",
        old.uniqueness.as_ref(),
        new.uniqueness.as_ref(),
        GuaranteeChangeKind::UniqueAdded,
        GuaranteeChangeKind::UniqueRemoved,
        &mut changes,
    );
    diff_accepted_values(
        old.accepted_values.as_ref(),
        new.accepted_values.as_ref(),
        &mut changes,
    );
    diff_freshness(old.freshness.as_ref(), new.freshness.as_ref(), &mut changes);
    diff_volume(old.volume.as_ref(), new.volume.as_ref(), &mut changes);
    diff_relationships(
        old.relationships.as_ref(),
        new.relationships.as_ref(),
        &mut changes,
    );

    GuaranteeDiff { changes }
}

// ----------------------------------------------------------------------------
// Nullability / uniqueness (column -> bool promise)
// ----------------------------------------------------------------------------

fn diff_bool_section(
    section: &str,
    old: Option<&BTreeMap<String, bool>>,
    new: Option<&BTreeMap<String, bool>>,
    added_kind: GuaranteeChangeKind,
    removed_kind: GuaranteeChangeKind,
    out: &mut Vec<GuaranteeChange>,
) {
    let promised = |map: Option<&BTreeMap<String, bool>>| -> Vec<String> {
        map.map(|m| {
            m.iter()
                .filter(|(_, v)| **v)
                .map(|(k, _)| k.clone())
                .collect()
        })
        .unwrap_or_default()
    };
    let old_cols = promised(old);
    let new_cols = promised(new);

    for col in &new_cols {
        if !old_cols.contains(col) {
            out.push(GuaranteeChange::new(
                added_kind,
                GuaranteeSeverity::Info,
                format!("{section}.{col}"),
                format!("{section} guarantee added on '{col}'"),
            ));
        }
    }
    for col in &old_cols {
        if !new_cols.contains(col) {
            out.push(GuaranteeChange::new(
                removed_kind,
                GuaranteeSeverity::Warning,
                format!("{section}.{col}"),
                format!("{section} guarantee removed from '{col}'"),
            ));
        }
    }
}

// ----------------------------------------------------------------------------
// Accepted values
// ----------------------------------------------------------------------------

fn diff_accepted_values(
    old: Option<&BTreeMap<String, Vec<Value>>>,
    new: Option<&BTreeMap<String, Vec<Value>>>,
    out: &mut Vec<GuaranteeChange>,
) {
    let empty = BTreeMap::new();
    let old = old.unwrap_or(&empty);
    let new = new.unwrap_or(&empty);

    let columns: std::collections::BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for col in columns {
        let old_vals = old.get(col).cloned().unwrap_or_default();
        let new_vals = new.get(col).cloned().unwrap_or_default();

        let added: Vec<&Value> = new_vals.iter().filter(|v| !old_vals.contains(v)).collect();
        let removed: Vec<&Value> = old_vals.iter().filter(|v| !new_vals.contains(v)).collect();

        // Dropping the constraint altogether opens the value set back up.
        if new_vals.is_empty() && !old_vals.is_empty() {
            out.push(GuaranteeChange::new(
                GuaranteeChangeKind::AcceptedValuesExpanded,
                GuaranteeSeverity::Warning,
                format!("accepted_values.{col}"),
                format!("accepted values constraint removed from '{col}'"),
            ));
            continue;
        }

        // Mixed edits emit both directions, one change each.
        if !removed.is_empty() && !old_vals.is_empty() {
            out.push(GuaranteeChange::new(
                GuaranteeChangeKind::AcceptedValuesContracted,
                GuaranteeSeverity::Info,
                format!("accepted_values.{col}"),
                format!("accepted values for '{col}' contracted ({} removed)", removed.len()),
            ));
        }
        if !added.is_empty() && !old_vals.is_empty() {
            // New values a consumer has never seen may slip past their
            // validation; that weakens the effective promise.
            out.push(GuaranteeChange::new(
                GuaranteeChangeKind::AcceptedValuesExpanded,
                GuaranteeSeverity::Warning,
                format!("accepted_values.{col}"),
                format!("accepted values for '{col}' expanded ({} added)", added.len()),
            ));
        }
        if old_vals.is_empty() && !new_vals.is_empty() {
            out.push(GuaranteeChange::new(
                GuaranteeChangeKind::AcceptedValuesContracted,
                GuaranteeSeverity::Info,
                format!("accepted_values.{col}"),
                format!("accepted values constraint added on '{col}'"),
            ));
        }
    }
}

// ----------------------------------------------------------------------------
// Freshness
// ----------------------------------------------------------------------------

/// Extract a comparable staleness threshold in minutes, if the shape is
/// one we understand (`warn_after.{days,hours,minutes}` or
/// `max_staleness_minutes`).
fn freshness_minutes(value: &Value) -> Option<f64> {
    if let Some(minutes) = value.get("max_staleness_minutes").and_then(Value::as_f64) {
        return Some(minutes);
    }
    let warn_after = value.get("warn_after")?;
    if let Some(days) = warn_after.get("days").and_then(Value::as_f64) {
        return Some(days * 24.0 * 60.0);
    }
    if let Some(hours) = warn_after.get("hours").and_then(Value::as_f64) {
        return Some(hours * 60.0);
    }
    warn_after.get("minutes").and_then(Value::as_f64)
}

fn diff_freshness(old: Option<&Value>, new: Option<&Value>, out: &mut Vec<GuaranteeChange>) {
    match (old, new) {
        (None, None) => {}
        (None, Some(_)) => out.push(GuaranteeChange::new(
            GuaranteeChangeKind::FreshnessAdded,
            GuaranteeSeverity::Info,
            "freshness",
            "freshness guarantee added",
        )),
        (Some(_), None) => out.push(GuaranteeChange::new(
            GuaranteeChangeKind::FreshnessRemoved,
            GuaranteeSeverity::Warning,
            "freshness",
            "freshness guarantee removed",
        )),
        (Some(a), Some(b)) => {
            if a == b {
                return;
            }
            match (freshness_minutes(a), freshness_minutes(b)) {
                (Some(old_min), Some(new_min)) if new_min < old_min => {
                    out.push(GuaranteeChange::new(
                        GuaranteeChangeKind::FreshnessTightened,
                        GuaranteeSeverity::Info,
                        "freshness",
                        format!("freshness tightened ({old_min} -> {new_min} minutes)"),
                    ));
                }
                (Some(old_min), Some(new_min)) if new_min > old_min => {
                    out.push(GuaranteeChange::new(
                        GuaranteeChangeKind::FreshnessRelaxed,
                        GuaranteeSeverity::Warning,
                        "freshness",
                        format!("freshness relaxed ({old_min} -> {new_min} minutes)"),
                    ));
                }
                (Some(_), Some(_)) => {}
                // Unrecognisable shape that still changed: assume the
                // promise weakened.
                _ => out.push(GuaranteeChange::new(
                    GuaranteeChangeKind::FreshnessRelaxed,
                    GuaranteeSeverity::Warning,
                    "freshness",
                    "freshness guarantee changed in an unrecognised format",
                )),
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Volume
// ----------------------------------------------------------------------------

fn diff_volume(old: Option<&Value>, new: Option<&Value>, out: &mut Vec<GuaranteeChange>) {
    let field = |v: Option<&Value>, key: &str| v.and_then(|v| v.get(key)).and_then(Value::as_f64);

    // min_rows: a higher floor is a stronger promise.
    diff_volume_field(
        "volume.min_rows",
        field(old, "min_rows"),
        field(new, "min_rows"),
        true,
        out,
    );
    // max_rows: a lower ceiling is a stronger promise.
    diff_volume_field(
        "volume.max_rows",
        field(old, "max_rows"),
        field(new, "max_rows"),
        false,
        out,
    );
}

fn diff_volume_field(
    path: &str,
    old: Option<f64>,
    new: Option<f64>,
    higher_is_tighter: bool,
    out: &mut Vec<GuaranteeChange>,
) {
    let (kind, severity, message) = match (old, new) {
        (None, None) => return,
        (Some(a), Some(b)) if a == b => return,
        (None, Some(b)) => (
            GuaranteeChangeKind::VolumeTightened,
            GuaranteeSeverity::Info,
            format!("{path} guarantee added ({b})"),
        ),
        (Some(a), None) => (
            GuaranteeChangeKind::VolumeRelaxed,
            GuaranteeSeverity::Warning,
            format!("{path} guarantee removed (was {a})"),
        ),
        (Some(a), Some(b)) => {
            let tightened = if higher_is_tighter { b > a } else { b < a };
            if tightened {
                (
                    GuaranteeChangeKind::VolumeTightened,
                    GuaranteeSeverity::Info,
                    format!("{path} tightened ({a} -> {b})"),
                )
            } else {
                (
                    GuaranteeChangeKind::VolumeRelaxed,
                    GuaranteeSeverity::Warning,
                    format!("{path} relaxed ({a} -> {b})"),
                )
            }
        }
    };
    out.push(GuaranteeChange::new(kind, severity, path, message));
}

// ----------------------------------------------------------------------------
// Relationships
// ----------------------------------------------------------------------------

fn diff_relationships(
    old: Option<&BTreeMap<String, Value>>,
    new: Option<&BTreeMap<String, Value>>,
    out: &mut Vec<GuaranteeChange>,
) {
    let empty = BTreeMap::new();
    let old = old.unwrap_or(&empty);
    let new = new.unwrap_or(&empty);

    let columns: std::collections::BTreeSet<&String> = old.keys().chain(new.keys()).collect();
    for col in columns {
        match (old.get(col), new.get(col)) {
            (None, Some(_)) => out.push(GuaranteeChange::new(
                GuaranteeChangeKind::RelationshipAdded,
                GuaranteeSeverity::Info,
                format!("relationships.{col}"),
                format!("relationship guarantee added on '{col}'"),
            )),
            (Some(_), None) => out.push(GuaranteeChange::new(
                GuaranteeChangeKind::RelationshipRemoved,
                GuaranteeSeverity::Warning,
                format!("relationships.{col}"),
                format!("relationship guarantee removed from '{col}'"),
            )),
            (Some(a), Some(b)) if a != b => out.push(GuaranteeChange::new(
                GuaranteeChangeKind::RelationshipChanged,
                GuaranteeSeverity::Warning,
                format!("relationships.{col}"),
                format!("relationship guarantee changed on '{col}'"),
            )),
            _ => {}
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
