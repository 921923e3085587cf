//! Snapshot differ.
//!
//! [`diff_snapshots`] turns two successive telemetry snapshots into an
//! ordered list of field-level [`FieldChange`] records. It is deliberately
//! asymmetric: a field present in the current snapshot that is absent or
//! unequal in the previous one yields a record, while a field that
//! disappears yields nothing — the device's telemetry is sparse, and
//! absence carries no information. Consumers therefore never see deletion
//! events, and must not infer them.

use std::fmt;
use std::fmt::Write as _;

use serde_json::Value;

/// One field-level delta between two snapshots.
///
/// Transient: produced per diff pass, consumed by the job engine and the
/// logbook, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// Locator of the changed field, e.g. `ams.ams[0].tray[2].remain`.
    pub path: String,
    /// Previous value; `Null` when the field is newly reported.
    pub old_value: Value,
    /// Current value.
    pub new_value: Value,
}

impl FieldChange {
    fn new(path: String, old_value: Value, new_value: Value) -> Self {
        Self {
            path,
            old_value,
            new_value,
        }
    }
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.path, self.old_value, self.new_value)
    }
}

/// Diff two snapshots.
///
/// Traversal follows the current snapshot: object keys in map order,
/// array elements by index, both fully deterministic for a given input
/// pair. Equality is value equality for primitives and deep structural
/// equality for nested objects/arrays. With no previous snapshot (the
/// first tick ever) the result is empty — callers special-case job
/// startup detection for that tick.
pub fn diff_snapshots(previous: Option<&Value>, current: &Value) -> Vec<FieldChange> {
    let mut changes = Vec::new();
    if let Some(previous) = previous {
        walk(previous, current, &mut String::new(), &mut changes);
    }
    changes
}

fn walk(previous: &Value, current: &Value, path: &mut String, changes: &mut Vec<FieldChange>) {
    match (previous, current) {
        (Value::Object(prev), Value::Object(curr)) => {
            for (key, curr_value) in curr {
                let mark = path.len();
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
                match prev.get(key) {
                    Some(prev_value) => walk(prev_value, curr_value, path, changes),
                    // Newly reported subtree: one record, no recursion.
                    None => changes.push(FieldChange::new(
                        path.clone(),
                        Value::Null,
                        curr_value.clone(),
                    )),
                }
                path.truncate(mark);
            }
        }
        (Value::Array(prev), Value::Array(curr)) => {
            for (index, curr_value) in curr.iter().enumerate() {
                let mark = path.len();
                let _ = write!(path, "[{index}]");
                match prev.get(index) {
                    Some(prev_value) => walk(prev_value, curr_value, path, changes),
                    None => changes.push(FieldChange::new(
                        path.clone(),
                        Value::Null,
                        curr_value.clone(),
                    )),
                }
                path.truncate(mark);
            }
        }
        _ => {
            if previous != current {
                changes.push(FieldChange::new(
                    path.clone(),
                    previous.clone(),
                    current.clone(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn equal_snapshots_yield_nothing() {
        let a = json!({"gcode_state": "RUNNING", "ams": {"tray_now": "1"}});
        assert!(diff_snapshots(Some(&a), &a.clone()).is_empty());
    }

    #[test]
    fn first_snapshot_yields_nothing() {
        let a = json!({"gcode_state": "RUNNING"});
        assert!(diff_snapshots(None, &a).is_empty());
    }

    #[test]
    fn single_leaf_change_names_its_path() {
        let prev = json!({"ams": {"ams": [{"tray": [{}, {}, {"remain": 42}]}]}});
        let curr = json!({"ams": {"ams": [{"tray": [{}, {}, {"remain": 41}]}]}});

        let changes = diff_snapshots(Some(&prev), &curr);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "ams.ams[0].tray[2].remain");
        assert_eq!(changes[0].old_value, json!(42));
        assert_eq!(changes[0].new_value, json!(41));
    }

    #[test]
    fn top_level_change_has_bare_path() {
        let prev = json!({"gcode_state": "IDLE"});
        let curr = json!({"gcode_state": "RUNNING"});

        let changes = diff_snapshots(Some(&prev), &curr);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "gcode_state");
    }

    #[test]
    fn newly_reported_field_has_null_old_value() {
        let prev = json!({});
        let curr = json!({"print_error": 0});

        let changes = diff_snapshots(Some(&prev), &curr);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_value, Value::Null);
        assert_eq!(changes[0].new_value, json!(0));
    }

    #[test]
    fn newly_reported_subtree_is_one_record() {
        let prev = json!({});
        let curr = json!({"ipcam": {"rtsp_url": "rtsps://x", "resolution": "1080p"}});

        let changes = diff_snapshots(Some(&prev), &curr);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "ipcam");
    }

    #[test]
    fn removed_field_is_silent() {
        let prev = json!({"gcode_state": "RUNNING", "subtask_name": "benchy"});
        let curr = json!({"gcode_state": "RUNNING"});
        assert!(diff_snapshots(Some(&prev), &curr).is_empty());
    }

    #[test]
    fn shrunk_array_is_silent_but_growth_reports() {
        let prev = json!({"lights_report": [{"node": "chamber_light", "mode": "on"}]});
        let curr = json!({"lights_report": []});
        assert!(diff_snapshots(Some(&prev), &curr).is_empty());

        let grown = json!({"lights_report": [
            {"node": "chamber_light", "mode": "on"},
            {"node": "work_light", "mode": "off"}
        ]});
        let changes = diff_snapshots(Some(&prev), &grown);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "lights_report[1]");
        assert_eq!(changes[0].old_value, Value::Null);
    }

    #[test]
    fn type_change_is_one_record() {
        let prev = json!({"ams": {"tray_now": "255"}});
        let curr = json!({"ams": "offline"});

        let changes = diff_snapshots(Some(&prev), &curr);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "ams");
        assert_eq!(changes[0].new_value, json!("offline"));
    }

    #[test]
    fn multiple_changes_follow_traversal_order() {
        let prev = json!({"bed_temper": 60.0, "mc_percent": 10, "nozzle_temper": 220.0});
        let curr = json!({"bed_temper": 61.0, "mc_percent": 11, "nozzle_temper": 219.5});

        let paths: Vec<_> = diff_snapshots(Some(&prev), &curr)
            .into_iter()
            .map(|c| c.path)
            .collect();
        assert_eq!(paths, vec!["bed_temper", "mc_percent", "nozzle_temper"]);
    }

    #[test]
    fn display_renders_old_and_new() {
        let prev = json!({"gcode_state": "IDLE"});
        let curr = json!({"gcode_state": "RUNNING"});
        let change = &diff_snapshots(Some(&prev), &curr)[0];
        assert_eq!(change.to_string(), r#"gcode_state: "IDLE" -> "RUNNING""#);
    }
}
