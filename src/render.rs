//! Deterministic rendering of the accumulated maps.
//!
//! Target groups become YAML documents in the Prometheus file_sd shape and
//! metadata entries become one exposition-format line each. Both renderers
//! sort their input so identical inventory data yields byte-identical output,
//! which is what lets the writer skip unchanged files.

use std::{collections::BTreeMap, sync::LazyLock};

use regex::Regex;
use serde::Serialize;

use crate::{
    builder::{LabelSet, MetaLabels},
    error::Error
};

/// Comment prepended to every generated target file.
pub const GENERATED_HEADER: &str =
    "# Auto-generated from NetBox, do not edit as your changes will be overwritten!\n";

static LABEL_KEY_INVALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_]").expect("valid pattern"));

/// One rendered target group in the file_sd document.
#[derive(Debug, Serialize)]
struct TargetGroupRecord {
    labels:  BTreeMap<String, String>,
    targets: Vec<String>
}

/// Renders the target groups of one output file as a YAML document.
///
/// Groups appear sorted by label set and each group's target list is sorted
/// lexicographically; rendered label mappings are key-sorted. The do-not-edit
/// header comes first.
///
/// # Errors
///
/// Returns an [`Error`] when YAML encoding fails.
pub fn gen_target_file(groups: &BTreeMap<LabelSet, Vec<String>>) -> Result<String, Error> {
    let mut records = Vec::with_capacity(groups.len());
    for (labels, targets) in groups {
        let mut sorted_targets = targets.clone();
        sorted_targets.sort();

        records.push(TargetGroupRecord {
            labels:  labels.pairs().iter().cloned().collect(),
            targets: sorted_targets
        });
    }

    let body = serde_yaml::to_string(&records)?;
    Ok(format!("{GENERATED_HEADER}{body}"))
}

/// Renders all metadata entries as exposition-format lines.
///
/// One `netbox_meta{...} 1` line per (instance, kind) pair, sorted
/// lexicographically; each entry's labels follow in insertion order with
/// sanitized keys and quote-escaped values.
pub fn render_metrics(metrics: &BTreeMap<(String, String), MetaLabels>) -> String {
    let mut content = String::new();
    for ((instance, kind), labels) in metrics {
        content.push_str(&format!("netbox_meta{{instance=\"{instance}\",netbox_type=\"{kind}\""));
        for (key, value) in labels.iter() {
            content.push_str(&format!(",{}=\"{}\"", sanitize_key(key), escape_value(value)));
        }
        content.push_str("} 1\n");
    }
    content
}

/// Replaces every character outside `[A-Za-z0-9_]` with an underscore.
fn sanitize_key(key: &str) -> String {
    LABEL_KEY_INVALID.replace_all(key, "_").into_owned()
}

/// Escapes embedded double quotes for exposition-format label values.
fn escape_value(value: &str) -> String {
    value.replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use proptest::prelude::*;

    use super::{GENERATED_HEADER, escape_value, gen_target_file, render_metrics, sanitize_key};
    use crate::builder::{LabelSet, MetaLabels};

    fn groups_fixture() -> BTreeMap<LabelSet, Vec<String>> {
        let mut groups = BTreeMap::new();
        groups.insert(
            LabelSet::new("device", &[("module".to_owned(), "IF-MIB".to_owned())]),
            vec!["sw2/10.0.0.6".to_owned(), "sw1/10.0.0.5".to_owned()]
        );
        groups.insert(LabelSet::new("vm", &[]), vec!["web1".to_owned()]);
        groups
    }

    #[test]
    fn target_file_starts_with_header() {
        let content = gen_target_file(&groups_fixture()).expect("render failed");
        assert!(content.starts_with(GENERATED_HEADER));
    }

    #[test]
    fn target_lists_are_sorted() {
        let content = gen_target_file(&groups_fixture()).expect("render failed");
        let sw1 = content.find("sw1/10.0.0.5").expect("missing sw1");
        let sw2 = content.find("sw2/10.0.0.6").expect("missing sw2");
        assert!(sw1 < sw2, "targets must be sorted lexicographically");
    }

    #[test]
    fn groups_are_sorted_by_label_set() {
        let content = gen_target_file(&groups_fixture()).expect("render failed");
        let device_group = content.find("netbox_type: device").expect("missing device group");
        let vm_group = content.find("netbox_type: vm").expect("missing vm group");
        assert!(device_group < vm_group);
    }

    #[test]
    fn rendered_group_carries_labels_and_targets() {
        let content = gen_target_file(&groups_fixture()).expect("render failed");
        assert!(content.contains("module: IF-MIB"));
        assert!(content.contains("web1"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let groups = groups_fixture();
        let first = gen_target_file(&groups).expect("render failed");
        let second = gen_target_file(&groups).expect("render failed");
        assert_eq!(first, second);
    }

    #[test]
    fn metrics_line_matches_exposition_format() {
        let mut labels = MetaLabels::default();
        labels.set("site", "hq");
        labels.set("tags_prom_node", "1");

        let mut metrics = BTreeMap::new();
        metrics.insert(("host1".to_owned(), "device".to_owned()), labels);

        let content = render_metrics(&metrics);
        assert_eq!(
            content,
            "netbox_meta{instance=\"host1\",netbox_type=\"device\",site=\"hq\",tags_prom_node=\"1\"} 1\n"
        );
    }

    #[test]
    fn metrics_entries_are_sorted_by_instance_and_kind() {
        let mut metrics = BTreeMap::new();
        metrics.insert(("b".to_owned(), "device".to_owned()), MetaLabels::default());
        metrics.insert(("a".to_owned(), "vm".to_owned()), MetaLabels::default());

        let content = render_metrics(&metrics);
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines[0].contains("instance=\"a\""));
        assert!(lines[1].contains("instance=\"b\""));
    }

    #[test]
    fn label_keys_are_sanitized() {
        let mut labels = MetaLabels::default();
        labels.set("foo bar", "baz");

        let mut metrics = BTreeMap::new();
        metrics.insert(("host1".to_owned(), "device".to_owned()), labels);

        let content = render_metrics(&metrics);
        assert!(content.contains("foo_bar=\"baz\""));
    }

    #[test]
    fn label_values_escape_embedded_quotes() {
        let mut labels = MetaLabels::default();
        labels.set("note", "a\"b");

        let mut metrics = BTreeMap::new();
        metrics.insert(("host1".to_owned(), "device".to_owned()), labels);

        let content = render_metrics(&metrics);
        assert!(content.contains("note=\"a\\\"b\""));
    }

    #[test]
    fn empty_metrics_render_nothing() {
        assert!(render_metrics(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn sanitize_key_keeps_word_characters() {
        assert_eq!(sanitize_key("tags_prom_node"), "tags_prom_node");
        assert_eq!(sanitize_key("foo-bar.baz"), "foo_bar_baz");
    }

    #[test]
    fn escape_value_leaves_plain_values_alone() {
        assert_eq!(escape_value("plain"), "plain");
    }

    proptest! {
        #[test]
        fn sanitized_keys_contain_only_word_characters(key in ".*") {
            let sanitized = sanitize_key(&key);
            prop_assert!(sanitized.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        }

        #[test]
        fn rendering_any_groups_twice_is_identical(
            targets in proptest::collection::vec("[a-z0-9./]{1,20}", 0..8)
        ) {
            let mut groups = BTreeMap::new();
            groups.insert(LabelSet::new("device", &[]), targets);
            let first = gen_target_file(&groups).expect("render failed");
            let second = gen_target_file(&groups).expect("render failed");
            prop_assert_eq!(first, second);
        }
    }
}
