//! Aggregation of inventory records into scrape-target groups and metadata
//! entries.
//!
//! The builder accumulates two maps during one run: target groups keyed by
//! output file and label set, and metadata entries keyed by instance name and
//! kind. Both maps are ordered so the renderer produces byte-identical output
//! for identical inventory data. The scrape policy itself lives in
//! [`TargetBuilder::build`], which is the single place that decides which
//! tagged collections land in which file.

use std::{collections::BTreeMap, path::Path, sync::LazyLock};

use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::Error,
    model::InventoryItem,
    netbox::{Filter, NetBoxClient},
    render, writer
};

/// Output file receiving node exporter targets.
pub const NODE_TARGETS_FILE: &str = "node_targets.yml";
/// Output file receiving SNMP exporter targets.
pub const SNMP_TARGETS_FILE: &str = "snmp_targets.yml";
/// Output file receiving Windows exporter targets.
pub const WINDOWS_TARGETS_FILE: &str = "windows_targets.yml";

const NODE_TAG: &str = "prom_node";
const SNMP_TAG: &str = "prom_snmp";
const WINDOWS_TAG: &str = "prom_windows";

static CIDR_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/\d+$").expect("valid pattern"));

/// Ordered label set identifying one target group within an output file.
///
/// The `netbox_type` label always comes first, followed by the caller's
/// extra labels in sorted order, so group keys compare deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LabelSet(Vec<(String, String)>);

impl LabelSet {
    /// Builds a label set from the normalized kind and extra labels.
    pub fn new(kind: &str, extra: &[(String, String)]) -> Self {
        let mut pairs = Vec::with_capacity(extra.len() + 1);
        pairs.push(("netbox_type".to_owned(), kind.to_owned()));

        let mut sorted = extra.to_vec();
        sorted.sort();
        pairs.extend(sorted);

        Self(pairs)
    }

    /// Returns the label pairs in key order.
    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }
}

/// Insertion-ordered label map attached to one metadata entry.
///
/// Exposition rendering preserves the order labels were first set in, so a
/// plain ordered vector with upsert semantics is used instead of a hash map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaLabels(Vec<(String, String)>);

impl MetaLabels {
    /// Sets a label, replacing the value when the key is already present.
    pub fn set<V>(&mut self, key: &str, value: V)
    where
        V: Into<String>
    {
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| existing == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key.to_owned(), value))
        }
    }

    /// Returns the value stored for the given key, when present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    /// Iterates labels in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Returns the number of labels stored.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether no labels are stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Accumulates inventory records into target groups and metadata entries.
///
/// One instance owns both maps for the lifetime of one run; after
/// [`TargetBuilder::build`] completes they are only read, never mutated.
#[derive(Debug, Default)]
pub struct TargetBuilder {
    targets: BTreeMap<String, BTreeMap<LabelSet, Vec<String>>>,
    metrics: BTreeMap<(String, String), MetaLabels>
}

impl TargetBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the accumulated target groups per output file.
    pub fn targets(&self) -> &BTreeMap<String, BTreeMap<LabelSet, Vec<String>>> {
        &self.targets
    }

    /// Returns the accumulated metadata entries.
    pub fn metrics(&self) -> &BTreeMap<(String, String), MetaLabels> {
        &self.metrics
    }

    /// Adds one record to the target group identified by the output file and
    /// label set, and upserts its metadata entry.
    ///
    /// Records without a name are skipped with a diagnostic. Duplicate target
    /// strings are kept verbatim when the same record is added twice under
    /// the same key.
    ///
    /// # Arguments
    ///
    /// * `item` - Normalized inventory record
    /// * `filename` - Destination output file within the targets directory
    /// * `labels` - Extra labels distinguishing the group, may be empty
    pub fn add_target(&mut self, item: &InventoryItem, filename: &str, labels: &[(String, String)]) {
        if item.name.is_empty() {
            warn!("skipping unnamed {} record", item.kind.as_label());
            return;
        }
        let kind = item.kind.as_label();

        let target = match item.primary_ip.as_deref() {
            Some(address) => format!("{}/{}", item.name, normalize_address(address)),
            None => item.name.clone()
        };

        self.targets
            .entry(filename.to_owned())
            .or_default()
            .entry(LabelSet::new(kind, labels))
            .or_default()
            .push(target);

        let entry = self
            .metrics
            .entry((item.name.clone(), kind.to_owned()))
            .or_default();
        if let Some(tenant) = item.tenant.as_deref() {
            entry.set("tenant", tenant);
        }
        if let Some(role) = item.role.as_deref() {
            entry.set("role", role);
        }
        if let Some(site) = item.site.as_deref() {
            entry.set("site", site);
        }
        if let Some(rack) = item.rack.as_deref() {
            entry.set("rack", rack);
        }
        if let Some(cluster) = item.cluster.as_deref() {
            entry.set("cluster", cluster);
        }
        for tag in &item.tags {
            entry.set(&format!("tags_{tag}"), "1");
        }
    }

    /// Adds every record in the slice under the same file and labels.
    pub fn add_targets(
        &mut self,
        items: &[InventoryItem],
        filename: &str,
        labels: &[(String, String)]
    ) {
        for item in items {
            self.add_target(item, filename, labels);
        }
    }

    /// Adds one target per value of a configuration context variable.
    ///
    /// Records whose context lacks the variable, or carries an empty value,
    /// are skipped with a diagnostic. A scalar value is treated as a
    /// one-element sequence; each value contributes a `{param_name: value}`
    /// label, letting one record enroll in several groups at once.
    ///
    /// # Arguments
    ///
    /// * `items` - Normalized inventory records
    /// * `filename` - Destination output file within the targets directory
    /// * `context_var` - Key looked up in each record's config context
    /// * `param_name` - Label key carrying each context value
    pub fn add_targets_ctx(
        &mut self,
        items: &[InventoryItem],
        filename: &str,
        context_var: &str,
        param_name: &str
    ) {
        for item in items {
            let values = context_values(&item.config_context, context_var);
            if values.is_empty() {
                warn!("item {}: missing or empty {}", item.name, context_var);
                continue;
            }
            for value in values {
                self.add_target(item, filename, &[(param_name.to_owned(), value)]);
            }
        }
    }

    /// Runs the scrape policy: queries each tagged collection and feeds it
    /// into the matching output file.
    ///
    /// Collections are fetched sequentially; extending the policy means
    /// adding another query here.
    ///
    /// # Arguments
    ///
    /// * `client` - NetBox client used for all collection queries
    /// * `filter` - Base filter AND-combined with every per-collection tag
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when any collection query fails; nothing is
    /// rendered or written in that case.
    pub async fn build(&mut self, client: &NetBoxClient, filter: &Filter) -> Result<(), Error> {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.yellow} [{elapsed_precise}] {msg}")
                .expect("valid template")
        );

        pb.set_message("Fetching node exporter devices...");
        let devices = client.devices(&filter.clone().tag(NODE_TAG)).await?;
        self.add_targets(&devices, NODE_TARGETS_FILE, &[]);

        pb.set_message("Fetching node exporter virtual machines...");
        let vms = client.virtual_machines(&filter.clone().tag(NODE_TAG)).await?;
        self.add_targets(&vms, NODE_TARGETS_FILE, &[]);

        pb.set_message("Fetching SNMP devices...");
        let snmp_devices = client.devices(&filter.clone().tag(SNMP_TAG)).await?;
        // SNMP polling stays device-only; VMs carry no SNMP agents here.
        self.add_targets_ctx(&snmp_devices, SNMP_TARGETS_FILE, "snmp_mibs", "module");

        pb.set_message("Fetching Windows exporter devices...");
        let windows_devices = client.devices(&filter.clone().tag(WINDOWS_TAG)).await?;
        self.add_targets(&windows_devices, WINDOWS_TARGETS_FILE, &[]);

        pb.set_message("Fetching Windows exporter virtual machines...");
        let windows_vms = client.virtual_machines(&filter.clone().tag(WINDOWS_TAG)).await?;
        self.add_targets(&windows_vms, WINDOWS_TARGETS_FILE, &[]);

        pb.finish_and_clear();
        info!(
            "aggregated {} target files and {} metadata entries",
            self.targets.len(),
            self.metrics.len()
        );

        Ok(())
    }

    /// Renders and persists every accumulated target file into the directory.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when rendering fails or a file cannot be written.
    pub fn write_targets(&self, dir: &Path) -> Result<(), Error> {
        for (filename, groups) in &self.targets {
            let content = render::gen_target_file(groups)?;
            writer::replace_file(&dir.join(filename), &content)?;
        }
        Ok(())
    }

    /// Renders and persists the metadata metric file.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`] when the file cannot be written.
    pub fn write_metrics(&self, path: &Path) -> Result<(), Error> {
        writer::replace_file(path, &render::render_metrics(&self.metrics))?;
        Ok(())
    }
}

/// Normalizes a primary address into its target form.
///
/// Strips a trailing CIDR prefix length and bracket-wraps IPv6 addresses so
/// the `name/address` target string stays unambiguous.
fn normalize_address(address: &str) -> String {
    let stripped = CIDR_SUFFIX.replace(address, "");
    if stripped.contains(':') {
        format!("[{stripped}]")
    } else {
        stripped.into_owned()
    }
}

/// Extracts the values of a context variable as a list of strings.
///
/// A missing, null, or empty value yields an empty list; a scalar is treated
/// as a one-element sequence. Nested mappings and arrays are not valid label
/// values and are dropped.
fn context_values(context: &Value, context_var: &str) -> Vec<String> {
    let value = match context.get(context_var) {
        Some(value) => value,
        None => return Vec::new()
    };

    match value {
        Value::Array(values) => values.iter().filter_map(scalar_value).collect(),
        other => scalar_value(other).into_iter().collect()
    }
}

fn scalar_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None
    }
}
