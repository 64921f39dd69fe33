//! Domain records describing inventory items fetched from NetBox.
//!
//! The types in this module are the normalized view of the heterogeneous
//! payloads returned by the NetBox API. The record category is carried as an
//! explicit [`ItemKind`] tag assigned at ingestion time, and every optional
//! relation is resolved into a plain optional string so downstream
//! aggregation never probes for attributes that may not exist.

use serde_json::Value;

/// Category of an inventory record.
///
/// The canonical categories map onto the short labels used in generated
/// output (`device` and `vm`). Categories introduced by future inventory
/// collections pass through verbatim via [`ItemKind::Other`].
///
/// # Examples
///
/// ```
/// use netbox_prom_sd::ItemKind;
///
/// assert_eq!(ItemKind::Device.as_label(), "device");
/// assert_eq!(ItemKind::VirtualMachine.as_label(), "vm");
/// assert_eq!(ItemKind::Other("Cluster".to_owned()).as_label(), "Cluster");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemKind {
    /// A physical device from the DCIM collection.
    Device,
    /// A virtual machine from the virtualization collection.
    VirtualMachine,
    /// Any other record category, kept verbatim.
    Other(String)
}

impl ItemKind {
    /// Returns the normalized label used for the `netbox_type` label and
    /// metadata metric keys.
    pub fn as_label(&self) -> &str {
        match self {
            Self::Device => "device",
            Self::VirtualMachine => "vm",
            Self::Other(name) => name
        }
    }
}

/// Normalized inventory record consumed by the aggregator.
///
/// Instances are produced by the NetBox client when converting raw API
/// payloads; relation fields hold the related object's slug (tenant, role,
/// site) or name (rack, cluster) and stay `None` when the relation is absent
/// in the source record. The role of a device falls back from `device_role`
/// to `role` during conversion, so consumers only ever see a single resolved
/// value.
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryItem {
    /// Record category assigned at ingestion time.
    pub kind:           ItemKind,
    /// Display name; an empty name excludes the record from all output.
    pub name:           String,
    /// Primary address in CIDR notation, when one is assigned.
    pub primary_ip:     Option<String>,
    /// Tag names attached to the record.
    pub tags:           Vec<String>,
    /// Slug of the owning tenant.
    pub tenant:         Option<String>,
    /// Slug of the functional role.
    pub role:           Option<String>,
    /// Slug of the site housing the record.
    pub site:           Option<String>,
    /// Name of the rack housing the record (racks have no slug).
    pub rack:           Option<String>,
    /// Name of the cluster hosting the record (clusters have no slug).
    pub cluster:        Option<String>,
    /// Rendered configuration context attached to the record.
    pub config_context: Value
}

impl InventoryItem {
    /// Creates a minimal record with the given kind and name.
    ///
    /// All optional relations start empty; callers fill in what the source
    /// payload provides. Mostly useful for tests and synthetic inventories.
    pub fn new<N>(kind: ItemKind, name: N) -> Self
    where
        N: Into<String>
    {
        Self {
            kind,
            name: name.into(),
            primary_ip: None,
            tags: Vec::new(),
            tenant: None,
            role: None,
            site: None,
            rack: None,
            cluster: None,
            config_context: Value::Null
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{InventoryItem, ItemKind};

    #[test]
    fn canonical_kinds_map_to_short_labels() {
        assert_eq!(ItemKind::Device.as_label(), "device");
        assert_eq!(ItemKind::VirtualMachine.as_label(), "vm");
    }

    #[test]
    fn unknown_kind_passes_through_verbatim() {
        let kind = ItemKind::Other("Cluster".to_owned());
        assert_eq!(kind.as_label(), "Cluster");
    }

    #[test]
    fn new_record_starts_without_relations() {
        let item = InventoryItem::new(ItemKind::Device, "sw1");

        assert_eq!(item.name, "sw1");
        assert!(item.primary_ip.is_none());
        assert!(item.tags.is_empty());
        assert!(item.tenant.is_none());
        assert!(item.role.is_none());
        assert!(item.site.is_none());
        assert!(item.rack.is_none());
        assert!(item.cluster.is_none());
        assert!(item.config_context.is_null());
    }
}
