//! Utilities for generating Prometheus scrape configuration from NetBox.
//!
//! The library fetches device and virtual machine records from a NetBox
//! instance, aggregates them into deduplicated label-keyed target groups, and
//! renders deterministic file_sd YAML documents plus a static `netbox_meta`
//! exposition file. Output files are replaced atomically and only when their
//! content actually changed, so a cron-driven run that finds nothing new
//! leaves the scrape configuration untouched.

mod builder;
mod error;
mod model;
mod netbox;
mod render;
mod writer;

pub use builder::{
    LabelSet, MetaLabels, NODE_TARGETS_FILE, SNMP_TARGETS_FILE, TargetBuilder,
    WINDOWS_TARGETS_FILE
};
pub use error::{Error, io_error};
pub use model::{InventoryItem, ItemKind};
pub use netbox::{Filter, NetBoxClient};
pub use render::{GENERATED_HEADER, gen_target_file, render_metrics};
pub use writer::replace_file;
