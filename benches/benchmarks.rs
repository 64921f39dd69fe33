// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use netbox_prom_sd::{
    InventoryItem, ItemKind, LabelSet, MetaLabels, TargetBuilder, gen_target_file, render_metrics
};

fn synthetic_inventory(count: usize) -> Vec<InventoryItem> {
    (0..count)
        .map(|i| {
            let mut item = InventoryItem::new(ItemKind::Device, format!("host{i}"));
            item.primary_ip = Some(format!("10.0.{}.{}/24", i / 256, i % 256));
            item.site = Some("hq".to_owned());
            item.role = Some("server".to_owned());
            item.tags = vec!["prom_node".to_owned()];
            item
        })
        .collect()
}

fn benchmark_aggregation(c: &mut Criterion) {
    let items = synthetic_inventory(500);

    c.bench_function("aggregate_500_devices", |b| {
        b.iter(|| {
            let mut builder = TargetBuilder::new();
            builder.add_targets(black_box(&items), "node_targets.yml", &[]);
            black_box(builder.targets().len())
        })
    });
}

fn benchmark_target_rendering(c: &mut Criterion) {
    let mut items = synthetic_inventory(500);
    items.reverse();

    let mut builder = TargetBuilder::new();
    builder.add_targets(&items, "node_targets.yml", &[]);
    let groups = &builder.targets()["node_targets.yml"];

    c.bench_function("render_500_targets", |b| {
        b.iter(|| gen_target_file(black_box(groups)).expect("render failed"))
    });
}

fn benchmark_fanned_out_rendering(c: &mut Criterion) {
    let mut groups: BTreeMap<LabelSet, Vec<String>> = BTreeMap::new();
    for module in 0..50 {
        let labels = LabelSet::new(
            "device",
            &[("module".to_owned(), format!("MIB-{module}"))]
        );
        groups.insert(labels, (0..10).map(|i| format!("sw{i}")).collect());
    }

    c.bench_function("render_50_groups", |b| {
        b.iter(|| gen_target_file(black_box(&groups)).expect("render failed"))
    });
}

fn benchmark_metrics_rendering(c: &mut Criterion) {
    let mut metrics = BTreeMap::new();
    for i in 0..500 {
        let mut labels = MetaLabels::default();
        labels.set("site", "hq");
        labels.set("role", "server");
        labels.set("tags_prom_node", "1");
        metrics.insert((format!("host{i}"), "device".to_owned()), labels);
    }

    c.bench_function("render_500_metric_lines", |b| {
        b.iter(|| render_metrics(black_box(&metrics)))
    });
}

criterion_group!(
    benches,
    benchmark_aggregation,
    benchmark_target_rendering,
    benchmark_fanned_out_rendering,
    benchmark_metrics_rendering
);
criterion_main!(benches);
