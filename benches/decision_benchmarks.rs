// SPDX-License-Identifier: PMPL-1.0-or-later
//! Performance benchmarks for the EduGate decision path

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;
use tokio::runtime::Runtime;

use edugate_engine::{InMemoryDirectory, PageGuard, RuleEngine, SubjectId};
use edugate_policy::{PolicyConfig, ResourceAttributes, SubjectAttributes};

fn school_engine(rt: &Runtime, subjects: usize) -> Arc<RuleEngine> {
    let directory = Arc::new(InMemoryDirectory::new());
    rt.block_on(async {
        for i in 0..subjects {
            let role = ["student", "parent", "teacher", "admin"][i % 4];
            directory.assign_role(format!("u{i}"), role).await;
            directory
                .set_attributes(
                    SubjectAttributes::new(format!("u{i}"))
                        .with_children([format!("child{i}")])
                        .with_classes(["7b"]),
                )
                .await;
        }
    });
    let engine = RuleEngine::builder(PolicyConfig::school_default().unwrap())
        .with_directory(directory)
        .build()
        .unwrap();
    Arc::new(engine)
}

// ============================================================================
// Permission checks
// ============================================================================

fn bench_has_permission(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let engine = school_engine(&rt, 4);
    let teacher = SubjectId::from("u2");

    let mut group = c.benchmark_group("has_permission");

    group.bench_function("cache_hit", |b| {
        rt.block_on(engine.has_permission(&teacher, "homework.correct"));
        b.to_async(&rt)
            .iter(|| async { black_box(engine.has_permission(&teacher, "homework.correct").await) });
    });

    group.bench_function("cache_miss", |b| {
        b.to_async(&rt).iter(|| async {
            engine.invalidate_cache(None).await;
            black_box(engine.has_permission(&teacher, "homework.correct").await)
        });
    });

    group.bench_function("unknown_permission", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(engine.has_permission(&teacher, "homework.teleport").await) });
    });

    group.finish();
}

fn bench_many_subjects(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("subjects");

    for count in [10usize, 100, 1000] {
        let engine = school_engine(&rt, count);
        let subjects: Vec<SubjectId> = (0..count).map(|i| SubjectId::new(format!("u{i}"))).collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("homework_view", count), &subjects, |b, subjects| {
            b.to_async(&rt).iter(|| async {
                for subject in subjects {
                    black_box(engine.has_permission(subject, "homework.view").await);
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Dynamic checks, groups and pages
// ============================================================================

fn bench_dynamic_and_groups(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let engine = school_engine(&rt, 4);
    let parent = SubjectId::from("u1");
    let own_child = ResourceAttributes::for_student("child1");
    let guard = PageGuard::new(Arc::clone(&engine));

    let mut group = c.benchmark_group("composite");

    group.bench_function("dynamic_guardianship", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(
                engine
                    .check_dynamic_permission(&parent, "analysis.view_child", &own_child)
                    .await,
            )
        });
    });

    group.bench_function("group_all", |b| {
        b.to_async(&rt).iter(|| async {
            black_box(engine.has_permission_group(&parent, "parent_monitoring").await.unwrap())
        });
    });

    group.bench_function("accessible_pages", |b| {
        b.to_async(&rt)
            .iter(|| async { black_box(guard.accessible_pages(&parent).await) });
    });

    group.finish();
}

criterion_group!(benches, bench_has_permission, bench_many_subjects, bench_dynamic_and_groups);
criterion_main!(benches);
