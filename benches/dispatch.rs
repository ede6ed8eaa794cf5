use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use tabvisit::{BasicNode, Engine, EngineConfig, Group, RuleModule, RuleRegistry, SelectorCache, SourceFile};

/// A staff of `measures` measures with six notes each.
fn build_tree(measures: usize) -> BasicNode {
    (0..measures).fold(BasicNode::new("Staff"), |staff, _| {
        let measure = (0..6_u8).fold(BasicNode::new("Measure"), |measure, string| {
            measure.child(
                BasicNode::new("Note")
                    .attr("string", string + 1)
                    .attr("fret", string * 2),
            )
        });
        staff.child(measure)
    })
}

/// `n` counting rules, each on its own selector, chained by dependency.
fn build_registry(n: usize) -> (RuleRegistry<BasicNode>, Vec<Group>) {
    const SELECTORS: [&str; 4] = ["Note", "Measure > Note[fret>=4]", ":is(Note, Rest)", "Staff Note:exit"];

    let mut registry: RuleRegistry<BasicNode> = RuleRegistry::new();
    let mut ids = Vec::new();
    for i in 0..n {
        let id = format!("r{i}");
        let mut rule = RuleModule::<BasicNode>::new(&id, || 0_usize)
            .on(SELECTORS[i % SELECTORS.len()], |_, cx| cx.set_state(|c: usize| c + 1));
        if i > 0 {
            rule = rule.depends_on(&format!("r{}", i - 1));
        }
        registry = registry.define(rule);
        ids.push(id);
    }
    let members: Vec<&str> = ids.iter().map(String::as_str).collect();
    (registry, vec![Group::new("bench", &members)])
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    let source = SourceFile::new("");

    for &measures in &[10, 100, 1000] {
        let tree = build_tree(measures);
        for &rules in &[4, 16] {
            let (registry, groups) = build_registry(rules);
            let config = EngineConfig::new();
            group.bench_function(&format!("{measures}_measures_{rules}_rules"), |b| {
                b.iter_batched(
                    || Engine::new(&registry, &groups, &config).unwrap(),
                    |engine| engine.run(black_box(&tree), &source).unwrap(),
                    BatchSize::SmallInput,
                );
            });
        }
    }

    group.finish();
}

fn bench_setup(c: &mut Criterion) {
    let mut group = c.benchmark_group("setup");

    for &rules in &[4, 16, 64] {
        let (registry, groups) = build_registry(rules);
        let config = EngineConfig::new();

        group.bench_function(&format!("{rules}_rules_cold"), |b| {
            b.iter(|| Engine::new(&registry, black_box(&groups), &config).unwrap());
        });

        let warm = Engine::new(&registry, &groups, &config).unwrap().selector_cache().clone();
        group.bench_function(&format!("{rules}_rules_warm_cache"), |b| {
            b.iter_batched(
                || warm.clone(),
                |cache| Engine::with_cache(&registry, black_box(&groups), &config, cache).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

fn bench_selector_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector_parse");

    for text in ["Note", "Staff Measure > Note[fret>=12][string=1]", ":not(:is(Note, Rest) > *, [muted])"] {
        group.bench_function(text, |b| {
            b.iter(|| SelectorCache::new().parse(black_box(text)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_run, bench_setup, bench_selector_parse);
criterion_main!(benches);
