use criterion::{black_box, criterion_group, criterion_main, Criterion};
use uuid::Uuid;
use veridex::ontology::{expand, OntologySnapshot};
use veridex::types::{Alias, OntologyRelation, OntologyTerm, RelationKind};

fn sample_snapshot() -> OntologySnapshot {
    let rust = Uuid::new_v4();
    let systems_programming = Uuid::new_v4();
    let memory_safety = Uuid::new_v4();

    let terms = vec![
        OntologyTerm {
            id: rust,
            term: "rust".to_string(),
            parent: None,
            synonyms: vec!["rustlang".to_string()],
            relations: vec![
                OntologyRelation { target: systems_programming, kind: RelationKind::Broader, weight: 0.8 },
                OntologyRelation { target: memory_safety, kind: RelationKind::Related, weight: 0.6 },
            ],
        },
        OntologyTerm { id: systems_programming, term: "systems programming".to_string(), parent: None, synonyms: vec![], relations: vec![] },
        OntologyTerm { id: memory_safety, term: "memory safety".to_string(), parent: None, synonyms: vec![], relations: vec![] },
    ];

    let aliases = vec![
        Alias { term: "rust".to_string(), alias: "rustlang".to_string(), weight: 0.9 },
        Alias { term: "rust".to_string(), alias: "crab language".to_string(), weight: 0.4 },
    ];

    OntologySnapshot::new(terms, aliases, vec![])
}

fn ontology_expand_benchmark(c: &mut Criterion) {
    let snapshot = sample_snapshot();
    let query = "rust memory safety for systems programming";

    c.bench_function("ontology_expand", |b| {
        b.iter(|| expand(black_box(query), black_box(&snapshot)));
    });
}

criterion_group!(benches, ontology_expand_benchmark);
criterion_main!(benches);
