//! Annotation store invariants under mixed operation sequences

use shotnote::{Annotation, AnnotationKind, AnnotationPatch, AnnotationStore, StoreEvent};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Tiny deterministic generator so sequences are reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn anno(id: &str, kind: AnnotationKind) -> Annotation {
    Annotation::new(id, 10.0, 20.0, format!("note {}", id), kind)
}

#[test]
fn ids_stay_unique_and_order_is_insertion_order() {
    for seed in 1..20u64 {
        let mut rng = Lcg(seed);
        let mut store = AnnotationStore::new();
        let mut inserted: Vec<String> = Vec::new();

        for _ in 0..200 {
            match rng.next() % 4 {
                0 | 1 => {
                    // Reuses ids on purpose; duplicates must be rejected
                    let id = format!("a{}", rng.next() % 40);
                    if store.add(anno(&id, AnnotationKind::Suggestion)).is_ok() {
                        inserted.push(id);
                    }
                }
                2 => {
                    let id = format!("a{}", rng.next() % 40);
                    store.update(&id, AnnotationPatch::kind(AnnotationKind::Error));
                }
                _ => {
                    let id = format!("a{}", rng.next() % 40);
                    if store.delete(&id) {
                        inserted.retain(|x| x != &id);
                    }
                }
            }

            let ids: Vec<&str> = store.list().iter().map(|a| a.id.as_str()).collect();
            let unique: HashSet<&str> = ids.iter().copied().collect();
            assert_eq!(unique.len(), ids.len(), "duplicate id with seed {}", seed);
            assert_eq!(ids, inserted.iter().map(String::as_str).collect::<Vec<_>>());
        }
    }
}

#[test]
fn update_scenario_changes_only_first() {
    let mut store = AnnotationStore::new();
    store
        .add(Annotation::new("a1", 100.0, 100.0, "Low contrast", AnnotationKind::Warning))
        .unwrap();
    store
        .add(Annotation::new("a2", 200.0, 150.0, "Busy hero", AnnotationKind::Suggestion))
        .unwrap();
    let second = store.list()[1].clone();

    assert!(store.update("a1", AnnotationPatch::kind(AnnotationKind::Error)));

    assert_eq!(store.list()[0].kind, AnnotationKind::Error);
    assert_eq!(store.list()[0].text, "Low contrast");
    assert_eq!((store.list()[0].x, store.list()[0].y), (100.0, 100.0));
    assert_eq!(store.list()[1], second);
}

#[test]
fn clear_after_five() {
    let mut store = AnnotationStore::new();
    for i in 0..5 {
        store.add(anno(&format!("c{}", i), AnnotationKind::Warning)).unwrap();
    }
    store.clear();
    assert_eq!(store.list().len(), 0);
}

#[test]
fn unknown_ids_do_not_notify() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let mut store = AnnotationStore::new();
    store.on_change(move |e| sink.lock().unwrap().push(e.clone()));

    store.add(anno("x", AnnotationKind::Error)).unwrap();
    store.update("ghost", AnnotationPatch::text("boo"));
    store.delete("ghost");
    store.delete("x");

    assert_eq!(
        *events.lock().unwrap(),
        vec![StoreEvent::Added("x".into()), StoreEvent::Deleted("x".into())]
    );
}

#[test]
fn annotations_serialize_with_type_field() {
    let json = r#"[{"id":"a1","x":100,"y":100,"text":"Low contrast","type":"warning"}]"#;
    let list: Vec<Annotation> = serde_json::from_str(json).unwrap();
    assert_eq!(list[0].kind, AnnotationKind::Warning);
    let back = serde_json::to_value(&list[0]).unwrap();
    assert_eq!(back["type"], "warning");
    let bogus = r#"[{"id":"b","x":1,"y":1,"text":"","type":"bogus"}]"#;
    assert!(serde_json::from_str::<Vec<Annotation>>(bogus).is_err());
}
