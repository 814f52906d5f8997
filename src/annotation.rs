//! Annotation records and the ordered store that owns them.
//!
//! Coordinates are always expressed in the logical (raster) space of the
//! current base image, never in on-screen display space. The store keeps
//! insertion order: "most recent" is the last element, and deleting a record
//! never reorders the survivors.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Severity of an annotation. Controls the callout color, icon and label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Error,
    Warning,
    #[default]
    Suggestion,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 3] = [
        AnnotationKind::Error,
        AnnotationKind::Warning,
        AnnotationKind::Suggestion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Error => "error",
            AnnotationKind::Warning => "warning",
            AnnotationKind::Suggestion => "suggestion",
        }
    }

    /// Upper-case label painted in the callout header
    pub fn label(&self) -> &'static str {
        match self {
            AnnotationKind::Error => "ERROR",
            AnnotationKind::Warning => "WARNING",
            AnnotationKind::Suggestion => "SUGGESTION",
        }
    }

    /// Lenient parse used for model output: anything unknown becomes a suggestion.
    pub fn parse_or_default(s: Option<&str>) -> Self {
        s.and_then(|v| v.parse().ok()).unwrap_or_default()
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AnnotationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "error" => Ok(AnnotationKind::Error),
            "warning" => Ok(AnnotationKind::Warning),
            "suggestion" => Ok(AnnotationKind::Suggestion),
            other => Err(Error::InvalidAnnotation(format!(
                "unknown annotation type '{}'",
                other
            ))),
        }
    }
}

/// A typed feedback note anchored to a point on the base image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Opaque unique identifier, stable for the annotation's lifetime
    pub id: String,
    /// Anchor x in image/raster space
    pub x: f32,
    /// Anchor y in image/raster space
    pub y: f32,
    /// Free-form body text; empty renders as an empty body
    pub text: String,
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
}

impl Annotation {
    pub fn new(
        id: impl Into<String>,
        x: f32,
        y: f32,
        text: impl Into<String>,
        kind: AnnotationKind,
    ) -> Self {
        Self {
            id: id.into(),
            x,
            y,
            text: text.into(),
            kind,
        }
    }

    /// Boundary check applied by [`AnnotationStore::add`].
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(Error::InvalidAnnotation("annotation id must not be empty".into()));
        }
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(Error::InvalidAnnotation(format!(
                "annotation '{}' has non-finite coordinates ({}, {})",
                self.id, self.x, self.y
            )));
        }
        Ok(())
    }
}

/// Fields that may change after creation. Position and id are immutable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AnnotationKind>,
}

impl AnnotationPatch {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            kind: None,
        }
    }

    pub fn kind(kind: AnnotationKind) -> Self {
        Self {
            text: None,
            kind: Some(kind),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.kind.is_none()
    }
}

/// Change notification emitted by every list-changing store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Added(String),
    Extended(usize),
    Updated(String),
    Deleted(String),
    Cleared,
}

type OnChangeHandler = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

static NEXT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Generate a fresh id of the form `<prefix>-<unix millis>-<seq>`.
///
/// The sequence is process-wide, so two ids minted in the same millisecond
/// still differ.
pub fn next_id(prefix: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", prefix, millis, seq)
}

/// Ordered collection of annotations for one surface.
#[derive(Default)]
pub struct AnnotationStore {
    items: Vec<Annotation>,
    on_change: Option<OnChangeHandler>,
}

impl fmt::Debug for AnnotationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationStore")
            .field("items", &self.items)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback fired after every list-changing call.
    pub fn on_change<F>(&mut self, cb: F)
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(cb));
    }

    /// Remove the previously registered change callback if any
    pub fn clear_on_change(&mut self) {
        self.on_change = None;
    }

    fn notify(&self, event: StoreEvent) {
        log::debug!("annotation store: {:?} ({} records)", event, self.items.len());
        if let Some(cb) = &self.on_change {
            cb(&event);
        }
    }

    fn check_insert(&self, annotation: &Annotation) -> Result<()> {
        annotation.validate()?;
        if self.get(&annotation.id).is_some() {
            return Err(Error::InvalidAnnotation(format!(
                "duplicate annotation id '{}'",
                annotation.id
            )));
        }
        Ok(())
    }

    /// Append one annotation. Rejects empty ids, duplicate ids and
    /// non-finite coordinates.
    pub fn add(&mut self, annotation: Annotation) -> Result<()> {
        self.check_insert(&annotation)?;
        let id = annotation.id.clone();
        self.items.push(annotation);
        self.notify(StoreEvent::Added(id));
        Ok(())
    }

    /// Append a batch. Every record is validated before any is inserted, so
    /// a rejected batch leaves the store untouched.
    pub fn extend(&mut self, batch: Vec<Annotation>) -> Result<usize> {
        for (i, annotation) in batch.iter().enumerate() {
            self.check_insert(annotation)?;
            if batch[..i].iter().any(|a| a.id == annotation.id) {
                return Err(Error::InvalidAnnotation(format!(
                    "duplicate annotation id '{}' in batch",
                    annotation.id
                )));
            }
        }
        let count = batch.len();
        if count == 0 {
            return Ok(0);
        }
        self.items.extend(batch);
        self.notify(StoreEvent::Extended(count));
        Ok(count)
    }

    /// Merge `patch` into the record with `id`. Returns `false` (and changes
    /// nothing) when the id is unknown.
    pub fn update(&mut self, id: &str, patch: AnnotationPatch) -> bool {
        let Some(item) = self.items.iter_mut().find(|a| a.id == id) else {
            log::debug!("annotation store: update ignored, unknown id '{}'", id);
            return false;
        };
        if let Some(text) = patch.text {
            item.text = text;
        }
        if let Some(kind) = patch.kind {
            item.kind = kind;
        }
        self.notify(StoreEvent::Updated(id.to_string()));
        true
    }

    /// Remove the record with `id` in place. Unknown ids are a no-op.
    pub fn delete(&mut self, id: &str) -> bool {
        let Some(pos) = self.items.iter().position(|a| a.id == id) else {
            log::debug!("annotation store: delete ignored, unknown id '{}'", id);
            return false;
        };
        self.items.remove(pos);
        self.notify(StoreEvent::Deleted(id.to_string()));
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.notify(StoreEvent::Cleared);
    }

    /// Ordered read-only view for rendering
    pub fn list(&self) -> &[Annotation] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.items.iter().find(|a| a.id == id)
    }

    /// The most recently added annotation
    pub fn last(&self) -> Option<&Annotation> {
        self.items.last()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply a quick-fix template to the most recently added annotation.
    /// Returns the id that was updated, or `None` when the store is empty.
    pub fn apply_template(&mut self, template: &AnnotationTemplate) -> Option<String> {
        let id = self.last()?.id.clone();
        self.update(
            &id,
            AnnotationPatch {
                text: Some(template.text.to_string()),
                kind: Some(template.kind),
            },
        );
        Some(id)
    }
}

/// A canned annotation body offered as a one-click fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationTemplate {
    pub id: &'static str,
    pub kind: AnnotationKind,
    pub text: &'static str,
}

pub const TEMPLATES: [AnnotationTemplate; 8] = [
    AnnotationTemplate {
        id: "too-much-text",
        kind: AnnotationKind::Error,
        text: "Too much text here",
    },
    AnnotationTemplate {
        id: "low-contrast",
        kind: AnnotationKind::Warning,
        text: "Call to action needs better contrast",
    },
    AnnotationTemplate {
        id: "responsive-issue",
        kind: AnnotationKind::Error,
        text: "Responsive layout issue",
    },
    AnnotationTemplate {
        id: "slow-loading",
        kind: AnnotationKind::Warning,
        text: "Slow loading element",
    },
    AnnotationTemplate {
        id: "improve-spacing",
        kind: AnnotationKind::Suggestion,
        text: "Improve spacing here",
    },
    AnnotationTemplate {
        id: "accessibility",
        kind: AnnotationKind::Error,
        text: "Accessibility issue",
    },
    AnnotationTemplate {
        id: "font-size",
        kind: AnnotationKind::Suggestion,
        text: "Increase font size for readability",
    },
    AnnotationTemplate {
        id: "visual-hierarchy",
        kind: AnnotationKind::Suggestion,
        text: "Improve visual hierarchy",
    },
];

pub fn find_template(id: &str) -> Option<&'static AnnotationTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn anno(id: &str, kind: AnnotationKind) -> Annotation {
        Annotation::new(id, 100.0, 100.0, "text", kind)
    }

    #[test]
    fn add_then_list_keeps_insertion_order() {
        let mut store = AnnotationStore::new();
        store.add(anno("a1", AnnotationKind::Warning)).unwrap();
        store.add(anno("a2", AnnotationKind::Error)).unwrap();
        store.add(anno("a3", AnnotationKind::Suggestion)).unwrap();
        let ids: Vec<_> = store.list().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a1", "a2", "a3"]);
    }

    #[test]
    fn add_rejects_duplicates_and_bad_input() {
        let mut store = AnnotationStore::new();
        store.add(anno("a1", AnnotationKind::Warning)).unwrap();
        assert!(matches!(
            store.add(anno("a1", AnnotationKind::Error)),
            Err(Error::InvalidAnnotation(_))
        ));
        assert!(store.add(anno("", AnnotationKind::Error)).is_err());
        let mut nan = anno("a2", AnnotationKind::Error);
        nan.x = f32::NAN;
        assert!(store.add(nan).is_err());
        let mut inf = anno("a3", AnnotationKind::Error);
        inf.y = f32::INFINITY;
        assert!(store.add(inf).is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_changes_only_the_target() {
        let mut store = AnnotationStore::new();
        store.add(anno("a1", AnnotationKind::Warning)).unwrap();
        store.add(anno("a2", AnnotationKind::Warning)).unwrap();
        assert!(store.update("a1", AnnotationPatch::kind(AnnotationKind::Error)));
        assert_eq!(store.list()[0].kind, AnnotationKind::Error);
        assert_eq!(store.list()[0].text, "text");
        assert_eq!(store.list()[1], anno("a2", AnnotationKind::Warning));
    }

    #[test]
    fn unknown_ids_are_silent_noops() {
        let mut store = AnnotationStore::new();
        store.add(anno("a1", AnnotationKind::Warning)).unwrap();
        let before = store.list().to_vec();
        assert!(!store.update("missing", AnnotationPatch::text("x")));
        assert!(!store.delete("missing"));
        assert_eq!(store.list(), before.as_slice());
    }

    #[test]
    fn delete_keeps_survivor_order() {
        let mut store = AnnotationStore::new();
        for id in ["a", "b", "c", "d"] {
            store.add(anno(id, AnnotationKind::Suggestion)).unwrap();
        }
        assert!(store.delete("b"));
        let ids: Vec<_> = store.list().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a", "c", "d"]);
    }

    #[test]
    fn extend_is_all_or_nothing() {
        let mut store = AnnotationStore::new();
        store.add(anno("a1", AnnotationKind::Warning)).unwrap();
        let bad = vec![anno("b1", AnnotationKind::Error), anno("a1", AnnotationKind::Error)];
        assert!(store.extend(bad).is_err());
        assert_eq!(store.len(), 1);
        let dup_in_batch = vec![
            anno("c1", AnnotationKind::Error),
            anno("c1", AnnotationKind::Error),
        ];
        assert!(store.extend(dup_in_batch).is_err());
        let good = vec![anno("b1", AnnotationKind::Error), anno("b2", AnnotationKind::Error)];
        assert_eq!(store.extend(good).unwrap(), 2);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn observer_sees_every_mutation() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut store = AnnotationStore::new();
        store.on_change(move |e| sink.lock().unwrap().push(e.clone()));
        store.add(anno("a1", AnnotationKind::Warning)).unwrap();
        store.update("a1", AnnotationPatch::text("changed"));
        store.update("nope", AnnotationPatch::text("changed"));
        store.delete("a1");
        store.clear();
        let got = events.lock().unwrap().clone();
        assert_eq!(
            got,
            vec![
                StoreEvent::Added("a1".into()),
                StoreEvent::Updated("a1".into()),
                StoreEvent::Deleted("a1".into()),
                StoreEvent::Cleared,
            ]
        );
    }

    #[test]
    fn template_targets_most_recent() {
        let mut store = AnnotationStore::new();
        let tpl = find_template("low-contrast").unwrap();
        assert_eq!(store.apply_template(tpl), None);
        store.add(anno("a1", AnnotationKind::Error)).unwrap();
        store.add(anno("a2", AnnotationKind::Error)).unwrap();
        assert_eq!(store.apply_template(tpl).as_deref(), Some("a2"));
        assert_eq!(store.list()[1].kind, AnnotationKind::Warning);
        assert_eq!(store.list()[1].text, "Call to action needs better contrast");
        assert_eq!(store.list()[0].text, "text");
    }

    #[test]
    fn kind_serde_and_parse() {
        let a: Annotation = serde_json::from_str(
            r#"{"id":"a1","x":100,"y":100,"text":"Low contrast","type":"warning"}"#,
        )
        .unwrap();
        assert_eq!(a.kind, AnnotationKind::Warning);
        assert!(serde_json::from_str::<Annotation>(
            r#"{"id":"a1","x":1,"y":1,"text":"","type":"bogus"}"#
        )
        .is_err());
        assert_eq!(AnnotationKind::parse_or_default(Some("bogus")), AnnotationKind::Suggestion);
        assert_eq!(AnnotationKind::parse_or_default(None), AnnotationKind::Suggestion);
        assert_eq!("error".parse::<AnnotationKind>().unwrap(), AnnotationKind::Error);
    }

    #[test]
    fn generated_ids_are_unique() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| next_id("anno")).collect();
        assert_eq!(ids.len(), 1000);
        assert!(next_id("ai-anno").starts_with("ai-anno-"));
    }
}
