// Document Classifier (C4, spec §4.4): maps `kind` -> `{category,
// searchable, priority}` via a static registry.

use once_cell::sync::Lazy;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Note,
    LongForm,
    Draft,
    Classified,
    QuestionAndAnswer,
    Podcast,
    Profile,
    Contact,
    Media,
    Ephemeral,
    Unknown,
}

#[derive(Debug, Clone, Copy)]
pub struct EventClassification {
    pub category: EventCategory,
    pub searchable: bool,
    pub priority: u8,
}

struct Registration {
    category: EventCategory,
    searchable: bool,
    priority: u8,
}

static REGISTRY: Lazy<HashMap<u32, Registration>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert(1, Registration { category: EventCategory::Note, searchable: true, priority: 10 });
    m.insert(30023, Registration { category: EventCategory::LongForm, searchable: true, priority: 9 });
    m.insert(30024, Registration { category: EventCategory::Draft, searchable: true, priority: 8 });
    m.insert(30402, Registration { category: EventCategory::Classified, searchable: true, priority: 6 });
    m.insert(
        31922,
        Registration { category: EventCategory::QuestionAndAnswer, searchable: true, priority: 7 },
    );
    m.insert(
        31923,
        Registration { category: EventCategory::QuestionAndAnswer, searchable: true, priority: 7 },
    );
    m.insert(30311, Registration { category: EventCategory::Podcast, searchable: true, priority: 6 });
    m.insert(54, Registration { category: EventCategory::Podcast, searchable: true, priority: 6 });
    m.insert(0, Registration { category: EventCategory::Profile, searchable: false, priority: 4 });
    m.insert(3, Registration { category: EventCategory::Contact, searchable: false, priority: 4 });
    m.insert(1063, Registration { category: EventCategory::Media, searchable: false, priority: 5 });
    m.insert(
        20000,
        Registration { category: EventCategory::Ephemeral, searchable: false, priority: 1 },
    );
    m
});

/// `kind -> {category, searchable, priority}` (spec §4.4). Unregistered
/// kinds classify as `Unknown`, non-searchable, lowest priority so they're
/// dropped by the default threshold.
pub fn classify(kind: u32) -> EventClassification {
    match REGISTRY.get(&kind) {
        Some(reg) => EventClassification {
            category: reg.category,
            searchable: reg.searchable,
            priority: reg.priority,
        },
        None => EventClassification { category: EventCategory::Unknown, searchable: false, priority: 1 },
    }
}

/// Events with `searchable=false` or `priority<3` are dropped (spec §4.4).
pub fn should_index(classification: &EventClassification) -> bool {
    classification.searchable && classification.priority >= 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_is_highest_priority_and_searchable() {
        let c = classify(1);
        assert_eq!(c.category, EventCategory::Note);
        assert_eq!(c.priority, 10);
        assert!(should_index(&c));
    }

    #[test]
    fn profile_events_are_not_indexed() {
        let c = classify(0);
        assert!(!should_index(&c));
    }

    #[test]
    fn ephemeral_events_are_dropped_by_priority() {
        let c = classify(20000);
        assert!(c.priority < 3);
        assert!(!should_index(&c));
    }

    #[test]
    fn unknown_kind_defaults_to_not_indexed() {
        let c = classify(99999);
        assert_eq!(c.category, EventCategory::Unknown);
        assert!(!should_index(&c));
    }
}
