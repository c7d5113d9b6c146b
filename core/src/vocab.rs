//! Built-in vocabularies of the Cityworks wire protocol.
//!
//! Each registry is built once on first use and shared for the life of the
//! process.

use std::sync::OnceLock;

use crate::registry::EnumRegistry;

/// Registry type used for every built-in vocabulary.
pub type Vocabulary = EnumRegistry<&'static str, i32>;

const ACTIVITY_TYPES: &[(&str, i32)] = &[
    ("null", 0),
    ("case", 1),
    ("inspection", 2),
    ("request", 3),
    ("workorder", 4),
    ("wipcase", 5),
];

const LINK_TYPES: &[(&str, i32)] = &[("null", 0), ("parent", 1), ("related", 2)];

const COMMENT_ACTIVITY_TYPES: &[(&str, i32)] = &[
    ("unknown", 0),
    ("request", 1),
    ("workorder", 2),
    ("catask", 3),
    ("caobject", 4),
    ("cacorrection", 5),
    ("project", 6),
    ("contract", 7),
];

const COST_ACTIVITY_TYPES: &[(&str, i32)] = &[
    ("unknown", 0),
    ("request", 1),
    ("workorder", 2),
    ("inspection", 3),
    ("case", 4),
];

const MESSAGE_STATUSES: &[(&str, i32)] = &[
    ("pending", 0),
    ("processing", 1),
    ("complete", 2),
    ("failed", 3),
];

const HOOK_TYPES: &[(&str, i32)] = &[
    ("unknown", 0),
    ("activity_update", 1),
    ("email", 2),
    ("web_hook", 3),
    ("message_queue", 4),
];

macro_rules! vocabulary {
    ($(#[$doc:meta])* $fn_name:ident, $label:literal, $table:ident) => {
        $(#[$doc])*
        pub fn $fn_name() -> &'static Vocabulary {
            static REGISTRY: OnceLock<Vocabulary> = OnceLock::new();
            REGISTRY.get_or_init(|| EnumRegistry::from_table($label, $table))
        }
    };
}

vocabulary!(
    /// Activity kinds used when linking and searching activities.
    activity_types,
    "activity type",
    ACTIVITY_TYPES
);
vocabulary!(
    /// Relationship between two linked activities.
    link_types,
    "link type",
    LINK_TYPES
);
vocabulary!(comment_activity_types, "comment activity type", COMMENT_ACTIVITY_TYPES);
vocabulary!(cost_activity_types, "cost activity type", COST_ACTIVITY_TYPES);
vocabulary!(
    /// Lifecycle states of a message queue entry.
    message_statuses,
    "message status",
    MESSAGE_STATUSES
);
vocabulary!(hook_types, "hook type", HOOK_TYPES);
