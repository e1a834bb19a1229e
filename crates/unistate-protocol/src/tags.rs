//! Built-in tag names.
//!
//! Each constant is the exact string sent over the wire as the `tag` field.

/// Tags starting with this prefix are never dispatched.
pub const PRIVATE_PREFIX: &str = "_";

/// Tag names understood or emitted by the built-in router.
pub struct Tags;

impl Tags {
    // ── State ───────────────────────────────────────────────────────────
    pub const ASSIGN: &str = "assign";

    // ── Computation ─────────────────────────────────────────────────────
    pub const AXPY: &str = "axpy";

    // ── Diagnostics ─────────────────────────────────────────────────────
    pub const BROKEN: &str = "broken";
    pub const ERROR: &str = "error";
}

pub fn is_private_tag(tag: &str) -> bool {
    tag.starts_with(PRIVATE_PREFIX)
}
