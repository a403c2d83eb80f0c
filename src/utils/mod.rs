//! Internal utility helpers for gene-symbol parsing, query escaping, text bounds, and serde shapes.

pub(crate) mod query;
pub(crate) mod serde;
pub(crate) mod symbol;
pub(crate) mod text;
