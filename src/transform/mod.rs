//! Transform adapters from upstream wire shapes into research domain types.

pub(crate) mod article;
pub(crate) mod gene;
