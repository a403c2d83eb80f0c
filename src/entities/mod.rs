//! Research workflows: gene metadata, paper content resolution, identifier
//! extraction, literature enhancement and the gene analysis that drives them.

pub(crate) mod analysis;
pub(crate) mod content;
pub(crate) mod gene;
pub(crate) mod literature;
pub(crate) mod mutant;
