//! Semantics-preserving simplification passes
//!
//! - [`ConstantEliminator`] folds literal subtrees and shares identical ones
//! - [`IntermediateInliner`] moves single-use cells into their reader
//! - [`SubstitutionInliner`] resolves `let` bindings

mod cse;
mod inliner;
mod substitution;

pub use cse::ConstantEliminator;
pub use inliner::IntermediateInliner;
pub use substitution::SubstitutionInliner;
