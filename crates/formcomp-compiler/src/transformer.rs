//! The transformation pipeline

use tracing::{debug, error, info_span};

use crate::analysis::{check_typed, TypeAnnotator};
use crate::config::CompilerConfig;
use crate::error::{CompilerError, CompilerResult};
use crate::model::ComputationModel;
use crate::numeric::NumericType;
use crate::optimizer::{ConstantEliminator, IntermediateInliner, SubstitutionInliner};
use crate::rewriting::ModelRewriter;

/// Runs every pass over a bound model, checking after each that the model is still fully typed
///
/// ```rust,ignore
/// let transformer = ModelTransformer::new(numeric.as_ref(), &config);
/// transformer.transform(&mut model)?;
/// ```
pub struct ModelTransformer<'a> {
    numeric: &'a dyn NumericType,
    fold_constants: bool,
    inline_intermediates: bool,
}

impl<'a> ModelTransformer<'a> {
    pub fn new(numeric: &'a dyn NumericType, config: &CompilerConfig) -> Self {
        Self {
            numeric,
            fold_constants: config.fold_constants,
            inline_intermediates: config.inline_intermediates,
        }
    }

    /// Transform in place; on error the model is left half-transformed and must be discarded
    pub fn transform(&self, model: &mut ComputationModel) -> CompilerResult<()> {
        let span = info_span!("transform", numeric = %self.numeric.name());
        let _enter = span.enter();

        ModelRewriter::new(self.numeric).rewrite(model)?;
        TypeAnnotator::new().annotate(model)?;
        Self::check(model, "annotate")?;

        if self.fold_constants {
            ConstantEliminator::new(self.numeric).eliminate(model)?;
            Self::check(model, "cse")?;
        }

        SubstitutionInliner::new().substitute(model)?;
        TypeAnnotator::new().annotate(model)?;
        Self::check(model, "substitute")?;

        if self.inline_intermediates {
            IntermediateInliner::new().inline(model)?;
            Self::check(model, "inline")?;
        }

        SubstitutionInliner::new().substitute(model)?;
        Self::check(model, "final substitute")?;

        debug!(
            cells = model.cell_ids().len(),
            nodes = model.exprs().len(),
            "transformed model"
        );
        Ok(())
    }

    fn check(model: &ComputationModel, after: &str) -> CompilerResult<()> {
        check_typed(model).map_err(|e| {
            error!(pass = after, error = %e, "model lost its types");
            match e {
                CompilerError::Internal(message) => {
                    CompilerError::internal(format!("after {}: {}", after, message))
                }
                other => other,
            }
        })
    }
}
