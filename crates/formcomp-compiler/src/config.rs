//! Compilation and computation options

use crate::numeric::NumericTypeSpec;

/// Options for compiling a computation
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompilerConfig {
    /// Number representation used for constants and arithmetic (default: double)
    pub numeric_type: NumericTypeSpec,
    /// Cache cell values within a computation (default: true)
    pub caching: bool,
    /// Fold constant subexpressions and share duplicates (default: true)
    pub fold_constants: bool,
    /// Inline cells referenced from a single place (default: true)
    pub inline_intermediates: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            numeric_type: NumericTypeSpec::Double,
            caching: true,
            fold_constants: true,
            inline_intermediates: true,
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric_type(mut self, numeric_type: NumericTypeSpec) -> Self {
        self.numeric_type = numeric_type;
        self
    }

    pub fn with_caching(mut self, caching: bool) -> Self {
        self.caching = caching;
        self
    }

    pub fn with_constant_folding(mut self, enabled: bool) -> Self {
        self.fold_constants = enabled;
        self
    }

    pub fn with_inlining(mut self, enabled: bool) -> Self {
        self.inline_intermediates = enabled;
        self
    }

    /// Per-computation defaults implied by this configuration
    pub fn computation_options(&self) -> ComputationOptions {
        ComputationOptions {
            caching: self.caching,
        }
    }
}

/// Options for one computation instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ComputationOptions {
    /// Compute each cell at most once per instance
    pub caching: bool,
}

impl Default for ComputationOptions {
    fn default() -> Self {
        Self { caching: true }
    }
}
