/// Options governing tree construction and compilation
///
/// Limits protect the recursive passes (parser, interpreter, lowering) from
/// pathological input; the switches select which optimizations lowering applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Maximum nesting depth of a tree
    /// Typical formulas: ~10 levels, Limit: 256
    pub max_expression_depth: usize,

    /// Maximum size of textual input in bytes
    pub max_source_bytes: usize,

    /// Collapse subtrees made only of literals into a single constant
    pub fold_constants: bool,

    /// Emit structurally equal subtrees once and reuse their slot
    pub share_subtrees: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_expression_depth: 256,
            max_source_bytes: 64 * 1024, // 64 KiB
            fold_constants: true,
            share_subtrees: true,
        }
    }
}

impl CompileOptions {
    /// Create options with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Options with every optimization turned off; lowering then emits one step per node
    pub fn unoptimized() -> Self {
        Self {
            fold_constants: false,
            share_subtrees: false,
            ..Self::default()
        }
    }

    pub(crate) fn depth_exceeded(&self, depth: usize) -> crate::MastError {
        crate::MastError::ResourceLimitExceeded {
            limit_name: "max_expression_depth".to_string(),
            limit_value: self.max_expression_depth.to_string(),
            actual_value: depth.to_string(),
            suggestion: "Simplify nested expressions to reduce depth".to_string(),
        }
    }
}
