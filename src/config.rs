// ABOUTME: Evaluator-level limits that protect the walker itself from adversarial or accidentally-recursive input.

/// Configuration for one evaluation run (SPEC_FULL.md §C). Generalizes the
/// teacher's sandbox-limit pattern (`FsConfig`/`NetConfig`) to the one
/// resource the walker itself must bound: recursion depth across nested
/// statement lists and lambda invocations.
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    /// Maximum lambda-invocation nesting depth. Exceeding it raises
    /// [`crate::error::RecursionLimitExceeded`] wrapped in
    /// [`crate::error::EvalError::HostError`].
    pub max_call_depth: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limit_is_finite() {
        assert!(EvaluatorConfig::default().max_call_depth > 0);
    }
}
