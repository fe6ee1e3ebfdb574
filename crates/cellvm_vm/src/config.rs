//! Configuration for the interpreter.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a reducer regroups its combinations.
///
/// Both keep element order; they differ only in association, which is why
/// reducer operations must be associative.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ReduceStrategy {
    /// `((initial + a) + b) + c`
    #[default]
    Sequential,
    /// `(initial + a) + (b + c)`, level by level.
    Pairwise,
}

/// Configuration for loading and running scripts.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InterpreterConfig {
    /// Compile every callable constant at load time, so call problems are
    /// reported in the load batch instead of on first run.
    pub eager_compile: bool,

    /// Run opcode return validation on every produced value.
    pub validate_returns: bool,

    /// Run opcode runtime validation before every evaluation.
    pub runtime_validation: bool,

    /// Reducer association.
    pub reduce_strategy: ReduceStrategy,

    /// Upper bound on engine steps per run (`None` = unbounded).
    pub max_steps: Option<u64>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            eager_compile: true,
            validate_returns: false,
            runtime_validation: true,
            reduce_strategy: ReduceStrategy::Sequential,
            max_steps: None,
        }
    }
}

impl InterpreterConfig {
    /// Creates a configuration that runs every check.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            eager_compile: true,
            validate_returns: true,
            runtime_validation: true,
            reduce_strategy: ReduceStrategy::Sequential,
            max_steps: None,
        }
    }

    /// Creates a configuration that trusts opcodes and compiles lazily.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            eager_compile: false,
            validate_returns: false,
            runtime_validation: false,
            reduce_strategy: ReduceStrategy::Pairwise,
            max_steps: None,
        }
    }

    /// Builder method to set eager compilation.
    #[must_use]
    pub fn with_eager_compile(mut self, eager: bool) -> Self {
        self.eager_compile = eager;
        self
    }

    /// Builder method to enable/disable return validation.
    #[must_use]
    pub fn with_validate_returns(mut self, validate: bool) -> Self {
        self.validate_returns = validate;
        self
    }

    /// Builder method to enable/disable runtime validation.
    #[must_use]
    pub fn with_runtime_validation(mut self, validate: bool) -> Self {
        self.runtime_validation = validate;
        self
    }

    /// Builder method to set the reduce strategy.
    #[must_use]
    pub fn with_reduce_strategy(mut self, strategy: ReduceStrategy) -> Self {
        self.reduce_strategy = strategy;
        self
    }

    /// Builder method to set the step budget.
    #[must_use]
    pub fn with_max_steps(mut self, steps: Option<u64>) -> Self {
        self.max_steps = steps;
        self
    }
}
