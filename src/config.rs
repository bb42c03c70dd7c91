/// How the evaluator reacts to a runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// The first runtime error aborts evaluation and is returned to the caller.
    #[default]
    Strict,
    /// Runtime errors are reported where they occur, the failing node evaluates
    /// to `null` and evaluation carries on.
    Legacy,
}

/// What the parser keeps when an `if` has several `elif` arms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElifPolicy {
    /// Every arm is kept and tried in source order.
    #[default]
    Accumulate,
    /// Only the last `elif` arm parsed survives.
    LastWins,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    pub error_mode: ErrorMode,
    pub elif_policy: ElifPolicy,
}

impl Config {
    /// Reproduces the behavior of the first Quill releases.
    pub fn legacy() -> Self {
        Self {
            error_mode: ErrorMode::Legacy,
            elif_policy: ElifPolicy::LastWins,
        }
    }

    pub fn with_error_mode(mut self, error_mode: ErrorMode) -> Self {
        self.error_mode = error_mode;
        self
    }

    pub fn with_elif_policy(mut self, elif_policy: ElifPolicy) -> Self {
        self.elif_policy = elif_policy;
        self
    }
}
