#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    // --------------------------------- source classification -------------------------------------
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("source text is truncated")]
    TruncatedSource,

    // --------------------------------- lookup faults ---------------------------------------------
    #[error("{0} not found")]
    NotFound(String),
    #[error("unknown native function `{0}`")]
    UnknownNative(String),
    #[error("no thread matches `{0}`")]
    NoSuchThread(String),
    #[error("thread `{0}` has no recorded frames")]
    EmptyStack(String),

    // --------------------------------- evaluation faults -----------------------------------------
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    #[error("type error: {0}")]
    Type(String),
    #[error("{callee} expects {expected} arguments, got {got}")]
    Arity {
        callee: String,
        expected: &'static str,
        got: usize,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("index {0} out of range (len {1})")]
    IndexOutOfRange(i64, usize),
    #[error("{0} is not callable")]
    NotCallable(&'static str),
    #[error("no method `{1}` on {0}")]
    UnknownMethod(&'static str, String),

    // --------------------------------- introspection faults --------------------------------------
    #[error("introspection: {0}")]
    Introspection(String),
}

pub type EvalResult<T> = Result<T, EvalError>;
