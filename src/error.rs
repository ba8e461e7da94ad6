//! The crate-wide error type. Library code always returns a `Result`; only
//! the CLI binary prints a diagnostic and exits the process.

use derive_more::Display;

#[derive(Debug, Display, Clone, PartialEq)]
pub enum LexError {
    #[display(fmt = "unterminated string starting at byte {_0}")]
    UnterminatedString(usize),
    #[display(fmt = "unexpected character '{_0}' at byte {_1}")]
    UnexpectedChar(char, usize),
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum ParseError {
    #[display(fmt = "unexpected token {_0} at position {_1}")]
    UnexpectedToken(String, usize),
    #[display(fmt = "unterminated list starting at position {_0}")]
    UnterminatedList(usize),
    #[display(fmt = "empty operator or call head at position {_0}")]
    EmptyHead(usize),
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum CompileError {
    #[display(fmt = "call to undefined function '{_0}'")]
    UndefinedFunction(String),
    #[display(fmt = "malformed '@function' definition: {_0}")]
    MalformedFunction(String),
    #[display(fmt = "malformed '@let' binding: {_0}")]
    MalformedLet(String),
    #[display(fmt = "unsupported arity for node: {_0}")]
    UnsupportedArity(String),
    #[display(fmt = "builtin '{_0}' called with wrong argument count: expected {_1}, got {_2}")]
    WrongArgCount(String, usize, usize),
    #[display(fmt = "register file exhausted")]
    RegistersExhausted,
    #[display(fmt = "global pool exhausted")]
    GlobalPoolExhausted,
    #[display(
        fmt = "function name hash collision: '{new}' collides with already-defined '{existing}'"
    )]
    FunctionHashCollision { new: String, existing: String },
    #[display(fmt = "non-empty array literals are not supported")]
    UnsupportedArrayLiteral,
    #[display(fmt = "unsupported construct '{_0}'")]
    UnsupportedConstruct(String),
    #[display(fmt = "unknown builtin '{_0}'")]
    UnknownBuiltin(String),
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum RuntimeError {
    #[display(fmt = "type mismatch in arithmetic: {_0} and {_1}")]
    TypeMismatch(&'static str, &'static str),
    #[display(fmt = "unbound variable (hash {_0})")]
    UnboundVariable(u64),
    #[display(fmt = "assertion failed")]
    AssertionFailed,
    #[display(fmt = "call to unmapped builtin (hash {_0})")]
    UnmappedBuiltin(u64),
    #[display(fmt = "'len' called on unsupported type '{_0}'")]
    LenUnsupportedType(&'static str),
    #[display(fmt = "no current call frame at pc {_0}")]
    NoCurrentFrame(usize),
    #[display(fmt = "division by zero")]
    DivisionByZero,
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum ResourceError {
    #[display(fmt = "arena out of memory: requested {requested}, available {available}")]
    OutOfMemory { requested: usize, available: usize },
}

#[derive(Debug, Display, Clone, PartialEq)]
pub enum PurpleGardenError {
    #[display(fmt = "lex error: {_0}")]
    Lex(LexError),
    #[display(fmt = "parse error: {_0}")]
    Parse(ParseError),
    #[display(fmt = "compile error: {_0}")]
    Compile(CompileError),
    #[display(fmt = "runtime error: {_0}")]
    Runtime(RuntimeError),
    #[display(fmt = "resource error: {_0}")]
    Resource(ResourceError),
}

impl From<LexError> for PurpleGardenError {
    fn from(e: LexError) -> Self {
        PurpleGardenError::Lex(e)
    }
}

impl From<ParseError> for PurpleGardenError {
    fn from(e: ParseError) -> Self {
        PurpleGardenError::Parse(e)
    }
}

impl From<CompileError> for PurpleGardenError {
    fn from(e: CompileError) -> Self {
        PurpleGardenError::Compile(e)
    }
}

impl From<RuntimeError> for PurpleGardenError {
    fn from(e: RuntimeError) -> Self {
        PurpleGardenError::Runtime(e)
    }
}

impl From<ResourceError> for PurpleGardenError {
    fn from(e: ResourceError) -> Self {
        PurpleGardenError::Resource(e)
    }
}

impl std::error::Error for PurpleGardenError {}

pub type PgResult<T> = Result<T, PurpleGardenError>;
