//! purple-garden: a small Lisp-like expression language. Source text is
//! lexed, parsed into an s-expression AST, compiled in a single pass into a
//! flat register-based bytecode, and executed by a small virtual machine.
//!
//! The pipeline is linear: [`lexer`] -> [`parser`] -> [`compiler`] ->
//! [`vm`]. [`value`] and [`global`] hold the shared data model (the tagged
//! `Value`, the global constant pool, string interning, and the builtin and
//! function hash tables); [`bytecode`] defines the instruction encoding;
//! [`disassemble`] renders a compiled program back to text; [`error`] is the
//! crate-wide error type every stage returns.

pub mod bytecode;
pub mod compiler;
pub mod disassemble;
pub mod error;
pub mod global;
pub mod lexer;
pub mod parser;
pub mod value;
pub mod vm;

use error::PgResult;
use vm::Vm;

/// Compile and run a complete program, returning the VM so callers can
/// inspect the final accumulator or globals.
pub fn run_source(source: &str) -> PgResult<Vm> {
    let tokens = lexer::lex(source)?;
    let nodes = parser::parse(tokens)?;
    let ctx = compiler::compile(&nodes)?;
    let mut vm = Vm::from_ctx(ctx);
    vm.run()?;
    Ok(vm)
}
