//! Renders the global pool and bytecode as a human-readable listing, with
//! function-entry labels interleaved into the instruction stream.
//!
//! A structural port of the original `disassemble()`: print the globals
//! first (index, value, and the hash for strings), then walk the bytecode
//! two words at a time, inserting a label whenever the current offset
//! matches a recorded function entry point.

use std::fmt::Write;

use crate::bytecode::Op;
use crate::global::{hash_str, FunctionTable, Globals};
use crate::value::Tag;

pub fn disassemble(globals: &Globals, bytecode: &crate::bytecode::Bytecode, functions: &FunctionTable) -> String {
    let mut out = String::new();

    writeln!(out, "; globals").unwrap();
    for (idx, value) in globals.iter() {
        match &value.tag {
            Tag::Str(s) => {
                writeln!(out, "{idx:>4}: {value:<20} (hash {:#x})", hash_str(s)).unwrap();
            }
            _ => {
                writeln!(out, "{idx:>4}: {value}").unwrap();
            }
        }
    }

    writeln!(out, "; bytecode").unwrap();
    let mut pc = 0usize;
    while pc < bytecode.len() {
        if let Some(name) = functions.name_at_offset(pc) {
            writeln!(out, "{name}:").unwrap();
        }
        let Some(op) = bytecode.op_at(pc) else {
            writeln!(out, "{pc:>6}: <invalid opcode {}>", bytecode.arg_at(pc)).unwrap();
            pc += 2;
            continue;
        };
        let arg = bytecode.arg_at(pc);
        match op {
            Op::LoadG => {
                let g = globals.get(arg as usize);
                writeln!(out, "{pc:>6}: {:<8} {arg:<6} ; {g}", op.mnemonic()).unwrap();
            }
            Op::Call => {
                let name = functions.name_at_offset(arg as usize).unwrap_or("?");
                writeln!(out, "{pc:>6}: {:<8} {arg:<6} ; call {name}", op.mnemonic()).unwrap();
            }
            _ => {
                writeln!(out, "{pc:>6}: {:<8} {arg:<6}", op.mnemonic()).unwrap();
            }
        }
        pc += 2;
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::lexer::lex;
    use crate::parser::parse;

    #[test]
    fn disassembly_includes_function_label() {
        let tokens = lex("(@function ret [arg] arg) (ret 25)").unwrap();
        let nodes = parse(tokens).unwrap();
        let ctx = compile(&nodes).unwrap();
        let text = disassemble(&ctx.globals, &ctx.bytecode, &ctx.functions);
        assert!(text.contains("ret:"));
        assert!(text.contains("CALL"));
    }

    #[test]
    fn disassembly_annotates_loadg_with_value() {
        let tokens = lex("\"hello\"").unwrap();
        let nodes = parse(tokens).unwrap();
        let ctx = compile(&nodes).unwrap();
        let text = disassemble(&ctx.globals, &ctx.bytecode, &ctx.functions);
        assert!(text.contains("hello"));
    }
}
