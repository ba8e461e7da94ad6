//! The register-based virtual machine: dispatch loop, arithmetic and
//! equality semantics, variable/call-frame handling, and builtin dispatch.
//!
//! A structural port of the original `Vm_new`/`Vm_run`/`FrameFreeList`
//! trio, with one deliberate behavior change: `FrameFreeList::push` clears
//! the popped frame's variable table (the original leaves stale bindings
//! behind — see DESIGN.md).

use crate::bytecode::{Bytecode, Op};
use crate::compiler::{Ctx, REGISTERS};
use crate::error::{PurpleGardenError, RuntimeError};
use crate::global::{
    hash_str, FunctionTable, Globals, GLOBAL_FALSE, GLOBAL_TRUE, MAX_BUILTIN_MASK,
    MAX_BUILTIN_SIZE, VARIABLE_TABLE_SIZE,
};
use crate::value::{Tag, Value};

const FREE_LIST_PREALLOC: usize = 256;

#[derive(Debug)]
struct Frame {
    vars: Vec<Option<Value>>,
    return_to: usize,
}

impl Frame {
    fn blank() -> Self {
        Frame { vars: vec![None; VARIABLE_TABLE_SIZE], return_to: 0 }
    }

    fn clear(&mut self) {
        for slot in self.vars.iter_mut() {
            *slot = None;
        }
    }
}

/// Preallocated pool of frames so `CALL` doesn't allocate on the hot path.
#[derive(Debug)]
struct FrameFreeList {
    free: Vec<Frame>,
}

impl FrameFreeList {
    fn preallocated(n: usize) -> Self {
        FrameFreeList { free: (0..n).map(|_| Frame::blank()).collect() }
    }

    fn pop(&mut self) -> Frame {
        self.free.pop().unwrap_or_else(Frame::blank)
    }

    fn push(&mut self, mut frame: Frame) {
        frame.clear();
        self.free.push(frame);
    }
}

type BuiltinFn = fn(&mut Vm) -> Result<Value, RuntimeError>;

pub struct Vm {
    registers: Vec<Value>,
    globals: Globals,
    bytecode: Bytecode,
    pub functions: FunctionTable,
    frames: Vec<Frame>,
    free_list: FrameFreeList,
    arg_count: usize,
    pc: usize,
    builtins: Vec<Option<BuiltinFn>>,
}

impl Vm {
    pub fn from_ctx(ctx: Ctx) -> Self {
        let mut builtins: Vec<Option<BuiltinFn>> = vec![None; MAX_BUILTIN_SIZE];
        let mut register = |name: &str, f: BuiltinFn| {
            let bucket = (hash_str(name) as usize) & MAX_BUILTIN_MASK;
            builtins[bucket] = Some(f);
        };
        register("print", builtin_print);
        register("println", builtin_println);
        register("len", builtin_len);
        register("type", builtin_type);
        register("Some", builtin_some);

        Vm {
            registers: vec![Value::none(); REGISTERS],
            globals: ctx.globals,
            bytecode: ctx.bytecode,
            functions: ctx.functions,
            frames: vec![Frame::blank()],
            free_list: FrameFreeList::preallocated(FREE_LIST_PREALLOC),
            arg_count: 1,
            pc: 0,
            builtins,
        }
    }

    pub fn accumulator(&self) -> &Value {
        &self.registers[0]
    }

    pub fn globals(&self) -> &Globals {
        &self.globals
    }

    pub fn bytecode(&self) -> &Bytecode {
        &self.bytecode
    }

    #[tracing::instrument(name = "vm_run", skip(self))]
    pub fn run(&mut self) -> Result<(), PurpleGardenError> {
        while self.pc < self.bytecode.len() {
            self.step()?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), PurpleGardenError> {
        let op = self.bytecode.op_at(self.pc).expect("pc points at a valid opcode");
        let arg = self.bytecode.arg_at(self.pc);
        tracing::trace!(pc = self.pc, op = op.mnemonic(), arg, "executing instruction");

        let mut advance = true;
        match op {
            Op::LoadG => {
                self.registers[0] = self.globals.get(arg as usize).clone();
            }
            Op::Load => {
                self.registers[0] = self.registers[arg as usize].clone();
            }
            Op::Store => {
                self.registers[arg as usize] = self.registers[0].clone();
            }
            Op::LoadV => {
                let frame = self.frames.last().ok_or(RuntimeError::NoCurrentFrame(self.pc))?;
                match &frame.vars[arg as usize] {
                    Some(v) => self.registers[0] = v.clone(),
                    None => return Err(RuntimeError::UnboundVariable(arg as u64).into()),
                }
            }
            Op::Var => {
                let v = self.registers[0].clone();
                let frame = self.frames.last_mut().ok_or(RuntimeError::NoCurrentFrame(self.pc))?;
                frame.vars[arg as usize] = Some(v);
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div => {
                let left = self.registers[arg as usize].clone();
                let right = self.registers[0].clone();
                self.registers[0] = arithmetic(op, &left, &right)?;
            }
            Op::Eq => {
                let other = self.registers[arg as usize].clone();
                let equal = self.registers[0].cmp(&other);
                self.registers[0] =
                    if equal { self.globals.get(GLOBAL_TRUE).clone() } else { self.globals.get(GLOBAL_FALSE).clone() };
            }
            Op::Args => {
                self.arg_count = arg as usize;
            }
            Op::Builtin => {
                let f = self.builtins[arg as usize].ok_or(RuntimeError::UnmappedBuiltin(arg as u64))?;
                let result = f(self)?;
                self.registers[0] = result;
                self.arg_count = 1;
            }
            Op::Call => {
                let mut frame = self.free_list.pop();
                frame.return_to = self.pc + 2;
                self.frames.push(frame);
                self.arg_count = 1;
                self.pc = arg as usize;
                advance = false;
            }
            Op::Leave => {
                if self.frames.len() > 1 {
                    let frame = self.frames.pop().expect("checked len > 1");
                    self.pc = frame.return_to;
                    self.free_list.push(frame);
                    advance = false;
                }
            }
            Op::Jmp => {
                self.pc = arg as usize;
                advance = false;
            }
            Op::Assert => {
                if !self.registers[0].is_bool_true() {
                    return Err(RuntimeError::AssertionFailed.into());
                }
            }
        }

        if advance {
            self.pc += 2;
        }
        Ok(())
    }

    fn arg(&self, i: usize) -> Value {
        debug_assert!(i <= self.arg_count.max(1));
        self.registers[i].clone()
    }
}

fn arithmetic(op: Op, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    if let (Tag::Int(a), Tag::Int(b)) = (&left.tag, &right.tag) {
        let (a, b) = (*a, *b);
        let result = match op {
            Op::Add => a.wrapping_add(b),
            Op::Sub => a.wrapping_sub(b),
            Op::Mul => a.wrapping_mul(b),
            Op::Div => {
                if b == 0 {
                    return Err(RuntimeError::DivisionByZero);
                }
                a.wrapping_div(b)
            }
            _ => unreachable!("arithmetic() only called for ADD/SUB/MUL/DIV"),
        };
        return Ok(Value::int(result));
    }

    match (left.as_double(), right.as_double()) {
        (Some(a), Some(b)) => {
            let result = match op {
                Op::Add => a + b,
                Op::Sub => a - b,
                Op::Mul => a * b,
                Op::Div => {
                    if b == 0.0 {
                        return Err(RuntimeError::DivisionByZero);
                    }
                    a / b
                }
                _ => unreachable!("arithmetic() only called for ADD/SUB/MUL/DIV"),
            };
            Ok(Value::double(result))
        }
        _ => Err(RuntimeError::TypeMismatch(left.type_name(), right.type_name())),
    }
}

fn builtin_print(vm: &mut Vm) -> Result<Value, RuntimeError> {
    print!("{}", vm.arg(1));
    Ok(Value::none())
}

fn builtin_println(vm: &mut Vm) -> Result<Value, RuntimeError> {
    println!("{}", vm.arg(1));
    Ok(Value::none())
}

fn builtin_len(vm: &mut Vm) -> Result<Value, RuntimeError> {
    let v = vm.arg(1);
    match &v.tag {
        Tag::Str(s) => Ok(Value::int(s.len() as i64)),
        Tag::Array(items) => Ok(Value::int(items.len() as i64)),
        _ => Err(RuntimeError::LenUnsupportedType(v.type_name())),
    }
}

fn builtin_type(vm: &mut Vm) -> Result<Value, RuntimeError> {
    let v = vm.arg(1);
    Ok(Value::string(v.type_name()))
}

fn builtin_some(vm: &mut Vm) -> Result<Value, RuntimeError> {
    Ok(vm.arg(1).wrap_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::lexer::lex;
    use crate::parser::parse;

    fn run_str(src: &str) -> Vm {
        let tokens = lex(src).unwrap();
        let nodes = parse(tokens).unwrap();
        let ctx = compile(&nodes).unwrap();
        let mut vm = Vm::from_ctx(ctx);
        vm.run().unwrap();
        vm
    }

    #[test]
    fn double_literal() {
        let vm = run_str("3.1415");
        assert_eq!(vm.accumulator().tag, Tag::Double(3.1415));
    }

    #[test]
    fn string_literal() {
        let vm = run_str("\"string\"");
        assert!(vm.accumulator().cmp(&Value::string("string")));
    }

    #[test]
    fn bool_literals_last_wins() {
        let vm = run_str("true false");
        assert!(vm.accumulator().cmp(&Value::falsy()));
    }

    #[test]
    fn add() {
        let vm = run_str("(+ 2 2)");
        assert_eq!(vm.accumulator().tag, Tag::Int(4));
    }

    #[test]
    fn sub_operand_order() {
        let vm = run_str("(- 5 3)");
        assert_eq!(vm.accumulator().tag, Tag::Int(2));
    }

    #[test]
    fn div_operand_order() {
        let vm = run_str("(/ 6 2)");
        assert_eq!(vm.accumulator().tag, Tag::Int(3));
    }

    #[test]
    fn nested_arithmetic() {
        let vm = run_str("(+ 1 (- 2 1))");
        assert_eq!(vm.accumulator().tag, Tag::Int(2));
    }

    #[test]
    fn widening_to_double() {
        let vm = run_str("(+ 2.0 2)");
        assert_eq!(vm.accumulator().tag, Tag::Double(4.0));
    }

    #[test]
    fn len_builtin_on_string() {
        let vm = run_str("(@len \"hello\")");
        assert_eq!(vm.accumulator().tag, Tag::Int(5));
    }

    #[test]
    fn len_builtin_interning_still_works_twice() {
        let vm = run_str("(@len \"hello\")(@len \"hello\")");
        assert_eq!(vm.accumulator().tag, Tag::Int(5));
    }

    #[test]
    fn len_builtin_is_byte_length_not_char_count() {
        // "café" is 4 chars but 5 bytes (é is 2 bytes in UTF-8).
        let vm = run_str("(@len \"caf\u{e9}\")");
        assert_eq!(vm.accumulator().tag, Tag::Int(5));
    }

    #[test]
    fn equality_true() {
        let vm = run_str("(= 1 1)");
        assert!(vm.accumulator().cmp(&Value::truthy()));
    }

    #[test]
    fn equality_false_across_bools() {
        let vm = run_str("(= true false)");
        assert!(vm.accumulator().cmp(&Value::falsy()));
    }

    #[test]
    fn let_binding_and_lookup() {
        let vm = run_str("(@let age 25) age");
        assert_eq!(vm.accumulator().tag, Tag::Int(25));
    }

    #[test]
    fn function_identity() {
        let vm = run_str("(@function ret [arg] arg) (ret 25)");
        assert_eq!(vm.accumulator().tag, Tag::Int(25));
    }

    #[test]
    fn function_arithmetic() {
        let vm = run_str("(@function add25 [arg] (+ arg 25)) (add25 25)");
        assert_eq!(vm.accumulator().tag, Tag::Int(50));
    }

    #[test]
    fn assert_true_passes() {
        let vm = run_str("(@assert true)");
        assert!(vm.accumulator().cmp(&Value::truthy()));
    }

    #[test]
    fn none_builtin() {
        let vm = run_str("(@None)");
        assert!(vm.accumulator().cmp(&Value::none()));
    }

    #[test]
    fn uncalled_function_body_does_not_execute() {
        // If the forward jump failed to skip the body, `marker` would be
        // bound as a side effect of compiling/running even without a call.
        let vm = run_str("(@function f [] (@let marker 1)) 42");
        assert_eq!(vm.accumulator().tag, Tag::Int(42));
    }

    #[test]
    fn some_wrap_builtin() {
        let vm = run_str("(@Some 5)");
        assert!(vm.accumulator().is_some);
        assert_eq!(vm.accumulator().tag, Tag::Int(5));
    }

    #[test]
    fn type_builtin() {
        let vm = run_str("(@type 5)");
        assert!(vm.accumulator().cmp(&Value::string("Int")));
    }

    #[test]
    fn assert_false_is_runtime_error() {
        let tokens = lex("(@assert false)").unwrap();
        let nodes = parse(tokens).unwrap();
        let ctx = compile(&nodes).unwrap();
        let mut vm = Vm::from_ctx(ctx);
        let err = vm.run().unwrap_err();
        assert_eq!(err, PurpleGardenError::Runtime(RuntimeError::AssertionFailed));
    }

    #[test]
    fn division_by_zero_is_runtime_error() {
        let tokens = lex("(/ 1 0)").unwrap();
        let nodes = parse(tokens).unwrap();
        let ctx = compile(&nodes).unwrap();
        let mut vm = Vm::from_ctx(ctx);
        let err = vm.run().unwrap_err();
        assert_eq!(err, PurpleGardenError::Runtime(RuntimeError::DivisionByZero));
    }
}
