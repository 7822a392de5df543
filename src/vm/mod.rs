use crate::compiler::{Instruction, Program};
use crate::env::{Slot, VarEnv};
use crate::source::Span;
use crate::value::{Value, ValueKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("division by zero")]
    DivideByZero,
    #[error("numeric domain error: {detail}")]
    NumericDomain { detail: String },
    #[error("variable slot {slot} no longer exists")]
    UnknownVariableSlot { slot: Slot },
    #[error("cannot {op} {left} and {right}")]
    TypeMismatch { op: &'static str, left: ValueKind, right: ValueKind },
    #[error("cannot {op} a {operand}")]
    UnsupportedOperand { op: &'static str, operand: ValueKind },
    #[error("{function}() expects a {expected} argument, got {}", .found.map_or("nothing".to_string(), |k| k.to_string()))]
    Argument { function: &'static str, expected: ValueKind, found: Option<ValueKind> },
    #[error("stack underflow")]
    StackUnderflow,
    #[error("program left {depth} values on the stack")]
    Unbalanced { depth: usize },
}

impl EvalError {
    pub fn code(&self) -> &'static str {
        match self {
            EvalError::DivideByZero => "VX-E001",
            EvalError::NumericDomain { .. } => "VX-E002",
            EvalError::UnknownVariableSlot { .. } => "VX-E003",
            EvalError::TypeMismatch { .. } | EvalError::UnsupportedOperand { .. } => "VX-E004",
            EvalError::Argument { .. } => "VX-E005",
            EvalError::StackUnderflow | EvalError::Unbalanced { .. } => "VX-E006",
        }
    }
}

/// An evaluation failure and the sub-expression it came from.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}")]
pub struct VmError {
    pub kind: EvalError,
    pub span: Span,
}

type VmResult<T> = Result<T, VmError>;

/// Execute `program` against `env`, returning the single value it leaves.
#[tracing::instrument(level = "debug", skip_all, fields(instructions = program.len()))]
pub fn run(program: &Program, env: &mut VarEnv) -> VmResult<Value> {
    let mut stack: Vec<Value> = Vec::with_capacity(16);

    for (inst, &span) in program.code.iter().zip(&program.spans) {
        tracing::trace!(%inst, depth = stack.len(), "exec");
        step(inst, &mut stack, env).map_err(|kind| VmError { kind, span })?;
    }

    let whole = program.spans.iter().copied().reduce(Span::merge).unwrap_or(Span::UNKNOWN);
    match (stack.pop(), stack.len()) {
        (Some(value), 0) => Ok(value),
        (None, _) => Err(VmError { kind: EvalError::StackUnderflow, span: whole }),
        (Some(_), rest) => Err(VmError { kind: EvalError::Unbalanced { depth: rest + 1 }, span: whole }),
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, EvalError> {
    stack.pop().ok_or(EvalError::StackUnderflow)
}

fn step(inst: &Instruction, stack: &mut Vec<Value>, env: &mut VarEnv) -> Result<(), EvalError> {
    match inst {
        Instruction::LoadImmediate(v) => stack.push(v.clone()),
        Instruction::LoadVariable(slot) => {
            let v = env.load(*slot).ok_or(EvalError::UnknownVariableSlot { slot: *slot })?;
            stack.push(v.clone());
        }
        Instruction::StoreVariable(slot) => {
            let v = stack.last().ok_or(EvalError::StackUnderflow)?.clone();
            if !env.store(*slot, v) {
                return Err(EvalError::UnknownVariableSlot { slot: *slot });
            }
        }
        Instruction::Negate => {
            let v = pop(stack)?;
            stack.push(negate(v)?);
        }
        Instruction::Call { builtin, arity } => {
            let at = stack.len().checked_sub(*arity).ok_or(EvalError::StackUnderflow)?;
            let args = stack.split_off(at);
            stack.push(builtin.apply(&args)?);
        }
        Instruction::Pop => {
            pop(stack)?;
        }
        binary => {
            let right = pop(stack)?;
            let left = pop(stack)?;
            stack.push(arith(binary, left, right)?);
        }
    }
    Ok(())
}

fn negate(v: Value) -> Result<Value, EvalError> {
    match v {
        Value::Scalar(n) => Ok(Value::Scalar(-n)),
        Value::Vector(v) => Ok(Value::Vector(-v)),
        Value::Text(_) => Err(EvalError::UnsupportedOperand { op: "negate", operand: ValueKind::Text }),
    }
}

fn arith(inst: &Instruction, left: Value, right: Value) -> Result<Value, EvalError> {
    use Value::{Scalar, Vector};

    let mismatch = |op: &'static str, l: &Value, r: &Value| EvalError::TypeMismatch {
        op,
        left: l.kind(),
        right: r.kind(),
    };

    let result = match (inst, &left, &right) {
        (Instruction::Add, Scalar(a), Scalar(b)) => Scalar(a + b),
        (Instruction::Add, Vector(a), Vector(b)) => Vector(*a + *b),
        (Instruction::Add, l, r) => return Err(mismatch("add", l, r)),

        (Instruction::Sub, Scalar(a), Scalar(b)) => Scalar(a - b),
        (Instruction::Sub, Vector(a), Vector(b)) => Vector(*a - *b),
        (Instruction::Sub, l, r) => return Err(mismatch("subtract", l, r)),

        (Instruction::Mul, Scalar(a), Scalar(b)) => Scalar(a * b),
        (Instruction::Mul, Vector(a), Scalar(b)) | (Instruction::Mul, Scalar(b), Vector(a)) => Vector(*a * *b),
        (Instruction::Mul, Vector(a), Vector(b)) => Vector(a.zip(*b, |x, y| x * y)),
        (Instruction::Mul, l, r) => return Err(mismatch("multiply", l, r)),

        (Instruction::Div, Scalar(_) | Vector(_), Scalar(b)) if *b == 0.0 => return Err(EvalError::DivideByZero),
        (Instruction::Div, Scalar(_) | Vector(_), Vector(b)) if b.has_zero_component() => {
            return Err(EvalError::DivideByZero);
        }
        (Instruction::Div, Scalar(a), Scalar(b)) => Scalar(a / b),
        (Instruction::Div, Vector(a), Scalar(b)) => Vector(a.map(|x| x / b)),
        (Instruction::Div, Scalar(a), Vector(b)) => Vector(b.map(|y| a / y)),
        (Instruction::Div, Vector(a), Vector(b)) => Vector(a.zip(*b, |x, y| x / y)),
        (Instruction::Div, l, r) => return Err(mismatch("divide", l, r)),

        (Instruction::Mod, Scalar(a), Scalar(b)) => {
            let (a, b) = (a.trunc() as i64, b.trunc() as i64);
            if b == 0 {
                return Err(EvalError::DivideByZero);
            }
            Scalar(a.wrapping_rem(b) as f64)
        }
        (Instruction::Mod, l, r) => return Err(mismatch("take modulo of", l, r)),

        (Instruction::Pow, Scalar(a), Scalar(b)) => {
            if *a < 0.0 && b.fract() != 0.0 {
                return Err(EvalError::NumericDomain {
                    detail: format!("negative base {a} raised to non-integer power {b}"),
                });
            }
            Scalar(a.powf(*b))
        }
        (Instruction::Pow, l, r) => return Err(mismatch("exponentiate", l, r)),

        _ => return Err(EvalError::StackUnderflow),
    };
    Ok(result)
}
