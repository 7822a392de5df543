use std::collections::HashMap;

use crate::value::{Value, ValueKind, Vec3};
use crate::vm::EvalError;

/// Native functions callable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sinh,
    Cosh,
    Tanh,
    Sqrt,
    Exp,
    Log,
    Log10,
    Abs,
    Floor,
    Ceil,
    Round,
    Min,
    Max,
    Deg,
    Rad,
    Pi,
    Vec,
    Dot,
    Cross,
    Norm,
    Unit,
    Vx,
    Vy,
    Vz,
}

/// Name, builtin and declared arity of every registered function.
const BUILTINS: &[(&str, Builtin, usize)] = &[
    ("sin", Builtin::Sin, 1),
    ("cos", Builtin::Cos, 1),
    ("tan", Builtin::Tan, 1),
    ("asin", Builtin::Asin, 1),
    ("acos", Builtin::Acos, 1),
    ("atan", Builtin::Atan, 1),
    ("atan2", Builtin::Atan2, 2),
    ("sinh", Builtin::Sinh, 1),
    ("cosh", Builtin::Cosh, 1),
    ("tanh", Builtin::Tanh, 1),
    ("sqrt", Builtin::Sqrt, 1),
    ("exp", Builtin::Exp, 1),
    ("log", Builtin::Log, 1),
    ("log10", Builtin::Log10, 1),
    ("abs", Builtin::Abs, 1),
    ("floor", Builtin::Floor, 1),
    ("ceil", Builtin::Ceil, 1),
    ("round", Builtin::Round, 1),
    ("min", Builtin::Min, 2),
    ("max", Builtin::Max, 2),
    ("deg", Builtin::Deg, 1),
    ("rad", Builtin::Rad, 1),
    ("pi", Builtin::Pi, 0),
    ("vec", Builtin::Vec, 3),
    ("dot", Builtin::Dot, 2),
    ("cross", Builtin::Cross, 2),
    ("norm", Builtin::Norm, 1),
    ("unit", Builtin::Unit, 1),
    ("vx", Builtin::Vx, 1),
    ("vy", Builtin::Vy, 1),
    ("vz", Builtin::Vz, 1),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FunctionDef {
    pub builtin: Builtin,
    pub arity: usize,
}

/// Immutable registry of function names. Built once and passed by reference
/// to the checker and compiler.
#[derive(Debug, Clone)]
pub struct FunctionTable {
    by_name: HashMap<&'static str, FunctionDef>,
}

impl FunctionTable {
    pub fn builtin() -> Self {
        let by_name = BUILTINS
            .iter()
            .map(|&(name, builtin, arity)| (name, FunctionDef { builtin, arity }))
            .collect();
        FunctionTable { by_name }
    }

    pub fn lookup(&self, name: &str) -> Option<FunctionDef> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Builtin {
    pub fn name(self) -> &'static str {
        BUILTINS
            .iter()
            .find(|(_, b, _)| *b == self)
            .map_or("?", |&(name, _, _)| name)
    }

    /// Apply to exactly the declared number of arguments.
    pub fn apply(self, args: &[Value]) -> Result<Value, EvalError> {
        use Builtin::*;
        let v = match self {
            Sin => Value::Scalar(scalar(self, args, 0)?.sin()),
            Cos => Value::Scalar(scalar(self, args, 0)?.cos()),
            Tan => Value::Scalar(scalar(self, args, 0)?.tan()),
            Asin | Acos => {
                let x = scalar(self, args, 0)?;
                if !(-1.0..=1.0).contains(&x) {
                    return Err(domain(self, format!("argument {x} outside [-1, 1]")));
                }
                Value::Scalar(if self == Asin { x.asin() } else { x.acos() })
            }
            Atan => Value::Scalar(scalar(self, args, 0)?.atan()),
            Atan2 => Value::Scalar(scalar(self, args, 0)?.atan2(scalar(self, args, 1)?)),
            Sinh => Value::Scalar(scalar(self, args, 0)?.sinh()),
            Cosh => Value::Scalar(scalar(self, args, 0)?.cosh()),
            Tanh => Value::Scalar(scalar(self, args, 0)?.tanh()),
            Sqrt => {
                let x = scalar(self, args, 0)?;
                if x < 0.0 {
                    return Err(domain(self, format!("square root of negative value {x}")));
                }
                Value::Scalar(x.sqrt())
            }
            Exp => Value::Scalar(scalar(self, args, 0)?.exp()),
            Log | Log10 => {
                let x = scalar(self, args, 0)?;
                if x <= 0.0 {
                    return Err(domain(self, format!("logarithm of non-positive value {x}")));
                }
                Value::Scalar(if self == Log { x.ln() } else { x.log10() })
            }
            Abs => elementwise(self, args, f64::abs)?,
            Floor => elementwise(self, args, f64::floor)?,
            Ceil => elementwise(self, args, f64::ceil)?,
            Round => elementwise(self, args, f64::round)?,
            Min => Value::Scalar(scalar(self, args, 0)?.min(scalar(self, args, 1)?)),
            Max => Value::Scalar(scalar(self, args, 0)?.max(scalar(self, args, 1)?)),
            Deg => elementwise(self, args, f64::to_degrees)?,
            Rad => elementwise(self, args, f64::to_radians)?,
            Pi => Value::Scalar(std::f64::consts::PI),
            Vec => Value::Vector(Vec3::new(
                scalar(self, args, 0)?,
                scalar(self, args, 1)?,
                scalar(self, args, 2)?,
            )),
            Dot => Value::Scalar(vector(self, args, 0)?.dot(vector(self, args, 1)?)),
            Cross => Value::Vector(vector(self, args, 0)?.cross(vector(self, args, 1)?)),
            Norm => Value::Scalar(vector(self, args, 0)?.norm()),
            Unit => {
                let v = vector(self, args, 0)?;
                let n = v.norm();
                if n == 0.0 {
                    return Err(domain(self, "zero-length vector has no direction".into()));
                }
                Value::Vector(v.map(|c| c / n))
            }
            Vx => Value::Scalar(vector(self, args, 0)?.x),
            Vy => Value::Scalar(vector(self, args, 0)?.y),
            Vz => Value::Scalar(vector(self, args, 0)?.z),
        };
        Ok(v)
    }
}

fn scalar(f: Builtin, args: &[Value], i: usize) -> Result<f64, EvalError> {
    match args.get(i) {
        Some(Value::Scalar(n)) => Ok(*n),
        other => Err(argument_mismatch(f, ValueKind::Scalar, other)),
    }
}

fn vector(f: Builtin, args: &[Value], i: usize) -> Result<Vec3, EvalError> {
    match args.get(i) {
        Some(Value::Vector(v)) => Ok(*v),
        other => Err(argument_mismatch(f, ValueKind::Vector, other)),
    }
}

fn elementwise(f: Builtin, args: &[Value], op: fn(f64) -> f64) -> Result<Value, EvalError> {
    match args.first() {
        Some(Value::Scalar(n)) => Ok(Value::Scalar(op(*n))),
        Some(Value::Vector(v)) => Ok(Value::Vector(v.map(op))),
        other => Err(argument_mismatch(f, ValueKind::Scalar, other)),
    }
}

fn argument_mismatch(f: Builtin, expected: ValueKind, found: Option<&Value>) -> EvalError {
    EvalError::Argument {
        function: f.name(),
        expected,
        found: found.map(Value::kind),
    }
}

fn domain(f: Builtin, detail: String) -> EvalError {
    EvalError::NumericDomain { detail: format!("{}: {}", f.name(), detail) }
}
