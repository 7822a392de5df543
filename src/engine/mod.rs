use crate::check::{self, SyntaxError};
use crate::compiler::{self, CompileError, Program};
use crate::env::{EnvError, Snapshot, VarEnv};
use crate::functions::FunctionTable;
use crate::lexer;
use crate::source::{Span, Stripped};
use crate::value::{ConversionError, FromValue, Value};
use crate::vm::{self, VmError};

/// Any failure from the façade. Expression-level variants carry the original
/// expression text so callers can show the user what failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("syntax error in `{expr}`: {source}")]
    Syntax { expr: String, source: SyntaxError },
    #[error("compile error in `{expr}`: {source}")]
    Compile { expr: String, source: CompileError },
    #[error("evaluation error in `{expr}`: {source}")]
    Eval { expr: String, source: VmError },
    #[error("cannot convert result of `{expr}`: {source}")]
    Conversion { expr: String, source: ConversionError },
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("no expression has been parsed")]
    NoProgram,
}

impl Error {
    pub fn code(&self) -> &'static str {
        match self {
            Error::Syntax { source, .. } => source.code,
            Error::Compile { source, .. } => source.code(),
            Error::Eval { source, .. } => source.kind.code(),
            Error::Conversion { .. } => "VX-E007",
            Error::Env(e) => e.code(),
            Error::NoProgram => "VX-E008",
        }
    }

    /// Offending expression text, where there is one.
    pub fn expr(&self) -> Option<&str> {
        match self {
            Error::Syntax { expr, .. }
            | Error::Compile { expr, .. }
            | Error::Eval { expr, .. }
            | Error::Conversion { expr, .. } => Some(expr),
            Error::Env(_) | Error::NoProgram => None,
        }
    }

    /// Location within [`Error::expr`], in original (unstripped) offsets.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Syntax { source, .. } => Some(source.span),
            Error::Compile { source, .. } => Some(source.span()),
            Error::Eval { source, .. } => Some(source.span),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone)]
struct Compiled {
    source: String,
    stripped: Stripped,
    program: Program,
}

/// Parses, holds and evaluates expressions over one variable environment.
#[derive(Debug, Clone)]
pub struct Engine {
    functions: FunctionTable,
    env: VarEnv,
    current: Option<Compiled>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::with_functions(FunctionTable::builtin())
    }

    pub fn with_functions(functions: FunctionTable) -> Self {
        Engine { functions, env: VarEnv::new(), current: None }
    }

    pub fn env(&self) -> &VarEnv {
        &self.env
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    /// The program held from the last successful [`Engine::parse`].
    pub fn program(&self) -> Option<&Program> {
        self.current.as_ref().map(|c| &c.program)
    }

    /// Check and compile `expr`, replacing the held program on success.
    /// On failure the held program and the environment are untouched.
    pub fn parse(&mut self, expr: &str) -> Result<&Program> {
        let stripped = Stripped::new(expr);

        let reusable = self
            .current
            .as_mut()
            .filter(|c| c.stripped.text == stripped.text && c.program.is_live(&self.env));
        if let Some(current) = reusable {
            tracing::trace!(expr, "reusing compiled program");
            // Errors must quote this call's text and map through its offsets.
            current.source = expr.to_string();
            current.stripped = stripped;
        } else {
            let program = self.compile(expr, &stripped)?;
            self.current = Some(Compiled { source: expr.to_string(), stripped, program });
        }

        self.program().ok_or(Error::NoProgram)
    }

    fn compile(&self, expr: &str, stripped: &Stripped) -> Result<Program> {
        let text = &stripped.text;
        let syntax = |e: SyntaxError| Error::Syntax {
            expr: expr.to_string(),
            source: SyntaxError { span: stripped.original_span(e.span), ..e },
        };

        let tokens = lexer::lex(text).map_err(|e| syntax(e.into()))?;
        check::check_tokens(&tokens, text.len(), &self.functions, &self.env).map_err(syntax)?;
        compiler::compile(&tokens, text.len(), &self.functions, &self.env).map_err(|e| Error::Compile {
            expr: expr.to_string(),
            source: e.map_span(|s| stripped.original_span(s)),
        })
    }

    /// Run the held program and convert its value to `T`.
    pub fn evaluate<T: FromValue>(&mut self) -> Result<T> {
        let current = self.current.as_ref().ok_or(Error::NoProgram)?;
        let value = vm::run(&current.program, &mut self.env).map_err(|e| Error::Eval {
            expr: current.source.clone(),
            source: VmError { span: current.stripped.original_span(e.span), ..e },
        })?;
        T::from_value(value).map_err(|source| Error::Conversion { expr: current.source.clone(), source })
    }

    /// Parse and evaluate in one call.
    pub fn eval<T: FromValue>(&mut self, expr: &str) -> Result<T> {
        self.parse(expr)?;
        self.evaluate()
    }

    /// Evaluate `expr` and store the result under `name`, creating or
    /// overwriting the variable.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn define_and_evaluate(&mut self, name: &str, expr: &str) -> Result<Value> {
        let value: Value = self.eval(expr)?;
        self.env.set(name, value.clone());
        tracing::debug!(name, %value, "defined variable");
        Ok(value)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.env.contains(name)
    }

    pub fn set_variable(&mut self, name: &str, value: impl Into<Value>) {
        self.env.set(name, value.into());
    }

    /// Create a variable; fails if the name already exists.
    pub fn define_variable(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.env.define(name, value.into())?;
        Ok(())
    }

    pub fn remove_variable(&mut self, name: &str) -> Result<Value> {
        Ok(self.env.remove(name)?)
    }

    /// Typed lookup of a variable.
    pub fn get<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self
            .env
            .get(name)
            .ok_or_else(|| EnvError::Undefined { name: name.to_string() })?;
        T::from_value(value.clone()).map_err(|source| Error::Conversion { expr: name.to_string(), source })
    }

    /// Typed lookup with a default for a missing variable. A variable of the
    /// wrong kind is still an error.
    pub fn get_or<T: FromValue>(&self, name: &str, default: T) -> Result<T> {
        if self.has_variable(name) { self.get(name) } else { Ok(default) }
    }

    /// Typed lookup of the first name in `names` that is defined.
    pub fn get_first<T: FromValue>(&self, names: &[&str]) -> Result<T> {
        match names.iter().find(|n| self.has_variable(n)) {
            Some(name) => self.get(name),
            None => Err(EnvError::Undefined { name: names.join(" | ") }.into()),
        }
    }

    pub fn get_first_or<T: FromValue>(&self, names: &[&str], default: T) -> Result<T> {
        match names.iter().find(|n| self.has_variable(n)) {
            Some(name) => self.get(name),
            None => Ok(default),
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.env.snapshot()
    }

    pub fn restore(&mut self, snapshot: &Snapshot) {
        self.env.restore(snapshot);
    }
}
