//! Recursive-descent, precedence-climbing translation of a checked expression
//! into a flat stack-machine [`Program`].
//!
//! Precedence, loosest first: `,` list, `=` assignment, `+ -`, `* / %`,
//! unary `-`, `^` (right-associative), primary.

use crate::env::{Slot, VarEnv};
use crate::functions::{Builtin, FunctionTable};
use crate::lexer::Token;
use crate::source::Span;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    LoadImmediate(Value),
    LoadVariable(Slot),
    StoreVariable(Slot),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Negate,
    Call { builtin: Builtin, arity: usize },
    /// Discard the value of a finished statement in a `,` sequence.
    Pop,
}

impl Instruction {
    /// Net change to the runtime stack depth.
    pub fn stack_effect(&self) -> isize {
        match self {
            Instruction::LoadImmediate(_) | Instruction::LoadVariable(_) => 1,
            Instruction::StoreVariable(_) | Instruction::Negate => 0,
            Instruction::Add
            | Instruction::Sub
            | Instruction::Mul
            | Instruction::Div
            | Instruction::Mod
            | Instruction::Pow
            | Instruction::Pop => -1,
            Instruction::Call { arity, .. } => 1 - *arity as isize,
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Instruction::LoadImmediate(v) => write!(f, "load-immediate {v}"),
            Instruction::LoadVariable(slot) => write!(f, "load-variable {slot}"),
            Instruction::StoreVariable(slot) => write!(f, "store-variable {slot}"),
            Instruction::Add => write!(f, "add"),
            Instruction::Sub => write!(f, "sub"),
            Instruction::Mul => write!(f, "mul"),
            Instruction::Div => write!(f, "div"),
            Instruction::Mod => write!(f, "mod"),
            Instruction::Pow => write!(f, "pow"),
            Instruction::Negate => write!(f, "negate"),
            Instruction::Call { builtin, arity } => write!(f, "call {}/{}", builtin.name(), arity),
            Instruction::Pop => write!(f, "pop"),
        }
    }
}

/// One compiled expression. `spans[i]` locates the source of `code[i]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub code: Vec<Instruction>,
    pub spans: Vec<Span>,
}

impl Program {
    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Every slot the program reads or writes.
    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.code.iter().filter_map(|inst| match inst {
            Instruction::LoadVariable(s) | Instruction::StoreVariable(s) => Some(*s),
            _ => None,
        })
    }

    /// True while every referenced slot still resolves in `env`.
    pub fn is_live(&self, env: &VarEnv) -> bool {
        self.slots().all(|s| env.load(s).is_some())
    }

    fn emit(&mut self, inst: Instruction, span: Span) {
        self.code.push(inst);
        self.spans.push(span);
    }

    fn pop_last(&mut self) -> Option<(Instruction, Span)> {
        Some((self.code.pop()?, self.spans.pop()?))
    }
}

impl std::fmt::Display for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, inst) in self.code.iter().enumerate() {
            writeln!(f, "{i:4}  {inst}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("unknown identifier '{name}'")]
    UnknownIdentifier { name: String, span: Span },
    #[error("function '{name}' takes {expected} argument(s), {found} given")]
    ArityMismatch { name: String, expected: usize, found: usize, span: Span },
    #[error("unterminated bracket")]
    UnterminatedBracket { span: Span },
    #[error("left side of '=' is not a variable")]
    InvalidAssignmentTarget { span: Span },
    #[error("unexpected {found}")]
    UnexpectedToken { found: String, span: Span },
    #[error("unexpected end of expression")]
    UnexpectedEnd { span: Span },
    #[error("expression leaves {depth} values instead of one")]
    Unbalanced { depth: isize, span: Span },
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnknownIdentifier { .. } => "VX-C001",
            CompileError::ArityMismatch { .. } => "VX-C002",
            CompileError::UnterminatedBracket { .. } => "VX-C003",
            CompileError::InvalidAssignmentTarget { .. } => "VX-C004",
            CompileError::UnexpectedToken { .. } => "VX-C005",
            CompileError::UnexpectedEnd { .. } => "VX-C006",
            CompileError::Unbalanced { .. } => "VX-C007",
        }
    }

    pub fn span(&self) -> Span {
        match self {
            CompileError::UnknownIdentifier { span, .. }
            | CompileError::ArityMismatch { span, .. }
            | CompileError::UnterminatedBracket { span }
            | CompileError::InvalidAssignmentTarget { span }
            | CompileError::UnexpectedToken { span, .. }
            | CompileError::UnexpectedEnd { span }
            | CompileError::Unbalanced { span, .. } => *span,
        }
    }

    pub fn map_span(mut self, f: impl FnOnce(Span) -> Span) -> Self {
        match &mut self {
            CompileError::UnknownIdentifier { span, .. }
            | CompileError::ArityMismatch { span, .. }
            | CompileError::UnterminatedBracket { span }
            | CompileError::InvalidAssignmentTarget { span }
            | CompileError::UnexpectedToken { span, .. }
            | CompileError::UnexpectedEnd { span }
            | CompileError::Unbalanced { span, .. } => *span = f(*span),
        }
        self
    }
}

type Result<T> = std::result::Result<T, CompileError>;

/// How a `,` list is compiled.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ListMode {
    /// Top-level statements: every value but the last is discarded.
    Sequence,
    /// Function arguments: every value stays on the stack.
    Arguments,
}

struct Compiler<'a> {
    tokens: &'a [(Token, Span)],
    pos: usize,
    end: usize,
    functions: &'a FunctionTable,
    env: &'a VarEnv,
    program: Program,
    /// Values the runtime stack would hold at this point.
    sp: isize,
}

/// Compile a checked token stream. `end` is the byte length of the source.
#[tracing::instrument(level = "debug", skip_all, fields(tokens = tokens.len()))]
pub fn compile(
    tokens: &[(Token, Span)],
    end: usize,
    functions: &FunctionTable,
    env: &VarEnv,
) -> Result<Program> {
    let mut c = Compiler { tokens, pos: 0, end, functions, env, program: Program::default(), sp: 0 };
    c.compile_list(ListMode::Sequence)?;
    if let Some((tok, span)) = c.tokens.get(c.pos) {
        return Err(CompileError::UnexpectedToken { found: tok.describe(), span: *span });
    }
    if c.sp != 1 {
        return Err(CompileError::Unbalanced { depth: c.sp, span: Span::new(0, end) });
    }
    tracing::debug!(instructions = c.program.len(), "compiled expression");
    Ok(c.program)
}

impl Compiler<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens.get(self.pos).map_or(Span::point(self.end), |(_, s)| *s)
    }

    fn advance(&mut self) -> Span {
        let span = self.peek_span();
        self.pos += 1;
        span
    }

    fn emit(&mut self, inst: Instruction, span: Span) {
        self.sp += inst.stack_effect();
        self.program.emit(inst, span);
    }

    /// Remove the most recent instruction, undoing its stack effect.
    fn retract(&mut self) -> Option<(Instruction, Span)> {
        let (inst, span) = self.program.pop_last()?;
        self.sp -= inst.stack_effect();
        Some((inst, span))
    }

    /// Level 1: `expr, expr, ...`. Returns the number of list items.
    fn compile_list(&mut self, mode: ListMode) -> Result<usize> {
        self.compile_assignment()?;
        let mut count = 1;
        while self.peek() == Some(&Token::Comma) {
            let span = self.advance();
            if mode == ListMode::Sequence {
                self.emit(Instruction::Pop, span);
            }
            self.compile_assignment()?;
            count += 1;
        }
        Ok(count)
    }

    /// Level 2: `target = value`.
    fn compile_assignment(&mut self) -> Result<()> {
        let start = self.program.len();
        let start_span = self.peek_span();
        self.compile_additive()?;
        if self.peek() != Some(&Token::Assign) {
            return Ok(());
        }
        let eq = self.advance();
        let target = match self.program.code.get(start..) {
            Some([Instruction::LoadVariable(slot)]) => *slot,
            _ => return Err(CompileError::InvalidAssignmentTarget { span: start_span.merge(eq) }),
        };
        let (_, target_span) = self.retract().ok_or(CompileError::UnexpectedEnd { span: eq })?;
        self.compile_assignment()?;
        self.emit(Instruction::StoreVariable(target), target_span.merge(eq));
        Ok(())
    }

    /// Level 3: `+ -`, left-associative.
    fn compile_additive(&mut self) -> Result<()> {
        self.compile_multiplicative()?;
        loop {
            let inst = match self.peek() {
                Some(Token::Plus) => Instruction::Add,
                Some(Token::Minus) => Instruction::Sub,
                _ => return Ok(()),
            };
            let span = self.advance();
            self.compile_multiplicative()?;
            self.emit(inst, span);
        }
    }

    /// Level 4: `* / %`, left-associative.
    fn compile_multiplicative(&mut self) -> Result<()> {
        self.compile_unary()?;
        loop {
            let inst = match self.peek() {
                Some(Token::Star) => Instruction::Mul,
                Some(Token::Slash) => Instruction::Div,
                Some(Token::Percent) => Instruction::Mod,
                _ => return Ok(()),
            };
            let span = self.advance();
            self.compile_unary()?;
            self.emit(inst, span);
        }
    }

    /// Level 5: prefix `-`. Folds into a literal or cancels a preceding
    /// negation before falling back to an explicit `negate`.
    fn compile_unary(&mut self) -> Result<()> {
        if self.peek() != Some(&Token::Minus) {
            return self.compile_power();
        }
        let minus = self.advance();
        self.compile_power()?;
        match self.program.code.last_mut() {
            Some(Instruction::LoadImmediate(Value::Scalar(n))) => {
                *n = -*n;
            }
            Some(Instruction::Negate) => {
                self.retract();
            }
            _ => self.emit(Instruction::Negate, minus),
        }
        Ok(())
    }

    /// Level 6: `^`. The right operand re-enters the unary level, which makes
    /// `a^b^c` group as `a^(b^c)` and allows `a^-b`.
    fn compile_power(&mut self) -> Result<()> {
        self.compile_primary()?;
        if self.peek() == Some(&Token::Caret) {
            let span = self.advance();
            self.compile_unary()?;
            self.emit(Instruction::Pow, span);
        }
        Ok(())
    }

    /// Level 7: bracketed expression, number, function call or variable.
    fn compile_primary(&mut self) -> Result<()> {
        let span = self.peek_span();
        let Some(tok) = self.peek().cloned() else {
            return Err(CompileError::UnexpectedEnd { span });
        };
        self.pos += 1;

        match tok {
            Token::LParen => {
                self.compile_assignment()?;
                self.expect_close(span)
            }
            Token::Number(n) => {
                self.emit(Instruction::LoadImmediate(Value::Scalar(n)), span);
                Ok(())
            }
            Token::Ident(name) => {
                if let Some(def) = self.functions.lookup(&name) {
                    return self.compile_call(name, def.builtin, def.arity, span);
                }
                match self.env.slot(&name) {
                    Some(slot) => {
                        self.emit(Instruction::LoadVariable(slot), span);
                        Ok(())
                    }
                    None => Err(CompileError::UnknownIdentifier { name, span }),
                }
            }
            other => Err(CompileError::UnexpectedToken { found: other.describe(), span }),
        }
    }

    fn compile_call(&mut self, name: String, builtin: Builtin, arity: usize, name_span: Span) -> Result<()> {
        let open = self.peek_span();
        if self.peek() != Some(&Token::LParen) {
            return Err(CompileError::UnexpectedToken {
                found: self.peek().map_or("end of expression".to_string(), Token::describe),
                span: open,
            });
        }
        self.pos += 1;

        let before = self.sp;
        let found = if self.peek() == Some(&Token::RParen) {
            0
        } else {
            self.compile_list(ListMode::Arguments)?
        };
        let close = self.peek_span();
        self.expect_close(open)?;

        let call_span = name_span.merge(close);
        if found != arity {
            return Err(CompileError::ArityMismatch { name, expected: arity, found, span: call_span });
        }
        debug_assert_eq!(self.sp - before, found as isize);
        self.emit(Instruction::Call { builtin, arity }, call_span);
        Ok(())
    }

    fn expect_close(&mut self, open: Span) -> Result<()> {
        match self.peek() {
            Some(Token::RParen) => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(CompileError::UnexpectedToken {
                found: self.peek().map_or(String::new(), Token::describe),
                span: self.peek_span(),
            }),
            None => Err(CompileError::UnterminatedBracket { span: open.merge(Span::point(self.end)) }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;

    fn env() -> VarEnv {
        let mut env = VarEnv::new();
        env.set("x", Value::Scalar(5.0));
        env.set("y", Value::Scalar(2.0));
        env
    }

    fn compile_with(src: &str, env: &VarEnv) -> Result<Program> {
        let tokens = lex(src).unwrap();
        compile(&tokens, src.len(), &FunctionTable::builtin(), env)
    }

    fn code(src: &str) -> Vec<Instruction> {
        compile_with(src, &env()).unwrap().code
    }

    fn imm(n: f64) -> Instruction {
        Instruction::LoadImmediate(Value::Scalar(n))
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        use Instruction::*;
        assert_eq!(code("2+3*4"), vec![imm(2.0), imm(3.0), imm(4.0), Mul, Add]);
        assert_eq!(code("(2+3)*4"), vec![imm(2.0), imm(3.0), Add, imm(4.0), Mul]);
    }

    #[test]
    fn subtraction_is_left_associative() {
        use Instruction::*;
        assert_eq!(code("8-4-2"), vec![imm(8.0), imm(4.0), Sub, imm(2.0), Sub]);
    }

    #[test]
    fn power_is_right_associative() {
        use Instruction::*;
        assert_eq!(code("2^3^2"), vec![imm(2.0), imm(3.0), imm(2.0), Pow, Pow]);
    }

    #[test]
    fn unary_minus_folds_into_literal() {
        use Instruction::*;
        assert_eq!(code("-5"), vec![imm(-5.0)]);
        assert_eq!(code("2*-3"), vec![imm(2.0), imm(-3.0), Mul]);
        assert_eq!(code("2^-1"), vec![imm(2.0), imm(-1.0), Pow]);
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        use Instruction::*;
        let x = env().slot("x").unwrap();
        assert_eq!(code("-x^2"), vec![LoadVariable(x), imm(2.0), Pow, Negate]);
    }

    #[test]
    fn double_negation_cancels() {
        let x = env().slot("x").unwrap();
        assert_eq!(code("-(-x)"), vec![Instruction::LoadVariable(x)]);
        assert_eq!(code("-(-5)"), vec![imm(5.0)]);
    }

    #[test]
    fn assignment_captures_target_slot() {
        use Instruction::*;
        let x = env().slot("x").unwrap();
        let y = env().slot("y").unwrap();
        assert_eq!(code("x=9"), vec![imm(9.0), StoreVariable(x)]);
        assert_eq!(code("x=y*2"), vec![LoadVariable(y), imm(2.0), Mul, StoreVariable(x)]);
        assert_eq!(code("x=y=1"), vec![imm(1.0), StoreVariable(y), StoreVariable(x)]);
    }

    #[test]
    fn assignment_to_non_variable_fails() {
        let err = compile_with("x+1=3", &env()).unwrap_err();
        assert!(matches!(err, CompileError::InvalidAssignmentTarget { .. }));
    }

    #[test]
    fn sequence_discards_all_but_last() {
        use Instruction::*;
        let x = env().slot("x").unwrap();
        assert_eq!(code("x=1,x+1"), vec![imm(1.0), StoreVariable(x), Pop, LoadVariable(x), imm(1.0), Add]);
    }

    #[test]
    fn function_calls_emit_call_with_arity() {
        use Instruction::*;
        assert_eq!(
            code("max(1,2)"),
            vec![imm(1.0), imm(2.0), Call { builtin: Builtin::Max, arity: 2 }]
        );
        assert_eq!(code("pi()"), vec![Call { builtin: Builtin::Pi, arity: 0 }]);
        assert_eq!(
            code("vec(1,0,-1)"),
            vec![imm(1.0), imm(0.0), imm(-1.0), Call { builtin: Builtin::Vec, arity: 3 }]
        );
    }

    #[test]
    fn arity_mismatch_is_reported() {
        let err = compile_with("sin(1,2)", &env()).unwrap_err();
        assert_eq!(
            err,
            CompileError::ArityMismatch { name: "sin".into(), expected: 1, found: 2, span: Span::new(0, 8) }
        );
        let err = compile_with("pi(1)", &env()).unwrap_err();
        assert!(matches!(err, CompileError::ArityMismatch { expected: 0, found: 1, .. }));
    }

    #[test]
    fn unknown_identifier_is_reported() {
        let err = compile_with("x*zz", &env()).unwrap_err();
        assert_eq!(err, CompileError::UnknownIdentifier { name: "zz".into(), span: Span::new(2, 4) });
        assert_eq!(err.code(), "VX-C001");
    }

    #[test]
    fn unterminated_bracket_is_caught_defensively() {
        let err = compile_with("(2+3", &env()).unwrap_err();
        assert!(matches!(err, CompileError::UnterminatedBracket { .. }));
    }

    #[test]
    fn program_tracks_spans_and_slots() {
        let env = env();
        let program = compile_with("x+y", &env).unwrap();
        assert_eq!(program.spans, vec![Span::new(0, 1), Span::new(2, 3), Span::new(1, 2)]);
        assert_eq!(program.slots().count(), 2);
        assert!(program.is_live(&env));
    }

    #[test]
    fn listing_shows_one_instruction_per_line() {
        let listing = compile_with("-x+2", &env()).unwrap().to_string();
        let lines: Vec<&str> = listing.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].ends_with("load-variable $0"));
        assert!(lines[1].ends_with("negate"));
        assert!(lines[3].ends_with("add"));
    }
}
