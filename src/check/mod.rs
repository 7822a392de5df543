//! Structural validation of a whitespace-stripped expression.
//!
//! Runs to completion before any bytecode is emitted, so every shape error is
//! reported with an exact position and the compiler only has to deal with
//! problems that need name or arity information.

use crate::env::VarEnv;
use crate::functions::FunctionTable;
use crate::lexer::{self, Token};
use crate::source::Span;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} at position {}", span.start)]
pub struct SyntaxError {
    pub code: &'static str,
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    fn new(code: &'static str, message: impl Into<String>, span: Span) -> Self {
        SyntaxError { code, message: message.into(), span }
    }

    pub fn position(&self) -> usize {
        self.span.start
    }
}

impl From<lexer::LexError> for SyntaxError {
    fn from(e: lexer::LexError) -> Self {
        let span = Span::new(e.position, e.position + e.snippet.len().max(1));
        SyntaxError::new("VX-S002", format!("unexpected character '{}'", e.snippet), span)
    }
}

type Result<T> = std::result::Result<T, SyntaxError>;

/// Lex and check a stripped expression.
pub fn check(expr: &str, functions: &FunctionTable, env: &VarEnv) -> Result<()> {
    let tokens = lexer::lex(expr)?;
    check_tokens(&tokens, expr.len(), functions, env)
}

/// Check an already-lexed expression ending at byte `end`.
pub fn check_tokens(
    tokens: &[(Token, Span)],
    end: usize,
    functions: &FunctionTable,
    env: &VarEnv,
) -> Result<()> {
    let Some((last, last_span)) = tokens.last() else {
        return Err(SyntaxError::new("VX-S001", "empty expression", Span::point(end)));
    };

    if let Some(i) = top_level_assign(tokens) {
        let eq = tokens[i].1;
        let (left, right) = (&tokens[..i], &tokens[i + 1..]);
        if left.is_empty() {
            return Err(SyntaxError::new("VX-S014", "assignment has no target", eq));
        }
        if right.is_empty() {
            return Err(SyntaxError::new("VX-S014", "assignment has no value", Span::point(eq.end)));
        }
        check_tokens(left, eq.start, functions, env)?;
        return check_tokens(right, end, functions, env);
    }

    if !matches!(last, Token::Number(_) | Token::Ident(_) | Token::RParen) {
        return Err(SyntaxError::new(
            "VX-S008",
            format!("expression cannot end with {}", last.describe()),
            *last_span,
        ));
    }

    Scanner { tokens, functions, env, depth: 0, call_depths: Vec::new() }.run(end)
}

/// Index of the first `=` outside every bracket.
fn top_level_assign(tokens: &[(Token, Span)]) -> Option<usize> {
    let mut depth = 0i32;
    for (i, (tok, _)) in tokens.iter().enumerate() {
        match tok {
            Token::LParen => depth += 1,
            Token::RParen => depth -= 1,
            Token::Assign if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Expect {
    Operand,
    Operator,
}

struct Scanner<'a> {
    tokens: &'a [(Token, Span)],
    functions: &'a FunctionTable,
    env: &'a VarEnv,
    depth: usize,
    /// Depths at which a function's argument bracket was opened.
    call_depths: Vec<usize>,
}

impl Scanner<'_> {
    fn in_call_args(&self) -> bool {
        self.call_depths.last() == Some(&self.depth)
    }

    fn close(&mut self, span: Span) -> Result<()> {
        if self.depth == 0 {
            return Err(SyntaxError::new("VX-S006", "too many close brackets", span));
        }
        if self.in_call_args() {
            self.call_depths.pop();
        }
        self.depth -= 1;
        Ok(())
    }

    fn run(mut self, end: usize) -> Result<()> {
        let tokens = self.tokens;
        let mut expect = Expect::Operand;
        let mut unary = false;
        let mut i = 0;

        while i < tokens.len() {
            let (tok, span) = (&tokens[i].0, tokens[i].1);
            let next = tokens.get(i + 1);
            let prev = i.checked_sub(1).and_then(|p| tokens.get(p)).map(|(t, _)| t);

            expect = match (expect, tok) {
                (Expect::Operand, Token::Number(_)) => Expect::Operator,

                (Expect::Operand, Token::Ident(name)) => {
                    let function = self.functions.lookup(name);
                    let opens_bracket = matches!(next, Some((Token::LParen, _)));
                    if function.is_some() && !opens_bracket {
                        let at = next.map_or(Span::point(span.end), |(_, s)| *s);
                        return Err(SyntaxError::new("VX-S003", "bracket does not follow function", at));
                    }
                    if function.is_none() && self.env.contains(name) && opens_bracket {
                        let at = next.map_or(span, |(_, s)| *s);
                        return Err(SyntaxError::new("VX-S005", "variable used as a function", at));
                    }
                    if opens_bracket {
                        // Unknown names called like functions pass here; the
                        // compiler reports them once it resolves identifiers.
                        if let (Some(def), Some((Token::RParen, close))) = (function, tokens.get(i + 2)) {
                            if def.arity != 0 {
                                return Err(SyntaxError::new("VX-S004", "no terms in a () function", *close));
                            }
                        }
                        i += 1;
                        self.depth += 1;
                        self.call_depths.push(self.depth);
                        Expect::Operand
                    } else {
                        Expect::Operator
                    }
                }

                (Expect::Operand, Token::LParen) => {
                    self.depth += 1;
                    Expect::Operand
                }

                (Expect::Operand, Token::Minus) => {
                    if unary {
                        return Err(SyntaxError::new(
                            "VX-S013",
                            "repeated unary minus; use brackets, as in -(-x)",
                            span,
                        ));
                    }
                    unary = true;
                    i += 1;
                    continue;
                }

                (Expect::Operand, Token::RParen) => {
                    match prev {
                        Some(Token::LParen) if self.in_call_args() => {}
                        Some(Token::LParen) => {
                            return Err(SyntaxError::new("VX-S012", "empty brackets", span));
                        }
                        _ => {
                            return Err(SyntaxError::new("VX-S009", "missing operand before ')'", span));
                        }
                    }
                    self.close(span)?;
                    Expect::Operator
                }

                (Expect::Operand, tok) => {
                    let message = match tok {
                        Token::Comma => "missing operand before ','".to_string(),
                        Token::Assign => "assignment has no target".to_string(),
                        other => format!("operator {} has no left operand", other.describe()),
                    };
                    return Err(SyntaxError::new("VX-S009", message, span));
                }

                (Expect::Operator, tok) if tok.is_binary_op() => Expect::Operand,

                (Expect::Operator, Token::Assign) => Expect::Operand,

                (Expect::Operator, Token::Comma) => {
                    if self.depth > 0 && !self.in_call_args() {
                        return Err(SyntaxError::new("VX-S011", "comma outside function argument list", span));
                    }
                    Expect::Operand
                }

                (Expect::Operator, Token::RParen) => {
                    self.close(span)?;
                    Expect::Operator
                }

                (Expect::Operator, tok) => {
                    return Err(SyntaxError::new(
                        "VX-S010",
                        format!("missing operator before {}", tok.describe()),
                        span,
                    ));
                }
            };
            unary = false;
            i += 1;
        }

        if self.depth > 0 {
            return Err(SyntaxError::new("VX-S007", "unterminated bracket", Span::point(end)));
        }
        if expect == Expect::Operand {
            return Err(SyntaxError::new("VX-S009", "expression is incomplete", Span::point(end)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn env() -> VarEnv {
        let mut env = VarEnv::new();
        env.set("x", Value::Scalar(5.0));
        env.set("radius", Value::Scalar(2.0));
        env
    }

    fn check_str(expr: &str) -> Result<()> {
        check(expr, &FunctionTable::builtin(), &env())
    }

    fn error(expr: &str) -> SyntaxError {
        check_str(expr).expect_err(expr)
    }

    #[test]
    fn accepts_well_formed_expressions() {
        for expr in [
            "2+3*4",
            "(2+3)*4",
            "2^3^2",
            "-(-5)",
            "x*2",
            "x=9",
            "x=radius=3",
            "sin(x)+cos(radius)",
            "max(1,min(x,3))",
            "pi()",
            "2*-3",
            "2--3",
            "1e-3*x",
            "x=1,radius=x+1",
            "vec(1,2,3)",
            "(x=3)+1",
            "undefined_name",
            "mystery(1)",
        ] {
            assert_eq!(check_str(expr), Ok(()), "{expr}");
        }
    }

    #[test]
    fn unterminated_bracket_reported_at_end() {
        let e = error("(2+3");
        assert_eq!(e.message, "unterminated bracket");
        assert_eq!(e.position(), 4);
    }

    #[test]
    fn function_without_bracket() {
        let e = error("sin+1");
        assert_eq!(e.message, "bracket does not follow function");
        assert_eq!(e.position(), 3);
    }

    #[test]
    fn function_with_empty_argument_list() {
        let e = error("sqrt()");
        assert_eq!(e.message, "no terms in a () function");
        assert_eq!(e.position(), 5);
    }

    #[test]
    fn variable_called_as_function() {
        let e = error("x(2)");
        assert_eq!(e.message, "variable used as a function");
        assert_eq!(e.position(), 1);
    }

    #[test]
    fn too_many_close_brackets() {
        let e = error("(2+3))");
        assert_eq!(e.message, "too many close brackets");
        assert_eq!(e.position(), 5);
    }

    #[test]
    fn rejects_trailing_operator() {
        let e = error("2+");
        assert_eq!(e.code, "VX-S008");
        assert_eq!(e.position(), 1);
    }

    #[test]
    fn splits_on_top_level_assignment() {
        assert_eq!(error("x=").message, "assignment has no value");
        assert_eq!(error("=3").message, "assignment has no target");
        // each side is validated on its own
        let e = error("(x=2");
        assert_eq!(e.message, "unterminated bracket");
        let e = error("x=(2");
        assert_eq!(e.message, "unterminated bracket");
        assert_eq!(e.position(), 4);
    }

    #[test]
    fn comma_inside_grouping_bracket() {
        let e = error("(1,2)");
        assert_eq!(e.code, "VX-S011");
        assert_eq!(e.position(), 2);
        assert_eq!(check_str("max((1),2)"), Ok(()));
    }

    #[test]
    fn missing_operands_and_operators() {
        assert_eq!(error("*2").code, "VX-S009");
        assert_eq!(error("2*(+3)").code, "VX-S009");
        assert_eq!(error("()").code, "VX-S012");
        assert_eq!(error("(2)(3)").code, "VX-S010");
        assert_eq!(error("2x").code, "VX-S010");
        assert_eq!(error("max(1,)").code, "VX-S009");
    }

    #[test]
    fn repeated_unary_minus() {
        assert_eq!(error("--5").code, "VX-S013");
    }

    #[test]
    fn empty_and_illegal_input() {
        assert_eq!(error("").code, "VX-S001");
        let e = error("2+$");
        assert_eq!(e.code, "VX-S002");
        assert_eq!(e.position(), 2);
    }
}
