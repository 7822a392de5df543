/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    pub short: &'static str,
    pub long: &'static str,
}

/// Every stable error code the crate reports.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Syntax ───────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "VX-S001",
        short: "empty expression",
        long: "The expression contains nothing but whitespace.\n",
    },
    ErrorEntry {
        code: "VX-S002",
        short: "unexpected character",
        long: r#"A character outside the expression alphabet was found.

Expressions use numbers, identifiers made of letters, digits and `_`,
the operators `+ - * / % ^ =`, commas and round brackets.

    2 + $x
"#,
    },
    ErrorEntry {
        code: "VX-S003",
        short: "bracket does not follow function",
        long: r#"A function name must be followed by its argument list.

    sin + 1      # wrong
    sin(1) + 1   # right
"#,
    },
    ErrorEntry {
        code: "VX-S004",
        short: "no terms in a () function",
        long: r#"Only zero-argument functions such as `pi()` may be called with
empty brackets.

    sqrt()
"#,
    },
    ErrorEntry {
        code: "VX-S005",
        short: "variable used as a function",
        long: r#"A name bound to a variable was followed by `(`. Insert an operator
if multiplication was meant.

    r(2)     # wrong
    r*(2)    # right
"#,
    },
    ErrorEntry {
        code: "VX-S006",
        short: "too many close brackets",
        long: "A `)` appeared with no matching `(` before it.\n",
    },
    ErrorEntry {
        code: "VX-S007",
        short: "unterminated bracket",
        long: "The expression ended while a `(` was still open.\n",
    },
    ErrorEntry {
        code: "VX-S008",
        short: "expression ends with an operator",
        long: r#"An expression must end with a number, a name or `)`.

    2 +
"#,
    },
    ErrorEntry {
        code: "VX-S009",
        short: "missing operand",
        long: r#"An operator or separator was found where a value was expected.

    2 * (+3)
    max(1,)
"#,
    },
    ErrorEntry {
        code: "VX-S010",
        short: "missing operator",
        long: r#"Two values are adjacent with nothing joining them. There is no
implicit multiplication.

    2x       # wrong
    2*x      # right
"#,
    },
    ErrorEntry {
        code: "VX-S011",
        short: "comma outside function argument list",
        long: r#"Commas separate function arguments, or whole expressions at the top
level. Inside plain grouping brackets they are not allowed.

    (1, 2)
"#,
    },
    ErrorEntry {
        code: "VX-S012",
        short: "empty brackets",
        long: "Grouping brackets must contain an expression.\n",
    },
    ErrorEntry {
        code: "VX-S013",
        short: "repeated unary minus",
        long: r#"Two unary minus signs in a row are rejected. Bracket the inner one.

    --5      # wrong
    -(-5)    # right
"#,
    },
    ErrorEntry {
        code: "VX-S014",
        short: "assignment missing a side",
        long: "Both sides of `=` must be present, as in `x = 2`.\n",
    },
    // ── Compile ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "VX-C001",
        short: "unknown identifier",
        long: r#"The name is neither a defined variable nor a built-in function.
Variables must exist before an expression that reads them is parsed.
"#,
    },
    ErrorEntry {
        code: "VX-C002",
        short: "wrong number of arguments",
        long: r#"A function was called with a different number of arguments than it
takes.

    atan2(1)
"#,
    },
    ErrorEntry {
        code: "VX-C003",
        short: "unterminated bracket",
        long: "The compiler reached the end of input inside a bracket.\n",
    },
    ErrorEntry {
        code: "VX-C004",
        short: "invalid assignment target",
        long: r#"Only a single variable name may appear to the left of `=`.

    x + 1 = 3
"#,
    },
    ErrorEntry {
        code: "VX-C005",
        short: "unexpected token",
        long: "A token appeared where the grammar does not allow it.\n",
    },
    ErrorEntry {
        code: "VX-C006",
        short: "unexpected end of expression",
        long: "The expression stopped where a value was still required.\n",
    },
    ErrorEntry {
        code: "VX-C007",
        short: "unbalanced program",
        long: "The compiled program would not leave exactly one value.\n",
    },
    // ── Evaluation ───────────────────────────────────────────────────────────
    ErrorEntry {
        code: "VX-E001",
        short: "division by zero",
        long: "A `/` or `%` had a zero divisor, or a zero vector component.\n",
    },
    ErrorEntry {
        code: "VX-E002",
        short: "numeric domain error",
        long: r#"A function or operator was applied outside its domain, such as the
square root of a negative number or a negative base raised to a
fractional power.
"#,
    },
    ErrorEntry {
        code: "VX-E003",
        short: "variable no longer exists",
        long: r#"The parsed program refers to a variable that has since been removed.
Parse the expression again after redefining it.
"#,
    },
    ErrorEntry {
        code: "VX-E004",
        short: "type mismatch",
        long: r#"The operand kinds do not combine. Vectors add to vectors, scalars
scale vectors, and text takes no part in arithmetic.

    vec(1,2,3) + 1
"#,
    },
    ErrorEntry {
        code: "VX-E005",
        short: "bad function argument",
        long: "A function received an argument of the wrong kind.\n",
    },
    ErrorEntry {
        code: "VX-E006",
        short: "corrupt program",
        long: "The evaluator's stack did not balance. This indicates a compiler bug.\n",
    },
    ErrorEntry {
        code: "VX-E007",
        short: "conversion failed",
        long: "The value could not be converted to the requested type.\n",
    },
    ErrorEntry {
        code: "VX-E008",
        short: "no expression parsed",
        long: "Evaluation was requested before any expression was parsed.\n",
    },
    // ── Environment ──────────────────────────────────────────────────────────
    ErrorEntry {
        code: "VX-V001",
        short: "variable already defined",
        long: "`define` refuses to overwrite a variable. Use `set` to change it.\n",
    },
    ErrorEntry {
        code: "VX-V002",
        short: "no such variable",
        long: "The named variable does not exist.\n",
    },
    // ── Model files ──────────────────────────────────────────────────────────
    ErrorEntry {
        code: "VX-M001",
        short: "malformed model line",
        long: r#"Each non-blank, non-comment line of a model file must have the form
`name = expression` or `name = "text"`.
"#,
    },
    ErrorEntry {
        code: "VX-M002",
        short: "variable redefined",
        long: "A model file assigns the same name more than once. The last one wins.\n",
    },
    ErrorEntry {
        code: "VX-M003",
        short: "invalid variable name",
        long: r#"Variable names start with a letter or `_` and continue with letters,
digits or `_`. Names of built-in functions are reserved.
"#,
    },
];

/// Look up an error entry by code (e.g. `"VX-S007"`).
pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code.eq_ignore_ascii_case(code))
}
