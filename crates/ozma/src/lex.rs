//! Lexer for Oz-family source text.
//!
//! Produces a flat stream of [`Lexeme`]s consumed by the scope parser. Every
//! lexeme carries a coarse [`LexKind`] used for parser dispatch, an exact kind
//! distinguishing bracket variants (`local` vs `(` both open a `Begin` scope),
//! a source [`CodeRange`], and an optional literal [`LexValue`].

use std::{borrow::Cow, fmt};

use num_bigint::BigInt;
use strum::IntoStaticStr;

/// A single position in source text.
///
/// Lines and columns are 0-indexed internally; `Display` renders them
/// 1-indexed the way diagnostics conventionally do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CodeLoc {
    pub line: u32,
    pub column: u32,
}

impl CodeLoc {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for CodeLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{},c{}", self.line + 1, self.column + 1)
    }
}

/// Source code span used by lexemes, AST nodes, and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct CodeRange {
    start: CodeLoc,
    end: CodeLoc,
}

impl CodeRange {
    #[must_use]
    pub const fn new(start: CodeLoc, end: CodeLoc) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn start(&self) -> CodeLoc {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> CodeLoc {
        self.end
    }

    /// Returns the smallest range covering both `self` and `other`.
    #[must_use]
    pub fn cover(self, other: Self) -> Self {
        let start = if (other.start.line, other.start.column) < (self.start.line, self.start.column) {
            other.start
        } else {
            self.start
        };
        let end = if (other.end.line, other.end.column) > (self.end.line, self.end.column) {
            other.end
        } else {
            self.end
        };
        Self { start, end }
    }

    /// Returns true when `other` lies entirely within `self`.
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        (self.start.line, self.start.column) <= (other.start.line, other.start.column)
            && (self.end.line, self.end.column) >= (other.end.line, other.end.column)
    }
}

impl fmt::Display for CodeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.start.fmt(f)
    }
}

/// Lexeme kinds.
///
/// One enum serves both the coarse `kind` (parser dispatch) and the exact
/// kind (bracket matching). The two differ only for scope delimiters:
/// `local` and `(` both get coarse kind `Begin`, and all four closers get
/// coarse kind `End`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, serde::Serialize, serde::Deserialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum LexKind {
    // Literals and names
    Integer,
    Atom,
    String,
    Real,
    Variable,
    /// The anonymous variable `$`.
    VarAnon,
    /// `!Var` marks a variable that must not be captured as a fresh definition.
    VarNodef,
    /// `!!X` read-only view.
    ReadOnly,

    // Scope structure
    TopLevel,
    Begin,
    End,
    In,
    Then,
    Of,
    Elseif,
    Elsecase,
    Else,
    Elseof,
    Catch,
    Finally,

    // Keyword openers
    Case,
    Class,
    For,
    Fun,
    Functor,
    If,
    Local,
    Lock,
    Meth,
    Proc,
    Raise,
    Thread,
    Try,

    // Functor and class sections
    Export,
    Require,
    Prepare,
    Import,
    Define,
    From,
    Prop,
    Feat,
    Attr,

    // Brackets
    CallBegin,
    CallEnd,
    ListBegin,
    ListEnd,
    BeginLparen,
    EndRparen,
    BeginRecordFeatures,

    // Records
    RecordCons,
    RecordOpen,
    RecordAccess,
    RecordDefFeature,

    // Numeric operators
    NumericNeg,
    NumericMul,
    NumericAdd,
    NumericMinus,
    NumericDiv,

    // Cells and attributes
    CellAccess,
    CellAssign,
    AttrAssign,

    // Comparisons
    Equal,
    Different,
    GreaterOrEqual,
    LessOrEqual,
    GreaterThan,
    LessThan,

    // Boolean connectives
    AndThen,
    OrElse,

    // Structure operators
    Unify,
    ListCons,
    TupleCons,

    Invalid,
}

impl LexKind {
    /// Maps an exact kind to the coarse kind the parsers dispatch on.
    #[must_use]
    pub fn coarse(self) -> Self {
        match self {
            Self::Local | Self::BeginLparen => Self::Begin,
            Self::CallEnd | Self::ListEnd | Self::EndRparen => Self::End,
            other => other,
        }
    }
}

impl fmt::Display for LexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}

/// Literal payload of a lexeme.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub enum LexValue {
    #[default]
    None,
    Int(BigInt),
    Atom(String),
    Str(String),
    Real(f64),
    Var(String),
}

/// A single token produced by the lexer.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Lexeme {
    /// Coarse kind the parsers dispatch on.
    pub kind: LexKind,
    /// Exact kind distinguishing bracket variants.
    pub exact: LexKind,
    pub span: CodeRange,
    pub value: LexValue,
}

impl Lexeme {
    fn plain(exact: LexKind, span: CodeRange) -> Self {
        Self {
            kind: exact.coarse(),
            exact,
            span,
            value: LexValue::None,
        }
    }
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            LexValue::None => write!(f, "'{}' at {}", self.exact, self.span),
            LexValue::Int(v) => write!(f, "integer {v} at {}", self.span),
            LexValue::Atom(v) => write!(f, "atom '{v}' at {}", self.span),
            LexValue::Str(v) => write!(f, "string {v:?} at {}", self.span),
            LexValue::Real(v) => write!(f, "real {v} at {}", self.span),
            LexValue::Var(v) => write!(f, "variable {v} at {}", self.span),
        }
    }
}

/// Errors produced while tokenizing source text.
#[derive(Debug, Clone)]
pub struct LexError {
    pub message: Cow<'static, str>,
    pub position: CodeRange,
}

impl LexError {
    fn new(message: impl Into<Cow<'static, str>>, position: CodeRange) -> Self {
        Self {
            message: message.into(),
            position,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "lex error at {}: {}", self.position, self.message)
    }
}

impl std::error::Error for LexError {}

fn keyword_kind(word: &str) -> Option<LexKind> {
    let kind = match word {
        "andthen" => LexKind::AndThen,
        "attr" => LexKind::Attr,
        "case" => LexKind::Case,
        "catch" => LexKind::Catch,
        "class" => LexKind::Class,
        "define" => LexKind::Define,
        "div" => LexKind::NumericDiv,
        "else" => LexKind::Else,
        "elsecase" => LexKind::Elsecase,
        "elseif" => LexKind::Elseif,
        "elseof" => LexKind::Elseof,
        "end" => LexKind::End,
        "export" => LexKind::Export,
        "feat" => LexKind::Feat,
        "finally" => LexKind::Finally,
        "for" => LexKind::For,
        "from" => LexKind::From,
        "fun" => LexKind::Fun,
        "functor" => LexKind::Functor,
        "if" => LexKind::If,
        "import" => LexKind::Import,
        "in" => LexKind::In,
        "local" => LexKind::Local,
        "lock" => LexKind::Lock,
        "meth" => LexKind::Meth,
        "of" => LexKind::Of,
        "orelse" => LexKind::OrElse,
        "prepare" => LexKind::Prepare,
        "proc" => LexKind::Proc,
        "prop" => LexKind::Prop,
        "raise" => LexKind::Raise,
        "require" => LexKind::Require,
        "then" => LexKind::Then,
        "thread" => LexKind::Thread,
        "try" => LexKind::Try,
        _ => return None,
    };
    Some(kind)
}

/// Tokenizes source text into a lexeme stream.
pub fn tokenize(code: &str) -> Result<Vec<Lexeme>, LexError> {
    Lexer::new(code).run()
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    tokens: Vec<Lexeme>,
}

impl Lexer {
    fn new(code: &str) -> Self {
        Self {
            chars: code.chars().collect(),
            pos: 0,
            line: 0,
            column: 0,
            tokens: Vec::new(),
        }
    }

    fn loc(&self) -> CodeLoc {
        CodeLoc::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push_plain(&mut self, exact: LexKind, start: CodeLoc) {
        let span = CodeRange::new(start, self.loc());
        self.tokens.push(Lexeme::plain(exact, span));
    }

    fn run(mut self) -> Result<Vec<Lexeme>, LexError> {
        while let Some(c) = self.peek() {
            let start = self.loc();
            match c {
                ' ' | '\t' | '\r' | '\n' => {
                    self.bump();
                }
                '%' => self.skip_line_comment(),
                '/' if self.peek_at(1) == Some('*') => self.skip_block_comment(start)?,
                '0'..='9' => self.lex_number(start)?,
                'a'..='z' => self.lex_atom_or_keyword(start),
                'A'..='Z' | '_' => self.lex_variable(start),
                '\'' => self.lex_quoted_atom(start)?,
                '`' => self.lex_quoted_variable(start)?,
                '"' => self.lex_string(start)?,
                _ => self.lex_operator(start)?,
            }
        }
        Ok(self.tokens)
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.bump() {
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self, start: CodeLoc) -> Result<(), LexError> {
        self.bump();
        self.bump();
        loop {
            match self.peek() {
                Some('*') if self.peek_at(1) == Some('/') => {
                    self.bump();
                    self.bump();
                    return Ok(());
                }
                Some(_) => {
                    self.bump();
                }
                None => {
                    return Err(LexError::new(
                        "unterminated block comment",
                        CodeRange::new(start, self.loc()),
                    ));
                }
            }
        }
    }

    fn lex_number(&mut self, start: CodeLoc) -> Result<(), LexError> {
        let mut digits = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                digits.push(c);
                self.bump();
            } else {
                break;
            }
        }
        // A real literal needs a digit after the dot, otherwise the dot is
        // record access (e.g. `X.1` vs `1.5`).
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            digits.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() {
                    digits.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            let span = CodeRange::new(start, self.loc());
            let value: f64 = digits
                .parse()
                .map_err(|_| LexError::new(format!("invalid real literal: {digits}"), span))?;
            self.tokens.push(Lexeme {
                kind: LexKind::Real,
                exact: LexKind::Real,
                span,
                value: LexValue::Real(value),
            });
        } else {
            let span = CodeRange::new(start, self.loc());
            let value = BigInt::parse_bytes(digits.as_bytes(), 10)
                .ok_or_else(|| LexError::new(format!("invalid integer literal: {digits}"), span))?;
            self.tokens.push(Lexeme {
                kind: LexKind::Integer,
                exact: LexKind::Integer,
                span,
                value: LexValue::Int(value),
            });
        }
        Ok(())
    }

    fn lex_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn lex_atom_or_keyword(&mut self, start: CodeLoc) {
        let word = self.lex_word();
        if let Some(kind) = keyword_kind(&word) {
            self.push_plain(kind, start);
        } else {
            let span = CodeRange::new(start, self.loc());
            self.tokens.push(Lexeme {
                kind: LexKind::Atom,
                exact: LexKind::Atom,
                span,
                value: LexValue::Atom(word),
            });
            self.maybe_record_cons(span);
        }
    }

    fn lex_variable(&mut self, start: CodeLoc) {
        let word = self.lex_word();
        let span = CodeRange::new(start, self.loc());
        self.tokens.push(Lexeme {
            kind: LexKind::Variable,
            exact: LexKind::Variable,
            span,
            value: LexValue::Var(word),
        });
        self.maybe_record_cons(span);
    }

    fn lex_quoted(&mut self, start: CodeLoc, delim: char, what: &'static str) -> Result<String, LexError> {
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('\\') => text.push('\\'),
                    Some(c) if c == delim => text.push(c),
                    Some(c) => {
                        return Err(LexError::new(
                            format!("invalid escape '\\{c}' in {what}"),
                            CodeRange::new(start, self.loc()),
                        ));
                    }
                    None => {
                        return Err(LexError::new(
                            format!("unterminated {what}"),
                            CodeRange::new(start, self.loc()),
                        ));
                    }
                },
                Some(c) if c == delim => return Ok(text),
                Some(c) => text.push(c),
                None => {
                    return Err(LexError::new(
                        format!("unterminated {what}"),
                        CodeRange::new(start, self.loc()),
                    ));
                }
            }
        }
    }

    fn lex_quoted_atom(&mut self, start: CodeLoc) -> Result<(), LexError> {
        let text = self.lex_quoted(start, '\'', "quoted atom")?;
        let span = CodeRange::new(start, self.loc());
        self.tokens.push(Lexeme {
            kind: LexKind::Atom,
            exact: LexKind::Atom,
            span,
            value: LexValue::Atom(text),
        });
        self.maybe_record_cons(span);
        Ok(())
    }

    fn lex_quoted_variable(&mut self, start: CodeLoc) -> Result<(), LexError> {
        let text = self.lex_quoted(start, '`', "quoted variable")?;
        let span = CodeRange::new(start, self.loc());
        self.tokens.push(Lexeme {
            kind: LexKind::Variable,
            exact: LexKind::Variable,
            span,
            value: LexValue::Var(text),
        });
        self.maybe_record_cons(span);
        Ok(())
    }

    fn lex_string(&mut self, start: CodeLoc) -> Result<(), LexError> {
        let text = self.lex_quoted(start, '"', "string literal")?;
        let span = CodeRange::new(start, self.loc());
        self.tokens.push(Lexeme {
            kind: LexKind::String,
            exact: LexKind::String,
            span,
            value: LexValue::Str(text),
        });
        Ok(())
    }

    /// Record construction: a label directly followed by `(` with no space.
    ///
    /// Inserts a marker lexeme before the label so the expression parser sees
    /// the three-token shape `[RecordCons, label, features-group]`, and turns
    /// the upcoming `(` into a record-features opener.
    fn maybe_record_cons(&mut self, label_span: CodeRange) {
        if self.peek() != Some('(') {
            return;
        }
        let marker = Lexeme::plain(LexKind::RecordCons, CodeRange::new(label_span.start(), label_span.start()));
        let label_index = self.tokens.len() - 1;
        self.tokens.insert(label_index, marker);
        let start = self.loc();
        self.bump();
        self.push_plain(LexKind::BeginRecordFeatures, start);
    }

    fn lex_operator(&mut self, start: CodeLoc) -> Result<(), LexError> {
        let c = self.bump().expect("operator char present");
        let exact = match c {
            '{' => LexKind::CallBegin,
            '}' => LexKind::CallEnd,
            '[' => LexKind::ListBegin,
            ']' => LexKind::ListEnd,
            '(' => LexKind::BeginLparen,
            ')' => LexKind::EndRparen,
            '$' => LexKind::VarAnon,
            '@' => LexKind::CellAccess,
            '~' => LexKind::NumericNeg,
            '*' => LexKind::NumericMul,
            '+' => LexKind::NumericAdd,
            '-' => LexKind::NumericMinus,
            '/' => LexKind::NumericDiv,
            '#' => LexKind::TupleCons,
            '|' => LexKind::ListCons,
            ',' => LexKind::Invalid,
            '!' => {
                if self.peek() == Some('!') {
                    self.bump();
                    LexKind::ReadOnly
                } else {
                    LexKind::VarNodef
                }
            }
            '.' => {
                if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
                    self.bump();
                    self.bump();
                    LexKind::RecordOpen
                } else {
                    LexKind::RecordAccess
                }
            }
            ':' => {
                if self.peek() == Some('=') {
                    self.bump();
                    LexKind::CellAssign
                } else {
                    LexKind::RecordDefFeature
                }
            }
            '=' => {
                if self.peek() == Some('=') {
                    self.bump();
                    LexKind::Equal
                } else if self.peek() == Some('<') {
                    self.bump();
                    LexKind::LessOrEqual
                } else {
                    LexKind::Unify
                }
            }
            '\\' => {
                if self.peek() == Some('=') {
                    self.bump();
                    LexKind::Different
                } else {
                    return Err(LexError::new(
                        "unexpected character '\\'",
                        CodeRange::new(start, self.loc()),
                    ));
                }
            }
            '<' => {
                if self.peek() == Some('-') {
                    self.bump();
                    LexKind::AttrAssign
                } else {
                    LexKind::LessThan
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    LexKind::GreaterOrEqual
                } else {
                    LexKind::GreaterThan
                }
            }
            other => {
                return Err(LexError::new(
                    format!("unexpected character '{other}'"),
                    CodeRange::new(start, self.loc()),
                ));
            }
        };
        self.push_plain(exact, start);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(code: &str) -> Vec<LexKind> {
        tokenize(code).expect("lexes").into_iter().map(|l| l.exact).collect()
    }

    #[test]
    fn keywords_and_brackets() {
        assert_eq!(
            kinds("local X in X = 1 end"),
            vec![
                LexKind::Local,
                LexKind::Variable,
                LexKind::In,
                LexKind::Variable,
                LexKind::Unify,
                LexKind::Integer,
                LexKind::End,
            ]
        );
    }

    #[test]
    fn coarse_kind_groups_scope_openers() {
        let tokens = tokenize("local ( end )").expect("lexes");
        assert_eq!(tokens[0].kind, LexKind::Begin);
        assert_eq!(tokens[1].kind, LexKind::Begin);
        assert_eq!(tokens[2].kind, LexKind::End);
        assert_eq!(tokens[3].kind, LexKind::End);
        assert_eq!(tokens[3].exact, LexKind::EndRparen);
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(
            kinds("== \\= =< >= < > := <- !! ! ... . | #"),
            vec![
                LexKind::Equal,
                LexKind::Different,
                LexKind::LessOrEqual,
                LexKind::GreaterOrEqual,
                LexKind::LessThan,
                LexKind::GreaterThan,
                LexKind::CellAssign,
                LexKind::AttrAssign,
                LexKind::ReadOnly,
                LexKind::VarNodef,
                LexKind::RecordOpen,
                LexKind::RecordAccess,
                LexKind::ListCons,
                LexKind::TupleCons,
            ]
        );
    }

    #[test]
    fn record_construction_inserts_marker() {
        assert_eq!(
            kinds("point(x:1)"),
            vec![
                LexKind::RecordCons,
                LexKind::Atom,
                LexKind::BeginRecordFeatures,
                LexKind::Atom,
                LexKind::RecordDefFeature,
                LexKind::Integer,
                LexKind::EndRparen,
            ]
        );
    }

    #[test]
    fn spaced_paren_is_grouping_not_record() {
        assert_eq!(
            kinds("point (1)"),
            vec![LexKind::Atom, LexKind::BeginLparen, LexKind::Integer, LexKind::EndRparen]
        );
    }

    #[test]
    fn real_vs_record_access() {
        let tokens = tokenize("1.5 X.1").expect("lexes");
        assert_eq!(tokens[0].exact, LexKind::Real);
        assert_eq!(tokens[1].exact, LexKind::Variable);
        assert_eq!(tokens[2].exact, LexKind::RecordAccess);
        assert_eq!(tokens[3].exact, LexKind::Integer);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 % line comment\n/* block\ncomment */ 2"),
            vec![LexKind::Integer, LexKind::Integer]
        );
    }

    #[test]
    fn positions_track_lines_and_columns() {
        let tokens = tokenize("X\n  Y").expect("lexes");
        assert_eq!(tokens[0].span.start(), CodeLoc::new(0, 0));
        assert_eq!(tokens[1].span.start(), CodeLoc::new(1, 2));
        assert_eq!(tokens[1].span.end(), CodeLoc::new(1, 3));
    }

    #[test]
    fn quoted_atoms_and_variables() {
        let tokens = tokenize("'hello world' `lower`").expect("lexes");
        assert_eq!(tokens[0].value, LexValue::Atom("hello world".to_owned()));
        assert_eq!(tokens[1].value, LexValue::Var("lower".to_owned()));
    }

    #[test]
    fn unterminated_string_errors() {
        let err = tokenize("\"abc").expect_err("should fail");
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn big_integers_are_arbitrary_precision() {
        let tokens = tokenize("123456789012345678901234567890").expect("lexes");
        let LexValue::Int(v) = &tokens[0].value else {
            panic!("expected integer, got {:?}", tokens[0].value);
        };
        assert_eq!(v.to_string(), "123456789012345678901234567890");
    }
}
