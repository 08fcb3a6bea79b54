//! The public compilation entry point.
//!
//! Ties the pipeline together: lexer → scope/structural/expression parsers →
//! error check → compile visitor.

use std::fmt;

use crate::{
    ast::Node,
    bytecode::{CompileError, Compiler, Segment},
    lex::{self, LexError},
    parse::{self, ParseError},
    store::{Store, Value},
    visit::{self, CheckError},
};

/// Any failure surfaced by [`compile`].
#[derive(Debug)]
pub enum Error {
    Lex(LexError),
    Parse(ParseError),
    /// Structural errors embedded in the AST, collected by the check pass.
    Check(Vec<CheckError>),
    Compile(CompileError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(err) => err.fmt(f),
            Self::Parse(err) => err.fmt(f),
            Self::Check(errors) => {
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        writeln!(f)?;
                    }
                    err.fmt(f)?;
                }
                Ok(())
            }
            Self::Compile(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {}

impl From<LexError> for Error {
    fn from(err: LexError) -> Self {
        Self::Lex(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Self::Parse(err)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}

/// The output of one compilation unit.
#[derive(Debug)]
pub struct Compilation {
    /// The last computed top-level value, typically a closure.
    pub value: Value,
    /// Bytecode emitted for the top-level statements themselves.
    pub segment: Segment,
}

/// Parses and error-checks source text, without compiling it.
pub fn parse_program(code: &str) -> Result<Node, Error> {
    let lexemes = lex::tokenize(code)?;
    let root = parse::parse_lexemes(&lexemes)?;
    let errors = visit::check_errors(&root);
    if !errors.is_empty() {
        return Err(Error::Check(errors));
    }
    Ok(root)
}

/// Compiles source text against `store`, returning the result value together
/// with the top-level segment.
pub fn compile_unit(code: &str, store: &mut Store) -> Result<Compilation, Error> {
    let root = parse_program(code)?;
    let (value, segment) = Compiler::compile_program(&root, store)?;
    Ok(Compilation { value, segment })
}

/// Compiles source text against `store` and returns the last computed value.
pub fn compile(code: &str, store: &mut Store) -> Result<Value, Error> {
    compile_unit(code, store).map(|compilation| compilation.value)
}
