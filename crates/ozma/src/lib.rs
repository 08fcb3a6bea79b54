#![doc = include_str!("../../../README.md")]

mod ast;
mod bytecode;
mod env;
mod expr;
mod lex;
mod parse;
mod run;
mod store;
mod visit;

pub use crate::{
    ast::{GenericNode, Node},
    bytecode::{CompileError, Compiler, Instruction, Opcode, Operand, RegisterKind, Segment},
    env::{EnvError, Environments, ScopeId, ScopedTemp, Symbol, SymbolKind},
    lex::{CodeLoc, CodeRange, LexError, LexKind, LexValue, Lexeme, tokenize},
    parse::{ParseError, parse_lexemes},
    run::{Compilation, Error, compile, compile_unit, parse_program},
    store::{Closure, Store, StoreData, Value},
    visit::{CheckError, check_errors, walk},
};
