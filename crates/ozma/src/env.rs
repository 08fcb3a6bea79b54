//! Lexical environments for compilation.
//!
//! One [`EnvFrame`] per procedure being compiled, stacked LIFO; frame 0 is
//! the top level. Each frame tracks positional parameters, a stack of nested
//! local-register allocators, and the closure captures promoted into it.
//! Top-level names are backed by store variables so their operands are
//! immediates.

use std::fmt;

use ahash::AHashMap;

use crate::{
    bytecode::{Operand, RegisterKind},
    store::{Store, Value},
};

/// Where a name is stored, and therefore which operand refers to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Parameter(usize),
    Local(usize),
    Closure(usize),
    /// A top-level binding backed by a store variable cell.
    Global(Value),
}

/// A resolved name binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
}

impl Symbol {
    #[must_use]
    pub fn operand(&self) -> Operand {
        match self.kind {
            SymbolKind::Parameter(index) => Operand::Register(RegisterKind::Parameter, index),
            SymbolKind::Local(index) => Operand::Register(RegisterKind::Local, index),
            SymbolKind::Closure(index) => Operand::Register(RegisterKind::Closure, index),
            SymbolKind::Global(value) => Operand::Immediate(value),
        }
    }
}

/// Environment operations that fail; the compiler attaches source positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvError {
    DuplicateParameter(String),
    LockedScope(String),
    Unbound(String),
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateParameter(name) => write!(f, "duplicate parameter: {name}"),
            Self::LockedScope(name) => write!(f, "cannot define '{name}' in a locked scope"),
            Self::Unbound(name) => write!(f, "unbound variable: {name}"),
        }
    }
}

/// One nested local-register allocator.
#[derive(Debug, Default)]
struct LocalScope {
    locked: bool,
    /// Names defined here with their local register indices.
    names: Vec<(String, usize)>,
}

/// Identifies a pushed local scope so pops can assert LIFO order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopeId(usize);

#[derive(Debug, Default)]
struct EnvFrame {
    params: Vec<String>,
    scopes: Vec<LocalScope>,
    /// Local registers currently allocated (scopes plus live temps).
    live_locals: usize,
    /// High-water mark; becomes the closure's `nlocals`.
    peak_locals: usize,
    /// Captured names in promotion order; index is the closure register.
    closures: Vec<String>,
}

impl EnvFrame {
    fn lookup(&self, name: &str) -> Option<SymbolKind> {
        for scope in self.scopes.iter().rev() {
            // Locked scopes still permit lookup.
            if let Some(&(_, index)) = scope.names.iter().rev().find(|(n, _)| n == name) {
                return Some(SymbolKind::Local(index));
            }
        }
        if let Some(index) = self.params.iter().position(|p| p == name) {
            return Some(SymbolKind::Parameter(index));
        }
        self.closures
            .iter()
            .position(|c| c == name)
            .map(SymbolKind::Closure)
    }

    /// Records a capture of `name`, reusing the register if already promoted.
    fn promote_closure(&mut self, name: &str) -> usize {
        if let Some(index) = self.closures.iter().position(|c| c == name) {
            return index;
        }
        self.closures.push(name.to_owned());
        self.closures.len() - 1
    }

    fn allocate_local(&mut self) -> usize {
        let index = self.live_locals;
        self.live_locals += 1;
        self.peak_locals = self.peak_locals.max(self.live_locals);
        index
    }
}

/// The environment stack for one compilation.
#[derive(Debug)]
pub struct Environments {
    frames: Vec<EnvFrame>,
    /// Top-level bindings, each backed by a store variable.
    globals: AHashMap<String, Value>,
}

impl Default for Environments {
    fn default() -> Self {
        Self::new()
    }
}

impl Environments {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: vec![EnvFrame::default()],
            globals: AHashMap::new(),
        }
    }

    fn current(&mut self) -> &mut EnvFrame {
        self.frames.last_mut().expect("environment stack is never empty")
    }

    #[must_use]
    pub fn at_top_level(&self) -> bool {
        self.frames.len() == 1
    }

    /// Enters a new procedure compilation unit.
    pub fn push_frame(&mut self) {
        self.frames.push(EnvFrame::default());
    }

    /// Leaves the current procedure compilation unit.
    ///
    /// # Panics
    /// Panics when called with only the top-level frame left; frames must be
    /// popped in strict LIFO order with the segment stack.
    pub fn pop_frame(&mut self) {
        assert!(self.frames.len() > 1, "cannot pop the top-level frame");
        self.frames.pop();
    }

    pub fn add_parameter(&mut self, name: &str) -> Result<(), EnvError> {
        let frame = self.current();
        if frame.params.iter().any(|p| p == name) {
            return Err(EnvError::DuplicateParameter(name.to_owned()));
        }
        frame.params.push(name.to_owned());
        Ok(())
    }

    /// Opens a nested local allocator; close with [`Self::pop_locals`].
    pub fn push_locals(&mut self) -> ScopeId {
        let frame = self.current();
        frame.scopes.push(LocalScope::default());
        ScopeId(frame.scopes.len() - 1)
    }

    /// Forbids new definitions in the innermost allocator while keeping its
    /// symbols visible.
    pub fn lock_locals(&mut self) {
        if let Some(scope) = self.current().scopes.last_mut() {
            scope.locked = true;
        }
    }

    /// Releases the innermost allocator and its register interval.
    ///
    /// # Panics
    /// Panics when `id` is not the innermost scope: allocators are strictly
    /// LIFO.
    pub fn pop_locals(&mut self, id: ScopeId) {
        let frame = self.current();
        assert_eq!(id.0, frame.scopes.len() - 1, "local scopes must pop in LIFO order");
        let scope = frame.scopes.pop().expect("scope to pop exists");
        frame.live_locals -= scope.names.len();
    }

    /// Defines a local in the innermost unlocked allocator.
    pub fn define(&mut self, name: &str) -> Result<Symbol, EnvError> {
        let frame = self.current();
        let Some(scope_index) = frame.scopes.iter().rposition(|scope| !scope.locked) else {
            return Err(EnvError::LockedScope(name.to_owned()));
        };
        let index = frame.allocate_local();
        frame.scopes[scope_index].names.push((name.to_owned(), index));
        Ok(Symbol {
            name: name.to_owned(),
            kind: SymbolKind::Local(index),
        })
    }

    /// Creates a top-level binding backed by a fresh store variable.
    pub fn define_global(&mut self, name: &str, store: &mut Store) -> Symbol {
        let value = *self
            .globals
            .entry(name.to_owned())
            .or_insert_with(|| store.new_variable());
        Symbol {
            name: name.to_owned(),
            kind: SymbolKind::Global(value),
        }
    }

    #[must_use]
    pub fn exists_globally(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    /// Resolves `name` from the innermost frame outwards.
    ///
    /// A name found in an enclosing procedure is promoted to a closure
    /// capture in every frame between its definition and the use site, so
    /// nested procedures chain their captures.
    pub fn get(&mut self, name: &str) -> Result<Symbol, EnvError> {
        let current = self.frames.len() - 1;
        if let Some(kind) = self.frames[current].lookup(name) {
            return Ok(Symbol {
                name: name.to_owned(),
                kind,
            });
        }

        for depth in (0..current).rev() {
            if self.frames[depth].lookup(name).is_some() {
                let mut index = 0;
                for frame in &mut self.frames[depth + 1..] {
                    index = frame.promote_closure(name);
                }
                return Ok(Symbol {
                    name: name.to_owned(),
                    kind: SymbolKind::Closure(index),
                });
            }
        }

        if let Some(&value) = self.globals.get(name) {
            return Ok(Symbol {
                name: name.to_owned(),
                kind: SymbolKind::Global(value),
            });
        }
        Err(EnvError::Unbound(name.to_owned()))
    }

    #[must_use]
    pub fn nparams(&self) -> usize {
        self.frames.last().expect("environment stack is never empty").params.len()
    }

    #[must_use]
    pub fn nlocals(&self) -> usize {
        self.frames
            .last()
            .expect("environment stack is never empty")
            .peak_locals
    }

    #[must_use]
    pub fn nclosures(&self) -> usize {
        self.frames
            .last()
            .expect("environment stack is never empty")
            .closures
            .len()
    }

    fn temp_acquire(&mut self) -> usize {
        self.current().allocate_local()
    }

    fn temp_release(&mut self, index: usize) {
        let frame = self.current();
        assert_eq!(index, frame.live_locals - 1, "temporaries must release in LIFO order");
        frame.live_locals -= 1;
    }
}

/// A one-shot local register allocation scoped to a single expression.
///
/// Acquire on use, release on scope exit; releases assert LIFO order with
/// any other live temporaries.
#[derive(Debug)]
pub struct ScopedTemp {
    index: usize,
}

impl ScopedTemp {
    #[must_use]
    pub fn allocate(envs: &mut Environments) -> Self {
        Self {
            index: envs.temp_acquire(),
        }
    }

    #[must_use]
    pub fn operand(&self) -> Operand {
        Operand::Register(RegisterKind::Local, self.index)
    }

    pub fn release(self, envs: &mut Environments) {
        envs.temp_release(self.index);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn duplicate_parameters_are_rejected() {
        let mut envs = Environments::new();
        envs.push_frame();
        envs.add_parameter("X").expect("first add");
        assert_eq!(
            envs.add_parameter("X"),
            Err(EnvError::DuplicateParameter("X".to_owned()))
        );
    }

    #[test]
    fn locals_allocate_and_release_lifo() {
        let mut envs = Environments::new();
        envs.push_frame();
        let outer = envs.push_locals();
        let x = envs.define("X").expect("defines");
        assert_eq!(x.kind, SymbolKind::Local(0));

        let inner = envs.push_locals();
        let y = envs.define("Y").expect("defines");
        assert_eq!(y.kind, SymbolKind::Local(1));
        envs.pop_locals(inner);

        // The released interval is reused.
        let inner = envs.push_locals();
        let z = envs.define("Z").expect("defines");
        assert_eq!(z.kind, SymbolKind::Local(1));
        envs.pop_locals(inner);
        envs.pop_locals(outer);

        assert_eq!(envs.nlocals(), 2);
    }

    #[test]
    fn locked_scopes_resolve_but_reject_definitions() {
        let mut envs = Environments::new();
        envs.push_frame();
        let scope = envs.push_locals();
        envs.define("X").expect("defines");
        envs.lock_locals();

        assert_eq!(envs.get("X").expect("resolves").kind, SymbolKind::Local(0));
        assert_eq!(envs.define("Y"), Err(EnvError::LockedScope("Y".to_owned())));
        envs.pop_locals(scope);
    }

    #[test]
    fn closure_promotion_chains_through_frames() {
        let mut envs = Environments::new();
        envs.push_frame();
        envs.add_parameter("X").expect("adds");
        envs.push_frame();
        envs.push_frame();

        let symbol = envs.get("X").expect("resolves");
        assert_eq!(symbol.kind, SymbolKind::Closure(0));
        assert_eq!(envs.nclosures(), 1);

        // The intermediate frame also captured the name.
        envs.pop_frame();
        assert_eq!(envs.nclosures(), 1);

        // Re-resolving reuses the closure register.
        let again = envs.get("X").expect("resolves");
        assert_eq!(again.kind, SymbolKind::Closure(0));
        assert_eq!(envs.nclosures(), 1);
    }

    #[test]
    fn globals_are_store_backed() {
        let mut envs = Environments::new();
        let mut store = Store::new();
        assert!(!envs.exists_globally("X"));
        assert_eq!(envs.get("X"), Err(EnvError::Unbound("X".to_owned())));

        let symbol = envs.define_global("X", &mut store);
        assert!(envs.exists_globally("X"));
        let SymbolKind::Global(value) = symbol.kind else {
            panic!("expected global symbol");
        };
        // Defining again reuses the same store cell.
        assert_eq!(envs.define_global("X", &mut store).kind, SymbolKind::Global(value));
        assert_eq!(envs.get("X").expect("resolves").kind, SymbolKind::Global(value));
    }

    #[test]
    fn temps_release_in_lifo_order() {
        let mut envs = Environments::new();
        envs.push_frame();
        let a = ScopedTemp::allocate(&mut envs);
        let b = ScopedTemp::allocate(&mut envs);
        assert_eq!(b.operand(), Operand::Register(RegisterKind::Local, 1));
        b.release(&mut envs);
        a.release(&mut envs);
        assert_eq!(envs.nlocals(), 2);
    }
}
