//! The value store shared between the compiler and the abstract machine.
//!
//! Values live in an arena and are addressed by the `Copy` handle [`Value`].
//! Atoms are interned so atom equality is handle equality, which is also how
//! call emission decides between `call` and `call_native`.

use ahash::AHashMap;
use indexmap::IndexMap;
use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::bytecode::Segment;

/// Handle to a value in the store arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Value(u32);

impl Value {
    /// Raw arena index, used when rendering operands.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A compiled procedure: a bytecode segment plus its register frame layout.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Closure {
    pub segment: Segment,
    pub nparams: usize,
    pub nlocals: usize,
    pub nclosures: usize,
}

/// Store cell contents.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum StoreData {
    Integer(BigInt),
    Atom(String),
    Str(String),
    Real(f64),
    List { head: Value, tail: Value },
    Tuple { label: Value, items: Vec<Value> },
    Record { label: Value, features: IndexMap<Value, Value> },
    /// A record still accepting new features; `optimize` may later seal it.
    OpenRecord { label: Value, features: IndexMap<Value, Value> },
    Array(Vec<Value>),
    /// An unbound logic variable.
    Variable,
    Closure(Closure),
}

/// Arena of store values with atom interning.
#[derive(Debug, Default)]
pub struct Store {
    cells: Vec<StoreData>,
    atoms: AHashMap<String, Value>,
}

impl Store {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, data: StoreData) -> Value {
        let index = u32::try_from(self.cells.len()).expect("store arena exceeds u32 range");
        self.cells.push(data);
        Value(index)
    }

    pub fn new_integer(&mut self, value: impl Into<BigInt>) -> Value {
        self.alloc(StoreData::Integer(value.into()))
    }

    /// Interns an atom: the same name always yields the same handle.
    pub fn new_atom(&mut self, name: &str) -> Value {
        if let Some(&value) = self.atoms.get(name) {
            return value;
        }
        let value = self.alloc(StoreData::Atom(name.to_owned()));
        self.atoms.insert(name.to_owned(), value);
        value
    }

    pub fn new_string(&mut self, text: impl Into<String>) -> Value {
        self.alloc(StoreData::Str(text.into()))
    }

    pub fn new_real(&mut self, value: f64) -> Value {
        self.alloc(StoreData::Real(value))
    }

    pub fn new_list(&mut self, head: Value, tail: Value) -> Value {
        self.alloc(StoreData::List { head, tail })
    }

    pub fn new_tuple(&mut self, label: Value, items: Vec<Value>) -> Value {
        self.alloc(StoreData::Tuple { label, items })
    }

    pub fn new_record(&mut self, label: Value, features: IndexMap<Value, Value>) -> Value {
        self.alloc(StoreData::Record { label, features })
    }

    pub fn new_open_record(&mut self, label: Value) -> Value {
        self.alloc(StoreData::OpenRecord {
            label,
            features: IndexMap::new(),
        })
    }

    pub fn new_array(&mut self, size: usize, init: Value) -> Value {
        self.alloc(StoreData::Array(vec![init; size]))
    }

    /// Allocates a fresh unbound variable.
    pub fn new_variable(&mut self) -> Value {
        self.alloc(StoreData::Variable)
    }

    pub fn new_closure(&mut self, closure: Closure) -> Value {
        self.alloc(StoreData::Closure(closure))
    }

    /// Post-build closure optimization hook.
    ///
    /// Runs after every closure is materialized. Currently the identity
    /// transform; later passes can rewrite the segment here as long as the
    /// result stays deterministic for a given input.
    #[must_use]
    pub fn optimize(&mut self, value: Value) -> Value {
        value
    }

    #[must_use]
    pub fn get(&self, value: Value) -> &StoreData {
        self.cells.get(value.index()).expect("value handle in arena range")
    }

    #[must_use]
    pub fn is_atom(&self, value: Value) -> bool {
        matches!(self.get(value), StoreData::Atom(_))
    }

    #[must_use]
    pub fn as_closure(&self, value: Value) -> Option<&Closure> {
        match self.get(value) {
            StoreData::Closure(closure) => Some(closure),
            _ => None,
        }
    }

    /// Reads an integer cell as `i64` when it fits.
    #[must_use]
    pub fn int_value(&self, value: Value) -> Option<i64> {
        match self.get(value) {
            StoreData::Integer(v) => v.to_i64(),
            _ => None,
        }
    }

    /// Renders a value for listings and diagnostics.
    #[must_use]
    pub fn render(&self, value: Value) -> String {
        self.render_depth(value, 8)
    }

    fn render_depth(&self, value: Value, depth: usize) -> String {
        if depth == 0 {
            return "…".to_owned();
        }
        match self.get(value) {
            StoreData::Integer(v) => v.to_string(),
            StoreData::Atom(name) => render_atom(name),
            StoreData::Str(text) => format!("{text:?}"),
            StoreData::Real(v) => ryu::Buffer::new().format(*v).to_owned(),
            StoreData::List { head, tail } => format!(
                "{}|{}",
                self.render_depth(*head, depth - 1),
                self.render_depth(*tail, depth - 1)
            ),
            StoreData::Tuple { label, items } => {
                let rendered: Vec<String> = items.iter().map(|item| self.render_depth(*item, depth - 1)).collect();
                format!("{}({})", self.render_depth(*label, depth - 1), rendered.join(" "))
            }
            StoreData::Record { label, features } | StoreData::OpenRecord { label, features } => {
                let mut rendered: Vec<String> = features
                    .iter()
                    .map(|(feature, item)| {
                        format!(
                            "{}:{}",
                            self.render_depth(*feature, depth - 1),
                            self.render_depth(*item, depth - 1)
                        )
                    })
                    .collect();
                if matches!(self.get(value), StoreData::OpenRecord { .. }) {
                    rendered.push("...".to_owned());
                }
                format!("{}({})", self.render_depth(*label, depth - 1), rendered.join(" "))
            }
            StoreData::Array(items) => format!("<array/{}>", items.len()),
            StoreData::Variable => format!("_{}", value.index()),
            StoreData::Closure(closure) => format!("<proc/{}>", closure.nparams),
        }
    }
}

/// Atoms render bare when they look like plain lowercase identifiers,
/// quoted otherwise.
fn render_atom(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if simple { name.to_owned() } else { format!("'{name}'") }
}
