use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
}

/// A name bound to a storage slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// Maps variable names to global slots.
///
/// Indices are handed out in definition order starting at 0 and are never
/// reused, so a table carried across REPL inputs keeps every slot stable.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    store: HashMap<String, Symbol>,
    num_definitions: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to the next free slot. Rebinding a name gives it a fresh
    /// slot; the old one is simply no longer reachable.
    pub fn define(&mut self, name: &str) -> Symbol {
        let symbol = Symbol {
            name: name.to_string(),
            scope: SymbolScope::Global,
            index: self.num_definitions,
        };
        self.store.insert(name.to_string(), symbol.clone());
        self.num_definitions += 1;
        symbol
    }

    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.store.get(name)
    }

    /// Number of definitions made so far (equals the next slot index).
    pub fn len(&self) -> usize {
        self.num_definitions
    }

    pub fn is_empty(&self) -> bool {
        self.num_definitions == 0
    }
}
