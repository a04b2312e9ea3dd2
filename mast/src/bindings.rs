use crate::mst::Symbol;
use std::collections::HashMap;

/// Values supplied for free variables at invocation time
#[derive(Debug, Clone, PartialEq)]
pub struct Bindings<T> {
    values: HashMap<Symbol, T>,
}

impl<T> Default for Bindings<T> {
    fn default() -> Self {
        Self {
            values: HashMap::new(),
        }
    }
}

impl<T> Bindings<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, symbol: impl Into<Symbol>, value: T) -> Self {
        self.values.insert(symbol.into(), value);
        self
    }

    pub fn insert(&mut self, symbol: impl Into<Symbol>, value: T) -> Option<T> {
        self.values.insert(symbol.into(), value)
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &T)> {
        self.values.iter()
    }
}

impl<T, S: Into<Symbol>> FromIterator<(S, T)> for Bindings<T> {
    fn from_iter<I: IntoIterator<Item = (S, T)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(symbol, value)| (symbol.into(), value))
                .collect(),
        }
    }
}

impl<T, S: Into<Symbol>, const N: usize> From<[(S, T); N]> for Bindings<T> {
    fn from(pairs: [(S, T); N]) -> Self {
        pairs.into_iter().collect()
    }
}
