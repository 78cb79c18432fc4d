//! `Qualifier`: a named scope inside a module, owning a tree of symbols
//! keyed case-insensitively. Every module has an unnamed root qualifier
//! `""`; lookup falls back from the current qualifier to `""` and then
//! to the default module's `""`.

use super::tree::Tree;
use super::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QualifierId(pub u32);

pub struct Qualifier {
    pub name: String,
    pub symbols: Tree<SymbolId>,
}

impl Qualifier {
    pub fn new(name: impl Into<String>) -> Self {
        Qualifier {
            name: name.into(),
            symbols: Tree::new(),
        }
    }
}
