//! `Module`: the top-level compilation unit — sections, object blocks,
//! literals, qualifiers, entry/external chains, and the macro/micro/
//! duplicated name tables.

use super::object_block::ObjectBlock;
use super::qualifier::{Qualifier, QualifierId};
use super::section::{Section, SectionType, SectionLocation};
use super::symbol::{Symbol, SymbolId};
use super::tree::Tree;
use super::LiteralPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ModuleId(pub u32);

/// One field's worth of data recorded during pass 1, before
/// `create_object_blocks` has assigned the owning section a home in a
/// block. `local_bit_start` was captured via `emit::reserve_bits`
/// against section-local coordinates; `emit_pending_data` replays these
/// against the section's `origin_offset` once it's known.
pub struct PendingEmit {
    pub section: super::SectionId,
    pub local_bit_start: u64,
    pub value: u64,
    pub width: u32,
}

/// A macro or duplicated body. Storage only — expansion is an
/// out-of-scope collaborator; the assembler core only needs to know a
/// name is bound to *something* so the lexer can recognize an active
/// macro invocation.
pub struct NamedText {
    pub name: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamedTextId(pub u32);

#[derive(Default)]
pub struct NamedTextTable {
    entries: Vec<NamedText>,
    index: Tree<NamedTextId>,
}

impl NamedTextTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or redefine `name`. Returns `true` if `name` already
    /// existed (the caller registers `WarnRedefinedMacro` on `true`).
    pub fn define(&mut self, name: &str, body: impl Into<String>) -> bool {
        if let Some(&id) = self.index.get(name) {
            self.entries[id.0 as usize].body = body.into();
            true
        } else {
            let id = NamedTextId(self.entries.len() as u32);
            self.entries.push(NamedText {
                name: name.to_string(),
                body: body.into(),
            });
            self.index.insert_with(name, || id);
            false
        }
    }

    pub fn get(&self, name: &str) -> Option<&NamedText> {
        self.index.get(name).map(|&id| &self.entries[id.0 as usize])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains(name)
    }
}

pub struct Module {
    pub name: String,
    pub comment: String,
    pub absolute: bool,
    pub stack_size: u32,

    pub sections: Vec<Section>,
    pub object_blocks: Vec<ObjectBlock>,
    pub literals: LiteralPool,
    pub pending_emits: Vec<PendingEmit>,

    pub symbols: Vec<Symbol>,
    pub qualifiers: Vec<Qualifier>,
    qualifier_index: Tree<QualifierId>,

    pub macros: NamedTextTable,
    pub micros: NamedTextTable,
    pub duplicateds: NamedTextTable,

    entry_head: Option<SymbolId>,
    entry_tail: Option<SymbolId>,
    external_head: Option<SymbolId>,
    external_tail: Option<SymbolId>,
    external_count: u32,
}

/// Index of the unnamed mixed section every module is seeded with.
pub const UNNAMED_SECTION: super::SectionId = super::SectionId(0);
/// Index of the literals section (`"="`) every module is seeded with.
pub const LITERALS_SECTION: super::SectionId = super::SectionId(1);
/// Index of the unnamed root qualifier (`""`) every module is seeded
/// with.
pub const ROOT_QUALIFIER: QualifierId = QualifierId(0);

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        let mut qualifiers = Vec::new();
        qualifiers.push(Qualifier::new(""));
        let mut qualifier_index = Tree::new();
        qualifier_index.insert_with("", || ROOT_QUALIFIER);

        Module {
            name: name.into(),
            comment: String::new(),
            absolute: false,
            stack_size: 0,
            sections: vec![Section::seed_unnamed(), Section::seed_literals()],
            object_blocks: Vec::new(),
            literals: LiteralPool::new(),
            pending_emits: Vec::new(),
            symbols: Vec::new(),
            qualifiers,
            qualifier_index,
            macros: NamedTextTable::new(),
            micros: NamedTextTable::new(),
            duplicateds: NamedTextTable::new(),
            entry_head: None,
            entry_tail: None,
            external_head: None,
            external_tail: None,
            external_count: 0,
        }
    }

    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }

    /// Find or create the qualifier named `name`.
    pub fn qualifier_id(&mut self, name: &str) -> QualifierId {
        if let Some(&id) = self.qualifier_index.get(name) {
            return id;
        }
        let id = QualifierId(self.qualifiers.len() as u32);
        self.qualifiers.push(Qualifier::new(name));
        self.qualifier_index.insert_with(name, || id);
        id
    }

    pub fn lookup_qualifier(&self, name: &str) -> Option<QualifierId> {
        self.qualifier_index.get(name).copied()
    }

    pub fn qualifier(&self, id: QualifierId) -> &Qualifier {
        &self.qualifiers[id.0 as usize]
    }

    pub fn qualifier_mut(&mut self, id: QualifierId) -> &mut Qualifier {
        &mut self.qualifiers[id.0 as usize]
    }

    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.0 as usize]
    }

    pub fn symbol_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id.0 as usize]
    }

    /// Look up `name` in qualifier `qual`, without any fallback.
    pub fn lookup_in_qualifier(&self, qual: QualifierId, name: &str) -> Option<SymbolId> {
        self.qualifiers[qual.0 as usize].symbols.get(name).copied()
    }

    /// Create (or return the pre-existing) symbol named `name` in
    /// qualifier `qual`.
    pub fn intern_symbol(&mut self, qual: QualifierId, name: &str, value: crate::value::Value) -> (SymbolId, bool) {
        if let Some(&id) = self.qualifiers[qual.0 as usize].symbols.get(name) {
            return (id, false);
        }
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol::new(name, qual, value));
        self.qualifiers[qual.0 as usize].symbols.insert_with(name, || id);
        (id, true)
    }

    /// Append `id` to the entry-point chain, silently ignoring a
    /// duplicate add.
    pub fn add_entry_point(&mut self, id: SymbolId) {
        if self.symbol(id).value.attrs.contains(crate::value::Attr::ENTRY) {
            return;
        }
        self.symbol_mut(id).value.attrs |= crate::value::Attr::ENTRY;
        match self.entry_tail {
            Some(tail) => self.symbol_mut(tail).next_entry = Some(id),
            None => self.entry_head = Some(id),
        }
        self.entry_tail = Some(id);
    }

    pub fn entry_points(&self) -> impl Iterator<Item = SymbolId> + '_ {
        std::iter::successors(self.entry_head, move |&id| self.symbol(id).next_entry)
    }

    /// Append `id` to the external chain, assigning it the next free
    /// 0-based index; a repeat add is silently ignored.
    pub fn add_external(&mut self, id: SymbolId) -> u32 {
        if let Some(idx) = self.symbol(id).external_index {
            return idx;
        }
        let idx = self.external_count;
        self.external_count += 1;
        self.symbol_mut(id).external_index = Some(idx);
        self.symbol_mut(id).value.attrs |= crate::value::Attr::EXTERNAL;
        match self.external_tail {
            Some(tail) => self.symbol_mut(tail).next_external = Some(id),
            None => self.external_head = Some(id),
        }
        self.external_tail = Some(id);
        idx
    }

    pub fn externals(&self) -> impl Iterator<Item = SymbolId> + '_ {
        std::iter::successors(self.external_head, move |&id| self.symbol(id).next_external)
    }

    pub fn external_count(&self) -> u32 {
        self.external_count
    }

    /// Create a new user section (not one of the two seeded ones) with
    /// the given id/type/location, returning its index.
    pub fn add_section(&mut self, id: impl Into<String>, kind: SectionType, location: SectionLocation) -> super::SectionId {
        let idx = super::SectionId(self.sections.len() as u32);
        self.sections.push(Section::new(id, kind, location));
        idx
    }

    pub fn section(&self, id: super::SectionId) -> &Section {
        &self.sections[id.0 as usize]
    }

    pub fn section_mut(&mut self, id: super::SectionId) -> &mut Section {
        &mut self.sections[id.0 as usize]
    }
}
