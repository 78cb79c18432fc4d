//! Module/section/symbol manager: the data model types plus
//! `create_object_blocks`/`adjust_symbol_values`, the two operations
//! that run between pass 1 and pass 2.

mod literal;
mod module;
mod object_block;
mod qualifier;
mod section;
mod symbol;
pub mod tree;

pub use literal::{Literal, LiteralId, LiteralPool};
pub use module::{Module, ModuleId, NamedText, NamedTextTable, PendingEmit, LITERALS_SECTION, ROOT_QUALIFIER, UNNAMED_SECTION};
pub use object_block::{ExternalEntry, ObjectBlock, ObjectBlockId, RelocationEntry};
pub use qualifier::{Qualifier, QualifierId};
pub use section::{BlockKey, Section, SectionId, SectionLocation, SectionLocationKey, SectionType, SectionTypeKey};
pub use symbol::{Symbol, SymbolId};

use crate::util::ceil_to;
use crate::value::Attr;
use std::collections::HashMap;

/// The insertion-ordered list of modules created while processing one
/// source file, plus the always-present unnamed `defaultModule`.
pub struct ModuleTable {
    modules: Vec<Module>,
    default_module: ModuleId,
    current: ModuleId,
}

impl ModuleTable {
    pub fn new() -> Self {
        let default_module = Module::new("");
        ModuleTable {
            modules: vec![default_module],
            default_module: ModuleId(0),
            current: ModuleId(0),
        }
    }

    pub fn default_module_id(&self) -> ModuleId {
        self.default_module
    }

    pub fn current_id(&self) -> ModuleId {
        self.current
    }

    pub fn set_current(&mut self, id: ModuleId) {
        self.current = id;
    }

    pub fn current(&self) -> &Module {
        &self.modules[self.current.0 as usize]
    }

    pub fn current_mut(&mut self) -> &mut Module {
        &mut self.modules[self.current.0 as usize]
    }

    pub fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.0 as usize]
    }

    pub fn default_module(&self) -> &Module {
        &self.modules[self.default_module.0 as usize]
    }

    /// Start a new named module (a module-start pseudo-instruction),
    /// returning its id and making it current. Re-using an existing name
    /// resynchronizes onto it instead of creating a duplicate.
    pub fn start_module(&mut self, name: &str) -> ModuleId {
        if let Some(pos) = self.modules.iter().position(|m| m.name == name) {
            let id = ModuleId(pos as u32);
            self.current = id;
            return id;
        }
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module::new(name));
        self.current = id;
        id
    }

    /// End the current module, returning to the default module.
    pub fn end_module(&mut self) {
        self.current = self.default_module;
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, m)| (ModuleId(i as u32), m))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Module> {
        self.modules.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }
}

impl Default for ModuleTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Group a module's non-empty sections by `(id, type, location)` and
/// assign each group an `ObjectBlock`, in encounter order starting at 0.
/// The two seeded sections are skipped when empty.
/// Afterward every section's `origin_offset` is the block's running
/// offset at the time it was assigned, and the block's offset has
/// advanced by `ceil(section.size, 4)` parcels.
pub fn create_object_blocks(module: &mut Module) {
    let mut block_of: HashMap<BlockKey, ObjectBlockId> = HashMap::new();

    for idx in 0..module.sections.len() {
        let section_id = SectionId(idx as u32);
        let skip_if_empty = section_id == UNNAMED_SECTION || section_id == LITERALS_SECTION;
        if skip_if_empty && module.section(section_id).is_empty() {
            continue;
        }
        let key = BlockKey::for_section(module.section(section_id));
        let block_id = *block_of.entry(key).or_insert_with(|| {
            let block_id = ObjectBlockId(module.object_blocks.len() as u32);
            let section = module.section(section_id);
            module.object_blocks.push(ObjectBlock::new(
                section.id.clone(),
                block_id.0,
                section.kind.into(),
                section.location.into(),
            ));
            block_id
        });

        let block = &mut module.object_blocks[block_id.0 as usize];
        let section = &mut module.sections[idx];
        section.block = Some(block_id);
        section.origin_offset = block.offset;
        block.offset += ceil_to(section.size, 4);
    }
}

/// Give every registered literal a fixed slot in the literals section,
/// in pool-index order, growing the section the same way
/// `byte_data`/`word_data` do. Must run before `create_object_blocks` so
/// the section's final size already accounts for the pool.
pub fn assign_literal_offsets(module: &mut Module) {
    let count = module.literals.len();
    for i in 0..count {
        let section = module.section_mut(LITERALS_SECTION);
        let local_bit_start = crate::emit::reserve_bits(section, 64);
        module.literals.get_mut(LiteralId(i as u32)).offset = Some(local_bit_start as u32);
    }
}

/// Evaluate every literal registered in `module_id` and queue its word
/// value onto that module's `pending_emits`, to be written out by
/// `emit_pending_data`. Takes the whole table (rather than a single
/// `Module`) for the same reason any other operand evaluation does: a
/// literal's expression can reference a qualified name in another
/// module. Must run after `adjust_symbol_values` so that any label a
/// literal's expression references already carries its final,
/// block-relative address.
pub fn emit_literals(modules: &mut ModuleTable, module_id: ModuleId) {
    let mut diagnostics = crate::error::Diagnostics::new();
    let count = modules.get(module_id).literals.len();
    for i in 0..count {
        let literal = modules.get(module_id).literals.get(LiteralId(i as u32));
        let Some(local_bit_start) = literal.offset else { continue };
        let expr = literal.expr.clone();
        let mut ctx = crate::expr::Context {
            modules,
            module: module_id,
            qualifier: ROOT_QUALIFIER,
            diagnostics: &mut diagnostics,
            location_counter: crate::value::Value::absolute(0),
            line: 0,
            implicit_externals: false,
            pass: 2,
        };
        let word = match crate::expr::evaluate(&expr, &mut ctx) {
            Ok(v) => match v.number {
                crate::value::Number::Int(n) => n as u64,
                crate::value::Number::Float(f) => crate::emit::float::to_cray_float(f),
            },
            Err(_) => 0,
        };
        modules.get_mut(module_id).pending_emits.push(PendingEmit {
            section: LITERALS_SECTION,
            local_bit_start,
            value: word,
            width: 64,
        });
    }
}

/// Replay the field values pass 1 recorded in `module.pending_emits`
/// into their owning blocks' byte images, now that `create_object_blocks`
/// has given every section an `origin_offset`. Must run after
/// `create_object_blocks` and before the module is serialized.
pub fn emit_pending_data(module: &mut Module) {
    for pending in std::mem::take(&mut module.pending_emits) {
        let section = &module.sections[pending.section.0 as usize];
        let origin_offset = section.origin_offset;
        let Some(block_id) = section.block else { continue };
        let block = &mut module.object_blocks[block_id.0 as usize];
        crate::emit::emit_field_at(block, origin_offset, pending.local_bit_start, pending.value, pending.width);
    }
}

/// Scale `value` (a word/parcel/byte-addressed quantity) by the address
/// unit so it can be added to a section's `origin_offset`, which is
/// always expressed in parcels. Word addresses are parcels/4; parcel
/// addresses are unscaled; byte addresses are parcels*2 (2 bytes per
/// parcel).
fn scale_origin_for_unit(origin_offset_parcels: u32, attrs: Attr) -> i64 {
    if attrs.contains(Attr::WORD_ADDRESS) {
        (origin_offset_parcels / 4) as i64
    } else if attrs.contains(Attr::BYTE_ADDRESS) {
        (origin_offset_parcels * 2) as i64
    } else {
        origin_offset_parcels as i64
    }
}

/// Reset every section's emit cursor to the start, leaving `size` and
/// `origin_offset` untouched. Run between pass 1 and pass 2 so pass 2's
/// walk over the same source lines reproduces pass 1's bit positions
/// exactly, now inside blocks that already have a home.
pub fn reset_pass_cursors(module: &mut Module) {
    for section in &mut module.sections {
        section.origin_counter = 0;
        section.location_counter = 0;
        section.word_bit_pos = 0;
        section.parcel_bit_pos = 0;
    }
}

/// Walk every symbol and add its owning section's `origin_offset`
/// (scaled to the symbol's address unit) to its numeric value. Must
/// run after `create_object_blocks`.
pub fn adjust_symbol_values(module: &mut Module) {
    for symbol in &mut module.symbols {
        let value = &mut symbol.value;
        if let Some(section_id) = value.section {
            let origin = module.sections[section_id.0 as usize].origin_offset;
            let delta = scale_origin_for_unit(origin, value.attrs);
            match &mut value.number {
                crate::value::Number::Int(n) => *n += delta,
                crate::value::Number::Float(_) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn object_block_offset_sums_ceiled_section_sizes() {
        let mut module = Module::new("TEST");
        let code = module.add_section("CODE", SectionType::Code, SectionLocation::Cm);
        let data = module.add_section("CODE", SectionType::Code, SectionLocation::Cm);
        module.section_mut(code).size = 10 * 4; // 10 words = 40 parcels
        module.section_mut(data).size = 3 * 4; // 3 words = 12 parcels

        create_object_blocks(&mut module);

        let block_id = module.section(code).block.unwrap();
        assert_eq!(block_id, module.section(data).block.unwrap());
        let block = &module.object_blocks[block_id.0 as usize];
        // 40 parcels already a multiple of 4, then +12 -> 52 parcels = 13 words.
        assert_eq!(block.offset, 52);
    }

    #[test]
    fn adjust_symbol_values_scales_by_address_unit() {
        let mut module = Module::new("TEST");
        let sect = module.add_section("CODE", SectionType::Code, SectionLocation::Cm);
        module.section_mut(sect).size = 8; // 8 parcels
        create_object_blocks(&mut module);
        module.section_mut(sect).origin_offset = 8; // pretend a prior block occupied 8 parcels

        let mut value = Value::absolute(3);
        value.attrs |= Attr::WORD_ADDRESS | Attr::RELOCATABLE;
        value.section = Some(sect);
        value.coefficient = 1;
        let (id, _) = module.intern_symbol(ROOT_QUALIFIER, "X", value);

        adjust_symbol_values(&mut module);
        // origin_offset 8 parcels = 2 words, + base value 3 = 5.
        assert_eq!(module.symbol(id).value.i64_value(), 5);
    }

    #[test]
    fn emit_pending_data_writes_through_at_assigned_offset() {
        let mut module = Module::new("TEST");
        // A prior section fills 1 word (4 parcels) ahead of the one the
        // pending field targets, so the pending field must land past it.
        let filler = module.add_section("CODE", SectionType::Code, SectionLocation::Cm);
        module.section_mut(filler).size = 4;
        let sect = module.add_section("CODE", SectionType::Code, SectionLocation::Cm);
        module.pending_emits.push(PendingEmit {
            section: sect,
            local_bit_start: 0,
            value: 0o177777,
            width: 16,
        });

        create_object_blocks(&mut module);
        emit_pending_data(&mut module);

        let block_id = module.section(sect).block.unwrap();
        let block = &module.object_blocks[block_id.0 as usize];
        // filler occupies parcel 0 (byte offset 0), sect's field lands in
        // parcel 4, i.e. byte offset 8.
        assert_eq!(block.image()[8], 0xFF);
        assert_eq!(block.image()[9], 0xFF);
    }
}
