//! Integration tests against the concrete scenarios a reference CAL
//! assembler's behavior is checked by: symbol visibility across an EQU
//! definition, object-block sizing across sections, literal pool
//! deduplication, the external-external relocation error, string-literal
//! byte packing with word-boundary padding, and implicit external
//! installation under `-x`.

use calasm::ast::Node;
use calasm::emit;
use calasm::error::{Diagnostics, ErrorKind};
use calasm::expr::{self, Context};
use calasm::lexer::{LexerConfig, SourceFormat};
use calasm::symtab::{self, ModuleTable, SectionLocation, SectionType, ROOT_QUALIFIER};
use calasm::textpath::TextPath;
use calasm::value::Value;
use calasm::AssemblerState;

fn fresh_state() -> AssemblerState {
    AssemblerState::new(LexerConfig { format: SourceFormat::New, ..LexerConfig::default() }, TextPath::new())
}

#[test]
fn equ_defined_symbol_is_visible_to_a_later_expression() {
    let mut modules = ModuleTable::new();
    let mut diagnostics = Diagnostics::new();
    let module = modules.current_id();
    {
        let mut ctx = Context {
            module,
            qualifier: ROOT_QUALIFIER,
            diagnostics: &mut diagnostics,
            location_counter: Value::absolute(0),
            line: 1,
            modules: &mut modules,
            implicit_externals: false,
        };
        let value = expr::evaluate(&Node::Int(5), &mut ctx).unwrap();
        let module_mut = ctx.modules.get_mut(ctx.module);
        module_mut.intern_symbol(ROOT_QUALIFIER, "X", value);
    }

    let mut ctx = Context {
        module,
        qualifier: ROOT_QUALIFIER,
        diagnostics: &mut diagnostics,
        location_counter: Value::absolute(0),
        line: 2,
        modules: &mut modules,
        implicit_externals: false,
    };
    let name = Node::Name { name: "X".to_string(), qual: None };
    let v = expr::evaluate(&name, &mut ctx).unwrap();
    assert_eq!(v.i64_value(), 5);
    assert!(!diagnostics.seen(ErrorKind::Undefined));
}

#[test]
fn code_then_data_section_produce_one_block_rounded_to_four_parcels() {
    let mut module = symtab::Module::new("TEST");
    let code = module.add_section("", SectionType::Code, SectionLocation::Cm);
    let data = module.add_section("", SectionType::Code, SectionLocation::Cm);

    emit::reserve_bits(module.section_mut(code), 10 * 64); // 10 words
    emit::reserve_bits(module.section_mut(data), 3 * 64); // 3 words

    symtab::create_object_blocks(&mut module);

    let block_id = module.section(code).block.unwrap();
    assert_eq!(block_id, module.section(data).block.unwrap());
    let block = &module.object_blocks[block_id.0 as usize];
    // 10 words = 40 parcels (already a multiple of 4) + 3 words = 12 parcels -> 52 parcels = 13 words.
    assert_eq!(block.offset, 52);
    assert_eq!(block.offset / 4, 13);
}

#[test]
fn two_structurally_equal_literals_share_one_entry() {
    let mut modules = ModuleTable::new();
    let mut diagnostics = Diagnostics::new();
    let module = modules.current_id();
    let mut ctx = Context {
        module,
        qualifier: ROOT_QUALIFIER,
        diagnostics: &mut diagnostics,
        location_counter: Value::absolute(0),
        line: 1,
        modules: &mut modules,
        implicit_externals: false,
    };
    let literal = Node::Literal(Box::new(Node::Int(1)));
    expr::evaluate(&literal, &mut ctx).unwrap();
    expr::evaluate(&literal, &mut ctx).unwrap();

    let module = ctx.modules.get(ctx.module);
    assert_eq!(module.literals.len(), 1);
    // one 64-bit word per literal entry = 8 bytes.
    assert_eq!(module.literals.len() * 8, 8);
}

#[test]
fn external_minus_external_is_relocatable_field_error() {
    let mut state = fresh_state();
    state.implicit_externals = true;
    state.evaluate_operand("A", 1).unwrap();
    let err = state.evaluate_operand("A-B", 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RelocatableField);
}

#[test]
fn string_literal_packs_bytes_and_pads_to_word_boundary() {
    let mut section = symtab::Section::new("", SectionType::Mixed, SectionLocation::None);
    let mut block = symtab::ObjectBlock::new("", 0, symtab::SectionTypeKey::Mixed, symtab::SectionLocationKey::None);

    emit::emit_bytes(&mut section, &mut block, &[0x41, 0x42, 0x00]);
    emit::align_to_word(&mut section, &mut block);

    assert_eq!(block.image()[0], 0x41);
    assert_eq!(block.image()[1], 0x42);
    assert_eq!(block.image()[2], 0x00);
    assert_eq!(section.origin_counter % 4, 0);
    assert_eq!(section.size, 4); // padded up to one full word (4 parcels)
}

#[test]
fn implicit_external_reference_is_installed_with_sequential_index() {
    let mut state = fresh_state();
    state.implicit_externals = true;
    let a = state.evaluate_operand("A", 1).unwrap();
    let b = state.evaluate_operand("B", 2).unwrap();
    assert!(a.is_external());
    assert!(b.is_external());
    assert_eq!(a.external, Some(0));
    assert_eq!(b.external, Some(1));

    let module = state.modules.get(state.modules.current_id());
    assert_eq!(module.external_count(), 2);
}
