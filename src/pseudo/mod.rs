//! Pseudo-instruction dispatch: a registry mapping a result field
//! mnemonic to a handler that consumes the parsed operand tree and
//! mutates pass state. A representative subset is implemented; the rest
//! of the mnemonic space is stubbed to keep the dispatcher total rather
//! than have an unrecognized pseudo panic mid-assembly.

use crate::ast::Node;
use crate::emit;
use crate::error::{Error, ErrorKind};
use crate::expr::{evaluate, Context};
use crate::symtab::SectionId;
use crate::value::{Attr, Value};

/// What a pseudo-instruction did, reported back to the pass driver so it
/// can update listing output and the running location counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Nothing was emitted; only symbol-table/pass state changed.
    None,
    /// `width` bits were appended to the current section.
    Emitted { bits: u32 },
    /// Switched the module-start/module-end context.
    ModuleBoundary,
}

pub struct PseudoArgs<'a, 'b> {
    pub location: &'a str,
    pub operand: &'a Node,
    pub ctx: &'a mut Context<'b>,
    pub current_section: SectionId,
}

pub type Handler = for<'a, 'b> fn(&mut PseudoArgs<'a, 'b>) -> Result<Placement, Error>;

/// Look up the handler for `mnemonic`, case-insensitively. Returns the
/// generic stub for anything not in the representative subset below,
/// rather than `None` — an unimplemented mnemonic still occupies a
/// result-field slot, it isn't a syntax error.
pub fn lookup(mnemonic: &str) -> Handler {
    match mnemonic.to_ascii_uppercase().as_str() {
        "EQU" => equ,
        "IDENT" | "START" => module_start,
        "END" | "ENDM" => module_end,
        "BSS" | "RES" => reserve,
        "BYTE" | "BDATA" => byte_data,
        "WORD" | "CONST" | "DATA" => word_data,
        _ => unimplemented_stub,
    }
}

/// `label EQU expr`: define `label` to the operand's value without
/// advancing the location counter.
fn equ(args: &mut PseudoArgs) -> Result<Placement, Error> {
    let value = evaluate(args.operand, args.ctx)?;
    define_location_symbol(args, value)?;
    Ok(Placement::None)
}

/// `name IDENT` / `name START`: begin (or resynchronize to) a named
/// module.
fn module_start(args: &mut PseudoArgs) -> Result<Placement, Error> {
    let name = args.location.to_string();
    args.ctx.modules.start_module(&name);
    Ok(Placement::ModuleBoundary)
}

fn module_end(args: &mut PseudoArgs) -> Result<Placement, Error> {
    args.ctx.modules.end_module();
    Ok(Placement::ModuleBoundary)
}

/// `label BSS n`: reserve `n` words without emitting bytes, defining
/// `label` at the current location first.
fn reserve(args: &mut PseudoArgs) -> Result<Placement, Error> {
    let count = evaluate(args.operand, args.ctx)?;
    let words = count.i64_value().max(0) as u32;
    define_location_symbol(args, args.ctx.location_counter)?;
    let bits = words * 64;
    reserve_section_bits(args, bits);
    advance_location_counter(args, bits);
    Ok(Placement::Emitted { bits })
}

fn byte_data(args: &mut PseudoArgs) -> Result<Placement, Error> {
    define_location_symbol(args, args.ctx.location_counter)?;
    let value = evaluate(args.operand, args.ctx)?;
    emit_section_field(args, value.i64_value() as u64 & 0xFF, 8);
    advance_location_counter(args, 8);
    Ok(Placement::Emitted { bits: 8 })
}

fn word_data(args: &mut PseudoArgs) -> Result<Placement, Error> {
    define_location_symbol(args, args.ctx.location_counter)?;
    let value = evaluate(args.operand, args.ctx)?;
    emit_section_field(args, value.i64_value() as u64, 64);
    advance_location_counter(args, 64);
    Ok(Placement::Emitted { bits: 64 })
}

/// Advance the current section's real emit cursor (size, parcel/bit
/// position) by `width` bits without recording any data to write — used
/// by `reserve`, whose block image stays zero-filled.
fn reserve_section_bits(args: &mut PseudoArgs, width: u32) {
    let module = args.ctx.modules.get_mut(args.ctx.module);
    let section = module.section_mut(args.current_section);
    emit::reserve_bits(section, width);
}

/// Advance the current section's emit cursor by `width` bits. In pass 1
/// no object block exists yet, so this only grows the section's size;
/// in pass 2 the section already has a `block`/`origin_offset` from
/// `create_object_blocks`, so the value is written straight into the
/// block's image at the now-known absolute position.
fn emit_section_field(args: &mut PseudoArgs, value: u64, width: u32) {
    let module = args.ctx.modules.get_mut(args.ctx.module);
    let local_bit_start = emit::reserve_bits(module.section_mut(args.current_section), width);
    if args.ctx.pass != 2 {
        return;
    }
    let section = module.section(args.current_section);
    let origin_offset = section.origin_offset;
    let Some(block_id) = section.block else { return };
    let block = &mut module.object_blocks[block_id.0 as usize];
    emit::emit_field_at(block, origin_offset, local_bit_start, value, width);
}

/// Any mnemonic not in the representative subset: the operand is still
/// evaluated (so expression-level errors surface), a location symbol is
/// still defined, but nothing is emitted. The result-field slot it
/// occupies is real (`Placement::None` rather than an error), matching
/// the dispatcher's "always something to call" contract above.
fn unimplemented_stub(args: &mut PseudoArgs) -> Result<Placement, Error> {
    if !matches!(args.operand, Node::None) {
        let _ = evaluate(args.operand, args.ctx);
    }
    Ok(Placement::None)
}

/// `addLocationSymbol`: define `args.location` at `value`, with the
/// double-definition rule depending on the active pass. Pass 1: a
/// pre-existing undefined symbol is filled in; a pre-existing defined
/// one is a double definition. Pass 2: the symbol is expected to
/// already exist from pass 1 (still undefined if pass 1 could only
/// tolerate a forward reference, in which case this fills it in now
/// that it's resolvable); the re-visit marks it `DEFINED_IN_PASS_2`, and
/// a *second* pass-2 definition of the same symbol is the
/// double-definition case.
fn define_location_symbol(args: &mut PseudoArgs, value: Value) -> Result<(), Error> {
    if args.location.is_empty() {
        return Ok(());
    }
    let module_id = args.ctx.module;
    let qualifier = args.ctx.qualifier;
    let pass = args.ctx.pass;
    let line = args.ctx.line;
    let module = args.ctx.modules.get_mut(module_id);
    let (id, created) = module.intern_symbol(qualifier, args.location, value);

    if pass == 1 {
        if !created {
            if module.symbol(id).value.is_undefined() {
                module.symbol_mut(id).value = value;
            } else {
                return Err(Error::new(ErrorKind::DoubleDefinition, line));
            }
        }
        return Ok(());
    }

    if created || module.symbol(id).value.is_undefined() {
        module.symbol_mut(id).value = value;
    }
    if module.symbol(id).value.attrs.contains(Attr::DEFINED_IN_PASS_2) {
        return Err(Error::new(ErrorKind::DoubleDefinition, line));
    }
    module.symbol_mut(id).value.attrs |= Attr::DEFINED_IN_PASS_2;
    Ok(())
}

fn advance_location_counter(args: &mut PseudoArgs, bits: u32) {
    let n = args.ctx.location_counter.i64_value() + bits as i64 / 64;
    args.ctx.location_counter = Value {
        attrs: Attr::WORD_ADDRESS | Attr::RELOCATABLE,
        section: Some(args.current_section),
        coefficient: 1,
        ..Value::absolute(n)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Diagnostics;
    use crate::symtab::{ModuleTable, ROOT_QUALIFIER, UNNAMED_SECTION};

    #[test]
    fn equ_defines_symbol_without_advancing_counter() {
        let mut modules = ModuleTable::new();
        let mut diagnostics = Diagnostics::new();
        let module = modules.current_id();
        let mut ctx = Context {
            module,
            qualifier: ROOT_QUALIFIER,
            diagnostics: &mut diagnostics,
            location_counter: Value::absolute(5),
            line: 1,
            modules: &mut modules,
            implicit_externals: false,
            pass: 1,
        };
        let operand = Node::Int(42);
        let mut args = PseudoArgs {
            location: "FOO",
            operand: &operand,
            ctx: &mut ctx,
            current_section: UNNAMED_SECTION,
        };
        let placement = equ(&mut args).unwrap();
        assert_eq!(placement, Placement::None);
        drop(args);
        let module = modules.current(); // reborrow after Context dropped
        let id = module.lookup_in_qualifier(ROOT_QUALIFIER, "FOO").unwrap();
        assert_eq!(module.symbol(id).value.i64_value(), 42);
    }

    #[test]
    fn pass_2_redefinition_sets_defined_in_pass_2_then_errors_on_repeat() {
        let mut modules = ModuleTable::new();
        let mut diagnostics = Diagnostics::new();
        let module_id = modules.current_id();
        let operand = Node::Int(5);

        let mut ctx = Context {
            module: module_id,
            qualifier: ROOT_QUALIFIER,
            diagnostics: &mut diagnostics,
            location_counter: Value::absolute(5),
            line: 1,
            modules: &mut modules,
            implicit_externals: false,
            pass: 1,
        };
        let mut args = PseudoArgs {
            location: "X",
            operand: &operand,
            ctx: &mut ctx,
            current_section: UNNAMED_SECTION,
        };
        equ(&mut args).unwrap();
        args.ctx.pass = 2;
        equ(&mut args).unwrap();
        drop(args);

        {
            let module = modules.current();
            let id = module.lookup_in_qualifier(ROOT_QUALIFIER, "X").unwrap();
            let value = module.symbol(id).value;
            assert_eq!(value.i64_value(), 5);
            assert!(value.attrs.contains(Attr::DEFINED_IN_PASS_2));
        }

        let mut ctx2 = Context {
            module: module_id,
            qualifier: ROOT_QUALIFIER,
            diagnostics: &mut diagnostics,
            location_counter: Value::absolute(5),
            line: 2,
            modules: &mut modules,
            implicit_externals: false,
            pass: 2,
        };
        let mut args2 = PseudoArgs {
            location: "X",
            operand: &operand,
            ctx: &mut ctx2,
            current_section: UNNAMED_SECTION,
        };
        let err = equ(&mut args2).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DoubleDefinition);
    }
}
