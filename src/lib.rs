//! A two-pass assembler for Cray Assembly Language (CAL), targeting the
//! Cray X-MP and emitting COS relocatable object records.
//!
//! Source is read and classified by [`lexer`], parsed and evaluated by
//! [`expr`] against the module/symbol model in [`symtab`], dispatched by
//! result-field mnemonic in [`pseudo`], packed into object-block images
//! by [`emit`], and finally serialized by [`object`] through the COS
//! dataset framing in [`object::cos`].

pub mod ast;
pub mod emit;
pub mod error;
pub mod expr;
pub mod lexer;
pub mod listing;
pub mod object;
pub mod pod;
pub mod pseudo;
pub mod symtab;
pub mod textpath;
pub mod token;
pub mod util;
pub mod value;

use std::io;

use error::Diagnostics;
use lexer::local_label::LocalLabels;
use lexer::micro::RunClock;
use lexer::{Fields, LexerConfig};
use symtab::{ModuleTable, SectionId};
use textpath::TextPath;
use value::Value;

/// Everything a pass threads through while processing one source file:
/// the module table being built, the current qualifier/section/location
/// counter, the diagnostics accumulator, and the stateful lexer helpers
/// (local labels, the micro clock). Mirrors the implicit globals a
/// hand-written two-pass assembler keeps in one place instead of
/// re-deriving per line.
pub struct AssemblerState {
    pub modules: ModuleTable,
    pub qualifier: symtab::QualifierId,
    pub section: SectionId,
    pub location_counter: Value,
    pub diagnostics: Diagnostics,
    pub locals: LocalLabels,
    pub clock: RunClock,
    pub lexer: LexerConfig,
    pub text_path: TextPath,
    pub listing_enabled: bool,
    pub implicit_externals: bool,
    /// 1 during the definition/sizing sweep, 2 during the re-evaluation
    /// sweep that resolves forward references and emits real bytes.
    pub pass: u8,
}

impl AssemblerState {
    pub fn new(lexer: LexerConfig, text_path: TextPath) -> Self {
        AssemblerState {
            modules: ModuleTable::new(),
            qualifier: symtab::ROOT_QUALIFIER,
            section: symtab::UNNAMED_SECTION,
            location_counter: Value::absolute(0),
            diagnostics: Diagnostics::new(),
            locals: LocalLabels::new(),
            clock: RunClock::now(),
            lexer,
            text_path,
            listing_enabled: false,
            implicit_externals: false,
            pass: 1,
        }
    }

    /// Split one raw source line into its fields, applying the current
    /// lexer configuration. Micro substitution happens before this is
    /// called, since it operates on the whole raw line.
    pub fn extract_fields(&mut self, raw_line: &str) -> Fields {
        lexer::extract_fields(raw_line, &self.lexer, &mut self.locals)
    }

    /// Parse and evaluate `text` as an expression at the current pass
    /// state, returning its `Value`.
    pub fn evaluate_operand(&mut self, text: &str, line: u32) -> error::Result<Value> {
        let tokens = lexer::scan::Scanner::new(text)
            .scan_all()
            .map_err(|_| error::Error::new(error::ErrorKind::Syntax, line))?;
        let node = expr::parse(&tokens, line)?;
        let mut ctx = expr::Context {
            module: self.modules.current_id(),
            qualifier: self.qualifier,
            diagnostics: &mut self.diagnostics,
            location_counter: self.location_counter,
            line,
            modules: &mut self.modules,
            implicit_externals: self.implicit_externals,
            pass: self.pass,
        };
        expr::evaluate(&node, &mut ctx)
    }
}

/// Assemble `source`, writing the resulting object records to `out`.
///
/// Drives two full sweeps over `source.lines()`, matching a real
/// two-pass assembler's `fseek(0)` between passes: pass 1 gathers
/// definitions and sizes every section, tolerating a name that isn't
/// defined yet (an ordinary forward reference); between passes, every
/// module's literals are reserved, its sections are grouped into object
/// blocks, and its symbols are adjusted by their section's origin; pass
/// 2 re-walks the same lines with full symbol knowledge, now treating a
/// still-undefined name as a hard error and writing real bytes straight
/// into each block's image. Literal values are (re-)emitted once more
/// after pass 2, since a literal's expression may itself depend on a
/// symbol pass 2 just resolved.
pub fn assemble<W: io::Write>(
    source: &str,
    state: &mut AssemblerState,
    out: &mut object::cos::DatasetWriter<W>,
) -> error::Result<()> {
    state.pass = 1;
    run_pass(source, state)?;
    log::debug!("pass 1 complete: {} module(s)", state.modules.len());

    for module in state.modules.iter_mut() {
        symtab::assign_literal_offsets(module);
        symtab::create_object_blocks(module);
        symtab::adjust_symbol_values(module);
        symtab::reset_pass_cursors(module);
    }

    state.pass = 2;
    state.modules.set_current(state.modules.default_module_id());
    state.qualifier = symtab::ROOT_QUALIFIER;
    state.section = symtab::UNNAMED_SECTION;
    state.location_counter = Value::absolute(0);
    state.locals = LocalLabels::new();
    run_pass(source, state)?;
    log::debug!("pass 2 complete");

    for i in 0..state.modules.len() {
        symtab::emit_literals(&mut state.modules, symtab::ModuleId(i as u32));
    }
    for module in state.modules.iter_mut() {
        symtab::emit_pending_data(module);
    }
    for (id, module) in state.modules.iter() {
        log::trace!("writing module {:?} ({} block(s))", id, module.object_blocks.len());
        object::write_module(module, out).map_err(|_| error::Error::new(error::ErrorKind::Programmer, 0))?;
    }
    out.end_dataset().map_err(|_| error::Error::new(error::ErrorKind::Programmer, 0))
}

/// Walk every source line once, in file order, driving `process_line` at
/// whatever pass `state.pass` currently names.
fn run_pass(source: &str, state: &mut AssemblerState) -> error::Result<()> {
    for (lineno, raw_line) in source.lines().enumerate() {
        let line = lineno as u32 + 1;
        process_line(state, raw_line, line)?;
    }
    Ok(())
}

fn process_line(state: &mut AssemblerState, raw_line: &str, line: u32) -> error::Result<()> {
    state.diagnostics.start_line();
    let substituted = lexer::micro::substitute(
        raw_line,
        |name| {
            let module = state.modules.current_id();
            let module = state.modules.get(module);
            let default_module = state.modules.default_module();
            lexer::micro::resolve(name, &module.micros, &default_module.micros, &state.clock, "")
                .map(|c| c.into_owned())
        },
        |_name| state.diagnostics.register(error::ErrorKind::WarnMicroSubstitution),
    );
    let stripped = lexer::micro::strip_underscores(&substituted);
    let fields = state.extract_fields(&stripped);
    if fields.result.is_empty() {
        return Ok(());
    }

    let operand_tokens = lexer::scan::Scanner::new(&fields.operand)
        .scan_all()
        .map_err(|_| error::Error::new(error::ErrorKind::Syntax, line))?;
    let operand = expr::parse(&operand_tokens, line)?;

    let handler = pseudo::lookup(&fields.result);
    let mut ctx = expr::Context {
        module: state.modules.current_id(),
        qualifier: state.qualifier,
        diagnostics: &mut state.diagnostics,
        location_counter: state.location_counter,
        line,
        modules: &mut state.modules,
        implicit_externals: state.implicit_externals,
        pass: state.pass,
    };
    let mut args = pseudo::PseudoArgs {
        location: &fields.location,
        operand: &operand,
        ctx: &mut ctx,
        current_section: state.section,
    };
    let placement = handler(&mut args)?;
    state.location_counter = ctx.location_counter;
    let _ = placement;
    Ok(())
}
