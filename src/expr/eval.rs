//! Walks a token tree against the symbol tables to produce a `Value`,
//! threading the relocation-coefficient algebra through every binary and
//! unary operator.

use crate::ast::Node;
use crate::error::{Diagnostics, Error, ErrorKind};
use crate::symtab::{ModuleId, ModuleTable, QualifierId, LITERALS_SECTION, ROOT_QUALIFIER};
use crate::token::Operator;
use crate::value::{Attr, Number, Value};

pub struct Context<'a> {
    pub modules: &'a mut ModuleTable,
    pub module: ModuleId,
    pub qualifier: QualifierId,
    pub diagnostics: &'a mut Diagnostics,
    /// The current location counter (`*`), already scaled to whatever
    /// address unit the active section tracks.
    pub location_counter: Value,
    pub line: u32,
    /// `-x`: an otherwise-undefined unqualified name is installed as an
    /// implicit external instead of raising `Err_Undefined`.
    pub implicit_externals: bool,
    /// 1 while gathering definitions (forward references are expected
    /// and tolerated), 2 while re-evaluating with full symbol knowledge
    /// (an unresolved name is now a hard error).
    pub pass: u8,
}

pub fn evaluate(node: &Node, ctx: &mut Context) -> Result<Value, Error> {
    match node {
        Node::None => Ok(Value::absolute(0)),
        Node::Error => Ok(Value::undefined()),
        Node::Int(n) => Ok(Value::absolute(*n)),
        Node::Float(n) => Ok(Value::float(*n)),
        Node::Str { bytes, .. } => Ok(Value::absolute(pack_string(bytes))),
        Node::SubExpr(inner) => evaluate(inner, ctx),
        Node::Literal(inner) => {
            let inner_node = (**inner).clone();
            evaluate(inner, ctx)?; // validates the inner expression eagerly
            let module = ctx.modules.get_mut(ctx.module);
            let id = module.literals.add(inner_node);
            Ok(Value {
                attrs: Attr::RELOCATABLE | Attr::WORD_ADDRESS,
                number: Number::Int(id.0 as i64),
                section: Some(LITERALS_SECTION),
                external: None,
                coefficient: 1,
            })
        }
        Node::Name { name, qual } => eval_name(name, qual.as_deref(), ctx),
        Node::Register { ordinal, .. } => evaluate(ordinal, ctx),
        Node::Op { op, left, right } => {
            let rhs = evaluate(right, ctx)?;
            match left {
                None => eval_unary(*op, rhs, ctx.line),
                Some(left) => {
                    let lhs = evaluate(left, ctx)?;
                    eval_binary(*op, lhs, rhs, ctx.line)
                }
            }
        }
    }
}

/// Pack up to 8 bytes of a string literal big-endian into a single
/// word, the way a short character constant behaves as a plain integer
/// operand.
fn pack_string(bytes: &[u8]) -> i64 {
    let mut n: i64 = 0;
    for &b in bytes.iter().take(8) {
        n = (n << 8) | b as i64;
    }
    n
}

fn eval_name(name: &str, qual: Option<&str>, ctx: &mut Context) -> Result<Value, Error> {
    if name == "*" && qual.is_none() {
        return Ok(ctx.location_counter);
    }
    let module = ctx.modules.get(ctx.module);
    if let Some(qual_name) = qual {
        if let Some(qid) = module.lookup_qualifier(qual_name) {
            if let Some(id) = module.lookup_in_qualifier(qid, name) {
                return Ok(module.symbol(id).value);
            }
        }
    } else {
        if let Some(id) = module.lookup_in_qualifier(ctx.qualifier, name) {
            return Ok(module.symbol(id).value);
        }
        if ctx.qualifier != ROOT_QUALIFIER {
            if let Some(id) = module.lookup_in_qualifier(ROOT_QUALIFIER, name) {
                return Ok(module.symbol(id).value);
            }
        }
        let default_module = ctx.modules.default_module();
        if !module.is_default() {
            if let Some(id) = default_module.lookup_in_qualifier(ROOT_QUALIFIER, name) {
                return Ok(default_module.symbol(id).value);
            }
        }
    }
    if ctx.pass == 2 && ctx.implicit_externals && qual.is_none() {
        let module = ctx.modules.get_mut(ctx.module);
        let (id, _) = module.intern_symbol(ctx.qualifier, name, Value::undefined());
        let external_index = module.add_external(id);
        let mut value = module.symbol(id).value;
        value.external = Some(external_index);
        module.symbol_mut(id).value = value;
        return Ok(value);
    }
    // Pass 1 tolerates a not-yet-defined name: it's an ordinary forward
    // reference, resolved once pass 2 revisits this expression with the
    // full symbol table populated. Only pass 2 treats it as a real
    // undefined-symbol error.
    if ctx.pass == 2 {
        ctx.diagnostics.register(ErrorKind::Undefined);
    }
    Ok(Value::undefined())
}

fn is_plain(v: &Value) -> bool {
    v.section.is_none() && v.external.is_none()
}

fn check_relocation(v: Value, line: u32) -> Result<Value, Error> {
    if v.relocation_coefficient().abs() > 1 {
        return Err(Error::new(ErrorKind::RelocatableField, line));
    }
    Ok(v)
}

fn eval_unary(op: Operator, v: Value, line: u32) -> Result<Value, Error> {
    if v.is_undefined() {
        return Ok(v);
    }
    match op {
        Operator::UnaryPlus => Ok(v),
        Operator::UnaryMinus => {
            let mut out = v;
            out.number = match v.number {
                Number::Int(n) => Number::Int(-n),
                Number::Float(n) => Number::Float(-n),
            };
            out.coefficient = -v.coefficient;
            check_relocation(out, line)
        }
        Operator::UnaryHigh => {
            if !is_plain(&v) {
                return Err(Error::new(ErrorKind::Type, line));
            }
            Ok(Value::absolute((v.i64_value() >> 32) & 0xFFFF_FFFF))
        }
        Operator::UnaryLow => {
            if !is_plain(&v) {
                return Err(Error::new(ErrorKind::Type, line));
            }
            Ok(Value::absolute(v.i64_value() & 0xFFFF_FFFF))
        }
        Operator::UnaryHash => project_address(v, Attr::BYTE_ADDRESS, line),
        Operator::WordOf => project_address(v, Attr::WORD_ADDRESS, line),
        Operator::ParcelOf => project_address(v, Attr::PARCEL_ADDRESS, line),
        Operator::ByteOf => project_address(v, Attr::BYTE_ADDRESS, line),
        _ => Err(Error::new(ErrorKind::Expression, line)),
    }
}

/// Re-express an address-typed value's number in a different address
/// unit (word/parcel/byte), converting via parcels as the common base —
/// the same conversion `scaleOriginForUnit` applies to section origins.
fn project_address(mut v: Value, target: Attr, line: u32) -> Result<Value, Error> {
    if !v.attrs.is_address() && v.section.is_none() {
        return Err(Error::new(ErrorKind::Type, line));
    }
    let n = v.i64_value();
    let parcels = if v.attrs.contains(Attr::WORD_ADDRESS) {
        n * 4
    } else if v.attrs.contains(Attr::BYTE_ADDRESS) {
        n / 2
    } else {
        n
    };
    let converted = match target {
        Attr::WORD_ADDRESS => parcels / 4,
        Attr::BYTE_ADDRESS => parcels * 2,
        _ => parcels,
    };
    v.attrs -= Attr::ADDRESS_MASK;
    v.attrs |= target;
    v.number = Number::Int(converted);
    Ok(v)
}

fn eval_binary(op: Operator, a: Value, b: Value, line: u32) -> Result<Value, Error> {
    if a.is_undefined() || b.is_undefined() {
        return Ok(Value::undefined());
    }
    match op {
        Operator::Add => combine_additive(a, b, 1, line),
        Operator::Sub => combine_additive(a, b, -1, line),
        Operator::Mul => combine_plain_int(a, b, line, |x, y| Ok(x.wrapping_mul(y))),
        Operator::Div => combine_plain_int(a, b, line, |x, y| if y == 0 { Err(()) } else { Ok(x / y) }),
        Operator::And => combine_plain_int(a, b, line, |x, y| Ok(x & y)),
        Operator::Or => combine_plain_int(a, b, line, |x, y| Ok(x | y)),
        Operator::Xor => combine_plain_int(a, b, line, |x, y| Ok(x ^ y)),
        Operator::ShiftLeft => combine_plain_int(a, b, line, |x, y| Ok(x << (y & 63))),
        Operator::ShiftRight => combine_plain_int(a, b, line, |x, y| Ok(((x as u64) >> (y & 63)) as i64)),
        _ => Err(Error::new(ErrorKind::Expression, line)),
    }
}

/// `* / & < >` and shifts all require two plain (non-relocatable,
/// non-external) integer operands.
fn combine_plain_int(
    a: Value,
    b: Value,
    line: u32,
    f: impl FnOnce(i64, i64) -> Result<i64, ()>,
) -> Result<Value, Error> {
    if !is_plain(&a) || !is_plain(&b) || a.number.is_float() || b.number.is_float() {
        return Err(Error::new(ErrorKind::Type, line));
    }
    match f(a.i64_value(), b.i64_value()) {
        Ok(n) => Ok(Value::absolute(n)),
        Err(()) => Err(Error::new(ErrorKind::Expression, line)),
    }
}

/// `+`/`-`: the one pair of operators that accepts a relocatable or
/// external operand, since "address plus offset" and "address minus
/// address" are the whole point of a relocating assembler.
fn combine_additive(a: Value, b: Value, sign: i64, line: u32) -> Result<Value, Error> {
    if a.number.is_float() || b.number.is_float() {
        if !is_plain(&a) || !is_plain(&b) {
            return Err(Error::new(ErrorKind::Type, line));
        }
        let n = a.number.as_f64() + sign as f64 * b.number.as_f64();
        return Ok(Value::float(n));
    }

    if a.external.is_some() && b.external.is_some() {
        return Err(Error::new(ErrorKind::RelocatableField, line));
    }

    let mut out = Value::absolute(a.i64_value() + sign * b.i64_value());

    match (a.section, b.section) {
        (Some(sa), Some(sb)) if sa == sb && sign == -1 => {
            // Same-section subtraction cancels the relocation entirely.
        }
        (Some(_), Some(_)) => return Err(Error::new(ErrorKind::RelocatableField, line)),
        (Some(sa), None) => {
            out.section = Some(sa);
            out.attrs |= a.attrs & (Attr::RELOCATABLE | Attr::IMMOBILE | Attr::ADDRESS_MASK);
            out.coefficient = a.coefficient;
        }
        (None, Some(sb)) => {
            if sign == -1 {
                return Err(Error::new(ErrorKind::RelocatableField, line));
            }
            out.section = Some(sb);
            out.attrs |= b.attrs & (Attr::RELOCATABLE | Attr::IMMOBILE | Attr::ADDRESS_MASK);
            out.coefficient = b.coefficient;
        }
        (None, None) => {}
    }

    if let Some(ext) = a.external.or(b.external) {
        out.external = Some(ext);
        out.attrs |= Attr::EXTERNAL;
        out.coefficient = a.coefficient + sign * b.coefficient;
    }

    check_relocation(out, line)
}
