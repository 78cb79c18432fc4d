//! The error/warning taxonomy from the error handling design, plus the
//! per-line registration bitmask and global counters that drive the
//! end-of-run summary.

use std::fmt;

/// One error, warning, or informational code the assembler can raise.
///
/// Ordered the way the design lists them: error-class codes first, then
/// warnings, then the single informational code. The discriminant order
/// matters only for the `bit()` mapping into the per-line/global masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    DataItem,
    DoubleDefinition,
    IllegalNesting,
    TooManyEntries,
    InstructionPlacement,
    LocationField,
    RelocatableField,
    OperandField,
    Programmer,
    ResultField,
    Syntax,
    Type,
    Undefined,
    FieldWidth,
    Expression,

    WarnProgrammer,
    WarnIgnoredLocationSymbol,
    WarnBadLocationSymbol,
    WarnExpressionElement,
    WarnMachineInstruction,
    WarnTruncation,
    WarnUndefinedLocationSymbol,
    WarnMicroSubstitution,
    WarnAddressCounter,
    WarnExternalDeclaration,
    WarnRedefinedMacro,

    ModuleEnd,
}

/// What class of code this is, for counting and exit-status purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    Error,
    Warning,
    Info,
}

impl ErrorKind {
    /// Short indicator printed in the listing (`C`, `D`, `W3`, ...).
    pub fn indicator(self) -> &'static str {
        use ErrorKind::*;
        match self {
            DataItem => "A",
            DoubleDefinition => "D",
            IllegalNesting => "N",
            TooManyEntries => "T",
            InstructionPlacement => "P",
            LocationField => "L",
            RelocatableField => "R",
            OperandField => "O",
            Programmer => "X",
            ResultField => "F",
            Syntax => "S",
            Type => "Y",
            Undefined => "U",
            FieldWidth => "W",
            Expression => "E",

            WarnProgrammer => "W1",
            WarnIgnoredLocationSymbol => "W2",
            WarnBadLocationSymbol => "W3",
            WarnExpressionElement => "W4",
            WarnMachineInstruction => "W5",
            WarnTruncation => "W6",
            WarnUndefinedLocationSymbol => "W7",
            WarnMicroSubstitution => "W8",
            WarnAddressCounter => "W9",
            WarnExternalDeclaration => "WA",
            WarnRedefinedMacro => "WB",

            ModuleEnd => "M",
        }
    }

    pub fn message(self) -> &'static str {
        use ErrorKind::*;
        match self {
            DataItem => "invalid data item",
            DoubleDefinition => "symbol already defined",
            IllegalNesting => "illegal nesting",
            TooManyEntries => "too many entries",
            InstructionPlacement => "instruction cannot appear here",
            LocationField => "invalid location field",
            RelocatableField => "invalid combination of relocatable operands",
            OperandField => "invalid operand field",
            Programmer => "internal error",
            ResultField => "invalid result field",
            Syntax => "syntax error",
            Type => "type mismatch",
            Undefined => "undefined symbol",
            FieldWidth => "field too narrow for value",
            Expression => "invalid expression",

            WarnProgrammer => "internal warning",
            WarnIgnoredLocationSymbol => "location symbol ignored",
            WarnBadLocationSymbol => "suspicious location symbol",
            WarnExpressionElement => "suspicious expression element",
            WarnMachineInstruction => "suspicious machine instruction",
            WarnTruncation => "value truncated to fit field",
            WarnUndefinedLocationSymbol => "undefined location symbol",
            WarnMicroSubstitution => "micro substitution failed",
            WarnAddressCounter => "address counter adjusted",
            WarnExternalDeclaration => "implicit external declaration",
            WarnRedefinedMacro => "macro redefined",

            ModuleEnd => "end of module",
        }
    }

    pub fn class(self) -> Class {
        use ErrorKind::*;
        match self {
            ModuleEnd => Class::Info,
            WarnProgrammer
            | WarnIgnoredLocationSymbol
            | WarnBadLocationSymbol
            | WarnExpressionElement
            | WarnMachineInstruction
            | WarnTruncation
            | WarnUndefinedLocationSymbol
            | WarnMicroSubstitution
            | WarnAddressCounter
            | WarnExternalDeclaration
            | WarnRedefinedMacro => Class::Warning,
            _ => Class::Error,
        }
    }

    /// Bit position used in the per-line and global union masks.
    fn bit(self) -> u32 {
        self as u32
    }
}

/// An error or warning raised at a specific source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    kind: ErrorKind,
    line: u32,
    detail: Option<String>,
}

impl Error {
    pub fn new(kind: ErrorKind, line: u32) -> Self {
        Error {
            kind,
            line,
            detail: None,
        }
    }

    pub fn with_detail(kind: ErrorKind, line: u32, detail: impl Into<String>) -> Self {
        Error {
            kind,
            line,
            detail: Some(detail.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn line(&self) -> u32 {
        self.line
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.kind.indicator(),
            self.kind.message(),
            self.line
        )?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Per-run counters and bitmasks, threaded through a pass the way the
/// original design threads a process-wide error-registrations bitmask.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    /// Bits set for every kind seen anywhere in the run.
    global_mask: u64,
    /// Bits set for every kind seen on the current line; cleared when
    /// `start_line` is called.
    line_mask: u64,
    error_count: u32,
    warning_count: u32,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the per-line mask; call once per source line before
    /// dispatching it.
    pub fn start_line(&mut self) {
        self.line_mask = 0;
    }

    /// Register an occurrence of `kind`. A kind counts towards
    /// error/warning totals only the first time it's seen on the current
    /// line; the global mask accumulates across the whole run regardless.
    pub fn register(&mut self, kind: ErrorKind) {
        let bit = 1u64 << kind.bit();
        self.global_mask |= bit;
        if self.line_mask & bit == 0 {
            self.line_mask |= bit;
            match kind.class() {
                Class::Error => self.error_count += 1,
                Class::Warning => self.warning_count += 1,
                Class::Info => {}
            }
        }
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    pub fn warning_count(&self) -> u32 {
        self.warning_count
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn has_warnings(&self) -> bool {
        self.warning_count > 0
    }

    pub fn seen(&self, kind: ErrorKind) -> bool {
        self.global_mask & (1u64 << kind.bit()) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_kind_counts_once_per_line() {
        let mut diag = Diagnostics::new();
        diag.start_line();
        diag.register(ErrorKind::Syntax);
        diag.register(ErrorKind::Syntax);
        assert_eq!(diag.error_count(), 1);
        diag.start_line();
        diag.register(ErrorKind::Syntax);
        assert_eq!(diag.error_count(), 2);
    }

    #[test]
    fn warnings_and_errors_counted_separately() {
        let mut diag = Diagnostics::new();
        diag.start_line();
        diag.register(ErrorKind::Syntax);
        diag.register(ErrorKind::WarnTruncation);
        assert_eq!(diag.error_count(), 1);
        assert_eq!(diag.warning_count(), 1);
        assert!(diag.seen(ErrorKind::WarnTruncation));
        assert!(!diag.seen(ErrorKind::Undefined));
    }
}
