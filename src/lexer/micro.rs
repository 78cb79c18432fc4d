//! Micro substitution: `"..."` spans inside raw source are replaced with
//! the value of a named micro, looked up module-scoped, then
//! default-module-scoped, then against a fixed built-in set.

use chrono::{Local, NaiveDate};

/// Built-in micros that don't require a date/time to resolve.
pub fn builtin_static(name: &str) -> Option<&'static str> {
    match name.to_ascii_uppercase().as_str() {
        "$APP" => Some("^"),
        "$CNC" => Some("_"),
        "$CPU" => Some("CRAY XMP"),
        "$MIC" => Some("\""),
        "$CMNT" => Some(";"),
        _ => None,
    }
}

/// Date/time-derived built-ins, computed once per run and passed in
/// rather than read from the clock at substitution time (so a whole
/// file sees one consistent `$DATE`/`$TIME`).
#[derive(Debug, Clone)]
pub struct RunClock {
    pub date: String,
    pub time: String,
    pub jdate: String,
}

impl RunClock {
    pub fn now() -> Self {
        let now = Local::now();
        let date = now.format("%m/%d/%y").to_string();
        let time = now.format("%H:%M:%S").to_string();
        let jan1 = NaiveDate::from_ymd_opt(now.date_naive().year(), 1, 1).unwrap();
        let day_of_year = (now.date_naive() - jan1).num_days() + 1;
        let jdate = format!("{:02}{:03}", now.date_naive().year() % 100, day_of_year);
        RunClock { date, time, jdate }
    }

    pub fn lookup(&self, name: &str) -> Option<&str> {
        match name.to_ascii_uppercase().as_str() {
            "$DATE" => Some(&self.date),
            "$TIME" => Some(&self.time),
            "$JDATE" => Some(&self.jdate),
            _ => None,
        }
    }
}

use chrono::Datelike;

/// Resolve `name` to its substitution text: module-scoped micro table,
/// then the default module's, then the built-ins, then `$QUAL` (the
/// current qualifier name, supplied by the caller since it's pass
/// state, not a micro table entry).
pub fn resolve<'a>(
    name: &str,
    module_micros: &'a crate::symtab::NamedTextTable,
    default_micros: &'a crate::symtab::NamedTextTable,
    clock: &'a RunClock,
    current_qualifier: &'a str,
) -> Option<std::borrow::Cow<'a, str>> {
    if let Some(entry) = module_micros.get(name) {
        return Some(std::borrow::Cow::Borrowed(entry.body.as_str()));
    }
    if let Some(entry) = default_micros.get(name) {
        return Some(std::borrow::Cow::Borrowed(entry.body.as_str()));
    }
    if name.eq_ignore_ascii_case("$QUAL") {
        return Some(std::borrow::Cow::Borrowed(current_qualifier));
    }
    if let Some(s) = clock.lookup(name) {
        return Some(std::borrow::Cow::Borrowed(s));
    }
    builtin_static(name).map(std::borrow::Cow::Borrowed)
}

/// Replace every `"name"` span in `line` by calling `resolver`. A
/// micro name that fails to resolve registers
/// `ErrorKind::WarnMicroSubstitution` via `on_unresolved` and is left
/// in place verbatim.
pub fn substitute(
    line: &str,
    mut resolver: impl FnMut(&str) -> Option<String>,
    mut on_unresolved: impl FnMut(&str),
) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if c != '"' {
            out.push(c);
            continue;
        }
        // Find the matching close quote.
        if let Some(end) = line[i + 1..].find('"') {
            let name = &line[i + 1..i + 1 + end];
            match resolver(name) {
                Some(replacement) => out.push_str(&replacement),
                None => {
                    on_unresolved(name);
                    out.push('"');
                    out.push_str(name);
                    out.push('"');
                }
            }
            // Skip past the consumed span.
            for _ in 0..=end {
                chars.next();
            }
        } else {
            out.push('"');
        }
    }
    out
}

/// Cosmetic name spacers: underscore characters in a raw field are
/// purely decorative and stripped before tokenizing.
pub fn strip_underscores(s: &str) -> String {
    s.chars().filter(|&c| c != '_').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_micro_substitution() {
        let out = substitute("A \"APP\" B", |n| builtin_static(n).map(str::to_string), |_| {});
        assert_eq!(out, "A \"APP\" B");
        let out = substitute("A \"$APP\" B", |n| builtin_static(n).map(str::to_string), |_| {});
        assert_eq!(out, "A ^ B");
    }

    #[test]
    fn underscore_spacers_are_stripped() {
        assert_eq!(strip_underscores("MY_LABEL_1"), "MYLABEL1");
    }
}
