//! Listing output (`-l`): a thin collaborator the pass driver reports
//! each processed line to. Formatting the full column layout of a
//! reference listing is out of scope; what's modeled here is the
//! interface and a minimal text rendering so `-l` has somewhere real to
//! write.

use std::io::{self, Write};

use crate::error::ErrorKind;

/// One line's worth of listing information.
pub struct ListingLine<'a> {
    pub source_line: u32,
    pub location: Option<i64>,
    pub text: &'a str,
    pub diagnostic: Option<ErrorKind>,
}

pub trait ListingSink {
    fn line(&mut self, entry: &ListingLine) -> io::Result<()>;
    fn summary(&mut self, error_count: u32, warning_count: u32) -> io::Result<()>;
}

/// `-l` absent: listing output is simply discarded.
pub struct NullListing;

impl ListingSink for NullListing {
    fn line(&mut self, _entry: &ListingLine) -> io::Result<()> {
        Ok(())
    }

    fn summary(&mut self, _error_count: u32, _warning_count: u32) -> io::Result<()> {
        Ok(())
    }
}

/// A plain one-line-per-source-line text listing: indicator column,
/// octal location, then the original source text.
pub struct TextListing<W> {
    out: W,
}

impl<W: Write> TextListing<W> {
    pub fn new(out: W) -> Self {
        TextListing { out }
    }
}

impl<W: Write> ListingSink for TextListing<W> {
    fn line(&mut self, entry: &ListingLine) -> io::Result<()> {
        let indicator = entry.diagnostic.map(|k| k.indicator()).unwrap_or(" ");
        match entry.location {
            Some(loc) => writeln!(self.out, "{:>2} {:>8o} {:5} {}", indicator, loc, entry.source_line, entry.text),
            None => writeln!(self.out, "{:>2} {:>8} {:5} {}", indicator, "", entry.source_line, entry.text),
        }
    }

    fn summary(&mut self, error_count: u32, warning_count: u32) -> io::Result<()> {
        writeln!(self.out, "{error_count} errors, {warning_count} warnings")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_listing_renders_location_in_octal() {
        let mut buf = Vec::new();
        {
            let mut listing = TextListing::new(&mut buf);
            listing
                .line(&ListingLine {
                    source_line: 1,
                    location: Some(8),
                    text: "   A1 5",
                    diagnostic: None,
                })
                .unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("10"), "expected octal 10 for decimal 8, got: {text}");
    }

    #[test]
    fn null_listing_never_errors() {
        let mut listing = NullListing;
        listing
            .line(&ListingLine {
                source_line: 1,
                location: None,
                text: "",
                diagnostic: None,
            })
            .unwrap();
        listing.summary(0, 0).unwrap();
    }
}
