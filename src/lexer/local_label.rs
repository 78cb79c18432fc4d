//! Local numeric labels under flexible syntax: `0:`..`9:` each have
//! their own counter; a definition renames to `@<n>$<counter>` and bumps
//! the counter, while `<n>b`/`<n>f` reference the current/next counter
//! value.

#[derive(Debug, Default)]
pub struct LocalLabels {
    counters: [u32; 10],
}

impl LocalLabels {
    pub fn new() -> Self {
        Self::default()
    }

    /// A definition `n:` — bump the counter for `n` and return the
    /// synthesized label name.
    pub fn define(&mut self, n: u8) -> String {
        let n = n as usize;
        self.counters[n] += 1;
        format!("@{}${}", n, self.counters[n])
    }

    /// A backward reference `nb` — the current (most recently defined)
    /// counter value for `n`.
    pub fn backward(&self, n: u8) -> String {
        format!("@{}${}", n, self.counters[n as usize])
    }

    /// A forward reference `nf` — the counter value `n:` will have the
    /// next time it's defined.
    pub fn forward(&self, n: u8) -> String {
        format!("@{}${}", n, self.counters[n as usize] + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definitions_increment_and_references_track() {
        let mut labels = LocalLabels::new();
        assert_eq!(labels.forward(3), "@3$1");
        let first = labels.define(3);
        assert_eq!(first, "@3$1");
        assert_eq!(labels.backward(3), "@3$1");
        assert_eq!(labels.forward(3), "@3$2");
        let second = labels.define(3);
        assert_eq!(second, "@3$2");
        assert_eq!(labels.backward(3), "@3$2");
    }

    #[test]
    fn counters_are_independent_per_digit() {
        let mut labels = LocalLabels::new();
        labels.define(1);
        labels.define(1);
        labels.define(2);
        assert_eq!(labels.backward(1), "@1$2");
        assert_eq!(labels.backward(2), "@2$1");
    }
}
