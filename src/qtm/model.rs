//! Adaptive frequency models for the Quantum range coder
//!
//! A model is a table of `(symbol, cumulative frequency)` pairs kept
//! sorted by descending frequency, with a zero-frequency sentinel at the
//! end. Decoding a symbol bumps the cumulative frequencies above it by 8;
//! once the total passes 3800 the model is rescaled. Most rescales just
//! halve the table in place, but every 50th does a full rebuild: convert
//! to individual frequencies, halve, re-sort, and re-accumulate.

/// One model entry: the symbol and its cumulative frequency.
#[derive(Debug, Clone, Copy)]
pub(super) struct ModelSym {
    pub sym: u16,
    pub cumfreq: u16,
}

/// An adaptive model over `entries` consecutive symbols.
#[derive(Debug)]
pub(super) struct Model {
    shiftsleft: u8,
    entries: usize,
    syms: Vec<ModelSym>,
}

impl Model {
    /// Model over symbols `start..start+len`, seeded with frequency 1 each.
    pub fn new(start: u16, len: usize) -> Self {
        Self {
            shiftsleft: 4,
            entries: len,
            syms: (0..=len)
                .map(|i| ModelSym {
                    sym: start + i as u16,
                    cumfreq: (len - i) as u16,
                })
                .collect(),
        }
    }

    #[inline]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Root cumulative frequency (the model total).
    #[inline]
    pub fn total(&self) -> u16 {
        self.syms[0].cumfreq
    }

    #[inline]
    pub fn cumfreq(&self, i: usize) -> u16 {
        self.syms[i].cumfreq
    }

    #[inline]
    pub fn sym(&self, i: usize) -> u16 {
        self.syms[i].sym
    }

    /// First index whose cumulative frequency has dropped to `symf` or
    /// below; the decoded symbol is the entry just before it.
    pub fn lookup(&self, symf: i32) -> usize {
        let mut i = 1;
        while i < self.entries {
            if i32::from(self.syms[i].cumfreq) <= symf {
                break;
            }
            i += 1;
        }
        i
    }

    /// Account for a decode that selected the entry before index `i`.
    pub fn update(&mut self, i: usize) {
        for entry in &mut self.syms[..i] {
            entry.cumfreq += 8;
        }
        if self.syms[0].cumfreq > 3800 {
            self.rescale();
        }
    }

    fn rescale(&mut self) {
        self.shiftsleft -= 1;
        if self.shiftsleft != 0 {
            // cheap rescale: halve in place, keeping the cumulative
            // sequence strictly decreasing
            for i in (0..self.entries).rev() {
                self.syms[i].cumfreq >>= 1;
                if self.syms[i].cumfreq <= self.syms[i + 1].cumfreq {
                    self.syms[i].cumfreq = self.syms[i + 1].cumfreq + 1;
                }
            }
        } else {
            self.shiftsleft = 50;
            rebuild_frequencies(&mut self.syms);
        }
    }
}

/// Full model rebuild: individual frequencies halved (never to zero),
/// re-sorted descending, then re-accumulated.
///
/// The sort must be the in-place selection sort below; its (in)stability
/// for equal frequencies is part of the format.
pub(super) fn rebuild_frequencies(syms: &mut [ModelSym]) {
    let entries = syms.len() - 1;

    for i in 0..entries {
        syms[i].cumfreq = (syms[i].cumfreq - syms[i + 1].cumfreq + 1) >> 1;
    }

    for i in 0..entries.saturating_sub(1) {
        for j in i + 1..entries {
            if syms[i].cumfreq < syms[j].cumfreq {
                syms.swap(i, j);
            }
        }
    }

    for i in (0..entries).rev() {
        syms[i].cumfreq += syms[i + 1].cumfreq;
    }
}
