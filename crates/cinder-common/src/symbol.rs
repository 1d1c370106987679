use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// An interned string identifier.
///
/// All identifiers, qualified names, and mangled names in the compiler are
/// handles into a `SymbolInterner`; equality is a `u32` compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// String interner owned by a compilation session.
///
/// Append-only: handles stay valid for the lifetime of the session. The
/// interner is deliberately not synchronized; a session is single-threaded.
#[derive(Debug, Default)]
pub struct SymbolInterner {
    map: FxHashMap<SmolStr, Symbol>,
    strings: Vec<SmolStr>,
}

impl SymbolInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, s: &str) -> Symbol {
        if let Some(&sym) = self.map.get(s) {
            return sym;
        }
        let sym = Symbol(self.strings.len() as u32);
        let smol = SmolStr::new(s);
        self.strings.push(smol.clone());
        self.map.insert(smol, sym);
        sym
    }

    /// Borrow the bytes behind a handle.
    pub fn view(&self, sym: Symbol) -> &str {
        &self.strings[sym.0 as usize]
    }

    pub fn resolve(&self, sym: Symbol) -> SmolStr {
        self.strings[sym.0 as usize].clone()
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_idempotent() {
        let mut interner = SymbolInterner::new();
        let a = interner.intern("operator==");
        let b = interner.intern("operator==");
        assert_eq!(a, b);
        assert_eq!(interner.view(a), "operator==");
    }

    #[test]
    fn distinct_strings_get_distinct_handles() {
        let mut interner = SymbolInterner::new();
        let a = interner.intern("int");
        let b = interner.intern("signed");
        assert_ne!(a, b);
        assert_eq!(interner.len(), 2);
    }
}
