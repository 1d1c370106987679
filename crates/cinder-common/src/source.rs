use smol_str::SmolStr;

/// Unique identifier for a translation-unit source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(u32);

impl SourceId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

/// Registry of source file names.
///
/// The core consumes an already-lexed token stream, so the map holds only
/// what diagnostics need: the file name behind each `SourceId`.
#[derive(Debug, Default)]
pub struct SourceMap {
    files: Vec<SmolStr>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl AsRef<str>) -> SourceId {
        let id = SourceId(self.files.len() as u32);
        self.files.push(SmolStr::new(name.as_ref()));
        id
    }

    pub fn name(&self, id: SourceId) -> &str {
        self.files
            .get(id.0 as usize)
            .map(SmolStr::as_str)
            .unwrap_or("<unknown>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_round_trip() {
        let mut map = SourceMap::new();
        let a = map.add_file("main.cpp");
        let b = map.add_file("vector.hpp");
        assert_eq!(map.name(a), "main.cpp");
        assert_eq!(map.name(b), "vector.hpp");
        assert_ne!(a, b);
    }
}
