use std::path::Path;

use uuid::Uuid;

use crate::types::{self, Source, SourceBreakpoint};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pub file_path: String,
    pub file_name: String,
    pub line: i64,
    pub enabled: bool,
    /// Generated on every insert.
    pub client_id: Uuid,
    /// Assigned by the backend when it acknowledges `setBreakpoints`.
    pub backend_id: Option<i64>,
    pub verified: bool,
}

impl Breakpoint {
    pub fn new(file_path: impl Into<String>, line: i64) -> Self {
        let file_path = file_path.into();
        let file_name = Path::new(&file_path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.clone());
        Self {
            file_path,
            file_name,
            line,
            enabled: true,
            client_id: Uuid::new_v4(),
            backend_id: None,
            verified: false,
        }
    }

    pub fn is_at(&self, file_path: &str, line: i64) -> bool {
        self.file_path == file_path && self.line == line
    }
}

/// The breakpoints the user wants, in insertion order, unique per (file, line).
#[derive(Debug, Default, Clone)]
pub struct BreakpointRegistry {
    breakpoints: Vec<Breakpoint>,
}

impl BreakpointRegistry {
    /// Adds the breakpoint. One already registered for the same file and line is
    /// replaced in place.
    pub fn insert(&mut self, breakpoint: Breakpoint) {
        match self
            .breakpoints
            .iter_mut()
            .find(|existing| existing.is_at(&breakpoint.file_path, breakpoint.line))
        {
            Some(existing) => *existing = breakpoint,
            None => self.breakpoints.push(breakpoint),
        }
    }

    pub fn remove(&mut self, file_path: &str, line: i64) -> Option<Breakpoint> {
        let index = self
            .breakpoints
            .iter()
            .position(|breakpoint| breakpoint.is_at(file_path, line))?;
        Some(self.breakpoints.remove(index))
    }

    pub fn all(&self) -> &[Breakpoint] {
        &self.breakpoints
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }

    pub fn for_file<'a>(&'a self, file_path: &'a str) -> impl Iterator<Item = &'a Breakpoint> {
        self.breakpoints
            .iter()
            .filter(move |breakpoint| breakpoint.file_path == file_path)
    }

    /// Every file with at least one breakpoint, in order of first appearance.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = vec![];
        for breakpoint in &self.breakpoints {
            if !files.contains(&breakpoint.file_path) {
                files.push(breakpoint.file_path.clone());
            }
        }
        files
    }

    /// The `setBreakpoints` payload for one file: its source and the enabled
    /// breakpoints in registry order.
    pub fn source_breakpoints(&self, file_path: &str) -> (Source, Vec<SourceBreakpoint>) {
        let name = Path::new(file_path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string());
        let breakpoints = self
            .for_file(file_path)
            .filter(|breakpoint| breakpoint.enabled)
            .map(|breakpoint| SourceBreakpoint {
                line: breakpoint.line,
                column: None,
                condition: None,
            })
            .collect();
        (Source::from_path(file_path, name), breakpoints)
    }

    /// Stores what the backend answered to `setBreakpoints` for `file_path`.
    /// Acknowledgments come in the order the breakpoints were sent.
    pub fn apply_acks(&mut self, file_path: &str, acks: &[types::Breakpoint]) {
        let sent = self
            .breakpoints
            .iter_mut()
            .filter(|breakpoint| breakpoint.file_path == file_path && breakpoint.enabled);
        for (breakpoint, ack) in sent.zip(acks) {
            breakpoint.backend_id = ack.id;
            breakpoint.verified = ack.verified;
        }
    }

    /// Forgets everything a backend said about the breakpoints.
    pub fn reset_backend_state(&mut self) {
        for breakpoint in &mut self.breakpoints {
            breakpoint.backend_id = None;
            breakpoint.verified = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn ack(id: i64, verified: bool) -> types::Breakpoint {
        types::Breakpoint {
            id: Some(id),
            verified,
            message: None,
            source: None,
            line: None,
        }
    }

    #[test]
    fn same_location_is_replaced_in_place() {
        let mut registry = BreakpointRegistry::default();
        registry.insert(Breakpoint::new("/src/main.cpp", 42));
        registry.insert(Breakpoint::new("/src/util.cpp", 7));
        let first_id = registry.all()[0].client_id;

        registry.insert(Breakpoint::new("/src/main.cpp", 42));
        assert_eq!(registry.all().len(), 2);
        assert_eq!(registry.all()[0].file_path, "/src/main.cpp");
        assert_ne!(registry.all()[0].client_id, first_id);
        assert_eq!(registry.all()[0].file_name, "main.cpp");
        assert!(registry.all()[0].enabled);
    }

    #[test]
    fn remove_then_insert_is_a_set() {
        let mut registry = BreakpointRegistry::default();
        registry.insert(Breakpoint::new("/src/main.cpp", 42));
        assert!(registry.remove("/src/main.cpp", 42).is_some());
        assert!(registry.remove("/src/main.cpp", 42).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn payload_and_acks_are_per_file() {
        let mut registry = BreakpointRegistry::default();
        registry.insert(Breakpoint::new("/src/main.cpp", 42));
        registry.insert(Breakpoint::new("/src/util.cpp", 7));
        registry.insert(Breakpoint::new("/src/main.cpp", 50));
        assert_eq!(registry.files(), vec!["/src/main.cpp", "/src/util.cpp"]);

        let (source, breakpoints) = registry.source_breakpoints("/src/main.cpp");
        assert_eq!(source.name.as_deref(), Some("main.cpp"));
        assert_eq!(
            breakpoints.iter().map(|b| b.line).collect::<Vec<_>>(),
            vec![42, 50]
        );

        registry.apply_acks("/src/main.cpp", &[ack(1, true), ack(2, false)]);
        let main: Vec<_> = registry.for_file("/src/main.cpp").collect();
        assert_eq!(main[0].backend_id, Some(1));
        assert!(main[0].verified);
        assert_eq!(main[1].backend_id, Some(2));
        assert_eq!(registry.for_file("/src/util.cpp").next().unwrap().backend_id, None);

        registry.reset_backend_state();
        assert!(registry.all().iter().all(|b| b.backend_id.is_none() && !b.verified));
    }

    const FILES: [&str; 3] = ["/src/main.cpp", "/src/util.cpp", "/lib/io.cpp"];

    #[derive(Debug, Clone)]
    enum Edit {
        Insert(usize, i64),
        Remove(usize, i64),
    }

    fn edit() -> impl Strategy<Value = Edit> {
        let location = (0..FILES.len(), 1..5i64);
        prop_oneof![
            location
                .clone()
                .prop_map(|(file, line)| Edit::Insert(file, line)),
            location.prop_map(|(file, line)| Edit::Remove(file, line)),
        ]
    }

    proptest! {
        #[test]
        fn registry_is_a_set_of_locations(edits in prop::collection::vec(edit(), 0..64)) {
            let mut registry = BreakpointRegistry::default();
            let mut model = HashSet::new();
            for edit in edits {
                match edit {
                    Edit::Insert(file, line) => {
                        registry.insert(Breakpoint::new(FILES[file], line));
                        model.insert((FILES[file].to_string(), line));
                    }
                    Edit::Remove(file, line) => {
                        let removed = registry.remove(FILES[file], line).is_some();
                        prop_assert_eq!(removed, model.remove(&(FILES[file].to_string(), line)));
                    }
                }
            }

            let locations: Vec<_> = registry
                .all()
                .iter()
                .map(|breakpoint| (breakpoint.file_path.clone(), breakpoint.line))
                .collect();
            let unique: HashSet<_> = locations.iter().cloned().collect();
            prop_assert_eq!(locations.len(), unique.len());
            prop_assert_eq!(unique, model);
        }
    }
}
