use std::collections::{BTreeSet, HashMap};

use kiln_api::SourceFile;
use serde::Serialize;
use tracing::trace;

use super::symbol::{SymbolReference, is_system_class};

/// Dependency bookkeeping for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyRecord {
    pub external_references: BTreeSet<SymbolReference>,
    /// Files this file refers to.
    pub dependencies: BTreeSet<SourceFile>,
    /// Files referring to this file.
    pub dependents: BTreeSet<SourceFile>,
    /// Whether `external_references` has been computed in this session.
    pub dependencies_set: bool,
}

impl DependencyRecord {
    fn is_empty(&self) -> bool {
        self.external_references.is_empty()
            && self.dependencies.is_empty()
            && self.dependents.is_empty()
            && !self.dependencies_set
    }
}

/// File-level dependency graph, kept symmetric:
/// `a ∈ dependencies(b) ⇔ b ∈ dependents(a)`.
///
/// Records are created when a file first takes part in an edge or gets its
/// references computed, and dropped when a removed file has no dependents
/// left.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    records: HashMap<SourceFile, DependencyRecord>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, file: &SourceFile) -> Option<&DependencyRecord> {
        self.records.get(file)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.records.keys()
    }

    pub fn is_dependencies_set(&self, file: &SourceFile) -> bool {
        self.records.get(file).is_some_and(|r| r.dependencies_set)
    }

    pub fn dependencies(&self, file: &SourceFile) -> BTreeSet<SourceFile> {
        self.records
            .get(file)
            .map(|r| r.dependencies.clone())
            .unwrap_or_default()
    }

    pub fn dependents(&self, file: &SourceFile) -> BTreeSet<SourceFile> {
        self.records
            .get(file)
            .map(|r| r.dependents.clone())
            .unwrap_or_default()
    }

    pub fn references(&self, file: &SourceFile) -> BTreeSet<SymbolReference> {
        self.records
            .get(file)
            .map(|r| r.external_references.clone())
            .unwrap_or_default()
    }

    /// Replaces the reference set of `file` and adjusts its edges.
    ///
    /// `resolve` maps a root class name to the workspace source defining it.
    /// Platform classes are never resolved. Returns whether the reference set
    /// changed, regardless of whether any edge did.
    ///
    /// An edge is dropped only once no remaining reference resolves to its
    /// target, so losing one of several references to a file keeps the edge.
    pub fn update_references(
        &mut self,
        file: &SourceFile,
        references: BTreeSet<SymbolReference>,
        mut resolve: impl FnMut(&str) -> Option<SourceFile>,
    ) -> bool {
        let record = self.records.entry(file.clone()).or_default();
        if record.dependencies_set && record.external_references == references {
            return false;
        }
        let changed = record.external_references != references;

        let mut targets: HashMap<&str, Option<SourceFile>> = HashMap::new();
        for reference in &references {
            let root = reference.root_class_name();
            if is_system_class(root) || targets.contains_key(root) {
                continue;
            }
            targets.insert(root, resolve(root));
        }
        let new_dependencies: BTreeSet<SourceFile> = targets
            .into_values()
            .flatten()
            .filter(|target| target != file)
            .collect();

        let old_dependencies = std::mem::take(&mut record.dependencies);
        record.dependencies = new_dependencies.clone();
        record.external_references = references;
        record.dependencies_set = true;

        for added in new_dependencies.difference(&old_dependencies) {
            trace!("{} now depends on {}", file, added);
            self.records
                .entry(added.clone())
                .or_default()
                .dependents
                .insert(file.clone());
        }
        for removed in old_dependencies.difference(&new_dependencies) {
            trace!("{} no longer depends on {}", file, removed);
            if let Some(target) = self.records.get_mut(removed) {
                target.dependents.remove(file);
            }
            self.prune(removed);
        }
        changed
    }

    /// Detaches a deleted file from everything it depended on.
    ///
    /// Its own dependents are left in place; the caller rebuilds them, and
    /// their stale references to this file clear once they are recompiled.
    /// Idempotent.
    pub fn remove_dependencies(&mut self, file: &SourceFile) {
        let Some(record) = self.records.get_mut(file) else {
            return;
        };
        let dependencies = std::mem::take(&mut record.dependencies);
        record.external_references.clear();
        record.dependencies_set = false;

        for dependency in &dependencies {
            if let Some(target) = self.records.get_mut(dependency) {
                target.dependents.remove(file);
            }
            self.prune(dependency);
        }
        self.prune(file);
    }

    /// Marks every record as needing its references recomputed.
    pub fn invalidate_all(&mut self) {
        for record in self.records.values_mut() {
            record.dependencies_set = false;
        }
    }

    fn prune(&mut self, file: &SourceFile) {
        if self.records.get(file).is_some_and(DependencyRecord::is_empty) {
            self.records.remove(file);
        }
    }

    /// Every asymmetric pair, as `(file, dependency)`; empty when the
    /// invariant holds.
    pub fn asymmetries(&self) -> Vec<(SourceFile, SourceFile)> {
        let mut broken = Vec::new();
        for (file, record) in &self.records {
            for dependency in &record.dependencies {
                let mirrored = self
                    .records
                    .get(dependency)
                    .is_some_and(|r| r.dependents.contains(file));
                if !mirrored {
                    broken.push((file.clone(), dependency.clone()));
                }
            }
            for dependent in &record.dependents {
                let mirrored = self
                    .records
                    .get(dependent)
                    .is_some_and(|r| r.dependencies.contains(file));
                if !mirrored {
                    broken.push((dependent.clone(), file.clone()));
                }
            }
        }
        broken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> SourceFile {
        SourceFile::new(&format!("/p/src/{name}.java"))
    }

    fn resolver(name: &str) -> Option<SourceFile> {
        match name {
            "Foo" | "Bar" | "Baz" => Some(file(name)),
            _ => None,
        }
    }

    fn refs(items: &[SymbolReference]) -> BTreeSet<SymbolReference> {
        items.iter().cloned().collect()
    }

    fn method(owner: &str, name: &str) -> SymbolReference {
        SymbolReference::Method {
            owner: owner.into(),
            name: name.into(),
            parameters: vec![],
        }
    }

    #[test]
    fn test_added_reference_creates_symmetric_edge() {
        let mut g = DependencyGraph::new();
        let changed = g.update_references(&file("Foo"), refs(&[method("Bar", "baz")]), resolver);
        assert!(changed);
        assert!(g.dependencies(&file("Foo")).contains(&file("Bar")));
        assert!(g.dependents(&file("Bar")).contains(&file("Foo")));
        assert!(g.asymmetries().is_empty());
    }

    #[test]
    fn test_second_update_is_unchanged() {
        let mut g = DependencyGraph::new();
        let set = refs(&[method("Bar", "baz")]);
        assert!(g.update_references(&file("Foo"), set.clone(), resolver));
        let before = g.record(&file("Foo")).cloned();
        assert!(!g.update_references(&file("Foo"), set, resolver));
        assert_eq!(g.record(&file("Foo")).cloned(), before);
    }

    #[test]
    fn test_empty_first_update_reports_unchanged_but_marks_set() {
        let mut g = DependencyGraph::new();
        assert!(!g.update_references(&file("Foo"), BTreeSet::new(), resolver));
        assert!(g.is_dependencies_set(&file("Foo")));
    }

    #[test]
    fn test_self_and_system_references_make_no_edges() {
        let mut g = DependencyGraph::new();
        g.update_references(
            &file("Foo"),
            refs(&[
                SymbolReference::class("Foo"),
                SymbolReference::class("java.lang.String"),
            ]),
            resolver,
        );
        assert!(g.dependencies(&file("Foo")).is_empty());
        assert_eq!(g.references(&file("Foo")).len(), 2);
    }

    #[test]
    fn test_edge_kept_while_any_reference_remains() {
        let mut g = DependencyGraph::new();
        let field = SymbolReference::Field {
            owner: "Bar".into(),
            name: "count".into(),
        };
        g.update_references(&file("Foo"), refs(&[method("Bar", "baz"), field.clone()]), resolver);
        g.update_references(&file("Foo"), refs(&[field]), resolver);
        assert!(g.dependents(&file("Bar")).contains(&file("Foo")));

        g.update_references(&file("Foo"), refs(&[method("Baz", "x")]), resolver);
        assert!(g.dependents(&file("Bar")).is_empty());
        assert!(g.dependents(&file("Baz")).contains(&file("Foo")));
        assert!(g.asymmetries().is_empty());
    }

    #[test]
    fn test_remove_dependencies_keeps_own_dependents() {
        let mut g = DependencyGraph::new();
        g.update_references(&file("Foo"), refs(&[method("Bar", "baz")]), resolver);
        g.update_references(&file("Bar"), refs(&[method("Baz", "q")]), resolver);

        g.remove_dependencies(&file("Bar"));
        assert!(g.dependents(&file("Baz")).is_empty());
        assert!(g.dependents(&file("Bar")).contains(&file("Foo")));
        assert!(!g.is_dependencies_set(&file("Bar")));
        // Foo still lists Bar until Foo is rebuilt
        assert!(g.references(&file("Foo")).contains(&method("Bar", "baz")));
        assert!(g.asymmetries().is_empty());

        g.remove_dependencies(&file("Bar"));
        assert!(g.asymmetries().is_empty());
    }
}
