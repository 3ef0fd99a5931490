//! Workspace - the result of one load.
//!
//! Owns every entity that survived building and registration, grouped by kind in
//! parse order, the dependency graph derived from resolved references, and the ordered
//! diagnostics. A workspace with diagnostics is still a workspace; deciding whether it
//! is good enough is up to the caller.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::core::contract::DocumentKind;
use crate::core::entity::{EntityKey, EntityKind};
use crate::core::location::Location;
use crate::core::model::{EntityRecord, SystemMetadata};
use crate::resolver::DependencyGraph;
use crate::util::diagnostic::Diagnostic;

/// A loaded workspace.
#[derive(Debug, Clone)]
pub struct Workspace {
    /// Declared workspace name
    name: String,

    /// Absolute root directory
    root: PathBuf,

    /// Root metadata, when it built
    system: Option<SystemMetadata>,

    /// Documents found on disk, in discovery order
    documents: Vec<(PathBuf, DocumentKind)>,

    /// Entities by kind, in parse order
    objects: BTreeMap<EntityKind, Vec<EntityRecord>>,

    /// Position of each entity in `objects`
    positions: HashMap<EntityKey, usize>,

    graph: DependencyGraph,

    diagnostics: Vec<Diagnostic>,
}

impl Workspace {
    pub(crate) fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Workspace {
            name: name.into(),
            root: root.into(),
            system: None,
            documents: Vec::new(),
            objects: BTreeMap::new(),
            positions: HashMap::new(),
            graph: DependencyGraph::new(),
            diagnostics: Vec::new(),
        }
    }

    pub(crate) fn set_system(&mut self, system: SystemMetadata) {
        self.system = Some(system);
    }

    pub(crate) fn add_document(&mut self, path: PathBuf, kind: DocumentKind) {
        self.documents.push((path, kind));
    }

    /// Add a registered entity. Every entity is a graph node, referenced or not.
    pub(crate) fn add_entity(&mut self, record: EntityRecord) {
        self.graph.add_entity(record.key.clone());
        let list = self.objects.entry(record.key.kind).or_default();
        self.positions.insert(record.key.clone(), list.len());
        list.push(record);
    }

    pub(crate) fn set_graph(&mut self, graph: DependencyGraph) {
        self.graph = graph;
    }

    pub(crate) fn set_diagnostics(&mut self, diagnostics: Vec<Diagnostic>) {
        self.diagnostics = diagnostics;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn system(&self) -> Option<&SystemMetadata> {
        self.system.as_ref()
    }

    /// Documents found on disk (paths relative to the root), in discovery order.
    pub fn documents(&self) -> impl Iterator<Item = (&Path, DocumentKind)> {
        self.documents.iter().map(|(path, kind)| (path.as_path(), *kind))
    }

    pub fn document_kind(&self, path: &Path) -> Option<DocumentKind> {
        self.documents
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, kind)| *kind)
    }

    /// Entities of one kind, in parse order.
    pub fn objects(&self, kind: EntityKind) -> &[EntityRecord] {
        self.objects.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every entity, grouped by kind.
    pub fn entities(&self) -> impl Iterator<Item = &EntityRecord> {
        self.objects.values().flatten()
    }

    pub fn entity_count(&self) -> usize {
        self.positions.len()
    }

    pub fn get(&self, key: &EntityKey) -> Option<&EntityRecord> {
        let position = *self.positions.get(key)?;
        self.objects.get(&key.kind)?.get(position)
    }

    pub fn lookup(&self, kind: EntityKind, name: &str) -> Option<&EntityRecord> {
        self.get(&EntityKey::new(kind, name))
    }

    /// Where an entity was declared.
    pub fn source(&self, key: &EntityKey) -> Option<&Location> {
        self.get(key).map(|record| &record.location)
    }

    /// Entities `key` refers to.
    pub fn dependencies(&self, key: &EntityKey) -> Vec<&EntityKey> {
        self.graph.deps(key)
    }

    /// Entities referring to `key`.
    pub fn reverse_deps(&self, key: &EntityKey) -> Vec<&EntityKey> {
        self.graph.dependents(key)
    }

    /// Where `from` refers to `to`, if it does.
    pub fn reference_site(&self, from: &EntityKey, to: &EntityKey) -> Option<&Location> {
        self.graph.reference_site(from, to)
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// All diagnostics, in document discovery order then field path.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    /// No diagnostics of any severity.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}
