//! Workspace loading.
//!
//! A load runs in two phases. Phase one reads, parses and builds every indexed
//! document, in parallel when configured; registration of the built entities then
//! happens sequentially in document discovery order, so which of two duplicates wins
//! never depends on scheduling. Phase two resolves every recorded reference against
//! the complete registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::builder::document::{build_entry, BuiltDocument};
use crate::core::contract::{Contract, DocumentKind};
use crate::core::entity::EntityKey;
use crate::core::location::{FieldPath, Location};
use crate::core::model::EntityRecord;
use crate::core::reference::Reference;
use crate::core::registry::NameRegistry;
use crate::core::workspace::Workspace;
use crate::resolver::{DependencyGraph, Resolver};
use crate::sources::{DocumentIndex, DocumentParser, IndexEntry, YamlParser};
use crate::util::config::LoadConfig;
use crate::util::diagnostic::{suggestions, Diagnostic, DiagnosticKind, LoadError};

/// Where a loader stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Never used, or currently loading
    Loading,
    /// The last load produced a workspace (possibly with diagnostics)
    Loaded,
    /// The last load hit a structural error
    FatalAborted,
}

/// Loads workspaces. Owns the name registry; every load starts from an empty one.
pub struct Loader {
    config: LoadConfig,
    contract: Contract,
    registry: NameRegistry,
    parser: Box<dyn DocumentParser>,
    state: LoadState,
}

impl Loader {
    pub fn new(config: LoadConfig) -> Self {
        Loader {
            config,
            contract: Contract::v1(),
            registry: NameRegistry::new(),
            parser: Box::new(YamlParser),
            state: LoadState::Loading,
        }
    }

    /// Use a different document parser.
    pub fn with_parser(mut self, parser: impl DocumentParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// The registry as the last load left it.
    pub fn registry(&self) -> &NameRegistry {
        &self.registry
    }

    /// Load the workspace at `root`, which must declare the name `name`.
    ///
    /// Only structural problems (missing root, missing mandatory directory, name
    /// mismatch) are errors; everything else ends up in [`Workspace::diagnostics`].
    pub fn load(&mut self, name: &str, root: &Path) -> Result<Workspace, LoadError> {
        self.state = LoadState::Loading;
        self.registry.reset();

        let result = self.load_inner(name, root);
        self.state = match &result {
            Ok(_) => LoadState::Loaded,
            Err(err) => {
                debug!("load of {} aborted: {}", root.display(), err);
                LoadState::FatalAborted
            }
        };
        result
    }

    fn load_inner(&mut self, name: &str, root: &Path) -> Result<Workspace, LoadError> {
        let index = DocumentIndex::scan(root, &self.contract)?;
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        info!(
            "loading workspace `{}` from {} ({} documents, {} ECUs)",
            name,
            root.display(),
            index.present().count(),
            index.ecus().len()
        );

        let built = self.build_all(index.entries());

        match declared_name(&built) {
            Some(declared) if declared != name => {
                return Err(LoadError::NameMismatch {
                    expected: name.to_string(),
                    found: declared.to_string(),
                });
            }
            Some(_) => {}
            None => debug!("root metadata declares no name, accepting `{}`", name),
        }

        let mut ws = Workspace::new(name, root.clone());
        let mut diagnostics: Vec<(usize, Diagnostic)> = index
            .findings()
            .iter()
            .map(|f| (f.order, f.diagnostic.clone()))
            .collect();
        let mut document_order: HashMap<PathBuf, usize> = HashMap::new();
        let mut accepted: Vec<EntityRecord> = Vec::new();
        let mut first_declared: HashMap<EntityKey, Location> = HashMap::new();
        let mut references: Vec<Reference> = Vec::new();

        for entry in index.present() {
            ws.add_document(entry.relative.clone(), entry.kind);
        }

        for doc in built {
            document_order.insert(doc.document.clone(), doc.order);
            diagnostics.extend(doc.diagnostics.iter().cloned().map(|d| (doc.order, d)));
            if let Some(system) = doc.system.clone() {
                ws.set_system(system);
            }

            let mut rejected: Vec<&EntityRecord> = Vec::new();
            for record in &doc.entities {
                match self.register(record) {
                    Ok(()) => {
                        first_declared.insert(record.key.clone(), record.location.clone());
                        accepted.push(record.clone());
                    }
                    Err(mut diag) => {
                        if let Some(first) = first_declared.get(&record.key) {
                            diag = diag.with_context("first declared at", first.to_string());
                        }
                        diagnostics.push((doc.order, diag));
                        rejected.push(record);
                    }
                }
            }
            references.extend(
                doc.references
                    .iter()
                    .filter(|r| !rejected.iter().any(|owner| owns(owner, r)))
                    .cloned(),
            );
        }
        debug!(
            "registered {} entities, {} references to resolve",
            accepted.len(),
            references.len()
        );

        let mut graph = DependencyGraph::new();
        for record in &accepted {
            graph.add_entity(record.key.clone());
        }
        let link_errors = {
            let resolver = Resolver::new(&self.registry, accepted.iter().map(|r| &r.entity));
            resolver.link(&references, &mut graph)
        };
        for err in &link_errors {
            let order = document_order
                .get(&err.location().document)
                .copied()
                .unwrap_or(usize::MAX);
            diagnostics.push((order, err.to_diagnostic()));
        }

        for record in accepted {
            ws.add_entity(record);
        }
        ws.set_graph(graph);
        ws.set_diagnostics(order_diagnostics(diagnostics));

        info!(
            "loaded workspace `{}`: {} entities, {} references resolved, {} errors, {} warnings",
            ws.name(),
            ws.entity_count(),
            ws.graph().edge_count(),
            ws.errors().count(),
            ws.warnings().count()
        );
        Ok(ws)
    }

    /// Phase one. The result is in entry order whatever the scheduling.
    fn build_all(&self, entries: &[IndexEntry]) -> Vec<BuiltDocument> {
        let parser = self.parser.as_ref();
        if !self.config.parallel() {
            return entries.iter().map(|e| build_entry(e, parser)).collect();
        }

        let run = || -> Vec<BuiltDocument> { entries.par_iter().map(|e| build_entry(e, parser)).collect() };
        match self.config.jobs {
            Some(jobs) => match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
                Ok(pool) => pool.install(run),
                Err(err) => {
                    warn!("could not start {} parser threads, using the global pool: {}", jobs, err);
                    run()
                }
            },
            None => run(),
        }
    }

    /// Take the name (and id) of one entity.
    fn register(&mut self, record: &EntityRecord) -> Result<(), Diagnostic> {
        let key = &record.key;
        if let Err(err) = self.registry.register(key.kind, &key.name) {
            return Err(Diagnostic::error(DiagnosticKind::DuplicateName, err.to_string())
                .at(record.location.clone())
                .with_context("kind", key.kind.as_str())
                .with_context("name", key.name.clone())
                .with_suggestion(suggestions::DUPLICATE_NAME));
        }
        if let Some(id) = record.entity.id() {
            if let Err(err) = self.registry.register_id(key.kind, id, &key.name) {
                self.registry.unregister(key.kind, &key.name);
                return Err(Diagnostic::error(DiagnosticKind::DuplicateId, err.to_string())
                    .at(record.location.with_field(FieldPath::root().key("id")))
                    .with_context("kind", key.kind.as_str())
                    .with_context("id", id.to_string())
                    .with_context("first declared by", err.existing));
            }
        }
        Ok(())
    }
}

impl Default for Loader {
    fn default() -> Self {
        Loader::new(LoadConfig::default())
    }
}

/// Load a workspace with default settings.
pub fn load(name: &str, root: &Path) -> Result<Workspace, LoadError> {
    Loader::default().load(name, root)
}

/// The string `name` the root metadata declares. A missing, unparsable or
/// mistyped declaration is already a diagnostic and never fails the name check.
fn declared_name(built: &[BuiltDocument]) -> Option<&str> {
    built
        .iter()
        .find(|doc| doc.kind == DocumentKind::SystemMetadata)
        .and_then(|doc| doc.declared_name.as_deref())
}

/// Whether `reference` was recorded while building `owner`.
fn owns(owner: &EntityRecord, reference: &Reference) -> bool {
    reference.owner == owner.key
        && reference.location.document == owner.location.document
        && reference.location.field.starts_with(&owner.location.field)
}

/// Sort by document discovery order, then field path. The sort is stable, so
/// diagnostics at the same field keep the order they were found in.
fn order_diagnostics(mut diagnostics: Vec<(usize, Diagnostic)>) -> Vec<Diagnostic> {
    diagnostics.sort_by(|(a_order, a), (b_order, b)| {
        a_order
            .cmp(b_order)
            .then_with(|| a.location.field.cmp(&b.location.field))
    });
    diagnostics.into_iter().map(|(_, d)| d).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entity::EntityKind;
    use crate::test_support::fixtures::{example_workspace, example_workspace_in, replace_in, EXAMPLE_NAME};

    #[test]
    fn test_load_example_is_clean() {
        let (_tmp, root) = example_workspace();
        let ws = load(EXAMPLE_NAME, &root).unwrap();
        assert!(ws.is_clean(), "{:#?}", ws.diagnostics());
        assert_eq!(ws.name(), EXAMPLE_NAME);
        assert!(ws.system().is_some());
        assert!(!ws.objects(EntityKind::Ecu).is_empty());
    }

    #[test]
    fn test_sequential_and_parallel_agree() {
        let (_tmp, root) = example_workspace();
        let parallel = Loader::new(LoadConfig {
            parallel: Some(true),
            jobs: Some(2),
        })
        .load(EXAMPLE_NAME, &root)
        .unwrap();
        let sequential = Loader::new(LoadConfig {
            parallel: Some(false),
            jobs: None,
        })
        .load(EXAMPLE_NAME, &root)
        .unwrap();

        let keys = |ws: &Workspace| ws.entities().map(|r| r.key.clone()).collect::<Vec<EntityKey>>();
        assert_eq!(keys(&parallel), keys(&sequential));
        assert_eq!(parallel.graph().edge_count(), sequential.graph().edge_count());
    }

    #[test]
    fn test_state_and_registry_reset() {
        let (_tmp, root) = example_workspace();
        let mut loader = Loader::default();
        assert_eq!(loader.state(), LoadState::Loading);

        loader.load(EXAMPLE_NAME, &root).unwrap();
        assert_eq!(loader.state(), LoadState::Loaded);
        let registered = loader.registry().len();

        // A second load of the same tree must not see its own names as duplicates.
        let again = loader.load(EXAMPLE_NAME, &root).unwrap();
        assert!(again.is_clean());
        assert_eq!(loader.registry().len(), registered);

        assert!(loader.load("other_name", &root).is_err());
        assert_eq!(loader.state(), LoadState::FatalAborted);
    }

    #[test]
    fn test_name_checked_only_when_declared() {
        let (_tmp, root) = example_workspace_in("renamed");
        let metadata = root.join("system_metadata.flync.yaml");
        assert!(load(EXAMPLE_NAME, &root).unwrap().is_clean());

        replace_in(&metadata, "name: flync_example", "name: [flync_example]");
        let ws = load(EXAMPLE_NAME, &root).unwrap();
        assert_eq!(ws.name(), EXAMPLE_NAME);
        assert_eq!(ws.errors().count(), 1);

        std::fs::remove_file(&metadata).unwrap();
        let mut loader = Loader::default();
        let ws = loader.load(EXAMPLE_NAME, &root).unwrap();
        assert!(ws.system().is_none());
        assert_eq!(loader.state(), LoadState::Loaded);
    }

    #[test]
    fn test_owned_references() {
        let record = EntityRecord::new(
            crate::core::model::Entity::Ecu(crate::core::model::Ecu {
                name: "e".to_string(),
                metadata: None,
            }),
            Location::new("a.flync.yaml", FieldPath::root().key("ports").index(1)),
        );
        let inside = Reference::by_name(
            record.key.clone(),
            EntityKind::EcuPort,
            "x",
            Location::new("a.flync.yaml", FieldPath::root().key("ports").index(1).key("x")),
        );
        let sibling = Reference::by_name(
            record.key.clone(),
            EntityKind::EcuPort,
            "x",
            Location::new("a.flync.yaml", FieldPath::root().key("ports").index(2).key("x")),
        );
        assert!(owns(&record, &inside));
        assert!(!owns(&record, &sibling));
    }
}
