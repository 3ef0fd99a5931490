//! Document index - enumerates a workspace against the directory contract.
//!
//! Scanning never reads document content. It decides which documents exist, which are
//! missing and which files do not belong, and hands back an ordered list the loader
//! parses. Only a missing root or a missing mandatory directory aborts the scan.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::contract::{
    is_document_name, is_misnamed_document, Cardinality, Contract, DocumentKind, DocumentSlot,
    PathRule, DOCUMENT_EXTENSION, ECUS_DIR,
};
use crate::core::location::Location;
use crate::util::diagnostic::{suggestions, Diagnostic, DiagnosticKind, LoadError};
use crate::util::fs::{glob_files, relative_path, sorted_entries};

/// Whether an indexed document exists on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Present,
    Missing,
}

/// One position in the index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Discovery order, shared with findings
    pub order: usize,
    pub kind: DocumentKind,
    /// Path relative to the workspace root
    pub relative: PathBuf,
    pub absolute: PathBuf,
    /// ECU directory the document belongs to
    pub ecu: Option<String>,
    pub status: DocumentStatus,
}

impl IndexEntry {
    pub fn is_present(&self) -> bool {
        self.status == DocumentStatus::Present
    }
}

/// A recoverable problem found while scanning, positioned in discovery order.
#[derive(Debug, Clone)]
pub struct Finding {
    pub order: usize,
    pub diagnostic: Diagnostic,
}

/// The ordered set of documents making up one workspace.
#[derive(Debug, Clone)]
pub struct DocumentIndex {
    root: PathBuf,
    entries: Vec<IndexEntry>,
    findings: Vec<Finding>,
    ecus: Vec<String>,
}

impl DocumentIndex {
    /// Scan `root` against `contract`.
    ///
    /// Root-level fixed documents come first, then every ECU directory in name order,
    /// then root-level globbed documents.
    pub fn scan(root: &Path, contract: &Contract) -> Result<DocumentIndex, LoadError> {
        if !root.is_dir() {
            return Err(LoadError::RootNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut scan = Scanner {
            root,
            index: DocumentIndex {
                root: root.to_path_buf(),
                entries: Vec::new(),
                findings: Vec::new(),
                ecus: Vec::new(),
            },
            next: 0,
        };

        let (root_files, root_globs): (Vec<_>, Vec<_>) = contract
            .root_slots()
            .partition(|slot| matches!(slot.rule, PathRule::File(_)));

        for slot in &root_files {
            scan.slot(root, slot, None)?;
        }
        let root_reserved: Vec<&str> = root_files
            .iter()
            .filter_map(|slot| match slot.rule {
                PathRule::File(name) => Some(name),
                PathRule::Glob { .. } => None,
            })
            .collect();
        scan.strays(root, Claim::Names(&root_reserved))?;

        let ecus_dir = root.join(ECUS_DIR);
        if !ecus_dir.is_dir() {
            return Err(LoadError::DirectoryNotFound { path: ecus_dir });
        }
        scan.strays(&ecus_dir, Claim::Names(&[]))?;

        for ecu_dir in list_dir(&ecus_dir)?.into_iter().filter(|p| p.is_dir()) {
            let ecu = file_name(&ecu_dir);
            debug!("indexing ECU `{}`", ecu);
            scan.index.ecus.push(ecu.clone());

            for slot in contract.ecu_slots() {
                scan.slot(&ecu_dir, slot, Some(&ecu))?;
            }
            let reserved: Vec<&str> = contract.ecu_file_names().collect();
            scan.strays(&ecu_dir, Claim::Names(&reserved))?;
        }

        for slot in &root_globs {
            scan.slot(root, slot, None)?;
        }

        Ok(scan.index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every entry, in discovery order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Entries whose document exists, in discovery order.
    pub fn present(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.iter().filter(|e| e.is_present())
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// ECU directory names, sorted.
    pub fn ecus(&self) -> &[String] {
        &self.ecus
    }

    /// The entry for one ECU's document of `kind`, for single-document slots.
    pub fn ecu_document(&self, ecu: &str, kind: DocumentKind) -> Option<&IndexEntry> {
        self.entries
            .iter()
            .find(|e| e.kind == kind && e.ecu.as_deref() == Some(ecu))
    }
}

struct Scanner<'a> {
    root: &'a Path,
    index: DocumentIndex,
    next: usize,
}

impl Scanner<'_> {
    fn order(&mut self) -> usize {
        let order = self.next;
        self.next += 1;
        order
    }

    fn relative(&self, path: &Path) -> PathBuf {
        relative_path(self.root, path)
    }

    fn entry(&mut self, kind: DocumentKind, path: PathBuf, ecu: Option<&str>, status: DocumentStatus) -> usize {
        let order = self.order();
        self.index.entries.push(IndexEntry {
            order,
            kind,
            relative: self.relative(&path),
            absolute: path,
            ecu: ecu.map(str::to_string),
            status,
        });
        order
    }

    fn finding(&mut self, order: usize, diagnostic: Diagnostic) {
        self.index.findings.push(Finding { order, diagnostic });
    }

    fn slot(&mut self, base: &Path, slot: &DocumentSlot, ecu: Option<&str>) -> Result<(), LoadError> {
        match slot.rule {
            PathRule::File(name) => {
                let path = base.join(name);
                if path.is_file() {
                    self.entry(slot.kind, path, ecu, DocumentStatus::Present);
                } else {
                    let location = Location::document(self.relative(&path));
                    let order = self.entry(slot.kind, path, ecu, DocumentStatus::Missing);
                    self.finding(
                        order,
                        Diagnostic::error(
                            DiagnosticKind::MissingDocument,
                            format!("required {} document is missing", slot.kind),
                        )
                        .at(location),
                    );
                }
            }
            PathRule::Glob { dir } => {
                let dir_path = base.join(dir);
                if !dir_path.is_dir() {
                    if slot.dir_required {
                        return Err(LoadError::DirectoryNotFound { path: dir_path });
                    }
                    return Ok(());
                }

                let pattern = format!("*{}", DOCUMENT_EXTENSION);
                let files: Vec<PathBuf> = glob_files(&dir_path, &pattern)
                    .map_err(|err| LoadError::Io {
                        path: dir_path.clone(),
                        source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
                    })?
                    .into_iter()
                    .filter(|p| is_document_name(&file_name(p)))
                    .collect();

                if files.is_empty() && slot.cardinality == Cardinality::OneOrMore {
                    let order = self.order();
                    let location = Location::document(self.relative(&dir_path));
                    self.finding(
                        order,
                        Diagnostic::error(
                            DiagnosticKind::MissingDocument,
                            format!("at least one {} document is required", slot.kind),
                        )
                        .at(location),
                    );
                }
                for file in files {
                    self.entry(slot.kind, file, ecu, DocumentStatus::Present);
                }
                self.strays(&dir_path, Claim::All)?;
            }
        }
        Ok(())
    }

    /// Report files in `dir` that look like documents but are not part of the contract.
    fn strays(&mut self, dir: &Path, claim: Claim<'_>) -> Result<(), LoadError> {
        for path in list_dir(dir)?.into_iter().filter(|p| p.is_file()) {
            let name = file_name(&path);
            let location = Location::document(self.relative(&path));
            if is_misnamed_document(&name) {
                let order = self.order();
                self.finding(
                    order,
                    Diagnostic::error(
                        DiagnosticKind::InvalidFormat,
                        format!("`{}` is not a workspace document", name),
                    )
                    .at(location)
                    .with_context("expected suffix", DOCUMENT_EXTENSION)
                    .with_suggestion(suggestions::DOCUMENT_EXTENSION),
                );
            } else if is_document_name(&name) && !claim.claims(&name) {
                let order = self.order();
                self.finding(
                    order,
                    Diagnostic::warning(
                        DiagnosticKind::UnexpectedDocument,
                        format!("`{}` is not part of the workspace layout and was ignored", name),
                    )
                    .at(location),
                );
            } else {
                debug!("ignoring {}", path.display());
            }
        }
        Ok(())
    }
}

/// Which `*.flync.yaml` names a directory accounts for.
#[derive(Clone, Copy)]
enum Claim<'a> {
    /// Only these fixed names
    Names(&'a [&'a str]),
    /// Every document name (glob directories)
    All,
}

impl Claim<'_> {
    fn claims(&self, name: &str) -> bool {
        match self {
            Claim::Names(names) => names.contains(&name),
            Claim::All => true,
        }
    }
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    sorted_entries(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
