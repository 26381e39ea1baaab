//! Persisted list of monitored hosts.
//!
//! The list lives in a JSON document holding an array of strings. Every
//! successful `add` rewrites the whole document before returning, so a host
//! is never reported as added unless it is on disk. Writers in any process
//! serialise on an advisory lock held on a sibling `.lock` file and re-read
//! the document under it, so concurrent adds never drop each other's hosts.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fd_lock::RwLock;
use tracing::{debug, info, warn};

use crate::error::{AddError, StoreError};
use crate::types::Host;

/// Ordered, duplicate-free list of hosts backed by a JSON file
#[derive(Debug)]
pub struct HostRegistry {
    path: PathBuf,
    hosts: Vec<Host>,
}

impl HostRegistry {
    /// Load the host list from `path`
    ///
    /// Creates the document containing only `default_host` when it does not
    /// exist yet. Blank and repeated entries in an existing document are
    /// skipped, keeping the first occurrence.
    pub fn load(path: impl Into<PathBuf>, default_host: &str) -> Result<Self, StoreError> {
        let path = path.into();
        if path.exists() {
            let hosts = read_document(&path)?;
            debug!(path = %path.display(), count = hosts.len(), "Loaded host list");
            return Ok(Self { path, hosts });
        }

        let mut registry = Self { path, hosts: Vec::new() };
        let mut lock = registry.lock()?;
        let _guard = lock.write().map_err(|source| registry.write_err(source))?;

        // another process may have bootstrapped it while we waited
        if registry.path.exists() {
            registry.hosts = read_document(&registry.path)?;
        } else {
            let hosts: Vec<Host> = Host::parse(default_host).into_iter().collect();
            registry.persist(&hosts)?;
            registry.hosts = hosts;
            info!(path = %registry.path.display(), host = default_host, "Initialised host list");
        }
        Ok(registry)
    }

    /// Add a host and persist the updated list
    ///
    /// The stored document is re-read under the lock first, so hosts added
    /// by other handles since `load` are kept and count as duplicates.
    pub fn add(&mut self, candidate: &str) -> Result<Host, AddError> {
        let host = Host::parse(candidate)?;

        let mut lock = self.lock()?;
        let _guard = lock.write().map_err(|source| self.write_err(source))?;

        let mut updated =
            if self.path.exists() { read_document(&self.path)? } else { self.hosts.clone() };
        if updated.contains(&host) {
            self.hosts = updated;
            return Err(AddError::DuplicateHost(host.to_string()));
        }

        updated.push(host.clone());
        self.persist(&updated)?;
        self.hosts = updated;
        info!(host = %host, "Added host");
        Ok(host)
    }

    /// Hosts in insertion order
    pub fn list(&self) -> &[Host] {
        &self.hosts
    }

    pub fn contains(&self, host: &Host) -> bool {
        self.hosts.contains(host)
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_err(&self, source: std::io::Error) -> StoreError {
        StoreError::Write { path: self.path.clone(), source }
    }

    /// Advisory lock shared by every handle on this document
    fn lock(&self) -> Result<RwLock<File>, StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.write_err(source))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(self.sibling("lock"))
            .map_err(|source| self.write_err(source))?;
        Ok(RwLock::new(file))
    }

    /// `hosts.json` -> `hosts.json.<suffix>`
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(&format!("{}.tmp", std::process::id()))
    }

    /// Write to a per-process temp file, then rename it over the document.
    /// Callers hold the lock.
    fn persist(&self, hosts: &[Host]) -> Result<(), StoreError> {
        let document = serde_json::to_string_pretty(hosts)
            .map_err(|source| StoreError::Serialize { path: self.path.clone(), source })?;

        let tmp = self.temp_path();
        fs::write(&tmp, document).map_err(|source| self.write_err(source))?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            self.write_err(source)
        })
    }
}

fn read_document(path: &Path) -> Result<Vec<Host>, StoreError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| StoreError::Read { path: path.to_path_buf(), source })?;
    let entries: Vec<String> = serde_json::from_str(&raw)
        .map_err(|source| StoreError::Parse { path: path.to_path_buf(), source })?;

    let mut seen = HashSet::new();
    let mut hosts = Vec::with_capacity(entries.len());
    for entry in entries {
        let Ok(host) = Host::parse(&entry) else {
            warn!(path = %path.display(), "Skipping blank host entry");
            continue;
        };
        if !seen.insert(host.clone()) {
            warn!(host = %host, "Skipping duplicate host entry");
            continue;
        }
        hosts.push(host);
    }
    Ok(hosts)
}
