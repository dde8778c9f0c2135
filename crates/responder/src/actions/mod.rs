//! Recovery Action Registry
//!
//! Maps the `recovery_action` annotation of an alert to the playbook that
//! remediates it. Built once at startup and shared read-only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Playbook file name, relative to the configured playbook directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Playbook(String);

impl Playbook {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self(file_name.into())
    }

    pub fn file_name(&self) -> &str {
        &self.0
    }

    pub fn path_in(&self, playbook_dir: &Path) -> std::path::PathBuf {
        playbook_dir.join(&self.0)
    }
}

impl fmt::Display for Playbook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Playbook>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The recovery actions shipped with the service.
    pub fn builtin() -> Self {
        Self::new()
            .with_action("restart_nginx", "restart-nginx.yml")
            .with_action("optimize_system", "system-recovery.yml")
            .with_action("cleanup_memory", "memory-cleanup.yml")
            .with_action("disk_cleanup", "disk-cleanup.yml")
    }

    pub fn with_action(mut self, action_id: impl Into<String>, playbook: impl Into<String>) -> Self {
        self.actions.insert(action_id.into(), Playbook::new(playbook));
        self
    }

    pub fn resolve(&self, action_id: &str) -> Option<&Playbook> {
        if action_id.is_empty() {
            return None;
        }
        self.actions.get(action_id)
    }

    /// Registered action ids, sorted.
    pub fn action_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
