//! Workspaces the signed-in user belongs to, and which one is current.

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkspaceRole {
    Owner,
    Admin,
    Editor,
    Member,
}

impl fmt::Display for WorkspaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkspaceRole::Owner => "owner",
            WorkspaceRole::Admin => "admin",
            WorkspaceRole::Editor => "editor",
            WorkspaceRole::Member => "member",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub role: WorkspaceRole,
    pub member_count: u32,
    pub created_at: NaiveDate,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkspaceError {
    #[error("A workspace with id '{0}' already exists")]
    DuplicateId(String),
}

struct Inner {
    workspaces: Vec<Workspace>,
    current: Option<usize>,
}

pub struct WorkspaceRegistry {
    inner: RwLock<Inner>,
}

impl Default for WorkspaceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl WorkspaceRegistry {
    /// The first workspace, if any, starts out current.
    pub fn new(workspaces: Vec<Workspace>) -> Self {
        let current = if workspaces.is_empty() { None } else { Some(0) };
        Self {
            inner: RwLock::new(Inner {
                workspaces,
                current,
            }),
        }
    }

    pub fn with_defaults() -> Self {
        let seed = [
            ("1", "My Personal Workspace", "my-personal-workspace", WorkspaceRole::Owner, 1, (2024, 1, 15)),
            ("2", "Acme Corporation", "acme-corp", WorkspaceRole::Admin, 12, (2024, 2, 1)),
            ("3", "Startup Inc", "startup-inc", WorkspaceRole::Editor, 5, (2024, 3, 10)),
            ("4", "Design Agency", "design-agency", WorkspaceRole::Member, 8, (2024, 3, 20)),
        ];

        Self::new(
            seed.into_iter()
                .map(|(id, name, slug, role, member_count, (y, m, d))| Workspace {
                    id: id.to_string(),
                    name: name.to_string(),
                    slug: slug.to_string(),
                    role,
                    member_count,
                    created_at: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
                })
                .collect(),
        )
    }

    pub fn list(&self) -> Vec<Workspace> {
        self.inner.read().workspaces.clone()
    }

    pub fn current(&self) -> Option<Workspace> {
        let inner = self.inner.read();
        inner.current.and_then(|i| inner.workspaces.get(i).cloned())
    }

    pub fn add(&self, workspace: Workspace) -> Result<(), WorkspaceError> {
        let mut inner = self.inner.write();
        if inner.workspaces.iter().any(|w| w.id == workspace.id) {
            return Err(WorkspaceError::DuplicateId(workspace.id));
        }
        inner.workspaces.push(workspace);
        if inner.current.is_none() {
            inner.current = Some(0);
        }
        Ok(())
    }

    /// Make `id` current. Unknown ids leave the selection alone and return `None`.
    pub fn set_current(&self, id: &str) -> Option<Workspace> {
        let mut inner = self.inner.write();
        let index = inner.workspaces.iter().position(|w| w.id == id)?;
        inner.current = Some(index);
        inner.workspaces.get(index).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let registry = WorkspaceRegistry::with_defaults();
        assert_eq!(registry.list().len(), 4);

        let current = registry.current().unwrap();
        assert_eq!(current.slug, "my-personal-workspace");
        assert_eq!(current.role, WorkspaceRole::Owner);
    }

    #[test]
    fn test_set_current() {
        let registry = WorkspaceRegistry::with_defaults();

        let acme = registry.set_current("2").unwrap();
        assert_eq!(acme.name, "Acme Corporation");
        assert_eq!(registry.current().unwrap().id, "2");

        assert!(registry.set_current("99").is_none());
        assert_eq!(registry.current().unwrap().id, "2");
    }

    #[test]
    fn test_add() {
        let registry = WorkspaceRegistry::new(Vec::new());
        assert!(registry.current().is_none());

        let workspace = Workspace {
            id: "w1".to_string(),
            name: "Side Project".to_string(),
            slug: "side-project".to_string(),
            role: WorkspaceRole::Owner,
            member_count: 1,
            created_at: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        registry.add(workspace.clone()).unwrap();
        assert_eq!(registry.current(), Some(workspace.clone()));
        assert_eq!(
            registry.add(workspace),
            Err(WorkspaceError::DuplicateId("w1".to_string()))
        );
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(WorkspaceRole::Editor).unwrap();
        assert_eq!(json, "editor");
        assert_eq!(WorkspaceRole::Admin.to_string(), "admin");
    }
}
