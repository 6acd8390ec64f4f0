//! Who is signed in and what they may do.
//!
//! A [`Session`] is created by a successful credential check, written to the
//! data directory so one-shot commands can reuse it, and removed on logout.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ValidationError;
use crate::model::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, role: Role, name: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role,
            name,
            started_at: Utc::now(),
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_role(self.role)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.user_id)
    }

    /// Fail with [`ValidationError::NotPermitted`] unless `allowed` holds.
    pub fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), ValidationError> {
        if allowed {
            Ok(())
        } else {
            Err(ValidationError::NotPermitted {
                role: self.role.to_string(),
                action,
            })
        }
    }
}

/// Permissions shared by every view; the role only switches flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub assign_tasks: bool,
    pub manage_projects: bool,
    pub manage_project_tasks: bool,
    pub view_all_projects: bool,
    pub view_workload: bool,
}

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Manager => Self {
                assign_tasks: true,
                manage_projects: true,
                manage_project_tasks: true,
                view_all_projects: true,
                view_workload: true,
            },
            Role::TeamLeader => Self {
                assign_tasks: false,
                manage_projects: false,
                manage_project_tasks: true,
                view_all_projects: false,
                view_workload: false,
            },
            Role::Employee => Self {
                assign_tasks: false,
                manage_projects: false,
                manage_project_tasks: false,
                view_all_projects: false,
                view_workload: false,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file {}", self.path.display()))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("Session file {} is corrupt", self.path.display()))?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write session file {}", self.path.display()))?;
        info!(user_id = session.user_id.as_str(), role = %session.role, "session saved");
        Ok(())
    }

    /// Remove the stored session. Returns whether one existed.
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove session file {}", self.path.display()))?;
        info!("session cleared");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn save_load_clear_lifecycle() {
        let temp = tempdir().unwrap();
        let store = SessionStore::new(temp.path().join("session.json"));
        assert_eq!(store.load().unwrap(), None);

        let session = Session::new("7", Role::TeamLeader, Some("Sam".into()));
        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap(), Some(session));

        assert!(store.clear().unwrap());
        assert!(!store.clear().unwrap());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        let err = SessionStore::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn employees_cannot_manage_projects() {
        let session = Session::new("3", Role::Employee, None);
        let err = session
            .ensure(session.capabilities().manage_projects, "create projects")
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::NotPermitted {
                role: "employee".into(),
                action: "create projects"
            }
        );
        assert!(Capabilities::for_role(Role::Manager).view_workload);
        assert!(Capabilities::for_role(Role::TeamLeader).manage_project_tasks);
    }
}
