use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::api::{Backend, ProfileUpdate};
use crate::error::{ClientError, ValidationError};
use crate::model::Role;
use crate::session::{Session, SessionStore};
use crate::validation::require_text;

/// Sign-in, sign-out and profile changes, all checked by the backend.
#[derive(Clone)]
pub struct AccountService {
    backend: Arc<dyn Backend>,
    store: SessionStore,
}

impl AccountService {
    pub fn new(backend: Arc<dyn Backend>, store: SessionStore) -> Self {
        Self { backend, store }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub async fn login(&self, user_id: &str, password: &str) -> Result<Session> {
        require_text("user id", user_id)?;
        require_text("password", password)?;
        let reply = self
            .backend
            .account(&ProfileUpdate::verify(user_id.trim(), password))
            .await?;
        if !reply.success {
            return Err(ClientError::Rejected(
                reply
                    .message
                    .unwrap_or_else(|| "invalid credentials".to_string()),
            )
            .into());
        }
        let role = reply.role.unwrap_or_else(|| {
            warn!(user_id, "backend did not report a role, assuming employee");
            Role::Employee
        });
        let session = Session::new(user_id.trim(), role, reply.name);
        self.store.save(&session)?;
        info!(user_id = session.user_id.as_str(), role = %session.role, "signed in");
        Ok(session)
    }

    pub fn current(&self) -> Result<Option<Session>> {
        self.store.load()
    }

    pub fn require(&self) -> Result<Session> {
        self.store
            .load()?
            .ok_or_else(|| anyhow!("Not signed in. Run `teamdesk login <user-id>` first"))
    }

    pub fn logout(&self) -> Result<bool> {
        self.store.clear()
    }

    pub async fn rename(
        &self,
        session: &Session,
        current_password: &str,
        name: &str,
    ) -> Result<Session> {
        require_text("name", name)?;
        let update = ProfileUpdate {
            name: Some(name.trim().to_string()),
            ..ProfileUpdate::verify(session.user_id.as_str(), current_password)
        };
        let reply = self.backend.account(&update).await?;
        if !reply.success {
            return Err(ClientError::Rejected(
                reply.message.unwrap_or_else(|| "profile update failed".to_string()),
            )
            .into());
        }
        let mut updated = session.clone();
        updated.name = reply.name.or_else(|| Some(name.trim().to_string()));
        self.store.save(&updated)?;
        Ok(updated)
    }

    pub async fn change_password(
        &self,
        session: &Session,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        require_text("new password", new_password)?;
        if new_password == current_password {
            return Err(ValidationError::Invalid {
                field: "new password",
                reason: "must differ from the current password".to_string(),
            }
            .into());
        }
        let update = ProfileUpdate {
            new_password: Some(new_password.to_string()),
            ..ProfileUpdate::verify(session.user_id.as_str(), current_password)
        };
        let reply = self.backend.account(&update).await?;
        if !reply.success {
            return Err(ClientError::Rejected(
                reply.message.unwrap_or_else(|| "password change failed".to_string()),
            )
            .into());
        }
        info!(user_id = session.user_id.as_str(), "password changed");
        Ok(())
    }
}
