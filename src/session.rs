use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

/// Who is signed in; stamped onto every submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct UserAccount {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub user_id: String,
}

/// Known accounts. Plain comparison only, this is a gate and not security.
#[derive(Debug, Clone)]
pub struct UserDirectory {
    accounts: Vec<UserAccount>,
}

impl UserDirectory {
    pub fn new(accounts: Vec<UserAccount>) -> Self {
        Self { accounts }
    }

    /// The demo participant and admin accounts
    pub fn builtin() -> Self {
        Self::new(vec![
            UserAccount {
                username: "user".into(),
                password: "sleepisgood".into(),
                role: Role::User,
                user_id: "USR001".into(),
            },
            UserAccount {
                username: "admin".into(),
                password: "sleepisgood".into(),
                role: Role::Admin,
                user_id: "ADM001".into(),
            },
        ])
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Result<SessionIdentity> {
        if username.is_empty() || password.is_empty() {
            return Err(Error::InvalidInput(
                "Please enter both username and password".into(),
            ));
        }

        let account = self
            .accounts
            .iter()
            .find(|a| a.username == username && a.password == password)
            .ok_or(Error::InvalidCredentials)?;

        info!(user_id = %account.user_id, role = %account.role, "login");
        Ok(SessionIdentity {
            user_id: account.user_id.clone(),
            role: account.role,
        })
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Explicit holder for the current identity, passed to whoever needs it
#[derive(Debug, Clone, Default)]
pub struct SessionSlot {
    identity: Option<SessionIdentity>,
}

impl SessionSlot {
    pub fn sign_in(&mut self, identity: SessionIdentity) {
        self.identity = Some(identity);
    }

    pub fn sign_out(&mut self) -> Option<SessionIdentity> {
        self.identity.take()
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_authenticate_user() {
        let identity = UserDirectory::builtin()
            .authenticate("user", "sleepisgood")
            .unwrap();
        assert_eq!(identity.user_id, "USR001");
        assert_eq!(identity.role, Role::User);
    }

    #[test]
    fn test_authenticate_admin() {
        let identity = UserDirectory::builtin()
            .authenticate("admin", "sleepisgood")
            .unwrap();
        assert_eq!(identity.role, Role::Admin);
    }

    #[test]
    fn test_authenticate_rejects_empty_fields() {
        let dir = UserDirectory::builtin();
        assert_matches!(dir.authenticate("", "x"), Err(Error::InvalidInput(_)));
        assert_matches!(dir.authenticate("user", ""), Err(Error::InvalidInput(_)));
    }

    #[test]
    fn test_authenticate_rejects_wrong_password() {
        assert_matches!(
            UserDirectory::builtin().authenticate("user", "nope"),
            Err(Error::InvalidCredentials)
        );
    }

    #[test]
    fn test_session_slot_lifecycle() {
        let mut slot = SessionSlot::default();
        assert!(slot.identity().is_none());
        slot.sign_in(SessionIdentity {
            user_id: "USR001".into(),
            role: Role::User,
        });
        assert_eq!(slot.identity().unwrap().user_id, "USR001");
        assert!(slot.sign_out().is_some());
        assert!(slot.identity().is_none());
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::User.to_string(), "user");
    }
}
