use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;

use crate::account::AccountService;

/// Shared login state. Clones observe the same user; only `login` and
/// `logout` write it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    user_id: Arc<Mutex<Option<String>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<String>> {
        self.user_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn user_id(&self) -> Option<String> {
        self.slot().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.slot().is_some()
    }

    /// Stores the user id on success. A failed login leaves any previous
    /// session untouched.
    pub fn login(&self, account: &dyn AccountService, email: &str, password: &str) -> Result<String> {
        let user_id = account.login(email.trim(), password)?;
        *self.slot() = Some(user_id.clone());
        Ok(user_id)
    }

    pub fn logout(&self) {
        *self.slot() = None;
    }

    pub fn signup(
        &self,
        account: &dyn AccountService,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<()> {
        account.register(email.trim(), password, full_name.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::Session;
    use crate::test_support::FakeAccountService;

    #[test]
    fn login_is_visible_through_clones() -> anyhow::Result<()> {
        let account = FakeAccountService::default();
        let session = Session::new();
        let observer = session.clone();
        assert!(!observer.is_logged_in());

        let user_id = session.login(&account, " me@example.com ", "secret")?;
        assert_eq!(user_id, "user-1");
        assert_eq!(observer.user_id().as_deref(), Some("user-1"));
        assert_eq!(
            account.logins(),
            vec![("me@example.com".to_string(), "secret".to_string())]
        );

        observer.logout();
        assert_eq!(session.user_id(), None);
        Ok(())
    }

    #[test]
    fn failed_login_keeps_existing_session() -> anyhow::Result<()> {
        let account = FakeAccountService::default();
        let session = Session::new();
        session.login(&account, "me@example.com", "secret")?;

        account.fail_with("Invalid credentials");
        let err = session
            .login(&account, "me@example.com", "wrong")
            .err()
            .map(|err| err.to_string());
        assert_eq!(err.as_deref(), Some("Invalid credentials"));
        assert_eq!(session.user_id().as_deref(), Some("user-1"));
        Ok(())
    }

    #[test]
    fn signup_does_not_log_in() -> anyhow::Result<()> {
        let account = FakeAccountService::default();
        let session = Session::new();
        session.signup(&account, "new@example.com", "pw", " New User ")?;
        assert!(!session.is_logged_in());
        assert_eq!(account.registrations(), vec!["new@example.com".to_string()]);
        Ok(())
    }
}
