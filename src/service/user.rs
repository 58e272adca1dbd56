//! User service: cached user lookups plus login sessions.
//!
//! Reads resolve in this order:
//!
//! 1. the [`SessionCache`] of logged-in users (by-id lookups only)
//! 2. the TTL/LRU cache set (`by_id`, `by_email`, `ALL`)
//! 3. the [`UserRepository`]
//!
//! Absent users are cached as `None`, so repeated lookups of an unknown id do
//! not hit persistence until the entry expires or a write invalidates it.

use super::check_id;
use crate::cache_set::CacheSet;
use crate::config::{CacheSettings, UserCacheSettings};
use crate::entity::{Entity, NewUser, User, UserPatch};
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::manager::CacheManager;
use crate::observability::CacheReport;
use crate::repository::{PasswordHasher, UserRepository};
use crate::session::SessionCache;
use crate::strategy::InvalidationPolicy;
use std::sync::Arc;

/// The user service's cache set.
pub struct UserCaches {
    by_id: CacheManager<i64, Option<User>>,
    by_email: CacheManager<String, Option<User>>,
    all: CacheManager<String, Vec<User>>,
    sessions: SessionCache<i64, User>,
}

impl UserCaches {
    pub fn new(settings: &UserCacheSettings) -> Self {
        UserCaches {
            by_id: CacheManager::new("User Cache", settings.by_id),
            by_email: CacheManager::new("Email Cache", settings.by_email),
            all: CacheManager::new("All Users Cache", settings.all),
            sessions: SessionCache::new(),
        }
    }
}

impl CacheSet for UserCaches {
    /// Sessions are left alone: they end on logout or deletion only.
    fn invalidate_all(&self) {
        self.by_id.invalidate_all();
        self.by_email.invalidate_all();
        self.all.invalidate_all();
    }

    fn sweep(&self) -> usize {
        self.by_id.sweep() + self.by_email.sweep() + self.all.sweep()
    }

    fn report(&self) -> CacheReport {
        CacheReport::new()
            .with_cache(self.by_id.stats())
            .with_cache(self.by_email.stats())
            .with_cache(self.all.stats())
            .with_extra("Active Sessions", self.sessions.len(), "users")
    }
}

/// User operations over a repository and a password hasher.
pub struct UserService<R, H> {
    repository: Arc<R>,
    hasher: H,
    caches: UserCaches,
    policy: InvalidationPolicy,
}

impl<R, H> UserService<R, H>
where
    R: UserRepository,
    H: PasswordHasher,
{
    pub fn new(repository: Arc<R>, hasher: H, settings: &CacheSettings) -> Self {
        UserService {
            repository,
            hasher,
            caches: UserCaches::new(&settings.user),
            policy: settings.invalidation,
        }
    }

    /// Register a new user.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a blank email or password
    /// - `Error::Duplicate` if the email is already registered
    /// - `Error::RepositoryError` if persistence fails
    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        let email = Self::check_email(&user.email)?;
        if self.repository.email_exists(&email).await? {
            return Err(Error::duplicate(User::NAME, "email", &email));
        }

        let password_hash = self.hasher.hash(&user.password)?;
        let created = self
            .repository
            .create_user(NewUser { email, ..user }, password_hash)
            .await?;

        self.invalidate_after_write(created.id, &[created.email.as_str()]);
        info!("Created user {} ({})", created.id, created.email);
        Ok(created)
    }

    /// Apply `patch` to an existing user. A logged-in user's session
    /// snapshot is replaced with the saved record.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id or a blank email
    /// - `Error::NotFound` if the user does not exist
    /// - `Error::Duplicate` if the new email belongs to another user
    /// - `Error::RepositoryError` if persistence fails
    pub async fn update_user(&self, id: i64, patch: UserPatch) -> Result<User> {
        check_id::<User>(id)?;
        let mut user = self
            .repository
            .fetch_user(id)
            .await?
            .ok_or_else(|| Error::not_found(User::NAME, id))?;
        let old_email = user.email.clone();

        if let Some(email) = patch.email {
            let email = Self::check_email(&email)?;
            if email != old_email && self.repository.email_exists(&email).await? {
                return Err(Error::duplicate(User::NAME, "email", &email));
            }
            user.email = email;
        }
        if let Some(password) = patch.password {
            user.password_hash = self.hasher.hash(&password)?;
        }
        if let Some(firstname) = patch.firstname {
            user.firstname = firstname;
        }
        if let Some(lastname) = patch.lastname {
            user.lastname = lastname;
        }
        if let Some(phone) = patch.phone {
            user.phone = Some(phone);
        }
        if let Some(role) = patch.role {
            user.role = role;
        }

        let saved = self.repository.save_user(&user).await?;
        self.invalidate_after_write(id, &[old_email.as_str(), saved.email.as_str()]);
        self.caches.sessions.refresh(&id, saved.clone());
        info!("Updated user {}", id);
        Ok(saved)
    }

    /// Delete a user and end their session.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id
    /// - `Error::NotFound` if the user does not exist
    /// - `Error::RepositoryError` if persistence fails
    pub async fn delete_user(&self, id: i64) -> Result<()> {
        check_id::<User>(id)?;
        let user = self
            .repository
            .fetch_user(id)
            .await?
            .ok_or_else(|| Error::not_found(User::NAME, id))?;

        if !self.repository.remove_user(id).await? {
            return Err(Error::not_found(User::NAME, id));
        }

        self.invalidate_after_write(id, &[user.email.as_str()]);
        self.caches.sessions.deactivate(&id);
        info!("Deleted user {}", id);
        Ok(())
    }

    /// Look up a user, preferring the active session snapshot.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id
    /// - `Error::NotFound` if the user does not exist
    /// - `Error::RepositoryError` if persistence fails
    pub async fn get_user_by_id(&self, id: i64) -> Result<User> {
        check_id::<User>(id)?;
        if let Some(user) = self.caches.sessions.get_active(&id) {
            debug!("✓ User {} served from active session", id);
            return Ok(user);
        }

        self.caches
            .by_id
            .get(id, || self.repository.fetch_user(id))
            .await?
            .ok_or_else(|| Error::not_found(User::NAME, id))
    }

    /// # Errors
    ///
    /// - `Error::NotFound` if no user has this email
    /// - `Error::RepositoryError` if persistence fails
    pub async fn get_user_by_email(&self, email: &str) -> Result<User> {
        let email = email.trim();
        self.caches
            .by_email
            .get(email.to_string(), || self.repository.fetch_user_by_email(email))
            .await?
            .ok_or_else(|| Error::not_found(User::NAME, email))
    }

    /// # Errors
    ///
    /// Returns `Error::RepositoryError` if persistence fails
    pub async fn get_all_users(&self) -> Result<Vec<User>> {
        self.caches
            .all
            .get(CacheKeyBuilder::all(), || self.repository.fetch_all_users())
            .await
    }

    /// Check credentials and start a session.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCredentials` for an unknown email or a wrong password
    /// - `Error::RepositoryError` if persistence fails
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let user = match self.get_user_by_email(email).await {
            Ok(user) => user,
            Err(e) if e.is_not_found() => return Err(Error::InvalidCredentials),
            Err(e) => return Err(e),
        };
        if !self.hasher.verify(password, &user.password_hash) {
            warn!("Failed login for {}", email.trim());
            return Err(Error::InvalidCredentials);
        }

        self.caches.sessions.activate(user.id, user.clone());
        info!("User {} logged in", user.id);
        Ok(user)
    }

    /// End a session. Returns false if the user was not logged in.
    pub fn logout(&self, id: i64) -> bool {
        let ended = self.caches.sessions.deactivate(&id).is_some();
        if ended {
            info!("User {} logged out", id);
        }
        ended
    }

    /// The session snapshot for a logged-in user.
    pub fn get_active_user(&self, id: i64) -> Option<User> {
        self.caches.sessions.get_active(&id)
    }

    pub fn active_session_count(&self) -> usize {
        self.caches.sessions.len()
    }

    /// Flush every user cache. Active sessions survive.
    pub fn invalidate_all_caches(&self) {
        warn!("Flushing all user caches");
        self.caches.invalidate_all();
    }

    pub fn sweep_caches(&self) -> usize {
        self.caches.sweep()
    }

    pub fn cache_stats(&self) -> CacheReport {
        let report = self.caches.report();
        report.log();
        report
    }

    fn check_email(email: &str) -> Result<String> {
        let email = email.trim();
        if email.is_empty() {
            return Err(Error::InvalidArgument("Email cannot be empty".to_string()));
        }
        Ok(email.to_string())
    }

    fn invalidate_after_write(&self, id: i64, emails: &[&str]) {
        match self.policy {
            InvalidationPolicy::Coarse => self.caches.invalidate_all(),
            InvalidationPolicy::Targeted => {
                self.caches.by_id.invalidate(&id);
                for email in emails {
                    self.caches.by_email.invalidate(&email.to_string());
                }
                self.caches.all.invalidate_all();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::UserRole;
    use crate::repository::{InMemoryRepository, PlaintextHasher};

    fn service(
        policy: InvalidationPolicy,
    ) -> (Arc<InMemoryRepository>, UserService<InMemoryRepository, PlaintextHasher>) {
        let repo = Arc::new(InMemoryRepository::new());
        let settings = CacheSettings::default().with_invalidation(policy);
        let service = UserService::new(Arc::clone(&repo), PlaintextHasher, &settings);
        (repo, service)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            firstname: "Ada".to_string(),
            lastname: "Lovelace".to_string(),
            phone: None,
            role: UserRole::Customer,
            email: email.to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_get_user_by_id_is_cached() {
        let (repo, service) = service(InvalidationPolicy::Coarse);
        let user = service.create_user(new_user("ada@example.com")).await.unwrap();

        let first = service.get_user_by_id(user.id).await.unwrap();
        let second = service.get_user_by_id(user.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(repo.call_count("fetch_user"), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_is_negatively_cached() {
        let (repo, service) = service(InvalidationPolicy::Coarse);

        for _ in 0..2 {
            let err = service.get_user_by_id(404).await.unwrap_err();
            assert_eq!(err, Error::not_found("User", 404));
        }
        assert_eq!(repo.call_count("fetch_user"), 1);
    }

    #[tokio::test]
    async fn test_create_evicts_negative_entry() {
        let (_repo, service) = service(InvalidationPolicy::Targeted);
        assert!(service.get_user_by_email("new@example.com").await.is_err());

        service.create_user(new_user("new@example.com")).await.unwrap();

        assert!(service.get_user_by_email("new@example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_non_positive_id_rejected() {
        let (repo, service) = service(InvalidationPolicy::Coarse);

        let err = service.get_user_by_id(0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(repo.call_count("fetch_user"), 0);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let (_repo, service) = service(InvalidationPolicy::Coarse);
        service.create_user(new_user("ada@example.com")).await.unwrap();

        let err = service
            .create_user(new_user("ada@example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, Error::duplicate("User", "email", "ada@example.com"));
    }

    #[tokio::test]
    async fn test_login_and_session_priority() {
        let (repo, service) = service(InvalidationPolicy::Coarse);
        let user = service.create_user(new_user("ada@example.com")).await.unwrap();

        let logged_in = service.login("ada@example.com", "secret").await.unwrap();
        assert_eq!(logged_in.id, user.id);
        assert_eq!(service.active_session_count(), 1);

        // Change the stored record behind the service's back.
        let mut changed = user.clone();
        changed.firstname = "Changed".to_string();
        repo.insert_user(changed);
        repo.reset_calls();

        let served = service.get_user_by_id(user.id).await.unwrap();
        assert_eq!(served.firstname, "Ada");
        assert_eq!(repo.call_count("fetch_user"), 0);

        assert!(service.logout(user.id));
        let served = service.get_user_by_id(user.id).await.unwrap();
        assert_eq!(served.firstname, "Changed");
    }

    #[tokio::test]
    async fn test_login_failures_share_one_error() {
        let (_repo, service) = service(InvalidationPolicy::Coarse);
        service.create_user(new_user("ada@example.com")).await.unwrap();

        let wrong_password = service.login("ada@example.com", "nope").await.unwrap_err();
        let unknown_email = service.login("bob@example.com", "secret").await.unwrap_err();

        assert_eq!(wrong_password, Error::InvalidCredentials);
        assert_eq!(unknown_email, Error::InvalidCredentials);
        assert_eq!(service.active_session_count(), 0);
    }

    #[tokio::test]
    async fn test_update_refreshes_session_and_email_caches() {
        let (_repo, service) = service(InvalidationPolicy::Targeted);
        let user = service.create_user(new_user("old@example.com")).await.unwrap();
        service.login("old@example.com", "secret").await.unwrap();

        let patch = UserPatch {
            email: Some("new@example.com".to_string()),
            ..Default::default()
        };
        service.update_user(user.id, patch).await.unwrap();

        assert_eq!(
            service.get_active_user(user.id).map(|u| u.email),
            Some("new@example.com".to_string())
        );
        assert!(service.get_user_by_email("old@example.com").await.is_err());
        assert_eq!(
            service.get_user_by_email("new@example.com").await.unwrap().id,
            user.id
        );
    }

    #[tokio::test]
    async fn test_update_to_taken_email_fails() {
        let (_repo, service) = service(InvalidationPolicy::Coarse);
        service.create_user(new_user("a@example.com")).await.unwrap();
        let b = service.create_user(new_user("b@example.com")).await.unwrap();

        let patch = UserPatch {
            email: Some("a@example.com".to_string()),
            ..Default::default()
        };
        let err = service.update_user(b.id, patch).await.unwrap_err();
        assert!(matches!(err, Error::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_update_rejects_blank_email() {
        let (repo, service) = service(InvalidationPolicy::Coarse);
        let user = service.create_user(new_user("ada@example.com")).await.unwrap();

        let patch = UserPatch {
            email: Some("  ".to_string()),
            ..Default::default()
        };
        let err = service.update_user(user.id, patch).await.unwrap_err();

        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(repo.call_count("save_user"), 0);
        assert_eq!(
            service.get_user_by_id(user.id).await.unwrap().email,
            "ada@example.com"
        );
    }

    #[tokio::test]
    async fn test_delete_ends_session() {
        let (_repo, service) = service(InvalidationPolicy::Coarse);
        let user = service.create_user(new_user("ada@example.com")).await.unwrap();
        service.login("ada@example.com", "secret").await.unwrap();

        service.delete_user(user.id).await.unwrap();

        assert!(service.get_active_user(user.id).is_none());
        assert!(service.get_user_by_id(user.id).await.unwrap_err().is_not_found());
        assert!(service.delete_user(user.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_repository_error_not_cached() {
        let (repo, service) = service(InvalidationPolicy::Coarse);
        let user = service.create_user(new_user("ada@example.com")).await.unwrap();

        repo.set_failing(true);
        let err = service.get_user_by_id(user.id).await.unwrap_err();
        assert!(matches!(err, Error::RepositoryError(_)));

        repo.set_failing(false);
        assert_eq!(service.get_user_by_id(user.id).await.unwrap().id, user.id);
    }

    #[tokio::test]
    async fn test_targeted_policy_keeps_unrelated_entries() {
        let (repo, service) = service(InvalidationPolicy::Targeted);
        let a = service.create_user(new_user("a@example.com")).await.unwrap();
        service.get_user_by_id(a.id).await.unwrap();
        repo.reset_calls();

        service.create_user(new_user("b@example.com")).await.unwrap();
        service.get_user_by_id(a.id).await.unwrap();

        assert_eq!(repo.call_count("fetch_user"), 0);
    }

    #[tokio::test]
    async fn test_coarse_policy_flushes_everything() {
        let (repo, service) = service(InvalidationPolicy::Coarse);
        let a = service.create_user(new_user("a@example.com")).await.unwrap();
        service.get_user_by_id(a.id).await.unwrap();
        repo.reset_calls();

        service.create_user(new_user("b@example.com")).await.unwrap();
        service.get_user_by_id(a.id).await.unwrap();

        assert_eq!(repo.call_count("fetch_user"), 1);
    }

    #[tokio::test]
    async fn test_cache_stats_report() {
        let (_repo, service) = service(InvalidationPolicy::Coarse);
        let a = service.create_user(new_user("a@example.com")).await.unwrap();
        let b = service.create_user(new_user("b@example.com")).await.unwrap();
        service.get_user_by_id(a.id).await.unwrap();
        service.get_user_by_id(b.id).await.unwrap();
        service.login("a@example.com", "secret").await.unwrap();

        assert_eq!(
            service.cache_stats().to_string(),
            "User Cache: 2 entries, Email Cache: 1 entries, All Users Cache: 0 entries, Active Sessions: 1 users"
        );
    }

    #[tokio::test]
    async fn test_invalidate_all_keeps_sessions() {
        let (_repo, service) = service(InvalidationPolicy::Coarse);
        let a = service.create_user(new_user("a@example.com")).await.unwrap();
        service.login("a@example.com", "secret").await.unwrap();
        service.get_all_users().await.unwrap();

        service.invalidate_all_caches();

        assert_eq!(service.cache_stats().total_entries(), 0);
        assert!(service.get_active_user(a.id).is_some());
    }
}
