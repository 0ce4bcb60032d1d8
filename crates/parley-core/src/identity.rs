//! Identity Store: registration, credential checks, lookup and search over
//! user records.

use std::sync::Arc;

use tracing::{debug, info};

use parley_shared::{UserId, ValidationError};
use parley_store::{Database, NewUserRecord, User};

use crate::backend::Backend;
use crate::error::{ConflictError, NotFoundError, Result, ServiceError};
use crate::events::ChangeEvent;

/// Registration form.
#[derive(Clone)]
pub struct NewUser {
    /// Uid already issued by an external auth provider, if any. A fresh one
    /// is generated otherwise.
    pub uid: Option<UserId>,
    pub last_name: String,
    pub first_name: String,
    pub nickname: String,
    pub email: String,
    pub password: String,
}

impl NewUser {
    pub fn new(
        last_name: impl Into<String>,
        first_name: impl Into<String>,
        nickname: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            uid: None,
            last_name: last_name.into(),
            first_name: first_name.into(),
            nickname: nickname.into(),
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn with_uid(mut self, uid: UserId) -> Self {
        self.uid = Some(uid);
        self
    }
}

impl std::fmt::Debug for NewUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewUser")
            .field("uid", &self.uid)
            .field("nickname", &self.nickname)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct IdentityStore {
    backend: Arc<Backend>,
}

impl IdentityStore {
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    /// Register a new account and return its uid.
    pub fn create_user(&self, profile: NewUser) -> Result<UserId> {
        let email = normalize_email(&profile.email)?;
        let nickname = profile.nickname.trim().to_string();
        if nickname.is_empty() {
            return Err(ValidationError::EmptyNickname.into());
        }
        let min = self.backend.config.min_password_len;
        if profile.password.chars().count() < min {
            return Err(ValidationError::PasswordTooShort { min }.into());
        }

        let uid = profile.uid.unwrap_or_else(UserId::generate);
        let record = NewUserRecord {
            uid: uid.clone(),
            last_name: profile.last_name.trim().to_string(),
            first_name: profile.first_name.trim().to_string(),
            nickname,
            email,
            password_hash: self.backend.hasher.hash(&profile.password)?,
        };

        self.backend.write("create_user", |db| {
            if db.user_exists(&record.uid)? {
                return Err(ConflictError::DuplicateUid(record.uid.clone()).into());
            }
            if db.email_taken(&record.email)? {
                return Err(ConflictError::DuplicateEmail.into());
            }
            db.insert_user(&record)?;
            Ok(())
        })?;

        info!(uid = %uid, nickname = %record.nickname, "user registered");
        self.backend.publish([ChangeEvent::UserChanged(uid.clone())]);
        Ok(uid)
    }

    pub fn find_by_uid(&self, uid: &UserId) -> Result<Option<User>> {
        self.backend
            .read("find_by_uid", |db| Ok(db.get_user(uid)?))
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email)?;
        self.backend
            .read("find_by_email", |db| Ok(db.find_user_by_email(&email)?))
    }

    /// Verify credentials and return the account they belong to.
    ///
    /// An unknown email and a wrong password fail identically.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User> {
        let Ok(email) = normalize_email(email) else {
            return Err(ServiceError::InvalidCredentials);
        };
        let user = self
            .backend
            .read("authenticate", |db| Ok(db.find_user_by_email(&email)?))?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !self.backend.hasher.verify(password, &user.password_hash)? {
            debug!(uid = %user.uid, "credential check failed");
            return Err(ServiceError::InvalidCredentials);
        }

        info!(uid = %user.uid, "user authenticated");
        Ok(user)
    }

    /// Case-insensitive substring search over nickname, first name and last
    /// name. A blank query matches nobody; `exclude` is never returned.
    pub fn search_by_text(&self, query: &str, exclude: &UserId) -> Result<Vec<User>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self.backend.config.search_limit;
        let hits = self.backend.read("search_by_text", |db| {
            Ok(db.find_users(limit, |u| {
                &u.uid != exclude
                    && [&u.nickname, &u.first_name, &u.last_name]
                        .iter()
                        .any(|field| field.to_lowercase().contains(&needle))
            })?)
        })?;

        debug!(query = %needle, hits = hits.len(), "user search");
        Ok(hits)
    }

    /// Profiles of `uid`'s friends.
    pub fn list_friends(&self, uid: &UserId) -> Result<Vec<User>> {
        self.backend.read("list_friends", |db| {
            let user = require_user(db, uid)?;
            Ok(db.get_users(&user.friends)?)
        })
    }

    /// Profiles of the users with a pending request addressed to `uid`.
    pub fn list_friend_requests(&self, uid: &UserId) -> Result<Vec<User>> {
        self.backend.read("list_friend_requests", |db| {
            let user = require_user(db, uid)?;
            Ok(db.get_users(&user.friend_requests)?)
        })
    }
}

/// Load a user or fail with `NotFound`.
pub(crate) fn require_user(db: &Database, uid: &UserId) -> Result<User> {
    db.get_user(uid)?
        .ok_or_else(|| NotFoundError::User(uid.clone()).into())
}

/// Fail with `NotFound` unless `uid` is registered.
pub(crate) fn ensure_exists(db: &Database, uid: &UserId) -> Result<()> {
    if db.user_exists(uid)? {
        Ok(())
    } else {
        Err(NotFoundError::User(uid.clone()).into())
    }
}

fn normalize_email(raw: &str) -> std::result::Result<String, ValidationError> {
    let email = raw.trim().to_lowercase();
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if well_formed {
        Ok(email)
    } else {
        Err(ValidationError::MalformedEmail(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{messenger, register, uid};

    #[test]
    fn create_and_find_user() {
        let m = messenger();
        let id = m
            .identity()
            .create_user(
                NewUser::new("Ivanova", "Anna", " anna ", "Anna@Example.com", "secret1")
                    .with_uid(uid("u1")),
            )
            .unwrap();
        assert_eq!(id, uid("u1"));

        let user = m.identity().find_by_uid(&id).unwrap().unwrap();
        assert_eq!(user.nickname, "anna");
        assert_eq!(user.email, "anna@example.com");
        assert_ne!(user.password_hash, "secret1");

        let by_email = m.identity().find_by_email("ANNA@example.com ").unwrap();
        assert_eq!(by_email.map(|u| u.uid), Some(id));
        assert!(m.identity().find_by_uid(&uid("ghost")).unwrap().is_none());
    }

    #[test]
    fn generated_uid_when_none_given() {
        let m = messenger();
        let id = m
            .identity()
            .create_user(NewUser::new("L", "F", "nick", "n@example.com", "secret1"))
            .unwrap();
        assert!(m.identity().find_by_uid(&id).unwrap().is_some());
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let m = messenger();
        register(&m, "u1", "anna");
        let err = m
            .identity()
            .create_user(
                NewUser::new("X", "Y", "other", "ANNA@example.com", "secret1").with_uid(uid("u2")),
            )
            .unwrap_err();
        assert_eq!(err.conflict(), Some(&ConflictError::DuplicateEmail));
        assert!(m.identity().find_by_uid(&uid("u2")).unwrap().is_none());
    }

    #[test]
    fn duplicate_uid_is_a_conflict() {
        let m = messenger();
        register(&m, "u1", "anna");
        let err = m
            .identity()
            .create_user(NewUser::new("X", "Y", "z", "z@example.com", "secret1").with_uid(uid("u1")))
            .unwrap_err();
        assert!(matches!(
            err.conflict(),
            Some(ConflictError::DuplicateUid(_))
        ));
    }

    #[test]
    fn registration_validates_input() {
        let m = messenger();
        let bad = [
            NewUser::new("L", "F", "nick", "not-an-email", "secret1"),
            NewUser::new("L", "F", "nick", "a@b@c", "secret1"),
            NewUser::new("L", "F", "nick", "sp ace@example.com", "secret1"),
            NewUser::new("L", "F", "   ", "n@example.com", "secret1"),
            NewUser::new("L", "F", "nick", "n@example.com", "123"),
        ];
        for form in bad {
            let err = m.identity().create_user(form).unwrap_err();
            assert!(matches!(err, ServiceError::Validation(_)), "{err}");
        }
    }

    #[test]
    fn authenticate_checks_password() {
        let m = messenger();
        register(&m, "u1", "anna");

        let user = m
            .identity()
            .authenticate("anna@example.com", "password-anna")
            .unwrap();
        assert_eq!(user.uid, uid("u1"));

        for (email, password) in [
            ("anna@example.com", "wrong"),
            ("nobody@example.com", "password-anna"),
            ("garbage", "password-anna"),
        ] {
            assert!(matches!(
                m.identity().authenticate(email, password),
                Err(ServiceError::InvalidCredentials)
            ));
        }
    }

    #[test]
    fn search_matches_names_case_insensitively() {
        let m = messenger();
        m.identity()
            .create_user(
                NewUser::new("Смирнова", "Ольга", "olya", "olga@example.com", "secret1")
                    .with_uid(uid("u1")),
            )
            .unwrap();
        m.identity()
            .create_user(
                NewUser::new("Brown", "Charlie", "chuck", "c@example.com", "secret1")
                    .with_uid(uid("u2")),
            )
            .unwrap();
        let me = register(&m, "me", "searcher");

        let ids = |q: &str| -> Vec<UserId> {
            m.identity()
                .search_by_text(q, &me)
                .unwrap()
                .into_iter()
                .map(|u| u.uid)
                .collect()
        };

        assert_eq!(ids("СМИР"), [uid("u1")]);
        assert_eq!(ids("ольга"), [uid("u1")]);
        assert_eq!(ids("CHUCK"), [uid("u2")]);
        assert_eq!(ids("harl"), [uid("u2")]);
        assert!(ids("").is_empty());
        assert!(ids("   ").is_empty());
        assert!(ids("searcher").is_empty(), "caller is excluded");
        assert!(ids("zzz").is_empty());
    }

    #[test]
    fn search_is_capped() {
        let m = crate::testing::messenger_with(|c| c.search_limit = 2);
        for i in 0..4 {
            register(&m, &format!("u{i}"), &format!("twin{i}"));
        }
        let hits = m.identity().search_by_text("twin", &uid("nobody")).unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn listing_an_unknown_user_is_not_found() {
        let m = messenger();
        assert!(matches!(
            m.identity().list_friends(&uid("ghost")),
            Err(ServiceError::NotFound(NotFoundError::User(_)))
        ));
        assert!(matches!(
            m.identity().list_friend_requests(&uid("ghost")),
            Err(ServiceError::NotFound(_))
        ));
    }
}
