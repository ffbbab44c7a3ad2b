//! # Identity & Session Manager
//!
//! Registration, authentication, the persisted current-session marker and
//! profile edits.
//!
//! The session marker is a full copy of the signed-in `User` stored under
//! `current-session`. Whenever a user record changes, the marker is rewritten
//! in the same store transaction if it belongs to that user, so the session
//! never shows a following list older than the one in `users`.

use crate::formats::encode_records;
use crate::ids::{new_push_token, new_user_id, placeholder_avatar};
use crate::primitives::{CURRENT_SESSION, USERS};
use crate::store::{RecordStore, encode_collection, load_collection, load_record, save_record};
use crate::{Credential, ParlorError, ProfileUpdate, User, UserId};

/// Case-insensitive email comparison.
fn same_email(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Write `users` and, when needed, the session marker in one transaction.
///
/// The marker is replaced by `establish` when given; otherwise it is
/// refreshed from `users` if it belongs to one of `touched`.
pub(crate) fn commit_users<S: RecordStore + ?Sized>(
    store: &mut S,
    users: &[User],
    touched: &[&UserId],
    establish: Option<&User>,
) -> Result<(), ParlorError> {
    let users_bytes = encode_collection(users)?;

    let marker = match establish {
        Some(user) => Some(user.clone()),
        None => load_record::<User, _>(store, CURRENT_SESSION)?
            .filter(|current| touched.contains(&&current.id))
            .and_then(|current| users.iter().find(|u| u.id == current.id).cloned()),
    };

    match marker {
        Some(marker) => store.write_batch(&[
            (USERS, users_bytes),
            (CURRENT_SESSION, encode_records(&marker)?),
        ]),
        None => store.write(USERS, &users_bytes),
    }
}

/// The Identity manager authenticates users and owns the session marker.
pub struct Identity;

impl Identity {
    /// Create an account and make it the current session.
    ///
    /// # Errors
    ///
    /// - `EmptyContent` if the name or email is blank
    /// - `DuplicateEmail` if the email is already registered (any case)
    pub fn register<S: RecordStore + ?Sized>(
        store: &mut S,
        name: &str,
        email: &str,
        secret: &str,
    ) -> Result<User, ParlorError> {
        let name = name.trim();
        let email = email.trim();
        if name.is_empty() || email.is_empty() {
            return Err(ParlorError::EmptyContent);
        }

        let mut users: Vec<User> = load_collection(store, USERS)?;
        if users.iter().any(|u| same_email(&u.credential.email, email)) {
            return Err(ParlorError::DuplicateEmail);
        }

        let mut id = new_user_id();
        while users.iter().any(|u| u.id == id) {
            id = new_user_id();
        }

        let user = User {
            id,
            name: name.to_string(),
            avatar: placeholder_avatar(name),
            bio: None,
            city: None,
            followers: Vec::new(),
            following: Vec::new(),
            push_token: Some(new_push_token()),
            credential: Credential {
                email: email.to_string(),
                secret: secret.to_string(),
            },
        };
        users.push(user.clone());
        commit_users(store, &users, &[], Some(&user))?;

        tracing::info!(user = %user.id, "registered new user");
        Ok(user)
    }

    /// Sign in and make the matched user the current session.
    ///
    /// # Errors
    ///
    /// `InvalidCredentials` when no email matches (any case) or the secret differs.
    pub fn authenticate<S: RecordStore + ?Sized>(
        store: &mut S,
        email: &str,
        secret: &str,
    ) -> Result<User, ParlorError> {
        let users: Vec<User> = load_collection(store, USERS)?;
        let user = users
            .into_iter()
            .find(|u| same_email(&u.credential.email, email.trim()))
            .filter(|u| u.credential.secret == secret)
            .ok_or(ParlorError::InvalidCredentials)?;

        save_record(store, CURRENT_SESSION, &user)?;
        tracing::info!(user = %user.id, "session established");
        Ok(user)
    }

    /// Clear the current session. Ending an absent session is not an error.
    pub fn end_session<S: RecordStore + ?Sized>(store: &mut S) -> Result<(), ParlorError> {
        store.remove(CURRENT_SESSION)
    }

    /// The user of the persisted session marker, if any.
    ///
    /// A marker that cannot be decoded is treated as no session.
    pub fn current<S: RecordStore + ?Sized>(store: &S) -> Result<Option<User>, ParlorError> {
        load_record(store, CURRENT_SESSION)
    }

    /// Restore the session at process start.
    ///
    /// Same as [`Identity::current`], but also deletes a marker that could not
    /// be decoded so the next start is clean.
    pub fn restore<S: RecordStore + ?Sized>(store: &mut S) -> Result<Option<User>, ParlorError> {
        let present = store.read(CURRENT_SESSION)?.is_some();
        let user = Self::current(store)?;
        if present && user.is_none() {
            tracing::warn!("removing corrupt session marker");
            store.remove(CURRENT_SESSION)?;
        }
        Ok(user)
    }

    /// Look up a live user by id.
    pub fn find_user<S: RecordStore + ?Sized>(
        store: &S,
        id: &UserId,
    ) -> Result<Option<User>, ParlorError> {
        let users: Vec<User> = load_collection(store, USERS)?;
        Ok(users.into_iter().find(|u| &u.id == id))
    }

    /// Every registered user, in registration order.
    pub fn all_users<S: RecordStore + ?Sized>(store: &S) -> Result<Vec<User>, ParlorError> {
        load_collection(store, USERS)
    }

    /// Merge the given profile fields into a user record.
    ///
    /// Snapshots already embedded in posts, comments and videos are not
    /// rewritten; readers repair them by id.
    pub fn update_profile<S: RecordStore + ?Sized>(
        store: &mut S,
        id: &UserId,
        update: &ProfileUpdate,
    ) -> Result<User, ParlorError> {
        let mut users: Vec<User> = load_collection(store, USERS)?;
        let user = users
            .iter_mut()
            .find(|u| &u.id == id)
            .ok_or_else(|| ParlorError::NotFound(format!("user {id}")))?;

        if let Some(name) = update.name.as_deref().map(str::trim) {
            if !name.is_empty() {
                user.name = name.to_string();
            }
        }
        if let Some(bio) = &update.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(city) = &update.city {
            user.city = Some(city.clone());
        }
        if let Some(avatar) = &update.avatar {
            user.avatar = avatar.clone();
        }
        let updated = user.clone();

        commit_users(store, &users, &[id], None)?;
        Ok(updated)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn register_establishes_session() {
        let mut store = MemoryStore::new();
        let user = Identity::register(&mut store, "Jane Doe", "jane@x.io", "pw").expect("register");

        assert!(user.id.as_str().starts_with("u_"));
        assert!(user.avatar.contains("Jane+Doe"));
        assert!(user.followers.is_empty() && user.following.is_empty());
        assert!(user.push_token.as_deref().is_some_and(|t| t.starts_with("fcm_")));
        assert_eq!(Identity::current(&store).expect("current"), Some(user));
    }

    #[test]
    fn duplicate_email_is_case_insensitive() {
        let mut store = MemoryStore::new();
        Identity::register(&mut store, "Jane", "Jane@X.io", "pw").expect("register");
        let result = Identity::register(&mut store, "Other", "jane@x.IO", "pw2");
        assert!(matches!(result, Err(ParlorError::DuplicateEmail)));
        assert_eq!(Identity::all_users(&store).expect("users").len(), 1);
    }

    #[test]
    fn blank_name_rejected() {
        let mut store = MemoryStore::new();
        let result = Identity::register(&mut store, "  ", "a@x.io", "pw");
        assert!(matches!(result, Err(ParlorError::EmptyContent)));
    }

    #[test]
    fn authenticate_checks_secret() {
        let mut store = MemoryStore::new();
        let user = Identity::register(&mut store, "Jane", "jane@x.io", "pw").expect("register");
        Identity::end_session(&mut store).expect("end");

        assert!(matches!(
            Identity::authenticate(&mut store, "jane@x.io", "wrong"),
            Err(ParlorError::InvalidCredentials)
        ));
        assert!(matches!(
            Identity::authenticate(&mut store, "nobody@x.io", "pw"),
            Err(ParlorError::InvalidCredentials)
        ));
        assert!(Identity::current(&store).expect("current").is_none());

        let signed_in = Identity::authenticate(&mut store, "JANE@x.io", "pw").expect("login");
        assert_eq!(signed_in.id, user.id);
        assert_eq!(Identity::current(&store).expect("current"), Some(signed_in));
    }

    #[test]
    fn end_session_is_idempotent() {
        let mut store = MemoryStore::new();
        Identity::register(&mut store, "Jane", "jane@x.io", "pw").expect("register");
        Identity::end_session(&mut store).expect("end");
        Identity::end_session(&mut store).expect("end again");
        assert!(Identity::current(&store).expect("current").is_none());
    }

    #[test]
    fn corrupt_marker_restores_as_no_session() {
        let mut store = MemoryStore::new();
        store.write(CURRENT_SESSION, b"garbage").expect("write");

        assert!(Identity::restore(&mut store).expect("restore").is_none());
        assert!(store.read(CURRENT_SESSION).expect("read").is_none());
    }

    #[test]
    fn update_profile_merges_and_refreshes_session() {
        let mut store = MemoryStore::new();
        let user = Identity::register(&mut store, "Jane", "jane@x.io", "pw").expect("register");

        let update = ProfileUpdate {
            bio: Some("hello".to_string()),
            city: Some("Lagos".to_string()),
            ..ProfileUpdate::default()
        };
        let updated = Identity::update_profile(&mut store, &user.id, &update).expect("update");

        assert_eq!(updated.name, "Jane");
        assert_eq!(updated.bio.as_deref(), Some("hello"));
        assert_eq!(updated.city.as_deref(), Some("Lagos"));
        assert_eq!(Identity::current(&store).expect("current"), Some(updated));
    }

    #[test]
    fn update_unknown_user_not_found() {
        let mut store = MemoryStore::new();
        let result =
            Identity::update_profile(&mut store, &UserId::new("u_x"), &ProfileUpdate::default());
        assert!(matches!(result, Err(ParlorError::NotFound(_))));
    }
}
