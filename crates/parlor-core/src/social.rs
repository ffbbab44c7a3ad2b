//! # Social Graph Engine
//!
//! Maintains follow edges. Each edge is stored twice, once in the actor's
//! `following` and once in the target's `followers`, and both user records
//! are rewritten in one store transaction so the two sides never disagree.

use crate::identity::{Identity, commit_users};
use crate::notify::{AlertSink, Notifier};
use crate::primitives::USERS;
use crate::store::{RecordStore, load_collection};
use crate::{NotificationKind, ParlorError, User, UserId};

/// What a follow toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Followed,
    Unfollowed,
    /// Self-follow or unknown actor; nothing was written.
    Unchanged,
}

/// The Social Graph engine.
pub struct SocialGraph;

impl SocialGraph {
    /// Follow `target` if `actor` does not follow it yet, otherwise unfollow.
    ///
    /// A new follow (never an unfollow) notifies the target. The session
    /// marker is refreshed when it belongs to either side.
    ///
    /// # Errors
    ///
    /// `NotFound` if the target is not a registered user.
    pub fn toggle_follow<S: RecordStore + ?Sized>(
        store: &mut S,
        alerts: &dyn AlertSink,
        actor: &UserId,
        target: &UserId,
    ) -> Result<FollowOutcome, ParlorError> {
        if actor == target {
            return Ok(FollowOutcome::Unchanged);
        }

        let mut users: Vec<User> = load_collection(store, USERS)?;
        let Some(a) = users.iter().position(|u| &u.id == actor) else {
            tracing::debug!(actor = %actor, "follow toggle without a known actor");
            return Ok(FollowOutcome::Unchanged);
        };
        let t = users
            .iter()
            .position(|u| &u.id == target)
            .ok_or_else(|| ParlorError::NotFound(format!("user {target}")))?;

        let outcome = if users[a].follows(target) {
            users[a].following.retain(|id| id != target);
            users[t].followers.retain(|id| id != actor);
            FollowOutcome::Unfollowed
        } else {
            users[a].following.push(target.clone());
            if !users[t].followers.contains(actor) {
                users[t].followers.push(actor.clone());
            }
            FollowOutcome::Followed
        };

        commit_users(store, &users, &[actor, target], None)?;
        tracing::debug!(actor = %actor, target = %target, ?outcome, "follow toggled");

        if outcome == FollowOutcome::Followed {
            let snapshot = users[a].snapshot();
            Notifier::notify(store, alerts, target, NotificationKind::Follow, &snapshot, None)?;
        }
        Ok(outcome)
    }

    /// Whether `actor` follows `target`. Unknown actors follow nobody.
    pub fn is_following<S: RecordStore + ?Sized>(
        store: &S,
        actor: &UserId,
        target: &UserId,
    ) -> Result<bool, ParlorError> {
        Ok(Identity::find_user(store, actor)?.is_some_and(|u| u.follows(target)))
    }

    /// Everyone except `viewer` whose name or id contains `query`,
    /// case-insensitively, in registration order. A blank query matches all.
    pub fn discover<S: RecordStore + ?Sized>(
        store: &S,
        viewer: &UserId,
        query: &str,
    ) -> Result<Vec<User>, ParlorError> {
        let needle = query.trim().to_lowercase();
        let users = Identity::all_users(store)?;
        Ok(users
            .into_iter()
            .filter(|u| &u.id != viewer)
            .filter(|u| {
                needle.is_empty()
                    || u.name.to_lowercase().contains(&needle)
                    || u.id.as_str().to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// The live users following `user`, in follow order.
    pub fn followers<S: RecordStore + ?Sized>(
        store: &S,
        user: &UserId,
    ) -> Result<Vec<User>, ParlorError> {
        Self::resolve_edges(store, user, |u| &u.followers)
    }

    /// The live users `user` follows, in follow order.
    pub fn following<S: RecordStore + ?Sized>(
        store: &S,
        user: &UserId,
    ) -> Result<Vec<User>, ParlorError> {
        Self::resolve_edges(store, user, |u| &u.following)
    }

    fn resolve_edges<S, F>(store: &S, user: &UserId, edges: F) -> Result<Vec<User>, ParlorError>
    where
        S: RecordStore + ?Sized,
        F: Fn(&User) -> &Vec<UserId>,
    {
        let users = Identity::all_users(store)?;
        let Some(owner) = users.iter().find(|u| &u.id == user) else {
            return Err(ParlorError::NotFound(format!("user {user}")));
        };
        Ok(edges(owner)
            .iter()
            .filter_map(|id| users.iter().find(|u| &u.id == id).cloned())
            .collect())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{AlertLog, NoAlerts};
    use crate::store::MemoryStore;

    fn two_users(store: &mut MemoryStore) -> (User, User) {
        let a = Identity::register(store, "Alice", "a@x.io", "pw").expect("register");
        let b = Identity::register(store, "Bob", "b@x.io", "pw").expect("register");
        (a, b)
    }

    fn user(store: &MemoryStore, id: &UserId) -> User {
        Identity::find_user(store, id).expect("find").expect("present")
    }

    #[test]
    fn follow_is_symmetric() {
        let mut store = MemoryStore::new();
        let (a, b) = two_users(&mut store);

        let outcome = SocialGraph::toggle_follow(&mut store, &NoAlerts, &a.id, &b.id).expect("toggle");
        assert_eq!(outcome, FollowOutcome::Followed);
        assert_eq!(user(&store, &a.id).following, vec![b.id.clone()]);
        assert_eq!(user(&store, &b.id).followers, vec![a.id.clone()]);
        assert!(SocialGraph::is_following(&store, &a.id, &b.id).expect("is"));
        assert!(!SocialGraph::is_following(&store, &b.id, &a.id).expect("is"));
    }

    #[test]
    fn double_toggle_restores() {
        let mut store = MemoryStore::new();
        let (a, b) = two_users(&mut store);
        let before = Identity::all_users(&store).expect("users");

        SocialGraph::toggle_follow(&mut store, &NoAlerts, &a.id, &b.id).expect("toggle");
        let outcome = SocialGraph::toggle_follow(&mut store, &NoAlerts, &a.id, &b.id).expect("toggle");

        assert_eq!(outcome, FollowOutcome::Unfollowed);
        assert_eq!(Identity::all_users(&store).expect("users"), before);
    }

    #[test]
    fn self_follow_is_noop() {
        let mut store = MemoryStore::new();
        let (a, _) = two_users(&mut store);
        let outcome = SocialGraph::toggle_follow(&mut store, &NoAlerts, &a.id, &a.id).expect("toggle");
        assert_eq!(outcome, FollowOutcome::Unchanged);
        assert!(user(&store, &a.id).following.is_empty());
    }

    #[test]
    fn unknown_actor_is_noop_unknown_target_not_found() {
        let mut store = MemoryStore::new();
        let (a, _) = two_users(&mut store);
        let ghost = UserId::new("u_ghost");

        let outcome = SocialGraph::toggle_follow(&mut store, &NoAlerts, &ghost, &a.id).expect("toggle");
        assert_eq!(outcome, FollowOutcome::Unchanged);

        let result = SocialGraph::toggle_follow(&mut store, &NoAlerts, &a.id, &ghost);
        assert!(matches!(result, Err(ParlorError::NotFound(_))));
    }

    #[test]
    fn only_new_follow_notifies() {
        let mut store = MemoryStore::new();
        let alerts = AlertLog::new();
        let (a, b) = two_users(&mut store);

        SocialGraph::toggle_follow(&mut store, &alerts, &a.id, &b.id).expect("follow");
        SocialGraph::toggle_follow(&mut store, &alerts, &a.id, &b.id).expect("unfollow");

        let listed = Notifier::list_for(&store, &b.id).expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].kind, NotificationKind::Follow);
        assert_eq!(alerts.drain_for(&b.id)[0].body, "Alice started following you");
    }

    #[test]
    fn session_marker_tracks_following() {
        let mut store = MemoryStore::new();
        let (a, b) = two_users(&mut store);
        // Bob registered last, so Bob holds the session.
        SocialGraph::toggle_follow(&mut store, &NoAlerts, &b.id, &a.id).expect("toggle");

        let current = Identity::current(&store).expect("current").expect("session");
        assert_eq!(current.following, vec![a.id]);
    }

    #[test]
    fn discover_filters_and_excludes_self() {
        let mut store = MemoryStore::new();
        let (a, b) = two_users(&mut store);
        Identity::register(&mut store, "Carla", "c@x.io", "pw").expect("register");

        let everyone = SocialGraph::discover(&store, &a.id, "").expect("discover");
        assert_eq!(everyone.len(), 2);
        assert!(everyone.iter().all(|u| u.id != a.id));

        let bobs = SocialGraph::discover(&store, &a.id, "BO").expect("discover");
        assert_eq!(bobs.len(), 1);
        assert_eq!(bobs[0].id, b.id);

        let by_id = SocialGraph::discover(&store, &a.id, b.id.as_str()).expect("discover");
        assert_eq!(by_id.len(), 1);
    }

    #[test]
    fn edge_lists_resolve_live_users() {
        let mut store = MemoryStore::new();
        let (a, b) = two_users(&mut store);
        SocialGraph::toggle_follow(&mut store, &NoAlerts, &a.id, &b.id).expect("toggle");

        let followers = SocialGraph::followers(&store, &b.id).expect("followers");
        assert_eq!(followers[0].name, "Alice");
        let following = SocialGraph::following(&store, &a.id).expect("following");
        assert_eq!(following[0].name, "Bob");
        assert!(SocialGraph::following(&store, &b.id).expect("following").is_empty());
    }
}
