//! # Property-Based Tests
//!
//! Invariants of the engines checked over generated action sequences.

use parlor_core::primitives::{MESSAGES, USERS};
use parlor_core::store::{load_collection, save_collection};
use parlor_core::{
    Credential, MemoryStore, Message, MessageId, Network, RecordStore, User, UserId,
    export_snapshot, import_snapshot,
};
use proptest::collection::vec;
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Register `n` users and return their ids in registration order.
fn users(network: &mut Network, n: usize) -> Vec<UserId> {
    (0..n)
        .map(|i| {
            network
                .register(&format!("User {i}"), &format!("u{i}@x.io"), "pw")
                .expect("register")
                .id
        })
        .collect()
}

fn symmetric(all: &[User]) -> bool {
    all.iter().all(|a| {
        !a.following.contains(&a.id)
            && all.iter().all(|b| {
                a.following.contains(&b.id) == b.followers.contains(&a.id)
            })
    })
}

proptest! {
    /// Any sequence of follow toggles keeps both edge lists in agreement.
    #[test]
    fn follow_symmetry_holds(toggles in vec((0usize..4, 0usize..4), 0..40)) {
        let mut network = Network::new();
        let ids = users(&mut network, 4);

        for (from, to) in toggles {
            network.toggle_follow(&ids[from], &ids[to]).expect("toggle");
            prop_assert!(symmetric(&network.all_users().expect("users")));
        }
    }

    /// Replaying a toggle sequence twice restores the starting graph.
    #[test]
    fn follow_toggles_cancel_pairwise(toggles in vec((0usize..3, 0usize..3), 0..20)) {
        let mut network = Network::new();
        let ids = users(&mut network, 3);
        let before: Vec<(Vec<UserId>, Vec<UserId>)> = network
            .all_users()
            .expect("users")
            .into_iter()
            .map(|u| (u.followers, u.following))
            .collect();

        for (from, to) in &toggles {
            network.toggle_follow(&ids[*from], &ids[*to]).expect("toggle");
            network.toggle_follow(&ids[*from], &ids[*to]).expect("toggle");
        }

        let after: Vec<(Vec<UserId>, Vec<UserId>)> = network
            .all_users()
            .expect("users")
            .into_iter()
            .map(|u| (u.followers, u.following))
            .collect();
        prop_assert_eq!(before, after);
    }

    /// likes == |liked_by| after every toggle, whoever toggles.
    #[test]
    fn like_count_invariant(likers in vec(0usize..5, 1..30)) {
        let mut network = Network::new();
        let ids = users(&mut network, 5);
        let post = network.create_post(&ids[0], "post", None).expect("post");

        for who in likers {
            let updated = network.toggle_like(&ids[who], &post.id).expect("like");
            prop_assert_eq!(updated.likes, updated.liked_by.len() as u64);
            let mut unique = updated.liked_by.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(unique.len(), updated.liked_by.len());
        }
    }

    /// Conversations hold one entry per other peer with that peer's newest
    /// timestamp; self-addressed messages never form one.
    #[test]
    fn conversations_dedup_by_peer(
        log in vec((0usize..4, 0usize..4, 0i64..1_000), 0..40)
    ) {
        let mut network = Network::new();
        let ids = users(&mut network, 4);
        let me = &ids[0];

        let messages: Vec<Message> = log
            .iter()
            .enumerate()
            .map(|(i, (from, to, ts))| Message {
                id: MessageId::new(format!("m{i}")),
                sender: ids[*from].clone(),
                receiver: ids[*to].clone(),
                text: String::new(),
                timestamp: *ts,
            })
            .collect();
        save_collection(network.backend_mut(), MESSAGES, &messages).expect("save");

        let mut newest: BTreeMap<&UserId, i64> = BTreeMap::new();
        for m in &messages {
            if let Some(peer) = m.other_party(me).filter(|p| *p != me) {
                let slot = newest.entry(peer).or_insert(m.timestamp);
                *slot = (*slot).max(m.timestamp);
            }
        }

        let conversations = network.list_conversations(me).expect("list");
        prop_assert_eq!(conversations.len(), newest.len());
        for pair in conversations.windows(2) {
            prop_assert!(pair[0].last_message.timestamp >= pair[1].last_message.timestamp);
        }
        for c in &conversations {
            prop_assert_eq!(Some(&c.last_message.timestamp), newest.get(&c.peer.id));
        }
    }

    /// Any user collection survives the store and a snapshot round-trip.
    #[test]
    fn store_roundtrip(names in vec("[a-zA-Z ]{1,16}", 0..10), bios in vec(proptest::option::of(".{0,24}"), 10)) {
        let written: Vec<User> = names
            .iter()
            .enumerate()
            .map(|(i, name)| User {
                id: UserId::new(format!("u_{i}")),
                name: name.clone(),
                avatar: String::new(),
                bio: bios[i].clone(),
                city: None,
                followers: Vec::new(),
                following: Vec::new(),
                push_token: None,
                credential: Credential { email: format!("{i}@x.io"), secret: String::new() },
            })
            .collect();

        let mut store = MemoryStore::new();
        save_collection(&mut store, USERS, &written).expect("save");
        let read: Vec<User> = load_collection(&store, USERS).expect("load");
        prop_assert_eq!(&read, &written);

        let mut restored = MemoryStore::new();
        import_snapshot(&mut restored, &export_snapshot(&store).expect("export")).expect("import");
        prop_assert_eq!(restored.keys().expect("keys"), store.keys().expect("keys"));
        let reread: Vec<User> = load_collection(&restored, USERS).expect("load");
        prop_assert_eq!(reread, written);
    }
}
