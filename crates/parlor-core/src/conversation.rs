//! # Conversation Engine
//!
//! Direct messages are stored as one flat log. Conversations are derived
//! from that log on every read: one entry per peer, holding the peer's live
//! profile and the newest message exchanged with them. Nothing about a
//! conversation is persisted.

use crate::identity::Identity;
use crate::ids::{new_message_id, now_millis};
use crate::notify::{AlertMeta, AlertOutcome, AlertSink, Notifier, Presence};
use crate::primitives::MESSAGES;
use crate::store::{RecordStore, load_collection, save_collection};
use crate::{Conversation, Message, ParlorError, UserId};
use std::collections::BTreeMap;

/// Alert kind attached to chat delivery alerts.
pub const CHAT_ALERT_KIND: &str = "chat_message";

/// The Conversation engine.
pub struct Conversations;

impl Conversations {
    /// One conversation per peer `me` exchanged messages with, most recently
    /// active first.
    ///
    /// Peers that no longer resolve to a user are dropped.
    pub fn list_conversations<S: RecordStore + ?Sized>(
        store: &S,
        me: &UserId,
    ) -> Result<Vec<Conversation>, ParlorError> {
        let messages: Vec<Message> = load_collection(store, MESSAGES)?;

        // Later-stored messages replace earlier ones on equal timestamps.
        let mut latest: BTreeMap<UserId, Message> = BTreeMap::new();
        for message in messages {
            let Some(peer) = message.other_party(me).cloned() else {
                continue;
            };
            if &peer == me {
                continue;
            }
            match latest.get(&peer) {
                Some(kept) if kept.timestamp > message.timestamp => {}
                _ => {
                    latest.insert(peer, message);
                }
            }
        }

        let users = Identity::all_users(store)?;
        let mut conversations: Vec<Conversation> = latest
            .into_iter()
            .filter_map(|(peer, last_message)| {
                users
                    .iter()
                    .find(|u| u.id == peer)
                    .map(|peer| Conversation {
                        peer: peer.clone(),
                        last_message,
                    })
            })
            .collect();
        conversations.sort_by(|a, b| b.last_message.timestamp.cmp(&a.last_message.timestamp));
        Ok(conversations)
    }

    /// Conversations whose peer name contains `query`, case-insensitively.
    pub fn search_conversations<S: RecordStore + ?Sized>(
        store: &S,
        me: &UserId,
        query: &str,
    ) -> Result<Vec<Conversation>, ParlorError> {
        let needle = query.trim().to_lowercase();
        Ok(Self::list_conversations(store, me)?
            .into_iter()
            .filter(|c| c.peer.name.to_lowercase().contains(&needle))
            .collect())
    }

    /// Every message between `me` and `peer`, oldest first.
    pub fn list_messages<S: RecordStore + ?Sized>(
        store: &S,
        me: &UserId,
        peer: &UserId,
    ) -> Result<Vec<Message>, ParlorError> {
        let messages: Vec<Message> = load_collection(store, MESSAGES)?;
        let mut thread: Vec<Message> = messages
            .into_iter()
            .filter(|m| peer != me && m.other_party(me) == Some(peer))
            .collect();
        thread.sort_by_key(|m| m.timestamp);
        Ok(thread)
    }

    /// Append a message to the log and alert the receiver.
    ///
    /// The alert is titled with the sender's name and suppressed when the
    /// receiver has this conversation open.
    ///
    /// # Errors
    ///
    /// - `EmptyContent` if the text is blank
    /// - `Unauthorized` if the sender is not a registered user
    /// - `NotFound` if the receiver is not a registered user, or is the sender
    pub fn send_message<S: RecordStore + ?Sized>(
        store: &mut S,
        presence: &Presence,
        alerts: &dyn AlertSink,
        sender: &UserId,
        receiver: &UserId,
        text: &str,
    ) -> Result<(Message, AlertOutcome), ParlorError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ParlorError::EmptyContent);
        }
        if sender == receiver {
            return Err(ParlorError::NotFound(format!("peer other than {sender}")));
        }
        let from = Identity::find_user(store, sender)?.ok_or(ParlorError::Unauthorized)?;
        if Identity::find_user(store, receiver)?.is_none() {
            return Err(ParlorError::NotFound(format!("user {receiver}")));
        }

        let now = now_millis();
        let message = Message {
            id: new_message_id(now),
            sender: sender.clone(),
            receiver: receiver.clone(),
            text: text.to_string(),
            timestamp: now,
        };

        let mut log: Vec<Message> = load_collection(store, MESSAGES)?;
        log.push(message.clone());
        save_collection(store, MESSAGES, &log)?;

        let outcome = Notifier::send_direct_alert(
            store,
            presence,
            alerts,
            receiver,
            &from.name,
            text,
            Some(&from.avatar),
            &AlertMeta {
                sender: Some(sender.clone()),
                kind: CHAT_ALERT_KIND.to_string(),
            },
        )?;
        tracing::debug!(message = %message.id, ?outcome, "message sent");
        Ok((message, outcome))
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
    use crate::{MessageId, User};

    fn setup() -> (MemoryStore, User, User, User) {
        let mut store = MemoryStore::new();
        let a = Identity::register(&mut store, "Alice", "a@x.io", "pw").expect("register");
        let b = Identity::register(&mut store, "Bob", "b@x.io", "pw").expect("register");
        let c = Identity::register(&mut store, "Carla", "c@x.io", "pw").expect("register");
        (store, a, b, c)
    }

    fn msg(id: &str, from: &UserId, to: &UserId, ts: i64) -> Message {
        Message {
            id: MessageId::new(id),
            sender: from.clone(),
            receiver: to.clone(),
            text: id.to_string(),
            timestamp: ts,
        }
    }

    #[test]
    fn conversations_keep_latest_per_peer() {
        let (mut store, a, b, _) = setup();
        save_collection(
            &mut store,
            MESSAGES,
            &[
                msg("m1", &a.id, &b.id, 100),
                msg("m2", &b.id, &a.id, 200),
                msg("m3", &a.id, &b.id, 50),
            ],
        )
        .expect("save");

        let list = Conversations::list_conversations(&store, &a.id).expect("list");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].peer.id, b.id);
        assert_eq!(list[0].last_message.timestamp, 200);
    }

    #[test]
    fn conversations_sorted_and_unresolvable_dropped() {
        let (mut store, a, b, c) = setup();
        let ghost = UserId::new("u_ghost");
        save_collection(
            &mut store,
            MESSAGES,
            &[
                msg("m1", &a.id, &b.id, 10),
                msg("m2", &c.id, &a.id, 30),
                msg("m3", &ghost, &a.id, 40),
                msg("m4", &b.id, &c.id, 50),
            ],
        )
        .expect("save");

        let peers: Vec<UserId> = Conversations::list_conversations(&store, &a.id)
            .expect("list")
            .into_iter()
            .map(|c| c.peer.id)
            .collect();
        assert_eq!(peers, vec![c.id, b.id]);
    }

    #[test]
    fn thread_is_ascending_and_pair_only() {
        let (mut store, a, b, c) = setup();
        save_collection(
            &mut store,
            MESSAGES,
            &[
                msg("m1", &b.id, &a.id, 30),
                msg("m2", &a.id, &c.id, 20),
                msg("m3", &a.id, &b.id, 10),
            ],
        )
        .expect("save");

        let ids: Vec<String> = Conversations::list_messages(&store, &a.id, &b.id)
            .expect("thread")
            .into_iter()
            .map(|m| m.id.0)
            .collect();
        assert_eq!(ids, vec!["m3", "m1"]);
    }

    #[test]
    fn send_to_self_is_rejected() {
        let (mut store, a, _, _) = setup();
        let alerts = AlertLog::new();

        let result = Conversations::send_message(
            &mut store,
            &Presence::new(),
            &alerts,
            &a.id,
            &a.id,
            "hello me",
        );
        assert!(matches!(result, Err(ParlorError::NotFound(_))));
        assert!(load_collection::<Message, _>(&store, MESSAGES).expect("load").is_empty());
        assert!(alerts.is_empty());
    }

    #[test]
    fn self_addressed_messages_never_form_a_conversation() {
        let (mut store, a, b, _) = setup();
        save_collection(
            &mut store,
            MESSAGES,
            &[msg("m1", &a.id, &a.id, 20), msg("m2", &a.id, &b.id, 10)],
        )
        .expect("save");

        let peers: Vec<UserId> = Conversations::list_conversations(&store, &a.id)
            .expect("list")
            .into_iter()
            .map(|c| c.peer.id)
            .collect();
        assert_eq!(peers, vec![b.id]);
        assert!(Conversations::list_messages(&store, &a.id, &a.id).expect("thread").is_empty());
    }

    #[test]
    fn send_trims_and_rejects_blank() {
        let (mut store, a, b, _) = setup();
        let presence = Presence::new();

        let blank = Conversations::send_message(&mut store, &presence, &NoAlerts, &a.id, &b.id, "  ");
        assert!(matches!(blank, Err(ParlorError::EmptyContent)));

        let (message, _) =
            Conversations::send_message(&mut store, &presence, &NoAlerts, &a.id, &b.id, " hey ")
                .expect("send");
        assert_eq!(message.text, "hey");
        assert!(message.id.as_str().starts_with("msg_"));
        assert_eq!(
            Conversations::list_messages(&store, &b.id, &a.id).expect("thread"),
            vec![message]
        );
    }

    #[test]
    fn send_alerts_receiver_unless_viewing() {
        let (mut store, a, b, _) = setup();
        let alerts = AlertLog::new();
        let mut presence = Presence::new();

        let (_, outcome) =
            Conversations::send_message(&mut store, &presence, &alerts, &a.id, &b.id, "one")
                .expect("send");
        assert_eq!(outcome, AlertOutcome::Delivered);
        let raised = alerts.drain_for(&b.id);
        assert_eq!(raised[0].title, "Alice");
        assert_eq!(raised[0].body, "one");
        assert_eq!(raised[0].icon, a.avatar);

        presence.set_active_peer(&b.id, Some(&a.id));
        let (_, outcome) =
            Conversations::send_message(&mut store, &presence, &alerts, &a.id, &b.id, "two")
                .expect("send");
        assert_eq!(outcome, AlertOutcome::Suppressed);
        assert!(alerts.is_empty());
    }

    #[test]
    fn search_filters_by_peer_name() {
        let (mut store, a, b, c) = setup();
        let presence = Presence::new();
        for to in [&b.id, &c.id] {
            Conversations::send_message(&mut store, &presence, &NoAlerts, &a.id, to, "hi")
                .expect("send");
        }

        let found = Conversations::search_conversations(&store, &a.id, "car").expect("search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].peer.id, c.id);
        assert_eq!(
            Conversations::search_conversations(&store, &a.id, "").expect("search").len(),
            2
        );
    }

    #[test]
    fn send_to_unknown_receiver_not_found() {
        let (mut store, a, _, _) = setup();
        let result = Conversations::send_message(
            &mut store,
            &Presence::new(),
            &NoAlerts,
            &a.id,
            &UserId::new("u_ghost"),
            "hi",
        );
        assert!(matches!(result, Err(ParlorError::NotFound(_))));
    }
}
