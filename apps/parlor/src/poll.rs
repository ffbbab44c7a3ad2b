//! # Refresh Polling
//!
//! `parlor watch` re-reads the store on a fixed interval and logs whatever
//! arrived for one user since the previous tick. The store is reopened on
//! every tick so writes from other processes become visible, and the redb
//! file lock is only held for the duration of one read.

use parlor_core::{Message, MessageId, Network, Notification, NotificationId, ParlorError, UserId};
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// What changed since the previous observation.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PollReport {
    pub new_messages: Vec<Message>,
    pub new_notifications: Vec<Notification>,
    pub unread: usize,
}

impl PollReport {
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.new_messages.is_empty() && self.new_notifications.is_empty()
    }
}

/// Ids already reported to the watcher.
///
/// The first observation only primes the sets; history present when the
/// watch starts is not reported as new.
#[derive(Debug, Default)]
pub struct PollState {
    primed: bool,
    seen_messages: BTreeSet<MessageId>,
    seen_notifications: BTreeSet<NotificationId>,
}

impl PollState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare the current store contents against what was seen so far.
    pub fn observe(&mut self, network: &Network, user: &UserId) -> Result<PollReport, ParlorError> {
        let mut report = PollReport::default();

        for conversation in network.list_conversations(user)? {
            for message in network.list_messages(user, &conversation.peer.id)? {
                if self.seen_messages.insert(message.id.clone()) && self.primed {
                    report.new_messages.push(message);
                }
            }
        }

        for notification in network.list_notifications(user)? {
            if self.seen_notifications.insert(notification.id.clone()) && self.primed {
                report.new_notifications.push(notification);
            }
        }

        report.unread = network.unread_count(user)?;
        self.primed = true;
        Ok(report)
    }
}

fn log_report(user: &UserId, report: &PollReport) {
    for message in &report.new_messages {
        tracing::info!(
            user = %user,
            from = %message.sender,
            to = %message.receiver,
            "New message: {}",
            message.text
        );
    }
    for notification in &report.new_notifications {
        tracing::info!(
            user = %user,
            kind = %notification.kind,
            "{} {}",
            notification.actor_name,
            notification.kind.phrase()
        );
    }
    if report.is_quiet() {
        tracing::debug!(user = %user, unread = report.unread, "Nothing new");
    }
}

/// Poll for `user` every `interval` until Ctrl-C, or until `max_ticks`
/// observations have been made.
///
/// `open` is called once per tick to obtain a fresh view of the store. A
/// failed tick is logged and the loop keeps going.
pub async fn watch<F>(
    mut open: F,
    user: UserId,
    interval: Duration,
    max_ticks: Option<u64>,
) -> Result<(), ParlorError>
where
    F: FnMut() -> Result<Network, ParlorError>,
{
    let mut state = PollState::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks: u64 = 0;

    tracing::info!(user = %user, interval_ms = interval.as_millis() as u64, "Watching for activity");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Watch stopped");
                return Ok(());
            }
        }

        match open().and_then(|network| state.observe(&network, &user)) {
            Ok(report) => log_report(&user, &report),
            Err(e) => tracing::warn!("Refresh failed: {}", e),
        }

        ticks = ticks.saturating_add(1);
        if max_ticks.is_some_and(|max| ticks >= max) {
            return Ok(());
        }
    }
}
