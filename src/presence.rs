//! Periodic "who is in chat" diffing, feeding the new viewer / viewer left triggers.
//!
//! Fetching the presence list and resolving unknown logins happen on a background
//! task. The engine drains its results on every tick, so event dispatch never waits
//! on either of them.

use std::{collections::HashSet, future::Future, time::Duration};

use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};

use crate::{
    directory::UserDirectory,
    event::{ChatEvent, Payload, UserId},
};

/// Gives the set of viewer logins currently present in the channel.
pub trait PresenceSource: Send + Sync + 'static {
    fn present(&self) -> impl Future<Output = anyhow::Result<HashSet<String>>> + Send;
}

/// A login the resolver found an account for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedViewer {
    pub id: UserId,
    pub login: String,
    pub display_name: String,
}

/// Looks up the ids of logins the directory has never seen.
pub trait NameResolver: Send + Sync + 'static {
    fn resolve(
        &self,
        logins: Vec<String>,
    ) -> impl Future<Output = anyhow::Result<Vec<ResolvedViewer>>> + Send;
}

/// Resolver for setups without an API to ask; unknown logins stay unknown.
#[derive(Debug, Default)]
pub struct NoResolver;

impl NameResolver for NoResolver {
    async fn resolve(&self, logins: Vec<String>) -> anyhow::Result<Vec<ResolvedViewer>> {
        log::trace!("cannot resolve {} logins", logins.len());
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresenceUpdate {
    Snapshot(HashSet<String>),
    Resolved(Vec<ResolvedViewer>),
}

pub struct PresenceHandle {
    updates: UnboundedReceiver<PresenceUpdate>,
    lookups: UnboundedSender<Vec<String>>,
    task: JoinHandle<()>,
}

impl PresenceHandle {
    /// Pending results, without waiting.
    pub fn drain(&mut self) -> Vec<PresenceUpdate> {
        let mut updates = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            updates.push(update);
        }
        updates
    }

    pub fn lookup(&self, logins: Vec<String>) {
        if logins.is_empty() {
            return;
        }
        if self.lookups.send(logins).is_err() {
            log::warn!("presence task is gone, dropping name lookup");
        }
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PresenceHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn spawn<S, R>(source: S, resolver: R, period: Duration) -> PresenceHandle
where
    S: PresenceSource,
    R: NameResolver,
{
    let (updates_tx, updates) = unbounded_channel();
    let (lookups, mut lookups_rx) = unbounded_channel::<Vec<String>>();

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            let update = tokio::select! {
                _ = interval.tick() => match source.present().await {
                    Ok(present) => PresenceUpdate::Snapshot(present),
                    Err(err) => {
                        log::warn!("could not fetch present viewers: {err:#}");
                        continue;
                    }
                },
                Some(logins) = lookups_rx.recv() => match resolver.resolve(logins).await {
                    Ok(resolved) => PresenceUpdate::Resolved(resolved),
                    Err(err) => {
                        log::warn!("could not resolve viewers: {err:#}");
                        continue;
                    }
                },
            };

            if updates_tx.send(update).is_err() {
                log::debug!("presence receiver dropped, stopping watcher");
                return;
            }
        }
    });

    PresenceHandle {
        updates,
        lookups,
        task,
    }
}

/// Returns `(joined, left)`: names only in `current`, and names only in `previous`.
pub fn diff_presence(
    previous: &HashSet<String>,
    current: &HashSet<String>,
) -> (Vec<String>, Vec<String>) {
    let mut joined: Vec<String> = current.difference(previous).cloned().collect();
    let mut left: Vec<String> = previous.difference(current).cloned().collect();
    joined.sort();
    left.sort();
    (joined, left)
}

/// Engine-side state of the viewer watcher.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    known: HashSet<String>,
    pending: HashSet<String>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known(&self) -> &HashSet<String> {
        &self.known
    }

    /// Turns one update into viewer events. The second list holds logins that need
    /// resolving before their join can be reported.
    ///
    /// Logins still waiting for an id are checked against the directory again on
    /// every snapshot, so a viewer the resolver could not find joins as soon as the
    /// directory learns them (usually by chatting).
    pub fn apply(
        &mut self,
        update: PresenceUpdate,
        directory: &mut UserDirectory,
    ) -> (Vec<ChatEvent>, Vec<String>) {
        let mut events = Vec::new();
        let mut lookups = Vec::new();

        match update {
            PresenceUpdate::Snapshot(current) => {
                let current: HashSet<String> = current.iter().map(|n| n.to_lowercase()).collect();
                let (joined, left) = diff_presence(&self.known, &current);

                let mut still_pending = HashSet::new();
                for login in self.pending.drain() {
                    if !current.contains(&login) {
                        continue;
                    }
                    match directory.resolve_id(&login) {
                        Some(id) => events.push(viewer_event(id, directory, Payload::ViewerJoin)),
                        None => {
                            still_pending.insert(login);
                        }
                    }
                }
                self.pending = still_pending;

                for login in joined {
                    match directory.resolve_id(&login) {
                        Some(id) => events.push(viewer_event(id, directory, Payload::ViewerJoin)),
                        None => {
                            if self.pending.insert(login.clone()) {
                                lookups.push(login);
                            }
                        }
                    }
                }

                for login in left {
                    if let Some(id) = directory.resolve_id(&login) {
                        events.push(viewer_event(id, directory, Payload::ViewerLeave));
                    }
                }

                self.known = current;
            }
            PresenceUpdate::Resolved(resolved) => {
                for viewer in resolved {
                    directory.upsert(viewer.id, &viewer.display_name);
                    directory.record_login(viewer.id, &viewer.login);
                    let login = viewer.login.to_lowercase();
                    if self.pending.remove(&login) && self.known.contains(&login) {
                        events.push(viewer_event(viewer.id, directory, Payload::ViewerJoin));
                    }
                }
            }
        }

        (events, lookups)
    }
}

fn viewer_event(id: UserId, directory: &UserDirectory, payload: Payload) -> ChatEvent {
    ChatEvent::new(id, &directory.resolve(id), "", payload)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::event::EventKind;

    fn set(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn viewer(id: u64, login: &str, display_name: &str) -> ResolvedViewer {
        ResolvedViewer {
            id: UserId(id),
            login: login.to_string(),
            display_name: display_name.to_string(),
        }
    }

    fn directory() -> UserDirectory {
        let mut dir = UserDirectory::new();
        for (id, name) in [(1, "A"), (2, "B"), (3, "C"), (4, "D")] {
            dir.upsert(UserId(id), name);
        }
        dir
    }

    #[test]
    fn test_diff_presence() {
        let (joined, left) = diff_presence(&set(&["a", "b", "c"]), &set(&["b", "c", "d"]));
        assert_eq!(joined, vec!["d"]);
        assert_eq!(left, vec!["a"]);
    }

    #[test]
    fn test_one_join_and_one_leave() {
        let mut dir = directory();
        let mut tracker = PresenceTracker::new();
        tracker.apply(PresenceUpdate::Snapshot(set(&["a", "b", "c"])), &mut dir);

        let (events, lookups) = tracker.apply(PresenceUpdate::Snapshot(set(&["b", "c", "d"])), &mut dir);
        assert!(lookups.is_empty());
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].kind(), events[0].sender_id), (EventKind::ViewerJoin, UserId(4)));
        assert_eq!((events[1].kind(), events[1].sender_id), (EventKind::ViewerLeave, UserId(1)));
    }

    #[test]
    fn test_unknown_viewer_joins_once_resolved() {
        let mut dir = directory();
        let mut tracker = PresenceTracker::new();
        tracker.apply(PresenceUpdate::Snapshot(set(&["a"])), &mut dir);

        let (events, lookups) = tracker.apply(PresenceUpdate::Snapshot(set(&["a", "newcomer"])), &mut dir);
        assert!(events.is_empty());
        assert_eq!(lookups, vec!["newcomer"]);

        // still pending on the next snapshot, no second lookup
        let (_, lookups) = tracker.apply(PresenceUpdate::Snapshot(set(&["a", "newcomer"])), &mut dir);
        assert!(lookups.is_empty());

        let (events, _) = tracker.apply(
            PresenceUpdate::Resolved(vec![viewer(99, "newcomer", "Newcomer")]),
            &mut dir,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sender_name, "Newcomer");
        assert_eq!(dir.resolve_id("newcomer"), Some(UserId(99)));
    }

    #[test]
    fn test_localized_name_resolves_by_login() {
        let mut dir = directory();
        let mut tracker = PresenceTracker::new();
        tracker.apply(PresenceUpdate::Snapshot(set(&[])), &mut dir);
        tracker.apply(PresenceUpdate::Snapshot(set(&["keebsjp"])), &mut dir);

        let (events, _) = tracker.apply(
            PresenceUpdate::Resolved(vec![viewer(77, "keebsjp", "キーブス")]),
            &mut dir,
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sender_id, UserId(77));
        assert_eq!(events[0].sender_name, "キーブス");
    }

    #[test]
    fn test_unresolved_viewer_joins_once_they_chat() {
        let mut dir = UserDirectory::new();
        let mut tracker = PresenceTracker::new();
        tracker.apply(PresenceUpdate::Snapshot(set(&[])), &mut dir);

        let (events, lookups) = tracker.apply(PresenceUpdate::Snapshot(set(&["newcomer"])), &mut dir);
        assert!(events.is_empty());
        assert_eq!(lookups, vec!["newcomer"]);
        let (events, _) = tracker.apply(PresenceUpdate::Resolved(vec![]), &mut dir);
        assert!(events.is_empty());

        dir.upsert(UserId(42), "Newcomer");
        let mut joins = 0;
        for _ in 0..3 {
            let (events, lookups) = tracker.apply(PresenceUpdate::Snapshot(set(&["newcomer"])), &mut dir);
            assert!(lookups.is_empty());
            joins += events
                .iter()
                .filter(|e| e.kind() == EventKind::ViewerJoin && e.sender_id == UserId(42))
                .count();
        }
        assert_eq!(joins, 1);
    }

    #[test]
    fn test_unknown_viewer_leaving_is_silent() {
        let mut dir = UserDirectory::new();
        let mut tracker = PresenceTracker::new();
        tracker.apply(PresenceUpdate::Snapshot(set(&["ghost"])), &mut dir);

        let (events, _) = tracker.apply(PresenceUpdate::Snapshot(set(&[])), &mut dir);
        assert!(events.is_empty());

        // a late resolution for someone already gone is not a join
        let (events, _) = tracker.apply(
            PresenceUpdate::Resolved(vec![viewer(5, "ghost", "ghost")]),
            &mut dir,
        );
        assert!(events.is_empty());
    }

    struct FixedPresence(Arc<Mutex<HashSet<String>>>);

    impl PresenceSource for FixedPresence {
        async fn present(&self) -> anyhow::Result<HashSet<String>> {
            Ok(self.0.lock().unwrap().clone())
        }
    }

    struct EchoResolver;

    impl NameResolver for EchoResolver {
        async fn resolve(&self, logins: Vec<String>) -> anyhow::Result<Vec<ResolvedViewer>> {
            Ok(logins
                .into_iter()
                .enumerate()
                .map(|(i, login)| viewer(100 + i as u64, &login, &login))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_background_task() {
        let present = Arc::new(Mutex::new(set(&["a", "b"])));
        let mut handle = spawn(
            FixedPresence(present.clone()),
            EchoResolver,
            Duration::from_millis(10),
        );

        let first = handle.updates.recv().await.unwrap();
        assert_eq!(first, PresenceUpdate::Snapshot(set(&["a", "b"])));

        handle.lookup(vec!["zed".to_string()]);
        loop {
            match handle.updates.recv().await.unwrap() {
                PresenceUpdate::Resolved(resolved) => {
                    assert_eq!(resolved, vec![viewer(100, "zed", "zed")]);
                    break;
                }
                PresenceUpdate::Snapshot(_) => continue,
            }
        }

        handle.stop();
    }
}
