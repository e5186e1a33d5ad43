use std::collections::HashMap;

use crate::event::UserId;

/// Last known display name, and login when the chat adapter reports one, of every
/// viewer seen this session.
///
/// Viewers can rename themselves at any time, so names are only ever read through
/// here and the latest write wins. Display names can be localized; role and presence
/// checks go through [`UserDirectory::login`] when it is known.
#[derive(Debug, Default, Clone)]
pub struct UserDirectory {
    names: HashMap<UserId, String>,
    logins: HashMap<UserId, String>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, id: UserId) -> String {
        match self.names.get(&id) {
            Some(name) => name.clone(),
            None => format!("unknown user #{id}"),
        }
    }

    pub fn get(&self, id: UserId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    pub fn upsert(&mut self, id: UserId, name: &str) {
        if name.is_empty() {
            return;
        }
        match self.names.get_mut(&id) {
            Some(existing) if existing == name => {}
            Some(existing) => {
                log::trace!("user {id} renamed from {existing} to {name}");
                *existing = name.to_string();
            }
            None => {
                self.names.insert(id, name.to_string());
            }
        }
    }

    /// Records the viewer's account login, always stored lower-cased.
    pub fn record_login(&mut self, id: UserId, login: &str) {
        if login.is_empty() {
            return;
        }
        self.logins.insert(id, login.to_lowercase());
    }

    pub fn login(&self, id: UserId) -> Option<&str> {
        self.logins.get(&id).map(String::as_str)
    }

    /// Login if known, display name otherwise.
    pub fn account_name(&self, id: UserId) -> String {
        match self.login(id) {
            Some(login) => login.to_string(),
            None => self.resolve(id),
        }
    }

    /// Matches logins first, then display names. Linear scan; the directory only
    /// ever holds the chatters of one session.
    pub fn resolve_id(&self, name: &str) -> Option<UserId> {
        let by_login = self
            .logins
            .iter()
            .find(|(_, l)| l.eq_ignore_ascii_case(name));
        by_login
            .or_else(|| self.names.iter().find(|(_, n)| n.eq_ignore_ascii_case(name)))
            .map(|(id, _)| *id)
    }

    pub fn contains(&self, id: UserId) -> bool {
        self.names.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn clear(&mut self) {
        self.names.clear();
        self.logins.clear();
    }
}
