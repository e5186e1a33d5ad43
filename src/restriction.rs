use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{directory::UserDirectory, event::UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Broadcaster,
    Vip,
    Moderator,
    Staff,
    Admin,
    GlobalMod,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Broadcaster,
        Role::Vip,
        Role::Moderator,
        Role::Staff,
        Role::Admin,
        Role::GlobalMod,
    ];

    /// Maps a Twitch chat badge name to the role it grants.
    pub fn from_badge(badge: &str) -> Option<Self> {
        match badge {
            "broadcaster" => Some(Role::Broadcaster),
            "vip" => Some(Role::Vip),
            "moderator" => Some(Role::Moderator),
            "staff" => Some(Role::Staff),
            "admin" => Some(Role::Admin),
            "global_mod" => Some(Role::GlobalMod),
            _ => None,
        }
    }
}

/// Who currently holds which role in the channel, by login name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelRoster {
    #[serde(default)]
    pub broadcaster: Vec<String>,
    #[serde(default)]
    pub vips: Vec<String>,
    #[serde(default)]
    pub moderators: Vec<String>,
    #[serde(default)]
    pub staff: Vec<String>,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub global_mods: Vec<String>,
    #[serde(default)]
    pub viewers: Vec<String>,
}

impl ChannelRoster {
    /// Roster of a channel whose owner is known before they ever chat.
    pub fn for_channel(channel: &str) -> Self {
        Self {
            broadcaster: vec![channel.to_lowercase()],
            ..Self::default()
        }
    }

    pub fn list(&self, role: Role) -> &[String] {
        match role {
            Role::Broadcaster => &self.broadcaster,
            Role::Vip => &self.vips,
            Role::Moderator => &self.moderators,
            Role::Staff => &self.staff,
            Role::Admin => &self.admins,
            Role::GlobalMod => &self.global_mods,
        }
    }

    fn list_mut(&mut self, role: Role) -> &mut Vec<String> {
        match role {
            Role::Broadcaster => &mut self.broadcaster,
            Role::Vip => &mut self.vips,
            Role::Moderator => &mut self.moderators,
            Role::Staff => &mut self.staff,
            Role::Admin => &mut self.admins,
            Role::GlobalMod => &mut self.global_mods,
        }
    }

    pub fn has_role(&self, name: &str, role: Role) -> bool {
        self.list(role).iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn grant(&mut self, name: &str, role: Role) {
        if !self.has_role(name, role) {
            self.list_mut(role).push(name.to_string());
        }
    }

    pub fn revoke(&mut self, name: &str, role: Role) {
        self.list_mut(role).retain(|n| !n.eq_ignore_ascii_case(name));
    }

    /// Replaces every role `name` holds with exactly `roles`. Returns whether anything
    /// changed.
    pub fn set_roles(&mut self, name: &str, roles: &[Role]) -> bool {
        let mut changed = false;
        for role in Role::ALL {
            let held = self.has_role(name, role);
            let wanted = roles.contains(&role);
            if held && !wanted {
                self.revoke(name, role);
                changed = true;
            } else if wanted && !held {
                self.grant(name, role);
                changed = true;
            }
        }
        changed
    }

    /// Every name in any list, viewers included.
    pub fn all_viewers(&self) -> HashSet<String> {
        Role::ALL
            .iter()
            .flat_map(|r| self.list(*r).iter())
            .chain(self.viewers.iter())
            .map(|n| n.to_lowercase())
            .collect()
    }
}

/// Role flags gating an action. With no flag set everybody passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Restriction {
    pub broadcaster: bool,
    pub vips: bool,
    pub moderators: bool,
    pub staff: bool,
    pub admins: bool,
    pub global_mods: bool,
}

impl Restriction {
    pub fn only(roles: &[Role]) -> Self {
        let mut r = Self::default();
        for role in roles {
            r.set(*role, true);
        }
        r
    }

    pub fn allows(&self, role: Role) -> bool {
        match role {
            Role::Broadcaster => self.broadcaster,
            Role::Vip => self.vips,
            Role::Moderator => self.moderators,
            Role::Staff => self.staff,
            Role::Admin => self.admins,
            Role::GlobalMod => self.global_mods,
        }
    }

    pub fn set(&mut self, role: Role, on: bool) {
        let flag = match role {
            Role::Broadcaster => &mut self.broadcaster,
            Role::Vip => &mut self.vips,
            Role::Moderator => &mut self.moderators,
            Role::Staff => &mut self.staff,
            Role::Admin => &mut self.admins,
            Role::GlobalMod => &mut self.global_mods,
        };
        *flag = on;
    }

    pub fn enabled(&self) -> bool {
        self.count() > 0
    }

    pub fn count(&self) -> usize {
        Role::ALL.iter().filter(|r| self.allows(**r)).count()
    }

    /// Fails open: without any flag set, or without role data to check against, the
    /// viewer is let through. The roster is checked against the viewer's login, or
    /// their display name when no login was recorded.
    pub fn has_privilege(
        &self,
        viewer: UserId,
        directory: &UserDirectory,
        roster: Option<&ChannelRoster>,
    ) -> bool {
        if !self.enabled() {
            return true;
        }
        let Some(roster) = roster else {
            return true;
        };

        let name = directory.account_name(viewer);
        Role::ALL
            .iter()
            .any(|role| self.allows(*role) && roster.has_role(&name, *role))
    }
}
