//! Network state store: concurrent, casefolded maps of users and channels
//! (spec.md §3 "UserRecord"/"ChannelRecord"/"NetworkInfo", §4.4).
//!
//! Only the session task (and the well-defined service tasks named in
//! spec.md §5 — the case-mapping switch and the WHO/WHOX reply folder) may
//! write here; reads are lock-free via [`dashmap`]'s sharded maps, so
//! handler code running off the session task can read freely while the
//! session drives mutations.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use dashmap::DashMap;
use uuid::Uuid;

use crate::casemap::CaseMapping;
use crate::error::SessionError;

/// Stable identity of a [`UserRecord`]. Stays constant across nick changes;
/// only the QUIT/disconnect lifecycle invalidates it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(Uuid);

impl UserId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// A known user on the network (spec.md §3 "UserRecord").
#[derive(Clone, Debug)]
pub struct UserRecord {
    id: UserId,
    nick: String,
    ident: String,
    host: String,
    account: Option<String>,
    realname: String,
    away: bool,
    modes: HashSet<char>,
    /// Channel membership: folded channel key -> prefix symbols (empty
    /// string if the user holds no channel privileges there).
    channels: HashMap<String, String>,
}

impl UserRecord {
    fn new(nick: String, ident: String, host: String) -> Self {
        Self {
            id: UserId::new(),
            nick,
            ident,
            host,
            account: None,
            realname: String::new(),
            away: false,
            modes: HashSet::new(),
            channels: HashMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn nick(&self) -> &str {
        &self.nick
    }

    #[must_use]
    pub fn ident(&self) -> &str {
        &self.ident
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    #[must_use]
    pub fn realname(&self) -> &str {
        &self.realname
    }

    #[must_use]
    pub fn is_away(&self) -> bool {
        self.away
    }

    #[must_use]
    pub fn modes(&self) -> &HashSet<char> {
        &self.modes
    }

    /// Channel membership as folded-channel-key -> prefix-symbols pairs.
    #[must_use]
    pub fn channels(&self) -> &HashMap<String, String> {
        &self.channels
    }

    #[must_use]
    pub fn mask(&self) -> String {
        format!("{}!{}@{}", self.nick, self.ident, self.host)
    }
}

/// A known channel on the network (spec.md §3 "ChannelRecord").
#[derive(Clone, Debug)]
pub struct ChannelRecord {
    /// Display name, preserving the casing the server used.
    name: String,
    topic: Option<String>,
    /// Mode letter -> optional value (e.g. `k` -> key, `l` -> limit).
    modes: HashMap<char, Option<String>>,
    /// Members: user id -> prefix symbols held in this channel.
    members: HashMap<UserId, String>,
}

impl ChannelRecord {
    fn new(name: String) -> Self {
        Self {
            name,
            topic: None,
            modes: HashMap::new(),
            members: HashMap::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    pub fn set_topic(&mut self, topic: Option<String>) {
        self.topic = topic;
    }

    #[must_use]
    pub fn modes(&self) -> &HashMap<char, Option<String>> {
        &self.modes
    }

    pub fn set_mode(&mut self, letter: char, value: Option<String>) {
        self.modes.insert(letter, value);
    }

    pub fn unset_mode(&mut self, letter: char) {
        self.modes.remove(&letter);
    }

    #[must_use]
    pub fn members(&self) -> &HashMap<UserId, String> {
        &self.members
    }

    #[must_use]
    pub fn prefix_of(&self, user: UserId) -> Option<&str> {
        self.members.get(&user).map(String::as_str)
    }
}

/// A read-only projection of negotiated network facts (spec.md §3
/// "NetworkInfo").
#[derive(Clone, Debug, Default)]
pub struct NetworkInfo {
    pub self_nick: String,
    pub self_ident: String,
    pub self_host: String,
    pub isupport: HashMap<String, Option<String>>,
    pub chantypes: Vec<char>,
    pub prefix_symbols: Vec<char>,
    pub case_mapping: CaseMapping,
}

/// The concurrent, casefolded store of everything the session currently
/// knows about the network (spec.md §4.4).
pub struct NetworkState {
    case_mapping: RwLock<CaseMapping>,
    /// folded nick -> user id, plus the full record keyed by id so a
    /// rename only has to touch the nick index, not every channel entry.
    users_by_nick: DashMap<String, UserId>,
    users: DashMap<UserId, UserRecord>,
    users_by_account: DashMap<String, HashSet<UserId>>,
    channels: DashMap<String, ChannelRecord>,
    info: RwLock<NetworkInfo>,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            case_mapping: RwLock::new(CaseMapping::default()),
            users_by_nick: DashMap::new(),
            users: DashMap::new(),
            users_by_account: DashMap::new(),
            channels: DashMap::new(),
            info: RwLock::new(NetworkInfo::default()),
        }
    }

    #[must_use]
    pub fn case_mapping(&self) -> CaseMapping {
        *self.case_mapping.read().unwrap()
    }

    fn fold(&self, s: &str) -> String {
        self.case_mapping().fold(s)
    }

    /// A read-only snapshot of the network-wide facts (spec.md §3
    /// "NetworkInfo").
    #[must_use]
    pub fn info(&self) -> NetworkInfo {
        self.info.read().unwrap().clone()
    }

    /// Replace the negotiated network info wholesale (called by the
    /// session after parsing RPL_ISUPPORT / RPL_WELCOME).
    pub fn set_info(&self, info: NetworkInfo) {
        *self.info.write().unwrap() = info;
    }

    // --- Users -----------------------------------------------------------

    /// Look up an existing user by nick, creating one if none exists yet
    /// (spec.md §4.4: user records are created when first observed in
    /// NAMES/WHO/JOIN).
    pub fn get_or_add_user(&self, nick: &str, ident: &str, host: &str) -> UserId {
        let key = self.fold(nick);
        if let Some(id) = self.users_by_nick.get(&key) {
            return *id;
        }
        let record = UserRecord::new(nick.to_owned(), ident.to_owned(), host.to_owned());
        let id = record.id();
        self.users_by_nick.insert(key, id);
        self.users.insert(id, record);
        id
    }

    #[must_use]
    pub fn get_user_by_nick(&self, nick: &str) -> Option<UserRecord> {
        let key = self.fold(nick);
        let id = *self.users_by_nick.get(&key)?;
        self.users.get(&id).map(|r| r.clone())
    }

    #[must_use]
    pub fn get_user(&self, id: UserId) -> Option<UserRecord> {
        self.users.get(&id).map(|r| r.clone())
    }

    #[must_use]
    pub fn get_users_by_account(&self, account: &str) -> Vec<UserRecord> {
        let Some(ids) = self.users_by_account.get(account) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.users.get(id).map(|r| r.clone()))
            .collect()
    }

    /// Rename a user (NICK change). If the folded keys are identical (a
    /// casing-only change under the active mapping), only the display
    /// nick is updated. Otherwise the new key must be free; a collision
    /// indicates server protocol violation or local corruption
    /// (spec.md §4.4).
    pub fn rename_user(&self, old_nick: &str, new_nick: &str) -> Result<(), SessionError> {
        let old_key = self.fold(old_nick);
        let new_key = self.fold(new_nick);

        let id = *self
            .users_by_nick
            .get(&old_key)
            .ok_or_else(|| SessionError::BadState(format!("rename of unknown nick {old_nick}")))?;

        if old_key == new_key {
            if let Some(mut record) = self.users.get_mut(&id) {
                record.nick = new_nick.to_owned();
            }
            return Ok(());
        }

        if self.users_by_nick.contains_key(&new_key) {
            return Err(SessionError::BadState(format!(
                "rename target nick {new_nick} already occupied"
            )));
        }

        self.users_by_nick.insert(new_key, id);
        self.users_by_nick.remove(&old_key);
        if let Some(mut record) = self.users.get_mut(&id) {
            record.nick = new_nick.to_owned();
        }
        Ok(())
    }

    /// Update a user's account name, maintaining the account index
    /// (`ACCOUNT`/extended-join/`account-notify`).
    pub fn set_account(&self, id: UserId, account: Option<String>) {
        if let Some(mut record) = self.users.get_mut(&id) {
            if let Some(old) = record.account.take() {
                if let Some(mut set) = self.users_by_account.get_mut(&old) {
                    set.remove(&id);
                }
            }
            if let Some(new) = &account {
                self.users_by_account
                    .entry(new.clone())
                    .or_default()
                    .insert(id);
            }
            record.account = account;
        }
    }

    pub fn set_away(&self, id: UserId, away: bool) {
        if let Some(mut record) = self.users.get_mut(&id) {
            record.away = away;
        }
    }

    pub fn set_realname(&self, id: UserId, realname: String) {
        if let Some(mut record) = self.users.get_mut(&id) {
            record.realname = realname;
        }
    }

    pub fn set_host(&self, id: UserId, ident: String, host: String) {
        if let Some(mut record) = self.users.get_mut(&id) {
            record.ident = ident;
            record.host = host;
        }
    }

    pub fn add_user_mode(&self, id: UserId, mode: char) {
        if let Some(mut record) = self.users.get_mut(&id) {
            record.modes.insert(mode);
        }
    }

    pub fn remove_user_mode(&self, id: UserId, mode: char) {
        if let Some(mut record) = self.users.get_mut(&id) {
            record.modes.remove(&mode);
        }
    }

    /// Remove a user entirely (QUIT or disconnect), including their
    /// membership in every channel (invariant: a user appears in a
    /// channel's members iff that channel is in the user's channel map).
    pub fn remove_user(&self, id: UserId) {
        if let Some((_, record)) = self.users.remove(&id) {
            self.users_by_nick.remove(&self.fold(&record.nick));
            if let Some(account) = &record.account {
                if let Some(mut set) = self.users_by_account.get_mut(account) {
                    set.remove(&id);
                }
            }
            for chan_key in record.channels.keys() {
                if let Some(mut chan) = self.channels.get_mut(chan_key) {
                    chan.members.remove(&id);
                }
            }
        }
    }

    // --- Channels ----------------------------------------------------------

    /// Look up an existing channel by name, creating one if none exists
    /// yet (JOIN/NAMES).
    pub fn get_or_add_channel(&self, name: &str) -> String {
        let key = self.fold(name);
        self.channels
            .entry(key.clone())
            .or_insert_with(|| ChannelRecord::new(name.to_owned()));
        key
    }

    #[must_use]
    pub fn get_channel(&self, name: &str) -> Option<ChannelRecord> {
        let key = self.fold(name);
        self.channels.get(&key).map(|c| c.clone())
    }

    /// Add `user` to `channel` with the given prefix symbols, maintaining
    /// both sides of the membership invariant.
    pub fn add_member(&self, channel: &str, user: UserId, prefixes: &str) {
        let key = self.get_or_add_channel(channel);
        if let Some(mut chan) = self.channels.get_mut(&key) {
            chan.members.insert(user, prefixes.to_owned());
        }
        if let Some(mut record) = self.users.get_mut(&user) {
            record.channels.insert(key, prefixes.to_owned());
        }
    }

    pub fn remove_member(&self, channel: &str, user: UserId) {
        let key = self.fold(channel);
        if let Some(mut chan) = self.channels.get_mut(&key) {
            chan.members.remove(&user);
        }
        if let Some(mut record) = self.users.get_mut(&user) {
            record.channels.remove(&key);
        }
    }

    pub fn set_member_prefixes(&self, channel: &str, user: UserId, prefixes: &str) {
        let key = self.fold(channel);
        if let Some(mut chan) = self.channels.get_mut(&key) {
            chan.members.insert(user, prefixes.to_owned());
        }
        if let Some(mut record) = self.users.get_mut(&user) {
            record.channels.insert(key, prefixes.to_owned());
        }
    }

    pub fn set_topic(&self, channel: &str, topic: Option<String>) {
        let key = self.fold(channel);
        if let Some(mut chan) = self.channels.get_mut(&key) {
            chan.set_topic(topic);
        }
    }

    pub fn set_channel_mode(&self, channel: &str, letter: char, value: Option<String>) {
        let key = self.fold(channel);
        if let Some(mut chan) = self.channels.get_mut(&key) {
            chan.set_mode(letter, value);
        }
    }

    pub fn unset_channel_mode(&self, channel: &str, letter: char) {
        let key = self.fold(channel);
        if let Some(mut chan) = self.channels.get_mut(&key) {
            chan.unset_mode(letter);
        }
    }

    /// Destroy a channel (PART/KICK-induced emptiness, or disconnect),
    /// clearing the membership side of the invariant on every remaining
    /// member.
    pub fn remove_channel(&self, channel: &str) {
        let key = self.fold(channel);
        if let Some((_, record)) = self.channels.remove(&key) {
            for user_id in record.members.keys() {
                if let Some(mut user) = self.users.get_mut(user_id) {
                    user.channels.remove(&key);
                }
            }
        }
    }

    /// An explicit rename of one channel's key without a preceding
    /// JOIN/PART, e.g. `draft/channel-rename` (spec.md §9 open question,
    /// resolved as its own operation rather than folded into
    /// `set_case_mapping`).
    pub fn rename_channel(&self, old_name: &str, new_name: &str) -> Result<(), SessionError> {
        let old_key = self.fold(old_name);
        let new_key = self.fold(new_name);

        if old_key == new_key {
            if let Some(mut chan) = self.channels.get_mut(&old_key) {
                chan.name = new_name.to_owned();
            }
            return Ok(());
        }

        if self.channels.contains_key(&new_key) {
            return Err(SessionError::BadState(format!(
                "channel rename target {new_name} already occupied"
            )));
        }

        let Some((_, mut record)) = self.channels.remove(&old_key) else {
            return Err(SessionError::BadState(format!(
                "rename of unknown channel {old_name}"
            )));
        };
        record.name = new_name.to_owned();
        let member_ids: Vec<UserId> = record.members.keys().copied().collect();
        self.channels.insert(new_key.clone(), record);

        for id in member_ids {
            if let Some(mut user) = self.users.get_mut(&id) {
                if let Some(prefixes) = user.channels.remove(&old_key) {
                    user.channels.insert(new_key.clone(), prefixes);
                }
            }
        }
        Ok(())
    }

    /// Swap the active case mapping, rekeying every existing user and
    /// channel entry (spec.md §3 "Casefolding": "potentially lengthy —
    /// documented side effect").
    pub fn set_case_mapping(&self, mapping: CaseMapping) {
        *self.case_mapping.write().unwrap() = mapping;

        let old_nick_entries: Vec<(String, UserId)> = self
            .users_by_nick
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        self.users_by_nick.clear();
        for (_, id) in old_nick_entries {
            if let Some(record) = self.users.get(&id) {
                self.users_by_nick.insert(mapping.fold(&record.nick), id);
            }
        }

        let old_channels: Vec<(String, ChannelRecord)> = self
            .channels
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        self.channels.clear();
        for (_, record) in old_channels {
            let new_key = mapping.fold(&record.name);
            self.channels.insert(new_key, record);
        }

        // User-side channel-key maps are keyed on the old folded form,
        // which no longer resolves under the new mapping; reconcile them
        // against the rekeyed channel table by display name (every
        // ChannelRecord retains its display name across the rekey).
        let display_to_new_key: HashMap<String, String> = self
            .channels
            .iter()
            .map(|e| (e.name.clone(), e.key().clone()))
            .collect();
        for mut entry in self.users.iter_mut() {
            let mut rekeyed = HashMap::new();
            for chan in self.channels.iter() {
                if chan.members.contains_key(&entry.id) {
                    if let Some(new_key) = display_to_new_key.get(&chan.name) {
                        rekeyed.insert(new_key.clone(), chan.members[&entry.id].clone());
                    }
                }
            }
            entry.channels = rekeyed;
        }
    }

    /// Drop every known user and channel (disconnect).
    pub fn clear_all(&self) {
        self.users.clear();
        self.users_by_nick.clear();
        self.users_by_account.clear();
        self.channels.clear();
    }
}

/// Monotonic counter used to generate WHOX request tokens, kept process
/// local so concurrent joins never collide on the same token.
static WHOX_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Allocate the next WHOX request token (spec.md §4.6: `WHO #chan
/// %tcuhnfar,<token>`).
#[must_use]
pub fn next_whox_token() -> u64 {
    WHOX_TOKEN.fetch_add(1, Ordering::Relaxed)
}
