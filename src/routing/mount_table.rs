//! Mount table and longest-prefix resolution.
//!
//! # Responsibilities
//! - Store mounted applications keyed by optional host + path prefix
//! - Resolve a request to the most specific mount
//! - Split the request path into mount prefix and remaining path
//!
//! # Design Decisions
//! - Host matching is case-insensitive (hosts are lower-cased on both sides)
//! - Path matching is case-sensitive
//! - Prefixes never carry a trailing slash, so `/api` and `/api/` are the same mount
//! - The empty prefix mounts at the root and matches every path

use std::collections::{HashMap, HashSet};

/// Normalize a mount prefix: no trailing slash, leading slash when non-empty.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Registration key of a mount.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MountKey {
    host: Option<String>,
    prefix: String,
}

impl MountKey {
    pub fn new(host: Option<&str>, prefix: &str) -> Self {
        Self {
            host: host
                .filter(|h| !h.is_empty())
                .map(|h| h.to_ascii_lowercase()),
            prefix: normalize_prefix(prefix),
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// String the resolver compares candidates against (`host` + `prefix`).
    pub fn lookup(&self) -> String {
        match &self.host {
            Some(host) => format!("{}{}", host, self.prefix),
            None => self.prefix.clone(),
        }
    }
}

impl std::fmt::Display for MountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = if self.prefix.is_empty() { "/" } else { self.prefix.as_str() };
        match &self.host {
            Some(host) => write!(f, "{}{}", host, prefix),
            None => f.write_str(prefix),
        }
    }
}

/// A mounted application.
#[derive(Debug, Clone)]
pub struct Mount<A> {
    pub key: MountKey,
    pub app: A,
}

/// Result of a successful resolution.
#[derive(Debug)]
pub struct Resolved<'a, A> {
    pub mount: &'a Mount<A>,
    /// Path below the mount prefix; empty when the request targets the prefix itself.
    pub remaining: String,
}

/// Mapping from mount keys to applications.
#[derive(Debug, Clone)]
pub struct MountTable<A> {
    mounts: HashMap<String, Mount<A>>,
    pinned_hosts: HashSet<String>,
    hosts: HashSet<String>,
}

impl<A> Default for MountTable<A> {
    fn default() -> Self {
        Self {
            mounts: HashMap::new(),
            pinned_hosts: HashSet::new(),
            hosts: HashSet::new(),
        }
    }
}

impl<A> MountTable<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `host` in the host filter set even when no mount names it.
    pub fn pin_host(&mut self, host: &str) {
        let host = host.to_ascii_lowercase();
        self.pinned_hosts.insert(host.clone());
        self.hosts.insert(host);
    }

    /// Insert a mount, returning the one it replaced.
    pub fn insert(&mut self, key: MountKey, app: A) -> Option<Mount<A>> {
        if let Some(host) = key.host() {
            self.hosts.insert(host.to_string());
        }
        self.mounts.insert(key.lookup(), Mount { key, app })
    }

    /// Remove the mount registered under `key`.
    pub fn remove(&mut self, key: &MountKey) -> Option<Mount<A>> {
        let removed = self.mounts.remove(&key.lookup());
        if removed.is_some() {
            self.refresh_hosts();
        }
        removed
    }

    /// Remove every mount matching `predicate`.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> Vec<Mount<A>>
    where
        F: FnMut(&Mount<A>) -> bool,
    {
        let keys: Vec<String> = self
            .mounts
            .iter()
            .filter(|(_, mount)| predicate(mount))
            .map(|(lookup, _)| lookup.clone())
            .collect();
        let removed: Vec<Mount<A>> = keys
            .iter()
            .filter_map(|lookup| self.mounts.remove(lookup))
            .collect();
        if !removed.is_empty() {
            self.refresh_hosts();
        }
        removed
    }

    pub fn get(&self, key: &MountKey) -> Option<&Mount<A>> {
        self.mounts.get(&key.lookup())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mount<A>> {
        self.mounts.values()
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }

    /// Hosts that enable host-qualified matching.
    pub fn hosts(&self) -> &HashSet<String> {
        &self.hosts
    }

    /// True when at least one mount (or a pinned filter host) is host-qualified.
    pub fn host_filtering(&self) -> bool {
        !self.hosts.is_empty()
    }

    /// Resolve `path` (prefixed by `host` when `use_host` is set) to the most
    /// specific mount.
    ///
    /// The candidate is shortened one `/`-delimited segment at a time; the
    /// stripped segments accumulate into the remaining path.
    pub fn resolve(&self, host: &str, path: &str, use_host: bool) -> Option<Resolved<'_, A>> {
        let mut script = if use_host {
            format!("{}{}", host.to_ascii_lowercase(), path)
        } else {
            path.to_string()
        };
        let mut remaining = String::new();

        loop {
            if let Some(mount) = self.mounts.get(&script) {
                return Some(Resolved { mount, remaining });
            }
            let idx = script.rfind('/')?;
            remaining.insert_str(0, &script[idx..]);
            script.truncate(idx);
        }
    }

    /// Two-pass lookup: host-qualified first when host filtering is active,
    /// then host-agnostic.
    pub fn lookup(&self, host: &str, path: &str) -> Option<Resolved<'_, A>> {
        if self.host_filtering() {
            self.resolve(host, path, true)
                .or_else(|| self.resolve(host, path, false))
        } else {
            self.resolve(host, path, false)
        }
    }

    fn refresh_hosts(&mut self) {
        let mut hosts = self.pinned_hosts.clone();
        hosts.extend(
            self.mounts
                .values()
                .filter_map(|m| m.key.host().map(str::to_string)),
        );
        self.hosts = hosts;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(Option<&str>, &str, &'static str)]) -> MountTable<&'static str> {
        let mut table = MountTable::new();
        for (host, prefix, app) in entries {
            table.insert(MountKey::new(*host, prefix), *app);
        }
        table
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("/child/"), "/child");
        assert_eq!(normalize_prefix("child"), "/child");
        assert_eq!(normalize_prefix("/"), "");
        assert_eq!(normalize_prefix(""), "");
        assert_eq!(normalize_prefix("/a/b//"), "/a/b");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = table(&[(None, "/api", "short"), (None, "/api/v1", "long")]);

        let hit = table.lookup("", "/api/v1/users").unwrap();
        assert_eq!(hit.mount.app, "long");
        assert_eq!(hit.remaining, "/users");

        let hit = table.lookup("", "/api/v2/users").unwrap();
        assert_eq!(hit.mount.app, "short");
        assert_eq!(hit.remaining, "/v2/users");
    }

    #[test]
    fn test_exact_prefix_leaves_empty_remaining() {
        let table = table(&[(None, "/child", "child")]);
        let hit = table.lookup("", "/child").unwrap();
        assert_eq!(hit.remaining, "");

        let hit = table.lookup("", "/child/").unwrap();
        assert_eq!(hit.remaining, "/");
    }

    #[test]
    fn test_segment_boundaries_respected() {
        let table = table(&[(None, "/child", "child")]);
        assert!(table.lookup("", "/children").is_none());
        assert!(table.lookup("", "/other/child").is_none());
    }

    #[test]
    fn test_root_mount_catches_everything() {
        let table = table(&[(None, "/", "root"), (None, "/x", "x")]);
        let hit = table.lookup("", "/anything/else").unwrap();
        assert_eq!(hit.mount.app, "root");
        assert_eq!(hit.mount.key.prefix(), "");
        assert_eq!(hit.remaining, "/anything/else");

        assert_eq!(table.lookup("", "/x/y").unwrap().mount.app, "x");
    }

    #[test]
    fn test_host_qualified_mount_preferred() {
        let table = table(&[(Some("example.com"), "/x", "hosted"), (None, "/x", "plain")]);
        assert!(table.host_filtering());

        let hit = table.lookup("Example.COM", "/x/page").unwrap();
        assert_eq!(hit.mount.app, "hosted");
        assert_eq!(hit.remaining, "/page");

        let hit = table.lookup("other.org", "/x/page").unwrap();
        assert_eq!(hit.mount.app, "plain");
    }

    #[test]
    fn test_host_root_mount() {
        let table = table(&[(Some("example.com"), "", "site")]);
        let hit = table.lookup("example.com", "/deep/path").unwrap();
        assert_eq!(hit.mount.app, "site");
        assert_eq!(hit.remaining, "/deep/path");
        assert!(table.lookup("other.org", "/deep/path").is_none());
    }

    #[test]
    fn test_reinsert_replaces() {
        let mut table = table(&[(None, "/a", "first")]);
        let replaced = table.insert(MountKey::new(None, "/a/"), "second");
        assert_eq!(replaced.map(|m| m.app), Some("first"));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&MountKey::new(None, "a")).map(|m| m.app), Some("second"));
        assert!(table.get(&MountKey::new(Some("example.com"), "/a")).is_none());
        assert_eq!(table.lookup("", "/a/b").unwrap().mount.app, "second");
    }

    #[test]
    fn test_removing_last_hosted_mount_disables_host_filtering() {
        let mut table = table(&[(Some("example.com"), "/x", "hosted"), (None, "/y", "plain")]);
        table.remove(&MountKey::new(Some("example.com"), "/x"));
        assert!(!table.host_filtering());

        table.pin_host("filter.example");
        table.remove_where(|m| m.app == "plain");
        assert!(table.host_filtering());
        assert!(table.is_empty());
    }
}
