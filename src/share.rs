//! The share/rights engine (`spec.md` §4.4): the in-memory registry of
//! exported shares, re-loaded atomically on reconfiguration.

use std::net::SocketAddr;
use std::ops::{BitAnd, BitOr};
use std::path::{Path, PathBuf};

use crate::auth::AuthClient;
use crate::error::{Error, Result, Status};
use crate::lock::PriorityLock;
use crate::principal::Principal;

/// Bitset over `{read, write, print}` (`spec.md` §3).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Rights(u32);

impl Rights {
    pub const NONE: Rights = Rights(0);
    pub const READ: Rights = Rights(0x1);
    pub const WRITE: Rights = Rights(0x2);
    pub const PRINT: Rights = Rights(0x4);

    pub fn contains(self, flag: Rights) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Rights {
    type Output = Rights;
    fn bitor(self, rhs: Rights) -> Rights {
        Rights(self.0 | rhs.0)
    }
}

impl BitAnd for Rights {
    type Output = Rights;
    fn bitand(self, rhs: Rights) -> Rights {
        Rights(self.0 & rhs.0)
    }
}

/// A share's authentication mode (`spec.md` §3).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AuthClass {
    None,
    External,
}

/// One `(principal, rights, is_group)` ACL entry (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub principal: String,
    pub rights: Rights,
    pub is_group: bool,
}

/// A named export (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct Share {
    pub name: String,
    pub local_path: PathBuf,
    pub read_only: bool,
    pub auth_class: AuthClass,
    pub acl: Vec<AclEntry>,
}

/// The whole table plus the global authentication server address, replaced
/// together so a reload is atomic with respect to both.
#[derive(Default, Clone)]
pub struct SharesSnapshot {
    pub shares: Vec<Share>,
    pub auth_server: Option<SocketAddr>,
}

/// The result of diffing an old snapshot against a new one by local path
/// (`spec.md` §4.4 "Reload").
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReloadOutcome {
    /// `(old_index, new_index)` for shares that survived but moved.
    pub rebinds: Vec<(usize, usize)>,
    /// Old indices of shares that disappeared; dependent sessions must be
    /// flagged `killed`.
    pub removed: Vec<usize>,
}

fn diff(old: &[Share], new: &[Share]) -> ReloadOutcome {
    let mut outcome = ReloadOutcome::default();
    for (old_index, old_share) in old.iter().enumerate() {
        match new.iter().position(|s| s.local_path == old_share.local_path) {
            Some(new_index) if new_index != old_index => {
                outcome.rebinds.push((old_index, new_index));
            }
            Some(_) => {}
            None => outcome.removed.push(old_index),
        }
    }
    outcome
}

/// Guards a [`SharesSnapshot`] with the reader/writer lock primitive.
pub struct ShareTable {
    inner: PriorityLock<SharesSnapshot>,
}

impl ShareTable {
    pub fn new(snapshot: SharesSnapshot) -> Self {
        ShareTable { inner: PriorityLock::new(snapshot) }
    }

    /// Finds a share by its case-insensitive display name.
    pub async fn find_by_name(&self, name: &str) -> Option<(usize, Share)> {
        let snapshot = self.inner.read().await;
        snapshot
            .shares
            .iter()
            .enumerate()
            .find(|(_, s)| s.name.eq_ignore_ascii_case(name))
            .map(|(i, s)| (i, s.clone()))
    }

    pub async fn get(&self, index: usize) -> Option<Share> {
        self.inner.read().await.shares.get(index).cloned()
    }

    pub async fn auth_server(&self) -> Option<SocketAddr> {
        self.inner.read().await.auth_server
    }

    /// Replaces the whole table, returning the diff that the session layer
    /// applies to its session list (`spec.md` §4.4).
    pub async fn reload(&self, new_snapshot: SharesSnapshot) -> ReloadOutcome {
        let mut snapshot = self.inner.write().await;
        let outcome = diff(&snapshot.shares, &new_snapshot.shares);
        *snapshot = new_snapshot;
        outcome
    }
}

/// Computes the effective rights for `principal` mounting share `index`,
/// authenticating against `auth_client` when the share requires it
/// (`spec.md` §4.4 "Rights computation at mount").
pub async fn compute_rights(
    share: &Share,
    user: &str,
    token: Option<&[u8; 128]>,
    auth_client: Option<&AuthClient>,
) -> Result<(Rights, Principal)> {
    match share.auth_class {
        AuthClass::None => {
            let rights = Rights::READ | if share.read_only { Rights::NONE } else { Rights::WRITE };
            Ok((rights, Principal::anonymous()))
        }
        AuthClass::External => {
            let auth_client = auth_client.ok_or(Error::Status(Status::Access))?;
            let token = token.ok_or(Error::Status(Status::Access))?;
            auth_client.authenticate(user, token).await.map_err(|_| Error::Status(Status::Access))?;

            let groups = auth_client.which_groups(user).await.unwrap_or_default();
            let principal = Principal::new(user.to_string(), groups);

            let mut union = Rights::NONE;
            for entry in &share.acl {
                if !entry.is_group && principal.matches(&entry.principal, false) {
                    union = union | entry.rights;
                }
            }
            for entry in &share.acl {
                if entry.is_group && principal.matches(&entry.principal, true) {
                    union = union | entry.rights;
                }
            }

            if union.is_empty() {
                return Err(Error::Status(Status::Access));
            }

            let rights = if share.read_only { union & Rights::READ } else { union };
            Ok((rights, principal))
        }
    }
}

pub fn root_exists(local_path: &Path) -> bool {
    local_path.is_dir()
}
