//! A principal (`spec.md` §3): an opaque user name plus, for authenticated
//! sessions, the set of groups resolved at mount time.

/// The authenticated (or anonymous) identity behind a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user: String,
    pub groups: Vec<String>,
}

impl Principal {
    /// The anonymous principal used for shares with no authentication.
    pub fn anonymous() -> Self {
        Principal { user: String::new(), groups: Vec::new() }
    }

    pub fn new(user: String, groups: Vec<String>) -> Self {
        Principal { user, groups }
    }

    /// Whether `name` is this principal's user name or one of its groups —
    /// used to evaluate ACL entries (`spec.md` §4.4).
    pub fn matches(&self, name: &str, is_group: bool) -> bool {
        if is_group {
            self.groups.iter().any(|g| g == name)
        } else {
            self.user == name
        }
    }
}
