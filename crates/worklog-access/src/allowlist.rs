use std::collections::BTreeSet;

use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Set of operator ids allowed to use the service.
///
/// Built once from configuration and passed into the gateway by value, so
/// tests can substitute their own policy without touching process state.
pub struct AccessPolicy {
    allowed_user_ids: BTreeSet<u64>,
}

impl AccessPolicy {
    /// Parses a comma-separated id list such as `"184051,992210"`.
    ///
    /// Entries that are not purely ASCII digits are skipped with a warning
    /// rather than failing startup, matching how a blank or partially filled
    /// allowlist variable should behave: nobody is authorized by accident.
    pub fn from_id_list(raw: &str) -> Self {
        let mut allowed_user_ids = BTreeSet::new();
        for entry in raw.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match entry.parse::<u64>() {
                Ok(user_id) => {
                    allowed_user_ids.insert(user_id);
                }
                Err(_) => {
                    warn!(entry, "ignoring non-numeric allowlist entry");
                }
            }
        }
        Self { allowed_user_ids }
    }

    /// Builds a policy from explicit ids; used by tests and embedders.
    pub fn from_ids(ids: impl IntoIterator<Item = u64>) -> Self {
        Self {
            allowed_user_ids: ids.into_iter().collect(),
        }
    }

    pub fn is_authorized(&self, user_id: u64) -> bool {
        self.allowed_user_ids.contains(&user_id)
    }

    pub fn is_empty(&self) -> bool {
        self.allowed_user_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.allowed_user_ids.len()
    }
}
