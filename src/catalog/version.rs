use serde::{Deserialize, Serialize};

/// Version number and activation flag a save will write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionPlan {
    pub version: i64,
    pub is_active: bool,
}

impl VersionPlan {
    /// Plan the next save given the stored `(version, is_active)`, if any.
    ///
    /// A re-upload bumps the version and keeps the activation state. A new
    /// tree starts at version 1, inactive, so an administrator has to opt in.
    pub fn next(existing: Option<(i64, bool)>) -> Self {
        match existing {
            Some((version, is_active)) => Self {
                version: version + 1,
                is_active,
            },
            None => Self {
                version: 1,
                is_active: false,
            },
        }
    }
}
