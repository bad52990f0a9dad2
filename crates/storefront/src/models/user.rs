//! User domain types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nudge_core::{Email, UserId, UserRole};

/// A storefront account (domain type).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub role: UserRole,
    #[serde(flatten)]
    pub profile: UserProfile,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional contact and shipping details collected at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub department: Option<String>,
    pub whatsapp_number: Option<String>,
}

impl UserProfile {
    /// Trim every field and drop the ones left empty.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            name: non_empty(self.name),
            address: non_empty(self.address),
            city: non_empty(self.city),
            department: non_empty(self.department),
            whatsapp_number: non_empty(self.whatsapp_number),
        }
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_normalized() {
        let profile = UserProfile {
            name: Some("  Ana  ".to_string()),
            address: Some("   ".to_string()),
            ..UserProfile::default()
        }
        .normalized();

        assert_eq!(profile.name.as_deref(), Some("Ana"));
        assert_eq!(profile.address, None);
    }
}
