use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Police,
    Hazmat,
    Fire,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Police, Role::Hazmat, Role::Fire];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Police => "police",
            Role::Hazmat => "hazmat",
            Role::Fire => "fire",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_display() {
        for role in Role::ALL {
            let json = serde_json::to_string(&role).unwrap();
            assert_eq!(json, format!("\"{role}\""));
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(serde_json::from_str::<Role>("\"paramedic\"").is_err());
        assert!(serde_json::from_str::<Role>("\"Police\"").is_err());
    }
}
