use crate::{errors::config_error::ConfigError, models::role::Role};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
}

impl Resource {
    pub fn new(name: &str) -> Self {
        Resource {
            name: name.to_string(),
        }
    }
}

/// Resources handed to whoever claims each role, in display order.
#[derive(Clone, Debug)]
pub struct ResourceBundles {
    bundles: HashMap<Role, Vec<Resource>>,
}

impl ResourceBundles {
    /// Parses a `{"police": [{"name": ...}], ...}` document. Every role needs a bundle.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let bundles: HashMap<Role, Vec<Resource>> =
            serde_json::from_str(json).map_err(ConfigError::InvalidResources)?;

        if let Some(role) = Role::ALL.into_iter().find(|role| !bundles.contains_key(role)) {
            return Err(ConfigError::MissingBundle(role));
        }

        Ok(ResourceBundles { bundles })
    }

    pub fn bundle(&self, role: Role) -> &[Resource] {
        self.bundles.get(&role).map(Vec::as_slice).unwrap_or_default()
    }
}

impl Default for ResourceBundles {
    fn default() -> Self {
        let bundle = |names: &[&str]| -> Vec<Resource> {
            names.iter().map(|name| Resource::new(name)).collect()
        };

        let bundles = HashMap::from([
            (
                Role::Police,
                bundle(&["Police Car", "Patrol Officers", "Traffic Barricades"]),
            ),
            (
                Role::Hazmat,
                bundle(&["Hazmat Truck", "Containment Suits", "Decontamination Unit"]),
            ),
            (
                Role::Fire,
                bundle(&["Fire Engine", "Ladder Truck", "Water Tanker"]),
            ),
        ]);

        ResourceBundles { bundles }
    }
}
