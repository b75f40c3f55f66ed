use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSpec {
    pub username: String,

    #[serde(default)]
    pub first_name: String,

    #[serde(default)]
    pub last_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleSpec>,
}

/// A named set of access policies. Evaluation happens outside the core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleSpec {
    pub name: String,

    #[serde(default)]
    pub policies: Vec<Policy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub resources: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,

    pub verbs: Vec<String>,
}

impl RoleSpec {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.name.is_empty() {
            problems.push("role name is required".to_string());
        }
        for (idx, policy) in self.policies.iter().enumerate() {
            if policy.resources.is_empty() || policy.verbs.is_empty() {
                problems.push(format!("policy {idx} needs at least one resource and one verb"));
            }
        }
        problems
    }
}

impl UserSpec {
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.username.is_empty() {
            problems.push("username is required".to_string());
        }
        if let Some(role) = &self.role {
            problems.extend(role.validate());
        }
        problems
    }
}
