use serde::{Deserialize, Serialize};

/// Build recipe for a VM disk image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSpec {
    pub variant: String,
    pub release: String,

    #[serde(default)]
    pub format: String,

    #[serde(default)]
    pub size: String,

    #[serde(default)]
    pub mirror: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlays: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<String>,
}

impl ImageSpec {
    pub fn set_defaults(&mut self) {
        if self.format.is_empty() {
            self.format = "qcow2".into();
        }
        if self.size.is_empty() {
            self.size = "5G".into();
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.variant.is_empty() {
            problems.push("image variant is required".to_string());
        }
        if self.release.is_empty() {
            problems.push("image release is required".to_string());
        }
        if !matches!(self.format.as_str(), "" | "raw" | "qcow2") {
            problems.push(format!("unsupported image format {}", self.format));
        }
        problems
    }
}
