//! Firebase configuration validation.
//!
//! Validation runs once at startup and yields either a complete
//! `FirebaseConfig` or a `ConfigIssues` report listing every variable that
//! is missing, empty, or still holds unsubstituted deployment template
//! syntax.

use std::fmt;

/// Required configuration variables, in report order.
pub const REQUIRED_VARS: [&str; 3] = [
    "FIREBASE_API_KEY",
    "FIREBASE_AUTH_DOMAIN",
    "FIREBASE_PROJECT_ID",
];

/// Optional configuration variables.
pub const OPTIONAL_VARS: [&str; 3] = [
    "FIREBASE_STORAGE_BUCKET",
    "FIREBASE_MESSAGING_SENDER_ID",
    "FIREBASE_APP_ID",
];

/// Markers left behind when a deployment platform did not substitute a value.
const TEMPLATE_MARKERS: [&str; 3] = ["${{", "${environment", "REPLACE_WITH_"];

/// Placeholder values copied from sample env files.
const PLACEHOLDER_VALUES: [&str; 2] = ["your-api-key", "your-firebase-project-id"];

/// Validated Firebase web configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,
}

/// Every problem found while validating the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigIssues {
    /// Required variables that are not set
    pub missing: Vec<String>,
    /// Required variables set to an empty string
    pub empty: Vec<String>,
    /// Required variables holding template syntax or a placeholder
    pub invalid: Vec<String>,
}

impl ConfigIssues {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.empty.is_empty() && self.invalid.is_empty()
    }
}

impl fmt::Display for ConfigIssues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Firebase authentication is not configured.")?;

        let sections = [
            ("Missing environment variables", &self.missing),
            ("Empty environment variables (set but no value)", &self.empty),
            ("Invalid environment variables (contain template syntax)", &self.invalid),
        ];
        for (title, vars) in sections {
            if vars.is_empty() {
                continue;
            }
            writeln!(f, "{}:", title)?;
            for var in vars {
                writeln!(f, "  - {}", var)?;
            }
        }

        write!(
            f,
            "Set {} to real values and restart the application.",
            REQUIRED_VARS.join(", ")
        )
    }
}

impl std::error::Error for ConfigIssues {}

enum Check {
    Valid(String),
    Missing,
    Empty,
    Invalid,
}

fn check(value: Option<String>) -> Check {
    match value {
        None => Check::Missing,
        Some(v) if v.is_empty() => Check::Empty,
        Some(v)
            if TEMPLATE_MARKERS.iter().any(|m| v.contains(m))
                || PLACEHOLDER_VALUES.contains(&v.as_str()) =>
        {
            Check::Invalid
        }
        Some(v) => Check::Valid(v),
    }
}

impl FirebaseConfig {
    /// Validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigIssues> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Validate configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigIssues>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut issues = ConfigIssues::default();
        let mut required: Vec<String> = Vec::with_capacity(REQUIRED_VARS.len());

        for var in REQUIRED_VARS {
            match check(lookup(var)) {
                Check::Valid(v) => required.push(v),
                Check::Missing => issues.missing.push(var.to_string()),
                Check::Empty => issues.empty.push(var.to_string()),
                Check::Invalid => issues.invalid.push(var.to_string()),
            }
        }

        if !issues.is_empty() {
            return Err(issues);
        }

        let optional = |var: &str| match check(lookup(var)) {
            Check::Valid(v) => Some(v),
            _ => None,
        };

        let mut required = required.into_iter();
        match (required.next(), required.next(), required.next()) {
            (Some(api_key), Some(auth_domain), Some(project_id)) => Ok(Self {
                api_key,
                auth_domain,
                project_id,
                storage_bucket: optional(OPTIONAL_VARS[0]),
                messaging_sender_id: optional(OPTIONAL_VARS[1]),
                app_id: optional(OPTIONAL_VARS[2]),
            }),
            _ => Err(issues),
        }
    }

    /// API key prefix for diagnostics.
    pub fn api_key_preview(&self) -> String {
        let prefix: String = self.api_key.chars().take(10).collect();
        format!("{}...", prefix)
    }
}
