use serde::Serialize;

use crate::model::{EnvProfile, EnvVariable};

/// A built-in starting point for a new profile.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Template {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub variables: &'static [(&'static str, &'static str)],
}

impl Template {
    pub fn variables(&self) -> Vec<EnvVariable> {
        self.variables
            .iter()
            .map(|(key, value)| EnvVariable::new(*key, *value))
            .collect()
    }

    /// A fresh profile holding this template's variables.
    pub fn instantiate(&self, name: Option<&str>) -> EnvProfile {
        EnvProfile::new(
            name.unwrap_or(self.name),
            Some(self.description.to_string()),
        )
        .with_variables(self.variables())
    }
}

pub const TEMPLATES: &[Template] = &[
    Template {
        id: "nodejs",
        name: "Node.js",
        description: "Common variables for Node.js development",
        variables: &[
            ("NODE_ENV", "development"),
            ("PORT", "3000"),
            ("DEBUG", "*"),
            ("LOG_LEVEL", "debug"),
        ],
    },
    Template {
        id: "react",
        name: "React",
        description: "React application variables",
        variables: &[
            ("REACT_APP_API_URL", "http://localhost:3000/api"),
            ("REACT_APP_ENV", "development"),
            ("REACT_APP_VERSION", "1.0.0"),
            ("REACT_APP_DEBUG", "true"),
        ],
    },
    Template {
        id: "vue",
        name: "Vue",
        description: "Vue application variables",
        variables: &[
            ("VUE_APP_API_URL", "http://localhost:3000/api"),
            ("VUE_APP_ENV", "development"),
            ("VUE_APP_VERSION", "1.0.0"),
            ("VUE_APP_DEBUG", "true"),
        ],
    },
    Template {
        id: "database",
        name: "Database",
        description: "Database connection settings",
        variables: &[
            ("DB_HOST", "localhost"),
            ("DB_PORT", "3306"),
            ("DB_USERNAME", "root"),
            ("DB_PASSWORD", ""),
            ("DB_DATABASE", "myapp"),
        ],
    },
    Template {
        id: "api",
        name: "API",
        description: "API client settings",
        variables: &[
            ("API_BASE_URL", "http://localhost:3000"),
            ("API_TIMEOUT", "5000"),
            ("API_KEY", ""),
            ("API_SECRET", ""),
        ],
    },
    Template {
        id: "redis",
        name: "Redis",
        description: "Redis cache settings",
        variables: &[
            ("REDIS_HOST", "localhost"),
            ("REDIS_PORT", "6379"),
            ("REDIS_PASSWORD", ""),
            ("REDIS_DB", "0"),
        ],
    },
];

/// Case-insensitive lookup by id or display name.
pub fn find(reference: &str) -> Option<&'static Template> {
    TEMPLATES.iter().find(|t| {
        t.id.eq_ignore_ascii_case(reference) || t.name.eq_ignore_ascii_case(reference)
    })
}
