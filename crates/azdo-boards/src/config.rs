//! Configuration management for azdo-boards.
//!
//! Settings are layered, lowest precedence first:
//!
//! 1. Built-in defaults
//! 2. An optional YAML file (`--config` or `AZDO_BOARDS_CONFIG`)
//! 3. A `.env` file in the working directory (never overrides real variables)
//! 4. Process environment variables
//!
//! Environment variable names are the upper-cased setting names, except the
//! personal access token which is read from `AZURE_DEVOPS_PAT`.

use crate::domain::StateCategory;
use crate::error::{ConfigError, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming the optional YAML settings file.
pub const CONFIG_PATH_ENV: &str = "AZDO_BOARDS_CONFIG";

/// Default Azure DevOps REST API version.
pub const DEFAULT_API_VERSION: &str = "7.1";

/// Default Azure DevOps service root.
pub const DEFAULT_BASE_URL: &str = "https://dev.azure.com";

/// Default cap on the number of items a listing returns.
pub const DEFAULT_MAX_RESULTS: usize = 100;

const DEFAULT_WORK_ITEM_TYPES: &str = "Bug,Task,User Story,Product Backlog Item";
const DEFAULT_ACTIVE_STATES: &str = "Active,New,In Progress,To Do,Doing";
const DEFAULT_COMPLETED_STATES: &str = "Closed,Done,Resolved";
const DEFAULT_REVIEW_STATES: &str = "Code Review,Testing,Approved";

/// Process-wide query defaults.
///
/// Threaded explicitly into query construction; core logic never reads
/// ambient configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigDefaults {
    /// Project name used for project-scope clauses.
    pub project: String,
    /// Team used for backlog queries when none is given.
    pub team: Option<String>,
    /// User used for "my work items" when none is given.
    pub user: Option<String>,
    /// Work item types applied when a call names none.
    pub work_item_types: Vec<String>,
    /// Result cap applied when a call gives none.
    pub max_results: usize,
    /// Exclude `Closed` items unless a call says otherwise.
    pub exclude_closed: bool,
    /// Exclude `Removed` items unless a call says otherwise.
    pub exclude_removed: bool,
    /// Iteration path scope applied when a call gives none.
    pub iteration_path: Option<String>,
    /// Area path scope applied when a call gives none.
    pub area_path: Option<String>,
    /// States making up the `active` category.
    pub active_states: Vec<String>,
    /// States making up the `completed` category.
    pub completed_states: Vec<String>,
    /// States making up the `review` category.
    pub review_states: Vec<String>,
    /// Whether queries are scoped to the project unless a call overrides it.
    pub enable_project_filtering: bool,
}

impl ConfigDefaults {
    /// Defaults scoped to the given project.
    pub fn for_project(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            ..Self::default()
        }
    }

    /// The configured state list for a category.
    #[must_use]
    pub fn states_for(&self, category: StateCategory) -> &[String] {
        match category {
            StateCategory::Active => &self.active_states,
            StateCategory::Completed => &self.completed_states,
            StateCategory::Review => &self.review_states,
        }
    }
}

impl Default for ConfigDefaults {
    fn default() -> Self {
        Self {
            project: String::new(),
            team: None,
            user: None,
            work_item_types: split_list(DEFAULT_WORK_ITEM_TYPES),
            max_results: DEFAULT_MAX_RESULTS,
            exclude_closed: true,
            exclude_removed: true,
            iteration_path: None,
            area_path: None,
            active_states: split_list(DEFAULT_ACTIVE_STATES),
            completed_states: split_list(DEFAULT_COMPLETED_STATES),
            review_states: split_list(DEFAULT_REVIEW_STATES),
            enable_project_filtering: true,
        }
    }
}

/// Fully resolved settings.
#[derive(Clone)]
pub struct Settings {
    /// Azure DevOps organization name.
    pub organization: String,
    /// Default project for API calls.
    pub project: String,
    personal_access_token: String,
    /// REST API version sent with every request.
    pub api_version: String,
    /// Service root, e.g. `https://dev.azure.com`.
    pub base_url: String,
    /// Query defaults.
    pub defaults: ConfigDefaults,
}

impl Settings {
    /// Settings for an organization and project with every other value defaulted.
    pub fn new(
        organization: impl Into<String>,
        project: impl Into<String>,
        personal_access_token: impl Into<String>,
    ) -> Self {
        let project = project.into();
        Self {
            organization: organization.into(),
            defaults: ConfigDefaults::for_project(project.clone()),
            project,
            personal_access_token: personal_access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Replace the service root (used to point at a test server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replace the query defaults, keeping the project scope in sync.
    #[must_use]
    pub fn with_defaults(mut self, defaults: ConfigDefaults) -> Self {
        self.defaults = ConfigDefaults {
            project: self.project.clone(),
            ..defaults
        };
        self
    }

    /// The personal access token.
    #[must_use]
    pub fn personal_access_token(&self) -> &str {
        &self.personal_access_token
    }

    /// Value for the `Authorization` header (basic auth with an empty user).
    #[must_use]
    pub fn auth_header(&self) -> String {
        let token = base64::engine::general_purpose::STANDARD
            .encode(format!(":{}", self.personal_access_token));
        format!("Basic {token}")
    }

    /// Load settings from every configured source.
    ///
    /// `path` takes precedence over `AZDO_BOARDS_CONFIG`; with neither, only
    /// `.env` and the environment are consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, a required setting
    /// is missing, or a value cannot be parsed.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(env_file) => debug!(path = %env_file.display(), "Loaded .env file"),
            Err(e) if e.not_found() => {}
            Err(e) => {
                return Err(ConfigError::File {
                    path: ".env".to_string(),
                    reason: e.to_string(),
                }
                .into());
            }
        }

        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from));

        let contents = match &path {
            Some(path) => {
                debug!(path = %path.display(), "Reading settings file");
                let text = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| ConfigError::File {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                Some((path.display().to_string(), text))
            }
            None => None,
        };

        let settings = Self::from_sources(
            contents.as_ref().map(|(p, text)| (p.as_str(), text.as_str())),
            |key| std::env::var(key).ok(),
        )?;
        Ok(settings)
    }

    /// Resolve settings from an optional `(path, yaml)` file and an
    /// environment lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid, a required setting is missing,
    /// or a value cannot be parsed.
    pub fn from_sources(
        file: Option<(&str, &str)>,
        env: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut layer = match file {
            Some((path, text)) => {
                serde_yaml::from_str::<SettingsLayer>(text).map_err(|e| ConfigError::File {
                    path: path.to_string(),
                    reason: e.to_string(),
                })?
            }
            None => SettingsLayer::default(),
        };
        layer.apply_env(&env)?;
        layer.resolve()
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("organization", &self.organization)
            .field("project", &self.project)
            .field("personal_access_token", &"<redacted>")
            .field("api_version", &self.api_version)
            .field("base_url", &self.base_url)
            .field("defaults", &self.defaults)
            .finish()
    }
}

/// A list given either as a comma-separated string or a YAML sequence.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ListValue {
    Csv(String),
    Items(Vec<String>),
}

impl ListValue {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::Csv(s) => split_list(&s),
            Self::Items(items) => items
                .into_iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// One partially-specified layer of settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct SettingsLayer {
    organization: Option<String>,
    project: Option<String>,
    #[serde(alias = "azure_devops_pat")]
    personal_access_token: Option<String>,
    api_version: Option<String>,
    base_url: Option<String>,
    default_team: Option<String>,
    default_user: Option<String>,
    default_work_item_types: Option<ListValue>,
    default_max_results: Option<usize>,
    exclude_closed: Option<bool>,
    exclude_removed: Option<bool>,
    default_iteration_path: Option<String>,
    default_area_path: Option<String>,
    default_active_states: Option<ListValue>,
    default_completed_states: Option<ListValue>,
    default_review_states: Option<ListValue>,
    enable_project_filtering: Option<bool>,
}

impl SettingsLayer {
    fn apply_env(
        &mut self,
        env: &impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<(), ConfigError> {
        let text = |key: &str| {
            env(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        overlay(&mut self.organization, text("ORGANIZATION"));
        overlay(&mut self.project, text("PROJECT"));
        overlay(&mut self.personal_access_token, text("AZURE_DEVOPS_PAT"));
        overlay(&mut self.api_version, text("API_VERSION"));
        overlay(&mut self.base_url, text("BASE_URL"));
        overlay(&mut self.default_team, text("DEFAULT_TEAM"));
        overlay(&mut self.default_user, text("DEFAULT_USER"));
        overlay(&mut self.default_iteration_path, text("DEFAULT_ITERATION_PATH"));
        overlay(&mut self.default_area_path, text("DEFAULT_AREA_PATH"));

        overlay(
            &mut self.default_work_item_types,
            text("DEFAULT_WORK_ITEM_TYPES").map(ListValue::Csv),
        );
        overlay(
            &mut self.default_active_states,
            text("DEFAULT_ACTIVE_STATES").map(ListValue::Csv),
        );
        overlay(
            &mut self.default_completed_states,
            text("DEFAULT_COMPLETED_STATES").map(ListValue::Csv),
        );
        overlay(
            &mut self.default_review_states,
            text("DEFAULT_REVIEW_STATES").map(ListValue::Csv),
        );

        if let Some(value) = text("DEFAULT_MAX_RESULTS") {
            let parsed = value.parse().map_err(|_| ConfigError::InvalidValue {
                key: "DEFAULT_MAX_RESULTS",
                value,
            })?;
            self.default_max_results = Some(parsed);
        }
        if let Some(value) = text("EXCLUDE_CLOSED") {
            self.exclude_closed = Some(parse_bool("EXCLUDE_CLOSED", value)?);
        }
        if let Some(value) = text("EXCLUDE_REMOVED") {
            self.exclude_removed = Some(parse_bool("EXCLUDE_REMOVED", value)?);
        }
        if let Some(value) = text("ENABLE_PROJECT_FILTERING") {
            self.enable_project_filtering = Some(parse_bool("ENABLE_PROJECT_FILTERING", value)?);
        }

        Ok(())
    }

    fn resolve(self) -> std::result::Result<Settings, ConfigError> {
        let organization = required(self.organization, "ORGANIZATION")?;
        let project = required(self.project, "PROJECT")?;
        let personal_access_token = required(self.personal_access_token, "AZURE_DEVOPS_PAT")?;

        let fallback = ConfigDefaults::default();
        let defaults = ConfigDefaults {
            project: project.clone(),
            team: non_empty(self.default_team),
            user: non_empty(self.default_user),
            work_item_types: self
                .default_work_item_types
                .map_or(fallback.work_item_types, ListValue::into_vec),
            max_results: self.default_max_results.unwrap_or(fallback.max_results),
            exclude_closed: self.exclude_closed.unwrap_or(fallback.exclude_closed),
            exclude_removed: self.exclude_removed.unwrap_or(fallback.exclude_removed),
            iteration_path: non_empty(self.default_iteration_path),
            area_path: non_empty(self.default_area_path),
            active_states: self
                .default_active_states
                .map_or(fallback.active_states, ListValue::into_vec),
            completed_states: self
                .default_completed_states
                .map_or(fallback.completed_states, ListValue::into_vec),
            review_states: self
                .default_review_states
                .map_or(fallback.review_states, ListValue::into_vec),
            enable_project_filtering: self
                .enable_project_filtering
                .unwrap_or(fallback.enable_project_filtering),
        };

        Ok(Settings {
            organization,
            project,
            personal_access_token,
            api_version: non_empty(self.api_version)
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            base_url: non_empty(self.base_url).map_or_else(
                || DEFAULT_BASE_URL.to_string(),
                |url| url.trim_end_matches('/').to_string(),
            ),
            defaults,
        })
    }
}

fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn required(value: Option<String>, key: &'static str) -> std::result::Result<String, ConfigError> {
    non_empty(value).ok_or(ConfigError::Missing(key))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_bool(key: &'static str, value: String) -> std::result::Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value }),
    }
}

/// Split a comma-separated list, trimming entries and dropping empty ones.
#[must_use]
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("ORGANIZATION", "contoso"),
        ("PROJECT", "Fabrikam"),
        ("AZURE_DEVOPS_PAT", "secret"),
    ];

    #[test]
    fn test_defaults_from_environment_only() {
        let settings = Settings::from_sources(None, env_of(&REQUIRED)).unwrap();

        assert_eq!(settings.organization, "contoso");
        assert_eq!(settings.project, "Fabrikam");
        assert_eq!(settings.api_version, "7.1");
        assert_eq!(settings.base_url, "https://dev.azure.com");
        assert_eq!(settings.defaults.project, "Fabrikam");
        assert_eq!(
            settings.defaults.work_item_types,
            vec!["Bug", "Task", "User Story", "Product Backlog Item"]
        );
        assert_eq!(settings.defaults.max_results, 100);
        assert!(settings.defaults.exclude_closed);
        assert!(settings.defaults.exclude_removed);
        assert!(settings.defaults.enable_project_filtering);
        assert_eq!(settings.defaults.iteration_path, None);
    }

    #[rstest]
    #[case::organization("ORGANIZATION")]
    #[case::project("PROJECT")]
    #[case::token("AZURE_DEVOPS_PAT")]
    fn test_missing_required_setting(#[case] missing: &str) {
        let pairs: Vec<_> = REQUIRED.into_iter().filter(|(k, _)| *k != missing).collect();
        let err = Settings::from_sources(None, env_of(&pairs)).unwrap_err();

        match err {
            ConfigError::Missing(key) => assert_eq!(key, missing),
            other => panic!("Expected Missing, got {other:?}"),
        }
    }

    #[rstest]
    #[case::true_word("true", true)]
    #[case::one("1", true)]
    #[case::yes_upper("YES", true)]
    #[case::off("off", false)]
    #[case::zero("0", false)]
    fn test_boolean_parsing(#[case] raw: &str, #[case] expected: bool) {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("EXCLUDE_CLOSED", raw));
        let settings = Settings::from_sources(None, env_of(&pairs)).unwrap();
        assert_eq!(settings.defaults.exclude_closed, expected);
    }

    #[test]
    fn test_invalid_boolean_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ENABLE_PROJECT_FILTERING", "maybe"));
        let err = Settings::from_sources(None, env_of(&pairs)).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "ENABLE_PROJECT_FILTERING",
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_max_results_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEFAULT_MAX_RESULTS", "lots"));
        assert!(Settings::from_sources(None, env_of(&pairs)).is_err());
    }

    #[test]
    fn test_environment_overrides_file() {
        let yaml = "\
organization: from-file
project: FileProject
personal_access_token: file-token
default_max_results: 25
default_work_item_types:
  - Epic
  - Feature
default_iteration_path: 'Fabrikam\\Sprint 1'
";
        let env = env_of(&[("PROJECT", "EnvProject"), ("DEFAULT_MAX_RESULTS", "50")]);
        let settings = Settings::from_sources(Some(("boards.yaml", yaml)), env).unwrap();

        assert_eq!(settings.organization, "from-file");
        assert_eq!(settings.project, "EnvProject");
        assert_eq!(settings.defaults.project, "EnvProject");
        assert_eq!(settings.defaults.max_results, 50);
        assert_eq!(settings.defaults.work_item_types, vec!["Epic", "Feature"]);
        assert_eq!(
            settings.defaults.iteration_path.as_deref(),
            Some("Fabrikam\\Sprint 1")
        );
    }

    #[test]
    fn test_comma_lists_are_trimmed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEFAULT_ACTIVE_STATES", " Active , New,, Doing "));
        let settings = Settings::from_sources(None, env_of(&pairs)).unwrap();
        assert_eq!(
            settings.defaults.active_states,
            vec!["Active", "New", "Doing"]
        );
    }

    #[test]
    fn test_empty_optional_values_are_unset() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("DEFAULT_AREA_PATH", ""));
        pairs.push(("DEFAULT_USER", "   "));
        let settings = Settings::from_sources(None, env_of(&pairs)).unwrap();
        assert_eq!(settings.defaults.area_path, None);
        assert_eq!(settings.defaults.user, None);
    }

    #[test]
    fn test_invalid_yaml_reports_path() {
        let err = Settings::from_sources(Some(("bad.yaml", "organization: [")), env_of(&REQUIRED))
            .unwrap_err();
        match err {
            ConfigError::File { path, .. } => assert_eq!(path, "bad.yaml"),
            other => panic!("Expected File error, got {other:?}"),
        }
    }

    #[test]
    fn test_auth_header_is_basic_with_empty_user() {
        let settings = Settings::new("contoso", "Fabrikam", "pat");
        assert_eq!(settings.auth_header(), "Basic OnBhdA==");
    }

    #[test]
    fn test_debug_redacts_token() {
        let settings = Settings::new("contoso", "Fabrikam", "super-secret");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_states_for_category() {
        let defaults = ConfigDefaults::default();
        assert_eq!(
            defaults.states_for(StateCategory::Completed),
            ["Closed", "Done", "Resolved"]
        );
        assert_eq!(
            defaults.states_for(StateCategory::Review),
            ["Code Review", "Testing", "Approved"]
        );
    }

    #[tokio::test]
    async fn test_load_reads_explicit_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("boards.yaml");
        std::fs::write(
            &path,
            "organization: contoso\nproject: Fabrikam\npersonal_access_token: t\n",
        )
        .unwrap();

        // Real environment variables may override the file, so only check
        // that loading succeeds and produced a usable configuration.
        let settings = Settings::load(Some(&path)).await.unwrap();
        assert!(!settings.organization.is_empty());
        assert!(!settings.project.is_empty());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = Settings::load(Some(&dir.path().join("absent.yaml"))).await;
        assert!(result.is_err());
    }
}
