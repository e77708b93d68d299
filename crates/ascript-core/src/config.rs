//! Ascription configuration: user registry, review tags and the two roots.
//!
//! Loaded once from TOML and shared read-only afterwards.
//!
//! ```toml
//! [global]
//! catalog-root = "po"
//! ascript-root = "po-ascript"
//! review-tags = "spell grammar"
//!
//! [user-alice]
//! name = "Alice Liddell"
//! email = "alice@example.org"
//! ```

use crate::errors::{AscriptError, Result};
use crate::{log_op_end, log_op_error, log_op_start};
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};
use std::time::Instant;

const USER_SECTION_PREFIX: &str = "user-";

/// Registered user
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserData {
    pub name: Option<String>,
    #[serde(default)]
    pub original_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserData {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            original_name: None,
            email: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct GlobalSection {
    catalog_root: Option<String>,
    ascript_root: Option<String>,
    review_tags: Option<String>,
    title: Option<String>,
    language_team: Option<String>,
    team_email: Option<String>,
    language: Option<String>,
    plural_header: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    global: GlobalSection,
    #[serde(flatten)]
    sections: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AscriptionConfig {
    /// Identity used to key per-run caches
    pub id: String,
    pub catalog_root: PathBuf,
    pub ascription_root: PathBuf,
    pub users: BTreeMap<String, UserData>,
    pub review_tags: BTreeSet<String>,
    pub title: Option<String>,
    pub language_team: Option<String>,
    pub team_email: Option<String>,
    pub language: Option<String>,
    pub plural_header: Option<String>,
}

impl AscriptionConfig {
    /// Programmatic construction. The roots must not resolve to the same path.
    pub fn new(catalog_root: impl Into<PathBuf>, ascription_root: impl Into<PathBuf>) -> Result<Self> {
        let catalog_root = normalize(&catalog_root.into());
        let ascription_root = normalize(&ascription_root.into());
        if catalog_root == ascription_root {
            return Err(AscriptError::RootPathCollision {
                path: catalog_root.display().to_string(),
            });
        }
        let mut review_tags = BTreeSet::new();
        review_tags.insert(String::new());
        Ok(Self {
            id: format!("{}:{}", catalog_root.display(), ascription_root.display()),
            catalog_root,
            ascription_root,
            users: BTreeMap::new(),
            review_tags,
            title: None,
            language_team: None,
            team_email: None,
            language: None,
            plural_header: None,
        })
    }

    pub fn add_user(&mut self, user: impl Into<String>, data: UserData) -> Result<()> {
        let user = user.into();
        if data.name.as_deref().map_or(true, str::is_empty) {
            return Err(AscriptError::MissingUserName { user });
        }
        if self.users.contains_key(&user) {
            return Err(AscriptError::DuplicateUser { user });
        }
        self.users.insert(user, data);
        Ok(())
    }

    pub fn add_review_tag(&mut self, tag: impl Into<String>) {
        self.review_tags.insert(tag.into());
    }

    pub fn has_user(&self, user: &str) -> bool {
        self.users.contains_key(user)
    }

    pub fn has_review_tag(&self, tag: &str) -> bool {
        self.review_tags.contains(tag)
    }

    /// Parse configuration text; relative roots resolve against `base_dir`.
    pub fn from_toml_str(text: &str, base_dir: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text)?;
        let global = file.global;

        let catalog_root = global.catalog_root.ok_or_else(|| AscriptError::InvalidConfig {
            reason: "'catalog-root' not set in [global]".to_string(),
        })?;
        let ascription_root = global.ascript_root.ok_or_else(|| AscriptError::InvalidConfig {
            reason: "'ascript-root' not set in [global]".to_string(),
        })?;

        let mut config =
            Self::new(base_dir.join(catalog_root), base_dir.join(ascription_root))?;
        if let Some(tags) = global.review_tags {
            for tag in tags.split_whitespace() {
                config.add_review_tag(tag);
            }
        }
        config.title = global.title;
        config.language_team = global.language_team;
        config.team_email = global.team_email;
        config.language = global.language;
        config.plural_header = global.plural_header;

        for (section, value) in file.sections {
            let Some(user) = section.strip_prefix(USER_SECTION_PREFIX) else {
                tracing::warn!(section = %section, "Ignoring unknown configuration section");
                continue;
            };
            let data: UserData = value.try_into().map_err(|e: toml::de::Error| {
                AscriptError::InvalidConfig {
                    reason: format!("section [{}]: {}", section, e),
                }
            })?;
            config.add_user(user, data)?;
        }
        Ok(config)
    }

    /// Load configuration from a file; relative roots resolve against the
    /// file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let start = Instant::now();
        log_op_start!("load_config", path = %path.display());

        let result = std::fs::read_to_string(path)
            .map_err(|e| AscriptError::Io {
                op: "read_config".to_string(),
                message: format!("{}: {}", path.display(), e),
            })
            .and_then(|text| {
                let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
                Self::from_toml_str(&text, base_dir)
            })
            .map(|mut config| {
                config.id = path.display().to_string();
                config
            });

        match &result {
            Ok(config) => {
                log_op_end!(
                    "load_config",
                    duration_ms = start.elapsed().as_millis() as u64,
                    users = config.users.len()
                );
            }
            Err(err) => {
                log_op_error!(
                    "load_config",
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
            }
        }
        result
    }

    /// Path of the shadow (ascription) file for a catalog file, mirroring the
    /// catalog's position under the catalog root. `None` when the catalog is
    /// outside the catalog root.
    pub fn ascription_path_for(&self, catalog_path: &Path) -> Option<PathBuf> {
        let catalog_path = normalize(catalog_path);
        let relative = catalog_path.strip_prefix(&self.catalog_root).ok()?;
        Some(self.ascription_root.join(relative))
    }
}

/// Lexical normalization: drops `.` and folds `..` without touching the
/// filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[global]
catalog-root = "po"
ascript-root = "po-ascript"
review-tags = "spell grammar"
language = "sr"

[user-alice]
name = "Alice Liddell"
email = "alice@example.org"

[user-bob]
name = "Bob"
original-name = "Роберт"
"#;

    #[test]
    fn test_parse_sample() {
        let config = AscriptionConfig::from_toml_str(SAMPLE, Path::new("/work")).unwrap();
        assert_eq!(config.catalog_root, PathBuf::from("/work/po"));
        assert_eq!(config.ascription_root, PathBuf::from("/work/po-ascript"));
        assert!(config.has_user("alice"));
        assert_eq!(
            config.users["bob"].original_name.as_deref(),
            Some("Роберт")
        );
        assert!(config.has_review_tag(""));
        assert!(config.has_review_tag("spell"));
        assert!(config.has_review_tag("grammar"));
        assert_eq!(config.language.as_deref(), Some("sr"));
    }

    #[test]
    fn test_missing_user_name() {
        let text = "[global]\ncatalog-root = \"a\"\nascript-root = \"b\"\n[user-carol]\nemail = \"c@x\"\n";
        let err = AscriptionConfig::from_toml_str(text, Path::new("/w")).unwrap_err();
        assert_eq!(
            err,
            AscriptError::MissingUserName {
                user: "carol".to_string()
            }
        );
    }

    #[test]
    fn test_root_collision_is_fatal() {
        let text = "[global]\ncatalog-root = \"po\"\nascript-root = \"./po\"\n";
        let err = AscriptionConfig::from_toml_str(text, Path::new("/w")).unwrap_err();
        assert!(matches!(err, AscriptError::RootPathCollision { .. }));
    }

    #[test]
    fn test_missing_root_is_invalid() {
        let text = "[global]\ncatalog-root = \"po\"\n";
        let err = AscriptionConfig::from_toml_str(text, Path::new("/w")).unwrap_err();
        assert!(matches!(err, AscriptError::InvalidConfig { .. }));
    }

    #[test]
    fn test_duplicate_user_programmatic() {
        let mut config = AscriptionConfig::new("po", "asc").unwrap();
        config.add_user("alice", UserData::named("Alice")).unwrap();
        let err = config
            .add_user("alice", UserData::named("Alice Again"))
            .unwrap_err();
        assert!(matches!(err, AscriptError::DuplicateUser { .. }));
    }

    #[test]
    fn test_ascription_path_mapping() {
        let config = AscriptionConfig::new("/w/po", "/w/po-ascript").unwrap();
        assert_eq!(
            config.ascription_path_for(Path::new("/w/po/ui/app.po")),
            Some(PathBuf::from("/w/po-ascript/ui/app.po"))
        );
        assert_eq!(config.ascription_path_for(Path::new("/elsewhere/x.po")), None);
    }
}
