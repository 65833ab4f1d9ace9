use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::models::UserType;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub roles_path: PathBuf,
}

impl Config {
    pub fn load() -> Self {
        let dirs = directories::ProjectDirs::from("", "", "jobboard");

        let data_dir = env::var_os("JOBBOARD_DATA_DIR")
            .map(PathBuf::from)
            .or_else(|| dirs.as_ref().map(|d| d.data_dir().to_path_buf()))
            // Fallback to current directory
            .unwrap_or_else(|| PathBuf::from("."));

        let roles_path = env::var_os("JOBBOARD_ROLES")
            .map(PathBuf::from)
            .or_else(|| dirs.as_ref().map(|d| d.config_dir().join("roles.json")))
            .unwrap_or_else(|| data_dir.join("roles.json"));

        Self {
            db_path: data_dir.join("jobboard.db"),
            data_dir,
            roles_path,
        }
    }

    pub fn roles(&self) -> RoleTable {
        RoleTable::load(&self.roles_path)
    }
}

/// A privileged login that lives in configuration rather than the users
/// collection.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoleAccount {
    pub email: String,
    pub password: String,
    pub user_type: UserType,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoleTable {
    accounts: Vec<RoleAccount>,
}

impl RoleTable {
    pub fn new(accounts: Vec<RoleAccount>) -> Self {
        let accounts = accounts
            .into_iter()
            .filter(|a| {
                if a.user_type.is_privileged() {
                    true
                } else {
                    warn!(email = %a.email, user_type = %a.user_type, "ignoring non-privileged role account");
                    false
                }
            })
            .collect();
        Self { accounts }
    }

    /// Missing or malformed files yield an empty table.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read role table");
                return Self::default();
            }
        };
        match serde_json::from_str::<Vec<RoleAccount>>(&content) {
            Ok(accounts) => Self::new(accounts),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed role table");
                Self::default()
            }
        }
    }

    /// Returns the position and account whose credentials match exactly.
    pub fn authenticate(&self, email: &str, password: &str) -> Option<(usize, &RoleAccount)> {
        self.accounts
            .iter()
            .enumerate()
            .find(|(_, a)| a.email == email && a.password == password)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_table_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roles.json");
        std::fs::write(
            &path,
            r#"[
                {"email": "admin@board.local", "password": "admin123", "userType": "admin", "name": "Admin"},
                {"email": "hr@board.local", "password": "hr1234", "userType": "hr_manager"},
                {"email": "someone@board.local", "password": "x", "userType": "applicant"}
            ]"#,
        )
        .unwrap();

        let table = RoleTable::load(&path);
        assert_eq!(table.len(), 2);

        let (idx, account) = table.authenticate("hr@board.local", "hr1234").unwrap();
        assert_eq!(idx, 1);
        assert_eq!(account.user_type, UserType::HrManager);

        assert!(table.authenticate("hr@board.local", "wrong").is_none());
        assert!(table.authenticate("HR@board.local", "hr1234").is_none());
    }

    #[test]
    fn test_role_table_missing_or_malformed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RoleTable::load(&dir.path().join("absent.json")).is_empty());

        let path = dir.path().join("roles.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(RoleTable::load(&path).is_empty());
    }
}
