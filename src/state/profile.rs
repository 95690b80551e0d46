use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

/// Fixed key of the cached profile blob
pub const PROFILE_KEY: &str = "currentUser";

/// A locally cached user profile
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub major: String,
    #[serde(default)]
    pub profile_image: Option<String>,
    /// Ids of connected users
    #[serde(default)]
    pub connections: Vec<String>,
}

/// Reads the profile blob stored as `<dir>/currentUser.json`.
#[derive(Debug, Clone)]
pub struct ProfileCache {
    dir: PathBuf,
}

impl ProfileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{PROFILE_KEY}.json"))
    }

    /// Load the cached profile. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<UserProfile>, ProfileError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("campus-profile-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_missing_profile_is_none() {
        let cache = ProfileCache::new(std::env::temp_dir().join("campus-profile-does-not-exist"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn test_load_cached_profile() {
        let dir = temp_dir();
        std::fs::write(
            dir.join("currentUser.json"),
            r#"{"id":"u1","fullName":"Sam Rivera","email":"sam@example.com","major":"Mathematics"}"#,
        )
        .unwrap();

        let profile = ProfileCache::new(&dir).load().unwrap().unwrap();
        assert_eq!(profile.full_name, "Sam Rivera");
        assert_eq!(profile.profile_image, None);
        assert!(profile.connections.is_empty());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_corrupt_profile_is_an_error() {
        let dir = temp_dir();
        std::fs::write(dir.join("currentUser.json"), "{ not json").unwrap();

        assert!(matches!(
            ProfileCache::new(&dir).load(),
            Err(ProfileError::Parse(_))
        ));

        std::fs::remove_dir_all(dir).unwrap();
    }
}
