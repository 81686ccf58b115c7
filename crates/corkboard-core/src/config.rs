use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// A token the server accepts at the WebSocket handshake, mapped to the
/// user it authenticates as. Token issuance itself happens elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub token: String,
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub listen_addr: Option<String>,
    #[serde(default)]
    pub data_file: Option<PathBuf>,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

impl ServerConfig {
    pub fn config_path() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            dirs::home_dir().map(|home| home.join(".config/corkboard/config.toml"))
        }
        #[cfg(target_os = "linux")]
        {
            dirs::config_dir().map(|config| config.join("corkboard/config.toml"))
        }
        #[cfg(target_os = "windows")]
        {
            dirs::config_dir().map(|config| config.join("corkboard\\config.toml"))
        }
        #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
        {
            None
        }
    }

    pub fn load() -> Self {
        if let Some(config_path) = Self::config_path() {
            if config_path.exists() {
                if let Ok(content) = std::fs::read_to_string(&config_path) {
                    if let Ok(config) = toml::from_str(&content) {
                        return config;
                    }
                }
            }
        }
        Self::default()
    }

    pub fn load_from(path: &PathBuf) -> Option<Self> {
        let content = std::fs::read_to_string(path).ok()?;
        toml::from_str(&content).ok()
    }

    pub fn effective_listen_addr(&self) -> &str {
        self.listen_addr.as_deref().unwrap_or("127.0.0.1:4000")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen_addr() {
        let config = ServerConfig::default();
        assert_eq!(config.effective_listen_addr(), "127.0.0.1:4000");
    }

    #[test]
    fn test_parse_users() {
        let toml_str = r#"
            listen_addr = "0.0.0.0:8080"

            [[users]]
            token = "alpha"
            id = "7f8a6e60-7f2f-4f4d-9f2a-111111111111"
            name = "alice"
        "#;
        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.effective_listen_addr(), "0.0.0.0:8080");
        assert_eq!(config.users.len(), 1);
        assert_eq!(config.users[0].name, "alice");
    }
}
