use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::DebateError;

/// OAuth client and refresh token of an rclone Drive remote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

#[derive(Deserialize)]
struct RcloneToken {
    refresh_token: String,
}

/// Where rclone keeps its config when `--config` is not given
pub fn default_rclone_config() -> Result<PathBuf, DebateError> {
    dirs::config_dir()
        .map(|dir| dir.join("rclone").join("rclone.conf"))
        .ok_or_else(|| DebateError::Credentials("cannot determine the rclone config location".to_string()))
}

/// Key/value pairs of one `[section]` of an rclone config file
fn section<'a>(config: &'a str, name: &str) -> Option<HashMap<&'a str, &'a str>> {
    let mut in_section = false;
    let mut found = false;
    let mut values = HashMap::new();

    for line in config.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = header.trim() == name;
            found |= in_section;
            continue;
        }
        if in_section {
            if let Some((key, value)) = line.split_once('=') {
                values.insert(key.trim(), value.trim());
            }
        }
    }

    found.then_some(values)
}

impl DriveCredentials {
    /// Read the credentials of remote `name` from rclone config text
    pub fn from_rclone_config(config: &str, name: &str) -> Result<Self, DebateError> {
        let values = section(config, name).ok_or_else(|| {
            DebateError::Credentials(format!("no [{}] section in rclone config", name))
        })?;

        let field = |key: &str| -> Result<String, DebateError> {
            values
                .get(key)
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
                .ok_or_else(|| DebateError::Credentials(format!("[{}] has no {}", name, key)))
        };

        let token: RcloneToken = serde_json::from_str(&field("token")?).map_err(|e| {
            DebateError::Credentials(format!("[{}] token is not valid JSON: {}", name, e))
        })?;

        Ok(Self {
            client_id: field("client_id")?,
            client_secret: field("client_secret")?,
            refresh_token: token.refresh_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
[other]
type = s3
client_id = wrong

[debates]
type = drive
client_id = 123.apps.googleusercontent.com
client_secret = s3cr3t
scope = drive
token = {"access_token":"ya29.x","token_type":"Bearer","refresh_token":"1//refresh","expiry":"2024-02-05T16:46:10Z"}
team_drive =
"#;

    #[test]
    fn test_from_rclone_config() {
        let creds = DriveCredentials::from_rclone_config(CONFIG, "debates").unwrap();
        assert_eq!(
            creds,
            DriveCredentials {
                client_id: "123.apps.googleusercontent.com".to_string(),
                client_secret: "s3cr3t".to_string(),
                refresh_token: "1//refresh".to_string(),
            }
        );
    }

    #[test]
    fn test_missing_section() {
        let err = DriveCredentials::from_rclone_config(CONFIG, "nope").unwrap_err();
        assert!(err.to_string().contains("no [nope] section"));
    }

    #[test]
    fn test_missing_token() {
        let err = DriveCredentials::from_rclone_config(CONFIG, "other").unwrap_err();
        assert!(err.to_string().contains("[other] has no token"), "{}", err);
    }
}
