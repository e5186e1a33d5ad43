use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

const CHANNEL_NAME: &str = "TWITCH_CHANNEL";
const CHANNEL_ID: &str = "TWITCH_CHANNEL_ID";
const CLIENT_ID: &str = "TWITCH_CLIENT_ID";
const CLIENT_SECRET: &str = "TWITCH_CLIENT_SECRET";
const OAUTH_TOKEN: &str = "TWITCH_OAUTH_TOKEN";
const REFRESH_TOKEN: &str = "TWITCH_REFRESH_TOKEN";
const BOT_NAME: &str = "TWITCH_BOT_NAME";
const BOT_TOKEN: &str = "TWITCH_TOKEN";

/// Credentials kept between runs in a `KEY=VALUE` file, the same format `dotenv` reads.
///
/// `cuebot run` loads it from `CUEBOT_SECRETS` (default `.secrets`) to fill in the
/// channel, bot name and token the environment does not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secrets {
    pub channel_name: String,
    pub channel_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub oauth_token: String,
    pub refresh_token: String,
    pub bot_name: String,
    pub bot_token: String,
}

impl Secrets {
    /// A missing file yields empty secrets.
    pub fn load(path: &Path) -> Result<Self> {
        let mut secrets = Secrets::default();
        if !path.exists() {
            log::debug!("no secrets file at {}", path.display());
            return Ok(secrets);
        }

        let entries = dotenv::from_path_iter(path).map_err(|err| secrets_error(path, err))?;
        for entry in entries {
            let (key, value) = entry.map_err(|err| secrets_error(path, err))?;
            match secrets.field_mut(&key) {
                Some(field) => *field = value,
                None => log::warn!("ignoring unknown secret {key}"),
            }
        }
        Ok(secrets)
    }

    /// Writes every non-empty value, replacing the file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut out = String::new();
        for (key, value) in self.fields() {
            if !value.is_empty() {
                let _ = writeln!(out, "{key}={value}");
            }
        }
        std::fs::write(path, out).map_err(|source| Error::Secrets {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn clear(&mut self, path: &Path) -> Result<()> {
        *self = Secrets::default();
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::Secrets {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn fields(&self) -> [(&'static str, &str); 8] {
        [
            (CHANNEL_NAME, self.channel_name.as_str()),
            (CHANNEL_ID, self.channel_id.as_str()),
            (CLIENT_ID, self.client_id.as_str()),
            (CLIENT_SECRET, self.client_secret.as_str()),
            (OAUTH_TOKEN, self.oauth_token.as_str()),
            (REFRESH_TOKEN, self.refresh_token.as_str()),
            (BOT_NAME, self.bot_name.as_str()),
            (BOT_TOKEN, self.bot_token.as_str()),
        ]
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut String> {
        Some(match key {
            CHANNEL_NAME => &mut self.channel_name,
            CHANNEL_ID => &mut self.channel_id,
            CLIENT_ID => &mut self.client_id,
            CLIENT_SECRET => &mut self.client_secret,
            OAUTH_TOKEN => &mut self.oauth_token,
            REFRESH_TOKEN => &mut self.refresh_token,
            BOT_NAME => &mut self.bot_name,
            BOT_TOKEN => &mut self.bot_token,
            _ => return None,
        })
    }
}

fn secrets_error(path: &Path, err: dotenv::Error) -> Error {
    let source = match err {
        dotenv::Error::Io(err) => err,
        other => std::io::Error::new(std::io::ErrorKind::InvalidData, other.to_string()),
    };
    Error::Secrets {
        path: PathBuf::from(path),
        source,
    }
}
