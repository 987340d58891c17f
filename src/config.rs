use std::{env, fmt};

use anyhow::{Context, Result};

pub const DEFAULT_API_URL: &str = "https://api.clickup.com/api/v2";

/// ClickUp APIへの接続設定。
#[derive(Clone)]
pub struct Config {
    pub api_url: String,
    pub api_token: String,
    pub team_id: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_url", &self.api_url)
            .field("api_token", &"***")
            .field("team_id", &self.team_id)
            .finish()
    }
}

impl Config {
    pub fn new(
        api_url: impl Into<String>,
        api_token: impl Into<String>,
        team_id: impl Into<String>,
    ) -> Self {
        Self {
            api_url: api_url.into(),
            api_token: api_token.into(),
            team_id: team_id.into(),
        }
    }

    /// 環境変数から設定を読み込む。
    ///
    /// `CLICKUP_API_TOKEN`と`CLICKUP_TEAM_ID`が設定されていない場合はエラーを返す。
    /// `CLICKUP_API_URL`が設定されていない場合は公開APIを利用する。
    pub fn from_env() -> Result<Self> {
        let api_token = env::var("CLICKUP_API_TOKEN").context("CLICKUP_API_TOKEN must be set")?;
        let team_id = env::var("CLICKUP_TEAM_ID").context("CLICKUP_TEAM_ID must be set")?;
        let api_url = env::var("CLICKUP_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        Ok(Self::new(api_url, api_token, team_id))
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use super::{Config, DEFAULT_API_URL};

    /// 環境変数を書き換えるテストはこの1つだけにする。
    #[test]
    fn test_from_env() {
        env::remove_var("CLICKUP_API_URL");
        env::remove_var("CLICKUP_TEAM_ID");
        env::set_var("CLICKUP_API_TOKEN", "pk_1");

        let missing = Config::from_env().unwrap_err();
        assert!(missing.to_string().contains("CLICKUP_TEAM_ID"));

        env::set_var("CLICKUP_TEAM_ID", "9001");
        let config = Config::from_env().unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.api_token, "pk_1");
        assert_eq!(config.team_id, "9001");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = Config::new("http://localhost", "pk_secret", "1");

        let debug = format!("{:?}", config);

        assert!(!debug.contains("pk_secret"));
        assert!(debug.contains("http://localhost"));
    }
}
