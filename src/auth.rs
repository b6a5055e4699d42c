//! Identity verification collaborator for login. The production mode
//! fetches the user's public paste and requires the configured verification
//! text; the disabled mode admits any non-empty credentials for local play.

use crate::config::AuthConfig;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum IdentityVerifier {
    Disabled,
    Paste {
        http: reqwest::Client,
        base_url: String,
        expected_text: String,
    },
}

impl IdentityVerifier {
    pub fn from_config(config: &AuthConfig) -> anyhow::Result<Self> {
        if !config.verification_enabled {
            return Ok(Self::Disabled);
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self::Paste {
            http,
            base_url: config.paste_base_url.trim_end_matches('/').to_string(),
            expected_text: config.verification_text.clone(),
        })
    }

    /// `Ok(false)` is a verification failure (403); `Err` is a collaborator
    /// failure (500).
    pub async fn verify(&self, uid: &str, paste: &str) -> anyhow::Result<bool> {
        match self {
            Self::Disabled => Ok(!uid.is_empty() && !paste.is_empty()),
            Self::Paste {
                http,
                base_url,
                expected_text,
            } => {
                let url = format!("{base_url}/{paste}");
                let response = http.get(&url).send().await?;
                if !response.status().is_success() {
                    tracing::warn!(uid, status = %response.status(), "paste fetch rejected");
                    return Ok(false);
                }
                let body = response.text().await?;
                Ok(body.contains(expected_text))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_mode_accepts_non_empty_credentials() {
        let verifier = IdentityVerifier::Disabled;
        assert!(verifier.verify("u1", "paste").await.unwrap());
        assert!(!verifier.verify("", "paste").await.unwrap());
        assert!(!verifier.verify("u1", "").await.unwrap());
    }
}
