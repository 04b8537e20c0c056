//! Credential providers for the remote session service.

use sidechat_core::remote::CredentialProvider;
use std::collections::HashMap;

/// Sends a fixed bearer token (if any) plus optional extra headers.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialProvider {
    token: Option<String>,
    extra: HashMap<String, String>,
}

impl StaticCredentialProvider {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
            extra: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn headers(&self) -> HashMap<String, String> {
        let mut headers = self.extra.clone();
        if let Some(token) = &self.token {
            headers.insert("Authorization".to_string(), format!("Bearer {}", token));
        }
        headers
    }
}
