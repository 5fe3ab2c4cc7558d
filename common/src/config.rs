//! Common configuration structures and utilities.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuth {
    pub username: String,
    pub password: Option<String>,
}

impl std::fmt::Display for BasicAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.username)?;
        if self.password.is_some() {
            write!(f, ":***")?;
        }

        Ok(())
    }
}

impl FromStr for BasicAuth {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (username, password) = match s.split_once(':') {
            Some((username, password)) => (username, Some(password).filter(|p| !p.is_empty())),
            None => (s, None),
        };

        if username.is_empty() {
            anyhow::bail!("Invalid auth format. Expected 'user' or 'user:password'");
        }

        Ok(Self {
            username: username.to_string(),
            password: password.map(|p| p.to_string()),
        })
    }
}
