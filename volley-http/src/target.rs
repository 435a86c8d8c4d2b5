//! Request shape for one matrix cell

use crate::errors::HttpError;
use crate::types::HttpMethod;
use std::fmt;

/// Immutable method + URL pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    method: HttpMethod,
    url: String,
}

impl Target {
    /// Build a target, rejecting URLs that do not parse as http(s)
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Result<Self, HttpError> {
        let url = url.into();
        let parsed = url::Url::parse(&url).map_err(|e| HttpError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HttpError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                url,
                parsed.scheme()
            )));
        }
        Ok(Self { method, url })
    }

    /// `GET base_url + path`
    pub fn get(base_url: &str, path: &str) -> Result<Self, HttpError> {
        Self::new(HttpMethod::Get, join_url(base_url, path))
    }

    /// Expand a path template against a base URL.
    ///
    /// Each `{name}` in `template` is replaced with the matching value from
    /// `params`; unknown placeholders are an error so a typo never reaches
    /// the server.
    pub fn from_template(
        method: HttpMethod,
        base_url: &str,
        template: &str,
        params: &[(&str, String)],
    ) -> Result<Self, HttpError> {
        let mut path = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            path.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let close = after
                .find('}')
                .ok_or_else(|| HttpError::InvalidUrl(format!("unterminated placeholder in '{}'", template)))?;
            let name = &after[..close];
            let value = params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.as_str())
                .ok_or_else(|| HttpError::InvalidUrl(format!("no value for placeholder '{{{}}}'", name)))?;
            path.push_str(value);
            rest = &after[close + 1..];
        }
        path.push_str(rest);

        Self::new(method, join_url(base_url, &path))
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Path and query, used for report headers
    pub fn path_and_query(&self) -> String {
        match url::Url::parse(&self.url) {
            Ok(url) => match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            },
            Err(_) => self.url.clone(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
