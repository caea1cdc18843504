//! Payload types that cross the browsing-surface boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AdapterError, AdapterErrorKind};

/// A named page query: a JavaScript function source plus the JSON arguments it is called with.
///
/// Arguments are serialised as a JSON literal and passed to the function, so caller-supplied
/// strings never become part of the script text.
#[derive(Clone, Debug)]
pub struct PageScript {
    pub name: &'static str,
    pub function: &'static str,
    pub args: Value,
}

impl PageScript {
    pub fn new(name: &'static str, function: &'static str) -> Self {
        Self {
            name,
            function,
            args: Value::Object(Default::default()),
        }
    }

    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Expression suitable for `Runtime.evaluate`.
    pub fn expression(&self) -> Result<String, AdapterError> {
        let args = serde_json::to_string(&self.args).map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("failed to encode args for {}: {err}", self.name))
        })?;
        Ok(format!("({})({})", self.function.trim(), args))
    }
}

/// Parameters accepted by `Network.setCookies`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieParam {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
}

/// Cookie as reported back by the browser.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "root_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

fn root_path() -> String {
    "/".to_string()
}

/// True when `cookie_domain` belongs to `domain`, e.g. `summer.example.com` under `.example.com`.
pub fn domain_matches(cookie_domain: &str, domain: &str) -> bool {
    let cookie = cookie_domain.trim_start_matches('.').to_ascii_lowercase();
    let wanted = domain.trim_start_matches('.').to_ascii_lowercase();
    if wanted.is_empty() {
        return false;
    }
    cookie == wanted || cookie.ends_with(&format!(".{wanted}"))
}

/// User agent and extra request headers applied to a page when it is attached.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PageIdentity {
    pub user_agent: Option<String>,
    #[serde(default)]
    pub extra_headers: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expression_passes_args_as_json_literal() {
        let script = PageScript::new("echo", "(args) => args.text")
            .with_args(json!({ "text": "say \"hi\" </script> `${x}`" }));
        let expr = script.expression().unwrap();
        assert_eq!(
            expr,
            r#"((args) => args.text)({"text":"say \"hi\" </script> `${x}`"})"#
        );
    }

    #[test]
    fn cookie_param_serialises_camel_case_and_skips_unset() {
        let cookie = CookieParam {
            name: "session_id".into(),
            value: "abc".into(),
            domain: Some(".example.com".into()),
            path: None,
            url: None,
            http_only: Some(false),
            secure: Some(true),
        };
        let value = serde_json::to_value(&cookie).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "session_id",
                "value": "abc",
                "domain": ".example.com",
                "httpOnly": false,
                "secure": true
            })
        );
    }

    #[test]
    fn domain_matching_ignores_leading_dot() {
        assert!(domain_matches(".example.com", "example.com"));
        assert!(domain_matches("summer.example.com", ".example.com"));
        assert!(!domain_matches("badexample.com", "example.com"));
        assert!(!domain_matches("example.com", ""));
    }
}
