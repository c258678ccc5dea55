//! Cookie parsing and `Set-Cookie` serialization.
//!
//! # Design Decisions
//! - Inbound pairs are split on `; `, then once on the first `=`
//! - Outbound attributes render in a fixed order: Secure, Http-Only, Max-Age
//! - One `Set-Cookie` header line per cookie

use std::collections::HashMap;

/// Attributes attached to an outbound cookie.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieAttributes {
    pub secure: bool,
    pub http_only: bool,
    /// Lifetime in seconds.
    pub max_age: Option<u64>,
}

/// An outbound cookie value with its attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub value: String,
    pub attributes: CookieAttributes,
}

impl Cookie {
    pub fn new(value: impl Into<String>, attributes: CookieAttributes) -> Self {
        Self {
            value: value.into(),
            attributes,
        }
    }

    /// Render the `Set-Cookie` header value for this cookie.
    pub fn to_header_value(&self, name: &str) -> String {
        let mut header = format!("{}={}", name, self.value);
        if self.attributes.secure {
            header.push_str("; Secure");
        }
        if self.attributes.http_only {
            header.push_str("; Http-Only");
        }
        if let Some(max_age) = self.attributes.max_age {
            header.push_str(&format!("; Max-Age={}", max_age));
        }
        header
    }
}

/// Parse a `Cookie` request header into a name → value map.
pub fn parse_cookie_header(header: &str) -> HashMap<String, String> {
    header
        .split("; ")
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (name.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cookie_value() {
        let cookie = Cookie::new(
            "s3cret",
            CookieAttributes {
                secure: true,
                http_only: true,
                max_age: Some(10000),
            },
        );
        assert_eq!(
            cookie.to_header_value("token"),
            "token=s3cret; Secure; Http-Only; Max-Age=10000"
        );
    }

    #[test]
    fn test_false_flags_are_omitted() {
        let cookie = Cookie::new("1", CookieAttributes::default());
        assert_eq!(cookie.to_header_value("visited"), "visited=1");
    }

    #[test]
    fn test_parse_cookie_header() {
        let cookies = parse_cookie_header("name=value; token=12345");
        assert_eq!(cookies.len(), 2);
        assert_eq!(cookies["name"], "value");
        assert_eq!(cookies["token"], "12345");
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        let cookies = parse_cookie_header("data=a=b; flag");
        assert_eq!(cookies["data"], "a=b");
        assert_eq!(cookies["flag"], "");
    }
}
