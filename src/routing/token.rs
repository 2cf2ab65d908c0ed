//! One-time route token.

use std::fmt;

use uuid::Uuid;

/// Unguessable path segment that every advertised URL shares.
///
/// 128 random bits from a v4 UUID, rendered as 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteToken(String);

impl RouteToken {
    /// Draw a fresh token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Route path served by the main handler, e.g. `/3f2a...`.
    pub fn path(&self) -> String {
        format!("/{}", self.0)
    }
}

impl fmt::Display for RouteToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn token_is_lowercase_hex() {
        let token = RouteToken::generate();
        assert_eq!(token.as_str().len(), 32);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert!(!token.as_str().contains('-'));
    }

    #[test]
    fn tokens_do_not_collide() {
        let tokens: HashSet<RouteToken> = (0..1000).map(|_| RouteToken::generate()).collect();
        assert_eq!(tokens.len(), 1000);
    }
}
