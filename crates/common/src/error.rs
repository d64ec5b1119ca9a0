use serde::{Deserialize, Serialize};

/// Client-facing category of a failure.
///
/// Every error surfaced by the order, stock and payment components maps to
/// exactly one of these; the HTTP layer turns them into status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The referenced order, payment, product or reservation does not exist.
    NotFound,
    /// The request is valid but collides with the current state.
    Conflict,
    /// The request itself is malformed or violates a business rule.
    Validation,
    /// Something failed on our side or in a downstream dependency.
    ServerFault,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Validation => "validation",
            ErrorKind::ServerFault => "server_fault",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_as_snake_case() {
        let json = serde_json::to_string(&ErrorKind::ServerFault).unwrap();
        assert_eq!(json, "\"server_fault\"");
        assert_eq!(ErrorKind::NotFound.to_string(), "not_found");
    }
}
