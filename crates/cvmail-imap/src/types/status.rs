//! Response condition keywords.

/// Status condition carried by tagged and untagged status responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Command completed successfully.
    Ok,
    /// Command failed (operational error).
    No,
    /// Command was rejected (protocol error).
    Bad,
    /// Connection is pre-authenticated.
    PreAuth,
    /// Server is closing the connection.
    Bye,
}

impl Status {
    /// Parses a status keyword, ignoring ASCII case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "OK" => Some(Self::Ok),
            "NO" => Some(Self::No),
            "BAD" => Some(Self::Bad),
            "PREAUTH" => Some(Self::PreAuth),
            "BYE" => Some(Self::Bye),
            _ => None,
        }
    }
}
