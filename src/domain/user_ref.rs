use uuid::Uuid;

/// Reference to a user, either by stable identifier or by handle.
///
/// Classified exactly once at the API boundary; internal code never
/// re-inspects strings to guess which form it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Id(Uuid),
    Username(String),
}

impl UserRef {
    /// Classify an incoming string: a parseable UUID is an identifier,
    /// anything else is a handle.
    pub fn parse(input: &str) -> Self {
        match Uuid::parse_str(input) {
            Ok(id) => UserRef::Id(id),
            Err(_) => UserRef::Username(input.to_string()),
        }
    }
}

impl From<Uuid> for UserRef {
    fn from(id: Uuid) -> Self {
        UserRef::Id(id)
    }
}

impl std::fmt::Display for UserRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRef::Id(id) => write!(f, "{}", id),
            UserRef::Username(name) => write!(f, "@{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(UserRef::parse(&id.to_string()), UserRef::Id(id));
    }

    #[test]
    fn test_parse_username() {
        assert_eq!(
            UserRef::parse("tipster_marc"),
            UserRef::Username("tipster_marc".to_string())
        );
        // almost-a-UUID is still a handle
        assert_eq!(
            UserRef::parse("123e4567-e89b-12d3-a456"),
            UserRef::Username("123e4567-e89b-12d3-a456".to_string())
        );
    }
}
