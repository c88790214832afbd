use crate::model::{Id, text::bounded_text};
use serde::Serialize;

pub const USERNAME_MAX_LEN: usize = 50;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

bounded_text!(Username: max = USERNAME_MAX_LEN, field = "username");

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
}

#[cfg(test)]
mod tests {
    use crate::model::{
        text::InvalidTextError,
        user::{USERNAME_MAX_LEN, Username},
    };

    #[test]
    fn username_length() {
        assert!(Username::new("Alice").is_ok());
        assert!(Username::new("a".repeat(USERNAME_MAX_LEN)).is_ok());
        assert!(matches!(
            Username::new("a".repeat(USERNAME_MAX_LEN + 1)),
            Err(InvalidTextError::TooLong { .. })
        ));
    }

    #[test]
    fn username_deserialization_is_validated() {
        assert_eq!(
            serde_json::from_str::<Username>("\"Bob\"").unwrap().get(),
            "Bob"
        );
        assert!(serde_json::from_str::<Username>("\"\"").is_err());
    }
}
