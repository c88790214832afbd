//! Length-bounded, non-empty text fields.
//!
//! Every user-supplied text that ends up in a column with a length rule gets
//! its own newtype, generated by [`bounded_text!`]. Construction and
//! deserialization both go through the same check, so a value of one of these
//! types is always valid.

use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidTextError {
    #[error("The {field} must not be empty")]
    Empty { field: &'static str },
    #[error("The {field} must be at most {max} characters long, got {len}")]
    TooLong {
        field: &'static str,
        max: usize,
        len: usize,
    },
}

pub(crate) fn check_text(
    field: &'static str,
    max: usize,
    text: &str,
) -> Result<(), InvalidTextError> {
    if text.trim().is_empty() {
        return Err(InvalidTextError::Empty { field });
    }

    let len = text.chars().count();
    if len > max {
        return Err(InvalidTextError::TooLong { field, max, len });
    }

    Ok(())
}

macro_rules! bounded_text {
    ($(#[$meta:meta])* $name:ident: max = $max:expr, field = $field:literal) => {
        $(#[$meta])*
        #[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, ::serde::Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(
                text: impl Into<String>,
            ) -> Result<Self, $crate::model::text::InvalidTextError> {
                let text = text.into();
                $crate::model::text::check_text($field, $max, &text)?;
                Ok(Self(text))
            }

            #[must_use]
            pub fn get(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                ::std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::model::text::InvalidTextError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let inner = <String as ::serde::Deserialize<'de>>::deserialize(deserializer)?;
                Self::new(inner).map_err(::serde::de::Error::custom)
            }
        }
    };
}

pub(crate) use bounded_text;

#[cfg(test)]
mod tests {
    use crate::model::text::{InvalidTextError, check_text};

    #[test]
    fn rejects_blank_text() {
        assert_eq!(
            check_text("title", 10, ""),
            Err(InvalidTextError::Empty { field: "title" })
        );
        assert_eq!(
            check_text("title", 10, "   \n"),
            Err(InvalidTextError::Empty { field: "title" })
        );
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(check_text("title", 3, "äöü"), Ok(()));
        assert_eq!(
            check_text("title", 3, "äöüß"),
            Err(InvalidTextError::TooLong {
                field: "title",
                max: 3,
                len: 4
            })
        );
    }
}
