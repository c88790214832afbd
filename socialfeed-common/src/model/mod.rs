pub mod comment;
pub mod feed;
pub mod post;
pub mod text;
pub mod user;

use crate::model::text::InvalidTextError;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData};
use thiserror::Error;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Text(#[from] InvalidTextError),
}

/// Primary key of an entity, tagged with a marker type so ids of different
/// entities cannot be mixed up. Keys are assigned by the database.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(i64, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id, PhantomData)
    }

    #[must_use]
    pub fn get(self) -> i64 {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<i64> for Id<Marker> {
    fn from(value: i64) -> Self {
        Id::new(value)
    }
}

impl<Marker> From<Id<Marker>> for i64 {
    fn from(value: Id<Marker>) -> Self {
        value.get()
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, post::PostMarker};

    #[test]
    fn id_is_transparent_on_the_wire() {
        let id = Id::<PostMarker>::new(42);

        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        assert_eq!(serde_json::from_str::<Id<PostMarker>>("42").unwrap(), id);
        assert_eq!(id.to_string(), "42");
        assert_eq!(i64::from(id), 42);
    }
}
