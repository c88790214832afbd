use crate::server::ServerError;
use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::TypedHeader;
use headers::{Header, HeaderName, HeaderValue};
use socialfeed_common::model::{Id, user::UserMarker};

static X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

/// `X-User-Id`, the id of the caller as established by the authenticating
/// gateway in front of this service.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct XUserId(pub Id<UserMarker>);

impl Header for XUserId {
    fn name() -> &'static HeaderName {
        &X_USER_ID
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, headers::Error>
    where
        I: Iterator<Item = &'i HeaderValue>,
    {
        values
            .next()
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(|id| Self(Id::new(id)))
            .ok_or_else(headers::Error::invalid)
    }

    fn encode<E: Extend<HeaderValue>>(&self, values: &mut E) {
        values.extend(std::iter::once(HeaderValue::from(self.0.get())));
    }
}

/// The acting user of a request.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AuthenticatedUser {
    id: Id<UserMarker>,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(self) -> Id<UserMarker> {
        self.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(XUserId(id)) = TypedHeader::<XUserId>::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidPrincipalHeader)?;

        Ok(Self { id })
    }
}
