use crate::model::{
    Id,
    post::PostMarker,
    text::bounded_text,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const COMMENT_CONTENT_MAX_LEN: usize = 300;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct CommentMarker;

bounded_text!(CommentContent: max = COMMENT_CONTENT_MAX_LEN, field = "comment content");

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Comment {
    pub id: Id<CommentMarker>,
    pub post_id: Id<PostMarker>,
    pub author_id: Id<UserMarker>,
    pub content: CommentContent,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct NewComment {
    pub content: CommentContent,
}
