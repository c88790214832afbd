use crate::model::{
    Id,
    comment::Comment,
    text::bounded_text,
    user::{User, UserMarker},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub const POST_TITLE_MAX_LEN: usize = 100;
pub const POST_CONTENT_MAX_LEN: usize = 1000;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct PostMarker;

bounded_text!(PostTitle: max = POST_TITLE_MAX_LEN, field = "post title");
bounded_text!(PostContent: max = POST_CONTENT_MAX_LEN, field = "post content");

/// Optimistic concurrency token of a post.
///
/// Only the conditional update in the database ever advances it, by exactly
/// one per successful write.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PostVersion(i32);

impl PostVersion {
    #[must_use]
    pub fn new(version: i32) -> Self {
        Self(version)
    }

    #[must_use]
    pub fn get(self) -> i32 {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct Post {
    pub id: Id<PostMarker>,
    pub title: PostTitle,
    pub content: PostContent,
    pub author_id: Id<UserMarker>,
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub version: PostVersion,
    pub comments: Vec<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
}

/// A post as it appears in a feed, with its aggregated comment count.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct PostWithMetadata {
    #[serde(flatten)]
    pub post: Post,
    pub comments_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
pub struct NewPost {
    pub title: PostTitle,
    pub content: PostContent,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial edit of a post. Absent fields are left untouched.
///
/// `version` is the version the editor last observed; without it the edit is
/// checked against the version read right before the write.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(default)]
pub struct PostPatch {
    pub title: Option<PostTitle>,
    pub content: Option<PostContent>,
    pub tags: Option<Vec<String>>,
    pub version: Option<PostVersion>,
}

impl Post {
    pub fn apply(&mut self, patch: PostPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        if let Some(version) = patch.version {
            self.version = version;
        }
    }
}
