use socialfeed_common::model::{
    Id, ModelValidationError,
    comment::{Comment, CommentContent},
    post::{Post, PostContent, PostTitle, PostVersion, PostWithMetadata},
    user::{User, UserMarker, Username},
};
use sqlx::FromRow;
use time::OffsetDateTime;

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct UserRecord {
    pub id: i64,
    pub username: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct PostRecord {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub version: i32,
}

/// Columns generated by the database when a post is inserted.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct InsertedPostRecord {
    pub id: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub version: i32,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct FeedPostRecord {
    #[sqlx(flatten)]
    pub post: PostRecord,
    pub username: Option<String>,
    pub comments_count: i64,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, FromRow)]
pub(crate) struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub user_id: i64,
    pub content: String,
    pub created_at: OffsetDateTime,
    pub username: Option<String>,
}

fn author(
    user_id: i64,
    username: Option<String>,
) -> Result<Option<User>, ModelValidationError> {
    Ok(username
        .map(Username::new)
        .transpose()?
        .map(|username| User {
            id: Id::<UserMarker>::new(user_id),
            username,
        }))
}

impl TryFrom<UserRecord> for User {
    type Error = ModelValidationError;

    fn try_from(value: UserRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            username: Username::new(value.username)?,
        })
    }
}

impl TryFrom<PostRecord> for Post {
    type Error = ModelValidationError;

    fn try_from(value: PostRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            title: PostTitle::new(value.title)?,
            content: PostContent::new(value.content)?,
            author_id: value.user_id.into(),
            tags: value.tags,
            created_at: value.created_at,
            updated_at: value.updated_at,
            version: PostVersion::new(value.version),
            comments: Vec::new(),
            author: None,
        })
    }
}

impl TryFrom<FeedPostRecord> for PostWithMetadata {
    type Error = ModelValidationError;

    fn try_from(value: FeedPostRecord) -> Result<Self, Self::Error> {
        let author = author(value.post.user_id, value.username)?;
        let mut post = Post::try_from(value.post)?;
        post.author = author;

        Ok(Self {
            post,
            comments_count: value.comments_count,
        })
    }
}

impl TryFrom<CommentRecord> for Comment {
    type Error = ModelValidationError;

    fn try_from(value: CommentRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id.into(),
            post_id: value.post_id.into(),
            author_id: value.user_id.into(),
            content: CommentContent::new(value.content)?,
            created_at: value.created_at,
            author: author(value.user_id, value.username)?,
        })
    }
}
