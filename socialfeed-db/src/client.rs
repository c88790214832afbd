use crate::{
    MIGRATOR,
    config::DbConfig,
    feed::{Argument, feed_statement},
    record::{CommentRecord, FeedPostRecord, InsertedPostRecord, PostRecord, UserRecord},
};
use socialfeed_common::model::{
    Id, ModelValidationError,
    comment::{Comment, CommentContent},
    feed::FeedQuery,
    post::{NewPost, Post, PostMarker, PostVersion, PostWithMetadata},
    user::{User, UserMarker},
};
use sqlx::{PgPool, migrate::MigrateError, postgres::PgPoolOptions, query, query_as, query_scalar};
use std::{
    fmt::{Display, Formatter},
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

const COMMENTS_POST_ID_FKEY: &str = "comments_post_id_fkey";

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Repository operation an error happened in.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Operation {
    CreatePost,
    FetchPost,
    UpdatePost,
    DeletePost,
    FetchUserFeed,
    FetchPostComments,
    CreateComment,
    FetchUser,
}

impl Operation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::CreatePost => "create post",
            Operation::FetchPost => "fetch post",
            Operation::UpdatePost => "update post",
            Operation::DeletePost => "delete post",
            Operation::FetchUserFeed => "fetch user feed",
            Operation::FetchPostComments => "fetch post comments",
            Operation::CreateComment => "create comment",
            Operation::FetchUser => "fetch user",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    /// No row matched. For [`Operation::UpdatePost`] this also covers a stale
    /// expected version.
    #[error("{operation}: post {post_id} was not found")]
    PostNotFound {
        operation: Operation,
        post_id: Id<PostMarker>,
    },
    #[error("{operation} failed: {source}")]
    Storage {
        operation: Operation,
        #[source]
        source: StorageError,
    },
}

impl DbError {
    #[must_use]
    pub fn operation(&self) -> Operation {
        match self {
            DbError::PostNotFound { operation, .. } | DbError::Storage { operation, .. } => {
                *operation
            }
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::PostNotFound { .. })
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            DbError::Storage {
                source: StorageError::Timeout(_),
                ..
            }
        )
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("query did not finish within {0:?}")]
    Timeout(Duration),
    #[error("an object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Post storage on Postgres.
///
/// Every operation is a single statement on a pooled connection and is
/// abandoned with [`StorageError::Timeout`] once the configured query timeout
/// passes. Dropping a returned future cancels the statement and hands the
/// connection back to the pool.
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
    query_timeout: Duration,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub async fn connect(config: &DbConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .idle_timeout(config.idle_timeout)
            .connect(&config.database_url)
            .await?;

        Ok(Self::new(pool, config.query_timeout))
    }

    pub async fn migrate(&self) -> Result<(), MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    #[must_use]
    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    async fn run<T>(
        &self,
        operation: Operation,
        query: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T> {
        bounded(self.query_timeout, operation, query).await
    }

    #[instrument(level = "debug", skip(self, post))]
    pub async fn create_post(&self, author: Id<UserMarker>, post: &NewPost) -> Result<Post> {
        let inserted = self
            .run(Operation::CreatePost, self.insert_post(author, post))
            .await?;

        Ok(Post {
            id: inserted.id.into(),
            title: post.title.clone(),
            content: post.content.clone(),
            author_id: author,
            tags: post.tags.clone(),
            created_at: inserted.created_at,
            updated_at: inserted.updated_at,
            version: PostVersion::new(inserted.version),
            comments: Vec::new(),
            author: None,
        })
    }

    async fn insert_post(
        &self,
        author: Id<UserMarker>,
        post: &NewPost,
    ) -> Result<InsertedPostRecord, StorageError> {
        let record = query_as::<_, InsertedPostRecord>(
            "
            INSERT INTO posts (title, content, user_id, tags)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at, updated_at, version
            ",
        )
        .bind(post.title.get())
        .bind(post.content.get())
        .bind(author.get())
        .bind(post.tags.as_slice())
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// Fetches a post with its version. Comments and author are left empty.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_post(&self, post_id: Id<PostMarker>) -> Result<Post> {
        self.run(Operation::FetchPost, self.select_post(post_id))
            .await?
            .ok_or_else(|| not_found(Operation::FetchPost, post_id))
    }

    async fn select_post(&self, post_id: Id<PostMarker>) -> Result<Option<Post>, StorageError> {
        let record = query_as::<_, PostRecord>(
            "
            SELECT
                posts.id,
                posts.user_id,
                posts.title,
                posts.content,
                posts.tags,
                posts.created_at,
                posts.updated_at,
                posts.version
            FROM
                posts
            WHERE
                posts.id = $1
            ",
        )
        .bind(post_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Post::try_from).transpose()?)
    }

    /// Deletes a post. Deleting an already deleted post is
    /// [`DbError::PostNotFound`].
    #[instrument(level = "debug", skip(self))]
    pub async fn delete_post(&self, post_id: Id<PostMarker>) -> Result<()> {
        let rows_affected = self
            .run(Operation::DeletePost, self.delete_post_row(post_id))
            .await?;

        if rows_affected == 0 {
            return Err(not_found(Operation::DeletePost, post_id));
        }

        Ok(())
    }

    async fn delete_post_row(&self, post_id: Id<PostMarker>) -> Result<u64, StorageError> {
        let result = query("DELETE FROM posts WHERE posts.id = $1")
            .bind(post_id.get())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Writes the title, content and tags of `post`, provided the stored
    /// version still equals `post.version`, and returns the new version.
    ///
    /// A missing post and a stale version are indistinguishable here: both
    /// fail with [`DbError::PostNotFound`] and leave the stored post as it was.
    #[instrument(level = "debug", skip(self, post), fields(post_id = %post.id, expected_version = post.version.get()))]
    pub async fn update_post(&self, post: &Post) -> Result<PostVersion> {
        self.run(Operation::UpdatePost, self.update_post_if_current(post))
            .await?
            .ok_or_else(|| not_found(Operation::UpdatePost, post.id))
    }

    async fn update_post_if_current(
        &self,
        post: &Post,
    ) -> Result<Option<PostVersion>, StorageError> {
        let version = query_scalar::<_, i32>(
            "
            UPDATE posts
            SET
                title = $1,
                content = $2,
                tags = $3,
                version = version + 1
            WHERE
                posts.id = $4 AND posts.version = $5
            RETURNING posts.version
            ",
        )
        .bind(post.title.get())
        .bind(post.content.get())
        .bind(post.tags.as_slice())
        .bind(post.id.get())
        .bind(post.version.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(version.map(PostVersion::new))
    }

    /// Own posts and posts of followed users, newest or oldest first as
    /// requested. An empty feed is not an error.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_user_feed(
        &self,
        user_id: Id<UserMarker>,
        feed_query: &FeedQuery,
    ) -> Result<Vec<PostWithMetadata>> {
        self.run(
            Operation::FetchUserFeed,
            self.select_user_feed(user_id, feed_query),
        )
        .await
    }

    async fn select_user_feed(
        &self,
        user_id: Id<UserMarker>,
        feed_query: &FeedQuery,
    ) -> Result<Vec<PostWithMetadata>, StorageError> {
        let statement = feed_statement(user_id, feed_query);
        debug!(
            sql = statement.sql(),
            arguments = statement.arguments().len(),
            "Querying feed"
        );
        let (sql, arguments) = statement.into_parts();

        let mut query = query_as::<_, FeedPostRecord>(&sql);
        for argument in arguments {
            query = match argument {
                Argument::BigInt(value) => query.bind(value),
                Argument::Text(value) => query.bind(value),
                Argument::TextArray(value) => query.bind(value),
                Argument::Timestamp(value) => query.bind(value),
            };
        }

        let records = query.fetch_all(&self.pool).await?;

        let feed: Vec<PostWithMetadata> = records
            .into_iter()
            .map(PostWithMetadata::try_from)
            .collect::<Result<_, _>>()?;
        Ok(feed)
    }

    /// Comments on a post, oldest first, with their authors.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_post_comments(&self, post_id: Id<PostMarker>) -> Result<Vec<Comment>> {
        self.run(
            Operation::FetchPostComments,
            self.select_post_comments(post_id),
        )
        .await
    }

    async fn select_post_comments(
        &self,
        post_id: Id<PostMarker>,
    ) -> Result<Vec<Comment>, StorageError> {
        let records = query_as::<_, CommentRecord>(
            "
            SELECT
                comments.id,
                comments.post_id,
                comments.user_id,
                comments.content,
                comments.created_at,
                users.username
            FROM
                comments LEFT JOIN users ON users.id = comments.user_id
            WHERE
                comments.post_id = $1
            ORDER BY
                comments.created_at ASC, comments.id ASC
            ",
        )
        .bind(post_id.get())
        .fetch_all(&self.pool)
        .await?;

        let comments: Vec<Comment> = records
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<_, _>>()?;
        Ok(comments)
    }

    #[instrument(level = "debug", skip(self, content))]
    pub async fn create_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        content: &CommentContent,
    ) -> Result<Comment> {
        self.run(
            Operation::CreateComment,
            self.insert_comment(post_id, author, content),
        )
        .await?
        .ok_or_else(|| not_found(Operation::CreateComment, post_id))
    }

    async fn insert_comment(
        &self,
        post_id: Id<PostMarker>,
        author: Id<UserMarker>,
        content: &CommentContent,
    ) -> Result<Option<Comment>, StorageError> {
        let result = query_as::<_, CommentRecord>(
            "
            WITH inserted AS (
                INSERT INTO comments (post_id, user_id, content)
                VALUES ($1, $2, $3)
                RETURNING id, post_id, user_id, content, created_at
            )
            SELECT
                inserted.id,
                inserted.post_id,
                inserted.user_id,
                inserted.content,
                inserted.created_at,
                users.username
            FROM
                inserted LEFT JOIN users ON users.id = inserted.user_id
            ",
        )
        .bind(post_id.get())
        .bind(author.get())
        .bind(content.get())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(record) => Ok(Some(Comment::try_from(record)?)),
            Err(sqlx::Error::Database(err))
                if err.is_foreign_key_violation()
                    && err.constraint() == Some(COMMENTS_POST_ID_FKEY) =>
            {
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>> {
        self.run(Operation::FetchUser, self.select_user(user_id))
            .await
    }

    async fn select_user(&self, user_id: Id<UserMarker>) -> Result<Option<User>, StorageError> {
        let record = query_as::<_, UserRecord>(
            "
            SELECT
                users.id,
                users.username
            FROM
                users
            WHERE
                users.id = $1
            ",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(User::try_from).transpose()?)
    }
}

fn not_found(operation: Operation, post_id: Id<PostMarker>) -> DbError {
    debug!(%operation, %post_id, "No matching post");
    DbError::PostNotFound { operation, post_id }
}

/// Runs `query`, giving up after `timeout`.
async fn bounded<T>(
    timeout: Duration,
    operation: Operation,
    query: impl Future<Output = Result<T, StorageError>>,
) -> Result<T> {
    match tokio::time::timeout(timeout, query).await {
        Ok(result) => result.map_err(|source| DbError::Storage { operation, source }),
        Err(_) => {
            warn!(%operation, ?timeout, "Database query timed out");
            Err(DbError::Storage {
                operation,
                source: StorageError::Timeout(timeout),
            })
        }
    }
}
