//! Assembly of the personalized feed query.
//!
//! The feed has an open set of optional filters, so its SQL is put together
//! at runtime. [`Statement`] keeps the SQL text and the bind arguments side by
//! side: the only way to get a `$n` placeholder is to bind the value it stands
//! for, which keeps placeholder numbers and argument order in lock-step no
//! matter which filters are present.

use socialfeed_common::model::{Id, feed::FeedQuery, user::UserMarker};
use std::fmt::{Display, Formatter};
use time::OffsetDateTime;

/// A value bound to a positional placeholder.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) enum Argument {
    BigInt(i64),
    Text(String),
    TextArray(Vec<String>),
    Timestamp(OffsetDateTime),
}

/// The `$n` reference to a bound argument. May be written into the SQL any
/// number of times.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub(crate) struct Placeholder(usize);

impl Display for Placeholder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "${}", self.0)
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub(crate) struct Statement {
    sql: String,
    arguments: Vec<Argument>,
}

impl Statement {
    pub fn push(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    #[must_use]
    pub fn bind(&mut self, argument: Argument) -> Placeholder {
        self.arguments.push(argument);
        Placeholder(self.arguments.len())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    pub fn into_parts(self) -> (String, Vec<Argument>) {
        (self.sql, self.arguments)
    }
}

/// Builds the feed of `user_id`: their own posts and posts of users they
/// follow, with comment counts, filtered, ordered and paginated as `query`
/// asks.
pub(crate) fn feed_statement(user_id: Id<UserMarker>, query: &FeedQuery) -> Statement {
    let mut statement = Statement::default();

    let user = statement.bind(Argument::BigInt(user_id.get()));
    statement.push(&format!(
        "
        SELECT
            p.id,
            p.user_id,
            p.title,
            p.content,
            p.tags,
            p.created_at,
            p.updated_at,
            p.version,
            u.username,
            COUNT(c.id) AS comments_count
        FROM
            posts p
            LEFT JOIN comments c ON c.post_id = p.id
            LEFT JOIN users u ON u.id = p.user_id
            LEFT JOIN followers f ON f.user_id = {user} AND f.follower_id = p.user_id
        WHERE
            (p.user_id = {user} OR f.user_id IS NOT NULL)"
    ));

    if let Some(search) = query.search.as_deref().filter(|search| !search.is_empty()) {
        let pattern = statement.bind(Argument::Text(substring_pattern(search)));
        statement.push(&format!(
            "
            AND (p.title ILIKE {pattern} OR p.content ILIKE {pattern})"
        ));
    }

    if !query.tags.is_empty() {
        let tags = statement.bind(Argument::TextArray(query.tags.clone()));
        statement.push(&format!(
            "
            AND p.tags && {tags}"
        ));
    }

    if let Some(since) = query.since {
        let since = statement.bind(Argument::Timestamp(since));
        statement.push(&format!(
            "
            AND p.created_at >= {since}"
        ));
    }

    if let Some(until) = query.until {
        let until = statement.bind(Argument::Timestamp(until));
        statement.push(&format!(
            "
            AND p.created_at <= {until}"
        ));
    }

    // Ties on created_at are broken by id in the same direction, so asc and
    // desc stay exact reverses and pages never overlap.
    let order = query.sort.as_sql();
    let limit = statement.bind(Argument::BigInt(i64::from(query.limit.get())));
    let offset = statement.bind(Argument::BigInt(i64::from(query.offset)));
    statement.push(&format!(
        "
        GROUP BY
            p.id, u.username
        ORDER BY
            p.created_at {order}, p.id {order}
        LIMIT {limit} OFFSET {offset}
        "
    ));

    statement
}

/// `ILIKE` pattern matching `term` anywhere, with the pattern metacharacters
/// of `term` itself taken literally.
fn substring_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
