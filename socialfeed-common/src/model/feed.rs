use serde::Deserialize;
use std::str::FromStr;
use thiserror::Error;
use time::{
    Date, OffsetDateTime, PrimitiveDateTime,
    format_description::{BorrowedFormatItem, well_known::Rfc3339},
    macros::format_description,
};

pub const FEED_LIMIT_MIN: u8 = 1;
pub const FEED_LIMIT_MAX: u8 = 20;

const FEED_DATE_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
const FEED_DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]");

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidFeedQueryError {
    #[error("limit must be between 1 and 20, got {0}")]
    Limit(i64),
    #[error("offset must not be negative, got {0}")]
    NegativeOffset(i64),
    #[error("offset must be at most {max}, got {0}", max = u32::MAX)]
    OffsetTooLarge(i64),
    #[error("sort must be either \"asc\" or \"desc\", got {0:?}")]
    Sort(String),
    #[error("{field} is not a valid date-time: {value:?}")]
    DateTime { field: &'static str, value: String },
}

/// Page size of a feed request, always within
/// `FEED_LIMIT_MIN..=FEED_LIMIT_MAX`.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct FeedLimit(u8);

impl FeedLimit {
    #[must_use]
    pub fn new(limit: i64) -> Option<Self> {
        u8::try_from(limit)
            .ok()
            .filter(|limit| (FEED_LIMIT_MIN..=FEED_LIMIT_MAX).contains(limit))
            .map(Self)
    }

    #[must_use]
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for FeedLimit {
    fn default() -> Self {
        Self(FEED_LIMIT_MAX)
    }
}

impl TryFrom<i64> for FeedLimit {
    type Error = InvalidFeedQueryError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidFeedQueryError::Limit(value))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = InvalidFeedQueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(InvalidFeedQueryError::Sort(other.to_owned())),
        }
    }
}

/// A validated feed request. Absent filters are `None`/empty and do not
/// restrict the feed.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash)]
pub struct FeedQuery {
    pub limit: FeedLimit,
    pub offset: u32,
    pub sort: SortOrder,
    pub search: Option<String>,
    pub tags: Vec<String>,
    pub since: Option<OffsetDateTime>,
    pub until: Option<OffsetDateTime>,
}

/// Feed parameters as they arrive in a query string, before validation.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize)]
#[serde(default)]
pub struct FeedQueryParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub sort: Option<String>,
    pub search: Option<String>,
    /// Comma separated.
    pub tags: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
}

impl TryFrom<FeedQueryParams> for FeedQuery {
    type Error = InvalidFeedQueryError;

    fn try_from(params: FeedQueryParams) -> Result<Self, Self::Error> {
        let limit = params
            .limit
            .map(FeedLimit::try_from)
            .transpose()?
            .unwrap_or_default();

        let offset = params
            .offset
            .map(parse_offset)
            .transpose()?
            .unwrap_or_default();

        let sort = non_blank(params.sort.as_deref())
            .map(SortOrder::from_str)
            .transpose()?
            .unwrap_or_default();

        let search = params.search.filter(|search| !search.is_empty());

        let tags = params
            .tags
            .as_deref()
            .map(parse_tags)
            .unwrap_or_default();

        let since = non_blank(params.since.as_deref())
            .map(|since| parse_feed_date_time("since", since))
            .transpose()?;
        let until = non_blank(params.until.as_deref())
            .map(|until| parse_feed_date_time("until", until))
            .transpose()?;

        Ok(Self {
            limit,
            offset,
            sort,
            search,
            tags,
            since,
            until,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn parse_offset(offset: i64) -> Result<u32, InvalidFeedQueryError> {
    u32::try_from(offset).map_err(|_| {
        if offset < 0 {
            InvalidFeedQueryError::NegativeOffset(offset)
        } else {
            InvalidFeedQueryError::OffsetTooLarge(offset)
        }
    })
}

fn parse_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Accepts `YYYY-MM-DD HH:MM:SS` (UTC), RFC 3339, or a bare `YYYY-MM-DD`
/// meaning midnight UTC.
fn parse_feed_date_time(
    field: &'static str,
    value: &str,
) -> Result<OffsetDateTime, InvalidFeedQueryError> {
    PrimitiveDateTime::parse(value, FEED_DATE_TIME_FORMAT)
        .map(PrimitiveDateTime::assume_utc)
        .or_else(|_| OffsetDateTime::parse(value, &Rfc3339))
        .or_else(|_| Date::parse(value, FEED_DATE_FORMAT).map(|date| date.midnight().assume_utc()))
        .map_err(|_| InvalidFeedQueryError::DateTime {
            field,
            value: value.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use crate::model::feed::{
        FEED_LIMIT_MAX, FeedLimit, FeedQuery, FeedQueryParams, InvalidFeedQueryError, SortOrder,
    };
    use time::macros::datetime;

    fn parse(params: FeedQueryParams) -> Result<FeedQuery, InvalidFeedQueryError> {
        FeedQuery::try_from(params)
    }

    #[test]
    fn defaults() {
        let query = parse(FeedQueryParams::default()).unwrap();

        assert_eq!(query, FeedQuery::default());
        assert_eq!(query.limit.get(), FEED_LIMIT_MAX);
        assert_eq!(query.offset, 0);
        assert_eq!(query.sort, SortOrder::Desc);
        assert_eq!(query.search, None);
        assert!(query.tags.is_empty());
        assert_eq!(query.since, None);
        assert_eq!(query.until, None);
    }

    #[test]
    fn limit_bounds() {
        assert_eq!(FeedLimit::new(1).map(FeedLimit::get), Some(1));
        assert_eq!(FeedLimit::new(20).map(FeedLimit::get), Some(20));
        assert_eq!(FeedLimit::new(0), None);
        assert_eq!(FeedLimit::new(21), None);
        assert_eq!(FeedLimit::new(-1), None);
        assert_eq!(FeedLimit::new(i64::from(u8::MAX) + 1), None);

        assert_eq!(
            parse(FeedQueryParams {
                limit: Some(25),
                ..FeedQueryParams::default()
            }),
            Err(InvalidFeedQueryError::Limit(25))
        );
    }

    #[test]
    fn negative_offset() {
        assert_eq!(
            parse(FeedQueryParams {
                offset: Some(-1),
                ..FeedQueryParams::default()
            }),
            Err(InvalidFeedQueryError::NegativeOffset(-1))
        );
    }

    #[test]
    fn offset_beyond_u32() {
        let result = parse(FeedQueryParams {
            offset: Some(5_000_000_000),
            ..FeedQueryParams::default()
        });

        assert_eq!(result, Err(InvalidFeedQueryError::OffsetTooLarge(5_000_000_000)));
        assert_eq!(
            result.unwrap_err().to_string(),
            "offset must be at most 4294967295, got 5000000000"
        );
        assert_eq!(
            parse(FeedQueryParams {
                offset: Some(i64::from(u32::MAX)),
                ..FeedQueryParams::default()
            })
            .map(|query| query.offset),
            Ok(u32::MAX)
        );
    }

    #[test]
    fn sort() {
        let asc = parse(FeedQueryParams {
            sort: Some("asc".to_owned()),
            ..FeedQueryParams::default()
        })
        .unwrap();
        assert_eq!(asc.sort, SortOrder::Asc);
        assert_eq!(asc.sort.as_sql(), "ASC");

        assert_eq!(
            parse(FeedQueryParams {
                sort: Some("sideways".to_owned()),
                ..FeedQueryParams::default()
            }),
            Err(InvalidFeedQueryError::Sort("sideways".to_owned()))
        );
    }

    #[test]
    fn empty_filters_are_absent() {
        let query = parse(FeedQueryParams {
            search: Some(String::new()),
            tags: Some(" , ,".to_owned()),
            since: Some(String::new()),
            until: Some("  ".to_owned()),
            ..FeedQueryParams::default()
        })
        .unwrap();

        assert_eq!(query, FeedQuery::default());
    }

    #[test]
    fn tags_are_comma_separated() {
        let query = parse(FeedQueryParams {
            tags: Some("golang, design,,golang".to_owned()),
            ..FeedQueryParams::default()
        })
        .unwrap();

        assert_eq!(query.tags, ["golang", "design", "golang"]);
    }

    #[test]
    fn date_formats() {
        let query = parse(FeedQueryParams {
            since: Some("2024-01-01 08:30:00".to_owned()),
            until: Some("2024-01-10T12:00:00+02:00".to_owned()),
            ..FeedQueryParams::default()
        })
        .unwrap();
        assert_eq!(query.since, Some(datetime!(2024-01-01 08:30 UTC)));
        assert_eq!(query.until, Some(datetime!(2024-01-10 10:00 UTC)));

        let query = parse(FeedQueryParams {
            since: Some("2024-01-05".to_owned()),
            ..FeedQueryParams::default()
        })
        .unwrap();
        assert_eq!(query.since, Some(datetime!(2024-01-05 00:00 UTC)));
    }

    #[test]
    fn invalid_date() {
        assert_eq!(
            parse(FeedQueryParams {
                until: Some("yesterday".to_owned()),
                ..FeedQueryParams::default()
            }),
            Err(InvalidFeedQueryError::DateTime {
                field: "until",
                value: "yesterday".to_owned()
            })
        );
    }
}
