//! Feed Service interface
//!
//! The network side of the client lives outside this crate.  An
//! implementation of [`FeedService`] is handed each request together
//! with a [`Ticket`], does the work however it likes without blocking
//! the event loop, and later delivers a [`FeedEvent`] carrying the
//! same ticket through the `Fwd<FeedEvent>` it was given at
//! construction.  Responses may arrive in any order.

use crate::session::Session;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque post identifier, unique within an instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PostId(pub String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque pagination token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageToken(pub String);

impl PageToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

/// Timelines the client can show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedKind {
    Home,
    Local,
    Public,
    Bookmarks,
}

impl FeedKind {
    pub const ALL: [FeedKind; 4] = [
        FeedKind::Home,
        FeedKind::Local,
        FeedKind::Public,
        FeedKind::Bookmarks,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FeedKind::Home => "Home",
            FeedKind::Local => "Local",
            FeedKind::Public => "Federated",
            FeedKind::Bookmarks => "Bookmarks",
        }
    }
}

/// What a fetch is for, and which cache its results belong to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedTarget {
    Timeline(FeedKind),
    /// Context of a single post: ancestors, the post, descendants
    Thread(PostId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Unlisted,
    Private,
    Direct,
}

impl Visibility {
    pub const ALL: [Visibility; 4] = [
        Visibility::Public,
        Visibility::Unlisted,
        Visibility::Private,
        Visibility::Direct,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Unlisted => "quiet public",
            Visibility::Private => "followers",
            Visibility::Direct => "specific accounts",
        }
    }
}

impl Default for Visibility {
    fn default() -> Self {
        Visibility::Public
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub url: String,
    pub description: Option<String>,
}

/// The authenticated user's interaction state with a post, and its
/// public counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interactions {
    pub liked: bool,
    pub boosted: bool,
    pub bookmarked: bool,
    pub likes: u32,
    pub boosts: u32,
    pub replies: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    /// Account handle, e.g. `user@example.social`
    pub author: String,
    pub display_name: String,
    /// Body already reduced to plain text
    pub body: String,
    /// Content warning; the body is hidden behind it until expanded
    pub spoiler: Option<String>,
    pub attachments: Vec<Attachment>,
    pub visibility: Visibility,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    /// Set only for the authenticated user's own posts
    pub own: bool,
    pub interactions: Interactions,
    pub in_reply_to: Option<PostId>,
    /// Handle of the account that boosted this post into the feed
    pub boosted_by: Option<String>,
}

/// One page of a timeline, in server delivery order
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub posts: Vec<Post>,
    pub older: Option<PageToken>,
    pub newer: Option<PageToken>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// First page of an empty cache
    Initial,
    Older,
    Newer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionKind {
    Like,
    Boost,
    Bookmark,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRequest {
    FetchPage {
        target: FeedTarget,
        direction: Direction,
        cursor: Option<PageToken>,
        limit: usize,
    },
    PostStatus {
        body: String,
        spoiler: Option<String>,
        visibility: Visibility,
        in_reply_to: Option<PostId>,
    },
    EditStatus {
        id: PostId,
        body: String,
        spoiler: Option<String>,
    },
    DeleteStatus {
        id: PostId,
    },
    SetInteraction {
        id: PostId,
        kind: InteractionKind,
        on: bool,
    },
    Authenticate {
        host: String,
        username: String,
        password: String,
    },
    Deauthenticate,
}

#[derive(Debug, Clone)]
pub enum FeedReply {
    Page(Page),
    Posted(Post),
    Edited(Post),
    Deleted(PostId),
    Interaction(PostId, Interactions),
    Authenticated(Session),
    Deauthenticated,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("rate limited, try again later")]
    RateLimited,
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
}

impl FeedError {
    /// Everything but an authentication failure is worth retrying
    pub fn is_transient(&self) -> bool {
        !matches!(self, FeedError::Auth(_))
    }
}

/// Stamp on each outbound request.  `generation` is the navigation
/// generation at the time the request was issued, which is how stale
/// responses are recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: u64,
    pub generation: u64,
    pub target: Option<FeedTarget>,
}

/// Completion of a request
#[derive(Debug, Clone)]
pub struct FeedEvent {
    pub ticket: Ticket,
    pub result: Result<FeedReply, FeedError>,
}

/// Capability used to reach the remote instance.  `submit` must not
/// block; the outcome is delivered later as a [`FeedEvent`].
pub trait FeedService {
    fn submit(&mut self, ticket: Ticket, request: FeedRequest);
}
