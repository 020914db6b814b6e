//! Screens and the context they work against
//!
//! Each screen is a variant of [`View`].  Views draw into a region of
//! the frame, react to keys and feed events, and talk to the rest of
//! the client only through [`Ctx`] and the [`Action`] they return.
//! Network work is queued on the context's outbox and sent by the
//! engine, which stamps each request before handing it to the feed
//! service.

mod composer;
mod help;
mod login;
mod post;
mod thread;
mod timeline;
mod widget;

pub use composer::{ComposerView, Mode};
pub use help::{HelpView, KeyHelp};
pub use login::LoginView;
pub use thread::ThreadView;
pub use timeline::TimelineView;

use crate::cache::{Caches, Mutation, TimelineCache};
use crate::config::{Config, Geometry};
use crate::feed::{FeedEvent, FeedRequest, FeedTarget, Post, PostId};
use crate::frame::Region;
use crate::key::Key;
use crate::session::{Preferences, Session};

/// Message shown on the status line until the next keypress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub text: String,
    pub error: bool,
}

/// A request waiting to be sent, with the copy of the post to put
/// back if it fails
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub request: FeedRequest,
    pub undo: Option<Post>,
}

/// State shared by all views, owned by the engine
pub struct Ctx {
    pub geometry: Geometry,
    pub host: String,
    /// Username to offer on the login screen
    pub username: String,
    pub session: Option<Session>,
    pub caches: Caches,
    pub status: Option<Status>,
    pub outbox: Vec<Outgoing>,
    pub page_size: usize,
    pub scroll_margin: usize,
    /// Ring the terminal bell on the next render
    pub bell: bool,
    /// Session preferences changed and should be saved
    pub prefs_changed: bool,
}

impl Ctx {
    pub fn new(config: &Config) -> Self {
        Self {
            geometry: config.geometry(),
            host: config.instance.clone(),
            username: config.username.clone(),
            session: None,
            caches: Caches::default(),
            status: None,
            outbox: Vec::new(),
            page_size: config.page_size,
            scroll_margin: config.scroll_margin,
            bell: false,
            prefs_changed: false,
        }
    }

    pub fn send(&mut self, request: FeedRequest) {
        self.outbox.push(Outgoing {
            request,
            undo: None,
        });
    }

    /// Apply a change locally to every cache holding the post, and
    /// queue the request that makes it on the server
    pub fn mutate(&mut self, id: &PostId, change: Mutation, request: FeedRequest) {
        let undo = self.caches.find(id).cloned();
        self.caches.mutate(id, &change);
        self.outbox.push(Outgoing { request, undo });
    }

    /// Run one of the cache load operations and queue the resulting
    /// request, if any
    pub fn fetch(
        &mut self,
        target: &FeedTarget,
        load: impl FnOnce(&mut TimelineCache, usize) -> Option<FeedRequest>,
    ) {
        let limit = self.page_size;
        let request = load(self.caches.entry(target), limit);
        if let Some(request) = request {
            self.send(request);
        }
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            error: false,
        });
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.status = Some(Status {
            text: text.into(),
            error: true,
        });
    }

    pub fn prefs(&self) -> Preferences {
        self.session.as_ref().map(|s| s.prefs).unwrap_or_default()
    }

    pub fn prefs_mut(&mut self) -> Option<&mut Preferences> {
        self.prefs_changed = true;
        self.session.as_mut().map(|s| &mut s.prefs)
    }
}

/// Views that may form the bottom of the navigation stack
pub enum Base {
    Login(LoginView),
    Timeline(TimelineView),
}

/// Views that are opened on top of another and closed back to it
pub enum Overlay {
    Composer(ComposerView),
    Thread(ThreadView),
    Help(HelpView),
}

/// What a view asks for after handling an event
pub enum Action {
    /// Not handled; global keys get a chance
    Ignored,
    Handled,
    Open(Overlay),
    /// Close this view, returning to the one below
    Close,
    Replace(Base),
    SignedIn(Session),
    SignOut,
    Quit,
}

pub enum View {
    Login(LoginView),
    Timeline(TimelineView),
    Composer(ComposerView),
    Thread(ThreadView),
    Help(HelpView),
}

impl From<Base> for View {
    fn from(base: Base) -> Self {
        match base {
            Base::Login(v) => View::Login(v),
            Base::Timeline(v) => View::Timeline(v),
        }
    }
}

impl From<Overlay> for View {
    fn from(overlay: Overlay) -> Self {
        match overlay {
            Overlay::Composer(v) => View::Composer(v),
            Overlay::Thread(v) => View::Thread(v),
            Overlay::Help(v) => View::Help(v),
        }
    }
}

impl View {
    pub fn render(&mut self, ctx: &mut Ctx, r: &mut Region<'_>) {
        match self {
            View::Login(v) => v.render(ctx, r),
            View::Timeline(v) => v.render(ctx, r),
            View::Composer(v) => v.render(ctx, r),
            View::Thread(v) => v.render(ctx, r),
            View::Help(v) => v.render(ctx, r),
        }
    }

    pub fn handle_key(&mut self, ctx: &mut Ctx, key: Key) -> Action {
        match self {
            View::Login(v) => v.handle_key(ctx, key),
            View::Timeline(v) => v.handle_key(ctx, key),
            View::Composer(v) => v.handle_key(ctx, key),
            View::Thread(v) => v.handle_key(ctx, key),
            View::Help(v) => v.handle_key(ctx, key),
        }
    }

    /// Deliver a completed request.  `shown` is false for a view that
    /// is covered by another, which must only update its own
    /// bookkeeping.
    pub fn handle_feed(&mut self, ctx: &mut Ctx, event: &FeedEvent, shown: bool) -> Action {
        match self {
            View::Login(v) => v.handle_feed(ctx, event, shown),
            View::Timeline(v) => v.handle_feed(ctx, event, shown),
            View::Composer(_) | View::Help(_) => Action::Handled,
            View::Thread(v) => v.handle_feed(ctx, event, shown),
        }
    }

    pub fn on_enter(&mut self, ctx: &mut Ctx) {
        match self {
            View::Login(v) => v.on_enter(ctx),
            View::Timeline(v) => v.on_enter(ctx),
            View::Composer(_) | View::Help(_) => (),
            View::Thread(v) => v.on_enter(ctx),
        }
    }

    pub fn on_exit(&mut self, ctx: &mut Ctx) {
        match self {
            View::Login(v) => v.on_exit(ctx),
            View::Timeline(_) | View::Composer(_) | View::Thread(_) | View::Help(_) => (),
        }
    }

    /// Does this view show the given cache?
    pub fn owns(&self, target: &FeedTarget) -> bool {
        match self {
            View::Timeline(v) => v.target() == target,
            View::Thread(v) => v.target() == target,
            View::Login(_) | View::Composer(_) | View::Help(_) => false,
        }
    }

    pub fn title(&self) -> String {
        match self {
            View::Login(_) => "Log in".to_string(),
            View::Timeline(v) => v.title(),
            View::Composer(v) => v.title(),
            View::Thread(_) => "Thread".to_string(),
            View::Help(v) => v.title(),
        }
    }

    /// The keys this view answers to
    pub fn keys(&self) -> &'static [KeyHelp] {
        match self {
            View::Login(_) => help::LOGIN_KEYS,
            View::Timeline(_) => help::TIMELINE_KEYS,
            View::Composer(_) => help::COMPOSER_KEYS,
            View::Thread(_) => help::THREAD_KEYS,
            View::Help(_) => &[],
        }
    }
}
