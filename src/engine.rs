//! Client state machine
//!
//! The engine owns the navigation stack, the caches and the frame,
//! and is driven by three calls: [`Engine::handle_key`],
//! [`Engine::handle_feed`] and [`Engine::tick`].  Each runs to
//! completion before the next.  After any of them, [`Engine::render`]
//! returns the new frame if anything may have changed.
//!
//! Every request leaving the engine carries a [`Ticket`] stamped with
//! the navigation generation.  The generation goes up on each push,
//! pop or base replacement.  A response is always merged into the
//! caches, but only the views that show the affected cache hear about
//! it, and only if that cache is on screen does it redraw or report
//! a failure.  Replies that aren't about a cache, such as a login,
//! are acted on only in the generation that asked for them.

use crate::cache::Mutation;
use crate::config::Config;
use crate::feed::{
    Direction, FeedError, FeedEvent, FeedKind, FeedReply, FeedRequest, FeedService, FeedTarget,
    Post, Ticket,
};
use crate::frame::{Attr, Frame};
use crate::key::Key;
use crate::nav::Navigator;
use crate::session::SessionStore;
use crate::text::truncate;
use crate::view::{Action, Base, Ctx, HelpView, LoginView, Overlay, TimelineView, View};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::time::{Duration, Instant};

// Bookkeeping for an outstanding request
struct Pending {
    ticket: Ticket,
    deadline: Instant,
    direction: Option<Direction>,
    undo: Option<Post>,
    what: &'static str,
    // Failures are reported by the view itself
    quiet: bool,
}

fn describe(request: &FeedRequest) -> &'static str {
    match request {
        FeedRequest::FetchPage { .. } => "load posts",
        FeedRequest::PostStatus { .. } => "post",
        FeedRequest::EditStatus { .. } => "edit post",
        FeedRequest::DeleteStatus { .. } => "delete post",
        FeedRequest::SetInteraction { .. } => "update post",
        FeedRequest::Authenticate { .. } => "log in",
        FeedRequest::Deauthenticate => "log out",
    }
}

pub struct Engine {
    ctx: Ctx,
    nav: Navigator,
    feed: Box<dyn FeedService>,
    store: Box<dyn SessionStore>,
    generation: u64,
    next_ticket: u64,
    pending: HashMap<u64, Pending>,
    timeout: Duration,
    frame: Frame,
    dirty: bool,
    quit: bool,
}

impl Engine {
    /// Set up the engine.  A saved session for the configured
    /// instance goes straight to the home timeline; otherwise the
    /// login screen is shown.
    pub fn new(config: &Config, feed: Box<dyn FeedService>, store: Box<dyn SessionStore>) -> Self {
        let mut ctx = Ctx::new(config);
        ctx.session = match store.load_session(&config.instance) {
            Ok(session) => session,
            Err(e) => {
                warn!("ignoring saved session for {}: {}", config.instance, e);
                None
            }
        };
        let base = match ctx.session {
            Some(ref session) => {
                info!("resuming session for {}@{}", session.username, session.host);
                Base::Timeline(TimelineView::new(FeedKind::Home))
            }
            None => Base::Login(LoginView::new(&config.username)),
        };
        let geometry = ctx.geometry;
        Self {
            ctx,
            nav: Navigator::new(base),
            feed,
            store,
            generation: 0,
            next_ticket: 1,
            pending: HashMap::new(),
            timeout: config.request_timeout(),
            frame: Frame::new(geometry.rows, geometry.columns),
            dirty: true,
            quit: false,
        }
    }

    /// Enter the first view, which may issue its first requests
    pub fn start(&mut self, now: Instant) {
        self.nav.enter(&mut self.ctx);
        self.dispatch(now);
        self.dirty = true;
    }

    pub fn ctx(&self) -> &Ctx {
        &self.ctx
    }

    pub fn top(&self) -> &View {
        self.nav.top()
    }

    pub fn depth(&self) -> usize {
        self.nav.depth()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn is_quit(&self) -> bool {
        self.quit
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Return and clear the bell request
    pub fn take_bell(&mut self) -> bool {
        std::mem::replace(&mut self.ctx.bell, false)
    }

    /// Earliest request deadline, for scheduling the next tick
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.deadline).min()
    }

    pub fn handle_key(&mut self, key: Key, now: Instant) {
        if self.quit {
            return;
        }
        self.ctx.status = None;
        let action = match self.nav.top_mut().handle_key(&mut self.ctx, key) {
            Action::Ignored => self.global_key(key),
            action => action,
        };
        self.apply(action);
        self.save_prefs();
        self.dispatch(now);
        self.dirty = true;
    }

    fn global_key(&mut self, key: Key) -> Action {
        match key {
            Key::Ctrl('c') => Action::Quit,
            Key::Char('?') | Key::F(1) => {
                let top = self.nav.top();
                Action::Open(Overlay::Help(HelpView::new(top.title(), top.keys())))
            }
            _ => Action::Ignored,
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Ignored | Action::Handled => return,
            Action::Open(overlay) => self.nav.push(&mut self.ctx, overlay),
            Action::Close => {
                if !self.nav.pop(&mut self.ctx) {
                    return;
                }
            }
            Action::Replace(base) => self.nav.replace_base(&mut self.ctx, base),
            Action::SignedIn(session) => {
                info!("signed in as {}@{}", session.username, session.host);
                if let Err(e) = self.store.save_session(&session) {
                    error!("unable to save session: {}", e);
                    self.ctx.error(format!("Session not saved: {}", e));
                }
                self.ctx.session = Some(session);
                let base = Base::Timeline(TimelineView::new(FeedKind::Home));
                self.nav.replace_base(&mut self.ctx, base);
            }
            Action::SignOut => {
                if self.ctx.session.is_some() {
                    self.ctx.send(FeedRequest::Deauthenticate);
                }
                self.sign_out();
                return;
            }
            Action::Quit => {
                info!("quit requested");
                self.quit = true;
                return;
            }
        }
        self.generation += 1;
        self.dirty = true;
    }

    // Drop the session and everything loaded under it.  Responses to
    // requests made under the old session are ignored.
    fn sign_out(&mut self) {
        if let Some(session) = self.ctx.session.take() {
            info!("signing out {}@{}", session.username, session.host);
            if let Err(e) = self.store.forget_session(&session.host) {
                error!("unable to remove saved session: {}", e);
            }
        }
        self.ctx.caches.clear();
        self.pending.clear();
        let base = Base::Login(LoginView::new(&self.ctx.username));
        self.nav.replace_base(&mut self.ctx, base);
        self.generation += 1;
        self.dirty = true;
    }

    fn save_prefs(&mut self) {
        if std::mem::replace(&mut self.ctx.prefs_changed, false) {
            if let Some(session) = &self.ctx.session {
                if let Err(e) = self.store.save_session(session) {
                    warn!("unable to save preferences: {}", e);
                }
            }
        }
    }

    // Stamp and send everything the views queued
    fn dispatch(&mut self, now: Instant) {
        for out in std::mem::take(&mut self.ctx.outbox) {
            let (target, direction) = match &out.request {
                FeedRequest::FetchPage {
                    target, direction, ..
                } => (Some(target.clone()), Some(*direction)),
                _ => (None, None),
            };
            let ticket = Ticket {
                id: self.next_ticket,
                generation: self.generation,
                target,
            };
            self.next_ticket += 1;
            debug!("request {} gen {}: {}", ticket.id, ticket.generation, describe_for_log(&out.request));
            let quiet = matches!(
                out.request,
                FeedRequest::Authenticate { .. } | FeedRequest::Deauthenticate
            );
            self.pending.insert(
                ticket.id,
                Pending {
                    ticket: ticket.clone(),
                    deadline: now + self.timeout,
                    direction,
                    undo: out.undo,
                    what: describe(&out.request),
                    quiet,
                },
            );
            self.feed.submit(ticket, out.request);
        }
    }

    pub fn handle_feed(&mut self, event: FeedEvent, now: Instant) {
        let pending = match self.pending.remove(&event.ticket.id) {
            Some(p) => p,
            None => {
                debug!("dropping response to unknown or expired request {}", event.ticket.id);
                return;
            }
        };
        let current = event.ticket.generation == self.generation;
        // A cache response matters if the cache is on screen now, by
        // whatever navigation it got back there
        let shown = match &event.ticket.target {
            Some(target) => self.nav.top().owns(target),
            None => current,
        };
        debug!(
            "response {} gen {} ({}): {}",
            event.ticket.id,
            event.ticket.generation,
            if shown { "shown" } else { "hidden" },
            if event.result.is_ok() { "ok" } else { "failed" }
        );

        match &event.result {
            Ok(reply) => self.merge(reply, &pending),
            Err(e) => {
                if let Some(post) = &pending.undo {
                    self.ctx.caches.replace(post);
                    self.dirty = true;
                }
                if let (Some(target), Some(direction)) = (&event.ticket.target, pending.direction) {
                    self.ctx.caches.entry(target).fetch_failed(direction);
                }
                if !e.is_transient() && self.ctx.session.is_some() {
                    warn!("{}", e);
                    self.sign_out();
                    self.ctx.error("Session expired, please log in again");
                    self.dispatch(now);
                    return;
                }
                // A failed fetch for a cache that isn't on screen says
                // nothing; the view asks again when it is next shown
                let hidden_fetch = pending.direction.is_some() && !shown;
                if !pending.quiet && !hidden_fetch {
                    warn!("could not {}: {}", pending.what, e);
                    self.ctx.error(format!("Could not {}: {}", pending.what, e));
                    self.dirty = true;
                }
            }
        }

        // Deliver to the views showing the affected cache, or to the
        // top view for requests that aren't about a cache
        let mut action = Action::Handled;
        match &event.ticket.target {
            Some(target) => {
                let depth = self.nav.depth();
                for (i, view) in self.nav.views_mut().enumerate() {
                    if view.owns(target) {
                        let top = i + 1 == depth;
                        let result = view.handle_feed(&mut self.ctx, &event, top);
                        if top {
                            action = result;
                        }
                    }
                }
                if shown {
                    self.dirty = true;
                }
            }
            None => {
                if current {
                    action = self.nav.top_mut().handle_feed(&mut self.ctx, &event, current);
                }
                self.dirty = true;
            }
        }
        self.apply(action);
        self.save_prefs();
        self.dispatch(now);
    }

    // Apply a successful reply to the caches
    fn merge(&mut self, reply: &FeedReply, pending: &Pending) {
        let caches = &mut self.ctx.caches;
        match reply {
            FeedReply::Page(page) => {
                if let (Some(target), Some(direction)) = (&pending.ticket.target, pending.direction) {
                    caches.entry(target).apply_page(direction, page.clone());
                }
            }
            FeedReply::Posted(post) => {
                info!("posted {}", post.id);
                let home = FeedTarget::Timeline(FeedKind::Home);
                if caches.get(&home).map_or(false, |c| c.is_loaded()) {
                    caches.entry(&home).insert_head(post.clone());
                }
                if let Some(parent) = &post.in_reply_to {
                    caches.add_reply(parent, post);
                }
                self.ctx.info("Posted");
                self.dirty = true;
            }
            FeedReply::Edited(post) => {
                caches.replace(post);
                self.ctx.info("Post updated");
                self.dirty = true;
            }
            FeedReply::Deleted(id) => caches.mutate(id, &Mutation::Delete),
            FeedReply::Interaction(id, counts) => caches.mutate(id, &Mutation::Counts(*counts)),
            FeedReply::Authenticated(_) | FeedReply::Deauthenticated => (),
        }
    }

    /// Time out overdue requests.  Each surfaces as a failure, just as
    /// if the feed service had reported one.
    pub fn tick(&mut self, now: Instant) {
        let mut expired: Vec<Ticket> = self
            .pending
            .values()
            .filter(|p| p.deadline <= now)
            .map(|p| p.ticket.clone())
            .collect();
        expired.sort_by_key(|t| t.id);
        for ticket in expired {
            warn!("request {} timed out", ticket.id);
            self.handle_feed(
                FeedEvent {
                    ticket,
                    result: Err(FeedError::Timeout),
                },
                now,
            );
        }
    }

    /// Force every cell to be redrawn on the next render
    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    /// Build the frame if anything may have changed since the last
    /// call, otherwise `None`
    pub fn render(&mut self, now: Instant) -> Option<&Frame> {
        if !self.dirty {
            return None;
        }
        self.dirty = false;
        self.frame.clear();
        let (rows, columns) = self.frame.size();
        {
            let mut area = self.frame.region(0, 0, rows - 1, columns);
            self.nav.top_mut().render(&mut self.ctx, &mut area);
        }
        self.status_line(rows - 1, columns);
        // Rendering may have asked for more posts
        self.dispatch(now);
        Some(&self.frame)
    }

    fn status_line(&mut self, y: i32, columns: i32) {
        let (text, attr) = match &self.ctx.status {
            Some(status) if status.error => (status.text.clone(), Attr::REVERSE | Attr::BOLD),
            Some(status) => (status.text.clone(), Attr::REVERSE),
            None => (format!("{}  F1 for help", self.nav.top().title()), Attr::REVERSE),
        };
        let who = match &self.ctx.session {
            Some(s) => format!("{}@{}", s.username, s.host),
            None => "not logged in".to_string(),
        };
        let mut line = self.frame.region(y, 0, 1, columns);
        line.clear(Attr::REVERSE);
        let room = (columns - who.chars().count() as i32 - 3).max(0) as usize;
        line.write(0, 1, attr, &truncate(&text, room));
        if room > 0 {
            line.write(0, columns - 1 - who.chars().count() as i32, Attr::REVERSE, &who);
        }
    }
}

// Requests without the password, for logging
fn describe_for_log(request: &FeedRequest) -> String {
    match request {
        FeedRequest::Authenticate { host, username, .. } => {
            format!("Authenticate {{ host: {:?}, username: {:?} }}", host, username)
        }
        other => format!("{:?}", other),
    }
}
