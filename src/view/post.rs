//! Scrollable list of boxed posts, shared by timelines and threads

use super::{Action, ComposerView, Ctx, Overlay, ThreadView};
use crate::cache::{Mutation, Slot, TimelineCache};
use crate::feed::{FeedEvent, FeedReply, FeedRequest, FeedTarget, InteractionKind, Post, PostId, Visibility};
use crate::frame::{styled, Attr, Cell, Region};
use crate::key::Key;
use crate::text::{clean, truncate, wrap_str};
use log::debug;
use std::collections::HashMap;

// Position of one cache slot in the laid-out list
struct Entry {
    id: PostId,
    start: i32,
    height: i32,
}

struct Layout {
    entries: Vec<Entry>,
    lines: Vec<Vec<Cell>>,
}

impl Layout {
    fn total(&self) -> i32 {
        self.lines.len() as i32
    }

    fn find(&self, id: &PostId) -> Option<&Entry> {
        self.entries.iter().find(|e| &e.id == id)
    }

    // Live post whose box covers the given line
    fn at_line(&self, line: i32) -> Option<&Entry> {
        self.entries
            .iter()
            .filter(|e| e.height > 0)
            .find(|e| line < e.start + e.height)
    }
}

pub struct PostList {
    target: FeedTarget,
    root: Option<PostId>,
    // Post at the top of the viewport, and how many of its lines are
    // scrolled off.  Anchoring to a post keeps the view steady when
    // newer posts are put in front.
    anchor: Option<PostId>,
    offset: i32,
    selected: Option<PostId>,
    // Per-post content warning choice, overriding the preference
    expanded: HashMap<PostId, bool>,
    armed_delete: Option<PostId>,
    // Cleared after a failed fetch, so that a broken connection
    // doesn't cause a request on every redraw
    auto_load: bool,
    want_top: bool,
    width: i32,
    height: i32,
}

impl PostList {
    pub fn new(target: FeedTarget, root: Option<PostId>) -> Self {
        Self {
            target,
            selected: root.clone(),
            anchor: None,
            root,
            offset: 0,
            expanded: HashMap::new(),
            armed_delete: None,
            auto_load: true,
            want_top: false,
            width: 80,
            height: 23,
        }
    }

    pub fn target(&self) -> &FeedTarget {
        &self.target
    }

    pub fn on_enter(&mut self, ctx: &mut Ctx) {
        self.auto_load = true;
        ctx.fetch(&self.target, TimelineCache::ensure_initial_load);
    }

    fn layout(&self, ctx: &Ctx, width: i32) -> Layout {
        let mut layout = Layout {
            entries: Vec::new(),
            lines: Vec::new(),
        };
        let cache = match ctx.caches.get(&self.target) {
            Some(cache) => cache,
            None => return layout,
        };
        let expand_default = ctx.prefs().expand_spoilers;
        let mut number = 0;
        for i in 0..cache.len() {
            let start = layout.total();
            match cache.slot(i) {
                Some(Slot::Live(post)) => {
                    number += 1;
                    let expanded = self.expanded.get(&post.id).copied().unwrap_or(expand_default);
                    let boxed = PostBox {
                        post,
                        number,
                        width,
                        expanded,
                        selected: self.selected.as_ref() == Some(&post.id),
                        root: self.root.as_ref() == Some(&post.id),
                    };
                    layout.lines.extend(boxed.lines());
                    layout.entries.push(Entry {
                        id: post.id.clone(),
                        start,
                        height: layout.total() - start,
                    });
                }
                Some(Slot::Removed(id)) => layout.entries.push(Entry {
                    id: id.clone(),
                    start,
                    height: 0,
                }),
                None => (),
            }
        }
        if cache.is_loading_older() {
            layout.lines.push(styled("Loading...", Attr::BLINK));
        } else if cache.is_exhausted() && cache.is_loaded() {
            let end = if cache.is_empty() {
                "Nothing to show"
            } else {
                "End of timeline"
            };
            layout.lines.push(styled(end, Attr::empty()));
        }
        layout
    }

    // First line shown, clamped so that the list doesn't scroll past
    // its end
    fn top_line(&self, layout: &Layout) -> i32 {
        let top = match self.anchor.as_ref().and_then(|id| layout.find(id)) {
            Some(entry) => entry.start + self.offset.min(entry.height),
            None => 0,
        };
        top.min(layout.total() - self.height).max(0)
    }

    fn scroll_to(&mut self, layout: &Layout, line: i32) {
        let line = line.min(layout.total() - self.height).max(0);
        match layout.at_line(line) {
            Some(entry) => {
                self.anchor = Some(entry.id.clone());
                self.offset = line - entry.start;
                // The current post is the first one starting in view
                let first = layout
                    .entries
                    .iter()
                    .find(|e| e.height > 0 && e.start >= line && e.start < line + self.height);
                self.selected = Some(first.unwrap_or(entry).id.clone());
            }
            None => {
                self.anchor = None;
                self.offset = 0;
            }
        }
    }

    fn jump(&mut self, id: PostId) {
        self.anchor = Some(id.clone());
        self.offset = 0;
        self.selected = Some(id);
    }

    // Move selection by `delta` live posts
    fn step(&mut self, layout: &Layout, delta: i32) {
        let live: Vec<&Entry> = layout.entries.iter().filter(|e| e.height > 0).collect();
        if live.is_empty() {
            return;
        }
        let index = self
            .selected
            .as_ref()
            .and_then(|id| live.iter().position(|e| &e.id == id));
        let next = match index {
            Some(i) => (i as i32 + delta).clamp(0, live.len() as i32 - 1) as usize,
            None => 0,
        };
        self.jump(live[next].id.clone());
    }

    pub fn render(&mut self, ctx: &mut Ctx, r: &mut Region<'_>) {
        let (sy, sx) = r.size();
        self.width = sx;
        self.height = sy.max(1);
        if self.auto_load {
            ctx.fetch(&self.target, TimelineCache::ensure_initial_load);
        }

        let mut layout = self.layout(ctx, sx);
        if layout.lines.is_empty() {
            let loading = ctx
                .caches
                .get(&self.target)
                .map_or(false, |c| c.is_loading_older());
            if loading {
                r.write(0, 1, Attr::BLINK, "Loading...");
            } else {
                r.write(0, 1, Attr::empty(), "Nothing loaded, press r to retry");
            }
            return;
        }
        if self.anchor.is_none() {
            let live = |e: &&Entry| e.height > 0;
            let start = self
                .selected
                .as_ref()
                .and_then(|id| layout.find(id))
                .filter(live)
                .or_else(|| layout.entries.iter().find(live))
                .map(|e| e.id.clone());
            if let Some(id) = start {
                self.jump(id);
                layout = self.layout(ctx, sx);
            }
        }
        let top = self.top_line(&layout);
        for (y, line) in layout.lines.iter().skip(top as usize).take(self.height as usize).enumerate() {
            r.cells(y as i32, 0, line);
        }

        // Level-triggered: checked on every redraw, with the cache's
        // in-flight flag preventing duplicate requests
        let bottom = top + self.height;
        let unseen = layout
            .entries
            .iter()
            .filter(|e| e.height > 0 && e.start >= bottom)
            .count();
        if self.auto_load && unseen <= ctx.scroll_margin {
            ctx.fetch(&self.target, TimelineCache::load_older);
        }
    }

    /// Keys common to every post list.  Returns `Ignored` for keys
    /// that are left to the owning view.
    pub fn handle_key(&mut self, ctx: &mut Ctx, key: Key) -> Action {
        let layout = self.layout(ctx, self.width);
        if key != Key::Char('D') {
            self.armed_delete = None;
        }
        let top = self.top_line(&layout);
        match key {
            Key::Up | Key::Char('k') => self.scroll_to(&layout, top - 1),
            Key::Down | Key::Char('j') => self.scroll_to(&layout, top + 1),
            Key::PageUp => self.scroll_to(&layout, top - (self.height - 1).max(1)),
            Key::PageDown | Key::Char(' ') => self.scroll_to(&layout, top + (self.height - 1).max(1)),
            Key::Char('n') => self.step(&layout, 1),
            Key::Char('p') => self.step(&layout, -1),
            Key::Home | Key::Char('t') => self.step(&layout, -(layout.entries.len() as i32)),
            Key::End => self.step(&layout, layout.entries.len() as i32),
            Key::Char('r') => {
                self.want_top = true;
                ctx.fetch(&self.target, TimelineCache::load_newer);
                ctx.info("Refreshing...");
            }
            Key::Char('c') => return Action::Open(Overlay::Composer(ComposerView::new_post(ctx))),
            _ => return self.post_key(ctx, key),
        }
        self.auto_load = true;
        Action::Handled
    }

    fn current(&self, ctx: &Ctx) -> Option<Post> {
        let id = self.selected.as_ref()?;
        ctx.caches.get(&self.target)?.get(id).cloned()
    }

    // Keys acting on the selected post
    fn post_key(&mut self, ctx: &mut Ctx, key: Key) -> Action {
        let handled = matches!(
            key,
            Key::Char('l' | 'b' | 'm' | 'x' | 'a' | 'E' | 'D') | Key::Enter
        );
        if !handled {
            return Action::Ignored;
        }
        let post = match self.current(ctx) {
            Some(post) => post,
            None => {
                ctx.error("No post selected");
                return Action::Handled;
            }
        };
        let id = post.id.clone();
        let state = post.interactions;
        match key {
            Key::Char('l') => interact(ctx, &id, InteractionKind::Like, !state.liked),
            Key::Char('b') => {
                if !state.boosted && matches!(post.visibility, Visibility::Private | Visibility::Direct) {
                    ctx.error("This post can't be boosted");
                } else {
                    interact(ctx, &id, InteractionKind::Boost, !state.boosted);
                }
            }
            Key::Char('m') => interact(ctx, &id, InteractionKind::Bookmark, !state.bookmarked),
            Key::Char('x') => {
                if post.spoiler.is_none() {
                    ctx.info("No content warning on this post");
                } else {
                    let now = self.expanded.get(&id).copied().unwrap_or(ctx.prefs().expand_spoilers);
                    self.expanded.insert(id, !now);
                }
            }
            Key::Char('a') => return Action::Open(Overlay::Composer(ComposerView::reply(ctx, post))),
            Key::Char('E') if post.own => return Action::Open(Overlay::Composer(ComposerView::edit(post))),
            Key::Char('D') if post.own => {
                if self.armed_delete.as_ref() == Some(&id) {
                    self.armed_delete = None;
                    debug!("deleting {}", id);
                    ctx.mutate(&id, Mutation::Delete, FeedRequest::DeleteStatus { id: id.clone() });
                    ctx.info("Post deleted");
                } else {
                    self.armed_delete = Some(id);
                    ctx.info("Press D again to delete this post");
                }
            }
            Key::Char('E') | Key::Char('D') => ctx.error("You can only change your own posts"),
            Key::Enter => {
                if self.root.as_ref() != Some(&id) {
                    return Action::Open(Overlay::Thread(ThreadView::new(id)));
                }
            }
            _ => (),
        }
        Action::Handled
    }

    pub fn handle_feed(&mut self, ctx: &mut Ctx, event: &FeedEvent, shown: bool) -> Action {
        match &event.result {
            Err(_) => self.auto_load = false,
            Ok(FeedReply::Page(_)) if self.want_top => {
                self.want_top = false;
                if shown {
                    let first = ctx.caches.get(&self.target).and_then(|c| c.posts().next()).map(|p| p.id.clone());
                    if let Some(id) = first {
                        self.jump(id);
                    }
                }
            }
            Ok(_) => (),
        }
        Action::Handled
    }
}

fn interact(ctx: &mut Ctx, id: &PostId, kind: InteractionKind, on: bool) {
    let change = match kind {
        InteractionKind::Like => Mutation::Like(on),
        InteractionKind::Boost => Mutation::Boost(on),
        InteractionKind::Bookmark => Mutation::Bookmark(on),
    };
    let request = FeedRequest::SetInteraction {
        id: id.clone(),
        kind,
        on,
    };
    ctx.mutate(id, change, request);
}

/// One post drawn as a box, with its number in the top border and
/// its counts in the bottom border
pub struct PostBox<'a> {
    pub post: &'a Post,
    pub number: usize,
    pub width: i32,
    pub expanded: bool,
    pub selected: bool,
    pub root: bool,
}

impl PostBox<'_> {
    pub fn lines(&self) -> Vec<Vec<Cell>> {
        let post = self.post;
        let width = self.width.max(8) as usize;
        let inner = width - 4;
        let frame = if self.selected {
            Attr::BOLD
        } else {
            Attr::empty()
        };
        let mut body: Vec<Vec<Cell>> = Vec::new();

        let mut who = styled(&truncate(&clean(&post.display_name), inner), Attr::BOLD);
        who.extend(styled(&format!(" @{}", clean(&post.author)), Attr::empty()));
        if post.visibility != Visibility::Public {
            who.extend(styled(&format!(" [{}]", post.visibility.label()), Attr::empty()));
        }
        who.truncate(inner);
        body.push(who);

        if let Some(booster) = &post.boosted_by {
            body.push(styled(&truncate(&format!("boosted by @{}", clean(booster)), inner), Attr::empty()));
        }

        let mut show_body = true;
        if let Some(spoiler) = &post.spoiler {
            body.extend(wrap_str(&format!("CW: {}", spoiler), Attr::UNDERLINE, inner));
            if !self.expanded {
                body.push(styled("(x to show)", Attr::empty()));
                show_body = false;
            }
        }
        if show_body {
            body.extend(wrap_str(&post.body, Attr::empty(), inner));
            for attachment in &post.attachments {
                let name = attachment.url.rsplit('/').next().unwrap_or(&attachment.url);
                let mut cells = styled(&clean(name), Attr::UNDERLINE);
                if let Some(alt) = &attachment.description {
                    cells.push(Cell::BLANK);
                    cells.extend(styled(&clean(alt), Attr::empty()));
                }
                body.extend(crate::text::wrap(&cells, inner));
            }
        }

        let mut lines = Vec::with_capacity(body.len() + 2);
        let mut label = format!(" {} ", self.number);
        if self.root {
            label.push_str("thread ");
        }
        lines.push(border('┌', '┐', &[(label, frame | Attr::REVERSE)], width, frame));
        for content in body {
            let mut line = vec![Cell::new('│', frame), Cell::BLANK];
            let used = content.len();
            line.extend(content);
            line.extend(std::iter::repeat(Cell::BLANK).take(inner.saturating_sub(used) + 1));
            line.push(Cell::new('│', frame));
            lines.push(line);
        }
        lines.push(border('└', '┘', &self.stats(frame), width, frame));
        lines
    }

    fn stats(&self, frame: Attr) -> Vec<(String, Attr)> {
        let post = self.post;
        let i = &post.interactions;
        let on = |active: bool| if active { frame | Attr::BOLD } else { frame };
        let mut when = post.created_at.format(" %Y-%m-%d %H:%M ").to_string();
        if post.edited_at.is_some() {
            when.push_str("edited ");
        }
        let mut stats = vec![
            (when, frame),
            (format!(" {} replies ", i.replies), frame),
            (format!(" {} boosts ", i.boosts), on(i.boosted)),
            (format!(" {} likes ", i.likes), on(i.liked)),
        ];
        if i.bookmarked {
            stats.push((" saved ".to_string(), on(true)));
        }
        stats
    }
}

// Horizontal border with labels set into it after a short lead-in
fn border(left: char, right: char, labels: &[(String, Attr)], width: usize, frame: Attr) -> Vec<Cell> {
    let mut line = vec![Cell::new(left, frame), Cell::new('─', frame)];
    for (text, attr) in labels {
        if line.len() + text.chars().count() + 2 > width {
            break;
        }
        line.extend(styled(text, *attr));
        line.push(Cell::new('─', frame));
    }
    while line.len() < width - 1 {
        line.push(Cell::new('─', frame));
    }
    line.push(Cell::new(right, frame));
    line
}
