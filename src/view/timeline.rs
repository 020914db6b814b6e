use super::post::PostList;
use super::{Action, Base, Ctx};
use crate::feed::{FeedEvent, FeedKind, FeedTarget, Visibility};
use crate::frame::Region;
use crate::key::Key;
use log::info;

/// One of the main feeds
pub struct TimelineView {
    kind: FeedKind,
    list: PostList,
}

impl TimelineView {
    pub fn new(kind: FeedKind) -> Self {
        Self {
            kind,
            list: PostList::new(FeedTarget::Timeline(kind), None),
        }
    }

    pub fn kind(&self) -> FeedKind {
        self.kind
    }

    pub fn target(&self) -> &FeedTarget {
        self.list.target()
    }

    pub fn title(&self) -> String {
        format!("{} timeline", self.kind.label())
    }

    pub fn on_enter(&mut self, ctx: &mut Ctx) {
        self.list.on_enter(ctx);
    }

    pub fn render(&mut self, ctx: &mut Ctx, r: &mut Region<'_>) {
        self.list.render(ctx, r);
    }

    pub fn handle_key(&mut self, ctx: &mut Ctx, key: Key) -> Action {
        match self.list.handle_key(ctx, key) {
            Action::Ignored => (),
            action => return action,
        }
        match key {
            Key::Char(ch @ '1'..='4') => {
                let kind = FeedKind::ALL[ch as usize - '1' as usize];
                if kind != self.kind {
                    info!("switching to {} timeline", kind.label());
                    return Action::Replace(Base::Timeline(TimelineView::new(kind)));
                }
            }
            Key::Char('v') => {
                if let Some(prefs) = ctx.prefs_mut() {
                    let all = Visibility::ALL;
                    let next = all
                        .iter()
                        .position(|v| *v == prefs.default_visibility)
                        .map_or(0, |i| (i + 1) % all.len());
                    prefs.default_visibility = all[next];
                    let label = all[next].label();
                    ctx.info(format!("Posts default to {} visibility", label));
                }
            }
            Key::Char('X') => {
                if let Some(prefs) = ctx.prefs_mut() {
                    prefs.expand_spoilers = !prefs.expand_spoilers;
                    let text = if prefs.expand_spoilers {
                        "Content warnings now start expanded"
                    } else {
                        "Content warnings now start collapsed"
                    };
                    ctx.info(text);
                }
            }
            Key::Char('q') => return Action::SignOut,
            _ => return Action::Ignored,
        }
        Action::Handled
    }

    pub fn handle_feed(&mut self, ctx: &mut Ctx, event: &FeedEvent, shown: bool) -> Action {
        self.list.handle_feed(ctx, event, shown)
    }
}
