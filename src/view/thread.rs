use super::post::PostList;
use super::{Action, Ctx};
use crate::feed::{FeedEvent, FeedTarget, PostId};
use crate::frame::Region;
use crate::key::Key;

/// A post with its ancestors and replies.  The root post stays
/// marked and is selected when the thread first opens.
pub struct ThreadView {
    root: PostId,
    list: PostList,
}

impl ThreadView {
    pub fn new(root: PostId) -> Self {
        Self {
            list: PostList::new(FeedTarget::Thread(root.clone()), Some(root.clone())),
            root,
        }
    }

    pub fn root(&self) -> &PostId {
        &self.root
    }

    pub fn target(&self) -> &FeedTarget {
        self.list.target()
    }

    pub fn on_enter(&mut self, ctx: &mut Ctx) {
        self.list.on_enter(ctx);
    }

    pub fn render(&mut self, ctx: &mut Ctx, r: &mut Region<'_>) {
        self.list.render(ctx, r);
    }

    pub fn handle_key(&mut self, ctx: &mut Ctx, key: Key) -> Action {
        match key {
            Key::Esc | Key::Backspace | Key::Char('q') => Action::Close,
            _ => self.list.handle_key(ctx, key),
        }
    }

    pub fn handle_feed(&mut self, ctx: &mut Ctx, event: &FeedEvent, shown: bool) -> Action {
        self.list.handle_feed(ctx, event, shown)
    }
}
