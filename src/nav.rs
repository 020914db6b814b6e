//! Navigation stack
//!
//! The bottom of the stack is held separately from the views opened
//! on top of it, so the stack can never be empty: closing with no
//! overlays open does nothing, and the base changes only by being
//! replaced.

use crate::view::{Base, Ctx, Overlay, View};
use log::debug;

pub struct Navigator {
    base: View,
    overlays: Vec<View>,
}

impl Navigator {
    /// Create the stack.  The base view isn't entered until
    /// [`Navigator::enter`] is called.
    pub fn new(base: Base) -> Self {
        Self {
            base: base.into(),
            overlays: Vec::new(),
        }
    }

    pub fn enter(&mut self, ctx: &mut Ctx) {
        self.top_mut().on_enter(ctx);
    }

    pub fn depth(&self) -> usize {
        1 + self.overlays.len()
    }

    pub fn base(&self) -> &View {
        &self.base
    }

    pub fn top(&self) -> &View {
        self.overlays.last().unwrap_or(&self.base)
    }

    pub fn top_mut(&mut self) -> &mut View {
        self.overlays.last_mut().unwrap_or(&mut self.base)
    }

    /// All views, bottom first
    pub fn views_mut(&mut self) -> impl Iterator<Item = &mut View> {
        std::iter::once(&mut self.base).chain(self.overlays.iter_mut())
    }

    pub fn push(&mut self, ctx: &mut Ctx, overlay: Overlay) {
        self.top_mut().on_exit(ctx);
        self.overlays.push(overlay.into());
        debug!("opened {}, depth {}", self.top().title(), self.depth());
        self.top_mut().on_enter(ctx);
    }

    /// Close the top view.  Returns `false` if only the base is left.
    pub fn pop(&mut self, ctx: &mut Ctx) -> bool {
        match self.overlays.pop() {
            Some(mut view) => {
                view.on_exit(ctx);
                debug!("closed {}, depth {}", view.title(), self.depth());
                self.top_mut().on_enter(ctx);
                true
            }
            None => false,
        }
    }

    /// Discard the whole stack and start again from a new base
    pub fn replace_base(&mut self, ctx: &mut Ctx, base: Base) {
        self.top_mut().on_exit(ctx);
        self.overlays.clear();
        self.base = base.into();
        debug!("base is now {}", self.base.title());
        self.base.on_enter(ctx);
    }
}
