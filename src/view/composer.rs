use super::widget::{button, move_focus, LineInput, Select, TextArea};
use super::{Action, Ctx};
use crate::cache::Mutation;
use crate::feed::{FeedRequest, Post, Visibility};
use crate::frame::{Attr, Region};
use crate::key::Key;
use log::debug;

/// Maximum length of body plus content warning, in characters
pub const CHAR_LIMIT: usize = 500;

const BODY: usize = 0;
const WARNING: usize = 1;
const VISIBILITY: usize = 2;
const POST: usize = 3;
const DISCARD: usize = 4;

pub enum Mode {
    New,
    Reply(Post),
    Edit(Post),
}

/// Editor for a new post, a reply or an edit
pub struct ComposerView {
    mode: Mode,
    body: TextArea,
    warning: LineInput,
    visibility: Select,
    focus: usize,
}

impl ComposerView {
    fn with(mode: Mode, body: &str, warning: &str, visibility: Visibility) -> Self {
        let index = Visibility::ALL
            .iter()
            .position(|v| *v == visibility)
            .unwrap_or(0);
        Self {
            mode,
            body: TextArea::new(body),
            warning: LineInput::new(warning),
            visibility: Select::new(Visibility::ALL.iter().map(|v| v.label()).collect(), index),
            focus: BODY,
        }
    }

    pub fn new_post(ctx: &Ctx) -> Self {
        Self::with(Mode::New, "", "", ctx.prefs().default_visibility)
    }

    /// Reply to `parent`, mentioning its author.  The reply is never
    /// more public than the post it answers.
    pub fn reply(ctx: &Ctx, parent: Post) -> Self {
        let visibility = parent.visibility.max(ctx.prefs().default_visibility);
        let mention = format!("@{} ", parent.author);
        Self::with(Mode::Reply(parent), &mention, "", visibility)
    }

    /// Edit one of the user's own posts.  Visibility can't be changed
    /// by an edit.
    pub fn edit(post: Post) -> Self {
        let warning = post.spoiler.clone().unwrap_or_default();
        let body = post.body.clone();
        let visibility = post.visibility;
        Self::with(Mode::Edit(post), &body, &warning, visibility)
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn title(&self) -> String {
        match &self.mode {
            Mode::New => "New post".to_string(),
            Mode::Reply(parent) => format!("Reply to @{}", parent.author),
            Mode::Edit(_) => "Edit post".to_string(),
        }
    }

    fn focusable(&self, field: usize) -> bool {
        !(field == VISIBILITY && matches!(self.mode, Mode::Edit(_)))
    }

    fn used(&self) -> usize {
        self.body.len() + self.warning.len()
    }

    fn submit(&mut self, ctx: &mut Ctx) -> Action {
        let body = self.body.text();
        if body.trim().is_empty() {
            ctx.error("Cannot post an empty message");
            return Action::Handled;
        }
        let warning = self.warning.text();
        let spoiler = if warning.trim().is_empty() {
            None
        } else {
            Some(warning)
        };
        match &self.mode {
            Mode::Edit(post) => {
                debug!("editing {}", post.id);
                let change = Mutation::Edit {
                    body: body.clone(),
                    spoiler: spoiler.clone(),
                };
                let request = FeedRequest::EditStatus {
                    id: post.id.clone(),
                    body,
                    spoiler,
                };
                ctx.mutate(&post.id, change, request);
                ctx.info("Saving edit...");
            }
            Mode::New | Mode::Reply(_) => {
                let in_reply_to = match &self.mode {
                    Mode::Reply(parent) => Some(parent.id.clone()),
                    _ => None,
                };
                ctx.send(FeedRequest::PostStatus {
                    body,
                    spoiler,
                    visibility: Visibility::ALL[self.visibility.index()],
                    in_reply_to,
                });
                ctx.info("Posting...");
            }
        }
        Action::Close
    }

    pub fn handle_key(&mut self, ctx: &mut Ctx, key: Key) -> Action {
        if key == Key::Esc {
            ctx.info("Post discarded");
            return Action::Close;
        }
        let grows = match key {
            Key::Char(_) => self.focus == BODY || self.focus == WARNING,
            Key::Enter => self.focus == BODY,
            _ => false,
        };
        if grows && self.used() >= CHAR_LIMIT {
            ctx.bell = true;
            return Action::Handled;
        }
        let consumed = match self.focus {
            BODY => self.body.handle_key(key),
            WARNING => key != Key::Enter && self.warning.handle_key(key),
            VISIBILITY => self.visibility.handle_key(key),
            _ => false,
        };
        if consumed {
            return Action::Handled;
        }
        let step = match key {
            Key::Enter if self.focus == WARNING || self.focus == VISIBILITY => Some(Key::Tab),
            Key::Tab | Key::BackTab | Key::Up | Key::Down => Some(key),
            _ => None,
        };
        if let Some(step) = step {
            let mut focus = self.focus;
            loop {
                focus = move_focus(step, focus, DISCARD + 1).unwrap_or(focus);
                if self.focusable(focus) {
                    break;
                }
            }
            self.focus = focus;
            return Action::Handled;
        }
        match (self.focus, key) {
            (POST, Key::Right) => {
                self.focus = DISCARD;
                Action::Handled
            }
            (DISCARD, Key::Left) => {
                self.focus = POST;
                Action::Handled
            }
            (POST, Key::Enter) | (POST, Key::Char(' ')) => self.submit(ctx),
            (DISCARD, Key::Enter) | (DISCARD, Key::Char(' ')) => {
                ctx.info("Post discarded");
                Action::Close
            }
            _ => Action::Ignored,
        }
    }

    pub fn render(&mut self, _ctx: &mut Ctx, r: &mut Region<'_>) {
        let (sy, sx) = r.size();
        r.write(0, 0, Attr::BOLD, &self.title());

        let label_w = 17;
        r.write(1, 0, Attr::empty(), "Content warning:");
        self.warning
            .render(&mut r.region(1, label_w, 1, sx - label_w), self.focus == WARNING);

        r.write(2, 0, Attr::empty(), "Visibility:");
        if matches!(self.mode, Mode::Edit(_)) {
            let label = Visibility::ALL[self.visibility.index()].label();
            r.write(2, label_w, Attr::empty(), label);
        } else {
            self.visibility
                .render(&mut r.region(2, label_w, 1, sx - label_w), self.focus == VISIBILITY);
        }

        // Body inside a box filling the rest of the screen
        let top = 3;
        let bottom = (sy - 2).max(top + 2);
        let horizontal: String = "─".repeat((sx - 2).max(0) as usize);
        r.write(top, 0, Attr::empty(), &format!("┌{}┐", horizontal));
        for y in top + 1..bottom {
            r.write(y, 0, Attr::empty(), "│");
            r.write(y, sx - 1, Attr::empty(), "│");
        }
        r.write(bottom, 0, Attr::empty(), &format!("└{}┘", horizontal));
        self.body
            .render(&mut r.region(top + 1, 2, bottom - top - 1, sx - 4), self.focus == BODY);

        let count = format!("{}/{}", self.used(), CHAR_LIMIT);
        let attr = if self.used() >= CHAR_LIMIT {
            Attr::BOLD
        } else {
            Attr::empty()
        };
        let mut row = r.region(bottom + 1, 0, 1, sx);
        row.write(0, 1, attr, &count);
        let label = if matches!(self.mode, Mode::Edit(_)) {
            "Save"
        } else {
            "Post"
        };
        let x = sx - 24;
        let x = button(&mut row, x, label, self.focus == POST) + 2;
        button(&mut row, x, "Discard", self.focus == DISCARD);
    }
}
