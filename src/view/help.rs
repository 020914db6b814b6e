use super::{Action, Ctx};
use crate::frame::{Attr, Region};
use crate::key::Key;
use crate::text::truncate;

/// A key and what it does there
pub type KeyHelp = (&'static str, &'static str);

pub const LOGIN_KEYS: &[KeyHelp] = &[
    ("Tab, Up/Down", "move between fields"),
    ("Enter", "next field, or log in"),
    ("Left/Right", "move between buttons"),
    ("F1", "this help"),
    ("Ctrl-C", "quit"),
];

pub const TIMELINE_KEYS: &[KeyHelp] = &[
    ("Up/Down, j/k", "scroll a line"),
    ("PgUp/PgDn, Space", "scroll a page"),
    ("n / p", "next or previous post"),
    ("t, Home / End", "first or last post"),
    ("r", "load newer posts, or retry"),
    ("1 2 3 4", "home, local, federated, bookmarks"),
    ("Enter", "open the thread"),
    ("c", "new post"),
    ("a", "reply"),
    ("l / b / m", "like, boost, bookmark"),
    ("x", "show or hide a content warning"),
    ("E", "edit your post"),
    ("D", "delete your post, press twice"),
    ("v", "change default post visibility"),
    ("X", "expand content warnings by default"),
    ("q", "log out"),
    ("?, F1", "this help"),
    ("Ctrl-C", "quit"),
];

pub const THREAD_KEYS: &[KeyHelp] = &[
    ("Up/Down, j/k", "scroll a line"),
    ("PgUp/PgDn, Space", "scroll a page"),
    ("n / p", "next or previous post"),
    ("t, Home / End", "first or last post"),
    ("r", "reload the thread"),
    ("Enter", "open the thread of this post"),
    ("c", "new post"),
    ("a", "reply"),
    ("l / b / m", "like, boost, bookmark"),
    ("x", "show or hide a content warning"),
    ("E", "edit your post"),
    ("D", "delete your post, press twice"),
    ("Esc, q, Backspace", "back"),
    ("?, F1", "this help"),
    ("Ctrl-C", "quit"),
];

pub const COMPOSER_KEYS: &[KeyHelp] = &[
    ("Tab / Shift-Tab", "next or previous field"),
    ("Up/Down", "move a line, or between fields"),
    ("Left/Right", "visibility, or between buttons"),
    ("Enter", "new line, or press a button"),
    ("Ctrl-A / Ctrl-E", "start or end of line"),
    ("Esc", "discard"),
    ("F1", "this help"),
    ("Ctrl-C", "quit"),
];

/// Every key for the view it was opened over.  Any key closes it.
pub struct HelpView {
    title: String,
    keys: &'static [KeyHelp],
}

impl HelpView {
    pub fn new(title: String, keys: &'static [KeyHelp]) -> Self {
        Self { title, keys }
    }

    pub fn title(&self) -> String {
        format!("Keys: {}", self.title)
    }

    pub fn handle_key(&mut self, _ctx: &mut Ctx, _key: Key) -> Action {
        Action::Close
    }

    pub fn render(&mut self, _ctx: &mut Ctx, r: &mut Region<'_>) {
        let (sy, sx) = r.size();
        r.write(0, 0, Attr::BOLD, &truncate(&format!("Keys for {}", self.title), sx as usize));
        r.write(sy - 1, 0, Attr::empty(), "Press any key to return");

        // Spill into more columns on short screens
        let rows = (sy - 3).max(1) as usize;
        let columns = ((self.keys.len() + rows - 1) / rows).max(1);
        let col_w = sx / columns as i32;
        let key_w = self
            .keys
            .iter()
            .map(|(key, _)| key.chars().count() as i32 + 2)
            .max()
            .unwrap_or(0)
            .min(col_w / 2);
        for (i, (key, what)) in self.keys.iter().enumerate() {
            let y = 2 + (i % rows) as i32;
            let x = (i / rows) as i32 * col_w;
            r.write(y, x, Attr::BOLD, &truncate(key, (key_w - 1).max(0) as usize));
            let room = (col_w - key_w - 1).max(0) as usize;
            r.write(y, x + key_w, Attr::empty(), &truncate(what, room));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::frame::Frame;

    fn screen(frame: &Frame) -> String {
        let (sy, _) = frame.size();
        let mut out = String::new();
        for y in 0..sy {
            out.extend(frame.row(y).iter().map(|c| c.ch));
            out.push('\n');
        }
        out
    }

    #[test]
    fn lists_every_timeline_key() {
        let mut ctx = Ctx::new(&Config::default());
        let mut help = HelpView::new("Home timeline".into(), TIMELINE_KEYS);
        let mut frame = Frame::new(23, 80);
        help.render(&mut ctx, &mut frame.full());
        let text = screen(&frame);
        assert!(text.contains("Keys for Home timeline"));
        for (key, what) in TIMELINE_KEYS {
            assert!(text.contains(key), "missing {}", key);
            assert!(text.contains(what), "missing {}", what);
        }
        assert!(text.contains("change default post visibility"));
    }

    #[test]
    fn short_screen_uses_two_columns() {
        let mut ctx = Ctx::new(&Config::default());
        let mut help = HelpView::new("Thread".into(), THREAD_KEYS);
        let mut frame = Frame::new(11, 80);
        help.render(&mut ctx, &mut frame.full());
        let text = screen(&frame);
        let (key, _) = THREAD_KEYS[THREAD_KEYS.len() - 1];
        assert!(text.contains(key));
        // Eight rows of keys, so the ninth starts the second column
        let row: String = frame.row(2).iter().map(|c| c.ch).collect();
        assert!(row.starts_with("Up/Down, j/k"));
        assert!(row[40..].starts_with(THREAD_KEYS[8].0));
    }

    #[test]
    fn any_key_closes() {
        let mut ctx = Ctx::new(&Config::default());
        let mut help = HelpView::new("Log in".into(), LOGIN_KEYS);
        assert!(matches!(help.handle_key(&mut ctx, Key::Char('z')), Action::Close));
        assert!(matches!(help.handle_key(&mut ctx, Key::Esc), Action::Close));
    }
}
