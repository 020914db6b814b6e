use super::widget::{button, move_focus, LineInput};
use super::{Action, Ctx};
use crate::feed::{FeedError, FeedEvent, FeedReply, FeedRequest};
use crate::frame::{Attr, Region};
use crate::key::Key;
use log::info;

const USERNAME: usize = 0;
const PASSWORD: usize = 1;
const LOGIN: usize = 2;
const QUIT: usize = 3;
const FIELDS: usize = 4;

/// Username and password entry for the configured instance
pub struct LoginView {
    username: LineInput,
    password: LineInput,
    focus: usize,
    busy: bool,
    message: Option<(String, bool)>,
}

impl LoginView {
    pub fn new(username: &str) -> Self {
        Self {
            focus: if username.is_empty() { USERNAME } else { PASSWORD },
            username: LineInput::new(username),
            password: LineInput::obscured(),
            busy: false,
            message: None,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn on_enter(&mut self, ctx: &mut Ctx) {
        if self.username.is_empty() && !ctx.username.is_empty() {
            self.username = LineInput::new(&ctx.username);
            self.focus = PASSWORD;
        }
    }

    pub fn on_exit(&mut self, _ctx: &mut Ctx) {
        self.password.clear();
    }

    fn submit(&mut self, ctx: &mut Ctx) {
        let username = self.username.text();
        let password = self.password.text();
        if username.trim().is_empty() || password.is_empty() {
            self.message = Some(("Enter a username and password".to_string(), true));
            return;
        }
        info!("logging in to {} as {}", ctx.host, username);
        ctx.send(FeedRequest::Authenticate {
            host: ctx.host.clone(),
            username: username.trim().to_string(),
            password,
        });
        self.busy = true;
        self.message = Some(("Logging in...".to_string(), false));
    }

    pub fn handle_key(&mut self, ctx: &mut Ctx, key: Key) -> Action {
        if self.busy {
            return Action::Ignored;
        }
        if let Some(focus) = move_focus(key, self.focus, FIELDS) {
            self.focus = focus;
            return Action::Handled;
        }
        match (self.focus, key) {
            (USERNAME, Key::Enter) => self.focus = PASSWORD,
            (PASSWORD, Key::Enter) | (LOGIN, Key::Enter) | (LOGIN, Key::Char(' ')) => self.submit(ctx),
            (QUIT, Key::Enter) | (QUIT, Key::Char(' ')) => return Action::Quit,
            (LOGIN, Key::Right) => self.focus = QUIT,
            (QUIT, Key::Left) => self.focus = LOGIN,
            (USERNAME, key) => {
                if !self.username.handle_key(key) {
                    return Action::Ignored;
                }
            }
            (PASSWORD, key) => {
                if !self.password.handle_key(key) {
                    return Action::Ignored;
                }
            }
            _ => return Action::Ignored,
        }
        Action::Handled
    }

    pub fn handle_feed(&mut self, _ctx: &mut Ctx, event: &FeedEvent, _shown: bool) -> Action {
        if !self.busy {
            return Action::Handled;
        }
        self.busy = false;
        match &event.result {
            Ok(FeedReply::Authenticated(session)) => {
                self.message = None;
                self.password.clear();
                return Action::SignedIn(session.clone());
            }
            Ok(_) => (),
            Err(FeedError::Auth(_)) => {
                self.message = Some(("Invalid username or password!".to_string(), true));
                self.password.clear();
                self.focus = PASSWORD;
            }
            Err(e) => self.message = Some((e.to_string(), true)),
        }
        Action::Handled
    }

    pub fn render(&mut self, ctx: &mut Ctx, r: &mut Region<'_>) {
        let (sy, sx) = r.size();
        let width = 50.min(sx);
        let x = (sx - width) / 2;
        let y = ((sy - 8) / 2).max(0);
        let mut r = r.region(y, x, 8, width);

        let host = if ctx.host.is_empty() {
            "(no instance configured)"
        } else {
            ctx.host.as_str()
        };
        r.write(0, 0, Attr::BOLD, &format!("Log in to {}", host));
        let field_x = 11;
        let field_w = width - field_x;
        r.write(2, 0, Attr::empty(), "Username:");
        self.username
            .render(&mut r.region(2, field_x, 1, field_w), self.focus == USERNAME && !self.busy);
        r.write(3, 0, Attr::empty(), "Password:");
        self.password
            .render(&mut r.region(3, field_x, 1, field_w), self.focus == PASSWORD && !self.busy);

        let mut buttons = r.region(5, field_x, 1, field_w);
        let next = button(&mut buttons, 0, "login", self.focus == LOGIN && !self.busy) + 2;
        button(&mut buttons, next, "quit", self.focus == QUIT && !self.busy);

        if let Some((text, error)) = &self.message {
            let attr = if *error { Attr::BOLD } else { Attr::empty() };
            r.write(7, 0, attr, text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::feed::Ticket;

    fn ctx() -> Ctx {
        let mut config = Config::default();
        config.instance = "example.social".into();
        Ctx::new(&config)
    }

    fn typed(view: &mut LoginView, ctx: &mut Ctx, text: &str) {
        for ch in text.chars() {
            view.handle_key(ctx, Key::Char(ch));
        }
    }

    fn event(result: Result<FeedReply, FeedError>) -> FeedEvent {
        FeedEvent {
            ticket: Ticket {
                id: 1,
                generation: 0,
                target: None,
            },
            result,
        }
    }

    #[test]
    fn enter_submits_credentials() {
        let mut ctx = ctx();
        let mut view = LoginView::new("");
        typed(&mut view, &mut ctx, "alice");
        view.handle_key(&mut ctx, Key::Enter);
        typed(&mut view, &mut ctx, "pw");
        view.handle_key(&mut ctx, Key::Enter);
        assert!(view.is_busy());
        assert_eq!(
            ctx.outbox[0].request,
            FeedRequest::Authenticate {
                host: "example.social".into(),
                username: "alice".into(),
                password: "pw".into(),
            }
        );
    }

    #[test]
    fn missing_password_is_rejected() {
        let mut ctx = ctx();
        let mut view = LoginView::new("alice");
        view.handle_key(&mut ctx, Key::Enter);
        assert!(!view.is_busy());
        assert!(ctx.outbox.is_empty());
    }

    #[test]
    fn bad_credentials_clear_password() {
        let mut ctx = ctx();
        let mut view = LoginView::new("alice");
        typed(&mut view, &mut ctx, "wrong");
        view.handle_key(&mut ctx, Key::Enter);
        let action = view.handle_feed(&mut ctx, &event(Err(FeedError::Auth("401".into()))), true);
        assert!(matches!(action, Action::Handled));
        assert!(!view.is_busy());
        assert_eq!(view.password.text(), "");
        assert_eq!(
            view.message.as_ref().map(|m| m.0.as_str()),
            Some("Invalid username or password!")
        );
    }

    #[test]
    fn quit_button() {
        let mut ctx = ctx();
        let mut view = LoginView::new("");
        view.handle_key(&mut ctx, Key::BackTab);
        assert!(matches!(view.handle_key(&mut ctx, Key::Enter), Action::Quit));
    }
}
