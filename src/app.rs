//! Top-level actor
//!
//! Owns the [`Terminal`] and the [`Engine`], turns terminal keys and
//! feed completions into engine calls, and after each one pushes the
//! new frame, if there is one, out through the renderer.

use crate::config::Config;
use crate::engine::Engine;
use crate::feed::{FeedEvent, FeedService};
use crate::key::Key;
use crate::render::Renderer;
use crate::session::SessionStore;
use crate::terminal::Terminal;
use crate::termout::TermOut;
use log::{error, info};
use stakker::{actor, after, call, fwd_to, ret_some_to, ActorOwn, Fwd, Share, StopCause, CX};
use std::time::Duration;

const TICK: Duration = Duration::from_millis(250);

/// Builds the feed service once the app can give it somewhere to
/// send its completions
pub type FeedMaker = Box<dyn FnOnce(Fwd<FeedEvent>) -> Box<dyn FeedService>>;

pub struct App {
    engine: Engine,
    renderer: Renderer,
    terminal: ActorOwn<Terminal>,
    termout: Option<Share<TermOut>>,
}

impl App {
    pub fn init(
        cx: CX![],
        config: Config,
        make_feed: FeedMaker,
        store: Box<dyn SessionStore>,
    ) -> Option<Self> {
        let feed = make_feed(fwd_to!([cx], feed() as (FeedEvent)));
        let terminal = actor!(
            cx,
            Terminal::init(
                config.clone(),
                fwd_to!([cx], output() as (Option<Share<TermOut>>)),
                fwd_to!([cx], key() as (Key))
            ),
            ret_some_to!([cx], terminal_died() as (StopCause))
        );
        let mut engine = Engine::new(&config, feed, store);
        engine.start(cx.now());
        after!(TICK, [cx], tick());
        Some(Self {
            engine,
            renderer: Renderer::new(),
            terminal,
            termout: None,
        })
    }

    // The terminal is ready (or has gone away).  Anything that was
    // on the screen before is unknown, so paint it all.
    fn output(&mut self, cx: CX![], termout: Option<Share<TermOut>>) {
        self.termout = termout;
        if let Some(ref termout) = self.termout {
            let to = termout.rw(cx);
            to.discard();
            to.attr_reset();
            to.graphics(false);
            to.show_cursor();
            to.scroll_up();
            to.save_cleanup();
            self.renderer.invalidate();
            self.engine.invalidate();
            self.redraw(cx);
        }
    }

    fn key(&mut self, cx: CX![], key: Key) {
        self.engine.handle_key(key, cx.now());
        self.redraw(cx);
    }

    fn feed(&mut self, cx: CX![], event: FeedEvent) {
        self.engine.handle_feed(event, cx.now());
        self.redraw(cx);
    }

    fn tick(&mut self, cx: CX![]) {
        let now = cx.now();
        if self.engine.next_deadline().map_or(false, |d| d <= now) {
            self.engine.tick(now);
        }
        self.redraw(cx);
        after!(TICK, [cx], tick());
    }

    fn terminal_died(&mut self, cx: CX![], cause: StopCause) {
        error!("terminal stopped: {}", cause);
        self.termout = None;
        cx.fail_string(format!("{}", cause));
    }

    fn redraw(&mut self, cx: CX![]) {
        if self.engine.is_quit() {
            info!("quitting");
            cx.stop();
            return;
        }
        let now = cx.now();
        let flush = match self.termout {
            None => false,
            Some(ref termout) => {
                let to = termout.rw(cx);
                let changed = match self.engine.render(now) {
                    Some(frame) => self.renderer.render(frame, to),
                    None => false,
                };
                if changed {
                    to.flush();
                }
                changed
            }
        };
        if flush {
            call!([self.terminal], flush());
        }
        if self.engine.take_bell() {
            call!([self.terminal], bell());
        }
    }
}
