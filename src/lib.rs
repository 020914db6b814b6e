//! Federated social network client for VT100 serial terminals
//!
//! This drives a single VT100-class terminal, either the process's
//! own TTY or a serial device, as a full-screen client for a
//! Mastodon-style instance.  The terminal is assumed to be slow and
//! dumb: fixed geometry, four attributes, no colour, possibly 7-bit
//! with line drawing through the DEC special graphics set, and
//! possibly needing XON/XOFF flow control.
//!
//! Layers, from the bottom:
//!
//! ## Terminal transport
//!
//! The [`Terminal`] actor puts the line into raw mode, decodes
//! keypresses and writes paced output.  Output is buffered in a
//! shared [`TermOut`] and only sent on flush.
//!
//! ## Frames and minimised updates
//!
//! Views draw into a [`Frame`] of cells.  The [`Renderer`] keeps a
//! copy of what is on the terminal and sends only the runs of cells
//! that changed, so that a typical keypress costs a few dozen bytes
//! of line time rather than a whole screen.
//!
//! ## Client engine
//!
//! The [`Engine`] holds the navigation stack of views, the timeline
//! caches and the requests outstanding with the [`FeedService`].  It
//! has no dependency on the actor runtime, so it can be driven
//! directly by tests.
//!
//! Talking to the instance is left to the embedding application:
//! [`run`] is given a function that builds a [`FeedService`] which
//! answers requests through the [`FeedEvent`] forwarder it is given.

#![deny(rust_2018_idioms)]

mod app;
mod cache;
mod config;
mod engine;
mod error;
mod feed;
mod frame;
mod key;
mod nav;
mod pace;
mod render;
mod session;
mod terminal;
mod termout;
mod text;
mod view;

pub use app::{App, FeedMaker};
pub use cache::{Caches, Mutation, Slot, TimelineCache};
pub use config::{Config, Geometry};
pub use engine::Engine;
pub use error::{Error, Result};
pub use feed::{
    Attachment, Direction, FeedError, FeedEvent, FeedKind, FeedReply, FeedRequest, FeedService,
    FeedTarget, InteractionKind, Interactions, Page, PageToken, Post, PostId, Ticket, Visibility,
};
pub use frame::{styled, Attr, Cell, Frame, Region};
pub use key::{Decoder, Key};
pub use nav::Navigator;
pub use pace::{strip_flow_control, Pacer};
pub use render::Renderer;
pub use session::{FileSessionStore, NoSessionStore, Preferences, Session, SessionStore};
pub use terminal::Terminal;
pub use termout::{Features, TermOut};
pub use text::{clean, truncate, wrap, wrap_str};
pub use view::{
    Action, Base, ComposerView, Ctx, HelpView, KeyHelp, LoginView, Mode, Outgoing, Overlay,
    Status, ThreadView, TimelineView, View,
};

#[cfg(unix)]
mod os_mio_unix;
#[cfg(unix)]
use os_mio_unix as os_glue;

#[cfg(not(unix))]
std::compile_error!("OS interface not yet implemented on this platform");

use log::info;
use stakker::{actor, ret_shutdown, Fwd, Stakker, StopCause};
use stakker_mio::mio::{Events, Poll};
use stakker_mio::MioPoll;
use std::time::{Duration, Instant};

/// Run the client on the configured terminal until the user quits or
/// the terminal fails.  `make_feed` is called once, with the
/// forwarder that the feed service must use to deliver completions.
/// Sessions are kept as [`Config::session_store`] says.
pub fn run(
    config: Config,
    make_feed: impl FnOnce(Fwd<FeedEvent>) -> Box<dyn FeedService> + 'static,
) -> Result<()> {
    info!("starting client for {}", config.instance);
    let store = config.session_store();
    let mut stakker0 = Stakker::new(Instant::now());
    let s = &mut stakker0;
    let miopoll = MioPoll::new(s, Poll::new()?, Events::with_capacity(1024), 0)?;

    let make_feed: FeedMaker = Box::new(make_feed);
    let _app = actor!(s, App::init(config, make_feed, store), ret_shutdown!(s));

    let mut idle_pending = s.run(Instant::now(), false);
    while s.not_shutdown() {
        let maxdur = s.next_wait_max(Instant::now(), Duration::from_secs(60), idle_pending);
        let activity = miopoll.poll(maxdur)?;
        idle_pending = s.run(Instant::now(), !activity);
    }

    match s.shutdown_reason() {
        Some(StopCause::Failed(e)) => Err(Error::Terminal(e.to_string())),
        _ => Ok(()),
    }
}
