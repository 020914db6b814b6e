use chrono::{TimeZone, Utc};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};
use vt100_masto::{
    Config, Direction, Engine, FeedError, FeedKind, FeedReply, FeedRequest, FeedService,
    FeedTarget, FeedEvent, Interactions, Key, Mode, Page, PageToken, Post, PostId, Preferences,
    Session, SessionStore, Ticket, View, Visibility,
};

type Sent = Rc<RefCell<Vec<(Ticket, FeedRequest)>>>;

struct MockFeed {
    sent: Sent,
}

impl FeedService for MockFeed {
    fn submit(&mut self, ticket: Ticket, request: FeedRequest) {
        self.sent.borrow_mut().push((ticket, request));
    }
}

#[derive(Clone, Default)]
struct MemStore {
    sessions: Rc<RefCell<HashMap<String, Session>>>,
}

impl SessionStore for MemStore {
    fn load_session(&self, host: &str) -> vt100_masto::Result<Option<Session>> {
        Ok(self.sessions.borrow().get(host).cloned())
    }

    fn save_session(&self, session: &Session) -> vt100_masto::Result<()> {
        self.sessions
            .borrow_mut()
            .insert(session.host.clone(), session.clone());
        Ok(())
    }

    fn forget_session(&self, host: &str) -> vt100_masto::Result<()> {
        self.sessions.borrow_mut().remove(host);
        Ok(())
    }
}

const HOST: &str = "example.social";

fn session() -> Session {
    Session {
        host: HOST.into(),
        username: "alice".into(),
        display_name: "Alice".into(),
        credential: "token".into(),
        prefs: Preferences::default(),
    }
}

fn post(id: u32) -> Post {
    Post {
        id: PostId::new(id.to_string()),
        author: format!("user{}@{}", id, HOST),
        display_name: format!("User {}", id),
        body: format!("post number {}", id),
        spoiler: None,
        attachments: Vec::new(),
        visibility: Visibility::Public,
        created_at: Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap(),
        edited_at: None,
        own: false,
        interactions: Interactions::default(),
        in_reply_to: None,
        boosted_by: None,
    }
}

fn page(ids: impl IntoIterator<Item = u32>, older: Option<&str>) -> Page {
    Page {
        posts: ids.into_iter().map(post).collect(),
        older: older.map(PageToken::new),
        newer: Some(PageToken::new("newest")),
    }
}

fn home() -> FeedTarget {
    FeedTarget::Timeline(FeedKind::Home)
}

struct Harness {
    engine: Engine,
    sent: Sent,
    store: MemStore,
    now: Instant,
}

impl Harness {
    fn new(signed_in: bool) -> Self {
        let store = MemStore::default();
        if signed_in {
            store.save_session(&session()).unwrap();
        }
        let sent = Sent::default();
        let mut config = Config::default();
        config.instance = HOST.into();
        let feed = MockFeed { sent: sent.clone() };
        let mut engine = Engine::new(&config, Box::new(feed), Box::new(store.clone()));
        let now = Instant::now();
        engine.start(now);
        engine.render(now);
        Self {
            engine,
            sent,
            store,
            now,
        }
    }

    /// Signed in, with the first home page delivered and drawn
    fn with_home(page: Page) -> Self {
        let mut h = Self::new(true);
        let (ticket, _) = h.take_fetch(&home(), Direction::Initial);
        h.reply(ticket, Ok(FeedReply::Page(page)));
        h.render();
        h
    }

    fn take(&self) -> Vec<(Ticket, FeedRequest)> {
        std::mem::take(&mut *self.sent.borrow_mut())
    }

    fn take_fetch(&self, want: &FeedTarget, want_dir: Direction) -> (Ticket, FeedRequest) {
        let sent = self.take();
        let found = sent.into_iter().find(|(_, req)| {
            matches!(req, FeedRequest::FetchPage { target, direction, .. }
                     if target == want && *direction == want_dir)
        });
        found.expect("fetch not sent")
    }

    fn reply(&mut self, ticket: Ticket, result: Result<FeedReply, FeedError>) {
        self.engine.handle_feed(FeedEvent { ticket, result }, self.now);
    }

    fn key(&mut self, key: Key) {
        self.engine.handle_key(key, self.now);
    }

    fn typed(&mut self, text: &str) {
        for ch in text.chars() {
            self.key(Key::Char(ch));
        }
    }

    fn render(&mut self) -> bool {
        self.engine.render(self.now).is_some()
    }

    fn cached(&self, target: &FeedTarget, id: u32) -> Option<Post> {
        self.engine
            .ctx()
            .caches
            .get(target)?
            .get(&PostId::new(id.to_string()))
            .cloned()
    }
}

#[test]
fn login_saves_session_and_opens_home() {
    let mut h = Harness::new(false);
    assert!(matches!(h.engine.top(), View::Login(_)));
    h.typed("alice");
    h.key(Key::Enter);
    h.typed("secret");
    h.key(Key::Enter);
    let sent = h.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].1,
        FeedRequest::Authenticate {
            host: HOST.into(),
            username: "alice".into(),
            password: "secret".into(),
        }
    );

    h.reply(sent[0].0.clone(), Ok(FeedReply::Authenticated(session())));
    assert!(matches!(h.engine.top(), View::Timeline(_)));
    assert_eq!(h.store.load_session(HOST).unwrap(), Some(session()));
    h.take_fetch(&home(), Direction::Initial);
}

#[test]
fn bad_password_stays_on_login() {
    let mut h = Harness::new(false);
    h.typed("alice");
    h.key(Key::Enter);
    h.typed("wrong");
    h.key(Key::Enter);
    let (ticket, _) = h.take().remove(0);
    h.reply(ticket, Err(FeedError::Auth("invalid_grant".into())));
    assert!(matches!(h.engine.top(), View::Login(_)));
    assert!(h.store.load_session(HOST).unwrap().is_none());
    assert!(h.engine.ctx().status.is_none());
}

#[test]
fn compose_and_post() {
    let mut h = Harness::with_home(page(1..=3, None));
    h.key(Key::Char('c'));
    match h.engine.top() {
        View::Composer(c) => assert!(matches!(c.mode(), Mode::New)),
        _ => panic!("composer not open"),
    }
    h.typed("hello");
    h.key(Key::Tab);
    h.typed("spoiler");
    h.key(Key::Tab);
    h.key(Key::Right);
    h.key(Key::Tab);
    h.key(Key::Enter);
    assert!(matches!(h.engine.top(), View::Timeline(_)));

    let sent = h.take();
    assert_eq!(sent.len(), 1);
    assert_eq!(
        sent[0].1,
        FeedRequest::PostStatus {
            body: "hello".into(),
            spoiler: Some("spoiler".into()),
            visibility: Visibility::Unlisted,
            in_reply_to: None,
        }
    );

    let mut mine = post(10);
    mine.own = true;
    h.reply(sent[0].0.clone(), Ok(FeedReply::Posted(mine)));
    let cache = h.engine.ctx().caches.get(&home()).unwrap();
    assert_eq!(cache.posts().next().unwrap().id, PostId::new("10"));
    assert_eq!(h.engine.ctx().status.as_ref().unwrap().text, "Posted");
}

#[test]
fn stale_thread_response_does_not_redraw() {
    let mut h = Harness::with_home(page(1..=3, None));
    h.key(Key::Enter);
    match h.engine.top() {
        View::Thread(t) => assert_eq!(t.root(), &PostId::new("1")),
        _ => panic!("thread not open"),
    }
    h.render();
    let thread = FeedTarget::Thread(PostId::new("1"));
    let (ticket, _) = h.take_fetch(&thread, Direction::Initial);

    h.key(Key::Esc);
    assert!(matches!(h.engine.top(), View::Timeline(_)));
    assert!(ticket.generation < h.engine.generation());
    h.render();
    assert!(!h.render());

    h.reply(ticket, Ok(FeedReply::Page(page([1, 11, 12], None))));
    assert!(!h.render());
    // Still merged, for when the thread is opened again
    assert!(h.cached(&thread, 11).is_some());
}

#[test]
fn scrolling_to_the_end_loads_older_once() {
    let mut h = Harness::with_home(page((1..=20).rev(), Some("1")));
    h.take();
    h.key(Key::End);
    h.render();
    h.key(Key::Up);
    h.render();
    h.key(Key::Down);
    h.render();
    let older: Vec<_> = h
        .take()
        .into_iter()
        .filter(|(_, req)| {
            matches!(req, FeedRequest::FetchPage { direction: Direction::Older, .. })
        })
        .collect();
    assert_eq!(older.len(), 1);
    match &older[0].1 {
        FeedRequest::FetchPage { cursor, .. } => assert_eq!(cursor, &Some(PageToken::new("1"))),
        _ => unreachable!(),
    }

    h.reply(older[0].0.clone(), Ok(FeedReply::Page(page([0], None))));
    let cache = h.engine.ctx().caches.get(&home()).unwrap();
    assert_eq!(cache.len(), 21);
    assert!(cache.is_exhausted());
}

#[test]
fn auth_failure_signs_out() {
    let mut h = Harness::new(true);
    assert!(matches!(h.engine.top(), View::Timeline(_)));
    let (ticket, _) = h.take_fetch(&home(), Direction::Initial);
    h.reply(ticket, Err(FeedError::Auth("token revoked".into())));
    assert!(matches!(h.engine.top(), View::Login(_)));
    assert!(h.store.load_session(HOST).unwrap().is_none());
    assert!(h.engine.ctx().session.is_none());
    assert!(h.engine.ctx().caches.get(&home()).is_none());
    let status = h.engine.ctx().status.as_ref().unwrap();
    assert!(status.error);
    assert_eq!(status.text, "Session expired, please log in again");
}

#[test]
fn timeout_clears_in_flight_and_late_reply_is_dropped() {
    let mut h = Harness::new(true);
    let (ticket, _) = h.take_fetch(&home(), Direction::Initial);
    assert_eq!(h.engine.pending(), 1);

    h.engine.tick(h.now + Duration::from_secs(5));
    assert_eq!(h.engine.pending(), 1);
    h.engine.tick(h.now + Duration::from_secs(16));
    assert_eq!(h.engine.pending(), 0);
    let status = h.engine.ctx().status.as_ref().unwrap();
    assert!(status.error);
    assert!(status.text.contains("timed out"));

    // No retry until the user asks for one
    h.render();
    assert!(h.take().is_empty());

    h.reply(ticket, Ok(FeedReply::Page(page(1..=3, None))));
    assert!(!h.engine.ctx().caches.get(&home()).unwrap().is_loaded());

    h.key(Key::Down);
    h.render();
    h.take_fetch(&home(), Direction::Initial);
}

#[test]
fn failed_like_is_rolled_back() {
    let mut h = Harness::with_home(page(1..=3, None));
    h.key(Key::Char('l'));
    let liked = h.cached(&home(), 1).unwrap();
    assert!(liked.interactions.liked);
    assert_eq!(liked.interactions.likes, 1);

    let (ticket, request) = h.take().remove(0);
    assert!(matches!(request, FeedRequest::SetInteraction { on: true, .. }));
    h.reply(ticket, Err(FeedError::Network("connection reset".into())));

    let post = h.cached(&home(), 1).unwrap();
    assert!(!post.interactions.liked);
    assert_eq!(post.interactions.likes, 0);
    let status = h.engine.ctx().status.as_ref().unwrap();
    assert!(status.error);
    assert!(status.text.starts_with("Could not update post"));
}

#[test]
fn quit_key() {
    let mut h = Harness::with_home(page(1..=3, None));
    assert!(!h.engine.is_quit());
    h.key(Key::Ctrl('c'));
    assert!(h.engine.is_quit());
}

fn load_error(h: &Harness) -> bool {
    h.engine
        .ctx()
        .status
        .as_ref()
        .map_or(false, |s| s.error && s.text.starts_with("Could not load posts"))
}

fn screen_contains(h: &mut Harness, text: &str) -> bool {
    let frame = match h.engine.render(h.now) {
        Some(frame) => frame,
        None => return false,
    };
    let (rows, _) = frame.size();
    (0..rows).any(|y| frame.row(y).iter().map(|c| c.ch).collect::<String>().contains(text))
}

#[test]
fn failure_reported_after_composer_is_cancelled() {
    let mut h = Harness::new(true);
    let (ticket, _) = h.take_fetch(&home(), Direction::Initial);
    h.key(Key::Char('c'));
    assert!(matches!(h.engine.top(), View::Composer(_)));
    h.key(Key::Esc);
    assert!(matches!(h.engine.top(), View::Timeline(_)));
    assert!(ticket.generation < h.engine.generation());
    // Still in flight, so coming back didn't ask again
    assert!(h.take().is_empty());

    h.reply(ticket, Err(FeedError::Network("connection reset".into())));
    assert!(load_error(&h));
    assert!(screen_contains(&mut h, "Could not load posts"));

    h.key(Key::Char('r'));
    assert!(screen_contains(&mut h, "Loading..."));
    h.take_fetch(&home(), Direction::Initial);
}

#[test]
fn failure_reported_after_switching_feed_and_back() {
    let mut h = Harness::new(true);
    let (ticket, _) = h.take_fetch(&home(), Direction::Initial);
    h.key(Key::Char('2'));
    match h.engine.top() {
        View::Timeline(t) => assert_eq!(t.kind(), FeedKind::Local),
        _ => panic!("not on a timeline"),
    }
    h.take_fetch(&FeedTarget::Timeline(FeedKind::Local), Direction::Initial);
    h.key(Key::Char('1'));
    match h.engine.top() {
        View::Timeline(t) => assert_eq!(t.kind(), FeedKind::Home),
        _ => panic!("not on a timeline"),
    }
    assert!(h.take().is_empty());

    h.reply(ticket, Err(FeedError::Network("connection reset".into())));
    assert!(load_error(&h));
    assert!(screen_contains(&mut h, "Nothing loaded, press r to retry"));

    // The view keeps loading as it scrolls
    h.key(Key::Down);
    h.render();
    h.take_fetch(&home(), Direction::Initial);
}

#[test]
fn failure_for_a_feed_not_on_screen_is_quiet() {
    let mut h = Harness::new(true);
    let (ticket, _) = h.take_fetch(&home(), Direction::Initial);
    h.key(Key::Char('2'));
    h.render();
    h.take();

    h.reply(ticket, Err(FeedError::Network("connection reset".into())));
    assert!(h.engine.ctx().status.is_none());
    assert!(!h.render());
    assert!(!h.engine.ctx().caches.get(&home()).unwrap().is_loaded());
}

#[test]
fn help_lists_keys_and_closes_on_any_key() {
    let mut h = Harness::with_home(page(1..=3, None));
    let depth = h.engine.depth();
    h.key(Key::Char('?'));
    assert!(matches!(h.engine.top(), View::Help(_)));
    let frame = h.engine.render(h.now).unwrap();
    let (rows, _) = frame.size();
    let text: String = (0..rows)
        .flat_map(|y| frame.row(y).iter().map(|c| c.ch).chain(std::iter::once('\n')))
        .collect();
    assert!(text.contains("Keys for Home timeline"));
    for wanted in ["edit your post", "delete your post", "default post visibility", "expand content warnings"] {
        assert!(text.contains(wanted), "missing {}", wanted);
    }

    h.key(Key::Char('l'));
    assert!(matches!(h.engine.top(), View::Timeline(_)));
    assert_eq!(h.engine.depth(), depth);
    // The key only closed help
    assert!(!h.cached(&home(), 1).unwrap().interactions.liked);
    assert!(h.take().is_empty());
}

#[test]
fn composer_help_through_function_key() {
    let mut h = Harness::with_home(page(1..=3, None));
    h.key(Key::Char('c'));
    h.key(Key::F(1));
    assert!(matches!(h.engine.top(), View::Help(_)));
    assert!(screen_contains(&mut h, "Keys for New post"));
    h.key(Key::Esc);
    assert!(matches!(h.engine.top(), View::Composer(_)));
}
