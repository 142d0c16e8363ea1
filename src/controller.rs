use std::cell::RefCell;
use std::rc::{Rc, Weak};

use log::warn;
use tokio::task;

use crate::client::SearchClient;
use crate::models::{PageToken, User};

/// Where the current search session stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Empty query, nothing shown.
    Idle,
    /// First-page fetch in flight; the list is empty.
    Searching,
    /// A fetch settled; results are visible.
    Loaded,
    /// Next-page fetch in flight; existing results stay visible.
    Paginating,
}

struct Session {
    query: String,
    users: Vec<User>,
    next_page: Option<PageToken>,
    phase: Phase,
    /// Bumped by every new top-level search. A completion whose tag no
    /// longer matches belongs to a superseded session and is dropped.
    generation: u64,
}

impl Session {
    fn idle() -> Self {
        Self {
            query: String::new(),
            users: Vec::new(),
            next_page: None,
            phase: Phase::Idle,
            generation: 0,
        }
    }

    fn in_flight(&self) -> bool {
        matches!(self.phase, Phase::Searching | Phase::Paginating)
    }
}

struct Shared<C> {
    client: C,
    session: RefCell<Session>,
    listener: RefCell<Option<Box<dyn Fn()>>>,
}

impl<C> Shared<C> {
    fn notify(&self) {
        if let Some(listener) = self.listener.borrow().as_ref() {
            listener();
        }
    }
}

/// Drives incremental search and pagination over a [`SearchClient`].
///
/// Owns the visible result list, the pagination cursor, and the
/// staleness bookkeeping for queries that change while a fetch is on
/// the wire. All state lives on one thread: fetches are spawned onto
/// the current [`tokio::task::LocalSet`] and their completions are
/// applied back on it, so every controller must be created and used
/// inside one.
pub struct ResultsController<C> {
    shared: Rc<Shared<C>>,
}

/// Non-owning handle, for listeners that must not keep the controller
/// alive.
pub struct WeakController<C> {
    shared: Weak<Shared<C>>,
}

impl<C> Clone for ResultsController<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<C> Clone for WeakController<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<C> WeakController<C> {
    pub fn upgrade(&self) -> Option<ResultsController<C>> {
        self.shared.upgrade().map(|shared| ResultsController { shared })
    }
}

impl<C: SearchClient + 'static> ResultsController<C> {
    pub fn new(client: C) -> Self {
        Self {
            shared: Rc::new(Shared {
                client,
                session: RefCell::new(Session::idle()),
                listener: RefCell::new(None),
            }),
        }
    }

    pub fn downgrade(&self) -> WeakController<C> {
        WeakController {
            shared: Rc::downgrade(&self.shared),
        }
    }

    /// Registers the single change listener. It runs after every
    /// visible change with no internal borrow held, so it may read the
    /// controller freely to re-render.
    pub fn set_on_results_changed(&self, listener: impl Fn() + 'static) {
        *self.shared.listener.borrow_mut() = Some(Box::new(listener));
    }

    /// Starts a first-page search for `query`, superseding whatever is
    /// in flight. Returns whether a fetch was started, the caller's cue
    /// to show a loading indicator. `on_complete` fires exactly once
    /// when that fetch's result has been applied or discarded; when no
    /// fetch starts it is dropped unused.
    ///
    /// Re-entering the query already being fetched is a no-op. An empty
    /// query clears the list immediately without touching the network.
    pub fn search(&self, query: &str, on_complete: impl FnOnce() + 'static) -> bool {
        let mut session = self.shared.session.borrow_mut();
        if session.in_flight() && session.query == query {
            return false;
        }

        let was_visible = session.phase != Phase::Idle || !session.users.is_empty();
        let generation = session.generation + 1;
        *session = Session {
            query: query.to_string(),
            users: Vec::new(),
            next_page: None,
            phase: if query.is_empty() {
                Phase::Idle
            } else {
                Phase::Searching
            },
            generation,
        };
        drop(session);

        if query.is_empty() {
            if was_visible {
                self.shared.notify();
            }
            return false;
        }

        self.spawn_fetch(query.to_string(), None, generation, on_complete);
        true
    }

    /// Fetches the next page of the current session, appending to the
    /// visible list on completion. Returns `false` without fetching
    /// when the results are exhausted or a fetch is already in flight.
    pub fn load_next_page(&self, on_complete: impl FnOnce() + 'static) -> bool {
        let mut session = self.shared.session.borrow_mut();
        if session.in_flight() {
            return false;
        }
        let Some(token) = session.next_page.clone() else {
            return false;
        };

        session.phase = Phase::Paginating;
        let query = session.query.clone();
        let generation = session.generation;
        drop(session);

        self.spawn_fetch(query, Some(token), generation, on_complete);
        true
    }

    /// Current visible result list, in API relevance order.
    pub fn users(&self) -> Vec<User> {
        self.shared.session.borrow().users.clone()
    }

    pub fn query(&self) -> String {
        self.shared.session.borrow().query.clone()
    }

    pub fn phase(&self) -> Phase {
        self.shared.session.borrow().phase
    }

    /// Whether the API reported a further page for the current results.
    pub fn has_next_page(&self) -> bool {
        self.shared.session.borrow().next_page.is_some()
    }

    /// Whether any fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.shared.session.borrow().in_flight()
    }

    fn spawn_fetch(
        &self,
        query: String,
        page: Option<PageToken>,
        generation: u64,
        on_complete: impl FnOnce() + 'static,
    ) {
        let shared = Rc::clone(&self.shared);
        task::spawn_local(async move {
            let result = shared.client.fetch_page(&query, page.as_ref()).await;

            let applied = {
                let mut session = shared.session.borrow_mut();
                if session.generation != generation {
                    // Superseded while the request was on the wire.
                    false
                } else {
                    match result {
                        Ok(page) => {
                            session.users.extend(page.users);
                            session.next_page = page.next_page;
                            session.phase = Phase::Loaded;
                            true
                        }
                        Err(err) => {
                            // Best-effort UI: keep whatever was visible,
                            // just stop loading.
                            warn!("search fetch for {:?} failed: {err}", session.query);
                            session.phase = if session.users.is_empty() {
                                Phase::Idle
                            } else {
                                Phase::Loaded
                            };
                            false
                        }
                    }
                }
            };

            if applied {
                shared.notify();
            }
            on_complete();
        });
    }
}
