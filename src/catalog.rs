//! Catalog browsing: pagination/search state, debounced fetching and the
//! per-tab session registry used by live search.
use crate::models::{CatalogPage, ContentType};
use crate::tmdb::{TmdbApi, TmdbResult};
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

pub const NO_RESULTS_MESSAGE: &str = "No results found.";
pub const LOAD_FAILED_MESSAGE: &str = "Could not load titles right now. Please try again.";

const MAX_SESSIONS: usize = 1_000;
const SESSION_TTL_SECS: i64 = 30 * 60;
const MAX_SESSION_KEY_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogState {
    pub content_type: ContentType,
    pub query: String,
    pub page: u32,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            content_type: ContentType::Movie,
            query: String::new(),
            page: 1,
        }
    }
}

impl CatalogState {
    pub fn new(content_type: ContentType, query: &str, page: u32) -> Self {
        Self {
            content_type,
            query: query.to_string(),
            page: page.max(1),
        }
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.page = 1;
    }

    pub fn switch_content_type(&mut self, content_type: ContentType) {
        self.content_type = content_type;
        self.query.clear();
        self.page = 1;
    }

    pub fn next_page(&mut self) {
        self.page = self.page.saturating_add(1);
    }

    /// Returns `false` on page 1; the caller must not fetch in that case.
    pub fn prev_page(&mut self) -> bool {
        if self.page <= 1 {
            return false;
        }
        self.page -= 1;
        true
    }

    pub fn request(&self) -> CatalogRequest {
        let query = self.query.trim();
        CatalogRequest {
            content_type: self.content_type,
            query: (!query.is_empty()).then(|| query.to_string()),
            page: self.page,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogRequest {
    pub content_type: ContentType,
    pub query: Option<String>,
    pub page: u32,
}

impl CatalogRequest {
    pub async fn send(&self, tmdb: &dyn TmdbApi) -> TmdbResult<CatalogPage> {
        match &self.query {
            Some(q) => tmdb.search(self.content_type, q, self.page).await,
            None => tmdb.popular(self.content_type, self.page).await,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CatalogResult {
    Loaded { page: CatalogPage },
    Empty,
    Failed { message: String },
}

impl CatalogResult {
    pub fn from_response(response: TmdbResult<CatalogPage>) -> Self {
        match response {
            Ok(page) if page.results.is_empty() => CatalogResult::Empty,
            Ok(page) => CatalogResult::Loaded { page },
            Err(e) => {
                warn!("Catalog fetch failed: {}", e);
                CatalogResult::Failed {
                    message: LOAD_FAILED_MESSAGE.to_string(),
                }
            }
        }
    }
}

pub async fn load(tmdb: &dyn TmdbApi, request: &CatalogRequest) -> CatalogResult {
    CatalogResult::from_response(request.send(tmdb).await)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogView {
    pub state: CatalogState,
    pub result: CatalogResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogOutcome {
    Current(CatalogView),
    /// A newer action was issued while this one waited or was in flight.
    Superseded,
    /// Nothing changed, no request was sent.
    Unchanged,
}

/// One browsing session. Every action that fetches takes a ticket from a
/// monotonically increasing sequence; only the holder of the latest ticket
/// may publish its response.
pub struct CatalogBrowser {
    tmdb: Arc<dyn TmdbApi>,
    debounce: Duration,
    state: Mutex<CatalogState>,
    latest: AtomicU64,
    last_used: AtomicI64,
}

impl CatalogBrowser {
    pub fn new(tmdb: Arc<dyn TmdbApi>, debounce: Duration) -> Self {
        Self {
            tmdb,
            debounce,
            state: Mutex::new(CatalogState::default()),
            latest: AtomicU64::new(0),
            last_used: AtomicI64::new(Utc::now().timestamp()),
        }
    }

    pub async fn state(&self) -> CatalogState {
        self.state.lock().await.clone()
    }

    /// Callers hold the state lock, so ticket order always matches the order
    /// in which state changes were applied.
    fn issue(&self, _state: &MutexGuard<'_, CatalogState>) -> u64 {
        self.last_used.store(Utc::now().timestamp(), Ordering::Relaxed);
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }

    /// Applies `change` and takes a ticket under one lock. `None` when the
    /// change was a no-op.
    async fn apply(&self, change: impl FnOnce(&mut CatalogState) -> bool) -> Option<u64> {
        let mut state = self.state.lock().await;
        if !change(&mut state) {
            return None;
        }
        Some(self.issue(&state))
    }

    /// Keystroke input: the query and page update immediately, the fetch only
    /// happens if no newer action arrives within the debounce window.
    pub async fn input(&self, query: &str) -> CatalogOutcome {
        let Some(ticket) = self
            .apply(|state| {
                state.set_query(query);
                true
            })
            .await
        else {
            return CatalogOutcome::Unchanged;
        };
        tokio::time::sleep(self.debounce).await;
        if !self.is_latest(ticket) {
            debug!(ticket, "Debounced input superseded before fetch");
            return CatalogOutcome::Superseded;
        }
        self.fetch(ticket).await
    }

    /// Aligns the session with the view a client is showing, without fetching.
    /// Any in-flight request for the old view becomes stale.
    pub async fn restore(&self, target: CatalogState) -> bool {
        self.apply(|state| {
            if *state == target {
                return false;
            }
            *state = target;
            true
        })
        .await
        .is_some()
    }

    pub async fn switch_content_type(&self, content_type: ContentType) -> CatalogOutcome {
        match self.apply(|state| {
            state.switch_content_type(content_type);
            true
        })
        .await
        {
            Some(ticket) => self.fetch(ticket).await,
            None => CatalogOutcome::Unchanged,
        }
    }

    pub async fn next_page(&self) -> CatalogOutcome {
        match self.apply(|state| {
            state.next_page();
            true
        })
        .await
        {
            Some(ticket) => self.fetch(ticket).await,
            None => CatalogOutcome::Unchanged,
        }
    }

    pub async fn prev_page(&self) -> CatalogOutcome {
        match self.apply(CatalogState::prev_page).await {
            Some(ticket) => self.fetch(ticket).await,
            None => CatalogOutcome::Unchanged,
        }
    }

    async fn fetch(&self, ticket: u64) -> CatalogOutcome {
        let state = self.state().await;
        let response = state.request().send(self.tmdb.as_ref()).await;
        if !self.is_latest(ticket) {
            debug!(ticket, "Discarding stale catalog response");
            return CatalogOutcome::Superseded;
        }
        CatalogOutcome::Current(CatalogView {
            state,
            result: CatalogResult::from_response(response),
        })
    }

    fn idle_secs(&self, now: i64) -> i64 {
        now - self.last_used.load(Ordering::Relaxed)
    }
}

pub fn valid_session_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_SESSION_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Live-search sessions keyed by a client-chosen id, one per browser tab.
pub struct SessionRegistry {
    tmdb: Arc<dyn TmdbApi>,
    debounce: Duration,
    sessions: Mutex<HashMap<String, Arc<CatalogBrowser>>>,
}

impl SessionRegistry {
    pub fn new(tmdb: Arc<dyn TmdbApi>, debounce: Duration) -> Self {
        Self {
            tmdb,
            debounce,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// `None` for keys that aren't a short token of `[A-Za-z0-9_-]`.
    pub async fn browser(&self, key: &str) -> Option<Arc<CatalogBrowser>> {
        if !valid_session_key(key) {
            return None;
        }
        let mut sessions = self.sessions.lock().await;
        if !sessions.contains_key(key) && sessions.len() >= MAX_SESSIONS {
            let now = Utc::now().timestamp();
            sessions.retain(|_, b| b.idle_secs(now) <= SESSION_TTL_SECS);
            if sessions.len() >= MAX_SESSIONS {
                warn!("Live search session table full, clearing");
                sessions.clear();
            }
        }
        let browser = sessions
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CatalogBrowser::new(self.tmdb.clone(), self.debounce)))
            .clone();
        Some(browser)
    }

    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MovieDetail, ShowDetail, Title};
    use crate::tmdb::TmdbError;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeTmdb {
        calls: StdMutex<Vec<(ContentType, Option<String>, u32)>>,
        fail: bool,
    }

    impl FakeTmdb {
        fn calls(&self) -> Vec<(ContentType, Option<String>, u32)> {
            self.calls.lock().unwrap().clone()
        }

        fn page(&self, kind: ContentType, query: Option<&str>, page: u32) -> TmdbResult<CatalogPage> {
            self.calls
                .lock()
                .unwrap()
                .push((kind, query.map(str::to_string), page));
            if self.fail {
                return Err(TmdbError::InvalidData("boom".to_string()));
            }
            let results = match query {
                Some("nothing") => vec![],
                _ => vec![Title {
                    id: 1,
                    name: format!("{}-{}", kind, query.unwrap_or("popular")),
                    poster_path: None,
                    date: None,
                    vote_average: None,
                    overview: String::new(),
                }],
            };
            Ok(CatalogPage {
                page,
                total_pages: None,
                results,
            })
        }
    }

    #[async_trait]
    impl TmdbApi for FakeTmdb {
        async fn popular(&self, kind: ContentType, page: u32) -> TmdbResult<CatalogPage> {
            self.page(kind, None, page)
        }
        async fn search(&self, kind: ContentType, query: &str, page: u32) -> TmdbResult<CatalogPage> {
            if query == "slow" {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            self.page(kind, Some(query), page)
        }
        async fn movie(&self, id: u64) -> TmdbResult<MovieDetail> {
            Err(TmdbError::NotFound(format!("/movie/{id}")))
        }
        async fn show(&self, id: u64) -> TmdbResult<ShowDetail> {
            Err(TmdbError::NotFound(format!("/tv/{id}")))
        }
    }

    #[test]
    fn query_resets_page() {
        let mut state = CatalogState::new(ContentType::Movie, "", 7);
        state.set_query("alien");
        assert_eq!(state.page, 1);
        assert_eq!(state.request().query.as_deref(), Some("alien"));
    }

    #[test]
    fn prev_page_is_noop_on_first_page() {
        let mut state = CatalogState::default();
        assert!(!state.prev_page());
        assert_eq!(state.page, 1);
        state.next_page();
        state.next_page();
        assert!(state.prev_page());
        assert_eq!(state.page, 2);
    }

    #[test]
    fn switching_type_resets_page_and_query() {
        let mut state = CatalogState::new(ContentType::Movie, "alien", 4);
        state.switch_content_type(ContentType::Tv);
        assert_eq!(state, CatalogState::new(ContentType::Tv, "", 1));
    }

    #[test]
    fn blank_query_requests_popular_listing() {
        let state = CatalogState::new(ContentType::Tv, "   ", 0);
        let req = state.request();
        assert_eq!(req.query, None);
        assert_eq!(req.page, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn only_latest_debounced_input_fetches() {
        let tmdb = Arc::new(FakeTmdb::default());
        let browser = Arc::new(CatalogBrowser::new(tmdb.clone(), Duration::from_millis(500)));

        let first = tokio::spawn({
            let browser = browser.clone();
            async move { browser.input("al").await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = browser.input("alien").await;

        assert_eq!(first.await.unwrap(), CatalogOutcome::Superseded);
        match second {
            CatalogOutcome::Current(view) => {
                assert_eq!(view.state.query, "alien");
                assert!(matches!(view.result, CatalogResult::Loaded { .. }));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(
            tmdb.calls(),
            vec![(ContentType::Movie, Some("alien".to_string()), 1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stale_response_is_discarded() {
        let tmdb = Arc::new(FakeTmdb::default());
        let browser = Arc::new(CatalogBrowser::new(tmdb.clone(), Duration::from_millis(10)));

        let slow = tokio::spawn({
            let browser = browser.clone();
            async move { browser.input("slow").await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let fast = browser.switch_content_type(ContentType::Tv).await;

        assert!(matches!(fast, CatalogOutcome::Current(_)));
        assert_eq!(slow.await.unwrap(), CatalogOutcome::Superseded);
        assert_eq!(tmdb.calls().len(), 2);
    }

    #[tokio::test]
    async fn prev_page_on_first_page_sends_nothing() {
        let tmdb = Arc::new(FakeTmdb::default());
        let browser = CatalogBrowser::new(tmdb.clone(), Duration::ZERO);
        assert_eq!(browser.prev_page().await, CatalogOutcome::Unchanged);
        assert!(tmdb.calls().is_empty());

        assert!(matches!(browser.next_page().await, CatalogOutcome::Current(_)));
        assert!(matches!(browser.prev_page().await, CatalogOutcome::Current(_)));
        assert_eq!(browser.state().await.page, 1);
        assert_eq!(tmdb.calls().len(), 2);
    }

    #[tokio::test]
    async fn distinguishes_empty_from_failure() {
        let tmdb = Arc::new(FakeTmdb::default());
        let req = CatalogRequest {
            content_type: ContentType::Movie,
            query: Some("nothing".to_string()),
            page: 1,
        };
        assert_eq!(load(tmdb.as_ref(), &req).await, CatalogResult::Empty);

        let failing = FakeTmdb {
            fail: true,
            ..FakeTmdb::default()
        };
        assert!(matches!(
            load(&failing, &req).await,
            CatalogResult::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn registry_reuses_sessions_and_rejects_bad_keys() {
        let registry = SessionRegistry::new(Arc::new(FakeTmdb::default()), Duration::ZERO);
        let a = registry.browser("tab-1").await.unwrap();
        let b = registry.browser("tab-1").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(registry.browser("").await.is_none());
        assert!(registry.browser("../etc").await.is_none());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inputs_publish_only_their_own_query() {
        let browser = Arc::new(CatalogBrowser::new(Arc::new(FakeTmdb::default()), Duration::ZERO));
        let handles: Vec<_> = (0..64)
            .map(|i| {
                let browser = browser.clone();
                tokio::spawn(async move {
                    let query = format!("q{i}");
                    let outcome = browser.input(&query).await;
                    (query, outcome)
                })
            })
            .collect();

        let mut published = 0;
        for handle in handles {
            let (query, outcome) = handle.await.unwrap();
            if let CatalogOutcome::Current(view) = outcome {
                assert_eq!(view.state.query, query);
                published += 1;
            }
        }
        assert!(published >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_aligns_state_and_invalidates_in_flight_work() {
        let tmdb = Arc::new(FakeTmdb::default());
        let browser = Arc::new(CatalogBrowser::new(tmdb.clone(), Duration::from_millis(500)));

        let pending = tokio::spawn({
            let browser = browser.clone();
            async move { browser.input("al").await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let target = CatalogState::new(ContentType::Tv, "office", 3);
        assert!(browser.restore(target.clone()).await);
        assert!(!browser.restore(target.clone()).await);

        assert_eq!(pending.await.unwrap(), CatalogOutcome::Superseded);
        assert_eq!(browser.state().await, target);
        assert!(tmdb.calls().is_empty());
    }

    #[tokio::test]
    async fn full_registry_prunes_idle_sessions_first() {
        let registry = SessionRegistry::new(Arc::new(FakeTmdb::default()), Duration::ZERO);
        let stale = Utc::now().timestamp() - SESSION_TTL_SECS - 1;
        for i in 0..MAX_SESSIONS {
            let browser = registry.browser(&format!("tab-{i}")).await.unwrap();
            if i % 2 == 0 {
                browser.last_used.store(stale, Ordering::Relaxed);
            }
        }
        assert_eq!(registry.len().await, MAX_SESSIONS);

        // Known keys never trigger pruning.
        registry.browser("tab-0").await.unwrap();
        assert_eq!(registry.len().await, MAX_SESSIONS);

        registry.browser("newcomer").await.unwrap();
        assert_eq!(registry.len().await, MAX_SESSIONS / 2 + 1);
        let sessions = registry.sessions.lock().await;
        assert!(!sessions.contains_key("tab-0"));
        assert!(sessions.contains_key("tab-1"));
        assert!(sessions.contains_key("newcomer"));
    }

    #[tokio::test]
    async fn full_registry_of_active_sessions_starts_over() {
        let registry = SessionRegistry::new(Arc::new(FakeTmdb::default()), Duration::ZERO);
        for i in 0..MAX_SESSIONS {
            registry.browser(&format!("tab-{i}")).await.unwrap();
        }
        registry.browser("newcomer").await.unwrap();
        assert_eq!(registry.len().await, 1);
    }
}
