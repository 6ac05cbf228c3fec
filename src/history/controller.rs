//! Cursor-based backward pagination over the recently-played feed.
//!
//! The controller owns the accumulated records for one authenticated session. All
//! operations take `&self` so the controller can be shared between tasks; the state
//! lock is never held across the network call, which is the only suspension point.

use parking_lot::{Mutex, RwLock};

use crate::auth::AccessToken;
use crate::history::client::HistoryClient;
use crate::history::error::{ErrorNotice, FetchError};
use crate::history::types::{PAGE_SIZE, Page, PlayRecord};

/// Session-local pagination state.
#[derive(Debug, Clone)]
pub struct PaginationState {
    pub records: Vec<PlayRecord>,
    /// Exclusive upper bound for the next page; `None` means "most recent".
    pub cursor: Option<i64>,
    pub has_more: bool,
    pub is_loading_initial: bool,
    pub is_loading_more: bool,
    /// Bumped whenever the record list is replaced or cleared.
    generation: u64,
    last_error: Option<ErrorNotice>,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            cursor: None,
            has_more: true,
            is_loading_initial: false,
            is_loading_more: false,
            generation: 0,
            last_error: None,
        }
    }
}

/// Read-only copy of the state handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryView {
    pub records: Vec<PlayRecord>,
    pub cursor: Option<i64>,
    pub has_more: bool,
    pub is_loading_initial: bool,
    pub is_loading_more: bool,
}

/// What a refresh or load-more call ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A page was fetched and applied.
    Loaded { received: usize, has_more: bool },
    /// A guard rejected the call; no request was made.
    Skipped,
    /// The result arrived after a refresh or reset replaced the list, and was dropped.
    Discarded,
}

#[derive(Debug, Clone, Copy)]
enum LoadKind {
    Initial,
    More,
}

/// Clears a loading flag when dropped, whichever way the operation exits.
struct LoadingGuard<'a> {
    state: &'a Mutex<PaginationState>,
    kind: LoadKind,
}

impl<'a> LoadingGuard<'a> {
    /// Caller must already have set the flag while holding the lock.
    fn new(state: &'a Mutex<PaginationState>, kind: LoadKind) -> Self {
        Self { state, kind }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        match self.kind {
            LoadKind::Initial => state.is_loading_initial = false,
            LoadKind::More => state.is_loading_more = false,
        }
    }
}

pub struct PaginationController<C: HistoryClient> {
    client: C,
    credential: RwLock<Option<AccessToken>>,
    page_size: u32,
    state: Mutex<PaginationState>,
}

impl<C: HistoryClient> PaginationController<C> {
    pub fn new(client: C, credential: Option<AccessToken>) -> Self {
        Self {
            client,
            credential: RwLock::new(credential),
            page_size: PAGE_SIZE,
            state: Mutex::new(PaginationState::default()),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn has_credential(&self) -> bool {
        self.credential.read().is_some()
    }

    /// Swap in a new credential. The accumulated history belongs to the old one and is dropped.
    pub fn set_credential(&self, credential: AccessToken) {
        *self.credential.write() = Some(credential);
        self.reset();
    }

    pub fn clear_credential(&self) {
        *self.credential.write() = None;
        self.reset();
    }

    /// Reload the newest page and replace everything loaded so far.
    ///
    /// On failure the existing records are kept and the error is surfaced. If the
    /// credential changes while the request is in flight, its result (or error) is
    /// dropped and `Discarded` is returned.
    pub async fn refresh(&self) -> Result<LoadOutcome, FetchError> {
        let Some(credential) = self.credential.read().clone() else {
            log::debug!("Skipping refresh: no credential");
            return Ok(LoadOutcome::Skipped);
        };

        let (generation, _guard) = {
            let mut state = self.state.lock();
            if state.is_loading_initial {
                log::debug!("Skipping refresh: initial load already in flight");
                return Ok(LoadOutcome::Skipped);
            }
            state.is_loading_initial = true;
            (
                state.generation,
                LoadingGuard::new(&self.state, LoadKind::Initial),
            )
        };

        let result = self
            .client
            .fetch_page(&credential, self.page_size, None)
            .await;

        let mut state = self.state.lock();
        // A reset while in flight means the result belongs to a previous credential
        if state.generation != generation {
            log::debug!("Dropping refreshed page: history was reset meanwhile");
            return Ok(LoadOutcome::Discarded);
        }

        match result {
            Ok(page) => Ok(self.apply_refresh(&mut state, page)),
            Err(error) => {
                log::error!("Failed to refresh history: {error}");
                state.last_error = Some(ErrorNotice::from(&error));
                Err(error)
            }
        }
    }

    /// Fetch the page older than the cursor and append it.
    ///
    /// Silently does nothing while another load-more or an initial load is in flight,
    /// when the feed is exhausted, or before the first page has produced a cursor. A
    /// failure stops pagination until the next successful refresh.
    pub async fn load_more(&self) -> Result<LoadOutcome, FetchError> {
        let Some(credential) = self.credential.read().clone() else {
            return Ok(LoadOutcome::Skipped);
        };

        let (cursor, generation, _guard) = {
            let mut state = self.state.lock();
            if state.is_loading_more || state.is_loading_initial || !state.has_more {
                return Ok(LoadOutcome::Skipped);
            }
            let Some(cursor) = state.cursor else {
                return Ok(LoadOutcome::Skipped);
            };
            state.is_loading_more = true;
            (
                cursor,
                state.generation,
                LoadingGuard::new(&self.state, LoadKind::More),
            )
        };

        let result = self
            .client
            .fetch_page(&credential, self.page_size, Some(cursor))
            .await;

        let mut state = self.state.lock();
        if state.generation != generation {
            log::debug!("Dropping page older than {cursor}: history was replaced meanwhile");
            return Ok(LoadOutcome::Discarded);
        }

        match result {
            Ok(page) => Ok(self.apply_more(&mut state, page)),
            Err(error) => {
                log::warn!("Failed to load more history, pagination stopped: {error}");
                state.has_more = false;
                state.last_error = Some(ErrorNotice::from(&error));
                Err(error)
            }
        }
    }

    /// Forget everything loaded for the current session.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.records.clear();
        state.cursor = None;
        state.has_more = true;
        state.last_error = None;
        state.generation += 1;
    }

    pub fn snapshot(&self) -> HistoryView {
        let state = self.state.lock();
        HistoryView {
            records: state.records.clone(),
            cursor: state.cursor,
            has_more: state.has_more,
            is_loading_initial: state.is_loading_initial,
            is_loading_more: state.is_loading_more,
        }
    }

    /// Take the most recent error notice, if it has not been shown yet.
    pub fn take_error(&self) -> Option<ErrorNotice> {
        self.state.lock().last_error.take()
    }

    fn apply_refresh(&self, state: &mut PaginationState, page: Page) -> LoadOutcome {
        let has_more = page.raw_count == self.page_size as usize;
        let received = page.records.len();

        state.cursor = page.oldest_played_at();
        state.records = page.records;
        state.has_more = has_more;
        state.generation += 1;

        LoadOutcome::Loaded { received, has_more }
    }

    fn apply_more(&self, state: &mut PaginationState, page: Page) -> LoadOutcome {
        // An under-full page is the only end-of-feed signal Spotify gives
        let has_more = page.raw_count == self.page_size as usize;
        let received = page.records.len();

        if let Some(oldest) = page.oldest_played_at() {
            state.cursor = Some(oldest);
        }
        state.records.extend(page.records);
        state.has_more = has_more;

        LoadOutcome::Loaded { received, has_more }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::history::client::MockHistoryClient;
    use crate::history::error::FetchErrorKind;
    use crate::test_utils::{GatedClient, page_of, token};

    const T1: i64 = 1_714_566_896_789;

    fn client_returning(pages: Vec<Page>) -> MockHistoryClient {
        let mut client = MockHistoryClient::new();
        let mut pages = pages.into_iter();
        client
            .expect_fetch_page()
            .times(pages.len())
            .returning(move |_, _, _| Ok(pages.next().unwrap()));
        client
    }

    fn unauthorized() -> FetchError {
        FetchError::Unauthorized {
            message: "The access token expired".into(),
        }
    }

    fn assert_unique_ids(records: &[PlayRecord]) {
        let ids: HashSet<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), records.len());
    }

    #[tokio::test]
    async fn test_refresh_full_page() {
        let mut client = MockHistoryClient::new();
        client
            .expect_fetch_page()
            .withf(|_, page_size, before| *page_size == PAGE_SIZE && before.is_none())
            .times(1)
            .returning(|_, _, _| Ok(page_of(20, T1)));

        let controller = PaginationController::new(client, Some(token()));
        let outcome = controller.refresh().await.unwrap();

        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                received: 20,
                has_more: true
            }
        );
        let view = controller.snapshot();
        assert_eq!(view.records.len(), 20);
        assert_eq!(view.cursor, Some(T1 - 19_000));
        assert!(view.has_more);
        assert!(!view.is_loading_initial);
    }

    #[tokio::test]
    async fn test_load_more_short_page_ends_feed() {
        let mut client = MockHistoryClient::new();
        client
            .expect_fetch_page()
            .withf(|_, _, before| before.is_none())
            .times(1)
            .returning(|_, _, _| Ok(page_of(20, T1)));
        client
            .expect_fetch_page()
            .withf(|_, _, before| *before == Some(T1 - 19_000))
            .times(1)
            .returning(|_, _, _| Ok(page_of(5, T1 - 20_000)));

        let controller = PaginationController::new(client, Some(token()));
        controller.refresh().await.unwrap();
        let before = controller.snapshot().records;

        let outcome = controller.load_more().await.unwrap();
        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                received: 5,
                has_more: false
            }
        );

        let view = controller.snapshot();
        assert_eq!(view.records.len(), 25);
        assert_eq!(&view.records[..20], &before[..]);
        assert_eq!(view.cursor, Some(T1 - 24_000));
        assert!(!view.has_more);
        assert!(!view.is_loading_more);
        assert_unique_ids(&view.records);
    }

    #[tokio::test]
    async fn test_load_more_empty_page() {
        let controller = PaginationController::new(
            client_returning(vec![page_of(20, T1), Page::default()]),
            Some(token()),
        );
        controller.refresh().await.unwrap();
        let before = controller.snapshot();

        let outcome = controller.load_more().await.unwrap();

        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                received: 0,
                has_more: false
            }
        );
        let view = controller.snapshot();
        assert_eq!(view.records, before.records);
        assert_eq!(view.cursor, before.cursor);
        assert!(!view.has_more);
    }

    #[tokio::test]
    async fn test_refresh_empty_page() {
        let controller =
            PaginationController::new(client_returning(vec![Page::default()]), Some(token()));

        controller.refresh().await.unwrap();

        let view = controller.snapshot();
        assert!(view.records.is_empty());
        assert_eq!(view.cursor, None);
        assert!(!view.has_more);
    }

    #[tokio::test]
    async fn test_refresh_unauthorized_keeps_records() {
        let mut client = MockHistoryClient::new();
        let mut calls = 0;
        client.expect_fetch_page().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Ok(page_of(20, T1))
            } else {
                Err(unauthorized())
            }
        });

        let controller = PaginationController::new(client, Some(token()));
        controller.refresh().await.unwrap();
        let before = controller.snapshot();

        let error = controller.refresh().await.unwrap_err();
        assert_eq!(error.kind(), FetchErrorKind::Unauthorized);

        let view = controller.snapshot();
        assert_eq!(view.records, before.records);
        assert_eq!(view.cursor, before.cursor);
        assert!(view.has_more);
        assert!(!view.is_loading_initial);

        let notice = controller.take_error().unwrap();
        assert!(notice.requires_login());
        assert!(controller.take_error().is_none());
    }

    #[tokio::test]
    async fn test_refresh_replaces_records() {
        let controller = PaginationController::new(
            client_returning(vec![
                page_of(20, T1),
                page_of(20, T1 - 20_000),
                page_of(3, T1 + 60_000),
            ]),
            Some(token()),
        );
        controller.refresh().await.unwrap();
        controller.load_more().await.unwrap();
        assert_eq!(controller.snapshot().records.len(), 40);

        controller.refresh().await.unwrap();

        let view = controller.snapshot();
        assert_eq!(view.records.len(), 3);
        assert_eq!(view.cursor, Some(T1 + 58_000));
        assert!(!view.has_more);
    }

    #[tokio::test]
    async fn test_load_more_failure_is_fail_closed() {
        let mut client = MockHistoryClient::new();
        let mut calls = 0;
        client.expect_fetch_page().times(2).returning(move |_, _, _| {
            calls += 1;
            if calls == 1 {
                Ok(page_of(20, T1))
            } else {
                Err(FetchError::RemoteError {
                    status: 502,
                    message: "Bad gateway".into(),
                })
            }
        });

        let controller = PaginationController::new(client, Some(token()));
        controller.refresh().await.unwrap();
        let before = controller.snapshot();

        assert!(controller.load_more().await.is_err());

        let view = controller.snapshot();
        assert!(!view.has_more);
        assert!(!view.is_loading_more);
        assert_eq!(view.records, before.records);
        assert_eq!(view.cursor, before.cursor);
        assert_eq!(
            controller.take_error().unwrap().kind,
            FetchErrorKind::RemoteError
        );

        // `times(2)` fails the test if this reaches the client
        assert_eq!(controller.load_more().await.unwrap(), LoadOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_load_more_noop_when_feed_exhausted() {
        let controller =
            PaginationController::new(client_returning(vec![page_of(7, T1)]), Some(token()));
        controller.refresh().await.unwrap();
        let before = controller.snapshot();

        assert_eq!(controller.load_more().await.unwrap(), LoadOutcome::Skipped);
        assert_eq!(controller.load_more().await.unwrap(), LoadOutcome::Skipped);
        assert_eq!(controller.snapshot(), before);
    }

    #[tokio::test]
    async fn test_load_more_noop_before_first_page() {
        let mut client = MockHistoryClient::new();
        client.expect_fetch_page().never();

        let controller = PaginationController::new(client, Some(token()));
        assert_eq!(controller.load_more().await.unwrap(), LoadOutcome::Skipped);
        assert!(controller.snapshot().records.is_empty());
    }

    #[test]
    fn test_operations_skip_without_credential() {
        let mut client = MockHistoryClient::new();
        client.expect_fetch_page().never();

        let controller = PaginationController::new(client, None);
        assert!(!controller.has_credential());
        assert_eq!(
            tokio_test::block_on(controller.refresh()).unwrap(),
            LoadOutcome::Skipped
        );
        assert_eq!(
            tokio_test::block_on(controller.load_more()).unwrap(),
            LoadOutcome::Skipped
        );
    }

    #[tokio::test]
    async fn test_paging_through_feed_keeps_ids_unique_and_order() {
        let controller = PaginationController::new(
            client_returning(vec![
                page_of(20, T1),
                page_of(20, T1 - 20_000),
                page_of(20, T1 - 40_000),
                page_of(11, T1 - 60_000),
            ]),
            Some(token()),
        );
        controller.refresh().await.unwrap();
        while controller.snapshot().has_more {
            controller.load_more().await.unwrap();
        }

        let view = controller.snapshot();
        assert_eq!(view.records.len(), 71);
        assert_unique_ids(&view.records);
        assert!(
            view.records
                .windows(2)
                .all(|pair| pair[0].played_at_epoch_ms > pair[1].played_at_epoch_ms)
        );
    }

    #[tokio::test]
    async fn test_reset_and_credential_change() {
        let controller =
            PaginationController::new(client_returning(vec![page_of(4, T1)]), Some(token()));
        controller.refresh().await.unwrap();
        assert!(!controller.snapshot().has_more);

        controller.set_credential(AccessToken::new("other-token").unwrap());

        let view = controller.snapshot();
        assert!(view.records.is_empty());
        assert_eq!(view.cursor, None);
        assert!(view.has_more);

        controller.clear_credential();
        assert!(!controller.has_credential());
    }

    #[tokio::test]
    async fn test_load_more_is_noop_while_in_flight() {
        let client = GatedClient::new(vec![Ok(page_of(20, T1)), Ok(page_of(20, T1 - 20_000))]);
        let controller = Arc::new(PaginationController::new(client, Some(token())));

        controller.client.release();
        controller.refresh().await.unwrap();

        let in_flight = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load_more().await }
        });
        controller.client.wait_for_calls(2).await;
        assert!(controller.snapshot().is_loading_more);

        let before = controller.snapshot();
        assert_eq!(controller.load_more().await.unwrap(), LoadOutcome::Skipped);
        assert_eq!(controller.snapshot(), before);
        assert_eq!(controller.client.call_count(), 2);

        controller.client.release();
        in_flight.await.unwrap().unwrap();

        let view = controller.snapshot();
        assert_eq!(view.records.len(), 40);
        assert!(!view.is_loading_more);
    }

    #[tokio::test]
    async fn test_refresh_is_noop_while_in_flight() {
        let client = GatedClient::new(vec![Ok(page_of(20, T1))]);
        let controller = Arc::new(PaginationController::new(client, Some(token())));

        let in_flight = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh().await }
        });
        controller.client.wait_for_calls(1).await;
        assert!(controller.snapshot().is_loading_initial);

        assert_eq!(controller.refresh().await.unwrap(), LoadOutcome::Skipped);
        assert_eq!(controller.load_more().await.unwrap(), LoadOutcome::Skipped);
        assert_eq!(controller.client.call_count(), 1);

        controller.client.release();
        in_flight.await.unwrap().unwrap();
        assert!(!controller.snapshot().is_loading_initial);
    }

    #[tokio::test]
    async fn test_load_more_result_discarded_after_refresh() {
        let client = GatedClient::new(vec![
            Ok(page_of(20, T1)),
            Ok(page_of(20, T1 - 20_000)),
            // Newer data returned by the refresh that races the load-more
            Ok(page_of(20, T1 + 100_000)),
        ]);
        let controller = Arc::new(PaginationController::new(client, Some(token())));

        controller.client.release();
        controller.refresh().await.unwrap();

        let load_more = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load_more().await }
        });
        controller.client.wait_for_calls(2).await;

        let refresh = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh().await }
        });
        controller.client.wait_for_calls(3).await;

        controller.client.release();
        controller.client.release();

        let refresh_outcome = refresh.await.unwrap().unwrap();
        let load_more_outcome = load_more.await.unwrap().unwrap();

        let view = controller.snapshot();
        assert!(!view.is_loading_initial);
        assert!(!view.is_loading_more);
        assert_unique_ids(&view.records);
        assert_eq!(view.records[0].played_at_epoch_ms, T1 + 100_000);

        match load_more_outcome {
            // The refresh was applied first; the stale page must not be appended
            LoadOutcome::Discarded => {
                assert_eq!(view.records.len(), 20);
                assert!(matches!(refresh_outcome, LoadOutcome::Loaded { .. }));
            }
            // The load-more was applied first; the refresh then replaced everything
            LoadOutcome::Loaded { .. } => assert_eq!(view.records.len(), 20),
            LoadOutcome::Skipped => panic!("load-more was already in flight"),
        }
    }

    fn assert_empty_session(view: &HistoryView) {
        assert!(view.records.is_empty());
        assert_eq!(view.cursor, None);
        assert!(view.has_more);
    }

    #[tokio::test]
    async fn test_refresh_result_dropped_after_clear_credential() {
        let client = GatedClient::new(vec![Ok(page_of(20, T1))]);
        let controller = Arc::new(PaginationController::new(client, Some(token())));

        let refresh = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh().await }
        });
        controller.client.wait_for_calls(1).await;

        controller.clear_credential();
        controller.client.release();

        assert_eq!(refresh.await.unwrap().unwrap(), LoadOutcome::Discarded);
        let view = controller.snapshot();
        assert_empty_session(&view);
        assert!(!view.is_loading_initial);
        assert!(!controller.has_credential());
    }

    #[tokio::test]
    async fn test_refresh_result_dropped_after_set_credential() {
        let client = GatedClient::new(vec![Ok(page_of(20, T1)), Ok(page_of(3, T1 + 50_000))]);
        let controller = Arc::new(PaginationController::new(client, Some(token())));

        let refresh = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh().await }
        });
        controller.client.wait_for_calls(1).await;

        controller.set_credential(AccessToken::new("other-token").unwrap());
        controller.client.release();

        assert_eq!(refresh.await.unwrap().unwrap(), LoadOutcome::Discarded);
        assert_empty_session(&controller.snapshot());

        // The new session starts from its own newest page
        controller.client.release();
        controller.refresh().await.unwrap();

        let view = controller.snapshot();
        assert_eq!(view.records.len(), 3);
        assert_eq!(view.records[0].played_at_epoch_ms, T1 + 50_000);
        assert_eq!(controller.client.calls.lock().as_slice(), &[None, None]);
    }

    #[tokio::test]
    async fn test_refresh_error_dropped_after_credential_change() {
        let client = GatedClient::new(vec![Err(unauthorized())]);
        let controller = Arc::new(PaginationController::new(client, Some(token())));

        let refresh = tokio::spawn({
            let controller = controller.clone();
            async move { controller.refresh().await }
        });
        controller.client.wait_for_calls(1).await;

        controller.set_credential(AccessToken::new("other-token").unwrap());
        controller.client.release();

        assert_eq!(refresh.await.unwrap().unwrap(), LoadOutcome::Discarded);
        assert!(controller.take_error().is_none());
        assert_empty_session(&controller.snapshot());
    }

    #[tokio::test]
    async fn test_load_more_result_dropped_after_reset() {
        let client = GatedClient::new(vec![Ok(page_of(20, T1)), Ok(page_of(20, T1 - 20_000))]);
        let controller = Arc::new(PaginationController::new(client, Some(token())));

        controller.client.release();
        controller.refresh().await.unwrap();

        let load_more = tokio::spawn({
            let controller = controller.clone();
            async move { controller.load_more().await }
        });
        controller.client.wait_for_calls(2).await;

        controller.reset();
        controller.client.release();

        assert_eq!(load_more.await.unwrap().unwrap(), LoadOutcome::Discarded);
        let view = controller.snapshot();
        assert_empty_session(&view);
        assert!(!view.is_loading_more);
    }
}
