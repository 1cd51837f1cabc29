//! The list controller running inside a store, with scripted backends and
//! paused time.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::time::Duration;
use storefront_core::environment::Clock;
use storefront_lists::auth::keys;
use storefront_lists::controller::FETCH;
use storefront_lists::mocks::{MemoryCredentialStore, ScriptedRecordSource};
use storefront_lists::{
    Endpoint, FetchError, FilterField, ListAction, ListConfig, ListEnvironment, ListReducer,
    ListState, Phase, Record, RecordPage,
};
use storefront_runtime::Store;
use storefront_testing::helpers::{init_test_tracing, wait_for_action};
use storefront_testing::{ManualClock, test_clock};

type TestEnv = ListEnvironment<ScriptedRecordSource, MemoryCredentialStore, ManualClock>;
type TestReducer = ListReducer<ScriptedRecordSource, MemoryCredentialStore, ManualClock>;
type TestStore = Store<ListState, ListAction, TestEnv, TestReducer>;

const SETTLE: Duration = Duration::from_secs(30);

fn signed_in() -> MemoryCredentialStore {
    MemoryCredentialStore::with_entries([
        (keys::USER_ID, "17"),
        (keys::LOGIN_TOKEN, "token-17"),
        (keys::STORE, "3"),
    ])
}

fn store_with(source: ScriptedRecordSource, credentials: MemoryCredentialStore) -> TestStore {
    init_test_tracing();
    let env = ListEnvironment::new(
        source,
        credentials,
        ManualClock::new(test_clock().now()),
        ListConfig::new(Endpoint::orders()),
    );
    Store::new(ListState::default(), ListReducer::new(), env)
}

fn page(ids: &[&str]) -> RecordPage {
    RecordPage::new(
        ids.iter()
            .map(|id| Record::new(*id, "2025-01-01 00:00:00").with_group_key(*id))
            .collect(),
    )
}

async fn record_ids(store: &TestStore) -> Vec<String> {
    store
        .state(|state| state.records.iter().map(|r| r.id.clone()).collect())
        .await
}

async fn mount(store: &TestStore) -> ListAction {
    store
        .send_and_wait_for(ListAction::Mount, ListAction::is_fetch_outcome, SETTLE)
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn mount_loads_session_then_first_page() {
    let source = ScriptedRecordSource::new().then_page(page(&["1", "2"]).with_total_pages(4));
    let store = store_with(source.clone(), signed_in());

    let outcome = mount(&store).await;

    assert!(matches!(outcome, ListAction::FetchSucceeded { generation: 1, .. }));
    assert_eq!(record_ids(&store).await, ["1", "2"]);
    store
        .state(|state| {
            assert_eq!(state.phase, Phase::Ready);
            assert_eq!(state.page, 1);
            assert_eq!(state.buckets.len(), 1);
            assert!(state.has_more());
        })
        .await;

    let query = &source.queries()[0];
    assert_eq!(query.token.as_deref(), Some("token-17"));
    assert_eq!(query.store.as_deref(), Some("3"));
    assert_eq!(query.page, Some(1));
}

#[tokio::test(start_paused = true)]
async fn signed_out_users_never_fetch() {
    let source = ScriptedRecordSource::new();
    let store = store_with(source.clone(), MemoryCredentialStore::new());

    let outcome = store
        .send_and_wait_for(
            ListAction::Mount,
            |action| matches!(action, ListAction::AuthUnavailable { .. }),
            SETTLE,
        )
        .await
        .unwrap();

    assert!(matches!(outcome, ListAction::AuthUnavailable { .. }));
    store
        .state(|state| {
            assert_eq!(state.phase, Phase::Error);
            assert!(matches!(state.error, Some(FetchError::ValidationFailure(_))));
        })
        .await;
    assert_eq!(source.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn typing_bursts_collapse_into_one_request() {
    let source = ScriptedRecordSource::new();
    let store = store_with(source.clone(), signed_in());
    mount(&store).await;

    let mut actions = store.subscribe_actions();
    for text in ["a", "ao", "ao d", "ao dai"] {
        store
            .send(ListAction::filter(FilterField::Search, text))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    let outcome = wait_for_action(&mut actions, ListAction::is_fetch_outcome, SETTLE).await;

    assert!(outcome.is_some());
    assert_eq!(source.call_count(), 2);
    let last = source.queries().pop().unwrap();
    assert!(last.filters.contains(&("search", "ao dai".to_string())));
}

#[tokio::test(start_paused = true)]
async fn edits_inside_cooldown_produce_one_trailing_request() {
    let source = ScriptedRecordSource::new();
    let store = store_with(source.clone(), signed_in());
    mount(&store).await;

    let mut actions = store.subscribe_actions();
    store
        .send(ListAction::filter(FilterField::Seller, "3"))
        .await
        .unwrap();
    store
        .send(ListAction::filter(FilterField::Customer, "8"))
        .await
        .unwrap();
    assert_eq!(source.call_count(), 1);

    let outcome = wait_for_action(&mut actions, ListAction::is_fetch_outcome, SETTLE).await;

    assert!(outcome.is_some());
    assert_eq!(source.call_count(), 2);
    let last = source.queries().pop().unwrap();
    assert!(last.filters.contains(&("seller", "3".to_string())));
    assert!(last.filters.contains(&("customer", "8".to_string())));
}

#[tokio::test(start_paused = true)]
async fn superseded_requests_never_render() {
    let source = ScriptedRecordSource::new()
        .then_page_after(Duration::from_secs(5), page(&["old"]))
        .then_page(page(&["new"]));
    let store = store_with(source.clone(), signed_in());

    store
        .send_and_wait_for(
            ListAction::Mount,
            |action| matches!(action, ListAction::AuthLoaded { .. }),
            SETTLE,
        )
        .await
        .unwrap();
    tokio::task::yield_now().await;

    store
        .send_and_wait_for(ListAction::ManualRefresh, ListAction::is_fetch_outcome, SETTLE)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(record_ids(&store).await, ["new"]);
    assert_eq!(source.call_count(), 2);
    assert!(store.in_flight().is_empty());
}

#[tokio::test(start_paused = true)]
async fn load_more_appends_next_page() {
    let source = ScriptedRecordSource::new()
        .then_page(page(&["1", "2"]).with_total_pages(2))
        .then_page(page(&["3"]).with_total_pages(2));
    let store = store_with(source.clone(), signed_in());
    mount(&store).await;

    store
        .send_and_wait_for(ListAction::LoadMore, ListAction::is_fetch_outcome, SETTLE)
        .await
        .unwrap();

    assert_eq!(record_ids(&store).await, ["1", "2", "3"]);
    assert_eq!(source.queries()[1].page, Some(2));
    store
        .state(|state| {
            assert_eq!(state.page, 2);
            assert!(!state.has_more());
        })
        .await;

    // Last page reached: nothing more is requested.
    store.send(ListAction::LoadMore).await.unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(source.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn network_failure_keeps_rows_and_retry_recovers() {
    let source = ScriptedRecordSource::new()
        .then_page(page(&["1"]))
        .then_error(FetchError::NetworkUnavailable("offline".into()))
        .then_page(page(&["1", "2"]));
    let store = store_with(source.clone(), signed_in());
    mount(&store).await;

    let failed = store
        .send_and_wait_for(ListAction::ManualRefresh, ListAction::is_fetch_outcome, SETTLE)
        .await
        .unwrap();
    assert!(matches!(failed, ListAction::FetchFailed { .. }));
    store
        .state(|state| {
            assert_eq!(state.phase, Phase::Error);
            assert!(state.can_retry());
            assert_eq!(state.records.len(), 1);
        })
        .await;

    store
        .send_and_wait_for(ListAction::Retry, ListAction::is_fetch_outcome, SETTLE)
        .await
        .unwrap();

    assert_eq!(record_ids(&store).await, ["1", "2"]);
    store
        .state(|state| {
            assert_eq!(state.phase, Phase::Ready);
            assert!(state.error.is_none());
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn unmount_cancels_in_flight_work() {
    let source =
        ScriptedRecordSource::new().then_page_after(Duration::from_secs(5), page(&["late"]));
    let store = store_with(source.clone(), signed_in());

    store
        .send_and_wait_for(
            ListAction::Mount,
            |action| matches!(action, ListAction::AuthLoaded { .. }),
            SETTLE,
        )
        .await
        .unwrap();
    assert_eq!(store.in_flight(), vec![FETCH]);

    let mut actions = store.subscribe_actions();
    store.send(ListAction::Unmount).await.unwrap();

    let late = wait_for_action(
        &mut actions,
        ListAction::is_fetch_outcome,
        Duration::from_secs(10),
    )
    .await;

    assert!(late.is_none());
    assert!(record_ids(&store).await.is_empty());
    assert!(store.in_flight().is_empty());
    store
        .state(|state| {
            assert!(!state.mounted);
            assert_eq!(state.phase, Phase::Idle);
        })
        .await;
}

#[tokio::test(start_paused = true)]
async fn check_ins_require_a_month() {
    let source = ScriptedRecordSource::new();
    let env = ListEnvironment::new(
        source.clone(),
        signed_in(),
        ManualClock::new(test_clock().now()),
        ListConfig::new(Endpoint::check_ins()),
    );
    let store: TestStore = Store::new(ListState::default(), ListReducer::new(), env);

    store
        .send_and_wait_for(
            ListAction::Mount,
            |action| matches!(action, ListAction::AuthLoaded { .. }),
            SETTLE,
        )
        .await
        .unwrap();
    store
        .state(|state| {
            assert_eq!(state.phase, Phase::Error);
            assert!(matches!(state.error, Some(FetchError::ValidationFailure(_))));
            assert!(state.is_settled());
            assert!(state.in_flight.is_none());
        })
        .await;
    assert_eq!(source.call_count(), 0);

    store
        .send_and_wait_for(
            ListAction::filter(FilterField::Month, "2024-11"),
            ListAction::is_fetch_outcome,
            SETTLE,
        )
        .await
        .unwrap();

    assert_eq!(source.call_count(), 1);
    assert!(source.queries()[0]
        .filters
        .contains(&("month", "2024-11".to_string())));
}

#[tokio::test(start_paused = true)]
async fn filter_edit_during_slow_request_never_mixes_filter_sets() {
    let source = ScriptedRecordSource::new()
        .then_page_after(Duration::from_secs(5), page(&["unfiltered"]).with_total_pages(3))
        .then_page(page(&["paid-1"]).with_total_pages(2))
        .then_page(page(&["paid-2"]).with_total_pages(2));
    let store = store_with(source.clone(), signed_in());

    store
        .send_and_wait_for(
            ListAction::Mount,
            |action| matches!(action, ListAction::AuthLoaded { .. }),
            SETTLE,
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;

    let mut actions = store.subscribe_actions();
    store
        .send(ListAction::filter(FilterField::Status, "paid"))
        .await
        .unwrap();
    store.send(ListAction::LoadMore).await.unwrap();
    assert!(store.state(|state| state.trailing_fetch).await);

    let outcome = wait_for_action(&mut actions, ListAction::is_fetch_outcome, SETTLE).await;
    assert!(matches!(outcome, Some(ListAction::FetchSucceeded { .. })));
    assert_eq!(record_ids(&store).await, ["paid-1"]);

    store
        .send_and_wait_for(ListAction::LoadMore, ListAction::is_fetch_outcome, SETTLE)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(record_ids(&store).await, ["paid-1", "paid-2"]);
    let queries = source.queries();
    assert_eq!(queries.len(), 3);
    for query in &queries[1..] {
        assert!(query.filters.contains(&("status", "paid".to_string())));
    }
    assert_eq!(queries[2].page, Some(2));
}
