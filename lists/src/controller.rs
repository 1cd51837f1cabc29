//! List controller: the reducer driving one list screen.
//!
//! # Flow
//!
//! 1. `Mount` loads the session from the credential store
//! 2. `AuthLoaded` starts the first fetch
//! 3. Filter edits re-fetch: search after a quiet period, anything else at
//!    once (subject to the cool-down)
//! 4. Each fetch gets a new generation; only the response of the latest
//!    generation is applied
//! 5. `Unmount` cancels every timer and request
//!
//! Requests never overlap: starting a fetch cancels the one in flight.

use crate::api::{ListQuery, RecordPage, RecordSource};
use crate::auth::{AuthContext, CredentialStore, load_auth_context};
use crate::config::ListConfig;
use crate::error::FetchError;
use crate::filters::{FilterChange, FilterField, FilterState, Refetch, apply_filter, refetch_for};
use crate::grouping::{DateBucket, group_records};
use crate::types::Record;
use chrono::{DateTime, Utc};
use std::marker::PhantomData;
use std::time::Duration;
use storefront_core::effect::{Effect, EffectId};
use storefront_core::environment::Clock;
use storefront_core::reducer::Reducer;
use storefront_core::{SmallVec, async_effect, cancellable, delay, smallvec};

/// The in-flight list request.
pub const FETCH: EffectId = EffectId::new("list.fetch");

/// The pending search quiet period.
pub const SEARCH_DEBOUNCE: EffectId = EffectId::new("list.search_debounce");

/// The pending trailing fetch after a cool-down.
pub const FETCH_COOLDOWN: EffectId = EffectId::new("list.fetch_cooldown");

/// The session lookup.
pub const LOAD_AUTH: EffectId = EffectId::new("list.load_auth");

/// Lifecycle of the list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Nothing requested yet.
    Idle,
    /// A fetch is in flight or scheduled.
    Loading,
    /// The last fetch succeeded.
    Ready,
    /// The last fetch failed; see [`ListState::error`].
    Error,
}

/// Whether a page replaces the list or extends it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// First page; replaces the list.
    Replace,
    /// Next page; appended.
    Append,
}

/// A request the controller issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    /// Generation the response must carry.
    pub generation: u64,
    /// Requested page.
    pub page: u32,
    /// How the response is merged.
    pub mode: FetchMode,
}

/// State of one list screen.
#[derive(Clone, Debug)]
pub struct ListState {
    /// Lifecycle.
    pub phase: Phase,
    /// Current filter selection.
    pub filters: FilterState,
    /// Session, once loaded.
    pub auth: Option<AuthContext>,
    /// Whether the screen is visible.
    pub mounted: bool,
    /// Every row loaded so far, in response order.
    pub records: Vec<Record>,
    /// `records` bucketed by day.
    pub buckets: Vec<DateBucket>,
    /// Last page merged into `records`.
    pub page: u32,
    /// Page count reported by the backend.
    pub total_pages: Option<u32>,
    /// Error of the last fetch.
    pub error: Option<FetchError>,
    /// Generation of the most recently started fetch.
    pub generation: u64,
    /// Request awaiting its response.
    pub in_flight: Option<PageRequest>,
    /// Last request issued, replayed by `Retry`.
    pub last_request: Option<PageRequest>,
    /// When the last fetch started.
    pub last_fetch_at: Option<DateTime<Utc>>,
    /// A fetch is waiting for the cool-down to pass.
    pub trailing_fetch: bool,
}

impl ListState {
    /// Unmounted list with `filters` preselected.
    #[must_use]
    pub fn new(filters: FilterState) -> Self {
        Self {
            phase: Phase::Idle,
            filters,
            auth: None,
            mounted: false,
            records: Vec::new(),
            buckets: Vec::new(),
            page: 0,
            total_pages: None,
            error: None,
            generation: 0,
            in_flight: None,
            last_request: None,
            last_fetch_at: None,
            trailing_fetch: false,
        }
    }

    /// Start with an already loaded session; `Mount` then fetches at once.
    #[must_use]
    pub fn with_auth(mut self, context: AuthContext) -> Self {
        self.auth = Some(context);
        self
    }

    /// Whether another page can be requested.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.total_pages.is_some_and(|total| self.page < total)
    }

    /// Whether the error state offers a retry.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.phase == Phase::Error
            && self
                .error
                .as_ref()
                .is_some_and(|error| !matches!(error, FetchError::ValidationFailure(_)))
    }

    /// Whether a fetch is pending.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    /// Whether the list is waiting on nothing: no session lookup, no
    /// pending or deferred fetch.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.is_loading() && (self.auth.is_some() || self.phase == Phase::Error)
    }
}

impl Default for ListState {
    fn default() -> Self {
        Self::new(FilterState::new())
    }
}

/// Actions of a list screen.
#[derive(Clone, Debug, PartialEq)]
pub enum ListAction {
    /// The screen became visible.
    Mount,
    /// The session was read.
    AuthLoaded {
        /// The session.
        context: AuthContext,
    },
    /// No usable session.
    AuthUnavailable {
        /// Why.
        reason: String,
    },
    /// A filter was edited.
    FilterChanged {
        /// Field.
        field: FilterField,
        /// Raw value; `"-1"` clears.
        value: String,
    },
    /// The search quiet period passed.
    SearchSettled,
    /// The cool-down passed; run the trailing fetch.
    CooldownElapsed,
    /// Pull to refresh.
    ManualRefresh,
    /// Retry after an error.
    Retry,
    /// Scrolled to the end.
    LoadMore,
    /// A fetch returned rows.
    FetchSucceeded {
        /// Generation of the request.
        generation: u64,
        /// The rows.
        page: RecordPage,
    },
    /// A fetch failed.
    FetchFailed {
        /// Generation of the request.
        generation: u64,
        /// The failure.
        error: FetchError,
    },
    /// The screen went away.
    Unmount,
}

impl ListAction {
    /// Shorthand for [`ListAction::FilterChanged`].
    #[must_use]
    pub fn filter(field: FilterField, value: impl Into<String>) -> Self {
        Self::FilterChanged {
            field,
            value: value.into(),
        }
    }

    /// Whether this action settles a fetch.
    #[must_use]
    pub const fn is_fetch_outcome(&self) -> bool {
        matches!(self, Self::FetchSucceeded { .. } | Self::FetchFailed { .. })
    }
}

/// Dependencies of a list controller.
#[derive(Clone, Debug)]
pub struct ListEnvironment<S, C, K> {
    /// Where pages come from.
    pub source: S,
    /// Where the session lives.
    pub credentials: C,
    /// Time source for the cool-down and day buckets.
    pub clock: K,
    /// Endpoint and timings.
    pub config: ListConfig,
}

impl<S, C, K> ListEnvironment<S, C, K> {
    /// Bundle dependencies.
    #[must_use]
    pub const fn new(source: S, credentials: C, clock: K, config: ListConfig) -> Self {
        Self {
            source,
            credentials,
            clock,
            config,
        }
    }
}

/// Reducer of a list screen.
#[derive(Debug, Clone)]
pub struct ListReducer<S, C, K> {
    _phantom: PhantomData<(S, C, K)>,
}

impl<S, C, K> ListReducer<S, C, K> {
    /// Create a reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<S, C, K> Default for ListReducer<S, C, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, C, K> ListReducer<S, C, K>
where
    S: RecordSource + Clone + 'static,
    C: CredentialStore + Clone + 'static,
    K: Clock,
{
    fn load_auth(env: &ListEnvironment<S, C, K>) -> Effect<ListAction> {
        let credentials = env.credentials.clone();
        cancellable! {
            id: LOAD_AUTH,
            effect: async_effect! {
                match load_auth_context(&credentials).await {
                    Ok(Some(context)) => Some(ListAction::AuthLoaded { context }),
                    Ok(None) => Some(ListAction::AuthUnavailable {
                        reason: "not signed in".to_string(),
                    }),
                    Err(error) => Some(ListAction::AuthUnavailable {
                        reason: error.to_string(),
                    }),
                }
            }
        }
    }

    /// Fetch page 1, or schedule it for when the cool-down passes.
    fn request_refresh(
        state: &mut ListState,
        env: &ListEnvironment<S, C, K>,
    ) -> SmallVec<[Effect<ListAction>; 4]> {
        if let Some(remaining) = Self::cooldown_remaining(state, env) {
            tracing::debug!(?remaining, "Deferring fetch until cool-down passes");
            // A request for the previous filters is outdated now.
            state.generation += 1;
            state.in_flight = None;
            state.trailing_fetch = true;
            state.phase = Phase::Loading;
            return smallvec![
                Effect::Cancel(FETCH),
                cancellable! {
                    id: FETCH_COOLDOWN,
                    effect: delay! {
                        duration: remaining,
                        action: ListAction::CooldownElapsed
                    }
                },
            ];
        }
        Self::start_fetch(state, env, 1, FetchMode::Replace)
    }

    fn cooldown_remaining(state: &ListState, env: &ListEnvironment<S, C, K>) -> Option<Duration> {
        let last = state.last_fetch_at?;
        let cooldown = chrono::Duration::from_std(env.config.cooldown).ok()?;
        let elapsed = env.clock.now().signed_duration_since(last);
        if elapsed < chrono::Duration::zero() || elapsed >= cooldown {
            return None;
        }
        (cooldown - elapsed).to_std().ok()
    }

    fn start_fetch(
        state: &mut ListState,
        env: &ListEnvironment<S, C, K>,
        page: u32,
        mode: FetchMode,
    ) -> SmallVec<[Effect<ListAction>; 4]> {
        state.trailing_fetch = false;
        state.generation += 1;

        let Some(auth) = state.auth.as_ref() else {
            state.phase = Phase::Error;
            state.error = Some(FetchError::ValidationFailure("not signed in".to_string()));
            state.in_flight = None;
            return smallvec![Effect::Cancel(FETCH)];
        };

        let endpoint = &env.config.endpoint;
        let missing = state.filters.missing(&endpoint.required_filters);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|field| field.wire_name()).collect();
            tracing::debug!(endpoint = %endpoint.name, ?names, "Required filters missing");
            state.phase = Phase::Error;
            state.error = Some(FetchError::ValidationFailure(format!(
                "required filter missing: {}",
                names.join(", ")
            )));
            state.in_flight = None;
            return smallvec![
                Effect::Cancel(FETCH),
                Effect::Cancel(SEARCH_DEBOUNCE),
                Effect::Cancel(FETCH_COOLDOWN),
            ];
        }

        let request = PageRequest {
            generation: state.generation,
            page,
            mode,
        };
        state.phase = Phase::Loading;
        state.in_flight = Some(request);
        state.last_request = Some(request);
        state.last_fetch_at = Some(env.clock.now());

        let query = ListQuery::new(endpoint, &state.filters)
            .with_page(page)
            .with_auth(auth);
        let source = env.source.clone();
        let generation = request.generation;

        tracing::debug!(endpoint = %endpoint.name, page, ?mode, generation, "Starting fetch");

        smallvec![
            Effect::Cancel(SEARCH_DEBOUNCE),
            Effect::Cancel(FETCH_COOLDOWN),
            cancellable! {
                id: FETCH,
                effect: async_effect! {
                    match source.fetch(&query).await {
                        Ok(page) => Some(ListAction::FetchSucceeded { generation, page }),
                        Err(error) => Some(ListAction::FetchFailed { generation, error }),
                    }
                }
            },
        ]
    }

    /// Take the in-flight request if `generation` matches it.
    fn settle(state: &mut ListState, generation: u64) -> Option<PageRequest> {
        if !state.mounted {
            tracing::debug!(generation, "Ignoring response after unmount");
            return None;
        }
        match state.in_flight {
            Some(request) if request.generation == generation => {
                state.in_flight = None;
                Some(request)
            },
            _ => {
                tracing::debug!(
                    generation,
                    current = state.generation,
                    "Discarding stale response"
                );
                None
            },
        }
    }

    fn regroup(state: &mut ListState, env: &ListEnvironment<S, C, K>) {
        let now = env.clock.now().with_timezone(&env.config.utc_offset);
        state.buckets = group_records(&state.records, now);
    }
}

impl<S, C, K> Reducer for ListReducer<S, C, K>
where
    S: RecordSource + Clone + 'static,
    C: CredentialStore + Clone + 'static,
    K: Clock,
{
    type State = ListState;
    type Action = ListAction;
    type Environment = ListEnvironment<S, C, K>;

    #[allow(clippy::too_many_lines)] // One arm per action
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════════
            // Mount: load the session, or fetch if we already have one
            // ═══════════════════════════════════════════════════════════════
            ListAction::Mount => {
                state.mounted = true;
                if state.auth.is_some() {
                    Self::start_fetch(state, env, 1, FetchMode::Replace)
                } else {
                    smallvec![Self::load_auth(env)]
                }
            },

            ListAction::AuthLoaded { context } => {
                if !state.mounted {
                    return smallvec![Effect::None];
                }
                tracing::debug!(user_id = %context.user_id, "Session loaded");
                state.auth = Some(context);
                Self::start_fetch(state, env, 1, FetchMode::Replace)
            },

            ListAction::AuthUnavailable { reason } => {
                if !state.mounted {
                    return smallvec![Effect::None];
                }
                tracing::info!(%reason, "List blocked without a session");
                state.auth = None;
                state.phase = Phase::Error;
                state.error = Some(FetchError::ValidationFailure(format!(
                    "not signed in: {reason}"
                )));
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // FilterChanged: update filters, then debounce or fetch
            // ═══════════════════════════════════════════════════════════════
            ListAction::FilterChanged { field, value } => {
                let next = apply_filter(&state.filters, &FilterChange::new(field, value));
                let refetch = refetch_for(&state.filters, &next, field);
                state.filters = next;

                if !state.mounted || state.auth.is_none() {
                    return smallvec![Effect::None];
                }

                match refetch {
                    Refetch::Skip => smallvec![Effect::None],
                    Refetch::Debounced => smallvec![cancellable! {
                        id: SEARCH_DEBOUNCE,
                        effect: delay! {
                            duration: env.config.debounce,
                            action: ListAction::SearchSettled
                        }
                    }],
                    Refetch::Immediate => Self::request_refresh(state, env),
                }
            },

            ListAction::SearchSettled => {
                if !state.mounted || state.auth.is_none() {
                    return smallvec![Effect::None];
                }
                Self::start_fetch(state, env, 1, FetchMode::Replace)
            },

            ListAction::CooldownElapsed => {
                if !state.mounted || !state.trailing_fetch {
                    return smallvec![Effect::None];
                }
                Self::start_fetch(state, env, 1, FetchMode::Replace)
            },

            // ═══════════════════════════════════════════════════════════════
            // ManualRefresh / Retry / LoadMore
            // ═══════════════════════════════════════════════════════════════
            ListAction::ManualRefresh => {
                if !state.mounted {
                    return smallvec![Effect::None];
                }
                if state.auth.is_none() {
                    return smallvec![Self::load_auth(env)];
                }
                Self::start_fetch(state, env, 1, FetchMode::Replace)
            },

            ListAction::Retry => {
                if !state.mounted {
                    return smallvec![Effect::None];
                }
                if state.auth.is_none() {
                    return smallvec![Self::load_auth(env)];
                }
                let (page, mode) = state
                    .last_request
                    .map_or((1, FetchMode::Replace), |request| (request.page, request.mode));
                Self::start_fetch(state, env, page, mode)
            },

            ListAction::LoadMore => {
                let can_load = state.mounted
                    && state.auth.is_some()
                    && state.phase == Phase::Ready
                    && !state.trailing_fetch
                    && env.config.endpoint.paginated
                    && state.has_more();
                if !can_load {
                    return smallvec![Effect::None];
                }
                let next_page = state.page + 1;
                Self::start_fetch(state, env, next_page, FetchMode::Append)
            },

            // ═══════════════════════════════════════════════════════════════
            // Fetch outcomes: apply only the latest generation
            // ═══════════════════════════════════════════════════════════════
            ListAction::FetchSucceeded { generation, page } => {
                let Some(request) = Self::settle(state, generation) else {
                    return smallvec![Effect::None];
                };

                match request.mode {
                    FetchMode::Replace => {
                        state.records = page.records;
                        state.total_pages = page.total_pages;
                    },
                    FetchMode::Append => {
                        state.records.extend(page.records);
                        if page.total_pages.is_some() {
                            state.total_pages = page.total_pages;
                        }
                    },
                }
                state.page = request.page;
                state.error = None;
                state.phase = if state.trailing_fetch {
                    Phase::Loading
                } else {
                    Phase::Ready
                };
                Self::regroup(state, env);

                smallvec![Effect::None]
            },

            ListAction::FetchFailed { generation, error } => {
                let Some(request) = Self::settle(state, generation) else {
                    return smallvec![Effect::None];
                };

                tracing::warn!(%error, page = request.page, "List fetch failed");

                if !error.is_transient() && request.mode == FetchMode::Replace {
                    state.records.clear();
                    state.buckets.clear();
                    state.page = 0;
                    state.total_pages = None;
                }
                state.error = Some(error);
                state.phase = Phase::Error;

                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════════
            // Unmount: stop everything, ignore late results
            // ═══════════════════════════════════════════════════════════════
            ListAction::Unmount => {
                state.mounted = false;
                state.generation += 1;
                state.in_flight = None;
                state.trailing_fetch = false;
                if state.phase == Phase::Loading {
                    state.phase = Phase::Idle;
                }

                smallvec![
                    Effect::Cancel(FETCH),
                    Effect::Cancel(SEARCH_DEBOUNCE),
                    Effect::Cancel(FETCH_COOLDOWN),
                    Effect::Cancel(LOAD_AUTH),
                ]
            },
        }
    }
}
