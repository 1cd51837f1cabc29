//! Print one list screen to stdout.
//!
//! ```text
//! storefront-lists <orders|inventory|check-ins> [field=value ...] [--pages N]
//! ```
//!
//! The backend comes from `STOREFRONT_API_URL`, the session from
//! `STOREFRONT_USER_ID`, `STOREFRONT_LOGIN_TOKEN` and `STOREFRONT_STORE`.

use anyhow::{Context, bail};
use std::time::Duration;
use storefront_lists::prelude::*;
use storefront_lists::{FilterChange, apply_filter};
use storefront_runtime::Store;
use tokio::sync::broadcast::error::RecvError;

/// Upper bound for one page to settle, timeouts included.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(90);

type ListStore = Store<
    ListState,
    ListAction,
    ListEnvironment<HttpRecordSource, EnvCredentialStore, SystemClock>,
    ListReducer<HttpRecordSource, EnvCredentialStore, SystemClock>,
>;

struct Args {
    endpoint: Endpoint,
    filters: FilterState,
    pages: u32,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let endpoint = Endpoint::by_name(&args.next().unwrap_or_else(|| "orders".to_string()))?;

    let mut filters = FilterState::new();
    let mut pages = 1;
    while let Some(arg) = args.next() {
        if arg == "--pages" {
            pages = args
                .next()
                .context("--pages needs a value")?
                .parse()
                .context("--pages must be a number")?;
            continue;
        }
        let Some((field, value)) = arg.split_once('=') else {
            bail!("expected field=value, got {arg}");
        };
        filters = apply_filter(&filters, &FilterChange::new(field.parse()?, value));
    }

    Ok(Args {
        endpoint,
        filters,
        pages,
    })
}

fn print_buckets(buckets: &[DateBucket]) {
    for bucket in buckets {
        println!("{}", bucket.label);
        match &bucket.items {
            BucketItems::Orders(groups) => {
                for group in groups {
                    let status = group
                        .status()
                        .map_or_else(|| "-".to_string(), |status| status.to_string());
                    println!("  #{:<8} {:>3} line(s)  {status}", group.key, group.len());
                }
            },
            BucketItems::Records(records) => {
                for record in records {
                    println!("  {:<10} {}", record.id, record.occurred_at);
                }
            },
        }
    }
}

/// Send `action`, then follow the fed-back actions until the list settles.
///
/// Validation failures start no request, so waiting for a fetch outcome
/// alone would never return.
async fn send_and_settle(store: &ListStore, action: ListAction) -> anyhow::Result<()> {
    let mut actions = store.subscribe_actions();
    store.send(action).await?;
    while !store.state(ListState::is_settled).await {
        match tokio::time::timeout(SETTLE_TIMEOUT, actions.recv()).await {
            Ok(Ok(_) | Err(RecvError::Lagged(_))) => {},
            Ok(Err(RecvError::Closed)) => bail!("store stopped before the list settled"),
            Err(_) => bail!("list did not settle within {SETTLE_TIMEOUT:?}"),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = parse_args()?;
    let api = ApiConfig::from_env()?;
    let config = ListConfig::new(args.endpoint).with_utc_offset(api.utc_offset);
    let source = HttpRecordSource::new(api)?;

    let env = ListEnvironment::new(source, EnvCredentialStore, SystemClock, config);
    let reducer = ListReducer::<HttpRecordSource, EnvCredentialStore, SystemClock>::new();
    let store: ListStore = Store::new(ListState::new(args.filters), reducer, env);

    send_and_settle(&store, ListAction::Mount).await?;
    for _ in 1..args.pages {
        let can_load = store
            .state(|state| state.phase == Phase::Ready && state.has_more())
            .await;
        if !can_load {
            break;
        }
        send_and_settle(&store, ListAction::LoadMore).await?;
    }

    let (buckets, error, total) = store
        .state(|state| (state.buckets.clone(), state.error.clone(), state.records.len()))
        .await;

    print_buckets(&buckets);
    tracing::info!(records = total, "Done");

    let mut unmount = store.send(ListAction::Unmount).await?;
    unmount.wait_with_timeout(Duration::from_secs(5)).await?;
    store.shutdown(Duration::from_secs(5)).await?;

    match error {
        Some(FetchError::ValidationFailure(message)) => bail!("{message}"),
        Some(error) => Err(error).context("list fetch failed"),
        None => Ok(()),
    }
}
