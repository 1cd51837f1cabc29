//! # Storefront Lists
//!
//! The list screens of the storefront back office: orders, inventory
//! movements and staff check-ins.
//!
//! Each screen is a [`controller::ListReducer`] running in a
//! `storefront_runtime::Store`. The reducer owns the filters, the paging
//! cursor and the error state; records come from a [`api::RecordSource`]
//! and are bucketed by day with [`grouping::group_records`].
//!
//! ## Example
//!
//! ```ignore
//! use storefront_lists::prelude::*;
//! use storefront_runtime::Store;
//!
//! let env = ListEnvironment::new(
//!     HttpRecordSource::new(ApiConfig::from_env()?)?,
//!     EnvCredentialStore,
//!     SystemClock,
//!     ListConfig::new(Endpoint::orders()),
//! );
//! let store = Store::new(ListState::default(), ListReducer::new(), env);
//! store.send(ListAction::Mount).await?;
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod controller;
pub mod error;
pub mod filters;
pub mod grouping;
pub mod mocks;
pub mod types;

pub use api::{ApiListResponse, HttpRecordSource, ListQuery, RecordPage, RecordSource};
pub use auth::{AuthContext, CredentialStore, EnvCredentialStore, load_auth_context};
pub use config::{ApiConfig, Endpoint, ListConfig, RecordSchema};
pub use controller::{ListAction, ListEnvironment, ListReducer, ListState, Phase};
pub use error::{ConfigError, CredentialError, ErrorKind, FetchError};
pub use filters::{FilterChange, FilterField, FilterState, apply_filter};
pub use grouping::{BucketItems, BucketLabel, DateBucket, OrderGroup, group_records};
pub use types::{Attendance, OrderStatus, Record};

/// Everything needed to wire up a list screen.
pub mod prelude {
    pub use crate::api::{HttpRecordSource, RecordPage, RecordSource};
    pub use crate::auth::{AuthContext, CredentialStore, EnvCredentialStore};
    pub use crate::config::{ApiConfig, Endpoint, ListConfig};
    pub use crate::controller::{ListAction, ListEnvironment, ListReducer, ListState, Phase};
    pub use crate::error::FetchError;
    pub use crate::filters::{FilterField, FilterState};
    pub use crate::grouping::{BucketItems, BucketLabel, DateBucket};
    pub use storefront_core::environment::SystemClock;
}
