//! # modforge-client: External Runtime Client
//!
//! The only crate that performs I/O against the external runtime:
//!
//! - **Inventory** ([`InventoryProvider`]): `listEntities`, `listFields`,
//!   `listWorkflowStates`. Served over HTTP by [`HttpRuntime`], in memory by
//!   [`StaticInventory`], memoised per session by [`CachedInventory`].
//! - **Install** ([`Installer`]): `installPackage(archiveBytes)`.
//!
//! Every request carries the configured timeout. Reads are retried on
//! connection failures, gateway errors, and timeouts; installs only on
//! failures that prove nothing was applied.

pub mod config;
pub mod error;
pub mod http;
pub mod install;
pub mod inventory;
pub(crate) mod retry;

pub use config::{ConfigError, RetryPolicy, RuntimeConnectionConfig};
pub use error::{InstallError, InventoryError};
pub use http::HttpRuntime;
pub use install::{InstallOutcome, InstallResult, Installer};
pub use inventory::{load_context, referenced_entities, CachedInventory, InventoryProvider, StaticInventory};
