//! # modforge-core: Foundational Types
//!
//! Every other crate in the workspace depends on `modforge-core`; it depends
//! on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **`CanonicalBytes` newtype.** Every content hash in the generator (spec
//!    digests, artifact-tree digests, archive integrity) flows through
//!    `CanonicalBytes::new()`. Identical logical input always yields the
//!    same bytes, which is what makes re-generation idempotent.
//!
//! 2. **`sha256_digest()` accepts only `&CanonicalBytes`.** A digest over
//!    non-canonical bytes cannot be expressed.
//!
//! 3. **Identifier rules live in one place.** Module slugs, model names,
//!    field and state names are checked by the predicates in [`identity`],
//!    and the runtime's technical model names are derived there too.
//!
//! 4. **Decimals are never floats.** [`DecimalLiteral`] keeps the exact
//!    textual value a specification author wrote.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `modforge-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod cancel;
pub mod canonical;
pub mod decimal;
pub mod digest;
pub mod error;
pub mod identity;
pub mod temporal;

pub use cancel::CancellationFlag;
pub use canonical::CanonicalBytes;
pub use decimal::DecimalLiteral;
pub use digest::{sha256_digest, sha256_hex, ContentDigest, DigestAlgorithm};
pub use error::{Cancelled, CanonicalizationError, DecimalError, IdentifierError};
pub use identity::{ModuleName, TechnicalName};
pub use temporal::{parse_date, Timestamp};
