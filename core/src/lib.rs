//! Marketplace logic for a simulated financial-product marketplace.
//!
//! Two halves, deliberately decoupled:
//!   - `offer_engine` — pure, seeded synthesis of scored product offers.
//!     Offers are display artifacts; nothing downstream treats them as
//!     authoritative.
//!   - `tracking_store` — persisted session and visitor analytics with a
//!     never-break-the-caller contract, snapshotted through `storage`.
//!
//! RULE: randomness flows through `rng::MarketRng` streams and wall-clock
//! time through `clock::Clock`. Neither half reaches for global state, so
//! every behavior is reproducible under a fixed seed and a manual clock.

pub mod applicant;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics;
pub mod offer_engine;
pub mod rng;
pub mod storage;
pub mod tracking_store;
pub mod types;
