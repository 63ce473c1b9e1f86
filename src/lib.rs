//! Kezbek - Cashback Engine
//!
//! Computes cashback for partner transactions, keeps each customer's loyalty
//! tier, and pays out through third-party wallet providers (host-to-host).
//!
//! # Modules
//!
//! - [`cashback`] - Bracket lookup and cashback amount
//! - [`tier`] - Loyalty tier state machine and expiry sweep
//! - [`h2h`] - Provider adapters and dispatch by wallet code
//! - [`pricing`] - Provider fee index (cache reader and warm job)
//! - [`payout`] - Transaction use case chaining the above
//! - [`cache`] - Key/value cache seam (Redis, in-memory)
//! - [`lock`] - Distributed mutex seam (Redis, in-memory)
//! - [`scheduler`] - Periodic sweep and cache warm jobs
//! - [`transaction_id`] - Deterministic transaction ids
//! - [`error`] - Business and technical error taxonomy

// Errors first, everything else maps into them
pub mod error;

// Infrastructure seams
pub mod cache;
pub mod config;
pub mod db;
pub mod lock;
pub mod logging;

// Domain
pub mod cashback;
pub mod h2h;
pub mod payout;
pub mod pricing;
pub mod scheduler;
pub mod tier;
pub mod transaction_id;

// Convenient re-exports at crate root
pub use cache::{CacheStore, MemoryCache, RedisCache};
pub use cashback::{CashbackAmount, CashbackRateResolver};
pub use config::AppConfig;
pub use error::{AppError, BusinessError, TechnicalError};
pub use h2h::{H2hFactory, H2hProvider, H2hReceipt, H2hSendCashbackRequest};
pub use lock::{LockProvider, MemoryLockProvider, RedisLockProvider};
pub use payout::{CashbackPayout, PayoutReceipt, PayoutRequest};
pub use pricing::{PricingCacheReader, PricingWarmer, ProviderPricing};
pub use scheduler::Scheduler;
pub use tier::{ExpirySweep, SweepOutcome, TierEngine, TierOutcome, TierSaveRequest};
