//! Exchange-rate acquisition.
//!
//! [`RateAcquisition`] pulls fiat and crypto rates from two [`RateSource`]s,
//! merges them into one [`RateTable`](crate::conversion::RateTable), persists
//! the result through a [`RateStore`] and broadcasts it to readers.

pub mod acquisition;
pub mod backoff;
pub mod source;
pub mod store;

pub use acquisition::{
    AcquisitionHandle, AcquisitionSettings, AcquisitionState, RateAcquisition, RateStatus,
    RefreshOutcome,
};
pub use backoff::{Backoff, RetryPolicy};
pub use source::{CoinGeckoSource, FrankfurterSource, RateSource, COINGECKO_URL, FRANKFURTER_URL};
pub use store::{JsonFileRateStore, MemoryRateStore, RateStore};
