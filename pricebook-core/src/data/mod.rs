//! Remote price sources

pub mod provider;
pub mod yahoo;

pub use provider::{PriceError, PriceProvider, Quote};
pub use yahoo::YahooProvider;
