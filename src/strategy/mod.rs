//! Strategy engine: which markets become paper positions.

pub mod favorite;

pub use favorite::{FavoriteSelector, Rejection, ScanOutcome, SelectorConfig};
