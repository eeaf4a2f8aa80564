pub mod code;
pub mod price;

pub use code::{CodeExtractor, CodeTier};
pub use price::PriceExtractor;
