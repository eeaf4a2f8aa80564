pub mod retry;

pub use retry::{with_retries, RetryPolicy, Truthy};

#[cfg(test)]
mod tests;
