use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::GenError;

/// Shared cancellation flag, checked at every yield point.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.0.store(true, Ordering::Relaxed);
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}

	pub fn check(&self) -> Result<(), GenError> {
		if self.is_cancelled() { Err(GenError::Cancelled) } else { Ok(()) }
	}

	/// Hands control back to the runtime, pausing for `delay` if non-zero.
	///
	/// The flag is checked before and after suspending.
	pub async fn checkpoint(&self, delay: Duration) -> Result<(), GenError> {
		self.check()?;
		if delay.is_zero() {
			tokio::task::yield_now().await;
		} else {
			tokio::time::sleep(delay).await;
		}
		self.check()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn checkpoint_fails_once_cancelled() {
		let flag = CancelFlag::new();
		let other = flag.clone();
		assert!(flag.checkpoint(Duration::ZERO).await.is_ok());

		other.cancel();
		assert!(flag.is_cancelled());
		assert!(matches!(flag.checkpoint(Duration::ZERO).await, Err(GenError::Cancelled)));
	}
}
