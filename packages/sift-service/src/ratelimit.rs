use std::{
	sync::atomic::{AtomicU32, Ordering},
	time::Duration,
};

use tokio::{sync::Mutex, time::Instant};

/// Requests-per-minute ceiling shared by every embedding call. Callers
/// suspend on `acquire` until their reserved slot arrives; the ceiling can be
/// changed live (last-write-wins) and `0` disables limiting.
pub struct RateLimiter {
	rpm: AtomicU32,
	next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
	pub fn new(rpm: u32) -> Self {
		Self { rpm: AtomicU32::new(rpm), next_slot: Mutex::new(None) }
	}

	pub fn rpm(&self) -> u32 {
		self.rpm.load(Ordering::Relaxed)
	}

	pub fn set_rpm(&self, rpm: u32) {
		self.rpm.store(rpm, Ordering::Relaxed);
	}

	pub async fn acquire(&self) {
		let rpm = self.rpm.load(Ordering::Relaxed);

		if rpm == 0 {
			return;
		}

		let interval = Duration::from_secs_f64(60.0 / f64::from(rpm));
		let scheduled = {
			let mut next_slot = self.next_slot.lock().await;
			let now = Instant::now();
			let scheduled = next_slot.map(|slot| slot.max(now)).unwrap_or(now);

			*next_slot = Some(scheduled + interval);

			scheduled
		};

		tokio::time::sleep_until(scheduled).await;
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use super::*;

	#[tokio::test(start_paused = true)]
	async fn spaces_calls_by_the_configured_interval() {
		let limiter = RateLimiter::new(60);
		let start = Instant::now();

		limiter.acquire().await;
		limiter.acquire().await;
		limiter.acquire().await;

		assert!(start.elapsed() >= Duration::from_secs(2));
	}

	#[tokio::test(start_paused = true)]
	async fn zero_rpm_disables_limiting() {
		let limiter = RateLimiter::new(0);
		let start = Instant::now();

		for _ in 0..100 {
			limiter.acquire().await;
		}

		assert!(start.elapsed() < Duration::from_millis(1));
	}

	#[tokio::test(start_paused = true)]
	async fn rpm_updates_apply_to_later_acquires() {
		let limiter = Arc::new(RateLimiter::new(60));

		limiter.acquire().await;
		limiter.set_rpm(6_000);

		let start = Instant::now();

		limiter.acquire().await;
		limiter.acquire().await;

		// The first wait was reserved at the old cadence; later slots use the
		// new ten-millisecond interval.
		assert!(start.elapsed() < Duration::from_secs(2));
	}
}
