use std::{sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::{self, Instant};

use snapmatch_config::Pacing;

use crate::BoxFuture;

// Upper bound on a single refill wait; the bucket is re-checked after each one.
const MAX_REFILL_WAIT: Duration = Duration::from_secs(60);

/// Decides when the next batch of oracle calls may be dispatched.
pub trait Pacer
where
	Self: Send + Sync,
{
	/// Resolves once batch `index`, holding `size` calls, may start.
	fn before_batch(&self, index: usize, size: usize) -> BoxFuture<'_, ()>;
}

/// Sleeps a fixed interval before every batch except the first.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
	delay: Duration,
}
impl FixedDelay {
	pub fn new(delay: Duration) -> Self {
		Self { delay }
	}
}
impl Pacer for FixedDelay {
	fn before_batch(&self, index: usize, _size: usize) -> BoxFuture<'_, ()> {
		let delay = if index == 0 { Duration::ZERO } else { self.delay };

		Box::pin(async move {
			if !delay.is_zero() {
				time::sleep(delay).await;
			}
		})
	}
}

/// Grants one token per dispatched call, refilling continuously up to `capacity`.
#[derive(Debug)]
pub struct TokenBucket {
	capacity: f64,
	refill_per_sec: f64,
	state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
	tokens: f64,
	last_refill: Instant,
}

impl TokenBucket {
	pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
		let capacity = f64::from(capacity.max(1));

		Self {
			capacity,
			refill_per_sec,
			state: Mutex::new(BucketState { tokens: capacity, last_refill: Instant::now() }),
		}
	}

	pub async fn acquire(&self, wanted: usize) {
		// A request larger than the bucket could never be satisfied; cap it.
		let wanted = (wanted as f64).min(self.capacity);

		loop {
			let wait = {
				let mut state = self.state.lock();
				let now = Instant::now();
				let elapsed = now.duration_since(state.last_refill).as_secs_f64();

				state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
				state.last_refill = now;

				if state.tokens >= wanted {
					state.tokens -= wanted;

					return;
				}

				refill_wait(wanted - state.tokens, self.refill_per_sec)
			};

			time::sleep(wait.max(Duration::from_millis(1))).await;
		}
	}
}
impl Pacer for TokenBucket {
	fn before_batch(&self, _index: usize, size: usize) -> BoxFuture<'_, ()> {
		Box::pin(self.acquire(size))
	}
}

fn refill_wait(missing: f64, refill_per_sec: f64) -> Duration {
	Duration::try_from_secs_f64(missing / refill_per_sec)
		.map_or(MAX_REFILL_WAIT, |wait| wait.min(MAX_REFILL_WAIT))
}

pub fn from_config(cfg: &Pacing) -> Arc<dyn Pacer> {
	match cfg.mode.as_str() {
		"token_bucket" => Arc::new(TokenBucket::new(cfg.capacity, cfg.refill_per_sec)),
		_ => Arc::new(FixedDelay::new(Duration::from_millis(cfg.batch_delay_ms))),
	}
}
