//! Small helper for retry-friendly networking.
//! Only transient failures (transport errors, 429, 5xx) are retried.

use std::future::Future;
use std::time::Duration;

use rand::{thread_rng, Rng};

use crate::debug::{self, cat};
use crate::error::ApiError;

pub async fn retry_transient<T, F, Fut>(label: &str, max_retries: u8, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut attempt = 0u8;
    loop {
        match op().await {
            Err(e) if e.is_transient() && attempt < max_retries => {
                attempt += 1;
                let back_ms = backoff_delay_ms(attempt);
                log::warn!("[net] {label} failed: {e} (retry={attempt} backoff={back_ms}ms)");
                debug::log(cat::NET, format!("retry {label} #{attempt} in {back_ms}ms"));
                tokio::time::sleep(Duration::from_millis(back_ms)).await;
            }
            res => return res,
        }
    }
}

fn backoff_delay_ms(attempt: u8) -> u64 {
    let base = 300u64.saturating_mul(1u64 << (attempt.clamp(1, 5) - 1)); // 300,600,1200,2400,4800
    let jitter: u64 = thread_rng().gen_range(0..=250);
    base + jitter
}
