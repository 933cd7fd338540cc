use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_NAME_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Unix milliseconds, strictly increasing across calls in this process.
pub fn next_timestamp_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_NAME_MILLIS.load(Ordering::SeqCst);
    loop {
        let next = now.max(last + 1);
        match LAST_NAME_MILLIS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => return next,
            Err(actual) => last = actual,
        }
    }
}

/// `<prefix>-<unix millis>`, e.g. `certimate-1735689600000`
pub fn synthesize_name(prefix: &str) -> String {
    format!("{prefix}-{}", next_timestamp_millis())
}

/// 128 random bits, hex encoded
pub fn new_idempotency_token() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
