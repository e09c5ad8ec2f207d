//! Shared constants and small async helpers.

use logtap::{BufferingConsumer, FollowOptions, RetryPolicy, SentinelConsumer, SentinelSignal};
use std::sync::Arc;
use std::time::Duration;

/// Payload the echo-style fixtures write last. Consumers wrapped with
/// [`buffer_until_done`] swallow it and trip their signal.
pub const LAST_MESSAGE: &str = "echo DONE\n";

/// How long any harness waits for an expected event before failing.
pub const PATIENCE: Duration = Duration::from_secs(5);

/// `echo <word>` line as the echo fixture container prints it.
pub fn echo(word: &str) -> String {
    format!("echo {word}\n")
}

/// A buffering consumer behind a [`LAST_MESSAGE`] sentinel.
pub fn buffer_until_done() -> (
    Arc<BufferingConsumer>,
    Arc<SentinelConsumer<Arc<BufferingConsumer>>>,
    SentinelSignal,
) {
    let buffer = Arc::new(BufferingConsumer::new());
    let (consumer, signal) = SentinelConsumer::new(buffer.clone(), LAST_MESSAGE);
    (buffer, Arc::new(consumer), signal)
}

/// Follow options that reconnect without sleeping.
pub fn fast_reconnect() -> FollowOptions {
    FollowOptions {
        retry: RetryPolicy::immediate(5),
        ..Default::default()
    }
}

/// Poll `cond` until it holds or [`PATIENCE`] runs out.
pub async fn eventually(what: &str, cond: impl Fn() -> bool) {
    tokio::time::timeout(PATIENCE, async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {what}"));
}
