//! Stress tests for sandbox-stream
//!
//! These tests push volume and concurrency through the streaming core and
//! check that nothing is merged, dropped or leaked between runs.

use futures::future::join_all;
use sandbox_stream::config::DEFAULT_MAX_LINE_BYTES;
use sandbox_stream::execution::SinkReceiver;
use sandbox_stream::{CompletionTracker, EventEncoder, ExecutionSpec, ResponseSink};

fn shell(script: &str) -> ExecutionSpec {
    ExecutionSpec::new("sh", vec!["-c".to_string(), script.to_string()]).unwrap()
}

async fn collect(mut receiver: SinkReceiver) -> Vec<String> {
    let mut frames = Vec::new();
    while let Some(frame) = receiver.recv().await {
        frames.push(String::from_utf8(frame.to_vec()).unwrap());
    }
    frames
}

async fn stream(script: &str, capacity: usize) -> Vec<String> {
    let (sink, receiver) = ResponseSink::channel(capacity, EventEncoder::default());
    let frames = actix_web::rt::spawn(collect(receiver));
    let summary = CompletionTracker::default().run(shell(script), sink).await;
    assert!(summary.completed);
    frames.await.unwrap()
}

/// Interleaved channels keep their own order and lose nothing
#[actix_web::test]
async fn stress_interleaved_channels() {
    let frames = stream(
        "i=1; while [ $i -le 3000 ]; do echo o$i; echo e$i >&2; i=$((i+1)); done",
        2,
    )
    .await;

    assert_eq!(frames.len(), 6002);
    assert_eq!(frames.last().unwrap(), "data: DONE\n\n");

    let stdout: Vec<&String> = frames.iter().filter(|f| f.starts_with("data: o")).collect();
    let stderr: Vec<&String> = frames
        .iter()
        .filter(|f| f.starts_with("data: ERR: e"))
        .collect();
    assert_eq!(stdout.len(), 3000);
    assert_eq!(stderr.len(), 3000);

    for (i, frame) in stdout.iter().enumerate() {
        assert_eq!(**frame, format!("data: o{}\n\n", i + 1));
    }
    for (i, frame) in stderr.iter().enumerate() {
        assert_eq!(**frame, format!("data: ERR: e{}\n\n", i + 1));
    }
}

/// A single very long line stays one frame
#[actix_web::test]
async fn stress_long_line() {
    let frames = stream("head -c 262144 /dev/zero | tr '\\0' 'x'; echo", 4).await;

    assert_eq!(frames.len(), 3);
    let payload = frames[1]
        .strip_prefix("data: ")
        .and_then(|f| f.strip_suffix("\n\n"))
        .unwrap();
    assert_eq!(payload.len(), 262_144);
    assert!(payload.bytes().all(|b| b == b'x'));
}

/// Many simultaneous runs each see only their own output
#[actix_web::test]
async fn stress_parallel_runs() {
    let runs = (0..16).map(|n| async move {
        let script = format!(
            "i=1; while [ $i -le 200 ]; do echo run{}-$i; i=$((i+1)); done",
            n
        );
        (n, stream(&script, 8).await)
    });

    for (n, frames) in join_all(runs).await {
        assert_eq!(frames.len(), 202, "run {}", n);
        let own = format!("data: run{}-", n);
        assert!(frames[1..201].iter().all(|f| f.starts_with(&own)), "run {}", n);
    }
}

/// Output that is not UTF-8 still arrives, one frame per line
#[actix_web::test]
async fn stress_binary_output() {
    let frames = stream("printf 'a\\377b\\n\\000\\n'", 4).await;

    assert_eq!(frames.len(), 4);
    assert_eq!(frames[1], "data: a\u{fffd}b\n\n");
    assert_eq!(frames[2], "data: \u{0}\n\n");
}

/// Output with no newline at all is delivered in bounded pieces
#[actix_web::test]
async fn stress_unterminated_output() {
    let frames = stream("head -c 8388608 /dev/zero | tr '\\0' 'x'", 4).await;

    assert_eq!(frames.len(), 2 + 8);
    let piece = format!("data: {}\n\n", "x".repeat(DEFAULT_MAX_LINE_BYTES));
    assert!(frames[1..9].iter().all(|f| *f == piece));
}
