// src/fetch/window.rs

use futures::future::join_all;
use std::{future::Future, time::Duration};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use super::FetchTask;
use crate::cache::write_atomic_async;

/// Outcome of one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// Files a request was issued for, successful or not.
    pub attempted: usize,
    /// Files whose cache entry was replaced.
    pub written: usize,
}

/// Fetch `tasks` in consecutive windows of at most `max_threads` requests.
///
/// Every request in a window is started before any is awaited, and the next
/// window only starts once the whole current one has resolved or timed out.
/// A successful body replaces the task's own `local_path`; failures and
/// timeouts leave the existing file alone and are only logged.
pub async fn run_windows<F, Fut>(
    tasks: Vec<FetchTask>,
    max_threads: usize,
    limit: Duration,
    fetch: F,
) -> FetchReport
where
    F: Fn(FetchTask) -> Fut,
    Fut: Future<Output = anyhow::Result<Vec<u8>>>,
{
    let width = max_threads.max(1);
    let mut report = FetchReport {
        attempted: tasks.len(),
        written: 0,
    };

    for (n, window) in tasks.chunks(width).enumerate() {
        let start = Instant::now();
        debug!(window = n, size = window.len(), "starting fetch window");

        let requests = window.iter().map(|task| {
            let request = fetch(task.clone());
            async move { settle(task, timeout(limit, request).await).await }
        });
        let written = join_all(requests).await.into_iter().filter(|ok| *ok).count();

        info!(window = n, written, of = window.len(), elapsed = ?start.elapsed(), "fetch window done");
        report.written += written;
    }

    report
}

async fn settle(
    task: &FetchTask,
    outcome: Result<anyhow::Result<Vec<u8>>, tokio::time::error::Elapsed>,
) -> bool {
    let id = &task.source.id;
    match outcome {
        Ok(Ok(body)) => match write_atomic_async(&task.source.local_path, &body).await {
            Ok(()) => {
                debug!(file = %id, bytes = body.len(), "cached");
                true
            }
            Err(e) => {
                warn!(file = %id, path = %task.source.local_path.display(), error = %e, "write failed");
                false
            }
        },
        Ok(Err(e)) => {
            warn!(file = %id, url = %task.source.url, error = %e, "fetch failed, keeping cached copy");
            false
        }
        Err(_) => {
            warn!(file = %id, url = %task.source.url, "fetch timed out, keeping cached copy");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceFile;
    use anyhow::anyhow;
    use std::{
        fs,
        path::Path,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };
    use tempfile::tempdir;
    use url::Url;

    fn tasks(dir: &Path, n: usize) -> Vec<FetchTask> {
        (0..n)
            .map(|i| {
                let id = format!("file{}-od", i);
                FetchTask {
                    source: SourceFile {
                        local_path: dir.join(format!("{}.json", id)),
                        url: Url::parse(&format!("http://example.invalid/{}.json", id)).unwrap(),
                        id,
                    },
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn never_exceeds_max_threads_in_flight() {
        let tmp = tempdir().unwrap();
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let report = run_windows(tasks(tmp.path(), 10), 3, Duration::from_secs(5), |task| {
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(task.source.id.into_bytes())
            }
        })
        .await;

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(report, FetchReport { attempted: 10, written: 10 });
    }

    #[tokio::test]
    async fn windows_do_not_overlap() {
        let tmp = tempdir().unwrap();
        // (task index, started, finished)
        let spans = Arc::new(Mutex::new(Vec::new()));

        run_windows(tasks(tmp.path(), 5), 2, Duration::from_secs(5), |task| {
            let spans = spans.clone();
            async move {
                let idx: usize = task.source.id["file".len()..task.source.id.len() - 3]
                    .parse()
                    .unwrap();
                let started = Instant::now();
                // later tasks finish first inside a window
                tokio::time::sleep(Duration::from_millis(40 - 10 * (idx as u64 % 2))).await;
                spans.lock().unwrap().push((idx, started, Instant::now()));
                Ok::<_, anyhow::Error>(Vec::new())
            }
        })
        .await;

        let spans = spans.lock().unwrap();
        assert_eq!(spans.len(), 5);
        for (idx, started, _) in spans.iter() {
            let window = idx / 2;
            if window == 0 {
                continue;
            }
            let previous_done = spans
                .iter()
                .filter(|(i, _, _)| i / 2 == window - 1)
                .map(|(_, _, finished)| *finished)
                .max()
                .unwrap();
            assert!(*started >= previous_done, "task {} started early", idx);
        }
    }

    #[tokio::test]
    async fn each_body_lands_in_its_own_file() {
        let tmp = tempdir().unwrap();
        let list = tasks(tmp.path(), 4);

        run_windows(list.clone(), 4, Duration::from_secs(5), |task| async move {
            // finish in reverse order of submission
            let idx = task.source.id.as_bytes()[4] - b'0';
            tokio::time::sleep(Duration::from_millis(5 * (4 - idx as u64))).await;
            Ok::<_, anyhow::Error>(task.source.id.into_bytes())
        })
        .await;

        for task in &list {
            let body = fs::read_to_string(&task.source.local_path).unwrap();
            assert_eq!(body, task.source.id);
        }
    }

    #[tokio::test]
    async fn failures_and_timeouts_keep_stale_copy() {
        let tmp = tempdir().unwrap();
        let list = tasks(tmp.path(), 3);
        for task in &list {
            fs::write(&task.source.local_path, "stale").unwrap();
        }

        let report = run_windows(list.clone(), 3, Duration::from_millis(50), |task| async move {
            match task.source.id.as_str() {
                "file0-od" => Ok(b"fresh".to_vec()),
                "file1-od" => Err(anyhow!("503 Service Unavailable")),
                _ => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(b"too late".to_vec())
                }
            }
        })
        .await;

        assert_eq!(report, FetchReport { attempted: 3, written: 1 });
        assert_eq!(fs::read_to_string(&list[0].source.local_path).unwrap(), "fresh");
        assert_eq!(fs::read_to_string(&list[1].source.local_path).unwrap(), "stale");
        assert_eq!(fs::read_to_string(&list[2].source.local_path).unwrap(), "stale");
    }

    #[tokio::test]
    async fn zero_width_is_treated_as_one() {
        let tmp = tempdir().unwrap();
        let peak = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let report = run_windows(tasks(tmp.path(), 3), 0, Duration::from_secs(5), |_| {
            let peak = peak.clone();
            let in_flight = in_flight.clone();
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::task::yield_now().await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(Vec::new())
            }
        })
        .await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(report.attempted, 3);
    }

    #[tokio::test]
    async fn empty_task_list_attempts_nothing() {
        let report = run_windows(Vec::new(), 4, Duration::from_secs(1), |_| async {
            Ok::<_, anyhow::Error>(Vec::new())
        })
        .await;
        assert_eq!(report, FetchReport::default());
    }
}
