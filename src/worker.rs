//! ブロッキングハンドラー用のワーカープール

use std::sync::Arc;

use log::{debug, error};
use tokio::sync::Semaphore;
use tokio::task;

use crate::error::Error;

/// 同時実行数を制限してブロッキング処理を別スレッドで実行するプール
///
/// クローンは同じ許可数を共有する。
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    max_workers: usize,
}

impl WorkerPool {
    /// 最大同時実行数を指定して作成（0は1として扱う）
    pub fn new(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_workers)),
            max_workers,
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// 現在空いている枠の数
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// 枠が空くのを待ってから `f` を実行する
    pub async fn run<F, T>(&self, f: F) -> Result<T, Error>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| Error::BlockingTaskFailed(e.to_string()))?;
        debug!(
            "Running blocking task ({} of {} workers free)",
            self.permits.available_permits(),
            self.max_workers
        );

        // 呼び出し側が待つのをやめても、枠はスレッドの処理が終わるまで保持する
        // panicはJoinErrorとして検知する
        task::spawn_blocking(move || {
            let _permit = permit;
            f()
        })
        .await
        .map_err(|join_err| {
            if join_err.is_panic() {
                error!("panic occurred in blocking handler");
                Error::BlockingTaskFailed("panic occurred in blocking handler".to_string())
            } else {
                error!("blocking task cancelled: {}", join_err);
                Error::BlockingTaskFailed(format!("task cancelled: {}", join_err))
            }
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_WORKERS)
    }
}
