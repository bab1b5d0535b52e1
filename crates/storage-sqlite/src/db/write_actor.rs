use super::DbPool;
use crate::errors::StorageError;
use diesel::SqliteConnection;
use fin_data_lab_core::errors::Result;
use log::debug;
use std::any::Any;
use tokio::sync::{mpsc, oneshot};

// Jobs return a type-erased value so one channel can carry every write.
type Job<T> = Box<dyn FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static>;
type AnyBox = Box<dyn Any + Send + 'static>;
type Request = (Job<AnyBox>, oneshot::Sender<Result<AnyBox>>);

/// Handle for sending jobs to the writer actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<Request>,
}

impl WriteHandle {
    /// Runs `job` on the writer's dedicated connection inside an immediate
    /// transaction and returns its result.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static + Any,
    {
        let (ret_tx, ret_rx) = oneshot::channel();

        self.tx
            .send((
                Box::new(move |c| job(c).map(|v| Box::new(v) as AnyBox)),
                ret_tx,
            ))
            .await
            .map_err(|_| StorageError::WriterStopped("job channel closed".to_string()))?;

        let boxed = ret_rx
            .await
            .map_err(|_| StorageError::WriterStopped("reply dropped".to_string()))??;

        boxed
            .downcast::<T>()
            .map(|value| *value)
            .map_err(|_| StorageError::CoreError("unexpected writer result type".to_string()).into())
    }
}

/// Spawns a background task that owns one pooled connection and applies
/// writes serially.
///
/// The connection is checked out before the task starts so a misconfigured
/// pool surfaces here instead of inside the actor.
pub fn spawn_writer(pool: DbPool) -> Result<WriteHandle> {
    let mut conn = super::get_connection(&pool)?;
    let (tx, mut rx) = mpsc::channel::<Request>(1024);

    tokio::spawn(async move {
        while let Some((job, reply_tx)) = rx.recv().await {
            let result: Result<AnyBox> = conn
                .immediate_transaction::<_, StorageError, _>(|c| job(c).map_err(StorageError::from))
                .map_err(|e: StorageError| e.into());

            // The requester may have given up waiting.
            let _ = reply_tx.send(result);
        }
        debug!("Cache writer stopped");
    });

    Ok(WriteHandle { tx })
}
