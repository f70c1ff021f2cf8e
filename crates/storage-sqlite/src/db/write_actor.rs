//! Single writer for the database.
//!
//! Every mutation is shipped to one dedicated thread and executed inside an
//! immediate transaction, so writes never interleave and readers on the pool
//! only ever observe committed batches.

use std::any::Any;
use std::sync::mpsc;
use std::thread;

use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use log::{debug, error};
use tokio::sync::oneshot;

use clientsync_core::errors::{DatabaseError, Error, Result};

use super::get_connection;

type Erased = Box<dyn Any + Send>;
type Job = Box<dyn FnOnce(&mut SqliteConnection) -> Result<Erased> + Send>;

struct WriteRequest {
    job: Job,
    reply: oneshot::Sender<Result<Erased>>,
}

/// Transaction error: either the job's own error or a failure of the
/// transaction machinery itself (BEGIN/COMMIT).
#[derive(Debug)]
enum TxError {
    Job(Error),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Diesel(err)
    }
}

impl From<TxError> for Error {
    fn from(err: TxError) -> Self {
        match err {
            TxError::Job(e) => e,
            TxError::Diesel(e) => Error::persistence(e.to_string()),
        }
    }
}

/// Cloneable handle to the writer thread.
#[derive(Clone, Debug)]
pub struct WriteHandle {
    tx: mpsc::Sender<WriteRequest>,
}

impl WriteHandle {
    /// Runs `job` on the writer thread inside one immediate transaction.
    /// Any error rolls the whole job back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let job: Job = Box::new(move |conn| job(conn).map(|value| Box::new(value) as Erased));

        self.tx
            .send(WriteRequest { job, reply })
            .map_err(|_| writer_stopped())?;

        let erased = rx.await.map_err(|_| writer_stopped())??;
        erased.downcast::<T>().map(|value| *value).map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "Writer returned an unexpected result type".to_string(),
            ))
        })
    }
}

fn writer_stopped() -> Error {
    Error::Database(DatabaseError::Internal(
        "Database writer is not running".to_string(),
    ))
}

/// Starts the writer thread. It exits once every handle has been dropped.
pub fn spawn_writer(pool: Pool<ConnectionManager<SqliteConnection>>) -> WriteHandle {
    let (tx, rx) = mpsc::channel::<WriteRequest>();

    thread::Builder::new()
        .name("clientsync-db-writer".to_string())
        .spawn(move || {
            debug!("[LocalStore] Writer started");
            for request in rx {
                let result = run_job(&pool, request.job);
                if request.reply.send(result).is_err() {
                    debug!("[LocalStore] Write caller went away before the result was ready");
                }
            }
            debug!("[LocalStore] Writer stopped");
        })
        .map_err(|e| error!("[LocalStore] Failed to start writer thread: {}", e))
        .ok();

    WriteHandle { tx }
}

fn run_job(pool: &Pool<ConnectionManager<SqliteConnection>>, job: Job) -> Result<Erased> {
    let mut conn = get_connection(pool)?;
    conn.immediate_transaction::<_, TxError, _>(|tx| job(tx).map_err(TxError::Job))
        .map_err(Error::from)
}
