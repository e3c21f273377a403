use std::collections::VecDeque;
use std::future::Future;

use tokio::sync::{Mutex, Notify};

use crate::error::{Error, Result};
use crate::opts::Opts;

use super::Conn;

/// A bounded pool of at most `size` [`Conn`]s sharing identical connection
/// parameters.
///
/// Enforces `held + available <= size` as a hard cap and suspends `get()`
/// when the pool is exhausted, via a checkout mutex paired with a `Notify`
/// used to wake a waiter when `put`/`drain` frees capacity. Because the
/// accounting must be exact the instant a caller observes it (checkout/
/// return liveness checks are genuinely async), this pool exposes
/// `get`/`put` as plain `async fn`s rather than a `Drop`-based guard. A
/// `Drop` impl cannot `.await`, so it cannot run the liveness check before
/// the connection is visibly idle again. See DESIGN.md for the tradeoff
/// against an RAII check-in style.
pub struct Pool {
    opts: Opts,
    size: usize,
    idle: Mutex<VecDeque<Conn>>,
    held: Mutex<usize>,
    checkout: Mutex<()>,
    notify: Notify,
}

impl Pool {
    pub fn new(opts: Opts, size: usize) -> Self {
        Self {
            opts,
            size,
            idle: Mutex::new(VecDeque::with_capacity(size)),
            held: Mutex::new(0),
            checkout: Mutex::new(()),
            notify: Notify::new(),
        }
    }

    /// Check out a connection, suspending if the pool is exhausted
    /// (`held + available == size`).
    pub async fn get(&self) -> Result<Conn> {
        loop {
            let guard = self.checkout.lock().await;

            let popped = self.idle.lock().await.pop_front();
            if let Some(conn) = popped {
                drop(guard);
                let conn = self.ensure_live(conn).await?;
                *self.held.lock().await += 1;
                return Ok(conn);
            }

            let mut held = self.held.lock().await;
            if *held < self.size {
                *held += 1;
                drop(held);
                drop(guard);
                return match Conn::connect_new(self.opts.clone()).await {
                    Ok(conn) => Ok(conn),
                    Err(e) => {
                        *self.held.lock().await -= 1;
                        Err(e)
                    }
                };
            }
            drop(held);

            // Register interest before releasing the checkout lock so a
            // concurrent `put`/`drain` cannot notify between our check and
            // our wait.
            let notified = self.notify.notified();
            drop(guard);
            notified.await;
        }
    }

    /// Return a connection to the pool. Verifies liveness, replacing it
    /// with a freshly connected one if it was closed.
    pub async fn put(&self, conn: Conn) -> Result<()> {
        {
            let held = self.held.lock().await;
            if *held == 0 {
                return Err(Error::client(
                    "returned a connection that was not checked out from this pool",
                ));
            }
        }

        let conn = self.ensure_live(conn).await?;

        let mut idle = self.idle.lock().await;
        if idle.len() >= self.size {
            return Err(Error::client(
                "pool idle queue is full: connection was not checked out from this pool",
            ));
        }
        idle.push_back(conn);
        drop(idle);

        *self.held.lock().await -= 1;
        self.notify.notify_one();
        Ok(())
    }

    async fn ensure_live(&self, mut conn: Conn) -> Result<Conn> {
        if conn.is_closed() {
            tracing::warn!("pooled connection was closed; reconnecting");
            conn = Conn::connect_new(self.opts.clone()).await?;
        }
        Ok(conn)
    }

    /// Run `f` with a checked-out connection, returning it on the way out
    /// whether `f` succeeded or failed.
    pub async fn acquire<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Conn) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut conn = self.get().await?;
        let result = f(&mut conn).await;
        self.put(conn).await?;
        result
    }

    /// Fill the idle queue up to `size - held - available` fresh
    /// connections.
    pub async fn init(&self) -> Result<()> {
        let need = {
            let held = *self.held.lock().await;
            let available = self.idle.lock().await.len();
            self.size.saturating_sub(held + available)
        };
        for _ in 0..need {
            let conn = Conn::connect_new(self.opts.clone()).await?;
            self.idle.lock().await.push_back(conn);
        }
        Ok(())
    }

    /// Close and drop every idle connection. If `wait`, also waits for
    /// checked-out connections to be returned and closes those too.
    /// Best-effort: an individual close failure is logged, not raised.
    pub async fn drain(&self, wait: bool) -> Result<()> {
        loop {
            let next = self.idle.lock().await.pop_front();
            let Some(mut conn) = next else {
                if wait && *self.held.lock().await > 0 {
                    self.notify.notified().await;
                    continue;
                }
                break;
            };
            if let Err(e) = conn.close().await {
                tracing::warn!("error closing drained connection: {e}");
            }
        }
        Ok(())
    }

    pub async fn held(&self) -> usize {
        *self.held.lock().await
    }

    pub async fn available(&self) -> usize {
        self.idle.lock().await.len()
    }

    pub fn locked(&self) -> bool {
        self.checkout.try_lock().is_err()
    }
}
