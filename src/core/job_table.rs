// src/core/job_table.rs

//! Single-flight bookkeeping for graph resolution.
//!
//! Every command name being resolved has at most one in-flight entry, owned
//! by the parse job doing the work. Other jobs asking for the same name get a
//! channel and block on it until the owner is done; the owner's
//! [`FlightGuard`] wakes all of them and removes the entry in one critical
//! section, whether the resolution succeeded or failed.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use uuid::Uuid;

pub type JobId = Uuid;

/// Returned instead of blocking when the wait would close a loop of jobs
/// waiting on each other.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("waiting for '{key}' would deadlock: its resolver is waiting on this job")]
pub struct WaitCycle {
    pub key: String,
}

#[derive(Debug)]
struct Flight {
    owner: JobId,
    waiters: Vec<Sender<()>>,
}

/// A registered parse job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: JobId,
    pub root: String,
    pub silent: bool,
}

#[derive(Debug, Default)]
struct Inner {
    jobs: HashMap<JobId, JobInfo>,
    flights: HashMap<String, Flight>,
    /// Which key each blocked job is waiting for.
    waiting_on: HashMap<JobId, String>,
}

#[derive(Debug, Default)]
pub struct JobTable {
    inner: Mutex<Inner>,
}

/// Outcome of [`JobTable::claim`].
#[derive(Debug)]
pub enum Claim<'a> {
    /// The caller now owns the key and must resolve it.
    Acquired(FlightGuard<'a>),
    /// The caller already owns the key further up its own resolution path.
    Reentrant,
    /// Another job owns the key. Block on the receiver, then look again.
    Wait(Receiver<()>),
}

/// Releases an in-flight key when dropped.
#[derive(Debug)]
pub struct FlightGuard<'a> {
    table: &'a JobTable,
    key: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.table.release(&self.key);
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_job(&self, root: &str, silent: bool) -> JobId {
        let id = Uuid::new_v4();
        self.lock().jobs.insert(
            id,
            JobInfo {
                id,
                root: root.to_string(),
                silent,
            },
        );
        id
    }

    pub fn remove_job(&self, id: JobId) {
        let mut inner = self.lock();
        inner.jobs.remove(&id);
        inner.waiting_on.remove(&id);
    }

    /// Snapshot of the registered jobs.
    #[cfg(test)]
    pub fn jobs(&self) -> Vec<JobInfo> {
        self.lock().jobs.values().cloned().collect()
    }

    /// True while some job is resolving `key`.
    #[cfg(test)]
    pub fn in_flight(&self, key: &str) -> bool {
        self.lock().flights.contains_key(key)
    }

    pub fn claim(&self, key: &str, job: JobId) -> Result<Claim<'_>, WaitCycle> {
        let mut inner = self.lock();

        let Some(flight) = inner.flights.get(key) else {
            inner.flights.insert(
                key.to_string(),
                Flight {
                    owner: job,
                    waiters: Vec::new(),
                },
            );
            return Ok(Claim::Acquired(FlightGuard {
                table: self,
                key: key.to_string(),
            }));
        };

        if flight.owner == job {
            return Ok(Claim::Reentrant);
        }

        // Follow owner -> key it waits on -> that key's owner ...
        let mut current = flight.owner;
        for _ in 0..=inner.flights.len() {
            if current == job {
                return Err(WaitCycle {
                    key: key.to_string(),
                });
            }
            match inner
                .waiting_on
                .get(&current)
                .and_then(|k| inner.flights.get(k))
            {
                Some(next) => current = next.owner,
                None => break,
            }
        }

        let (tx, rx) = mpsc::channel();
        if let Some(flight) = inner.flights.get_mut(key) {
            flight.waiters.push(tx);
        }
        inner.waiting_on.insert(job, key.to_string());
        Ok(Claim::Wait(rx))
    }

    /// Clears the wait marker once a blocked job wakes up.
    pub fn finish_waiting(&self, job: JobId) {
        self.lock().waiting_on.remove(&job);
    }

    fn release(&self, key: &str) {
        let mut inner = self.lock();
        if let Some(flight) = inner.flights.remove(key) {
            log::trace!("Releasing '{}' to {} waiter(s)", key, flight.waiters.len());
            for waiter in flight.waiters {
                // A waiter that went away does not need waking.
                waiter.send(()).ok();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_first_claim_acquires() {
        let table = JobTable::new();
        let job = table.register_job("a", false);
        let claim = table.claim("a", job).unwrap();
        assert!(matches!(claim, Claim::Acquired(_)));
        assert!(table.in_flight("a"));
        drop(claim);
        assert!(!table.in_flight("a"));
    }

    #[test]
    fn test_same_job_is_reentrant() {
        let table = JobTable::new();
        let job = table.register_job("a", false);
        let _guard = table.claim("a", job).unwrap();
        assert!(matches!(table.claim("a", job).unwrap(), Claim::Reentrant));
    }

    #[test]
    fn test_waiter_released_when_guard_drops() {
        let table = Arc::new(JobTable::new());
        let owner = table.register_job("a", false);
        let waiter = table.register_job("a", false);

        let guard = table.claim("a", owner).unwrap();
        let Claim::Wait(rx) = table.claim("a", waiter).unwrap() else {
            unreachable!("second job must wait");
        };

        let handle = thread::spawn(move || rx.recv_timeout(Duration::from_secs(5)));
        drop(guard);
        assert!(handle.join().unwrap().is_ok());

        table.finish_waiting(waiter);
        assert!(matches!(table.claim("a", waiter).unwrap(), Claim::Acquired(_)));
    }

    #[test]
    fn test_mutual_wait_is_reported() {
        let table = JobTable::new();
        let job1 = table.register_job("a", false);
        let job2 = table.register_job("b", false);

        let _a = table.claim("a", job1).unwrap();
        let _b = table.claim("b", job2).unwrap();

        // job1 blocks on "b"...
        assert!(matches!(table.claim("b", job1).unwrap(), Claim::Wait(_)));
        // ...so job2 must not block on "a".
        let err = table.claim("a", job2).unwrap_err();
        assert_eq!(err.key, "a");
    }

    #[test]
    fn test_remove_job() {
        let table = JobTable::new();
        let job = table.register_job("root", true);
        assert_eq!(table.jobs().len(), 1);
        assert!(table.jobs()[0].silent);
        table.remove_job(job);
        assert!(table.jobs().is_empty());
    }
}
