//! The dispatcher: hands ready jobs to idle workers until every slice is in.

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Error;
use crate::slices::Job;
use crate::worker::Worker;

const POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct Broker<'a> {
  jobs: Mutex<Vec<Job>>,
  workers: Vec<Mutex<Worker>>,
  config: &'a Config,
}

impl<'a> Broker<'a> {
  pub fn new(jobs: Vec<Job>, workers: Vec<Worker>, config: &'a Config) -> Self {
    Broker {
      jobs: Mutex::new(jobs),
      workers: workers.into_iter().map(Mutex::new).collect(),
      config,
    }
  }

  /// Connects the fleet, then assigns jobs to idle workers until all slices
  /// are complete. Jobs are handed out in creation order; a failed job goes
  /// back to the queue and counts against `job_max_retries`.
  pub fn dispatch(&self) -> anyhow::Result<()> {
    let mut online = 0usize;
    for worker in &self.workers {
      let mut w = worker.lock();
      match w.connect() {
        Ok(()) => {
          debug!("connection to {}@{} -> ok", w.user, w.host);
          online += 1;
        }
        Err(e) => debug!("connection to {}@{} -> failed: {}", w.user, w.host, e),
      }
    }

    if online == 0 {
      return Err(Error::NoWorkersOnline.into());
    }
    info!("starting distributed encode with {} workers", online);

    crossbeam_utils::thread::scope(|s| -> anyhow::Result<()> {
      loop {
        let (done, total) = {
          let jobs = self.jobs.lock();
          (jobs.iter().filter(|j| j.completed).count(), jobs.len())
        };
        info!("completed jobs: {} / {}", done, total);
        if done == total {
          break;
        }

        for worker in &self.workers {
          // A busy worker holds its own lock for the whole job.
          let mut w = match worker.try_lock() {
            Some(w) => w,
            None => continue,
          };
          if !w.connected || !w.free {
            continue;
          }

          let idx = {
            let mut jobs = self.jobs.lock();
            let idx = match jobs.iter().position(|j| !j.taken) {
              Some(idx) => idx,
              None => break,
            };
            if jobs[idx].retries >= self.config.job_max_retries {
              return Err(
                Error::RetriesExhausted {
                  index: jobs[idx].index,
                  retries: jobs[idx].retries,
                }
                .into(),
              );
            }
            jobs[idx].taken = true;
            idx
          };

          debug!("assigning slice {} to {}@{}", idx, w.user, w.host);
          w.free = false;
          drop(w);

          s.spawn(move |_| {
            worker.lock().add_job(&self.jobs, idx);
          });
        }

        // A worker busy with a job holds its lock; if every worker is idle
        // and disconnected, the remaining jobs can never finish.
        let all_dead = self
          .workers
          .iter()
          .all(|w| w.try_lock().map_or(false, |w| !w.connected));
        if all_dead {
          return Err(Error::NoWorkersOnline.into());
        }

        thread::sleep(POLL_INTERVAL);
      }

      Ok(())
    })
    .unwrap()
  }

  /// Fraction of the run each host carried, for the end-of-run accounting.
  pub fn host_shares(&self) -> HashMap<String, f64> {
    let total = self.jobs.lock().len().max(1);

    let mut shares = HashMap::new();
    for worker in &self.workers {
      let w = worker.lock();
      *shares.entry(w.host.clone()).or_insert(0.0) += w.jobs_completed as f64 / total as f64;
    }
    shares
  }

  pub fn into_jobs(self) -> Vec<Job> {
    self.jobs.into_inner()
  }
}
