//! Background render pool
//!
//! Mipmap fill jobs run off the interactive thread on a Rayon pool.
//! When `SEPVIEW_RENDER_THREADS` is set to a value greater than 1, a
//! lazily-initialised dedicated pool of that size is used; otherwise
//! jobs run on the current/global Rayon pool. Pool construction failures
//! degrade to the global pool with a warning rather than failing the
//! render.
//!
//! Completion is signalled by an explicit [`RedrawRequest`] message, not
//! a callback: the UI side holds the channel receiver and re-queries the
//! cache when a request arrives. A request may be stale (the cache can
//! have been invalidated since the job ran); receivers must re-check
//! cache validity rather than trusting the notification.

use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::OnceLock;

const RENDER_THREADS_ENV: &str = "SEPVIEW_RENDER_THREADS";

enum RenderPoolState {
  Dedicated(ThreadPool),
  // Reason the dedicated pool is not in use; jobs go to the global pool.
  Global(String),
}

static RENDER_POOL: OnceLock<RenderPoolState> = OnceLock::new();

fn parse_render_threads_env() -> Result<Option<usize>, String> {
  match std::env::var(RENDER_THREADS_ENV) {
    Ok(raw) => {
      let raw = raw.trim();
      if raw.is_empty() {
        return Err(format!("{RENDER_THREADS_ENV} is set but empty"));
      }
      raw
        .parse::<usize>()
        .map(Some)
        .map_err(|_| format!("{RENDER_THREADS_ENV}={raw:?} is not a valid positive integer"))
    }
    Err(std::env::VarError::NotPresent) => Ok(None),
    Err(err) => Err(format!("failed to read {RENDER_THREADS_ENV}: {err}")),
  }
}

fn render_pool() -> &'static RenderPoolState {
  RENDER_POOL.get_or_init(|| match parse_render_threads_env() {
    Ok(None) => RenderPoolState::Global(format!(
      "dedicated render pool disabled (set {RENDER_THREADS_ENV}>1 to enable)"
    )),
    Ok(Some(threads)) if threads <= 1 => RenderPoolState::Global(format!(
      "dedicated render pool disabled ({RENDER_THREADS_ENV} must be >1, got {threads})"
    )),
    Ok(Some(threads)) => match ThreadPoolBuilder::new().num_threads(threads).build() {
      Ok(pool) => RenderPoolState::Dedicated(pool),
      Err(err) => {
        log::warn!("dedicated render pool unavailable, using global pool: {err}");
        RenderPoolState::Global(err.to_string())
      }
    },
    Err(reason) => {
      log::warn!("dedicated render pool disabled: {reason}");
      RenderPoolState::Global(reason)
    }
  })
}

/// Notification that a background fill finished for the given zoom
///
/// Carries no surface; the receiver re-queries the cache, which may have
/// been invalidated in the meantime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedrawRequest {
  pub zoom: i32,
}

/// Acknowledgement that a job was handed to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTicket {
  pub zoom: i32,
}

/// Submits fill jobs and reports their completion
///
/// Cloneable sender side of a completion channel; the receiver returned
/// by [`RenderQueue::new`] belongs to the presentation-facing thread.
#[derive(Debug, Clone)]
pub struct RenderQueue {
  notify: Sender<RedrawRequest>,
}

impl RenderQueue {
  pub fn new() -> (Self, Receiver<RedrawRequest>) {
    let (notify, redraws) = channel();
    (Self { notify }, redraws)
  }

  /// Runs `job` on the render pool; a [`RedrawRequest`] follows once it
  /// returns. The calling thread never blocks.
  pub fn submit<F>(&self, zoom: i32, job: F) -> JobTicket
  where
    F: FnOnce() + Send + 'static,
  {
    let notify = self.notify.clone();
    let run = move || {
      job();
      // The receiver may be gone during teardown; nothing to redraw then.
      let _ = notify.send(RedrawRequest { zoom });
    };
    match render_pool() {
      RenderPoolState::Dedicated(pool) => pool.spawn(run),
      RenderPoolState::Global(_) => rayon::spawn(run),
    }
    JobTicket { zoom }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[test]
  fn submitted_jobs_run_and_notify() {
    let (queue, redraws) = RenderQueue::new();
    let ticket = queue.submit(-2, || {});
    assert_eq!(ticket.zoom, -2);
    let request = redraws
      .recv_timeout(Duration::from_secs(5))
      .expect("job completion");
    assert_eq!(request, RedrawRequest { zoom: -2 });
  }

  #[test]
  fn notifications_preserve_submission_payload() {
    let (queue, redraws) = RenderQueue::new();
    queue.submit(0, || {});
    queue.submit(-1, || {});
    let mut zooms: Vec<i32> = (0..2)
      .map(|_| redraws.recv_timeout(Duration::from_secs(5)).unwrap().zoom)
      .collect();
    zooms.sort_unstable();
    assert_eq!(zooms, vec![-1, 0]);
  }
}
