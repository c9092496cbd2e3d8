//! Render scheduler
//!
//! Serializes page renders against the single drawing surface. At most one
//! job is in flight and at most one is pending; a newer request replaces the
//! pending one, so a burst of page turns renders the current page and then
//! only the latest requested one.

use log::debug;

use super::request::{RenderJob, RequestId};

#[derive(Debug, Default)]
pub struct RenderScheduler {
    in_flight: Option<RenderJob>,
    pending: Option<RenderJob>,
}

impl RenderScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Submit a job. Returns it back if it should be dispatched right away.
    #[must_use]
    pub fn request(&mut self, job: RenderJob) -> Option<RenderJob> {
        if self.in_flight.is_none() {
            self.in_flight = Some(job.clone());
            return Some(job);
        }

        if let Some(dropped) = self.pending.replace(job) {
            debug!(
                "Dropping superseded render of page {} (request {:?})",
                dropped.page, dropped.id
            );
        }
        None
    }

    /// Mark the in-flight job finished, successful or not.
    ///
    /// Returns the pending job, now in flight, if one was waiting.
    #[must_use]
    pub fn complete(&mut self, id: RequestId) -> Option<RenderJob> {
        match &self.in_flight {
            Some(job) if job.id == id => {}
            _ => {
                debug!("Ignoring completion of unknown render request {id:?}");
                return None;
            }
        }

        self.in_flight = None;
        let next = self.pending.take()?;
        self.in_flight = Some(next.clone());
        Some(next)
    }

    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.in_flight.is_some()
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<&RenderJob> {
        self.in_flight.as_ref()
    }

    #[must_use]
    pub fn pending(&self) -> Option<&RenderJob> {
        self.pending.as_ref()
    }

    /// Forget everything, e.g. when the session ends
    pub fn reset(&mut self) {
        self.in_flight = None;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::request::RenderKind;

    fn job(id: u64, page: usize) -> RenderJob {
        RenderJob {
            id: RequestId::new(id),
            page,
            scale: 1.0,
            highlight: None,
            kind: RenderKind::Page,
        }
    }

    #[test]
    fn idle_scheduler_dispatches_immediately() {
        let mut scheduler = RenderScheduler::new();
        let dispatched = scheduler.request(job(1, 1));
        assert_eq!(dispatched.map(|j| j.page), Some(1));
        assert!(scheduler.is_rendering());
        assert!(scheduler.pending().is_none());
    }

    #[test]
    fn burst_of_requests_renders_first_and_last_only() {
        let mut scheduler = RenderScheduler::new();
        let mut rendered = Vec::new();

        if let Some(j) = scheduler.request(job(1, 1)) {
            rendered.push(j.page);
        }
        assert!(scheduler.request(job(2, 2)).is_none());
        assert!(scheduler.request(job(3, 3)).is_none());
        assert_eq!(scheduler.pending().map(|j| j.page), Some(3));

        let next = scheduler.complete(RequestId::new(1));
        rendered.extend(next.iter().map(|j| j.page));
        assert!(scheduler.complete(RequestId::new(3)).is_none());

        assert_eq!(rendered, vec![1, 3]);
        assert!(!scheduler.is_rendering());
    }

    #[test]
    fn pending_is_cleared_before_it_is_dispatched() {
        let mut scheduler = RenderScheduler::new();
        let _ = scheduler.request(job(1, 1));
        let _ = scheduler.request(job(2, 5));

        let next = scheduler.complete(RequestId::new(1));
        assert_eq!(next.map(|j| j.page), Some(5));
        assert!(scheduler.pending().is_none());
        assert_eq!(scheduler.in_flight().map(|j| j.page), Some(5));
    }

    #[test]
    fn unknown_completion_is_ignored() {
        let mut scheduler = RenderScheduler::new();
        let _ = scheduler.request(job(1, 1));
        let _ = scheduler.request(job(2, 2));

        assert!(scheduler.complete(RequestId::new(42)).is_none());
        assert_eq!(scheduler.in_flight().map(|j| j.page), Some(1));
        assert_eq!(scheduler.pending().map(|j| j.page), Some(2));
    }

    #[test]
    fn reset_goes_idle() {
        let mut scheduler = RenderScheduler::new();
        let _ = scheduler.request(job(1, 1));
        let _ = scheduler.request(job(2, 2));
        scheduler.reset();
        assert!(!scheduler.is_rendering());
        assert!(scheduler.pending().is_none());
    }
}
