//! Background recomputation with last-request-wins semantics.
//!
//! Every configuration change or new scatter load issues a request with a
//! fresh id. Work runs on the rayon pool; a result is published only if its
//! request is still the latest one, so an older computation finishing late
//! never replaces the grid of a newer request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::cancellation::CancellationToken;
use crate::config::{InterpolationConfig, InterpolationMethod};
use crate::cross_section::{self, CrossSection, CutAxis};
use crate::engine::interpolate_with_cancel;
use crate::errors::SurfaceError;
use crate::grid::Grid;
use crate::scatter::ScatterSet;

pub type RequestId = u64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CoordinatorState
{
    Idle,
    Computing { request: RequestId },
}

/// How the most recently finished authoritative request ended.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome
{
    Succeeded { request: RequestId },
    Failed { request: RequestId, error: SurfaceError },
}

/// Completion signal, sent only for requests that were still authoritative.
#[derive(Clone, Debug)]
pub enum RecomputeEvent
{
    Completed { request: RequestId, grid: Arc<Grid> },
    Failed { request: RequestId, error: SurfaceError },
}

struct Session
{
    scatter: Option<Arc<ScatterSet>>,
    config: InterpolationConfig,
    state: CoordinatorState,
    latest_grid: Option<Arc<Grid>>,
    last_outcome: Option<Outcome>,
}

struct Shared
{
    latest_request: Arc<AtomicU64>,
    session: Mutex<Session>,
    idle: Condvar,
    events: Mutex<Sender<RecomputeEvent>>,
}

impl Shared
{
    fn session(&self) -> MutexGuard<'_, Session>
    {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, request: RequestId, result: Result<Grid, SurfaceError>)
    {
        let mut session = self.session();
        if self.latest_request.load(Ordering::Acquire) != request
        {
            debug!(request, "discarding superseded result");
            return;
        }
        let event = match result
        {
            Ok(grid) =>
            {
                let grid = Arc::new(grid);
                info!(request, rows = grid.shape().0, columns = grid.shape().1, "interpolation finished");
                session.latest_grid = Some(grid.clone());
                session.last_outcome = Some(Outcome::Succeeded { request });
                RecomputeEvent::Completed { request, grid }
            },
            Err(error) =>
            {
                info!(request, %error, "interpolation failed");
                session.last_outcome = Some(Outcome::Failed { request, error: error.clone() });
                RecomputeEvent::Failed { request, error }
            },
        };
        session.state = CoordinatorState::Idle;
        drop(session);
        self.idle.notify_all();
        // a dropped receiver only means nobody listens for completions
        let _ = self.events.lock().unwrap_or_else(PoisonError::into_inner).send(event);
    }
}

///
/// Owns the session inputs (scatter set and configuration) and the most
/// recently completed grid.
///
pub struct RecomputeCoordinator
{
    shared: Arc<Shared>,
}

impl RecomputeCoordinator
{
    /// Create a coordinator and the receiver its completion events are sent to.
    pub fn new(config: InterpolationConfig) -> (Self, Receiver<RecomputeEvent>)
    {
        let (sender, receiver) = channel();
        let session = Session { scatter: None, config, state: CoordinatorState::Idle, latest_grid: None, last_outcome: None };
        let shared = Shared { latest_request: Arc::new(AtomicU64::new(0)), session: Mutex::new(session), idle: Condvar::new(), events: Mutex::new(sender) };
        (Self { shared: Arc::new(shared) }, receiver)
    }

    /// Replace the scatter set and recompute with the current configuration.
    pub fn load(&self, scatter: ScatterSet) -> RequestId
    {
        let config = self.config();
        self.request(Arc::new(scatter), config)
    }

    pub fn set_method(&self, method: InterpolationMethod) -> Option<RequestId>
    {
        let config = self.config().with_method(method);
        self.shared.session().config = config;
        self.recompute()
    }

    pub fn set_resolution(&self, resolution: u32) -> Result<Option<RequestId>, SurfaceError>
    {
        self.set_config(self.config().with_resolution(resolution))
    }

    pub fn set_config(&self, config: InterpolationConfig) -> Result<Option<RequestId>, SurfaceError>
    {
        config.validate()?;
        self.shared.session().config = config;
        Ok(self.recompute())
    }

    /// Recompute the current inputs. `None` when no scatter set is loaded.
    pub fn recompute(&self) -> Option<RequestId>
    {
        let (scatter, config) = {
            let session = self.shared.session();
            (session.scatter.clone()?, session.config)
        };
        Some(self.request(scatter, config))
    }

    ///
    /// Start interpolating `scatter` with `config` in the background. Any
    /// request still in flight is superseded and its result will be dropped.
    ///
    pub fn request(&self, scatter: Arc<ScatterSet>, config: InterpolationConfig) -> RequestId
    {
        let request = {
            let mut session = self.shared.session();
            let request = self.shared.latest_request.fetch_add(1, Ordering::AcqRel) + 1;
            if let CoordinatorState::Computing { request: previous } = session.state
            {
                debug!(previous, request, "superseding in-flight request");
            }
            session.state = CoordinatorState::Computing { request };
            session.scatter = Some(scatter.clone());
            session.config = config;
            request
        };
        info!(request, method = %config.method, resolution = config.resolution, points = scatter.len(), "interpolation requested");

        let token = CancellationToken::for_request(self.shared.latest_request.clone(), request);
        let shared = Arc::clone(&self.shared);
        rayon::spawn(move ||
        {
            let result = interpolate_with_cancel(&scatter, &config, &token);
            shared.publish(request, result);
        });
        request
    }

    pub fn state(&self) -> CoordinatorState
    {
        self.shared.session().state
    }

    pub fn config(&self) -> InterpolationConfig
    {
        self.shared.session().config
    }

    /// Current input, e.g. for drawing the original sample positions.
    pub fn scatter(&self) -> Option<Arc<ScatterSet>>
    {
        self.shared.session().scatter.clone()
    }

    /// Most recently completed grid.
    pub fn latest_grid(&self) -> Option<Arc<Grid>>
    {
        self.shared.session().latest_grid.clone()
    }

    pub fn last_outcome(&self) -> Option<Outcome>
    {
        self.shared.session().last_outcome.clone()
    }

    /// Cross-section of the most recently completed grid. Never starts a computation.
    pub fn cross_section(&self, axis: CutAxis, coordinate: f64) -> Result<CrossSection, SurfaceError>
    {
        let grid = self.latest_grid().ok_or(SurfaceError::NoGrid)?;
        cross_section::extract(&grid, axis, coordinate)
    }

    /// Block until no request is in flight and return how the last one ended.
    pub fn wait_idle(&self) -> Option<Outcome>
    {
        let mut session = self.shared.session();
        while matches!(session.state, CoordinatorState::Computing { .. })
        {
            session = self.shared.idle.wait(session).unwrap_or_else(PoisonError::into_inner);
        }
        session.last_outcome.clone()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::grid::ZValue;

    fn line_set() -> ScatterSet
    {
        ScatterSet::from_triples(&[[0.0, 0.0, 4.0], [1.0, 0.0, 5.0], [2.0, 0.0, 7.0]]).unwrap()
    }

    fn nearest(resolution: u32) -> InterpolationConfig
    {
        InterpolationConfig::new(InterpolationMethod::Nearest, resolution).unwrap()
    }

    #[test]
    fn load_computes_in_background()
    {
        let (coordinator, events) = RecomputeCoordinator::new(nearest(1));
        assert_eq!(coordinator.recompute(), None);
        let request = coordinator.load(line_set());
        assert_eq!(coordinator.wait_idle(), Some(Outcome::Succeeded { request }));
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
        let grid = coordinator.latest_grid().unwrap();
        assert_eq!(grid.x_ticks(), &[0.0, 1.0, 2.0]);
        match events.recv().unwrap()
        {
            RecomputeEvent::Completed { request: r, grid } =>
            {
                assert_eq!(r, request);
                assert_eq!(grid.shape(), (1, 3));
            },
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn last_request_wins()
    {
        let (coordinator, _events) = RecomputeCoordinator::new(nearest(1));
        coordinator.load(line_set());
        for resolution in 2..20
        {
            coordinator.set_resolution(resolution).unwrap();
        }
        let last = coordinator.set_resolution(4).unwrap().unwrap();
        assert_eq!(coordinator.wait_idle(), Some(Outcome::Succeeded { request: last }));
        assert_eq!(coordinator.latest_grid().unwrap().x_ticks().len(), 9);
    }

    #[test]
    fn superseded_result_is_dropped()
    {
        let (coordinator, events) = RecomputeCoordinator::new(nearest(1));
        let first = coordinator.load(line_set());
        coordinator.wait_idle();
        let _ = events.recv();
        let second = coordinator.set_resolution(2).unwrap().unwrap();
        coordinator.wait_idle();
        let _ = events.recv();

        // a late result for the first request must not replace the second grid
        let stale = Grid::new(vec![0.0], vec![0.0], vec![vec![ZValue::Defined(-1.0)]]).unwrap();
        coordinator.shared.publish(first, Ok(stale));
        assert_eq!(coordinator.latest_grid().unwrap().x_ticks().len(), 5);
        assert_eq!(coordinator.last_outcome(), Some(Outcome::Succeeded { request: second }));
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn failure_keeps_previous_grid()
    {
        let (coordinator, _events) = RecomputeCoordinator::new(nearest(1));
        coordinator.load(line_set());
        coordinator.wait_idle();
        // collinear samples cannot be triangulated
        let request = coordinator.set_method(InterpolationMethod::Linear).unwrap();
        assert_eq!(coordinator.wait_idle(), Some(Outcome::Failed { request, error: SurfaceError::DegenerateGeometry }));
        assert_eq!(coordinator.latest_grid().unwrap().shape(), (1, 3));
        assert_eq!(coordinator.config().method, InterpolationMethod::Linear);
    }

    #[test]
    fn oversized_resolution_is_reported_not_fatal()
    {
        let (coordinator, events) = RecomputeCoordinator::new(nearest(1));
        coordinator.load(line_set());
        coordinator.wait_idle();
        let _ = events.recv();
        let request = coordinator.set_resolution(u32::MAX).unwrap().unwrap();
        assert_eq!(coordinator.wait_idle(), Some(Outcome::Failed { request, error: SurfaceError::GridTooLarge }));
        match events.recv().unwrap()
        {
            RecomputeEvent::Failed { request: r, error } =>
            {
                assert_eq!(r, request);
                assert_eq!(error, SurfaceError::GridTooLarge);
            },
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(coordinator.latest_grid().unwrap().shape(), (1, 3));
    }

    #[test]
    fn cross_section_reads_latest_grid()
    {
        let (coordinator, _events) = RecomputeCoordinator::new(nearest(2));
        assert_eq!(coordinator.cross_section(CutAxis::Row, 0.0), Err(SurfaceError::NoGrid));
        coordinator.load(line_set());
        coordinator.wait_idle();
        let cs = coordinator.cross_section(CutAxis::Row, 0.0).unwrap();
        assert_eq!(cs.values(), vec![ZValue::Defined(4.0), ZValue::Defined(4.0), ZValue::Defined(5.0), ZValue::Defined(5.0), ZValue::Defined(7.0)]);
        assert_eq!(coordinator.set_resolution(0), Err(SurfaceError::InvalidResolution));
        assert_eq!(coordinator.state(), CoordinatorState::Idle);
    }
}
