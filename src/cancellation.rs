use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::errors::SurfaceError;

///
/// Cooperative cancellation for one interpolation request.
///
/// The token remembers the id of the request it was issued for and shares the
/// coordinator's "latest request" counter. Once a newer request is issued the
/// token reports itself cancelled; computations poll it at coarse checkpoints.
///
#[derive(Clone, Debug)]
pub struct CancellationToken
{
    latest: Arc<AtomicU64>,
    request: u64,
}

impl CancellationToken
{
    /// A token that is never cancelled, for one-off synchronous calls.
    pub fn never() -> Self
    {
        Self { latest: Arc::new(AtomicU64::new(0)), request: 0 }
    }

    pub(crate) fn for_request(latest: Arc<AtomicU64>, request: u64) -> Self
    {
        Self { latest, request }
    }

    pub fn request(&self) -> u64
    {
        self.request
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool
    {
        self.latest.load(Ordering::Acquire) != self.request
    }

    #[inline]
    pub fn checkpoint(&self) -> Result<(), SurfaceError>
    {
        if self.is_cancelled()
        {
            Err(SurfaceError::Cancelled)
        }
        else
        {
            Ok(())
        }
    }
}

impl Default for CancellationToken
{
    fn default() -> Self {
        Self::never()
    }
}

#[test]
fn token_trips_when_a_newer_request_exists()
{
    let latest = Arc::new(AtomicU64::new(1));
    let token = CancellationToken::for_request(latest.clone(), 1);
    assert!(token.checkpoint().is_ok());
    latest.store(2, Ordering::Release);
    assert_eq!(token.checkpoint(), Err(SurfaceError::Cancelled));
    assert!(!CancellationToken::never().is_cancelled());
}
