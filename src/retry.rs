//! Ordered fallback across mirrors
//!
//! Both metadata lookup and blob download walk a list of mirrors, stop at the
//! first success, and collect every failure along the way. Failures that are
//! not retryable (local resource problems) stop the walk immediately.

use crate::error::{CacheFsError, MirrorErrors};
use crate::mirror::Mirror;
use tracing::warn;

/// Why a fallback walk ended without a result
#[derive(Debug)]
pub enum Fallback {
    /// A candidate failed in a way another mirror cannot fix
    Aborted(CacheFsError),
    /// Every candidate failed
    Exhausted(MirrorErrors),
}

/// Try `attempt` against each mirror in order until one succeeds
///
/// Returns the value together with the mirror that produced it.
pub fn first_success<'a, T, I, F>(candidates: I, mut attempt: F) -> Result<(T, &'a Mirror), Fallback>
where
    I: IntoIterator<Item = &'a Mirror>,
    F: FnMut(&'a Mirror) -> Result<T, CacheFsError>,
{
    let mut errors = MirrorErrors::new();

    for mirror in candidates {
        match attempt(mirror) {
            Ok(value) => return Ok((value, mirror)),
            Err(e) if e.is_retryable() => {
                warn!("Mirror {} failed: {}", mirror, e);
                errors.push(mirror.to_string(), e);
            }
            Err(e) => return Err(Fallback::Aborted(e)),
        }
    }

    Err(Fallback::Exhausted(errors))
}
