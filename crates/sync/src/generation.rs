use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Counter identifying the most recent request issued for one logical slot
/// (e.g. "detail of the selected job").
#[derive(Debug, Default)]
pub struct Generation {
    current: u64,
}

/// Token captured when a request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

impl Generation {
    /// Supersede every outstanding ticket and return the new current one.
    pub fn advance(&mut self) -> Ticket {
        self.current = self.current.wrapping_add(1);
        Ticket(self.current)
    }

    pub fn current(&self) -> Ticket {
        Ticket(self.current)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.current == ticket.0
    }
}

/// Result of applying a response that may have been superseded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Outcome<T> {
    Applied(T),
    /// A newer request for the same slot was issued; nothing was mutated.
    Stale,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Self::Applied(value) => Some(value),
            Self::Stale => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Applied(value) => Outcome::Applied(f(value)),
            Self::Stale => Outcome::Stale,
        }
    }
}

impl<T, E> Outcome<Result<T, E>> {
    /// `Applied(Err(e))` becomes `Err(e)`; everything else is `Ok`.
    pub fn transpose(self) -> Result<Outcome<T>, E> {
        match self {
            Self::Applied(Ok(value)) => Ok(Outcome::Applied(value)),
            Self::Applied(Err(err)) => Err(err),
            Self::Stale => Ok(Outcome::Stale),
        }
    }
}

/// Await `fetch`, then run `apply` on the shared state only if `ticket` is
/// still the current ticket of the slot selected by `slot`.
///
/// The ticket comparison and `apply` happen under one lock acquisition, so a
/// concurrent `advance()` lands either before (the result is dropped) or
/// after (the result was already applied).
pub async fn guarded<S, T, R>(
    state: &Mutex<S>,
    slot: impl Fn(&S) -> &Generation,
    ticket: Ticket,
    fetch: impl Future<Output = T>,
    apply: impl FnOnce(&mut S, T) -> R,
) -> Outcome<R> {
    let output = fetch.await;
    let mut guard = lock(state);
    if !slot(&*guard).is_current(ticket) {
        return Outcome::Stale;
    }
    Outcome::Applied(apply(&mut *guard, output))
}

/// Lock a store mutex. A panic while holding the lock leaves plain data
/// behind, so poisoning is ignored.
pub(crate) fn lock<S>(state: &Mutex<S>) -> MutexGuard<'_, S> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
