//! Present/absent handles for optional collaborators.
//!
//! Each collaborator (search engine, embedder, reranker, LLM, cache) is resolved
//! once at startup. Pipeline code branches on the capability instead of
//! re-checking configuration on every call.

use std::fmt;
use std::sync::Arc;

/// A shared, read-only collaborator handle that may be absent.
pub enum Capability<T: ?Sized> {
    Present(Arc<T>),
    Absent,
}

impl<T: ?Sized> Capability<T> {
    pub fn present(handle: Arc<T>) -> Self {
        Capability::Present(handle)
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Capability::Present(_))
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        match self {
            Capability::Present(handle) => Some(handle),
            Capability::Absent => None,
        }
    }
}

impl<T: ?Sized> Clone for Capability<T> {
    fn clone(&self) -> Self {
        match self {
            Capability::Present(handle) => Capability::Present(Arc::clone(handle)),
            Capability::Absent => Capability::Absent,
        }
    }
}

impl<T: ?Sized> Default for Capability<T> {
    fn default() -> Self {
        Capability::Absent
    }
}

impl<T: ?Sized> From<Option<Arc<T>>> for Capability<T> {
    fn from(handle: Option<Arc<T>>) -> Self {
        match handle {
            Some(handle) => Capability::Present(handle),
            None => Capability::Absent,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Present(_) => f.write_str("Present"),
            Capability::Absent => f.write_str("Absent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_option() {
        let present: Capability<str> = Some(Arc::<str>::from("x")).into();
        assert!(present.is_present());
        assert_eq!(present.get().map(|s| &**s), Some("x"));

        let absent: Capability<str> = None.into();
        assert!(!absent.is_present());
        assert!(absent.get().is_none());
    }
}
