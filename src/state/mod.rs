use std::fmt::Display;
use std::future::Future;

// ============================================================================
// State Containers - Shared request lifecycle and pagination
// ============================================================================
//
// Each domain keeps its in-memory view in a plain struct owned by the
// application state. Async operations go through `track`, which mirrors the
// pending / fulfilled / rejected lifecycle: `loading` is set while the call
// is in flight and a failure is captured as a human-readable `error`.
//
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestState {
    pub loading: bool,
    pub error: Option<String>,
}

impl RequestState {
    pub fn pending(&mut self) {
        self.loading = true;
        self.error = None;
    }

    pub fn fulfilled(&mut self) {
        self.loading = false;
    }

    pub fn rejected(&mut self, error: &impl Display) {
        self.loading = false;
        self.error = Some(error.to_string());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}

/// Run an async operation under the request lifecycle
pub async fn track<T, E, F>(state: &mut RequestState, operation: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    state.pending();
    match operation.await {
        Ok(value) => {
            state.fulfilled();
            Ok(value)
        }
        Err(error) => {
            tracing::warn!(error = %error, "Operation rejected");
            state.rejected(&error);
            Err(error)
        }
    }
}

/// Number of pages needed for `len` items (at least one page)
pub fn total_pages(len: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 1;
    }
    len.div_ceil(per_page).max(1)
}

/// Items on a 1-based page; out-of-range pages are empty
pub fn paginate<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    if page == 0 || per_page == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(per_page);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(per_page).min(items.len());
    &items[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_track_captures_rejection() {
        let mut state = RequestState::default();
        let result: Result<(), String> = track(&mut state, async { Err("boom".to_string()) }).await;

        assert!(result.is_err());
        assert!(!state.loading);
        assert_eq!(state.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_track_clears_previous_error() {
        let mut state = RequestState {
            loading: false,
            error: Some("old".to_string()),
        };
        let value = track(&mut state, async { Ok::<_, String>(7) }).await.unwrap();

        assert_eq!(value, 7);
        assert_eq!(state.error, None);
    }

    #[test]
    fn test_pagination() {
        let items: Vec<u32> = (1..=23).collect();
        assert_eq!(total_pages(items.len(), 10), 3);
        assert_eq!(paginate(&items, 1, 10), &items[0..10]);
        assert_eq!(paginate(&items, 3, 10), &[21, 22, 23]);
        assert!(paginate(&items, 4, 10).is_empty());
        assert!(paginate(&items, 0, 10).is_empty());
        assert_eq!(total_pages(0, 10), 1);
    }
}
