//! Cursor-following pagination over an abstract page source.
//!
//! Each page response carries an opaque `paging.next` URL; the source is
//! followed until the cursor is absent. Callers must not assume any bound
//! on the page count.

use async_trait::async_trait;
use autoads_core::error::GatewayError;
use autoads_core::types::Page;

/// A paginated listing endpoint. `fetch(None)` returns the first page;
/// `fetch(Some(cursor))` returns the page at the opaque cursor taken from
/// the previous page's `paging.next`.
#[async_trait]
pub trait PageSource<T: Send>: Send + Sync {
    async fn fetch(&self, cursor: Option<&str>) -> Result<Page<T>, GatewayError>;
}

/// Drain a page source to completion, in page order. The sequence is finite
/// (the platform terminates it by omitting the cursor) and not restartable.
pub async fn collect_all<T, S>(source: &S) -> Result<Vec<T>, GatewayError>
where
    T: Send,
    S: PageSource<T> + ?Sized,
{
    let mut items = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = source.fetch(cursor.as_deref()).await?;
        let Page { data, paging } = page;
        items.extend(data);

        match paging.and_then(|p| p.next) {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoads_core::types::Paging;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixtureSource {
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl PageSource<u32> for FixtureSource {
        async fn fetch(&self, cursor: Option<&str>) -> Result<Page<u32>, GatewayError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let page = match cursor {
                None => Page {
                    data: vec![1, 2],
                    paging: Some(Paging {
                        next: Some("page2".into()),
                        cursors: None,
                    }),
                },
                Some("page2") => Page {
                    data: vec![3],
                    paging: Some(Paging {
                        next: Some("page3".into()),
                        cursors: None,
                    }),
                },
                Some("page3") => Page {
                    data: vec![4, 5],
                    paging: None,
                },
                Some(other) => {
                    return Err(GatewayError::transient(format!("unknown cursor {other}")))
                }
            };
            Ok(page)
        }
    }

    #[tokio::test]
    async fn test_three_page_fixture_yields_all_pages_in_order_and_terminates() {
        let source = FixtureSource {
            fetches: AtomicUsize::new(0),
        };
        let items = collect_all(&source).await.unwrap();
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_page_error_propagates() {
        struct Failing;

        #[async_trait]
        impl PageSource<u32> for Failing {
            async fn fetch(&self, _cursor: Option<&str>) -> Result<Page<u32>, GatewayError> {
                Err(GatewayError::transient("boom"))
            }
        }

        assert!(collect_all(&Failing).await.is_err());
    }
}
