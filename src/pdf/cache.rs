//! Rendered pages kept by the render worker

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use log::trace;

use super::types::RenderedPage;

/// Page plus scale, the scale rounded to thousandths.
///
/// Fit-width scales come out of float division, so two requests for the
/// "same" scale can differ in the last bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub page: usize,
    scale_milli: u32,
}

impl CacheKey {
    #[must_use]
    pub fn new(page: usize, scale: f32) -> Self {
        Self {
            page,
            scale_milli: (scale.max(0.0) * 1000.0).round() as u32,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// LRU of rendered pages. Owned by a single worker thread.
pub struct PageCache {
    pages: LruCache<CacheKey, Arc<RenderedPage>>,
    stats: CacheStats,
}

impl PageCache {
    /// A capacity of zero still keeps the last page.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pages: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            stats: CacheStats::default(),
        }
    }

    /// Return the cached rendering of `page` at `scale`, or run `render`
    /// and keep its result. Failed renders are not cached.
    pub fn get_or_render<E>(
        &mut self,
        page: usize,
        scale: f32,
        render: impl FnOnce() -> Result<RenderedPage, E>,
    ) -> Result<Arc<RenderedPage>, E> {
        let key = CacheKey::new(page, scale);
        if let Some(hit) = self.pages.get(&key) {
            self.stats.hits += 1;
            trace!("Page {page} at {scale} served from cache");
            return Ok(hit.clone());
        }

        self.stats.misses += 1;
        let rendered = Arc::new(render()?);
        self.pages.put(key, rendered.clone());
        Ok(rendered)
    }

    #[must_use]
    pub fn contains(&self, page: usize, scale: f32) -> bool {
        self.pages.contains(&CacheKey::new(page, scale))
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::types::PageBitmap;

    fn page(n: usize, scale: f32) -> Result<RenderedPage, String> {
        Ok(RenderedPage {
            page: n,
            scale,
            bitmap: PageBitmap::blank(4, 4),
            text_items: vec![],
        })
    }

    #[test]
    fn second_request_is_a_hit() {
        let mut cache = PageCache::new(4);
        let first = cache.get_or_render(1, 1.5, || page(1, 1.5)).unwrap();
        let second = cache
            .get_or_render(1, 1.5, || -> Result<RenderedPage, String> {
                panic!("rendered twice")
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn nearly_equal_scales_share_an_entry() {
        let mut cache = PageCache::new(4);
        cache.get_or_render(2, 1.5 + 1e-5, || page(2, 1.5)).unwrap();
        assert!(cache.contains(2, 1.5));
        assert!(!cache.contains(2, 1.6));
    }

    #[test]
    fn failures_are_not_cached() {
        let mut cache = PageCache::new(4);
        let err = cache.get_or_render(1, 1.0, || Err("boom".to_string()));
        assert_eq!(err.unwrap_err(), "boom");
        assert!(cache.is_empty());

        cache.get_or_render(1, 1.0, || page(1, 1.0)).unwrap();
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn least_recently_used_page_is_evicted() {
        let mut cache = PageCache::new(2);
        for n in 1..=2 {
            cache.get_or_render(n, 1.0, || page(n, 1.0)).unwrap();
        }
        // Touch page 1 so page 2 is the oldest
        cache.get_or_render(1, 1.0, || page(1, 1.0)).unwrap();
        cache.get_or_render(3, 1.0, || page(3, 1.0)).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(1, 1.0));
        assert!(!cache.contains(2, 1.0));
    }

    #[test]
    fn zero_capacity_keeps_the_last_page() {
        let mut cache = PageCache::new(0);
        cache.get_or_render(1, 1.0, || page(1, 1.0)).unwrap();
        cache.get_or_render(2, 1.0, || page(2, 1.0)).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(2, 1.0));
    }
}
