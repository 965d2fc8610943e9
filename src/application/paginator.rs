//! Cursor-based pagination with fixed request pacing.
//!
//! A [`Paginator`] turns a page-fetch closure into a lazy iterator over
//! items. It issues one fetch per page, sleeps a fixed delay between fetches
//! and stops at the last page, at the item limit, or at the first error.

use std::time::Duration;

use crate::domain::Result;

/// One page returned by a paginated API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next page. `None` or empty means this was the last page.
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    #[must_use]
    pub const fn new(items: Vec<T>, next_cursor: Option<String>) -> Self {
        Self { items, next_cursor }
    }

    /// A final page.
    #[must_use]
    pub const fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }
}

/// Blocks between requests to stay under remote rate limits.
pub trait Pacer {
    fn pause(&mut self, delay: Duration);
}

/// Pacer that sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

impl<P: Pacer + ?Sized> Pacer for &mut P {
    fn pause(&mut self, delay: Duration) {
        (**self).pause(delay);
    }
}

/// Pagination limits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageOptions {
    /// Minimum pause between successive fetches.
    pub delay: Duration,
    /// Stop after this many items.
    pub max_items: Option<usize>,
}

impl PageOptions {
    #[must_use]
    pub const fn new(delay: Duration, max_items: Option<usize>) -> Self {
        Self { delay, max_items }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Next fetch starts at this cursor (`None` for the first page).
    Ready(Option<String>),
    /// The last page has been fetched.
    Exhausted,
    /// Limit reached or fetch failed; nothing more will be produced.
    Done,
}

/// Lazy, finite, non-restartable iterator over paginated items.
///
/// Yields `Ok(item)` in response order. A failed fetch is yielded once as
/// `Err` and ends the sequence; items yielded before it remain valid.
pub struct Paginator<T, F, P> {
    fetch: F,
    pacer: P,
    options: PageOptions,
    buffer: std::vec::IntoIter<T>,
    state: State,
    pages_fetched: usize,
    items_yielded: usize,
}

impl<T, F, P> Paginator<T, F, P>
where
    F: FnMut(Option<&str>) -> Result<Page<T>>,
    P: Pacer,
{
    pub fn new(fetch: F, pacer: P, options: PageOptions) -> Self {
        Self {
            fetch,
            pacer,
            options,
            buffer: Vec::new().into_iter(),
            state: State::Ready(None),
            pages_fetched: 0,
            items_yielded: 0,
        }
    }

    /// Number of fetch calls issued so far.
    #[cfg(test)]
    #[must_use]
    pub const fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    fn limit_reached(&self) -> bool {
        self.options
            .max_items
            .is_some_and(|max| self.items_yielded >= max)
    }

    fn fetch_next(&mut self, cursor: Option<String>) -> Result<()> {
        if self.pages_fetched > 0 {
            self.pacer.pause(self.options.delay);
        }

        self.pages_fetched += 1;
        match (self.fetch)(cursor.as_deref()) {
            Ok(page) => {
                tracing::debug!(
                    page = self.pages_fetched,
                    items = page.items.len(),
                    has_more = page.next_cursor.is_some(),
                    "Fetched page"
                );
                self.state = match page.next_cursor {
                    Some(next) if !next.is_empty() => State::Ready(Some(next)),
                    _ => State::Exhausted,
                };
                self.buffer = page.items.into_iter();
                Ok(())
            }
            Err(e) => {
                self.state = State::Done;
                Err(e)
            }
        }
    }
}

impl<T, F, P> Iterator for Paginator<T, F, P>
where
    F: FnMut(Option<&str>) -> Result<Page<T>>,
    P: Pacer,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state == State::Done || self.limit_reached() {
                self.state = State::Done;
                return None;
            }

            if let Some(item) = self.buffer.next() {
                self.items_yielded += 1;
                return Some(Ok(item));
            }

            let cursor = match std::mem::replace(&mut self.state, State::Done) {
                State::Ready(cursor) => cursor,
                State::Exhausted | State::Done => return None,
            };

            if let Err(e) = self.fetch_next(cursor) {
                return Some(Err(e));
            }
        }
    }
}

/// Drains a paginator, keeping items produced before any failure.
///
/// Returns the collected items and the error that cut enumeration short.
pub fn collect_partial<T, I>(pages: I) -> (Vec<T>, Option<crate::domain::AppError>)
where
    I: Iterator<Item = Result<T>>,
{
    let mut items = Vec::new();
    for item in pages {
        match item {
            Ok(item) => items.push(item),
            Err(e) => return (items, Some(e)),
        }
    }
    (items, None)
}
