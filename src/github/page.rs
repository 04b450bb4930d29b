//! Paging primitives for listing endpoints.

use http::header::LINK;
use http::HeaderMap;

use super::identity::RepositoryIdentity;

/// Largest `per_page` value GitHub accepts.
pub const MAX_PAGE_SIZE: u8 = 100;

/// Number of items requested per page, always within `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(u8);

impl PageSize {
    /// Clamps `size` into the range GitHub accepts.
    #[must_use]
    pub fn new(size: u8) -> Self {
        Self(size.clamp(1, MAX_PAGE_SIZE))
    }

    /// Clamps a wider configured value; anything above the maximum becomes the maximum.
    #[must_use]
    pub fn from_u32(size: u32) -> Self {
        let size = size.clamp(1, u32::from(MAX_PAGE_SIZE));
        Self(u8::try_from(size).unwrap_or(MAX_PAGE_SIZE))
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(MAX_PAGE_SIZE)
    }
}

/// Paginated listing resources of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// `/repos/{owner}/{repo}/issues`, which interleaves pull requests with issues.
    IssuesAndPullRequests,
}

impl Resource {
    pub(crate) fn path(self, identity: &RepositoryIdentity) -> String {
        match self {
            Self::IssuesAndPullRequests => {
                format!("/repos/{}/{}/issues", identity.owner, identity.name)
            }
        }
    }
}

/// Decoded items of one page plus whether another page should be requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// Works out whether another page follows.
///
/// A `Link` header is authoritative when GitHub sends one. Without it, a full
/// page means there may be more. An empty page is always the last.
pub(crate) fn has_more_pages(headers: &HeaderMap, item_count: usize, page_size: PageSize) -> bool {
    if item_count == 0 {
        return false;
    }
    next_link_present(headers).unwrap_or(item_count >= usize::from(page_size.get()))
}

/// `None` when no readable `Link` header exists.
fn next_link_present(headers: &HeaderMap) -> Option<bool> {
    let value = headers.get(LINK)?.to_str().ok()?;
    let has_next = value.split(',').any(|link| {
        link.split(';')
            .skip(1)
            .map(str::trim)
            .any(|param| param == "rel=\"next\"" || param == "rel=next")
    });
    Some(has_next)
}
