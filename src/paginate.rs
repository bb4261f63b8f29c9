use reqwest::Url;
use serde::Serialize;

/// Query parameter carrying the 1-based page number.
pub const PAGE_PARAM: &str = "page";
/// Accepted in place of a number to request the final page.
pub const LAST_PAGE: &str = "last";

/// The requested page is not an integer >= 1, or lies past the last page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidPage;

impl std::fmt::Display for InvalidPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Invalid page.")
    }
}

impl std::error::Error for InvalidPage {}

/// One page of a borrowed result list.
#[derive(Debug, PartialEq, Eq)]
pub struct Page<'a, T> {
    pub number: usize,
    pub num_pages: usize,
    pub count: usize,
    pub items: &'a [T],
}

/// Wire shape: `{count, next, previous, results}`.
#[derive(Debug, Serialize)]
pub struct PageResponse<'a, T: Serialize> {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: &'a [T],
}

/// Select page `requested` (absent or blank means 1) of `items`.
/// There is always at least one page, even for an empty list.
pub fn paginate<'a, T>(
    items: &'a [T],
    requested: Option<&str>,
    page_size: usize,
) -> Result<Page<'a, T>, InvalidPage> {
    let page_size = page_size.max(1);
    let count = items.len();
    let num_pages = count.div_ceil(page_size).max(1);

    let number = match requested.map(str::trim) {
        None | Some("") => 1,
        Some(LAST_PAGE) => num_pages,
        Some(raw) => raw.parse::<usize>().map_err(|_| InvalidPage)?,
    };
    if number == 0 || number > num_pages {
        return Err(InvalidPage);
    }

    let start = (number - 1) * page_size;
    let end = (start + page_size).min(count);
    Ok(Page {
        number,
        num_pages,
        count,
        items: &items[start..end],
    })
}

impl<'a, T> Page<'a, T> {
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    /// Absolute URL of the next page, derived from the request URL.
    #[must_use]
    pub fn next_link(&self, request: &Url) -> Option<String> {
        self.has_next()
            .then(|| with_page(request, Some(self.number + 1)))
    }

    /// Absolute URL of the previous page. Page 1 is addressed without a
    /// page parameter.
    #[must_use]
    pub fn previous_link(&self, request: &Url) -> Option<String> {
        if !self.has_previous() {
            return None;
        }
        let target = self.number - 1;
        Some(with_page(request, (target > 1).then_some(target)))
    }

    #[must_use]
    pub fn to_response(&self, request: &Url) -> PageResponse<'a, T>
    where
        T: Serialize,
    {
        PageResponse {
            count: self.count,
            next: self.next_link(request),
            previous: self.previous_link(request),
            results: self.items,
        }
    }
}

/// Rewrite the page parameter of `request`, keeping every other parameter.
/// Parameters are emitted sorted by key.
fn with_page(request: &Url, page: Option<usize>) -> String {
    let mut pairs: Vec<(String, String)> = request
        .query_pairs()
        .filter(|(k, _)| k != PAGE_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if let Some(n) = page {
        pairs.push((PAGE_PARAM.to_string(), n.to_string()));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    let mut url = request.clone();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn first_page_by_default() {
        let items: Vec<u32> = (0..25).collect();
        let page = paginate(&items, None, 10).unwrap();
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 3);
        assert_eq!(page.count, 25);
        assert_eq!(page.items, &items[0..10]);

        let blank = paginate(&items, Some(""), 10).unwrap();
        assert_eq!(blank.number, 1);
    }

    #[test]
    fn last_page_is_short() {
        let items: Vec<u32> = (0..25).collect();
        let page = paginate(&items, Some("3"), 10).unwrap();
        assert_eq!(page.items, &items[20..25]);
        assert!(!page.has_next());
        assert!(page.has_previous());

        let last = paginate(&items, Some("last"), 10).unwrap();
        assert_eq!(last.number, 3);
    }

    #[test]
    fn out_of_range_and_garbage_pages_are_invalid() {
        let items: Vec<u32> = (0..25).collect();
        assert_eq!(paginate(&items, Some("0"), 10), Err(InvalidPage));
        assert_eq!(paginate(&items, Some("4"), 10), Err(InvalidPage));
        assert_eq!(paginate(&items, Some("-1"), 10), Err(InvalidPage));
        assert_eq!(paginate(&items, Some("two"), 10), Err(InvalidPage));
        assert_eq!(InvalidPage.to_string(), "Invalid page.");
    }

    #[test]
    fn empty_list_has_one_empty_page() {
        let items: Vec<u32> = Vec::new();
        let page = paginate(&items, None, 10).unwrap();
        assert_eq!(page.num_pages, 1);
        assert!(page.items.is_empty());
    }

    #[test]
    fn links_keep_other_params_and_rewrite_page() {
        let items: Vec<u32> = (0..25).collect();
        let request = url("http://testserver/search/?pattern=AATCGA&page=2");
        let page = paginate(&items, Some("2"), 10).unwrap();
        assert_eq!(
            page.next_link(&request).as_deref(),
            Some("http://testserver/search/?page=3&pattern=AATCGA")
        );
        assert_eq!(
            page.previous_link(&request).as_deref(),
            Some("http://testserver/search/?pattern=AATCGA")
        );
    }

    #[test]
    fn previous_from_page_three_points_at_page_two() {
        let items: Vec<u32> = (0..25).collect();
        let request = url("http://testserver/search/?page=3&pattern=A");
        let page = paginate(&items, Some("3"), 10).unwrap();
        assert_eq!(page.next_link(&request), None);
        assert_eq!(
            page.previous_link(&request).as_deref(),
            Some("http://testserver/search/?page=2&pattern=A")
        );
    }

    #[test]
    fn single_page_has_no_links() {
        let items = [1, 2, 3];
        let request = url("http://testserver/search/?pattern=A");
        let response = paginate(&items, None, 10).unwrap().to_response(&request);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"count": 3, "next": null, "previous": null, "results": [1, 2, 3]})
        );
    }
}
