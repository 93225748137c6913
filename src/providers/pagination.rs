//! Drive paginated list calls to completion.

use std::future::Future;

use super::{Page, ProviderError};

/// Fetch every page and concatenate the items in listing order.
///
/// `fetch` receives the page token to request (`None` for the first page).
/// Listing ends when the provider returns no next token or an empty one. A
/// provider that hands back the token it was just given would loop forever,
/// so that is reported as a decode error instead.
pub async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>, ProviderError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>, ProviderError>>,
{
    let mut items = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = fetch(token.clone()).await?;
        items.extend(page.items);

        match page.next_page_token.filter(|next| !next.is_empty()) {
            Some(next) if token.as_deref() == Some(next.as_str()) => {
                return Err(ProviderError::Decode(format!(
                    "pagination did not advance past token {next:?}"
                )));
            }
            Some(next) => token = Some(next),
            None => return Ok(items),
        }
    }
}
