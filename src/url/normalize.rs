use url::Url;

/// Query parameters that never change which listing a URL points at
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
];

/// Normalizes a listing URL into its identity form
///
/// # Normalization Steps
///
/// 1. Remove fragment (everything after #)
/// 2. Remove tracking query parameters
/// 3. Remove empty query string (trailing ?)
///
/// Host case is already folded by the `url` crate. The path, including any
/// trailing slash, is kept as the marketplace prints it: the url is the
/// listing's identity key and must match what earlier sessions stored.
///
/// # Examples
///
/// ```
/// use listing_tracker::url::normalize_listing_url;
/// use url::Url;
///
/// let url = Url::parse("https://WWW.pinkbike.com/buysell/3000001/?utm_source=x#photos").unwrap();
/// assert_eq!(normalize_listing_url(url), "https://www.pinkbike.com/buysell/3000001/");
/// ```
pub fn normalize_listing_url(mut url: Url) -> String {
    url.set_fragment(None);

    if url.query().is_some() {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    url.to_string()
}
