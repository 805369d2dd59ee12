/// Fallback when neither a site URL nor a repository is known.
pub const LOCAL_BASE_URL: &str = "http://localhost/";

/// Pick the channel link for published feeds.
///
/// 1. `site_url`, when non-blank, trimmed and ending in exactly one `/`
/// 2. `owner/name` repository → `https://owner.github.io/name/`
/// 3. [`LOCAL_BASE_URL`]
///
/// # Examples
///
/// ```
/// use driftfeed::publish::resolve_base_url;
///
/// assert_eq!(resolve_base_url(Some(" https://x.dev/a// "), None), "https://x.dev/a/");
/// assert_eq!(resolve_base_url(None, Some("me/watch")), "https://me.github.io/watch/");
/// assert_eq!(resolve_base_url(None, None), "http://localhost/");
/// ```
pub fn resolve_base_url(site_url: Option<&str>, repository: Option<&str>) -> String {
    if let Some(site) = site_url.map(str::trim).filter(|s| !s.is_empty()) {
        return format!("{}/", site.trim_end_matches('/'));
    }

    if let Some((owner, name)) = repository.and_then(|r| r.trim().split_once('/')) {
        if !owner.is_empty() && !name.is_empty() {
            return format!("https://{owner}.github.io/{name}/");
        }
    }

    LOCAL_BASE_URL.to_string()
}

/// [`resolve_base_url`] fed from `SITE_URL` and `GITHUB_REPOSITORY`.
pub fn base_url_from_env() -> String {
    let site = std::env::var("SITE_URL").ok();
    let repository = std::env::var("GITHUB_REPOSITORY").ok();
    resolve_base_url(site.as_deref(), repository.as_deref())
}
