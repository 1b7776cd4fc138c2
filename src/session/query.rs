//! Query parameter rewriting
//!
//! Rewrites named query parameters in place while leaving every other byte of
//! the URL (scheme, host, path, untouched parameters, fragment) as it was.

use url::form_urlencoded;

use crate::Result;

/// Replace or append query parameters, in the order given
///
/// Existing parameters keep their position; missing ones are appended.
/// Values are form-encoded (a space becomes `+`).
pub fn rewrite_query<K: AsRef<str>>(url: &str, updates: &[(K, String)]) -> Result<String> {
    url::Url::parse(url)?;

    let (before_fragment, fragment) = match url.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (url, None),
    };
    let (base, query) = match before_fragment.split_once('?') {
        Some((base, query)) => (base, query),
        None => (before_fragment, ""),
    };

    let mut segments: Vec<String> = query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect();

    for (key, value) in updates {
        let key = encode(key.as_ref());
        let replacement = format!("{}={}", key, encode(value));

        match segments
            .iter()
            .position(|segment| segment.split('=').next() == Some(key.as_str()))
        {
            Some(index) => segments[index] = replacement,
            None => segments.push(replacement),
        }
    }

    let mut rewritten = base.to_string();
    if !segments.is_empty() {
        rewritten.push('?');
        rewritten.push_str(&segments.join("&"));
    }
    if let Some(fragment) = fragment {
        rewritten.push('#');
        rewritten.push_str(fragment);
    }

    Ok(rewritten)
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
