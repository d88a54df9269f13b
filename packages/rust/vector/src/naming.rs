//! Deterministic naming for per-site indexes and chunk records.
//!
//! Index names must satisfy the hosted store's rules: lowercase,
//! alphanumeric + hyphens, max 45 chars, alphanumeric at both ends.

use url::Url;

/// Hard cap imposed by the index service.
const MAX_INDEX_NAME_LEN: usize = 45;

/// Derive the unique index name for a site URL.
///
/// The name combines the cleaned domain with an 8-char digest of it, so two
/// domains that clean to the same string still get distinct indexes.
pub fn index_name_for_url(url: &Url) -> String {
    let domain = url.host_str().unwrap_or("").to_lowercase();

    let digest = format!("{:x}", md5::compute(domain.as_bytes()));
    let short_hash = &digest[..8];

    let clean: String = domain
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();
    let clean = clean.trim_matches('-');

    let name = format!("idx-{clean}-{short_hash}");
    let truncated: String = name.chars().take(MAX_INDEX_NAME_LEN).collect();
    truncated.trim_end_matches('-').to_string()
}

/// Record ID for chunk `i` of a page: a 12-char digest of the URL plus the
/// chunk ordinal.
pub fn chunk_record_id(page_url: &str, chunk_index: usize) -> String {
    let digest = format!("{:x}", md5::compute(page_url.as_bytes()));
    format!("{}-{chunk_index}", &digest[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_name_is_stable_per_domain() {
        let a = Url::parse("https://www.acme.com/").unwrap();
        let b = Url::parse("https://www.acme.com/pricing?utm=1").unwrap();
        assert_eq!(index_name_for_url(&a), index_name_for_url(&b));
    }

    #[test]
    fn index_name_ignores_port() {
        let a = Url::parse("https://www.acme.com/").unwrap();
        let b = Url::parse("https://www.acme.com:8443/").unwrap();
        assert_eq!(index_name_for_url(&a), index_name_for_url(&b));
    }

    #[test]
    fn index_name_distinguishes_domains() {
        let a = Url::parse("https://www.acme.com/").unwrap();
        let b = Url::parse("https://www.other.com/").unwrap();
        assert_ne!(index_name_for_url(&a), index_name_for_url(&b));
    }

    #[test]
    fn index_name_is_valid() {
        let url = Url::parse(
            "https://a-very-long-subdomain.department.example-company.co.uk/",
        )
        .unwrap();
        let name = index_name_for_url(&url);

        assert!(name.starts_with("idx-"));
        assert!(name.len() <= 45);
        assert!(!name.ends_with('-'));
        assert!(
            name.chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        );
    }

    #[test]
    fn index_name_cleans_dots() {
        let url = Url::parse("https://www.acme.com/").unwrap();
        let name = index_name_for_url(&url);
        assert!(name.starts_with("idx-www-acme-com-"));
    }

    #[test]
    fn chunk_ids_are_per_url_and_ordinal() {
        let id0 = chunk_record_id("https://www.acme.com/about", 0);
        let id1 = chunk_record_id("https://www.acme.com/about", 1);
        let other = chunk_record_id("https://www.acme.com/pricing", 0);

        assert!(id0.ends_with("-0"));
        assert!(id1.ends_with("-1"));
        assert_eq!(&id0[..12], &id1[..12]);
        assert_ne!(&id0[..12], &other[..12]);
    }
}
