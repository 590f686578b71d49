//! Endpoint deduplication.

use openid_rp_sdk::CandidateEndpoint;

/// Keep one endpoint per provider host, first occurrence wins.
///
/// Hosts compare ASCII case-insensitively, so endpoints that differ only by
/// scheme, port or path collapse into the first one. Two distinct providers
/// on shared hosting collapse as well. Endpoints without a host are kept.
#[must_use]
pub fn remove_duplicate_endpoints(candidates: Vec<CandidateEndpoint>) -> Vec<CandidateEndpoint> {
    let mut seen: Vec<String> = Vec::with_capacity(candidates.len());
    candidates
        .into_iter()
        .filter(|candidate| match candidate.provider_uri.host_str() {
            Some(host) => {
                let host = host.to_ascii_lowercase();
                if seen.contains(&host) {
                    false
                } else {
                    seen.push(host);
                    true
                }
            }
            None => true,
        })
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use url::Url;

    use super::*;

    fn ep(uri: &str) -> CandidateEndpoint {
        CandidateEndpoint::new(Url::parse(uri).unwrap(), "https://alice.example.org/")
    }

    fn uris(list: &[CandidateEndpoint]) -> Vec<&str> {
        list.iter().map(|e| e.provider_uri.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(remove_duplicate_endpoints(Vec::new()).is_empty());
    }

    #[test]
    fn same_host_in_any_case_keeps_first_only() {
        let out = remove_duplicate_endpoints(vec![
            ep("https://OP.example.com/server"),
            ep("http://op.EXAMPLE.com/other/path"),
            ep("https://op.example.com:8443/"),
        ]);
        assert_eq!(uris(&out), vec!["https://op.example.com/server"]);
    }

    #[test]
    fn distinct_hosts_preserve_input_order() {
        let out = remove_duplicate_endpoints(vec![
            ep("https://b.example.com/"),
            ep("https://a.example.com/"),
            ep("https://b.example.com/again"),
            ep("https://c.example.com/"),
        ]);
        assert_eq!(
            uris(&out),
            vec![
                "https://b.example.com/",
                "https://a.example.com/",
                "https://c.example.com/"
            ]
        );
    }

    #[test]
    fn hostless_endpoints_are_never_collapsed() {
        let out = remove_duplicate_endpoints(vec![ep("urn:op:one"), ep("urn:op:one")]);
        assert_eq!(out.len(), 2);
    }
}
