use std::collections::BTreeSet;

/// Strict `d{1,3}(.d{1,3}){3}:d{2,5}` check.
///
/// Octets are not range-checked, so `999.1.1.1:80` passes.
pub fn is_valid_endpoint(candidate: &str) -> bool {
    let Some((host, port)) = candidate.split_once(':') else {
        return false;
    };

    if !(2..=5).contains(&port.len()) || !port.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let octets: Vec<&str> = host.split('.').collect();
    octets.len() == 4
        && octets
            .iter()
            .all(|o| (1..=3).contains(&o.len()) && o.bytes().all(|b| b.is_ascii_digit()))
}

/// Trim each line and keep only well-formed endpoints
pub fn parse_proxy_list(body: &str) -> BTreeSet<String> {
    body.lines()
        .map(str::trim)
        .filter(|line| is_valid_endpoint(line))
        .map(str::to_string)
        .collect()
}
