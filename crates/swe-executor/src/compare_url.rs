//! Compare-link composition with prefilled PR title and body.

/// `{base}/{repo}/compare/{base_branch}...{head}?expand=1&title=...&body=Fixes%20%23N`
pub fn compose_compare_url(
    platform_base_url: &str,
    repo: &str,
    base_branch: &str,
    head_branch: &str,
    title: &str,
    issue_number: u64,
) -> String {
    let base = platform_base_url.trim_end_matches('/');
    let body = format!("Fixes #{issue_number}");
    format!(
        "{base}/{repo}/compare/{base_branch}...{head}?expand=1&title={title}&body={body}",
        head = head_branch,
        title = percent_encode_query(title),
        body = percent_encode_query(&body),
    )
}

/// Link to a single commit, used on the append path instead of a compare URL.
pub fn compose_commit_url(platform_base_url: &str, repo: &str, sha: &str) -> String {
    format!(
        "{}/{repo}/commit/{sha}",
        platform_base_url.trim_end_matches('/')
    )
}

/// Query-component percent encoding; everything outside the unreserved set
/// is escaped.
fn percent_encode_query(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }
    encoded
}
