//! Identifier sanitization
//!
//! Compose project names and workspace directory names must be made of
//! lowercase alphanumerics and separators only. Branch names and commit
//! hashes reach the git command line, so they are checked before use.

/// Lowercases `name`, collapses every run of non-alphanumeric characters into
/// a single `-` and trims leading and trailing separators.
pub fn project_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }

    slug
}

/// Abbreviated or full hex object name (7 to 40 characters)
pub fn is_commit_hash(commit: &str) -> bool {
    (7..=40).contains(&commit.len()) && commit.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Branch name accepted by `git check-ref-format --branch`
///
/// Names starting with `-` are refused as well so they can never be read as
/// a git option.
pub fn is_branch_name(branch: &str) -> bool {
    if branch.is_empty()
        || branch == "@"
        || branch.starts_with('-')
        || branch.starts_with('/')
        || branch.ends_with('/')
        || branch.ends_with('.')
        || branch.contains("..")
        || branch.contains("//")
        || branch.contains("@{")
    {
        return false;
    }

    let forbidden = |c: char| {
        c.is_ascii_control() || matches!(c, ' ' | '~' | '^' | ':' | '?' | '*' | '[' | '\\')
    };
    if branch.chars().any(forbidden) {
        return false;
    }

    branch
        .split('/')
        .all(|component| !component.starts_with('.') && !component.ends_with(".lock"))
}
