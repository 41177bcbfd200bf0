use std::cmp::Ordering;

use semver::{BuildMetadata, Version};

/// Normalize a release tag into a semantic version.
///
/// Leading `v`/`=` and surrounding whitespace are ignored, and a prerelease
/// glued to the patch number (`1.2.3beta.1`) is accepted. When the tag still
/// does not parse, the first `major[.minor[.patch]]` run of digits is used
/// instead (`v5.4.23.2` resolves to `5.4.23`). Returns `None` when the tag
/// contains no digits at all.
#[must_use]
pub fn resolve_version(tag: &str) -> Option<Version> {
    let cleaned = clean(tag);
    parse_loose(cleaned).or_else(|| coerce(cleaned))
}

/// Build the published version `<upstream>-payload.<payload>`.
///
/// Build metadata on the upstream version is dropped so that the payload
/// version lands in the prerelease part.
///
/// # Errors
/// Returns an error if the combined string is not a valid semantic version.
pub fn compound_version(upstream: &Version, payload: &Version) -> Result<Version, semver::Error> {
    let upstream = Version {
        build: BuildMetadata::EMPTY,
        ..upstream.clone()
    };
    Version::parse(&format!("{upstream}-payload.{payload}"))
}

/// `candidate <= bound` by semver precedence, prereleases included and build
/// metadata ignored. An unknown operand never compares as "at most".
#[must_use]
pub fn is_at_most(candidate: Option<&Version>, bound: Option<&Version>) -> bool {
    match (candidate, bound) {
        (Some(candidate), Some(bound)) => cmp_precedence(candidate, bound) != Ordering::Greater,
        _ => false,
    }
}

fn cmp_precedence(a: &Version, b: &Version) -> Ordering {
    a.major
        .cmp(&b.major)
        .then(a.minor.cmp(&b.minor))
        .then(a.patch.cmp(&b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

fn clean(tag: &str) -> &str {
    tag.trim().trim_start_matches(['=', 'v', 'V']).trim_start()
}

fn parse_loose(version: &str) -> Option<Version> {
    if let Ok(parsed) = Version::parse(version) {
        return Some(parsed);
    }

    let (core, suffix) = split_semver_core_and_suffix(version);
    if core.split('.').count() != 3
        || !suffix.starts_with(|ch: char| ch.is_ascii_alphabetic())
    {
        return None;
    }

    Version::parse(&format!("{core}-{suffix}")).ok()
}

fn split_semver_core_and_suffix(version: &str) -> (&str, &str) {
    let suffix_idx = version
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(version.len());
    (&version[..suffix_idx], &version[suffix_idx..])
}

fn coerce(version: &str) -> Option<Version> {
    let start = version.find(|ch: char| ch.is_ascii_digit())?;
    let mut rest = &version[start..];
    let mut parts: [Option<u64>; 3] = [None; 3];

    for (index, slot) in parts.iter_mut().enumerate() {
        if index > 0 {
            match rest.strip_prefix('.') {
                Some(after) if after.starts_with(|ch: char| ch.is_ascii_digit()) => rest = after,
                _ => break,
            }
        }
        let len = rest
            .find(|ch: char| !ch.is_ascii_digit())
            .unwrap_or(rest.len());
        *slot = Some(rest[..len].parse::<u64>().ok()?);
        rest = &rest[len..];
    }

    Some(Version::new(
        parts[0]?,
        parts[1].unwrap_or(0),
        parts[2].unwrap_or(0),
    ))
}
