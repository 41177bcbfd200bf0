use semver::Version;

use crate::version::is_at_most;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Skip,
}

/// Everything the gate looks at. `None` means the value could not be
/// resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionSignals {
    /// Upstream version stored by the previous successful run.
    pub previous_stored: Option<Version>,
    /// Version of the current upstream release.
    pub upstream: Option<Version>,
    /// `<upstream>-payload.<local>` for this run.
    pub compound_local: Option<Version>,
    /// Version of this project's latest published release.
    pub previous_compound: Option<Version>,
}

/// Skip only when neither the upstream release nor the local payload has
/// moved past what was last published.
#[must_use]
pub fn decide(signals: &VersionSignals) -> GateDecision {
    let upstream_unchanged = is_at_most(
        signals.upstream.as_ref(),
        signals.previous_stored.as_ref(),
    );
    let local_unchanged = is_at_most(
        signals.compound_local.as_ref(),
        signals.previous_compound.as_ref(),
    );

    if upstream_unchanged && local_unchanged {
        GateDecision::Skip
    } else {
        GateDecision::Proceed
    }
}
