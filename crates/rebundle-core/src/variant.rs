use std::fmt;
use std::path::Path;
use std::str::FromStr;

use rebundle_github::Asset;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Platform build of the upstream runtime.
///
/// The tag is matched against upstream asset names and used as the file
/// extension marking variant-specific payload files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    X86,
    X64,
    Unix,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown variant {0:?}, expected one of x86, x64, unix")]
pub struct VariantParseError(pub String);

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::X86, Variant::X64, Variant::Unix];

    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Variant::X86 => "x86",
            Variant::X64 => "x64",
            Variant::Unix => "unix",
        }
    }

    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|variant| variant.tag() == tag)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Variant {
    type Err = VariantParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s).ok_or_else(|| VariantParseError(s.to_string()))
    }
}

/// Which variant archives a payload file belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Common,
    VariantSpecific(Variant),
}

impl FileClass {
    /// Classify a payload file by its extension: `foo.x64` is x64-only,
    /// anything else (including dotless names) is common.
    #[must_use]
    pub fn of(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Variant::from_tag)
            .map_or(FileClass::Common, FileClass::VariantSpecific)
    }

    #[must_use]
    pub fn applies_to(self, variant: Variant) -> bool {
        match self {
            FileClass::Common => true,
            FileClass::VariantSpecific(own) => own == variant,
        }
    }
}

/// Pick the upstream asset for `variant`.
///
/// An asset whose name also contains `marker` wins; otherwise the first asset
/// mentioning the variant tag is used. Matching is case-insensitive.
#[must_use]
pub fn select_asset<'a>(assets: &'a [Asset], variant: Variant, marker: &str) -> Option<&'a Asset> {
    let tag = variant.tag();
    let marker = marker.to_lowercase();
    let matches = |asset: &&Asset, with_marker: bool| {
        let name = asset.name.to_lowercase();
        name.contains(tag) && (!with_marker || name.contains(&marker))
    };

    assets
        .iter()
        .find(|asset| matches(asset, true))
        .or_else(|| assets.iter().find(|asset| matches(asset, false)))
}
