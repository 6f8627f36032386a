//! Fuzzy lookups into packing-spec records.
//!
//! Case-size sheets are maintained by hand and their column headers drift
//! ("Gross Wt", "Gross Weight (Kg)", "GROSS WT."), so fields are located by
//! case-insensitive substring match against a priority list of fragments.

use super::models::CaseSizeEntry;

/// Returned when no key matches any candidate.
pub const MISSING_MARKER: &str = "-";

pub const PACKING: &[&str] = &["Packing", "Master Ctn"];
pub const GROSS_WEIGHT: &[&str] = &["Gross Wt", "Gross Weight"];
pub const NET_WEIGHT: &[&str] = &["Net Wt", "Net Weight"];
pub const LENGTH: &[&str] = &["Length"];
pub const BREADTH: &[&str] = &["Breadth", "Width"];
pub const HEIGHT: &[&str] = &["Height"];
pub const CARTON_VOLUME: &[&str] = &["CBM"];
pub const DESCRIPTION: &[&str] = &["Description"];
pub const NAME_SUFFIX: &[&str] = &["Suffix"];

/// First value whose key contains one of `candidates`, or `None`.
///
/// Candidates are tried in order; for each candidate the entry's keys are
/// scanned in their own order. The first hit wins.
pub fn find(entry: &CaseSizeEntry, candidates: &[&str]) -> Option<String> {
    for candidate in candidates {
        let needle = candidate.to_lowercase();
        if let Some((_, value)) = entry
            .iter()
            .find(|(label, _)| label.to_lowercase().contains(&needle))
        {
            return Some(value);
        }
    }
    None
}

/// Like [`find`] but yields [`MISSING_MARKER`] when nothing matches.
pub fn resolve(entry: &CaseSizeEntry, candidates: &[&str]) -> String {
    find(entry, candidates).unwrap_or_else(|| MISSING_MARKER.to_string())
}

/// The seven columns shown under a category heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackingSpec {
    pub description: Option<String>,
    pub packing: String,
    pub gross_weight: String,
    pub net_weight: String,
    pub length: String,
    pub breadth: String,
    pub height: String,
    pub carton_volume: String,
}

impl PackingSpec {
    pub fn from_entry(entry: &CaseSizeEntry) -> Self {
        let description = find(entry, DESCRIPTION)
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty() && !is_nan_token(d));

        Self {
            description,
            packing: resolve(entry, PACKING),
            gross_weight: resolve(entry, GROSS_WEIGHT),
            net_weight: resolve(entry, NET_WEIGHT),
            length: resolve(entry, LENGTH),
            breadth: resolve(entry, BREADTH),
            height: resolve(entry, HEIGHT),
            carton_volume: resolve(entry, CARTON_VOLUME),
        }
    }

    pub fn cells(&self) -> [&str; 7] {
        [
            self.packing.as_str(),
            self.gross_weight.as_str(),
            self.net_weight.as_str(),
            self.length.as_str(),
            self.breadth.as_str(),
            self.height.as_str(),
            self.carton_volume.as_str(),
        ]
    }
}

/// Cubic metres per carton, rounded to three places. Unparseable or absent
/// values count as zero.
pub fn carton_volume(entry: Option<&CaseSizeEntry>) -> f64 {
    entry
        .and_then(|e| find(e, CARTON_VOLUME))
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .map(|v| (v * 1000.0).round() / 1000.0)
        .unwrap_or(0.0)
}

/// Carton name appended to product names on the order sheet.
pub fn name_suffix(entry: Option<&CaseSizeEntry>) -> Option<String> {
    entry
        .and_then(|e| find(e, NAME_SUFFIX))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && !is_nan_token(s))
}

/// Spreadsheet exports write empty numeric cells as "nan".
fn is_nan_token(value: &str) -> bool {
    value.eq_ignore_ascii_case("nan")
}
