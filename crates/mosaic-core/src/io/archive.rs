use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::ARCHIVE_BASE_URL;
use crate::error::{MosaicError, Result};
use crate::stamp::Mission;

/// Long (30 min) or short (1 min) cadence target pixel products.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CadenceMode {
    #[default]
    Long,
    Short,
}

impl CadenceMode {
    fn file_suffix(self) -> &'static str {
        match self {
            Self::Long => "_lpd-targ.fits.gz",
            Self::Short => "_spd-targ.fits.gz",
        }
    }

    fn target_type(self) -> &'static str {
        match self {
            Self::Long => "LC",
            Self::Short => "SC",
        }
    }
}

impl fmt::Display for CadenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "Long Cadence"),
            Self::Short => write!(f, "Short Cadence"),
        }
    }
}

/// Parse a campaign or quarter such as `C4`, `Q4` or a bare `4` (K2).
pub fn parse_period(s: &str) -> Result<(Mission, u32)> {
    let s = s.trim();
    let (mission, digits) = match s.chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('c') => (Mission::K2, &s[1..]),
        Some('q') => (Mission::Kepler, &s[1..]),
        _ => (Mission::K2, s),
    };
    let number = digits
        .parse::<u32>()
        .map_err(|_| MosaicError::InvalidRequest(format!("'{s}' is not a campaign or quarter")))?;
    Ok((mission, number))
}

/// Archive search URL listing the data sets of one campaign/quarter.
pub fn data_search_url(
    mission: Mission,
    period: u32,
    channel: Option<u32>,
    mode: CadenceMode,
) -> String {
    let (site, period_key) = match mission {
        Mission::K2 => ("k2", "sci_campaign"),
        Mission::Kepler => ("kepler", "sci_data_quarter"),
    };
    let mut url = format!(
        "https://archive.stsci.edu/{site}/data_search/search.php?action=Search\
         &max_records=123456789&selectedColumnsCsv=sci_data_set_name\
         &outputformat=JSON&ktc_target_type={}&{period_key}={period}",
        mode.target_type()
    );
    if let Some(ch) = channel {
        url.push_str(&format!("&sci_channel={ch}"));
    }
    url
}

/// Archive URL of the target pixel file for a data set name such as
/// `KTWO210854069-C04` or `KPLR004912785-2010078095331`.
pub fn stamp_url(data_set_name: &str, mode: CadenceMode) -> Result<String> {
    let name = data_set_name.trim().to_lowercase();
    let invalid = || MosaicError::InvalidRequest(format!("'{data_set_name}' is not a data set name"));
    if !name.is_ascii() {
        return Err(invalid());
    }

    if name.starts_with("kplr") {
        if name.len() < 13 {
            return Err(invalid());
        }
        Ok(format!(
            "{ARCHIVE_BASE_URL}/kepler/target_pixel_files/{}/{}/{}{}",
            &name[4..8],
            &name[4..13],
            name,
            mode.file_suffix()
        ))
    } else {
        let (_, campaign) = name.split_once("-c").ok_or_else(invalid)?;
        let campaign: u32 = campaign.parse().map_err(|_| invalid())?;
        if name.len() < 10 {
            return Err(invalid());
        }
        Ok(format!(
            "{ARCHIVE_BASE_URL}/k2/target_pixel_files/c{campaign}/{}00000/{}000/{}{}",
            &name[4..8],
            &name[8..10],
            name,
            mode.file_suffix()
        ))
    }
}

/// Path of an archive URL relative to the `missions/` root, or `None` if the
/// locator is not an archive URL.
pub fn archive_relative_path(locator: &str) -> Option<&str> {
    let rest = locator
        .strip_prefix("https://")
        .or_else(|| locator.strip_prefix("http://"))?;
    let base = ARCHIVE_BASE_URL
        .strip_prefix("https://")
        .unwrap_or(ARCHIVE_BASE_URL);
    rest.strip_prefix(base)?.strip_prefix('/')
}
