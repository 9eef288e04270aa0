use fightledger_common::{ProfileRecord, RawDocument, WinMethodSource};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::cells::dashed;
use crate::error::ExtractError;

const PORTAL_KEY: &str = "prtlCmnApiRsp";

const RECORD_STAT: &str = "Wins-Losses-Draws";
const KO_STAT: &str = "Technical Knockout-Technical Knockout Losses";
const SUB_STAT: &str = "Submissions-Submission Losses";

#[derive(Debug, Deserialize)]
struct PortalResponse {
    #[serde(rename = "plyrHdr")]
    player_header: Option<PlayerHeader>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerHeader {
    #[serde(default)]
    ath: Athlete,
    #[serde(rename = "statsBlck", default)]
    stats_block: Option<StatsBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct Athlete {
    wghtclss: Option<Value>,
    htwt: Option<Value>,
    dob: Option<Value>,
    rch: Option<Value>,
    stnc: Option<Value>,
    tm: Option<Value>,
    cntry: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct StatsBlock {
    #[serde(default)]
    vals: Vec<StatValue>,
}

#[derive(Debug, Deserialize)]
struct StatValue {
    #[serde(default)]
    name: String,
    #[serde(default)]
    val: Value,
}

/// Build the profile record from the page's embedded portal JSON.
pub fn extract_profile(doc: &RawDocument) -> Result<ProfileRecord, ExtractError> {
    let block = embedded_object(&doc.content, PORTAL_KEY)?.ok_or(ExtractError::MissingProfile)?;
    let portal: PortalResponse =
        serde_json::from_str(block).map_err(|e| ExtractError::MalformedProfile(e.to_string()))?;
    let header = portal
        .player_header
        .ok_or_else(|| ExtractError::MalformedProfile("plyrHdr missing".into()))?;

    let stats = header.stats_block.unwrap_or_default().vals;
    let stat = |name: &str| {
        stats
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .map(|s| value_text(Some(&s.val)))
    };
    let stat_containing = |needle: &str| {
        stats
            .iter()
            .find(|s| s.name.to_ascii_lowercase().contains(needle))
            .map(|s| value_text(Some(&s.val)))
            .unwrap_or_default()
    };

    let record = stat(RECORD_STAT).unwrap_or_default();
    let wld = dashed(&record);
    let part = |i: usize| wld.get(i).copied().flatten().unwrap_or(0);
    let (wins, losses, draws) = (part(0), part(1), part(2));

    let first_of = |v: Option<String>| v.and_then(|v| dashed(&v).first().copied().flatten());
    let (wins_ko, wins_sub, win_method_source) =
        match (first_of(stat(KO_STAT)), first_of(stat(SUB_STAT))) {
            (Some(ko), Some(sub)) => (ko, sub, WinMethodSource::Observed),
            _ => (wins / 3, wins / 4, WinMethodSource::Approximated),
        };

    let ath = &header.ath;
    Ok(ProfileRecord {
        name: doc.entity.clone(),
        division: value_text(ath.wghtclss.as_ref()),
        record,
        wins,
        losses,
        draws,
        wins_ko,
        wins_sub,
        wins_dec: wins.saturating_sub(wins_ko.saturating_add(wins_sub)),
        win_method_source,
        height_weight: value_text(ath.htwt.as_ref()),
        date_of_birth: value_text(ath.dob.as_ref()),
        reach: value_text(ath.rch.as_ref()),
        stance: value_text(ath.stnc.as_ref()),
        team: value_text(ath.tm.as_ref()),
        country: value_text(ath.cntry.as_ref()),
        striking_accuracy: stat_containing("striking accuracy"),
        takedown_accuracy: stat_containing("takedown accuracy"),
    })
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Slice of `html` holding the JSON object assigned to `"key"`.
///
/// Braces inside JSON strings do not count, and escaped quotes do not end a
/// string.
pub(crate) fn embedded_object<'a>(html: &'a str, key: &str) -> Result<Option<&'a str>, ExtractError> {
    let pattern = format!(r#""{}"\s*:\s*\{{"#, regex::escape(key));
    let re = Regex::new(&pattern).map_err(|e| ExtractError::Selector {
        selector: pattern.clone(),
        message: e.to_string(),
    })?;
    let Some(found) = re.find(html) else {
        return Ok(None);
    };

    let start = found.end() - 1;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in html.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(Some(&html[start..=start + offset]));
                }
            }
            _ => {}
        }
    }
    Err(ExtractError::MalformedProfile(
        "unterminated profile block".into(),
    ))
}
