//! radiko XML documents.

use serde::Deserialize;
use tracing::warn;

use crate::Program;
use crate::StationError;
use crate::time::{RADIKO_TIME_FORMAT, parse_jst};

/// `/v3/program/date/<date>/<area>.xml`
#[derive(Debug, Deserialize)]
pub(crate) struct ProgramDocument {
    #[serde(default)]
    pub stations: StationList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StationList {
    #[serde(rename = "station", default)]
    pub items: Vec<StationEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StationEntry {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub progs: ProgList,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ProgList {
    #[serde(rename = "prog", default)]
    pub items: Vec<ProgEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgEntry {
    #[serde(rename = "@ft")]
    pub ft: String,
    #[serde(rename = "@to")]
    pub to: String,
    #[serde(default)]
    pub title: String,
}

/// `/v2/station/stream_multi/<id>.xml`
#[derive(Debug, Deserialize)]
pub(crate) struct StreamUrlDocument {
    #[serde(rename = "url", default)]
    pub urls: Vec<StreamUrlEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamUrlEntry {
    #[serde(rename = "@areafree", default)]
    pub areafree: Option<String>,
    pub item: String,
}

/// A station and its current program list.
#[derive(Debug, Clone)]
pub struct RadikoStationInfo {
    pub id: String,
    pub name: String,
    pub programs: Vec<Program>,
}

/// One RTMP endpoint for a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUrl {
    pub url: String,
    pub areafree: bool,
}

impl ProgEntry {
    fn to_program(&self) -> Result<Option<Program>, StationError> {
        let start = parse_jst(&self.ft, RADIKO_TIME_FORMAT)?;
        let end = parse_jst(&self.to, RADIKO_TIME_FORMAT)?;
        Ok(Program::new(self.title.trim(), start, end))
    }
}

impl StationEntry {
    pub(crate) fn into_info(self) -> RadikoStationInfo {
        let mut programs: Vec<Program> = Vec::with_capacity(self.progs.items.len());
        for prog in &self.progs.items {
            match prog.to_program() {
                Ok(Some(program)) => programs.push(program),
                Ok(None) => warn!(station = %self.id, title = %prog.title, "Dropping program with empty time window"),
                Err(e) => warn!(station = %self.id, error = %e, "Dropping unparsable program"),
            }
        }
        programs.sort_by_key(|p| p.start());

        RadikoStationInfo {
            id: self.id,
            name: self.name,
            programs,
        }
    }
}

pub(crate) fn parse_program_document(xml: &str) -> Result<Vec<RadikoStationInfo>, StationError> {
    let doc: ProgramDocument = quick_xml::de::from_str(xml)?;
    Ok(doc
        .stations
        .items
        .into_iter()
        .map(StationEntry::into_info)
        .collect())
}

pub(crate) fn parse_stream_urls(xml: &str) -> Result<Vec<StreamUrl>, StationError> {
    let doc: StreamUrlDocument = quick_xml::de::from_str(xml)?;
    Ok(doc
        .urls
        .into_iter()
        .map(|u| StreamUrl {
            url: u.item.trim().to_string(),
            areafree: u.areafree.as_deref() == Some("1"),
        })
        .filter(|u| !u.url.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<radiko>
  <ttl>1800</ttl>
  <srvtime>1704081600</srvtime>
  <stations>
    <station id="TBS">
      <name>TBSラジオ</name>
      <progs>
        <date>20240101</date>
        <prog id="1" master_id="" ft="20240101060000" to="20240101070000" ftl="0600" tol="0700" dur="3600">
          <title>森本毅郎・スタンバイ!</title>
          <pfm>森本毅郎</pfm>
        </prog>
        <prog id="0" master_id="" ft="20240101050000" to="20240101060000" ftl="0500" tol="0600" dur="3600">
          <title>生島ヒロシのおはよう定食</title>
        </prog>
        <prog id="2" master_id="" ft="20240101070000" to="20240101070000" ftl="0700" tol="0700" dur="0">
          <title>broken</title>
        </prog>
      </progs>
    </station>
    <station id="QRR">
      <name>文化放送</name>
      <progs>
        <date>20240101</date>
      </progs>
    </station>
  </stations>
</radiko>"#;

    #[test]
    fn test_parse_program_document() {
        let stations = parse_program_document(PROGRAMS).unwrap();
        assert_eq!(stations.len(), 2);

        let tbs = &stations[0];
        assert_eq!(tbs.id, "TBS");
        assert_eq!(tbs.name, "TBSラジオ");
        // zero-length slot dropped, remaining sorted by start
        assert_eq!(tbs.programs.len(), 2);
        assert_eq!(tbs.programs[0].title(), "生島ヒロシのおはよう定食");
        assert!(tbs.programs[0].start() < tbs.programs[1].start());

        assert!(stations[1].programs.is_empty());
    }

    #[test]
    fn test_parse_stream_urls() {
        let xml = r#"<urls>
  <url areafree="0" timefree="0">
    <playlist_create_url>https://example.invalid/playlist.m3u8</playlist_create_url>
    <item>rtmpe://f-radiko.smartstream.ne.jp/TBS/_definst_/simul-stream.stream</item>
  </url>
  <url areafree="1" timefree="0">
    <item>rtmpe://f-radiko.smartstream.ne.jp/TBS/_definst_/simul-stream-af.stream</item>
  </url>
</urls>"#;
        let urls = parse_stream_urls(xml).unwrap();
        assert_eq!(urls.len(), 2);
        assert!(!urls[0].areafree);
        assert!(urls[1].areafree);
        assert!(urls[0].url.starts_with("rtmpe://"));
    }
}
