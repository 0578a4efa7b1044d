//! NHK radiru XML documents.

use serde::Deserialize;
use tracing::warn;

use super::RadiruChannel;
use crate::Program;
use crate::StationError;
use crate::time::{RADIRU_TIME_FORMAT, parse_jst};

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    stream_url: StreamUrlSection,
}

#[derive(Debug, Default, Deserialize)]
struct StreamUrlSection {
    #[serde(rename = "data", default)]
    areas: Vec<AreaEntry>,
}

#[derive(Debug, Deserialize)]
struct AreaEntry {
    areakey: String,
    #[serde(default)]
    r1: String,
    #[serde(default)]
    r2: String,
    #[serde(default)]
    fm: String,
}

#[derive(Debug, Deserialize)]
struct ScheduleDocument {
    #[serde(default)]
    item: Option<ScheduleItems>,
}

#[derive(Debug, Deserialize)]
struct ScheduleItems {
    #[serde(rename = "item", default)]
    entries: Vec<ScheduleEntry>,
}

#[derive(Debug, Deserialize)]
struct ScheduleEntry {
    starttime: String,
    endtime: String,
    #[serde(default)]
    title: String,
}

/// Stream endpoints of one listening area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadiruAreaConfig {
    pub area_key: String,
    pub r1: String,
    pub r2: String,
    pub fm: String,
}

impl RadiruAreaConfig {
    pub fn stream_url(&self, channel: RadiruChannel) -> &str {
        match channel {
            RadiruChannel::R1 => &self.r1,
            RadiruChannel::R2 => &self.r2,
            RadiruChannel::Fm => &self.fm,
        }
    }
}

pub(crate) fn parse_area_config(xml: &str, area_key: &str) -> Result<RadiruAreaConfig, StationError> {
    let doc: ConfigDocument = quick_xml::de::from_str(xml)?;
    doc.stream_url
        .areas
        .into_iter()
        .find(|a| a.areakey.trim() == area_key)
        .map(|a| RadiruAreaConfig {
            area_key: a.areakey.trim().to_string(),
            r1: a.r1.trim().to_string(),
            r2: a.r2.trim().to_string(),
            fm: a.fm.trim().to_string(),
        })
        .ok_or_else(|| StationError::UnknownArea(area_key.to_string()))
}

pub(crate) fn parse_schedule(xml: &str) -> Result<Vec<Program>, StationError> {
    let doc: ScheduleDocument = quick_xml::de::from_str(xml)?;
    let entries = doc.item.map(|i| i.entries).unwrap_or_default();

    let mut programs = Vec::with_capacity(entries.len());
    for entry in entries {
        let parsed = parse_jst(&entry.starttime, RADIRU_TIME_FORMAT)
            .and_then(|start| Ok((start, parse_jst(&entry.endtime, RADIRU_TIME_FORMAT)?)));
        match parsed {
            Ok((start, end)) => match Program::new(entry.title.trim(), start, end) {
                Some(p) => programs.push(p),
                None => warn!(title = %entry.title, "Dropping program with empty time window"),
            },
            Err(e) => warn!(error = %e, "Dropping unparsable program"),
        }
    }
    Ok(programs)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<radiru_config>
  <info>https://www.nhk.or.jp/radio/</info>
  <stream_url>
    <data>
      <areajp>札幌</areajp>
      <area>sapporo</area>
      <areakey>010</areakey>
      <r1>rtmpe://netradio-hkr1-flash.nhk.jp/live/NetRadio_HKR1_flash@108442</r1>
      <r2>rtmpe://netradio-r2-flash.nhk.jp/live/NetRadio_R2_flash@63342</r2>
      <fm>rtmpe://netradio-hkfm-flash.nhk.jp/live/NetRadio_HKFM_flash@108237</fm>
    </data>
    <data>
      <areajp>東京</areajp>
      <area>tokyo</area>
      <areakey>130</areakey>
      <r1>rtmpe://netradio-r1-flash.nhk.jp/live/NetRadio_R1_flash@63346</r1>
      <r2>rtmpe://netradio-r2-flash.nhk.jp/live/NetRadio_R2_flash@63342</r2>
      <fm>rtmpe://netradio-fm-flash.nhk.jp/live/NetRadio_FM_flash@63343</fm>
    </data>
  </stream_url>
</radiru_config>"#;

    #[test]
    fn test_area_config_selects_area() {
        let tokyo = parse_area_config(CONFIG, "130").unwrap();
        assert_eq!(tokyo.area_key, "130");
        assert!(tokyo.stream_url(RadiruChannel::Fm).contains("NetRadio_FM_flash"));
        assert!(tokyo.stream_url(RadiruChannel::R1).contains("NetRadio_R1_flash"));
    }

    #[test]
    fn test_area_config_unknown_key() {
        assert!(matches!(
            parse_area_config(CONFIG, "999"),
            Err(StationError::UnknownArea(_))
        ));
    }

    #[test]
    fn test_parse_schedule() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<result>
  <item>
    <item>
      <starttime>2024-01-01 05:00:00</starttime>
      <endtime>2024-01-01 05:15:00</endtime>
      <title>ニュース</title>
    </item>
    <item>
      <starttime>2024-01-01 05:15:00</starttime>
      <endtime>2024-01-01 06:00:00</endtime>
      <title>マイあさ!</title>
    </item>
    <item>
      <starttime>bogus</starttime>
      <endtime>2024-01-01 06:00:00</endtime>
      <title>skipped</title>
    </item>
  </item>
</result>"#;
        let programs = parse_schedule(xml).unwrap();
        assert_eq!(programs.len(), 2);
        assert_eq!(programs[0].title(), "ニュース");
        assert_eq!(programs[0].end(), programs[1].start());
    }

    #[test]
    fn test_parse_empty_schedule() {
        assert!(parse_schedule("<result></result>").unwrap().is_empty());
    }
}
