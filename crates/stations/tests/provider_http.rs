use chrono::{NaiveDate, TimeZone, Utc};
use stations_parser::StationError;
use stations_parser::radiko::RadikoClient;
use stations_parser::radiru::{RadiruChannel, RadiruClient};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RADIKO_PROGRAMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<radiko>
  <stations>
    <station id="TBS">
      <name>TBSラジオ</name>
      <progs>
        <prog ft="20240101050000" to="20240101060000">
          <title>生島ヒロシのおはよう定食</title>
        </prog>
        <prog ft="20240101060000" to="20240101070000">
          <title>森本毅郎・スタンバイ!</title>
        </prog>
      </progs>
    </station>
    <station id="QRR">
      <name>文化放送</name>
      <progs>
        <prog ft="20240101050000" to="20240101053000">
          <title>放送休止</title>
        </prog>
      </progs>
    </station>
  </stations>
</radiko>"#;

const STREAM_URLS: &str = r#"<urls>
  <url areafree="0">
    <item>rtmpe://f-radiko.smartstream.ne.jp/TBS/_definst_/simul-stream.stream</item>
  </url>
</urls>"#;

fn radiru_day(date: &str, first: &str, second: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<result>
  <item>
    <item>
      <starttime>{date} 23:00:00</starttime>
      <endtime>{next} 00:00:00</endtime>
      <title>{first}</title>
    </item>
    <item>
      <starttime>{next} 00:00:00</starttime>
      <endtime>{next} 01:00:00</endtime>
      <title>{second}</title>
    </item>
  </item>
</result>"#,
        date = date,
        next = next_day(date),
        first = first,
        second = second,
    )
}

fn next_day(date: &str) -> String {
    let d = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
    d.succ_opt().unwrap().format("%Y-%m-%d").to_string()
}

#[tokio::test]
async fn radiko_station_schedule_and_locator() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/program/date/20240101/JP13.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RADIKO_PROGRAMS))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/station/stream_multi/TBS.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(STREAM_URLS))
        .mount(&server)
        .await;

    let client = RadikoClient::with_base_url(reqwest::Client::new(), server.uri());
    client.restore_session("token123", "JP13");

    // 06:30 JST on 2024-01-01
    let now = Utc.with_ymd_and_hms(2023, 12, 31, 21, 30, 0).unwrap();
    let tbs = client.station("TBS", now).await.unwrap();
    assert_eq!(tbs.name, "TBSラジオ");
    assert_eq!(tbs.programs.len(), 2);
    assert_eq!(tbs.programs[1].title(), "森本毅郎・スタンバイ!");

    let missing = client.station("LFR", now).await;
    assert!(matches!(missing, Err(StationError::StationNotFound(_))));

    let urls = client.stream_urls("TBS").await.unwrap();
    let locator = client.build_locator(&urls).unwrap();
    assert!(locator.starts_with("rtmpe://f-radiko.smartstream.ne.jp/TBS/"));
    assert!(locator.contains("conn=S:token123 live=1 timeout=10"));
}

#[tokio::test]
async fn radiko_error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = RadikoClient::with_base_url(reqwest::Client::new(), server.uri());
    client.restore_session("token123", "JP13");

    let err = client.stream_urls("TBS").await.unwrap_err();
    assert!(matches!(err, StationError::Status { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn radiru_programs_span_two_days() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sche.cgi"))
        .and(query_param("ch", "netfm"))
        .and(query_param("date", "20231231"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(radiru_day("2023-12-31", "年越し", "新年")),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sche.cgi"))
        .and(query_param("ch", "netfm"))
        .and(query_param("date", "20240101"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(radiru_day("2024-01-01", "夜の音楽", "深夜便")),
        )
        .mount(&server)
        .await;

    let client = RadiruClient::with_urls(
        reqwest::Client::new(),
        format!("{}/config.xml", server.uri()),
        format!("{}/sche.cgi", server.uri()),
    );

    // 2024-01-01 12:00 JST
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
    let programs = client.programs(RadiruChannel::Fm, now).await.unwrap();

    let titles: Vec<_> = programs.iter().map(|p| p.title()).collect();
    assert_eq!(titles, ["年越し", "新年", "夜の音楽", "深夜便"]);
    assert!(programs.windows(2).all(|w| w[0].start() <= w[1].start()));
}
