use std::collections::VecDeque;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::record::EventRecord;

// ---------------------------------------------------------------------------
// Suricata fast.log
// ---------------------------------------------------------------------------

// 03/16/2012-12:30:00.090000  [**] [1:2024364:5] ET SCAN Possible Nmap User-Agent Observed [**]
//   [Classification: Web Application Attack] [Priority: 1] {TCP} 192.168.202.79:50477 -> 192.168.229.251:80
static FAST_LOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<ts>\d{2}/\d{2}/\d{4}-\d{2}:\d{2}:\d{2}\.\d{6})\s+\[\*\*\]\s+\[(?P<gid>\d+):(?P<sid>\d+):(?P<rev>\d+)\]\s+(?P<signature>.*?)\s+\[\*\*\]\s+\[Classification:\s*(?P<classification>[^\]]+)\]\s+\[Priority:\s*(?P<priority>\d+)\](?:\s+\{(?P<protocol>[^}]+)\}\s+(?P<src>\S+)\s+->\s+(?P<dst>\S+))?",
    )
    .unwrap()
});

/// Parse one alert line. Lines that do not look like alerts yield `None`;
/// an alert without a usable endpoint tail still yields a record.
pub fn parse_fast_log_line(line: &str) -> Option<EventRecord> {
    let caps = FAST_LOG_RE.captures(line.trim())?;
    let timestamp = NaiveDateTime::parse_from_str(&caps["ts"], "%m/%d/%Y-%H:%M:%S%.f")
        .ok()?
        .and_utc();

    let mut record = EventRecord {
        timestamp: Some(timestamp),
        signature: Some(caps["signature"].trim().to_string()).filter(|s| !s.is_empty()),
        classification: Some(caps["classification"].trim().to_string()),
        priority: caps["priority"].parse().ok(),
        protocol: caps.name("protocol").map(|m| m.as_str().trim().to_string()),
        ..Default::default()
    };

    if let (Some(src), Some(dst)) = (caps.name("src"), caps.name("dst")) {
        if let (Some((src_ip, src_port)), Some((dst_ip, dst_port))) =
            (split_endpoint(src.as_str()), split_endpoint(dst.as_str()))
        {
            record.source_address = Some(src_ip);
            record.source_port = src_port;
            record.destination_address = Some(dst_ip);
            record.destination_port = dst_port;
        }
    }

    Some(record)
}

/// `addr:port` split on the last colon. ICMP alerts carry `addr:type`
/// pairs in the same slot; those parse the same way.
fn split_endpoint(raw: &str) -> Option<(String, Option<u16>)> {
    let (addr, port) = raw.rsplit_once(':')?;
    if addr.is_empty() {
        return None;
    }
    Some((addr.to_string(), port.parse().ok()))
}

/// Parse fast.log text. With `max_lines`, only the last N lines are kept.
pub fn parse_fast_log(text: &str, max_lines: Option<usize>) -> Vec<EventRecord> {
    let lines: Box<dyn Iterator<Item = &str> + '_> = match max_lines {
        Some(limit) if limit > 0 => {
            let mut tail: VecDeque<&str> = VecDeque::with_capacity(limit);
            for line in text.lines() {
                if tail.len() == limit {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Box::new(tail.into_iter())
        }
        _ => Box::new(text.lines()),
    };

    let mut skipped = 0usize;
    let records: Vec<EventRecord> = lines
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| {
            let parsed = parse_fast_log_line(l);
            if parsed.is_none() {
                skipped += 1;
            }
            parsed
        })
        .collect();

    if skipped > 0 {
        tracing::debug!(skipped, "fast.log lines did not match the alert format");
    }
    records
}

pub fn read_fast_log(path: &Path, max_lines: Option<usize>) -> Result<Vec<EventRecord>> {
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(parse_fast_log(&String::from_utf8_lossy(&bytes), max_lines))
}

// ---------------------------------------------------------------------------
// JSON: an array of objects, or one object per line (EVE)
// ---------------------------------------------------------------------------

pub fn parse_json_batch(text: &str) -> Result<Vec<EventRecord>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        let batch: Vec<Value> = serde_json::from_str(trimmed).context("invalid JSON array")?;
        return Ok(objects_to_records(batch.iter()));
    }

    let mut values = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(v) => values.push(v),
            Err(e) => tracing::warn!(line = lineno + 1, error = %e, "skipping unreadable JSON line"),
        }
    }
    Ok(objects_to_records(values.iter()))
}

fn objects_to_records<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<EventRecord> {
    values
        .filter_map(|v| match v {
            Value::Object(fields) => Some(EventRecord::from_fields(fields)),
            other => {
                tracing::debug!(kind = ?other, "skipping non-object entry");
                None
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Format sniffing + input metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    Json,
    FastLog,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMetadata {
    pub filename: String,
    pub format: InputFormat,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone)]
pub struct LoadedBatch {
    pub metadata: InputMetadata,
    pub records: Vec<EventRecord>,
}

pub fn sniff_format(text: &str) -> InputFormat {
    match text.trim_start().chars().next() {
        Some('[') | Some('{') => InputFormat::Json,
        _ => InputFormat::FastLog,
    }
}

pub fn load_records(path: &Path, max_lines: Option<usize>) -> Result<LoadedBatch> {
    let filename = path
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let bytes = std::fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let batch = records_from_bytes(filename, &bytes, max_lines)
        .with_context(|| format!("failed to decode {}", path.display()))?;

    tracing::info!(
        file = %batch.metadata.filename,
        format = ?batch.metadata.format,
        size = batch.metadata.size_bytes,
        records = batch.records.len(),
        "loaded input"
    );
    Ok(batch)
}

pub fn records_from_bytes(filename: String, bytes: &[u8], max_lines: Option<usize>) -> Result<LoadedBatch> {
    let text = String::from_utf8_lossy(bytes);
    let format = sniff_format(&text);
    let records = match format {
        InputFormat::Json => parse_json_batch(&text)?,
        InputFormat::FastLog => parse_fast_log(&text, max_lines),
    };
    Ok(LoadedBatch {
        metadata: InputMetadata {
            filename,
            format,
            size_bytes: bytes.len() as u64,
            sha256: hex::encode(Sha256::digest(bytes)),
        },
        records,
    })
}

// ---------------------------------------------------------------------------
// Recency window
// ---------------------------------------------------------------------------

/// Keep records no older than `window` before the newest timestamp in the
/// batch. Records without a timestamp are kept, and so is everything when
/// the window reaches past the representable range.
pub fn retain_recent(records: &mut Vec<EventRecord>, window: Duration) {
    let Some(latest) = records.iter().filter_map(|r| r.timestamp).max() else {
        return;
    };
    let Some(start) = latest.checked_sub_signed(window) else {
        return;
    };
    records.retain(|r| r.timestamp.map_or(true, |ts| ts >= start));
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALERT: &str = "03/16/2012-12:30:00.090000  [**] [1:2024364:5] ET SCAN Possible Nmap User-Agent Observed [**] [Classification: Web Application Attack] [Priority: 1] {TCP} 192.168.202.79:50477 -> 192.168.229.251:80";

    #[test]
    fn test_parse_fast_log_line() {
        let r = parse_fast_log_line(ALERT).unwrap();
        assert_eq!(r.signature.as_deref(), Some("ET SCAN Possible Nmap User-Agent Observed"));
        assert_eq!(r.classification.as_deref(), Some("Web Application Attack"));
        assert_eq!(r.priority, Some(1));
        assert_eq!(r.protocol.as_deref(), Some("TCP"));
        assert_eq!(r.source_address.as_deref(), Some("192.168.202.79"));
        assert_eq!(r.source_port, Some(50477));
        assert_eq!(r.destination_address.as_deref(), Some("192.168.229.251"));
        assert_eq!(r.destination_port, Some(80));
        assert_eq!(r.timestamp.unwrap().to_rfc3339(), "2012-03-16T12:30:00.090+00:00");
    }

    #[test]
    fn test_alert_without_endpoints() {
        let line = "03/16/2012-12:30:01.000000  [**] [1:2200040:2] SURICATA Ethertype unknown [**] [Classification: Generic Protocol Command Decode] [Priority: 3]";
        let r = parse_fast_log_line(line).unwrap();
        assert_eq!(r.priority, Some(3));
        assert!(r.source_address.is_none());
        assert!(r.destination_port.is_none());
    }

    #[test]
    fn test_garbage_lines_skipped() {
        assert!(parse_fast_log_line("hello world").is_none());
        assert!(parse_fast_log_line("").is_none());
        let text = format!("junk\n\n{ALERT}\nmore junk\n");
        assert_eq!(parse_fast_log(&text, None).len(), 1);
    }

    #[test]
    fn test_max_lines_keeps_tail() {
        let other = ALERT.replace(":80", ":23");
        let text = format!("{ALERT}\n{ALERT}\n{other}\n");
        let records = parse_fast_log(&text, Some(1));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].destination_port, Some(23));
    }

    #[test]
    fn test_json_array_and_ndjson() {
        let array = r#"[{"src_ip": "10.0.0.1", "dest_port": 23}, 5, {"payload": "x"}]"#;
        let records = parse_json_batch(array).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].destination_port, Some(23));

        let eve = "{\"src_ip\": \"10.0.0.1\", \"dest_port\": 445}\nnot json\n{\"http\": {\"http_user_agent\": \"Java/1.6.0\"}}\n";
        let records = parse_json_batch(eve).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].user_agent.as_deref(), Some("Java/1.6.0"));
    }

    #[test]
    fn test_broken_json_array_is_error() {
        assert!(parse_json_batch("[{\"a\": 1},").is_err());
    }

    #[test]
    fn test_records_from_bytes() {
        let batch = records_from_bytes("fast.log".into(), ALERT.as_bytes(), None).unwrap();
        assert_eq!(batch.metadata.format, InputFormat::FastLog);
        assert_eq!(batch.metadata.size_bytes, ALERT.len() as u64);
        assert_eq!(batch.metadata.sha256.len(), 64);
        assert_eq!(batch.records.len(), 1);

        let batch = records_from_bytes("eve.json".into(), b"  [{\"dst_port\": 21}]", None).unwrap();
        assert_eq!(batch.metadata.format, InputFormat::Json);
        assert_eq!(batch.records[0].destination_port, Some(21));
    }

    #[test]
    fn test_retain_recent() {
        let early = ALERT.replacen("03/16/2012", "03/14/2012", 1);
        let mut records = parse_fast_log(&format!("{early}\n{ALERT}\n"), None);
        records.push(EventRecord::default());
        retain_recent(&mut records, Duration::hours(24));
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.timestamp.map_or(true, |ts| ts.to_rfc3339().starts_with("2012-03-16"))));
    }

    #[test]
    fn test_retain_recent_huge_window_keeps_all() {
        let early = ALERT.replacen("03/16/2012", "03/14/2012", 1);
        let mut records = parse_fast_log(&format!("{early}\n{ALERT}\n"), None);
        retain_recent(&mut records, Duration::hours(10_000_000_000));
        assert_eq!(records.len(), 2);
        retain_recent(&mut records, Duration::MAX);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_retain_recent_without_timestamps() {
        let mut records = vec![EventRecord::default(), EventRecord::default()];
        retain_recent(&mut records, Duration::hours(1));
        assert_eq!(records.len(), 2);
    }
}
