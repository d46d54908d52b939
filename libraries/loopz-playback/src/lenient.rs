//! Forgiving deserializers for track records
//!
//! Platform records are loose: ids arrive as numbers or strings, durations as
//! seconds or `mm:ss`, contributors as names or `{ name }` objects. These
//! helpers plug into `#[serde(deserialize_with = ...)]` so one odd field
//! never rejects a whole batch; incomplete tracks are filtered later by
//! [`prepare_tracks`](crate::prepare_tracks).

use serde::{Deserialize, Deserializer};

/// Parse `"245"`, `"245.5"`, `"4:05"` or `"1:04:05"` into seconds
pub fn parse_duration(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if !raw.contains(':') {
        return raw.parse::<f64>().ok().filter(|s| s.is_finite() && *s >= 0.0);
    }

    let mut seconds = 0.0;
    for part in raw.split(':') {
        let value: f64 = part.trim().parse().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        seconds = seconds * 60.0 + value;
    }
    Some(seconds)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IdValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Number or string id; `null` becomes empty
pub fn id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<IdValue>::deserialize(deserializer)? {
        Some(IdValue::Int(n)) => n.to_string(),
        Some(IdValue::Float(f)) if f.fract() == 0.0 && f.is_finite() => format!("{}", f as i64),
        Some(IdValue::Float(f)) => f.to_string(),
        Some(IdValue::Text(s)) => s,
        None => String::new(),
    })
}

/// Nullable string; `null` becomes empty
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DurationValue {
    Seconds(f64),
    Text(String),
}

/// Seconds as a number or text; anything unusable is `None`
pub fn duration<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<DurationValue>::deserialize(deserializer)? {
        Some(DurationValue::Seconds(s)) if s.is_finite() && s >= 0.0 => Some(s),
        Some(DurationValue::Text(text)) => parse_duration(&text),
        _ => None,
    })
}

/// Seconds, falling back to 0 when unknown
pub fn duration_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(duration(deserializer)?.unwrap_or(0.0))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArtistValue {
    Name(String),
    User {
        #[serde(default, alias = "nombre")]
        name: String,
    },
}

/// Artist names from plain strings or user objects; blanks dropped
pub fn artists<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<ArtistValue>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .map(|value| match value {
            ArtistValue::Name(name) | ArtistValue::User { name } => name.trim().to_string(),
        })
        .filter(|name| !name.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Record {
        #[serde(default, deserialize_with = "id")]
        id: String,
        #[serde(default, deserialize_with = "duration")]
        length: Option<f64>,
        #[serde(default, deserialize_with = "artists")]
        people: Vec<String>,
    }

    fn record(json: &str) -> Record {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("245"), Some(245.0));
        assert_eq!(parse_duration("4:05"), Some(245.0));
        assert_eq!(parse_duration("1:04:05"), Some(3845.0));
        assert_eq!(parse_duration(" 3:30 "), Some(210.0));
        assert_eq!(parse_duration("abc"), None);
        assert_eq!(parse_duration("3:xx"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn ids_from_numbers_and_strings() {
        assert_eq!(record(r#"{"id": 30}"#).id, "30");
        assert_eq!(record(r#"{"id": 30.0}"#).id, "30");
        assert_eq!(record(r#"{"id": "a1"}"#).id, "a1");
        assert_eq!(record(r#"{"id": null}"#).id, "");
        assert_eq!(record("{}").id, "");
    }

    #[test]
    fn durations_from_numbers_and_text() {
        assert_eq!(record(r#"{"length": 185}"#).length, Some(185.0));
        assert_eq!(record(r#"{"length": "3:20"}"#).length, Some(200.0));
        assert_eq!(record(r#"{"length": -4}"#).length, None);
        assert_eq!(record(r#"{"length": "soon"}"#).length, None);
    }

    #[test]
    fn artists_from_names_and_users() {
        let r = record(r#"{"people": ["Noa", {"name": "Lia"}, {"nombre": "Iker"}, {"name": " "}]}"#);
        assert_eq!(r.people, vec!["Noa", "Lia", "Iker"]);
    }
}
