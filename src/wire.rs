//! Flat `key=value&...` transport codec shared by requests, replies,
//! callback bodies, and notification bodies.

use std::collections::BTreeMap;

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};

/// Decodes wire text into a map. Pairs that do not split into exactly one
/// key and one value are discarded; the first occurrence of a duplicate
/// key wins. Keys and values are kept in their transport form.
pub fn decode(text: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for pair in text.split('&') {
        let mut parts = pair.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        map.entry(key.to_string()).or_insert_with(|| value.to_string());
    }
    map
}

/// Joins `key=value` pairs with `&`. Entries with an empty key or an empty
/// value are omitted.
pub fn encode(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Extracts a single value without building the full map. Returns the raw
/// transport form of the first matching pair.
pub fn get_value(key: &str, text: &str) -> Option<String> {
    for pair in text.split('&') {
        let mut parts = pair.split('=');
        if let (Some(k), Some(v), None) = (parts.next(), parts.next(), parts.next()) {
            if k == key {
                return Some(v.to_string());
            }
        }
    }
    None
}

pub fn escape(text: &str) -> String {
    utf8_percent_encode(text, NON_ALPHANUMERIC).to_string()
}

pub fn unescape(text: &str) -> String {
    percent_decode_str(text).decode_utf8_lossy().into_owned()
}

/// Percent-escapes every key and value; applied before `encode` whenever
/// the output is handed to an HTTP collaborator.
pub fn escape_map(map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(key, value)| (escape(key), escape(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_splits_pairs() {
        let map = decode("command=version&group=Tester");
        assert_eq!(map.get("command").map(String::as_str), Some("version"));
        assert_eq!(map.get("group").map(String::as_str), Some("Tester"));
    }

    #[test]
    fn decode_discards_malformed_pairs() {
        let map = decode("a=1&bare&b=2=3&c=4");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a").map(String::as_str), Some("1"));
        assert_eq!(map.get("c").map(String::as_str), Some("4"));
    }

    #[test]
    fn decode_first_duplicate_wins() {
        let map = decode("key=first&key=second");
        assert_eq!(map.get("key").map(String::as_str), Some("first"));
    }

    #[test]
    fn decode_empty_input_yields_empty_map() {
        assert!(decode("").is_empty());
    }

    #[test]
    fn encode_omits_empty_entries() {
        let mut map = BTreeMap::new();
        map.insert("a".to_string(), "1".to_string());
        map.insert("empty".to_string(), String::new());
        map.insert(String::new(), "orphan".to_string());
        assert_eq!(encode(&map), "a=1");
    }

    #[test]
    fn decode_encode_round_trip() {
        let mut map = BTreeMap::new();
        map.insert("command".to_string(), "pay".to_string());
        map.insert("amount".to_string(), "100".to_string());
        map.insert("agent".to_string(), "someone".to_string());
        assert_eq!(decode(&encode(&map)), map);
    }

    #[test]
    fn escape_round_trips_reserved_characters() {
        let raw = "hello world&x=y";
        assert_eq!(unescape(&escape(raw)), raw);
        assert!(!escape(raw).contains('&'));
        assert!(!escape(raw).contains('='));
    }

    #[test]
    fn get_value_returns_first_match() {
        let text = "a=1&b=2&a=3";
        assert_eq!(get_value("a", text).as_deref(), Some("1"));
        assert_eq!(get_value("missing", text), None);
    }
}
