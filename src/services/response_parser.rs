// src/services/response_parser.rs
//! Permissive decoder for model output.
//!
//! The prompt asks for labeled lines, but the model only follows that loosely:
//! labels arrive in markdown bold, with spaces instead of underscores, as a JSON
//! object, or not at all. Every field has a default, so the only hard failure is
//! an empty response.

use crate::errors::ParseError;
use crate::models::{ParsedAnalysis, RiskLevel};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

pub const DEFAULT_ELEVATION_M: f64 = 50.0;
pub const DEFAULT_DISTANCE_FROM_WATER_M: f64 = 1000.0;
pub const DEFAULT_DESCRIPTION: &str = "Analysis completed";
pub const DEFAULT_RECOMMENDATIONS: [&str; 2] =
    ["Monitor weather conditions", "Stay informed about local alerts"];

static LABEL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?P<prefix>(?:(?:[-•+>#]+|\d+[.)])\s*|\*\s+)*)(?:\*\*|__)?\s*(?:(?:estimated|approximate|approx\.?|overall|flood)\s+){0,2}(?P<label>risk(?:[\s_-]*level)?|description|summary|elevation|distance[\s_-]*(?:from|to)[\s_-]*(?:the[\s_-]*)?(?:nearest[\s_-]*|closest[\s_-]*)?water[^:\n]{0,30}?|analysis|reasoning|recommendations?)\s*(?:\([^)\n]*\))?\s*(?:\*\*|__)?\s*:\s*(?:\*\*|__)?\s*(?P<value>.*)$",
    )
    .expect("label regex is valid")
});

static RISK_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(low|medium|high)\b").expect("risk regex is valid")
});

/// "high risk", "high flood risk", "risk is low", "risk level: medium".
static RISK_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(low|medium|high)(?:[\s-]+flood)?[\s-]+risk\b|\brisk(?:[\s_-]+level)?(?:\s+(?:is|of|appears|seems|remains))?[\s:-]+(low|medium|high)\b",
    )
    .expect("risk phrase regex is valid")
});

static MEASURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(-?\d[\d,]*(?:\.\d+)?)\s*(kilomet(?:er|re)s?|km|miles?|mi|feet|foot|ft|met(?:er|re)s?|m)?\b",
    )
    .expect("measure regex is valid")
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•+]|\d+[.)])(?:\s+|$)").expect("bullet regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    RiskLevel,
    Description,
    Elevation,
    Distance,
    Analysis,
    Recommendations,
}

impl Field {
    fn from_label(label: &str) -> Self {
        let label = label.to_ascii_lowercase();
        if label.starts_with("risk") {
            Field::RiskLevel
        } else if label.starts_with("description") || label.starts_with("summary") {
            Field::Description
        } else if label.starts_with("elevation") {
            Field::Elevation
        } else if label.starts_with("distance") {
            Field::Distance
        } else if label.starts_with("recommendation") {
            Field::Recommendations
        } else {
            Field::Analysis
        }
    }
}

/// Text found under each label, first occurrence only.
#[derive(Debug, Default)]
struct Sections {
    entries: Vec<(Field, String)>,
}

impl Sections {
    fn scan(raw: &str) -> Self {
        let mut entries: Vec<(Field, Vec<&str>)> = Vec::new();

        for line in raw.lines() {
            let label = LABEL_LINE.captures(line).and_then(|caps| {
                let field = Field::from_label(&caps["label"]);
                if is_list_item(&caps["prefix"], field, &entries) {
                    return None;
                }
                Some((field, caps.name("value").map_or("", |m| m.as_str())))
            });

            match label {
                Some((field, inline)) => entries.push((field, vec![inline])),
                None => {
                    if let Some((_, lines)) = entries.last_mut() {
                        lines.push(line);
                    }
                }
            }
        }

        let mut sections = Sections::default();
        for (field, lines) in entries {
            if sections.get(field).is_none() {
                sections.entries.push((field, lines.join("\n").trim().to_string()));
            }
        }
        sections
    }

    fn get(&self, field: Field) -> Option<&str> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, text)| text.as_str())
    }

    fn text(&self, field: Field) -> Option<String> {
        self.get(field)
            .map(clean_value)
            .filter(|text| !text.is_empty())
    }
}

/// A bulleted or numbered line that repeats a label already seen, or a
/// bulleted line inside the recommendations block, is content, not a label.
fn is_list_item(prefix: &str, field: Field, entries: &[(Field, Vec<&str>)]) -> bool {
    if prefix.trim().is_empty() {
        return false;
    }
    let seen = entries.iter().any(|(f, _)| *f == field);
    let in_recommendations = matches!(entries.last(), Some((Field::Recommendations, _)));
    let bulleted = prefix.contains(['-', '*', '•', '+', '>']);
    seen || (in_recommendations && bulleted)
}

pub struct ResponseParser;

impl ResponseParser {
    pub fn parse(raw: &str) -> Result<ParsedAnalysis, ParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ParseError::Empty);
        }

        let json = embedded_json(raw);
        let json = json.as_ref();
        let sections = Sections::scan(raw);

        let risk_level = json_str(json, &["risk_level", "riskLevel", "risk"])
            .and_then(RiskLevel::from_label)
            .or_else(|| sections.get(Field::RiskLevel).and_then(RiskLevel::from_label))
            .or_else(|| first_risk_keyword(raw))
            .unwrap_or_default();

        let description = json_str(json, &["description", "summary"])
            .map(clean_value)
            .filter(|d| !d.is_empty())
            .or_else(|| sections.text(Field::Description))
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

        let elevation = json_number(json, &["elevation", "elevation_m"])
            .or_else(|| sections.get(Field::Elevation).and_then(parse_measure))
            .unwrap_or(DEFAULT_ELEVATION_M);

        let distance_from_water =
            json_number(json, &["distance_from_water", "distanceFromWater"])
                .or_else(|| sections.get(Field::Distance).and_then(parse_measure))
                .map(|d| d.max(0.0))
                .unwrap_or(DEFAULT_DISTANCE_FROM_WATER_M);

        let ai_analysis = json_str(json, &["image_analysis", "ai_analysis", "analysis"])
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .or_else(|| sections.text(Field::Analysis))
            .unwrap_or_else(|| raw.to_string());

        let recommendations = json_recommendations(json)
            .or_else(|| sections.get(Field::Recommendations).map(split_recommendations))
            .filter(|recs| !recs.is_empty())
            .unwrap_or_else(default_recommendations);

        Ok(ParsedAnalysis {
            risk_level,
            description,
            elevation,
            distance_from_water,
            ai_analysis,
            recommendations,
        })
    }
}

pub fn default_recommendations() -> Vec<String> {
    DEFAULT_RECOMMENDATIONS.iter().map(|r| r.to_string()).collect()
}

/// A level written next to "risk" beats the first bare keyword, so
/// "low-lying area at high risk" reads as High.
fn first_risk_keyword(text: &str) -> Option<RiskLevel> {
    RISK_PHRASE
        .captures(text)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .or_else(|| RISK_KEYWORD.captures(text).and_then(|caps| caps.get(1)))
        .and_then(|m| RiskLevel::from_label(m.as_str()))
}

/// Strips markdown emphasis and surrounding whitespace.
fn clean_value(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c == '*' || c == '_' || c == '`')
        .trim()
        .to_string()
}

/// First number in `text`, converted to meters.
fn parse_measure(text: &str) -> Option<f64> {
    let caps = MEASURE.captures(text)?;
    let value: f64 = caps[1].replace(',', "").parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    let unit = caps.get(2).map(|m| m.as_str().to_ascii_lowercase());
    let factor = match unit.as_deref() {
        Some(u) if u == "km" || u.starts_with("kilomet") => 1000.0,
        Some(u) if u == "mi" || u.starts_with("mile") => 1609.344,
        Some("ft" | "feet" | "foot") => 0.3048,
        _ => 1.0,
    };
    Some(value * factor)
}

fn split_recommendations(block: &str) -> Vec<String> {
    let lines: Vec<&str> = block.lines().filter(|l| !l.trim().is_empty()).collect();

    let items: Vec<&str> = if lines.len() == 1 && lines[0].contains(';') {
        lines[0].split(';').collect()
    } else {
        lines
    };

    items
        .into_iter()
        .map(|item| clean_value(&BULLET.replace(item, "")))
        .filter(|item| !item.is_empty())
        .collect()
}

/// The outermost `{...}` in the text, if it is a JSON object.
fn embedded_json(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&raw[start..=end])
        .ok()
        .filter(Value::is_object)
}

fn json_field<'a>(json: Option<&'a Value>, keys: &[&str]) -> Option<&'a Value> {
    let json = json?;
    keys.iter().find_map(|key| json.get(*key).filter(|v| !v.is_null()))
}

fn json_str<'a>(json: Option<&'a Value>, keys: &[&str]) -> Option<&'a str> {
    json_field(json, keys).and_then(Value::as_str)
}

fn json_number(json: Option<&Value>, keys: &[&str]) -> Option<f64> {
    match json_field(json, keys)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_measure(s),
        _ => None,
    }
}

fn json_recommendations(json: Option<&Value>) -> Option<Vec<String>> {
    match json_field(json, &["recommendations"])? {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .map(clean_value)
                .filter(|item| !item.is_empty())
                .collect(),
        ),
        Value::String(s) => Some(split_recommendations(&s.replace(';', "\n"))),
        _ => None,
    }
}
