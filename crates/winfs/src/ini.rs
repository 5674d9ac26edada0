//! INI parsing for `parse_ini_file`
//!
//! Supports `[sections]`, `key = value`, single/double quoted values, `;`
//! and `#` comments, `key[] = v` / `key[sub] = v` arrays, and maps the
//! boolean literals the usual way (`true`/`on`/`yes` -> `"1"`,
//! `false`/`off`/`no`/`none`/`null` -> `""`).

use crate::{FsError, Result};

/// A parsed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IniValue {
    Scalar(String),
    /// Ordered `key[..]` entries; `key[]` gets the next numeric index
    Array(Vec<(String, String)>),
}

impl IniValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            IniValue::Scalar(s) => Some(s),
            IniValue::Array(_) => None,
        }
    }
}

/// Key/value pairs in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniSection {
    entries: Vec<(String, IniValue)>,
}

impl IniSection {
    pub fn get(&self, key: &str) -> Option<&IniValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IniValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn set(&mut self, key: String, value: String) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = IniValue::Scalar(value),
            None => self.entries.push((key, IniValue::Scalar(value))),
        }
    }

    fn push(&mut self, key: String, index: Option<String>, value: String) {
        let position = self.entries.iter().position(|(k, _)| *k == key);
        let position = match position {
            Some(position) => position,
            None => {
                self.entries.push((key, IniValue::Array(Vec::new())));
                self.entries.len() - 1
            }
        };

        let slot = &mut self.entries[position].1;
        if let IniValue::Scalar(_) = slot {
            *slot = IniValue::Array(Vec::new());
        }
        if let IniValue::Array(items) = slot {
            let index = index.unwrap_or_else(|| {
                let next = items
                    .iter()
                    .filter_map(|(k, _)| k.parse::<usize>().ok())
                    .map(|n| n + 1)
                    .max()
                    .unwrap_or(0);
                next.to_string()
            });
            match items.iter_mut().find(|(k, _)| *k == index) {
                Some((_, existing)) => *existing = value,
                None => items.push((index, value)),
            }
        }
    }
}

/// A parsed INI file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IniDocument {
    /// Keys outside any section, or every key when sections are not processed
    pub globals: IniSection,
    pub sections: Vec<(String, IniSection)>,
}

impl IniDocument {
    pub fn section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|(n, _)| n == name).map(|(_, s)| s)
    }

    /// Global (or flattened) value
    pub fn get(&self, key: &str) -> Option<&IniValue> {
        self.globals.get(key)
    }
}

/// Parse INI text
pub fn parse_ini(text: &str, process_sections: bool) -> Result<IniDocument> {
    let mut doc = IniDocument::default();
    let mut current: Option<usize> = None;

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(rest) = line.strip_prefix('[') {
            let name = rest
                .split_once(']')
                .map(|(name, _)| name.trim().to_string())
                .ok_or_else(|| syntax(number, "unterminated section header"))?;

            if process_sections {
                let index = match doc.sections.iter().position(|(n, _)| *n == name) {
                    Some(index) => index,
                    None => {
                        doc.sections.push((name, IniSection::default()));
                        doc.sections.len() - 1
                    }
                };
                current = Some(index);
            }
            continue;
        }

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| syntax(number, "expected `key = value`"))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(syntax(number, "empty key"));
        }
        let value = parse_value(value.trim()).ok_or_else(|| syntax(number, "unterminated quote"))?;

        let section = match current {
            Some(index) => &mut doc.sections[index].1,
            None => &mut doc.globals,
        };

        match split_array_key(key) {
            Some((name, index)) => section.push(name.to_string(), index.map(str::to_string), value),
            None => section.set(key.to_string(), value),
        }
    }

    Ok(doc)
}

fn syntax(number: usize, message: &str) -> FsError {
    FsError::IniSyntax {
        line: number + 1,
        message: message.to_string(),
    }
}

/// `name[]` -> (name, None), `name[idx]` -> (name, Some(idx))
fn split_array_key(key: &str) -> Option<(&str, Option<&str>)> {
    let inner = key.strip_suffix(']')?;
    let (name, index) = inner.split_once('[')?;
    let index = index.trim();
    Some((name.trim(), (!index.is_empty()).then_some(index)))
}

fn parse_value(value: &str) -> Option<String> {
    for quote in ['"', '\''] {
        if let Some(rest) = value.strip_prefix(quote) {
            let end = rest.find(quote)?;
            return Some(rest[..end].to_string());
        }
    }

    let value = match value.find(';') {
        Some(idx) => value[..idx].trim_end(),
        None => value,
    };

    let literal = match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" => "1".to_string(),
        "false" | "off" | "no" | "none" | "null" => String::new(),
        _ => value.to_string(),
    };
    Some(literal)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
; global settings
name = "Ünïcödé app"
debug = on

[paths]
root = C:\データ ; trailing comment
extra[] = one
extra[] = two
map[key] = 'value'

[flags]
enabled = false
"#;

    fn scalar(v: Option<&IniValue>) -> Option<&str> {
        v.and_then(IniValue::as_str)
    }

    #[test]
    fn test_sections() {
        let doc = parse_ini(SAMPLE, true).unwrap();
        assert_eq!(scalar(doc.get("name")), Some("Ünïcödé app"));
        assert_eq!(scalar(doc.get("debug")), Some("1"));

        let paths = doc.section("paths").unwrap();
        assert_eq!(scalar(paths.get("root")), Some(r"C:\データ"));
        assert_eq!(
            paths.get("extra"),
            Some(&IniValue::Array(vec![
                ("0".to_string(), "one".to_string()),
                ("1".to_string(), "two".to_string()),
            ]))
        );
        assert_eq!(
            paths.get("map"),
            Some(&IniValue::Array(vec![("key".to_string(), "value".to_string())]))
        );

        assert_eq!(scalar(doc.section("flags").unwrap().get("enabled")), Some(""));
    }

    #[test]
    fn test_flattened() {
        let doc = parse_ini(SAMPLE, false).unwrap();
        assert!(doc.sections.is_empty());
        assert_eq!(scalar(doc.get("root")), Some(r"C:\データ"));
        assert_eq!(scalar(doc.get("enabled")), Some(""));
        assert_eq!(doc.globals.len(), 6);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(matches!(
            parse_ini("[broken", true),
            Err(FsError::IniSyntax { line: 1, .. })
        ));
        assert!(matches!(
            parse_ini("ok = 1\nnot a pair", true),
            Err(FsError::IniSyntax { line: 2, .. })
        ));
        assert!(parse_ini("k = \"open", true).is_err());
    }
}
