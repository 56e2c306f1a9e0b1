use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;

/// Errors raised while reading a Fortran namelist file.
#[derive(Debug, Error)]
pub enum NamelistError {
    #[error("Failed to read namelist: {0}")]
    Io(#[from] std::io::Error),

    #[error("Namelist line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("Namelist group &{0} not found")]
    MissingGroup(String),

    #[error("Namelist key {group}.{key} not found")]
    MissingKey { group: String, key: String },

    #[error("Namelist key {group}.{key}: cannot read {value:?} as {expected}")]
    BadValue {
        group: String,
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// One namelist group: lower-cased key -> raw value slots.
///
/// Slots left unset by indexed assignments (`Ts(3) = 1.0` with no `Ts(2)`)
/// are `None`.
pub type NamelistGroup = HashMap<String, Vec<Option<String>>>;

#[derive(Debug, Clone, Default)]
pub struct Namelist {
    groups: HashMap<String, NamelistGroup>,
}

impl Namelist {
    pub fn from_path(path: &Path) -> Result<Self, NamelistError> {
        let file = File::open(path)?;
        let mut text = String::new();
        for line in BufReader::new(file).lines() {
            text.push_str(&line?);
            text.push('\n');
        }
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, NamelistError> {
        let mut groups: HashMap<String, NamelistGroup> = HashMap::new();
        let mut current: Option<(String, NamelistGroup)> = None;
        // Values can continue onto following lines after a trailing comma.
        let mut pending_key: Option<(String, Option<usize>)> = None;

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = strip_comment(raw_line);
            let mut rest = line.trim();
            if rest.is_empty() {
                continue;
            }

            if current.is_none() {
                let Some(name) = rest.strip_prefix('&').or_else(|| rest.strip_prefix('$')) else {
                    return Err(syntax(line_no, "assignment outside of a namelist group"));
                };
                let mut parts = name.splitn(2, char::is_whitespace);
                let group_name = parts.next().unwrap_or("").trim().to_ascii_lowercase();
                if group_name.is_empty() {
                    return Err(syntax(line_no, "group name missing after '&'"));
                }
                current = Some((group_name, NamelistGroup::new()));
                rest = parts.next().unwrap_or("").trim();
                if rest.is_empty() {
                    continue;
                }
            } else if let Some((open, _)) = current.as_ref() {
                if let Some(name) = rest.strip_prefix('&').or_else(|| rest.strip_prefix('$')) {
                    let next = name
                        .split(|c: char| c.is_whitespace() || c == '/')
                        .next()
                        .unwrap_or("");
                    if !next.eq_ignore_ascii_case("end") {
                        return Err(syntax(
                            line_no,
                            &format!("group &{open} is not terminated with '/' before &{next}"),
                        ));
                    }
                }
            }

            let (body, closes) = split_group_end(rest);
            if let Some((_, group)) = current.as_mut() {
                for token in split_assignments(body) {
                    let token = token.trim();
                    if token.is_empty() {
                        continue;
                    }
                    match split_key_value(token) {
                        Some((key_part, value_part)) => {
                            let (key, index) = parse_key(key_part, line_no)?;
                            let values = expand_values(value_part);
                            store(group, &key, index, values);
                            pending_key = Some((key, index));
                        }
                        None => {
                            // continuation of the previous assignment
                            let Some((key, _)) = pending_key.as_ref() else {
                                return Err(syntax(line_no, "value without a key"));
                            };
                            let start = group.get(key).map(|v| v.len()).unwrap_or(0);
                            store(group, key, Some(start), expand_values(token));
                        }
                    }
                }
            }

            if closes {
                if let Some((name, group)) = current.take() {
                    groups.insert(name, group);
                }
                pending_key = None;
            }
        }

        if let Some((name, _)) = current {
            return Err(NamelistError::Syntax {
                line: text.lines().count(),
                message: format!("group &{name} is not terminated with '/'"),
            });
        }
        Ok(Self { groups })
    }

    fn slots(&self, group: &str, key: &str) -> Result<&[Option<String>], NamelistError> {
        let group_lc = group.to_ascii_lowercase();
        let entries = self
            .groups
            .get(&group_lc)
            .ok_or_else(|| NamelistError::MissingGroup(group_lc.clone()))?;
        entries
            .get(&key.to_ascii_lowercase())
            .map(|v| v.as_slice())
            .ok_or_else(|| NamelistError::MissingKey {
                group: group_lc,
                key: key.to_ascii_lowercase(),
            })
    }

    fn scalar_text(&self, group: &str, key: &str) -> Result<&str, NamelistError> {
        self.slots(group, key)?
            .iter()
            .flatten()
            .next()
            .map(|s| s.as_str())
            .ok_or_else(|| NamelistError::MissingKey {
                group: group.to_ascii_lowercase(),
                key: key.to_ascii_lowercase(),
            })
    }

    pub fn get_f64(&self, group: &str, key: &str) -> Result<f64, NamelistError> {
        let text = self.scalar_text(group, key)?;
        parse_real(text).ok_or_else(|| bad_value(group, key, text, "real"))
    }

    pub fn get_usize(&self, group: &str, key: &str) -> Result<usize, NamelistError> {
        let text = self.scalar_text(group, key)?;
        text.parse::<usize>()
            .map_err(|_| bad_value(group, key, text, "non-negative integer"))
    }

    /// Array value; unset slots are an error.
    pub fn get_f64_array(&self, group: &str, key: &str) -> Result<Vec<f64>, NamelistError> {
        self.slots(group, key)?
            .iter()
            .map(|slot| {
                let text = slot.as_deref().ok_or_else(|| NamelistError::MissingKey {
                    group: group.to_ascii_lowercase(),
                    key: key.to_ascii_lowercase(),
                })?;
                parse_real(text).ok_or_else(|| bad_value(group, key, text, "real"))
            })
            .collect()
    }

    pub fn get_usize_or(&self, group: &str, key: &str, default: usize) -> Result<usize, NamelistError> {
        match self.get_usize(group, key) {
            Err(NamelistError::MissingGroup(_)) | Err(NamelistError::MissingKey { .. }) => Ok(default),
            other => other,
        }
    }
}

fn syntax(line: usize, message: &str) -> NamelistError {
    NamelistError::Syntax {
        line,
        message: message.to_string(),
    }
}

fn bad_value(group: &str, key: &str, value: &str, expected: &'static str) -> NamelistError {
    NamelistError::BadValue {
        group: group.to_ascii_lowercase(),
        key: key.to_ascii_lowercase(),
        value: value.to_string(),
        expected,
    }
}

/// Drop a trailing `!` comment, ignoring `!` inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    for (idx, c) in line.char_indices() {
        match (quote, c) {
            (None, '\'') | (None, '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '!') => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Split off a terminating `/`, `&end` or `$end` (outside quotes).
fn split_group_end(line: &str) -> (&str, bool) {
    let lower = line.to_ascii_lowercase();
    for marker in ["&end", "$end"] {
        if lower.trim_end().ends_with(marker) {
            let cut = lower.trim_end().len() - marker.len();
            return (&line[..cut], true);
        }
    }
    let mut quote: Option<char> = None;
    for (idx, c) in line.char_indices() {
        match (quote, c) {
            (None, '\'') | (None, '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '/') => return (&line[..idx], true),
            _ => {}
        }
    }
    (line, false)
}

/// Split a line into `key = values` chunks. A new chunk starts at each
/// identifier that is followed by `=`.
fn split_assignments(line: &str) -> Vec<&str> {
    let bytes = line.as_bytes();
    let mut starts = vec![0usize];
    let mut quote: Option<u8> = None;
    for (idx, &b) in bytes.iter().enumerate() {
        match (quote, b) {
            (None, b'\'') | (None, b'"') => quote = Some(b),
            (Some(q), b) if b == q => quote = None,
            (None, b'=') => {
                // walk back over `name(idx)` to the separator before it
                let mut j = idx;
                while j > 0 && bytes[j - 1] == b' ' {
                    j -= 1;
                }
                while j > 0 {
                    let c = bytes[j - 1];
                    if c.is_ascii_alphanumeric() || c == b'_' || c == b'(' || c == b')' || c == b'%' {
                        j -= 1;
                    } else {
                        break;
                    }
                }
                if j > 0 && *starts.last().unwrap_or(&0) < j {
                    starts.push(j);
                }
            }
            _ => {}
        }
    }
    let mut chunks = Vec::with_capacity(starts.len());
    for (n, &s) in starts.iter().enumerate() {
        let e = starts.get(n + 1).copied().unwrap_or(line.len());
        chunks.push(&line[s..e]);
    }
    chunks
}

fn split_key_value(token: &str) -> Option<(&str, &str)> {
    let mut quote: Option<char> = None;
    for (idx, c) in token.char_indices() {
        match (quote, c) {
            (None, '\'') | (None, '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, '=') => return Some((&token[..idx], &token[idx + 1..])),
            _ => {}
        }
    }
    None
}

fn parse_key(raw: &str, line_no: usize) -> Result<(String, Option<usize>), NamelistError> {
    let raw = raw.trim().to_ascii_lowercase();
    if let Some(open) = raw.find('(') {
        let close = raw
            .rfind(')')
            .ok_or_else(|| syntax(line_no, "unclosed array index"))?;
        let index_text = raw[open + 1..close].trim();
        let index = index_text
            .parse::<usize>()
            .ok()
            .filter(|&i| i >= 1)
            .ok_or_else(|| syntax(line_no, "array index must be a positive integer"))?;
        Ok((raw[..open].trim().to_string(), Some(index - 1)))
    } else if raw.is_empty() {
        Err(syntax(line_no, "empty key"))
    } else {
        Ok((raw, None))
    }
}

/// Split a value list on commas/whitespace and expand `n*value` repeats.
fn expand_values(raw: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let flush = |current: &mut String, items: &mut Vec<String>| {
        let item = current.trim();
        if !item.is_empty() {
            items.push(item.to_string());
        }
        current.clear();
    };
    for c in raw.chars() {
        match (quote, c) {
            (None, '\'') | (None, '"') => quote = Some(c),
            (Some(q), c) if c == q => quote = None,
            (None, ',') => flush(&mut current, &mut items),
            (None, c) if c.is_whitespace() => flush(&mut current, &mut items),
            (Some(_), c) => current.push(c),
            (None, c) => current.push(c),
        }
    }
    flush(&mut current, &mut items);

    let mut expanded = Vec::with_capacity(items.len());
    for item in items {
        if let Some((count, value)) = item.split_once('*') {
            if let Ok(n) = count.trim().parse::<usize>() {
                expanded.extend(std::iter::repeat(value.trim().to_string()).take(n));
                continue;
            }
        }
        expanded.push(item);
    }
    expanded
}

fn store(group: &mut NamelistGroup, key: &str, index: Option<usize>, values: Vec<String>) {
    let slots = group.entry(key.to_string()).or_default();
    match index {
        None => {
            slots.clear();
            slots.extend(values.into_iter().map(Some));
        }
        Some(start) => {
            let end = start + values.len();
            if slots.len() < end {
                slots.resize(end, None);
            }
            for (slot, value) in slots[start..end].iter_mut().zip(values) {
                *slot = Some(value);
            }
        }
    }
}

/// Fortran real literal, including `d`/`D` exponents.
pub fn parse_real(text: &str) -> Option<f64> {
    let normalized = text.trim().replace(['d', 'D'], "e");
    normalized.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
&simulation
  dt = 1.0d-10, nsteps = 100000   ! total steps
  dx = 1.0e-3
  ngrid = 512
/
&output
  output_steps = 10000
  label = 'run/1'
/
&plasma
  nspec = 2
  lambda = 2.5e-3
  Ts = 11604.5,
       1160.45
  m_ratio(2) = 1836.0
  m_ratio(1) = 1.0
  use_tracer = .true.
/
";

    #[test]
    fn parses_groups_scalars_and_arrays() {
        let nml = Namelist::parse(SAMPLE).unwrap();
        assert!((nml.get_f64("simulation", "dt").unwrap() - 1.0e-10).abs() < 1e-24);
        assert_eq!(nml.get_usize("simulation", "nsteps").unwrap(), 100000);
        assert_eq!(nml.get_usize("SIMULATION", "NGRID").unwrap(), 512);
        assert_eq!(nml.get_usize("output", "output_steps").unwrap(), 10000);
        assert_eq!(nml.get_f64_array("plasma", "Ts").unwrap(), vec![11604.5, 1160.45]);
        assert_eq!(nml.get_f64_array("plasma", "m_ratio").unwrap(), vec![1.0, 1836.0]);
    }

    #[test]
    fn expands_repeat_counts() {
        let nml = Namelist::parse("&g\n a = 3*0.5, 2\n/\n").unwrap();
        assert_eq!(nml.get_f64_array("g", "a").unwrap(), vec![0.5, 0.5, 0.5, 2.0]);
    }

    #[test]
    fn single_line_group_and_end_marker() {
        let nml = Namelist::parse("&a x = 1, y = 2 /\n&b z=3 &end\n").unwrap();
        assert_eq!(nml.get_usize("a", "x").unwrap(), 1);
        assert_eq!(nml.get_usize("a", "y").unwrap(), 2);
        assert_eq!(nml.get_usize("b", "z").unwrap(), 3);
    }

    #[test]
    fn reports_missing_and_malformed_entries() {
        let nml = Namelist::parse(SAMPLE).unwrap();
        assert!(matches!(
            nml.get_f64("nothere", "dt"),
            Err(NamelistError::MissingGroup(_))
        ));
        assert!(matches!(
            nml.get_f64("simulation", "nothere"),
            Err(NamelistError::MissingKey { .. })
        ));
        assert!(matches!(
            nml.get_usize("plasma", "lambda"),
            Err(NamelistError::BadValue { .. })
        ));
        assert_eq!(nml.get_usize_or("plasma", "nothere", 7).unwrap(), 7);
    }

    #[test]
    fn rejects_unterminated_group_and_stray_assignment() {
        assert!(matches!(
            Namelist::parse("&a\n x = 1\n"),
            Err(NamelistError::Syntax { .. })
        ));
        assert!(matches!(
            Namelist::parse("x = 1\n"),
            Err(NamelistError::Syntax { line: 1, .. })
        ));
    }

    #[test]
    fn group_opened_inside_another_is_reported_at_its_header() {
        match Namelist::parse("&a\n x = 1,\n&b\n y = 2\n/") {
            Err(NamelistError::Syntax { line, message }) => {
                assert_eq!(line, 3);
                assert!(message.contains("&a is not terminated"), "{message}");
            }
            other => panic!("unexpected result {other:?}"),
        }
        // an end marker on its own line still closes the group
        let nml = Namelist::parse("&a\n x = 1,\n&END\n$b\n y = 2\n$end\n").unwrap();
        assert_eq!(nml.get_usize("a", "x").unwrap(), 1);
        assert_eq!(nml.get_usize("b", "y").unwrap(), 2);
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let nml = Namelist::from_path(file.path()).unwrap();
        assert_eq!(nml.get_usize("plasma", "nspec").unwrap(), 2);
    }
}
