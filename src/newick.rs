//! Text interchange format for split systems.
//!
//! An extended Newick string where the top-level list first names every
//! taxon once, in id order, and then lists each remaining split as a
//! labelled group of the taxa on its canonical side:
//!
//! ```text
//! (1:1,2:1,3:1,4:1,(3,4)'S1':1);
//!  └─ leaves with their ─┘ └─ split {3,4} | {1,2}, weight 1
//!     trivial weights
//! ```
//!
//! A leaf carries the weight of its trivial split when the system has one;
//! a bare leaf means the trivial split is absent. Any split may be followed
//! by a `[&confidence=x]` comment. Weights are printed with the shortest
//! representation that parses back to the same `f64`.

use std::collections::HashMap;

use crate::error::ParseError;
use crate::split::{Split, TaxonId};
use crate::split_system::SplitSystem;

const CONFIDENCE_KEY: &str = "&confidence=";

/// Serializes `system`. Taxon `t` is written as `labels[t - 1]` when labels
/// are given and as its id otherwise.
pub fn write_splits(system: &SplitSystem, labels: Option<&[String]>) -> String {
    let n = system.ntax();
    let label = |t: TaxonId| -> String {
        match labels.and_then(|l| l.get(t - 1)) {
            Some(name) => quote_label(name),
            None => t.to_string(),
        }
    };

    // First trivial split per taxon goes on the leaf; duplicates become groups.
    let mut on_leaf: Vec<Option<usize>> = vec![None; n + 1];
    for (idx, split) in system.iter().enumerate() {
        if let Some(t) = split.trivial_taxon() {
            if on_leaf[t].is_none() {
                on_leaf[t] = Some(idx);
            }
        }
    }

    let mut items: Vec<String> = Vec::with_capacity(n + system.len());
    for t in 1..=n {
        let mut item = label(t);
        if let Some(idx) = on_leaf[t] {
            push_weight_and_confidence(&mut item, &system.splits()[idx]);
        }
        items.push(item);
    }

    let mut group = 0;
    for (idx, split) in system.iter().enumerate() {
        if split.trivial_taxon().is_some_and(|t| on_leaf[t] == Some(idx)) {
            continue;
        }
        group += 1;
        let members: Vec<String> = split.side_taxa().into_iter().map(&label).collect();
        let mut item = format!("({})'S{group}'", members.join(","));
        push_weight_and_confidence(&mut item, split);
        items.push(item);
    }

    format!("({});", items.join(","))
}

fn push_weight_and_confidence(item: &mut String, split: &Split) {
    item.push_str(&format!(":{}", split.weight()));
    if let Some(c) = split.confidence() {
        item.push_str(&format!("[{CONFIDENCE_KEY}{c}]"));
    }
}

/// Single-quotes a label if it contains Newick punctuation or whitespace.
fn quote_label(name: &str) -> String {
    let plain = !name.is_empty()
        && !name
            .chars()
            .any(|c| c.is_whitespace() || "()[]':;,".contains(c));
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// Parses a string produced by [`write_splits`].
///
/// Returns the taxon labels in leaf order (label at index `i` is taxon
/// `i + 1`) and the split system. Group labels such as `'S1'` are ignored;
/// group members must name leaves of the top-level list.
pub fn parse_splits(input: &str) -> Result<(Vec<String>, SplitSystem), ParseError> {
    let mut cursor = Cursor::new(input);
    let items = cursor.parse_items()?;

    let mut labels: Vec<String> = Vec::new();
    let mut ids: HashMap<String, TaxonId> = HashMap::new();
    for item in &items {
        if let Item::Leaf { label, position, .. } = item {
            if ids.insert(label.clone(), labels.len() + 1).is_some() {
                return Err(ParseError::new(*position, format!("duplicate taxon '{label}'")));
            }
            labels.push(label.clone());
        }
    }
    let n = labels.len();

    let mut splits = Vec::new();
    for item in items {
        let (taxa, weight, confidence, position) = match item {
            Item::Leaf { weight: None, .. } => continue,
            Item::Leaf { label, weight: Some(w), confidence, position } => {
                (vec![ids[&label]], w, confidence, position)
            }
            Item::Group { members, weight, confidence, position } => {
                let taxa = members
                    .iter()
                    .map(|m| {
                        ids.get(m)
                            .copied()
                            .ok_or_else(|| ParseError::new(position, format!("unknown taxon '{m}'")))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                (taxa, weight.unwrap_or(0.0), confidence, position)
            }
        };
        let mut split = Split::new(taxa, n, weight).map_err(|e| ParseError::new(position, e.to_string()))?;
        split.set_confidence(confidence);
        splits.push(split);
    }

    let system = SplitSystem::from_splits(n, splits).map_err(|e| ParseError::new(0, e.to_string()))?;
    Ok((labels, system))
}

enum Item {
    Leaf {
        label: String,
        weight: Option<f64>,
        confidence: Option<f64>,
        position: usize,
    },
    Group {
        members: Vec<String>,
        weight: Option<f64>,
        confidence: Option<f64>,
        position: usize,
    },
}

/// Byte cursor over the input.
struct Cursor<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            text,
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.pos, message)
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_whitespace();
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, expected: u8) -> Result<(), ParseError> {
        match self.peek() {
            Some(b) if b == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(b) => Err(self.error(format!(
                "expected '{}', found '{}'",
                expected as char, b as char
            ))),
            None => Err(self.error(format!("expected '{}', found end of input", expected as char))),
        }
    }

    /// `( item (, item)* ) ;` followed only by whitespace.
    fn parse_items(&mut self) -> Result<Vec<Item>, ParseError> {
        self.expect(b'(')?;
        let mut items = Vec::new();
        if self.peek() == Some(b')') {
            self.pos += 1;
        } else {
            loop {
                items.push(self.parse_item()?);
                match self.peek() {
                    Some(b',') => self.pos += 1,
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ')'")),
                }
            }
        }
        self.expect(b';')?;
        if self.peek().is_some() {
            return Err(self.error("trailing characters after ';'"));
        }
        Ok(items)
    }

    fn parse_item(&mut self) -> Result<Item, ParseError> {
        let position = self.pos;
        if self.peek() == Some(b'(') {
            self.pos += 1;
            let mut members = vec![self.parse_label()?];
            loop {
                match self.peek() {
                    Some(b',') => {
                        self.pos += 1;
                        members.push(self.parse_label()?);
                    }
                    Some(b')') => {
                        self.pos += 1;
                        break;
                    }
                    _ => return Err(self.error("expected ',' or ')' in split group")),
                }
            }
            // group label, e.g. 'S3'
            if matches!(self.peek(), Some(b) if !b":,)[;".contains(&b)) {
                self.parse_label()?;
            }
            let (weight, confidence) = self.parse_weight_and_confidence()?;
            Ok(Item::Group {
                members,
                weight,
                confidence,
                position,
            })
        } else {
            let label = self.parse_label()?;
            let (weight, confidence) = self.parse_weight_and_confidence()?;
            Ok(Item::Leaf {
                label,
                weight,
                confidence,
                position,
            })
        }
    }

    fn parse_label(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(b'\'') => self.parse_quoted_label(),
            Some(_) => {
                let start = self.pos;
                while self.pos < self.bytes.len()
                    && !self.bytes[self.pos].is_ascii_whitespace()
                    && !b"()[]':;,".contains(&self.bytes[self.pos])
                {
                    self.pos += 1;
                }
                if self.pos == start {
                    return Err(self.error("expected a label"));
                }
                Ok(self.text[start..self.pos].to_string())
            }
            None => Err(self.error("expected a label, found end of input")),
        }
    }

    fn parse_quoted_label(&mut self) -> Result<String, ParseError> {
        let open = self.pos;
        self.pos += 1;
        let mut label = String::new();
        let mut start = self.pos;
        loop {
            match self.bytes.get(self.pos) {
                None => return Err(ParseError::new(open, "unterminated quoted label")),
                Some(b'\'') if self.bytes.get(self.pos + 1) == Some(&b'\'') => {
                    label.push_str(&self.text[start..=self.pos]);
                    self.pos += 2;
                    start = self.pos;
                }
                Some(b'\'') => {
                    label.push_str(&self.text[start..self.pos]);
                    self.pos += 1;
                    return Ok(label);
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    fn parse_weight_and_confidence(&mut self) -> Result<(Option<f64>, Option<f64>), ParseError> {
        let mut weight = None;
        if self.peek() == Some(b':') {
            self.pos += 1;
            weight = Some(self.parse_number()?);
        }
        let mut confidence = None;
        while self.peek() == Some(b'[') {
            if let Some(c) = self.parse_comment()? {
                confidence = Some(c);
            }
        }
        Ok((weight, confidence))
    }

    fn parse_number(&mut self) -> Result<f64, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || b"+-.".contains(&self.bytes[self.pos]))
        {
            self.pos += 1;
        }
        let raw = &self.text[start..self.pos];
        let value: f64 = raw
            .parse()
            .map_err(|_| ParseError::new(start, format!("invalid number '{raw}'")))?;
        if !value.is_finite() || value < 0.0 {
            return Err(ParseError::new(start, format!("weight must be finite and non-negative, got {raw}")));
        }
        Ok(value)
    }

    /// Reads `[...]`; returns the value of a confidence comment, skips others.
    fn parse_comment(&mut self) -> Result<Option<f64>, ParseError> {
        let open = self.pos;
        self.pos += 1;
        let close = self.text[self.pos..]
            .find(']')
            .map(|offset| self.pos + offset)
            .ok_or_else(|| ParseError::new(open, "unterminated comment"))?;
        let body = &self.text[self.pos..close];
        self.pos = close + 1;

        match body.strip_prefix(CONFIDENCE_KEY) {
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| ParseError::new(open, format!("invalid confidence '{raw}'"))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quartet() -> SplitSystem {
        let splits = vec![
            Split::new([3, 4], 4, 1.0).unwrap(),
            Split::trivial(1, 4, 1.0).unwrap(),
            Split::trivial(2, 4, 0.5).unwrap(),
            Split::trivial(3, 4, 1.0).unwrap(),
            Split::trivial(4, 4, 1.25).unwrap(),
        ];
        SplitSystem::from_splits(4, splits).unwrap()
    }

    #[test]
    fn test_write_quartet() {
        assert_eq!(
            write_splits(&quartet(), None),
            "(1:1,2:0.5,3:1,4:1.25,(3,4)'S1':1);"
        );
    }

    #[test]
    fn test_round_trip_preserves_partitions_and_weights() {
        let sys = quartet();
        let (labels, parsed) = parse_splits(&write_splits(&sys, None)).unwrap();
        assert_eq!(labels, vec!["1", "2", "3", "4"]);
        assert_eq!(parsed.ntax(), 4);
        assert_eq!(parsed.len(), sys.len());
        for split in sys.iter() {
            let other = parsed.iter().find(|s| s.same_partition(split)).unwrap();
            assert_eq!(other.weight(), split.weight());
        }
    }

    #[test]
    fn test_missing_trivial_and_confidence() {
        let splits = vec![
            Split::new([2, 3], 4, 0.75).unwrap().with_confidence(95.0),
            Split::trivial(4, 4, 2.0).unwrap(),
        ];
        let sys = SplitSystem::from_splits(4, splits).unwrap();
        let text = write_splits(&sys, None);
        assert_eq!(text, "(1,2,3,4:2,(2,3)'S1':0.75[&confidence=95]);");

        let (_, parsed) = parse_splits(&text).unwrap();
        assert_eq!(parsed.len(), 2);
        let s = parsed.iter().find(|s| !s.is_trivial()).unwrap();
        assert_eq!(s.side_taxa(), vec![2, 3]);
        assert_eq!(s.confidence(), Some(95.0));
    }

    #[test]
    fn test_labels_are_quoted_when_needed() {
        let labels: Vec<String> = ["Homo sapiens", "Pan", "O'Neil", "Gorilla"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let text = write_splits(&quartet(), Some(&labels));
        assert!(text.starts_with("('Homo sapiens':1,Pan:0.5,'O''Neil':1,Gorilla:1.25,"));

        let (parsed_labels, parsed) = parse_splits(&text).unwrap();
        assert_eq!(parsed_labels, labels);
        assert_eq!(parsed.len(), 5);
    }

    #[test]
    fn test_group_side_is_canonicalized() {
        let (_, sys) = parse_splits("(a,b,c,d,(a,b)'S1':3);").unwrap();
        assert_eq!(sys.splits()[0].side_taxa(), vec![3, 4]);
        assert_eq!(sys.splits()[0].weight(), 3.0);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_splits("(a,b,c").is_err());
        assert!(parse_splits("(a,b,a);").is_err());
        assert!(parse_splits("(a,b,c,(a,x)'S1':1);").is_err());
        assert!(parse_splits("(a,b,c,(a,b,c)'S1':1);").is_err());
        assert!(parse_splits("(a:-1,b,c);").is_err());
        assert!(parse_splits("(a,b,c);x").is_err());

        let err = parse_splits("(a,b;").unwrap_err();
        assert_eq!(err.position, 4);
    }

    #[test]
    fn test_empty_system() {
        let sys = SplitSystem::new(0);
        assert_eq!(write_splits(&sys, None), "();");
        let (labels, parsed) = parse_splits("();").unwrap();
        assert!(labels.is_empty());
        assert!(parsed.is_empty());
    }
}
