// src/fields.rs

use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};
use std::{collections::HashMap, fmt};

/// Source column label → canonical field key. Defined once; used by the
/// school fetcher when renaming and by the view when picking a chart field.
pub static FIELD_TABLE: &[(&str, &str)] = &[
    ("1年", "gr1"),
    ("2年", "gr2"),
    ("3年", "gr3"),
    ("4年", "gr4"),
    ("5年", "gr5"),
    ("6年", "gr6"),
    ("計", "total"),
];

/// Alternative labels some pages use for a canonical column.
pub static LABEL_ALIASES: &[(&str, &str)] = &[("新1年", "1年")];

static BY_LABEL: Lazy<HashMap<&'static str, Field>> = Lazy::new(|| {
    FIELD_TABLE
        .iter()
        .zip(Field::ALL)
        .map(|(&(label, _), field)| (label, field))
        .collect()
});

static BY_KEY: Lazy<HashMap<&'static str, Field>> = Lazy::new(|| {
    FIELD_TABLE
        .iter()
        .zip(Field::ALL)
        .map(|(&(_, key), field)| (key, field))
        .collect()
});

/// A chartable enrollment column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// School year 1..=6. Build from untrusted input with [`Field::grade`].
    Grade(u8),
    Total,
}

impl Field {
    /// In `FIELD_TABLE` order.
    pub const ALL: [Field; 7] = [
        Field::Grade(1),
        Field::Grade(2),
        Field::Grade(3),
        Field::Grade(4),
        Field::Grade(5),
        Field::Grade(6),
        Field::Total,
    ];

    /// School year `year`, if it is one the tables carry.
    pub fn grade(year: u8) -> Option<Field> {
        (1..=6).contains(&year).then_some(Field::Grade(year))
    }

    fn index(self) -> usize {
        match self {
            Field::Grade(g) => {
                debug_assert!((1..=6).contains(&g), "grade {g} out of range");
                usize::from(g.clamp(1, 6)) - 1
            }
            Field::Total => 6,
        }
    }

    /// Column label as it appears in the source tables.
    pub fn label(self) -> &'static str {
        FIELD_TABLE[self.index()].0
    }

    /// Stable internal key.
    pub fn key(self) -> &'static str {
        FIELD_TABLE[self.index()].1
    }

    pub fn from_label(label: &str) -> Option<Field> {
        BY_LABEL.get(label).copied()
    }

    pub fn from_key(key: &str) -> Option<Field> {
        BY_KEY.get(key).copied()
    }

    /// Accepts either a source label or a canonical key.
    pub fn parse(s: &str) -> Option<Field> {
        let s = s.trim();
        Field::from_label(s).or_else(|| Field::from_key(s))
    }

    /// Selector semantics: anything unrecognised charts the total.
    pub fn select(s: &str) -> Field {
        Field::parse(s).unwrap_or(Field::Total)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// Canonical key for a source column label; unknown labels pass through.
pub fn key_for_label(label: &str) -> &str {
    Field::from_label(label).map_or(label, |f| f.key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_and_keys_line_up() {
        for (i, field) in Field::ALL.into_iter().enumerate() {
            assert_eq!(field.label(), FIELD_TABLE[i].0);
            assert_eq!(field.key(), FIELD_TABLE[i].1);
            assert_eq!(Field::from_label(field.label()), Some(field));
            assert_eq!(Field::from_key(field.key()), Some(field));
        }
    }

    #[test]
    fn selector_falls_back_to_total() {
        assert_eq!(Field::select("3年"), Field::Grade(3));
        assert_eq!(Field::select("gr5"), Field::Grade(5));
        assert_eq!(Field::select("特別支援"), Field::Total);
        assert_eq!(Field::select(""), Field::Total);
    }

    #[test]
    fn aliases_point_at_known_labels() {
        for &(alias, canonical) in LABEL_ALIASES {
            assert!(Field::from_label(alias).is_none(), "{alias}");
            assert!(Field::from_label(canonical).is_some(), "{canonical}");
        }
    }

    #[test]
    fn unknown_labels_pass_through() {
        assert_eq!(key_for_label("計"), "total");
        assert_eq!(key_for_label("備考"), "備考");
    }

    #[test]
    fn grade_constructor_is_checked() {
        assert_eq!(Field::grade(3), Some(Field::Grade(3)));
        assert_eq!(Field::grade(0), None);
        assert_eq!(Field::grade(7), None);
        assert_eq!(Field::grade(6).map(Field::label), Some("6年"));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of range")]
    fn out_of_range_grade_is_caught_in_debug() {
        let _ = Field::Grade(9).label();
    }

    #[test]
    fn serializes_as_key() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&Field::Grade(2))?, "\"gr2\"");
        Ok(())
    }
}
