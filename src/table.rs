// src/table.rs

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One school's row: head-counts aligned with [`EnrollmentTable::columns`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrollmentRecord {
    pub name: String,
    pub counts: Vec<Option<u64>>,
}

/// Enrollment grid indexed by school name.
///
/// `columns` keeps the source labels (`1年` … `計`) in page order. `計` is
/// whatever the page reported; it is never recomputed from the grades.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnrollmentTable {
    pub columns: Vec<String>,
    pub records: Vec<EnrollmentRecord>,
}

impl EnrollmentTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            records: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column_index(&self, label: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == label)
    }

    pub fn get(&self, name: &str) -> Option<&EnrollmentRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Value of `column` for school `name`; `None` if either is unknown or
    /// the cell is missing.
    pub fn value(&self, name: &str, column: &str) -> Option<u64> {
        let idx = self.column_index(column)?;
        self.get(name)?.counts.get(idx).copied().flatten()
    }

    /// Push a row, padding or truncating to the column count.
    pub fn push(&mut self, name: impl Into<String>, mut counts: Vec<Option<u64>>) {
        counts.resize(self.columns.len(), None);
        self.records.push(EnrollmentRecord {
            name: name.into(),
            counts,
        });
    }

    /// Remove every row labelled `name`. Returns whether anything was removed.
    pub fn drop_row(&mut self, name: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.name != name);
        before != self.records.len()
    }

    /// Rename column `from` to `to`.
    ///
    /// When `to` already exists the `from` column is dropped instead, so the
    /// table never ends up with both labels.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        let Some(idx) = self.column_index(from) else {
            return;
        };
        if self.column_index(to).is_some() {
            warn!(from, to, "both labels present; dropping {}", from);
            self.remove_column(idx);
        } else {
            self.columns[idx] = to.to_string();
        }
    }

    fn remove_column(&mut self, idx: usize) {
        self.columns.remove(idx);
        for r in &mut self.records {
            r.counts.remove(idx);
        }
    }

    /// Drop every column that is missing in all rows.
    pub fn drop_empty_columns(&mut self) {
        let keep: Vec<bool> = (0..self.columns.len())
            .map(|i| self.records.iter().any(|r| r.counts[i].is_some()))
            .collect();
        if keep.iter().all(|&k| k) {
            return;
        }
        let mut keep_iter = keep.iter();
        self.columns.retain(|_| *keep_iter.next().unwrap_or(&true));
        for r in &mut self.records {
            let mut keep_iter = keep.iter();
            r.counts.retain(|_| *keep_iter.next().unwrap_or(&true));
        }
    }

    /// Rows whose name satisfies `pred`, same columns.
    pub fn filter_rows(&self, pred: impl Fn(&str) -> bool) -> EnrollmentTable {
        EnrollmentTable {
            columns: self.columns.clone(),
            records: self
                .records
                .iter()
                .filter(|r| pred(&r.name))
                .cloned()
                .collect(),
        }
    }

    /// Row-union of `tables`. Columns are unioned in first-seen order and
    /// cells absent from a table's own columns are filled with `None`.
    pub fn concat<'a>(tables: impl IntoIterator<Item = &'a EnrollmentTable>) -> EnrollmentTable {
        let tables: Vec<&EnrollmentTable> = tables.into_iter().collect();

        let mut columns: Vec<String> = Vec::new();
        for t in &tables {
            for c in &t.columns {
                if !columns.contains(c) {
                    columns.push(c.clone());
                }
            }
        }
        let position: HashMap<&str, usize> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();

        let mut out = EnrollmentTable::new(columns.clone());
        let mut seen = HashSet::new();
        for t in tables {
            let mapping: Vec<usize> = t.columns.iter().map(|c| position[c.as_str()]).collect();
            for r in &t.records {
                if !seen.insert(r.name.clone()) {
                    warn!(name = %r.name, "duplicate school name across tables");
                }
                let mut counts = vec![None; columns.len()];
                for (src, &dst) in mapping.iter().enumerate() {
                    counts[dst] = r.counts.get(src).copied().flatten();
                }
                out.records.push(EnrollmentRecord {
                    name: r.name.clone(),
                    counts,
                });
            }
        }
        debug!(rows = out.len(), cols = out.columns.len(), "concatenated");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: &[(&str, &[Option<u64>])]) -> EnrollmentTable {
        let mut t = EnrollmentTable::new(columns.iter().map(|s| s.to_string()).collect());
        for (name, counts) in rows {
            t.push(*name, counts.to_vec());
        }
        t
    }

    #[test]
    fn concat_disjoint_keys_unions_rows_and_columns() {
        let elementary = table(
            &["1年", "2年", "3年", "4年", "5年", "6年", "計"],
            &[
                ("A小学校", &[Some(10), Some(10), Some(10), Some(10), Some(10), Some(10), Some(60)]),
                ("B小学校", &[Some(1), Some(2), Some(3), Some(4), Some(5), Some(6), Some(21)]),
            ],
        );
        let middle = table(
            &["1年", "2年", "3年", "計"],
            &[("C中学校", &[Some(100), Some(90), None, Some(190)])],
        );

        let all = EnrollmentTable::concat([&elementary, &middle]);
        assert_eq!(all.len(), elementary.len() + middle.len());
        assert_eq!(all.columns, elementary.columns);

        let names: HashSet<&str> = all.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, HashSet::from(["A小学校", "B小学校", "C中学校"]));

        assert_eq!(all.value("C中学校", "計"), Some(190));
        assert_eq!(all.value("C中学校", "1年"), Some(100));
        assert_eq!(all.value("C中学校", "4年"), None);
        assert_eq!(all.value("C中学校", "3年"), None);
        assert_eq!(all.value("A小学校", "計"), Some(60));
    }

    #[test]
    fn concat_adds_columns_only_present_later() {
        let a = table(&["1年"], &[("A", &[Some(1)])]);
        let b = table(&["備考", "1年"], &[("B", &[Some(7), Some(2)])]);
        let all = EnrollmentTable::concat([&a, &b]);
        assert_eq!(all.columns, vec!["1年", "備考"]);
        assert_eq!(all.value("A", "備考"), None);
        assert_eq!(all.value("B", "備考"), Some(7));
        assert_eq!(all.value("B", "1年"), Some(2));
    }

    #[test]
    fn drop_row_is_a_noop_when_absent() {
        let mut t = table(&["計"], &[("A", &[Some(1)])]);
        assert!(!t.drop_row("合計"));
        assert_eq!(t.len(), 1);
        assert!(t.drop_row("A"));
        assert!(t.is_empty());
    }

    #[test]
    fn rename_never_leaves_both_labels() {
        let mut t = table(&["新1年", "2年"], &[("A", &[Some(5), Some(6)])]);
        t.rename_column("新1年", "1年");
        assert_eq!(t.columns, vec!["1年", "2年"]);
        assert_eq!(t.value("A", "1年"), Some(5));

        let mut both = table(&["新1年", "1年"], &[("A", &[Some(5), Some(6)])]);
        both.rename_column("新1年", "1年");
        assert_eq!(both.columns, vec!["1年"]);
        assert_eq!(both.value("A", "1年"), Some(6));
    }

    #[test]
    fn drops_all_missing_columns() {
        let mut t = table(
            &["1年", "4年", "計"],
            &[("X", &[Some(1), None, Some(1)]), ("Y", &[None, None, Some(2)])],
        );
        t.drop_empty_columns();
        assert_eq!(t.columns, vec!["1年", "計"]);
        assert_eq!(t.records[1].counts, vec![None, Some(2)]);
    }

    #[test]
    fn push_pads_short_rows() {
        let t = table(&["1年", "2年"], &[("A", &[Some(1)])]);
        assert_eq!(t.records[0].counts, vec![Some(1), None]);
    }
}
