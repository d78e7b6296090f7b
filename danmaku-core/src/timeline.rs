//! Comparator-sorted timeline of comment records

use crate::ordered::{binsert, bsearch};
use crate::{Comment, Result};
use std::cmp::Ordering;
use std::rc::Rc;

/// The full set of loaded records, always sorted by [`Comment::compare`]
#[derive(Debug, Clone, Default)]
pub struct Timeline {
    records: Vec<Rc<Comment>>,
}

impl Timeline {
    /// Creates an empty timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the contents, sorting stably by the comparator
    pub fn load(&mut self, records: Vec<Comment>) {
        let mut records: Vec<Rc<Comment>> = records.into_iter().map(Rc::new).collect();
        records.sort_by(|a, b| Comment::compare(a, b));
        self.records = records;
    }

    /// Binary-inserts one record after any equal records and returns its index
    pub fn insert(&mut self, record: Comment) -> Result<usize> {
        binsert(&mut self.records, Rc::new(record), |a, b| Comment::compare(a, b))
    }

    /// Index of the first record with `stime >= time_ms`
    pub fn seek_index(&self, time_ms: f64) -> Result<usize> {
        bsearch(&self.records, |record| match time_ms.total_cmp(&record.stime) {
            Ordering::Equal => Ordering::Less,
            other => other,
        })
    }

    pub fn get(&self, index: usize) -> Option<&Rc<Comment>> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<Comment>> {
        self.records.iter()
    }

    /// Start of the first record and end of the latest-ending record, in ms
    pub fn span(&self) -> Option<(f64, f64)> {
        let first = self.records.first()?;
        let end = self
            .records
            .iter()
            .map(|r| r.stime + r.dur)
            .fold(f64::NEG_INFINITY, f64::max);
        Some((first.stime, end))
    }
}
