use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

use super::ScraperError;

/// Outcome of one extraction attempt.
#[derive(Debug)]
pub enum Extraction<T> {
    Found(T),
    Absent,
    Failed(ScraperError),
}

impl<T> Extraction<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Extraction::Found(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Extraction::Found(value) => Some(value),
            Extraction::Absent | Extraction::Failed(_) => None,
        }
    }
}

impl<T> From<Option<T>> for Extraction<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Extraction::Absent, Extraction::Found)
    }
}

/// A displayed price in whole cents. Values are rounded to two decimals on
/// construction, so equal displayed prices compare equal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    pub fn new(value: f64) -> Self {
        Self((value * 100.0).round() / 100.0)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub url: Url,
    pub code: Option<String>,
    pub price: Option<Price>,
}

impl ProductRecord {
    pub fn new(url: Url, code: Option<String>, price: Option<Price>) -> Self {
        Self { url, code, price }
    }

    pub fn empty(url: Url) -> Self {
        Self::new(url, None, None)
    }

    pub fn has_code(&self) -> bool {
        self.code.is_some()
    }

    pub fn has_price(&self) -> bool {
        self.price.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.has_code() && self.has_price()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_code() && !self.has_price()
    }
}

/// Product records in first-discovery order, unique by URL.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<ProductRecord>,
    index: HashMap<String, usize>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the record unless one with the same URL already exists.
    /// Returns whether it was inserted.
    pub fn insert(&mut self, record: ProductRecord) -> bool {
        let key = record.url.to_string();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.records.len());
        self.records.push(record);
        true
    }

    pub fn get(&self, url: &Url) -> Option<&ProductRecord> {
        self.index
            .get(url.as_str())
            .map(|&position| &self.records[position])
    }

    pub fn get_mut(&mut self, url: &Url) -> Option<&mut ProductRecord> {
        match self.index.get(url.as_str()) {
            Some(&position) => self.records.get_mut(position),
            None => None,
        }
    }

    pub fn records(&self) -> &[ProductRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<ProductRecord> {
        self.records
    }
}
