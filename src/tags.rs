//! Tag vocabulary of a tagger model.
//!
//! The vocabulary CSV lists one tag per row, in the same order as the
//! classifier's output vector. Rows carry at least a `name` and a numeric
//! `category`; only ratings, general tags and characters are kept for
//! selection, but every row keeps its position so indexes stay aligned.

use std::path::Path;

use crate::error::{Result, TaggerError};

/// Emoticon-like tags whose underscores are part of the tag itself.
#[rustfmt::skip]
pub const KAOMOJIS: [&str; 19] = [
    "0_0",
    "(o)_(o)",
    "+_+",
    "+_-",
    "._.",
    "<o>_<o>",
    "<|>_<|>",
    "=_=",
    ">_<",
    "3_3",
    "6_9",
    ">_o",
    "@_@",
    "^_^",
    "o_o",
    "u_u",
    "x_x",
    "|_|",
    "||_||",
];

/// Tag category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagCategory {
    General,
    Character,
    Rating,
}

impl TagCategory {
    /// Maps a vocabulary category code; codes outside the three kept categories yield `None`.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::General),
            4 => Some(Self::Character),
            9 => Some(Self::Rating),
            _ => None,
        }
    }
}

/// Renders a raw vocabulary name the way it appears in captions.
pub fn display_name(raw: &str) -> String {
    if KAOMOJIS.contains(&raw) {
        raw.to_string()
    } else {
        raw.replace('_', " ")
    }
}

/// The tags a model can predict, partitioned by category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagVocabulary {
    names: Vec<String>,
    rating: Vec<usize>,
    general: Vec<usize>,
    character: Vec<usize>,
}

impl TagVocabulary {
    /// Load from the local CSV file
    pub fn load<P: AsRef<Path>>(csv_path: P) -> Result<Self> {
        let path = csv_path.as_ref();
        let reader = csv::Reader::from_path(path).map_err(|e| TaggerError::vocabulary(path, e))?;
        Self::from_reader(reader, path)
    }

    /// Parses vocabulary rows from any CSV source; `origin` is only used in errors.
    pub fn from_reader<R: std::io::Read>(mut reader: csv::Reader<R>, origin: &Path) -> Result<Self> {
        let headers = reader
            .headers()
            .map_err(|e| TaggerError::vocabulary(origin, e))?
            .clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
                .ok_or_else(|| TaggerError::vocabulary(origin, format!("missing `{}` column", name)))
        };
        let name_col = column("name")?;
        let category_col = column("category")?;

        let mut vocabulary = Self::default();
        for (idx, record) in reader.records().enumerate() {
            let record = record.map_err(|e| TaggerError::vocabulary(origin, e))?;
            let field = |col: usize| {
                record.get(col).ok_or_else(|| {
                    TaggerError::vocabulary(origin, format!("row {} has too few fields", idx + 1))
                })
            };
            let name = field(name_col)?;
            let code: i64 = field(category_col)?.trim().parse().map_err(|e| {
                TaggerError::vocabulary(origin, format!("row {}: bad category: {}", idx + 1, e))
            })?;
            vocabulary.push(name, TagCategory::from_code(code));
        }

        tracing::debug!(
            "Loaded {} tags ({} rating, {} general, {} character) from {}",
            vocabulary.len(),
            vocabulary.rating.len(),
            vocabulary.general.len(),
            vocabulary.character.len(),
            origin.display()
        );
        Ok(vocabulary)
    }

    /// Appends one tag; `None` keeps the slot without assigning a category.
    pub fn push(&mut self, raw_name: &str, category: Option<TagCategory>) {
        let idx = self.names.len();
        self.names.push(display_name(raw_name));
        match category {
            Some(TagCategory::Rating) => self.rating.push(idx),
            Some(TagCategory::General) => self.general.push(idx),
            Some(TagCategory::Character) => self.character.push(idx),
            None => {}
        }
    }

    /// Number of rows, including those outside the kept categories.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the vocabulary has no rows.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Display names, aligned with the classifier output.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Display name at `idx`.
    pub fn name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    /// Indexes of the given category, in vocabulary order.
    pub fn indexes(&self, category: TagCategory) -> &[usize] {
        match category {
            TagCategory::Rating => &self.rating,
            TagCategory::General => &self.general,
            TagCategory::Character => &self.character,
        }
    }

    /// Category of the row at `idx`; `None` for ignored categories.
    pub fn category(&self, idx: usize) -> Option<TagCategory> {
        [TagCategory::Rating, TagCategory::General, TagCategory::Character]
            .into_iter()
            .find(|&c| self.indexes(c).binary_search(&idx).is_ok())
    }
}
