use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::normalize::Normalizer;
use crate::rules::CategoryRules;
use crate::SemanticsError;

/// Coarse browsing bucket for a field. Variant order is the matching order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    PersonalInfo,
    ContactInfo,
    BankingInfo,
    EmploymentInfo,
    TaxInfo,
    Signature,
    Other,
}

impl Category {
    pub const ALL: [Self; 7] = [
        Self::PersonalInfo,
        Self::ContactInfo,
        Self::BankingInfo,
        Self::EmploymentInfo,
        Self::TaxInfo,
        Self::Signature,
        Self::Other,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PersonalInfo => "personal_info",
            Self::ContactInfo => "contact_info",
            Self::BankingInfo => "banking_info",
            Self::EmploymentInfo => "employment_info",
            Self::TaxInfo => "tax_info",
            Self::Signature => "signature",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = SemanticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| SemanticsError::invalid_rules(format!("unknown category '{s}'")))
    }
}

/// Category → field ids (input order). Categories without members are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldCategories(BTreeMap<Category, Vec<String>>);

impl FieldCategories {
    #[must_use]
    pub fn get(&self, category: Category) -> Option<&[String]> {
        self.0.get(&category).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.0.iter().map(|(c, fields)| (*c, fields.as_slice()))
    }

    #[must_use]
    pub fn category_of(&self, field: &str) -> Option<Category> {
        self.0
            .iter()
            .find(|(_, fields)| fields.iter().any(|f| f == field))
            .map(|(c, _)| *c)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FieldCategorizer {
    normalizer: Normalizer,
    rules: CategoryRules,
}

impl FieldCategorizer {
    #[must_use]
    pub const fn new(normalizer: Normalizer, rules: CategoryRules) -> Self {
        Self { normalizer, rules }
    }

    #[must_use]
    pub fn category_of(&self, raw: &str) -> Category {
        let normalized = self.normalizer.normalize(raw);
        self.rules.classify(&normalized).unwrap_or(Category::Other)
    }

    pub fn categorize<'a, I>(&self, fields: I) -> FieldCategories
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut categories: BTreeMap<Category, Vec<String>> = BTreeMap::new();
        for field in fields {
            categories
                .entry(self.category_of(field))
                .or_default()
                .push(field.to_string());
        }
        FieldCategories(categories)
    }
}
