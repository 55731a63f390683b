//! Countries, category labels and the template list.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::api::models::{
    AiInsertResult, ContractCategory, ContractTemplate, ExtractedFields, PlaceholderMappings,
    TemplateForm,
};
use crate::error::{Error, Result};
use crate::utils::parse_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Country {
    Sk,
    Cz,
    Hu,
    Ro,
    It,
    De,
    Us,
}

impl Country {
    pub const ALL: [Country; 7] = [
        Country::Sk,
        Country::Cz,
        Country::Hu,
        Country::Ro,
        Country::It,
        Country::De,
        Country::Us,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Country::Sk => "SK",
            Country::Cz => "CZ",
            Country::Hu => "HU",
            Country::Ro => "RO",
            Country::It => "IT",
            Country::De => "DE",
            Country::Us => "US",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Country::Sk => "Slovakia",
            Country::Cz => "Czech Republic",
            Country::Hu => "Hungary",
            Country::Ro => "Romania",
            Country::It => "Italy",
            Country::De => "Germany",
            Country::Us => "USA",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Country {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Country::ALL
            .into_iter()
            .find(|c| c.code() == upper)
            .ok_or_else(|| Error::validation(format!("unknown country code: {s}")))
    }
}

/// Categories every installation knows, used when the backend has no row for a value.
pub const BUILTIN_CATEGORIES: [(&str, &str); 5] = [
    ("general", "General contract"),
    ("cord_blood", "Cord blood stem cell storage contract"),
    ("service", "Service contract"),
    ("storage", "Storage contract"),
    ("gdpr", "GDPR consent"),
];

/// Label of a category for a country; blank per-country labels fall back to `label`.
pub fn category_label<'a>(category: &'a ContractCategory, country: Option<&str>) -> &'a str {
    let Some(country) = country.and_then(|c| c.parse::<Country>().ok()) else {
        return &category.label;
    };
    let localized = match country {
        Country::Sk => &category.label_sk,
        Country::Cz => &category.label_cz,
        Country::Hu => &category.label_hu,
        Country::Ro => &category.label_ro,
        Country::It => &category.label_it,
        Country::De => &category.label_de,
        Country::Us => &category.label_us,
    };
    localized
        .as_deref()
        .filter(|l| !l.is_empty())
        .unwrap_or(&category.label)
}

pub fn category_label_by_value<'a>(
    categories: &'a [ContractCategory],
    value: &'a str,
    country: Option<&str>,
) -> &'a str {
    if let Some(category) = categories.iter().find(|c| c.value == value) {
        return category_label(category, country);
    }
    BUILTIN_CATEGORIES
        .iter()
        .find(|(v, _)| *v == value)
        .map(|(_, label)| *label)
        .unwrap_or(value)
}

pub fn validate_template_form(form: &TemplateForm) -> Result<()> {
    if form.name.trim().is_empty() {
        return Err(Error::validation("template name is required"));
    }
    if form.category.trim().is_empty() {
        return Err(Error::validation("template category is required"));
    }
    if form.country_code.trim().is_empty() {
        return Err(Error::validation("template country is required"));
    }
    form.country_code.parse::<Country>()?;
    Ok(())
}

/// Mappings produced by the AI placeholder insertion.
///
/// When the service suggested nothing, each inserted `{{placeholder}}` maps to
/// its CRM field, or to itself.
pub fn mappings_from_insertion(result: &AiInsertResult) -> (ExtractedFields, PlaceholderMappings) {
    let fields: Vec<String> = result
        .replacements
        .iter()
        .map(|r| format!("{{{{{}}}}}", r.placeholder))
        .collect();
    let mappings = if result.suggested_mappings.is_empty() {
        let mut m = PlaceholderMappings::new();
        for (field, r) in fields.iter().zip(&result.replacements) {
            m.set(field.clone(), r.crm_field.clone().unwrap_or_else(|| r.placeholder.clone()));
        }
        m
    } else {
        result.suggested_mappings.clone()
    };
    (ExtractedFields(fields), mappings)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PublishFilter {
    #[default]
    All,
    Published,
    Draft,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemplateSortField {
    #[default]
    Name,
    Country,
    Category,
    Status,
    Date,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDir {
    #[default]
    Asc,
    Desc,
}

impl SortDir {
    pub fn flip(self) -> Self {
        match self {
            SortDir::Asc => SortDir::Desc,
            SortDir::Desc => SortDir::Asc,
        }
    }
}

/// State of the template table: filters, sort column and page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateQuery {
    pub country: Option<String>,
    pub category: Option<String>,
    pub publish: PublishFilter,
    pub sort_field: TemplateSortField,
    pub sort_dir: SortDir,
    pub page: usize,
    pub page_size: usize,
}

impl Default for TemplateQuery {
    fn default() -> Self {
        Self {
            country: None,
            category: None,
            publish: PublishFilter::All,
            sort_field: TemplateSortField::Name,
            sort_dir: SortDir::Asc,
            page: 0,
            page_size: 10,
        }
    }
}

impl TemplateQuery {
    /// Clicking a column header: same column flips direction, a new one starts ascending.
    pub fn sort_by(&mut self, field: TemplateSortField) {
        if self.sort_field == field {
            self.sort_dir = self.sort_dir.flip();
        } else {
            self.sort_field = field;
            self.sort_dir = SortDir::Asc;
        }
        self.page = 0;
    }

    pub fn set_country(&mut self, country: Option<String>) {
        self.country = country;
        self.page = 0;
    }

    pub fn set_category(&mut self, category: Option<String>) {
        self.category = category;
        self.page = 0;
    }

    pub fn set_publish(&mut self, publish: PublishFilter) {
        self.publish = publish;
        self.page = 0;
    }

    pub fn apply<'a>(&self, templates: &'a [ContractTemplate]) -> Vec<&'a ContractTemplate> {
        let mut out: Vec<&ContractTemplate> = templates
            .iter()
            .filter(|t| self.country.as_deref().is_none_or(|c| t.country_code == c))
            .filter(|t| self.category.as_deref().is_none_or(|c| t.category == c))
            .filter(|t| match self.publish {
                PublishFilter::All => true,
                PublishFilter::Published => t.is_published(),
                PublishFilter::Draft => !t.is_published(),
            })
            .collect();
        out.sort_by(|a, b| {
            let ord = compare_templates(a, b, self.sort_field);
            match self.sort_dir {
                SortDir::Asc => ord,
                SortDir::Desc => ord.reverse(),
            }
        });
        out
    }

    /// One page of the filtered, sorted list plus the page count (at least 1).
    pub fn page<'a>(&self, templates: &'a [ContractTemplate]) -> (Vec<&'a ContractTemplate>, usize) {
        let all = self.apply(templates);
        let size = self.page_size.max(1);
        let total_pages = all.len().div_ceil(size).max(1);
        let page = self.page.min(total_pages - 1);
        let items = all.into_iter().skip(page * size).take(size).collect();
        (items, total_pages)
    }
}

fn compare_templates(a: &ContractTemplate, b: &ContractTemplate, field: TemplateSortField) -> Ordering {
    match field {
        TemplateSortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        TemplateSortField::Country => a.country_code.cmp(&b.country_code),
        TemplateSortField::Category => a.category.cmp(&b.category),
        TemplateSortField::Status => a.is_published().cmp(&b.is_published()),
        TemplateSortField::Date => {
            let ts = |t: &ContractTemplate| {
                t.created_at
                    .as_deref()
                    .and_then(parse_timestamp)
                    .map(|d| d.timestamp_millis())
                    .unwrap_or(0)
            };
            ts(a).cmp(&ts(b))
        }
    }
}
