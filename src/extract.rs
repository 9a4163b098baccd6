/// Meta tag extraction from fetched watch pages
use crate::config::ExtractConfig;
use crate::error::{CollectorError, Result};
use crate::store::AttributeMap;
use scraper::{Html, Selector};
use tracing::debug;

/// Reads name/value attribute pairs off every `meta` element of a page
#[derive(Debug, Clone)]
pub struct MetaExtractor {
    selector: Selector,
    name_attribute: String,
    value_attribute: String,
}

impl MetaExtractor {
    pub fn new(name_attribute: impl Into<String>, value_attribute: impl Into<String>) -> Result<Self> {
        let selector = Selector::parse("meta")
            .map_err(|e| CollectorError::Config(format!("invalid meta selector: {:?}", e)))?;

        Ok(Self {
            selector,
            name_attribute: name_attribute.into(),
            value_attribute: value_attribute.into(),
        })
    }

    pub fn from_config(config: &ExtractConfig) -> Result<Self> {
        Self::new(config.name_attribute.clone(), config.value_attribute.clone())
    }

    /// Build the attribute map for one page. Elements lacking either
    /// attribute, or carrying an empty one, are skipped. A repeated name keeps
    /// the value of the last element in document order.
    pub fn extract(&self, html: &str) -> AttributeMap {
        let document = Html::parse_document(html);
        let mut attributes = AttributeMap::new();
        let mut seen = 0usize;

        for element in document.select(&self.selector) {
            seen += 1;
            let element = element.value();
            let name = element.attr(&self.name_attribute).unwrap_or("");
            let value = element.attr(&self.value_attribute).unwrap_or("");

            if !name.is_empty() && !value.is_empty() {
                attributes.insert(name.to_string(), value.to_string());
            }
        }

        debug!(
            "🏷️ Scanned {} meta elements, kept {} attributes",
            seen,
            attributes.len()
        );
        attributes
    }
}
