//! Catalog answers.
//!
//! The query is chosen by keyword: a price question gets the price-scoped
//! query over the featured brands, anything else gets a short product
//! listing. This heuristic ignores the brand actually named in the question.

use std::sync::Arc;

use tracing::{debug, error};

use brocha_core::config::CatalogConfig;
use brocha_core::types::StructuredRecord;
use brocha_storage::{RelationalStore, Row};

use crate::error::ChatError;
use crate::prompts;

/// Lower-cased substrings that mark a question as being about prices.
const PRICE_TRIGGERS: [&str; 7] = ["precio", "cuesta", "cuánto", "cuanto", "vale", "oferta", "promo"];

pub struct StructuredAnswerer {
    store: Arc<dyn RelationalStore>,
    featured_brands: Vec<String>,
    row_limit: usize,
}

impl StructuredAnswerer {
    pub fn new(store: Arc<dyn RelationalStore>, config: &CatalogConfig) -> Self {
        Self {
            store,
            featured_brands: config.featured_brands.clone(),
            row_limit: config.row_limit.max(1),
        }
    }

    pub fn is_price_question(question: &str) -> bool {
        let lowered = question.to_lowercase();
        PRICE_TRIGGERS.iter().any(|t| lowered.contains(t))
    }

    /// The read-only SQL used to answer `question`.
    pub fn build_query(&self, question: &str) -> String {
        if !Self::is_price_question(question) {
            return format!(
                "SELECT DISTINCT marca, nombre FROM productos LIMIT {}",
                self.row_limit
            );
        }

        let filter = self
            .featured_brands
            .iter()
            .map(|brand| format!("marca LIKE '%{}%'", brand.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(" OR ");
        let mut sql =
            String::from("SELECT marca, nombre, precio_regular, precio_promo FROM productos");
        if !filter.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&filter);
        }
        sql.push_str(&format!(" LIMIT {}", self.row_limit));
        sql
    }

    /// Run the query for `question` and render the rows.
    pub async fn query(&self, question: &str) -> Result<String, ChatError> {
        let sql = self.build_query(question);
        debug!(sql = %sql, "Running catalog query");

        let rows = self.store.execute(&sql).await.map_err(|e| {
            error!(sql = %sql, error = %e, "Catalog query failed");
            ChatError::StructuredQuery(e.to_string())
        })?;
        if rows.is_empty() {
            return Ok(prompts::NO_PRODUCTS.to_string());
        }
        Ok(format_rows(&rows))
    }

    /// Like [`query`](Self::query), but never fails: a database error
    /// becomes part of the reply text.
    pub async fn answer(&self, question: &str) -> String {
        match self.query(question).await {
            Ok(reply) => reply,
            Err(ChatError::StructuredQuery(cause)) => {
                format!("{}{}", prompts::DATABASE_ERROR_PREFIX, cause)
            }
            Err(e) => format!("{}{}", prompts::DATABASE_ERROR_PREFIX, e),
        }
    }
}

fn format_rows(rows: &[Row]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(prompts::PRODUCTS_HEADER.to_string());
    lines.extend(rows.iter().map(format_row));
    lines.join("\n")
}

fn format_row(row: &Row) -> String {
    let cell = |i: usize| row.get(i).cloned().flatten().unwrap_or_default();
    if row.len() >= 3 {
        StructuredRecord {
            brand: cell(0),
            name: cell(1),
            regular_price: cell(2),
            promo_price: row.get(3).cloned().flatten(),
        }
        .to_line()
    } else {
        let values = row
            .iter()
            .map(|v| v.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join(" ");
        format!("- {}", values)
    }
}
