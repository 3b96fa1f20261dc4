//! Product catalog: read-only query execution for the dialogue layer plus
//! bulk import and document rendering for the offline commands.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info};

use brocha_core::error::BrochaError;

use crate::db::Database;

/// One result row: column values in select order, rendered as text.
/// SQL NULL becomes `None`.
pub type Row = Vec<Option<String>>;

/// A relational store the structured answerer can query.
///
/// Implementations must refuse statements that write.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, BrochaError>;
}

/// A product as produced by the catalog scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub marca: String,
    pub nombre: String,
    #[serde(default, deserialize_with = "price_text")]
    pub precio_regular: Option<String>,
    #[serde(default, deserialize_with = "price_text")]
    pub precio_promo: Option<String>,
    #[serde(default)]
    pub categoria: Option<String>,
}

/// Prices arrive either as scraped strings ("$ 12.500") or as numbers.
fn price_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Price {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Option::<Price>::deserialize(deserializer)? {
        Some(Price::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Price::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Outcome of a catalog import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub products: usize,
    pub categories_created: usize,
}

/// A product rendered as a single indexable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDocument {
    pub id: String,
    pub text: String,
}

/// SQLite-backed product catalog.
pub struct Catalog {
    db: Arc<Database>,
}

impl Catalog {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Load a JSON array of [`ProductRecord`]s from disk and insert them.
    pub fn import_json(&self, path: &Path) -> Result<ImportReport, BrochaError> {
        let content = std::fs::read_to_string(path)?;
        let records: Vec<ProductRecord> = serde_json::from_str(&content)?;
        let report = self.import_products(&records)?;
        info!(
            path = %path.display(),
            products = report.products,
            categories_created = report.categories_created,
            "Catalog imported"
        );
        Ok(report)
    }

    /// Insert products in one transaction, creating categories on demand.
    pub fn import_products(&self, records: &[ProductRecord]) -> Result<ImportReport, BrochaError> {
        self.db.with_conn(|conn| {
            let tx = conn
                .unchecked_transaction()
                .map_err(|e| BrochaError::Storage(format!("Failed to begin import: {}", e)))?;

            let mut report = ImportReport::default();
            for record in records {
                let categoria_id = match record
                    .categoria
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                {
                    Some(name) => {
                        let existing: Option<i64> = tx
                            .query_row(
                                "SELECT id FROM categorias WHERE nombre = ?1",
                                rusqlite::params![name],
                                |row| row.get(0),
                            )
                            .optional()
                            .map_err(|e| BrochaError::Storage(e.to_string()))?;
                        match existing {
                            Some(id) => Some(id),
                            None => {
                                tx.execute(
                                    "INSERT INTO categorias (nombre) VALUES (?1)",
                                    rusqlite::params![name],
                                )
                                .map_err(|e| {
                                    BrochaError::Storage(format!(
                                        "Failed to create category: {}",
                                        e
                                    ))
                                })?;
                                report.categories_created += 1;
                                Some(tx.last_insert_rowid())
                            }
                        }
                    }
                    None => None,
                };

                tx.execute(
                    "INSERT INTO productos (marca, nombre, precio_regular, precio_promo, categoria_id)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    rusqlite::params![
                        record.marca,
                        record.nombre,
                        record.precio_regular,
                        record.precio_promo,
                        categoria_id,
                    ],
                )
                .map_err(|e| BrochaError::Storage(format!("Failed to save product: {}", e)))?;
                report.products += 1;
            }

            tx.commit()
                .map_err(|e| BrochaError::Storage(format!("Failed to commit import: {}", e)))?;
            Ok(report)
        })
    }

    /// Render every product as
    /// `Marca: … | Producto: … | Categoría: … | Precio: $… | Precio Promocional: $…`.
    pub fn product_documents(&self) -> Result<Vec<ProductDocument>, BrochaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT p.id, p.marca, p.nombre, p.precio_regular, p.precio_promo, c.nombre
                     FROM productos p
                     LEFT JOIN categorias c ON p.categoria_id = c.id
                     ORDER BY p.id ASC",
                )
                .map_err(|e| BrochaError::Storage(e.to_string()))?;

            let rows = stmt
                .query_map([], |row| {
                    let id: i64 = row.get(0)?;
                    let marca: String = row.get(1)?;
                    let nombre: String = row.get(2)?;
                    let regular: Option<String> = row.get(3)?;
                    let promo: Option<String> = row.get(4)?;
                    let categoria: Option<String> = row.get(5)?;
                    Ok(ProductDocument {
                        id: format!("prod_{}", id),
                        text: format!(
                            "Marca: {} | Producto: {} | Categoría: {} | Precio: ${} | Precio Promocional: ${}",
                            marca,
                            nombre,
                            non_blank(categoria).unwrap_or_else(|| "Sin categoría".to_string()),
                            non_blank(regular).unwrap_or_else(|| "0".to_string()),
                            non_blank(promo).unwrap_or_else(|| "0".to_string()),
                        ),
                    })
                })
                .map_err(|e| BrochaError::Storage(e.to_string()))?;

            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| BrochaError::Storage(e.to_string()))
        })
    }

    /// Count catalog products.
    pub fn count(&self) -> Result<u64, BrochaError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM productos", [], |row| row.get(0))
                .map_err(|e| BrochaError::Storage(e.to_string()))?;
            Ok(count as u64)
        })
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<Row>, BrochaError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(sql)
                .map_err(|e| BrochaError::Storage(e.to_string()))?;
            if !stmt.readonly() {
                return Err(BrochaError::Storage(
                    "refusing to run a statement that modifies the catalog".to_string(),
                ));
            }

            let columns = stmt.column_count();
            let mut rows = stmt
                .query([])
                .map_err(|e| BrochaError::Storage(e.to_string()))?;

            let mut out = Vec::new();
            while let Some(row) = rows.next().map_err(|e| BrochaError::Storage(e.to_string()))? {
                let mut values = Vec::with_capacity(columns);
                for idx in 0..columns {
                    let value = row
                        .get_ref(idx)
                        .map_err(|e| BrochaError::Storage(e.to_string()))?;
                    values.push(value_to_text(value));
                }
                out.push(values);
            }
            Ok(out)
        })
    }
}

#[async_trait]
impl RelationalStore for Catalog {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>, BrochaError> {
        debug!(sql, "Executing catalog query");
        self.query_rows(sql)
    }
}

fn value_to_text(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
        ValueRef::Text(t) => Some(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn make_catalog() -> Catalog {
        Catalog::new(Arc::new(Database::in_memory().unwrap()))
    }

    fn product(marca: &str, nombre: &str, regular: &str, promo: Option<&str>) -> ProductRecord {
        ProductRecord {
            marca: marca.to_string(),
            nombre: nombre.to_string(),
            precio_regular: Some(regular.to_string()),
            precio_promo: promo.map(str::to_string),
            categoria: Some("Latex".to_string()),
        }
    }

    #[test]
    fn test_import_products_creates_categories_once() {
        let catalog = make_catalog();
        let mut esmalte = product("Sherwin", "Esmalte Sintético", "2500", None);
        esmalte.categoria = Some("Esmaltes".to_string());
        let report = catalog
            .import_products(&[
                product("Alba", "Latex Blanco", "1000", Some("800")),
                product("Alba", "Latex Interior", "900", None),
                esmalte,
            ])
            .unwrap();

        assert_eq!(report.products, 3);
        assert_eq!(report.categories_created, 2);
        assert_eq!(catalog.count().unwrap(), 3);
    }

    #[test]
    fn test_import_json_accepts_numeric_and_text_prices() {
        let catalog = make_catalog();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"[
                {"marca": "Alba", "nombre": "Latex Blanco", "precio_regular": 1000, "precio_promo": "800"},
                {"marca": "Tersuave", "nombre": "Barniz", "precio_regular": "$ 3.200"}
            ]"#,
        )
        .unwrap();

        let report = catalog.import_json(file.path()).unwrap();
        assert_eq!(report.products, 2);
        assert_eq!(report.categories_created, 0);

        let docs = catalog.product_documents().unwrap();
        assert_eq!(
            docs[0].text,
            "Marca: Alba | Producto: Latex Blanco | Categoría: Sin categoría | Precio: $1000 | Precio Promocional: $800"
        );
        assert_eq!(
            docs[1].text,
            "Marca: Tersuave | Producto: Barniz | Categoría: Sin categoría | Precio: $$ 3.200 | Precio Promocional: $0"
        );
    }

    #[test]
    fn test_import_json_rejects_malformed_file() {
        let catalog = make_catalog();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{ not an array").unwrap();

        let err = catalog.import_json(file.path()).unwrap_err();
        assert!(matches!(err, BrochaError::Serialization(_)));
        assert_eq!(catalog.count().unwrap(), 0);
    }

    #[test]
    fn test_product_documents_include_category() {
        let catalog = make_catalog();
        catalog
            .import_products(&[product("Alba", "Latex Blanco", "1000", Some("800"))])
            .unwrap();

        let docs = catalog.product_documents().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "prod_1");
        assert!(docs[0].text.contains("Categoría: Latex"));
    }

    #[tokio::test]
    async fn test_execute_returns_text_rows_with_nulls() {
        let catalog = make_catalog();
        catalog
            .import_products(&[product("Alba", "Latex Blanco", "1000", None)])
            .unwrap();

        let rows = catalog
            .execute("SELECT marca, nombre, precio_regular, precio_promo, id FROM productos")
            .await
            .unwrap();
        assert_eq!(
            rows,
            vec![vec![
                Some("Alba".to_string()),
                Some("Latex Blanco".to_string()),
                Some("1000".to_string()),
                None,
                Some("1".to_string()),
            ]]
        );
    }

    #[tokio::test]
    async fn test_execute_refuses_writes() {
        let catalog = make_catalog();
        let err = catalog
            .execute("DELETE FROM productos")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("refusing"));
    }

    #[tokio::test]
    async fn test_execute_reports_bad_sql() {
        let catalog = make_catalog();
        let err = catalog.execute("SELECT nope FROM nowhere").await.unwrap_err();
        assert!(matches!(err, BrochaError::Storage(_)));
    }
}
