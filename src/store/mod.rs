//! Company store
//!
//! Read-only lookups over the single `companies` table. The in-memory
//! implementation backs tests and database-less runs; `PgCompanyStore`
//! talks to Postgres.

pub mod postgres;
pub mod seed;

pub use postgres::PgCompanyStore;

use crate::error::ResearchError;
use crate::models::{CompanyFilter, CompanyRecord};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for company lookups
#[async_trait::async_trait]
pub trait CompanyStore: Send + Sync {
    /// Exact ticker hits win; otherwise case-insensitive name substring.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CompanyRecord>>;
    async fn filter(&self, filter: &CompanyFilter) -> Result<Vec<CompanyRecord>>;
    async fn get_by_id(&self, id: i64) -> Result<Option<CompanyRecord>>;
    async fn get_by_ticker(&self, ticker: &str) -> Result<Option<CompanyRecord>>;
    async fn count(&self) -> Result<usize>;
}

/// Market cap descending, unknown caps last.
pub(crate) fn rank_by_market_cap(records: &mut [CompanyRecord]) {
    records.sort_by(|a, b| b.market_cap.cmp(&a.market_cap));
}

/// In-memory company store
pub struct InMemoryCompanyStore {
    records: Arc<RwLock<Vec<CompanyRecord>>>,
}

impl InMemoryCompanyStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Store pre-loaded with the demo data set.
    pub fn seeded() -> Self {
        let now = Utc::now();
        let records = seed::demo_companies()
            .into_iter()
            .map(|mut c| {
                c.created_at = Some(now);
                c.updated_at = Some(now);
                c
            })
            .collect();

        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Administrative insert. Enforces record validity and ticker uniqueness.
    pub async fn insert(&self, record: CompanyRecord) -> Result<()> {
        record.validate()?;

        let mut records = self.records.write().await;

        if let Some(ticker) = record.ticker_symbol.as_deref() {
            if records.iter().any(|r| r.has_ticker(ticker)) {
                return Err(ResearchError::InvalidRecord(format!(
                    "ticker {} already exists",
                    ticker
                )));
            }
        }
        if records.iter().any(|r| r.id == record.id) {
            return Err(ResearchError::InvalidRecord(format!(
                "company id {} already exists",
                record.id
            )));
        }

        records.push(record);
        Ok(())
    }
}

impl Default for InMemoryCompanyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CompanyStore for InMemoryCompanyStore {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<CompanyRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let records = self.records.read().await;

        let mut hits: Vec<CompanyRecord> = records
            .iter()
            .filter(|r| r.has_ticker(query))
            .cloned()
            .collect();

        if hits.is_empty() {
            let needle = query.to_lowercase();
            hits = records
                .iter()
                .filter(|r| r.name.to_lowercase().contains(&needle))
                .cloned()
                .collect();
        }

        rank_by_market_cap(&mut hits);
        hits.truncate(limit);
        Ok(hits)
    }

    async fn filter(&self, filter: &CompanyFilter) -> Result<Vec<CompanyRecord>> {
        let records = self.records.read().await;

        let mut hits: Vec<CompanyRecord> = records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();

        rank_by_market_cap(&mut hits);
        hits.truncate(filter.limit);
        Ok(hits)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<CompanyRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }

    async fn get_by_ticker(&self, ticker: &str) -> Result<Option<CompanyRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.has_ticker(ticker)).cloned())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_every_ticker_returns_exactly_one_record() {
        let store = InMemoryCompanyStore::seeded();

        for company in seed::demo_companies() {
            let ticker = company.ticker_symbol.clone().unwrap();
            let hits = store.search(&ticker, 10).await.unwrap();
            assert_eq!(hits.len(), 1, "ticker {}", ticker);
            assert_eq!(hits[0].id, company.id);

            let lower = store.search(&ticker.to_lowercase(), 10).await.unwrap();
            assert_eq!(lower.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_name_substring_is_case_insensitive() {
        let store = InMemoryCompanyStore::seeded();

        let hits = store.search("apple", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].ticker_symbol.as_deref(), Some("AAPL"));

        let corp = store.search("corporation", 10).await.unwrap();
        assert!(corp.len() >= 3);
        assert!(corp
            .windows(2)
            .all(|w| w[0].market_cap >= w[1].market_cap));

        assert!(store.search("   ", 10).await.unwrap().is_empty());
        assert!(store.search("no such company", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sector_filter_only_returns_that_sector() {
        let store = InMemoryCompanyStore::seeded();
        let sectors = ["Technology", "Consumer Discretionary", "Energy", "Financials"];

        for sector in sectors {
            let filter = CompanyFilter {
                sector: Some(sector.to_string()),
                limit: 100,
                ..Default::default()
            };
            let hits = store.filter(&filter).await.unwrap();
            assert!(!hits.is_empty(), "sector {}", sector);
            assert!(hits
                .iter()
                .all(|c| c.sector.as_deref() == Some(sector)));
        }
    }

    #[tokio::test]
    async fn test_limit_and_point_lookups() {
        let store = InMemoryCompanyStore::seeded();

        let filter = CompanyFilter {
            limit: 2,
            ..Default::default()
        };
        assert_eq!(store.filter(&filter).await.unwrap().len(), 2);

        let tesla = store.get_by_ticker("tsla").await.unwrap().unwrap();
        assert_eq!(tesla.name, "Tesla Inc.");
        assert_eq!(store.get_by_id(tesla.id).await.unwrap(), Some(tesla));
        assert!(store.get_by_id(9_999).await.unwrap().is_none());
        assert_eq!(store.count().await.unwrap(), seed::demo_companies().len());
    }

    #[tokio::test]
    async fn test_insert_enforces_unique_ticker() {
        let store = InMemoryCompanyStore::seeded();
        let mut dup = seed::demo_companies().remove(0);
        dup.id = 500;

        let err = store.insert(dup).await.unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
