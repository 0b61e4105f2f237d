//! Demo data set loaded into an empty store.

use crate::models::CompanyRecord;

struct SeedRow {
    name: &'static str,
    ticker: &'static str,
    industry: &'static str,
    sector: &'static str,
    market_cap: i64,
    employees: i32,
    founded_year: i32,
    headquarters: &'static str,
    website: &'static str,
    description: &'static str,
}

const SEED: &[SeedRow] = &[
    SeedRow {
        name: "Apple Inc.",
        ticker: "AAPL",
        industry: "Consumer Electronics",
        sector: "Technology",
        market_cap: 3_000_000_000_000,
        employees: 164_000,
        founded_year: 1976,
        headquarters: "Cupertino, CA",
        website: "https://www.apple.com",
        description: "Apple Inc. is an American multinational technology company specializing in consumer electronics, software, and online services.",
    },
    SeedRow {
        name: "Microsoft Corporation",
        ticker: "MSFT",
        industry: "Software",
        sector: "Technology",
        market_cap: 2_800_000_000_000,
        employees: 221_000,
        founded_year: 1975,
        headquarters: "Redmond, WA",
        website: "https://www.microsoft.com",
        description: "Microsoft Corporation is an American multinational technology corporation.",
    },
    SeedRow {
        name: "Alphabet Inc.",
        ticker: "GOOGL",
        industry: "Internet Content & Information",
        sector: "Communication Services",
        market_cap: 1_700_000_000_000,
        employees: 182_000,
        founded_year: 1998,
        headquarters: "Mountain View, CA",
        website: "https://abc.xyz",
        description: "Alphabet Inc. is the parent company of Google and several former Google subsidiaries.",
    },
    SeedRow {
        name: "Amazon.com Inc.",
        ticker: "AMZN",
        industry: "Internet Retail",
        sector: "Consumer Discretionary",
        market_cap: 1_500_000_000_000,
        employees: 1_525_000,
        founded_year: 1994,
        headquarters: "Seattle, WA",
        website: "https://www.amazon.com",
        description: "Amazon.com Inc. is an American multinational company focused on e-commerce, cloud computing, and digital streaming.",
    },
    SeedRow {
        name: "NVIDIA Corporation",
        ticker: "NVDA",
        industry: "Semiconductors",
        sector: "Technology",
        market_cap: 1_200_000_000_000,
        employees: 29_600,
        founded_year: 1993,
        headquarters: "Santa Clara, CA",
        website: "https://www.nvidia.com",
        description: "NVIDIA designs graphics processing units and system-on-chip units for gaming, data centers, and AI.",
    },
    SeedRow {
        name: "Tesla Inc.",
        ticker: "TSLA",
        industry: "Electric Vehicles",
        sector: "Consumer Discretionary",
        market_cap: 800_000_000_000,
        employees: 140_000,
        founded_year: 2003,
        headquarters: "Austin, TX",
        website: "https://www.tesla.com",
        description: "Tesla, Inc. is an American electric vehicle and clean energy company.",
    },
    SeedRow {
        name: "JPMorgan Chase & Co.",
        ticker: "JPM",
        industry: "Banks",
        sector: "Financials",
        market_cap: 500_000_000_000,
        employees: 309_000,
        founded_year: 1799,
        headquarters: "New York, NY",
        website: "https://www.jpmorganchase.com",
        description: "JPMorgan Chase is an American multinational financial services firm.",
    },
    SeedRow {
        name: "Johnson & Johnson",
        ticker: "JNJ",
        industry: "Pharmaceuticals",
        sector: "Health Care",
        market_cap: 380_000_000_000,
        employees: 131_900,
        founded_year: 1886,
        headquarters: "New Brunswick, NJ",
        website: "https://www.jnj.com",
        description: "Johnson & Johnson develops medical devices and pharmaceuticals.",
    },
    SeedRow {
        name: "Exxon Mobil Corporation",
        ticker: "XOM",
        industry: "Oil & Gas",
        sector: "Energy",
        market_cap: 420_000_000_000,
        employees: 62_000,
        founded_year: 1999,
        headquarters: "Spring, TX",
        website: "https://corporate.exxonmobil.com",
        description: "Exxon Mobil is an American multinational oil and gas corporation.",
    },
];

/// Demo companies with ids assigned in seed order, starting at 1.
pub fn demo_companies() -> Vec<CompanyRecord> {
    SEED.iter()
        .enumerate()
        .map(|(i, row)| CompanyRecord {
            id: i as i64 + 1,
            name: row.name.to_string(),
            ticker_symbol: Some(row.ticker.to_string()),
            industry: Some(row.industry.to_string()),
            sector: Some(row.sector.to_string()),
            market_cap: Some(row.market_cap),
            employees: Some(row.employees),
            founded_year: Some(row.founded_year),
            headquarters: Some(row.headquarters.to_string()),
            website: Some(row.website.to_string()),
            description: Some(row.description.to_string()),
            created_at: None,
            updated_at: None,
        })
        .collect()
}
