use std::{str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use time::UtcOffset;

use crate::nutrition::Macro;
use crate::store::schema::SchemaVersion;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct AirtableConfig {
    pub api_url: String,
    pub api_key: String,
    pub base_id: String,
    pub meals_table: String,
    pub goals_table: String,
    pub schema: SchemaVersion,
}

#[derive(Debug, Clone)]
pub enum StoreConfig {
    Airtable(AirtableConfig),
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub openai: OpenAiConfig,
    /// Per-user scoping is on only when a secret is configured.
    pub jwt: Option<JwtConfig>,
    pub cache_ttl: Duration,
    pub utc_offset: UtcOffset,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn required(key: &str) -> anyhow::Result<String> {
    var(key).ok_or_else(|| anyhow!("{key} must be set"))
}

fn parsed<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow!("{key}={raw:?} is invalid: {e}")),
        None => Ok(default),
    }
}

impl JwtConfig {
    /// `None` when `JWT_SECRET` is unset.
    pub fn from_env() -> anyhow::Result<Option<Self>> {
        let Some(secret) = var("JWT_SECRET") else {
            return Ok(None);
        };
        Ok(Some(Self {
            secret,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "macrotrack".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "macrotrack-users".into()),
            ttl_minutes: parsed("JWT_TTL_MINUTES", 60)?,
            refresh_ttl_minutes: parsed("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14)?,
        }))
    }
}

impl StoreConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let backend = var("STORE_BACKEND").unwrap_or_else(|| "airtable".into());
        match backend.to_ascii_lowercase().as_str() {
            "airtable" => Ok(StoreConfig::Airtable(AirtableConfig {
                api_url: var("AIRTABLE_API_URL")
                    .unwrap_or_else(|| "https://api.airtable.com".into()),
                api_key: required("AIRTABLE_API_KEY")?,
                base_id: required("AIRTABLE_BASE_ID")?,
                meals_table: var("AIRTABLE_MEALS_TABLE").unwrap_or_else(|| "Meals".into()),
                goals_table: var("AIRTABLE_GOALS_TABLE").unwrap_or_else(|| "Goals".into()),
                schema: parsed("SCHEMA_VERSION", SchemaVersion::CURRENT)?,
            })),
            "postgres" => Ok(StoreConfig::Postgres {
                database_url: required("DATABASE_URL")?,
            }),
            "memory" => Ok(StoreConfig::Memory),
            other => bail!("unknown STORE_BACKEND {other:?} (expected airtable, postgres or memory)"),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = StoreConfig::from_env().context("store configuration")?;

        let openai = OpenAiConfig {
            api_key: required("OPENAI_API_KEY")?,
            api_url: var("OPENAI_API_URL").unwrap_or_else(|| "https://api.openai.com".into()),
            model: var("OPENAI_MODEL").unwrap_or_else(|| "gpt-3.5-turbo".into()),
            temperature: parsed("OPENAI_TEMPERATURE", 0.1)?,
            max_tokens: parsed("OPENAI_MAX_TOKENS", 150)?,
        };

        let jwt = JwtConfig::from_env()?;

        if let (Some(_), StoreConfig::Airtable(at)) = (&jwt, &store) {
            if at.schema.owner().is_none() {
                bail!("JWT_SECRET requires SCHEMA_VERSION=2; the v1 tables have no owner column");
            }
        }

        let offset_hours: i8 = parsed("TZ_OFFSET_HOURS", 8)?;
        let utc_offset = UtcOffset::from_hms(offset_hours, 0, 0)
            .with_context(|| format!("TZ_OFFSET_HOURS={offset_hours} is out of range"))?;

        Ok(Self {
            store,
            openai,
            jwt,
            cache_ttl: Duration::from_secs(parsed("CACHE_TTL_SECS", 300)?),
            utc_offset,
        })
    }

    /// Nutrients the configured store has a column for.
    pub fn stored_macros(&self) -> Vec<Macro> {
        match &self.store {
            StoreConfig::Airtable(at) => Macro::ALL
                .into_iter()
                .filter(|m| at.schema.macro_field(*m).is_some())
                .collect(),
            _ => Macro::ALL.to_vec(),
        }
    }

    /// Memory store, no auth, no OpenAI key. Used by handler tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            store: StoreConfig::Memory,
            openai: OpenAiConfig {
                api_key: "test".into(),
                api_url: "http://127.0.0.1:9".into(),
                model: "gpt-3.5-turbo".into(),
                temperature: 0.1,
                max_tokens: 150,
            },
            jwt: None,
            cache_ttl: Duration::from_secs(300),
            utc_offset: UtcOffset::UTC,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_and_reports_bad_values() {
        std::env::set_var("MACROTRACK_TEST_PARSED_OK", " 42 ");
        std::env::set_var("MACROTRACK_TEST_PARSED_BAD", "forty");
        assert_eq!(parsed::<u64>("MACROTRACK_TEST_PARSED_OK", 1).unwrap(), 42);
        assert_eq!(parsed::<u64>("MACROTRACK_TEST_PARSED_MISSING", 7).unwrap(), 7);
        let err = parsed::<u64>("MACROTRACK_TEST_PARSED_BAD", 1).unwrap_err();
        assert!(err.to_string().contains("MACROTRACK_TEST_PARSED_BAD"));
    }

    #[test]
    fn blank_values_count_as_unset() {
        std::env::set_var("MACROTRACK_TEST_BLANK", "   ");
        assert_eq!(var("MACROTRACK_TEST_BLANK"), None);
        assert!(required("MACROTRACK_TEST_BLANK").is_err());
    }

    #[test]
    fn legacy_airtable_schema_stores_no_cholesterol() {
        let mut config = AppConfig::for_tests();
        assert_eq!(config.stored_macros(), Macro::ALL.to_vec());

        config.store = StoreConfig::Airtable(AirtableConfig {
            api_url: "http://127.0.0.1:9".into(),
            api_key: "key".into(),
            base_id: "appBase".into(),
            meals_table: "Meals".into(),
            goals_table: "Goals".into(),
            schema: SchemaVersion::V1,
        });
        assert!(!config.stored_macros().contains(&Macro::Cholesterol));
        assert_eq!(config.stored_macros().len(), 4);
    }
}
