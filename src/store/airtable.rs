//! Airtable REST backend. One base, a "Meals" and a "Goals" table.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use time::Date;
use tracing::{debug, info, warn};

use super::schema::{self, Fields, SchemaVersion};
use super::{MigrationReport, Store, StoreError};
use crate::config::AirtableConfig;
use crate::nutrition::{GoalProfile, MacroValues, MealPatch, MealRecord, NewMeal};

#[derive(Debug, Deserialize)]
struct RecordPage {
    records: Vec<AirtableRecord>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AirtableRecord {
    id: String,
    #[serde(default)]
    fields: Fields,
}

#[derive(Debug, Serialize)]
struct FieldsBody<'a> {
    fields: &'a Fields,
}

#[derive(Debug, Default)]
struct ListQuery<'a> {
    formula: Option<String>,
    sort_desc: Option<&'a str>,
    max_records: Option<usize>,
}

lazy_static! {
    static ref RECORD_ID: Regex = Regex::new(r"^rec[A-Za-z0-9]{1,32}$").unwrap();
}

/// Record ids end up in the request path; anything not shaped like one cannot exist.
fn check_record_id(id: &str) -> Result<&str, StoreError> {
    if RECORD_ID.is_match(id) {
        Ok(id)
    } else {
        Err(StoreError::NotFound(id.to_string()))
    }
}

/// Wraps a value as an Airtable formula string literal.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn and_all(clauses: Vec<String>) -> Option<String> {
    match clauses.len() {
        0 => None,
        1 => clauses.into_iter().next(),
        _ => Some(format!("AND({})", clauses.join(", "))),
    }
}

fn owner_clause(version: SchemaVersion, owner: Option<&str>) -> Option<String> {
    let owner = owner?;
    match version.owner() {
        Some(column) => Some(format!("{{{column}}} = {}", quote(owner))),
        None => {
            warn!(%owner, "schema has no owner column; owner filter ignored");
            None
        }
    }
}

/// `filterByFormula` for a meal listing.
pub fn meals_formula(version: SchemaVersion, owner: Option<&str>, date: Option<Date>) -> Option<String> {
    let mut clauses = Vec::new();
    if let Some(date) = date {
        clauses.push(format!("IS_SAME({{{}}}, {})", version.date(), quote(&date.to_string())));
    }
    clauses.extend(owner_clause(version, owner));
    and_all(clauses)
}

pub fn goals_formula(version: SchemaVersion, owner: Option<&str>) -> Option<String> {
    and_all(owner_clause(version, owner).into_iter().collect())
}

#[derive(Clone)]
pub struct AirtableStore {
    client: Client,
    cfg: AirtableConfig,
}

impl AirtableStore {
    pub fn new(cfg: AirtableConfig) -> Self {
        Self {
            client: Client::new(),
            cfg,
        }
    }

    fn version(&self) -> SchemaVersion {
        self.cfg.schema
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/v0/{}/{}",
            self.cfg.api_url.trim_end_matches('/'),
            self.cfg.base_id,
            table
        )
    }

    fn record_url(&self, table: &str, id: &str) -> Result<String, StoreError> {
        Ok(format!("{}/{}", self.table_url(table), check_record_id(id)?))
    }

    /// Sends the request; 404 becomes `NotFound(what)`, any other failure
    /// status a connectivity error carrying the response body.
    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Response, StoreError> {
        let res = req.bearer_auth(&self.cfg.api_key).send().await?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(what.to_string()));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(StoreError::Connectivity(format!(
                "airtable returned {}: {}",
                status.as_u16(),
                body
            )));
        }
        Ok(res)
    }

    async fn decode<T: for<'de> Deserialize<'de>>(res: Response) -> Result<T, StoreError> {
        res.json::<T>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn list_records(
        &self,
        table: &str,
        query: ListQuery<'_>,
    ) -> Result<Vec<AirtableRecord>, StoreError> {
        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut params: Vec<(&str, String)> = Vec::new();
            if let Some(formula) = &query.formula {
                params.push(("filterByFormula", formula.clone()));
            }
            if let Some(field) = query.sort_desc {
                params.push(("sort[0][field]", field.to_string()));
                params.push(("sort[0][direction]", "desc".to_string()));
            }
            if let Some(max) = query.max_records {
                params.push(("maxRecords", max.to_string()));
            }
            if let Some(offset) = &offset {
                params.push(("offset", offset.clone()));
            }

            let req = self.client.get(self.table_url(table)).query(&params);
            let page: RecordPage = Self::decode(self.send(req, table).await?).await?;
            records.extend(page.records);

            let reached_max = query.max_records.is_some_and(|max| records.len() >= max);
            match page.offset {
                Some(next) if !reached_max => offset = Some(next),
                _ => break,
            }
        }
        debug!(table, count = records.len(), "airtable records fetched");
        Ok(records)
    }

    async fn get_record(&self, table: &str, id: &str) -> Result<AirtableRecord, StoreError> {
        let req = self.client.get(self.record_url(table, id)?);
        Self::decode(self.send(req, id).await?).await
    }

    async fn create_record(&self, table: &str, fields: &Fields) -> Result<AirtableRecord, StoreError> {
        let req = self.client.post(self.table_url(table)).json(&FieldsBody { fields });
        Self::decode(self.send(req, table).await?).await
    }

    async fn update_record(
        &self,
        table: &str,
        id: &str,
        fields: &Fields,
    ) -> Result<AirtableRecord, StoreError> {
        let req = self
            .client
            .patch(self.record_url(table, id)?)
            .json(&FieldsBody { fields });
        Self::decode(self.send(req, id).await?).await
    }

    async fn migrate_table(&self, table: &str) -> Result<MigrationReport, StoreError> {
        let mut report = MigrationReport::default();
        for record in self.list_records(table, ListQuery::default()).await? {
            let additions = schema::migrate_fields(SchemaVersion::V1, self.version(), &record.fields);
            if additions.is_empty() {
                report.skipped += 1;
                continue;
            }
            self.update_record(table, &record.id, &additions).await?;
            report.migrated += 1;
        }
        info!(table, migrated = report.migrated, skipped = report.skipped, "table migrated");
        Ok(report)
    }
}

#[async_trait]
impl Store for AirtableStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        for table in [&self.cfg.meals_table, &self.cfg.goals_table] {
            let query = ListQuery {
                max_records: Some(1),
                ..Default::default()
            };
            self.list_records(table, query).await?;
        }
        Ok(())
    }

    async fn list_meals(
        &self,
        owner: Option<&str>,
        date: Option<Date>,
    ) -> Result<Vec<MealRecord>, StoreError> {
        let version = self.version();
        let query = ListQuery {
            formula: meals_formula(version, owner, date),
            sort_desc: Some(version.date()),
            max_records: None,
        };
        let records = self.list_records(&self.cfg.meals_table, query).await?;
        Ok(records
            .into_iter()
            .map(|r| schema::meal_from_fields(version, r.id, &r.fields))
            .collect())
    }

    async fn get_meal(&self, owner: Option<&str>, id: &str) -> Result<MealRecord, StoreError> {
        let record = self.get_record(&self.cfg.meals_table, id).await?;
        let meal = schema::meal_from_fields(self.version(), record.id, &record.fields);
        if owner.is_some() && self.version().owner().is_some() && meal.owner.as_deref() != owner {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(meal)
    }

    async fn create_meal(
        &self,
        owner: Option<&str>,
        meal: &NewMeal,
    ) -> Result<MealRecord, StoreError> {
        let version = self.version();
        let fields = schema::meal_to_fields(version, owner, meal);
        let record = self.create_record(&self.cfg.meals_table, &fields).await?;
        Ok(schema::meal_from_fields(version, record.id, &record.fields))
    }

    async fn update_meal(
        &self,
        owner: Option<&str>,
        id: &str,
        patch: &MealPatch,
    ) -> Result<MealRecord, StoreError> {
        // Existence and ownership are checked before writing.
        self.get_meal(owner, id).await?;
        let version = self.version();
        let fields = schema::patch_to_fields(version, patch);
        let record = self.update_record(&self.cfg.meals_table, id, &fields).await?;
        Ok(schema::meal_from_fields(version, record.id, &record.fields))
    }

    async fn find_goals(&self, owner: Option<&str>) -> Result<Option<GoalProfile>, StoreError> {
        let version = self.version();
        let query = ListQuery {
            formula: goals_formula(version, owner),
            ..Default::default()
        };
        let records = self.list_records(&self.cfg.goals_table, query).await?;
        if records.len() > 1 {
            warn!(count = records.len(), ?owner, "several goal rows; using the lowest id");
        }
        Ok(records
            .into_iter()
            .min_by(|a, b| a.id.cmp(&b.id))
            .map(|r| schema::goals_from_fields(version, r.id, &r.fields)))
    }

    async fn create_goals(
        &self,
        owner: Option<&str>,
        targets: &MacroValues,
    ) -> Result<GoalProfile, StoreError> {
        let version = self.version();
        let fields = schema::goals_to_fields(version, owner, targets);
        let record = self.create_record(&self.cfg.goals_table, &fields).await?;
        Ok(schema::goals_from_fields(version, record.id, &record.fields))
    }

    async fn update_goals(
        &self,
        id: &str,
        targets: &MacroValues,
    ) -> Result<GoalProfile, StoreError> {
        let version = self.version();
        let fields = schema::goals_to_fields(version, None, targets);
        let record = self.update_record(&self.cfg.goals_table, id, &fields).await?;
        Ok(schema::goals_from_fields(version, record.id, &record.fields))
    }

    async fn migrate_schema(&self) -> Result<MigrationReport, StoreError> {
        if self.version() != SchemaVersion::CURRENT {
            warn!(schema = ?self.version(), "configured schema is not current; nothing to migrate");
            return Ok(MigrationReport::default());
        }
        let meals = self.migrate_table(&self.cfg.meals_table).await?;
        let goals = self.migrate_table(&self.cfg.goals_table).await?;
        Ok(MigrationReport {
            migrated: meals.migrated + goals.migrated,
            skipped: meals.skipped + goals.skipped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::date;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer, schema: SchemaVersion) -> AirtableStore {
        AirtableStore::new(AirtableConfig {
            api_url: server.uri(),
            api_key: "key-test".into(),
            base_id: "appBase".into(),
            meals_table: "Meals".into(),
            goals_table: "Goals".into(),
            schema,
        })
    }

    #[test]
    fn formula_combines_date_and_owner() {
        assert_eq!(meals_formula(SchemaVersion::V2, None, None), None);
        assert_eq!(
            meals_formula(SchemaVersion::V2, None, Some(date!(2024 - 05 - 06))),
            Some("IS_SAME({date}, '2024-05-06')".to_string())
        );
        assert_eq!(
            meals_formula(SchemaVersion::V2, Some("o'neil@example.com"), Some(date!(2024 - 05 - 06))),
            Some("AND(IS_SAME({date}, '2024-05-06'), {user_email} = 'o\\'neil@example.com')".to_string())
        );
        assert_eq!(
            meals_formula(SchemaVersion::V1, Some("a@example.com"), None),
            None
        );
    }

    #[tokio::test]
    async fn list_meals_sends_filter_sort_and_follows_offset() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/appBase/Meals"))
            .and(header("authorization", "Bearer key-test"))
            .and(query_param("filterByFormula", "IS_SAME({date}, '2024-05-06')"))
            .and(query_param("sort[0][field]", "date"))
            .and(query_param("sort[0][direction]", "desc"))
            .and(query_param("offset", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [{"id": "rec2", "fields": {"date": "2024-05-06", "meal": "Dinner", "calories_kcal": 700}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v0/appBase/Meals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [{"id": "rec1", "fields": {"date": "2024-05-06", "meal": "Lunch", "calories_kcal": 500}}],
                "offset": "page2"
            })))
            .mount(&server)
            .await;

        let meals = store(&server, SchemaVersion::V2)
            .list_meals(None, Some(date!(2024 - 05 - 06)))
            .await
            .unwrap();
        let ids: Vec<_> = meals.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, ["rec1", "rec2"]);
        assert_eq!(meals[1].macros.calories, 700.0);
    }

    #[tokio::test]
    async fn update_of_unknown_record_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/appBase/Meals/recMissing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "NOT_FOUND"})))
            .mount(&server)
            .await;

        let patch = MealPatch {
            calories: Some(1.0),
            ..Default::default()
        };
        let err = store(&server, SchemaVersion::V2)
            .update_meal(None, "recMissing", &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "recMissing"));
    }

    #[test]
    fn record_ids_must_look_like_airtable_ids() {
        assert_eq!(check_record_id("recAbc123").unwrap(), "recAbc123");
        for bad in ["", "rec", "../Goals/recG", "recA/B", "recA?view=x", "abc123"] {
            assert!(matches!(check_record_id(bad), Err(StoreError::NotFound(id)) if id == bad));
        }
    }

    #[tokio::test]
    async fn traversal_id_never_reaches_airtable() {
        let server = MockServer::start().await;
        Mock::given(wiremock::matchers::any())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "recG", "fields": {}})))
            .expect(0)
            .mount(&server)
            .await;

        let patch = MealPatch {
            calories: Some(1.0),
            ..Default::default()
        };
        let err = store(&server, SchemaVersion::V2)
            .update_meal(None, "../Goals/recG", &patch)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "../Goals/recG"));
    }

    #[tokio::test]
    async fn duplicate_goal_rows_resolve_to_lowest_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/appBase/Goals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    {"id": "recZZ", "fields": {"calories_kcal": 1800, "user_email": "a@example.com"}},
                    {"id": "recAA", "fields": {"calories_kcal": 2200, "user_email": "a@example.com"}}
                ]
            })))
            .mount(&server)
            .await;

        let goals = store(&server, SchemaVersion::V2)
            .find_goals(Some("a@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(goals.id, "recAA");
        assert_eq!(goals.targets.calories, 2200.0);
    }

    #[tokio::test]
    async fn other_failures_are_connectivity_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("AUTHENTICATION_REQUIRED"))
            .mount(&server)
            .await;

        let err = store(&server, SchemaVersion::V2).health_check().await.unwrap_err();
        match err {
            StoreError::Connectivity(msg) => {
                assert!(msg.contains("401"));
                assert!(msg.contains("AUTHENTICATION_REQUIRED"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_meal_posts_schema_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v0/appBase/Meals"))
            .and(body_json(json!({"fields": {
                "date": "2024-05-06",
                "meal": "Salad",
                "calories_kcal": 350.0,
                "protein_g": 40.0,
                "fat_g": 15.0,
                "cholesterol_mg": 80.0,
                "carbs_g": 20.0,
                "user_email": "a@example.com"
            }})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "recNew",
                "fields": {"date": "2024-05-06", "meal": "Salad", "calories_kcal": 350, "user_email": "a@example.com"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let meal = NewMeal {
            date: date!(2024 - 05 - 06),
            name: "Salad".into(),
            macros: MacroValues {
                calories: 350.0,
                protein_g: 40.0,
                fat_g: 15.0,
                cholesterol_mg: 80.0,
                carbs_g: 20.0,
            },
        };
        let created = store(&server, SchemaVersion::V2)
            .create_meal(Some("a@example.com"), &meal)
            .await
            .unwrap();
        assert_eq!(created.id, "recNew");
        assert_eq!(created.owner.as_deref(), Some("a@example.com"));
    }

    #[tokio::test]
    async fn foreign_meal_is_hidden() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/appBase/Meals/recX"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "recX",
                "fields": {"meal": "Theirs", "user_email": "b@example.com"}
            })))
            .mount(&server)
            .await;

        let err = store(&server, SchemaVersion::V2)
            .get_meal(Some("a@example.com"), "recX")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn migrate_patches_only_legacy_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v0/appBase/Meals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [
                    {"id": "recOld", "fields": {"Date": "2024-01-01", "Meal": "Pizza", "Calories": 800}},
                    {"id": "recNew", "fields": {"date": "2024-01-02", "meal": "Soup"}}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v0/appBase/Goals"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/v0/appBase/Meals/recOld"))
            .and(body_json(json!({"fields": {"date": "2024-01-01", "meal": "Pizza", "calories_kcal": 800}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "recOld", "fields": {}})))
            .expect(1)
            .mount(&server)
            .await;

        let report = store(&server, SchemaVersion::V2).migrate_schema().await.unwrap();
        assert_eq!(report, MigrationReport { migrated: 1, skipped: 1 });
    }
}
