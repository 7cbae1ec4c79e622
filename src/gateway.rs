use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::pager::RowRange;

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decode: {0}")]
    Decode(String),
    #[error("exact count missing from response")]
    MissingCount,
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// The three collections owned by the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Threads,
    Posts,
    Comments,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Threads => "threads",
            Table::Posts => "posts",
            Table::Comments => "comments",
        }
    }
}

/// Row predicate: equality or set membership on a single column.
#[derive(Debug, Clone)]
pub enum Filter {
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(column, value.into())
    }

    pub fn any_of<V: Into<Value>>(
        column: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Filter::In(column, values.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: &'static str) -> Self {
        Order { column, ascending: true }
    }

    pub fn desc(column: &'static str) -> Self {
        Order { column, ascending: false }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SelectQuery {
    pub filter: Option<Filter>,
    pub order: Option<Order>,
    pub range: Option<RowRange>,
}

/// Thin client contract over the hosted table store. Rows travel as JSON
/// objects; `id` and `created_at` are assigned server-side on insert.
/// Timeouts and retries are the backend's concern, not the callers'.
#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn select(&self, table: Table, query: SelectQuery) -> GatewayResult<Vec<Value>>;
    async fn select_count(&self, table: Table, filter: Option<Filter>) -> GatewayResult<u64>;
    async fn insert(&self, table: Table, rows: Vec<Value>) -> GatewayResult<Vec<Value>>;
    async fn delete(&self, table: Table, filter: Filter) -> GatewayResult<()>;
}

pub fn decode_row<T: DeserializeOwned>(row: Value) -> GatewayResult<T> {
    serde_json::from_value(row).map_err(|e| GatewayError::Decode(e.to_string()))
}

pub fn encode_row<T: serde::Serialize>(row: &T) -> GatewayResult<Value> {
    serde_json::to_value(row).map_err(|e| GatewayError::Decode(e.to_string()))
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> GatewayResult<Vec<T>> {
    rows.into_iter().map(decode_row).collect()
}

/// PostgREST-style HTTP backend: equality/membership filters in the query
/// string, inclusive item ranges in the `Range` header, exact counts via
/// `Prefer: count=exact`.
pub mod rest {
    use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, RANGE};

    use super::*;

    impl From<reqwest::Error> for GatewayError {
        fn from(e: reqwest::Error) -> Self {
            GatewayError::Transport(e.to_string())
        }
    }

    pub struct RestGateway {
        base: String,
        client: reqwest::Client,
    }

    impl RestGateway {
        pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
            let mut headers = HeaderMap::new();
            headers.insert("apikey", HeaderValue::from_str(api_key)?);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {api_key}"))?,
            );
            let client = reqwest::Client::builder().default_headers(headers).build()?;
            Ok(Self {
                base: base_url.trim_end_matches('/').to_string(),
                client,
            })
        }

        fn url(&self, table: Table) -> String {
            format!("{}/{}", self.base, table.as_str())
        }
    }

    // Bare literal for the query string: strings unquoted, everything else
    // in its JSON form.
    fn literal(v: &Value) -> String {
        match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn filter_param(filter: &Filter) -> (String, String) {
        match filter {
            Filter::Eq(col, v) => ((*col).to_string(), format!("eq.{}", literal(v))),
            Filter::In(col, vs) => {
                let list = vs.iter().map(literal).collect::<Vec<_>>().join(",");
                ((*col).to_string(), format!("in.({list})"))
            }
        }
    }

    fn order_param(order: &Order) -> (String, String) {
        let dir = if order.ascending { "asc" } else { "desc" };
        ("order".to_string(), format!("{}.{}", order.column, dir))
    }

    async fn check(resp: reqwest::Response) -> GatewayResult<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(GatewayError::Status { status: status.as_u16(), body })
    }

    /// `Content-Range: 0-4/12` (or `*/12` for an empty range); the part
    /// after the slash is the exact count.
    fn parse_exact_count(header: &str) -> GatewayResult<u64> {
        header
            .rsplit('/')
            .next()
            .and_then(|n| n.parse::<u64>().ok())
            .ok_or(GatewayError::MissingCount)
    }

    #[async_trait]
    impl DataGateway for RestGateway {
        async fn select(&self, table: Table, query: SelectQuery) -> GatewayResult<Vec<Value>> {
            let mut req = self.client.get(self.url(table)).query(&[("select", "*")]);
            if let Some(f) = &query.filter {
                req = req.query(&[filter_param(f)]);
            }
            if let Some(o) = &query.order {
                req = req.query(&[order_param(o)]);
            }
            if let Some(r) = &query.range {
                req = req
                    .header("Range-Unit", "items")
                    .header(RANGE, format!("{}-{}", r.start, r.end));
            }
            let resp = check(req.send().await?).await?;
            resp.json::<Vec<Value>>()
                .await
                .map_err(|e| GatewayError::Decode(e.to_string()))
        }

        async fn select_count(
            &self,
            table: Table,
            filter: Option<Filter>,
        ) -> GatewayResult<u64> {
            let mut req = self
                .client
                .head(self.url(table))
                .query(&[("select", "*")])
                .header("Prefer", "count=exact");
            if let Some(f) = &filter {
                req = req.query(&[filter_param(f)]);
            }
            let resp = check(req.send().await?).await?;
            let header = resp
                .headers()
                .get("content-range")
                .and_then(|v| v.to_str().ok())
                .ok_or(GatewayError::MissingCount)?;
            parse_exact_count(header)
        }

        async fn insert(&self, table: Table, rows: Vec<Value>) -> GatewayResult<Vec<Value>> {
            let resp = self
                .client
                .post(self.url(table))
                .header("Prefer", "return=representation")
                .json(&rows)
                .send()
                .await?;
            let resp = check(resp).await?;
            resp.json::<Vec<Value>>()
                .await
                .map_err(|e| GatewayError::Decode(e.to_string()))
        }

        async fn delete(&self, table: Table, filter: Filter) -> GatewayResult<()> {
            let req = self
                .client
                .delete(self.url(table))
                .query(&[filter_param(&filter)]);
            check(req.send().await?).await?;
            Ok(())
        }
    }

}

/// In-memory backend with the same observable contract as the REST one.
/// Backs the test suite and the binary's local demo mode.
pub mod inmem {
    use std::cmp::Ordering;
    use std::sync::{Arc, RwLock};

    use chrono::{SecondsFormat, Utc};
    use serde_json::{json, Map};

    use super::*;

    type Row = Map<String, Value>;

    #[derive(Default)]
    struct State {
        threads: Vec<Row>,
        posts: Vec<Row>,
        comments: Vec<Row>,
        next_id: i64,
    }

    impl State {
        fn rows(&self, table: Table) -> &Vec<Row> {
            match table {
                Table::Threads => &self.threads,
                Table::Posts => &self.posts,
                Table::Comments => &self.comments,
            }
        }

        fn rows_mut(&mut self, table: Table) -> &mut Vec<Row> {
            match table {
                Table::Threads => &mut self.threads,
                Table::Posts => &mut self.posts,
                Table::Comments => &mut self.comments,
            }
        }
    }

    #[derive(Clone, Default)]
    pub struct InMemGateway {
        state: Arc<RwLock<State>>,
    }

    impl InMemGateway {
        pub fn new() -> Self {
            Self::default()
        }
    }

    fn matches(row: &Row, filter: &Filter) -> bool {
        match filter {
            Filter::Eq(col, v) => row.get(*col) == Some(v),
            Filter::In(col, vs) => row.get(*col).is_some_and(|cell| vs.contains(cell)),
        }
    }

    fn cmp_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        match (a, b) {
            (Some(Value::Number(x)), Some(Value::Number(y))) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
            _ => Ordering::Equal,
        }
    }

    #[async_trait]
    impl DataGateway for InMemGateway {
        async fn select(&self, table: Table, query: SelectQuery) -> GatewayResult<Vec<Value>> {
            let s = self.state.read().unwrap();
            let mut rows: Vec<Row> = s
                .rows(table)
                .iter()
                .filter(|r| query.filter.as_ref().map_or(true, |f| matches(r, f)))
                .cloned()
                .collect();
            drop(s);
            if let Some(order) = &query.order {
                rows.sort_by(|a, b| {
                    let ord = cmp_cells(a.get(order.column), b.get(order.column));
                    if order.ascending {
                        ord
                    } else {
                        ord.reverse()
                    }
                });
            }
            if let Some(r) = query.range {
                let start = (r.start as usize).min(rows.len());
                let end = ((r.end + 1) as usize).min(rows.len());
                rows = rows[start..end].to_vec();
            }
            Ok(rows.into_iter().map(Value::Object).collect())
        }

        async fn select_count(
            &self,
            table: Table,
            filter: Option<Filter>,
        ) -> GatewayResult<u64> {
            let s = self.state.read().unwrap();
            let n = s
                .rows(table)
                .iter()
                .filter(|r| filter.as_ref().map_or(true, |f| matches(r, f)))
                .count();
            Ok(n as u64)
        }

        async fn insert(&self, table: Table, rows: Vec<Value>) -> GatewayResult<Vec<Value>> {
            let mut s = self.state.write().unwrap();
            let mut inserted = Vec::with_capacity(rows.len());
            for row in rows {
                let Value::Object(mut row) = row else {
                    return Err(GatewayError::Decode("insert rows must be objects".into()));
                };
                s.next_id += 1;
                row.insert("id".into(), json!(s.next_id));
                row.insert(
                    "created_at".into(),
                    json!(Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)),
                );
                s.rows_mut(table).push(row.clone());
                inserted.push(Value::Object(row));
            }
            Ok(inserted)
        }

        async fn delete(&self, table: Table, filter: Filter) -> GatewayResult<()> {
            let mut s = self.state.write().unwrap();
            s.rows_mut(table).retain(|r| !matches(r, &filter));
            Ok(())
        }
    }
}
