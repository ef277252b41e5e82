//! Article store backed by the host's JSON-RPC endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use entities::{
    Article, ArticleId, ArticleVersion, Comment, CommentId, CoverImage, Tag, VersionId,
    VersionSummary, DEFAULT_COVER_POSITION,
};
use rpc_protocol::{
    domain_leaf, many2one_id, method_names, models, optional_string, routes, CallKwParams,
    JsonRpcRequest, JsonRpcResponse, ADMIN_GROUP, ARTICLE_LIST_FIELDS, VERSION_FIELDS,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::{
    ArticleContent, ArticleFilter, ArticleStore, ArticleUpdate, FavoriteState, LikeState,
    NewArticle, NewComment, StoreError, StoreResult,
};

const HOST_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Article store that talks to the host over HTTP.
pub struct RpcArticleStore {
    /// Host base URL
    base_url: String,
    /// Session cookie value
    session_id: Option<String>,
    /// HTTP client
    http_client: reqwest::Client,
    /// Request counter for JSON-RPC IDs
    request_id: AtomicU64,
}

impl RpcArticleStore {
    /// Create a new store for the host at `base_url`
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            session_id: None,
            http_client: reqwest::Client::new(),
            request_id: AtomicU64::new(1),
        }
    }

    /// Authenticate requests with an existing session
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::SeqCst)
    }

    /// POST a JSON-RPC envelope to `path` and return its result
    async fn post(&self, path: &str, params: Value) -> StoreResult<Value> {
        let request = JsonRpcRequest::call(self.next_id(), params);

        debug!(path = %path, "Making RPC call");

        let mut builder = self
            .http_client
            .post(format!("{}{}", self.base_url, path))
            .json(&request);
        if let Some(session_id) = &self.session_id {
            builder = builder.header(reqwest::header::COOKIE, format!("session_id={}", session_id));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Unavailable(format!(
                "Server returned status {}",
                response.status()
            )));
        }

        let rpc_response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        rpc_response.into_result().map_err(|error| {
            warn!(path = %path, code = error.code, message = %error.user_message(), "RPC call failed");
            if error.is_access_error() {
                StoreError::AccessDenied(error.user_message().to_string())
            } else {
                StoreError::Rpc {
                    code: error.code,
                    message: error.user_message().to_string(),
                }
            }
        })
    }

    /// Call a model method
    async fn call_kw<T: DeserializeOwned>(&self, params: CallKwParams) -> StoreResult<T> {
        let path = format!("{}/{}/{}", routes::CALL_KW, params.model, params.method);
        let value = self.post(&path, serde_json::to_value(&params)?).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn search_read(
        &self,
        model: &str,
        domain: Vec<Value>,
        fields: &[&str],
        kwargs: Map<String, Value>,
    ) -> StoreResult<Vec<Value>> {
        let mut params = CallKwParams::new(model, method_names::SEARCH_READ, vec![])
            .with_kwarg("domain", Value::Array(domain))
            .with_kwarg("fields", json!(fields));
        params.kwargs.extend(kwargs);
        self.call_kw(params).await
    }
}

/// Maps an article filter to a host domain and keyword arguments.
fn article_domain(filter: &ArticleFilter) -> (Vec<Value>, Map<String, Value>) {
    let mut domain = Vec::new();
    let mut kwargs = Map::new();

    if filter.include_archived {
        domain.push(domain_leaf("active", "in", json!([true, false])));
        kwargs.insert("context".to_string(), json!({"active_test": false}));
    }
    if let Some(ids) = &filter.ids {
        domain.push(domain_leaf("id", "in", json!(ids)));
    }
    if let Some(parent_id) = filter.parent_id {
        domain.push(domain_leaf("parent_id", "=", json!(parent_id)));
    }
    if let Some(limit) = filter.limit {
        kwargs.insert("limit".to_string(), json!(limit));
    }
    if let Some(offset) = filter.offset {
        kwargs.insert("offset".to_string(), json!(offset));
    }

    (domain, kwargs)
}

fn parse_datetime(value: &Value) -> DateTime<Utc> {
    value
        .as_str()
        .and_then(|s| NaiveDateTime::parse_from_str(s, HOST_DATETIME_FORMAT).ok())
        .map(|naive| naive.and_utc())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn id_list(value: &Value) -> Vec<i64> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

fn cover_from_record(record: &Value) -> CoverImage {
    match record["cover_image_type"].as_str() {
        Some("url") => optional_string(&record["cover_image_url"])
            .map(CoverImage::Url)
            .unwrap_or_default(),
        Some("binary") => optional_string(&record["cover_image_binary"])
            .map(CoverImage::Binary)
            .unwrap_or_default(),
        _ => CoverImage::None,
    }
}

fn cover_position(record: &Value) -> u8 {
    record["cover_position"]
        .as_u64()
        .map(|p| p.min(100) as u8)
        .unwrap_or(DEFAULT_COVER_POSITION)
}

/// Decodes an article row as returned by `search_read`.
fn article_from_record(record: &Value) -> StoreResult<Article> {
    let id = record["id"]
        .as_i64()
        .ok_or_else(|| StoreError::Other("article record without id".to_string()))?;

    Ok(Article {
        id,
        name: record["name"].as_str().unwrap_or_default().to_string(),
        parent_id: many2one_id(&record["parent_id"]),
        icon: optional_string(&record["icon"]),
        active: record["active"].as_bool().unwrap_or(true),
        is_published: record["is_published"].as_bool().unwrap_or(false),
        author_id: many2one_id(&record["author_id"]).unwrap_or_default(),
        create_uid: many2one_id(&record["create_uid"]).unwrap_or_default(),
        write_uid: many2one_id(&record["write_uid"]).unwrap_or_default(),
        views_count: record["views_count"].as_u64().unwrap_or(0),
        likes_count: record["likes_count"].as_u64().unwrap_or(0),
        liked_by_ids: id_list(&record["liked_by_ids"]),
        favorite_user_ids: id_list(&record["favorite_user_ids"]),
        tag_ids: id_list(&record["tag_ids"]),
        cover: cover_from_record(record),
        cover_position: cover_position(record),
        version: record["version"].as_u64().unwrap_or(1) as u32,
        share_token: optional_string(&record["share_token"]).unwrap_or_default(),
        created_at: parse_datetime(&record["create_date"]),
        updated_at: parse_datetime(&record["write_date"]),
    })
}

fn version_from_record(record: &Value) -> StoreResult<ArticleVersion> {
    let id = record["id"]
        .as_i64()
        .ok_or_else(|| StoreError::Other("version record without id".to_string()))?;

    Ok(ArticleVersion {
        id,
        article_id: many2one_id(&record["article_id"]).unwrap_or_default(),
        version_number: record["version_number"].as_u64().unwrap_or(0) as u32,
        name: record["name"].as_str().unwrap_or_default().to_string(),
        content: record["content"].as_str().unwrap_or_default().to_string(),
        icon: optional_string(&record["icon"]),
        cover: cover_from_record(record),
        cover_position: cover_position(record),
        user_id: many2one_id(&record["user_id"]),
        created_at: parse_datetime(&record["create_date"]),
    })
}

fn cover_vals(cover: &CoverImage, vals: &mut Map<String, Value>) {
    let (kind, url, binary) = match cover {
        CoverImage::None => ("none", Value::Bool(false), Value::Bool(false)),
        CoverImage::Url(url) => ("url", json!(url), Value::Bool(false)),
        CoverImage::Binary(data) => ("binary", Value::Bool(false), json!(data)),
    };
    vals.insert("cover_image_type".to_string(), json!(kind));
    vals.insert("cover_image_url".to_string(), url);
    vals.insert("cover_image_binary".to_string(), binary);
}

/// Encodes an update as host write values.
fn update_vals(update: &ArticleUpdate) -> Map<String, Value> {
    let mut vals = Map::new();
    if let Some(name) = &update.name {
        vals.insert("name".to_string(), json!(name));
    }
    if let Some(parent_id) = update.parent_id {
        vals.insert(
            "parent_id".to_string(),
            parent_id.map(Value::from).unwrap_or(Value::Bool(false)),
        );
    }
    if let Some(content) = &update.content {
        vals.insert("content".to_string(), json!(content));
    }
    if let Some(tag_ids) = &update.tag_ids {
        vals.insert("tag_ids".to_string(), json!([[6, 0, tag_ids]]));
    }
    if let Some(icon) = &update.icon {
        vals.insert(
            "icon".to_string(),
            icon.clone().map(Value::from).unwrap_or(Value::Bool(false)),
        );
    }
    if let Some(cover) = &update.cover {
        cover_vals(cover, &mut vals);
    }
    if let Some(position) = update.cover_position {
        vals.insert("cover_position".to_string(), json!(position));
    }
    if let Some(is_published) = update.is_published {
        vals.insert("is_published".to_string(), json!(is_published));
    }
    if let Some(active) = update.active {
        vals.insert("active".to_string(), json!(active));
    }
    vals
}

fn create_vals(article: &NewArticle) -> Map<String, Value> {
    let mut vals = Map::new();
    vals.insert("name".to_string(), json!(article.name));
    vals.insert(
        "parent_id".to_string(),
        article.parent_id.map(Value::from).unwrap_or(Value::Bool(false)),
    );
    vals.insert("content".to_string(), json!(article.content));
    vals.insert("tag_ids".to_string(), json!([[6, 0, article.tag_ids]]));
    vals.insert("is_published".to_string(), json!(article.is_published));
    if let Some(icon) = &article.icon {
        vals.insert("icon".to_string(), json!(icon));
    }
    cover_vals(&article.cover, &mut vals);
    vals.insert("cover_position".to_string(), json!(article.cover_position));
    vals
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    id: CommentId,
    #[serde(default)]
    parent_id: Option<CommentId>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    date: String,
}

impl From<RawMessage> for Comment {
    fn from(raw: RawMessage) -> Self {
        Comment {
            id: raw.id,
            parent_id: raw.parent_id,
            author: raw.author.unwrap_or_default(),
            body: raw.body,
            date: parse_datetime(&Value::String(raw.date)),
        }
    }
}

#[async_trait]
impl ArticleStore for RpcArticleStore {
    async fn list_articles(&self, filter: ArticleFilter) -> StoreResult<Vec<Article>> {
        let (domain, kwargs) = article_domain(&filter);
        let records = self
            .search_read(models::ARTICLE, domain, ARTICLE_LIST_FIELDS, kwargs)
            .await?;
        records.iter().map(article_from_record).collect()
    }

    async fn read_article(&self, id: ArticleId) -> StoreResult<Option<Article>> {
        let filter = ArticleFilter::everything().with_ids([id]);
        Ok(self.list_articles(filter).await?.into_iter().next())
    }

    async fn read_content(&self, ids: &[ArticleId]) -> StoreResult<Vec<ArticleContent>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let (domain, kwargs) = article_domain(&ArticleFilter::everything().with_ids(ids.to_vec()));
        let records = self
            .search_read(models::ARTICLE, domain, &["id", "content"], kwargs)
            .await?;

        Ok(records
            .iter()
            .filter_map(|record| {
                Some(ArticleContent {
                    id: record["id"].as_i64()?,
                    content: record["content"].as_str().unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    async fn list_tags(&self) -> StoreResult<Vec<Tag>> {
        let records = self
            .search_read(models::TAG, vec![], &["id", "name"], Map::new())
            .await?;
        Ok(records
            .iter()
            .filter_map(|record| {
                Some(Tag::new(
                    record["id"].as_i64()?,
                    record["name"].as_str().unwrap_or_default(),
                ))
            })
            .collect())
    }

    async fn list_versions(&self, article_id: ArticleId) -> StoreResult<Vec<VersionSummary>> {
        let mut kwargs = Map::new();
        kwargs.insert("order".to_string(), json!("version_number desc"));
        let records = self
            .search_read(
                models::VERSION,
                vec![domain_leaf("article_id", "=", json!(article_id))],
                &["id", "version_number", "create_date", "user_id"],
                kwargs,
            )
            .await?;

        records
            .iter()
            .map(|record| version_from_record(record).map(|v| VersionSummary::from(&v)))
            .collect()
    }

    async fn read_version(&self, version_id: VersionId) -> StoreResult<Option<ArticleVersion>> {
        let records = self
            .search_read(
                models::VERSION,
                vec![domain_leaf("id", "=", json!(version_id))],
                VERSION_FIELDS,
                Map::new(),
            )
            .await?;
        records.first().map(version_from_record).transpose()
    }

    async fn list_comments(&self, article_id: ArticleId) -> StoreResult<Vec<Comment>> {
        let value = self
            .post(&routes::article_messages(article_id), json!({}))
            .await?;
        let messages: Vec<RawMessage> = serde_json::from_value(value)?;
        Ok(messages.into_iter().map(Comment::from).collect())
    }

    async fn create_article(&self, article: NewArticle) -> StoreResult<Article> {
        let params = CallKwParams::new(
            models::ARTICLE,
            method_names::CREATE,
            vec![Value::Object(create_vals(&article))],
        );
        let id: ArticleId = self.call_kw(params).await?;
        self.read_article(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Article", id))
    }

    async fn write_article(&self, id: ArticleId, update: ArticleUpdate) -> StoreResult<Article> {
        let params = CallKwParams::new(
            models::ARTICLE,
            method_names::WRITE,
            vec![json!([id]), Value::Object(update_vals(&update))],
        );
        let _: bool = self.call_kw(params).await?;
        self.read_article(id)
            .await?
            .ok_or_else(|| StoreError::not_found("Article", id))
    }

    async fn increment_view(&self, id: ArticleId) -> StoreResult<()> {
        self.post(routes::INCREMENT_VIEW, json!({ "article_id": id }))
            .await?;
        Ok(())
    }

    async fn toggle_favorite(&self, id: ArticleId) -> StoreResult<FavoriteState> {
        let params = CallKwParams::new(
            models::ARTICLE,
            method_names::TOGGLE_FAVORITE,
            vec![json!([id])],
        );
        self.call_kw(params).await
    }

    async fn toggle_like(&self, id: ArticleId) -> StoreResult<LikeState> {
        let params = CallKwParams::new(models::ARTICLE, method_names::TOGGLE_LIKE, vec![json!(id)]);
        self.call_kw(params).await
    }

    async fn post_comment(
        &self,
        article_id: ArticleId,
        comment: NewComment,
    ) -> StoreResult<CommentId> {
        let mut params = CallKwParams::new(
            models::ARTICLE,
            method_names::MESSAGE_POST,
            vec![json!([article_id])],
        )
        .with_kwarg("body", json!(comment.body))
        .with_kwarg("message_type", json!("comment"))
        .with_kwarg("subtype_xmlid", json!("mail.mt_comment"));
        if let Some(parent_id) = comment.parent_id {
            params = params.with_kwarg("parent_id", json!(parent_id));
        }
        self.call_kw(params).await
    }

    async fn diff_versions(
        &self,
        article_id: ArticleId,
        old_version_id: VersionId,
        current_version_id: Option<VersionId>,
    ) -> StoreResult<String> {
        let mut vals = Map::new();
        vals.insert("article_id".to_string(), json!(article_id));
        vals.insert("old_version_id".to_string(), json!(old_version_id));
        if let Some(current) = current_version_id {
            vals.insert("current_version_id".to_string(), json!(current));
        }

        let create = CallKwParams::new(
            models::VERSION_COMPARE_WIZARD,
            method_names::CREATE,
            vec![Value::Object(vals)],
        );
        let wizard_id: i64 = self.call_kw(create).await?;

        let read = CallKwParams::new(
            models::VERSION_COMPARE_WIZARD,
            method_names::READ,
            vec![json!([wizard_id]), json!(["diff_html"])],
        );
        let records: Vec<Value> = self.call_kw(read).await?;
        Ok(records
            .first()
            .and_then(|record| optional_string(&record["diff_html"]))
            .unwrap_or_default())
    }

    async fn restore_version(
        &self,
        article_id: ArticleId,
        version_id: VersionId,
    ) -> StoreResult<Article> {
        let params = CallKwParams::new(
            models::ARTICLE,
            method_names::RESTORE_VERSION,
            vec![json!(article_id), json!(version_id)],
        );
        let _: bool = self.call_kw(params).await?;
        self.read_article(article_id)
            .await?
            .ok_or_else(|| StoreError::not_found("Article", article_id))
    }

    async fn publish_tree(&self, id: ArticleId, publish: bool) -> StoreResult<()> {
        let params = CallKwParams::new(
            models::ARTICLE,
            method_names::PUBLISH_TREE,
            vec![json!([id])],
        )
        .with_kwarg("publish", json!(publish));
        let _: Value = self.call_kw(params).await?;
        Ok(())
    }

    async fn is_admin(&self) -> StoreResult<bool> {
        let params = CallKwParams::new(
            models::USERS,
            method_names::HAS_GROUP,
            vec![json!(ADMIN_GROUP)],
        );
        self.call_kw(params).await
    }
}
