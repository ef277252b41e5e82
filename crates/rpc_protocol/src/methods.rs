//! Host model, method and route names

/// Technical model names.
pub mod models {
    pub const ARTICLE: &str = "knowledge.article";
    pub const TAG: &str = "knowledge.tag";
    pub const VERSION: &str = "knowledge.article.version";
    pub const VERSION_COMPARE_WIZARD: &str = "knowledge.version.compare.wizard";
    pub const USERS: &str = "res.users";
}

/// Model method names.
pub mod method_names {
    // Generic ORM methods
    pub const SEARCH_READ: &str = "search_read";
    pub const READ: &str = "read";
    pub const CREATE: &str = "create";
    pub const WRITE: &str = "write";
    pub const HAS_GROUP: &str = "has_group";

    // Article procedures
    pub const TOGGLE_FAVORITE: &str = "action_toggle_favorite";
    pub const TOGGLE_LIKE: &str = "action_toggle_like";
    pub const RESTORE_VERSION: &str = "action_restore_version";
    pub const PUBLISH_TREE: &str = "action_publish_tree";
    pub const MESSAGE_POST: &str = "message_post";
}

/// Plain JSON routes served next to the RPC endpoint.
pub mod routes {
    /// Model method endpoint.
    pub const CALL_KW: &str = "/web/dataset/call_kw";
    /// View counter endpoint.
    pub const INCREMENT_VIEW: &str = "/knowledge/article/increment_view";

    /// Comment listing endpoint for an article.
    pub fn article_messages(article_id: i64) -> String {
        format!("/knowledge/article/{}/messages", article_id)
    }

    /// Public share page for a token.
    pub fn share_page(token: &str) -> String {
        format!("/knowledge/article/{}", token)
    }
}

/// Group whose members may archive any article.
pub const ADMIN_GROUP: &str = "base.group_system";

/// Fields read for every article row.
pub const ARTICLE_LIST_FIELDS: &[&str] = &[
    "id",
    "name",
    "parent_id",
    "tag_ids",
    "active",
    "views_count",
    "likes_count",
    "liked_by_ids",
    "create_date",
    "write_date",
    "create_uid",
    "write_uid",
    "share_token",
    "author_id",
    "is_published",
    "cover_image_type",
    "cover_image_url",
    "cover_image_binary",
    "cover_position",
    "favorite_user_ids",
    "icon",
    "version",
];

/// Fields read for version snapshots.
pub const VERSION_FIELDS: &[&str] = &[
    "id",
    "article_id",
    "version_number",
    "name",
    "content",
    "icon",
    "cover_image_type",
    "cover_image_url",
    "cover_image_binary",
    "cover_position",
    "user_id",
    "create_date",
];
