//! Article tree: filtering, ancestor closure, sections and rows.
//!
//! The tree owns the full article collection, archived articles included,
//! and the persistent per-node expansion state. [`ArticleTree::apply_filter`]
//! computes the visible set for a [`FilterSpec`]; everything else (sections,
//! rows, breadcrumbs) is derived from that set.
//!
//! Parent references are followed with a visited set, so a malformed
//! collection with a cycle degrades to a shorter chain instead of looping.

use std::{
    collections::{HashMap, HashSet},
    ops::Range,
};

use entities::{Article, ArticleId, SortOrder, TagId, UserId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// User-selected filter over the article collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Free-text query, matched case-insensitively.
    pub query: String,
    /// Selected tags. Empty means no tag filter.
    pub tag_ids: Vec<TagId>,
    /// Only favorites of the current user.
    pub favorites_only: bool,
    /// Include archived articles and their ancestors.
    pub show_archived: bool,
    /// Match the query against extracted content as well as names.
    pub search_in_content: bool,
    /// Ordering of the visible set.
    pub sort: SortOrder,
}

impl FilterSpec {
    /// Selects or deselects a tag. Returns true when the tag is now selected.
    pub fn toggle_tag(&mut self, tag_id: TagId) -> bool {
        if let Some(pos) = self.tag_ids.iter().position(|t| *t == tag_id) {
            self.tag_ids.remove(pos);
            false
        } else {
            self.tag_ids.push(tag_id);
            true
        }
    }

    pub fn is_tag_selected(&self, tag_id: TagId) -> bool {
        self.tag_ids.contains(&tag_id)
    }

    /// Trimmed, lowercased query, `None` when empty.
    pub fn normalized_query(&self) -> Option<String> {
        let query = self.query.trim();
        (!query.is_empty()).then(|| query.to_lowercase())
    }
}

/// Which part of the sidebar a section represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Favorites,
    Workspace,
    Private,
}

/// One sidebar section: its root nodes and the nodes it may descend into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub kind: SectionKind,
    pub roots: Vec<ArticleId>,
    members: HashSet<ArticleId>,
}

impl Section {
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn contains(&self, id: ArticleId) -> bool {
        self.members.contains(&id)
    }
}

/// The three sidebar sections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sections {
    pub favorites: Section,
    pub workspace: Section,
    pub private: Section,
}

impl Sections {
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        [&self.favorites, &self.workspace, &self.private].into_iter()
    }
}

/// A flattened, depth-annotated tree row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeRow {
    pub id: ArticleId,
    pub name: String,
    /// Article icon, or a folder/page glyph by child count.
    pub icon: String,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
    pub active: bool,
    pub archived: bool,
    pub tag_match: bool,
    /// Byte range of the query match within `name`.
    pub highlight: Option<Range<usize>>,
}

/// One breadcrumb element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Crumb {
    Article {
        id: ArticleId,
        name: String,
    },
    /// Collapsed middle of a deep path.
    Ellipsis {
        hidden: Vec<ArticleId>,
        title: String,
    },
}

/// Full article collection plus the derived visible set.
#[derive(Debug, Default)]
pub struct ArticleTree {
    articles: HashMap<ArticleId, Article>,
    expanded: HashSet<ArticleId>,
    visible: Vec<ArticleId>,
    visible_set: HashSet<ArticleId>,
    tag_matches: HashSet<ArticleId>,
    children: HashMap<ArticleId, Vec<ArticleId>>,
}

impl ArticleTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tree over `articles`. Nothing is visible until the first
    /// [`apply_filter`](Self::apply_filter).
    pub fn with_articles(articles: impl IntoIterator<Item = Article>) -> Self {
        let mut tree = Self::new();
        tree.replace_all(articles);
        tree
    }

    /// Replaces the collection. Expansion state is kept.
    pub fn replace_all(&mut self, articles: impl IntoIterator<Item = Article>) {
        self.articles = articles.into_iter().map(|a| (a.id, a)).collect();
        self.visible.retain(|id| self.articles.contains_key(id));
        self.visible_set.retain(|id| self.articles.contains_key(id));
    }

    /// Inserts or replaces one article.
    pub fn upsert(&mut self, article: Article) {
        self.articles.insert(article.id, article);
    }

    /// Mutates one article in place. Returns false when it is unknown.
    pub fn update(&mut self, id: ArticleId, f: impl FnOnce(&mut Article)) -> bool {
        match self.articles.get_mut(&id) {
            Some(article) => {
                f(article);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ArticleId) -> Option<&Article> {
        self.articles.get(&id)
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    /// Every article, in id order.
    pub fn all(&self) -> Vec<&Article> {
        let mut all: Vec<&Article> = self.articles.values().collect();
        all.sort_by_key(|a| a.id);
        all
    }

    /// Ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: ArticleId) -> Vec<ArticleId> {
        let mut chain = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut current = self.articles.get(&id).and_then(|a| a.parent_id);
        while let Some(parent_id) = current {
            if !visited.insert(parent_id) {
                break;
            }
            let Some(parent) = self.articles.get(&parent_id) else {
                break;
            };
            chain.push(parent_id);
            current = parent.parent_id;
        }
        chain
    }

    /// Returns true when `candidate` is `ancestor` or lies below it.
    pub fn is_self_or_descendant(&self, ancestor: ArticleId, candidate: ArticleId) -> bool {
        candidate == ancestor || self.ancestors(candidate).contains(&ancestor)
    }

    /// Every article below `id`, in id order.
    pub fn descendants(&self, id: ArticleId) -> Vec<ArticleId> {
        let mut result: Vec<ArticleId> = self
            .articles
            .keys()
            .copied()
            .filter(|candidate| *candidate != id && self.ancestors(*candidate).contains(&id))
            .collect();
        result.sort_unstable();
        result
    }

    fn has_archived_ancestor(&self, id: ArticleId) -> bool {
        self.ancestors(id)
            .iter()
            .any(|a| self.articles.get(a).is_some_and(|a| !a.active))
    }

    /// Recomputes the visible set for `spec`.
    ///
    /// `content_text` returns extracted plain text for articles whose content
    /// is cached; it is only consulted for content search.
    ///
    /// Ancestors of every visible node are marked expanded.
    pub fn apply_filter(
        &mut self,
        spec: &FilterSpec,
        user_id: UserId,
        content_text: impl Fn(ArticleId) -> Option<String>,
    ) {
        let mut ordered: Vec<&Article> = self.articles.values().collect();
        ordered.sort_by_key(|a| a.id);

        // Active nodes outside archived branches.
        let mut base: HashSet<ArticleId> = ordered
            .iter()
            .filter(|a| a.active && !self.has_archived_ancestor(a.id))
            .map(|a| a.id)
            .collect();

        // Archived nodes join together with the chain that reaches them.
        if spec.show_archived {
            for article in ordered.iter().filter(|a| !a.active) {
                base.insert(article.id);
                base.extend(self.ancestors(article.id));
            }
        }

        let query = spec.normalized_query();
        let mut tag_matches = HashSet::new();
        let matches: Vec<ArticleId> = ordered
            .iter()
            .filter(|a| base.contains(&a.id))
            .filter(|a| {
                let tag_match = spec.tag_ids.is_empty() || a.has_any_tag(&spec.tag_ids);
                let favorite_match = !spec.favorites_only || a.is_favorite_of(user_id);
                tag_match && favorite_match
            })
            .filter(|a| match &query {
                None => true,
                Some(q) => {
                    a.name.to_lowercase().contains(q.as_str())
                        || (spec.search_in_content
                            && content_text(a.id)
                                .is_some_and(|text| text.to_lowercase().contains(q.as_str())))
                }
            })
            .map(|a| {
                if !spec.tag_ids.is_empty() {
                    tag_matches.insert(a.id);
                }
                a.id
            })
            .collect();

        let mut visible_set: HashSet<ArticleId> = matches.iter().copied().collect();
        for id in &matches {
            visible_set.extend(self.ancestors(*id));
        }

        for id in &visible_set {
            self.expanded.extend(self.ancestors(*id));
        }

        let mut visible: Vec<&Article> = ordered
            .into_iter()
            .filter(|a| visible_set.contains(&a.id))
            .collect();
        spec.sort.sort_refs(&mut visible);
        let visible: Vec<ArticleId> = visible.into_iter().map(|a| a.id).collect();

        let mut children: HashMap<ArticleId, Vec<ArticleId>> = HashMap::new();
        for id in &visible {
            if let Some(parent_id) = self.articles.get(id).and_then(|a| a.parent_id) {
                if visible_set.contains(&parent_id) {
                    children.entry(parent_id).or_default().push(*id);
                }
            }
        }

        debug!(
            total = self.articles.len(),
            visible = visible.len(),
            matches = matches.len(),
            "Applied tree filter"
        );

        self.visible = visible;
        self.visible_set = visible_set;
        self.tag_matches = tag_matches;
        self.children = children;
    }

    /// Resolves the selection after filtering: keep it when still visible,
    /// otherwise fall back to the first visible article, or none.
    pub fn fix_selection(&self, current: Option<ArticleId>) -> Option<ArticleId> {
        match current {
            Some(id) if self.visible_set.contains(&id) => Some(id),
            _ => self.visible.first().copied(),
        }
    }

    /// Visible ids in display order.
    pub fn visible(&self) -> &[ArticleId] {
        &self.visible
    }

    pub fn visible_articles(&self) -> Vec<&Article> {
        self.visible
            .iter()
            .filter_map(|id| self.articles.get(id))
            .collect()
    }

    pub fn is_visible(&self, id: ArticleId) -> bool {
        self.visible_set.contains(&id)
    }

    pub fn is_tag_match(&self, id: ArticleId) -> bool {
        self.tag_matches.contains(&id)
    }

    /// Visible children of `id`, in display order.
    pub fn children_of(&self, id: ArticleId) -> &[ArticleId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_expanded(&self, id: ArticleId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn set_expanded(&mut self, id: ArticleId, expanded: bool) {
        if expanded {
            self.expanded.insert(id);
        } else {
            self.expanded.remove(&id);
        }
    }

    /// Flips the expansion of one node. Returns the new state.
    pub fn toggle_expanded(&mut self, id: ArticleId) -> bool {
        let expanded = !self.is_expanded(id);
        self.set_expanded(id, expanded);
        expanded
    }

    /// Expands every visible node.
    pub fn expand_all(&mut self) {
        self.expanded.extend(self.visible.iter().copied());
    }

    /// Collapses every visible node.
    pub fn collapse_all(&mut self) {
        for id in &self.visible {
            self.expanded.remove(id);
        }
    }

    /// Expanded ids, sorted, for persisting.
    pub fn expanded_ids(&self) -> Vec<ArticleId> {
        let mut ids: Vec<ArticleId> = self.expanded.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Restores persisted expansion state.
    pub fn restore_expanded(&mut self, ids: impl IntoIterator<Item = ArticleId>) {
        self.expanded = ids.into_iter().collect();
    }

    /// Splits the visible set into favorites, workspace and private sections.
    ///
    /// Favorites are listed flat as roots and expand into their visible
    /// children. Workspace and private sections nest within themselves; a
    /// node whose parent falls in another section becomes a root.
    pub fn sections(&self, user_id: UserId) -> Sections {
        let visible = self.visible_articles();

        let favorites = Section {
            kind: SectionKind::Favorites,
            roots: visible
                .iter()
                .filter(|a| a.is_favorite_of(user_id))
                .map(|a| a.id)
                .collect(),
            members: self.visible_set.clone(),
        };

        let nested = |kind: SectionKind, member: &dyn Fn(&Article) -> bool| {
            let members: HashSet<ArticleId> = visible
                .iter()
                .filter(|a| member(a))
                .map(|a| a.id)
                .collect();
            let roots = visible
                .iter()
                .filter(|a| members.contains(&a.id))
                .filter(|a| a.parent_id.is_none_or(|p| !members.contains(&p)))
                .map(|a| a.id)
                .collect();
            Section {
                kind,
                roots,
                members,
            }
        };

        Sections {
            favorites,
            workspace: nested(SectionKind::Workspace, &|a| !a.is_private_to(user_id)),
            private: nested(SectionKind::Private, &|a| a.is_private_to(user_id)),
        }
    }

    /// Flattens a section into rows, descending only into expanded nodes.
    pub fn rows(
        &self,
        section: &Section,
        query: &str,
        selected: Option<ArticleId>,
    ) -> Vec<TreeRow> {
        let query = query.trim().to_lowercase();
        let mut rows = Vec::new();
        let mut visited = HashSet::new();
        let mut stack: Vec<(ArticleId, usize)> =
            section.roots.iter().rev().map(|id| (*id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(article) = self.articles.get(&id) else {
                continue;
            };

            let children: Vec<ArticleId> = self
                .children_of(id)
                .iter()
                .copied()
                .filter(|child| section.contains(*child))
                .collect();
            let has_children = !children.is_empty();
            let expanded = has_children && self.is_expanded(id);

            rows.push(TreeRow {
                id,
                name: article.name.clone(),
                icon: article
                    .icon
                    .clone()
                    .unwrap_or_else(|| if has_children { "📁" } else { "📄" }.to_string()),
                depth,
                has_children,
                expanded,
                active: selected == Some(id),
                archived: !article.active,
                tag_match: self.is_tag_match(id),
                highlight: highlight_range(&article.name, &query),
            });

            if expanded {
                stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
            }
        }

        rows
    }

    /// Path from the root to `id`, truncated to root, ellipsis, parent and
    /// current when longer than `max_depth`.
    pub fn breadcrumbs(&self, id: ArticleId, max_depth: usize) -> Vec<Crumb> {
        let Some(article) = self.articles.get(&id) else {
            return Vec::new();
        };

        let mut path: Vec<&Article> = self
            .ancestors(id)
            .iter()
            .rev()
            .filter_map(|a| self.articles.get(a))
            .collect();
        path.push(article);

        let crumb = |a: &Article| Crumb::Article {
            id: a.id,
            name: a.name.clone(),
        };

        if path.len() <= max_depth {
            return path.into_iter().map(crumb).collect();
        }

        let last = path.len() - 1;
        let hidden = &path[1..last - 1];
        vec![
            crumb(path[0]),
            Crumb::Ellipsis {
                hidden: hidden.iter().map(|a| a.id).collect(),
                title: hidden
                    .iter()
                    .map(|a| a.name.as_str())
                    .collect::<Vec<_>>()
                    .join(" > "),
            },
            crumb(path[last - 1]),
            crumb(path[last]),
        ]
    }
}

/// Byte range of the first case-insensitive occurrence of `query` (already
/// lowercased) in `name`.
fn highlight_range(name: &str, query: &str) -> Option<Range<usize>> {
    if query.is_empty() {
        return None;
    }
    for (start, _) in name.char_indices() {
        let mut lowered = String::new();
        for (offset, c) in name[start..].char_indices() {
            lowered.extend(c.to_lowercase());
            if lowered == query {
                return Some(start..start + offset + c.len_utf8());
            }
            if !query.starts_with(lowered.as_str()) {
                break;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const ME: UserId = 2;

    fn tree(articles: Vec<Article>) -> ArticleTree {
        let mut tree = ArticleTree::with_articles(articles);
        tree.apply_filter(&FilterSpec::default(), ME, |_| None);
        tree
    }

    fn five_articles() -> Vec<Article> {
        vec![
            Article::new(1, "Archived root").archived(),
            Article::new(2, "Handbook"),
            Article::new(3, "Under archived").with_parent(1),
            Article::new(4, "Policies").with_parent(2).with_tags([7]),
            Article::new(5, "Leave").with_parent(4),
        ]
    }

    #[test]
    fn test_archived_ancestor_hides_active_child() {
        let tree = tree(five_articles());

        assert!(!tree.is_visible(1));
        assert!(!tree.is_visible(3));
        assert_eq!(tree.visible(), &[2, 5, 4]);
    }

    #[test]
    fn test_show_archived_adds_archived_branches() {
        let mut tree = tree(five_articles());
        let spec = FilterSpec {
            show_archived: true,
            ..Default::default()
        };
        tree.apply_filter(&spec, ME, |_| None);

        assert!(tree.is_visible(1));
        assert!(tree.is_visible(2));
        // Still under an archived ancestor.
        assert!(!tree.is_visible(3));
    }

    #[test]
    fn test_archived_child_brings_active_ancestors() {
        let mut tree = ArticleTree::with_articles(vec![
            Article::new(1, "Root"),
            Article::new(2, "Old").with_parent(1).archived(),
        ]);
        tree.apply_filter(
            &FilterSpec {
                show_archived: true,
                ..Default::default()
            },
            ME,
            |_| None,
        );

        assert_eq!(tree.visible(), &[2, 1]);
        assert_eq!(tree.children_of(1), &[2]);
    }

    #[test]
    fn test_tag_filter_keeps_ancestors_and_expands_them() {
        let mut tree = tree(five_articles());
        let mut spec = FilterSpec::default();
        assert!(spec.toggle_tag(7));
        tree.apply_filter(&spec, ME, |_| None);

        let mut visible = tree.visible().to_vec();
        visible.sort_unstable();
        assert_eq!(visible, vec![2, 4]);
        assert!(tree.is_tag_match(4));
        assert!(!tree.is_tag_match(2));
        assert!(tree.is_expanded(2));

        assert!(!spec.toggle_tag(7));
        assert!(spec.tag_ids.is_empty());
    }

    #[test]
    fn test_favorites_only() {
        let mut articles = five_articles();
        articles[4] = Article::new(5, "Leave").with_parent(4).favorite_of(ME);
        let mut tree = tree(articles);
        tree.apply_filter(
            &FilterSpec {
                favorites_only: true,
                ..Default::default()
            },
            ME,
            |_| None,
        );

        let mut visible = tree.visible().to_vec();
        visible.sort_unstable();
        assert_eq!(visible, vec![2, 4, 5]);
    }

    #[test]
    fn test_query_matches_name_or_cached_text() {
        let mut tree = tree(five_articles());
        let mut spec = FilterSpec {
            query: "  LEAVE ".to_string(),
            ..Default::default()
        };
        tree.apply_filter(&spec, ME, |_| None);
        assert!(tree.is_visible(5));
        assert!(tree.is_visible(2));

        spec.query = "vacation".to_string();
        spec.search_in_content = true;
        tree.apply_filter(&spec, ME, |id| {
            (id == 4).then(|| "Paid Vacation rules".to_string())
        });
        let mut visible = tree.visible().to_vec();
        visible.sort_unstable();
        assert_eq!(visible, vec![2, 4]);
    }

    #[test]
    fn test_selection_fix_up() {
        let mut tree = tree(five_articles());
        assert_eq!(tree.fix_selection(Some(4)), Some(4));
        assert_eq!(tree.fix_selection(Some(3)), Some(2));
        assert_eq!(tree.fix_selection(None), Some(2));

        tree.apply_filter(
            &FilterSpec {
                query: "nothing matches".to_string(),
                ..Default::default()
            },
            ME,
            |_| None,
        );
        assert_eq!(tree.fix_selection(Some(4)), None);
    }

    #[test]
    fn test_sections_partition() {
        let mut tree = tree(vec![
            Article::new(1, "Shared").with_author(ME),
            Article::new(2, "Draft").with_author(ME).unpublished(),
            Article::new(3, "Draft child").with_author(ME).unpublished().with_parent(2),
            Article::new(4, "Someone else's draft").with_author(9).unpublished(),
            Article::new(5, "Starred").with_author(9).favorite_of(ME),
        ]);
        tree.apply_filter(&FilterSpec::default(), ME, |_| None);
        let sections = tree.sections(ME);

        assert_eq!(sections.favorites.roots, vec![5]);
        assert_eq!(sections.private.roots, vec![2]);
        assert!(sections.private.contains(3));
        let mut workspace = sections.workspace.roots.clone();
        workspace.sort_unstable();
        assert_eq!(workspace, vec![1, 4, 5]);
    }

    #[test]
    fn test_rows_honor_expansion() {
        let mut tree = tree(vec![
            Article::new(1, "Root"),
            Article::new(2, "Child").with_parent(1),
            Article::new(3, "Grandchild").with_parent(2).with_icon("🧭"),
        ]);
        tree.collapse_all();
        let sections = tree.sections(ME);

        let rows = tree.rows(&sections.workspace, "", Some(1));
        assert_eq!(rows.len(), 1);
        assert!(rows[0].has_children);
        assert!(!rows[0].expanded);
        assert!(rows[0].active);
        assert_eq!(rows[0].icon, "📁");

        tree.expand_all();
        let rows = tree.rows(&sections.workspace, "child", None);
        let depths: Vec<usize> = rows.iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![0, 1, 2]);
        assert_eq!(rows[1].highlight, Some(0..5));
        assert_eq!(rows[2].highlight, Some(5..10));
        assert_eq!(rows[2].icon, "🧭");
        assert!(!rows[2].has_children);

        assert!(!tree.toggle_expanded(2));
        assert_eq!(tree.rows(&sections.workspace, "", None).len(), 2);
    }

    #[test]
    fn test_breadcrumbs_truncate_deep_paths() {
        let tree = tree(vec![
            Article::new(1, "A"),
            Article::new(2, "B").with_parent(1),
            Article::new(3, "C").with_parent(2),
            Article::new(4, "D").with_parent(3),
            Article::new(5, "E").with_parent(4),
        ]);

        assert_eq!(tree.breadcrumbs(3, 3).len(), 3);

        let crumbs = tree.breadcrumbs(5, 3);
        assert_eq!(crumbs.len(), 4);
        assert_eq!(
            crumbs[1],
            Crumb::Ellipsis {
                hidden: vec![2, 3],
                title: "B > C".to_string()
            }
        );
        assert_eq!(
            crumbs[3],
            Crumb::Article {
                id: 5,
                name: "E".to_string()
            }
        );
        assert!(tree.breadcrumbs(42, 3).is_empty());
    }

    #[test]
    fn test_cycles_terminate() {
        let mut tree = ArticleTree::with_articles(vec![
            Article::new(1, "A").with_parent(2),
            Article::new(2, "B").with_parent(1),
        ]);
        tree.apply_filter(&FilterSpec::default(), ME, |_| None);

        assert_eq!(tree.ancestors(1), vec![2]);
        assert_eq!(tree.visible().len(), 2);
        assert!(tree.sections(ME).workspace.roots.is_empty());
        assert_eq!(tree.breadcrumbs(1, 3).len(), 2);
    }

    #[test]
    fn test_descendants() {
        let tree = tree(five_articles());
        assert_eq!(tree.descendants(2), vec![4, 5]);
        assert!(tree.is_self_or_descendant(2, 5));
        assert!(!tree.is_self_or_descendant(5, 2));
    }

    #[test]
    fn test_highlight_range() {
        assert_eq!(highlight_range("Über Alles", "über"), Some(0..5));
        assert_eq!(highlight_range("abc", "x"), None);
        assert_eq!(highlight_range("abc", ""), None);
    }

    fn arb_collection() -> impl Strategy<Value = Vec<Article>> {
        proptest::collection::vec(
            (
                proptest::option::of(0..12i64),
                any::<bool>(),
                any::<bool>(),
                proptest::collection::vec(0..4i64, 0..3),
            ),
            1..12,
        )
        .prop_map(|specs| {
            let count = specs.len() as i64;
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (parent, active, favorite, tags))| {
                    let id = i as i64;
                    let mut article = Article::new(id, format!("Article {}", id)).with_tags(tags);
                    // Parents always point to an earlier id, so the forest is acyclic.
                    article.parent_id = parent.filter(|p| *p < id && *p < count);
                    article.active = active;
                    if favorite {
                        article = article.favorite_of(ME);
                    }
                    article
                })
                .collect()
        })
    }

    fn arb_spec() -> impl Strategy<Value = FilterSpec> {
        (
            proptest::collection::vec(0..4i64, 0..2),
            any::<bool>(),
            any::<bool>(),
            prop_oneof![Just(String::new()), Just("1".to_string())],
        )
            .prop_map(|(tag_ids, favorites_only, show_archived, query)| FilterSpec {
                query,
                tag_ids,
                favorites_only,
                show_archived,
                ..Default::default()
            })
    }

    proptest! {
        #[test]
        fn prop_visible_nodes_have_visible_ancestors(
            articles in arb_collection(),
            spec in arb_spec(),
        ) {
            let mut tree = ArticleTree::with_articles(articles);
            tree.apply_filter(&spec, ME, |_| None);

            for id in tree.visible() {
                for ancestor in tree.ancestors(*id) {
                    prop_assert!(tree.is_visible(ancestor));
                    prop_assert!(tree.is_expanded(ancestor));
                }
            }
        }

        #[test]
        fn prop_show_archived_never_hides_active_nodes(
            articles in arb_collection(),
            spec in arb_spec(),
        ) {
            let mut tree = ArticleTree::with_articles(articles);
            let off = FilterSpec { show_archived: false, ..spec.clone() };
            tree.apply_filter(&off, ME, |_| None);
            let before: Vec<ArticleId> = tree
                .visible_articles()
                .iter()
                .filter(|a| a.active)
                .map(|a| a.id)
                .collect();

            let on = FilterSpec { show_archived: true, ..spec };
            tree.apply_filter(&on, ME, |_| None);
            for id in before {
                prop_assert!(tree.is_visible(id));
            }
        }

        #[test]
        fn prop_selection_is_never_stale(
            articles in arb_collection(),
            spec in arb_spec(),
            current in proptest::option::of(0..12i64),
        ) {
            let mut tree = ArticleTree::with_articles(articles);
            tree.apply_filter(&spec, ME, |_| None);

            match tree.fix_selection(current) {
                Some(id) => prop_assert!(tree.is_visible(id)),
                None => prop_assert!(tree.visible().is_empty()),
            }
        }
    }
}
