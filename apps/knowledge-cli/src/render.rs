//! Plain-text rendering of workspace data.

use std::fmt::Write;

use entities::Article;
use knowledge_workspace::{comments::CommentThread, tree::TreeRow, SearchHit, SectionKind};

fn section_title(kind: SectionKind) -> &'static str {
    match kind {
        SectionKind::Favorites => "FAVORITES",
        SectionKind::Workspace => "WORKSPACE",
        SectionKind::Private => "PRIVATE",
    }
}

/// A section header followed by its indented rows.
pub fn section(kind: SectionKind, rows: &[TreeRow]) -> String {
    let mut out = format!("{}\n", section_title(kind));
    for row in rows {
        let toggle = match (row.has_children, row.expanded) {
            (false, _) => ' ',
            (true, true) => '▾',
            (true, false) => '▸',
        };
        let mut line = format!(
            "{}{} {} {}",
            "  ".repeat(row.depth + 1),
            toggle,
            row.icon,
            row.name
        );
        if row.archived {
            line.push_str(" [archived]");
        }
        if row.active {
            line.push_str(" *");
        }
        let _ = writeln!(out, "{} (#{})", line, row.id);
    }
    out
}

pub fn hit(hit: &SearchHit) -> String {
    if hit.snippet.is_empty() {
        format!("#{} {}", hit.article_id, hit.name)
    } else {
        format!("#{} {}\n    {}", hit.article_id, hit.name, hit.snippet)
    }
}

/// One-line summary of an article row.
pub fn metadata(article: &Article) -> String {
    let mut parts = vec![
        format!("v{}", article.version),
        format!("updated {}", article.updated_at.format("%Y-%m-%d %H:%M")),
        format!("{} views", article.views_count),
        format!("{} likes", article.likes_count),
    ];
    if !article.is_published {
        parts.push("private".to_string());
    }
    if !article.active {
        parts.push("archived".to_string());
    }
    parts.join(" · ")
}

pub fn thread(thread: &CommentThread, depth: usize) -> String {
    let comment = &thread.comment;
    let mut out = format!(
        "{}{} ({}): {}\n",
        "  ".repeat(depth),
        comment.author,
        comment.date.format("%Y-%m-%d %H:%M"),
        comment.body
    );
    for reply in &thread.replies {
        out.push_str(&self::thread(reply, depth + 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use entities::Comment;

    use super::*;

    fn row(id: i64, depth: usize, has_children: bool, expanded: bool) -> TreeRow {
        TreeRow {
            id,
            name: format!("Article {}", id),
            icon: "📄".to_string(),
            depth,
            has_children,
            expanded,
            active: false,
            archived: false,
            tag_match: false,
            highlight: None,
        }
    }

    #[test]
    fn test_section_indents_rows() {
        let mut selected = row(2, 1, false, false);
        selected.active = true;
        let out = section(SectionKind::Workspace, &[row(1, 0, true, true), selected]);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "WORKSPACE");
        assert_eq!(lines[1], "  ▾ 📄 Article 1 (#1)");
        assert_eq!(lines[2], "      📄 Article 2 * (#2)");
    }

    #[test]
    fn test_hit_with_snippet() {
        let hit = SearchHit {
            article_id: 4,
            name: "Onboarding".to_string(),
            snippet: "... first day ...".to_string(),
            name_match: false,
            content_match: true,
        };
        assert_eq!(super::hit(&hit), "#4 Onboarding\n    ... first day ...");
    }

    #[test]
    fn test_metadata_flags() {
        let article = Article::new(1, "Draft").unpublished().archived();
        let line = metadata(&article);
        assert!(line.starts_with("v1 · updated "));
        assert!(line.ends_with("private · archived"));
    }

    #[test]
    fn test_nested_threads() {
        let root = Comment::new(1, "Mitchell Admin", "Question");
        let reply = Comment::new(2, "Marc Demo", "Answer").replying_to(1);
        let out = thread(
            &CommentThread {
                comment: root,
                replies: vec![CommentThread {
                    comment: reply,
                    replies: Vec::new(),
                }],
            },
            0,
        );
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[0].starts_with("Mitchell Admin ("));
        assert!(lines[1].starts_with("  Marc Demo ("));
        assert!(lines[1].ends_with("): Answer"));
    }
}
