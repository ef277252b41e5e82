//! Word-level HTML diff used by the in-memory store.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

/// Splits HTML into tags, whitespace runs and words.
fn tokenize(html: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut chars = html.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let end = if c == '<' {
            let mut end = html.len();
            for (j, d) in chars.by_ref() {
                if d == '>' {
                    end = j + 1;
                    break;
                }
            }
            end
        } else {
            let whitespace = c.is_whitespace();
            let mut end = i + c.len_utf8();
            while let Some(&(j, d)) = chars.peek() {
                if d == '<' || d.is_whitespace() != whitespace {
                    break;
                }
                end = j + d.len_utf8();
                chars.next();
            }
            end
        };
        tokens.push(&html[i..end]);
    }

    tokens
}

fn is_tag(token: &str) -> bool {
    token.starts_with('<')
}

/// Largest LCS table built for the changed middle of a diff. Bigger inputs
/// are shown as one removed block followed by one added block.
const MAX_TABLE_CELLS: usize = 1 << 20;

fn diff_ops<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<(Op, &'a str)> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let mut ops = Vec::with_capacity(old.len().max(new.len()));
    ops.extend(old[..prefix].iter().map(|t| (Op::Equal, *t)));
    ops.extend(lcs_ops(
        &old[prefix..old.len() - suffix],
        &new[prefix..new.len() - suffix],
    ));
    ops.extend(old[old.len() - suffix..].iter().map(|t| (Op::Equal, *t)));
    ops
}

fn lcs_ops<'a>(old: &[&'a str], new: &[&'a str]) -> Vec<(Op, &'a str)> {
    let n = old.len();
    let m = new.len();
    if (n + 1).saturating_mul(m + 1) > MAX_TABLE_CELLS {
        let mut ops: Vec<_> = old.iter().map(|t| (Op::Delete, *t)).collect();
        ops.extend(new.iter().map(|t| (Op::Insert, *t)));
        return ops;
    }

    // lcs[i][j] = LCS length of old[i..] and new[j..]
    let mut lcs = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            lcs[i][j] = if old[i] == new[j] {
                lcs[i + 1][j + 1] + 1
            } else {
                lcs[i + 1][j].max(lcs[i][j + 1])
            };
        }
    }

    let mut ops = Vec::with_capacity(n.max(m));
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if old[i] == new[j] {
            ops.push((Op::Equal, old[i]));
            i += 1;
            j += 1;
        } else if lcs[i + 1][j] >= lcs[i][j + 1] {
            ops.push((Op::Delete, old[i]));
            i += 1;
        } else {
            ops.push((Op::Insert, new[j]));
            j += 1;
        }
    }
    ops.extend(old[i..].iter().map(|t| (Op::Delete, *t)));
    ops.extend(new[j..].iter().map(|t| (Op::Insert, *t)));
    ops
}

/// Produces an HTML document showing `new` with removed words wrapped in
/// `<del>` and added words wrapped in `<ins>`.
///
/// Markup of the new side is kept as is; removed markup is dropped.
pub fn html_word_diff(old: &str, new: &str) -> String {
    let old_tokens = tokenize(old);
    let new_tokens = tokenize(new);
    let ops = diff_ops(&old_tokens, &new_tokens);

    let mut out = String::with_capacity(old.len() + new.len());
    let mut open: Option<Op> = None;

    for (op, token) in ops {
        if op == Op::Delete && is_tag(token) {
            continue;
        }
        let wrapped = match op {
            Op::Equal => None,
            _ if is_tag(token) => None,
            other => Some(other),
        };

        if open != wrapped {
            match open {
                Some(Op::Delete) => out.push_str("</del>"),
                Some(Op::Insert) => out.push_str("</ins>"),
                _ => {}
            }
            match wrapped {
                Some(Op::Delete) => out.push_str("<del>"),
                Some(Op::Insert) => out.push_str("<ins>"),
                _ => {}
            }
            open = wrapped;
        }
        out.push_str(token);
    }

    match open {
        Some(Op::Delete) => out.push_str("</del>"),
        Some(Op::Insert) => out.push_str("</ins>"),
        _ => {}
    }

    out
}
