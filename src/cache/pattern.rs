//! Redis `MATCH` 模式到 `glob::Pattern` 的轉換
//!
//! 進程內存儲與 `RedisStore` 使用同一套語法：`*`、`?`、`[abc]`、`[a-z]`、`[^abc]`
//! 以及 `\` 轉義。差異只在退化的字元集合：未閉合的 `[` 和空集合 `[]`
//! 在 Redis 中被寬鬆處理，這裡直接以 `InvalidPattern` 拒絕。

use std::iter::Peekable;
use std::str::Chars;

use crate::cache::error::StoreError;

/// 把 Redis 模式編譯為匹配器
pub fn compile(pattern: &str) -> Result<glob::Pattern, StoreError> {
    let translated = translate(pattern).map_err(|message| invalid(pattern, message))?;
    glob::Pattern::new(&translated).map_err(|e| invalid(pattern, &e.to_string()))
}

fn invalid(pattern: &str, message: &str) -> StoreError {
    StoreError::InvalidPattern {
        pattern: pattern.to_string(),
        message: message.to_string(),
    }
}

enum ClassItem {
    Char(char),
    Range(char, char),
}

fn translate(pattern: &str) -> Result<String, &'static str> {
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' | '?' => out.push(c),
            // 結尾的單個 `\` 按字面值匹配
            '\\' => push_literal(&mut out, chars.next().unwrap_or('\\')),
            '[' => translate_class(&mut chars, &mut out)?,
            _ => push_literal(&mut out, c),
        }
    }

    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    if matches!(c, '*' | '?' | '[' | ']') {
        out.push('[');
        out.push(c);
        out.push(']');
    } else {
        out.push(c);
    }
}

fn next_class_char(chars: &mut Peekable<Chars<'_>>) -> Result<char, &'static str> {
    match chars.next() {
        Some('\\') => chars.next().ok_or("未閉合的字元集合"),
        Some(c) => Ok(c),
        None => Err("未閉合的字元集合"),
    }
}

fn translate_class(chars: &mut Peekable<Chars<'_>>, out: &mut String) -> Result<(), &'static str> {
    let negated = chars.next_if_eq(&'^').is_some();
    let mut items = Vec::new();

    loop {
        if chars.next_if_eq(&']').is_some() {
            break;
        }
        let start = next_class_char(chars)?;

        // `a-z` 為範圍，緊接 `]` 的 `-` 為字面值
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('-') && !matches!(lookahead.peek(), Some(']') | None) {
            chars.next();
            let end = next_class_char(chars)?;
            items.push(ClassItem::Range(start.min(end), start.max(end)));
        } else {
            items.push(ClassItem::Char(start));
        }
    }

    if items.is_empty() {
        return Err("空的字元集合");
    }

    push_class(out, negated, &items);
    Ok(())
}

/// glob 中 `]` 只能放在集合開頭，`-` 放在結尾，`!` 不能緊接開頭的 `[`
fn push_class(out: &mut String, negated: bool, items: &[ClassItem]) {
    let has = |c: char| items.iter().any(|item| matches!(item, ClassItem::Char(x) if *x == c));

    let mut body = String::new();
    if has(']') {
        body.push(']');
    }
    for item in items {
        match item {
            ClassItem::Char(c) if matches!(*c, ']' | '!' | '-') => {}
            ClassItem::Char(c) => body.push(*c),
            ClassItem::Range(start, end) => {
                body.push(*start);
                body.push('-');
                body.push(*end);
            }
        }
    }

    match (has('!'), has('-')) {
        (true, true) if body.is_empty() => body.push_str("-!"),
        (true, true) => body.push_str("!-"),
        (true, false) if body.is_empty() && !negated => {
            out.push('!');
            return;
        }
        (true, false) => body.push('!'),
        (false, true) => body.push('-'),
        (false, false) => {}
    }

    out.push('[');
    if negated {
        out.push('!');
    }
    out.push_str(&body);
    out.push(']');
}
