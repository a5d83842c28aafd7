//! Slack mrkdwn → email-safe HTML.
//!
//! Slack pre-escapes `&`, `<` and `>` inside message text; the only literal
//! angle brackets left are its own control tokens (`<@U…>`, `<#C…>`,
//! `<url|label>`). The converter therefore never escapes message text again,
//! only text we inject ourselves (names, subjects).

use std::collections::HashMap;

/// Lookup tables for `<@U…>` / `<#C…>` tokens embedded in message text.
#[derive(Clone, Debug, Default)]
pub struct Names {
    /// User id → display name.
    pub users: HashMap<String, String>,
    /// Channel id → channel name.
    pub channels: HashMap<String, String>,
}

/// Escape HTML special characters (for names and other injected text).
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Convert one message's mrkdwn to HTML suitable for an email body.
pub fn mrkdwn_to_html(input: &str, names: &Names) -> String {
    let (text, code_blocks) = extract_code_blocks(input);
    let (text, inline_codes) = extract_inline_codes(&text);

    let mut text = replace_slack_tokens(&text, names);

    // Line-oriented emphasis transforms (avoid cross-line pairing).
    let mut lines = Vec::new();
    for line in text.split('\n') {
        let mut l = replace_single_delim(line, '*', "<b>", "</b>");
        l = replace_single_delim(&l, '_', "<i>", "</i>");
        l = replace_single_delim(&l, '~', "<strike>", "</strike>");
        lines.push(l);
    }
    text = lines.join("\n");

    // Blockquotes (Slack sends `>` already escaped as `&gt;`).
    text = convert_blockquotes(&text);

    // Newlines render as explicit breaks in the email body.
    text = text.replace('\n', "<br>");
    // Preserve double spacing.
    text = text.replace("  ", "&nbsp;&nbsp;");

    // Restore inline code. Contents are already Slack-escaped.
    for (i, code) in inline_codes.iter().enumerate() {
        text = text.replace(
            &format!("\0INLINECODE{i}\0"),
            &format!(r#"<code style="color: #c25; border: 1px solid #e1e1e8">{code}</code>"#),
        );
    }

    // Restore code blocks.
    for (i, code) in code_blocks.iter().enumerate() {
        text = text.replace(
            &format!("\0CODEBLOCK{i}\0"),
            &format!(
                r#"<pre style="margin: .5rem 0 .2rem; border: 1px solid rgba(0, 0, 0, .15);">{code}</pre>"#
            ),
        );
    }

    text
}

fn extract_code_blocks(input: &str) -> (String, Vec<String>) {
    let mut blocks = Vec::new();
    let mut out = String::new();

    let mut i = 0usize;
    while let Some(rel) = input[i..].find("```") {
        let start = i + rel;
        out.push_str(&input[i..start]);

        // Slack fences carry no language id; content may start right after
        // the fence or on the next line.
        let mut p = start + 3;
        if p < input.len() && input.as_bytes()[p] == b'\n' {
            p += 1;
        }

        if let Some(end_rel) = input[p..].find("```") {
            let end = p + end_rel;
            let code = input[p..end].to_string();
            let idx = blocks.len();
            blocks.push(code);
            out.push_str(&format!("\0CODEBLOCK{idx}\0"));
            i = end + 3;
            continue;
        }

        // Unclosed fence: append the rest and stop.
        out.push_str(&input[start..]);
        return (out, blocks);
    }

    out.push_str(&input[i..]);
    (out, blocks)
}

fn extract_inline_codes(input: &str) -> (String, Vec<String>) {
    let mut codes = Vec::new();
    let mut out = String::new();

    let mut i = 0usize;
    while let Some(rel) = input[i..].find('`') {
        let start = i + rel;
        out.push_str(&input[i..start]);

        let content_start = start + 1;
        if let Some(end_rel) = input[content_start..].find('`') {
            let end = content_start + end_rel;
            let code = input[content_start..end].to_string();
            let idx = codes.len();
            codes.push(code);
            out.push_str(&format!("\0INLINECODE{idx}\0"));
            i = end + 1;
            continue;
        }

        // Unclosed: append the rest and stop.
        out.push_str(&input[start..]);
        return (out, codes);
    }

    out.push_str(&input[i..]);
    (out, codes)
}

fn replace_slack_tokens(text: &str, names: &Names) -> String {
    let mut out = String::new();
    let mut i = 0usize;
    while let Some(rel) = text[i..].find('<') {
        let start = i + rel;
        out.push_str(&text[i..start]);

        let Some(end_rel) = text[start + 1..].find('>') else {
            out.push_str(&text[start..]);
            return out;
        };
        let end = start + 1 + end_rel;
        out.push_str(&render_token(&text[start + 1..end], names));
        i = end + 1;
    }
    out.push_str(&text[i..]);
    out
}

fn render_token(token: &str, names: &Names) -> String {
    if let Some(rest) = token.strip_prefix('@') {
        let id = rest.split('|').next().unwrap_or(rest);
        let name = names.users.get(id).map(String::as_str).unwrap_or(id);
        return mention(&format!("@{name}"));
    }

    if let Some(rest) = token.strip_prefix('#') {
        let (id, label) = match rest.split_once('|') {
            Some((id, label)) => (id, Some(label)),
            None => (rest, None),
        };
        let name = names.channels.get(id).map(String::as_str).or(label).unwrap_or(id);
        return mention(&format!("#{name}"));
    }

    // Special mentions (`<!here>`, `<!channel>`).
    if let Some(rest) = token.strip_prefix('!') {
        let name = rest.split('|').next().unwrap_or(rest);
        return mention(&format!("@{name}"));
    }

    if let Some((url, label)) = token.split_once('|') {
        return format!(r#"<a href="{url}">{label}</a>"#);
    }

    if token.contains("://") || token.starts_with("mailto:") {
        return format!(r#"<a href="{token}">{token}</a>"#);
    }

    // Not a Slack token; keep the angle brackets as visible text.
    format!("&lt;{token}&gt;")
}

fn mention(label: &str) -> String {
    format!(r##"<font color="#2a80b9">{label}</font>"##)
}

fn replace_single_delim(text: &str, delim: char, open: &str, close: &str) -> String {
    let mut out = String::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0usize;

    while i < chars.len() {
        if chars[i] == delim {
            // Do not treat doubled delimiters as single.
            if (i > 0 && chars[i - 1] == delim) || (i + 1 < chars.len() && chars[i + 1] == delim) {
                out.push(delim);
                i += 1;
                continue;
            }

            // Find the matching closing delimiter on the same line.
            let mut j = i + 1;
            while j < chars.len() {
                if chars[j] == '\n' {
                    break;
                }
                if chars[j] == delim
                    && !(j > 0 && chars[j - 1] == delim)
                    && !(j + 1 < chars.len() && chars[j + 1] == delim)
                {
                    out.push_str(open);
                    for c in &chars[i + 1..j] {
                        out.push(*c);
                    }
                    out.push_str(close);
                    i = j + 1;
                    break;
                }
                j += 1;
            }

            if j >= chars.len() || chars.get(j) != Some(&delim) {
                // No closing delimiter found.
                out.push(delim);
                i += 1;
            }
            continue;
        }

        out.push(chars[i]);
        i += 1;
    }

    out
}

fn convert_blockquotes(text: &str) -> String {
    // `>>>` quotes the whole rest of the message.
    if let Some(pos) = text.find("&gt;&gt;&gt;") {
        let before = &text[..pos];
        let quoted = text[pos + "&gt;&gt;&gt;".len()..].trim_start();
        return format!("{before}<blockquote>{quoted}</blockquote>");
    }

    let mut result: Vec<String> = Vec::new();
    let mut in_block = false;
    let mut block_lines: Vec<String> = Vec::new();

    for line in text.split('\n') {
        if line.starts_with("&gt; ") || line == "&gt;" {
            in_block = true;
            if line == "&gt;" {
                block_lines.push(String::new());
            } else {
                block_lines.push(line[5..].to_string());
            }
            continue;
        }

        if in_block {
            result.push(format!(
                "<blockquote>{}</blockquote>",
                block_lines.join("\n")
            ));
            block_lines.clear();
            in_block = false;
        }
        result.push(line.to_string());
    }

    if in_block {
        result.push(format!(
            "<blockquote>{}</blockquote>",
            block_lines.join("\n")
        ));
    }

    result.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Names {
        let mut n = Names::default();
        n.users.insert("U123".to_string(), "alice".to_string());
        n.channels.insert("C456".to_string(), "general".to_string());
        n
    }

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn resolves_user_mentions() {
        let html = mrkdwn_to_html("hi <@U123>", &names());
        assert_eq!(html, r##"hi <font color="#2a80b9">@alice</font>"##);
    }

    #[test]
    fn unknown_mention_falls_back_to_id() {
        let html = mrkdwn_to_html("<@U999>", &names());
        assert!(html.contains("@U999"));
    }

    #[test]
    fn resolves_channel_refs_with_and_without_label() {
        let html = mrkdwn_to_html("see <#C456> and <#C999|random>", &names());
        assert!(html.contains("#general"));
        assert!(html.contains("#random"));
    }

    #[test]
    fn converts_links() {
        let html = mrkdwn_to_html("<https://example.com|docs> <https://example.org>", &names());
        assert!(html.contains(r#"<a href="https://example.com">docs</a>"#));
        assert!(html.contains(r#"<a href="https://example.org">https://example.org</a>"#));
    }

    #[test]
    fn converts_emphasis() {
        let html = mrkdwn_to_html("*bold* _slanted_ ~gone~", &names());
        assert!(html.contains("<b>bold</b>"));
        assert!(html.contains("<i>slanted</i>"));
        assert!(html.contains("<strike>gone</strike>"));
    }

    #[test]
    fn code_block_contents_are_not_reformatted() {
        let md = "before\n```\nlet x = *a* <@U123>;\n```\nafter";
        let html = mrkdwn_to_html(md, &names());
        assert!(html.contains("<pre"));
        assert!(html.contains("let x = *a* <@U123>;"));
        assert!(!html.contains("<b>a</b>"));
        assert!(!html.contains("@alice"));
    }

    #[test]
    fn inline_code_is_styled_and_untouched() {
        let html = mrkdwn_to_html("run `cargo *test*` now", &names());
        assert!(html.contains("<code"));
        assert!(html.contains("cargo *test*"));
    }

    #[test]
    fn converts_blockquote_lines() {
        let html = mrkdwn_to_html("&gt; quoted\n&gt; more\nplain", &names());
        assert!(html.contains("<blockquote>quoted<br>more</blockquote>"));
        assert!(html.contains("plain"));
    }

    #[test]
    fn triple_quote_swallows_the_rest() {
        let html = mrkdwn_to_html("intro\n&gt;&gt;&gt; all\nof this", &names());
        assert!(html.contains("<blockquote>all<br>of this</blockquote>"));
    }

    #[test]
    fn newlines_become_breaks() {
        let html = mrkdwn_to_html("one\ntwo", &names());
        assert_eq!(html, "one<br>two");
    }

    #[test]
    fn non_token_angle_text_is_escaped() {
        let html = mrkdwn_to_html("a <tag> b", &names());
        assert_eq!(html, "a &lt;tag&gt; b");
    }
}
