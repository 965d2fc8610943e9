//! Markup cleanup for archived text.
//!
//! Turns HTML mail bodies, calendar descriptions and chat text into readable
//! plain text. Steps run in a fixed order; reordering changes the output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Placeholder substituted for links to stylesheets, scripts, images and fonts.
pub const RESOURCE_PLACEHOLDER: &str = "[resource]";

/// Upper bound on full pipeline passes. Each pass decodes one layer of
/// escaping, so nested encodings need several.
const MAX_PASSES: usize = 8;

/// Named entities decoded before numeric references are dropped.
/// `&amp;` comes last so one pass decodes exactly one layer.
const NAMED_ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&apos;", "'"),
    ("&rsquo;", "'"),
    ("&lsquo;", "'"),
    ("&rdquo;", "\""),
    ("&ldquo;", "\""),
    ("&ndash;", "-"),
    ("&mdash;", "--"),
    ("&hellip;", "..."),
    ("&bull;", "*"),
    ("&middot;", "*"),
    ("&copy;", "(c)"),
    ("&reg;", "(R)"),
    ("&trade;", "(TM)"),
    ("&zwnj;", ""),
    ("&zwj;", ""),
    ("&shy;", ""),
    ("&amp;", "&"),
];

/// Quoted-printable sequences that survive in some API payloads.
/// Multi-byte sequences come before `=3D` so their bytes are not split.
const ENCODED_CHARS: &[(&str, &str)] = &[
    ("=E2=80=99", "'"),
    ("=E2=80=98", "'"),
    ("=E2=80=9C", "\""),
    ("=E2=80=9D", "\""),
    ("=E2=80=93", "-"),
    ("=E2=80=94", "--"),
    ("=C2=A0", " "),
    ("=20", " "),
    ("=09", "\t"),
    ("=3D", "="),
];

static STYLE_SCRIPT_BLOCK: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?is)<(?:style|script)\b[^>]*>.*?</(?:style|script)\s*>")
});

static INLINE_STYLE_ATTR: Lazy<Regex> =
    Lazy::new(|| compile(r#"(?i)\s+style\s*=\s*(?:"[^"]*"|'[^']*')"#));

static COMMENT: Lazy<Regex> = Lazy::new(|| compile(r"(?s)<!--.*?-->"));

static BLOCK_BREAK: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)<br\s*/?>|</(?:p|div|tr|li|h[1-6]|table|blockquote)\s*>")
});

static TAG: Lazy<Regex> = Lazy::new(|| compile(r"</?[A-Za-z!][^<>]*>"));

static CSS_BRACE_BLOCK: Lazy<Regex> = Lazy::new(|| compile(r"\{[^{}]*\}"));

static CSS_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?i)\b(?:(?:font|color|background|margin|padding|border|width|height|display|position)(?:-[a-z]+)*|text(?:-[a-z]+)+)\s*:\s*[^;\n]*;",
    )
});

static SOFT_LINE_BREAK: Lazy<Regex> = Lazy::new(|| compile(r"=\r?\n"));

static NUMERIC_ENTITY: Lazy<Regex> = Lazy::new(|| compile(r"&#(?:[0-9]+|[xX][0-9a-fA-F]+);"));

static ASSET_URL: Lazy<Regex> = Lazy::new(|| {
    compile(
        r#"(?i)https?://[^\s"'<>()]+?\.(?:css|js|png|jpe?g|gif|svg|webp|ico|bmp|woff2?|ttf|eot)(?:\?[^\s"'<>()]*)?\b"#,
    )
});

static HORIZONTAL_SPACE: Lazy<Regex> = Lazy::new(|| compile(r"[ \t\x0B\x0C\u{00A0}]+"));

static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| compile(r"\n{4,}"));

static CSS_REMNANT_LINE: Lazy<Regex> = Lazy::new(|| {
    compile(
        r"(?ix)^(?:
            (?:(?:font|color|background|margin|padding|border|width|height|display|position)
               (?:-[a-z]+)*|text(?:-[a-z]+)+)
            \s*:\s*[^:]*;                      # property: value;
          | -?[0-9.]+(?:px|pt|em|rem|%)\s*;?   # pixel-only value
          | rgba?\([^)]*\)\s*;?                # colour function
          | \#[0-9a-f]{3,8}\s*;?               # hex colour
          | [{};]+                             # stray braces
        )$",
    )
});

/// Compiles one of the fixed patterns above.
#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("normalizer pattern must compile")
}

/// Cleans raw text that may contain HTML, CSS and encoded characters.
///
/// Deterministic and best-effort: it targets readability of archived mail,
/// not safe rendering of hostile input. Decoding can expose new tags or
/// entities (`&lt;b&gt;`, `&amp;amp;`), so the pipeline repeats until the
/// text stops changing.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }

    let mut text = normalize_pass(raw);
    for _ in 1..MAX_PASSES {
        let next = normalize_pass(&text);
        if next == text {
            break;
        }
        text = next;
    }
    text
}

/// One run of every step, in order.
fn normalize_pass(raw: &str) -> String {
    let text = strip_markup(raw);
    let text = strip_css(&text);
    let text = decode_encoded_chars(&text);
    let text = decode_entities(&text);
    let text = ASSET_URL.replace_all(&text, RESOURCE_PLACEHOLDER);
    let text = collapse_whitespace(&text);
    let text = drop_css_lines(&text);

    text.trim().to_string()
}

/// Steps 1-4: style/script blocks, inline styles, comments, tags.
fn strip_markup(text: &str) -> String {
    let text = STYLE_SCRIPT_BLOCK.replace_all(text, "");
    let text = INLINE_STYLE_ATTR.replace_all(&text, "");
    let text = COMMENT.replace_all(&text, "");
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    TAG.replace_all(&text, "").into_owned()
}

/// Step 5: leftover stylesheet fragments.
fn strip_css(text: &str) -> String {
    let text = CSS_BRACE_BLOCK.replace_all(text, "");
    CSS_DECLARATION.replace_all(&text, "").into_owned()
}

/// Step 6: quoted-printable soft breaks and common encoded characters.
fn decode_encoded_chars(text: &str) -> String {
    let mut out = SOFT_LINE_BREAK.replace_all(text, "").into_owned();
    for (encoded, decoded) in ENCODED_CHARS {
        if out.contains(encoded) {
            out = out.replace(encoded, decoded);
        }
    }
    out
}

/// Step 7: named entity table, then drop numeric references.
fn decode_entities(text: &str) -> String {
    let mut out = text.to_string();
    for (entity, decoded) in NAMED_ENTITIES {
        if out.contains(entity) {
            out = out.replace(entity, decoded);
        }
    }
    NUMERIC_ENTITY.replace_all(&out, "").into_owned()
}

/// Step 9: line endings, horizontal runs, per-line trim, blank-line runs.
fn collapse_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let lines: Vec<String> = unified
        .lines()
        .map(|line| HORIZONTAL_SPACE.replace_all(line, " ").trim().to_string())
        .collect();

    EXCESS_BLANK_LINES
        .replace_all(&lines.join("\n"), "\n\n\n")
        .into_owned()
}

/// Step 10: lines that are nothing but styling debris. Blank lines stay.
fn drop_css_lines(text: &str) -> String {
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| line.is_empty() || !CSS_REMNANT_LINE.is_match(line))
        .collect();

    EXCESS_BLANK_LINES
        .replace_all(&kept.join("\n"), "\n\n\n")
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML_MAIL: &str = r#"<html><head>
<style type="text/css">
  body { font-family: Arial; color: #333333; }
  .footer { margin: 0 auto; }
</style>
<script>var tracking = 1;</script>
</head>
<body style="margin:0;padding:0">
<!-- preheader -->
<div class="wrap" style='background-color: #ffffff'>
<p>Hello&nbsp;Ada,</p>
<p>Your order &amp; invoice are ready &mdash; see below.</p>
<img src="https://cdn.example.com/img/logo.png?v=2" alt="">
<table><tr><td>Total:</td><td>&#36;42</td></tr></table>



<p>Thanks,<br>The Team</p>
</div>
</body></html>"#;

    #[test]
    fn test_entity_decoding() {
        assert_eq!(normalize_text("&amp;&lt;&gt;"), "&<>");
        assert_eq!(normalize_text("Tom &amp;amp; Jerry"), "Tom & Jerry");
        assert_eq!(normalize_text("caf&#233; &#x2014; ok"), "caf ok");
    }

    #[test]
    fn test_html_mail_cleanup() {
        let out = normalize_text(HTML_MAIL);
        assert!(out.starts_with("Hello Ada,"));
        assert!(out.contains("Your order & invoice are ready -- see below."));
        assert!(out.contains("Thanks,\nThe Team"));
        assert!(!out.contains("tracking"));
        assert!(!out.contains("font-family"));
        assert!(!out.contains("preheader"));
        assert!(!out.contains('<'));
        assert!(!out.contains('>'));
    }

    #[test]
    fn test_tags_removed_from_span() {
        let out = normalize_text("before <b>bold <i>and</i> italic</b> after");
        assert_eq!(out, "before bold and italic after");
        assert!(!out.contains('<') && !out.contains('>'));
    }

    #[test]
    fn test_asset_urls_replaced() {
        let out = normalize_text(
            "See https://example.com/site.css and https://example.com/page for details",
        );
        assert_eq!(
            out,
            "See [resource] and https://example.com/page for details"
        );
    }

    #[test]
    fn test_quoted_printable_remnants() {
        let out = normalize_text("It=E2=80=99s a long line that wraps=\nhere and a=3Db");
        assert_eq!(out, "It's a long line that wrapshere and a=b");
    }

    #[test]
    fn test_blank_lines_collapse_to_two() {
        let out = normalize_text("one\r\n\r\n\r\n\r\n\r\n\r\ntwo\n\nthree");
        assert_eq!(out, "one\n\n\ntwo\n\nthree");
    }

    #[test]
    fn test_horizontal_whitespace_and_trim() {
        let out = normalize_text("   lots \t of\u{00A0}\u{00A0} space   \n   indented");
        assert_eq!(out, "lots of space\nindented");
    }

    #[test]
    fn test_css_remnant_lines_dropped() {
        let raw = "Real text\nfont-size: 12px;\n12px\nrgb(0, 0, 0)\n#fff\n}\n\nMore text";
        // The removed declaration leaves its own blank line behind.
        assert_eq!(normalize_text(raw), "Real text\n\n\nMore text");
    }

    #[test]
    fn test_prose_with_colons_kept() {
        let raw = "Agenda: budget review\nWidth of the hall is 20 meters";
        assert_eq!(normalize_text(raw), raw);

        let raw = "Hi team\nReminder: bring laptops;\nText: see the notes;\nThanks";
        assert_eq!(normalize_text(raw), raw);
    }

    #[test]
    fn test_escaped_markup_is_stripped() {
        assert_eq!(normalize_text("&lt;b&gt;bold&lt;/b&gt;"), "bold");
        assert_eq!(normalize_text("a=3D\nb"), "ab");
    }

    #[test]
    fn test_idempotent_on_samples() {
        let samples = [
            HTML_MAIL,
            "&amp;&lt;&gt;",
            "plain text\n\n\n\n\nwith gaps   and   runs",
            "<p>para one</p><p>para two &copy; 2024</p>",
            "line=\nwrapped =E2=80=9Cquoted=E2=80=9D",
            "color: red;\nKeep me\n{ }\n",
            "Tom &amp;amp; Jerry",
            "&lt;b&gt;bold&lt;/b&gt;",
            "a=3D\nb",
            "&amp;amp;amp;amp;lt;i&amp;amp;amp;amp;gt;deep",
            "Reminder: bring laptops;",
            "",
            "   ",
        ];
        for sample in samples {
            let once = normalize_text(sample);
            let twice = normalize_text(&once);
            assert_eq!(once, twice, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(normalize_text(HTML_MAIL), normalize_text(HTML_MAIL));
    }
}
