/*!
 * Content Rendering
 * Turns raw post text into an HTML fragment and titles into slugs
 */
use regex::{Captures, Regex};

lazy_static::lazy_static! {
    /// Permissive URL pattern: scheme followed by any non-whitespace run
    static ref URL_REGEX: Regex = Regex::new(r"https?://\S+").unwrap();

    /// Image extension at the end of a URL, optionally followed by a query and/or fragment
    static ref IMAGE_EXT_REGEX: Regex =
        Regex::new(r"(?i)\.(?:png|jpe?g|gif|webp)(?:\?[^#\s]*)?(?:#\S*)?$").unwrap();

    static ref SLUG_STRIP_REGEX: Regex = Regex::new(r"[^a-z0-9\s_-]").unwrap();
    static ref SLUG_SEPARATOR_REGEX: Regex = Regex::new(r"[\s_-]+").unwrap();

    /// Valid slug pattern: lowercase letters, numbers, and single hyphens
    static ref SLUG_REGEX: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// Escape the characters that can open markup or break out of an attribute.
pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn is_image_url(url: &str) -> bool {
    IMAGE_EXT_REGEX.is_match(url)
}

/// `url` must already be escaped.
fn image_tag(url: &str) -> String {
    format!(r#"<img src="{url}" alt="" loading="lazy">"#)
}

/// `url` must already be escaped.
fn link_tag(url: &str) -> String {
    format!(r#"<a href="{url}" target="_blank" rel="noopener noreferrer">{url}</a>"#)
}

/// A line that holds nothing but one image URL.
fn standalone_image(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let m = URL_REGEX.find(trimmed)?;
    if m.start() == 0 && m.end() == trimmed.len() && is_image_url(trimmed) {
        Some(trimmed)
    } else {
        None
    }
}

fn render_line(line: &str) -> String {
    if line.trim().is_empty() {
        return "<br>".to_string();
    }

    if let Some(url) = standalone_image(line) {
        return image_tag(&escape_html(url));
    }

    // Escape first, then substitute in one pass so replaced markup is never
    // escaped again.
    let escaped = escape_html(line);
    let linked = URL_REGEX.replace_all(&escaped, |caps: &Captures| {
        let url = &caps[0];
        if is_image_url(url) {
            image_tag(url)
        } else {
            link_tag(url)
        }
    });

    format!("<p>{linked}</p>")
}

/// Render a post body into an HTML fragment.
///
/// Each line becomes one element: `<br>` for blank lines, a bare `<img>` for
/// a line that is only an image URL, otherwise an escaped `<p>` whose URLs
/// are turned into links or inline images.
pub fn render_body(text: &str) -> String {
    text.lines().map(render_line).collect::<Vec<_>>().join("\n")
}

/// HTML body for a broadcast email. Only `<` is escaped; line breaks become `<br>`.
pub fn render_broadcast_html(message: &str) -> String {
    message
        .replace('<', "&lt;")
        .lines()
        .collect::<Vec<_>>()
        .join("<br>")
}

/// Derive a URL-safe slug from a post title.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let stripped = SLUG_STRIP_REGEX.replace_all(&lower, "");
    SLUG_SEPARATOR_REGEX
        .replace_all(stripped.trim(), "-")
        .trim_matches('-')
        .to_string()
}

pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_REGEX.is_match(slug)
}

/// First `max_chars` characters of the body on a single line, for email previews.
pub fn excerpt(body: &str, max_chars: usize) -> String {
    let flat = body.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
