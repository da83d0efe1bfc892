//! Line-oriented M3U8 tokenizer.

use tracing::trace;

use crate::{
    HlsError, HlsResult,
    tags::{Attribute, Tag, TagKind},
};

const HEADER: &str = "#EXTM3U";

/// `#EXTM3U`, optionally followed by whitespace and anything after it.
pub fn has_valid_header(first_line: &str) -> bool {
    match first_line.strip_prefix(HEADER) {
        Some(rest) => rest.chars().next().is_none_or(char::is_whitespace),
        None => false,
    }
}

/// Tokenize a whole playlist, header included.
pub fn tokenize(text: &str) -> HlsResult<Vec<Tag>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines();

    let header = lines.next().unwrap_or_default();
    if !has_valid_header(header) {
        return Err(HlsError::MissingHeader);
    }

    Ok(parse_entries(lines))
}

/// Turn the lines following the header into tags.
///
/// The returned order is the input order. A URI line directly after
/// `EXT-X-STREAM-INF` is folded into that tag as its `URI` attribute.
pub fn parse_entries<'a, I>(lines: I) -> Vec<Tag>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut entries: Vec<Tag> = Vec::new();
    // Index of the last pushed tag while it may still absorb a URI line.
    let mut last: Option<usize> = None;
    let mut in_gap = false;

    for raw in lines {
        let line = raw.trim_end();

        if let Some(body) = line.strip_prefix('#') {
            // Plain comment.
            if !body.starts_with("EXT") {
                continue;
            }
            let (name, blob) = body.split_once(':').unwrap_or((body, ""));
            if name.is_empty() {
                continue;
            }

            if name.starts_with("EXT-X-GAP") {
                trace!("gap marker");
                in_gap = true;
            } else if in_gap {
                last = None;
            } else {
                match Tag::from_name(name, blob) {
                    Some(tag) => {
                        entries.push(tag);
                        last = Some(entries.len() - 1);
                    }
                    None => {
                        trace!(name, "dropping unknown tag");
                        last = None;
                    }
                }
            }
        } else if !line.is_empty() && !in_gap {
            match last.and_then(|i| entries.get_mut(i)) {
                Some(tag) if tag.kind() == TagKind::ExtXStreamInf => {
                    tag.push_attribute(Attribute::new("URI", line));
                }
                _ => {
                    if let Some(tag) = Tag::from_name("", line) {
                        entries.push(tag);
                    }
                }
            }
            last = None;
        } else {
            if in_gap && !line.is_empty() {
                trace!(uri = line, "skipping gap segment");
            }
            last = None;
            in_gap = false;
        }
    }

    entries
}
