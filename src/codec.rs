//! Wire codec.
//!
//! Serializes a form instance into the text block that *is* its only
//! persistent representation, and reconstructs an instance from such a
//! block. One line per field, in schema order:
//!
//! ```text
//! marker + label + ": " + value-text
//! ```
//!
//! The marker char opens every line; when a field carries per-instance
//! metadata (e.g. a dynamic choice list) the markup view renders the
//! marker as a hyperlink whose target encodes the metadata as key/value
//! pairs. The decoder therefore consumes two parallel views of the same
//! content: the plain-text view for labels and values, the markup view
//! for embedded hyperlink targets.

use std::collections::BTreeMap;
use std::rc::Rc;

use log::debug;

use crate::error::{Error, Result};
use crate::field::FieldInstance;
use crate::schema::{FormInstance, FormSchema};
use crate::transport::{Message, WireMessage};

// ============================================================================
// Wire constants
// ============================================================================

/// Separator between a field's label and its value text. Guaranteed (at
/// schema build and value validation time) not to appear inside any label
/// or rendered value.
pub const SEPARATOR: &str = ": ";

/// Rendered value text for an absent field.
pub const MISSING_VALUE: &str = "";

/// Marker char opening every field line. Carries the metadata hyperlink
/// in the markup view.
pub const META_MARKER: char = '▸';

/// Hyperlink target prefix of the metadata channel.
pub const META_PREFIX: &str = "tg://form?meta=";

/// Joins a key and its value within one metadata pair.
///
/// The three metadata separators are control-picture characters, chosen
/// to be outside the range of normal user input. This is a documented
/// assumption, not enforced.
pub const META_KV_SEP: char = '␟';

/// Joins metadata pairs.
pub const META_PAIR_SEP: char = '␞';

/// Joins items inside a list-valued metadata entry (e.g. choice lists).
pub const META_LIST_SEP: char = '␝';

// ============================================================================
// Encoding
// ============================================================================

/// Render a form instance into its dual-view wire body.
pub fn encode(form: &FormInstance) -> WireMessage {
    let mut text_lines = Vec::with_capacity(form.fields().len());
    let mut markup_lines = Vec::with_capacity(form.fields().len());

    for field in form.fields() {
        let line = format!(
            "{}{}{}{}",
            META_MARKER,
            field.label(),
            SEPARATOR,
            field.to_repr(MISSING_VALUE)
        );
        let meta = field.meta();
        if meta.is_empty() {
            markup_lines.push(line.clone());
        } else {
            // Same visible content; the marker becomes the metadata anchor
            let rest = &line[META_MARKER.len_utf8()..];
            markup_lines.push(format!(
                "<a href=\"{}\">{}</a>{}",
                encode_meta(&meta),
                META_MARKER,
                rest
            ));
        }
        text_lines.push(line);
    }

    WireMessage {
        text: text_lines.join("\n"),
        markup: markup_lines.join("\n"),
    }
}

fn encode_meta(meta: &BTreeMap<String, String>) -> String {
    let pairs: Vec<String> = meta
        .iter()
        .map(|(k, v)| format!("{}{}{}", k, META_KV_SEP, v))
        .collect();
    format!("{}{}", META_PREFIX, pairs.join(&META_PAIR_SEP.to_string()))
}

// ============================================================================
// Decoding
// ============================================================================

/// Reconstruct a form instance from a previously rendered message.
///
/// For any instance produced by valid mutations,
/// `decode(schema, render(instance))` yields an instance observably equal
/// to it, field for field, including metadata-dependent state. This holds
/// through the transport's trailing-whitespace trimming: a final line
/// whose absent value left nothing after the separator still resolves to
/// the correct field with an absent value.
pub fn decode(schema: &Rc<FormSchema>, message: &Message) -> Result<FormInstance> {
    let text_lines: Vec<&str> = message.text.lines().collect();
    let markup_lines: Vec<&str> = message.markup.lines().collect();
    if text_lines.len() != markup_lines.len() {
        return Err(Error::Decode(format!(
            "text and markup views disagree: {} vs {} lines",
            text_lines.len(),
            markup_lines.len()
        )));
    }

    let mut fields: Vec<FieldInstance> = schema
        .fields()
        .iter()
        .map(|def| def.instantiate_blank())
        .collect();

    let last = text_lines.len().saturating_sub(1);
    for (i, (text_line, markup_line)) in text_lines
        .iter()
        .copied()
        .zip(markup_lines.iter().copied())
        .enumerate()
    {
        let (label, raw_value) = split_line(text_line, i == last)?;

        let name = schema
            .field_name_by_label(label)
            .ok_or_else(|| Error::Decode(format!("no field with label '{}'", label)))?;
        let field = fields
            .iter_mut()
            .find(|f| f.name() == name)
            .expect("label index out of sync with schema fields");

        let meta = extract_meta(markup_line);
        field.apply_meta(&meta)?;

        if raw_value == MISSING_VALUE {
            field.clear_value();
        } else {
            let value = field.parse_repr(raw_value)?;
            field.set_value(value)?;
        }
    }

    debug!(
        "decoded form '{}' from message {}:{}",
        schema.name(),
        message.chat,
        message.id
    );
    Ok(FormInstance::from_fields(Rc::clone(schema), fields))
}

/// Split one plain-text line into label and raw value text.
///
/// The transport trims trailing whitespace, so the final line of a form
/// whose last field is absent arrives as `marker + label + ":"` with the
/// separator's trailing space gone. Only the last line gets that
/// disambiguation; anywhere else a missing separator is a grammar error.
fn split_line(line: &str, is_last: bool) -> Result<(&str, &str)> {
    let body = line
        .strip_prefix(META_MARKER)
        .ok_or_else(|| Error::Decode(format!("line without leading marker: '{}'", line)))?;

    if let Some(idx) = body.find(SEPARATOR) {
        return Ok((&body[..idx], &body[idx + SEPARATOR.len()..]));
    }

    let trimmed_sep = SEPARATOR.trim_end();
    if is_last {
        if let Some(label) = body.strip_suffix(trimmed_sep) {
            return Ok((label, MISSING_VALUE));
        }
    }
    Err(Error::Decode(format!("line without separator: '{}'", line)))
}

/// Pull the metadata mapping out of a markup line's hyperlink target, if
/// the line carries one in our channel.
fn extract_meta(markup_line: &str) -> BTreeMap<String, String> {
    let Some(start) = markup_line.find("href=\"") else {
        return BTreeMap::new();
    };
    let rest = &markup_line[start + "href=\"".len()..];
    let Some(end) = rest.find('"') else {
        return BTreeMap::new();
    };
    decode_meta(&rest[..end])
}

fn decode_meta(url: &str) -> BTreeMap<String, String> {
    let mut meta = BTreeMap::new();
    let Some(payload) = url.strip_prefix(META_PREFIX) else {
        return meta;
    };
    for pair in payload.split(META_PAIR_SEP) {
        if let Some((key, value)) = pair.split_once(META_KV_SEP) {
            meta.insert(key.to_string(), value.to_string());
        }
    }
    meta
}
