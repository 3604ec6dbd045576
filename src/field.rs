//! Field type system.
//!
//! Typed leaf value containers for forms: each field kind owns validation,
//! text rendering and text parsing for its own value, plus the per-instance
//! metadata that cannot fit in the visible text (e.g. a dynamic choice
//! field's runtime-computed choice list).

use std::collections::BTreeMap;

use crate::codec;
use crate::error::{Error, Result};

// ============================================================================
// Field option flags
// ============================================================================

bitflags::bitflags! {
    /// Field option flags.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FieldOpts: u32 {
        /// Field must hold a value before the form can be submitted.
        const REQUIRED = 0x01;
        /// Field has no edit button; settable from code only.
        const READ_ONLY = 0x02;
        /// Field value may be explicitly cleared by the user.
        const NONEABLE = 0x04;
    }
}

// ============================================================================
// Icons and tokens
// ============================================================================

/// Edit-button icon for a field that can take a new value.
pub const ICON_EDIT: &str = "✏️";
/// Edit-button icon for a required field that still has no value.
pub const ICON_NEEDS_VALUE: &str = "💢";
/// Icon for a read-only field.
pub const ICON_READ_ONLY: &str = "🔒";

/// Free-text input (and choice-picker argument) that clears a noneable
/// field.
pub const CLEAR_TOKEN: &str = "-";

/// Metadata key under which a dynamic choice field externalizes its
/// current choice list.
pub(crate) const META_KEY_CHOICES: &str = "choices";

// ============================================================================
// Values
// ============================================================================

/// A concrete, typed field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Free-form single-line text.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Boolean, rendered through a value↔glyph table.
    Bool(bool),
    /// One entry out of a field's choice list.
    Choice(String),
    /// A URL with scheme and authority.
    Link(String),
}

impl Value {
    /// Name of the value's kind, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Bool(_) => "boolean",
            Value::Choice(_) => "choice",
            Value::Link(_) => "link",
        }
    }

    /// The contained string, for string-backed values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Choice(s) | Value::Link(s) => Some(s),
            _ => None,
        }
    }

    /// The contained integer, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The contained boolean, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

// ============================================================================
// Boolean glyph table
// ============================================================================

/// Bidirectional value↔glyph table for boolean fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolGlyphs {
    truthy: String,
    falsy: String,
}

impl Default for BoolGlyphs {
    fn default() -> Self {
        Self {
            truthy: "✅".into(),
            falsy: "❌".into(),
        }
    }
}

impl BoolGlyphs {
    /// Create a custom glyph table. The two glyphs must differ.
    pub fn new(truthy: impl Into<String>, falsy: impl Into<String>) -> Self {
        Self {
            truthy: truthy.into(),
            falsy: falsy.into(),
        }
    }

    /// Glyph for a value.
    pub fn glyph(&self, value: bool) -> &str {
        if value {
            &self.truthy
        } else {
            &self.falsy
        }
    }

    /// Value for a glyph, if it is one of the two.
    pub fn value(&self, glyph: &str) -> Option<bool> {
        if glyph == self.truthy {
            Some(true)
        } else if glyph == self.falsy {
            Some(false)
        } else {
            None
        }
    }
}

// ============================================================================
// Field kinds
// ============================================================================

/// How a field's edit button behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    /// Prompt the user for raw text and parse it.
    FreeText,
    /// Swap the keyboard for one button per choice.
    InlineChoice,
    /// Flip the value in place, no sub-keyboard.
    Toggle,
}

/// The declared type of a field, with its type-specific parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Free-form single-line text, optionally validated against a pattern
    /// (a regular expression with the `regex` feature, a substring match
    /// without).
    Str {
        /// Optional validation pattern.
        pattern: Option<String>,
    },
    /// Signed integer.
    Int,
    /// Boolean toggle with a value↔glyph table.
    Bool {
        /// Rendering table for the two values.
        glyphs: BoolGlyphs,
    },
    /// One value out of a schema-declared choice list.
    Choice {
        /// The allowed values.
        choices: Vec<String>,
    },
    /// One value out of a per-instance choice list, provided at runtime
    /// and persisted through the metadata channel.
    DynamicChoice {
        /// Current choice list; empty on the schema template.
        choices: Vec<String>,
        /// Buttons per keyboard row in the choice picker.
        row_width: usize,
    },
    /// A URL with scheme and authority.
    Link,
}

impl FieldKind {
    /// Name of the kind, for error messages.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Str { .. } => "string",
            FieldKind::Int => "integer",
            FieldKind::Bool { .. } => "boolean",
            FieldKind::Choice { .. } => "choice",
            FieldKind::DynamicChoice { .. } => "choice",
            FieldKind::Link => "link",
        }
    }

    /// The edit interaction this kind uses.
    pub fn edit_mode(&self) -> EditMode {
        match self {
            FieldKind::Bool { .. } => EditMode::Toggle,
            FieldKind::Choice { .. } | FieldKind::DynamicChoice { .. } => EditMode::InlineChoice,
            _ => EditMode::FreeText,
        }
    }

    fn matches(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (FieldKind::Str { .. }, Value::Str(_))
                | (FieldKind::Int, Value::Int(_))
                | (FieldKind::Bool { .. }, Value::Bool(_))
                | (FieldKind::Choice { .. }, Value::Choice(_))
                | (FieldKind::DynamicChoice { .. }, Value::Choice(_))
                | (FieldKind::Link, Value::Link(_))
        )
    }
}

// ============================================================================
// Field definition
// ============================================================================

/// An immutable, schema-level field template.
///
/// Definitions are built once per form type; constructing a form instance
/// clones them into independently owned [`FieldInstance`]s, never aliases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    name: String,
    label: String,
    kind: FieldKind,
    opts: FieldOpts,
    initial: Option<Value>,
}

impl FieldDef {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            label: name.clone(),
            name,
            kind,
            opts: FieldOpts::empty(),
            initial: None,
        }
    }

    /// A free-text string field.
    pub fn str(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Str { pattern: None })
    }

    /// An integer field.
    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Int)
    }

    /// A boolean toggle field with the default ✅/❌ glyphs.
    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::Bool {
                glyphs: BoolGlyphs::default(),
            },
        )
    }

    /// A single-choice field with a schema-declared choice list.
    pub fn choice(name: impl Into<String>, choices: Vec<String>) -> Self {
        Self::new(name, FieldKind::Choice { choices })
    }

    /// A choice field whose choice list is provided per form instance at
    /// runtime and carried through the metadata channel.
    pub fn dynamic_choice(name: impl Into<String>) -> Self {
        Self::new(
            name,
            FieldKind::DynamicChoice {
                choices: Vec::new(),
                row_width: 1,
            },
        )
    }

    /// A link field; values must look like `scheme://authority...`.
    pub fn link(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Link)
    }

    /// Set the human label (defaults to the field name).
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Mark the field required.
    pub fn required(mut self) -> Self {
        self.opts |= FieldOpts::REQUIRED;
        self
    }

    /// Mark the field read-only: no edit button, settable from code only.
    pub fn read_only(mut self) -> Self {
        self.opts |= FieldOpts::READ_ONLY;
        self
    }

    /// Allow the user to clear the field's value explicitly.
    pub fn noneable(mut self) -> Self {
        self.opts |= FieldOpts::NONEABLE;
        self
    }

    /// Set the initial value applied on fresh construction. Type-checked
    /// at schema build time.
    pub fn initial(mut self, value: Value) -> Self {
        self.initial = Some(value);
        self
    }

    /// Set a validation pattern. No effect on non-string kinds.
    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        if let FieldKind::Str { pattern: p } = &mut self.kind {
            *p = Some(pattern.into());
        }
        self
    }

    /// Set a custom boolean glyph table. No effect on non-boolean kinds.
    pub fn glyphs(mut self, glyphs: BoolGlyphs) -> Self {
        if let FieldKind::Bool { glyphs: g } = &mut self.kind {
            *g = glyphs;
        }
        self
    }

    /// Set the choice-picker row width. No effect on non-dynamic kinds.
    pub fn row_width(mut self, width: usize) -> Self {
        if let FieldKind::DynamicChoice { row_width, .. } = &mut self.kind {
            *row_width = width.max(1);
        }
        self
    }

    /// Field name, fixed at declaration.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human label.
    pub fn field_label(&self) -> &str {
        &self.label
    }

    /// Declared kind.
    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    /// Option flags.
    pub fn opts(&self) -> FieldOpts {
        self.opts
    }

    /// Initial value, if declared.
    pub fn initial_value(&self) -> Option<&Value> {
        self.initial.as_ref()
    }

    /// Clone this template into a fresh instance with the initial value
    /// applied.
    pub fn instantiate(&self) -> FieldInstance {
        FieldInstance {
            value: self.initial.clone(),
            def: self.clone(),
        }
    }

    /// Clone this template into a fresh instance with no value, ignoring
    /// any declared initial. Used by the decoder, which takes every value
    /// from the message.
    pub(crate) fn instantiate_blank(&self) -> FieldInstance {
        FieldInstance {
            value: None,
            def: self.clone(),
        }
    }
}

// ============================================================================
// Field instance
// ============================================================================

/// A mutable, per-form-instance field: an independently owned copy of its
/// [`FieldDef`] plus a concrete value or "absent".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInstance {
    def: FieldDef,
    value: Option<Value>,
}

impl FieldInstance {
    /// The owned definition copy.
    pub fn def(&self) -> &FieldDef {
        &self.def
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.def.name
    }

    /// Human label.
    pub fn label(&self) -> &str {
        &self.def.label
    }

    /// Current value, or `None` if absent.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Whether the field is required but still has no value.
    pub fn needs_value(&self) -> bool {
        self.def.opts.contains(FieldOpts::REQUIRED) && self.value.is_none()
    }

    /// Whether the field is read-only.
    pub fn is_read_only(&self) -> bool {
        self.def.opts.contains(FieldOpts::READ_ONLY)
    }

    /// Whether the field may be cleared by the user.
    pub fn is_noneable(&self) -> bool {
        self.def.opts.contains(FieldOpts::NONEABLE)
    }

    /// The edit interaction this field uses.
    pub fn edit_mode(&self) -> EditMode {
        self.def.kind.edit_mode()
    }

    /// The current choice list, for choice-backed fields.
    pub fn choices(&self) -> Option<&[String]> {
        match &self.def.kind {
            FieldKind::Choice { choices } | FieldKind::DynamicChoice { choices, .. } => {
                Some(choices)
            }
            _ => None,
        }
    }

    /// Buttons per row in the choice picker.
    pub fn choice_row_width(&self) -> usize {
        match &self.def.kind {
            FieldKind::DynamicChoice { row_width, .. } => *row_width,
            _ => 1,
        }
    }

    /// Replace the choice list of a dynamic choice field. Every entry must
    /// be embeddable as a field line and as a metadata list item. Clears
    /// the current value if it is no longer a member.
    pub fn set_choices(&mut self, new_choices: Vec<String>) -> Result<()> {
        for entry in &new_choices {
            validate_choice_entry(entry)?;
        }
        match &mut self.def.kind {
            FieldKind::DynamicChoice { choices, .. } => {
                *choices = new_choices;
                let stale = matches!(
                    &self.value,
                    Some(Value::Choice(current)) if !choices.contains(current)
                );
                if stale {
                    self.value = None;
                }
                Ok(())
            }
            _ => Err(Error::InvalidDefinition(format!(
                "field '{}' has no per-instance choices",
                self.def.name
            ))),
        }
    }

    /// Check a candidate value against the declared kind and its
    /// type-specific rules, without storing it.
    pub fn validate_input(&self, value: &Value) -> Result<()> {
        if !self.def.kind.matches(value) {
            return Err(Error::FieldCast {
                input: format!("{:?}", value),
                kind: self.def.kind.name(),
            });
        }
        match (&self.def.kind, value) {
            (FieldKind::Str { pattern }, Value::Str(s)) => {
                validate_line(s, self.def.kind.name())?;
                if let Some(p) = pattern {
                    if !pattern_matches(p, s) {
                        return Err(Error::FieldCast {
                            input: s.clone(),
                            kind: "string",
                        });
                    }
                }
                Ok(())
            }
            (FieldKind::Choice { choices }, Value::Choice(c))
            | (FieldKind::DynamicChoice { choices, .. }, Value::Choice(c)) => {
                validate_choice_entry(c)?;
                if choices.iter().any(|x| x == c) {
                    Ok(())
                } else {
                    Err(Error::FieldCast {
                        input: c.clone(),
                        kind: "choice",
                    })
                }
            }
            (FieldKind::Link, Value::Link(url)) => {
                validate_line(url, "link")?;
                if is_link(url) {
                    Ok(())
                } else {
                    Err(Error::FieldCast {
                        input: url.clone(),
                        kind: "link",
                    })
                }
            }
            _ => Ok(()),
        }
    }

    /// Validate and store a value. Code-level sets are allowed on
    /// read-only fields; only UI edits are blocked by the dispatcher.
    pub fn set_value(&mut self, value: Value) -> Result<()> {
        self.validate_input(&value)?;
        self.value = Some(value);
        Ok(())
    }

    /// Set the value absent.
    pub fn clear_value(&mut self) {
        self.value = None;
    }

    /// Canonical one-line text for the current value, or `missing` if
    /// absent.
    pub fn to_repr(&self, missing: &str) -> String {
        match (&self.def.kind, &self.value) {
            (_, None) => missing.to_string(),
            (FieldKind::Bool { glyphs }, Some(Value::Bool(b))) => glyphs.glyph(*b).to_string(),
            (_, Some(Value::Int(n))) => n.to_string(),
            (_, Some(v)) => v.as_str().unwrap_or_default().to_string(),
        }
    }

    /// Inverse of [`to_repr`](Self::to_repr) for a non-absent value: parse
    /// canonical text into a typed value. Does not store it.
    pub fn parse_repr(&self, text: &str) -> Result<Value> {
        let cast_err = || Error::FieldCast {
            input: text.to_string(),
            kind: self.def.kind.name(),
        };
        let value = match &self.def.kind {
            FieldKind::Str { .. } => Value::Str(text.to_string()),
            FieldKind::Int => Value::Int(text.parse::<i64>().map_err(|_| cast_err())?),
            FieldKind::Bool { glyphs } => {
                Value::Bool(glyphs.value(text).ok_or_else(cast_err)?)
            }
            FieldKind::Choice { .. } | FieldKind::DynamicChoice { .. } => {
                Value::Choice(text.to_string())
            }
            FieldKind::Link => Value::Link(text.to_string()),
        };
        self.validate_input(&value)?;
        Ok(value)
    }

    /// Parse raw free-text user input. Returns `Ok(None)` when the input
    /// is the clear token and the field is noneable.
    pub fn parse_input(&self, text: &str) -> Result<Option<Value>> {
        if text == CLEAR_TOKEN && self.is_noneable() {
            return Ok(None);
        }
        self.parse_repr(text).map(Some)
    }

    /// Per-instance state that cannot fit in the visible text. Empty for
    /// most kinds; dynamic choice fields externalize their entire choice
    /// list here on every render, or lose it on the next decode.
    pub fn meta(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        if let FieldKind::DynamicChoice { choices, .. } = &self.def.kind {
            if !choices.is_empty() {
                meta.insert(
                    META_KEY_CHOICES.to_string(),
                    choices.join(&codec::META_LIST_SEP.to_string()),
                );
            }
        }
        meta
    }

    /// Restore per-instance state recovered from the metadata channel.
    pub fn apply_meta(&mut self, meta: &BTreeMap<String, String>) -> Result<()> {
        if let FieldKind::DynamicChoice { choices, .. } = &mut self.def.kind {
            if let Some(joined) = meta.get(META_KEY_CHOICES) {
                *choices = joined
                    .split(codec::META_LIST_SEP)
                    .map(str::to_string)
                    .collect();
            }
        }
        Ok(())
    }

    /// Icon for the field's edit button: lock for read-only fields, the
    /// needs-value mark for required absent fields, the current glyph for
    /// set booleans, an edit pencil otherwise.
    pub fn icon(&self) -> String {
        if self.is_read_only() {
            return ICON_READ_ONLY.to_string();
        }
        if self.needs_value() {
            return ICON_NEEDS_VALUE.to_string();
        }
        if let (FieldKind::Bool { glyphs }, Some(Value::Bool(b))) = (&self.def.kind, &self.value) {
            return glyphs.glyph(*b).to_string();
        }
        ICON_EDIT.to_string()
    }
}

/// Reject text that cannot be embedded as one field line: it must be
/// non-empty and free of line breaks and the separator literal. The
/// transport trims whitespace off the message ends, so the text must not
/// carry any of its own at either end or it would decode differently.
pub(crate) fn validate_line(text: &str, kind: &'static str) -> Result<()> {
    if text.is_empty()
        || text.contains('\n')
        || text.contains(codec::SEPARATOR)
        || text != text.trim()
    {
        return Err(Error::FieldCast {
            input: text.to_string(),
            kind,
        });
    }
    Ok(())
}

/// Choice entries additionally travel through the metadata channel and
/// must not contain its separator characters.
pub(crate) fn validate_choice_entry(entry: &str) -> Result<()> {
    validate_line(entry, "choice")?;
    if entry.contains(codec::META_KV_SEP)
        || entry.contains(codec::META_PAIR_SEP)
        || entry.contains(codec::META_LIST_SEP)
    {
        return Err(Error::FieldCast {
            input: entry.to_string(),
            kind: "choice",
        });
    }
    Ok(())
}

/// Minimal `scheme://authority` shape check for link fields.
fn is_link(url: &str) -> bool {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            !scheme.is_empty()
                && scheme.chars().all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-')
                && !rest.is_empty()
                && !url.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// Pattern check for string fields: a real regular expression match with
/// the `regex` feature, a substring match without.
#[cfg(feature = "regex")]
fn pattern_matches(pattern: &str, text: &str) -> bool {
    match regex::Regex::new(pattern) {
        Ok(re) => re.is_match(text),
        // Invalid pattern - fail validation
        Err(_) => false,
    }
}

#[cfg(not(feature = "regex"))]
fn pattern_matches(pattern: &str, text: &str) -> bool {
    text.contains(pattern)
}
