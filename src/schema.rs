//! Form schemas and form instances.
//!
//! A [`FormSchema`] is the ordered, immutable definition of one form type:
//! its fields, custom buttons and submit/cancel callbacks. Schemas are
//! built through an explicit [`SchemaBuilder`] registration step that
//! validates the declarations and freezes the result. A [`FormInstance`]
//! is a concrete, mutable set of field values conforming to a schema;
//! instances are rebuilt from the rendered message on every interaction
//! and never survive between events.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::codec;
use crate::error::{Error, Result};
use crate::field::{self, FieldDef, FieldInstance, FieldKind, Value};
use crate::transport::{CallbackQuery, Transport};

/// Callback invoked with the up-to-date form instance and the triggering
/// event. Used for submit, cancel and custom buttons.
pub type FormCallback = Box<dyn Fn(&mut dyn Transport, &FormInstance, &CallbackQuery)>;

// ============================================================================
// Custom buttons
// ============================================================================

/// A user-supplied button outside the auto-generated per-field edit
/// buttons.
pub struct CustomButton {
    id: String,
    label: String,
    closes_form: bool,
    callback: FormCallback,
}

impl CustomButton {
    /// Create a custom button. `id` must be unique within the schema and
    /// must not contain `/`.
    pub fn new<F>(id: impl Into<String>, label: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut dyn Transport, &FormInstance, &CallbackQuery) + 'static,
    {
        Self {
            id: id.into(),
            label: label.into(),
            closes_form: false,
            callback: Box::new(callback),
        }
    }

    /// Remove the form keyboard after the button's callback runs.
    pub fn closes_form(mut self) -> Self {
        self.closes_form = true;
        self
    }

    /// Button id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Visible label.
    pub fn button_label(&self) -> &str {
        &self.label
    }

    /// Whether activating the button closes the form.
    pub fn is_closing(&self) -> bool {
        self.closes_form
    }

    pub(crate) fn invoke(&self, t: &mut dyn Transport, form: &FormInstance, q: &CallbackQuery) {
        (self.callback)(t, form, q);
    }
}

impl fmt::Debug for CustomButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomButton")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("closes_form", &self.closes_form)
            .finish()
    }
}

// ============================================================================
// Schema
// ============================================================================

/// The ordered, immutable definition of one form type.
pub struct FormSchema {
    name: String,
    fields: Vec<FieldDef>,
    index: HashMap<String, usize>,
    labels: HashMap<String, String>,
    buttons: Vec<Vec<CustomButton>>,
    submit: FormCallback,
    cancel: Option<FormCallback>,
}

impl FormSchema {
    /// Start building a schema for the form type `name`.
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
            buttons: Vec::new(),
            submit: None,
            cancel: None,
        }
    }

    /// Form type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field definitions in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look up a field definition by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.index.get(name).map(|&i| &self.fields[i])
    }

    /// Resolve a human label to a field name.
    pub fn field_name_by_label(&self, label: &str) -> Option<&str> {
        self.labels.get(label).map(String::as_str)
    }

    /// Custom button rows in declaration order.
    pub fn buttons(&self) -> &[Vec<CustomButton>] {
        &self.buttons
    }

    /// Look up a custom button by id.
    pub fn button(&self, id: &str) -> Option<&CustomButton> {
        self.buttons
            .iter()
            .flatten()
            .find(|b| b.id == id)
    }

    /// Whether a cancel callback is configured.
    pub fn has_cancel(&self) -> bool {
        self.cancel.is_some()
    }

    pub(crate) fn run_submit(&self, t: &mut dyn Transport, form: &FormInstance, q: &CallbackQuery) {
        (self.submit)(t, form, q);
    }

    pub(crate) fn run_cancel(&self, t: &mut dyn Transport, form: &FormInstance, q: &CallbackQuery) {
        if let Some(cancel) = &self.cancel {
            cancel(t, form, q);
        }
    }
}

impl fmt::Debug for FormSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormSchema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("buttons", &self.buttons)
            .field("has_cancel", &self.cancel.is_some())
            .finish()
    }
}

/// Builder freezing an ordered schema after validating the declarations.
pub struct SchemaBuilder {
    name: String,
    fields: Vec<FieldDef>,
    buttons: Vec<Vec<CustomButton>>,
    submit: Option<FormCallback>,
    cancel: Option<FormCallback>,
}

impl SchemaBuilder {
    /// Append a field. Declaration order is render order.
    pub fn field(mut self, def: FieldDef) -> Self {
        self.fields.push(def);
        self
    }

    /// Append a custom button on its own row.
    pub fn button(mut self, button: CustomButton) -> Self {
        self.buttons.push(vec![button]);
        self
    }

    /// Append a row of custom buttons.
    pub fn button_row(mut self, row: Vec<CustomButton>) -> Self {
        if !row.is_empty() {
            self.buttons.push(row);
        }
        self
    }

    /// Set the submit callback. Mandatory.
    pub fn on_submit<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut dyn Transport, &FormInstance, &CallbackQuery) + 'static,
    {
        self.submit = Some(Box::new(callback));
        self
    }

    /// Set the optional cancel callback. Configuring one adds a Cancel
    /// button next to OK.
    pub fn on_cancel<F>(mut self, callback: F) -> Self
    where
        F: Fn(&mut dyn Transport, &FormInstance, &CallbackQuery) + 'static,
    {
        self.cancel = Some(Box::new(callback));
        self
    }

    /// Validate the declarations and freeze the schema.
    pub fn build(self) -> Result<FormSchema> {
        validate_token(&self.name, "form name")?;
        let submit = self
            .submit
            .ok_or_else(|| Error::InvalidDefinition("missing submit callback".into()))?;

        let mut index = HashMap::new();
        let mut labels = HashMap::new();
        for (i, def) in self.fields.iter().enumerate() {
            validate_token(def.name(), "field name")?;
            validate_label(def.field_label())?;
            validate_kind_params(def)?;
            if index.insert(def.name().to_string(), i).is_some() {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate field name '{}'",
                    def.name()
                )));
            }
            if labels
                .insert(def.field_label().to_string(), def.name().to_string())
                .is_some()
            {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate label '{}'",
                    def.field_label()
                )));
            }
            if let Some(initial) = def.initial_value() {
                def.instantiate_blank()
                    .validate_input(initial)
                    .map_err(|e| {
                        Error::InvalidDefinition(format!(
                            "bad initial value for field '{}': {}",
                            def.name(),
                            e
                        ))
                    })?;
            }
        }

        let mut button_ids = HashMap::new();
        for button in self.buttons.iter().flatten() {
            validate_token(button.id(), "button id")?;
            if button_ids.insert(button.id().to_string(), ()).is_some() {
                return Err(Error::InvalidDefinition(format!(
                    "duplicate button id '{}'",
                    button.id()
                )));
            }
        }

        Ok(FormSchema {
            name: self.name,
            fields: self.fields,
            index,
            labels,
            buttons: self.buttons,
            submit,
            cancel: self.cancel,
        })
    }
}

/// Names that travel inside `/`-delimited callback identifiers.
fn validate_token(token: &str, what: &str) -> Result<()> {
    if token.is_empty() || token.contains('/') || token.contains(char::is_whitespace) {
        return Err(Error::InvalidDefinition(format!(
            "{} '{}' must be non-empty and free of '/' and whitespace",
            what, token
        )));
    }
    Ok(())
}

/// Declared choice entries and boolean glyphs end up embedded in rendered
/// field lines (choices also in the metadata channel); they must satisfy
/// the same embedding rules as values.
fn validate_kind_params(def: &FieldDef) -> Result<()> {
    let bad = |what: &str, e: Error| {
        Error::InvalidDefinition(format!("bad {} for field '{}': {}", what, def.name(), e))
    };
    match def.kind() {
        FieldKind::Choice { choices } => {
            for entry in choices {
                field::validate_choice_entry(entry).map_err(|e| bad("choice entry", e))?;
            }
        }
        FieldKind::Bool { glyphs } => {
            for value in [true, false] {
                field::validate_line(glyphs.glyph(value), "boolean")
                    .map_err(|e| bad("glyph", e))?;
            }
        }
        _ => {}
    }
    Ok(())
}

/// Labels are embedded verbatim in field lines; the decoder relies on them
/// containing neither the separator nor line breaks.
fn validate_label(label: &str) -> Result<()> {
    if label.is_empty() || label.contains(codec::SEPARATOR) || label.contains('\n') {
        return Err(Error::InvalidDefinition(format!(
            "label '{}' must be non-empty and must not contain '{}' or line breaks",
            label,
            codec::SEPARATOR
        )));
    }
    Ok(())
}

// ============================================================================
// Form instance
// ============================================================================

/// A concrete, mutable set of field values conforming to a schema.
///
/// Constructed either fresh (initial values applied) or reconstructed by
/// the codec from a previously rendered message. Mutated only through the
/// dispatcher's handlers and discarded after each interaction; the only
/// surviving representation is the rendered message itself.
#[derive(Debug, Clone)]
pub struct FormInstance {
    schema: Rc<FormSchema>,
    fields: Vec<FieldInstance>,
}

impl FormInstance {
    /// Create a fresh instance with every field's initial value applied.
    pub fn new(schema: Rc<FormSchema>) -> Self {
        let fields = schema.fields().iter().map(FieldDef::instantiate).collect();
        Self { schema, fields }
    }

    pub(crate) fn from_fields(schema: Rc<FormSchema>, fields: Vec<FieldInstance>) -> Self {
        Self { schema, fields }
    }

    /// The instance's schema.
    pub fn schema(&self) -> &Rc<FormSchema> {
        &self.schema
    }

    /// Field instances in schema order.
    pub fn fields(&self) -> &[FieldInstance] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldInstance> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Look up a field by name, mutably.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut FieldInstance> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    /// Current value of a field, or `None` if absent or unknown.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.field(name).and_then(FieldInstance::value)
    }

    /// Validate and store a value on a field.
    pub fn set_value(&mut self, name: &str, value: Value) -> Result<()> {
        self.field_mut(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?
            .set_value(value)
    }

    /// Set a field's value absent.
    pub fn clear_value(&mut self, name: &str) -> Result<()> {
        self.field_mut(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?
            .clear_value();
        Ok(())
    }

    /// Whole-form validation: every required field must hold a value.
    /// Missing field names are reported in schema order.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<String> = self
            .fields
            .iter()
            .filter(|f| f.needs_value())
            .map(|f| f.name().to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation { missing })
        }
    }
}

impl PartialEq for FormInstance {
    fn eq(&self, other: &Self) -> bool {
        self.schema.name() == other.schema.name() && self.fields == other.fields
    }
}
