//! Keyboard renderer.
//!
//! Builds the inline keyboards attached to a form message: the main form
//! keyboard (one edit button per non-read-only field, custom button rows,
//! OK/Cancel row), the choice-picker sub-keyboard and the free-text
//! prompt keyboard. Layout follows schema declaration order and is stable
//! across renders.

use crate::callback;
use crate::error::{Error, Result};
use crate::field::CLEAR_TOKEN;
use crate::schema::FormInstance;
use crate::transport::{InlineButton, Keyboard};

/// Label of the submit button.
pub const OK_LABEL: &str = "OK";
/// Label of the cancel button.
pub const CANCEL_LABEL: &str = "Cancel";
/// Label of the button returning from a sub-keyboard to the main form.
pub const BACK_LABEL: &str = "« Back";
/// Label of the clear button offered for noneable choice fields.
pub const CLEAR_LABEL: &str = "∅ None";
/// Mark prefixed to the currently selected choice in a picker.
pub const CURRENT_CHOICE_MARK: &str = "🔘";

/// Build the main form keyboard.
pub fn form_keyboard(form: &FormInstance) -> Keyboard {
    let name = form.schema().name().to_string();
    let mut kb = Keyboard::new();

    for field in form.fields() {
        if field.is_read_only() {
            continue;
        }
        kb.add(InlineButton::new(
            format!("{} {}", field.icon(), field.label()),
            callback::edit(&name, field.name()),
        ));
    }

    for row in form.schema().buttons() {
        kb.row(
            row.iter()
                .map(|b| {
                    InlineButton::new(b.button_label(), callback::custom_button(&name, b.id()))
                })
                .collect(),
        );
    }

    let mut tail = vec![InlineButton::new(OK_LABEL, callback::submit(&name))];
    if form.schema().has_cancel() {
        tail.push(InlineButton::new(CANCEL_LABEL, callback::cancel(&name)));
    }
    kb.row(tail);

    kb
}

/// Build the choice-picker keyboard for a choice-backed field: one button
/// per choice (current choice marked), chunked by the field's row width,
/// then a clear row for noneable fields and a back row.
pub fn choice_keyboard(form: &FormInstance, field_name: &str) -> Result<Keyboard> {
    let name = form.schema().name().to_string();
    let field = form
        .field(field_name)
        .ok_or_else(|| Error::UnknownField(field_name.to_string()))?;
    let choices = field.choices().ok_or_else(|| {
        Error::InvalidDefinition(format!("field '{}' has no choices", field_name))
    })?;

    let current = field.value().and_then(|v| v.as_str());
    let width = field.choice_row_width();

    let mut kb = Keyboard::new();
    let buttons: Vec<InlineButton> = choices
        .iter()
        .enumerate()
        .map(|(i, choice)| {
            let label = if Some(choice.as_str()) == current {
                format!("{} {}", CURRENT_CHOICE_MARK, choice)
            } else {
                choice.clone()
            };
            InlineButton::new(label, callback::field_handler(&name, field_name, &i.to_string()))
        })
        .collect();
    for chunk in buttons.chunks(width) {
        kb.row(chunk.to_vec());
    }

    if field.is_noneable() {
        kb.add(InlineButton::new(
            CLEAR_LABEL,
            callback::field_handler(&name, field_name, CLEAR_TOKEN),
        ));
    }
    kb.add(InlineButton::new(BACK_LABEL, callback::display_main(&name)));

    Ok(kb)
}

/// Build the keyboard attached to a free-text prompt: a single cancel
/// button carrying the reserved global cancel token.
pub fn prompt_keyboard() -> Keyboard {
    let mut kb = Keyboard::new();
    kb.add(InlineButton::new(CANCEL_LABEL, callback::GLOBAL_CANCEL));
    kb
}
